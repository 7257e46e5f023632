//! SNMP messages: the framing around a PDU.
//!
//! A [`Message`] is what the codec produces and consumes. Community messages
//! (v1, v2c) carry a community string; SNMPv3 messages carry a header, USM
//! security parameters and a scoped PDU.

use bytes::Bytes;

use crate::pdu::{Pdu, TrapV1Header};
use crate::v3::UsmSecurityParams;
use crate::version::Version;

/// The User-based Security Model number.
pub const USM_SECURITY_MODEL: i32 = 3;

/// Smallest msgMaxSize RFC 3412 permits.
pub const MIN_MSG_MAX_SIZE: i32 = 484;

/// msgMaxSize advertised in our replies.
pub const DEFAULT_MSG_MAX_SIZE: i32 = 65507;

/// SNMPv3 security level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum SecurityLevel {
    #[default]
    NoAuthNoPriv,
    AuthNoPriv,
    AuthPriv,
}

impl std::fmt::Display for SecurityLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoAuthNoPriv => write!(f, "noAuthNoPriv"),
            Self::AuthNoPriv => write!(f, "authNoPriv"),
            Self::AuthPriv => write!(f, "authPriv"),
        }
    }
}

/// msgFlags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MsgFlags {
    pub auth: bool,
    pub privacy: bool,
    pub reportable: bool,
}

impl MsgFlags {
    pub fn for_level(level: SecurityLevel, reportable: bool) -> Self {
        Self {
            auth: level >= SecurityLevel::AuthNoPriv,
            privacy: level == SecurityLevel::AuthPriv,
            reportable,
        }
    }

    pub fn security_level(self) -> SecurityLevel {
        match (self.auth, self.privacy) {
            (true, true) => SecurityLevel::AuthPriv,
            (true, false) => SecurityLevel::AuthNoPriv,
            _ => SecurityLevel::NoAuthNoPriv,
        }
    }

    pub fn to_byte(self) -> u8 {
        (self.auth as u8) | ((self.privacy as u8) << 1) | ((self.reportable as u8) << 2)
    }

    pub fn from_byte(b: u8) -> Self {
        Self {
            auth: b & 0x01 != 0,
            privacy: b & 0x02 != 0,
            reportable: b & 0x04 != 0,
        }
    }
}

/// msgGlobalData of an SNMPv3 message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct V3Header {
    pub msg_id: i32,
    pub max_size: i32,
    pub flags: MsgFlags,
}

/// A decoded SNMP message.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub version: Version,
    /// Community string (v1, v2c).
    pub community: Bytes,
    /// SNMPv3 header.
    pub header: Option<V3Header>,
    /// SNMPv3 USM parameters.
    pub security: Option<UsmSecurityParams>,
    pub context_engine_id: Bytes,
    pub context_name: Bytes,
    pub pdu: Pdu,
    /// Trap-PDU header when `pdu.pdu_type` is `TrapV1`.
    pub trap_v1: Option<TrapV1Header>,
}

impl Message {
    /// A v1 or v2c message.
    pub fn community(version: Version, community: impl Into<Bytes>, pdu: Pdu) -> Self {
        Self {
            version,
            community: community.into(),
            header: None,
            security: None,
            context_engine_id: Bytes::new(),
            context_name: Bytes::new(),
            pdu,
            trap_v1: None,
        }
    }

    /// An SNMPv3 message.
    pub fn v3(
        header: V3Header,
        security: UsmSecurityParams,
        context_engine_id: impl Into<Bytes>,
        context_name: impl Into<Bytes>,
        pdu: Pdu,
    ) -> Self {
        Self {
            version: Version::V3,
            community: Bytes::new(),
            header: Some(header),
            security: Some(security),
            context_engine_id: context_engine_id.into(),
            context_name: context_name.into(),
            pdu,
            trap_v1: None,
        }
    }

    /// Context name for SNMPv3, community otherwise.
    pub fn routing_key(&self) -> &Bytes {
        if self.version.uses_community() {
            &self.community
        } else {
            &self.context_name
        }
    }

    pub fn security_level(&self) -> SecurityLevel {
        self.header
            .map(|h| h.flags.security_level())
            .unwrap_or_default()
    }

    /// USM user name, empty for community messages.
    pub fn user_name(&self) -> Bytes {
        self.security
            .as_ref()
            .map(|s| s.user_name.clone())
            .unwrap_or_default()
    }

    /// Largest reply the sender can take: its msgMaxSize for SNMPv3, capped
    /// at the largest UDP payload.
    pub fn reply_size_limit(&self) -> usize {
        let max = self
            .header
            .map_or(DEFAULT_MSG_MAX_SIZE, |h| h.max_size.min(DEFAULT_MSG_MAX_SIZE));
        usize::try_from(max).unwrap_or(MIN_MSG_MAX_SIZE as usize)
    }

    /// Same framing, different PDU. SNMPv3 security parameters are kept as is;
    /// the dispatcher refreshes them before encoding.
    pub fn with_pdu(&self, pdu: Pdu) -> Self {
        Self {
            pdu,
            trap_v1: None,
            ..self.clone()
        }
    }
}
