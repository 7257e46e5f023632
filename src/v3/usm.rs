//! UsmSecurityParameters (RFC 3414 section 2.4).

use std::borrow::Cow;

use bytes::Bytes;

use crate::ber::{Decoder, EncodeBuf};
use crate::error::Result;

/// Contents of msgSecurityParameters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UsmSecurityParams {
    pub engine_id: Bytes,
    pub engine_boots: u32,
    pub engine_time: u32,
    pub user_name: Bytes,
    pub auth_params: Bytes,
    pub priv_params: Bytes,
}

impl UsmSecurityParams {
    /// User name for logging and user lookup.
    pub fn user_name_lossy(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.user_name)
    }

    /// Encode the inner SEQUENCE (the caller wraps it in an OCTET STRING).
    pub fn encode(&self) -> Bytes {
        let mut buf = EncodeBuf::with_capacity(64 + self.auth_params.len());
        buf.push_sequence(|buf| {
            buf.push_octet_string(&self.priv_params);
            buf.push_octet_string(&self.auth_params);
            buf.push_octet_string(&self.user_name);
            buf.push_integer(clamp(self.engine_time));
            buf.push_integer(clamp(self.engine_boots));
            buf.push_octet_string(&self.engine_id);
        });
        buf.finish()
    }

    pub fn decode(data: Bytes) -> Result<Self> {
        Self::decode_at(data, 0).map(|(params, _)| params)
    }

    /// Decode parameters found at absolute offset `base`, also returning the
    /// absolute offset of the msgAuthenticationParameters content.
    pub(crate) fn decode_at(data: Bytes, base: usize) -> Result<(Self, usize)> {
        let mut outer = Decoder::with_base(data, base);
        let mut seq = outer.read_sequence()?;
        let engine_id = seq.read_octet_string()?;
        let engine_boots = seq.read_integer()?.max(0) as u32;
        let engine_time = seq.read_integer()?.max(0) as u32;
        let user_name = seq.read_octet_string()?;
        let (auth_offset, auth_params) = seq.read_octet_string_at()?;
        let priv_params = seq.read_octet_string()?;
        Ok((
            Self {
                engine_id,
                engine_boots,
                engine_time,
                user_name,
                auth_params,
                priv_params,
            },
            auth_offset,
        ))
    }
}

/// snmpEngineBoots and snmpEngineTime are INTEGER (0..2147483647).
fn clamp(value: u32) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}
