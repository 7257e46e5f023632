//! Request context for variable callbacks.

use std::net::SocketAddr;

use bytes::Bytes;

use crate::message::SecurityLevel;
use crate::pdu::PduType;
use crate::version::Version;

/// Request context passed to permission checks.
///
/// Describes who sent the request and how, so a permission callback can
/// decide per source, per scope or per user.
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Source address of the request.
    pub source: SocketAddr,
    /// SNMP version.
    pub version: Version,
    /// PDU type (GetRequest, SetRequest, Trap, ...).
    pub pdu_type: PduType,
    /// Request ID from the PDU.
    pub request_id: i32,
    /// Community (v1, v2c) or context name (v3) the request was routed by.
    pub scope: Bytes,
    /// USM user name (v3 only, empty for v1/v2c).
    pub user_name: Bytes,
    /// Security level (v3 only, NoAuthNoPriv for v1/v2c).
    pub security_level: SecurityLevel,
}

impl RequestContext {
    /// Scope as text, for logging.
    pub fn scope_lossy(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.scope)
    }
}
