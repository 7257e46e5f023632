//! Error types for async-snmp-agent.
//!
//! All errors are `#[non_exhaustive]` to allow adding new variants without breaking changes.

mod internal;

use std::net::SocketAddr;

pub use internal::{AuthErrorKind, CryptoErrorKind, DecodeErrorKind, EncodeErrorKind};

use crate::oid::Oid;
use crate::pdu::PduType;

/// Result type alias using the library's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// OID validation error kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OidErrorKind {
    /// Empty OID string.
    Empty,
    /// Empty, non-numeric or out-of-range arc.
    InvalidArc,
    /// OID has too many arcs (exceeds MAX_OID_LEN).
    TooManyArcs { count: usize, max: usize },
    /// Subidentifier overflow during BER decoding.
    SubidentifierOverflow,
    /// Fewer than two arcs, or a first/second arc pair BER cannot carry.
    NotEncodable,
}

impl std::fmt::Display for OidErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => write!(f, "empty OID"),
            Self::InvalidArc => write!(f, "invalid arc value"),
            Self::TooManyArcs { count, max } => {
                write!(f, "OID has {} arcs, exceeds maximum {}", count, max)
            }
            Self::SubidentifierOverflow => write!(f, "subidentifier overflow"),
            Self::NotEncodable => write!(f, "OID cannot be BER encoded as written"),
        }
    }
}

/// Configuration errors raised while preparing an agent.
///
/// These abort startup and are never retried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigErrorKind {
    /// The agent has no scopes.
    NoScopes,
    /// More than one scope has an empty routing-key set.
    DuplicateDefaultScope,
    /// Two scopes claim the same community or context name.
    DuplicateRoutingKey(Box<str>),
    /// A registry contains the same OID twice.
    DuplicateOid(Oid),
    /// No-security mode needs exactly one scope.
    NoSecurityScopeCount(usize),
    /// Two USM users share a name.
    DuplicateUser(Box<str>),
    /// A privacy protocol was configured without an authentication protocol.
    PrivWithoutAuth(Box<str>),
    /// A USM user has an empty passphrase.
    EmptyPassphrase(Box<str>),
    /// Worker count or queue depth of zero.
    ZeroCapacity(&'static str),
}

impl std::fmt::Display for ConfigErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoScopes => write!(f, "agent needs at least one scope"),
            Self::DuplicateDefaultScope => {
                write!(f, "more than one scope has no routing keys")
            }
            Self::DuplicateRoutingKey(key) => {
                write!(f, "routing key '{}' claimed by more than one scope", key)
            }
            Self::DuplicateOid(oid) => write!(f, "OID {} registered twice", oid),
            Self::NoSecurityScopeCount(n) => {
                write!(f, "no-security mode needs exactly one scope, got {}", n)
            }
            Self::DuplicateUser(name) => write!(f, "USM user '{}' registered twice", name),
            Self::PrivWithoutAuth(name) => {
                write!(f, "USM user '{}' has privacy without authentication", name)
            }
            Self::EmptyPassphrase(name) => {
                write!(f, "USM user '{}' has an empty passphrase", name)
            }
            Self::ZeroCapacity(what) => write!(f, "{} must be greater than zero", what),
        }
    }
}

/// SNMP error status codes (RFC 3416).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorStatus {
    NoError,
    TooBig,
    NoSuchName,
    BadValue,
    ReadOnly,
    GenErr,
    NoAccess,
    WrongType,
    WrongLength,
    WrongEncoding,
    WrongValue,
    NoCreation,
    InconsistentValue,
    ResourceUnavailable,
    CommitFailed,
    UndoFailed,
    AuthorizationError,
    NotWritable,
    InconsistentName,
    /// Unknown/future error status code.
    Unknown(i32),
}

impl ErrorStatus {
    /// Create from raw status code.
    pub fn from_i32(value: i32) -> Self {
        match value {
            0 => Self::NoError,
            1 => Self::TooBig,
            2 => Self::NoSuchName,
            3 => Self::BadValue,
            4 => Self::ReadOnly,
            5 => Self::GenErr,
            6 => Self::NoAccess,
            7 => Self::WrongType,
            8 => Self::WrongLength,
            9 => Self::WrongEncoding,
            10 => Self::WrongValue,
            11 => Self::NoCreation,
            12 => Self::InconsistentValue,
            13 => Self::ResourceUnavailable,
            14 => Self::CommitFailed,
            15 => Self::UndoFailed,
            16 => Self::AuthorizationError,
            17 => Self::NotWritable,
            18 => Self::InconsistentName,
            other => Self::Unknown(other),
        }
    }

    /// Convert to raw status code.
    pub fn as_i32(&self) -> i32 {
        match self {
            Self::NoError => 0,
            Self::TooBig => 1,
            Self::NoSuchName => 2,
            Self::BadValue => 3,
            Self::ReadOnly => 4,
            Self::GenErr => 5,
            Self::NoAccess => 6,
            Self::WrongType => 7,
            Self::WrongLength => 8,
            Self::WrongEncoding => 9,
            Self::WrongValue => 10,
            Self::NoCreation => 11,
            Self::InconsistentValue => 12,
            Self::ResourceUnavailable => 13,
            Self::CommitFailed => 14,
            Self::UndoFailed => 15,
            Self::AuthorizationError => 16,
            Self::NotWritable => 17,
            Self::InconsistentName => 18,
            Self::Unknown(code) => *code,
        }
    }

    /// Returns `true` for anything but `noError`.
    pub fn is_error(&self) -> bool {
        !matches!(self, Self::NoError)
    }
}

impl std::fmt::Display for ErrorStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoError => write!(f, "noError"),
            Self::TooBig => write!(f, "tooBig"),
            Self::NoSuchName => write!(f, "noSuchName"),
            Self::BadValue => write!(f, "badValue"),
            Self::ReadOnly => write!(f, "readOnly"),
            Self::GenErr => write!(f, "genErr"),
            Self::NoAccess => write!(f, "noAccess"),
            Self::WrongType => write!(f, "wrongType"),
            Self::WrongLength => write!(f, "wrongLength"),
            Self::WrongEncoding => write!(f, "wrongEncoding"),
            Self::WrongValue => write!(f, "wrongValue"),
            Self::NoCreation => write!(f, "noCreation"),
            Self::InconsistentValue => write!(f, "inconsistentValue"),
            Self::ResourceUnavailable => write!(f, "resourceUnavailable"),
            Self::CommitFailed => write!(f, "commitFailed"),
            Self::UndoFailed => write!(f, "undoFailed"),
            Self::AuthorizationError => write!(f, "authorizationError"),
            Self::NotWritable => write!(f, "notWritable"),
            Self::InconsistentName => write!(f, "inconsistentName"),
            Self::Unknown(code) => write!(f, "unknown({})", code),
        }
    }
}

/// Library error type.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// I/O error on the transport.
    #[error("I/O error{}: {source}", target.map(|t| format!(" communicating with {}", t)).unwrap_or_default())]
    Io {
        target: Option<SocketAddr>,
        #[source]
        source: std::io::Error,
    },

    /// Invalid OID format.
    #[error("invalid OID: {kind}")]
    InvalidOid {
        kind: OidErrorKind,
        input: Option<Box<str>>, // Only allocated when parsing string input
    },

    /// BER decoding error.
    #[error("decode error at offset {offset}: {kind}")]
    Decode {
        offset: usize,
        kind: DecodeErrorKind,
    },

    /// BER encoding error.
    #[error("encode error: {kind}")]
    Encode { kind: EncodeErrorKind },

    /// Authentication failed (SNMPv3).
    #[error("authentication failed: {kind}")]
    AuthenticationFailed { kind: AuthErrorKind },

    /// Decryption failed (SNMPv3).
    #[error("decryption failed: {kind}")]
    DecryptionFailed { kind: CryptoErrorKind },

    /// Encryption failed (SNMPv3).
    #[error("encryption failed: {kind}")]
    EncryptionFailed { kind: CryptoErrorKind },

    /// Message version is not v1, v2c or v3.
    #[error("unsupported protocol version {version}")]
    UnsupportedVersion { version: i32 },

    /// No scope matches the community/context and no default scope exists.
    #[error("no agent instance for scope '{scope}'")]
    NoAgentInstance { scope: Box<str> },

    /// The scope has no way to serve this PDU type.
    #[error("unsupported operation {pdu_type:?}")]
    UnsupportedOperation { pdu_type: PduType },

    /// Permission denied or unresolved USM user.
    #[error("no permission for security name '{name}'")]
    NoPermission { name: Box<str> },

    /// The packet could not be decoded with the resolved credentials.
    #[error("unsupported packet data: {source}")]
    UnsupportedPacketData {
        #[source]
        source: Box<Error>,
    },

    /// Invalid agent configuration.
    #[error("invalid configuration: {kind}")]
    Config { kind: ConfigErrorKind },

    /// The transport was closed.
    #[error("transport closed")]
    TransportClosed,
}

impl Error {
    /// Create a decode error.
    pub fn decode(offset: usize, kind: DecodeErrorKind) -> Self {
        Self::Decode { offset, kind }
    }

    /// Create an encode error.
    pub fn encode(kind: EncodeErrorKind) -> Self {
        Self::Encode { kind }
    }

    /// Create an authentication error.
    pub fn auth(kind: AuthErrorKind) -> Self {
        Self::AuthenticationFailed { kind }
    }

    /// Create a decryption error.
    pub fn decrypt(kind: CryptoErrorKind) -> Self {
        Self::DecryptionFailed { kind }
    }

    /// Create an encryption error.
    pub fn encrypt(kind: CryptoErrorKind) -> Self {
        Self::EncryptionFailed { kind }
    }

    /// Create a configuration error.
    pub fn config(kind: ConfigErrorKind) -> Self {
        Self::Config { kind }
    }

    /// Create an invalid OID error from a kind (no input string).
    pub fn invalid_oid(kind: OidErrorKind) -> Self {
        Self::InvalidOid { kind, input: None }
    }

    /// Create an invalid OID error with the input string that failed.
    pub fn invalid_oid_with_input(kind: OidErrorKind, input: impl Into<Box<str>>) -> Self {
        Self::InvalidOid {
            kind,
            input: Some(input.into()),
        }
    }

    /// Wrap a codec failure as unsupported packet data.
    pub fn unsupported_packet_data(source: Error) -> Self {
        Self::UnsupportedPacketData {
            source: Box::new(source),
        }
    }

    /// Error status carried by a reply that reports this error.
    pub fn error_status(&self) -> ErrorStatus {
        match self {
            Self::NoAgentInstance { .. } => ErrorStatus::NoAccess,
            Self::UnsupportedOperation { .. } => ErrorStatus::ResourceUnavailable,
            Self::NoPermission { .. } => ErrorStatus::AuthorizationError,
            Self::UnsupportedPacketData { .. } => ErrorStatus::BadValue,
            _ => ErrorStatus::GenErr,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_status_roundtrip_codes() {
        for code in 0..=18 {
            assert_eq!(ErrorStatus::from_i32(code).as_i32(), code);
        }
        assert_eq!(ErrorStatus::from_i32(99), ErrorStatus::Unknown(99));
        assert_eq!(ErrorStatus::Unknown(99).as_i32(), 99);
    }

    #[test]
    fn test_error_status_display() {
        assert_eq!(ErrorStatus::NoSuchName.to_string(), "noSuchName");
        assert_eq!(
            ErrorStatus::AuthorizationError.to_string(),
            "authorizationError"
        );
        assert_eq!(ErrorStatus::Unknown(42).to_string(), "unknown(42)");
    }

    #[test]
    fn test_error_to_wire_mapping() {
        let cases = [
            (
                Error::NoAgentInstance {
                    scope: "public".into(),
                },
                ErrorStatus::NoAccess,
            ),
            (
                Error::UnsupportedOperation {
                    pdu_type: PduType::Report,
                },
                ErrorStatus::ResourceUnavailable,
            ),
            (
                Error::NoPermission {
                    name: "bob".into(),
                },
                ErrorStatus::AuthorizationError,
            ),
            (
                Error::unsupported_packet_data(Error::auth(AuthErrorKind::HmacMismatch)),
                ErrorStatus::BadValue,
            ),
            (
                Error::UnsupportedVersion { version: 2 },
                ErrorStatus::GenErr,
            ),
            (Error::TransportClosed, ErrorStatus::GenErr),
        ];

        for (error, status) in cases {
            assert_eq!(error.error_status(), status, "{}", error);
        }
    }

    #[test]
    fn test_config_error_display() {
        let err = Error::config(ConfigErrorKind::DuplicateRoutingKey("public".into()));
        assert!(err.to_string().contains("public"));

        let err = Error::config(ConfigErrorKind::NoSecurityScopeCount(2));
        assert!(err.to_string().contains("exactly one scope"));
    }

    #[test]
    fn test_unsupported_packet_data_source() {
        use std::error::Error as _;

        let err = Error::unsupported_packet_data(Error::decode(3, DecodeErrorKind::TruncatedData));
        let source = err.source().map(|s| s.to_string()).unwrap_or_default();
        assert!(source.contains("offset 3"));
    }
}
