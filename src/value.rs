//! SNMP binding values.
//!
//! [`Value`] is the closed set of wire types a binding can carry, including the
//! three exception markers of RFC 3416. [`ValueType`] is the matching tag used
//! when a variable declares what it holds.

use std::fmt;

use bytes::Bytes;

use crate::ber::{Decoder, EncodeBuf, tag};
use crate::error::{DecodeErrorKind, Error, Result};
use crate::oid::Oid;

/// Opaque-wrapped float: `9F 78 04 <4 bytes>` (net-snmp opaque special types).
const OPAQUE_FLOAT_PREFIX: [u8; 3] = [0x9F, 0x78, 0x04];
/// Opaque-wrapped double: `9F 79 08 <8 bytes>`.
const OPAQUE_DOUBLE_PREFIX: [u8; 3] = [0x9F, 0x79, 0x08];

/// A binding value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// INTEGER (Integer32).
    Integer(i32),
    /// OCTET STRING.
    OctetString(Bytes),
    /// NULL.
    Null,
    /// OBJECT IDENTIFIER.
    ObjectIdentifier(Oid),
    /// IpAddress (IPv4 only).
    IpAddress([u8; 4]),
    /// Counter32.
    Counter32(u32),
    /// Gauge32 / Unsigned32.
    Gauge32(u32),
    /// TimeTicks (hundredths of a second).
    TimeTicks(u32),
    /// Opaque with arbitrary content.
    Opaque(Bytes),
    /// Counter64.
    Counter64(u64),
    /// Opaque-wrapped IEEE 754 single precision float.
    OpaqueFloat(f32),
    /// Opaque-wrapped IEEE 754 double precision float.
    OpaqueDouble(f64),
    /// noSuchObject exception.
    NoSuchObject,
    /// noSuchInstance exception.
    NoSuchInstance,
    /// endOfMibView exception.
    EndOfMibView,
}

/// Declared type of a variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    Integer,
    OctetString,
    Null,
    ObjectIdentifier,
    IpAddress,
    Counter32,
    Gauge32,
    TimeTicks,
    Opaque,
    Counter64,
    OpaqueFloat,
    OpaqueDouble,
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Integer => "INTEGER",
            Self::OctetString => "OCTET STRING",
            Self::Null => "NULL",
            Self::ObjectIdentifier => "OBJECT IDENTIFIER",
            Self::IpAddress => "IpAddress",
            Self::Counter32 => "Counter32",
            Self::Gauge32 => "Gauge32",
            Self::TimeTicks => "TimeTicks",
            Self::Opaque => "Opaque",
            Self::Counter64 => "Counter64",
            Self::OpaqueFloat => "Opaque Float",
            Self::OpaqueDouble => "Opaque Double",
        };
        f.write_str(name)
    }
}

impl Value {
    /// The declared type this value satisfies, or `None` for exception markers.
    pub fn value_type(&self) -> Option<ValueType> {
        Some(match self {
            Self::Integer(_) => ValueType::Integer,
            Self::OctetString(_) => ValueType::OctetString,
            Self::Null => ValueType::Null,
            Self::ObjectIdentifier(_) => ValueType::ObjectIdentifier,
            Self::IpAddress(_) => ValueType::IpAddress,
            Self::Counter32(_) => ValueType::Counter32,
            Self::Gauge32(_) => ValueType::Gauge32,
            Self::TimeTicks(_) => ValueType::TimeTicks,
            Self::Opaque(_) => ValueType::Opaque,
            Self::Counter64(_) => ValueType::Counter64,
            Self::OpaqueFloat(_) => ValueType::OpaqueFloat,
            Self::OpaqueDouble(_) => ValueType::OpaqueDouble,
            Self::NoSuchObject | Self::NoSuchInstance | Self::EndOfMibView => return None,
        })
    }

    /// Returns `true` for noSuchObject, noSuchInstance and endOfMibView.
    pub fn is_exception(&self) -> bool {
        matches!(
            self,
            Self::NoSuchObject | Self::NoSuchInstance | Self::EndOfMibView
        )
    }

    /// Borrow the content of an OCTET STRING.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::OctetString(b) | Self::Opaque(b) => Some(b),
            _ => None,
        }
    }

    /// Encode to BER.
    pub fn encode(&self, buf: &mut EncodeBuf) {
        match self {
            Self::Integer(v) => buf.push_integer(*v),
            Self::OctetString(data) => buf.push_octet_string(data),
            Self::Null => buf.push_null(),
            Self::ObjectIdentifier(oid) => buf.push_oid(oid),
            Self::IpAddress(addr) => buf.push_ip_address(*addr),
            Self::Counter32(v) => buf.push_unsigned32(tag::application::COUNTER32, *v),
            Self::Gauge32(v) => buf.push_unsigned32(tag::application::GAUGE32, *v),
            Self::TimeTicks(v) => buf.push_unsigned32(tag::application::TIMETICKS, *v),
            Self::Opaque(data) => buf.push_primitive(tag::application::OPAQUE, data),
            Self::Counter64(v) => buf.push_integer64(*v),
            Self::OpaqueFloat(v) => {
                let mut content = [0u8; 7];
                content[..3].copy_from_slice(&OPAQUE_FLOAT_PREFIX);
                content[3..].copy_from_slice(&v.to_be_bytes());
                buf.push_primitive(tag::application::OPAQUE, &content);
            }
            Self::OpaqueDouble(v) => {
                let mut content = [0u8; 11];
                content[..3].copy_from_slice(&OPAQUE_DOUBLE_PREFIX);
                content[3..].copy_from_slice(&v.to_be_bytes());
                buf.push_primitive(tag::application::OPAQUE, &content);
            }
            Self::NoSuchObject => buf.push_primitive(tag::context::NO_SUCH_OBJECT, &[]),
            Self::NoSuchInstance => buf.push_primitive(tag::context::NO_SUCH_INSTANCE, &[]),
            Self::EndOfMibView => buf.push_primitive(tag::context::END_OF_MIB_VIEW, &[]),
        }
    }

    /// Decode from BER.
    pub fn decode(decoder: &mut Decoder) -> Result<Self> {
        let offset = decoder.offset();
        let tag = decoder.read_tag()?;
        let len = decoder.read_length()?;

        match tag {
            tag::universal::INTEGER => Ok(Self::Integer(decoder.read_integer_value(len)?)),
            tag::universal::OCTET_STRING => Ok(Self::OctetString(decoder.read_bytes(len)?)),
            tag::universal::OCTET_STRING_CONSTRUCTED => Err(Error::decode(
                offset,
                DecodeErrorKind::ConstructedOctetString,
            )),
            tag::universal::NULL => {
                if len != 0 {
                    return Err(Error::decode(offset, DecodeErrorKind::InvalidNull));
                }
                Ok(Self::Null)
            }
            tag::universal::OBJECT_IDENTIFIER => {
                Ok(Self::ObjectIdentifier(decoder.read_oid_value(len)?))
            }
            tag::application::IP_ADDRESS => {
                if len != 4 {
                    return Err(Error::decode(
                        offset,
                        DecodeErrorKind::InvalidIpAddressLength { length: len },
                    ));
                }
                let data = decoder.read_bytes(4)?;
                Ok(Self::IpAddress([data[0], data[1], data[2], data[3]]))
            }
            tag::application::COUNTER32 => {
                Ok(Self::Counter32(decoder.read_unsigned32_value(len)?))
            }
            tag::application::GAUGE32 => Ok(Self::Gauge32(decoder.read_unsigned32_value(len)?)),
            tag::application::TIMETICKS => {
                Ok(Self::TimeTicks(decoder.read_unsigned32_value(len)?))
            }
            tag::application::OPAQUE => {
                let data = decoder.read_bytes(len)?;
                decode_opaque(offset, data)
            }
            tag::application::COUNTER64 => {
                Ok(Self::Counter64(decoder.read_integer64_value(len)?))
            }
            // Exception markers are zero length; tolerate stray content like net-snmp.
            tag::context::NO_SUCH_OBJECT => {
                decoder.read_bytes(len)?;
                Ok(Self::NoSuchObject)
            }
            tag::context::NO_SUCH_INSTANCE => {
                decoder.read_bytes(len)?;
                Ok(Self::NoSuchInstance)
            }
            tag::context::END_OF_MIB_VIEW => {
                decoder.read_bytes(len)?;
                Ok(Self::EndOfMibView)
            }
            other => Err(Error::decode(offset, DecodeErrorKind::UnknownValueTag(other))),
        }
    }
}

fn decode_opaque(offset: usize, data: Bytes) -> Result<Value> {
    if data.starts_with(&OPAQUE_FLOAT_PREFIX) {
        let raw: [u8; 4] = data[3..]
            .try_into()
            .map_err(|_| Error::decode(offset, DecodeErrorKind::InvalidOpaque))?;
        return Ok(Value::OpaqueFloat(f32::from_be_bytes(raw)));
    }
    if data.starts_with(&OPAQUE_DOUBLE_PREFIX) {
        let raw: [u8; 8] = data[3..]
            .try_into()
            .map_err(|_| Error::decode(offset, DecodeErrorKind::InvalidOpaque))?;
        return Ok(Value::OpaqueDouble(f64::from_be_bytes(raw)));
    }
    Ok(Value::Opaque(data))
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer(v) => write!(f, "{}", v),
            Self::OctetString(data) => match std::str::from_utf8(data) {
                Ok(s) if s.chars().all(|c| !c.is_control() || c.is_whitespace()) => {
                    write!(f, "\"{}\"", s)
                }
                _ => write_hex(f, data),
            },
            Self::Null => write!(f, "NULL"),
            Self::ObjectIdentifier(oid) => write!(f, "{}", oid),
            Self::IpAddress([a, b, c, d]) => write!(f, "{}.{}.{}.{}", a, b, c, d),
            Self::Counter32(v) => write!(f, "Counter32: {}", v),
            Self::Gauge32(v) => write!(f, "Gauge32: {}", v),
            Self::TimeTicks(v) => write!(f, "Timeticks: ({})", v),
            Self::Opaque(data) => {
                write!(f, "Opaque: ")?;
                write_hex(f, data)
            }
            Self::Counter64(v) => write!(f, "Counter64: {}", v),
            Self::OpaqueFloat(v) => write!(f, "Opaque: Float: {}", v),
            Self::OpaqueDouble(v) => write!(f, "Opaque: Double: {}", v),
            Self::NoSuchObject => write!(f, "noSuchObject"),
            Self::NoSuchInstance => write!(f, "noSuchInstance"),
            Self::EndOfMibView => write!(f, "endOfMibView"),
        }
    }
}

fn write_hex(f: &mut fmt::Formatter<'_>, data: &[u8]) -> fmt::Result {
    write!(f, "0x")?;
    for byte in data {
        write!(f, "{:02x}", byte)?;
    }
    Ok(())
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Integer(v)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::OctetString(Bytes::copy_from_slice(s.as_bytes()))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::OctetString(Bytes::from(s))
    }
}

impl From<Bytes> for Value {
    fn from(b: Bytes) -> Self {
        Self::OctetString(b)
    }
}

impl From<Oid> for Value {
    fn from(oid: Oid) -> Self {
        Self::ObjectIdentifier(oid)
    }
}
