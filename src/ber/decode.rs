//! BER decoding.
//!
//! [`Decoder`] walks a `Bytes` buffer without copying: octet strings come back
//! as cheap slices of the original datagram. Every decoder remembers the
//! absolute offset of its first byte so nested decoders report errors, and
//! USM locates its authentication parameters, in datagram coordinates.

use bytes::Bytes;

use super::length::decode_length;
use super::tag;
use crate::error::{DecodeErrorKind, Error, Result};
use crate::oid::Oid;

/// Cursor over BER-encoded data.
#[derive(Debug, Clone)]
pub struct Decoder {
    data: Bytes,
    pos: usize,
    base: usize,
}

impl Decoder {
    /// Create a decoder over a whole buffer.
    pub fn new(data: Bytes) -> Self {
        Self {
            data,
            pos: 0,
            base: 0,
        }
    }

    /// Create a decoder over bytes that started at absolute offset `base`.
    pub fn with_base(data: Bytes, base: usize) -> Self {
        Self { data, pos: 0, base }
    }

    /// Absolute offset of the next byte to be read.
    pub fn offset(&self) -> usize {
        self.base + self.pos
    }

    /// Bytes left to read.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    /// Returns `true` when all data has been consumed.
    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Look at the next tag without consuming it.
    pub fn peek_tag(&self) -> Option<u8> {
        self.data.get(self.pos).copied()
    }

    /// Read a tag octet.
    pub fn read_tag(&mut self) -> Result<u8> {
        let tag = self
            .peek_tag()
            .ok_or_else(|| Error::decode(self.offset(), DecodeErrorKind::TruncatedData))?;
        self.pos += 1;
        Ok(tag)
    }

    /// Read a length and check it fits in the remaining data.
    pub fn read_length(&mut self) -> Result<usize> {
        let offset = self.offset();
        let (len, consumed) = decode_length(&self.data[self.pos..], offset)?;
        self.pos += consumed;
        if len > self.remaining() {
            return Err(Error::decode(offset, DecodeErrorKind::TlvOverflow));
        }
        Ok(len)
    }

    /// Read `len` raw bytes.
    pub fn read_bytes(&mut self, len: usize) -> Result<Bytes> {
        if len > self.remaining() {
            return Err(Error::decode(self.offset(), DecodeErrorKind::TruncatedData));
        }
        let out = self.data.slice(self.pos..self.pos + len);
        self.pos += len;
        Ok(out)
    }

    /// Consume a tag, failing unless it equals `expected`.
    pub fn expect_tag(&mut self, expected: u8) -> Result<()> {
        let offset = self.offset();
        let actual = self.read_tag()?;
        if actual != expected {
            return Err(Error::decode(
                offset,
                DecodeErrorKind::UnexpectedTag { expected, actual },
            ));
        }
        Ok(())
    }

    /// Read a constructed TLV with the given tag and return a decoder over its content.
    pub fn read_constructed(&mut self, expected: u8) -> Result<Decoder> {
        self.expect_tag(expected)?;
        let len = self.read_length()?;
        let base = self.offset();
        let content = self.read_bytes(len)?;
        Ok(Decoder::with_base(content, base))
    }

    /// Read a SEQUENCE and return a decoder over its content.
    pub fn read_sequence(&mut self) -> Result<Decoder> {
        self.read_constructed(tag::universal::SEQUENCE)
    }

    /// Read an INTEGER.
    pub fn read_integer(&mut self) -> Result<i32> {
        self.expect_tag(tag::universal::INTEGER)?;
        let len = self.read_length()?;
        self.read_integer_value(len)
    }

    /// Read the content of an INTEGER whose tag and length were already consumed.
    pub fn read_integer_value(&mut self, len: usize) -> Result<i32> {
        let offset = self.offset();
        if len == 0 {
            return Err(Error::decode(offset, DecodeErrorKind::ZeroLengthInteger));
        }
        let bytes = self.read_bytes(len)?;

        // Permissive: accept non-minimal sign extension as long as the value fits.
        let negative = bytes[0] & 0x80 != 0;
        let mut value: i64 = if negative { -1 } else { 0 };
        for (i, &b) in bytes.iter().enumerate() {
            value = (value << 8) | i64::from(b);
            if i >= 8 {
                return Err(Error::decode(offset, DecodeErrorKind::IntegerOverflow));
            }
        }
        i32::try_from(value).map_err(|_| Error::decode(offset, DecodeErrorKind::IntegerOverflow))
    }

    /// Read the content of an unsigned 32-bit application type.
    pub fn read_unsigned32_value(&mut self, len: usize) -> Result<u32> {
        let offset = self.offset();
        let value = self.read_unsigned_value(len, 5)?;
        u32::try_from(value).map_err(|_| Error::decode(offset, DecodeErrorKind::IntegerOverflow))
    }

    /// Read the content of a Counter64.
    pub fn read_integer64_value(&mut self, len: usize) -> Result<u64> {
        let offset = self.offset();
        if len > 9 {
            return Err(Error::decode(
                offset,
                DecodeErrorKind::Integer64TooLong { length: len },
            ));
        }
        self.read_unsigned_value(len, 9)
    }

    fn read_unsigned_value(&mut self, len: usize, max_len: usize) -> Result<u64> {
        let offset = self.offset();
        if len == 0 {
            return Err(Error::decode(offset, DecodeErrorKind::ZeroLengthInteger));
        }
        let bytes = self.read_bytes(len)?;
        // Leading zero pad octets do not count toward the width.
        let significant: &[u8] = {
            let skip = bytes.iter().take_while(|b| **b == 0).count();
            &bytes[skip.min(bytes.len() - 1)..]
        };
        if len > max_len || significant.len() > 8 {
            return Err(Error::decode(offset, DecodeErrorKind::IntegerOverflow));
        }
        Ok(significant
            .iter()
            .fold(0u64, |acc, b| (acc << 8) | u64::from(*b)))
    }

    /// Read an OCTET STRING.
    pub fn read_octet_string(&mut self) -> Result<Bytes> {
        self.read_octet_string_at().map(|(_, data)| data)
    }

    /// Read an OCTET STRING and return the absolute offset of its content.
    pub fn read_octet_string_at(&mut self) -> Result<(usize, Bytes)> {
        let offset = self.offset();
        let tag = self.read_tag()?;
        if tag == tag::universal::OCTET_STRING_CONSTRUCTED {
            return Err(Error::decode(
                offset,
                DecodeErrorKind::ConstructedOctetString,
            ));
        }
        if tag != tag::universal::OCTET_STRING {
            return Err(Error::decode(
                offset,
                DecodeErrorKind::UnexpectedTag {
                    expected: tag::universal::OCTET_STRING,
                    actual: tag,
                },
            ));
        }
        let len = self.read_length()?;
        let content_offset = self.offset();
        Ok((content_offset, self.read_bytes(len)?))
    }

    /// Read a NULL.
    pub fn read_null(&mut self) -> Result<()> {
        let offset = self.offset();
        self.expect_tag(tag::universal::NULL)?;
        if self.read_length()? != 0 {
            return Err(Error::decode(offset, DecodeErrorKind::InvalidNull));
        }
        Ok(())
    }

    /// Read an OBJECT IDENTIFIER.
    pub fn read_oid(&mut self) -> Result<Oid> {
        self.expect_tag(tag::universal::OBJECT_IDENTIFIER)?;
        let len = self.read_length()?;
        self.read_oid_value(len)
    }

    /// Read the content of an OBJECT IDENTIFIER.
    pub fn read_oid_value(&mut self, len: usize) -> Result<Oid> {
        let offset = self.offset();
        let bytes = self.read_bytes(len)?;
        Oid::from_ber(&bytes).map_err(|e| match e {
            Error::Decode { kind, .. } => Error::decode(offset, kind),
            other => other,
        })
    }

    /// Read an IpAddress.
    pub fn read_ip_address(&mut self) -> Result<[u8; 4]> {
        let offset = self.offset();
        self.expect_tag(tag::application::IP_ADDRESS)?;
        let len = self.read_length()?;
        if len != 4 {
            return Err(Error::decode(
                offset,
                DecodeErrorKind::InvalidIpAddressLength { length: len },
            ));
        }
        let b = self.read_bytes(4)?;
        Ok([b[0], b[1], b[2], b[3]])
    }

    /// Read a TimeTicks value.
    pub fn read_timeticks(&mut self) -> Result<u32> {
        self.expect_tag(tag::application::TIMETICKS)?;
        let len = self.read_length()?;
        self.read_unsigned32_value(len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ber::EncodeBuf;
    use crate::oid;

    fn decoder(bytes: &[u8]) -> Decoder {
        Decoder::new(Bytes::copy_from_slice(bytes))
    }

    #[test]
    fn test_read_integer_forms() {
        assert_eq!(decoder(&[0x02, 0x01, 0x2A]).read_integer().unwrap(), 42);
        assert_eq!(decoder(&[0x02, 0x01, 0xFF]).read_integer().unwrap(), -1);
        assert_eq!(
            decoder(&[0x02, 0x04, 0x05, 0x6d, 0x2b, 0x82])
                .read_integer()
                .unwrap(),
            91040642
        );
        // Non-minimal encoding is accepted.
        assert_eq!(
            decoder(&[0x02, 0x03, 0x00, 0x00, 0x7B]).read_integer().unwrap(),
            123
        );
    }

    #[test]
    fn test_read_integer_errors() {
        assert!(decoder(&[0x02, 0x00]).read_integer().is_err());
        assert!(
            decoder(&[0x02, 0x05, 0x01, 0x00, 0x00, 0x00, 0x00])
                .read_integer()
                .is_err()
        );
        assert!(decoder(&[0x04, 0x01, 0x00]).read_integer().is_err());
    }

    #[test]
    fn test_unsigned_padding() {
        let mut d = decoder(&[0x00, 0x80, 0x00, 0x00, 0x00]);
        assert_eq!(d.read_unsigned32_value(5).unwrap(), 0x8000_0000);

        let mut d = decoder(&[0x01, 0x00, 0x00, 0x00, 0x00]);
        assert!(d.read_unsigned32_value(5).is_err());
    }

    #[test]
    fn test_tlv_overflow() {
        let err = decoder(&[0x04, 0x05, 0x61]).read_octet_string().unwrap_err();
        assert!(matches!(
            err,
            Error::Decode {
                kind: DecodeErrorKind::TlvOverflow,
                ..
            }
        ));
    }

    #[test]
    fn test_nested_offsets() {
        // SEQUENCE { INTEGER 1, OCTET STRING "ab" }
        let mut d = decoder(&[0x30, 0x07, 0x02, 0x01, 0x01, 0x04, 0x02, b'a', b'b']);
        let mut seq = d.read_sequence().unwrap();
        assert_eq!(seq.offset(), 2);
        assert_eq!(seq.read_integer().unwrap(), 1);
        let (at, data) = seq.read_octet_string_at().unwrap();
        assert_eq!(at, 7);
        assert_eq!(&data[..], b"ab");
        assert!(seq.is_empty());
        assert!(d.is_empty());
    }

    #[test]
    fn test_oid_error_offset_is_absolute() {
        let mut d = decoder(&[0x30, 0x03, 0x06, 0x01, 0x86]);
        let mut seq = d.read_sequence().unwrap();
        let err = seq.read_oid().unwrap_err();
        assert!(matches!(err, Error::Decode { offset: 4, .. }));
    }

    #[test]
    fn test_read_oid_and_null() {
        let mut buf = EncodeBuf::new();
        buf.push_null();
        buf.push_oid(&oid!(1, 3, 6, 1, 2, 1, 1, 1, 0));
        let mut d = Decoder::new(buf.finish());
        assert_eq!(d.read_oid().unwrap(), oid!(1, 3, 6, 1, 2, 1, 1, 1, 0));
        d.read_null().unwrap();
        assert!(d.is_empty());
    }

    #[test]
    fn test_constructed_octet_string_rejected() {
        assert!(decoder(&[0x24, 0x00]).read_octet_string().is_err());
    }
}
