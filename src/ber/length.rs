//! BER length octets.

use crate::error::{DecodeErrorKind, Error, Result};

/// Longest long-form length accepted (4 length octets).
const MAX_LENGTH_OCTETS: usize = 4;

/// Encode a length for the reverse buffer.
///
/// Returns the octets in push order (last wire octet first) and how many are valid.
pub fn encode_length(len: usize) -> ([u8; 9], usize) {
    let mut out = [0u8; 9];
    if len < 0x80 {
        out[0] = len as u8;
        return (out, 1);
    }

    let mut count = 0;
    let mut v = len;
    while v > 0 {
        out[count] = (v & 0xFF) as u8;
        v >>= 8;
        count += 1;
    }
    out[count] = 0x80 | count as u8;
    (out, count + 1)
}

/// Decode a length starting at `data[0]`.
///
/// `offset` is the absolute position of `data[0]`, used for error reporting.
/// Returns the length and the number of octets consumed.
pub fn decode_length(data: &[u8], offset: usize) -> Result<(usize, usize)> {
    let first = *data
        .first()
        .ok_or_else(|| Error::decode(offset, DecodeErrorKind::TruncatedData))?;

    if first < 0x80 {
        return Ok((first as usize, 1));
    }
    if first == 0x80 {
        return Err(Error::decode(offset, DecodeErrorKind::IndefiniteLength));
    }

    let octets = (first & 0x7F) as usize;
    if octets > MAX_LENGTH_OCTETS {
        return Err(Error::decode(offset, DecodeErrorKind::LengthTooLong { octets }));
    }
    let bytes = data
        .get(1..=octets)
        .ok_or_else(|| Error::decode(offset, DecodeErrorKind::TruncatedData))?;

    let len = bytes.iter().fold(0usize, |acc, b| (acc << 8) | *b as usize);
    Ok((len, octets + 1))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wire(len: usize) -> Vec<u8> {
        let (arr, count) = encode_length(len);
        arr[..count].iter().rev().copied().collect()
    }

    #[test]
    fn test_encode_length_forms() {
        assert_eq!(wire(0), vec![0x00]);
        assert_eq!(wire(127), vec![0x7F]);
        assert_eq!(wire(128), vec![0x81, 0x80]);
        assert_eq!(wire(256), vec![0x82, 0x01, 0x00]);
        assert_eq!(wire(65535), vec![0x82, 0xFF, 0xFF]);
    }

    #[test]
    fn test_decode_length_forms() {
        assert_eq!(decode_length(&[0x05], 0).unwrap(), (5, 1));
        assert_eq!(decode_length(&[0x81, 0x80], 0).unwrap(), (128, 2));
        assert_eq!(decode_length(&[0x82, 0x01, 0x00], 0).unwrap(), (256, 3));
        // Non-minimal long form is accepted.
        assert_eq!(decode_length(&[0x82, 0x00, 0x05], 0).unwrap(), (5, 3));
    }

    #[test]
    fn test_decode_length_errors() {
        assert!(matches!(
            decode_length(&[0x80], 7),
            Err(Error::Decode {
                offset: 7,
                kind: DecodeErrorKind::IndefiniteLength
            })
        ));
        assert!(decode_length(&[0x85, 1, 2, 3, 4, 5], 0).is_err());
        assert!(decode_length(&[0x82, 0x01], 0).is_err());
        assert!(decode_length(&[], 0).is_err());
    }
}
