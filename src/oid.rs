//! Object identifier type.
//!
//! OIDs order by their numeric arcs, never by their dotted text: `1.3.6.1.10`
//! sorts after `1.3.6.1.9`, and a shorter OID sorts before any OID it prefixes.
//! Next and bulk traversal rely on this ordering.

use std::fmt;
use std::str::FromStr;

use smallvec::SmallVec;

use crate::error::{DecodeErrorKind, Error, OidErrorKind, Result};

/// Maximum number of arcs accepted in an OID (RFC 2578 section 3.5).
pub const MAX_OID_LEN: usize = 128;

/// An SNMP object identifier.
///
/// Most OIDs are short, so arcs are kept inline up to 16 entries.
#[derive(Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Oid {
    arcs: SmallVec<[u32; 16]>,
}

impl Oid {
    /// Create an OID from any sequence of arcs.
    pub fn new(arcs: impl IntoIterator<Item = u32>) -> Self {
        Self {
            arcs: arcs.into_iter().collect(),
        }
    }

    /// Create an OID from a slice of arcs.
    pub fn from_slice(arcs: &[u32]) -> Self {
        Self {
            arcs: SmallVec::from_slice(arcs),
        }
    }

    /// The empty OID.
    pub fn empty() -> Self {
        Self::default()
    }

    /// The arcs of this OID.
    pub fn arcs(&self) -> &[u32] {
        &self.arcs
    }

    /// Number of arcs.
    pub fn len(&self) -> usize {
        self.arcs.len()
    }

    /// Returns `true` if the OID has no arcs.
    pub fn is_empty(&self) -> bool {
        self.arcs.is_empty()
    }

    /// Returns `true` if `prefix` is a prefix of (or equal to) this OID.
    pub fn starts_with(&self, prefix: &Oid) -> bool {
        self.arcs.starts_with(&prefix.arcs)
    }

    /// Return a new OID with `arc` appended.
    pub fn child(&self, arc: u32) -> Self {
        let mut arcs = self.arcs.clone();
        arcs.push(arc);
        Self { arcs }
    }

    /// Parse dotted notation into canonical form.
    ///
    /// A single leading `.` is ignored, so `.1.3.6.1` and `1.3.6.1` are the same
    /// OID. Leading zeros inside an arc are accepted (`1.03` is `1.3`). Any other
    /// empty, non-numeric, signed or out-of-range arc is rejected.
    pub fn parse(s: &str) -> Result<Self> {
        let body = s.strip_prefix('.').unwrap_or(s);
        if body.is_empty() {
            return Err(Error::invalid_oid_with_input(OidErrorKind::Empty, s));
        }

        let mut arcs = SmallVec::new();
        for part in body.split('.') {
            if arcs.len() == MAX_OID_LEN {
                return Err(Error::invalid_oid_with_input(
                    OidErrorKind::TooManyArcs {
                        count: body.split('.').count(),
                        max: MAX_OID_LEN,
                    },
                    s,
                ));
            }
            if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                return Err(Error::invalid_oid_with_input(OidErrorKind::InvalidArc, s));
            }
            let arc = part
                .parse::<u32>()
                .map_err(|_| Error::invalid_oid_with_input(OidErrorKind::InvalidArc, s))?;
            arcs.push(arc);
        }

        Ok(Self { arcs })
    }

    /// Decode the content octets of a BER OBJECT IDENTIFIER.
    ///
    /// Errors carry offset 0; the BER decoder rewrites it to the absolute position.
    pub fn from_ber(data: &[u8]) -> Result<Self> {
        if data.is_empty() {
            return Err(Error::decode(0, DecodeErrorKind::InvalidOidEncoding));
        }

        let mut arcs: SmallVec<[u32; 16]> = SmallVec::new();
        let mut value: u64 = 0;
        let mut in_progress = false;

        for &byte in data {
            value = (value << 7) | u64::from(byte & 0x7F);
            in_progress = true;
            if value > u64::from(u32::MAX) + 80 {
                return Err(Error::decode(0, DecodeErrorKind::InvalidOidEncoding));
            }
            if byte & 0x80 != 0 {
                continue;
            }

            if arcs.is_empty() {
                let (first, second) = match value {
                    0..40 => (0, value),
                    40..80 => (1, value - 40),
                    _ => (2, value - 80),
                };
                arcs.push(first);
                arcs.push(second as u32);
            } else {
                let arc = u32::try_from(value)
                    .map_err(|_| Error::decode(0, DecodeErrorKind::InvalidOidEncoding))?;
                arcs.push(arc);
            }

            if arcs.len() > MAX_OID_LEN {
                return Err(Error::decode(
                    0,
                    DecodeErrorKind::OidTooLong {
                        count: arcs.len(),
                        max: MAX_OID_LEN,
                    },
                ));
            }
            value = 0;
            in_progress = false;
        }

        if in_progress {
            return Err(Error::decode(0, DecodeErrorKind::InvalidOidEncoding));
        }

        Ok(Self { arcs })
    }

    /// Fails unless the OID encodes and decodes back unchanged: it needs two
    /// or more arcs, a first arc of 0, 1 or 2, and a second arc below 40
    /// when the first is 0 or 1 (X.690 8.19.4).
    pub fn check_encodable(&self) -> Result<()> {
        let encodable = match self.arcs.as_slice() {
            [0 | 1, second, ..] => *second < 40,
            [2, _, ..] => true,
            _ => false,
        };
        if encodable {
            Ok(())
        } else {
            Err(Error::invalid_oid_with_input(
                OidErrorKind::NotEncodable,
                self.to_string(),
            ))
        }
    }

    /// Encode to BER content octets.
    ///
    /// Encoding is lenient: a single-arc OID encodes as `arc * 40`, and an empty
    /// OID encodes as `0.0`. Such OIDs, and those failing
    /// [`check_encodable`](Self::check_encodable), decode to different arcs.
    pub fn to_ber_smallvec(&self) -> SmallVec<[u8; 64]> {
        let mut out = SmallVec::new();

        let (first, rest) = match self.arcs.as_slice() {
            [] => (0u64, &[][..]),
            [a] => (u64::from(*a) * 40, &[][..]),
            [a, b, rest @ ..] => (u64::from(*a) * 40 + u64::from(*b), rest),
        };

        push_subidentifier(&mut out, first);
        for &arc in rest {
            push_subidentifier(&mut out, u64::from(arc));
        }
        out
    }
}

fn push_subidentifier(out: &mut SmallVec<[u8; 64]>, value: u64) {
    let mut tmp = [0u8; 10];
    let mut i = tmp.len();
    let mut v = value;
    loop {
        i -= 1;
        tmp[i] = (v & 0x7F) as u8;
        v >>= 7;
        if v == 0 {
            break;
        }
    }
    let last = tmp.len() - 1;
    for (idx, byte) in tmp.iter().enumerate().skip(i) {
        out.push(if idx == last { *byte } else { *byte | 0x80 });
    }
}

impl fmt::Display for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for arc in &self.arcs {
            if !first {
                f.write_str(".")?;
            }
            write!(f, "{}", arc)?;
            first = false;
        }
        Ok(())
    }
}

impl fmt::Debug for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Oid({})", self)
    }
}

impl FromStr for Oid {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl From<&[u32]> for Oid {
    fn from(arcs: &[u32]) -> Self {
        Self::from_slice(arcs)
    }
}

impl<const N: usize> From<[u32; N]> for Oid {
    fn from(arcs: [u32; N]) -> Self {
        Self::from_slice(&arcs)
    }
}

/// Build an [`Oid`] from literal arcs.
///
/// ```rust
/// use async_snmp_agent::oid;
///
/// let sys_descr = oid!(1, 3, 6, 1, 2, 1, 1, 1, 0);
/// assert_eq!(sys_descr.to_string(), "1.3.6.1.2.1.1.1.0");
/// ```
#[macro_export]
macro_rules! oid {
    ($($arc:expr),* $(,)?) => {
        $crate::oid::Oid::from_slice(&[$($arc),*])
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_parse_leading_dot_is_ignored() {
        let a = Oid::parse("1.3.6.1.2.1.1.1.0").unwrap();
        let b = Oid::parse(".1.3.6.1.2.1.1.1.0").unwrap();
        assert_eq!(a, b);
        assert_eq!(a, oid!(1, 3, 6, 1, 2, 1, 1, 1, 0));
    }

    #[test]
    fn test_parse_leading_zeros_are_numeric() {
        assert_eq!(Oid::parse("1.03.006").unwrap(), oid!(1, 3, 6));
    }

    #[test]
    fn test_parse_rejects_invalid_components() {
        for input in ["", ".", "1..3", "1.3.", "..1", "1.a.3", "1.-3", "1.+3", "1.4294967296"] {
            let err = Oid::parse(input).unwrap_err();
            assert!(
                matches!(err, Error::InvalidOid { .. }),
                "{input:?} gave {err:?}"
            );
        }
    }

    #[test]
    fn test_parse_max_arc() {
        let oid = Oid::parse("1.3.4294967295").unwrap();
        assert_eq!(oid.arcs(), &[1, 3, u32::MAX]);
    }

    #[test]
    fn test_parse_too_many_arcs() {
        let input = vec!["1"; MAX_OID_LEN + 1].join(".");
        let err = Oid::parse(&input).unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidOid {
                kind: OidErrorKind::TooManyArcs { .. },
                ..
            }
        ));
    }

    #[test]
    fn test_numeric_ordering() {
        // Text ordering would put "10" before "9".
        assert!(oid!(1, 3, 6, 1, 9) < oid!(1, 3, 6, 1, 10));
        // A prefix sorts before its children.
        assert!(oid!(1, 3, 6, 1) < oid!(1, 3, 6, 1, 0));
        assert!(oid!(1, 3, 6, 1, 2, 1, 1, 9, 0) < oid!(1, 3, 6, 1, 2, 1, 1, 10, 0));
        assert!(oid!(1, 3, 6, 1, 4) > oid!(1, 3, 6, 1, 2, 1, 99999));
    }

    #[test]
    fn test_ber_encoding_known_value() {
        // Printer MIB OID carried by the v1 GET capture used in the dispatch tests.
        let oid = oid!(1, 3, 6, 1, 2, 1, 43, 14, 1, 1, 6, 1, 5);
        assert_eq!(
            oid.to_ber_smallvec().as_slice(),
            &[
                0x2b, 0x06, 0x01, 0x02, 0x01, 0x2b, 0x0e, 0x01, 0x01, 0x06, 0x01, 0x05
            ]
        );
    }

    #[test]
    fn test_ber_multibyte_arcs() {
        let oid = oid!(1, 3, 6, 1, 4, 1, 20408, 4294967295);
        let ber = oid.to_ber_smallvec();
        assert_eq!(Oid::from_ber(&ber).unwrap(), oid);
    }

    #[test]
    fn test_ber_first_arc_two() {
        let oid = oid!(2, 999, 3);
        let ber = oid.to_ber_smallvec();
        assert_eq!(&ber[..2], &[0x88, 0x37]);
        assert_eq!(Oid::from_ber(&ber).unwrap(), oid);
    }

    #[test]
    fn test_from_ber_rejects_truncated_and_empty() {
        assert!(Oid::from_ber(&[]).is_err());
        assert!(Oid::from_ber(&[0x2b, 0x86]).is_err());
        assert!(Oid::from_ber(&[0x2b, 0x90, 0x80, 0x80, 0x80, 0x80, 0x00]).is_err());
    }

    #[test]
    fn test_display_and_debug() {
        let oid = oid!(1, 3, 6, 1);
        assert_eq!(oid.to_string(), "1.3.6.1");
        assert_eq!(format!("{:?}", oid), "Oid(1.3.6.1)");
        assert_eq!(Oid::empty().to_string(), "");
    }

    #[test]
    fn test_starts_with_and_child() {
        let base = oid!(1, 3, 6, 1, 2, 1, 1);
        let child = base.child(5).child(0);
        assert!(child.starts_with(&base));
        assert!(!base.starts_with(&child));
        assert_eq!(child, oid!(1, 3, 6, 1, 2, 1, 1, 5, 0));
    }

    proptest! {
        #[test]
        fn prop_leading_dot_normalizes(arcs in proptest::collection::vec(any::<u32>(), 1..20)) {
            let text = arcs.iter().map(u32::to_string).collect::<Vec<_>>().join(".");
            let plain = Oid::parse(&text).unwrap();
            let dotted = Oid::parse(&format!(".{}", text)).unwrap();
            prop_assert_eq!(&plain, &dotted);
            prop_assert_eq!(plain.arcs(), arcs.as_slice());
        }

        #[test]
        fn prop_order_matches_tuple_order(
            a in proptest::collection::vec(0u32..5000, 0..8),
            b in proptest::collection::vec(0u32..5000, 0..8),
        ) {
            let oa = Oid::from_slice(&a);
            let ob = Oid::from_slice(&b);
            prop_assert_eq!(oa.cmp(&ob), a.cmp(&b));
        }

        #[test]
        fn prop_ber_roundtrip(tail in proptest::collection::vec(any::<u32>(), 0..20), first in 0u32..3, second in 0u32..40) {
            let mut arcs = vec![first, second];
            arcs.extend(tail);
            let oid = Oid::from_slice(&arcs);
            prop_assert_eq!(Oid::from_ber(&oid.to_ber_smallvec()).unwrap(), oid);
        }
    }
}
