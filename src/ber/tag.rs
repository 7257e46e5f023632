//! BER tags used on the SNMP wire.
//!
//! A tag octet packs the class (bits 7-6), the constructed flag (bit 5) and
//! the tag number (bits 4-0). SNMP never needs the long tag form.

/// Tag class bits (bits 7-6)
pub mod class {
    pub const UNIVERSAL: u8 = 0x00;
    pub const APPLICATION: u8 = 0x40;
    pub const CONTEXT_SPECIFIC: u8 = 0x80;
}

/// Constructed bit (bit 5)
pub const CONSTRUCTED: u8 = 0x20;

/// Universal tags
pub mod universal {
    pub const INTEGER: u8 = 0x02;
    pub const OCTET_STRING: u8 = 0x04;
    /// Constructed OCTET STRING; rejected on decode.
    pub const OCTET_STRING_CONSTRUCTED: u8 = 0x24;
    pub const NULL: u8 = 0x05;
    pub const OBJECT_IDENTIFIER: u8 = 0x06;
    pub const SEQUENCE: u8 = 0x30;
}

/// Application tags (SNMPv2-SMI types)
pub mod application {
    use super::class::APPLICATION;

    pub const IP_ADDRESS: u8 = APPLICATION; // 0x40
    pub const COUNTER32: u8 = APPLICATION | 0x01; // 0x41
    pub const GAUGE32: u8 = APPLICATION | 0x02; // 0x42, also Unsigned32
    pub const TIMETICKS: u8 = APPLICATION | 0x03; // 0x43
    pub const OPAQUE: u8 = APPLICATION | 0x04; // 0x44
    pub const COUNTER64: u8 = APPLICATION | 0x06; // 0x46
}

/// Context-specific primitive tags: the RFC 3416 exception markers
pub mod context {
    use super::class::CONTEXT_SPECIFIC;

    pub const NO_SUCH_OBJECT: u8 = CONTEXT_SPECIFIC; // 0x80
    pub const NO_SUCH_INSTANCE: u8 = CONTEXT_SPECIFIC | 0x01; // 0x81
    pub const END_OF_MIB_VIEW: u8 = CONTEXT_SPECIFIC | 0x02; // 0x82
}

/// PDU tags (context-specific, constructed)
pub mod pdu {
    use super::CONSTRUCTED;
    use super::class::CONTEXT_SPECIFIC;

    pub const GET_REQUEST: u8 = CONTEXT_SPECIFIC | CONSTRUCTED; // 0xA0
    pub const GET_NEXT_REQUEST: u8 = CONTEXT_SPECIFIC | CONSTRUCTED | 0x01; // 0xA1
    pub const RESPONSE: u8 = CONTEXT_SPECIFIC | CONSTRUCTED | 0x02; // 0xA2
    pub const SET_REQUEST: u8 = CONTEXT_SPECIFIC | CONSTRUCTED | 0x03; // 0xA3
    pub const TRAP_V1: u8 = CONTEXT_SPECIFIC | CONSTRUCTED | 0x04; // 0xA4
    pub const GET_BULK_REQUEST: u8 = CONTEXT_SPECIFIC | CONSTRUCTED | 0x05; // 0xA5
    pub const INFORM_REQUEST: u8 = CONTEXT_SPECIFIC | CONSTRUCTED | 0x06; // 0xA6
    pub const TRAP_V2: u8 = CONTEXT_SPECIFIC | CONSTRUCTED | 0x07; // 0xA7
    pub const REPORT: u8 = CONTEXT_SPECIFIC | CONSTRUCTED | 0x08; // 0xA8
}
