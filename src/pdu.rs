//! Protocol data units.
//!
//! [`Pdu`] is the common shape of every SNMP operation. GetBulk reuses the
//! error-status and error-index slots for non-repeaters and max-repetitions,
//! as on the wire. The SNMPv1 Trap-PDU has its own header, kept separately in
//! [`TrapV1Header`].

use crate::ber::{Decoder, EncodeBuf, tag};
use crate::error::{DecodeErrorKind, Error, ErrorStatus, Result};
use crate::oid::Oid;
use crate::varbind::{VarBind, decode_varbind_list, encode_varbind_list};

/// PDU type, named after its BER tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PduType {
    GetRequest,
    GetNextRequest,
    Response,
    SetRequest,
    TrapV1,
    GetBulkRequest,
    InformRequest,
    TrapV2,
    Report,
}

impl PduType {
    pub const fn tag(self) -> u8 {
        match self {
            Self::GetRequest => tag::pdu::GET_REQUEST,
            Self::GetNextRequest => tag::pdu::GET_NEXT_REQUEST,
            Self::Response => tag::pdu::RESPONSE,
            Self::SetRequest => tag::pdu::SET_REQUEST,
            Self::TrapV1 => tag::pdu::TRAP_V1,
            Self::GetBulkRequest => tag::pdu::GET_BULK_REQUEST,
            Self::InformRequest => tag::pdu::INFORM_REQUEST,
            Self::TrapV2 => tag::pdu::TRAP_V2,
            Self::Report => tag::pdu::REPORT,
        }
    }

    pub const fn from_tag(tag: u8) -> Option<Self> {
        Some(match tag {
            tag::pdu::GET_REQUEST => Self::GetRequest,
            tag::pdu::GET_NEXT_REQUEST => Self::GetNextRequest,
            tag::pdu::RESPONSE => Self::Response,
            tag::pdu::SET_REQUEST => Self::SetRequest,
            tag::pdu::TRAP_V1 => Self::TrapV1,
            tag::pdu::GET_BULK_REQUEST => Self::GetBulkRequest,
            tag::pdu::INFORM_REQUEST => Self::InformRequest,
            tag::pdu::TRAP_V2 => Self::TrapV2,
            tag::pdu::REPORT => Self::Report,
            _ => return None,
        })
    }

    /// Trap or inform.
    pub const fn is_notification(self) -> bool {
        matches!(self, Self::TrapV1 | Self::TrapV2 | Self::InformRequest)
    }
}

impl std::fmt::Display for PduType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::GetRequest => "GetRequest",
            Self::GetNextRequest => "GetNextRequest",
            Self::Response => "Response",
            Self::SetRequest => "SetRequest",
            Self::TrapV1 => "Trap",
            Self::GetBulkRequest => "GetBulkRequest",
            Self::InformRequest => "InformRequest",
            Self::TrapV2 => "SNMPv2-Trap",
            Self::Report => "Report",
        };
        f.write_str(name)
    }
}

/// A PDU.
#[derive(Debug, Clone, PartialEq)]
pub struct Pdu {
    pub pdu_type: PduType,
    pub request_id: i32,
    /// Error status, or non-repeaters for GetBulk.
    pub error_status: i32,
    /// Error index, or max-repetitions for GetBulk.
    pub error_index: i32,
    pub varbinds: Vec<VarBind>,
}

impl Pdu {
    pub fn new(pdu_type: PduType, request_id: i32, varbinds: Vec<VarBind>) -> Self {
        Self {
            pdu_type,
            request_id,
            error_status: 0,
            error_index: 0,
            varbinds,
        }
    }

    pub fn get_bulk(
        request_id: i32,
        non_repeaters: i32,
        max_repetitions: i32,
        varbinds: Vec<VarBind>,
    ) -> Self {
        Self {
            pdu_type: PduType::GetBulkRequest,
            request_id,
            error_status: non_repeaters,
            error_index: max_repetitions,
            varbinds,
        }
    }

    /// Response PDU answering this one.
    pub fn to_response(&self, varbinds: Vec<VarBind>) -> Self {
        Self::new(PduType::Response, self.request_id, varbinds)
    }

    /// GetBulk non-repeaters; negative values count as zero.
    pub fn non_repeaters(&self) -> usize {
        self.error_status.max(0) as usize
    }

    /// GetBulk max-repetitions; negative values count as zero.
    pub fn max_repetitions(&self) -> usize {
        self.error_index.max(0) as usize
    }

    pub fn status(&self) -> ErrorStatus {
        ErrorStatus::from_i32(self.error_status)
    }

    pub fn set_error(&mut self, status: ErrorStatus, index: i32) {
        self.error_status = status.as_i32();
        self.error_index = index;
    }

    /// Encode with its PDU tag. A TrapV1 PDU needs its header.
    pub fn encode(&self, buf: &mut EncodeBuf, trap: Option<&TrapV1Header>) {
        buf.push_constructed(self.pdu_type.tag(), |buf| {
            encode_varbind_list(buf, &self.varbinds);
            if self.pdu_type == PduType::TrapV1 {
                trap.cloned().unwrap_or_default().encode(buf);
            } else {
                buf.push_integer(self.error_index);
                buf.push_integer(self.error_status);
                buf.push_integer(self.request_id);
            }
        });
    }

    /// Decode a PDU, returning the Trap-PDU header for SNMPv1 traps.
    pub fn decode(decoder: &mut Decoder) -> Result<(Self, Option<TrapV1Header>)> {
        let offset = decoder.offset();
        let raw = decoder
            .peek_tag()
            .ok_or_else(|| Error::decode(offset, DecodeErrorKind::TruncatedData))?;
        let pdu_type = PduType::from_tag(raw)
            .ok_or_else(|| Error::decode(offset, DecodeErrorKind::UnknownPduType(raw)))?;
        let mut body = decoder.read_constructed(raw)?;

        if pdu_type == PduType::TrapV1 {
            let header = TrapV1Header::decode(&mut body)?;
            let varbinds = decode_varbind_list(&mut body)?;
            return Ok((Self::new(pdu_type, 0, varbinds), Some(header)));
        }

        let request_id = body.read_integer()?;
        let error_status = body.read_integer()?;
        let error_index = body.read_integer()?;
        let varbinds = decode_varbind_list(&mut body)?;
        Ok((
            Self {
                pdu_type,
                request_id,
                error_status,
                error_index,
                varbinds,
            },
            None,
        ))
    }
}

/// Header fields of an SNMPv1 Trap-PDU (RFC 1157).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrapV1Header {
    pub enterprise: Oid,
    pub agent_addr: [u8; 4],
    pub generic_trap: i32,
    pub specific_trap: i32,
    pub time_stamp: u32,
}

impl TrapV1Header {
    fn encode(&self, buf: &mut EncodeBuf) {
        buf.push_unsigned32(tag::application::TIMETICKS, self.time_stamp);
        buf.push_integer(self.specific_trap);
        buf.push_integer(self.generic_trap);
        buf.push_ip_address(self.agent_addr);
        buf.push_oid(&self.enterprise);
    }

    fn decode(decoder: &mut Decoder) -> Result<Self> {
        Ok(Self {
            enterprise: decoder.read_oid()?,
            agent_addr: decoder.read_ip_address()?,
            generic_trap: decoder.read_integer()?,
            specific_trap: decoder.read_integer()?,
            time_stamp: decoder.read_timeticks()?,
        })
    }
}
