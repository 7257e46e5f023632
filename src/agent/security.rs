//! SNMPv3 security negotiation and reply parameters.
//!
//! The USM user a message belongs to is named inside the message, so decoding
//! is done in two passes: first without credentials, then, if that fails,
//! with the credentials of the user the first pass found.

use std::sync::atomic::Ordering;

use bytes::Bytes;

use crate::error::{EncodeErrorKind, Error, ErrorStatus, Result};
use crate::message::{DEFAULT_MSG_MAX_SIZE, Message, MsgFlags, SecurityLevel, V3Header};
use crate::oid::Oid;
use crate::pdu::{Pdu, PduType};
use crate::v3::{UsmSecurityParams, UsmUser, privacy};
use crate::value::Value;
use crate::varbind::VarBind;
use crate::version::Version;

use super::Agent;

/// usmStatsUnknownEngineIDs.0
const USM_STATS_UNKNOWN_ENGINE_IDS: &[u32] = &[1, 3, 6, 1, 6, 3, 15, 1, 1, 4, 0];

pub(super) enum Negotiated<'a> {
    /// An SNMPv3 request without bindings, sent to learn our engine id.
    Discovery(Message),
    /// A decoded request and the registered user it belongs to, if any.
    Request {
        message: Message,
        user: Option<&'a UsmUser>,
    },
}

impl Agent {
    pub(super) fn negotiate(&self, data: &Bytes) -> Result<Negotiated<'_>> {
        let codec = &self.inner.codec;
        match codec.decode(data, None) {
            Ok(message) => {
                if message.version == Version::V3 && message.pdu.varbinds.is_empty() {
                    return Ok(Negotiated::Discovery(message));
                }
                let user = self.user(&message.user_name());
                Ok(Negotiated::Request { message, user })
            }
            Err(failure) => {
                let Some(partial) = failure.partial else {
                    tracing::debug!(snmp.error = %failure.error, "dropping undecodable datagram");
                    return Err(failure.error);
                };
                let Some(user) = self.user(&partial.user_name) else {
                    tracing::debug!(
                        snmp.user = %partial.user_name_lossy(),
                        snmp.error = %failure.error,
                        "dropping message from unknown user"
                    );
                    return Err(Error::NoPermission {
                        name: partial.user_name_lossy().into(),
                    });
                };
                let message = codec.decode(data, Some(user)).map_err(|second| {
                    tracing::debug!(
                        snmp.user = %user.name_lossy(),
                        snmp.error = %second.error,
                        "dropping message that fails authentication"
                    );
                    Error::unsupported_packet_data(second.error)
                })?;
                Ok(Negotiated::Request {
                    message,
                    user: Some(user),
                })
            }
        }
    }

    /// Report telling a discovering manager our engine id, boots and time.
    pub(super) fn discovery_report(&self, discovery: &Message) -> Result<Bytes> {
        let msg_id = discovery.header.map(|h| h.msg_id).unwrap_or_default();
        let count = self.inner.unknown_engine_ids.fetch_add(1, Ordering::Relaxed) + 1;
        let pdu = Pdu::new(
            PduType::Report,
            discovery.pdu.request_id,
            vec![VarBind::new(
                Oid::from_slice(USM_STATS_UNKNOWN_ENGINE_IDS),
                Value::Counter32(count),
            )],
        );
        let report = Message::v3(
            V3Header {
                msg_id,
                max_size: DEFAULT_MSG_MAX_SIZE,
                flags: MsgFlags::for_level(SecurityLevel::NoAuthNoPriv, false),
            },
            self.fresh_params(Bytes::new()),
            self.inner.engine_id.as_bytes().clone(),
            discovery.context_name.clone(),
            pdu,
        );
        self.inner.codec.encode(&report, None)
    }

    /// Encode `pdu` as the reply to `request`, within the size the sender
    /// accepts.
    ///
    /// An oversized GetBulk reply loses bindings from the end until it fits
    /// (RFC 3416 4.2.3). Any other oversized reply becomes `tooBig` with no
    /// bindings.
    pub(super) fn encode_reply(
        &self,
        request: &Message,
        user: Option<&UsmUser>,
        pdu: Pdu,
    ) -> Result<Bytes> {
        let limit = request.reply_size_limit();
        let encoded = self.encode_pdu(request, user, &pdu)?;
        if encoded.len() <= limit {
            return Ok(encoded);
        }
        tracing::debug!(
            snmp.request_id = pdu.request_id,
            snmp.bytes = encoded.len(),
            snmp.limit = limit,
            "reply exceeds size limit"
        );

        if request.pdu.pdu_type == PduType::GetBulkRequest
            && let Some(fitted) = self.fit_bulk(request, user, pdu, limit)?
        {
            return Ok(fitted);
        }

        let mut too_big = request.pdu.to_response(Vec::new());
        too_big.set_error(ErrorStatus::TooBig, 0);
        let encoded = self.encode_pdu(request, user, &too_big)?;
        if encoded.len() > limit {
            return Err(Error::encode(EncodeErrorKind::MessageTooLarge {
                size: encoded.len(),
                limit,
            }));
        }
        Ok(encoded)
    }

    /// Longest prefix of the bulk reply's bindings that fits in `limit`, or
    /// `None` when not even one binding does.
    fn fit_bulk(
        &self,
        request: &Message,
        user: Option<&UsmUser>,
        mut pdu: Pdu,
        limit: usize,
    ) -> Result<Option<Bytes>> {
        let varbinds = std::mem::take(&mut pdu.varbinds);
        let (mut fits, mut over) = (0, varbinds.len());
        let mut best = None;
        while over - fits > 1 {
            let mid = fits + (over - fits) / 2;
            pdu.varbinds = varbinds[..mid].to_vec();
            let encoded = self.encode_pdu(request, user, &pdu)?;
            if encoded.len() <= limit {
                fits = mid;
                best = Some(encoded);
            } else {
                over = mid;
            }
        }
        if best.is_some() {
            tracing::debug!(
                snmp.request_id = pdu.request_id,
                snmp.varbinds = fits,
                snmp.dropped = varbinds.len() - fits,
                "truncated bulk reply"
            );
        }
        Ok(best)
    }

    fn encode_pdu(&self, request: &Message, user: Option<&UsmUser>, pdu: &Pdu) -> Result<Bytes> {
        let mut reply = request.with_pdu(pdu.clone());
        if let Some(header) = request.header {
            let level = header.flags.security_level();
            reply.header = Some(V3Header {
                msg_id: header.msg_id,
                max_size: DEFAULT_MSG_MAX_SIZE,
                flags: MsgFlags::for_level(level, false),
            });
            reply.security = Some(self.reply_params(request, user, level)?);
        }
        self.inner.codec.encode(&reply, user)
    }

    /// Security parameters for a reply: the request's user with our current
    /// engine identity and, for authPriv, a fresh salt. The registered user
    /// is only read.
    fn reply_params(
        &self,
        request: &Message,
        user: Option<&UsmUser>,
        level: SecurityLevel,
    ) -> Result<UsmSecurityParams> {
        let mut params = self.fresh_params(request.user_name());
        if level == SecurityLevel::AuthPriv
            && let Some(protocol) = user.and_then(UsmUser::priv_protocol)
        {
            params.priv_params = Bytes::from(privacy::fresh_salt(protocol)?);
        }
        Ok(params)
    }

    fn fresh_params(&self, user_name: Bytes) -> UsmSecurityParams {
        UsmSecurityParams {
            engine_id: self.inner.engine_id.as_bytes().clone(),
            engine_boots: self.inner.engine_boots,
            engine_time: self.engine_time(),
            user_name,
            auth_params: Bytes::new(),
            priv_params: Bytes::new(),
        }
    }
}
