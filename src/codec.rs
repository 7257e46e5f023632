//! Message codec.
//!
//! The dispatcher only talks to a [`Codec`]: it hands over raw datagrams plus
//! the credentials it has resolved so far, and gets messages back. [`BerCodec`]
//! is the BER/USM implementation used on the wire.
//!
//! Decoding an SNMPv3 message needs the sender's credentials, which are only
//! known after the security parameters are parsed. A failed decode therefore
//! returns whatever security parameters it got to in [`DecodeFailure`], so the
//! caller can look the user up and try again.

use bytes::Bytes;

use crate::ber::{Decoder, EncodeBuf, tag};
use crate::error::{AuthErrorKind, DecodeErrorKind, EncodeErrorKind, Error, Result};
use crate::message::{
    MIN_MSG_MAX_SIZE, Message, MsgFlags, SecurityLevel, USM_SECURITY_MODEL, V3Header,
};
use crate::pdu::Pdu;
use crate::v3::privacy::{self, IvInputs};
use crate::v3::{UsmSecurityParams, UsmUser};
use crate::version::Version;

/// A decode error, with the USM parameters parsed before it happened.
#[derive(Debug, thiserror::Error)]
#[error("{error}")]
pub struct DecodeFailure {
    #[source]
    pub error: Error,
    pub partial: Option<UsmSecurityParams>,
}

/// Outcome of [`Codec::decode`].
pub type DecodeResult = std::result::Result<Message, DecodeFailure>;

impl From<Error> for DecodeFailure {
    fn from(error: Error) -> Self {
        Self {
            error,
            partial: None,
        }
    }
}

/// Turns datagrams into messages and back.
pub trait Codec: Send + Sync {
    /// Decode a datagram. `user` supplies the keys for authenticated or
    /// encrypted SNMPv3 messages; `None` decodes only unauthenticated ones.
    fn decode(&self, data: &Bytes, user: Option<&UsmUser>) -> DecodeResult;

    /// Encode a message, signing and encrypting it with `user` as its flags ask.
    fn encode(&self, message: &Message, user: Option<&UsmUser>) -> Result<Bytes>;
}

/// BER codec for SNMPv1, SNMPv2c and SNMPv3/USM.
#[derive(Debug, Clone, Copy, Default)]
pub struct BerCodec;

impl Codec for BerCodec {
    fn decode(&self, data: &Bytes, user: Option<&UsmUser>) -> DecodeResult {
        let mut outer = Decoder::new(data.clone());
        let mut msg = outer.read_sequence()?;
        let raw_version = msg.read_integer()?;
        let version = Version::from_i32(raw_version).ok_or(Error::UnsupportedVersion {
            version: raw_version,
        })?;

        if version.uses_community() {
            let community = msg.read_octet_string()?;
            let (pdu, trap_v1) = Pdu::decode(&mut msg)?;
            return Ok(Message {
                trap_v1,
                ..Message::community(version, community, pdu)
            });
        }

        let header = decode_header(&mut msg)?;
        let (sec_offset, sec_bytes) = msg.read_octet_string_at()?;
        let (security, auth_offset) = UsmSecurityParams::decode_at(sec_bytes, sec_offset)?;

        decode_v3_body(data, &mut msg, header, &security, auth_offset, user).map_err(|error| {
            DecodeFailure {
                error,
                partial: Some(security),
            }
        })
    }

    fn encode(&self, message: &Message, user: Option<&UsmUser>) -> Result<Bytes> {
        if message.version.uses_community() {
            let mut buf = EncodeBuf::new();
            buf.push_sequence(|buf| {
                message.pdu.encode(buf, message.trap_v1.as_ref());
                buf.push_octet_string(&message.community);
                buf.push_integer(message.version.as_i32());
            });
            return Ok(buf.finish());
        }
        encode_v3(message, user)
    }
}

fn decode_header(msg: &mut Decoder) -> Result<V3Header> {
    let mut global = msg.read_sequence()?;
    let msg_id = global.read_integer()?;
    let max_size = global.read_integer()?;
    if max_size < MIN_MSG_MAX_SIZE {
        return Err(Error::decode(
            global.offset(),
            DecodeErrorKind::MsgMaxSizeTooSmall {
                value: max_size,
                minimum: MIN_MSG_MAX_SIZE,
            },
        ));
    }
    let flags_offset = global.offset();
    let raw_flags = global.read_octet_string()?;
    let flags = match raw_flags.as_ref() {
        [b] => MsgFlags::from_byte(*b),
        _ => return Err(Error::decode(flags_offset, DecodeErrorKind::InvalidMsgFlags)),
    };
    if flags.privacy && !flags.auth {
        return Err(Error::decode(flags_offset, DecodeErrorKind::InvalidMsgFlags));
    }
    let model_offset = global.offset();
    let model = global.read_integer()?;
    if model != USM_SECURITY_MODEL {
        return Err(Error::decode(
            model_offset,
            DecodeErrorKind::UnknownSecurityModel(model),
        ));
    }
    Ok(V3Header {
        msg_id,
        max_size,
        flags,
    })
}

fn decode_v3_body(
    data: &Bytes,
    msg: &mut Decoder,
    header: V3Header,
    security: &UsmSecurityParams,
    auth_offset: usize,
    user: Option<&UsmUser>,
) -> Result<Message> {
    let level = header.flags.security_level();
    let user = match level {
        SecurityLevel::NoAuthNoPriv => None,
        _ => Some(authorize(user, security, level)?),
    };

    if let Some(user) = user {
        let key = user.auth_key(&security.engine_id)?;
        let mut signed = data.to_vec();
        let end = auth_offset + security.auth_params.len();
        signed[auth_offset..end].fill(0);
        key.verify(&signed, &security.auth_params)?;
    }

    let data_offset = msg.offset();
    let mut scoped = match (header.flags.privacy, msg.peek_tag()) {
        (true, Some(tag::universal::OCTET_STRING)) => {
            let (protocol, key) = user
                .ok_or_else(|| Error::auth(AuthErrorKind::NoCredentials))?
                .priv_key(&security.engine_id)?;
            let ciphertext = msg.read_octet_string()?;
            let plaintext = privacy::decrypt(
                protocol,
                &key,
                IvInputs {
                    engine_boots: security.engine_boots,
                    engine_time: security.engine_time,
                    salt: &security.priv_params,
                },
                &ciphertext,
            )?;
            // DES leaves block padding after the SEQUENCE; read_sequence stops at its length.
            Decoder::new(Bytes::from(plaintext)).read_sequence()?
        }
        (true, _) => {
            return Err(Error::decode(
                data_offset,
                DecodeErrorKind::ExpectedEncryption,
            ));
        }
        (false, Some(tag::universal::OCTET_STRING)) => {
            return Err(Error::decode(
                data_offset,
                DecodeErrorKind::UnexpectedEncryption,
            ));
        }
        (false, _) => msg.read_sequence()?,
    };

    let context_engine_id = scoped.read_octet_string()?;
    let context_name = scoped.read_octet_string()?;
    let (pdu, trap_v1) = Pdu::decode(&mut scoped)?;

    Ok(Message {
        trap_v1,
        ..Message::v3(
            header,
            security.clone(),
            context_engine_id,
            context_name,
            pdu,
        )
    })
}

/// The credentials must belong to the sender and cover the message's level.
fn authorize<'a>(
    user: Option<&'a UsmUser>,
    security: &UsmSecurityParams,
    level: SecurityLevel,
) -> Result<&'a UsmUser> {
    let user = user.ok_or_else(|| Error::auth(AuthErrorKind::NoCredentials))?;
    if user.name() != &security.user_name {
        return Err(Error::auth(AuthErrorKind::UserMismatch));
    }
    if user.security_level() < level {
        return Err(Error::auth(AuthErrorKind::UnsupportedSecurityLevel));
    }
    Ok(user)
}

fn encode_v3(message: &Message, user: Option<&UsmUser>) -> Result<Bytes> {
    let (header, mut security) = match (message.header, message.security.clone()) {
        (Some(header), Some(security)) => (header, security),
        _ => return Err(Error::encode(EncodeErrorKind::MissingSecurityParams)),
    };
    let level = header.flags.security_level();
    let user = match level {
        SecurityLevel::NoAuthNoPriv => None,
        _ => Some(
            user.filter(|u| u.security_level() >= level)
                .ok_or_else(|| Error::encode(EncodeErrorKind::MissingCredentials))?,
        ),
    };

    let mut scoped = EncodeBuf::new();
    scoped.push_sequence(|buf| {
        message.pdu.encode(buf, message.trap_v1.as_ref());
        buf.push_octet_string(&message.context_name);
        buf.push_octet_string(&message.context_engine_id);
    });
    let scoped = scoped.finish();

    let encrypted = match (header.flags.privacy, user) {
        (true, Some(user)) => {
            let (protocol, key) = user.priv_key(&security.engine_id)?;
            Some(privacy::encrypt(
                protocol,
                &key,
                IvInputs {
                    engine_boots: security.engine_boots,
                    engine_time: security.engine_time,
                    salt: &security.priv_params,
                },
                &scoped,
            )?)
        }
        _ => None,
    };

    let auth = match user {
        Some(user) => {
            let key = user.auth_key(&security.engine_id)?;
            let mac_len = user
                .auth_protocol()
                .map(|p| p.mac_len())
                .ok_or_else(|| Error::encode(EncodeErrorKind::MissingCredentials))?;
            security.auth_params = Bytes::from(vec![0u8; mac_len]);
            Some(key)
        }
        None => None,
    };

    let mut buf = EncodeBuf::with_capacity(scoped.len() + 128);
    buf.push_sequence(|buf| {
        match &encrypted {
            Some(ciphertext) => buf.push_octet_string(ciphertext),
            None => buf.push_bytes(&scoped),
        }
        buf.push_octet_string(&security.encode());
        buf.push_sequence(|buf| {
            buf.push_integer(USM_SECURITY_MODEL);
            buf.push_octet_string(&[header.flags.to_byte()]);
            buf.push_integer(header.max_size);
            buf.push_integer(header.msg_id);
        });
        buf.push_integer(Version::V3.as_i32());
    });
    let encoded = buf.finish();

    let Some(key) = auth else {
        return Ok(encoded);
    };
    let offset = locate_auth_params(&encoded)?;
    let mac = key.sign(&encoded)?;
    let mut signed = encoded.to_vec();
    signed
        .get_mut(offset..offset + mac.len())
        .ok_or_else(|| Error::encode(EncodeErrorKind::MissingAuthParams))?
        .copy_from_slice(&mac);
    Ok(Bytes::from(signed))
}

/// Absolute offset of msgAuthenticationParameters in an encoded SNMPv3 message.
fn locate_auth_params(data: &Bytes) -> Result<usize> {
    let mut outer = Decoder::new(data.clone());
    let mut msg = outer.read_sequence()?;
    msg.read_integer()?;
    msg.read_sequence()?;
    let (offset, params) = msg.read_octet_string_at()?;
    UsmSecurityParams::decode_at(params, offset)
        .map(|(_, auth_offset)| auth_offset)
        .map_err(|_| Error::encode(EncodeErrorKind::MissingAuthParams))
}
