//! Common test fixtures and constants.

use std::net::SocketAddr;
use std::sync::{Arc, RwLock};

use async_snmp_agent::codec::{BerCodec, Codec};
use async_snmp_agent::message::{DEFAULT_MSG_MAX_SIZE, MsgFlags, V3Header};
use async_snmp_agent::v3::{AuthProtocol, EngineId, PrivProtocol, UsmSecurityParams, UsmUser};
use async_snmp_agent::{
    Agent, Message, Oid, Pdu, Scope, SecurityLevel, Value, ValueType, VariableControl, VarBind,
    Version, oid,
};
use bytes::Bytes;

// =============================================================================
// Standard system MIB OIDs (1.3.6.1.2.1.1.*)
// =============================================================================

pub fn sys_descr() -> Oid {
    oid!(1, 3, 6, 1, 2, 1, 1, 1, 0)
}
pub fn sys_object_id() -> Oid {
    oid!(1, 3, 6, 1, 2, 1, 1, 2, 0)
}
pub fn sys_uptime() -> Oid {
    oid!(1, 3, 6, 1, 2, 1, 1, 3, 0)
}
pub fn sys_contact() -> Oid {
    oid!(1, 3, 6, 1, 2, 1, 1, 4, 0)
}
pub fn sys_name() -> Oid {
    oid!(1, 3, 6, 1, 2, 1, 1, 5, 0)
}
pub fn sys_location() -> Oid {
    oid!(1, 3, 6, 1, 2, 1, 1, 6, 0)
}
pub fn sys_services() -> Oid {
    oid!(1, 3, 6, 1, 2, 1, 1, 7, 0)
}

/// System subtree root: 1.3.6.1.2.1.1
pub fn system_subtree() -> Oid {
    oid!(1, 3, 6, 1, 2, 1, 1)
}

/// Nonexistent OID for testing noSuchName
pub fn nonexistent_oid() -> Oid {
    oid!(1, 3, 6, 1, 99, 99, 99, 0)
}

// =============================================================================
// Credentials
// =============================================================================

pub const AUTH_PASSWORD: &str = "authpass123";
pub const PRIV_PASSWORD: &str = "privpass123";

/// Read-only community, served by the system scope.
pub const COMMUNITY_RO: &str = "public";
/// Read-write community, served by the admin scope.
pub const COMMUNITY_RW: &str = "private";

/// SNMPv3 context of the admin scope.
pub const ADMIN_CONTEXT: &str = "admin";

pub const ENGINE_ID: &[u8] = b"\x80\x00\x1f\x88\x04agent-test";
pub const ENGINE_BOOTS: u32 = 4;
pub const ENGINE_TIME: u32 = 3600;

pub mod users {
    pub const NOAUTH_USER: &str = "noauth_user";
    pub const AUTHSHA256_USER: &str = "authsha256_user";
    pub const PRIVAES128_USER: &str = "privaes128_user";
    pub const PRIVDES_USER: &str = "privdes_user";
}

pub fn noauth_user() -> UsmUser {
    UsmUser::new(users::NOAUTH_USER)
}

pub fn auth_user() -> UsmUser {
    UsmUser::new(users::AUTHSHA256_USER).auth(AuthProtocol::Sha256, AUTH_PASSWORD)
}

pub fn aes_user() -> UsmUser {
    UsmUser::new(users::PRIVAES128_USER)
        .auth(AuthProtocol::Sha1, AUTH_PASSWORD)
        .privacy(PrivProtocol::Aes128, PRIV_PASSWORD)
}

pub fn des_user() -> UsmUser {
    UsmUser::new(users::PRIVDES_USER)
        .auth(AuthProtocol::Md5, AUTH_PASSWORD)
        .privacy(PrivProtocol::Des, PRIV_PASSWORD)
}

// =============================================================================
// Agent
// =============================================================================

/// The system group, with `sysContact.0` writable in memory.
pub fn system_variables() -> Vec<VariableControl> {
    let contact = Arc::new(RwLock::new(String::from("ops@example.com")));
    let (r, w) = (contact.clone(), contact);
    vec![
        VariableControl::builder(sys_descr(), ValueType::OctetString)
            .constant(Value::OctetString("integration agent".into()))
            .build(),
        VariableControl::builder(sys_object_id(), ValueType::ObjectIdentifier)
            .constant(Value::ObjectIdentifier(oid!(1, 3, 6, 1, 4, 1, 99999)))
            .build(),
        VariableControl::builder(sys_uptime(), ValueType::TimeTicks)
            .constant(Value::TimeTicks(12345))
            .build(),
        VariableControl::builder(sys_contact(), ValueType::OctetString)
            .on_read(move || Ok(Value::OctetString(r.read().map_err(|e| e.to_string())?.clone().into())))
            .on_write(move |value| {
                let text = value.as_bytes().ok_or("expected a string")?;
                *w.write().map_err(|e| e.to_string())? = String::from_utf8_lossy(text).into_owned();
                Ok(())
            })
            .build(),
        VariableControl::builder(sys_name(), ValueType::OctetString)
            .constant(Value::OctetString("node-1".into()))
            .build(),
        VariableControl::builder(sys_location(), ValueType::OctetString)
            .constant(Value::OctetString("rack 4".into()))
            .build(),
        VariableControl::builder(sys_services(), ValueType::Integer)
            .constant(Value::Integer(72))
            .build(),
    ]
}

/// Agent with a read-only system scope (`public`, empty context) and an
/// admin scope (`private`, context `admin`) holding `extra` variables.
pub fn test_agent(extra: Vec<VariableControl>) -> Agent {
    Agent::builder()
        .scope(
            Scope::builder()
                .routing_key(COMMUNITY_RO)
                .routing_key("")
                .variables(system_variables()),
        )
        .scope(
            Scope::builder()
                .routing_key(COMMUNITY_RW)
                .routing_key(ADMIN_CONTEXT)
                .variables(extra),
        )
        .user(noauth_user())
        .user(auth_user())
        .user(aes_user())
        .user(des_user())
        .engine_id(EngineId::from_raw(ENGINE_ID))
        .engine_boots(ENGINE_BOOTS)
        .time_source(|| ENGINE_TIME)
        .prepare()
        .unwrap()
}

pub fn manager() -> SocketAddr {
    "192.0.2.10:50161".parse().unwrap()
}

// =============================================================================
// Requests
// =============================================================================

pub fn nulls(oids: &[Oid]) -> Vec<VarBind> {
    oids.iter().cloned().map(VarBind::null).collect()
}

pub fn community_request(version: Version, community: &str, pdu: Pdu) -> Bytes {
    BerCodec
        .encode(&Message::community(version, community.to_string(), pdu), None)
        .unwrap()
}

/// An SNMPv3 request from `user` at the highest level its keys allow.
pub fn v3_request(user: &UsmUser, context: &str, msg_id: i32, pdu: Pdu) -> Bytes {
    v3_request_sized(user, context, msg_id, DEFAULT_MSG_MAX_SIZE, pdu)
}

/// Like [`v3_request`], advertising `max_size` as msgMaxSize.
pub fn v3_request_sized(
    user: &UsmUser,
    context: &str,
    msg_id: i32,
    max_size: i32,
    pdu: Pdu,
) -> Bytes {
    let level = user.security_level();
    let msg = Message::v3(
        V3Header {
            msg_id,
            max_size,
            flags: MsgFlags::for_level(level, true),
        },
        UsmSecurityParams {
            engine_id: Bytes::from_static(ENGINE_ID),
            engine_boots: ENGINE_BOOTS,
            engine_time: ENGINE_TIME,
            user_name: user.name().clone(),
            auth_params: Bytes::new(),
            priv_params: Bytes::from_static(&[0, 0, 0, 1, 0, 0, 0, 2]),
        },
        Bytes::from_static(ENGINE_ID),
        context.to_string(),
        pdu,
    );
    let keys = (level > SecurityLevel::NoAuthNoPriv).then_some(user);
    BerCodec.encode(&msg, keys).unwrap()
}

pub fn decode(data: &Bytes) -> Message {
    BerCodec.decode(data, None).unwrap()
}

pub fn decode_as(data: &Bytes, user: &UsmUser) -> Message {
    BerCodec.decode(data, Some(user)).unwrap()
}
