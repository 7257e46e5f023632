//! SNMP agent: routing and security negotiation.
//!
//! An [`Agent`] owns a set of [`Scope`]s and the SNMPv3 engine identity. For
//! each datagram it negotiates the security context, picks the scope from the
//! community (v1/v2c) or context name (v3), lets the scope serve the PDU, and
//! encodes the reply.
//!
//! # Example
//!
//! ```rust
//! use async_snmp_agent::agent::{Agent, Scope};
//! use async_snmp_agent::handler::VariableControl;
//! use async_snmp_agent::v3::{AuthProtocol, UsmUser};
//! use async_snmp_agent::{Value, ValueType, oid};
//!
//! let uptime = VariableControl::builder(oid!(1, 3, 6, 1, 2, 1, 1, 3, 0), ValueType::TimeTicks)
//!     .on_read(|| Ok(Value::TimeTicks(4200)))
//!     .build();
//!
//! let agent = Agent::builder()
//!     .scope(Scope::builder().routing_key("public").variable(uptime))
//!     .user(UsmUser::new("monitor").auth(AuthProtocol::Sha256, "authpassword"))
//!     .engine_boots(3)
//!     .prepare()
//!     .unwrap();
//! assert_eq!(agent.engine_boots(), 3);
//! ```
//!
//! # Error replies
//!
//! Once a request has been decoded, failures are answered with a response
//! carrying the request's bindings and an error status:
//!
//! | Failure | Error status |
//! |---------|--------------|
//! | No scope for the community or context | `noAccess` |
//! | PDU type the agent does not serve | `resourceUnavailable` |
//! | Anything else | `genErr` |
//!
//! A datagram that cannot be decoded at all is dropped without a reply, as is
//! an authenticated one whose user is unknown or whose credentials do not
//! verify. Failed notifications are never answered.

mod notify;
mod scope;
mod security;
mod set_handler;

pub use scope::{Scope, ScopeBuilder};

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::AtomicU32;

use bytes::Bytes;

use crate::codec::{BerCodec, Codec};
use crate::error::{ConfigErrorKind, Error, Result};
use crate::handler::RequestContext;
use crate::message::Message;
use crate::pdu::PduType;
use crate::v3::{EngineId, HostUptime, TimeSource, UsmUser};

use security::Negotiated;

/// Default snmpEngineBoots.
pub const DEFAULT_ENGINE_BOOTS: u32 = 1;

/// A prepared agent.
///
/// Cheap to clone; every clone shares the same scopes and users. Read-only
/// once prepared, so any number of workers can call [`respond`](Self::respond)
/// concurrently.
#[derive(Clone)]
pub struct Agent {
    inner: Arc<AgentInner>,
}

struct AgentInner {
    scopes: Vec<Scope>,
    routes: HashMap<Bytes, usize>,
    default_scope: Option<usize>,
    users: HashMap<Bytes, UsmUser>,
    engine_id: EngineId,
    engine_boots: u32,
    time_source: Arc<dyn TimeSource>,
    codec: Arc<dyn Codec>,
    no_security: bool,
    unknown_engine_ids: AtomicU32,
}

impl Agent {
    pub fn builder() -> AgentBuilder {
        AgentBuilder::new()
    }

    pub fn engine_id(&self) -> &EngineId {
        &self.inner.engine_id
    }

    pub fn engine_boots(&self) -> u32 {
        self.inner.engine_boots
    }

    /// Current snmpEngineTime from the configured time source.
    pub fn engine_time(&self) -> u32 {
        self.inner.time_source.engine_time()
    }

    pub fn scopes(&self) -> &[Scope] {
        &self.inner.scopes
    }

    /// Answer one datagram.
    ///
    /// Returns `Ok(None)` when no reply is due (traps), and `Err` when the
    /// datagram is dropped because it could not be decoded or its user is
    /// unknown.
    pub fn respond(&self, data: &Bytes, source: SocketAddr) -> Result<Option<Bytes>> {
        let (message, user) = match self.negotiate(data)? {
            Negotiated::Discovery(discovery) => {
                tracing::debug!(
                    snmp.source = %source,
                    snmp.msg_id = discovery.header.map(|h| h.msg_id).unwrap_or_default(),
                    "answering engine discovery"
                );
                return self.discovery_report(&discovery).map(Some);
            }
            Negotiated::Request { message, user } => (message, user),
        };

        let ctx = RequestContext {
            source,
            version: message.version,
            pdu_type: message.pdu.pdu_type,
            request_id: message.pdu.request_id,
            scope: message.routing_key().clone(),
            user_name: message.user_name(),
            security_level: message.security_level(),
        };
        tracing::trace!(
            snmp.source = %source,
            snmp.version = ?ctx.version,
            snmp.pdu_type = %ctx.pdu_type,
            snmp.request_id = ctx.request_id,
            snmp.scope = %ctx.scope_lossy(),
            "request decoded"
        );

        let served = self
            .route(&message)
            .and_then(|scope| scope.serve(&ctx, &message.pdu));
        let pdu = match served {
            Ok(Some(pdu)) => pdu,
            Ok(None) => return Ok(None),
            Err(err) => {
                tracing::debug!(
                    snmp.source = %source,
                    snmp.request_id = ctx.request_id,
                    snmp.error = %err,
                    "request failed"
                );
                if matches!(ctx.pdu_type, PduType::TrapV1 | PduType::TrapV2) {
                    return Ok(None);
                }
                let mut pdu = message.pdu.to_response(message.pdu.varbinds.clone());
                pdu.set_error(err.error_status(), 0);
                pdu
            }
        };

        self.encode_reply(&message, user, pdu).map(Some)
    }

    /// The scope serving `message`.
    fn route(&self, message: &Message) -> Result<&Scope> {
        let index = if self.inner.no_security {
            Some(0)
        } else {
            self.inner
                .routes
                .get(message.routing_key())
                .copied()
                .or(self.inner.default_scope)
        };
        index
            .and_then(|i| self.inner.scopes.get(i))
            .ok_or_else(|| Error::NoAgentInstance {
                scope: String::from_utf8_lossy(message.routing_key()).into(),
            })
    }

    fn user(&self, name: &[u8]) -> Option<&UsmUser> {
        self.inner.users.get(name)
    }
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("engine_id", &self.inner.engine_id)
            .field("engine_boots", &self.inner.engine_boots)
            .field("scopes", &self.inner.scopes.len())
            .field("users", &self.inner.users.len())
            .field("no_security", &self.inner.no_security)
            .finish()
    }
}

/// Builder for [`Agent`].
#[must_use]
pub struct AgentBuilder {
    scopes: Vec<ScopeBuilder>,
    users: Vec<UsmUser>,
    engine_id: Option<EngineId>,
    engine_boots: u32,
    time_source: Option<Arc<dyn TimeSource>>,
    codec: Option<Arc<dyn Codec>>,
    no_security: bool,
}

impl AgentBuilder {
    pub fn new() -> Self {
        Self {
            scopes: Vec::new(),
            users: Vec::new(),
            engine_id: None,
            engine_boots: DEFAULT_ENGINE_BOOTS,
            time_source: None,
            codec: None,
            no_security: false,
        }
    }

    pub fn scope(mut self, scope: ScopeBuilder) -> Self {
        self.scopes.push(scope);
        self
    }

    /// Register a USM user.
    pub fn user(mut self, user: UsmUser) -> Self {
        self.users.push(user);
        self
    }

    /// snmpEngineID (default: derived from the host).
    pub fn engine_id(mut self, engine_id: EngineId) -> Self {
        self.engine_id = Some(engine_id);
        self
    }

    /// snmpEngineBoots (default: 1).
    pub fn engine_boots(mut self, boots: u32) -> Self {
        self.engine_boots = boots;
        self
    }

    /// snmpEngineTime source (default: [`HostUptime`]).
    pub fn time_source(mut self, source: impl TimeSource + 'static) -> Self {
        self.time_source = Some(Arc::new(source));
        self
    }

    /// Message codec (default: [`BerCodec`]).
    pub fn codec(mut self, codec: impl Codec + 'static) -> Self {
        self.codec = Some(Arc::new(codec));
        self
    }

    /// Serve every request from the single configured scope, ignoring the
    /// community or context name.
    pub fn no_security(mut self, enabled: bool) -> Self {
        self.no_security = enabled;
        self
    }

    /// Validate the configuration and build the routing table and registries.
    pub fn prepare(self) -> Result<Agent> {
        if self.scopes.is_empty() {
            return Err(Error::config(ConfigErrorKind::NoScopes));
        }
        if self.no_security && self.scopes.len() != 1 {
            return Err(Error::config(ConfigErrorKind::NoSecurityScopeCount(
                self.scopes.len(),
            )));
        }

        let scopes = self
            .scopes
            .into_iter()
            .map(ScopeBuilder::build)
            .collect::<Result<Vec<_>>>()?;

        let mut routes = HashMap::new();
        let mut default_scope = None;
        for (index, scope) in scopes.iter().enumerate() {
            if scope.is_default() {
                if default_scope.replace(index).is_some() {
                    return Err(Error::config(ConfigErrorKind::DuplicateDefaultScope));
                }
                continue;
            }
            for key in scope.routing_keys() {
                if routes.insert(key.clone(), index).is_some() {
                    return Err(Error::config(ConfigErrorKind::DuplicateRoutingKey(
                        String::from_utf8_lossy(key).into(),
                    )));
                }
            }
        }

        let mut users = HashMap::with_capacity(self.users.len());
        for mut user in self.users {
            user.prepare()?;
            match users.entry(user.name().clone()) {
                Entry::Occupied(_) => {
                    return Err(Error::config(ConfigErrorKind::DuplicateUser(
                        user.name_lossy().into(),
                    )));
                }
                Entry::Vacant(slot) => {
                    slot.insert(user);
                }
            }
        }

        let engine_id = self.engine_id.unwrap_or_else(EngineId::from_host);
        tracing::info!(
            snmp.engine_id = %engine_id,
            snmp.engine_boots = self.engine_boots,
            snmp.scopes = scopes.len(),
            snmp.users = users.len(),
            snmp.no_security = self.no_security,
            "agent prepared"
        );

        Ok(Agent {
            inner: Arc::new(AgentInner {
                scopes,
                routes,
                default_scope,
                users,
                engine_id,
                engine_boots: self.engine_boots,
                time_source: self.time_source.unwrap_or_else(|| Arc::new(HostUptime)),
                codec: self.codec.unwrap_or_else(|| Arc::new(BerCodec)),
                no_security: self.no_security,
                unknown_engine_ids: AtomicU32::new(0),
            }),
        })
    }
}

impl Default for AgentBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::VariableControl;
    use crate::oid;
    use crate::pdu::Pdu;
    use crate::v3::{AuthProtocol, PrivProtocol};
    use crate::value::{Value, ValueType};
    use crate::varbind::VarBind;
    use crate::version::Version;

    fn descr(text: &'static str) -> VariableControl {
        VariableControl::builder(oid!(1, 3, 6, 1, 2, 1, 1, 1, 0), ValueType::OctetString)
            .constant(Value::OctetString(Bytes::from_static(text.as_bytes())))
            .build()
    }

    fn source() -> SocketAddr {
        "192.0.2.7:50123".parse().unwrap()
    }

    fn get(agent: &Agent, community: &'static str) -> Pdu {
        let request = Message::community(
            Version::V2c,
            community,
            Pdu::new(
                PduType::GetRequest,
                77,
                vec![VarBind::null(oid!(1, 3, 6, 1, 2, 1, 1, 1, 0))],
            ),
        );
        let data = BerCodec.encode(&request, None).unwrap();
        let reply = agent.respond(&data, source()).unwrap().unwrap();
        BerCodec.decode(&reply, None).unwrap().pdu
    }

    #[test]
    fn test_prepare_needs_a_scope() {
        let err = Agent::builder().prepare().unwrap_err();
        assert!(matches!(
            err,
            Error::Config {
                kind: ConfigErrorKind::NoScopes
            }
        ));
    }

    #[test]
    fn test_prepare_rejects_two_default_scopes() {
        let err = Agent::builder()
            .scope(Scope::builder())
            .scope(Scope::builder())
            .prepare()
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Config {
                kind: ConfigErrorKind::DuplicateDefaultScope
            }
        ));
    }

    #[test]
    fn test_prepare_rejects_shared_routing_key() {
        let err = Agent::builder()
            .scope(Scope::builder().routing_key("public"))
            .scope(Scope::builder().routing_key("private").routing_key("public"))
            .prepare()
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Config {
                kind: ConfigErrorKind::DuplicateRoutingKey(_)
            }
        ));
    }

    #[test]
    fn test_prepare_rejects_duplicate_oid() {
        let err = Agent::builder()
            .scope(Scope::builder().variable(descr("a")).variable(descr("b")))
            .prepare()
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Config {
                kind: ConfigErrorKind::DuplicateOid(_)
            }
        ));
    }

    #[test]
    fn test_prepare_user_checks() {
        let err = Agent::builder()
            .scope(Scope::builder())
            .user(UsmUser::new("ops").auth(AuthProtocol::Sha1, "authpassword"))
            .user(UsmUser::new("ops"))
            .prepare()
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Config {
                kind: ConfigErrorKind::DuplicateUser(_)
            }
        ));

        let err = Agent::builder()
            .scope(Scope::builder())
            .user(UsmUser::new("eve").privacy(PrivProtocol::Des, "privpassword"))
            .prepare()
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Config {
                kind: ConfigErrorKind::PrivWithoutAuth(_)
            }
        ));
    }

    #[test]
    fn test_no_security_needs_one_scope() {
        let err = Agent::builder()
            .scope(Scope::builder().routing_key("a"))
            .scope(Scope::builder().routing_key("b"))
            .no_security(true)
            .prepare()
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Config {
                kind: ConfigErrorKind::NoSecurityScopeCount(2)
            }
        ));
    }

    #[test]
    fn test_routing_by_community_and_default() {
        let agent = Agent::builder()
            .scope(Scope::builder().routing_key("public").variable(descr("public view")))
            .scope(Scope::builder().variable(descr("default view")))
            .prepare()
            .unwrap();

        let pdu = get(&agent, "public");
        assert_eq!(
            pdu.varbinds[0].value,
            Value::OctetString(Bytes::from_static(b"public view"))
        );
        let pdu = get(&agent, "anything-else");
        assert_eq!(
            pdu.varbinds[0].value,
            Value::OctetString(Bytes::from_static(b"default view"))
        );
    }

    #[test]
    fn test_unrouted_community_is_no_access() {
        let agent = Agent::builder()
            .scope(Scope::builder().routing_key("public").variable(descr("x")))
            .prepare()
            .unwrap();
        let pdu = get(&agent, "secret");
        assert_eq!(pdu.pdu_type, PduType::Response);
        assert_eq!(pdu.status(), crate::error::ErrorStatus::NoAccess);
        assert_eq!(pdu.error_index, 0);
        assert_eq!(pdu.varbinds[0].value, Value::Null);
    }

    #[test]
    fn test_no_security_ignores_community() {
        let agent = Agent::builder()
            .scope(Scope::builder().routing_key("public").variable(descr("only")))
            .no_security(true)
            .prepare()
            .unwrap();
        let pdu = get(&agent, "whatever");
        assert_eq!(
            pdu.varbinds[0].value,
            Value::OctetString(Bytes::from_static(b"only"))
        );
    }

    #[test]
    fn test_garbage_is_dropped() {
        let agent = Agent::builder().scope(Scope::builder()).prepare().unwrap();
        let data = Bytes::from_static(&[0x30, 0x03, 0x02, 0x01]);
        assert!(agent.respond(&data, source()).is_err());
    }
}
