//! Async SNMP agent engine.
//!
//! An [`Agent`] answers SNMP datagrams (v1, v2c and v3 with USM) from a set
//! of registered variables. Each variable is a [`VariableControl`] holding
//! synchronous callbacks for reading, writing, access checks and
//! notifications. Variables are grouped into [`Scope`]s, and a community
//! string (v1/v2c) or context name (v3) picks the scope that serves a request.
//!
//! The agent itself is transport-agnostic: [`Agent::respond`] maps one
//! request datagram to an optional reply datagram. [`server::Server`] drives
//! it from an [`AgentTransport`](transport::AgentTransport) with a bounded
//! worker pool.
//!
//! # Example
//!
//! ```rust,no_run
//! use async_snmp_agent::agent::{Agent, Scope};
//! use async_snmp_agent::handler::VariableControl;
//! use async_snmp_agent::server::Server;
//! use async_snmp_agent::transport::UdpTransport;
//! use async_snmp_agent::v3::{AuthProtocol, UsmUser};
//! use async_snmp_agent::{Value, ValueType, oid};
//!
//! #[tokio::main]
//! async fn main() -> async_snmp_agent::Result<()> {
//!     let sys_descr = VariableControl::builder(oid!(1, 3, 6, 1, 2, 1, 1, 1, 0), ValueType::OctetString)
//!         .constant(Value::OctetString("edge router".into()))
//!         .build();
//!
//!     let agent = Agent::builder()
//!         .scope(Scope::builder().routing_key("public").variable(sys_descr))
//!         .user(UsmUser::new("admin").auth(AuthProtocol::Sha256, "authpass123"))
//!         .prepare()?;
//!
//!     let transport = UdpTransport::bind("[::]:1161").await?;
//!     Server::builder().build(agent, transport)?.serve().await
//! }
//! ```

pub mod agent;
pub mod ber;
#[cfg(feature = "cli")]
pub mod cli;
pub mod codec;
pub mod error;
pub mod handler;
pub mod message;
pub mod oid;
pub mod pdu;
pub mod prelude;
pub mod server;
pub mod transport;
pub(crate) mod util;
pub mod v3;
pub mod value;
pub mod varbind;
pub mod version;

pub use agent::{Agent, AgentBuilder, Scope, ScopeBuilder};
pub use error::{Error, ErrorStatus, Result};
pub use handler::{Permission, RequestContext, VariableControl};
pub use message::{Message, SecurityLevel};
pub use oid::Oid;
pub use pdu::{Pdu, PduType};
pub use value::{Value, ValueType};
pub use varbind::VarBind;
pub use version::Version;
