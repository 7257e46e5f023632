//! Commonly used types for building an agent.
//!
//! ```rust,no_run
//! use async_snmp_agent::prelude::*;
//! ```

pub use crate::agent::{Agent, Scope};
pub use crate::error::{Error, ErrorStatus, Result};
pub use crate::handler::{BoxError, Permission, RequestContext, VariableControl};
pub use crate::oid::Oid;
pub use crate::server::Server;
pub use crate::transport::UdpTransport;
pub use crate::v3::{AuthProtocol, PrivProtocol, UsmUser};
pub use crate::value::{Value, ValueType};
pub use crate::varbind::VarBind;
pub use crate::version::Version;

#[doc(no_inline)]
pub use crate::oid;
