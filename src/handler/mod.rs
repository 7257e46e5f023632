//! Variable handlers: what an agent serves.
//!
//! - [`VariableControl`] - One registered OID with its declared type and callbacks
//! - [`Registry`] - The sorted variables of one scope, with GETNEXT/GETBULK traversal
//! - [`RequestContext`] - Information about the incoming request, for permission checks
//! - [`CallbackError`] - How a failed or panicking callback is reported
//!
//! # Callbacks
//!
//! Callbacks are plain synchronous closures. Each one runs inside a fault
//! boundary: a returned error or a panic is caught where the callback is
//! invoked, and the affected binding is replaced by an `ERROR: ...` string.
//! Sibling bindings in the same request are still served.
//!
//! ```rust
//! use std::sync::{Arc, RwLock};
//!
//! use async_snmp_agent::handler::{Registry, VariableControl};
//! use async_snmp_agent::{Value, ValueType, oid};
//!
//! let contact = Arc::new(RwLock::new(String::from("ops@example.com")));
//! let (r, w) = (contact.clone(), contact.clone());
//!
//! let registry = Registry::new(vec![
//!     VariableControl::builder(oid!(1, 3, 6, 1, 2, 1, 1, 4, 0), ValueType::OctetString)
//!         .on_read(move || Ok(Value::OctetString(r.read().map_err(|e| e.to_string())?.clone().into())))
//!         .on_write(move |value| {
//!             let text = value.as_bytes().ok_or("expected a string")?;
//!             *w.write().map_err(|e| e.to_string())? = String::from_utf8_lossy(text).into_owned();
//!             Ok(())
//!         })
//!         .document("sysContact")
//!         .build(),
//! ])
//! .unwrap();
//! assert_eq!(registry.len(), 1);
//! ```

mod context;
mod control;
mod fault;
mod registry;
mod results;

pub use context::RequestContext;
pub use control::{BoxError, Permission, VariableBuilder, VariableControl};
pub use registry::Registry;
pub use results::CallbackError;

pub(crate) use fault::panic_message;
pub(crate) use results::ResponseBuilder;
