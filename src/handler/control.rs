//! Variable control entries: one registered OID and its callbacks.

use std::fmt;
use std::sync::Arc;

use crate::oid::Oid;
use crate::value::{Value, ValueType};
use crate::varbind::VarBind;

use super::RequestContext;
use super::fault::guard;
use super::results::CallbackError;

/// Error type returned by user callbacks.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

type ReadFn = Arc<dyn Fn() -> Result<Value, BoxError> + Send + Sync>;
type WriteFn = Arc<dyn Fn(&Value) -> Result<(), BoxError> + Send + Sync>;
type PermissionFn = Arc<dyn Fn(&RequestContext) -> Permission + Send + Sync>;
type NotifyFn = Arc<dyn Fn(bool, &VarBind) -> Result<Option<Value>, BoxError> + Send + Sync>;

/// Outcome of a permission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Permission {
    #[default]
    Allowed,
    Denied,
}

/// A registered variable.
///
/// Built with [`VariableControl::builder`]. A variable without a read callback
/// is skipped by GETNEXT/GETBULK, as is one marked non-walkable.
///
/// ```
/// use async_snmp_agent::handler::{Permission, VariableControl};
/// use async_snmp_agent::{Value, ValueType, oid};
///
/// let descr = VariableControl::builder(oid!(1, 3, 6, 1, 2, 1, 1, 1, 0), ValueType::OctetString)
///     .on_read(|| Ok(Value::OctetString("demo agent".into())))
///     .on_permission(|ctx| {
///         if ctx.source.ip().is_loopback() {
///             Permission::Allowed
///         } else {
///             Permission::Denied
///         }
///     })
///     .document("sysDescr")
///     .build();
/// assert!(descr.is_walkable());
/// ```
#[derive(Clone)]
pub struct VariableControl {
    oid: Oid,
    value_type: ValueType,
    non_walkable: bool,
    read: Option<ReadFn>,
    write: Option<WriteFn>,
    permission: Option<PermissionFn>,
    notify: Option<NotifyFn>,
    document: Box<str>,
}

impl VariableControl {
    pub fn builder(oid: Oid, value_type: ValueType) -> VariableBuilder {
        VariableBuilder {
            control: Self {
                oid,
                value_type,
                non_walkable: false,
                read: None,
                write: None,
                permission: None,
                notify: None,
                document: Box::from(""),
            },
        }
    }

    pub fn oid(&self) -> &Oid {
        &self.oid
    }

    pub fn value_type(&self) -> ValueType {
        self.value_type
    }

    pub fn document(&self) -> &str {
        &self.document
    }

    /// Whether GETNEXT/GETBULK may return this variable.
    pub fn is_walkable(&self) -> bool {
        !self.non_walkable && self.read.is_some()
    }

    pub fn is_readable(&self) -> bool {
        self.read.is_some()
    }

    pub fn is_writable(&self) -> bool {
        self.write.is_some()
    }

    pub fn accepts_notifications(&self) -> bool {
        self.notify.is_some()
    }

    /// Run the permission callback; no callback means allowed.
    pub(crate) fn permit(&self, ctx: &RequestContext) -> Result<Permission, CallbackError> {
        match &self.permission {
            Some(check) => guard(|| Ok(check(ctx))),
            None => Ok(Permission::Allowed),
        }
    }

    /// Run the read callback and check the result against the declared type.
    ///
    /// Returns `None` when the variable has no read callback.
    pub(crate) fn read(&self) -> Option<Result<Value, CallbackError>> {
        let read = self.read.as_ref()?;
        Some(guard(|| read()).and_then(|value| self.check_type(value)))
    }

    /// Run the write callback. Returns `None` when the variable is read-only.
    pub(crate) fn write(&self, value: &Value) -> Option<Result<(), CallbackError>> {
        let write = self.write.as_ref()?;
        Some(guard(|| write(value)))
    }

    /// Run the notification callback. Returns `None` when there is none.
    pub(crate) fn notify(
        &self,
        is_inform: bool,
        varbind: &VarBind,
    ) -> Option<Result<Option<Value>, CallbackError>> {
        let notify = self.notify.as_ref()?;
        Some(guard(|| notify(is_inform, varbind)))
    }

    fn check_type(&self, value: Value) -> Result<Value, CallbackError> {
        if value.value_type() == Some(self.value_type) {
            Ok(value)
        } else {
            Err(CallbackError::TypeMismatch {
                declared: self.value_type,
                actual: value,
            })
        }
    }
}

impl fmt::Debug for VariableControl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VariableControl")
            .field("oid", &self.oid)
            .field("value_type", &self.value_type)
            .field("non_walkable", &self.non_walkable)
            .field("read", &self.read.is_some())
            .field("write", &self.write.is_some())
            .field("permission", &self.permission.is_some())
            .field("notify", &self.notify.is_some())
            .field("document", &self.document)
            .finish()
    }
}

/// Builder for [`VariableControl`].
#[must_use]
pub struct VariableBuilder {
    control: VariableControl,
}

impl VariableBuilder {
    /// Exclude the variable from GETNEXT/GETBULK traversal.
    pub fn non_walkable(mut self) -> Self {
        self.control.non_walkable = true;
        self
    }

    pub fn on_read<F>(mut self, f: F) -> Self
    where
        F: Fn() -> Result<Value, BoxError> + Send + Sync + 'static,
    {
        self.control.read = Some(Arc::new(f));
        self
    }

    /// Serve a fixed value.
    pub fn constant(self, value: Value) -> Self {
        self.on_read(move || Ok(value.clone()))
    }

    pub fn on_write<F>(mut self, f: F) -> Self
    where
        F: Fn(&Value) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        self.control.write = Some(Arc::new(f));
        self
    }

    pub fn on_permission<F>(mut self, f: F) -> Self
    where
        F: Fn(&RequestContext) -> Permission + Send + Sync + 'static,
    {
        self.control.permission = Some(Arc::new(f));
        self
    }

    /// Handle traps and informs naming this variable.
    ///
    /// The flag is `true` for an InformRequest. A returned value replaces the
    /// binding in the inform acknowledgement; `None` echoes it.
    pub fn on_notify<F>(mut self, f: F) -> Self
    where
        F: Fn(bool, &VarBind) -> Result<Option<Value>, BoxError> + Send + Sync + 'static,
    {
        self.control.notify = Some(Arc::new(f));
        self
    }

    pub fn document(mut self, text: impl Into<Box<str>>) -> Self {
        self.control.document = text.into();
        self
    }

    pub fn build(self) -> VariableControl {
        self.control
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oid;

    #[test]
    fn test_walkable_needs_read() {
        let write_only = VariableControl::builder(oid!(1, 3, 6, 1), ValueType::Integer)
            .on_write(|_| Ok(()))
            .build();
        assert!(!write_only.is_walkable());
        assert!(write_only.read().is_none());

        let hidden = VariableControl::builder(oid!(1, 3, 6, 1), ValueType::Integer)
            .constant(Value::Integer(1))
            .non_walkable()
            .build();
        assert!(!hidden.is_walkable());
        assert!(hidden.is_readable());
    }

    #[test]
    fn test_read_checks_declared_type() {
        let control = VariableControl::builder(oid!(1, 3, 6, 1), ValueType::Counter32)
            .constant(Value::Integer(7))
            .build();
        let err = control.read().unwrap().unwrap_err();
        assert!(matches!(
            err,
            CallbackError::TypeMismatch {
                declared: ValueType::Counter32,
                ..
            }
        ));
    }

    #[test]
    fn test_panicking_write_is_contained() {
        let control = VariableControl::builder(oid!(1, 3, 6, 1), ValueType::Integer)
            .on_write(|_| panic!("disk on fire"))
            .build();
        let err = control.write(&Value::Integer(1)).unwrap().unwrap_err();
        assert!(err.to_string().contains("disk on fire"));
    }
}
