//! Callback outcomes and response assembly.

use bytes::Bytes;

use crate::error::ErrorStatus;
use crate::oid::Oid;
use crate::pdu::Pdu;
use crate::value::{Value, ValueType};
use crate::varbind::VarBind;

use super::control::BoxError;

/// Failure of a user callback.
///
/// Every variant is reported the same way: the affected binding carries an
/// `ERROR: ...` string, and the packet status becomes `genErr` only when the
/// scope escalates errors.
#[derive(Debug, thiserror::Error)]
pub enum CallbackError {
    /// The callback returned an error.
    #[error("{0}")]
    Failed(BoxError),
    /// The callback panicked.
    #[error("panic: {0}")]
    Fault(String),
    /// The read callback returned a value of the wrong type.
    #[error("value {actual:?} does not match declared type {declared}")]
    TypeMismatch { declared: ValueType, actual: Value },
}

impl CallbackError {
    /// Binding value substituted for the failed variable.
    pub fn to_value(&self) -> Value {
        Value::OctetString(Bytes::from(format!("ERROR: {}", self)))
    }
}

/// Response bindings plus a first-error-wins packet status.
#[derive(Debug, Clone)]
pub(crate) struct ResponseBuilder {
    varbinds: Vec<VarBind>,
    error_status: ErrorStatus,
    error_index: i32,
}

impl ResponseBuilder {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            varbinds: Vec::with_capacity(capacity),
            error_status: ErrorStatus::NoError,
            error_index: 0,
        }
    }

    pub(crate) fn push(&mut self, varbind: VarBind) {
        self.varbinds.push(varbind);
    }

    /// Record a packet error for request binding `index` (0-based) unless one
    /// is already set, then add `varbind`.
    pub(crate) fn fail(&mut self, status: ErrorStatus, index: usize, varbind: VarBind) {
        if !self.error_status.is_error() {
            self.error_status = status;
            self.error_index = i32::try_from(index + 1).unwrap_or(i32::MAX);
        }
        self.varbinds.push(varbind);
    }

    /// Add the `ERROR: ...` substitute for `oid`; escalate to `genErr` when asked.
    pub(crate) fn substitute(&mut self, err: &CallbackError, index: usize, oid: &Oid, escalate: bool) {
        let varbind = VarBind::new(oid.clone(), err.to_value());
        if escalate {
            self.fail(ErrorStatus::GenErr, index, varbind);
        } else {
            self.push(varbind);
        }
    }

    pub(crate) fn status(&self) -> ErrorStatus {
        self.error_status
    }

    #[cfg(test)]
    pub(crate) fn varbinds(&self) -> &[VarBind] {
        &self.varbinds
    }

    /// Response PDU answering `request`.
    pub(crate) fn into_response(self, request: &Pdu) -> Pdu {
        let mut pdu = request.to_response(self.varbinds);
        pdu.set_error(self.error_status, self.error_index);
        pdu
    }
}
