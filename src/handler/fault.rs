//! Fault boundary around user code.

use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};

use super::control::BoxError;
use super::results::CallbackError;

/// Run a user callback, turning both returned errors and panics into
/// [`CallbackError`].
pub(crate) fn guard<T>(f: impl FnOnce() -> Result<T, BoxError>) -> Result<T, CallbackError> {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(err)) => Err(CallbackError::Failed(err)),
        Err(payload) => Err(CallbackError::Fault(panic_message(payload.as_ref()))),
    }
}

/// Best-effort text of a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guard_passes_values_and_errors() {
        assert_eq!(guard(|| Ok::<_, BoxError>(5)).unwrap(), 5);
        let err = guard::<()>(|| Err("nope".into())).unwrap_err();
        assert!(matches!(err, CallbackError::Failed(_)));
        assert_eq!(err.to_string(), "nope");
    }

    #[test]
    fn test_guard_catches_formatted_panic() {
        let id = 42;
        let err = guard::<()>(|| panic!("row {} vanished", id)).unwrap_err();
        match err {
            CallbackError::Fault(msg) => assert_eq!(msg, "row 42 vanished"),
            other => panic!("unexpected {:?}", other),
        }
    }
}
