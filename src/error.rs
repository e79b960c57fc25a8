//! Error taxonomy and the thread-local last-error slot.
//!
//! Every fallible entry point returns `Result<T, TarpError>`; in addition, the
//! most recent error is stashed in a thread-local so callers ported from the
//! original bool-returning C API can still call [`last_error_message`] after
//! a call that only reports failure via a boolean or an `Option`.

use std::cell::RefCell;

/// The error taxonomy surfaced by the public API.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TarpError {
    /// A GPU or host allocation (buffer, texture, staging ring) failed.
    #[error("allocation failed: {0}")]
    AllocationFailure(String),

    /// A builder-style call was made in an invalid state, e.g. closing a
    /// contour before any `move_to`, or adding a stop to a finalized gradient.
    #[error("invalid use of builder API: {0}")]
    BuilderMisuse(String),

    /// The backend failed to initialize (adapter/device request, surface
    /// configuration, shader module compilation).
    #[error("backend initialization failed: {0}")]
    BackendInitFailure(String),

    /// A handle (path, gradient, render cache) was used after being dropped,
    /// or referred to a resource that was never created in this context.
    #[error("invalid handle: {0}")]
    InvalidHandle(String),
}

thread_local! {
    static LAST_ERROR: RefCell<Option<String>> = const { RefCell::new(None) };
}

/// Records `err` as the most recent error for this thread and returns it
/// unchanged, so call sites can write `return Err(record(TarpError::...))`.
pub fn record(err: TarpError) -> TarpError {
    LAST_ERROR.with(|slot| {
        *slot.borrow_mut() = Some(err.to_string());
    });
    err
}

/// Returns the message of the most recent error recorded on this thread, if
/// any. Mirrors the original library's `tpErrorMessage()` accessor for
/// callers that prefer polling over propagating a `Result`.
pub fn last_error_message() -> Option<String> {
    LAST_ERROR.with(|slot| slot.borrow().clone())
}

/// Clears the thread-local last-error slot.
pub fn clear_last_error() {
    LAST_ERROR.with(|slot| *slot.borrow_mut() = None);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_populates_last_error_message() {
        clear_last_error();
        record(TarpError::InvalidHandle("path 7".into()));
        assert_eq!(last_error_message().as_deref(), Some("invalid handle: path 7"));
    }

    #[test]
    fn clear_last_error_removes_it() {
        record(TarpError::BuilderMisuse("bad call".into()));
        clear_last_error();
        assert_eq!(last_error_message(), None);
    }

    #[test]
    fn record_returns_the_error_unchanged() {
        clear_last_error();
        let err = record(TarpError::AllocationFailure("oom".into()));
        assert!(matches!(err, TarpError::AllocationFailure(msg) if msg == "oom"));
    }
}
