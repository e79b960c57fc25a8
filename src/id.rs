//! Small newtype identifiers handed out by the library.
//!
//! Gradients are the one resource callers address by value rather than by
//! owning a Rust struct outright (a [`Style`](crate::style::Style) stores a
//! [`GradientId`] rather than a `Gradient`, so the same gradient can be shared
//! across many styles). The original C library minted these with a plain
//! non-atomic global counter, which is not safe to share across threads; this
//! version mints them from an [`AtomicU64`] instead.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Handle to a gradient registered with a [`Context`](crate::context::Context).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GradientId(pub u64);

impl fmt::Display for GradientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

static NEXT_GRADIENT_ID: AtomicU64 = AtomicU64::new(1);

impl GradientId {
    /// Mints a fresh, process-wide unique gradient id.
    pub fn next() -> GradientId {
        GradientId(NEXT_GRADIENT_ID.fetch_add(1, Ordering::Relaxed))
    }
}
