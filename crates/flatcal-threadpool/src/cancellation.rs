//! A cheap, cloneable cancellation flag shared across the suspension points
//! named in the concurrency model: batch metadata reads, directory scans,
//! and the boundaries between loaded frames and between groups in the
//! integration engine. None of those call sites poll a runtime or a signal
//! handler; they all just check this flag.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared, clonable handle a caller holds to request cancellation and every
/// suspension point polls to detect it. Cloning shares the same underlying
/// flag; there is no owning/non-owning distinction.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    /// Requests cancellation. Idempotent.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Marker error for an operation that observed a cancelled token. Carries no
/// data: the caller already has the token and knows why.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cancelled;

impl std::fmt::Display for Cancelled {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "operation cancelled")
    }
}

impl std::error::Error for Cancelled {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_uncancelled() {
        let token = CancellationToken::new();
        assert!(!token.is_cancelled());
    }

    #[test]
    fn cancel_is_visible_through_clones() {
        let token = CancellationToken::new();
        let clone = token.clone();
        clone.cancel();
        assert!(token.is_cancelled());
    }
}
