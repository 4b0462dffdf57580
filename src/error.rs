//! Thin wrapper over the one failure mode that can surface past a run as a
//! whole, rather than being recorded as a per-file or per-group diagnostic
//! inside [`crate::RunSummary`] per the propagation policy.

use crate::report::RunSummary;

#[derive(Debug)]
#[non_exhaustive]
pub enum Error {
    /// The run observed its cancellation token set before finishing.
    /// Carries the partial summary assembled up to that point, since
    /// cancellation "propagates to the caller, which may report partial
    /// success."
    Cancelled(Box<RunSummary>),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cancelled(summary) => write!(
                f,
                "run cancelled after {} of {} groups processed",
                summary.groups_succeeded + summary.groups_failed + summary.groups_skipped,
                summary.groups_total
            ),
        }
    }
}

impl std::error::Error for Error {}
