//! The dark/bias matcher: given an exposure group and a dark catalog,
//! chooses one calibration frame per the tiered policy and flags whether
//! exposure-ratio scaling is required. Infallible by design — a group with
//! no eligible candidate just gets a `None` result; it's the integration
//! engine's job to decide whether that's a skip or a failure.

mod diagnostic;
mod matcher;
mod score;

pub use diagnostic::{MatchDiagnostic, RejectedAlternative};
pub use matcher::{match_dark, DarkMatchResult};
