//! Per-group matching diagnostics (§4.4): why a dark was chosen, how far
//! off its temperature was, and what else was in the running.

use std::path::PathBuf;

/// One candidate that lost to the winner within the same tier, tagged with
/// the score gap that separated it from the winner.
#[derive(Debug, Clone)]
pub struct RejectedAlternative {
    pub path: PathBuf,
    pub score_gap: f64,
}

/// Explains a [`crate::DarkMatchResult`] to a human or a report renderer.
#[derive(Debug, Clone)]
pub struct MatchDiagnostic {
    pub selected: Option<PathBuf>,
    pub kind: String,
    pub temperature_delta: Option<f64>,
    pub warnings: Vec<String>,
    pub rejected: Vec<RejectedAlternative>,
}

impl MatchDiagnostic {
    pub(crate) fn none() -> Self {
        Self {
            selected: None,
            kind: "none".to_string(),
            temperature_delta: None,
            warnings: vec!["no matching dark/bias found".to_string()],
            rejected: Vec::new(),
        }
    }
}
