//! Tiered dark/bias selection (§4.4): the first tier with at least one
//! eligible candidate wins. Tiers 1-3 draw from dark-class frames
//! (`Dark`, `DarkFlat`, `MasterDark`, `MasterDarkFlat`); tier 4 falls back
//! to bias-class frames (`Bias`, `MasterBias`).

use std::path::PathBuf;

use flatcal_meta::FrameType;
use flatcal_scan::{DarkFrame, ExposureGroup, MatchCriteria, ProcessingConfiguration};

use crate::diagnostic::{MatchDiagnostic, RejectedAlternative};
use crate::score::score;

const EXACT_TOLERANCE: f64 = 0.001;
const NEAR_NO_OPTIMIZE_MAX: f64 = 2.0;
const NEAR_OPTIMIZE_MAX: f64 = 10.0;

/// The matcher's verdict for one exposure group: the chosen calibration
/// frame (if any), whether exposure-ratio scaling must be applied, a
/// human-readable tier tag, and the winning candidate's tie-break score.
#[derive(Debug, Clone)]
pub struct DarkMatchResult {
    pub path: Option<PathBuf>,
    pub optimize: bool,
    pub kind: String,
    pub score: f64,
}

impl DarkMatchResult {
    fn none() -> Self {
        Self {
            path: None,
            optimize: false,
            kind: "none".to_string(),
            score: 0.0,
        }
    }
}

/// Selects a calibration frame for `group` out of `catalog`, per the
/// five-tier policy, and explains the choice. Infallible: a group with no
/// eligible candidate at any tier simply gets a `None` result, not an
/// error — the caller decides what to do with an unmatched group (skip it,
/// or fail the run under `require_darks`).
pub fn match_dark(
    group: &ExposureGroup,
    catalog: &[DarkFrame],
    config: &ProcessingConfiguration,
) -> (DarkMatchResult, MatchDiagnostic) {
    let criteria = MatchCriteria::from(group);
    let exposure = group.exposure;

    if let Some(pinned) = catalog.iter().find(|d| d.user_selected) {
        let kind = format!("{}(user-selected)", type_name(pinned.frame_type));
        let optimize = (pinned.exposure - exposure).abs() > EXACT_TOLERANCE;
        return resolve(pinned, &[pinned], &criteria, config, kind, optimize);
    }

    let dark_class: Vec<&DarkFrame> = catalog.iter().filter(|d| d.frame_type.is_dark_class()).collect();

    let exact: Vec<&DarkFrame> = dark_class
        .iter()
        .copied()
        .filter(|d| (d.exposure - exposure).abs() < EXACT_TOLERANCE)
        .collect();
    if let Some(winner) = pick_best(&exact, &criteria, config, |_| 0.0) {
        let kind = format!("{}(exact)", type_name(winner.frame_type));
        return resolve(winner, &exact, &criteria, config, kind, false);
    }

    if config.dark_matching_allow_nearest_with_optimize {
        let near: Vec<&DarkFrame> = dark_class
            .iter()
            .copied()
            .filter(|d| {
                let delta = (d.exposure - exposure).abs();
                delta >= EXACT_TOLERANCE && delta <= NEAR_NO_OPTIMIZE_MAX
            })
            .collect();
        if let Some(winner) = pick_best(&near, &criteria, config, |d| (d.exposure - exposure).abs()) {
            let kind = format!("{}(nearest<=2s,{:.3}s)", type_name(winner.frame_type), winner.exposure);
            return resolve(winner, &near, &criteria, config, kind, false);
        }

        let far: Vec<&DarkFrame> = dark_class
            .iter()
            .copied()
            .filter(|d| {
                let delta = (d.exposure - exposure).abs();
                delta > NEAR_NO_OPTIMIZE_MAX && delta <= NEAR_OPTIMIZE_MAX
            })
            .collect();
        if let Some(winner) = pick_best(&far, &criteria, config, |d| (d.exposure - exposure).abs()) {
            let kind = format!("{}(nearest<=10s+optimize,{:.3}s)", type_name(winner.frame_type), winner.exposure);
            return resolve(winner, &far, &criteria, config, kind, true);
        }
    }

    let bias_class: Vec<&DarkFrame> = catalog.iter().filter(|d| d.frame_type.is_bias_class()).collect();
    if let Some(winner) = pick_best(&bias_class, &criteria, config, |_| 0.0) {
        let kind = type_name(winner.frame_type).to_string();
        return resolve(winner, &bias_class, &criteria, config, kind, false);
    }

    tracing::debug!(exposure, "no calibration candidate at any tier");
    (DarkMatchResult::none(), MatchDiagnostic::none())
}

fn resolve(
    winner: &DarkFrame,
    tier_candidates: &[&DarkFrame],
    criteria: &MatchCriteria,
    config: &ProcessingConfiguration,
    kind: String,
    optimize: bool,
) -> (DarkMatchResult, MatchDiagnostic) {
    let winner_score = score(winner, criteria, config);
    if optimize {
        tracing::warn!(path = %winner.path.display(), kind = %kind, "exposure-ratio scaling applied to matched dark");
    } else {
        tracing::debug!(path = %winner.path.display(), kind = %kind, score = winner_score, "matched calibration frame");
    }

    let temperature_delta = match (criteria.temperature, winner.temperature) {
        (Some(a), Some(b)) => Some((a - b).abs()),
        _ => None,
    };

    let mut warnings = Vec::new();
    if optimize {
        warnings.push("exposure-ratio scaling applied, dark exposure does not match flat exposure".to_string());
    }
    if let Some(delta) = temperature_delta {
        if delta > config.dark_matching_max_temp_delta_c {
            warnings.push(format!("temperature delta {:.1}\u{b0}C exceeds tolerance", delta));
        }
    }

    let result = DarkMatchResult {
        path: Some(winner.path.clone()),
        optimize,
        kind: kind.clone(),
        score: winner_score,
    };
    let diagnostic = MatchDiagnostic {
        selected: Some(winner.path.clone()),
        kind,
        temperature_delta,
        warnings,
        rejected: rejected_alternatives(tier_candidates, winner, winner_score, criteria, config),
    };
    (result, diagnostic)
}

fn rejected_alternatives(
    candidates: &[&DarkFrame],
    winner: &DarkFrame,
    winner_score: f64,
    criteria: &MatchCriteria,
    config: &ProcessingConfiguration,
) -> Vec<RejectedAlternative> {
    let mut rejected: Vec<RejectedAlternative> = candidates
        .iter()
        .copied()
        .filter(|d| d.path != winner.path)
        .map(|d| RejectedAlternative {
            path: d.path.clone(),
            score_gap: winner_score - score(d, criteria, config),
        })
        .collect();
    rejected.sort_by(|a, b| a.score_gap.partial_cmp(&b.score_gap).unwrap().then_with(|| path_lower(&a.path).cmp(&path_lower(&b.path))));
    rejected.truncate(5);
    rejected
}

fn pick_best<'a>(
    candidates: &[&'a DarkFrame],
    criteria: &MatchCriteria,
    config: &ProcessingConfiguration,
    delta_fn: impl Fn(&DarkFrame) -> f64,
) -> Option<&'a DarkFrame> {
    candidates
        .iter()
        .copied()
        .min_by(|a, b| {
            delta_fn(a)
                .partial_cmp(&delta_fn(b))
                .unwrap()
                .then_with(|| score(b, criteria, config).partial_cmp(&score(a, criteria, config)).unwrap())
                .then_with(|| type_priority(a.frame_type).cmp(&type_priority(b.frame_type)))
                .then_with(|| path_lower(&a.path).cmp(&path_lower(&b.path)))
        })
}

fn type_priority(frame_type: FrameType) -> u8 {
    match frame_type {
        FrameType::MasterDarkFlat => 0,
        FrameType::DarkFlat => 1,
        FrameType::MasterDark => 2,
        FrameType::Dark => 3,
        FrameType::MasterBias => 4,
        FrameType::Bias => 5,
        _ => 6,
    }
}

fn type_name(frame_type: FrameType) -> &'static str {
    match frame_type {
        FrameType::MasterDarkFlat => "MasterDarkFlat",
        FrameType::DarkFlat => "DarkFlat",
        FrameType::MasterDark => "MasterDark",
        FrameType::Dark => "Dark",
        FrameType::MasterBias => "MasterBias",
        FrameType::Bias => "Bias",
        FrameType::MasterFlat => "MasterFlat",
        FrameType::Flat => "Flat",
        FrameType::Light => "Light",
        FrameType::Unknown => "Unknown",
    }
}

fn path_lower(path: &std::path::Path) -> String {
    path.to_string_lossy().to_ascii_lowercase()
}
