//! The score function (§4.4): only used to break ties within a tier, never
//! to choose between tiers.

use flatcal_scan::{DarkFrame, MatchCriteria, ProcessingConfiguration};

pub(crate) fn score(dark: &DarkFrame, criteria: &MatchCriteria, config: &ProcessingConfiguration) -> f64 {
    let mut total = 0.0;

    if config.dark_matching_enforce_binning {
        if let (Some(a), Some(b)) = (&criteria.binning, &dark.binning) {
            if a == b {
                total += 3.0;
            }
        }
    }

    if config.dark_matching_prefer_same_gain_offset {
        if let (Some(a), Some(b)) = (criteria.gain, dark.gain) {
            if (a - b).abs() < 0.01 {
                total += 2.0;
            }
        }
        if let (Some(a), Some(b)) = (criteria.offset, dark.offset) {
            if (a - b).abs() < 0.5 {
                total += 2.0;
            }
        }
    }

    if config.dark_matching_prefer_closest_temp {
        if let (Some(a), Some(b)) = (criteria.temperature, dark.temperature) {
            let delta = (a - b).abs();
            if delta <= config.dark_matching_max_temp_delta_c {
                total += 1.5 - 0.2 * delta;
            }
        }
    }

    total
}
