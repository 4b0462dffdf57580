//! Per-pixel-column combination (§4.5 step 6): mean for tiny stacks,
//! percentile clipping for small ones, winsorized sigma clipping for the
//! rest. `original` carries the calibrated, normalized values that end up
//! in the output; `equalized` carries the same values scaled by each
//! frame's flux-equalization factor and is used only to decide which
//! frames survive.

use flatcal_grid::{mean, median_exact, sample_std};
use flatcal_scan::ProcessingConfiguration;

const WINSOR_CLAMP_SIGMA: f64 = 5.0;
const WINSOR_MAX_ITERATIONS: usize = 10;
const WINSOR_MIN_KEPT: usize = 3;
const SIGMA_FLOOR: f64 = 1e-15;

pub(crate) fn combine(original: &[f64], equalized: &[f64], config: &ProcessingConfiguration) -> f64 {
    let n = original.len();
    if n < 3 {
        mean(original)
    } else if n < 6 {
        percentile_clip(original, equalized, 0.20, 0.10)
    } else {
        winsorized_sigma_clip(original, equalized, config.rejection_low_sigma, config.rejection_high_sigma)
    }
}

fn percentile_clip(original: &[f64], equalized: &[f64], low: f64, high: f64) -> f64 {
    let n = original.len();
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| equalized[a].partial_cmp(&equalized[b]).unwrap());

    let drop_low = (n as f64 * low).floor() as usize;
    let drop_high = (n as f64 * high).floor() as usize;
    let kept: &[usize] = if drop_low + drop_high >= n {
        &order
    } else {
        &order[drop_low..n - drop_high]
    };

    let values: Vec<f64> = kept.iter().map(|&i| original[i]).collect();
    mean(&values)
}

fn winsorized_sigma_clip(original: &[f64], equalized: &[f64], low_sigma: f64, high_sigma: f64) -> f64 {
    let mut included: Vec<usize> = (0..original.len()).collect();

    for _ in 0..WINSOR_MAX_ITERATIONS {
        let eq: Vec<f64> = included.iter().map(|&i| equalized[i]).collect();
        let m = mean(&eq);
        let sigma = sample_std(&eq, m);
        if sigma < SIGMA_FLOOR {
            break;
        }

        let lo = m - WINSOR_CLAMP_SIGMA * sigma;
        let hi = m + WINSOR_CLAMP_SIGMA * sigma;
        let winsorized: Vec<f64> = eq.iter().map(|&v| v.clamp(lo, hi)).collect();
        let m_w = mean(&winsorized);
        let sigma_w = sample_std(&winsorized, m_w);
        if sigma_w < SIGMA_FLOOR {
            break;
        }

        let band_lo = m_w - low_sigma * sigma_w;
        let band_hi = m_w + high_sigma * sigma_w;
        let survivors: Vec<usize> = included
            .iter()
            .copied()
            .filter(|&i| equalized[i] >= band_lo && equalized[i] <= band_hi)
            .collect();

        if survivors.len() == included.len() {
            break;
        }
        if survivors.len() < WINSOR_MIN_KEPT {
            break;
        }
        included = survivors;
    }

    if included.is_empty() {
        return median_exact(original);
    }
    let values: Vec<f64> = included.iter().map(|&i| original[i]).collect();
    mean(&values)
}
