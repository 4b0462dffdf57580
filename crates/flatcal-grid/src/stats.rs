//! Small statistics helpers shared by the rejection and matching code.

/// Arithmetic mean. Panics on an empty slice; every caller already knows its
/// column is non-empty.
pub fn mean(values: &[f64]) -> f64 {
    debug_assert!(!values.is_empty());
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation (denominator `n - 1`). Returns `0.0` for a
/// single-element slice rather than dividing by zero, matching the
/// convention that a column with no spread has no rejectable outliers.
pub fn sample_std(values: &[f64], mean: f64) -> f64 {
    let n = values.len();
    if n < 2 {
        return 0.0;
    }
    let sum_sq: f64 = values.iter().map(|v| (v - mean) * (v - mean)).sum();
    (sum_sq / (n - 1) as f64).sqrt()
}
