//! Two-pass temperature backfill: collect donors per binning group, then
//! impute. Two passes (rather than imputing while iterating) avoids the
//! result depending on catalog iteration order.

use crate::model::DarkFrame;

/// For each cataloged dark lacking a temperature, imputes the median
/// temperature of darks sharing the same binning among those that do have
/// one. Leaves the field absent if no donor shares its binning.
pub fn backfill_temperatures(darks: &mut [DarkFrame]) {
    use std::collections::HashMap;

    // Pass 1: collect donor temperatures per binning.
    let mut donors: HashMap<Option<String>, Vec<f64>> = HashMap::new();
    for dark in darks.iter() {
        if let Some(temp) = dark.temperature {
            donors.entry(dark.binning.clone()).or_default().push(temp);
        }
    }
    let medians: HashMap<Option<String>, f64> = donors
        .into_iter()
        .map(|(binning, mut temps)| {
            temps.sort_by(|a, b| a.partial_cmp(b).unwrap());
            (binning, median_of_sorted(&temps))
        })
        .collect();

    // Pass 2: impute.
    for dark in darks.iter_mut() {
        if dark.temperature.is_none() {
            if let Some(&median) = medians.get(&dark.binning) {
                dark.temperature = Some(median);
            }
        }
    }
}

fn median_of_sorted(sorted: &[f64]) -> f64 {
    let n = sorted.len();
    if n % 2 == 1 {
        sorted[n / 2]
    } else {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    }
}
