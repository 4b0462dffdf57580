//! The per-group integration pipeline (§4.5): match, calibrate, normalize,
//! equalize, combine, rescale, write. One group's failure never aborts the
//! rest of a job — see [`integrate_job`] — and a group the matcher
//! couldn't pair with a calibration frame is a skip, not a failure, unless
//! `require_darks` is set.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use flatcal_grid::{mean, median_exact, ImageData};
use flatcal_match::{match_dark, DarkMatchResult, MatchDiagnostic};
use flatcal_scan::{DarkFrame, DirectoryJob, ExposureGroup, ProcessingConfiguration};
use flatcal_threadpool::{BoundedPool, CancellationToken};

use crate::error::{Error, Result};
use crate::naming::{build_output_path, derive_binning_label};
use crate::rejection::combine;

const MEDIAN_FLOOR: f64 = 1e-15;

/// Outcome of integrating one exposure group.
#[derive(Debug)]
pub struct GroupOutcome {
    pub exposure: f64,
    pub output_path: Option<PathBuf>,
    /// `true` when the group had no matched dark and `require_darks` was
    /// not set — a deliberate skip, not a failure.
    pub skipped: bool,
    pub error: Option<Error>,
    pub match_result: DarkMatchResult,
    pub diagnostic: MatchDiagnostic,
    pub duration: Duration,
}

/// Outcome of integrating every valid group in one [`DirectoryJob`].
#[derive(Debug)]
pub struct JobOutcome {
    pub source_dir: PathBuf,
    pub groups: Vec<GroupOutcome>,
    pub duration: Duration,
}

/// Integrates every group in `job`, each against the best dark/bias in
/// `catalog`. Groups run across the given pool — each group's own
/// arithmetic stays single-threaded (§5), but independent groups may
/// proceed concurrently.
pub fn integrate_job(
    job: &DirectoryJob,
    catalog: &[DarkFrame],
    config: &ProcessingConfiguration,
    pool: &BoundedPool,
    cancel: &CancellationToken,
) -> JobOutcome {
    let start = Instant::now();
    let groups = pool.map(job.groups.clone(), |group| integrate_group(job, &group, catalog, config, cancel));
    JobOutcome {
        source_dir: job.source_dir.clone(),
        groups,
        duration: start.elapsed(),
    }
}

/// Integrates a single exposure group.
pub fn integrate_group(
    job: &DirectoryJob,
    group: &ExposureGroup,
    catalog: &[DarkFrame],
    config: &ProcessingConfiguration,
    cancel: &CancellationToken,
) -> GroupOutcome {
    let start = Instant::now();
    let (match_result, diagnostic) = match_dark(group, catalog, config);

    if match_result.path.is_none() {
        let duration = start.elapsed();
        return if config.require_darks {
            tracing::warn!(exposure = group.exposure, "no matching dark, failing group (require_darks set)");
            GroupOutcome {
                exposure: group.exposure,
                output_path: None,
                skipped: false,
                error: Some(Error::NoMatchingDark),
                match_result,
                diagnostic,
                duration,
            }
        } else {
            tracing::warn!(exposure = group.exposure, "no matching dark, skipping group");
            GroupOutcome {
                exposure: group.exposure,
                output_path: None,
                skipped: true,
                error: None,
                match_result,
                diagnostic,
                duration,
            }
        };
    }

    let outcome = run(job, group, catalog, &match_result, config, cancel);
    let duration = start.elapsed();
    match outcome {
        Ok(path) => GroupOutcome {
            exposure: group.exposure,
            output_path: Some(path),
            skipped: false,
            error: None,
            match_result,
            diagnostic,
            duration,
        },
        Err(e) => {
            tracing::warn!(exposure = group.exposure, error = %e, "group integration failed");
            GroupOutcome {
                exposure: group.exposure,
                output_path: None,
                skipped: false,
                error: Some(e),
                match_result,
                diagnostic,
                duration,
            }
        }
    }
}

fn run(
    job: &DirectoryJob,
    group: &ExposureGroup,
    catalog: &[DarkFrame],
    match_result: &DarkMatchResult,
    config: &ProcessingConfiguration,
    cancel: &CancellationToken,
) -> Result<PathBuf> {
    let dark_path = match_result.path.as_ref().expect("caller checked match_result.path is Some");
    let dark_frame = catalog
        .iter()
        .find(|d| &d.path == dark_path)
        .ok_or_else(|| Error::Internal("matched dark missing from catalog".to_string()))?;

    if cancel.is_cancelled() {
        return Err(Error::Cancelled);
    }
    let dark = flatcal_image::read(dark_path)?;
    let mut dark_pixels = dark.pixels().to_vec();
    if match_result.optimize && dark_frame.exposure > 0.0 {
        let ratio = group.exposure / dark_frame.exposure;
        for v in dark_pixels.iter_mut() {
            *v *= ratio;
        }
    }

    let mut normalized: Vec<Vec<f64>> = Vec::with_capacity(group.paths.len());
    let mut medians: Vec<f64> = Vec::with_capacity(group.paths.len());
    let mut geometry = None;
    let mut inherited_keywords = None;

    let mut ordered_paths = group.paths.clone();
    ordered_paths.sort_by_key(|p| p.file_name().map(|n| n.to_string_lossy().to_ascii_lowercase()));

    for path in &ordered_paths {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        let flat = flatcal_image::read(path)?;
        if !flat.same_geometry(&dark) {
            return Err(Error::BadGeometry(format!("{} does not match the matched dark's geometry", path.display())));
        }
        if geometry.is_none() {
            geometry = Some((flat.width(), flat.height(), flat.channels()));
            inherited_keywords = Some(flat.keywords().clone());
        }

        let mut calibrated: Vec<f64> = flat.pixels().iter().zip(dark_pixels.iter()).map(|(f, d)| f - d).collect();
        let median = median_exact(&calibrated);
        if median.abs() >= MEDIAN_FLOOR {
            for v in calibrated.iter_mut() {
                *v /= median;
            }
        }
        medians.push(median);
        normalized.push(calibrated);
    }

    let (width, height, channels) = geometry.ok_or_else(|| Error::Internal("empty exposure group reached the engine".to_string()))?;
    let total_pixels = width * height * channels;

    let reference_mean = mean(&normalized[0]);
    let factors: Vec<f64> = normalized
        .iter()
        .map(|frame| {
            let m = mean(frame);
            if m.abs() < MEDIAN_FLOOR {
                1.0
            } else {
                reference_mean / m
            }
        })
        .collect();

    if cancel.is_cancelled() {
        return Err(Error::Cancelled);
    }

    let n = normalized.len();
    let mut combined = vec![0.0; total_pixels];
    let mut original_col = vec![0.0; n];
    let mut equalized_col = vec![0.0; n];
    for p in 0..total_pixels {
        for i in 0..n {
            original_col[i] = normalized[i][p];
            equalized_col[i] = original_col[i] * factors[i];
        }
        combined[p] = combine(&original_col, &equalized_col, config);
    }

    let reference_median = medians[0];
    for v in combined.iter_mut() {
        *v *= reference_median;
    }

    let mut keywords = inherited_keywords.unwrap_or_default();
    keywords.set("IMAGETYP", "Master Flat");

    let output = ImageData::new(width, height, channels, combined, keywords);
    let binning_label = derive_binning_label(group, &dark_frame.binning);
    let output_path = build_output_path(job, group, &ordered_paths[0], &binning_label)?;
    if let Some(parent) = output_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    flatcal_image::write_xisf(&output_path, &output)?;

    tracing::info!(path = %output_path.display(), exposure = group.exposure, "wrote master flat");
    Ok(output_path)
}
