//! Flat discovery: walks flat-base roots, groups each directory's frames by
//! exposure, and emits one [`DirectoryJob`] per directory with at least one
//! valid group.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use flatcal_meta::{BatchOutcome, MetadataCache};
use flatcal_threadpool::{BoundedPool, CancellationToken};

use crate::error::Error;
use crate::model::{DirectoryJob, ExposureGroup};
use crate::progress::ProgressSender;
use crate::reserved::is_master_flat_output;
use crate::walk::walk_roots;

/// Result of [`scan_flats`]: the jobs found, plus whether the walk ran to
/// completion or stopped early due to cancellation, plus any root- or
/// directory-level failures encountered along the way (never fatal to the
/// scan itself — see [`crate::Error`]).
#[derive(Debug)]
pub struct FlatScanOutcome {
    pub jobs: Vec<DirectoryJob>,
    pub cancelled: bool,
    pub errors: Vec<Error>,
}

/// Scans `roots` for flat frames. `output_root_override`, when given,
/// replaces the default `<base>_processed` output root for every job
/// (the relative directory under it is preserved either way).
pub fn scan_flats(
    roots: &[PathBuf],
    output_root_override: Option<&Path>,
    cache: &MetadataCache,
    pool: &BoundedPool,
    cancel: &CancellationToken,
    progress: &ProgressSender,
) -> FlatScanOutcome {
    let mut jobs = Vec::new();
    let mut errors = Vec::new();

    let completed = walk_roots(roots, progress, cancel, &mut errors, |root, dir, files| {
        let candidates: Vec<PathBuf> = files
            .into_iter()
            .filter(|p| {
                let name = p.file_name().and_then(|n| n.to_str()).unwrap_or_default();
                !is_master_flat_output(name)
            })
            .collect();
        if candidates.is_empty() {
            return;
        }

        let BatchOutcome { records, cancelled } = flatcal_meta::read_batch(candidates, cache, pool, cancel);
        if cancelled > 0 {
            tracing::debug!(path = %dir.display(), cancelled, "flat metadata batch partially cancelled");
        }

        let mut by_exposure_key: HashMap<String, (f64, Vec<_>)> = HashMap::new();
        for record in records {
            let key = record.exposure_key();
            // Use the key's own rounded value, not whichever raw record
            // happened to land first in iteration order: two frames sharing
            // a 3-decimal key can still differ by up to 0.001s, and the
            // matcher's exact/nearest tier boundaries run on this value.
            let exposure = record.exposure.map(flatcal_meta::round_to_3_decimals).unwrap_or(0.0);
            by_exposure_key.entry(key).or_insert_with(|| (exposure, Vec::new())).1.push(record);
        }

        let mut groups: Vec<ExposureGroup> = by_exposure_key
            .into_values()
            .filter_map(|(exposure, records)| ExposureGroup::from_records(exposure, records))
            .filter(ExposureGroup::is_valid)
            .collect();
        groups.sort_by(|a, b| a.exposure.partial_cmp(&b.exposure).unwrap());

        if groups.is_empty() {
            return;
        }

        let relative_dir = dir.strip_prefix(root).unwrap_or(dir).to_path_buf();
        let output_root = match output_root_override {
            Some(override_root) => override_root.to_path_buf(),
            None => default_processed_root(root),
        };

        tracing::info!(
            dir = %dir.display(),
            groups = groups.len(),
            "formed exposure groups for flat directory"
        );

        jobs.push(DirectoryJob {
            source_dir: dir.to_path_buf(),
            base_root: root.to_path_buf(),
            output_root,
            relative_dir,
            groups,
        });
    });

    FlatScanOutcome { jobs, cancelled: !completed, errors }
}

fn default_processed_root(base_root: &Path) -> PathBuf {
    let file_name = base_root.file_name().map(|n| {
        let mut s = n.to_string_lossy().into_owned();
        s.push_str("_processed");
        s
    });
    match (base_root.parent(), file_name) {
        (Some(parent), Some(name)) => parent.join(name),
        _ => {
            let mut s = base_root.as_os_str().to_os_string();
            s.push("_processed");
            PathBuf::from(s)
        }
    }
}
