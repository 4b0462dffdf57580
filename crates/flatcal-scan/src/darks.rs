//! Dark/bias cataloging: walks dark-library roots, classifies each frame,
//! and keeps the dark-class and bias-class candidates §4.3 accepts, then
//! backfills missing temperatures before returning the catalog.

use std::path::PathBuf;

use flatcal_meta::{BatchOutcome, MetadataCache};
use flatcal_threadpool::{BoundedPool, CancellationToken};

use crate::backfill::backfill_temperatures;
use crate::error::Error;
use crate::model::DarkFrame;
use crate::progress::ProgressSender;
use crate::walk::walk_roots;

#[derive(Debug)]
pub struct DarkScanOutcome {
    pub catalog: Vec<DarkFrame>,
    pub cancelled: bool,
    pub errors: Vec<Error>,
}

/// Scans `roots` for dark and bias frames (masters included), attributing
/// each to its discovery directory, and imputes missing temperatures from
/// same-binning siblings once the whole catalog is assembled.
pub fn scan_darks(
    roots: &[PathBuf],
    cache: &MetadataCache,
    pool: &BoundedPool,
    cancel: &CancellationToken,
    progress: &ProgressSender,
) -> DarkScanOutcome {
    let mut catalog = Vec::new();
    let mut errors = Vec::new();

    let completed = walk_roots(roots, progress, cancel, &mut errors, |_root, dir, files| {
        let BatchOutcome { records, cancelled } = flatcal_meta::read_batch(files, cache, pool, cancel);
        if cancelled > 0 {
            tracing::debug!(path = %dir.display(), cancelled, "dark metadata batch partially cancelled");
        }

        for record in &records {
            if let Some(dark) = DarkFrame::from_metadata(record, dir) {
                catalog.push(dark);
            }
        }
    });

    backfill_temperatures(&mut catalog);

    tracing::info!(count = catalog.len(), "cataloged dark/bias frames");
    DarkScanOutcome { catalog, cancelled: !completed, errors }
}
