//! Bounded-parallel batch metadata reads, backed by the shared cache.

use std::path::PathBuf;

use flatcal_threadpool::{BoundedPool, CancellationToken};

use crate::cache::MetadataCache;
use crate::metadata::ImageMetadata;

/// Result of one [`read_batch`] call: the records (including fallbacks for
/// unreadable files) plus how many were skipped because the token was
/// already cancelled when their turn came up, distinct from an I/O/parse
/// failure. A caller that sees `cancelled > 0` knows the batch stopped
/// early rather than that those files were merely unreadable.
#[derive(Debug)]
pub struct BatchOutcome {
    pub records: Vec<ImageMetadata>,
    pub cancelled: usize,
}

enum ReadOutcome {
    Record(ImageMetadata),
    Cancelled(PathBuf),
}

/// Reads metadata for every path in `paths`, using `cache` to skip
/// re-decoding files whose `(size, mtime)` hasn't changed since the last
/// call. A single unreadable file never aborts the batch: it's recorded
/// as an [`ImageMetadata::unreadable`] record instead, and the failure is
/// logged at `warn`. Checked once per file: a cancellation observed
/// mid-batch stops that file from being read, but files already dispatched
/// to other workers still complete.
pub fn read_batch(paths: Vec<PathBuf>, cache: &MetadataCache, pool: &BoundedPool, cancel: &CancellationToken) -> BatchOutcome {
    let results = pool.map(paths, |path| {
        if cancel.is_cancelled() {
            ReadOutcome::Cancelled(path)
        } else {
            ReadOutcome::Record(read_one(&path, cache))
        }
    });

    let mut records = Vec::with_capacity(results.len());
    let mut cancelled = 0;
    for outcome in results {
        match outcome {
            ReadOutcome::Record(meta) => records.push(meta),
            ReadOutcome::Cancelled(path) => {
                tracing::debug!(path = %path.display(), "skipped metadata read, batch was cancelled");
                cancelled += 1;
            }
        }
    }
    BatchOutcome { records, cancelled }
}

fn read_one(path: &std::path::Path, cache: &MetadataCache) -> ImageMetadata {
    if let Some(cached) = cache.get(path) {
        tracing::debug!(path = %path.display(), "metadata cache hit");
        return cached;
    }

    let metadata = match flatcal_image::read_headers(path) {
        Ok(keywords) => ImageMetadata::from_keywords(path, &keywords),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "failed to read frame header, falling back to filename inference");
            ImageMetadata::unreadable(path)
        }
    };

    cache.insert(path, metadata.clone());
    metadata
}

#[cfg(test)]
mod tests {
    use super::*;
    use flatcal_grid::{ImageData, Keywords};

    #[test]
    fn unreadable_files_dont_abort_the_batch() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("flat_10s.fits");
        let mut keywords = Keywords::new();
        keywords.set("IMAGETYP", "Flat");
        keywords.set("EXPTIME", "10.0");
        let image = ImageData::new(2, 2, 1, vec![1.0; 4], keywords);
        flatcal_image::write_fits(&good, &image).unwrap();

        let bad = dir.path().join("not_an_image.fits");
        std::fs::write(&bad, b"not a fits file").unwrap();

        let cache = MetadataCache::new();
        let pool = BoundedPool::inline();
        let cancel = CancellationToken::new();
        let outcome = read_batch(vec![good.clone(), bad.clone()], &cache, &pool, &cancel);

        assert_eq!(outcome.records.len(), 2);
        assert_eq!(outcome.cancelled, 0);
        let good_meta = outcome.records.iter().find(|m| m.path == good).unwrap();
        assert_eq!(good_meta.exposure, Some(10.0));
        let bad_meta = outcome.records.iter().find(|m| m.path == bad).unwrap();
        assert!(bad_meta.exposure.is_none());
    }

    #[test]
    fn second_read_hits_cache() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("flat_5s.fits");
        let mut keywords = Keywords::new();
        keywords.set("IMAGETYP", "Flat");
        keywords.set("EXPTIME", "5.0");
        let image = ImageData::new(2, 2, 1, vec![1.0; 4], keywords);
        flatcal_image::write_fits(&path, &image).unwrap();

        let cache = MetadataCache::new();
        let pool = BoundedPool::inline();
        let cancel = CancellationToken::new();
        let first = read_batch(vec![path.clone()], &cache, &pool, &cancel);
        assert_eq!(cache.len(), 1);
        let second = read_batch(vec![path.clone()], &cache, &pool, &cancel);
        assert_eq!(first.records[0].exposure, second.records[0].exposure);
    }

    #[test]
    fn already_cancelled_token_skips_every_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("flat_5s.fits");
        std::fs::write(&path, b"irrelevant").unwrap();

        let cache = MetadataCache::new();
        let pool = BoundedPool::inline();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let outcome = read_batch(vec![path], &cache, &pool, &cancel);
        assert_eq!(outcome.records.len(), 0);
        assert_eq!(outcome.cancelled, 1);
    }
}
