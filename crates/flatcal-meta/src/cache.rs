//! Memoizes metadata reads keyed on a file's identity as the filesystem
//! reports it, so rescanning a directory between runs doesn't re-decode
//! headers for files that haven't changed.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::SystemTime;

use crate::metadata::ImageMetadata;

/// `(size, mtime)` as reported by the filesystem at the time of the read
/// that populated the cache entry. A later read with a different key for
/// the same path is treated as a different file and simply replaces it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct CacheKey {
    size: u64,
    mtime_nanos: i128,
}

impl CacheKey {
    fn from_metadata(meta: &std::fs::Metadata) -> Option<Self> {
        let mtime = meta.modified().ok()?;
        let mtime_nanos = mtime
            .duration_since(SystemTime::UNIX_EPOCH)
            .map(|d| d.as_nanos() as i128)
            .unwrap_or_else(|e| -(e.duration().as_nanos() as i128));
        Some(CacheKey {
            size: meta.len(),
            mtime_nanos,
        })
    }
}

/// Thread-safe so it can sit behind a shared reference across a bounded
/// pool of reader threads; writers simply replace stale entries.
#[derive(Default)]
pub struct MetadataCache {
    entries: Mutex<HashMap<PathBuf, (CacheKey, ImageMetadata)>>,
}

impl MetadataCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a cached entry only if the path's current `(size, mtime)`
    /// still matches the one recorded when it was cached.
    pub fn get(&self, path: &Path) -> Option<ImageMetadata> {
        let key = CacheKey::from_metadata(&std::fs::metadata(path).ok()?)?;
        let entries = self.entries.lock().unwrap();
        let (cached_key, meta) = entries.get(path)?;
        (*cached_key == key).then(|| meta.clone())
    }

    /// Inserts or replaces the cached entry for `path`, tagging it with
    /// the current `(size, mtime)` so later reads can detect staleness.
    pub fn insert(&self, path: &Path, metadata: ImageMetadata) {
        let Ok(fs_meta) = std::fs::metadata(path) else {
            return;
        };
        let Some(key) = CacheKey::from_metadata(&fs_meta) else {
            return;
        };
        self.entries
            .lock()
            .unwrap()
            .insert(path.to_path_buf(), (key, metadata));
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame_type::FrameType;
    use std::io::Write;

    fn dummy_metadata(path: &Path) -> ImageMetadata {
        ImageMetadata {
            path: path.to_path_buf(),
            frame_type: FrameType::Flat,
            exposure: Some(5.0),
            binning: None,
            gain: None,
            offset: None,
            temperature: None,
            filter: None,
            date_obs: None,
        }
    }

    #[test]
    fn hit_after_insert() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.fits");
        std::fs::File::create(&path).unwrap().write_all(b"x").unwrap();

        let cache = MetadataCache::new();
        assert!(cache.get(&path).is_none());
        cache.insert(&path, dummy_metadata(&path));
        assert!(cache.get(&path).is_some());
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn miss_after_file_changes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.fits");
        std::fs::File::create(&path).unwrap().write_all(b"x").unwrap();

        let cache = MetadataCache::new();
        cache.insert(&path, dummy_metadata(&path));
        assert!(cache.get(&path).is_some());

        // Growing the file changes its size, invalidating the cached key.
        let mut f = std::fs::OpenOptions::new().append(true).open(&path).unwrap();
        f.write_all(b"yyyyyyyy").unwrap();
        drop(f);

        assert!(cache.get(&path).is_none());
    }

    #[test]
    fn missing_file_is_never_a_hit() {
        let cache = MetadataCache::new();
        assert!(cache.get(Path::new("/nonexistent/path.fits")).is_none());
    }
}
