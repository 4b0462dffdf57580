//! Breadth-first directory walk shared by flat and dark scanning. Both
//! scans need the same traversal (skip reserved/hidden subtrees, find
//! supported files per directory, emit progress); they differ only in
//! what they do with each directory's files, which the caller supplies as
//! a closure.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use flatcal_threadpool::CancellationToken;

use crate::error::Error;
use crate::progress::{ProgressSender, ProgressTracker};
use crate::reserved::{has_supported_extension, is_reserved_dir_name};

/// Walks every root breadth-first, calling `on_dir(root, dir, files)` for
/// each visited directory that contains at least one supported file, in
/// discovery order within a root (but no order is promised *across*
/// roots or siblings — see the ordering guarantees in the concurrency
/// model). `root` is passed through so callers that need to compute an
/// output path relative to the root a directory was found under don't have
/// to re-derive it. Returns `true` if the walk ran to completion, `false`
/// if it stopped early because `cancel` was observed set. Per-root and
/// per-directory failures (§7's `NotFound`/`AccessDenied`) never abort the
/// walk; they're logged and appended to `errors` for the caller to surface
/// in a run summary.
pub(crate) fn walk_roots(
    roots: &[PathBuf],
    progress: &ProgressSender,
    cancel: &CancellationToken,
    errors: &mut Vec<Error>,
    mut on_dir: impl FnMut(&Path, &Path, Vec<PathBuf>),
) -> bool {
    let mut tracker = ProgressTracker::default();

    for root in roots {
        if !root.exists() {
            tracing::warn!(path = %root.display(), "root not found, skipping");
            errors.push(Error::NotFound(root.clone()));
            continue;
        }
        if !walk_one_root(root, &mut tracker, progress, cancel, errors, &mut on_dir) {
            return false;
        }
    }
    true
}

fn walk_one_root(
    root: &Path,
    tracker: &mut ProgressTracker,
    progress: &ProgressSender,
    cancel: &CancellationToken,
    errors: &mut Vec<Error>,
    on_dir: &mut impl FnMut(&Path, &Path, Vec<PathBuf>),
) -> bool {
    let mut queue = VecDeque::new();
    queue.push_back(root.to_path_buf());

    while let Some(dir) = queue.pop_front() {
        if cancel.is_cancelled() {
            return false;
        }

        let entries = match std::fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(path = %dir.display(), error = %e, "could not enumerate directory, skipping");
                errors.push(Error::AccessDenied(dir.clone()));
                continue;
            }
        };

        let mut files = Vec::new();
        for entry in entries {
            let Ok(entry) = entry else { continue };
            let path = entry.path();
            let Ok(file_type) = entry.file_type() else { continue };

            if file_type.is_dir() {
                let leaf = entry.file_name();
                let leaf = leaf.to_string_lossy();
                if !is_reserved_dir_name(&leaf) {
                    queue.push_back(path);
                }
            } else if file_type.is_file() {
                let name = entry.file_name();
                if has_supported_extension(&name.to_string_lossy()) {
                    files.push(path);
                }
            }
        }

        if !files.is_empty() {
            on_dir(root, &dir, files.clone());
        }
        progress.emit(tracker.record_dir(&dir, &files));
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::channel;
    use std::sync::{Arc, Mutex};

    fn touch(path: &Path) {
        std::fs::write(path, b"x").unwrap();
    }

    #[test]
    fn skips_reserved_and_hidden_subtrees() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        std::fs::create_dir_all(root.join("Flats")).unwrap();
        std::fs::create_dir_all(root.join("_processed")).unwrap();
        std::fs::create_dir_all(root.join(".hidden")).unwrap();
        touch(&root.join("Flats/flat_001.fits"));
        touch(&root.join("_processed/masterflat_bin1.xisf"));
        touch(&root.join(".hidden/flat_999.fits"));

        let visited = Arc::new(Mutex::new(Vec::new()));
        let (tx, _rx) = channel(64);
        let cancel = CancellationToken::new();
        let mut errors = Vec::new();
        let v = visited.clone();
        walk_roots(&[root.to_path_buf()], &tx, &cancel, &mut errors, |_root, dir, _files| {
            v.lock().unwrap().push(dir.to_path_buf());
        });

        let visited = visited.lock().unwrap();
        assert!(visited.iter().any(|p| p.ends_with("Flats")));
        assert!(!visited.iter().any(|p| p.ends_with("_processed")));
        assert!(!visited.iter().any(|p| p.ends_with(".hidden")));
    }

    #[test]
    fn ignores_unsupported_extensions() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        touch(&root.join("readme.txt"));
        touch(&root.join("flat_001.fits"));

        let seen_files = Arc::new(Mutex::new(Vec::new()));
        let (tx, _rx) = channel(64);
        let cancel = CancellationToken::new();
        let mut errors = Vec::new();
        let seen = seen_files.clone();
        walk_roots(&[root.to_path_buf()], &tx, &cancel, &mut errors, |_root, _dir, files| {
            seen.lock().unwrap().extend(files);
        });

        let seen = seen_files.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert!(seen[0].ends_with("flat_001.fits"));
    }

    #[test]
    fn already_cancelled_token_stops_the_walk_immediately() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("flat_001.fits"));
        let (tx, _rx) = channel(64);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let mut errors = Vec::new();
        let completed = walk_roots(&[dir.path().to_path_buf()], &tx, &cancel, &mut errors, |_, _, _| {
            panic!("on_dir should not be called once cancelled");
        });
        assert!(!completed);
    }

    #[test]
    fn missing_root_logs_and_yields_nothing() {
        let (tx, _rx) = channel(64);
        let cancel = CancellationToken::new();
        let mut calls = 0;
        let mut errors = Vec::new();
        let completed = walk_roots(&[PathBuf::from("/no/such/root/path")], &tx, &cancel, &mut errors, |_, _, _| {
            calls += 1;
        });
        assert!(completed);
        assert_eq!(calls, 0);
        assert_eq!(errors.len(), 1);
        assert!(matches!(errors[0], Error::NotFound(_)));
    }
}
