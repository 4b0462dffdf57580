//! Progress events streamed during a scan, single-producer/multi-consumer.
//! The channel is bounded and non-blocking on the send side: a slow or
//! absent consumer never stalls the scan, it just misses events, matching
//! "consumers are expected to be fast or lossy."

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::mpsc;

/// Running counts as of one progress event: directories visited so far,
/// files found so far per extension, and the directory just finished.
#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub dirs_visited: usize,
    pub files_by_extension: HashMap<String, usize>,
    pub current_path: PathBuf,
}

impl ProgressEvent {
    pub fn total_files(&self) -> usize {
        self.files_by_extension.values().sum()
    }
}

/// Send half of the progress channel. `emit` never blocks and never
/// panics on a full or disconnected channel — both are treated as "nobody
/// is listening right now," which is an expected, recoverable state.
#[derive(Clone)]
pub struct ProgressSender(mpsc::SyncSender<ProgressEvent>);

impl ProgressSender {
    pub fn emit(&self, event: ProgressEvent) {
        // `try_send` drops the event on `Full`/`Disconnected` rather than
        // blocking the scan on a lagging or absent consumer.
        let _ = self.0.try_send(event);
    }
}

/// Builds a bounded progress channel. `capacity` controls how many events
/// can queue before `emit` starts dropping them; a small capacity is
/// intentional here since events are frequent and cheaply superseded by
/// the next one.
pub fn channel(capacity: usize) -> (ProgressSender, mpsc::Receiver<ProgressEvent>) {
    let (tx, rx) = mpsc::sync_channel(capacity.max(1));
    (ProgressSender(tx), rx)
}

/// Accumulates running totals across a scan and turns each visited
/// directory into a [`ProgressEvent`].
#[derive(Debug, Default)]
pub(crate) struct ProgressTracker {
    dirs_visited: usize,
    files_by_extension: HashMap<String, usize>,
}

impl ProgressTracker {
    pub(crate) fn record_dir(&mut self, dir: &Path, files: &[PathBuf]) -> ProgressEvent {
        self.dirs_visited += 1;
        for file in files {
            if let Some(ext) = file.extension().and_then(|e| e.to_str()) {
                *self.files_by_extension.entry(ext.to_ascii_lowercase()).or_insert(0) += 1;
            }
        }
        ProgressEvent {
            dirs_visited: self.dirs_visited,
            files_by_extension: self.files_by_extension.clone(),
            current_path: dir.to_path_buf(),
        }
    }
}
