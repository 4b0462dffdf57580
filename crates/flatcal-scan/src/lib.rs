//! Directory scanning: breadth-first traversal that skips output subtrees
//! and dotfiles, groups flat frames by exposure into per-directory jobs,
//! and catalogs dark/bias frames with post-scan temperature backfill.
//!
//! Also the home of [`ProcessingConfiguration`] and the other plain data
//! types the rest of the pipeline shares (`ExposureGroup`, `DirectoryJob`,
//! `DarkFrame`): they're part of the scanner's output contract, and this
//! is the lowest crate in the workspace both the matcher and the
//! integration engine depend on.

mod backfill;
mod config;
mod darks;
mod error;
mod flats;
mod model;
mod progress;
mod reserved;
mod walk;

pub use config::ProcessingConfiguration;
pub use darks::{scan_darks, DarkScanOutcome};
pub use error::{Error, Result};
pub use flats::{scan_flats, FlatScanOutcome};
pub use model::{DarkFrame, DirectoryJob, ExposureGroup, MatchCriteria};
pub use progress::{channel, ProgressEvent, ProgressSender};
pub use reserved::{has_supported_extension, is_master_flat_output, is_reserved_dir_name};

pub use flatcal_threadpool::CancellationToken;
