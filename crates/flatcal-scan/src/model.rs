//! The data model the scanner produces and the matcher/engine consume:
//! exposure groups, directory jobs, and cataloged dark/bias frames.

use std::path::{Path, PathBuf};

use flatcal_meta::{FrameType, ImageMetadata};

/// The subset of a group's representative metadata the matcher scores
/// candidates against, snapshotted out of the `ExposureGroup` so the
/// matcher doesn't need to hold a borrow of it.
#[derive(Debug, Clone, Default)]
pub struct MatchCriteria {
    pub binning: Option<String>,
    pub gain: Option<f64>,
    pub offset: Option<f64>,
    pub temperature: Option<f64>,
}

impl From<&ExposureGroup> for MatchCriteria {
    fn from(group: &ExposureGroup) -> Self {
        Self {
            binning: group.binning().map(str::to_string),
            gain: group.gain(),
            offset: group.offset(),
            temperature: group.temperature(),
        }
    }
}

/// A bag of frame paths sharing one rounded exposure, ordered for
/// deterministic stacking.
#[derive(Debug, Clone)]
pub struct ExposureGroup {
    pub exposure: f64,
    /// Sorted ascending, case-insensitively, by filename.
    pub paths: Vec<PathBuf>,
    pub representative: ImageMetadata,
}

impl ExposureGroup {
    /// Builds a group from unsorted metadata records sharing one exposure
    /// key. Returns `None` for an empty input — callers only ever call this
    /// with at least one record per group.
    pub fn from_records(exposure: f64, mut records: Vec<ImageMetadata>) -> Option<Self> {
        if records.is_empty() {
            return None;
        }
        records.sort_by(|a, b| filename_lowercase(&a.path).cmp(&filename_lowercase(&b.path)));
        let representative = records[0].clone();
        let paths = records.into_iter().map(|r| r.path).collect();
        Some(Self {
            exposure,
            paths,
            representative,
        })
    }

    /// `|paths| >= 3`: groups below this floor never reach integration.
    pub fn is_valid(&self) -> bool {
        self.paths.len() >= 3
    }

    pub fn exposure_key(&self) -> String {
        flatcal_meta::exposure_key(Some(self.exposure))
    }

    pub fn binning(&self) -> Option<&str> {
        self.representative.binning.as_deref()
    }

    pub fn gain(&self) -> Option<f64> {
        self.representative.gain
    }

    pub fn offset(&self) -> Option<f64> {
        self.representative.offset
    }

    pub fn temperature(&self) -> Option<f64> {
        self.representative.temperature
    }
}

fn filename_lowercase(path: &Path) -> String {
    path.file_name()
        .and_then(|f| f.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase()
}

/// A unit of work for the integration engine: one leaf directory's valid
/// exposure groups, plus enough path context to know where the master(s)
/// it produces should be written.
#[derive(Debug, Clone)]
pub struct DirectoryJob {
    pub source_dir: PathBuf,
    pub base_root: PathBuf,
    pub output_root: PathBuf,
    pub relative_dir: PathBuf,
    pub groups: Vec<ExposureGroup>,
}

/// A calibration candidate cataloged from a dark-library root.
#[derive(Debug, Clone)]
pub struct DarkFrame {
    pub path: PathBuf,
    pub frame_type: FrameType,
    pub exposure: f64,
    pub binning: Option<String>,
    pub gain: Option<f64>,
    pub offset: Option<f64>,
    pub temperature: Option<f64>,
    /// Set by a host UI when a user pins a specific dark for a group,
    /// overriding the tiered policy. The core carries the field but never
    /// sets it itself — that's an external collaborator's concern.
    pub user_selected: bool,
    /// The directory this frame was discovered under, for the summary
    /// report's "unique dark source directories" aggregate.
    pub origin_dir: PathBuf,
}

impl DarkFrame {
    /// Builds a cataloged dark/bias frame from metadata, or `None` if the
    /// frame's type/exposure combination isn't eligible for cataloging
    /// (§4.3): dark-class frames need a present exposure, bias-class
    /// frames default to exposure zero when absent.
    pub fn from_metadata(meta: &ImageMetadata, origin_dir: &Path) -> Option<Self> {
        let exposure = if meta.frame_type.is_dark_class() {
            meta.exposure?
        } else if meta.frame_type.is_bias_class() {
            meta.exposure.unwrap_or(0.0)
        } else {
            return None;
        };
        Some(Self {
            path: meta.path.clone(),
            frame_type: meta.frame_type,
            exposure,
            binning: meta.binning.clone(),
            gain: meta.gain,
            offset: meta.offset,
            temperature: meta.temperature,
            user_selected: false,
            origin_dir: origin_dir.to_path_buf(),
        })
    }
}
