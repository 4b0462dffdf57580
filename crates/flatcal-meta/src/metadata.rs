//! Typed metadata extracted from a frame's keywords, with filename fallback
//! for the two fields (exposure, temperature) that calibration frames
//! sometimes omit from their headers entirely.

use std::path::{Path, PathBuf};

use flatcal_grid::Keywords;

use crate::filename::{exposure_from_keyword_token, exposure_from_suffix_s, temperature_from_keyword_token};
use crate::frame_type::FrameType;

/// Keyword search order, first non-empty wins.
const EXPOSURE_KEYS: &[&str] = &["EXPTIME", "EXPOSURE", "EXPOSURETIME", "X_EXPOSURE"];
const BINNING_KEYS: &[&str] = &["XBINNING", "BINNING", "CCDBINNING", "BINNING_MODE"];
const GAIN_KEYS: &[&str] = &["GAIN", "EGAIN"];
const OFFSET_KEYS: &[&str] = &["OFFSET", "BLACKLEVEL"];
const TEMPERATURE_KEYS: &[&str] = &[
    "CCD-TEMP",
    "CCD_TEMP",
    "SENSOR_TEMP",
    "SENSOR-TEMP",
    "SET-TEMP",
    "SET_TEMP",
];
const FILTER_KEYS: &[&str] = &["FILTER", "INSFLNAM"];
const DATE_KEYS: &[&str] = &["DATE-OBS", "DATE_OBS", "DATE"];
const IMAGE_TYPE_KEYS: &[&str] = &["IMAGETYP", "FRAMETYPE", "FRAME"];

/// Everything downstream components need to know about one frame, without
/// holding its pixel data.
#[derive(Debug, Clone)]
pub struct ImageMetadata {
    pub path: PathBuf,
    pub frame_type: FrameType,
    pub exposure: Option<f64>,
    /// Normalized upper-case (e.g. `"1X1"`), so comparisons in the matcher
    /// and the `Bin<BINNING>` output name both use the canonical form.
    pub binning: Option<String>,
    pub gain: Option<f64>,
    pub offset: Option<f64>,
    pub temperature: Option<f64>,
    pub filter: Option<String>,
    pub date_obs: Option<String>,
}

impl ImageMetadata {
    /// Builds metadata from a decoded header and the path it came from.
    /// Exposure and temperature fall back to filename scrubbing when the
    /// header doesn't carry them; every other field is header-only.
    pub fn from_keywords(path: &Path, keywords: &Keywords) -> Self {
        let filename = path
            .file_name()
            .and_then(|f| f.to_str())
            .unwrap_or_default();

        let image_type = keywords.get_any(IMAGE_TYPE_KEYS);
        let frame_type = FrameType::infer(image_type, filename);

        let exposure = numeric_field(keywords, EXPOSURE_KEYS)
            .or_else(|| exposure_from_suffix_s(filename))
            .or_else(|| exposure_from_keyword_token(filename));

        let temperature = numeric_field(keywords, TEMPERATURE_KEYS)
            .or_else(|| temperature_from_keyword_token(filename));

        ImageMetadata {
            path: path.to_path_buf(),
            frame_type,
            exposure,
            binning: keywords.get_any(BINNING_KEYS).map(|v| v.to_ascii_uppercase()),
            gain: numeric_field(keywords, GAIN_KEYS),
            offset: numeric_field(keywords, OFFSET_KEYS),
            temperature,
            filter: keywords.get_any(FILTER_KEYS).map(String::from),
            date_obs: keywords.get_any(DATE_KEYS).map(String::from),
        }
    }

    /// A fallback record for a file that couldn't be read at all: frame
    /// type is inferred from the filename alone, every other field is
    /// absent. Batch reads use this rather than aborting on one bad file.
    pub fn unreadable(path: &Path) -> Self {
        let filename = path
            .file_name()
            .and_then(|f| f.to_str())
            .unwrap_or_default();
        ImageMetadata {
            path: path.to_path_buf(),
            frame_type: FrameType::infer(None, filename),
            exposure: None,
            binning: None,
            gain: None,
            offset: None,
            temperature: None,
            filter: None,
            date_obs: None,
        }
    }

    /// Grouping key for flats: same exposure key, same binning, same filter.
    pub fn exposure_key(&self) -> String {
        exposure_key(self.exposure)
    }
}

fn numeric_field(keywords: &Keywords, keys: &[&str]) -> Option<f64> {
    keywords.get_any(keys).and_then(|v| v.trim().parse::<f64>().ok())
}

/// `round_half_to_even(x, 3)` rendered with trailing zeros trimmed and a
/// trailing `s`. `None` renders as `"Unknown"`.
///
/// Examples: `1.0 -> "1s"`, `1.001 -> "1.001s"`, `0.5 -> "0.5s"`,
/// `10.125 -> "10.125s"`.
pub fn exposure_key(exposure: Option<f64>) -> String {
    match exposure {
        Some(value) => format!("{}s", format_exposure_trimmed(value)),
        None => "Unknown".to_string(),
    }
}

/// Rounds to 3 decimal places (ties to even) and trims trailing zeros and
/// a trailing decimal point.
pub fn format_exposure_trimmed(value: f64) -> String {
    let rounded = round_to_3_decimals(value);
    let mut s = format!("{rounded:.3}");
    while s.ends_with('0') {
        s.pop();
    }
    if s.ends_with('.') {
        s.pop();
    }
    s
}

/// Fixed 3-decimal rendering (no trimming), used for the matcher's
/// human-readable kind tags such as `"8.000s"`.
pub fn format_exposure_fixed3(value: f64) -> String {
    format!("{:.3}", round_to_3_decimals(value))
}

/// Rounds to 3 decimal places, ties to even — the canonical exposure value
/// an `ExposureGroup` is keyed on and the matcher's tier boundaries are
/// evaluated against, not whichever raw header value a group happened to
/// pick up first.
pub fn round_to_3_decimals(value: f64) -> f64 {
    (value * 1000.0).round_ties_even() / 1000.0
}
