//! Master-flat output naming (§4.5 step 8, §6): filter and date derivation
//! from filesystem paths, and the fixed `MasterFlat_...` template.

use std::path::{Path, PathBuf};

use chrono::Utc;

use flatcal_meta::format_exposure_trimmed;
use flatcal_scan::{DirectoryJob, ExposureGroup};

use crate::error::Result;

const COMPOUND_FILTERS: &[&str] = &["OIII", "SII", "NII"];
const SINGLE_LETTER_FILTERS: &[char] = &['L', 'R', 'G', 'B', 'S', 'H', 'O'];

/// Looks for a filter token in `filename` (`Ha`, `SII`, `OIII`, `L`, an
/// optional leading `FILTER` label and separator are simply ignored as
/// their own non-matching tokens), falling back to the upper-cased parent
/// directory name when nothing matches.
pub(crate) fn derive_filter(filename: &str, parent_dir_name: &str) -> String {
    let upper = filename.to_ascii_uppercase();
    for token in upper.split(|c: char| !c.is_ascii_alphanumeric()) {
        if token.is_empty() {
            continue;
        }
        if let Some(&compound) = COMPOUND_FILTERS.iter().find(|&&c| c == token) {
            return compound.to_string();
        }
        let mut chars = token.chars();
        if let Some(first) = chars.next() {
            if SINGLE_LETTER_FILTERS.contains(&first) {
                match (chars.next(), chars.next()) {
                    (None, _) => return first.to_string(),
                    (Some('A'), None) => return format!("{first}A"),
                    _ => {}
                }
            }
        }
    }
    parent_dir_name.to_ascii_uppercase()
}

/// Looks for a `20YY-MM-DD` token anywhere in `path`, falling back to
/// today's UTC date.
pub(crate) fn derive_date(path: &Path) -> String {
    let text = path.to_string_lossy();
    find_date_token(&text).unwrap_or_else(|| Utc::now().format("%Y-%m-%d").to_string())
}

fn find_date_token(text: &str) -> Option<String> {
    if text.len() < 10 {
        return None;
    }
    for start in 0..=text.len() - 10 {
        // `text` may contain multi-byte characters; only slice on a
        // boundary, and only where it's worth checking at all.
        if !text.is_char_boundary(start) {
            continue;
        }
        let end = start + 10;
        if !text.is_char_boundary(end) {
            continue;
        }
        let candidate = &text[start..end];
        if is_date_token(candidate) {
            return Some(candidate.to_string());
        }
    }
    None
}

fn is_date_token(s: &str) -> bool {
    let bytes = s.as_bytes();
    bytes.len() == 10
        && &s[0..2] == "20"
        && bytes[2].is_ascii_digit()
        && bytes[3].is_ascii_digit()
        && bytes[4] == b'-'
        && bytes[5].is_ascii_digit()
        && bytes[6].is_ascii_digit()
        && bytes[7] == b'-'
        && bytes[8].is_ascii_digit()
        && bytes[9].is_ascii_digit()
}

/// `MasterFlat_<DATE>_<FILTER_UPPER>_Bin<BINNING>_<EXP_3DP>s.xisf`.
pub(crate) fn master_flat_filename(date: &str, filter: &str, binning: &str, exposure: f64) -> String {
    format!("MasterFlat_{date}_{filter}_Bin{binning}_{}s.xisf", format_exposure_trimmed(exposure))
}

/// Picks the binning label for the output filename: the group's own
/// criteria when the flats carried one, else the matched dark's, else
/// `"1"` — a flat/dark pair with neither header is assumed unbinned.
pub(crate) fn derive_binning_label(group: &ExposureGroup, dark_binning: &Option<String>) -> String {
    group
        .binning()
        .map(str::to_string)
        .or_else(|| dark_binning.clone())
        .unwrap_or_else(|| "1".to_string())
}

/// Builds the full output path for a group's master flat under
/// `job.output_root/job.relative_dir`.
pub(crate) fn build_output_path(job: &DirectoryJob, group: &ExposureGroup, representative_path: &Path, binning: &str) -> Result<PathBuf> {
    let representative_name = representative_path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
    let parent_name = job.source_dir.file_name().and_then(|n| n.to_str()).unwrap_or_default();
    let filter = derive_filter(representative_name, parent_name);
    let date = derive_date(&job.source_dir);
    let filename = master_flat_filename(&date, &filter, binning, group.exposure);
    Ok(job.output_root.join(&job.relative_dir).join(filename))
}
