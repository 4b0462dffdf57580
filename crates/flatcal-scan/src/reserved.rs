//! Directory names the scanner never descends into: previously-written
//! output subtrees and dotfiles.

const RESERVED_NAMES: &[&str] = &["_darkmasters", "_calibratedflats", "masters", "_processed"];

const SUPPORTED_EXTENSIONS: &[&str] = &["fits", "fit", "xisf"];

/// True if `leaf` is a reserved output/hidden directory name the scanner
/// must skip, matched case-insensitively since the directories this skips
/// are produced by this same pipeline (or tools with similar casing habits),
/// not by a case-sensitive filesystem convention worth enforcing strictly.
pub fn is_reserved_dir_name(leaf: &str) -> bool {
    leaf.starts_with('.') || RESERVED_NAMES.iter().any(|r| leaf.eq_ignore_ascii_case(r))
}

/// True if `filename`'s extension is one this codec can read.
pub fn has_supported_extension(filename: &str) -> bool {
    std::path::Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| SUPPORTED_EXTENSIONS.iter().any(|s| ext.eq_ignore_ascii_case(s)))
}

/// True if `filename` is a previously-produced master flat that a rescan
/// must not consume again.
pub fn is_master_flat_output(filename: &str) -> bool {
    filename.to_ascii_lowercase().starts_with("masterflat_")
}
