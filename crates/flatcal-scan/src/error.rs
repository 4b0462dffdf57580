//! Error type for the scanner. Directory-level failures only: per-file
//! failures never reach here, they're recovered inside `flatcal-meta`'s
//! batch reader as fallback metadata records.

use std::path::PathBuf;

#[derive(Debug)]
#[non_exhaustive]
pub enum Error {
    /// A declared root does not exist.
    NotFound(PathBuf),
    /// A directory exists but could not be enumerated.
    AccessDenied(PathBuf),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound(path) => write!(f, "root not found: {}", path.display()),
            Self::AccessDenied(path) => write!(f, "access denied: {}", path.display()),
        }
    }
}

impl std::error::Error for Error {}

pub type Result<T> = std::result::Result<T, Error>;
