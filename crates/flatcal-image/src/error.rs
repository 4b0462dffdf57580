//! Error type for the codec crate. Hand-rolled rather than via a derive
//! macro: this crate sits at the bottom of the stack and its failure modes
//! are few and fixed.

#[derive(Debug)]
#[non_exhaustive]
pub enum Error {
    Io(std::io::Error),
    /// The file ended before a complete header (FITS) or the XISF signature
    /// and header block could be read.
    TruncatedHeader,
    /// A header card or XML element could not be parsed, but carries enough
    /// damage that recovery isn't possible.
    MalformedHeader(String),
    /// A pixel sample format was read, but isn't one this codec decodes.
    UnsupportedFormat(String),
    /// Geometry (width/height/channels) didn't match what the caller
    /// expected, or describes an unreadable amount of pixel data.
    BadGeometry(String),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O error: {e}"),
            Self::TruncatedHeader => write!(f, "truncated header"),
            Self::MalformedHeader(msg) => write!(f, "malformed header: {msg}"),
            Self::UnsupportedFormat(msg) => write!(f, "unsupported sample format: {msg}"),
            Self::BadGeometry(msg) => write!(f, "bad geometry: {msg}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
