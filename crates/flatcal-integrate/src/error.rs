//! Error type for the integration engine. One group's failure never
//! propagates past that group — see [`crate::GroupOutcome`] — so this type
//! exists to label *why* a given group failed, not to unwind a call stack.

#[derive(Debug)]
#[non_exhaustive]
pub enum Error {
    /// A flat's geometry didn't match the matched dark's, or the combine
    /// step produced a buffer of the wrong size.
    BadGeometry(String),
    /// The group required a dark (`require_darks`) and the matcher found
    /// none, at any tier.
    NoMatchingDark,
    Io(std::io::Error),
    Cancelled,
    /// An invariant this engine otherwise guarantees didn't hold; should
    /// not occur outside of a bug.
    Internal(String),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BadGeometry(msg) => write!(f, "bad geometry: {msg}"),
            Self::NoMatchingDark => write!(f, "no matching dark/bias available"),
            Self::Io(e) => write!(f, "I/O error: {e}"),
            Self::Cancelled => write!(f, "operation cancelled"),
            Self::Internal(msg) => write!(f, "internal error: {msg}"),
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

impl From<flatcal_image::Error> for Error {
    fn from(e: flatcal_image::Error) -> Self {
        match e {
            flatcal_image::Error::Io(io) => Self::Io(io),
            flatcal_image::Error::BadGeometry(msg) => Self::BadGeometry(msg),
            other => Self::Internal(other.to_string()),
        }
    }
}

impl From<flatcal_threadpool::Cancelled> for Error {
    fn from(_: flatcal_threadpool::Cancelled) -> Self {
        Self::Cancelled
    }
}

pub type Result<T> = std::result::Result<T, Error>;
