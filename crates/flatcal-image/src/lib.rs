//! FITS and XISF codec.
//!
//! Dispatch is a tagged variant on file extension, not runtime polymorphism
//! over an open hierarchy: there are exactly two formats this pipeline ever
//! needs to read, and a third (or a plugin format) is not a design goal.

mod error;
mod fits;
mod xisf;

pub use error::{Error, Result};
pub use flatcal_grid::{ImageData, Keywords};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Fits,
    Xisf,
}

fn format_of(path: &std::path::Path) -> Result<Format> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("fits") | Some("fit") => Ok(Format::Fits),
        Some("xisf") => Ok(Format::Xisf),
        other => Err(Error::UnsupportedFormat(format!(
            "unrecognized extension: {other:?}"
        ))),
    }
}

/// Reads only the keyword header, without decoding pixel data.
pub fn read_headers(path: &std::path::Path) -> Result<Keywords> {
    match format_of(path)? {
        Format::Fits => fits::read_headers(path),
        Format::Xisf => xisf::read_headers(path),
    }
}

/// Reads keywords and the full decoded pixel plane.
pub fn read(path: &std::path::Path) -> Result<ImageData> {
    match format_of(path)? {
        Format::Fits => fits::read(path),
        Format::Xisf => xisf::read(path),
    }
}

/// Writes a monolithic XISF file with a single attached Float32 image.
pub fn write_xisf(path: &std::path::Path, image: &ImageData) -> Result<()> {
    xisf::write(path, image)
}

/// Writes a primary-HDU FITS file, `BITPIX=-32`, big-endian, 2880-aligned.
pub fn write_fits(path: &std::path::Path, image: &ImageData) -> Result<()> {
    fits::write(path, image)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_of_recognizes_extensions() {
        assert_eq!(format_of(std::path::Path::new("a.fits")).unwrap(), Format::Fits);
        assert_eq!(format_of(std::path::Path::new("a.fit")).unwrap(), Format::Fits);
        assert_eq!(format_of(std::path::Path::new("a.FITS")).unwrap(), Format::Fits);
        assert_eq!(format_of(std::path::Path::new("a.xisf")).unwrap(), Format::Xisf);
        assert!(format_of(std::path::Path::new("a.png")).is_err());
    }
}
