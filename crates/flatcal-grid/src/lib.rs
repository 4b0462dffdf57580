//! Shared pixel-plane buffer, keyword map, and statistics used by every other
//! `flatcal-*` crate. Kept dependency-free (besides `tracing`) since it sits
//! at the bottom of the workspace's dependency graph, underneath every
//! codec and pipeline crate above it.

mod keywords;
mod median;
mod stats;

pub use keywords::Keywords;
pub use median::median_exact;
pub use stats::{mean, sample_std};

/// A decoded pixel plane in memory: row-major, one `f64` per sample.
///
/// Integer sample formats are normalized into a bounded float range at
/// decode time (see the codec crate); floating-point formats are passed
/// through unchanged. `ImageData` itself makes no assumption about which —
/// by the time pixels reach here, they're already comparable floats.
#[derive(Debug, Clone)]
pub struct ImageData {
    width: usize,
    height: usize,
    channels: usize,
    pixels: Vec<f64>,
    keywords: Keywords,
}

impl ImageData {
    /// Builds an `ImageData`, panicking if `pixels.len()` doesn't match
    /// `width * height * channels`. Every producer in this workspace computes
    /// the buffer length from the same geometry it reports here, so a
    /// mismatch is a caller bug, not a runtime condition to recover from.
    pub fn new(width: usize, height: usize, channels: usize, pixels: Vec<f64>, keywords: Keywords) -> Self {
        assert_eq!(
            pixels.len(),
            width * height * channels,
            "pixel buffer length does not match width*height*channels"
        );
        Self {
            width,
            height,
            channels,
            pixels,
            keywords,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn pixels(&self) -> &[f64] {
        &self.pixels
    }

    pub fn pixels_mut(&mut self) -> &mut [f64] {
        &mut self.pixels
    }

    pub fn into_pixels(self) -> Vec<f64> {
        self.pixels
    }

    pub fn keywords(&self) -> &Keywords {
        &self.keywords
    }

    pub fn keywords_mut(&mut self) -> &mut Keywords {
        &mut self.keywords
    }

    pub fn same_geometry(&self, other: &ImageData) -> bool {
        self.width == other.width && self.height == other.height && self.channels == other.channels
    }

    /// The exact median over every sample in the plane, via the histogram
    /// refinement in [`median_exact`].
    pub fn median(&self) -> f64 {
        median_exact(&self.pixels)
    }

    pub fn mean(&self) -> f64 {
        mean(&self.pixels)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn median_matches_across_constant_plane() {
        let data = ImageData::new(4, 4, 1, vec![0.5; 16], Keywords::new());
        assert_eq!(data.median(), 0.5);
    }

    #[test]
    #[should_panic(expected = "pixel buffer length")]
    fn new_panics_on_geometry_mismatch() {
        let _ = ImageData::new(4, 4, 1, vec![0.0; 10], Keywords::new());
    }

    #[test]
    fn same_geometry_checks_all_three_dims() {
        let a = ImageData::new(4, 4, 1, vec![0.0; 16], Keywords::new());
        let b = ImageData::new(4, 4, 3, vec![0.0; 48], Keywords::new());
        assert!(!a.same_geometry(&b));
    }
}
