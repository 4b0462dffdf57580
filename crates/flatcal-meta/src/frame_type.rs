/// What kind of calibration or science frame a file contains.
///
/// Ordering of the match list in [`FrameType::classify`] matters: compound
/// tokens must be checked before the substrings they contain, or `DARK`
/// would swallow `MASTERDARKFLAT` before it gets a chance to match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameType {
    Unknown,
    Light,
    Flat,
    Dark,
    DarkFlat,
    Bias,
    MasterFlat,
    MasterDark,
    MasterDarkFlat,
    MasterBias,
}

impl FrameType {
    pub fn is_dark_class(self) -> bool {
        matches!(
            self,
            Self::Dark | Self::DarkFlat | Self::MasterDark | Self::MasterDarkFlat
        )
    }

    pub fn is_bias_class(self) -> bool {
        matches!(self, Self::Bias | Self::MasterBias)
    }

    /// Longest-compound-wins token matching against an upper-cased string,
    /// used for both the header image-type string and the filename.
    fn classify(haystack_upper: &str) -> Self {
        const PRIORITY: &[(&str, FrameType)] = &[
            ("MASTERDARKFLAT", FrameType::MasterDarkFlat),
            ("MASTERDARK", FrameType::MasterDark),
            ("DARKFLAT", FrameType::DarkFlat),
            ("DARK", FrameType::Dark),
            ("MASTERFLAT", FrameType::MasterFlat),
            ("FLAT", FrameType::Flat),
            ("MASTERBIAS", FrameType::MasterBias),
            ("BIAS", FrameType::Bias),
            ("LIGHT", FrameType::Light),
        ];
        for (token, ty) in PRIORITY {
            if haystack_upper.contains(token) {
                return *ty;
            }
        }
        Self::Unknown
    }

    /// Infers frame type from the header's image-type string first, falling
    /// back to the filename when the header doesn't give a recognized type
    /// (matches the invariant that inference is deterministic from headers
    /// and, failing that, from the filename).
    pub fn infer(header_image_type: Option<&str>, filename: &str) -> Self {
        if let Some(header_type) = header_image_type {
            let from_header = Self::classify(&header_type.to_ascii_uppercase());
            if from_header != Self::Unknown {
                return from_header;
            }
        }
        Self::classify(&filename.to_ascii_uppercase())
    }
}
