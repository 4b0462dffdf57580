//! `ProcessingConfiguration`: the one piece of configuration *surface* this
//! core is allowed to know about. Loading it from a file, CLI flags, or
//! environment variables is the host's job; this is just the resulting
//! record, built with consuming `fn field(mut self, v: T) -> Self` setters
//! so a host can construct one inline without a derive macro.

/// σ thresholds and dark-matching policy knobs, plus the two pipeline-wide
/// switches (`delete_calibrated`, `require_darks`). Mirrors the table in
/// the data model section: every field has the documented default.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProcessingConfiguration {
    pub rejection_low_sigma: f64,
    pub rejection_high_sigma: f64,
    pub dark_matching_enforce_binning: bool,
    pub dark_matching_prefer_same_gain_offset: bool,
    pub dark_matching_prefer_closest_temp: bool,
    pub dark_matching_max_temp_delta_c: f64,
    pub dark_matching_allow_nearest_with_optimize: bool,
    pub delete_calibrated: bool,
    pub require_darks: bool,
}

impl Default for ProcessingConfiguration {
    fn default() -> Self {
        Self {
            rejection_low_sigma: 5.0,
            rejection_high_sigma: 5.0,
            dark_matching_enforce_binning: true,
            dark_matching_prefer_same_gain_offset: true,
            dark_matching_prefer_closest_temp: true,
            dark_matching_max_temp_delta_c: 5.0,
            dark_matching_allow_nearest_with_optimize: false,
            delete_calibrated: false,
            require_darks: false,
        }
    }
}

impl ProcessingConfiguration {
    pub fn rejection_low_sigma(mut self, v: f64) -> Self {
        self.rejection_low_sigma = v;
        self
    }

    pub fn rejection_high_sigma(mut self, v: f64) -> Self {
        self.rejection_high_sigma = v;
        self
    }

    pub fn dark_matching_enforce_binning(mut self, v: bool) -> Self {
        self.dark_matching_enforce_binning = v;
        self
    }

    pub fn dark_matching_prefer_same_gain_offset(mut self, v: bool) -> Self {
        self.dark_matching_prefer_same_gain_offset = v;
        self
    }

    pub fn dark_matching_prefer_closest_temp(mut self, v: bool) -> Self {
        self.dark_matching_prefer_closest_temp = v;
        self
    }

    pub fn dark_matching_max_temp_delta_c(mut self, v: f64) -> Self {
        self.dark_matching_max_temp_delta_c = v;
        self
    }

    pub fn dark_matching_allow_nearest_with_optimize(mut self, v: bool) -> Self {
        self.dark_matching_allow_nearest_with_optimize = v;
        self
    }

    pub fn delete_calibrated(mut self, v: bool) -> Self {
        self.delete_calibrated = v;
        self
    }

    pub fn require_darks(mut self, v: bool) -> Self {
        self.require_darks = v;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_documented_table() {
        let config = ProcessingConfiguration::default();
        assert_eq!(config.rejection_low_sigma, 5.0);
        assert_eq!(config.rejection_high_sigma, 5.0);
        assert_eq!(config.dark_matching_max_temp_delta_c, 5.0);
        assert!(!config.dark_matching_allow_nearest_with_optimize);
        assert!(!config.delete_calibrated);
        assert!(!config.require_darks);
    }

    #[test]
    fn builder_setters_chain() {
        let config = ProcessingConfiguration::default()
            .require_darks(true)
            .dark_matching_allow_nearest_with_optimize(true)
            .rejection_low_sigma(4.0);
        assert!(config.require_darks);
        assert!(config.dark_matching_allow_nearest_with_optimize);
        assert_eq!(config.rejection_low_sigma, 4.0);
    }
}
