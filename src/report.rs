//! The report a run resolves to: aggregate counts, dark-usage and timing
//! statistics, and a warnings list, plus a textual [`std::fmt::Display`]
//! rendering for a host that just wants to print something useful.

use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

/// min/mean/max over a set of durations, or `None` if the set was empty.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DurationStats {
    pub min: Duration,
    pub mean: Duration,
    pub max: Duration,
}

impl DurationStats {
    fn from_durations(durations: &[Duration]) -> Option<Self> {
        if durations.is_empty() {
            return None;
        }
        let min = *durations.iter().min().unwrap();
        let max = *durations.iter().max().unwrap();
        let total: Duration = durations.iter().sum();
        let mean = total / durations.len() as u32;
        Some(Self { min, mean, max })
    }
}

/// min/mean/max dark temperature across the cataloged darks that reported
/// one, for a quick sanity check of the dark library's thermal spread.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DarkUsageStats {
    pub unique_darks_used: usize,
    pub unique_source_dirs: usize,
    pub catalog_temperature_min: Option<f64>,
    pub catalog_temperature_mean: Option<f64>,
    pub catalog_temperature_max: Option<f64>,
}

/// The end-of-run report: what happened, aggregated from every directory
/// job's [`flatcal_integrate::GroupOutcome`]s, plus scan-level diagnostics.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub groups_total: usize,
    pub groups_succeeded: usize,
    pub groups_failed: usize,
    pub groups_skipped: usize,
    pub dark_usage: Option<DarkUsageStats>,
    pub job_durations: Vec<Duration>,
    pub group_durations: Vec<Duration>,
    pub output_paths: Vec<PathBuf>,
    pub warnings: Vec<String>,
    pub cancelled: bool,
}

impl RunSummary {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub fn job_duration_stats(&self) -> Option<DurationStats> {
        DurationStats::from_durations(&self.job_durations)
    }

    pub fn group_duration_stats(&self) -> Option<DurationStats> {
        DurationStats::from_durations(&self.group_durations)
    }

    pub(crate) fn record_dark_usage(&mut self, used_paths: &HashSet<PathBuf>, catalog: &[flatcal_scan::DarkFrame]) {
        let unique_source_dirs: HashSet<&PathBuf> = catalog
            .iter()
            .filter(|d| used_paths.contains(&d.path))
            .map(|d| &d.origin_dir)
            .collect();

        let temps: Vec<f64> = catalog.iter().filter_map(|d| d.temperature).collect();
        let (min, mean, max) = if temps.is_empty() {
            (None, None, None)
        } else {
            let min = temps.iter().cloned().fold(f64::INFINITY, f64::min);
            let max = temps.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
            let mean = temps.iter().sum::<f64>() / temps.len() as f64;
            (Some(min), Some(mean), Some(max))
        };

        self.dark_usage = Some(DarkUsageStats {
            unique_darks_used: used_paths.len(),
            unique_source_dirs: unique_source_dirs.len(),
            catalog_temperature_min: min,
            catalog_temperature_mean: mean,
            catalog_temperature_max: max,
        });
    }
}

impl std::fmt::Display for RunSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "flat calibration run{}", if self.cancelled { " (cancelled)" } else { "" })?;
        writeln!(
            f,
            "  groups: {} total, {} succeeded, {} failed, {} skipped",
            self.groups_total, self.groups_succeeded, self.groups_failed, self.groups_skipped
        )?;
        if let Some(usage) = &self.dark_usage {
            writeln!(
                f,
                "  darks: {} unique frame(s) from {} source directory(ies)",
                usage.unique_darks_used, usage.unique_source_dirs
            )?;
            if let (Some(min), Some(mean), Some(max)) =
                (usage.catalog_temperature_min, usage.catalog_temperature_mean, usage.catalog_temperature_max)
            {
                writeln!(f, "  dark catalog temperature: min {min:.1}C mean {mean:.1}C max {max:.1}C")?;
            }
        }
        if let Some(stats) = self.job_duration_stats() {
            writeln!(
                f,
                "  job timing: min {:.2?} mean {:.2?} max {:.2?} over {} job(s)",
                stats.min,
                stats.mean,
                stats.max,
                self.job_durations.len()
            )?;
        }
        if let Some(stats) = self.group_duration_stats() {
            writeln!(
                f,
                "  group timing: min {:.2?} mean {:.2?} max {:.2?} over {} group(s)",
                stats.min,
                stats.mean,
                stats.max,
                self.group_durations.len()
            )?;
        }
        for warning in &self.warnings {
            writeln!(f, "  warning: {warning}")?;
        }
        Ok(())
    }
}
