//! Run configuration validation.
//!
//! Provides [`PipelineOptions::validate`](crate::PipelineOptions::validate)
//! which inspects a configuration and returns a [`ValidationReport`]
//! describing it and any problems. The pipeline runs the same checks before
//! any stage starts and refuses a report with errors.
//!
//! # Example
//!
//! ```
//! use posterize::{FilterOptions, PaletteVariant, PipelineOptions};
//!
//! let options = PipelineOptions::new(FilterOptions::new(PaletteVariant::Violet))
//!     .with_frame_rate(0.0);
//! let report = options.validate();
//! assert!(!report.is_valid());
//! for error in &report.errors {
//!     println!("Error: {error}");
//! }
//! ```

use std::fmt::{Display, Formatter, Result as FmtResult};
use std::path::Path;
use std::time::Duration;

use crate::configuration::PipelineOptions;
use crate::error::PosterizeError;
use crate::utilities::is_within;

/// Frame rates above this get a warning.
const HIGH_FRAME_RATE: f64 = 240.0;
/// Stage timeouts below this get a warning.
const SHORT_TIMEOUT: Duration = Duration::from_secs(1);

/// Summary of configuration validation.
///
/// Contains lists of informational notices, warnings, and errors found during
/// validation.
#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    /// Informational notices (not problems).
    pub info: Vec<String>,
    /// Non-fatal issues that may affect the run.
    pub warnings: Vec<String>,
    /// Fatal issues that will prevent the run.
    pub errors: Vec<String>,
}

impl ValidationReport {
    /// Returns `true` if no errors were found.
    ///
    /// Warnings do not affect this result; only errors make the report
    /// invalid.
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Total number of issues (info + warnings + errors).
    pub fn issue_count(&self) -> usize {
        self.info.len() + self.warnings.len() + self.errors.len()
    }

    /// Convert a report with errors into [`PosterizeError::InvalidConfig`].
    pub fn into_result(self) -> Result<Self, PosterizeError> {
        if self.is_valid() {
            Ok(self)
        } else {
            Err(PosterizeError::InvalidConfig(self.errors.join("; ")))
        }
    }
}

impl Display for ValidationReport {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        for item in &self.info {
            writeln!(f, "[INFO] {item}")?;
        }
        for item in &self.warnings {
            writeln!(f, "[WARN] {item}")?;
        }
        for item in &self.errors {
            writeln!(f, "[ERROR] {item}")?;
        }
        if self.issue_count() == 0 {
            writeln!(f, "No issues found.")?;
        }
        Ok(())
    }
}

/// Run validation checks on pipeline options.
///
/// This function is called by [`PipelineOptions::validate`].
pub(crate) fn validate_options(options: &PipelineOptions) -> ValidationReport {
    let mut report = ValidationReport::default();
    let filter = &options.filter;

    // ── Filter ─────────────────────────────────────────────────────
    if let Some(level) = filter.compression {
        if level > 100 {
            report
                .errors
                .push(format!("Compression level {level} is outside 0..=100"));
        }
    }

    if let Some(stipple) = &filter.stipple {
        if stipple.iterations == 0 {
            report
                .warnings
                .push("Stipple with zero iterations produces fully transparent frames".to_string());
        }
    }

    report.info.push(format!(
        "Filter: {} palette, dither {}, compression {}, stipple {}",
        filter.palette,
        if filter.dither { "on" } else { "off" },
        filter
            .compression
            .map_or_else(|| "off".to_string(), |level| level.to_string()),
        if filter.stipple.is_some() { "on" } else { "off" },
    ));

    // ── Frame rate ─────────────────────────────────────────────────
    match options.frame_rate {
        Some(rate) if !rate.is_finite() || rate <= 0.0 => {
            report
                .errors
                .push(format!("Frame rate must be a positive number, got {rate}"));
        }
        Some(rate) if rate > HIGH_FRAME_RATE => {
            report.warnings.push(format!(
                "Unusually high frame rate ({rate:.1} fps); filtering may be slow"
            ));
        }
        Some(rate) => report.info.push(format!("Frame rate: {rate:.3} fps")),
        None => report
            .info
            .push("Frame rate: taken from the source video".to_string()),
    }

    // ── Workers ────────────────────────────────────────────────────
    if options.max_parallelism == Some(0) {
        report
            .warnings
            .push("Worker limit of 0 is treated as 1".to_string());
    }
    report
        .info
        .push(format!("Workers: up to {}", options.parallelism()));

    // ── Scratch layout ─────────────────────────────────────────────
    let scratch = &options.scratch;
    if scratch.input_directory == scratch.output_directory {
        report.errors.push(format!(
            "Scratch input and output directories are the same: {}",
            scratch.input_directory.display()
        ));
    } else if is_within(&scratch.input_directory, &scratch.output_directory)
        || is_within(&scratch.output_directory, &scratch.input_directory)
    {
        report.errors.push(format!(
            "Scratch directories must not be nested: {} and {}",
            scratch.input_directory.display(),
            scratch.output_directory.display()
        ));
    }
    if is_within(&scratch.input_directory, &scratch.manifest)
        || is_within(&scratch.output_directory, &scratch.manifest)
    {
        report.errors.push(format!(
            "Manifest path {} contains a scratch directory",
            scratch.manifest.display()
        ));
    }

    // ── Timeout ────────────────────────────────────────────────────
    if let Some(timeout) = options.stage_timeout {
        if timeout.is_zero() {
            report
                .errors
                .push("Stage timeout must be greater than zero".to_string());
        } else if timeout < SHORT_TIMEOUT {
            report.warnings.push(format!(
                "Stage timeout of {timeout:?} is likely too short for external tools"
            ));
        }
    }

    if let Some(seed) = options.seed {
        report.info.push(format!("Seed: {seed}"));
    }

    report
}

/// Run [`validate_options`] and check that `input` and `output` are out of
/// reach of scratch cleanup.
///
/// This function is called by [`PipelineOptions::validate_run`].
pub(crate) fn validate_run(
    options: &PipelineOptions,
    input: &Path,
    output: &Path,
) -> ValidationReport {
    let mut report = validate_options(options);
    let scratch = &options.scratch;

    for (role, path) in [("Input", input), ("Output", output)] {
        if is_within(path, &scratch.input_directory)
            || is_within(path, &scratch.output_directory)
        {
            report.errors.push(format!(
                "{role} {} is inside a scratch directory and would be deleted",
                path.display()
            ));
        } else if is_within(path, &scratch.manifest) {
            report
                .errors
                .push(format!("{role} {} is the scratch manifest path", path.display()));
        }
    }

    report
}
