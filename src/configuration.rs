//! Pipeline configuration.
//!
//! [`PipelineOptions`] is a builder that threads filter settings, scratch
//! locations, progress callbacks, cancellation tokens, and other operational
//! settings into a [`Pipeline`](crate::Pipeline) run.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use posterize::{
//!     CancellationToken, FilterOptions, PaletteVariant, PipelineOptions, ProgressCallback,
//!     ProgressInfo, ScratchLayout,
//! };
//!
//! struct LogProgress;
//! impl ProgressCallback for LogProgress {
//!     fn on_progress(&self, info: &ProgressInfo) {
//!         println!("{}: {} done", info.stage, info.current);
//!     }
//! }
//!
//! let token = CancellationToken::new();
//! let options = PipelineOptions::new(FilterOptions::new(PaletteVariant::Ember).with_dither(true))
//!     .with_scratch(ScratchLayout::within("/tmp/posterize-job"))
//!     .with_progress(Arc::new(LogProgress))
//!     .with_cancellation(token.clone())
//!     .with_seed(7)
//!     .with_stage_timeout(Duration::from_secs(600));
//! ```

use std::env;
use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;
use std::time::Duration;

use crate::filter::FilterOptions;
use crate::frame::FrameNaming;
use crate::progress::{CancellationToken, NoOpProgress, ProgressCallback};
use crate::validation::{ValidationReport, validate_options, validate_run};

/// Shortest allowed interval between progress reports.
pub const MIN_REPORT_INTERVAL: Duration = Duration::from_millis(100);
/// Longest allowed interval between progress reports.
pub const MAX_REPORT_INTERVAL: Duration = Duration::from_secs(1);
/// Default interval between progress reports.
pub const DEFAULT_REPORT_INTERVAL: Duration = Duration::from_millis(250);

/// Where a run keeps its intermediate files.
///
/// Both directories are emptied at the start of the stage that fills them
/// and removed, together with the manifest, when the run ends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScratchLayout {
    /// Extracted source frames.
    pub input_directory: PathBuf,
    /// Filtered frames.
    pub output_directory: PathBuf,
    /// Frame list handed to the sink.
    pub manifest: PathBuf,
    root: Option<PathBuf>,
}

impl Default for ScratchLayout {
    /// A per-process directory under the system temporary directory.
    fn default() -> Self {
        Self::within(env::temp_dir().join(format!("posterize-{}", process::id())))
    }
}

impl ScratchLayout {
    /// Explicit locations. Nothing beyond these three paths is removed on
    /// cleanup.
    #[must_use]
    pub fn new<I, O, M>(input_directory: I, output_directory: O, manifest: M) -> Self
    where
        I: Into<PathBuf>,
        O: Into<PathBuf>,
        M: Into<PathBuf>,
    {
        Self {
            input_directory: input_directory.into(),
            output_directory: output_directory.into(),
            manifest: manifest.into(),
            root: None,
        }
    }

    /// `frames/`, `filtered/` and `frames.ffconcat` under `root`. The root
    /// itself is removed on cleanup if it is left empty.
    #[must_use]
    pub fn within<P: Into<PathBuf>>(root: P) -> Self {
        let root = root.into();
        Self {
            input_directory: root.join("frames"),
            output_directory: root.join("filtered"),
            manifest: root.join("frames.ffconcat"),
            root: Some(root),
        }
    }

    /// The shared parent created by [`within`](ScratchLayout::within).
    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }
}

/// Configuration for a pipeline run.
///
/// All fields have sensible defaults; only the filter settings are
/// required.
#[derive(Clone)]
pub struct PipelineOptions {
    pub(crate) filter: FilterOptions,
    pub(crate) scratch: ScratchLayout,
    /// Explicit output frame rate. `None` probes the source.
    pub(crate) frame_rate: Option<f64>,
    /// Worker limit. `None` uses the number of logical CPUs.
    pub(crate) max_parallelism: Option<usize>,
    pub(crate) seed: Option<u64>,
    pub(crate) progress: Arc<dyn ProgressCallback>,
    pub(crate) cancellation: Option<CancellationToken>,
    pub(crate) report_interval: Duration,
    pub(crate) stage_timeout: Option<Duration>,
    pub(crate) naming: FrameNaming,
}

impl Debug for PipelineOptions {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("PipelineOptions")
            .field("filter", &self.filter)
            .field("scratch", &self.scratch)
            .field("frame_rate", &self.frame_rate)
            .field("max_parallelism", &self.max_parallelism)
            .field("seed", &self.seed)
            .field("has_progress", &true)
            .field("has_cancellation", &self.cancellation.is_some())
            .field("report_interval", &self.report_interval)
            .field("stage_timeout", &self.stage_timeout)
            .field("naming", &self.naming)
            .finish()
    }
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self::new(FilterOptions::default())
    }
}

impl PipelineOptions {
    /// Options with the given filter settings and defaults for the rest.
    ///
    /// Defaults: per-process scratch directory, probed frame rate, one
    /// worker per logical CPU, unseeded randomness, no progress callback, no
    /// cancellation, 250 ms report interval, no stage timeout, six-digit
    /// frame names.
    pub fn new(filter: FilterOptions) -> Self {
        Self {
            filter,
            scratch: ScratchLayout::default(),
            frame_rate: None,
            max_parallelism: None,
            seed: None,
            progress: Arc::new(NoOpProgress),
            cancellation: None,
            report_interval: DEFAULT_REPORT_INTERVAL,
            stage_timeout: None,
            naming: FrameNaming::default(),
        }
    }

    /// Replace the filter settings.
    #[must_use]
    pub fn with_filter(mut self, filter: FilterOptions) -> Self {
        self.filter = filter;
        self
    }

    /// Use a specific scratch layout.
    #[must_use]
    pub fn with_scratch(mut self, scratch: ScratchLayout) -> Self {
        self.scratch = scratch;
        self
    }

    /// Extract and encode at `frame_rate` instead of the source's rate.
    #[must_use]
    pub fn with_frame_rate(mut self, frame_rate: f64) -> Self {
        self.frame_rate = Some(frame_rate);
        self
    }

    /// Cap the number of filtering workers.
    #[must_use]
    pub fn with_max_parallelism(mut self, workers: usize) -> Self {
        self.max_parallelism = Some(workers);
        self
    }

    /// Seed all randomness so a run is reproducible frame by frame.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Attach a progress callback.
    #[must_use]
    pub fn with_progress(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress = callback;
        self
    }

    /// Attach a cancellation token.
    ///
    /// When the token is cancelled the run stops, cleans up, and returns
    /// [`PosterizeError::Cancelled`](crate::PosterizeError::Cancelled).
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// Set how often progress is reported. Clamped to 100 ms..=1 s.
    #[must_use]
    pub fn with_report_interval(mut self, interval: Duration) -> Self {
        self.report_interval = interval.clamp(MIN_REPORT_INTERVAL, MAX_REPORT_INTERVAL);
        self
    }

    /// Fail any single stage that runs longer than `timeout`.
    #[must_use]
    pub fn with_stage_timeout(mut self, timeout: Duration) -> Self {
        self.stage_timeout = Some(timeout);
        self
    }

    /// Set the zero-padding width of scratch frame names.
    #[must_use]
    pub fn with_frame_digits(mut self, digits: usize) -> Self {
        self.naming = FrameNaming::with_digits(digits);
        self
    }

    /// The filter settings.
    pub fn filter(&self) -> &FilterOptions {
        &self.filter
    }

    /// The scratch layout.
    pub fn scratch(&self) -> &ScratchLayout {
        &self.scratch
    }

    /// The configured frame-rate override.
    pub fn frame_rate(&self) -> Option<f64> {
        self.frame_rate
    }

    /// The configured seed.
    pub fn seed(&self) -> Option<u64> {
        self.seed
    }

    /// The effective report interval.
    pub fn report_interval(&self) -> Duration {
        self.report_interval
    }

    /// The per-stage timeout.
    pub fn stage_timeout(&self) -> Option<Duration> {
        self.stage_timeout
    }

    /// The frame naming scheme.
    pub fn naming(&self) -> &FrameNaming {
        &self.naming
    }

    /// Worker limit after defaults: the explicit cap, or the number of
    /// logical CPUs, and never less than one.
    pub fn parallelism(&self) -> usize {
        self.max_parallelism.unwrap_or_else(num_cpus::get).max(1)
    }

    /// Check the options before a run.
    pub fn validate(&self) -> ValidationReport {
        validate_options(self)
    }

    /// Check the options together with the paths of one run. Adds an error
    /// when `input` or `output` lies where scratch cleanup would remove it.
    pub fn validate_run(
        &self,
        input: impl AsRef<Path>,
        output: impl AsRef<Path>,
    ) -> ValidationReport {
        validate_run(self, input.as_ref(), output.as_ref())
    }
}
