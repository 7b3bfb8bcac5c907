//! Progress reporting and cancellation support.
//!
//! This module provides [`ProgressTracker`], the shared counter workers bump
//! as they finish frames, [`ProgressCallback`] for observing a run,
//! [`CancellationToken`] for cooperative cancellation, and [`ProgressInfo`]
//! for progress snapshots.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use posterize::{
//!     FilterOptions, PaletteVariant, Pipeline, PipelineOptions, PosterizeError,
//!     ProgressCallback, ProgressInfo,
//! };
//!
//! struct PrintProgress;
//!
//! impl ProgressCallback for PrintProgress {
//!     fn on_progress(&self, info: &ProgressInfo) {
//!         if let Some(pct) = info.percentage {
//!             println!("[{}] {pct:.1}% complete", info.stage);
//!         }
//!     }
//! }
//!
//! let options = PipelineOptions::new(FilterOptions::new(PaletteVariant::Violet))
//!     .with_progress(Arc::new(PrintProgress));
//! let mut pipeline = Pipeline::ffmpeg(options);
//! pipeline.run("input.mp4", "output.mp4")?;
//! # Ok::<(), PosterizeError>(())
//! ```

use std::fmt::{Display, Formatter, Result as FmtResult};
use std::sync::{
    Arc,
    atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering},
};
use std::time::{Duration, Instant};

/// Highest percentage reported while any worker is still running.
const PENDING_CEILING: f32 = 99.9;

/// The pipeline stage currently in progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum Stage {
    /// Decoding the source video into frame images.
    Extracting,
    /// Reclassifying frame pixels.
    Filtering,
    /// Encoding filtered frames and muxing the original audio.
    Reassembling,
    /// Removing scratch state.
    Cleaning,
}

impl Display for Stage {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        let name = match self {
            Stage::Extracting => "extract",
            Stage::Filtering => "filter",
            Stage::Reassembling => "reassemble",
            Stage::Cleaning => "clean",
        };
        f.write_str(name)
    }
}

/// A snapshot of pipeline progress.
#[derive(Debug, Clone)]
pub struct ProgressInfo {
    /// Which stage is running.
    pub stage: Stage,
    /// Frames handled so far in this stage.
    pub current: u64,
    /// Total frames expected, if known.
    pub total: Option<u64>,
    /// Completion percentage (0.0 to 100.0), if `total` is known.
    pub percentage: Option<f32>,
    /// Wall-clock time elapsed since the stage started.
    pub elapsed: Duration,
    /// Estimated time remaining, based on current throughput.
    pub estimated_remaining: Option<Duration>,
}

/// Trait for receiving progress updates during a run.
///
/// Implementations must be [`Send`] and [`Sync`]; the pipeline may hand the
/// callback to other threads.
///
/// Progress callbacks are **infallible**: they observe but cannot halt
/// the run. Use [`CancellationToken`] for cooperative cancellation.
pub trait ProgressCallback: Send + Sync {
    /// Called whenever the pipeline publishes a progress snapshot.
    fn on_progress(&self, info: &ProgressInfo);
}

/// A no-op implementation that discards all progress notifications.
///
/// This is the default when no callback is configured.
pub(crate) struct NoOpProgress;

impl ProgressCallback for NoOpProgress {
    fn on_progress(&self, _info: &ProgressInfo) {}
}

/// Cooperative cancellation token backed by an [`AtomicBool`].
///
/// Clone this token and share it between threads; call [`cancel`](CancellationToken::cancel)
/// from any thread to request cancellation. Filtering workers check it
/// between frames and external tools are killed when it fires.
///
/// # Example
///
/// ```
/// use posterize::CancellationToken;
///
/// let token = CancellationToken::new();
/// assert!(!token.is_cancelled());
///
/// // From another thread (or a signal handler, etc.):
/// token.cancel();
/// assert!(token.is_cancelled());
/// ```
#[derive(Debug, Clone)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Create a new, non-cancelled token.
    pub fn new() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Request cancellation.
    ///
    /// All clones of this token will observe the cancellation.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    /// Check whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared completion counter for the filtering stage.
///
/// Workers call [`record_frame`](ProgressTracker::record_frame) once per
/// handled frame and [`worker_finished`](ProgressTracker::worker_finished)
/// when their range is done. The percentage never decreases and reads
/// exactly 100 only after every worker has finished.
///
/// # Example
///
/// ```
/// use posterize::ProgressTracker;
///
/// let tracker = ProgressTracker::new(4, 1);
/// for _ in 0..4 {
///     tracker.record_frame();
/// }
/// assert!(tracker.percentage() < 100.0);
/// tracker.worker_finished();
/// assert_eq!(tracker.percentage(), 100.0);
/// ```
#[derive(Debug)]
pub struct ProgressTracker {
    total: u64,
    completed: AtomicU64,
    outstanding_workers: AtomicUsize,
}

impl ProgressTracker {
    /// Tracker for `total` frames handled by `workers` workers.
    pub fn new(total: u64, workers: usize) -> Self {
        Self {
            total,
            completed: AtomicU64::new(0),
            outstanding_workers: AtomicUsize::new(workers),
        }
    }

    /// Record one handled frame. Returns the new completed count, which
    /// never exceeds the total.
    pub fn record_frame(&self) -> u64 {
        let total = self.total;
        let previous = self
            .completed
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                (current < total).then_some(current + 1)
            })
            .unwrap_or(total);
        (previous + 1).min(total)
    }

    /// Mark one worker as finished.
    pub fn worker_finished(&self) {
        let _ = self
            .outstanding_workers
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                current.checked_sub(1)
            });
    }

    /// Frames handled so far.
    pub fn completed(&self) -> u64 {
        self.completed.load(Ordering::Acquire)
    }

    /// Total frames in the stage.
    pub fn total(&self) -> u64 {
        self.total
    }

    /// Workers that have not finished yet.
    pub fn outstanding_workers(&self) -> usize {
        self.outstanding_workers.load(Ordering::Acquire)
    }

    /// `true` once every worker has finished.
    pub fn is_complete(&self) -> bool {
        self.outstanding_workers() == 0
    }

    /// Completion percentage in `[0, 100]`.
    pub fn percentage(&self) -> f32 {
        if self.is_complete() {
            return 100.0;
        }
        if self.total == 0 {
            return 0.0;
        }
        let raw = self.completed() as f32 / self.total as f32 * 100.0;
        raw.clamp(0.0, PENDING_CEILING)
    }
}

/// Throttles snapshots of a stage onto a [`ProgressCallback`].
pub(crate) struct ProgressReporter {
    callback: Arc<dyn ProgressCallback>,
    stage: Stage,
    interval: Duration,
    start_time: Instant,
    last_report: Option<Instant>,
}

impl ProgressReporter {
    pub(crate) fn new(
        callback: Arc<dyn ProgressCallback>,
        stage: Stage,
        interval: Duration,
    ) -> Self {
        Self {
            callback,
            stage,
            interval,
            start_time: Instant::now(),
            last_report: None,
        }
    }

    pub(crate) fn interval(&self) -> Duration {
        self.interval
    }

    /// Report a stage with no frame count, such as an external tool run.
    pub(crate) fn started(&mut self) {
        self.emit(0, None, None);
    }

    /// Report the tracker if the interval has elapsed since the last report.
    pub(crate) fn observe(&mut self, tracker: &ProgressTracker) {
        let due = self
            .last_report
            .is_none_or(|last| last.elapsed() >= self.interval);
        if due {
            self.report(tracker);
        }
    }

    /// Unconditionally report the tracker.
    pub(crate) fn report(&mut self, tracker: &ProgressTracker) {
        self.emit(
            tracker.completed(),
            Some(tracker.total()),
            Some(tracker.percentage()),
        );
    }

    /// Report a stage that completed without frame accounting.
    pub(crate) fn finished(&mut self) {
        self.emit(0, None, Some(100.0));
    }

    fn emit(&mut self, current: u64, total: Option<u64>, percentage: Option<f32>) {
        let elapsed = self.start_time.elapsed();

        let estimated_remaining = match total {
            Some(total) if current > 0 => {
                let remaining = total.saturating_sub(current);
                let per_item = elapsed.div_f64(current as f64);
                Some(per_item.mul_f64(remaining as f64))
            }
            _ => None,
        };

        let info = ProgressInfo {
            stage: self.stage,
            current,
            total,
            percentage,
            elapsed,
            estimated_remaining,
        };

        self.last_report = Some(Instant::now());
        self.callback.on_progress(&info);
    }
}
