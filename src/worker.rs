//! Parallel frame filtering.
//!
//! The filtering stage splits the frame index space into one
//! [`WorkRange`] per worker and runs each range as a single job on a
//! dedicated [`rayon`] pool. Workers share nothing mutable except the atomic
//! [`ProgressTracker`]; everything else they report goes over an `mpsc`
//! channel to the coordinating thread, which publishes progress and decides
//! when the stage has failed.
//!
//! This module contains only the internal implementation; it is driven by
//! [`Pipeline::run`](crate::Pipeline::run).

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::time::{Duration, Instant};

use rand::SeedableRng;
use rand::rngs::StdRng;
use rayon::ThreadPoolBuilder;

use crate::error::PosterizeError;
use crate::filter::FrameFilter;
use crate::frame::FrameNaming;
use crate::media::StageContext;
use crate::partition::{WorkRange, partition};
use crate::progress::{CancellationToken, ProgressReporter, ProgressTracker};

/// How long stopped workers get to notice before the stage gives up on them.
/// A worker is only told to stop between frames, so a frame still in flight
/// after this may finish after the stage returns; its write then fails once
/// cleanup has removed the output directory.
pub(crate) const DRAIN_GRACE: Duration = Duration::from_secs(1);
const DRAIN_POLL: Duration = Duration::from_millis(50);

/// Golden-ratio increment used to spread frame indices across seeds.
const SEED_STRIDE: u64 = 0x9E37_79B9_7F4A_7C15;

/// Everything a worker needs to filter its range.
pub(crate) struct FilterJob {
    pub(crate) input_directory: PathBuf,
    pub(crate) output_directory: PathBuf,
    pub(crate) naming: FrameNaming,
    pub(crate) filter: FrameFilter,
    pub(crate) seed: Option<u64>,
    /// The caller's token.
    pub(crate) cancellation: Option<CancellationToken>,
    /// Raised by the coordinator when the stage fails.
    pub(crate) abort: CancellationToken,
}

/// Per-frame work driven by [`run_filter_stage`].
pub(crate) trait FrameTask: Send + Sync + 'static {
    /// Handle frame `index`. Returns `true` if the frame was missing and
    /// skipped.
    fn run_frame(&self, index: u64) -> Result<bool, PosterizeError>;

    /// Whether workers should stop before their next frame.
    fn should_stop(&self) -> bool;

    /// Tell every worker to stop.
    fn abort(&self);
}

impl FrameTask for FilterJob {
    fn run_frame(&self, index: u64) -> Result<bool, PosterizeError> {
        let source = self.naming.path_in(&self.input_directory, index);
        let mut rng = frame_rng(self.seed, index);
        match self
            .filter
            .filter_frame(index, &source, &self.output_directory, &mut rng)
        {
            Ok(_) => Ok(false),
            Err(PosterizeError::MissingFrame { index, path }) => {
                log::warn!("Skipping frame {index}: {} does not exist", path.display());
                Ok(true)
            }
            Err(error) => Err(error),
        }
    }

    fn should_stop(&self) -> bool {
        self.abort.is_cancelled()
            || self
                .cancellation
                .as_ref()
                .is_some_and(|token| token.is_cancelled())
    }

    fn abort(&self) {
        self.abort.cancel();
    }
}

/// Messages from workers to the coordinator.
#[derive(Debug)]
pub(crate) enum WorkerEvent {
    /// One frame was handled. `skipped` frames were missing on disk.
    FrameDone { index: u64, skipped: bool },
    /// Every frame in the range was handled.
    RangeFinished { range: WorkRange },
    /// The worker stopped early because the stage was told to stop.
    RangeStopped { range: WorkRange },
    /// The worker hit a fatal error or panicked.
    RangeFailed { range: WorkRange, reason: String },
}

/// Counts from a completed filtering stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct FilterStageOutcome {
    pub(crate) filtered: u64,
    pub(crate) skipped: u64,
    pub(crate) workers: usize,
}

/// Random source for one frame.
///
/// With a seed, the generator depends only on the seed and the frame index,
/// so a frame renders the same no matter which worker picks it up.
pub(crate) fn frame_rng(seed: Option<u64>, index: u64) -> StdRng {
    match seed {
        Some(seed) => {
            StdRng::seed_from_u64(seed ^ index.wrapping_add(1).wrapping_mul(SEED_STRIDE))
        }
        None => StdRng::from_entropy(),
    }
}

/// Run every frame of `range`. Returns `false` if the worker stopped early.
///
/// Missing source frames are counted as skipped; any other error ends the
/// range.
fn filter_range<T: FrameTask>(
    task: &T,
    range: WorkRange,
    tracker: &ProgressTracker,
    events: &Sender<WorkerEvent>,
) -> Result<bool, PosterizeError> {
    for index in range.indices() {
        if task.should_stop() {
            return Ok(false);
        }
        let skipped = task.run_frame(index)?;
        tracker.record_frame();
        let _ = events.send(WorkerEvent::FrameDone { index, skipped });
    }
    Ok(true)
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    let message = payload
        .downcast_ref::<&str>()
        .map(|text| text.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown cause".to_string());
    format!("worker panicked: {message}")
}

/// Run the filtering stage over frames `0..total_frames`.
///
/// Blocks until every worker has reported or, after a failure, until the
/// remaining workers have stopped or the drain grace period has passed.
pub(crate) fn run_filter_stage<T: FrameTask>(
    task: Arc<T>,
    total_frames: u64,
    parallelism: usize,
    reporter: &mut ProgressReporter,
    context: &StageContext,
) -> Result<FilterStageOutcome, PosterizeError> {
    let ranges = partition(total_frames, parallelism);
    let tracker = Arc::new(ProgressTracker::new(total_frames, ranges.len()));

    if ranges.is_empty() {
        reporter.report(&tracker);
        return Ok(FilterStageOutcome {
            filtered: 0,
            skipped: 0,
            workers: 0,
        });
    }

    let pool = ThreadPoolBuilder::new()
        .num_threads(ranges.len())
        .thread_name(|index| format!("posterize-worker-{index}"))
        .build()?;
    log::debug!(
        "Filtering {total_frames} frames with {} workers: {}",
        ranges.len(),
        ranges
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(" ")
    );

    let (sender, receiver) = mpsc::channel();
    for range in ranges.iter().copied() {
        let task = Arc::clone(&task);
        let tracker = Arc::clone(&tracker);
        let events = sender.clone();
        pool.spawn(move || {
            let result = panic::catch_unwind(AssertUnwindSafe(|| {
                filter_range(task.as_ref(), range, &tracker, &events)
            }));
            let event = match result {
                Ok(Ok(true)) => WorkerEvent::RangeFinished { range },
                Ok(Ok(false)) => WorkerEvent::RangeStopped { range },
                Ok(Err(error)) => WorkerEvent::RangeFailed {
                    range,
                    reason: error.to_string(),
                },
                Err(payload) => WorkerEvent::RangeFailed {
                    range,
                    reason: panic_message(payload.as_ref()),
                },
            };
            tracker.worker_finished();
            let _ = events.send(event);
        });
    }
    drop(sender);

    let mut pending = ranges.clone();
    let mut filtered = 0u64;
    let mut skipped = 0u64;
    let mut stopped = false;
    let mut failure: Option<PosterizeError> = None;
    let mut drain_deadline: Option<Instant> = None;

    reporter.report(&tracker);

    while !pending.is_empty() {
        let wait = match (&failure, context.remaining()) {
            (Some(_), _) => DRAIN_POLL,
            (None, Some(remaining)) => remaining.clamp(DRAIN_POLL, reporter.interval()),
            (None, None) => reporter.interval(),
        };

        match receiver.recv_timeout(wait) {
            Ok(WorkerEvent::FrameDone { index, skipped: missing }) => {
                log::trace!("Frame {index} handled");
                if missing {
                    skipped += 1;
                } else {
                    filtered += 1;
                }
                reporter.observe(&tracker);
            }
            Ok(WorkerEvent::RangeFinished { range }) => {
                log::debug!("Worker finished frames {range}");
                pending.retain(|candidate| *candidate != range);
                reporter.observe(&tracker);
            }
            Ok(WorkerEvent::RangeStopped { range }) => {
                log::debug!("Worker stopped early in frames {range}");
                pending.retain(|candidate| *candidate != range);
                stopped = true;
            }
            Ok(WorkerEvent::RangeFailed { range, reason }) => {
                log::warn!("Worker for frames {range} failed: {reason}");
                pending.retain(|candidate| *candidate != range);
                if failure.is_none() {
                    failure = Some(PosterizeError::PartialWorkerFailure { range, reason });
                }
            }
            Err(RecvTimeoutError::Timeout) => reporter.observe(&tracker),
            Err(RecvTimeoutError::Disconnected) => {
                if let (None, Some(range)) = (&failure, pending.first().copied()) {
                    failure = Some(PosterizeError::PartialWorkerFailure {
                        range,
                        reason: "worker exited without reporting".to_string(),
                    });
                }
                break;
            }
        }

        if failure.is_none() {
            if let Err(error) = context.check() {
                failure = Some(error);
            }
        }

        if failure.is_some() {
            let deadline = *drain_deadline.get_or_insert_with(|| {
                task.abort();
                Instant::now() + DRAIN_GRACE
            });
            if Instant::now() >= deadline {
                log::warn!(
                    "{} workers did not stop within {DRAIN_GRACE:?}",
                    pending.len()
                );
                break;
            }
        }
    }

    if let Some(error) = failure {
        return Err(error);
    }
    if stopped {
        return Err(PosterizeError::Cancelled);
    }

    reporter.report(&tracker);
    Ok(FilterStageOutcome {
        filtered,
        skipped,
        workers: ranges.len(),
    })
}
