//! Run orchestration.
//!
//! A [`Pipeline`] drives one video through four stages in order: extract
//! frames with a [`FrameSource`], filter them on a worker pool, reassemble
//! them with a [`FrameSink`], and clean the scratch directories. Its
//! [`PipelineState`] only moves forward, except that any stage may fail.
//! Scratch state is removed whether the run succeeds or not, and the output
//! path is only written by renaming a finished staging file onto it.
//!
//! # Example
//!
//! ```no_run
//! use posterize::{FilterOptions, PaletteVariant, Pipeline, PipelineOptions};
//!
//! let filter = FilterOptions::new(PaletteVariant::Violet).with_dither(true);
//! let mut pipeline = Pipeline::ffmpeg(PipelineOptions::new(filter).with_max_parallelism(4));
//! let summary = pipeline.run("input.mp4", "posterized.mp4")?;
//! println!("{} frames in {:?}", summary.filtered_frames, summary.elapsed);
//! # Ok::<(), posterize::PosterizeError>(())
//! ```

use std::fmt::{Display, Formatter, Result as FmtResult};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::configuration::PipelineOptions;
use crate::error::PosterizeError;
use crate::ffmpeg::{FfmpegFrameSink, FfmpegFrameSource};
use crate::filter::FrameFilter;
use crate::media::{AssembleJob, FrameSink, FrameSource, StageContext};
use crate::progress::{CancellationToken, ProgressReporter, Stage};
use crate::utilities::{ensure_file, remove_path, reset_directory, staging_path};
use crate::worker::{FilterJob, run_filter_stage};

/// Where a run is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineState {
    /// Not started.
    Idle,
    /// Decoding source frames.
    Extracting,
    /// Filtering frames on the worker pool.
    Filtering,
    /// Encoding the output video.
    Reassembling,
    /// Removing scratch state after success.
    Cleaning,
    /// Finished successfully.
    Done,
    /// Stopped by an error. Cleanup still runs in this state.
    Failed,
}

impl PipelineState {
    /// The next state on the success path, if any.
    pub fn successor(self) -> Option<Self> {
        match self {
            PipelineState::Idle => Some(PipelineState::Extracting),
            PipelineState::Extracting => Some(PipelineState::Filtering),
            PipelineState::Filtering => Some(PipelineState::Reassembling),
            PipelineState::Reassembling => Some(PipelineState::Cleaning),
            PipelineState::Cleaning => Some(PipelineState::Done),
            PipelineState::Done | PipelineState::Failed => None,
        }
    }

    /// `true` for [`Done`](PipelineState::Done) and
    /// [`Failed`](PipelineState::Failed).
    pub fn is_terminal(self) -> bool {
        matches!(self, PipelineState::Done | PipelineState::Failed)
    }

    /// Whether moving from `self` to `next` is legal: one step forward, or
    /// from any unfinished state to `Failed`.
    pub fn can_transition_to(self, next: Self) -> bool {
        if next == PipelineState::Failed {
            return !self.is_terminal();
        }
        self.successor() == Some(next)
    }

    /// Move to `next`, or report an [`InvalidTransition`](PosterizeError::InvalidTransition).
    pub fn transition(self, next: Self) -> Result<Self, PosterizeError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(PosterizeError::InvalidTransition {
                from: self,
                to: next,
            })
        }
    }
}

impl Display for PipelineState {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        let name = match self {
            PipelineState::Idle => "idle",
            PipelineState::Extracting => "extracting",
            PipelineState::Filtering => "filtering",
            PipelineState::Reassembling => "reassembling",
            PipelineState::Cleaning => "cleaning",
            PipelineState::Done => "done",
            PipelineState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Result of a successful run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    /// The written video.
    pub output: PathBuf,
    /// Frame rate frames were extracted and encoded at.
    pub frame_rate: f64,
    /// Size of the frame index space (`highest index + 1`).
    pub total_frames: u64,
    /// Frames that were filtered.
    pub filtered_frames: u64,
    /// Frames that were missing and skipped.
    pub skipped_frames: u64,
    /// Workers used during filtering.
    pub workers: usize,
    /// Wall-clock time for the whole run, cleanup included.
    pub elapsed: Duration,
}

/// Counts carried from extraction and filtering into the summary.
struct StageTotals {
    frame_rate: f64,
    total_frames: u64,
    filtered_frames: u64,
    skipped_frames: u64,
    workers: usize,
}

/// Drives a video through extract, filter, reassemble and clean.
pub struct Pipeline {
    source: Box<dyn FrameSource>,
    sink: Box<dyn FrameSink>,
    options: PipelineOptions,
    state: PipelineState,
}

impl Pipeline {
    /// A pipeline with custom media collaborators.
    pub fn new<S, K>(source: S, sink: K, options: PipelineOptions) -> Self
    where
        S: FrameSource + 'static,
        K: FrameSink + 'static,
    {
        Self {
            source: Box::new(source),
            sink: Box::new(sink),
            options,
            state: PipelineState::Idle,
        }
    }

    /// A pipeline that uses `ffmpeg` and `ffprobe` from `PATH`.
    pub fn ffmpeg(options: PipelineOptions) -> Self {
        Self::new(FfmpegFrameSource::new(), FfmpegFrameSink::new(), options)
    }

    /// Current lifecycle state.
    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// The run configuration.
    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    /// Posterize `input` into `output`.
    ///
    /// The options, `input` and `output` are validated before any stage
    /// starts; those failures leave the scratch directories untouched. Once
    /// a stage has started, scratch state is cleaned up on every outcome.
    ///
    /// # Errors
    ///
    /// Any stage failure is returned after cleanup, with the pipeline left
    /// in [`PipelineState::Failed`].
    pub fn run<I, O>(&mut self, input: I, output: O) -> Result<RunSummary, PosterizeError>
    where
        I: AsRef<Path>,
        O: AsRef<Path>,
    {
        let input = input.as_ref();
        let output = output.as_ref();
        let started = Instant::now();
        self.state = PipelineState::Idle;

        if let Err(error) = self.preflight(input, output) {
            self.state = PipelineState::Failed;
            return Err(error);
        }

        match self.execute(input, output) {
            Ok(totals) => {
                self.advance(PipelineState::Cleaning)?;
                self.clean(output);
                self.advance(PipelineState::Done)?;

                let summary = RunSummary {
                    output: output.to_path_buf(),
                    frame_rate: totals.frame_rate,
                    total_frames: totals.total_frames,
                    filtered_frames: totals.filtered_frames,
                    skipped_frames: totals.skipped_frames,
                    workers: totals.workers,
                    elapsed: started.elapsed(),
                };
                log::info!(
                    "Wrote {} ({} frames filtered, {} skipped) in {:.2?}",
                    summary.output.display(),
                    summary.filtered_frames,
                    summary.skipped_frames,
                    summary.elapsed
                );
                Ok(summary)
            }
            Err(error) => {
                log::warn!("Run failed while {}: {error}", self.state);
                self.state = PipelineState::Failed;
                self.clean(output);
                Err(error)
            }
        }
    }

    fn preflight(&self, input: &Path, output: &Path) -> Result<(), PosterizeError> {
        let report = self.options.validate_run(input, output).into_result()?;
        for warning in &report.warnings {
            log::warn!("{warning}");
        }
        for info in &report.info {
            log::debug!("{info}");
        }
        ensure_file(input)
    }

    fn advance(&mut self, next: PipelineState) -> Result<(), PosterizeError> {
        self.state = self.state.transition(next)?;
        log::info!("Pipeline {next}");
        Ok(())
    }

    fn stage_context(&self, stage: Stage) -> StageContext {
        StageContext::new(
            stage,
            self.options.stage_timeout,
            self.options.cancellation.clone(),
        )
    }

    fn reporter(&self, stage: Stage) -> ProgressReporter {
        ProgressReporter::new(
            Arc::clone(&self.options.progress),
            stage,
            self.options.report_interval,
        )
    }

    fn execute(&mut self, input: &Path, output: &Path) -> Result<StageTotals, PosterizeError> {
        let scratch = self.options.scratch.clone();
        let naming = self.options.naming;

        // ── Extracting ─────────────────────────────────────────────────
        self.advance(PipelineState::Extracting)?;
        let context = self.stage_context(Stage::Extracting);
        context.check()?;
        let mut reporter = self.reporter(Stage::Extracting);
        reporter.started();

        reset_directory(&scratch.input_directory)?;
        let requested_rate = match self.options.frame_rate {
            Some(rate) => rate,
            None => self.source.frame_rate(input, &context)?,
        };
        let frame_rate = self.source.extract(
            input,
            requested_rate,
            &scratch.input_directory,
            &naming,
            &context,
        )?;
        context.check()?;

        let frames = naming.list(&scratch.input_directory)?;
        let total_frames = frames.last().map_or(0, |frame| frame.index + 1);
        if total_frames != frames.len() as u64 {
            log::warn!(
                "Extracted {} frames but indices reach {}; gaps will be skipped",
                frames.len(),
                total_frames
            );
        }
        reporter.finished();
        log::debug!("Extracted {total_frames} frames at {frame_rate:.3} fps");

        // ── Filtering ──────────────────────────────────────────────────
        self.advance(PipelineState::Filtering)?;
        let context = self.stage_context(Stage::Filtering);
        context.check()?;
        reset_directory(&scratch.output_directory)?;

        let job = Arc::new(FilterJob {
            input_directory: scratch.input_directory.clone(),
            output_directory: scratch.output_directory.clone(),
            naming,
            filter: FrameFilter::new(&self.options.filter),
            seed: self.options.seed,
            cancellation: self.options.cancellation.clone(),
            abort: CancellationToken::new(),
        });
        let mut reporter = self.reporter(Stage::Filtering);
        let outcome = run_filter_stage(
            job,
            total_frames,
            self.options.parallelism(),
            &mut reporter,
            &context,
        )?;
        log::debug!(
            "Filtered {} frames, skipped {}, on {} workers",
            outcome.filtered,
            outcome.skipped,
            outcome.workers
        );

        // ── Reassembling ───────────────────────────────────────────────
        self.advance(PipelineState::Reassembling)?;
        let context = self.stage_context(Stage::Reassembling);
        context.check()?;
        let mut reporter = self.reporter(Stage::Reassembling);
        reporter.started();

        let filtered = naming.list(&scratch.output_directory)?;
        if filtered.is_empty() {
            return Err(PosterizeError::NoFrames);
        }

        if let Some(parent) = output.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let staging = staging_path(output);
        remove_path(&staging)?;

        self.sink.assemble(
            &AssembleJob {
                frames: &filtered,
                frame_rate,
                original_video: input,
                manifest: &scratch.manifest,
                destination: &staging,
            },
            &context,
        )?;
        if !staging.is_file() {
            return Err(PosterizeError::ExternalToolFailure {
                tool: "sink".to_string(),
                reason: format!("no video was written to {}", staging.display()),
            });
        }
        fs::rename(&staging, output)?;
        reporter.finished();

        Ok(StageTotals {
            frame_rate,
            total_frames,
            filtered_frames: outcome.filtered,
            skipped_frames: outcome.skipped,
            workers: outcome.workers,
        })
    }

    /// Remove scratch state. Problems are logged, never returned.
    fn clean(&self, output: &Path) {
        let mut reporter = self.reporter(Stage::Cleaning);
        reporter.started();

        let scratch = &self.options.scratch;
        let staging = staging_path(output);
        let paths = [
            scratch.input_directory.as_path(),
            scratch.output_directory.as_path(),
            scratch.manifest.as_path(),
            staging.as_path(),
        ];
        for path in paths {
            match remove_path(path) {
                Ok(true) => log::debug!("Removed {}", path.display()),
                Ok(false) => {}
                Err(error) => log::warn!("Could not remove {}: {error}", path.display()),
            }
        }
        if let Some(root) = scratch.root() {
            // Only succeeds if nothing else was put there.
            let _ = fs::remove_dir(root);
        }

        reporter.finished();
    }
}
