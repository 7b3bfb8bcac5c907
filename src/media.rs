//! Seams to the external media tooling.
//!
//! The pipeline never decodes or encodes video itself. A [`FrameSource`]
//! turns a video into numbered frame images and a [`FrameSink`] turns the
//! filtered frames back into a video with the original audio. The FFmpeg
//! implementations live in [`crate::ffmpeg`]; tests substitute their own.

use std::path::Path;
use std::time::{Duration, Instant};

use crate::error::PosterizeError;
use crate::frame::{Frame, FrameNaming};
use crate::progress::{CancellationToken, Stage};

/// Limits that apply to one stage's external work.
#[derive(Debug, Clone)]
pub struct StageContext {
    /// The stage being run.
    pub stage: Stage,
    /// Time budget for the stage, if any.
    pub timeout: Option<Duration>,
    /// Cancellation token for the run, if any.
    pub cancellation: Option<CancellationToken>,
    started: Instant,
}

impl StageContext {
    /// Start the clock for `stage`.
    pub fn new(
        stage: Stage,
        timeout: Option<Duration>,
        cancellation: Option<CancellationToken>,
    ) -> Self {
        Self {
            stage,
            timeout,
            cancellation,
            started: Instant::now(),
        }
    }

    /// Returns `true` if cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancellation
            .as_ref()
            .is_some_and(|token| token.is_cancelled())
    }

    /// Time left before the stage times out. `None` means unlimited.
    pub fn remaining(&self) -> Option<Duration> {
        self.timeout
            .map(|timeout| timeout.saturating_sub(self.started.elapsed()))
    }

    /// Fail with [`Cancelled`](PosterizeError::Cancelled) or
    /// [`StageTimeout`](PosterizeError::StageTimeout) if either applies.
    pub fn check(&self) -> Result<(), PosterizeError> {
        if self.is_cancelled() {
            return Err(PosterizeError::Cancelled);
        }
        match self.timeout {
            Some(timeout) if self.started.elapsed() >= timeout => Err(PosterizeError::StageTimeout {
                stage: self.stage,
                timeout,
            }),
            _ => Ok(()),
        }
    }
}

/// Produces ordered frame images from a video.
pub trait FrameSource: Send + Sync {
    /// The video's native frame rate, used when no override is configured.
    fn frame_rate(&self, video: &Path, context: &StageContext) -> Result<f64, PosterizeError>;

    /// Write the video's frames into `directory` at `frame_rate`, named by
    /// `naming` and numbered from zero. Returns the frame rate achieved.
    fn extract(
        &self,
        video: &Path,
        frame_rate: f64,
        directory: &Path,
        naming: &FrameNaming,
        context: &StageContext,
    ) -> Result<f64, PosterizeError>;
}

/// Everything a [`FrameSink`] needs to build the output video.
#[derive(Debug, Clone, Copy)]
pub struct AssembleJob<'a> {
    /// Filtered frames in index order.
    pub frames: &'a [Frame],
    /// Playback rate of the frames.
    pub frame_rate: f64,
    /// Source video whose audio track is carried over.
    pub original_video: &'a Path,
    /// Where a frame list for the encoder may be written.
    pub manifest: &'a Path,
    /// File to write the muxed video to.
    pub destination: &'a Path,
}

/// Encodes filtered frames and muxes them with the original audio.
///
/// Implementations must trim the result to the shorter of the visual and
/// audio streams.
pub trait FrameSink: Send + Sync {
    /// Build `job.destination`.
    fn assemble(&self, job: &AssembleJob<'_>, context: &StageContext) -> Result<(), PosterizeError>;
}
