//! Error types for the `posterize` crate.
//!
//! This module defines [`PosterizeError`], the unified error type returned by
//! all fallible operations in the crate. Errors carry enough context (paths,
//! frame indices, work ranges, tool output) to diagnose a failed run without
//! additional logging at the call site.

use std::{io::Error as IoError, path::PathBuf, time::Duration};

use image::ImageError;
use thiserror::Error;

use crate::partition::WorkRange;
use crate::pipeline::PipelineState;
use crate::progress::Stage;

/// The unified error type for all `posterize` operations.
///
/// Per-frame problems ([`MissingFrame`](PosterizeError::MissingFrame)) are
/// absorbed inside the filtering stage; every other variant aborts the run,
/// after which the scratch directories are still cleaned up.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PosterizeError {
    /// The configuration was rejected before any stage started.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The input media file could not be opened.
    #[error("Failed to open media file at {path}: {reason}")]
    FileOpen {
        /// Path that was passed to the pipeline.
        path: PathBuf,
        /// Underlying reason the open failed.
        reason: String,
    },

    /// A source frame was absent when its worker reached it.
    #[error("Frame {index} is missing at {path}")]
    MissingFrame {
        /// Index of the missing frame.
        index: u64,
        /// Path the frame was expected at.
        path: PathBuf,
    },

    /// An external media tool could not be launched or exited unsuccessfully.
    #[error("{tool} failed: {reason}")]
    ExternalToolFailure {
        /// Name of the tool (`ffmpeg`, `ffprobe`, ...).
        tool: String,
        /// Exit status and the tail of the tool's diagnostic output.
        reason: String,
    },

    /// Probe output could not be interpreted.
    #[error("Probe error: {0}")]
    ProbeError(String),

    /// A worker terminated before finishing its range.
    #[error("Worker for frames {range} terminated abnormally: {reason}")]
    PartialWorkerFailure {
        /// The range the worker owned.
        range: WorkRange,
        /// Why the worker stopped.
        reason: String,
    },

    /// A stage ran longer than the configured per-stage timeout.
    #[error("{stage} stage timed out after {timeout:?}")]
    StageTimeout {
        /// The stage that timed out.
        stage: Stage,
        /// The configured limit.
        timeout: Duration,
    },

    /// Filtering produced no frames to reassemble.
    #[error("No filtered frames to reassemble")]
    NoFrames,

    /// The orchestrator attempted an illegal state transition.
    #[error("Invalid pipeline transition from {from:?} to {to:?}")]
    InvalidTransition {
        /// State before the attempted transition.
        from: PipelineState,
        /// Requested state.
        to: PipelineState,
    },

    /// The worker pool could not be created.
    #[error("Worker pool error: {0}")]
    WorkerPool(String),

    /// The operation was cancelled via a [`CancellationToken`](crate::CancellationToken).
    #[error("Operation cancelled")]
    Cancelled,

    /// An I/O error occurred while reading or writing files.
    #[error("I/O error: {0}")]
    IoError(#[from] IoError),

    /// An error from the `image` crate while decoding or encoding a frame.
    #[error("Image processing error: {0}")]
    ImageError(#[from] ImageError),
}

impl From<rayon::ThreadPoolBuildError> for PosterizeError {
    fn from(error: rayon::ThreadPoolBuildError) -> Self {
        PosterizeError::WorkerPool(error.to_string())
    }
}
