//! Error handling integration tests.
//!
//! These tests verify that errors carry meaningful messages and context.

use std::path::PathBuf;
use std::time::Duration;

use posterize::{PipelineState, PosterizeError, Stage, WorkRange};

#[test]
fn file_open_message_names_path() {
    let error = PosterizeError::FileOpen {
        path: PathBuf::from("missing.mp4"),
        reason: "no such file".to_string(),
    };
    let message = error.to_string();
    assert!(
        message.contains("Failed to open media file") && message.contains("missing.mp4"),
        "Error message should mention file open failure: {message}",
    );
}

#[test]
fn partial_worker_failure_names_range() {
    let error = PosterizeError::PartialWorkerFailure {
        range: WorkRange::new(10, 20),
        reason: "worker panicked".to_string(),
    };
    let message = error.to_string();
    assert!(message.contains("[10, 20)"), "{message}");
    assert!(message.contains("worker panicked"), "{message}");
}

#[test]
fn stage_timeout_names_stage() {
    let error = PosterizeError::StageTimeout {
        stage: Stage::Extracting,
        timeout: Duration::from_secs(2),
    };
    let message = error.to_string();
    assert!(message.starts_with("extract stage timed out"), "{message}");
}

#[test]
fn external_tool_failure_names_tool() {
    let error = PosterizeError::ExternalToolFailure {
        tool: "ffmpeg".to_string(),
        reason: "exited with status 1".to_string(),
    };
    assert_eq!(error.to_string(), "ffmpeg failed: exited with status 1");
}

#[test]
fn invalid_transition_names_both_states() {
    let error = PipelineState::Done
        .transition(PipelineState::Extracting)
        .unwrap_err();
    let message = error.to_string();
    assert!(message.contains("Done") && message.contains("Extracting"), "{message}");
}

#[test]
fn io_errors_convert() {
    let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
    let error: PosterizeError = io.into();
    assert!(matches!(error, PosterizeError::IoError(_)));
    assert!(error.to_string().starts_with("I/O error"));
}

#[test]
fn missing_frame_message() {
    let error = PosterizeError::MissingFrame {
        index: 4,
        path: PathBuf::from("frame000004.png"),
    };
    assert!(error.to_string().contains("Frame 4 is missing"));
}
