//! Internal utility functions.
//!
//! Helpers for frame-rate parsing, scratch-path housekeeping, and other
//! shared logic that does not belong in any single public module.

use std::ffi::OsString;
use std::fs;
use std::io::{Error as IoError, ErrorKind};
use std::path::{self, Path, PathBuf};

use crate::error::PosterizeError;

/// Parse a frame rate written as a plain number (`"25"`, `"29.97"`) or a
/// rational (`"30000/1001"`). Returns `None` for zero, negative, or
/// unparsable values.
pub fn parse_frame_rate(value: &str) -> Option<f64> {
    let value = value.trim();
    let rate = match value.split_once('/') {
        Some((numerator, denominator)) => {
            let numerator: f64 = numerator.trim().parse().ok()?;
            let denominator: f64 = denominator.trim().parse().ok()?;
            if denominator == 0.0 {
                return None;
            }
            numerator / denominator
        }
        None => value.parse().ok()?,
    };
    (rate.is_finite() && rate > 0.0).then_some(rate)
}

/// Fail with [`PosterizeError::FileOpen`] unless `path` is a regular file.
pub fn ensure_file(path: &Path) -> Result<(), PosterizeError> {
    if path.is_file() {
        Ok(())
    } else {
        Err(PosterizeError::FileOpen {
            path: path.to_path_buf(),
            reason: "no such file".to_string(),
        })
    }
}

/// Make `directory` exist and be empty, deleting whatever was there.
pub fn reset_directory(directory: &Path) -> Result<(), IoError> {
    remove_path(directory)?;
    fs::create_dir_all(directory)
}

/// Remove a file or directory tree. A path that is already gone is not an
/// error. Returns whether anything was removed.
pub fn remove_path(path: &Path) -> Result<bool, IoError> {
    let metadata = match fs::symlink_metadata(path) {
        Ok(metadata) => metadata,
        Err(error) if error.kind() == ErrorKind::NotFound => return Ok(false),
        Err(error) => return Err(error),
    };
    let result = if metadata.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    };
    match result {
        Ok(()) => Ok(true),
        Err(error) if error.kind() == ErrorKind::NotFound => Ok(false),
        Err(error) => Err(error),
    }
}

/// Hidden sibling of `output` that the final video is written to before it
/// is renamed into place. Keeps the extension so muxers can infer the
/// container.
pub fn staging_path(output: &Path) -> PathBuf {
    let mut name = OsString::from(".");
    name.push(output.file_stem().unwrap_or_default());
    name.push(".partial");
    if let Some(extension) = output.extension() {
        name.push(".");
        name.push(extension);
    }
    output.with_file_name(name)
}

/// Quote a path for an `ffconcat` manifest line.
pub fn escape_concat_path(path: &Path) -> String {
    let text = path.to_string_lossy().replace('\'', r"'\''");
    format!("'{text}'")
}

/// The last `lines` lines of `text`, for error messages.
pub fn tail(text: &str, lines: usize) -> String {
    let collected: Vec<&str> = text.lines().rev().take(lines).collect();
    collected.into_iter().rev().collect::<Vec<_>>().join("\n")
}

/// Whether `inner` is `outer` or lies beneath it. Both are made absolute
/// against the current directory and then compared lexically.
pub fn is_within(inner: &Path, outer: &Path) -> bool {
    let inner = path::absolute(inner).unwrap_or_else(|_| inner.to_path_buf());
    let outer = path::absolute(outer).unwrap_or_else(|_| outer.to_path_buf());
    inner.starts_with(outer)
}
