//! Frame files and their naming convention.
//!
//! Scratch frames are named `frame` + zero-padded index + `.png`. The padding
//! is fixed for a run so that lexical and numeric order agree, and the
//! extension is always PNG so palette colors pass between stages without
//! lossy re-encoding.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::PosterizeError;

const FRAME_PREFIX: &str = "frame";
const FRAME_EXTENSION: &str = "png";

/// Narrowest allowed index padding.
pub const MIN_FRAME_DIGITS: usize = 6;
/// Widest allowed index padding.
pub const MAX_FRAME_DIGITS: usize = 10;

/// One frame image on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Zero-based position in the video.
    pub index: u64,
    /// Location of the image file.
    pub path: PathBuf,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

/// Fixed-width frame file naming for one run.
///
/// # Example
///
/// ```
/// use posterize::FrameNaming;
///
/// let naming = FrameNaming::default();
/// assert_eq!(naming.file_name(42), "frame000042.png");
/// assert_eq!(naming.parse_index("frame000042.png"), Some(42));
/// assert_eq!(naming.ffmpeg_pattern(), "frame%06d.png");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameNaming {
    digits: usize,
}

impl Default for FrameNaming {
    fn default() -> Self {
        Self {
            digits: MIN_FRAME_DIGITS,
        }
    }
}

impl FrameNaming {
    /// Naming with the given index width, clamped to
    /// [`MIN_FRAME_DIGITS`]..=[`MAX_FRAME_DIGITS`].
    pub fn with_digits(digits: usize) -> Self {
        Self {
            digits: digits.clamp(MIN_FRAME_DIGITS, MAX_FRAME_DIGITS),
        }
    }

    /// Index width in digits.
    pub fn digits(&self) -> usize {
        self.digits
    }

    /// Largest index that still fits the padding.
    pub fn max_index(&self) -> u64 {
        10u64.pow(self.digits as u32) - 1
    }

    /// File name for frame `index`.
    pub fn file_name(&self, index: u64) -> String {
        format!("{FRAME_PREFIX}{index:0width$}.{FRAME_EXTENSION}", width = self.digits)
    }

    /// Full path of frame `index` inside `directory`.
    pub fn path_in(&self, directory: &Path, index: u64) -> PathBuf {
        directory.join(self.file_name(index))
    }

    /// `printf`-style pattern understood by FFmpeg's image muxer.
    pub fn ffmpeg_pattern(&self) -> String {
        format!("{FRAME_PREFIX}%0{}d.{FRAME_EXTENSION}", self.digits)
    }

    /// Recover the index from a file name produced by [`file_name`](Self::file_name).
    ///
    /// Names with a different padding width are rejected so that a directory
    /// listing only ever contains one naming scheme.
    pub fn parse_index(&self, file_name: &str) -> Option<u64> {
        let digits = file_name
            .strip_prefix(FRAME_PREFIX)?
            .strip_suffix(FRAME_EXTENSION)?
            .strip_suffix('.')?;
        if digits.len() != self.digits || !digits.bytes().all(|byte| byte.is_ascii_digit()) {
            return None;
        }
        digits.parse().ok()
    }

    /// List the frames in `directory`, sorted by index.
    ///
    /// Files that do not follow the naming scheme are ignored. Dimensions
    /// are read from the image headers only.
    pub fn list(&self, directory: &Path) -> Result<Vec<Frame>, PosterizeError> {
        let mut frames = Vec::new();
        for entry in fs::read_dir(directory)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let name = entry.file_name();
            let Some(index) = name.to_str().and_then(|name| self.parse_index(name)) else {
                continue;
            };
            let path = entry.path();
            let (width, height) = image::image_dimensions(&path)?;
            frames.push(Frame {
                index,
                path,
                width,
                height,
            });
        }
        frames.sort_by_key(|frame| frame.index);
        Ok(frames)
    }
}
