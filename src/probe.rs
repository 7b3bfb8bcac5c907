//! Lightweight media file probing.
//!
//! [`MediaProbe`] runs `ffprobe` against a media file and reads back the
//! handful of facts the pipeline needs: frame rate, duration, dimensions and
//! whether there is an audio track to carry over. It is also what the
//! FFmpeg frame source uses to pick a frame rate when none is configured.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use serde_json::Value;

use crate::error::PosterizeError;
use crate::ffmpeg::run_tool;
use crate::media::StageContext;
use crate::progress::Stage;
use crate::utilities::{ensure_file, parse_frame_rate};

/// What `ffprobe` reported about a media file.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeReport {
    /// Container format name, e.g. `"mov,mp4,m4a,3gp,3g2,mj2"`.
    pub format: String,
    /// Container duration, if known.
    pub duration: Option<Duration>,
    /// Frame rate of the first video stream.
    pub frame_rate: Option<f64>,
    /// Width of the first video stream in pixels.
    pub width: Option<u32>,
    /// Height of the first video stream in pixels.
    pub height: Option<u32>,
    /// Frame count from the container header. Exact counts need
    /// [`MediaProbe::count_frames`].
    pub frame_count: Option<u64>,
    /// Whether the file has at least one audio stream.
    pub has_audio: bool,
}

impl ProbeReport {
    /// Parse the JSON printed by
    /// `ffprobe -print_format json -show_format -show_streams`.
    pub fn from_json(json: &str) -> Result<Self, PosterizeError> {
        let document: Value = serde_json::from_str(json)
            .map_err(|error| {
                PosterizeError::ProbeError(format!("invalid ffprobe output: {error}"))
            })?;

        let streams = document
            .get("streams")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();
        let video = streams
            .iter()
            .find(|stream| codec_type(stream) == Some("video"));
        let has_audio = streams
            .iter()
            .any(|stream| codec_type(stream) == Some("audio"));

        let format = document.get("format");
        let format_name = format
            .and_then(|format| format.get("format_name"))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let duration = format
            .and_then(|format| number_field(format, "duration"))
            .or_else(|| video.and_then(|stream| number_field(stream, "duration")))
            .filter(|seconds| seconds.is_finite() && *seconds >= 0.0)
            .map(Duration::from_secs_f64);

        let frame_rate = video.and_then(|stream| {
            ["r_frame_rate", "avg_frame_rate"]
                .iter()
                .filter_map(|key| stream.get(*key).and_then(Value::as_str))
                .find_map(parse_frame_rate)
        });
        let width = video.and_then(|stream| dimension(stream, "width"));
        let height = video.and_then(|stream| dimension(stream, "height"));
        let frame_count = video
            .and_then(|stream| number_field(stream, "nb_frames"))
            .map(|count| count as u64);

        Ok(Self {
            format: format_name,
            duration,
            frame_rate,
            width,
            height,
            frame_count,
            has_audio,
        })
    }

    /// Returns `true` if a video stream was found.
    pub fn has_video(&self) -> bool {
        self.frame_rate.is_some() || self.width.is_some()
    }
}

fn codec_type(stream: &Value) -> Option<&str> {
    stream.get("codec_type").and_then(Value::as_str)
}

/// ffprobe prints most numbers as strings.
fn number_field(object: &Value, key: &str) -> Option<f64> {
    match object.get(key)? {
        Value::String(text) => text.trim().parse().ok(),
        value => value.as_f64(),
    }
}

fn dimension(stream: &Value, key: &str) -> Option<u32> {
    stream
        .get(key)
        .and_then(Value::as_u64)
        .and_then(|value| u32::try_from(value).ok())
        .filter(|value| *value > 0)
}

/// `ffprobe` front end.
///
/// # Example
///
/// ```no_run
/// use posterize::MediaProbe;
///
/// let report = MediaProbe::new().probe("input.mp4")?;
/// println!("{:?} fps, audio: {}", report.frame_rate, report.has_audio);
/// # Ok::<(), posterize::PosterizeError>(())
/// ```
#[derive(Debug, Clone)]
pub struct MediaProbe {
    ffprobe: PathBuf,
    timeout: Option<Duration>,
}

impl Default for MediaProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl MediaProbe {
    /// Use `ffprobe` from `PATH` with no time limit.
    pub fn new() -> Self {
        Self {
            ffprobe: PathBuf::from("ffprobe"),
            timeout: None,
        }
    }

    /// Use a specific `ffprobe` binary.
    #[must_use]
    pub fn with_binary<P: Into<PathBuf>>(mut self, ffprobe: P) -> Self {
        self.ffprobe = ffprobe.into();
        self
    }

    /// Kill `ffprobe` if a standalone probe runs longer than `timeout`.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Probe a media file.
    ///
    /// # Errors
    ///
    /// Returns [`PosterizeError::FileOpen`] if the file does not exist,
    /// [`PosterizeError::ExternalToolFailure`] if `ffprobe` fails, and
    /// [`PosterizeError::ProbeError`] if its output cannot be read.
    pub fn probe<P: AsRef<Path>>(&self, path: P) -> Result<ProbeReport, PosterizeError> {
        let context = StageContext::new(Stage::Extracting, self.timeout, None);
        self.probe_with_context(path.as_ref(), &context)
    }

    /// Probe within an existing stage's cancellation and time limits.
    pub fn probe_with_context(
        &self,
        path: &Path,
        context: &StageContext,
    ) -> Result<ProbeReport, PosterizeError> {
        ensure_file(path)?;
        let mut command = Command::new(&self.ffprobe);
        command
            .args(["-v", "error", "-print_format", "json", "-show_format", "-show_streams"])
            .arg(path);
        let stdout = run_tool(&mut command, "ffprobe", context)?;
        ProbeReport::from_json(&stdout)
    }

    /// Decode the first video stream and count its frames.
    ///
    /// Slower than [`probe`](MediaProbe::probe) but exact.
    pub fn count_frames<P: AsRef<Path>>(&self, path: P) -> Result<u64, PosterizeError> {
        let path = path.as_ref();
        ensure_file(path)?;
        let context = StageContext::new(Stage::Extracting, self.timeout, None);
        let mut command = Command::new(&self.ffprobe);
        command
            .args(["-v", "error", "-select_streams", "v:0", "-count_frames"])
            .args(["-show_entries", "stream=nb_read_frames", "-print_format", "json"])
            .arg(path);
        let stdout = run_tool(&mut command, "ffprobe", &context)?;

        let document: Value = serde_json::from_str(&stdout)
            .map_err(|error| {
                PosterizeError::ProbeError(format!("invalid ffprobe output: {error}"))
            })?;
        document
            .get("streams")
            .and_then(|streams| streams.get(0))
            .and_then(|stream| number_field(stream, "nb_read_frames"))
            .map(|count| count as u64)
            .ok_or_else(|| {
                PosterizeError::ProbeError(format!("no video stream in {}", path.display()))
            })
    }

    /// Probe multiple media files.
    ///
    /// Files that cannot be probed produce an `Err` entry in the result
    /// vector rather than aborting the entire batch.
    pub fn probe_many<P: AsRef<Path>>(
        &self,
        paths: &[P],
    ) -> Vec<Result<ProbeReport, PosterizeError>> {
        paths.iter().map(|path| self.probe(path)).collect()
    }
}
