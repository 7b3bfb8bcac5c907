//! FFmpeg-backed frame source and sink.
//!
//! Frames are extracted and reassembled by running the `ffmpeg` binary as a
//! child process. A nonzero exit status becomes
//! [`PosterizeError::ExternalToolFailure`] carrying the tail of the tool's
//! stderr. While a tool runs, the pipeline polls it so that cancellation
//! and per-stage timeouts can kill it.
//!
//! FFmpeg's own console output is separate from the Rust-side messages this
//! crate emits through the [`log`](https://crates.io/crates/log) crate.
//! [`FfmpegLogLevel`] controls the former and is passed as `-loglevel`.
//!
//! # Example
//!
//! ```no_run
//! use posterize::{FfmpegFrameSink, FfmpegFrameSource, FfmpegLogLevel};
//!
//! let source = FfmpegFrameSource::new().with_log_level(FfmpegLogLevel::Warning);
//! let sink = FfmpegFrameSink::new().with_video_codec("libx265");
//! ```

use std::fs;
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::error::PosterizeError;
use crate::frame::FrameNaming;
use crate::media::{AssembleJob, FrameSink, FrameSource, StageContext};
use crate::probe::MediaProbe;
use crate::utilities::{escape_concat_path, tail};

const POLL_INTERVAL: Duration = Duration::from_millis(20);
const STDERR_TAIL_LINES: usize = 8;

/// FFmpeg internal log verbosity level.
///
/// Maps directly to the values accepted by FFmpeg's `-loglevel` option.
///
/// # Ordering (most verbose → most quiet)
///
/// `Trace` > `Debug` > `Verbose` > `Info` > `Warning` > `Error` > `Fatal` > `Panic` > `Quiet`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FfmpegLogLevel {
    /// Print no output at all.
    Quiet,
    /// Only log when a condition that cannot be recovered from is encountered
    /// and the process will abort.
    Panic,
    /// Only log when an unrecoverable error is encountered.
    Fatal,
    /// Log recoverable errors. This is the default.
    #[default]
    Error,
    /// Log warnings.
    Warning,
    /// Log informational messages.
    Info,
    /// Log verbose informational messages.
    Verbose,
    /// Log debugging messages.
    Debug,
    /// Extremely verbose tracing output.
    Trace,
}

impl FfmpegLogLevel {
    /// The `-loglevel` argument for this level.
    pub fn as_arg(self) -> &'static str {
        match self {
            FfmpegLogLevel::Quiet => "quiet",
            FfmpegLogLevel::Panic => "panic",
            FfmpegLogLevel::Fatal => "fatal",
            FfmpegLogLevel::Error => "error",
            FfmpegLogLevel::Warning => "warning",
            FfmpegLogLevel::Info => "info",
            FfmpegLogLevel::Verbose => "verbose",
            FfmpegLogLevel::Debug => "debug",
            FfmpegLogLevel::Trace => "trace",
        }
    }
}

/// Returns `true` if both binaries can be launched.
pub fn tools_available(ffmpeg: &Path, ffprobe: &Path) -> bool {
    [ffmpeg, ffprobe].iter().all(|binary| {
        Command::new(binary)
            .arg("-version")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .is_ok_and(|status| status.success())
    })
}

/// Run `command` to completion and return its stdout.
///
/// The child is killed if the stage is cancelled or runs out of time.
pub(crate) fn run_tool(
    command: &mut Command,
    tool: &str,
    context: &StageContext,
) -> Result<String, PosterizeError> {
    context.check()?;
    log::debug!("Running {tool}: {command:?}");

    let mut child = command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|error| PosterizeError::ExternalToolFailure {
            tool: tool.to_string(),
            reason: format!("could not launch: {error}"),
        })?;

    let stdout_reader = spawn_reader(child.stdout.take());
    let stderr_reader = spawn_reader(child.stderr.take());

    let status = loop {
        if let Some(status) = child.try_wait()? {
            break status;
        }
        if let Err(error) = context.check() {
            log::warn!("Stopping {tool}: {error}");
            let _ = child.kill();
            let _ = child.wait();
            return Err(error);
        }
        thread::sleep(POLL_INTERVAL);
    };

    let stdout = join_reader(stdout_reader);
    let stderr = join_reader(stderr_reader);

    if !status.success() {
        return Err(PosterizeError::ExternalToolFailure {
            tool: tool.to_string(),
            reason: format!("{status}: {}", tail(&stderr, STDERR_TAIL_LINES)),
        });
    }

    Ok(stdout)
}

fn spawn_reader<R: Read + Send + 'static>(stream: Option<R>) -> Option<JoinHandle<String>> {
    stream.map(|mut stream| {
        thread::spawn(move || {
            let mut buffer = Vec::new();
            let _ = stream.read_to_end(&mut buffer);
            String::from_utf8_lossy(&buffer).into_owned()
        })
    })
}

fn join_reader(handle: Option<JoinHandle<String>>) -> String {
    handle
        .and_then(|handle| handle.join().ok())
        .unwrap_or_default()
}

/// Extracts frames with `ffmpeg -vf fps=…` and probes rates with `ffprobe`.
#[derive(Debug, Clone)]
pub struct FfmpegFrameSource {
    ffmpeg: PathBuf,
    probe: MediaProbe,
    log_level: FfmpegLogLevel,
}

impl Default for FfmpegFrameSource {
    fn default() -> Self {
        Self::new()
    }
}

impl FfmpegFrameSource {
    /// Use `ffmpeg` and `ffprobe` from `PATH`.
    pub fn new() -> Self {
        Self {
            ffmpeg: PathBuf::from("ffmpeg"),
            probe: MediaProbe::new(),
            log_level: FfmpegLogLevel::default(),
        }
    }

    /// Use a specific `ffmpeg` binary.
    #[must_use]
    pub fn with_binary<P: Into<PathBuf>>(mut self, ffmpeg: P) -> Self {
        self.ffmpeg = ffmpeg.into();
        self
    }

    /// Use a specific probe for frame-rate detection.
    #[must_use]
    pub fn with_probe(mut self, probe: MediaProbe) -> Self {
        self.probe = probe;
        self
    }

    /// Set FFmpeg's console verbosity.
    #[must_use]
    pub fn with_log_level(mut self, level: FfmpegLogLevel) -> Self {
        self.log_level = level;
        self
    }
}

impl FrameSource for FfmpegFrameSource {
    fn frame_rate(&self, video: &Path, context: &StageContext) -> Result<f64, PosterizeError> {
        self.probe
            .probe_with_context(video, context)?
            .frame_rate
            .ok_or_else(|| PosterizeError::ProbeError(format!(
                "no video frame rate reported for {}",
                video.display()
            )))
    }

    fn extract(
        &self,
        video: &Path,
        frame_rate: f64,
        directory: &Path,
        naming: &FrameNaming,
        context: &StageContext,
    ) -> Result<f64, PosterizeError> {
        let mut command = Command::new(&self.ffmpeg);
        command
            .args(["-hide_banner", "-nostdin", "-loglevel", self.log_level.as_arg(), "-y", "-i"])
            .arg(video)
            .arg("-vf")
            .arg(format!("fps={frame_rate}"))
            .args(["-start_number", "0"])
            .arg(directory.join(naming.ffmpeg_pattern()));
        run_tool(&mut command, "ffmpeg", context)?;
        Ok(frame_rate)
    }
}

/// Encodes frames listed in an `ffconcat` manifest and muxes the source
/// audio, stopping at the shorter stream.
#[derive(Debug, Clone)]
pub struct FfmpegFrameSink {
    ffmpeg: PathBuf,
    log_level: FfmpegLogLevel,
    video_codec: String,
    audio_codec: String,
    pixel_format: String,
}

impl Default for FfmpegFrameSink {
    fn default() -> Self {
        Self::new()
    }
}

impl FfmpegFrameSink {
    /// H.264 video, AAC audio, `yuv420p`, using `ffmpeg` from `PATH`.
    pub fn new() -> Self {
        Self {
            ffmpeg: PathBuf::from("ffmpeg"),
            log_level: FfmpegLogLevel::default(),
            video_codec: "libx264".to_string(),
            audio_codec: "aac".to_string(),
            pixel_format: "yuv420p".to_string(),
        }
    }

    /// Use a specific `ffmpeg` binary.
    #[must_use]
    pub fn with_binary<P: Into<PathBuf>>(mut self, ffmpeg: P) -> Self {
        self.ffmpeg = ffmpeg.into();
        self
    }

    /// Set FFmpeg's console verbosity.
    #[must_use]
    pub fn with_log_level(mut self, level: FfmpegLogLevel) -> Self {
        self.log_level = level;
        self
    }

    /// Set the video encoder name.
    #[must_use]
    pub fn with_video_codec<S: Into<String>>(mut self, codec: S) -> Self {
        self.video_codec = codec.into();
        self
    }

    /// Set the audio encoder name.
    #[must_use]
    pub fn with_audio_codec<S: Into<String>>(mut self, codec: S) -> Self {
        self.audio_codec = codec.into();
        self
    }

    fn write_manifest(&self, job: &AssembleJob<'_>) -> Result<(), PosterizeError> {
        let mut writer = BufWriter::new(fs::File::create(job.manifest)?);
        writeln!(writer, "ffconcat version 1.0")?;
        for frame in job.frames {
            let path = std::path::absolute(&frame.path)?;
            writeln!(writer, "file {}", escape_concat_path(&path))?;
        }
        writer.flush()?;
        Ok(())
    }
}

impl FrameSink for FfmpegFrameSink {
    fn assemble(
        &self,
        job: &AssembleJob<'_>,
        context: &StageContext,
    ) -> Result<(), PosterizeError> {
        self.write_manifest(job)?;

        let rate = job.frame_rate.to_string();
        let mut command = Command::new(&self.ffmpeg);
        command
            .args(["-hide_banner", "-nostdin", "-loglevel", self.log_level.as_arg(), "-y"])
            .args(["-f", "concat", "-safe", "0", "-r", &rate, "-i"])
            .arg(job.manifest)
            .arg("-i")
            .arg(job.original_video)
            .args(["-map", "0:v:0", "-map", "1:a:0?"])
            // Even dimensions for chroma subsampling.
            .args(["-vf", "pad=ceil(iw/2)*2:ceil(ih/2)*2"])
            .args(["-c:v", &self.video_codec, "-pix_fmt", &self.pixel_format])
            .args(["-c:a", &self.audio_codec, "-shortest"])
            .arg(job.destination);
        run_tool(&mut command, "ffmpeg", context)?;
        Ok(())
    }
}
