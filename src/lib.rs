//! # posterize
//!
//! Turn a video into a dithered two/three-tone posterization while keeping
//! its soundtrack.
//!
//! `posterize` extracts a video's frames with FFmpeg, reclassifies every
//! pixel into a tiny palette by brightness (randomizing the boundary bands
//! when dithering is on), filters the frames on a pool of worker threads,
//! and muxes the result back together with the original audio.
//!
//! ## Quick Start
//!
//! ### Posterize a Video
//!
//! ```no_run
//! use posterize::{FilterOptions, PaletteVariant, Pipeline, PipelineOptions};
//!
//! let filter = FilterOptions::new(PaletteVariant::Violet).with_dither(true);
//! let mut pipeline = Pipeline::ffmpeg(PipelineOptions::new(filter));
//! pipeline.run("input.mp4", "output.mp4").unwrap();
//! ```
//!
//! ### Posterize a Still Image
//!
//! ```no_run
//! use posterize::{FilterOptions, FrameFilter, PaletteVariant};
//!
//! let filter = FrameFilter::new(&FilterOptions::new(PaletteVariant::Ember));
//! let image = image::open("still.png").unwrap();
//! let filtered = filter.apply(&image, &mut rand::thread_rng()).unwrap();
//! filtered.save("still_posterized.png").unwrap();
//! ```
//!
//! ### Classify a Single Pixel
//!
//! ```
//! use posterize::{PaletteVariant, PixelClassifier};
//!
//! let classifier = PixelClassifier::new(PaletteVariant::Violet, false);
//! let color = classifier.classify([255, 255, 255], &mut rand::thread_rng());
//! assert_eq!(color.0, [137, 0, 146, 255]);
//! ```
//!
//! ## Features
//!
//! - **Two palettes**: `Violet` and `Ember`, each a five-cutoff brightness
//!   table over three colors
//! - **Dithering**: boundary bands pick their home color with probability
//!   0.7, otherwise the neighbouring color
//! - **Compression pass**: optional in-memory JPEG round trip so encoder
//!   artifacts feed the classifier
//! - **Stipple effect**: rebuild a frame from random square dots
//! - **Parallel filtering**: contiguous frame ranges on a dedicated rayon
//!   pool, with monotonic progress reporting
//! - **Reproducible runs**: an optional seed fixes every frame's randomness
//! - **Progress & cancellation**: callbacks, `CancellationToken`, and
//!   per-stage timeouts
//! - **Guaranteed cleanup**: scratch directories are removed on every
//!   outcome and the output only appears once fully written
//! - **Stream probing**: `MediaProbe` reads frame rate, duration, and audio
//!   presence through `ffprobe`
//!
//! ## Requirements
//!
//! The `ffmpeg` and `ffprobe` binaries must be installed and on `PATH`, or
//! their locations passed to [`FfmpegFrameSource`], [`FfmpegFrameSink`] and
//! [`MediaProbe`].

pub mod configuration;
pub mod error;
pub mod ffmpeg;
pub mod filter;
pub mod frame;
pub mod media;
pub mod palette;
pub mod partition;
pub mod pipeline;
pub mod probe;
pub mod progress;
pub mod stipple;
mod utilities;
pub mod validation;
mod worker;

pub use configuration::{PipelineOptions, ScratchLayout};
pub use error::PosterizeError;
pub use ffmpeg::{FfmpegFrameSink, FfmpegFrameSource, FfmpegLogLevel, tools_available};
pub use filter::{
    DEFAULT_COMPRESSION_LEVEL, FilterOptions, FrameFilter, jpeg_quality, save_image,
};
pub use frame::{Frame, FrameNaming};
pub use media::{AssembleJob, FrameSink, FrameSource, StageContext};
pub use palette::{
    Band, BrightnessTable, DEFAULT_DITHER_PROBABILITY, PaletteVariant, PixelClassifier, brightness,
};
pub use partition::{WorkRange, partition};
pub use pipeline::{Pipeline, PipelineState, RunSummary};
pub use probe::{MediaProbe, ProbeReport};
pub use progress::{CancellationToken, ProgressCallback, ProgressInfo, ProgressTracker, Stage};
pub use stipple::{StippleOptions, stipple};
pub use validation::ValidationReport;
