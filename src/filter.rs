//! Per-frame posterization.
//!
//! [`FrameFilter`] is the unit of work a filtering worker runs for each
//! frame: load, optional lossy re-encode, palette classification, optional
//! stipple, save.
//!
//! # Example
//!
//! ```no_run
//! use posterize::{FilterOptions, FrameFilter, PaletteVariant};
//! use rand::SeedableRng;
//! use rand::rngs::StdRng;
//!
//! let options = FilterOptions::new(PaletteVariant::Ember)
//!     .with_dither(true)
//!     .with_compression(Some(60));
//! let filter = FrameFilter::new(&options);
//!
//! let image = image::open("still.png")?;
//! let mut rng = StdRng::seed_from_u64(1);
//! filter.apply(&image, &mut rng)?.save("still_posterized.png")?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::io::Cursor;
use std::path::{Path, PathBuf};

use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageFormat, RgbImage, RgbaImage};
use rand::Rng;

use crate::error::PosterizeError;
use crate::palette::{PaletteVariant, PixelClassifier};
use crate::stipple::{StippleOptions, stipple};

/// Compression level used when compression is requested without a value.
pub const DEFAULT_COMPRESSION_LEVEL: u8 = 90;

/// Filter settings, fixed for the duration of a run.
///
/// # Example
///
/// ```
/// use posterize::{FilterOptions, PaletteVariant};
///
/// let options = FilterOptions::new(PaletteVariant::Violet)
///     .with_dither(true)
///     .with_default_compression()
///     .with_stipple(true);
/// assert_eq!(options.compression, Some(90));
/// ```
#[derive(Debug, Clone, PartialEq)]
#[must_use]
pub struct FilterOptions {
    /// Brightness table and colors.
    pub palette: PaletteVariant,
    /// Randomize boundary bands.
    pub dither: bool,
    /// Lossy re-encode before classification, as a compression level in
    /// `0..=100`: 0 keeps the most detail, 100 the least.
    pub compression: Option<u8>,
    /// Stipple post-effect, if enabled.
    pub stipple: Option<StippleOptions>,
}

impl Default for FilterOptions {
    fn default() -> Self {
        Self::new(PaletteVariant::default())
    }
}

impl FilterOptions {
    /// Plain classification with `palette`: no dithering, compression or
    /// stipple.
    pub fn new(palette: PaletteVariant) -> Self {
        Self {
            palette,
            dither: false,
            compression: None,
            stipple: None,
        }
    }

    /// Enable or disable dithering of the boundary bands.
    pub fn with_dither(mut self, dither: bool) -> Self {
        self.dither = dither;
        self
    }

    /// Set the compression level. `None` disables the re-encode pass.
    pub fn with_compression(mut self, level: Option<u8>) -> Self {
        self.compression = level;
        self
    }

    /// Enable compression at [`DEFAULT_COMPRESSION_LEVEL`].
    pub fn with_default_compression(self) -> Self {
        self.with_compression(Some(DEFAULT_COMPRESSION_LEVEL))
    }

    /// Enable or disable the stipple effect with default settings.
    pub fn with_stipple(mut self, enabled: bool) -> Self {
        self.stipple = enabled.then(StippleOptions::new);
        self
    }

    /// Enable the stipple effect with custom settings.
    pub fn with_stipple_options(mut self, options: StippleOptions) -> Self {
        self.stipple = Some(options);
        self
    }
}

/// Applies [`FilterOptions`] to images and frame files.
#[derive(Debug, Clone)]
pub struct FrameFilter {
    classifier: PixelClassifier,
    compression: Option<u8>,
    stipple: Option<StippleOptions>,
}

impl FrameFilter {
    /// Build a filter from options.
    pub fn new(options: &FilterOptions) -> Self {
        Self {
            classifier: PixelClassifier::new(options.palette, options.dither),
            compression: options.compression,
            stipple: options.stipple,
        }
    }

    /// The pixel classifier in use.
    pub fn classifier(&self) -> &PixelClassifier {
        &self.classifier
    }

    /// Posterize an in-memory image.
    ///
    /// Randomness for dithering and stippling is drawn from `rng`, so a
    /// seeded generator makes the output reproducible.
    pub fn apply<R: Rng + ?Sized>(
        &self,
        image: &DynamicImage,
        rng: &mut R,
    ) -> Result<RgbaImage, PosterizeError> {
        let mut rgb = image.to_rgb8();
        if let Some(level) = self.compression {
            rgb = recompress(rgb, level)?;
        }

        let classified = RgbaImage::from_fn(rgb.width(), rgb.height(), |x, y| {
            self.classifier.classify(rgb.get_pixel(x, y).0, &mut *rng)
        });

        Ok(match &self.stipple {
            Some(options) => stipple(&classified, options, rng),
            None => classified,
        })
    }

    /// Posterize the frame at `source` into `output_directory`.
    ///
    /// The result keeps the source's file stem and is written as PNG.
    /// Returns [`PosterizeError::MissingFrame`] if `source` does not exist.
    pub fn filter_frame<R: Rng + ?Sized>(
        &self,
        index: u64,
        source: &Path,
        output_directory: &Path,
        rng: &mut R,
    ) -> Result<PathBuf, PosterizeError> {
        if !source.is_file() {
            return Err(PosterizeError::MissingFrame {
                index,
                path: source.to_path_buf(),
            });
        }

        let image = image::open(source)?;
        let filtered = self.apply(&image, rng)?;

        let stem = source.file_stem().ok_or_else(|| {
            PosterizeError::InvalidConfig(format!(
                "frame path {} has no file name",
                source.display()
            ))
        })?;
        let destination = output_directory.join(stem).with_extension("png");
        filtered.save_with_format(&destination, ImageFormat::Png)?;
        Ok(destination)
    }
}

/// Save a filtered image to `path`, choosing the format from its extension.
///
/// Formats without an alpha channel (JPEG, PNM) get the image flattened to
/// RGB first; transparent stipple pixels then come out black.
pub fn save_image(image: &RgbaImage, path: &Path) -> Result<(), PosterizeError> {
    let format = ImageFormat::from_path(path)?;
    if matches!(format, ImageFormat::Jpeg | ImageFormat::Pnm) {
        DynamicImage::ImageRgba8(image.clone())
            .to_rgb8()
            .save_with_format(path, format)?;
    } else {
        image.save_with_format(path, format)?;
    }
    Ok(())
}

/// Encoder quality for a compression level.
pub fn jpeg_quality(level: u8) -> u8 {
    (100u8.saturating_sub(level)).clamp(1, 100)
}

/// Round-trip through an in-memory JPEG so its artifacts reach the classifier.
fn recompress(rgb: RgbImage, level: u8) -> Result<RgbImage, PosterizeError> {
    let mut buffer = Cursor::new(Vec::new());
    let encoder = JpegEncoder::new_with_quality(&mut buffer, jpeg_quality(level));
    DynamicImage::ImageRgb8(rgb).write_with_encoder(encoder)?;

    let decoded = image::load_from_memory_with_format(buffer.get_ref(), ImageFormat::Jpeg)?;
    Ok(decoded.to_rgb8())
}
