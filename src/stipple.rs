//! Stipple ("pointillism") post-effect.
//!
//! Rebuilds a frame from randomly placed square dots sampled from the
//! classified image. The canvas starts fully transparent; pixels no dot
//! lands on stay that way, and overlapping dots keep the most recent color.

use image::RgbaImage;
use rand::Rng;

/// Settings for the stipple effect.
///
/// # Example
///
/// ```
/// use posterize::StippleOptions;
///
/// let options = StippleOptions::new().with_iterations(2_000).with_max_block(2);
/// assert_eq!(options.iterations, 2_000);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub struct StippleOptions {
    /// Number of dots stamped onto the canvas.
    pub iterations: u32,
    /// Largest dot edge length in pixels. Dots are `1..=max_block` wide.
    pub max_block: u32,
}

impl Default for StippleOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl StippleOptions {
    /// 10,000 dots of edge 1 to 3.
    pub fn new() -> Self {
        Self {
            iterations: 10_000,
            max_block: 3,
        }
    }

    /// Set the number of dots.
    pub fn with_iterations(mut self, iterations: u32) -> Self {
        self.iterations = iterations;
        self
    }

    /// Set the largest dot edge. Clamped to a minimum of 1.
    pub fn with_max_block(mut self, max_block: u32) -> Self {
        self.max_block = max_block.max(1);
        self
    }
}

/// Apply the stipple effect to `source`, returning a new canvas.
pub fn stipple<R: Rng + ?Sized>(
    source: &RgbaImage,
    options: &StippleOptions,
    rng: &mut R,
) -> RgbaImage {
    let (width, height) = source.dimensions();
    let mut canvas = RgbaImage::new(width, height);
    if width == 0 || height == 0 {
        return canvas;
    }

    let max_block = options.max_block.max(1);
    for _ in 0..options.iterations {
        let x = rng.gen_range(0..width);
        let y = rng.gen_range(0..height);
        let color = *source.get_pixel(x, y);
        let size = rng.gen_range(1..=max_block);

        // Clip the block at the right and bottom edges.
        let x_end = (x + size).min(width);
        let y_end = (y + size).min(height);
        for block_y in y..y_end {
            for block_x in x..x_end {
                canvas.put_pixel(block_x, block_y, color);
            }
        }
    }

    canvas
}
