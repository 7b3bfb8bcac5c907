//! Brightness classification into a three-color palette.
//!
//! Every pixel is reduced to its brightness, the rounded mean of its three
//! channels, and looked up in a six-band table. The outer bands map to a
//! fixed color; the boundary bands pick their home color with probability
//! `p` and the neighbouring band's color otherwise, which produces the grainy
//! dithered edge between tones.
//!
//! # Example
//!
//! ```
//! use posterize::{PaletteVariant, PixelClassifier};
//! use rand::SeedableRng;
//! use rand::rngs::StdRng;
//!
//! let classifier = PixelClassifier::new(PaletteVariant::Violet, false);
//! let mut rng = StdRng::seed_from_u64(7);
//! assert_eq!(classifier.classify([250, 250, 250], &mut rng).0, [137, 0, 146, 255]);
//! ```

use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

use image::Rgba;
use rand::Rng;

use crate::error::PosterizeError;

/// Probability of keeping a boundary band's home color when dithering is on.
pub const DEFAULT_DITHER_PROBABILITY: f64 = 0.7;

/// A named brightness-cutoff table plus its three output colors.
///
/// The two variants disagree on where the middle bands sit (120 versus 90)
/// and are kept as separate tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PaletteVariant {
    /// Black, oxblood and violet; cutoffs 25, 70, 120, 200, 230.
    #[default]
    Violet,
    /// Black, plum and scarlet; cutoffs 25, 70, 90, 150, 200.
    Ember,
}

impl PaletteVariant {
    /// All variants, in the order the CLI lists them.
    pub const ALL: [PaletteVariant; 2] = [PaletteVariant::Violet, PaletteVariant::Ember];

    /// The band table for this variant.
    pub fn table(self) -> &'static BrightnessTable {
        match self {
            PaletteVariant::Violet => &VIOLET,
            PaletteVariant::Ember => &EMBER,
        }
    }

    /// Canonical lowercase name.
    pub fn name(self) -> &'static str {
        match self {
            PaletteVariant::Violet => "violet",
            PaletteVariant::Ember => "ember",
        }
    }
}

impl Display for PaletteVariant {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.name())
    }
}

impl FromStr for PaletteVariant {
    type Err = PosterizeError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "violet" | "a" | "1" => Ok(PaletteVariant::Violet),
            "ember" | "b" | "2" => Ok(PaletteVariant::Ember),
            other => Err(PosterizeError::InvalidConfig(format!(
                "unknown palette variant `{other}` (expected violet or ember)"
            ))),
        }
    }
}

/// Six-band brightness table.
///
/// `cutoffs` split the brightness axis as `b ≤ c0`, `b ≤ c1`, `b < c2`,
/// `b < c3`, `b < c4`, and everything above. `colors` are the dark, middle
/// and light palette entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrightnessTable {
    /// Band boundaries, ascending.
    pub cutoffs: [u8; 5],
    /// Dark, middle and light colors.
    pub colors: [Rgba<u8>; 3],
}

/// What a brightness band resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Band {
    /// Always the given palette slot.
    Fixed(usize),
    /// The `home` slot with probability `p`, otherwise `neighbour`.
    Dithered {
        /// Slot picked with probability `p`.
        home: usize,
        /// Slot picked otherwise.
        neighbour: usize,
    },
}

const BANDS: [Band; 6] = [
    Band::Fixed(0),
    Band::Dithered { home: 0, neighbour: 1 },
    Band::Dithered { home: 1, neighbour: 0 },
    Band::Fixed(1),
    Band::Dithered { home: 2, neighbour: 1 },
    Band::Fixed(2),
];

static VIOLET: BrightnessTable = BrightnessTable {
    cutoffs: [25, 70, 120, 200, 230],
    colors: [
        Rgba([0, 0, 0, 255]),
        Rgba([102, 0, 31, 255]),
        Rgba([137, 0, 146, 255]),
    ],
};

static EMBER: BrightnessTable = BrightnessTable {
    cutoffs: [25, 70, 90, 150, 200],
    colors: [
        Rgba([0, 0, 0, 255]),
        Rgba([92, 36, 60, 255]),
        Rgba([203, 43, 43, 255]),
    ],
};

impl BrightnessTable {
    /// Resolve a brightness value to its band.
    pub fn band(&self, brightness: u8) -> Band {
        let [c0, c1, c2, c3, c4] = self.cutoffs;
        let slot = if brightness <= c0 {
            0
        } else if brightness <= c1 {
            1
        } else if brightness < c2 {
            2
        } else if brightness < c3 {
            3
        } else if brightness < c4 {
            4
        } else {
            5
        };
        BANDS[slot]
    }
}

/// Rounded arithmetic mean of the three channels.
pub fn brightness(rgb: [u8; 3]) -> u8 {
    let sum = rgb[0] as u16 + rgb[1] as u16 + rgb[2] as u16;
    ((sum + 1) / 3) as u8
}

/// Maps pixels to palette colors for one palette variant and dither setting.
///
/// Cheap to copy; each worker holds its own.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PixelClassifier {
    variant: PaletteVariant,
    probability: f64,
}

impl PixelClassifier {
    /// Create a classifier. With `dither` the home probability is
    /// [`DEFAULT_DITHER_PROBABILITY`], otherwise 1.0.
    pub fn new(variant: PaletteVariant, dither: bool) -> Self {
        let probability = if dither {
            DEFAULT_DITHER_PROBABILITY
        } else {
            1.0
        };
        Self::with_probability(variant, probability)
    }

    /// Create a classifier with an explicit home probability, clamped to
    /// `[0, 1]`.
    pub fn with_probability(variant: PaletteVariant, probability: f64) -> Self {
        let probability = if probability.is_nan() {
            1.0
        } else {
            probability.clamp(0.0, 1.0)
        };
        Self {
            variant,
            probability,
        }
    }

    /// The palette variant.
    pub fn variant(&self) -> PaletteVariant {
        self.variant
    }

    /// Probability of keeping a boundary band's home color.
    pub fn probability(&self) -> f64 {
        self.probability
    }

    /// `true` when classification never consumes randomness.
    pub fn is_deterministic(&self) -> bool {
        self.probability >= 1.0
    }

    /// Classify one RGB pixel.
    ///
    /// Draws at most one sample from `rng`, and only for a boundary band
    /// while dithering is active.
    pub fn classify<R: Rng + ?Sized>(&self, rgb: [u8; 3], rng: &mut R) -> Rgba<u8> {
        let table = self.variant.table();
        let slot = match table.band(brightness(rgb)) {
            Band::Fixed(slot) => slot,
            Band::Dithered { home, .. } if self.is_deterministic() => home,
            Band::Dithered { home, neighbour } => {
                if rng.gen_bool(self.probability) {
                    home
                } else {
                    neighbour
                }
            }
        };
        table.colors[slot]
    }
}
