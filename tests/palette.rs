//! PixelClassifier, brightness table, and palette variant tests.

use image::Rgba;
use posterize::{
    Band, DEFAULT_DITHER_PROBABILITY, PaletteVariant, PixelClassifier, PosterizeError, brightness,
};
use rand::SeedableRng;
use rand::rngs::StdRng;

const VIOLET_C0: [u8; 4] = [0, 0, 0, 255];
const VIOLET_C1: [u8; 4] = [102, 0, 31, 255];
const VIOLET_C2: [u8; 4] = [137, 0, 146, 255];

const EMBER_C0: [u8; 4] = [0, 0, 0, 255];
const EMBER_C1: [u8; 4] = [92, 36, 60, 255];
const EMBER_C2: [u8; 4] = [203, 43, 43, 255];

fn gray(value: u8) -> [u8; 3] {
    [value, value, value]
}

fn classify(variant: PaletteVariant, value: u8) -> [u8; 4] {
    let classifier = PixelClassifier::new(variant, false);
    let mut rng = StdRng::seed_from_u64(0);
    classifier.classify(gray(value), &mut rng).0
}

// ── Brightness ─────────────────────────────────────────────────────

#[test]
fn brightness_is_rounded_mean() {
    assert_eq!(brightness([0, 0, 0]), 0);
    assert_eq!(brightness([255, 255, 255]), 255);
    // 100 / 3 = 33.33
    assert_eq!(brightness([100, 0, 0]), 33);
    // 101 / 3 = 33.67
    assert_eq!(brightness([101, 0, 0]), 34);
    assert_eq!(brightness([10, 20, 30]), 20);
}

// ── Violet (variant A) ─────────────────────────────────────────────

#[test]
fn violet_outer_bands_are_fixed() {
    assert_eq!(classify(PaletteVariant::Violet, 0), VIOLET_C0);
    assert_eq!(classify(PaletteVariant::Violet, 25), VIOLET_C0);
    assert_eq!(classify(PaletteVariant::Violet, 230), VIOLET_C2);
    assert_eq!(classify(PaletteVariant::Violet, 255), VIOLET_C2);
}

#[test]
fn violet_middle_band_is_fixed() {
    assert_eq!(classify(PaletteVariant::Violet, 120), VIOLET_C1);
    assert_eq!(classify(PaletteVariant::Violet, 199), VIOLET_C1);
}

#[test]
fn violet_boundary_bands_use_home_color_without_dither() {
    // 25 < b <= 70 is home to C0.
    assert_eq!(classify(PaletteVariant::Violet, 26), VIOLET_C0);
    assert_eq!(classify(PaletteVariant::Violet, 70), VIOLET_C0);
    // 70 < b < 120 is home to C1.
    assert_eq!(classify(PaletteVariant::Violet, 71), VIOLET_C1);
    assert_eq!(classify(PaletteVariant::Violet, 119), VIOLET_C1);
    // 200 <= b < 230 is home to C2.
    assert_eq!(classify(PaletteVariant::Violet, 200), VIOLET_C2);
    assert_eq!(classify(PaletteVariant::Violet, 229), VIOLET_C2);
}

#[test]
fn violet_band_layout() {
    let table = PaletteVariant::Violet.table();
    assert_eq!(table.cutoffs, [25, 70, 120, 200, 230]);
    assert_eq!(table.band(25), Band::Fixed(0));
    assert_eq!(table.band(26), Band::Dithered { home: 0, neighbour: 1 });
    assert_eq!(table.band(100), Band::Dithered { home: 1, neighbour: 0 });
    assert_eq!(table.band(150), Band::Fixed(1));
    assert_eq!(table.band(210), Band::Dithered { home: 2, neighbour: 1 });
    assert_eq!(table.band(240), Band::Fixed(2));
}

// ── Ember (variant B) ──────────────────────────────────────────────

#[test]
fn ember_boundary_vectors() {
    assert_eq!(classify(PaletteVariant::Ember, 70), EMBER_C0);
    assert_eq!(classify(PaletteVariant::Ember, 91), EMBER_C1);
    assert_eq!(classify(PaletteVariant::Ember, 200), EMBER_C2);
}

#[test]
fn ember_uses_its_own_cutoffs() {
    let table = PaletteVariant::Ember.table();
    assert_eq!(table.cutoffs, [25, 70, 90, 150, 200]);
    // 100 is a dithered band for Violet but fixed for Ember.
    assert_eq!(table.band(100), Band::Fixed(1));
    assert_ne!(PaletteVariant::Violet.table(), PaletteVariant::Ember.table());
    assert_eq!(classify(PaletteVariant::Ember, 10), EMBER_C0);
    assert_eq!(classify(PaletteVariant::Ember, 170), EMBER_C2);
}

// ── Determinism and dithering ──────────────────────────────────────

#[test]
fn classification_without_dither_is_deterministic() {
    let classifier = PixelClassifier::new(PaletteVariant::Violet, false);
    assert!(classifier.is_deterministic());
    let mut first = StdRng::seed_from_u64(1);
    let mut second = StdRng::seed_from_u64(2);
    for value in 0..=255u8 {
        let a = classifier.classify(gray(value), &mut first);
        let b = classifier.classify(gray(value), &mut second);
        assert_eq!(a, b, "brightness {value}");
    }
}

#[test]
fn classification_depends_only_on_brightness() {
    let classifier = PixelClassifier::new(PaletteVariant::Ember, false);
    let mut rng = StdRng::seed_from_u64(3);
    let pixels = [[100, 100, 100], [150, 150, 0], [0, 100, 200]];
    assert!(pixels.iter().all(|rgb| brightness(*rgb) == 100));
    let colors: Vec<Rgba<u8>> = pixels
        .iter()
        .map(|rgb| classifier.classify(*rgb, &mut rng))
        .collect();
    assert!(colors.windows(2).all(|pair| pair[0] == pair[1]));
}

#[test]
fn dither_probability_defaults() {
    let dithered = PixelClassifier::new(PaletteVariant::Violet, true);
    assert_eq!(dithered.probability(), DEFAULT_DITHER_PROBABILITY);
    assert!(!dithered.is_deterministic());

    let plain = PixelClassifier::new(PaletteVariant::Violet, false);
    assert_eq!(plain.probability(), 1.0);
}

#[test]
fn explicit_probability_is_clamped() {
    assert_eq!(PixelClassifier::with_probability(PaletteVariant::Violet, 1.5).probability(), 1.0);
    assert_eq!(PixelClassifier::with_probability(PaletteVariant::Violet, -0.5).probability(), 0.0);
    assert_eq!(
        PixelClassifier::with_probability(PaletteVariant::Violet, f64::NAN).probability(),
        1.0
    );
}

#[test]
fn dithered_band_mixes_home_and_neighbour() {
    let classifier = PixelClassifier::new(PaletteVariant::Violet, true);
    let mut rng = StdRng::seed_from_u64(42);
    let samples = 10_000;
    let home = (0..samples)
        .filter(|_| classifier.classify(gray(50), &mut rng).0 == VIOLET_C0)
        .count();
    let ratio = home as f64 / samples as f64;
    assert!((0.66..=0.74).contains(&ratio), "home ratio {ratio}");
}

#[test]
fn dithered_band_never_leaves_its_two_colors() {
    let classifier = PixelClassifier::new(PaletteVariant::Violet, true);
    let mut rng = StdRng::seed_from_u64(9);
    for _ in 0..1_000 {
        let color = classifier.classify(gray(210), &mut rng).0;
        assert!(color == VIOLET_C2 || color == VIOLET_C1);
    }
}

#[test]
fn fixed_bands_ignore_dithering() {
    let classifier = PixelClassifier::new(PaletteVariant::Violet, true);
    let mut rng = StdRng::seed_from_u64(5);
    for _ in 0..1_000 {
        assert_eq!(classifier.classify(gray(10), &mut rng).0, VIOLET_C0);
        assert_eq!(classifier.classify(gray(150), &mut rng).0, VIOLET_C1);
        assert_eq!(classifier.classify(gray(250), &mut rng).0, VIOLET_C2);
    }
}

#[test]
fn seeded_dithering_is_reproducible() {
    let classifier = PixelClassifier::new(PaletteVariant::Ember, true);
    let run = |seed| {
        let mut rng = StdRng::seed_from_u64(seed);
        (0..=255u8)
            .map(|value| classifier.classify(gray(value), &mut rng))
            .collect::<Vec<_>>()
    };
    assert_eq!(run(11), run(11));
}

// ── Variant parsing ────────────────────────────────────────────────

#[test]
fn variant_parses_names_and_aliases() {
    for text in ["violet", "VIOLET", "a", "1"] {
        assert_eq!(text.parse::<PaletteVariant>().unwrap(), PaletteVariant::Violet);
    }
    for text in ["ember", "b", "2"] {
        assert_eq!(text.parse::<PaletteVariant>().unwrap(), PaletteVariant::Ember);
    }
}

#[test]
fn unknown_variant_is_invalid_config() {
    let error = "teal".parse::<PaletteVariant>().unwrap_err();
    assert!(matches!(error, PosterizeError::InvalidConfig(_)));
}

#[test]
fn variant_display_matches_name() {
    for variant in PaletteVariant::ALL {
        assert_eq!(variant.to_string(), variant.name());
    }
    assert_eq!(PaletteVariant::default(), PaletteVariant::Violet);
}
