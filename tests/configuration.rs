//! PipelineOptions and ScratchLayout tests.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use posterize::{
    CancellationToken, FilterOptions, PaletteVariant, PipelineOptions, ProgressCallback,
    ProgressInfo, ScratchLayout,
};

struct Silent;

impl ProgressCallback for Silent {
    fn on_progress(&self, _info: &ProgressInfo) {}
}

// ── PipelineOptions builder ──────────────────────────────────────

#[test]
fn options_defaults() {
    let options = PipelineOptions::default();
    let debug = format!("{options:?}");
    assert!(debug.contains("PipelineOptions"));
    assert!(debug.contains("has_cancellation: false"));
    assert!(debug.contains("seed: None"));

    assert_eq!(options.filter(), &FilterOptions::default());
    assert_eq!(options.frame_rate(), None);
    assert_eq!(options.stage_timeout(), None);
    assert_eq!(options.report_interval(), Duration::from_millis(250));
    assert_eq!(options.naming().digits(), 6);
}

#[test]
fn options_with_cancellation() {
    let options = PipelineOptions::default().with_cancellation(CancellationToken::new());
    assert!(format!("{options:?}").contains("has_cancellation: true"));
}

#[test]
fn options_builder_chain() {
    let filter = FilterOptions::new(PaletteVariant::Ember).with_dither(true);
    let options = PipelineOptions::new(filter.clone())
        .with_frame_rate(12.5)
        .with_seed(99)
        .with_progress(Arc::new(Silent))
        .with_stage_timeout(Duration::from_secs(30))
        .with_frame_digits(8);

    assert_eq!(options.filter(), &filter);
    assert_eq!(options.frame_rate(), Some(12.5));
    assert_eq!(options.seed(), Some(99));
    assert_eq!(options.stage_timeout(), Some(Duration::from_secs(30)));
    assert_eq!(options.naming().digits(), 8);
}

#[test]
fn with_filter_replaces_settings() {
    let options = PipelineOptions::default()
        .with_filter(FilterOptions::new(PaletteVariant::Ember).with_default_compression());
    assert_eq!(options.filter().palette, PaletteVariant::Ember);
    assert_eq!(options.filter().compression, Some(90));
}

#[test]
fn report_interval_is_clamped() {
    let fast = PipelineOptions::default().with_report_interval(Duration::from_millis(5));
    assert_eq!(fast.report_interval(), Duration::from_millis(100));

    let slow = PipelineOptions::default().with_report_interval(Duration::from_secs(10));
    assert_eq!(slow.report_interval(), Duration::from_secs(1));

    let middle = PipelineOptions::default().with_report_interval(Duration::from_millis(400));
    assert_eq!(middle.report_interval(), Duration::from_millis(400));
}

#[test]
fn parallelism_defaults_and_floor() {
    assert!(PipelineOptions::default().parallelism() >= 1);
    assert_eq!(PipelineOptions::default().with_max_parallelism(3).parallelism(), 3);
    assert_eq!(PipelineOptions::default().with_max_parallelism(0).parallelism(), 1);
}

// ── ScratchLayout ────────────────────────────────────────────────

#[test]
fn scratch_within_root() {
    let layout = ScratchLayout::within("/tmp/job");
    assert_eq!(layout.input_directory, Path::new("/tmp/job/frames"));
    assert_eq!(layout.output_directory, Path::new("/tmp/job/filtered"));
    assert_eq!(layout.manifest, Path::new("/tmp/job/frames.ffconcat"));
    assert_eq!(layout.root(), Some(Path::new("/tmp/job")));
}

#[test]
fn scratch_explicit_paths_have_no_root() {
    let layout = ScratchLayout::new("/a/in", "/a/out", "/a/list.txt");
    assert_eq!(layout.input_directory, Path::new("/a/in"));
    assert_eq!(layout.root(), None);
}

#[test]
fn default_scratch_is_per_process() {
    let layout = ScratchLayout::default();
    let root = layout.root().expect("default layout has a root");
    assert!(root.starts_with(std::env::temp_dir()));
    let name = root.file_name().unwrap().to_string_lossy().into_owned();
    assert_eq!(name, format!("posterize-{}", std::process::id()));
}
