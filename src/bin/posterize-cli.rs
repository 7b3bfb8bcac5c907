use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use posterize::{
    FfmpegFrameSink, FfmpegFrameSource, FfmpegLogLevel, FilterOptions, FrameFilter, MediaProbe,
    PaletteVariant, Pipeline, PipelineOptions, ProgressCallback, ProgressInfo, ScratchLayout,
    StippleOptions, save_image,
};
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde_json::json;

const CLI_AFTER_HELP: &str = "Examples:\n  posterize run input.mp4 output.mp4 --palette violet --dither --progress\n  posterize run input.mp4 output.mp4 --palette ember --compression --stipple --seed 7\n  posterize image still.png still_posterized.png --dither\n  posterize probe input.mp4 --json\n  posterize completions zsh > _posterize";

#[derive(Debug, Parser)]
#[command(
    name = "posterize",
    version,
    about = "Render videos and images as dithered two/three-tone posterizations",
    after_help = CLI_AFTER_HELP
)]
struct Cli {
    #[command(flatten)]
    global: GlobalOptions,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Parser, Clone, Default)]
struct GlobalOptions {
    /// Show additional logging output.
    #[arg(long, global = true)]
    verbose: bool,

    /// Show a progress bar where supported.
    #[arg(long, global = true)]
    progress: bool,

    /// Allow overwriting existing output files.
    #[arg(long, global = true)]
    overwrite: bool,

    /// FFmpeg log level (quiet, panic, fatal, error, warning, info, verbose, debug, trace).
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Path to the ffmpeg binary.
    #[arg(long, global = true, default_value = "ffmpeg")]
    ffmpeg: PathBuf,

    /// Path to the ffprobe binary.
    #[arg(long, global = true, default_value = "ffprobe")]
    ffprobe: PathBuf,
}

#[derive(Debug, Clone, clap::Args)]
struct FilterArgs {
    /// Palette: violet (a, 1) or ember (b, 2).
    #[arg(long, default_value = "violet")]
    palette: String,

    /// Randomize the boundary bands.
    #[arg(long)]
    dither: bool,

    /// JPEG round trip before classification. The optional level runs from
    /// 0 (most detail) to 100 (least); without a value 90 is used.
    #[arg(
        long,
        num_args = 0..=1,
        default_missing_value = "90",
        value_parser = clap::value_parser!(u8).range(0..=100)
    )]
    compression: Option<u8>,

    /// Rebuild frames from random dots.
    #[arg(long)]
    stipple: bool,

    /// Number of dots stamped per frame with --stipple.
    #[arg(long, default_value_t = 10_000)]
    stipple_iterations: u32,

    /// Seed for reproducible output.
    #[arg(long)]
    seed: Option<u64>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Posterize a video.
    #[command(
        about = "Posterize a video, keeping its audio",
        after_help = "Examples:\n  posterize run input.mp4 output.mp4 --dither\n  posterize run input.mp4 output.mp4 --fps 12 --workers 4 --scratch /tmp/job --json"
    )]
    Run {
        /// Input video path.
        input: PathBuf,
        /// Output video path.
        output: PathBuf,
        #[command(flatten)]
        filter: FilterArgs,
        /// Frame rate to extract and encode at. Defaults to the source rate.
        #[arg(long)]
        fps: Option<f64>,
        /// Maximum number of filtering workers.
        #[arg(long)]
        workers: Option<usize>,
        /// Directory for intermediate frames.
        #[arg(long)]
        scratch: Option<PathBuf>,
        /// Zero-padding width of intermediate frame names (6-10).
        #[arg(long, default_value_t = 6)]
        frame_digits: usize,
        /// Per-stage timeout in seconds.
        #[arg(long)]
        timeout: Option<f64>,
        /// Print the run summary as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Posterize a single image.
    #[command(
        about = "Posterize a still image",
        after_help = "Examples:\n  posterize image still.jpg out.png --palette ember --dither --seed 3"
    )]
    Image {
        /// Input image path.
        input: PathBuf,
        /// Output image path; the extension picks the format.
        output: PathBuf,
        #[command(flatten)]
        filter: FilterArgs,
    },

    /// Print what ffprobe reports about a media file.
    #[command(
        about = "Print media metadata",
        visible_alias = "info",
        after_help = "Examples:\n  posterize probe input.mp4\n  posterize probe input.mp4 --count-frames --json"
    )]
    Probe {
        /// Input media path.
        input: PathBuf,
        /// Decode the video to count frames exactly.
        #[arg(long)]
        count_frames: bool,
        /// Output metadata as machine-readable JSON.
        #[arg(long)]
        json: bool,
    },

    /// Generate shell completion scripts.
    Completions {
        /// Target shell.
        shell: Shell,
    },
}

fn parse_log_level(value: &str) -> Option<FfmpegLogLevel> {
    match value.to_ascii_lowercase().as_str() {
        "quiet" => Some(FfmpegLogLevel::Quiet),
        "panic" => Some(FfmpegLogLevel::Panic),
        "fatal" => Some(FfmpegLogLevel::Fatal),
        "error" => Some(FfmpegLogLevel::Error),
        "warning" | "warn" => Some(FfmpegLogLevel::Warning),
        "info" => Some(FfmpegLogLevel::Info),
        "verbose" => Some(FfmpegLogLevel::Verbose),
        "debug" => Some(FfmpegLogLevel::Debug),
        "trace" => Some(FfmpegLogLevel::Trace),
        _ => None,
    }
}

fn ensure_writable_path(path: &Path, overwrite: bool) -> Result<(), Box<dyn std::error::Error>> {
    if path.exists() {
        if overwrite {
            eprintln!(
                "{} {}",
                "warning:".yellow().bold(),
                format!("overwriting {}", path.display()).yellow()
            );
        } else {
            return Err(format!(
                "output already exists: {} (use --overwrite to replace)",
                path.display()
            )
            .into());
        }
    }
    Ok(())
}

fn filter_options(args: &FilterArgs) -> Result<FilterOptions, Box<dyn std::error::Error>> {
    let palette: PaletteVariant = args.palette.parse()?;
    let mut options = FilterOptions::new(palette)
        .with_dither(args.dither)
        .with_compression(args.compression);
    if args.stipple {
        options = options
            .with_stipple_options(StippleOptions::new().with_iterations(args.stipple_iterations));
    }
    Ok(options)
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();
}

struct TerminalProgress {
    bar: ProgressBar,
}

impl TerminalProgress {
    fn new() -> Self {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::with_template(
                "{msg:>10.cyan.bold} [{bar:40}] {pos}/{len} frames ({eta})",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> "),
        );
        bar.enable_steady_tick(Duration::from_millis(120));
        Self { bar }
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl ProgressCallback for TerminalProgress {
    fn on_progress(&self, info: &ProgressInfo) {
        self.bar.set_message(info.stage.to_string());
        match info.total {
            Some(total) => {
                self.bar.set_length(total);
                self.bar.set_position(info.current);
            }
            None => {
                self.bar.set_length(1);
                let done = info.percentage.is_some_and(|pct| pct >= 100.0);
                self.bar.set_position(u64::from(done));
            }
        }
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(cli.global.verbose);

    let log_level = match &cli.global.log_level {
        Some(level) => parse_log_level(level).ok_or(format!("unsupported --log-level: {level}"))?,
        None => FfmpegLogLevel::default(),
    };
    let probe = MediaProbe::new().with_binary(&cli.global.ffprobe);

    match cli.command {
        Commands::Run {
            input,
            output,
            filter,
            fps,
            workers,
            scratch,
            frame_digits,
            timeout,
            json,
        } => {
            ensure_writable_path(&output, cli.global.overwrite)?;

            let mut options = PipelineOptions::new(filter_options(&filter)?)
                .with_frame_digits(frame_digits);
            if let Some(seed) = filter.seed {
                options = options.with_seed(seed);
            }
            if let Some(fps) = fps {
                options = options.with_frame_rate(fps);
            }
            if let Some(workers) = workers {
                options = options.with_max_parallelism(workers);
            }
            if let Some(scratch) = scratch {
                options = options.with_scratch(ScratchLayout::within(scratch));
            }
            if let Some(seconds) = timeout {
                let timeout = Duration::try_from_secs_f64(seconds)
                    .map_err(|_| format!("invalid --timeout: {seconds}"))?;
                options = options.with_stage_timeout(timeout);
            }

            let progress = cli.global.progress.then(|| Arc::new(TerminalProgress::new()));
            if let Some(progress) = &progress {
                options = options.with_progress(Arc::clone(progress) as Arc<dyn ProgressCallback>);
            }

            let source = FfmpegFrameSource::new()
                .with_binary(&cli.global.ffmpeg)
                .with_probe(probe)
                .with_log_level(log_level);
            let sink = FfmpegFrameSink::new()
                .with_binary(&cli.global.ffmpeg)
                .with_log_level(log_level);
            let mut pipeline = Pipeline::new(source, sink, options);
            let result = pipeline.run(&input, &output);
            if let Some(progress) = &progress {
                progress.finish();
            }
            let summary = result?;

            if json {
                let payload = json!({
                    "output": summary.output.display().to_string(),
                    "frame_rate": summary.frame_rate,
                    "total_frames": summary.total_frames,
                    "filtered_frames": summary.filtered_frames,
                    "skipped_frames": summary.skipped_frames,
                    "workers": summary.workers,
                    "elapsed_seconds": summary.elapsed.as_secs_f64(),
                });
                println!("{}", serde_json::to_string_pretty(&payload)?);
            } else {
                println!(
                    "{} {} ({} frames, {} skipped, {:.2}s)",
                    "wrote".green().bold(),
                    summary.output.display(),
                    summary.filtered_frames,
                    summary.skipped_frames,
                    summary.elapsed.as_secs_f64()
                );
            }
        }
        Commands::Image {
            input,
            output,
            filter,
        } => {
            ensure_writable_path(&output, cli.global.overwrite)?;
            let options = filter_options(&filter)?;
            let image = image::open(&input)?;
            let mut rng = match filter.seed {
                Some(seed) => StdRng::seed_from_u64(seed),
                None => StdRng::from_entropy(),
            };
            let filtered = FrameFilter::new(&options).apply(&image, &mut rng)?;
            save_image(&filtered, &output)?;
            println!("{} {}", "wrote".green().bold(), output.display());
        }
        Commands::Probe {
            input,
            count_frames,
            json,
        } => {
            let report = probe.probe(&input)?;
            let exact_frames = if count_frames {
                Some(probe.count_frames(&input)?)
            } else {
                None
            };
            if json {
                let payload = json!({
                    "format": report.format,
                    "duration_seconds": report.duration.map(|duration| duration.as_secs_f64()),
                    "frame_rate": report.frame_rate,
                    "width": report.width,
                    "height": report.height,
                    "frame_count": exact_frames.or(report.frame_count),
                    "has_audio": report.has_audio,
                });
                println!("{}", serde_json::to_string_pretty(&payload)?);
            } else {
                println!("{} {}", "Format:".bold(), report.format);
                if let Some(duration) = report.duration {
                    println!("{} {:.3}s", "Duration:".bold(), duration.as_secs_f64());
                }
                if let (Some(width), Some(height)) = (report.width, report.height) {
                    println!("{} {width}x{height}", "Video:".bold());
                }
                if let Some(rate) = report.frame_rate {
                    println!("{} {rate:.3} fps", "Frame rate:".bold());
                }
                if let Some(frames) = exact_frames.or(report.frame_count) {
                    println!("{} {frames}", "Frames:".bold());
                }
                println!(
                    "{} {}",
                    "Audio:".bold(),
                    if report.has_audio { "yes" } else { "no" }
                );
            }
        }
        Commands::Completions { shell } => {
            let mut command = Cli::command();
            clap_complete::generate(shell, &mut command, "posterize", &mut std::io::stdout());
        }
    }

    Ok(())
}

fn main() {
    if let Err(error) = run() {
        eprintln!("{} {error}", "error:".red().bold());
        std::process::exit(1);
    }
}
