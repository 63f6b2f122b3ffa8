use anyhow::{anyhow, Context, Result};
use clap::{ArgAction, Parser};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::sync::OnceLock;
use vidscii::{AppConfig, CancelToken, Gradient, Pipeline, PipelineOptions, SchedulingMode, StopReason, VideoSource};

#[derive(Parser, Debug)]
#[command(version, about = "Play a video as ASCII art in the terminal, with sound.")]
struct Args {
    /// Map frames from the video; false replays the frame cache
    #[arg(short = 'm', long, default_value_t = true, action = ArgAction::Set)]
    map_frames: bool,

    /// Frames per second; -1 probes the video
    #[arg(short = 'f', long, default_value_t = -1, allow_negative_numbers = true)]
    fps: i64,

    /// Play the audio track
    #[arg(short = 'a', long, default_value_t = true, action = ArgAction::Set)]
    audio: bool,

    /// Path of the video to play
    #[arg(short = 'p', long)]
    path: Option<PathBuf>,

    /// URL of a video to download and play (takes precedence over --path)
    #[arg(short = 'u', long, default_value = "")]
    url: String,

    /// Config file (JSON or TOML) instead of the discovered one
    #[arg(long)]
    config: Option<PathBuf>,

    /// Size preset from the config
    #[arg(long)]
    preset: Option<String>,

    /// Frame width in pixels, overrides the preset
    #[arg(long)]
    width: Option<u32>,

    /// Frame height in pixels, overrides the preset
    #[arg(long)]
    height: Option<u32>,

    /// Glyphs from densest to lightest
    #[arg(long)]
    gradient: Option<Gradient>,

    /// Number of frame workers
    #[arg(long)]
    workers: Option<usize>,

    /// How frames are picked for each tick
    #[arg(long, value_enum)]
    mode: Option<SchedulingMode>,

    /// Don't print the elapsed/total line under each frame
    #[arg(long, default_value_t = false)]
    no_status: bool,

    /// Frame cache file
    #[arg(long)]
    cache: Option<PathBuf>,

    /// error, warn, info, debug or trace
    #[arg(long, default_value = "info")]
    log_level: log::LevelFilter,
}

fn mapping_bar(total: usize) -> ProgressBar {
    let pb = ProgressBar::new(total as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%)")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );
    pb
}

fn main() -> Result<()> {
    let args = Args::parse();
    env_logger::Builder::new()
        .filter_level(args.log_level)
        .format_timestamp_millis()
        .init();

    let config = match &args.config {
        Some(path) => AppConfig::from_file(path)?,
        None => AppConfig::discover()?,
    };

    let mut render = config.render_settings(args.preset.as_deref())?;
    if let Some(width) = args.width {
        render.width = width;
    }
    if let Some(height) = args.height {
        render.height = height;
    }
    if render.width == 0 || render.height == 0 {
        return Err(anyhow!("frame size must be at least 1x1, got {}x{}", render.width, render.height));
    }
    if let Some(gradient) = args.gradient {
        render.gradient = gradient;
    }

    let source = if args.url.is_empty() {
        VideoSource::Path(args.path.unwrap_or_else(|| config.input_path.clone()))
    } else {
        VideoSource::Url(args.url)
    };

    let mut options = PipelineOptions::from_config(&config, source, render);
    options.map_frames = args.map_frames;
    options.play_audio = args.audio;
    options.fps = u32::try_from(args.fps).ok().filter(|fps| *fps > 0);
    if let Some(workers) = args.workers {
        if workers == 0 {
            return Err(anyhow!("--workers must be at least 1"));
        }
        options.workers = workers;
    }
    if let Some(mode) = args.mode {
        options.scheduling = mode;
    }
    if args.no_status {
        options.status_line = false;
    }
    if let Some(cache) = args.cache {
        options.cache_path = cache;
    }

    let cancel = CancelToken::new();
    let on_interrupt = cancel.clone();
    ctrlc::set_handler(move || on_interrupt.cancel()).context("installing Ctrl-C handler")?;

    let bar: OnceLock<ProgressBar> = OnceLock::new();
    let report = Pipeline::new(options).run(
        &cancel,
        Some(|done: usize, total: usize| {
            let pb = bar.get_or_init(|| mapping_bar(total));
            pb.set_position(done as u64);
            if done == total {
                pb.finish_with_message("Done");
            }
        }),
    )?;

    match report.stop {
        StopReason::Cancelled => log::info!("Playback interrupted after {} frames", report.frames_shown),
        _ => log::info!(
            "Playback finished: {} frames shown, {} dropped",
            report.frames_shown,
            report.frames_dropped
        ),
    }
    Ok(())
}
