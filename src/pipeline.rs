//! End-to-end run: acquire, extract, map, cache, then play.

use std::fs;
use std::io::{self, BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Instant;

use anyhow::{anyhow, Context, Result};

use crate::audio::AudioPlayer;
use crate::cache::FrameCache;
use crate::config::{AppConfig, RenderSettings};
use crate::download::{download, parse_video_url};
use crate::mapper::FrameMapper;
use crate::pool::{count_frames, map_frames};
use crate::scheduler::{CancelToken, PlaybackOptions, PlaybackReport, Scheduler, SchedulingMode, StopReason};
use crate::transcoder::{ensure_tool, extract_audio, extract_frames, probe_fps, FFMPEG, FFPROBE};

/// Where the video comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VideoSource {
    Path(PathBuf),
    /// Watch-page or short-link URL, downloaded before anything else.
    Url(String),
}

/// Removes a file when dropped. Removal failures are only logged.
pub struct TempFileGuard {
    path: PathBuf,
}

impl TempFileGuard {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TempFileGuard {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            if e.kind() != ErrorKind::NotFound {
                log::debug!("could not remove {}: {}", self.path.display(), e);
            }
        }
    }
}

/// Removes a directory tree when dropped. Removal failures are only logged.
pub struct TempDirGuard {
    path: PathBuf,
}

impl TempDirGuard {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TempDirGuard {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_dir_all(&self.path) {
            if e.kind() != ErrorKind::NotFound {
                log::debug!("could not remove {}: {}", self.path.display(), e);
            }
        }
    }
}

/// Everything a run needs to know.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub source: VideoSource,
    /// Map frames from the video; when false the frame cache is played.
    pub map_frames: bool,
    pub play_audio: bool,
    /// `None` probes the video.
    pub fps: Option<u32>,
    pub render: RenderSettings,
    pub workers: usize,
    pub cache_path: PathBuf,
    pub frames_dir: PathBuf,
    pub audio_path: PathBuf,
    pub download_path: PathBuf,
    pub scheduling: SchedulingMode,
    pub status_line: bool,
}

impl PipelineOptions {
    /// Options for `source` with paths and playback settings from `config`.
    pub fn from_config(config: &AppConfig, source: VideoSource, render: RenderSettings) -> Self {
        Self {
            source,
            map_frames: true,
            play_audio: true,
            fps: None,
            render,
            workers: config.workers,
            cache_path: config.cache_path.clone(),
            frames_dir: config.frames_dir(),
            audio_path: config.audio_path(),
            download_path: config.download_path(),
            scheduling: config.scheduling,
            status_line: config.status_line,
        }
    }
}

pub struct Pipeline {
    options: PipelineOptions,
}

impl Pipeline {
    pub fn new(options: PipelineOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    /// Run the whole pipeline, playing to stdout.
    pub fn run<P>(&self, cancel: &CancelToken, progress: Option<P>) -> Result<PlaybackReport>
    where
        P: Fn(usize, usize) + Send + Sync,
    {
        let stdout = io::stdout();
        let mut out = BufWriter::new(stdout.lock());
        self.run_to(&mut out, cancel, progress)
    }

    /// Run the whole pipeline, playing into `out`.
    pub fn run_to<W, P>(&self, out: &mut W, cancel: &CancelToken, progress: Option<P>) -> Result<PlaybackReport>
    where
        W: Write,
        P: Fn(usize, usize) + Send + Sync,
    {
        let opts = &self.options;
        if let VideoSource::Url(url) = &opts.source {
            parse_video_url(url)?;
        }

        let needs_ffmpeg = opts.map_frames || opts.play_audio;
        let needs_video = needs_ffmpeg || opts.fps.is_none();
        if needs_ffmpeg {
            ensure_tool(FFMPEG, "-version")?;
        }
        if opts.fps.is_none() {
            ensure_tool(FFPROBE, "-version")?;
        }

        let input = if needs_video { Some(self.acquire()?) } else { None };
        let fps = match (opts.fps, &input) {
            (Some(fps), _) => fps,
            (None, Some(input)) => probe_fps(input)?,
            (None, None) => return Err(anyhow!("no frame rate configured and no video to probe")),
        };
        log::info!("Frames per second: {}", fps);

        let cache = FrameCache::new(&opts.cache_path);
        let audio_guard = opts.play_audio.then(|| TempFileGuard::new(opts.audio_path.clone()));

        let (audio_done, mapped) = thread::scope(|s| {
            let audio = s.spawn(|| -> Result<()> {
                match (&audio_guard, &input) {
                    (Some(guard), Some(input)) => self.prepare_audio(input, guard.path()),
                    _ => Ok(()),
                }
            });
            let frames = s.spawn(|| -> Result<Option<Vec<String>>> {
                match &input {
                    Some(input) if opts.map_frames => self.prepare_frames(input, &cache, progress, cancel).map(Some),
                    _ => Ok(None),
                }
            });
            (audio.join(), frames.join())
        });
        // Tools and the pool fail once interrupted
        if cancel.is_cancelled() {
            log::info!("Cancelled before playback");
            return Ok(PlaybackReport {
                frames_shown: 0,
                frames_dropped: 0,
                stop: StopReason::Cancelled,
            });
        }
        audio_done.map_err(|_| anyhow!("audio preparation panicked"))??;
        let mapped = mapped.map_err(|_| anyhow!("frame preparation panicked"))??;

        let frames = match mapped {
            Some(frames) => frames,
            None => cache
                .load()
                .with_context(|| format!("loading frame cache {}", cache.path().display()))?,
        };
        if frames.is_empty() {
            return Err(anyhow!("no frames to play"));
        }

        let player = match &audio_guard {
            Some(guard) => Some(AudioPlayer::play_file(guard.path())?),
            None => None,
        };
        // The decoded track is in memory now
        drop(audio_guard);

        let playback = PlaybackOptions {
            fps,
            mode: opts.scheduling,
            status_line: opts.status_line,
        };
        let mut scheduler = Scheduler::new(&frames, &playback)?;
        log::info!(
            "Playing {} frames ({} @ {} fps)",
            frames.len(),
            crate::scheduler::format_clock(scheduler.total_duration()),
            fps
        );
        let report = scheduler.run_from(Instant::now(), out, cancel)?;

        if let Some(player) = player {
            log::debug!("audio stopped at {:.1?} (finished: {})", player.position(), player.is_finished());
        }
        Ok(report)
    }

    /// Local path of the video, downloading it first for URL sources.
    fn acquire(&self) -> Result<PathBuf> {
        let opts = &self.options;
        let path = match &opts.source {
            VideoSource::Path(path) => path.clone(),
            VideoSource::Url(url) => {
                download(url, &opts.download_path)?;
                opts.download_path.clone()
            }
        };
        if !path.is_file() {
            return Err(anyhow!("input video {} not found", path.display()));
        }
        Ok(path)
    }

    fn prepare_audio(&self, input: &Path, output: &Path) -> Result<()> {
        log::info!("Processing audio");
        let start = Instant::now();
        extract_audio(input, output)?;
        log::info!("Done processing audio in {:.2?}", start.elapsed());
        Ok(())
    }

    fn prepare_frames<P>(
        &self,
        input: &Path,
        cache: &FrameCache,
        progress: Option<P>,
        cancel: &CancelToken,
    ) -> Result<Vec<String>>
    where
        P: Fn(usize, usize) + Send + Sync,
    {
        let opts = &self.options;
        if let Err(e) = cache.remove() {
            log::warn!("could not remove old frame cache: {}", e);
        }

        log::info!("Processing frames");
        let start = Instant::now();
        let frames_dir = TempDirGuard::new(opts.frames_dir.clone());
        extract_frames(input, frames_dir.path(), opts.render.width, opts.render.height)?;
        let frames = map_and_cache(frames_dir, &opts.render.mapper(), opts.workers, cache, progress, cancel)?;
        log::info!("Done processing {} frames in {:.2?}", frames.len(), start.elapsed());
        Ok(frames)
    }
}

/// Map the images extracted into `frames_dir`, remove them, then save the
/// sequence to `cache`.
///
/// An empty directory is an error. A failed cache write is only logged.
pub fn map_and_cache<P>(
    frames_dir: TempDirGuard,
    mapper: &FrameMapper,
    workers: usize,
    cache: &FrameCache,
    progress: Option<P>,
    cancel: &CancelToken,
) -> Result<Vec<String>>
where
    P: Fn(usize, usize) + Send + Sync,
{
    let count = count_frames(frames_dir.path());
    if count == 0 {
        return Err(anyhow!("no frames were extracted into {}", frames_dir.path().display()));
    }
    let frames = map_frames(frames_dir.path(), count, mapper, workers, progress, cancel).context("mapping frames")?;
    drop(frames_dir);

    if let Err(e) = cache.save(&frames) {
        log::warn!("Could not write frame cache: {}", e);
    }
    Ok(frames)
}
