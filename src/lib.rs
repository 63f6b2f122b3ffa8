//! # vidscii - terminal video player
//!
//! `vidscii` turns a video into a sequence of ASCII frames and plays them in
//! the terminal at the video's frame rate, with the audio track alongside.
//!
//! ## Features
//!
//! - Luminance to glyph mapping with configurable gradients and presets
//! - Parallel frame mapping that keeps frames in playback order
//! - A single-file frame cache to replay without re-mapping
//! - Drift-corrected playback with an elapsed/total status line
//! - Download of remote videos through yt-dlp
//!
//! ## Example
//!
//! ```no_run
//! use vidscii::{AppConfig, CancelToken, Pipeline, PipelineOptions, VideoSource};
//! use std::path::PathBuf;
//!
//! # fn main() -> anyhow::Result<()> {
//! let config = AppConfig::default();
//! let render = config.render_settings(Some("small"))?;
//! let options = PipelineOptions::from_config(&config, VideoSource::Path(PathBuf::from("input.mp4")), render);
//!
//! let report = Pipeline::new(options).run(&CancelToken::new(), None::<fn(usize, usize)>)?;
//! println!("{} frames shown", report.frames_shown);
//! # Ok(())
//! # }
//! ```
//!
//! ## Mapping only
//!
//! The mapper and the frame cache can be used on their own:
//!
//! ```no_run
//! use vidscii::{FrameCache, FrameMapper, Gradient};
//! use std::path::Path;
//!
//! # fn main() -> anyhow::Result<()> {
//! let mapper = FrameMapper::new(Gradient::default()).with_size(80, 60);
//! let frame = mapper.map_file(Path::new("frame-1.png"))?;
//! FrameCache::new("frames.dat").save(&[frame])?;
//! # Ok(())
//! # }
//! ```

pub mod audio;
pub mod cache;
pub mod config;
pub mod download;
pub mod error;
pub mod mapper;
pub mod pipeline;
pub mod pool;
pub mod scheduler;
pub mod transcoder;

pub use audio::{AudioPlayer, DecodedAudio};
pub use cache::{FrameCache, DEFAULT_CACHE_PATH, FRAME_DELIMITER};
pub use config::{AppConfig, Preset, RenderSettings};
pub use error::{AudioError, CacheError, FrameError, GradientError, ToolError, UrlError};
pub use mapper::{FrameMapper, Gradient, DEFAULT_GRADIENT};
pub use pipeline::{Pipeline, PipelineOptions, VideoSource};
pub use pool::{map_frames, DEFAULT_WORKERS};
pub use scheduler::{
    CancelToken, PlaybackOptions, PlaybackReport, PlaybackState, Scheduler, SchedulingMode, StopReason,
};
