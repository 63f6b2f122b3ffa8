use std::path::PathBuf;
use std::process::ExitStatus;

use thiserror::Error;

/// Reasons a gradient string is rejected.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GradientError {
    #[error("gradient must contain at least one character")]
    Empty,

    /// Multi-byte characters would break the two-glyphs-per-pixel layout.
    #[error("gradient contains non-ASCII character {0:?}")]
    NonAscii(char),

    /// Control characters could collide with row or cache delimiters.
    #[error("gradient contains control character {0:?}")]
    Control(char),
}

/// Failure while mapping the frame at `index` (0-based).
#[derive(Error, Debug)]
pub enum FrameError {
    #[error("frame {index}: cannot decode {}: {source}", path.display())]
    Decode {
        index: usize,
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("frame {index}: {message}")]
    Map { index: usize, message: String },

    #[error("cannot build worker pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),

    #[error("frame mapping cancelled")]
    Cancelled,
}

impl FrameError {
    /// Index of the failing frame, if the error belongs to one.
    pub fn index(&self) -> Option<usize> {
        match self {
            FrameError::Decode { index, .. } | FrameError::Map { index, .. } => Some(*index),
            FrameError::Pool(_) | FrameError::Cancelled => None,
        }
    }
}

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("frame {index} contains the cache delimiter {delimiter:?}")]
    DelimiterInFrame { index: usize, delimiter: char },

    #[error("cache file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Outcome of an external tool invocation that did not succeed.
#[derive(Error, Debug)]
pub enum ToolError {
    #[error("{tool} is not installed or not on PATH")]
    Missing { tool: &'static str },

    #[error("failed to run {tool}: {source}")]
    Spawn {
        tool: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("{tool} {what} failed ({status}): {stderr}")]
    Failed {
        tool: &'static str,
        what: &'static str,
        status: ExitStatus,
        stderr: String,
    },

    #[error("{tool} returned unexpected output: {output:?}")]
    BadOutput { tool: &'static str, output: String },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UrlError {
    #[error("unsupported video URL: {0}")]
    Unsupported(String),

    #[error("no video id found in URL: {0}")]
    MissingId(String),
}

#[derive(Error, Debug)]
pub enum AudioError {
    #[error("no audio output device found")]
    NoOutputDevice,

    #[error("audio file {} has no playable track", .0.display())]
    NoTrack(PathBuf),

    #[error("audio decode failed: {0}")]
    Decode(#[from] symphonia::core::errors::Error),

    #[error("audio file {} decoded to zero samples", .0.display())]
    Empty(PathBuf),

    #[error("audio output stream: {0}")]
    Stream(String),
}
