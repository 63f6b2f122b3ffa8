//! Frame sequence cache.
//!
//! The whole sequence lives in one file: frames joined by a single delimiter
//! character. Nothing is escaped, so a frame must never contain the delimiter;
//! `save` refuses such sequences instead of writing a file that would split
//! differently on the way back.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::CacheError;

/// Delimiter written between frames. Gradients can't produce it.
pub const FRAME_DELIMITER: char = '\r';

/// Default location of the cache file, relative to the working directory.
pub const DEFAULT_CACHE_PATH: &str = "frames.dat";

#[derive(Debug, Clone)]
pub struct FrameCache {
    path: PathBuf,
    delimiter: char,
}

impl FrameCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            delimiter: FRAME_DELIMITER,
        }
    }

    pub fn with_delimiter(mut self, delimiter: char) -> Self {
        self.delimiter = delimiter;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn save(&self, frames: &[String]) -> Result<(), CacheError> {
        let data = encode(frames, self.delimiter)?;
        fs::write(&self.path, data).map_err(|source| CacheError::Io {
            path: self.path.clone(),
            source,
        })
    }

    pub fn load(&self) -> Result<Vec<String>, CacheError> {
        let data = fs::read_to_string(&self.path).map_err(|source| CacheError::Io {
            path: self.path.clone(),
            source,
        })?;
        Ok(decode(&data, self.delimiter))
    }

    /// Delete the cache file. A file that is already gone is not an error.
    pub fn remove(&self) -> Result<(), CacheError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(CacheError::Io {
                path: self.path.clone(),
                source,
            }),
        }
    }
}

impl Default for FrameCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_PATH)
    }
}

/// Join `frames` with `delimiter`.
pub fn encode(frames: &[String], delimiter: char) -> Result<String, CacheError> {
    if let Some(index) = frames.iter().position(|f| f.contains(delimiter)) {
        return Err(CacheError::DelimiterInFrame { index, delimiter });
    }
    let size = frames.iter().map(String::len).sum::<usize>() + frames.len();
    let mut out = String::with_capacity(size);
    for (i, frame) in frames.iter().enumerate() {
        if i > 0 {
            out.push(delimiter);
        }
        out.push_str(frame);
    }
    Ok(out)
}

/// Split cached data back into frames. Empty data holds no frames.
pub fn decode(data: &str, delimiter: char) -> Vec<String> {
    if data.is_empty() {
        return Vec::new();
    }
    data.split(delimiter).map(str::to_string).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frames(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FrameCache::new(dir.path().join("frames.dat"));
        let seq = frames(&["A\n", "B\n", "C\n"]);

        cache.save(&seq).unwrap();
        assert_eq!(fs::read_to_string(cache.path()).unwrap(), "A\n\rB\n\rC\n");
        assert_eq!(cache.load().unwrap(), seq);
    }

    #[test]
    fn test_round_trip_keeps_empty_frames_and_order() {
        let seq = frames(&["", "@@..\n..@@\n", "", "  \n", "x"]);
        let data = encode(&seq, FRAME_DELIMITER).unwrap();
        assert_eq!(decode(&data, FRAME_DELIMITER), seq);
    }

    #[test]
    fn test_empty_sequence() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FrameCache::new(dir.path().join("empty.dat"));
        cache.save(&[]).unwrap();
        assert!(cache.load().unwrap().is_empty());
    }

    #[test]
    fn test_delimiter_inside_frame_is_rejected() {
        let seq = frames(&["ok\n", "bad\rframe\n"]);
        match encode(&seq, FRAME_DELIMITER) {
            Err(CacheError::DelimiterInFrame { index, delimiter }) => {
                assert_eq!(index, 1);
                assert_eq!(delimiter, '\r');
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_custom_delimiter() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FrameCache::new(dir.path().join("frames.dat")).with_delimiter('\u{1e}');
        let seq = frames(&["a\rb\n", "c\n"]);

        cache.save(&seq).unwrap();
        assert_eq!(cache.load().unwrap(), seq);
    }

    #[test]
    fn test_missing_file_and_remove() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FrameCache::new(dir.path().join("absent.dat"));
        assert!(matches!(cache.load(), Err(CacheError::Io { .. })));
        cache.remove().unwrap();
    }
}
