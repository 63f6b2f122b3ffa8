//! Parallel frame mapping.
//!
//! Frames are mapped on a dedicated rayon pool. The output buffer is sized up
//! front and handed out slot by slot through `par_iter_mut`, so every worker
//! owns the one `String` it fills and no lock guards the frame data. The only
//! shared state is the completion counter that drives progress reporting.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use rayon::prelude::*;
use walkdir::WalkDir;

use crate::error::FrameError;
use crate::mapper::FrameMapper;
use crate::scheduler::CancelToken;

/// Worker count used when none is configured.
pub const DEFAULT_WORKERS: usize = 16;

/// Extension of the images written by the transcoder.
pub const FRAME_EXTENSION: &str = "png";

/// Path of the extracted image for the 0-based frame `index`.
///
/// Extracted files are numbered from 1, as the transcoder writes them.
pub fn frame_path(dir: &Path, index: usize) -> PathBuf {
    dir.join(format!("frame-{}.{}", index + 1, FRAME_EXTENSION))
}

/// Number of extracted frame images in `dir`.
pub fn count_frames(dir: &Path) -> usize {
    WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| {
            e.file_name()
                .to_str()
                .is_some_and(|name| name.starts_with("frame-") && name.ends_with(FRAME_EXTENSION))
        })
        .count()
}

/// Fill `count` slots in parallel, slot `i` receiving `map(i)`.
///
/// Blocks until every slot is filled. The first error stops the remaining
/// work and is returned; which failing index wins is unspecified when
/// several fail. Setting `cancel` stops the run with
/// [`FrameError::Cancelled`] before the next slot is started.
pub fn map_indexed<F, P>(
    count: usize,
    workers: usize,
    map: F,
    progress: Option<P>,
    cancel: &CancelToken,
) -> Result<Vec<String>, FrameError>
where
    F: Fn(usize) -> Result<String, FrameError> + Send + Sync,
    P: Fn(usize, usize) + Send + Sync,
{
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers.max(1))
        .thread_name(|i| format!("frame-worker-{}", i))
        .build()?;

    let mut frames = vec![String::new(); count];
    let completed = AtomicUsize::new(0);

    pool.install(|| {
        frames
            .par_iter_mut()
            .enumerate()
            .try_for_each(|(index, slot)| -> Result<(), FrameError> {
                if cancel.is_cancelled() {
                    return Err(FrameError::Cancelled);
                }
                *slot = map(index)?;

                let current = completed.fetch_add(1, Ordering::SeqCst) + 1;
                if let Some(ref callback) = progress {
                    callback(current, count);
                }
                Ok(())
            })
    })?;

    Ok(frames)
}

/// Map the `count` extracted images in `dir` into a frame sequence.
pub fn map_frames<P>(
    dir: &Path,
    count: usize,
    mapper: &FrameMapper,
    workers: usize,
    progress: Option<P>,
    cancel: &CancelToken,
) -> Result<Vec<String>, FrameError>
where
    P: Fn(usize, usize) + Send + Sync,
{
    log::debug!("mapping {} frames from {} on {} workers", count, dir.display(), workers);
    map_indexed(
        count,
        workers,
        |index| {
            let path = frame_path(dir, index);
            mapper
                .map_file(&path)
                .map_err(|source| FrameError::Decode { index, path, source })
        },
        progress,
        cancel,
    )
}
