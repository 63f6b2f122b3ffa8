//! ffmpeg / ffprobe invocations.
//!
//! Every call goes through [`run_tool`], which turns spawn failures and
//! unsuccessful exits into a [`ToolError`]. Callers decide whether that error
//! aborts the pipeline or is only logged.

use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use std::process::{Command as ProcCommand, Output, Stdio};

use anyhow::{Context, Result};

use crate::error::ToolError;
use crate::pool::FRAME_EXTENSION;

pub const FFMPEG: &str = "ffmpeg";
pub const FFPROBE: &str = "ffprobe";

/// Run a tool to completion, capturing its output.
pub fn run_tool(tool: &'static str, what: &'static str, cmd: &mut ProcCommand) -> Result<Output, ToolError> {
    log::debug!("running {:?}", cmd);
    let output = cmd.stdin(Stdio::null()).output().map_err(|source| {
        if source.kind() == ErrorKind::NotFound {
            ToolError::Missing { tool }
        } else {
            ToolError::Spawn { tool, source }
        }
    })?;

    if !output.status.success() {
        return Err(ToolError::Failed {
            tool,
            what,
            status: output.status,
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(output)
}

/// Check that `tool` can be started at all.
pub fn ensure_tool(tool: &'static str, version_flag: &str) -> Result<(), ToolError> {
    run_tool(tool, "version check", ProcCommand::new(tool).arg(version_flag)).map(|_| ())
}

/// Extract every frame of `input` as `dir/frame-<n>.png`, scaled to
/// `width` x `height`.
///
/// `dir` is emptied of earlier extractions first.
pub fn extract_frames(input: &Path, dir: &Path, width: u32, height: u32) -> Result<()> {
    if dir.exists() {
        fs::remove_dir_all(dir).with_context(|| format!("clearing {}", dir.display()))?;
    }
    fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;

    let out_pattern = dir.join(format!("frame-%d.{}", FRAME_EXTENSION));
    let vf_option = format!("scale={}:{}", width, height);
    run_tool(
        FFMPEG,
        "frame extraction",
        ProcCommand::new(FFMPEG)
            .args(["-loglevel", "error", "-y", "-i"])
            .arg(input)
            .args(["-vf", vf_option.as_str()])
            .arg(&out_pattern),
    )?;
    Ok(())
}

/// Extract the audio track of `input` into `output` (MP3, best VBR quality).
pub fn extract_audio(input: &Path, output: &Path) -> Result<()> {
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).with_context(|| format!("creating {}", parent.display()))?;
    }

    run_tool(
        FFMPEG,
        "audio extraction",
        ProcCommand::new(FFMPEG)
            .args(["-loglevel", "error", "-y", "-i"])
            .arg(input)
            .args(["-vn", "-q:a", "0", "-map", "a"])
            .arg(output),
    )?;
    Ok(())
}

/// Frame rate of the first video stream of `input`, rounded to whole fps.
pub fn probe_fps(input: &Path) -> Result<u32> {
    let output = run_tool(
        FFPROBE,
        "frame rate probe",
        ProcCommand::new(FFPROBE)
            .args([
                "-v",
                "error",
                "-select_streams",
                "v:0",
                "-of",
                "default=noprint_wrappers=1:nokey=1",
                "-show_entries",
                "stream=r_frame_rate",
            ])
            .arg(input),
    )?;

    let text = String::from_utf8_lossy(&output.stdout);
    let rate = text.lines().next().unwrap_or_default();
    let fps = parse_frame_rate(rate)?;
    log::info!("probed {} fps ({}) from {}", fps, rate.trim(), input.display());
    Ok(fps)
}

/// Parse a rational (`30000/1001`) or plain (`25`) frame rate, rounding to
/// the nearest whole fps.
pub fn parse_frame_rate(rate: &str) -> Result<u32, ToolError> {
    let bad = || ToolError::BadOutput {
        tool: FFPROBE,
        output: rate.to_string(),
    };

    let rate = rate.trim();
    let (num, den) = match rate.split_once('/') {
        Some((n, d)) => (n.trim(), d.trim()),
        None => (rate, "1"),
    };
    let num: f64 = num.parse().map_err(|_| bad())?;
    let den: f64 = den.parse().map_err(|_| bad())?;
    if den <= 0.0 || num <= 0.0 {
        return Err(bad());
    }

    let fps = (num / den).round();
    if !(1.0..=f64::from(u32::MAX)).contains(&fps) {
        return Err(bad());
    }
    Ok(fps as u32)
}
