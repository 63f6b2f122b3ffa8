//! Fixed-rate playback of a frame sequence.
//!
//! The scheduler wakes on absolute deadlines (`start + k * interval`), so a
//! late wake-up never pushes later ticks back. In drift-corrected mode the
//! frame shown at each tick is derived from wall-clock time, which keeps
//! video aligned with audio that started at the same instant; frames that
//! fall behind are dropped rather than shown late.

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};

/// Number of cells in the progress bar.
pub const PROGRESS_CELLS: usize = 100;

const FILLED_CELL: char = '\u{2593}';
const EMPTY_CELL: char = '\u{2591}';

/// How the frame for a tick is chosen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum SchedulingMode {
    /// `floor(elapsed / interval)`: follows real time, may drop frames.
    #[default]
    DriftCorrected,
    /// One frame per tick regardless of how late the tick fired.
    PerTick,
}

/// Why playback ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The next frame index is past the end of the sequence.
    Exhausted,
    /// Wall-clock time reached the total duration.
    DurationElapsed,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Idle,
    Running,
    Done(StopReason),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaybackReport {
    pub frames_shown: usize,
    pub frames_dropped: usize,
    pub stop: StopReason,
}

/// Shared stop flag, set from a signal handler or another thread.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Playback settings.
#[derive(Debug, Clone)]
pub struct PlaybackOptions {
    pub fps: u32,
    pub mode: SchedulingMode,
    /// Append the elapsed/total timestamp and progress bar after each frame.
    pub status_line: bool,
}

impl Default for PlaybackOptions {
    fn default() -> Self {
        Self {
            fps: 30,
            mode: SchedulingMode::default(),
            status_line: true,
        }
    }
}

/// Periodic timer on absolute deadlines.
struct Ticker {
    start: Instant,
    interval: Duration,
    ticks: u32,
}

impl Ticker {
    fn new(start: Instant, interval: Duration) -> Self {
        Self { start, interval, ticks: 0 }
    }

    /// Sleep until the next deadline. Returns false if cancelled meanwhile.
    fn wait(&mut self, cancel: &CancelToken) -> bool {
        self.ticks += 1;
        let deadline = self.start + self.interval * self.ticks;
        loop {
            if cancel.is_cancelled() {
                return false;
            }
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            // Short slices keep cancellation responsive at low frame rates
            thread::sleep((deadline - now).min(Duration::from_millis(50)));
        }
    }

    fn ticks(&self) -> usize {
        self.ticks as usize
    }
}

pub struct Scheduler<'a> {
    frames: &'a [String],
    interval: Duration,
    mode: SchedulingMode,
    status_line: bool,
    state: PlaybackState,
}

impl<'a> Scheduler<'a> {
    pub fn new(frames: &'a [String], options: &PlaybackOptions) -> Result<Self> {
        if options.fps == 0 {
            return Err(anyhow!("frame rate must be at least 1 fps"));
        }
        Ok(Self {
            frames,
            interval: frame_interval(options.fps),
            mode: options.mode,
            status_line: options.status_line,
            state: PlaybackState::Idle,
        })
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn total_duration(&self) -> Duration {
        total_duration(self.frames.len(), self.interval)
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    /// Play the sequence into `out`, starting the clock now.
    pub fn run<W: Write>(&mut self, out: &mut W, cancel: &CancelToken) -> Result<PlaybackReport> {
        self.run_from(Instant::now(), out, cancel)
    }

    /// Play with `start` as time zero, e.g. the instant audio began.
    pub fn run_from<W: Write>(&mut self, start: Instant, out: &mut W, cancel: &CancelToken) -> Result<PlaybackReport> {
        self.state = PlaybackState::Running;
        let total = self.total_duration();
        let total_text = format_clock(total);
        let mut ticker = Ticker::new(start, self.interval);
        let mut last_shown: Option<usize> = None;
        let mut shown = 0;

        let stop = loop {
            if cancel.is_cancelled() {
                break StopReason::Cancelled;
            }

            let index = match self.mode {
                SchedulingMode::DriftCorrected => {
                    let elapsed = start.elapsed();
                    if elapsed >= total {
                        break StopReason::DurationElapsed;
                    }
                    (elapsed.as_nanos() / self.interval.as_nanos()) as usize
                }
                SchedulingMode::PerTick => ticker.ticks(),
            };
            if index >= self.frames.len() {
                break StopReason::Exhausted;
            }

            if last_shown.map_or(true, |last| index > last) {
                out.write_all(self.frames[index].as_bytes()).context("writing frame")?;
                if self.status_line {
                    let position = round_to_second(self.interval * index as u32);
                    writeln!(out, "{}", status_line(position, total, &total_text)).context("writing status line")?;
                }
                out.flush().context("flushing terminal")?;
                last_shown = Some(index);
                shown += 1;
            }

            if !ticker.wait(cancel) {
                break StopReason::Cancelled;
            }
        };

        self.state = PlaybackState::Done(stop);
        // A finished run skipped whatever it didn't show, the tail included
        let passed = match stop {
            StopReason::Cancelled => last_shown.map_or(0, |i| i + 1),
            StopReason::Exhausted | StopReason::DurationElapsed => self.frames.len(),
        };
        let report = PlaybackReport {
            frames_shown: shown,
            frames_dropped: passed - shown,
            stop,
        };
        log::debug!("playback finished: {:?}", report);
        Ok(report)
    }
}

pub fn frame_interval(fps: u32) -> Duration {
    Duration::from_secs(1) / fps.max(1)
}

pub fn total_duration(frame_count: usize, interval: Duration) -> Duration {
    interval * frame_count as u32
}

/// Filled cells of a [`PROGRESS_CELLS`]-wide bar, rounded up.
pub fn progress_cells(elapsed: Duration, total: Duration) -> usize {
    if total.is_zero() {
        return 0;
    }
    let ratio = elapsed.as_secs_f64() / total.as_secs_f64();
    let cells = (ratio * PROGRESS_CELLS as f64).ceil();
    cells.clamp(0.0, PROGRESS_CELLS as f64) as usize
}

pub fn progress_bar(elapsed: Duration, total: Duration) -> String {
    let filled = progress_cells(elapsed, total);
    let mut bar = String::with_capacity(PROGRESS_CELLS * FILLED_CELL.len_utf8());
    bar.extend(std::iter::repeat(FILLED_CELL).take(filled));
    bar.extend(std::iter::repeat(EMPTY_CELL).take(PROGRESS_CELLS - filled));
    bar
}

/// `HH:MM:SS`; hours are not wrapped.
pub fn format_clock(d: Duration) -> String {
    let secs = d.as_secs();
    format!("{:02}:{:02}:{:02}", secs / 3600, (secs / 60) % 60, secs % 60)
}

fn status_line(position: Duration, total: Duration, total_text: &str) -> String {
    format!("{} / {} [{}]", format_clock(position), total_text, progress_bar(position, total))
}

fn round_to_second(d: Duration) -> Duration {
    Duration::from_secs((d.as_secs_f64()).round() as u64)
}
