//! Audio track playback.
//!
//! The extracted track is decoded up front with symphonia and streamed to
//! the default output device through cpal at its native rate and channel
//! count. The output stream, and with it the device, is released when the
//! [`AudioPlayer`] is dropped.

use std::fs::File;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::error::AudioError;

/// Requested output buffer, as a fraction of a second.
const BUFFER_DIVISOR: u32 = 10;

/// Interleaved PCM samples of a whole track.
#[derive(Debug, Clone)]
pub struct DecodedAudio {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channels: u16,
}

impl DecodedAudio {
    pub fn duration(&self) -> Duration {
        frames_to_duration(self.samples.len(), self.sample_rate, self.channels)
    }
}

/// Decode the first playable track of `path` to interleaved f32 samples.
///
/// Any malformed packet fails the whole decode: there is nothing to put in
/// its place.
pub fn decode_file(path: &Path) -> Result<DecodedAudio> {
    let file = File::open(path).with_context(|| format!("Cannot open audio file: {}", path.display()))?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(AudioError::Decode)?;
    let mut format = probed.format;

    let track = format
        .default_track()
        .ok_or_else(|| AudioError::NoTrack(path.to_path_buf()))?;
    let track_id = track.id;
    let mut sample_rate = track.codec_params.sample_rate.unwrap_or(0);
    let mut channels = track.codec_params.channels.map_or(0, |c| c.count());
    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(AudioError::Decode)?;

    let mut samples: Vec<f32> = Vec::new();
    let mut sample_buf: Option<SampleBuffer<f32>> = None;

    loop {
        let packet = match format.next_packet() {
            Ok(p) => p,
            Err(SymphoniaError::IoError(ref e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(AudioError::Decode(e).into()),
        };
        if packet.track_id() != track_id {
            continue;
        }

        let decoded = decoder.decode(&packet).map_err(AudioError::Decode)?;
        let spec = *decoded.spec();
        sample_rate = spec.rate;
        channels = spec.channels.count();

        // Reuse the buffer unless this packet is larger than any before
        let needed = decoded.capacity() * spec.channels.count();
        if sample_buf.as_ref().map_or(true, |b| b.capacity() < needed) {
            sample_buf = Some(SampleBuffer::<f32>::new(decoded.capacity() as u64, spec));
        }
        let Some(buf) = sample_buf.as_mut() else {
            continue;
        };
        buf.copy_interleaved_ref(decoded);
        samples.extend_from_slice(buf.samples());
    }

    if samples.is_empty() || sample_rate == 0 || channels == 0 {
        return Err(AudioError::Empty(path.to_path_buf()).into());
    }

    let audio = DecodedAudio {
        samples,
        sample_rate,
        channels: channels as u16,
    };
    log::debug!(
        "decoded {} ({} Hz, {} ch, {:.1?})",
        path.display(),
        audio.sample_rate,
        audio.channels,
        audio.duration()
    );
    Ok(audio)
}

/// Plays a decoded track once on the default output device.
pub struct AudioPlayer {
    _stream: cpal::Stream,
    position: Arc<AtomicUsize>,
    total: usize,
    sample_rate: u32,
    channels: u16,
}

impl AudioPlayer {
    pub fn play_file(path: &Path) -> Result<Self> {
        let audio = decode_file(path)?;
        Self::play(audio)
    }

    pub fn play(audio: DecodedAudio) -> Result<Self> {
        let host = cpal::default_host();
        let device = host.default_output_device().ok_or(AudioError::NoOutputDevice)?;

        let total = audio.samples.len();
        let samples = Arc::new(audio.samples);
        let position = Arc::new(AtomicUsize::new(0));

        let mut config = cpal::StreamConfig {
            channels: audio.channels,
            sample_rate: cpal::SampleRate(audio.sample_rate),
            buffer_size: cpal::BufferSize::Fixed((audio.sample_rate / BUFFER_DIVISOR).max(1)),
        };
        let stream = match build_stream(&device, &config, &samples, &position) {
            Ok(stream) => stream,
            Err(e) => {
                log::warn!("fixed audio buffer refused ({}), using device default", e);
                config.buffer_size = cpal::BufferSize::Default;
                build_stream(&device, &config, &samples, &position).map_err(|e| AudioError::Stream(e.to_string()))?
            }
        };
        stream.play().map_err(|e| AudioError::Stream(e.to_string()))?;
        log::info!("Audio playback started @ {}Hz, {} channel(s)", audio.sample_rate, audio.channels);

        Ok(Self {
            _stream: stream,
            position,
            total,
            sample_rate: audio.sample_rate,
            channels: audio.channels,
        })
    }

    /// Playback position of the output stream.
    pub fn position(&self) -> Duration {
        frames_to_duration(self.position.load(Ordering::Relaxed), self.sample_rate, self.channels)
    }

    pub fn is_finished(&self) -> bool {
        self.position.load(Ordering::Relaxed) >= self.total
    }
}

fn build_stream(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    samples: &Arc<Vec<f32>>,
    position: &Arc<AtomicUsize>,
) -> Result<cpal::Stream, cpal::BuildStreamError> {
    let samples = Arc::clone(samples);
    let position = Arc::clone(position);
    device.build_output_stream(
        config,
        move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
            fill_buffer(data, &samples, &position);
        },
        |err| {
            log::error!("Audio output error: {}", err);
        },
        None,
    )
}

/// Copy the next samples into `out`, padding with silence past the end.
fn fill_buffer(out: &mut [f32], samples: &[f32], position: &AtomicUsize) {
    let start = position.load(Ordering::Relaxed).min(samples.len());
    let n = (samples.len() - start).min(out.len());
    out[..n].copy_from_slice(&samples[start..start + n]);
    out[n..].fill(0.0);
    position.store(start + n, Ordering::Relaxed);
}

fn frames_to_duration(samples: usize, sample_rate: u32, channels: u16) -> Duration {
    if sample_rate == 0 || channels == 0 {
        return Duration::ZERO;
    }
    let frames = samples / usize::from(channels);
    Duration::from_secs_f64(frames as f64 / f64::from(sample_rate))
}
