//! Microphone capture using CPAL

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, Sample, SampleFormat, SizedSample, Stream, StreamConfig};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, error, info};

use super::CapturedAudio;
use crate::error::{Error, Result};

/// Audio capture configuration
#[derive(Debug, Clone)]
pub struct AudioCaptureConfig {
    /// Sample rate in Hz (default: 16000 for speech recognition)
    pub sample_rate: u32,
    /// Number of channels (default: 1 for mono)
    pub channels: u16,
}

impl Default for AudioCaptureConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16000,
            channels: 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CaptureState {
    Idle,
    Recording,
}

/// Records mono audio from the default input device.
///
/// The CPAL stream is not `Send`; an `AudioCapture` stays on the thread that
/// created it.
pub struct AudioCapture {
    device: Device,
    sample_rate: u32,
    stream_config: StreamConfig,
    input_channels: u16,
    sample_format: SampleFormat,
    state: Arc<Mutex<CaptureState>>,
    buffer: Arc<Mutex<Vec<f32>>>,
    stream: Option<Stream>,
}

impl AudioCapture {
    /// Open the default input device, picking the closest supported config
    pub fn with_config(config: AudioCaptureConfig) -> Result<Self> {
        let host = cpal::default_host();

        let device = host
            .default_input_device()
            .ok_or_else(|| Error::DeviceUnavailable("No input device available".to_string()))?;

        // device.name() is deprecated in cpal 0.17+ but still the simplest label
        #[allow(deprecated)]
        let device_name = device.name().unwrap_or_else(|_| "Unknown".to_string());
        info!("Using input device: {}", device_name);

        let supported_configs: Vec<_> = device
            .supported_input_configs()
            .map_err(|e| Error::DeviceUnavailable(format!("Failed to query input configs: {e}")))?
            .collect();

        let (supported_config, input_channels, sample_format, sample_rate) =
            select_supported_config(&supported_configs, config.sample_rate, config.channels)
                .ok_or_else(|| {
                    Error::DeviceUnavailable("No supported input config found".to_string())
                })?;

        let stream_config = supported_config.config();

        debug!(
            "Input stream config: {:?} (channels: {}, format: {:?})",
            stream_config, input_channels, sample_format
        );

        Ok(Self {
            device,
            sample_rate,
            stream_config,
            input_channels,
            sample_format,
            state: Arc::new(Mutex::new(CaptureState::Idle)),
            buffer: Arc::new(Mutex::new(Vec::new())),
            stream: None,
        })
    }

    /// Start recording, discarding anything buffered before
    pub fn start(&mut self) -> Result<()> {
        if *self.state.lock() == CaptureState::Recording {
            return Ok(());
        }

        self.buffer.lock().clear();

        let stream = match self.sample_format {
            SampleFormat::F32 => self.build_stream::<f32>()?,
            SampleFormat::I16 => self.build_stream::<i16>()?,
            SampleFormat::U16 => self.build_stream::<u16>()?,
            SampleFormat::I32 => self.build_stream::<i32>()?,
            SampleFormat::U32 => self.build_stream::<u32>()?,
            SampleFormat::I8 => self.build_stream::<i8>()?,
            SampleFormat::U8 => self.build_stream::<u8>()?,
            SampleFormat::F64 => self.build_stream::<f64>()?,
            other => {
                return Err(Error::DeviceUnavailable(format!(
                    "Unsupported sample format: {other:?}"
                )));
            }
        };

        stream
            .play()
            .map_err(|e| Error::DeviceUnavailable(format!("Failed to start stream: {e}")))?;

        self.stream = Some(stream);
        *self.state.lock() = CaptureState::Recording;

        info!("Audio capture started");
        Ok(())
    }

    /// Stop recording and return the captured audio
    pub fn stop(&mut self) -> CapturedAudio {
        *self.state.lock() = CaptureState::Idle;

        // dropping the stream releases the device
        self.stream = None;

        let samples = std::mem::take(&mut *self.buffer.lock());
        let audio = CapturedAudio::new(samples_to_pcm(&samples), self.sample_rate);

        info!(
            "Audio capture stopped, {} ms captured",
            audio.duration_ms()
        );
        audio
    }

    fn build_stream<T>(&self) -> Result<Stream>
    where
        T: Sample + SizedSample,
        f32: cpal::FromSample<T>,
    {
        let channels = self.input_channels as usize;
        let buffer = Arc::clone(&self.buffer);
        let state = Arc::clone(&self.state);

        self.device
            .build_input_stream(
                &self.stream_config,
                move |data: &[T], _: &cpal::InputCallbackInfo| {
                    if *state.lock() != CaptureState::Recording {
                        return;
                    }

                    let mut buf = buffer.lock();
                    if channels == 1 {
                        buf.extend(data.iter().map(|sample| sample.to_sample::<f32>()));
                    } else {
                        // downmix to mono
                        for frame in data.chunks_exact(channels) {
                            let sum: f32 = frame.iter().map(|s| s.to_sample::<f32>()).sum();
                            buf.push(sum / channels as f32);
                        }
                    }
                },
                |err| error!("Audio input stream error: {}", err),
                None,
            )
            .map_err(|e| Error::DeviceUnavailable(format!("Failed to build input stream: {e}")))
    }
}

impl Drop for AudioCapture {
    fn drop(&mut self) {
        *self.state.lock() = CaptureState::Idle;
        self.stream = None;
    }
}

/// Convert f32 samples to 16-bit little-endian PCM
fn samples_to_pcm(samples: &[f32]) -> Vec<u8> {
    samples
        .iter()
        .flat_map(|&sample| {
            let clamped = sample.clamp(-1.0, 1.0);
            ((clamped * 32767.0) as i16).to_le_bytes()
        })
        .collect()
}

fn select_supported_config(
    ranges: &[cpal::SupportedStreamConfigRange],
    preferred_rate: u32,
    preferred_channels: u16,
) -> Option<(cpal::SupportedStreamConfig, u16, SampleFormat, u32)> {
    let preferred_formats = [
        SampleFormat::F32,
        SampleFormat::I16,
        SampleFormat::U16,
        SampleFormat::I32,
        SampleFormat::U32,
        SampleFormat::F64,
        SampleFormat::I8,
        SampleFormat::U8,
    ];

    for format in preferred_formats {
        let mut candidates: Vec<_> = ranges
            .iter()
            .copied()
            .filter(|r| r.sample_format() == format && r.channels() == preferred_channels)
            .collect();

        if candidates.is_empty() {
            candidates = ranges
                .iter()
                .copied()
                .filter(|r| r.sample_format() == format)
                .collect();
        }

        let Some(best) = candidates
            .into_iter()
            .min_by_key(|range| sample_rate_distance(*range, preferred_rate))
        else {
            continue;
        };

        let sample_rate = preferred_rate.clamp(best.min_sample_rate(), best.max_sample_rate());
        let supported = best.with_sample_rate(sample_rate);

        return Some((supported, best.channels(), format, sample_rate));
    }

    None
}

fn sample_rate_distance(range: cpal::SupportedStreamConfigRange, preferred_rate: u32) -> u32 {
    let min_rate = range.min_sample_rate();
    let max_rate = range.max_sample_rate();
    if preferred_rate < min_rate {
        min_rate - preferred_rate
    } else {
        preferred_rate.saturating_sub(max_rate)
    }
}
