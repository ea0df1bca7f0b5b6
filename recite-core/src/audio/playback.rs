//! Speaker playback of WAV audio using CPAL

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, FromSample, SampleFormat, SizedSample, Stream, StreamConfig};
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use super::decode_wav;
use crate::error::{Error, Result};

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Samples queued for the output callback
struct PlaybackBuffer {
    samples: Vec<f32>,
    position: Mutex<usize>,
    finished: AtomicBool,
}

/// Play a WAV container on the default output device, blocking until it
/// ends or `cancel` fires
pub fn play_wav_blocking(wav: &[u8], cancel: &CancellationToken) -> Result<()> {
    let decoded = decode_wav(wav)?;
    if decoded.samples.is_empty() {
        debug!("Nothing to play");
        return Ok(());
    }

    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| Error::DeviceUnavailable("No output device available".to_string()))?;

    let supported = device
        .default_output_config()
        .map_err(|e| Error::DeviceUnavailable(format!("Failed to get output config: {e}")))?;
    let sample_format = supported.sample_format();
    let config: StreamConfig = supported.config();

    let buffer = Arc::new(PlaybackBuffer {
        samples: resample(&decoded.samples, decoded.sample_rate, config.sample_rate),
        position: Mutex::new(0),
        finished: AtomicBool::new(false),
    });

    let stream = match sample_format {
        SampleFormat::F32 => build_output::<f32>(&device, &config, Arc::clone(&buffer))?,
        SampleFormat::I16 => build_output::<i16>(&device, &config, Arc::clone(&buffer))?,
        SampleFormat::U16 => build_output::<u16>(&device, &config, Arc::clone(&buffer))?,
        SampleFormat::I32 => build_output::<i32>(&device, &config, Arc::clone(&buffer))?,
        other => {
            return Err(Error::Audio(format!(
                "Unsupported output sample format: {other:?}"
            )));
        }
    };

    stream
        .play()
        .map_err(|e| Error::Audio(format!("Failed to start output stream: {e}")))?;

    info!(
        "Playing {} samples at {} Hz",
        buffer.samples.len(),
        config.sample_rate
    );

    while !buffer.finished.load(Ordering::Acquire) {
        if cancel.is_cancelled() {
            info!("Playback stopped");
            return Ok(());
        }
        thread::sleep(POLL_INTERVAL);
    }

    // let the device drain its last period before the stream is dropped
    thread::sleep(POLL_INTERVAL);
    debug!("Playback finished");
    Ok(())
}

fn build_output<T>(
    device: &Device,
    config: &StreamConfig,
    buffer: Arc<PlaybackBuffer>,
) -> Result<Stream>
where
    T: SizedSample + FromSample<f32>,
{
    let channels = usize::from(config.channels.max(1));

    device
        .build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                let mut position = buffer.position.lock();
                for frame in data.chunks_mut(channels) {
                    let value = match buffer.samples.get(*position) {
                        Some(sample) => {
                            *position += 1;
                            *sample
                        }
                        None => {
                            buffer.finished.store(true, Ordering::Release);
                            0.0
                        }
                    };
                    for slot in frame.iter_mut() {
                        *slot = T::from_sample(value);
                    }
                }
            },
            |err| error!("Audio output stream error: {}", err),
            None,
        )
        .map_err(|e| Error::Audio(format!("Failed to build output stream: {e}")))
}

/// Linear-interpolation resampling of mono audio
fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if from_rate == to_rate || from_rate == 0 || to_rate == 0 || samples.is_empty() {
        return samples.to_vec();
    }

    let ratio = f64::from(from_rate) / f64::from(to_rate);
    let out_len = (samples.len() as f64 / ratio).round() as usize;
    let last = samples.len() - 1;

    (0..out_len)
        .map(|i| {
            let pos = i as f64 * ratio;
            let idx = (pos.floor() as usize).min(last);
            let frac = (pos - idx as f64) as f32;
            let a = samples[idx];
            let b = samples[(idx + 1).min(last)];
            a + (b - a) * frac
        })
        .collect()
}
