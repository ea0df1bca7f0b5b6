//! Audio: microphone capture, speaker playback, and the pipeline that owns both
//!
//! Device work is blocking and lives behind [`AudioBackend`]; the
//! [`AudioPipeline`] drives it from async code and enforces that only one
//! capture or playback is active at a time.
mod capture;
mod device;
mod pipeline;
mod playback;
mod voice;

use std::io::Cursor;

use tokio_util::sync::CancellationToken;

use crate::AudioData;
use crate::error::{Error, Result};

pub use capture::AudioCaptureConfig;
pub use device::DeviceAudio;
pub use pipeline::{AudioPipeline, PipelineState, PlaybackOutcome, PlaybackSource, Recording};
pub use voice::{FallbackVoice, SystemVoice};

/// Exclusive access to the microphone and speaker.
///
/// All methods block; callers run them on a blocking thread.
pub trait AudioBackend: Send + Sync {
    /// Open the input device and begin buffering samples
    fn start_capture(&self) -> Result<()>;

    /// Stop the active capture and return what was recorded
    fn stop_capture(&self) -> Result<CapturedAudio>;

    /// Play a WAV container to completion, returning early once `cancel` fires
    fn play(&self, wav: &[u8], cancel: &CancellationToken) -> Result<()>;
}

/// Mono 16-bit PCM captured from the microphone
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedAudio {
    /// Little-endian i16 samples
    pub pcm: AudioData,
    pub sample_rate: u32,
}

impl CapturedAudio {
    pub fn new(pcm: AudioData, sample_rate: u32) -> Self {
        Self { pcm, sample_rate }
    }

    pub fn is_empty(&self) -> bool {
        self.pcm.is_empty()
    }

    pub fn duration_ms(&self) -> u64 {
        if self.sample_rate == 0 {
            return 0;
        }
        let samples = self.pcm.len() as u64 / 2;
        samples * 1000 / u64::from(self.sample_rate)
    }

    /// Encode as a WAV container
    pub fn to_wav(&self) -> Result<AudioData> {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: self.sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };

        let mut cursor = Cursor::new(Vec::with_capacity(44 + self.pcm.len()));
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec).map_err(wav_error)?;
            for frame in self.pcm.chunks_exact(2) {
                writer
                    .write_sample(i16::from_le_bytes([frame[0], frame[1]]))
                    .map_err(wav_error)?;
            }
            writer.finalize().map_err(wav_error)?;
        }
        Ok(cursor.into_inner())
    }
}

/// Mono f32 samples decoded from a WAV container
#[derive(Debug, Clone)]
pub struct DecodedAudio {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

/// Decode a WAV container to mono f32.
///
/// Streaming providers sometimes leave placeholder chunk sizes in the header,
/// so decoding stops quietly at the first unreadable sample.
pub fn decode_wav(wav: &[u8]) -> Result<DecodedAudio> {
    let mut reader = hound::WavReader::new(Cursor::new(wav)).map_err(wav_error)?;
    let spec = reader.spec();
    let channels = usize::from(spec.channels.max(1));

    let interleaved: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader.samples::<f32>().map_while(|s| s.ok()).collect(),
        hound::SampleFormat::Int => {
            let scale = (1i64 << (spec.bits_per_sample.clamp(1, 32) - 1)) as f32;
            reader
                .samples::<i32>()
                .map_while(|s| s.ok())
                .map(|s| s as f32 / scale)
                .collect()
        }
    };

    let samples = if channels == 1 {
        interleaved
    } else {
        interleaved
            .chunks_exact(channels)
            .map(|frame| frame.iter().sum::<f32>() / channels as f32)
            .collect()
    };

    Ok(DecodedAudio {
        samples,
        sample_rate: spec.sample_rate,
    })
}

fn wav_error(err: hound::Error) -> Error {
    Error::Audio(format!("WAV error: {err}"))
}
