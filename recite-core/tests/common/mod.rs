//! In-memory stand-ins for the gateway, audio devices and system voice

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use recite::AudioData;
use recite::audio::{AudioBackend, CapturedAudio, FallbackVoice};
use recite::error::{Error, Result};
use recite::gateway::{AiGateway, CompletionRequest, SpeechRequest, TranscriptionRequest};

// ============ Gateway ============

/// Gateway answering from scripted queues; an empty queue behaves like
/// being offline
#[derive(Default)]
pub struct FakeGateway {
    completions: Mutex<VecDeque<Result<String>>>,
    transcripts: Mutex<VecDeque<(Duration, Result<String>)>>,
    speech: Mutex<VecDeque<Result<AudioData>>>,
    completion_calls: AtomicUsize,
    transcription_calls: AtomicUsize,
    synthesis_calls: AtomicUsize,
    last_transcription_language: Mutex<Option<String>>,
}

impl FakeGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_completion(&self, reply: impl Into<String>) {
        self.completions.lock().push_back(Ok(reply.into()));
    }

    pub fn push_transcript(&self, text: impl Into<String>) {
        self.push_transcript_after(Duration::ZERO, text);
    }

    pub fn push_transcript_after(&self, delay: Duration, text: impl Into<String>) {
        self.transcripts.lock().push_back((delay, Ok(text.into())));
    }

    pub fn push_transcription_error(&self, err: Error) {
        self.transcripts.lock().push_back((Duration::ZERO, Err(err)));
    }

    pub fn push_speech(&self, wav: AudioData) {
        self.speech.lock().push_back(Ok(wav));
    }

    pub fn completion_calls(&self) -> usize {
        self.completion_calls.load(Ordering::SeqCst)
    }

    pub fn transcription_calls(&self) -> usize {
        self.transcription_calls.load(Ordering::SeqCst)
    }

    pub fn synthesis_calls(&self) -> usize {
        self.synthesis_calls.load(Ordering::SeqCst)
    }

    pub fn last_transcription_language(&self) -> Option<String> {
        self.last_transcription_language.lock().clone()
    }
}

fn offline() -> Error {
    Error::TransportFailure("offline".to_string())
}

#[async_trait]
impl AiGateway for FakeGateway {
    fn name(&self) -> &'static str {
        "Fake"
    }

    async fn generate_text(&self, _request: CompletionRequest) -> Result<String> {
        self.completion_calls.fetch_add(1, Ordering::SeqCst);
        self.completions.lock().pop_front().unwrap_or_else(|| Err(offline()))
    }

    async fn transcribe_audio(&self, request: TranscriptionRequest) -> Result<String> {
        self.transcription_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_transcription_language.lock() = request.language;

        let next = self.transcripts.lock().pop_front();
        match next {
            Some((delay, result)) => {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                result
            }
            None => Err(offline()),
        }
    }

    async fn synthesize_speech(&self, _request: SpeechRequest) -> Result<AudioData> {
        self.synthesis_calls.fetch_add(1, Ordering::SeqCst);
        self.speech.lock().pop_front().unwrap_or_else(|| Err(offline()))
    }

    fn is_configured(&self) -> bool {
        true
    }
}

// ============ Audio ============

/// Half a second of a quiet square wave at 16kHz
pub fn test_pcm() -> AudioData {
    (0..8000)
        .flat_map(|i| {
            let sample: i16 = if (i / 20) % 2 == 0 { 3000 } else { -3000 };
            sample.to_le_bytes()
        })
        .collect()
}

pub fn test_wav() -> AudioData {
    CapturedAudio::new(test_pcm(), 16000).to_wav().unwrap()
}

/// Audio backend that records calls instead of touching hardware
pub struct FakeBackend {
    active: AtomicUsize,
    max_active: AtomicUsize,
    starts: AtomicUsize,
    plays: AtomicUsize,
    fail_start: AtomicBool,
    fail_play: AtomicBool,
    pcm: Mutex<AudioData>,
    play_duration: Mutex<Duration>,
}

impl Default for FakeBackend {
    fn default() -> Self {
        Self {
            active: AtomicUsize::new(0),
            max_active: AtomicUsize::new(0),
            starts: AtomicUsize::new(0),
            plays: AtomicUsize::new(0),
            fail_start: AtomicBool::new(false),
            fail_play: AtomicBool::new(false),
            pcm: Mutex::new(test_pcm()),
            play_duration: Mutex::new(Duration::from_millis(20)),
        }
    }
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_start(&self, fail: bool) {
        self.fail_start.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_play(&self, fail: bool) {
        self.fail_play.store(fail, Ordering::SeqCst);
    }

    pub fn set_pcm(&self, pcm: AudioData) {
        *self.pcm.lock() = pcm;
    }

    pub fn set_play_duration(&self, duration: Duration) {
        *self.play_duration.lock() = duration;
    }

    /// Captures currently open
    pub fn active_captures(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// Most captures ever open at once
    pub fn max_active_captures(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }

    pub fn starts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    pub fn plays(&self) -> usize {
        self.plays.load(Ordering::SeqCst)
    }
}

impl AudioBackend for FakeBackend {
    fn start_capture(&self) -> Result<()> {
        if self.fail_start.load(Ordering::SeqCst) {
            return Err(Error::DeviceUnavailable("no input device".to_string()));
        }
        self.starts.fetch_add(1, Ordering::SeqCst);
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now, Ordering::SeqCst);
        Ok(())
    }

    fn stop_capture(&self) -> Result<CapturedAudio> {
        if self.active.load(Ordering::SeqCst) == 0 {
            return Err(Error::Audio("not recording".to_string()));
        }
        self.active.fetch_sub(1, Ordering::SeqCst);
        Ok(CapturedAudio::new(self.pcm.lock().clone(), 16000))
    }

    fn play(&self, _wav: &[u8], cancel: &CancellationToken) -> Result<()> {
        self.plays.fetch_add(1, Ordering::SeqCst);
        if self.fail_play.load(Ordering::SeqCst) {
            return Err(Error::DeviceUnavailable("no output device".to_string()));
        }

        let duration = *self.play_duration.lock();
        let started = Instant::now();
        while started.elapsed() < duration && !cancel.is_cancelled() {
            thread::sleep(Duration::from_millis(2));
        }
        Ok(())
    }
}

// ============ Voice ============

#[derive(Default)]
pub struct FakeVoice {
    spoken: Mutex<Vec<String>>,
    fail: AtomicBool,
}

impl FakeVoice {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn spoken(&self) -> Vec<String> {
        self.spoken.lock().clone()
    }
}

impl FallbackVoice for FakeVoice {
    fn speak(
        &self,
        text: &str,
        _language: &str,
        _speed: f32,
        _cancel: &CancellationToken,
    ) -> Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(Error::DeviceUnavailable("no speech command".to_string()));
        }
        self.spoken.lock().push(text.to_string());
        Ok(())
    }
}

/// Poll `condition` until it holds or five seconds pass
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(Instant::now() < deadline, "condition not met in time");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
