//! The audio state machine: one capture or one playback at a time

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{AudioBackend, CapturedAudio, FallbackVoice};
use crate::AudioData;
use crate::error::{Error, Result};
use crate::gateway::{AiGateway, SpeechRequest};

/// What the pipeline is doing right now
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PipelineState {
    #[default]
    Idle,
    Recording,
    Playing,
}

/// Where the audio that was played came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackSource {
    /// Audio synthesized by the gateway
    Synthesized,
    /// The on-device system voice
    Fallback,
    /// The learner's last recording
    Capture,
}

/// How a playback ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackOutcome {
    Completed(PlaybackSource),
    Stopped,
    Failed(String),
}

/// A finished capture, already written to the capture file
#[derive(Debug, Clone)]
pub struct Recording {
    pub audio: CapturedAudio,
    /// WAV container of `audio`
    pub wav: AudioData,
    pub path: PathBuf,
    /// Id returned by the [`AudioPipeline::start_capture`] call that began it
    pub capture_id: u64,
}

struct ActivePlayback {
    cancel: CancellationToken,
    task: JoinHandle<PlaybackOutcome>,
}

/// Owns the microphone and speaker for a session.
///
/// Starting any operation first stops whatever is active, so recording and
/// playing never overlap.
pub struct AudioPipeline {
    backend: Arc<dyn AudioBackend>,
    gateway: Arc<dyn AiGateway>,
    voice: Arc<dyn FallbackVoice>,
    capture_path: PathBuf,
    recording: Option<u64>,
    next_capture_id: u64,
    playback: Option<ActivePlayback>,
}

impl AudioPipeline {
    pub fn new(
        backend: Arc<dyn AudioBackend>,
        gateway: Arc<dyn AiGateway>,
        voice: Arc<dyn FallbackVoice>,
        capture_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            backend,
            gateway,
            voice,
            capture_path: capture_path.into(),
            recording: None,
            next_capture_id: 0,
            playback: None,
        }
    }

    pub fn state(&self) -> PipelineState {
        if self.recording.is_some() {
            PipelineState::Recording
        } else if self
            .playback
            .as_ref()
            .is_some_and(|active| !active.task.is_finished())
        {
            PipelineState::Playing
        } else {
            PipelineState::Idle
        }
    }

    /// Id of the capture in progress, if any
    pub fn active_capture(&self) -> Option<u64> {
        self.recording
    }

    pub fn capture_path(&self) -> &Path {
        &self.capture_path
    }

    /// Begin recording, stopping any playback or earlier capture first.
    ///
    /// Returns an id identifying this capture. On failure the pipeline is
    /// left idle.
    pub async fn start_capture(&mut self) -> Result<u64> {
        self.stop_playback().await;
        self.cancel_capture().await;

        let backend = Arc::clone(&self.backend);
        blocking(move || backend.start_capture()).await?;

        self.next_capture_id += 1;
        self.recording = Some(self.next_capture_id);
        info!("Recording started (capture {})", self.next_capture_id);
        Ok(self.next_capture_id)
    }

    /// Stop recording and write the capture to the capture file, replacing
    /// the previous one
    pub async fn stop_capture(&mut self) -> Result<Recording> {
        let capture_id = self
            .recording
            .take()
            .ok_or_else(|| Error::Audio("Not recording".to_string()))?;

        let backend = Arc::clone(&self.backend);
        let audio = blocking(move || backend.stop_capture()).await?;
        let wav = audio.to_wav()?;

        if let Some(parent) = self.capture_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&self.capture_path, &wav).await?;

        info!(
            "Recording stopped (capture {}, {} ms)",
            capture_id,
            audio.duration_ms()
        );

        Ok(Recording {
            audio,
            wav,
            path: self.capture_path.clone(),
            capture_id,
        })
    }

    /// Stop recording and throw the audio away
    pub async fn cancel_capture(&mut self) {
        let Some(capture_id) = self.recording.take() else {
            return;
        };

        let backend = Arc::clone(&self.backend);
        match blocking(move || backend.stop_capture()).await {
            Ok(_) => debug!("Discarded capture {}", capture_id),
            Err(e) => warn!("Failed to stop capture {}: {}", capture_id, e),
        }
    }

    /// Speak `text`: synthesized through the gateway, or with the system
    /// voice when synthesis or playback fails
    pub async fn play_text(&mut self, text: &str, voice: &str, speed: f32, language: &str) {
        self.stop_playback().await;
        self.cancel_capture().await;

        let request = SpeechRequest::new(text, voice, speed);
        let cancel = CancellationToken::new();
        let task = tokio::spawn(speak(
            Arc::clone(&self.gateway),
            Arc::clone(&self.backend),
            Arc::clone(&self.voice),
            request,
            language.to_string(),
            cancel.clone(),
        ));

        self.playback = Some(ActivePlayback { cancel, task });
    }

    /// Play back the last recording from the capture file
    pub async fn play_capture(&mut self) -> Result<()> {
        self.stop_playback().await;
        self.cancel_capture().await;

        let wav = match tokio::fs::read(&self.capture_path).await {
            Ok(wav) => wav,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::Audio("No recording to play".to_string()));
            }
            Err(e) => return Err(e.into()),
        };

        let backend = Arc::clone(&self.backend);
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let task = tokio::spawn(async move {
            match blocking(move || backend.play(&wav, &token).map(|_| token.is_cancelled())).await
            {
                Ok(true) => PlaybackOutcome::Stopped,
                Ok(false) => PlaybackOutcome::Completed(PlaybackSource::Capture),
                Err(e) => {
                    warn!("Failed to play recording: {}", e);
                    PlaybackOutcome::Failed(e.to_string())
                }
            }
        });

        self.playback = Some(ActivePlayback { cancel, task });
        Ok(())
    }

    /// Stop playback, waiting for the device to be released
    pub async fn stop_playback(&mut self) {
        if let Some(active) = self.playback.take() {
            active.cancel.cancel();
            if let Err(e) = active.task.await {
                warn!("Playback task failed: {}", e);
            }
        }
    }

    /// Stop whatever is active
    pub async fn stop_all(&mut self) {
        self.stop_playback().await;
        self.cancel_capture().await;
    }

    /// Resolves when the current playback ends; pending while nothing plays.
    ///
    /// Cancel safe: dropping the future leaves the playback running.
    pub async fn playback_finished(&mut self) -> PlaybackOutcome {
        let Some(active) = self.playback.as_mut() else {
            return std::future::pending().await;
        };

        let outcome = match (&mut active.task).await {
            Ok(outcome) => outcome,
            Err(e) => PlaybackOutcome::Failed(format!("Playback task failed: {e}")),
        };
        self.playback = None;
        outcome
    }

    /// Wait for the current playback, if any
    pub async fn wait_playback(&mut self) -> Option<PlaybackOutcome> {
        if self.playback.is_none() {
            return None;
        }
        Some(self.playback_finished().await)
    }
}

/// Run blocking device work off the async runtime
async fn blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| Error::Audio(format!("Audio task failed: {e}")))?
}

async fn speak(
    gateway: Arc<dyn AiGateway>,
    backend: Arc<dyn AudioBackend>,
    voice: Arc<dyn FallbackVoice>,
    request: SpeechRequest,
    language: String,
    cancel: CancellationToken,
) -> PlaybackOutcome {
    let synthesized = tokio::select! {
        _ = cancel.cancelled() => return PlaybackOutcome::Stopped,
        result = gateway.synthesize_speech(request.clone()) => result,
    };

    match synthesized {
        Ok(wav) => {
            let token = cancel.clone();
            match blocking(move || backend.play(&wav, &token)).await {
                Ok(()) if cancel.is_cancelled() => PlaybackOutcome::Stopped,
                Ok(()) => PlaybackOutcome::Completed(PlaybackSource::Synthesized),
                Err(e) => {
                    warn!("Playback failed ({}), using system voice", e);
                    speak_locally(voice, request, language, cancel).await
                }
            }
        }
        Err(e) => {
            warn!("Speech synthesis failed ({}), using system voice", e);
            speak_locally(voice, request, language, cancel).await
        }
    }
}

async fn speak_locally(
    voice: Arc<dyn FallbackVoice>,
    request: SpeechRequest,
    language: String,
    cancel: CancellationToken,
) -> PlaybackOutcome {
    let token = cancel.clone();
    let result = blocking(move || {
        voice.speak(&request.text, &language, request.speed, &token)
    })
    .await;

    match result {
        Ok(()) if cancel.is_cancelled() => PlaybackOutcome::Stopped,
        Ok(()) => PlaybackOutcome::Completed(PlaybackSource::Fallback),
        Err(e) => {
            warn!("System voice failed: {}", e);
            PlaybackOutcome::Failed(e.to_string())
        }
    }
}
