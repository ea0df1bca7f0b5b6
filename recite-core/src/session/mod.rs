//! Practice session engine
//!
//! A session runs as a single tokio task that owns its state, the audio
//! pipeline, and every in-flight request. Callers talk to it through a
//! [`SessionHandle`] and observe [`SessionState`] snapshots.
mod handle;
mod state;

pub use handle::SessionHandle;
pub use state::{SessionCommand, SessionPhase, SessionState};

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::AudioData;
use crate::audio::{AudioPipeline, PlaybackOutcome};
use crate::config::SessionConfig;
use crate::content::{ContentGenerator, ContentRequest, normalize_language};
use crate::gateway::{AiGateway, TranscriptionRequest};
use crate::history::HistoryStore;
use crate::scoring::ScoringEvaluator;
use crate::types::{
    AnswerOutcome, PracticeItem, PracticeMode, PracticeResult, PronunciationFeedback,
    TRANSCRIPTION_FAILED_TEXT,
};

const COMMAND_BUFFER: usize = 32;

/// Result of transcribing and scoring one speaking attempt
#[derive(Debug, Clone)]
enum Evaluation {
    Scored {
        transcript: String,
        feedback: PronunciationFeedback,
    },
    Untranscribed,
}

struct PendingEvaluation {
    attempt: u64,
    cancel: CancellationToken,
    task: JoinHandle<Option<Evaluation>>,
}

enum Event {
    Command(SessionCommand),
    Evaluated {
        attempt: u64,
        evaluation: Option<Evaluation>,
    },
    PlaybackFinished(PlaybackOutcome),
    Closed,
}

/// Drives one practice session: content, audio, scoring, and history
pub struct PracticeSessionEngine {
    config: SessionConfig,
    gateway: Arc<dyn AiGateway>,
    content: ContentGenerator,
    scorer: ScoringEvaluator,
    pipeline: AudioPipeline,
    history: Arc<HistoryStore>,
    state: SessionState,
    publisher: watch::Sender<SessionState>,
    pending: Option<PendingEvaluation>,
    cancel: CancellationToken,
}

impl PracticeSessionEngine {
    pub fn new(
        config: SessionConfig,
        gateway: Arc<dyn AiGateway>,
        pipeline: AudioPipeline,
        history: Arc<HistoryStore>,
    ) -> Self {
        let state = SessionState::new(&config);
        let (publisher, _) = watch::channel(state.clone());

        Self {
            content: ContentGenerator::new(Arc::clone(&gateway)),
            scorer: ScoringEvaluator::new(Arc::clone(&gateway)),
            config,
            gateway,
            pipeline,
            history,
            state,
            publisher,
            pending: None,
            cancel: CancellationToken::new(),
        }
    }

    /// Start the session on the current runtime
    pub fn spawn(self) -> SessionHandle {
        let (commands, receiver) = mpsc::channel(COMMAND_BUFFER);
        let state = self.publisher.subscribe();
        let cancel = self.cancel.clone();
        let task = tokio::spawn(self.run(receiver));
        SessionHandle::new(commands, state, cancel, task)
    }

    async fn run(mut self, mut commands: mpsc::Receiver<SessionCommand>) {
        info!(
            "Practice session started ({:?}, {}, {})",
            self.config.mode,
            self.config.language,
            self.config.difficulty.label()
        );

        if self.load_content().await {
            loop {
                let event = tokio::select! {
                    _ = self.cancel.cancelled() => Event::Closed,
                    command = commands.recv() => match command {
                        Some(command) => Event::Command(command),
                        None => Event::Closed,
                    },
                    (attempt, evaluation) = next_evaluation(&mut self.pending) => {
                        Event::Evaluated { attempt, evaluation }
                    }
                    outcome = self.pipeline.playback_finished() => Event::PlaybackFinished(outcome),
                };

                match event {
                    Event::Command(SessionCommand::Shutdown) | Event::Closed => break,
                    Event::Command(command) => self.handle_command(command).await,
                    Event::Evaluated {
                        attempt,
                        evaluation,
                    } => self.finish_evaluation(attempt, evaluation),
                    Event::PlaybackFinished(outcome) => self.finish_playback(outcome),
                }
                self.publish();
            }
        }

        self.cancel_evaluation();
        self.pipeline.stop_all().await;
        self.publish();
        info!("Practice session ended");
    }

    fn publish(&mut self) {
        self.state.audio = self.pipeline.state();
        self.publisher.send_replace(self.state.clone());
    }

    /// Generate the item set. Returns false if the session was cancelled first.
    async fn load_content(&mut self) -> bool {
        self.state.phase = SessionPhase::LoadingContent;
        self.publish();

        let request = ContentRequest::from(&self.config);
        let items = tokio::select! {
            _ = self.cancel.cancelled() => return false,
            items = self.content.generate(&request) => items,
        };

        debug!("Loaded {} items", items.len());
        self.state.items = items;
        self.state.current_index = 0;
        self.state.difficulty = self.config.difficulty;
        self.state.reset_attempt();
        self.state.phase = SessionPhase::Ready;
        self.publish();
        true
    }

    async fn handle_command(&mut self, command: SessionCommand) {
        debug!("Session command: {:?} in {:?}", command, self.state.phase);

        match command {
            SessionCommand::StartRecording => self.start_recording().await,
            SessionCommand::StopRecording => self.stop_recording().await,
            SessionCommand::PlayPrompt => self.play_prompt().await,
            SessionCommand::PlayCapture => self.play_capture().await,
            SessionCommand::StopAudio => self.stop_audio().await,
            SessionCommand::SelectAnswer(index) => self.select_answer(index).await,
            SessionCommand::Next => self.navigate(1).await,
            SessionCommand::Previous => self.navigate(-1).await,
            SessionCommand::Regenerate { difficulty } => {
                self.stop_activity().await;
                if let Some(difficulty) = difficulty {
                    self.config.difficulty = difficulty;
                }
                if !self.load_content().await {
                    self.cancel.cancel();
                }
            }
            // handled by the run loop
            SessionCommand::Shutdown => {}
        }
    }

    async fn start_recording(&mut self) {
        if self.config.mode != PracticeMode::Speaking {
            debug!("Recording ignored in {:?} mode", self.config.mode);
            return;
        }
        if self.state.phase == SessionPhase::LoadingContent {
            return;
        }

        // a new attempt supersedes any evaluation or capture still in flight
        self.cancel_evaluation();

        match self.pipeline.start_capture().await {
            Ok(capture_id) => {
                self.state.attempt += 1;
                self.state.feedback = None;
                self.state.transcript = None;
                self.state.error = None;
                self.state.phase = SessionPhase::Recording;
                debug!(
                    "Attempt {} recording (capture {})",
                    self.state.attempt, capture_id
                );
            }
            Err(e) => {
                warn!("Could not start recording: {}", e);
                self.state.error = Some(e.user_message());
                self.state.phase = self.settled_phase();
            }
        }
    }

    async fn stop_recording(&mut self) {
        if self.state.phase != SessionPhase::Recording {
            return;
        }

        let recording = match self.pipeline.stop_capture().await {
            Ok(recording) => recording,
            Err(e) => {
                warn!("Could not finish recording: {}", e);
                self.state.error = Some(e.user_message());
                self.state.phase = SessionPhase::Ready;
                return;
            }
        };

        let Some(reference) = self.state.current_item().map(|item| item.text().to_string())
        else {
            self.state.phase = SessionPhase::Ready;
            return;
        };

        let audio = (!recording.audio.is_empty()).then_some(recording.wav);
        let cancel = self.cancel.child_token();
        let token = cancel.clone();
        let gateway = Arc::clone(&self.gateway);
        let scorer = self.scorer.clone();
        let language = normalize_language(&self.config.language);

        let task = tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => None,
                evaluation = evaluate_attempt(gateway, scorer, audio, reference, language) => {
                    Some(evaluation)
                }
            }
        });

        self.pending = Some(PendingEvaluation {
            attempt: self.state.attempt,
            cancel,
            task,
        });
        self.state.phase = SessionPhase::Evaluating;
    }

    fn finish_evaluation(&mut self, attempt: u64, evaluation: Option<Evaluation>) {
        if attempt != self.state.attempt || self.state.phase != SessionPhase::Evaluating {
            debug!("Discarding evaluation for superseded attempt {}", attempt);
            return;
        }

        match evaluation.unwrap_or(Evaluation::Untranscribed) {
            Evaluation::Scored {
                transcript,
                feedback,
            } => {
                info!("Attempt {} scored {}", attempt, feedback.score);
                self.record_speaking_result(feedback.score);
                self.state.transcript = Some(transcript);
                self.state.feedback = Some(feedback);
            }
            Evaluation::Untranscribed => {
                info!("Attempt {} could not be transcribed", attempt);
                self.state.transcript = Some(TRANSCRIPTION_FAILED_TEXT.to_string());
                self.state.feedback = Some(PronunciationFeedback::transcription_failed());
            }
        }
        self.state.phase = SessionPhase::ResultShown;
    }

    fn record_speaking_result(&mut self, score: u8) {
        let Some(PracticeItem::Speaking(item)) = self.state.current_item() else {
            return;
        };
        let result = PracticeResult::new(
            item.text.clone(),
            score,
            item.difficulty,
            PracticeMode::Speaking,
        );
        self.append_result(result);
    }

    fn append_result(&mut self, result: PracticeResult) {
        if let Err(e) = self.history.append(result) {
            warn!("Failed to save practice result: {}", e);
            self.state.error = Some("Your result could not be saved.".to_string());
        }
    }

    fn cancel_evaluation(&mut self) {
        if let Some(pending) = self.pending.take() {
            debug!("Cancelling evaluation for attempt {}", pending.attempt);
            pending.cancel.cancel();
        }
    }

    async fn play_prompt(&mut self) {
        if !self.accepts_playback() {
            return;
        }
        let Some(text) = self.state.current_item().map(|item| item.text().to_string()) else {
            return;
        };

        self.pipeline
            .play_text(
                &text,
                &self.config.voice,
                self.config.speech_speed(),
                &self.config.language,
            )
            .await;
        self.state.prompt_played = true;
        self.state.error = None;
        self.state.phase = SessionPhase::Playing;
    }

    async fn play_capture(&mut self) {
        if self.config.mode != PracticeMode::Speaking || !self.accepts_playback() {
            return;
        }

        match self.pipeline.play_capture().await {
            Ok(()) => {
                self.state.error = None;
                self.state.phase = SessionPhase::Playing;
            }
            Err(e) => {
                warn!("Could not play recording: {}", e);
                self.state.error = Some("There is no recording to play yet.".to_string());
                self.state.phase = self.settled_phase();
            }
        }
    }

    fn accepts_playback(&self) -> bool {
        !matches!(
            self.state.phase,
            SessionPhase::LoadingContent | SessionPhase::Evaluating
        )
    }

    async fn stop_audio(&mut self) {
        match self.state.phase {
            SessionPhase::Recording => {
                self.pipeline.cancel_capture().await;
                self.state.phase = self.settled_phase();
            }
            SessionPhase::Playing => {
                self.pipeline.stop_playback().await;
                self.state.phase = self.settled_phase();
            }
            _ => {}
        }
    }

    fn finish_playback(&mut self, outcome: PlaybackOutcome) {
        debug!("Playback finished: {:?}", outcome);
        if let PlaybackOutcome::Failed(_) = outcome {
            self.state.error = Some("Audio could not be played.".to_string());
        }
        if self.state.phase == SessionPhase::Playing {
            self.state.phase = self.settled_phase();
        }
    }

    async fn select_answer(&mut self, index: usize) {
        if self.config.mode != PracticeMode::Listening || self.state.answer.is_some() {
            return;
        }
        if !matches!(
            self.state.phase,
            SessionPhase::Ready | SessionPhase::Playing | SessionPhase::Answering
        ) {
            return;
        }

        let Some(item) = self.state.current_item().and_then(|i| i.as_listening()) else {
            return;
        };
        if index >= item.options.len() {
            warn!(
                "Answer {} out of range for {} options",
                index,
                item.options.len()
            );
            return;
        }

        let outcome = AnswerOutcome {
            selected_index: index,
            correct_index: item.correct_index,
            is_correct: item.is_correct(index),
        };
        let result = PracticeResult::new(
            item.prayer_text.clone(),
            outcome.score(),
            self.config.difficulty,
            PracticeMode::Listening,
        );

        self.pipeline.stop_playback().await;
        info!(
            "Answered {} ({})",
            index,
            if outcome.is_correct { "correct" } else { "incorrect" }
        );
        self.append_result(result);
        self.state.answer = Some(outcome);
        self.state.phase = SessionPhase::ResultShown;
    }

    /// Move by `step` items; out-of-range moves do nothing
    async fn navigate(&mut self, step: isize) {
        if self.state.phase == SessionPhase::LoadingContent {
            return;
        }
        let Some(target) = self.state.current_index.checked_add_signed(step) else {
            return;
        };
        if target >= self.state.items.len() {
            return;
        }

        self.stop_activity().await;
        self.state.current_index = target;
        self.state.reset_attempt();
        self.state.phase = SessionPhase::Ready;
        debug!("Moved to item {}", target);
    }

    /// Stop audio and drop any in-flight evaluation
    async fn stop_activity(&mut self) {
        self.cancel_evaluation();
        self.pipeline.stop_all().await;
    }

    /// Phase to return to once audio stops
    fn settled_phase(&self) -> SessionPhase {
        if self.state.feedback.is_some() || self.state.answer.is_some() {
            SessionPhase::ResultShown
        } else if self.config.mode == PracticeMode::Listening && self.state.prompt_played {
            SessionPhase::Answering
        } else {
            SessionPhase::Ready
        }
    }
}

/// Resolves with the pending evaluation's outcome; pending while none runs
async fn next_evaluation(pending: &mut Option<PendingEvaluation>) -> (u64, Option<Evaluation>) {
    let Some(active) = pending.as_mut() else {
        return std::future::pending().await;
    };

    let result = (&mut active.task).await;
    let attempt = active.attempt;
    *pending = None;

    match result {
        Ok(evaluation) => (attempt, evaluation),
        Err(e) => {
            warn!("Evaluation task failed: {}", e);
            (attempt, None)
        }
    }
}

/// Transcribe then score. Any transcription problem, including silence,
/// yields [`Evaluation::Untranscribed`].
async fn evaluate_attempt(
    gateway: Arc<dyn AiGateway>,
    scorer: ScoringEvaluator,
    audio: Option<AudioData>,
    reference: String,
    language: String,
) -> Evaluation {
    let Some(audio) = audio else {
        warn!("Recording is empty, nothing to transcribe");
        return Evaluation::Untranscribed;
    };

    let request = TranscriptionRequest::new(audio).with_language(language.as_str());
    let transcript = match gateway.transcribe_audio(request).await {
        Ok(text) if !text.trim().is_empty() => text.trim().to_string(),
        Ok(_) => {
            warn!("Transcription came back empty");
            return Evaluation::Untranscribed;
        }
        Err(e) => {
            warn!("Transcription failed: {}", e);
            return Evaluation::Untranscribed;
        }
    };

    debug!("Transcript: {}", transcript);
    let feedback = scorer.evaluate(&reference, &transcript, &language).await;
    Evaluation::Scored {
        transcript,
        feedback,
    }
}
