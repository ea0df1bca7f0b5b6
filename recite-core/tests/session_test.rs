//! Practice session engine tests
//!
//! These tests run full sessions against fake services:
//! - Speaking attempts: scoring, transcription failure, stale evaluations
//! - Listening answers and their history records
//! - Navigation bounds and content fallback

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{FakeBackend, FakeGateway, FakeVoice, wait_until};
use recite::audio::AudioPipeline;
use recite::content::fallback;
use recite::error::Error;
use recite::{
    AccuracyTier, HistoryStore, PracticeDifficulty, PracticeMode, PracticeSessionEngine,
    SessionConfig, SessionHandle, SessionPhase, SessionState, Storage, TRANSCRIPTION_FAILED_TEXT,
};
use tempfile::TempDir;

struct Session {
    handle: SessionHandle,
    gateway: Arc<FakeGateway>,
    backend: Arc<FakeBackend>,
    voice: Arc<FakeVoice>,
    history: Arc<HistoryStore>,
    _dir: TempDir,
}

impl Session {
    async fn wait(&self, predicate: impl FnMut(&SessionState) -> bool) -> SessionState {
        tokio::time::timeout(Duration::from_secs(5), self.handle.wait_for(predicate))
            .await
            .expect("session did not reach the expected state")
            .expect("session closed")
    }

    async fn wait_phase(&self, phase: SessionPhase) -> SessionState {
        self.wait(|s| s.phase == phase).await
    }
}

/// Start a session; `setup` scripts the gateway before content is generated
async fn start(config: SessionConfig, setup: impl FnOnce(&FakeGateway)) -> Session {
    let dir = TempDir::new().unwrap();
    let gateway = Arc::new(FakeGateway::new());
    let backend = Arc::new(FakeBackend::new());
    let voice = Arc::new(FakeVoice::new());
    setup(&gateway);

    let storage = Arc::new(Storage::in_memory().unwrap());
    let history = Arc::new(HistoryStore::open(storage).unwrap());
    let pipeline = AudioPipeline::new(
        backend.clone(),
        gateway.clone(),
        voice.clone(),
        dir.path().join("capture.wav"),
    );

    let handle =
        PracticeSessionEngine::new(config, gateway.clone(), pipeline, Arc::clone(&history)).spawn();

    let session = Session {
        handle,
        gateway,
        backend,
        voice,
        history,
        _dir: dir,
    };
    session.wait_phase(SessionPhase::Ready).await;
    session
}

fn speaking() -> SessionConfig {
    SessionConfig::new(PracticeMode::Speaking)
}

fn listening() -> SessionConfig {
    SessionConfig::new(PracticeMode::Listening)
}

const LISTENING_SET: &str = r#"[
    {"prayer": "The Lord is my shepherd; I shall not want.",
     "question": "What shall I not do?",
     "options": ["Sing", "Pray", "Want", "Sleep"],
     "correct_index": 2}
]"#;

const GOOD_SCORE: &str = r#"{"score": 92, "accuracy": "high", "feedback": "Lovely and clear.",
    "improvements": ["heaven"], "tips": "Keep the pace steady."}"#;

async fn record_attempt(session: &Session) {
    session.handle.start_recording().await.unwrap();
    session.wait_phase(SessionPhase::Recording).await;
    session.handle.stop_recording().await.unwrap();
}

// ============ Content ============

#[tokio::test]
async fn test_content_falls_back_to_english() {
    let session = start(
        speaking().with_language("sw").with_item_count(3),
        |_| {},
    )
    .await;

    let state = session.handle.state();
    let expected: Vec<String> = fallback::speaking_bank("en", PracticeDifficulty::Beginner)
        .into_iter()
        .take(3)
        .map(|item| item.text)
        .collect();
    let texts: Vec<String> = state.items.iter().map(|i| i.text().to_string()).collect();

    assert_eq!(texts, expected);
    assert_eq!(state.current_index, 0);
    assert_eq!(session.gateway.completion_calls(), 1);
}

#[tokio::test]
async fn test_generated_content_is_used() {
    let session = start(listening(), |gw| gw.push_completion(LISTENING_SET)).await;

    let state = session.handle.state();
    assert_eq!(state.total(), 1);
    assert_eq!(
        state.items[0].text(),
        "The Lord is my shepherd; I shall not want."
    );
}

#[tokio::test]
async fn test_regenerate_with_new_difficulty() {
    let session = start(speaking().with_item_count(2), |_| {}).await;
    session.handle.next().await.unwrap();
    session.wait(|s| s.current_index == 1).await;

    session
        .handle
        .regenerate(Some(PracticeDifficulty::Advanced))
        .await
        .unwrap();
    let state = session
        .wait(|s| s.difficulty == PracticeDifficulty::Advanced && s.phase == SessionPhase::Ready)
        .await;

    let expected = fallback::speaking_bank("en", PracticeDifficulty::Advanced);
    assert_eq!(state.current_index, 0);
    assert_eq!(state.items[0].text(), expected[0].text);
}

// ============ Speaking ============

#[tokio::test]
async fn test_speaking_attempt_is_scored_and_recorded() {
    let session = start(speaking(), |_| {}).await;
    session.gateway.push_transcript("Our Father who art in heaven");
    session.gateway.push_completion(GOOD_SCORE);

    record_attempt(&session).await;
    let state = session.wait_phase(SessionPhase::ResultShown).await;

    let feedback = state.feedback.expect("feedback");
    assert_eq!(feedback.score, 92);
    assert_eq!(feedback.accuracy, AccuracyTier::High);
    assert_eq!(feedback.improvements, vec!["heaven".to_string()]);
    assert_eq!(
        state.transcript.as_deref(),
        Some("Our Father who art in heaven")
    );
    assert_eq!(session.gateway.last_transcription_language().as_deref(), Some("en"));

    let results = session.history.results();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].score, 92);
    assert_eq!(results[0].mode, PracticeMode::Speaking);
    assert_eq!(results[0].text, state.items[0].text());
}

#[tokio::test]
async fn test_transcription_failure_shows_zero_score() {
    let session = start(speaking(), |_| {}).await;
    session.gateway.push_transcription_error(Error::TranscriptionFailure {
        status: 500,
        body: "boom".to_string(),
    });

    record_attempt(&session).await;
    let state = session.wait_phase(SessionPhase::ResultShown).await;

    assert_eq!(state.feedback.as_ref().map(|f| f.score), Some(0));
    assert_eq!(state.transcript.as_deref(), Some(TRANSCRIPTION_FAILED_TEXT));
    assert_eq!(session.history.count(), 0);
    // scoring is never attempted without a transcript
    assert_eq!(session.gateway.completion_calls(), 1);
}

#[tokio::test]
async fn test_empty_transcript_counts_as_failure() {
    let session = start(speaking(), |_| {}).await;
    session.gateway.push_transcript("   ");

    record_attempt(&session).await;
    let state = session.wait_phase(SessionPhase::ResultShown).await;

    assert_eq!(state.score(), Some(0));
    assert_eq!(state.transcript.as_deref(), Some(TRANSCRIPTION_FAILED_TEXT));
}

#[tokio::test]
async fn test_silent_recording_skips_transcription() {
    let session = start(speaking(), |_| {}).await;
    session.backend.set_pcm(Vec::new());

    record_attempt(&session).await;
    let state = session.wait_phase(SessionPhase::ResultShown).await;

    assert_eq!(state.score(), Some(0));
    assert_eq!(session.gateway.transcription_calls(), 0);
}

#[tokio::test]
async fn test_scoring_failure_records_default_score() {
    let session = start(speaking(), |_| {}).await;
    session.gateway.push_transcript("hallowed be thy name");

    record_attempt(&session).await;
    let state = session.wait_phase(SessionPhase::ResultShown).await;

    let feedback = state.feedback.expect("feedback");
    assert_eq!(feedback.score, 70);
    assert_eq!(feedback.accuracy, AccuracyTier::Medium);
    assert!(feedback.improvements.is_empty());

    let results = session.history.results();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].score, 70);
}

#[tokio::test]
async fn test_stale_evaluation_is_discarded() {
    let session = start(speaking(), |_| {}).await;
    session
        .gateway
        .push_transcript_after(Duration::from_secs(30), "first attempt");
    session.gateway.push_transcript("second attempt");
    session.gateway.push_completion(GOOD_SCORE);

    record_attempt(&session).await;
    session.wait_phase(SessionPhase::Evaluating).await;
    wait_until(|| session.gateway.transcription_calls() == 1).await;

    // a new attempt while the first is still being evaluated
    record_attempt(&session).await;
    let state = session.wait_phase(SessionPhase::ResultShown).await;

    assert_eq!(state.attempt, 2);
    assert_eq!(state.transcript.as_deref(), Some("second attempt"));
    assert_eq!(state.score(), Some(92));
    assert_eq!(session.history.count(), 1);
    assert_eq!(session.backend.max_active_captures(), 1);
}

#[tokio::test]
async fn test_second_start_replaces_active_recording() {
    let session = start(speaking(), |_| {}).await;
    session.gateway.push_transcript("second take");

    session.handle.start_recording().await.unwrap();
    session.wait(|s| s.phase == SessionPhase::Recording && s.attempt == 1).await;

    session.handle.start_recording().await.unwrap();
    let state = session
        .wait(|s| s.phase == SessionPhase::Recording && s.attempt == 2)
        .await;

    assert_eq!(state.attempt, 2);
    assert_eq!(session.backend.starts(), 2);
    assert_eq!(session.backend.active_captures(), 1);
    assert_eq!(session.backend.max_active_captures(), 1);

    session.handle.stop_recording().await.unwrap();
    let state = session.wait_phase(SessionPhase::ResultShown).await;
    assert_eq!(state.attempt, 2);
    assert_eq!(state.transcript.as_deref(), Some("second take"));
    assert_eq!(session.backend.active_captures(), 0);
}

#[tokio::test]
async fn test_reattempt_records_again() {
    let session = start(speaking(), |_| {}).await;

    for transcript in ["first", "second"] {
        session.gateway.push_transcript(transcript);
        record_attempt(&session).await;
        session
            .wait(|s| s.phase == SessionPhase::ResultShown && s.transcript.as_deref() == Some(transcript))
            .await;
    }

    assert_eq!(session.history.count(), 2);
}

#[tokio::test]
async fn test_device_unavailable_is_surfaced() {
    let session = start(speaking().with_item_count(2), |_| {}).await;
    session.backend.set_fail_start(true);

    session.handle.start_recording().await.unwrap();
    let state = session.wait(|s| s.error.is_some()).await;

    assert_eq!(state.phase, SessionPhase::Ready);
    assert!(state.error.unwrap().contains("Microphone"));

    // the session stays usable
    session.handle.next().await.unwrap();
    let state = session.wait(|s| s.current_index == 1).await;
    assert_eq!(state.error, None);
}

#[tokio::test]
async fn test_play_prompt_returns_to_ready() {
    let session = start(speaking(), |_| {}).await;

    session.handle.play_prompt().await.unwrap();
    let state = session
        .wait(|s| s.prompt_played && s.phase == SessionPhase::Ready)
        .await;

    assert!(state.prompt_played);
    assert_eq!(session.voice.spoken(), vec![state.items[0].text().to_string()]);
}

// ============ Listening ============

#[tokio::test]
async fn test_listening_correct_answer() {
    let session = start(listening(), |gw| gw.push_completion(LISTENING_SET)).await;

    session.handle.select_answer(2).await.unwrap();
    let state = session.wait_phase(SessionPhase::ResultShown).await;

    assert_eq!(state.is_correct(), Some(true));
    let results = session.history.results();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].score, 100);
    assert_eq!(results[0].mode, PracticeMode::Listening);
}

#[tokio::test]
async fn test_listening_incorrect_answer() {
    let session = start(listening(), |gw| gw.push_completion(LISTENING_SET)).await;

    session.handle.select_answer(0).await.unwrap();
    let state = session.wait_phase(SessionPhase::ResultShown).await;

    assert_eq!(state.is_correct(), Some(false));
    let answer = state.answer.expect("answer");
    assert_eq!(answer.correct_index, 2);
    assert_eq!(session.history.count(), 1);
    assert_eq!(session.history.results()[0].score, 0);
}

#[tokio::test]
async fn test_listening_answer_is_recorded_once() {
    let session = start(listening().with_item_count(2), |_| {}).await;

    session.handle.select_answer(0).await.unwrap();
    session.handle.select_answer(1).await.unwrap();
    session.handle.next().await.unwrap();
    session.wait(|s| s.current_index == 1).await;

    assert_eq!(session.history.count(), 1);
    assert_eq!(session.history.results()[0].text, fallback::listening_bank("en")[0].prayer_text);
}

#[tokio::test]
async fn test_listening_prompt_leads_to_answering() {
    let session = start(listening(), |_| {}).await;

    session.handle.play_prompt().await.unwrap();
    let state = session.wait_phase(SessionPhase::Answering).await;

    let prayer = state.items[0].text().to_string();
    assert_eq!(session.voice.spoken(), vec![prayer]);
    assert_eq!(session.gateway.synthesis_calls(), 1);
}

#[tokio::test]
async fn test_out_of_range_answer_is_ignored() {
    let session = start(listening(), |gw| gw.push_completion(LISTENING_SET)).await;

    session.handle.select_answer(9).await.unwrap();
    session.handle.select_answer(2).await.unwrap();
    let state = session.wait_phase(SessionPhase::ResultShown).await;

    assert_eq!(state.answer.map(|a| a.selected_index), Some(2));
    assert_eq!(session.history.count(), 1);
}

// ============ Navigation ============

#[tokio::test]
async fn test_navigation_is_bounded() {
    let session = start(speaking().with_item_count(3), |_| {}).await;

    session.handle.previous().await.unwrap();
    session.handle.next().await.unwrap();
    let state = session.wait(|s| s.current_index == 1).await;
    assert_eq!(state.total(), 3);

    for _ in 0..5 {
        session.handle.next().await.unwrap();
    }
    let state = session.wait(|s| s.current_index == 2).await;
    assert!(!state.has_next());

    // moves past the end were dropped, so one step back lands on the middle
    session.handle.previous().await.unwrap();
    let state = session.wait(|s| s.current_index == 1).await;
    assert_eq!(state.phase, SessionPhase::Ready);
}

#[tokio::test]
async fn test_navigation_resets_feedback() {
    let session = start(speaking().with_item_count(2), |_| {}).await;
    session.gateway.push_transcript("our father");
    session.gateway.push_completion(GOOD_SCORE);

    record_attempt(&session).await;
    session.wait_phase(SessionPhase::ResultShown).await;

    session.handle.next().await.unwrap();
    let state = session.wait(|s| s.current_index == 1).await;

    assert_eq!(state.phase, SessionPhase::Ready);
    assert_eq!(state.feedback, None);
    assert_eq!(state.transcript, None);
    // generation is not repeated by navigation
    assert_eq!(session.gateway.completion_calls(), 2);
}

// ============ Lifecycle ============

#[tokio::test]
async fn test_shutdown_ends_session() {
    let session = start(speaking(), |_| {}).await;
    let mut updates = session.handle.subscribe();

    session.handle.start_recording().await.unwrap();
    session.wait_phase(SessionPhase::Recording).await;

    tokio::time::timeout(Duration::from_secs(5), session.handle.shutdown())
        .await
        .expect("shutdown should finish");

    // the last published state has released the microphone
    assert_eq!(session.backend.active_captures(), 0);
    while updates.changed().await.is_ok() {}
    assert_eq!(updates.borrow().audio, recite::audio::PipelineState::Idle);
}
