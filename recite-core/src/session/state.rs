//! Observable session state and the commands that change it

use crate::audio::PipelineState;
use crate::config::SessionConfig;
use crate::types::{
    AnswerOutcome, PracticeDifficulty, PracticeItem, PracticeMode, PronunciationFeedback,
};

/// Where the current exercise is in its lifecycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SessionPhase {
    /// Items are being generated
    #[default]
    LoadingContent,
    /// Waiting for the learner
    Ready,
    /// Capturing a speaking attempt
    Recording,
    /// Playing a prompt or the last recording
    Playing,
    /// Listening prompt heard, waiting for an answer
    Answering,
    /// Transcribing and scoring a speaking attempt
    Evaluating,
    /// Feedback or answer result is available
    ResultShown,
}

/// A request to the session engine
#[derive(Debug, Clone, PartialEq)]
pub enum SessionCommand {
    StartRecording,
    StopRecording,
    /// Speak the current item's text
    PlayPrompt,
    /// Play back the last recording
    PlayCapture,
    /// Stop recording or playback
    StopAudio,
    SelectAnswer(usize),
    Next,
    Previous,
    /// Replace the item set, optionally at a new difficulty
    Regenerate {
        difficulty: Option<PracticeDifficulty>,
    },
    Shutdown,
}

/// Immutable snapshot of a session, published after every change
#[derive(Debug, Clone, PartialEq)]
pub struct SessionState {
    pub mode: PracticeMode,
    pub difficulty: PracticeDifficulty,
    pub phase: SessionPhase,
    pub items: Vec<PracticeItem>,
    pub current_index: usize,
    pub audio: PipelineState,
    /// Feedback for the last speaking attempt on this item
    pub feedback: Option<PronunciationFeedback>,
    /// Transcript of the last speaking attempt on this item
    pub transcript: Option<String>,
    /// Answer submitted for the current listening item
    pub answer: Option<AnswerOutcome>,
    /// Transient, user-facing error message
    pub error: Option<String>,
    /// Incremented for every speaking attempt
    pub attempt: u64,
    /// Whether the current item's prompt has been played
    pub prompt_played: bool,
}

impl SessionState {
    pub fn new(config: &SessionConfig) -> Self {
        Self {
            mode: config.mode,
            difficulty: config.difficulty,
            phase: SessionPhase::LoadingContent,
            items: Vec::new(),
            current_index: 0,
            audio: PipelineState::Idle,
            feedback: None,
            transcript: None,
            answer: None,
            error: None,
            attempt: 0,
            prompt_played: false,
        }
    }

    pub fn current_item(&self) -> Option<&PracticeItem> {
        self.items.get(self.current_index)
    }

    pub fn total(&self) -> usize {
        self.items.len()
    }

    pub fn has_previous(&self) -> bool {
        self.current_index > 0
    }

    pub fn has_next(&self) -> bool {
        self.current_index + 1 < self.items.len()
    }

    /// Whether the learner's answer to the current item was correct
    pub fn is_correct(&self) -> Option<bool> {
        self.answer.map(|answer| answer.is_correct)
    }

    /// Score shown for the current item, if any
    pub fn score(&self) -> Option<u8> {
        self.feedback
            .as_ref()
            .map(|f| f.score)
            .or_else(|| self.answer.map(|a| a.score()))
    }

    /// Clear everything tied to the current item's attempt
    pub(crate) fn reset_attempt(&mut self) {
        self.feedback = None;
        self.transcript = None;
        self.answer = None;
        self.error = None;
        self.prompt_played = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ListeningItem, SpeakingItem};

    fn state_with_items(n: usize) -> SessionState {
        let mut state = SessionState::new(&SessionConfig::new(PracticeMode::Speaking));
        state.items = (0..n)
            .map(|i| {
                PracticeItem::Speaking(SpeakingItem {
                    text: format!("phrase {i}"),
                    translation: None,
                    difficulty: PracticeDifficulty::Beginner,
                })
            })
            .collect();
        state
    }

    #[test]
    fn test_navigation_bounds() {
        let mut state = state_with_items(2);
        assert!(!state.has_previous());
        assert!(state.has_next());

        state.current_index = 1;
        assert!(state.has_previous());
        assert!(!state.has_next());
        assert_eq!(state.current_item().map(|i| i.text()), Some("phrase 1"));
    }

    #[test]
    fn test_score_from_answer() {
        let mut state = SessionState::new(&SessionConfig::new(PracticeMode::Listening));
        state.items = vec![PracticeItem::Listening(ListeningItem {
            prayer_text: "Our Father".to_string(),
            question: "Who is addressed?".to_string(),
            options: vec!["Father".to_string(), "Son".to_string()],
            correct_index: 0,
        })];
        assert_eq!(state.score(), None);

        state.answer = Some(AnswerOutcome {
            selected_index: 1,
            correct_index: 0,
            is_correct: false,
        });
        assert_eq!(state.score(), Some(0));
        assert_eq!(state.is_correct(), Some(false));

        state.reset_attempt();
        assert_eq!(state.answer, None);
    }
}
