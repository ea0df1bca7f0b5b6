//! Core types used throughout Recite

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for recorded practice results
pub type ResultId = Uuid;

/// Audio data as raw bytes (16-bit PCM, or a WAV container where noted)
pub type AudioData = Vec<u8>;

/// Difficulty of a generated exercise set
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PracticeDifficulty {
    /// Short phrases, slower playback
    #[default]
    Beginner,
    Intermediate,
    /// Long passages, slightly faster playback
    Advanced,
}

impl PracticeDifficulty {
    /// Inclusive word-count band used when asking for new phrases
    pub fn word_range(&self) -> (u32, u32) {
        match self {
            Self::Beginner => (3, 8),
            Self::Intermediate => (8, 15),
            Self::Advanced => (15, 25),
        }
    }

    /// Default speech-synthesis speed for this difficulty
    pub fn default_speech_speed(&self) -> f32 {
        match self {
            Self::Beginner => 0.8,
            Self::Intermediate => 1.0,
            Self::Advanced => 1.1,
        }
    }

    /// Lowercase label used in prompts and the CLI
    pub fn label(&self) -> &'static str {
        match self {
            Self::Beginner => "beginner",
            Self::Intermediate => "intermediate",
            Self::Advanced => "advanced",
        }
    }

    /// Get all difficulties
    pub fn all() -> &'static [PracticeDifficulty] {
        &[
            PracticeDifficulty::Beginner,
            PracticeDifficulty::Intermediate,
            PracticeDifficulty::Advanced,
        ]
    }
}

/// Which kind of exercise a session runs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PracticeMode {
    /// Read a phrase aloud and get pronunciation feedback
    #[default]
    Speaking,
    /// Listen to a prayer and answer a comprehension question
    Listening,
}

/// A phrase the learner is asked to say aloud
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeakingItem {
    pub text: String,
    pub translation: Option<String>,
    pub difficulty: PracticeDifficulty,
}

/// A listening comprehension question about a prayer passage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListeningItem {
    pub prayer_text: String,
    pub question: String,
    pub options: Vec<String>,
    pub correct_index: usize,
}

impl ListeningItem {
    /// Whether `index` is the correct option
    pub fn is_correct(&self, index: usize) -> bool {
        index == self.correct_index
    }
}

/// One unit of practice content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PracticeItem {
    Speaking(SpeakingItem),
    Listening(ListeningItem),
}

impl PracticeItem {
    /// The text that is spoken aloud for this item
    pub fn text(&self) -> &str {
        match self {
            Self::Speaking(item) => &item.text,
            Self::Listening(item) => &item.prayer_text,
        }
    }

    pub fn mode(&self) -> PracticeMode {
        match self {
            Self::Speaking(_) => PracticeMode::Speaking,
            Self::Listening(_) => PracticeMode::Listening,
        }
    }

    pub fn as_listening(&self) -> Option<&ListeningItem> {
        match self {
            Self::Listening(item) => Some(item),
            Self::Speaking(_) => None,
        }
    }
}

/// Coarse bucket summarising a pronunciation score
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccuracyTier {
    High,
    Medium,
    Low,
    #[default]
    Unknown,
}

impl AccuracyTier {
    /// Parse a provider label; anything unrecognised is `Unknown`
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "high" => Self::High,
            "medium" => Self::Medium,
            "low" => Self::Low,
            _ => Self::Unknown,
        }
    }

    /// Derive a tier from a 0-100 score
    pub fn from_score(score: u8) -> Self {
        match score {
            80..=100 => Self::High,
            50..=79 => Self::Medium,
            _ => Self::Low,
        }
    }
}

/// Structured pronunciation score for one speaking attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PronunciationFeedback {
    /// Always within 0..=100
    pub score: u8,
    pub accuracy: AccuracyTier,
    pub feedback: String,
    pub improvements: Vec<String>,
    pub tips: String,
}

/// Transcript shown when the recording could not be transcribed
pub const TRANSCRIPTION_FAILED_TEXT: &str = "Could not transcribe audio";

impl PronunciationFeedback {
    /// Score used when the grading response is unavailable or unreadable.
    ///
    /// Kept above the midpoint: an infrastructure failure is not a
    /// pronunciation failure.
    pub const FALLBACK_SCORE: u8 = 70;

    /// Default feedback for a failed or unparseable scoring request
    pub fn fallback() -> Self {
        Self {
            score: Self::FALLBACK_SCORE,
            accuracy: AccuracyTier::Medium,
            feedback: "Good effort! Keep practicing to build confidence.".to_string(),
            improvements: Vec::new(),
            tips: "Speak slowly and clearly, pausing between phrases.".to_string(),
        }
    }

    /// Fixed zero-score feedback for an attempt that could not be transcribed
    pub fn transcription_failed() -> Self {
        Self {
            score: 0,
            accuracy: AccuracyTier::Unknown,
            feedback: TRANSCRIPTION_FAILED_TEXT.to_string(),
            improvements: Vec::new(),
            tips: "Speak clearly and close to the microphone, in a quiet place.".to_string(),
        }
    }
}

/// One recorded practice attempt. Append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PracticeResult {
    #[serde(default = "Uuid::new_v4")]
    pub id: ResultId,
    pub text: String,
    pub score: u8,
    pub difficulty: PracticeDifficulty,
    #[serde(default)]
    pub mode: PracticeMode,
    pub timestamp: DateTime<Utc>,
}

impl PracticeResult {
    pub fn new(
        text: impl Into<String>,
        score: u8,
        difficulty: PracticeDifficulty,
        mode: PracticeMode,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            text: text.into(),
            score: score.min(100),
            difficulty,
            mode,
            timestamp: Utc::now(),
        }
    }
}

/// Outcome of answering a listening question
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerOutcome {
    pub selected_index: usize,
    pub correct_index: usize,
    pub is_correct: bool,
}

impl AnswerOutcome {
    /// Score recorded for the answer: all or nothing
    pub fn score(&self) -> u8 {
        if self.is_correct { 100 } else { 0 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_word_ranges_grow_with_difficulty() {
        assert_eq!(PracticeDifficulty::Beginner.word_range(), (3, 8));
        assert_eq!(PracticeDifficulty::Intermediate.word_range(), (8, 15));
        assert_eq!(PracticeDifficulty::Advanced.word_range(), (15, 25));
    }

    #[test]
    fn test_accuracy_tier_from_label() {
        assert_eq!(AccuracyTier::from_label("High"), AccuracyTier::High);
        assert_eq!(AccuracyTier::from_label(" medium "), AccuracyTier::Medium);
        assert_eq!(AccuracyTier::from_label("excellent"), AccuracyTier::Unknown);
    }

    #[test]
    fn test_fallback_feedback_is_exact() {
        let feedback = PronunciationFeedback::fallback();
        assert_eq!(feedback.score, 70);
        assert_eq!(feedback.accuracy, AccuracyTier::Medium);
        assert!(feedback.improvements.is_empty());
    }

    #[test]
    fn test_result_score_is_clamped() {
        let result = PracticeResult::new(
            "Amen",
            250,
            PracticeDifficulty::Beginner,
            PracticeMode::Speaking,
        );
        assert_eq!(result.score, 100);
    }

    #[test]
    fn test_legacy_result_without_id_or_mode() {
        let json = r#"{"text":"Amen","score":90,"difficulty":"beginner","timestamp":"2024-01-01T00:00:00Z"}"#;
        let result: PracticeResult = serde_json::from_str(json).unwrap();
        assert_eq!(result.mode, PracticeMode::Speaking);
        assert_eq!(result.score, 90);
    }
}
