//! Decoders for JSON the language model returns inside chat messages
//!
//! Model output is untrusted: it may be fenced in Markdown, wrapped in an
//! object, or missing fields. Each payload type has exactly one decoder here
//! so the defaults callers fall back to are declared once.

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::types::{
    AccuracyTier, ListeningItem, PracticeDifficulty, PronunciationFeedback, SpeakingItem,
};

/// Minimum number of options a listening question must offer
const MIN_OPTIONS: usize = 2;

/// Trim Markdown code fences and surrounding prose from a model reply
pub fn extract_json(raw: &str) -> &str {
    let mut text = raw.trim();

    if let Some(rest) = text.strip_prefix("```") {
        // drop the info string ("json") on the opening fence line
        text = rest.split_once('\n').map(|(_, body)| body).unwrap_or("");
        text = text.trim_end().trim_end_matches("```").trim();
    }

    let start = text.find(['[', '{']);
    let end = text.rfind([']', '}']);
    match (start, end) {
        (Some(start), Some(end)) if end >= start => &text[start..=end],
        _ => text,
    }
}

/// Parse the reply into a list, accepting `[...]` or `{"anything": [...]}`
fn decode_list(raw: &str) -> Result<Vec<Value>> {
    let value: Value = serde_json::from_str(extract_json(raw))
        .map_err(|e| Error::MalformedPayload(format!("not JSON: {e}")))?;

    match value {
        Value::Array(items) => Ok(items),
        Value::Object(map) => map
            .into_iter()
            .find_map(|(_, v)| match v {
                Value::Array(items) => Some(items),
                _ => None,
            })
            .ok_or_else(|| Error::MalformedPayload("object contains no list".to_string())),
        _ => Err(Error::MalformedPayload("expected a JSON list".to_string())),
    }
}

#[derive(Debug, Deserialize)]
struct SpeakingWire {
    #[serde(alias = "phrase")]
    text: String,
    #[serde(default)]
    translation: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ListeningWire {
    #[serde(alias = "prayer", alias = "prayerText", alias = "passage")]
    prayer_text: String,
    question: String,
    options: Vec<String>,
    #[serde(alias = "correctAnswerIndex", alias = "correct_answer_index", alias = "answer")]
    correct_index: usize,
}

/// Decode speaking phrases, dropping entries that are blank or malformed.
///
/// Fails only when no usable item remains.
pub fn decode_speaking_items(
    raw: &str,
    difficulty: PracticeDifficulty,
) -> Result<Vec<SpeakingItem>> {
    let items: Vec<SpeakingItem> = decode_list(raw)?
        .into_iter()
        .filter_map(|value| serde_json::from_value::<SpeakingWire>(value).ok())
        .filter(|wire| !wire.text.trim().is_empty())
        .map(|wire| SpeakingItem {
            text: wire.text.trim().to_string(),
            translation: wire
                .translation
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty()),
            difficulty,
        })
        .collect();

    if items.is_empty() {
        return Err(Error::MalformedPayload("no usable phrases".to_string()));
    }
    Ok(items)
}

/// Decode listening questions, dropping any whose answer key is inconsistent
pub fn decode_listening_items(raw: &str) -> Result<Vec<ListeningItem>> {
    let items: Vec<ListeningItem> = decode_list(raw)?
        .into_iter()
        .filter_map(|value| serde_json::from_value::<ListeningWire>(value).ok())
        .filter(|wire| {
            let valid = !wire.prayer_text.trim().is_empty()
                && !wire.question.trim().is_empty()
                && wire.options.len() >= MIN_OPTIONS
                && wire.correct_index < wire.options.len();
            if !valid {
                debug!("Dropping invalid listening item: {:?}", wire.question);
            }
            valid
        })
        .map(|wire| ListeningItem {
            prayer_text: wire.prayer_text.trim().to_string(),
            question: wire.question.trim().to_string(),
            options: wire.options,
            correct_index: wire.correct_index,
        })
        .collect();

    if items.is_empty() {
        return Err(Error::MalformedPayload("no usable questions".to_string()));
    }
    Ok(items)
}

#[derive(Debug, Deserialize)]
struct FeedbackWire {
    score: Value,
    #[serde(default)]
    accuracy: String,
    #[serde(default)]
    feedback: String,
    #[serde(default)]
    improvements: Vec<String>,
    #[serde(default)]
    tips: String,
}

/// Coerce a JSON number (or numeric string) into 0..=100
fn clamp_score(value: &Value) -> Option<u8> {
    let score = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().trim_end_matches('%').parse::<f64>().ok()?,
        _ => return None,
    };
    if !score.is_finite() {
        return None;
    }
    Some(score.round().clamp(0.0, 100.0) as u8)
}

/// Decode a grading reply into feedback
pub fn decode_feedback(raw: &str) -> Result<PronunciationFeedback> {
    let wire: FeedbackWire = serde_json::from_str(extract_json(raw))
        .map_err(|e| Error::MalformedPayload(format!("feedback: {e}")))?;

    let score = clamp_score(&wire.score)
        .ok_or_else(|| Error::MalformedPayload(format!("bad score: {}", wire.score)))?;

    let accuracy = match AccuracyTier::from_label(&wire.accuracy) {
        AccuracyTier::Unknown => AccuracyTier::from_score(score),
        tier => tier,
    };

    Ok(PronunciationFeedback {
        score,
        accuracy,
        feedback: wire.feedback.trim().to_string(),
        improvements: wire
            .improvements
            .into_iter()
            .map(|w| w.trim().to_string())
            .filter(|w| !w.is_empty())
            .collect(),
        tips: wire.tips.trim().to_string(),
    })
}

/// Decode a grading reply, or the fixed fallback if it cannot be read
pub fn feedback_or_default(raw: &str) -> PronunciationFeedback {
    decode_feedback(raw).unwrap_or_else(|e| {
        warn!("Grading reply unreadable ({}), using default feedback", e);
        PronunciationFeedback::fallback()
    })
}
