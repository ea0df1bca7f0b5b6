//! Pronunciation scoring via the text-generation capability

use std::sync::Arc;

use tracing::{debug, warn};

use crate::content::language_name;
use crate::gateway::{AiGateway, CompletionRequest};
use crate::parsing::feedback_or_default;
use crate::types::PronunciationFeedback;

/// Low temperature keeps grading close to deterministic
const SCORING_TEMPERATURE: f32 = 0.3;
const SCORING_MAX_TOKENS: u32 = 500;

const SCORING_SYSTEM_PROMPT: &str = "You are a kind, precise pronunciation coach for people \
    learning to recite prayers. Compare what the learner said with the reference text and \
    respond with JSON only, exactly in this shape: \
    {\"score\": <integer 0-100>, \"accuracy\": \"high\" | \"medium\" | \"low\", \
    \"feedback\": <one or two encouraging sentences>, \
    \"improvements\": [<words that need work>], \"tips\": <one practical tip>}";

/// Turns (reference, transcript) pairs into structured feedback
#[derive(Clone)]
pub struct ScoringEvaluator {
    gateway: Arc<dyn AiGateway>,
}

impl ScoringEvaluator {
    pub fn new(gateway: Arc<dyn AiGateway>) -> Self {
        Self { gateway }
    }

    /// Score a transcript against the reference text.
    ///
    /// Never fails: gateway errors and unreadable replies both yield
    /// [`PronunciationFeedback::fallback`].
    pub async fn evaluate(
        &self,
        reference: &str,
        transcript: &str,
        language: &str,
    ) -> PronunciationFeedback {
        let request = CompletionRequest::new(
            SCORING_SYSTEM_PROMPT,
            build_scoring_prompt(reference, transcript, language),
        )
        .with_temperature(SCORING_TEMPERATURE)
        .with_max_tokens(SCORING_MAX_TOKENS);

        let reply = match self.gateway.generate_text(request).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!("Scoring request failed ({}), using default feedback", e);
                return PronunciationFeedback::fallback();
            }
        };

        let feedback = feedback_or_default(&reply);
        debug!("Scored attempt: {} ({:?})", feedback.score, feedback.accuracy);
        feedback
    }
}

fn build_scoring_prompt(reference: &str, transcript: &str, language: &str) -> String {
    format!(
        "Language: {}\nReference text: \"{}\"\nWhat the learner said: \"{}\"\n\
         Score how closely the learner's recitation matches the reference.",
        language_name(language),
        reference.trim(),
        transcript.trim()
    )
}
