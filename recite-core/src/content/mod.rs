//! Practice content generation with built-in fallback banks
//!
//! Generation never blocks practice: any gateway or parsing failure is logged
//! and replaced by a fixed bank for the requested language.
pub mod fallback;

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::SessionConfig;
use crate::error::Result;
use crate::gateway::{AiGateway, CompletionRequest};
use crate::parsing::{decode_listening_items, decode_speaking_items};
use crate::types::{PracticeDifficulty, PracticeItem, PracticeMode};

const GENERATION_TEMPERATURE: f32 = 0.8;
const GENERATION_MAX_TOKENS: u32 = 1500;
const LISTENING_OPTION_COUNT: usize = 4;

/// What to generate
#[derive(Debug, Clone, PartialEq)]
pub struct ContentRequest {
    pub mode: PracticeMode,
    pub tradition: String,
    pub language: String,
    pub difficulty: PracticeDifficulty,
    pub count: usize,
}

impl From<&SessionConfig> for ContentRequest {
    fn from(config: &SessionConfig) -> Self {
        Self {
            mode: config.mode,
            tradition: config.tradition.clone(),
            language: config.language.clone(),
            difficulty: config.difficulty,
            count: config.item_count,
        }
    }
}

/// Reduce a locale such as "ES-mx" or "pt_BR" to its language code
pub fn normalize_language(code: &str) -> String {
    code.trim()
        .split(['-', '_'])
        .next()
        .unwrap_or_default()
        .to_lowercase()
}

/// English name of a language code for use in prompts
pub fn language_name(code: &str) -> String {
    let name = match normalize_language(code).as_str() {
        "en" => "English",
        "es" => "Spanish",
        "fr" => "French",
        "ar" => "Arabic",
        "de" => "German",
        "it" => "Italian",
        "pt" => "Portuguese",
        "la" => "Latin",
        "he" => "Hebrew",
        "el" => "Greek",
        "pl" => "Polish",
        "tl" => "Tagalog",
        "ur" => "Urdu",
        "hi" => "Hindi",
        "id" => "Indonesian",
        "tr" => "Turkish",
        _ => return code.trim().to_string(),
    };
    name.to_string()
}

/// Produces practice items for a session
#[derive(Clone)]
pub struct ContentGenerator {
    gateway: Arc<dyn AiGateway>,
}

impl ContentGenerator {
    pub fn new(gateway: Arc<dyn AiGateway>) -> Self {
        Self { gateway }
    }

    /// Generate items for `request`. Never fails and never returns an empty list.
    pub async fn generate(&self, request: &ContentRequest) -> Vec<PracticeItem> {
        let count = request.count.max(1);

        match self.try_generate(request).await {
            Ok(mut items) => {
                items.truncate(count);
                info!(
                    "Generated {} {:?} items for {}",
                    items.len(),
                    request.mode,
                    request.language
                );
                items
            }
            Err(e) => {
                warn!(
                    "Content generation failed ({}), using fallback bank for {}",
                    e, request.language
                );
                let mut items = Self::fallback(request);
                items.truncate(count);
                items
            }
        }
    }

    /// Built-in items for `request`, defaulting to English
    pub fn fallback(request: &ContentRequest) -> Vec<PracticeItem> {
        let language = normalize_language(&request.language);
        if !fallback::has_speaking_bank(&language) {
            debug!("No built-in bank for {:?}, using English", language);
        }
        match request.mode {
            PracticeMode::Speaking => fallback::speaking_bank(&language, request.difficulty)
                .into_iter()
                .map(PracticeItem::Speaking)
                .collect(),
            PracticeMode::Listening => fallback::listening_bank(&language)
                .into_iter()
                .map(PracticeItem::Listening)
                .collect(),
        }
    }

    async fn try_generate(&self, request: &ContentRequest) -> Result<Vec<PracticeItem>> {
        let completion = CompletionRequest::new(system_prompt(request.mode), user_prompt(request))
            .with_temperature(GENERATION_TEMPERATURE)
            .with_max_tokens(GENERATION_MAX_TOKENS);

        let reply = self.gateway.generate_text(completion).await?;
        debug!("Generation reply: {} chars", reply.len());

        let items = match request.mode {
            PracticeMode::Speaking => decode_speaking_items(&reply, request.difficulty)?
                .into_iter()
                .map(PracticeItem::Speaking)
                .collect(),
            PracticeMode::Listening => decode_listening_items(&reply)?
                .into_iter()
                .map(PracticeItem::Listening)
                .collect(),
        };
        Ok(items)
    }
}

fn system_prompt(mode: PracticeMode) -> &'static str {
    match mode {
        PracticeMode::Speaking => {
            "You are a patient tutor helping people practice reciting prayers aloud. \
             Use authentic, widely known prayer texts. Respond with JSON only, no commentary."
        }
        PracticeMode::Listening => {
            "You are a patient tutor writing listening comprehension exercises about prayers. \
             Use authentic, widely known prayer texts. Respond with JSON only, no commentary."
        }
    }
}

fn user_prompt(request: &ContentRequest) -> String {
    let (min_words, max_words) = request.difficulty.word_range();
    let language = language_name(&request.language);
    let count = request.count.max(1);

    match request.mode {
        PracticeMode::Speaking => format!(
            "Generate {count} phrases from {tradition} prayers in {language} for a {level} learner. \
             Each phrase must be {min_words}-{max_words} words long. \
             Return a JSON array of objects with keys \"text\" (the phrase in {language}) \
             and \"translation\" (an English translation).",
            tradition = request.tradition,
            level = request.difficulty.label(),
        ),
        PracticeMode::Listening => format!(
            "Generate {count} listening exercises based on {tradition} prayers in {language} \
             for a {level} learner. Each prayer passage must be {min_words}-{max_words} words long. \
             For each passage write one question in {language} with {LISTENING_OPTION_COUNT} \
             answer options, exactly one of them correct. Return a JSON array of objects with keys \
             \"prayer\", \"question\", \"options\" (array of strings) and \"correct_index\" (0-based).",
            tradition = request.tradition,
            level = request.difficulty.label(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::AudioData;
    use crate::error::Error;
    use crate::gateway::{SpeechRequest, TranscriptionRequest};
    use async_trait::async_trait;

    /// Gateway whose completions always return the same reply
    struct ReplyGateway(&'static str);

    #[async_trait]
    impl AiGateway for ReplyGateway {
        fn name(&self) -> &'static str {
            "Reply"
        }

        async fn generate_text(&self, _request: CompletionRequest) -> Result<String> {
            Ok(self.0.to_string())
        }

        async fn transcribe_audio(&self, _request: TranscriptionRequest) -> Result<String> {
            Err(Error::TransportFailure("unused".to_string()))
        }

        async fn synthesize_speech(&self, _request: SpeechRequest) -> Result<AudioData> {
            Err(Error::TransportFailure("unused".to_string()))
        }

        fn is_configured(&self) -> bool {
            true
        }
    }

    fn request(mode: PracticeMode, difficulty: PracticeDifficulty) -> ContentRequest {
        ContentRequest {
            mode,
            tradition: "Catholic".to_string(),
            language: "es".to_string(),
            difficulty,
            count: 3,
        }
    }

    #[test]
    fn test_normalize_language() {
        assert_eq!(normalize_language("ES-mx"), "es");
        assert_eq!(normalize_language("pt_BR"), "pt");
        assert_eq!(normalize_language(" en "), "en");
    }

    #[test]
    fn test_language_name() {
        assert_eq!(language_name("ar"), "Arabic");
        assert_eq!(language_name("fr-CA"), "French");
        assert_eq!(language_name("sw"), "sw");
    }

    #[test]
    fn test_speaking_prompt_carries_word_band() {
        let prompt = user_prompt(&request(
            PracticeMode::Speaking,
            PracticeDifficulty::Intermediate,
        ));
        assert!(prompt.contains("8-15 words"));
        assert!(prompt.contains("Spanish"));
        assert!(prompt.contains("Catholic"));
        assert!(prompt.contains("Generate 3"));
    }

    #[test]
    fn test_listening_prompt_asks_for_answer_key() {
        let prompt = user_prompt(&request(PracticeMode::Listening, PracticeDifficulty::Advanced));
        assert!(prompt.contains("15-25 words"));
        assert!(prompt.contains("correct_index"));
    }

    #[test]
    fn test_fallback_matches_mode() {
        let items = ContentGenerator::fallback(&request(
            PracticeMode::Listening,
            PracticeDifficulty::Beginner,
        ));
        assert!(!items.is_empty());
        assert!(items.iter().all(|i| i.mode() == PracticeMode::Listening));
    }

    #[tokio::test]
    async fn test_unparseable_reply_uses_english_bank() {
        let generator = ContentGenerator::new(Arc::new(ReplyGateway("sorry, I can't")));
        let mut request = request(PracticeMode::Speaking, PracticeDifficulty::Beginner);
        request.language = "en".to_string();

        let items = generator.generate(&request).await;
        let expected: Vec<PracticeItem> =
            fallback::speaking_bank("en", PracticeDifficulty::Beginner)
                .into_iter()
                .take(3)
                .map(PracticeItem::Speaking)
                .collect();

        assert!(!items.is_empty());
        assert_eq!(items, expected);
    }

    #[tokio::test]
    async fn test_invalid_listening_items_use_english_bank() {
        let generator = ContentGenerator::new(Arc::new(ReplyGateway(
            r#"[{"prayer":"x","question":"y","options":["a"],"correct_index":3}]"#,
        )));
        let mut request = request(PracticeMode::Listening, PracticeDifficulty::Beginner);
        request.language = "en".to_string();

        let items = generator.generate(&request).await;
        let expected: Vec<PracticeItem> = fallback::listening_bank("en")
            .into_iter()
            .take(3)
            .map(PracticeItem::Listening)
            .collect();

        assert!(!items.is_empty());
        assert_eq!(items, expected);
    }
}
