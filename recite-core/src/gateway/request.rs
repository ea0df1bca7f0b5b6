//! Request types for the gateway capabilities

use crate::AudioData;

/// Request for a chat completion
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub system_prompt: String,
    pub user_message: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl CompletionRequest {
    pub fn new(system_prompt: impl Into<String>, user_message: impl Into<String>) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            user_message: user_message.into(),
            temperature: 0.7,
            max_tokens: 1000,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature.clamp(0.0, 2.0);
        self
    }

    pub fn with_max_tokens(mut self, max: u32) -> Self {
        self.max_tokens = max;
        self
    }
}

/// Request for transcription
#[derive(Debug, Clone)]
pub struct TranscriptionRequest {
    /// WAV-encoded audio
    pub audio: AudioData,
    /// Optional language hint (ISO 639-1 code, e.g., "en")
    pub language: Option<String>,
}

impl TranscriptionRequest {
    pub fn new(audio: AudioData) -> Self {
        Self {
            audio,
            language: None,
        }
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        let language = language.into();
        // an empty hint is the same as no hint
        self.language = (!language.trim().is_empty()).then_some(language);
        self
    }
}

/// Request for speech synthesis
#[derive(Debug, Clone)]
pub struct SpeechRequest {
    pub text: String,
    pub voice: String,
    pub speed: f32,
}

impl SpeechRequest {
    /// Provider-accepted playback speed range
    pub const MIN_SPEED: f32 = 0.25;
    pub const MAX_SPEED: f32 = 4.0;

    pub fn new(text: impl Into<String>, voice: impl Into<String>, speed: f32) -> Self {
        Self {
            text: text.into(),
            voice: voice.into(),
            speed: speed.clamp(Self::MIN_SPEED, Self::MAX_SPEED),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_speech_speed_is_clamped() {
        assert_eq!(SpeechRequest::new("a", "alloy", 10.0).speed, 4.0);
        assert_eq!(SpeechRequest::new("a", "alloy", 0.0).speed, 0.25);
        assert_eq!(SpeechRequest::new("a", "alloy", 0.8).speed, 0.8);
    }

    #[test]
    fn test_blank_language_hint_is_dropped() {
        let request = TranscriptionRequest::new(vec![1, 2]).with_language("");
        assert!(request.language.is_none());

        let request = TranscriptionRequest::new(vec![1, 2]).with_language("ar");
        assert_eq!(request.language.as_deref(), Some("ar"));
    }
}
