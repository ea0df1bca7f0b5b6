//! Runtime configuration loaded from the process environment

use std::path::PathBuf;
use std::time::Duration;

use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::types::{PracticeDifficulty, PracticeMode};

pub const ENV_API_KEY: &str = "OPENAI_API_KEY";
pub const ENV_API_BASE: &str = "RECITE_API_BASE";
pub const ENV_CHAT_MODEL: &str = "RECITE_CHAT_MODEL";
pub const ENV_TRANSCRIPTION_MODEL: &str = "RECITE_TRANSCRIPTION_MODEL";
pub const ENV_SPEECH_MODEL: &str = "RECITE_SPEECH_MODEL";
pub const ENV_REQUEST_TIMEOUT_SECS: &str = "RECITE_REQUEST_TIMEOUT_SECS";

const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";
const DEFAULT_CHAT_MODEL: &str = "gpt-4o-mini";
const DEFAULT_TRANSCRIPTION_MODEL: &str = "whisper-1";
const DEFAULT_SPEECH_MODEL: &str = "tts-1";
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Settings for the AI gateway
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub api_key: Option<String>,
    pub api_base: String,
    pub chat_model: String,
    pub transcription_model: String,
    pub speech_model: String,
    /// Applied to every outbound request
    pub request_timeout: Duration,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_base: DEFAULT_API_BASE.to_string(),
            chat_model: DEFAULT_CHAT_MODEL.to_string(),
            transcription_model: DEFAULT_TRANSCRIPTION_MODEL.to_string(),
            speech_model: DEFAULT_SPEECH_MODEL.to_string(),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }
}

impl GatewayConfig {
    /// Read configuration from environment variables, falling back to defaults
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup (used by tests)
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let request_timeout = match non_empty(ENV_REQUEST_TIMEOUT_SECS) {
            Some(raw) => match raw.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => Duration::from_secs(secs),
                _ => {
                    warn!(
                        "Ignoring invalid {}={:?}, using {}s",
                        ENV_REQUEST_TIMEOUT_SECS, raw, DEFAULT_REQUEST_TIMEOUT_SECS
                    );
                    defaults.request_timeout
                }
            },
            None => defaults.request_timeout,
        };

        let config = Self {
            api_key: non_empty(ENV_API_KEY),
            api_base: non_empty(ENV_API_BASE).unwrap_or(defaults.api_base),
            chat_model: non_empty(ENV_CHAT_MODEL).unwrap_or(defaults.chat_model),
            transcription_model: non_empty(ENV_TRANSCRIPTION_MODEL)
                .unwrap_or(defaults.transcription_model),
            speech_model: non_empty(ENV_SPEECH_MODEL).unwrap_or(defaults.speech_model),
            request_timeout,
        };

        info!(
            "Gateway config: base={} chat={} key={}",
            config.api_base,
            config.chat_model,
            if config.api_key.is_some() { "SET" } else { "NONE" }
        );

        config
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

/// Parameters of one practice session
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub mode: PracticeMode,
    pub tradition: String,
    /// ISO 639-1 language code, e.g. "en"
    pub language: String,
    pub difficulty: PracticeDifficulty,
    pub item_count: usize,
    pub voice: String,
    /// Overrides the difficulty's default speech speed
    pub speed: Option<f32>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            mode: PracticeMode::Speaking,
            tradition: "Christian".to_string(),
            language: "en".to_string(),
            difficulty: PracticeDifficulty::Beginner,
            item_count: 5,
            voice: "alloy".to_string(),
            speed: None,
        }
    }
}

impl SessionConfig {
    pub fn new(mode: PracticeMode) -> Self {
        Self {
            mode,
            ..Default::default()
        }
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    pub fn with_tradition(mut self, tradition: impl Into<String>) -> Self {
        self.tradition = tradition.into();
        self
    }

    pub fn with_difficulty(mut self, difficulty: PracticeDifficulty) -> Self {
        self.difficulty = difficulty;
        self
    }

    pub fn with_item_count(mut self, count: usize) -> Self {
        self.item_count = count.max(1);
        self
    }

    /// Speech speed to request for synthesized playback
    pub fn speech_speed(&self) -> f32 {
        self.speed
            .unwrap_or_else(|| self.difficulty.default_speech_speed())
    }
}

/// Directory holding the database and the capture file
pub fn default_data_dir() -> Result<PathBuf> {
    let base = dirs::data_dir()
        .ok_or_else(|| Error::Config("could not determine data directory".to_string()))?;
    Ok(base.join("recite"))
}

/// SQLite database file inside `data_dir`
pub fn database_path(data_dir: &std::path::Path) -> PathBuf {
    data_dir.join("recite.db")
}

/// Fixed capture location; each new recording overwrites it
pub fn capture_path(data_dir: &std::path::Path) -> PathBuf {
    data_dir.join("capture.wav")
}
