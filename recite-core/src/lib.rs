//! Recite - AI-orchestrated prayer recitation practice
//!
//! Generates practice material, drives microphone capture and speech
//! playback, scores spoken attempts through a generative-AI provider with
//! local fallbacks at every step, and keeps a persistent practice history.

pub mod audio;
pub mod config;
pub mod content;
pub mod error;
pub mod gateway;
pub mod history;
pub mod parsing;
pub mod scoring;
pub mod session;
pub mod storage;
pub mod types;

pub use error::{Error, ErrorKind, Result};
pub use types::*;

/// Re-export the main engine components for convenience
pub use audio::{AudioBackend, AudioPipeline, DeviceAudio, FallbackVoice, SystemVoice};
pub use config::{GatewayConfig, SessionConfig};
pub use content::{ContentGenerator, ContentRequest};
pub use gateway::{AiGateway, OpenAIGateway};
pub use history::{HistoryStore, PracticeStats};
pub use scoring::ScoringEvaluator;
pub use session::{PracticeSessionEngine, SessionCommand, SessionHandle, SessionPhase, SessionState};
pub use storage::Storage;
