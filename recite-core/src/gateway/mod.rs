//! AI gateway: the only place that talks to generative-AI providers
//!
//! Three independent capabilities sit behind one trait so the rest of the
//! crate can be driven by an in-process fake in tests.
mod openai;
mod request;

use async_trait::async_trait;

use crate::AudioData;
use crate::error::Result;

pub use openai::OpenAIGateway;
pub use request::{CompletionRequest, SpeechRequest, TranscriptionRequest};

/// Uniform access to text generation, speech-to-text and text-to-speech.
///
/// Every call either returns a complete payload or a typed error; nothing is
/// retried internally. Callers decide on their own fallback.
#[async_trait]
pub trait AiGateway: Send + Sync {
    /// Get the provider name
    fn name(&self) -> &'static str;

    /// Generate a chat completion and return the assistant message text
    async fn generate_text(&self, request: CompletionRequest) -> Result<String>;

    /// Transcribe WAV audio to text
    async fn transcribe_audio(&self, request: TranscriptionRequest) -> Result<String>;

    /// Synthesize speech; returns a WAV container
    async fn synthesize_speech(&self, request: SpeechRequest) -> Result<AudioData>;

    /// Check if a credential is present
    fn is_configured(&self) -> bool;
}
