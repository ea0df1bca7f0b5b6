//! OpenAI-compatible gateway: chat completions, Whisper transcription and speech

use async_trait::async_trait;
use reqwest::{Client, Response, Url};
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::AudioData;
use crate::config::GatewayConfig;
use crate::error::{Error, Result};

use super::{AiGateway, CompletionRequest, SpeechRequest, TranscriptionRequest};

/// Gateway backed by an OpenAI-compatible HTTP API
pub struct OpenAIGateway {
    client: Client,
    config: GatewayConfig,
}

impl OpenAIGateway {
    /// Create a gateway; every request inherits the configured timeout
    pub fn new(config: GatewayConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self { client, config })
    }

    /// Create a gateway from environment variables
    pub fn from_env() -> Result<Self> {
        Self::new(GatewayConfig::from_env())
    }

    fn api_key(&self) -> Result<&str> {
        self.config
            .api_key
            .as_deref()
            .ok_or_else(|| Error::MissingCredential("OpenAI API key not set".to_string()))
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        let raw = format!("{}/", self.config.api_base.trim_end_matches('/'));
        let base = Url::parse(&raw)
            .map_err(|e| Error::InvalidEndpoint(format!("{}: {e}", self.config.api_base)))?;

        if !matches!(base.scheme(), "http" | "https") {
            return Err(Error::InvalidEndpoint(format!(
                "unsupported scheme in {}",
                self.config.api_base
            )));
        }

        base.join(path)
            .map_err(|e| Error::InvalidEndpoint(format!("{path}: {e}")))
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessageResponse,
}

#[derive(Debug, Deserialize)]
struct ChatMessageResponse {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WhisperResponse {
    text: String,
}

#[derive(Debug, Serialize)]
struct SpeechBody<'a> {
    model: &'a str,
    input: &'a str,
    voice: &'a str,
    speed: f32,
    response_format: &'static str,
}

/// Extract the first choice's message content from a chat completion body
fn decode_chat_completion(body: &[u8]) -> Result<String> {
    let response: ChatResponse = serde_json::from_slice(body)
        .map_err(|e| Error::MalformedPayload(format!("chat completion: {e}")))?;

    response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .ok_or_else(|| Error::MalformedPayload("No completion returned".to_string()))
}

fn decode_transcription(body: &[u8]) -> Result<String> {
    let response: WhisperResponse = serde_json::from_slice(body)
        .map_err(|e| Error::MalformedPayload(format!("transcription: {e}")))?;
    Ok(response.text)
}

/// Read an error body for logging without failing the caller a second time
async fn error_body(response: Response) -> String {
    response.text().await.unwrap_or_default()
}

#[async_trait]
impl AiGateway for OpenAIGateway {
    fn name(&self) -> &'static str {
        "OpenAI"
    }

    async fn generate_text(&self, request: CompletionRequest) -> Result<String> {
        let api_key = self.api_key()?;
        let url = self.endpoint("chat/completions")?;

        let chat_request = ChatRequest {
            model: &self.config.chat_model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &request.system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: &request.user_message,
                },
            ],
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        };

        debug!(
            "Sending completion request (temperature {}, max_tokens {})",
            request.temperature, request.max_tokens
        );

        let response = self
            .client
            .post(url)
            .header("Authorization", format!("Bearer {}", api_key))
            .json(&chat_request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = error_body(response).await;
            error!("Completion API error: {} - {}", status, body);
            return Err(Error::UnexpectedResponse {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.bytes().await?;
        decode_chat_completion(&body)
    }

    async fn transcribe_audio(&self, request: TranscriptionRequest) -> Result<String> {
        let api_key = self.api_key()?;
        let url = self.endpoint("audio/transcriptions")?;

        let file_part = reqwest::multipart::Part::bytes(request.audio)
            .file_name("audio.wav")
            .mime_str("audio/wav")
            .map_err(|e| Error::MalformedPayload(format!("Failed to create form part: {e}")))?;

        let mut form = reqwest::multipart::Form::new()
            .part("file", file_part)
            .text("model", self.config.transcription_model.clone())
            .text("response_format", "json");

        if let Some(lang) = request.language {
            form = form.text("language", lang);
        }

        debug!("Sending transcription request");

        let response = self
            .client
            .post(url)
            .header("Authorization", format!("Bearer {}", api_key))
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = error_body(response).await;
            error!("Transcription API error: {} - {}", status, body);
            return Err(Error::TranscriptionFailure {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.bytes().await?;
        decode_transcription(&body)
    }

    async fn synthesize_speech(&self, request: SpeechRequest) -> Result<AudioData> {
        let api_key = self.api_key()?;
        let url = self.endpoint("audio/speech")?;

        let speech = SpeechBody {
            model: &self.config.speech_model,
            input: &request.text,
            voice: &request.voice,
            speed: request.speed,
            response_format: "wav",
        };

        debug!(
            "Sending speech request ({} chars, voice {}, speed {})",
            request.text.len(),
            request.voice,
            request.speed
        );

        let response = self
            .client
            .post(url)
            .header("Authorization", format!("Bearer {}", api_key))
            .json(&speech)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = error_body(response).await;
            error!("Speech API error: {} - {}", status, body);
            return Err(Error::SynthesisFailure {
                status: status.as_u16(),
                body,
            });
        }

        let audio = response.bytes().await?;
        if audio.is_empty() {
            return Err(Error::EmptyAudioPayload);
        }

        Ok(audio.to_vec())
    }

    fn is_configured(&self) -> bool {
        self.config.api_key.is_some()
    }
}
