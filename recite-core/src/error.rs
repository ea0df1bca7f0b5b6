//! Error types for Recite

use thiserror::Error;

/// Result type alias using Recite's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// All possible errors in Recite
#[derive(Error, Debug)]
pub enum Error {
    #[error("API credential not configured: {0}")]
    MissingCredential(String),

    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("Transport failure: {0}")]
    TransportFailure(String),

    #[error("Unexpected response: HTTP {status} - {body}")]
    UnexpectedResponse { status: u16, body: String },

    #[error("Transcription failed: HTTP {status} - {body}")]
    TranscriptionFailure { status: u16, body: String },

    #[error("Speech synthesis failed: HTTP {status} - {body}")]
    SynthesisFailure { status: u16, body: String },

    #[error("Speech synthesis returned an empty audio payload")]
    EmptyAudioPayload,

    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    #[error("Audio device unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("Audio error: {0}")]
    Audio(String),

    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Practice session has ended")]
    SessionClosed,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Machine-checkable category of an [`Error`], independent of its message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    MissingCredential,
    InvalidEndpoint,
    TransportFailure,
    UnexpectedResponse,
    TranscriptionFailure,
    SynthesisFailure,
    EmptyAudioPayload,
    MalformedPayload,
    DeviceUnavailable,
    Audio,
    Storage,
    Config,
    SessionClosed,
    Io,
}

impl Error {
    /// The category of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MissingCredential(_) => ErrorKind::MissingCredential,
            Self::InvalidEndpoint(_) => ErrorKind::InvalidEndpoint,
            Self::TransportFailure(_) => ErrorKind::TransportFailure,
            Self::UnexpectedResponse { .. } => ErrorKind::UnexpectedResponse,
            Self::TranscriptionFailure { .. } => ErrorKind::TranscriptionFailure,
            Self::SynthesisFailure { .. } => ErrorKind::SynthesisFailure,
            Self::EmptyAudioPayload => ErrorKind::EmptyAudioPayload,
            Self::MalformedPayload(_) | Self::Serialization(_) => ErrorKind::MalformedPayload,
            Self::DeviceUnavailable(_) => ErrorKind::DeviceUnavailable,
            Self::Audio(_) => ErrorKind::Audio,
            Self::Storage(_) => ErrorKind::Storage,
            Self::Config(_) => ErrorKind::Config,
            Self::SessionClosed => ErrorKind::SessionClosed,
            Self::Io(_) => ErrorKind::Io,
        }
    }

    /// Short message suitable for showing to the learner.
    ///
    /// Provider failures are collapsed into one generic line; only device
    /// problems are actionable by the user.
    pub fn user_message(&self) -> String {
        match self {
            Self::DeviceUnavailable(_) => {
                "Microphone unavailable. Check permissions and try again.".to_string()
            }
            Self::MissingCredential(_) => "AI features are not configured.".to_string(),
            _ => "Something went wrong. Please try again.".to_string(),
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Error::TransportFailure(format!("request timed out: {err}"))
        } else if err.is_builder() {
            Error::InvalidEndpoint(err.to_string())
        } else {
            Error::TransportFailure(err.to_string())
        }
    }
}
