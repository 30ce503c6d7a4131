//! Generative AI and speech-to-text seams.

pub mod gemini;
pub mod prompts;

use async_trait::async_trait;

pub use gemini::{GeminiClient, GeminiError};

/// Text generation.
#[async_trait]
pub trait TextModel: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, GeminiError>;
}

/// Errors from audio transcription.
#[derive(Debug, thiserror::Error)]
pub enum TranscribeError {
    #[error("audio conversion failed: {0}")]
    Convert(String),
    #[error("speech model error: {0}")]
    Model(String),
    #[error(transparent)]
    Remote(#[from] GeminiError),
    #[error("no speech recognized")]
    Empty,
}

/// Speech-to-text for Telegram voice notes (OGG Opus).
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, audio: &[u8], mime_type: &str) -> Result<String, TranscribeError>;
}
