//! Gemini API client for text generation and audio transcription.

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{TextModel, TranscribeError, Transcriber};

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

const TRANSCRIBE_PROMPT: &str = "Transcribe this voice message exactly as spoken. \
Return only the transcription text, with no commentary.";

#[derive(Debug, thiserror::Error)]
pub enum GeminiError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("API error {status}: {body}")]
    Api { status: u16, body: String },
    #[error("Gemini error: {0}")]
    Model(String),
    #[error("failed to parse response: {0}")]
    Parse(String),
    #[error("empty response")]
    Empty,
}

pub struct GeminiClient {
    api_key: String,
    model: String,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
}

#[derive(Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum Part {
    Text { text: String },
    Inline {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
}

#[derive(Serialize)]
struct InlineData {
    #[serde(rename = "mimeType")]
    mime_type: String,
    data: String,
}

#[derive(Deserialize, Debug)]
struct GenerateResponse {
    candidates: Option<Vec<Candidate>>,
    error: Option<ApiError>,
}

#[derive(Deserialize, Debug)]
struct ApiError {
    message: String,
}

#[derive(Deserialize, Debug)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize, Debug)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize, Debug)]
struct ResponsePart {
    text: Option<String>,
}

impl GeminiClient {
    pub fn new(api_key: String, model: String) -> Result<Self, GeminiError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()?;

        Ok(Self { api_key, model, client })
    }

    async fn generate_parts(&self, parts: Vec<Part>) -> Result<String, GeminiError> {
        let request = GenerateRequest { contents: vec![Content { parts }] };
        let url = format!("{}/{}:generateContent?key={}", GEMINI_API_BASE, self.model, self.api_key);

        let response = self.client.post(&url).json(&request).send().await?;
        let status = response.status();
        let body = response.text().await?;

        debug!("Gemini response status: {status}");

        if !status.is_success() {
            return Err(GeminiError::Api { status: status.as_u16(), body });
        }

        extract_text(&body)
    }
}

/// Concatenate the text parts of the first candidate.
fn extract_text(body: &str) -> Result<String, GeminiError> {
    let parsed: GenerateResponse =
        serde_json::from_str(body).map_err(|e| GeminiError::Parse(e.to_string()))?;

    if let Some(error) = parsed.error {
        return Err(GeminiError::Model(error.message));
    }

    let text: String = parsed
        .candidates
        .unwrap_or_default()
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();

    let text = text.trim().to_string();
    if text.is_empty() {
        return Err(GeminiError::Empty);
    }
    Ok(text)
}

#[async_trait]
impl TextModel for GeminiClient {
    async fn generate(&self, prompt: &str) -> Result<String, GeminiError> {
        let text = self
            .generate_parts(vec![Part::Text { text: prompt.to_string() }])
            .await?;
        info!("🤖 Gemini generated {} chars", text.len());
        Ok(text)
    }
}

#[async_trait]
impl Transcriber for GeminiClient {
    async fn transcribe(&self, audio: &[u8], mime_type: &str) -> Result<String, TranscribeError> {
        let data = base64::engine::general_purpose::STANDARD.encode(audio);
        let parts = vec![
            Part::Text { text: TRANSCRIBE_PROMPT.to_string() },
            Part::Inline { inline_data: InlineData { mime_type: mime_type.to_string(), data } },
        ];
        match self.generate_parts(parts).await {
            Ok(text) => {
                info!("🎙️ Gemini transcribed {} bytes of audio", audio.len());
                Ok(text)
            }
            Err(GeminiError::Empty) => Err(TranscribeError::Empty),
            Err(e) => Err(e.into()),
        }
    }
}
