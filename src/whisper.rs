//! Local speech-to-text using whisper-rs.
//!
//! Telegram voice notes arrive as OGG Opus; ffmpeg converts them to the
//! 16 kHz mono PCM Whisper expects.

use std::io::Write;
use std::path::Path;
use std::process::{Command, Stdio};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};
use whisper_rs::{FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters};

use crate::ai::{TranscribeError, Transcriber};
use crate::text::truncate;

/// Whisper transcription engine.
#[derive(Clone)]
pub struct Whisper {
    ctx: Arc<WhisperContext>,
}

impl Whisper {
    /// Load a Whisper model from a .bin file.
    pub fn new(model_path: &Path) -> Result<Self, TranscribeError> {
        info!("Loading Whisper model from {:?}", model_path);

        if !model_path.exists() {
            return Err(TranscribeError::Model(format!("model file not found: {:?}", model_path)));
        }
        let path = model_path
            .to_str()
            .ok_or_else(|| TranscribeError::Model("model path is not valid UTF-8".into()))?;

        let ctx = WhisperContext::new_with_params(path, WhisperContextParameters::default())
            .map_err(|e| TranscribeError::Model(format!("failed to load model: {e}")))?;

        info!("Whisper model loaded");
        Ok(Self { ctx: Arc::new(ctx) })
    }

    /// Transcribe OGG Opus audio. Blocking; runs ffmpeg and the model inline.
    pub fn transcribe_ogg(&self, ogg_data: &[u8]) -> Result<String, TranscribeError> {
        debug!("Transcribing {} bytes of audio", ogg_data.len());

        let pcm = convert_ogg_to_pcm(ogg_data)?;

        let mut state = self
            .ctx
            .create_state()
            .map_err(|e| TranscribeError::Model(format!("failed to create state: {e}")))?;

        let mut params = FullParams::new(SamplingStrategy::Greedy { best_of: 1 });
        params.set_language(Some("en"));
        params.set_translate(false);
        params.set_no_timestamps(true);
        params.set_single_segment(false);

        state
            .full(params, &pcm)
            .map_err(|e| TranscribeError::Model(format!("transcription failed: {e}")))?;

        let mut text = String::new();
        for segment in state.as_iter() {
            if let Ok(s) = segment.to_str() {
                text.push_str(s);
                text.push(' ');
            }
        }

        let text = clean_transcript(&text);
        if text.is_empty() {
            return Err(TranscribeError::Empty);
        }
        info!("🎙️ Transcribed: \"{}\"", truncate(&text, 100));
        Ok(text)
    }
}

#[async_trait]
impl Transcriber for Whisper {
    async fn transcribe(&self, audio: &[u8], _mime_type: &str) -> Result<String, TranscribeError> {
        let whisper = self.clone();
        let audio = audio.to_vec();
        tokio::task::spawn_blocking(move || whisper.transcribe_ogg(&audio))
            .await
            .map_err(|e| TranscribeError::Model(format!("transcription task failed: {e}")))?
    }
}

/// Whisper marks silence and noise with bracketed tags like `[BLANK_AUDIO]`.
fn clean_transcript(raw: &str) -> String {
    let mut out = String::new();
    let mut depth = 0usize;
    for c in raw.chars() {
        match c {
            '[' | '(' => depth += 1,
            ']' | ')' => depth = depth.saturating_sub(1),
            _ if depth == 0 => out.push(c),
            _ => {}
        }
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Convert OGG Opus audio to 16 kHz mono f32 PCM samples using ffmpeg.
fn convert_ogg_to_pcm(ogg_data: &[u8]) -> Result<Vec<f32>, TranscribeError> {
    // ffmpeg needs seekable input for OGG
    let input = write_temp_input(ogg_data)
        .map_err(|e| TranscribeError::Convert(format!("failed to write temp input: {e}")))?;

    let output = Command::new("ffmpeg")
        .arg("-i")
        .arg(input.path())
        .args(["-ar", "16000", "-ac", "1", "-f", "s16le", "-acodec", "pcm_s16le", "-y", "pipe:1"])
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output();

    drop(input);
    let output = output.map_err(|e| TranscribeError::Convert(format!("failed to run ffmpeg: {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(TranscribeError::Convert(format!("ffmpeg failed: {}", truncate(stderr.trim(), 300))));
    }

    let samples = pcm_s16le_to_f32(&output.stdout);
    debug!("Converted to {} f32 samples", samples.len());
    Ok(samples)
}

/// Uniquely named `.ogg` file, deleted on drop.
fn write_temp_input(data: &[u8]) -> std::io::Result<tempfile::NamedTempFile> {
    let mut file = tempfile::Builder::new().prefix("paperpilot_voice_").suffix(".ogg").tempfile()?;
    file.write_all(data)?;
    file.flush()?;
    Ok(file)
}

fn pcm_s16le_to_f32(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(2)
        .map(|chunk| i16::from_le_bytes([chunk[0], chunk[1]]) as f32 / 32768.0)
        .collect()
}
