//! Crate-level error for bot handlers.

use teloxide::{DownloadError, RequestError};

use crate::ai::{GeminiError, TranscribeError};
use crate::compare::CompareError;
use crate::paper::SourceError;
use crate::store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("telegram request failed: {0}")]
    Telegram(#[from] RequestError),
    #[error("telegram file download failed: {0}")]
    Download(#[from] DownloadError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error(transparent)]
    Model(#[from] GeminiError),
    #[error(transparent)]
    Transcribe(#[from] TranscribeError),
    #[error(transparent)]
    Compare(#[from] CompareError),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
