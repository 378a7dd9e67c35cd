use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum KillfeedError {
    #[error("Invalid time range: {0}")]
    InvalidRange(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Source unavailable: {0}")]
    SourceUnavailable(String),

    #[error("Empty media: {0}")]
    EmptyMedia(String),

    #[error("Decode failed: {0}")]
    Decode(String),

    #[error("Unreadable frame {path}: {reason}")]
    FrameRead { path: PathBuf, reason: String },

    #[error("OCR failed: {0}")]
    Ocr(String),

    #[error("Persistence failed: {0}")]
    Persistence(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Why a chunk contributed no events.
#[derive(Error, Debug)]
pub enum ChunkError {
    #[error("extraction failed: {0}")]
    Extraction(#[source] KillfeedError),

    #[error("cancelled")]
    Cancelled,

    #[error("deadline of {0}s exceeded")]
    DeadlineExceeded(u64),

    #[error("worker panicked: {0}")]
    Panicked(String),
}

pub type Result<T> = std::result::Result<T, KillfeedError>;
