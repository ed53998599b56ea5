use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Already exists: {}", .0.display())]
    AlreadyExists(PathBuf),

    #[error("Not a document store: {}", .0.display())]
    NotAStore(PathBuf),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Unreadable source {}: {}", .path.display(), .reason)]
    UnreadableSource { path: PathBuf, reason: String },

    #[error("Corrupt index: {0}")]
    CorruptIndex(String),

    #[error("Corrupt record {0}")]
    CorruptRecord(String),

    #[error("Embedding failed: {0}")]
    EmbeddingFailed(#[source] anyhow::Error),

    #[error("Model unavailable: {0}")]
    ModelUnavailable(#[source] anyhow::Error),

    #[error("Dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub mod cache;
pub mod chunking;
pub mod config;
pub mod embeddings;
pub mod extract;
pub mod index;
pub mod record;
pub mod similarity;
pub mod store;
