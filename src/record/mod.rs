#[cfg(test)]
mod tests;

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::{Result, StoreError};

/// A persisted chunk of document text with its embedding and metadata.
///
/// Serialized as one JSON object per file. Fields unknown to this version
/// are preserved across a read-modify-write cycle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct ChunkRecord {
    /// Opaque unique identifier, assigned at ingest
    pub id: String,
    /// The chunk text after chunking
    pub content: String,
    /// Embedding vector; empty only transiently before the record is written
    #[serde(default)]
    pub embedding: Vec<f32>,
    /// Free-form metadata (source file, chunk index, ...)
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
    /// UTC creation timestamp
    pub created_at: DateTime<Utc>,
    /// Fields from newer format versions, carried through untouched
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

impl ChunkRecord {
    /// Create a record with a fresh id and no embedding yet.
    #[inline]
    pub fn new(content: impl Into<String>, metadata: HashMap<String, Value>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            content: content.into(),
            embedding: Vec::new(),
            metadata,
            created_at: Utc::now(),
            extra: HashMap::new(),
        }
    }

    /// Attach an embedding to this record.
    #[inline]
    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = embedding;
        self
    }

    /// Verify the embedding is either empty or exactly `dimension` wide.
    #[inline]
    pub fn validate_embedding(&self, dimension: usize) -> Result<()> {
        if !self.embedding.is_empty() && self.embedding.len() != dimension {
            return Err(StoreError::DimensionMismatch {
                expected: dimension,
                got: self.embedding.len(),
            });
        }
        Ok(())
    }

    /// Serialize to the indented JSON written on disk.
    #[inline]
    pub fn to_json_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| StoreError::CorruptRecord(format!("{}: {}", self.id, e)))
    }

    /// Parse a record from raw file bytes, rejecting obviously truncated
    /// content before handing it to the JSON parser.
    #[inline]
    pub fn from_json_bytes(name: &str, bytes: &[u8]) -> Result<Self> {
        let text = String::from_utf8_lossy(bytes);
        let trimmed = text.trim();
        if trimmed.is_empty() || !trimmed.starts_with('{') || !trimmed.ends_with('}') {
            return Err(StoreError::CorruptRecord(format!(
                "{}: not a JSON object",
                name
            )));
        }
        serde_json::from_str(trimmed).map_err(|e| StoreError::CorruptRecord(format!("{name}: {e}")))
    }
}
