pub mod docx;
pub mod markdown;
pub mod pdf;
pub mod text;


use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::{Result, StoreError};

/// The document formats the store can ingest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DocumentKind {
    Text,
    Markdown,
    Pdf,
    Docx,
}

impl DocumentKind {
    /// Map a lowercase file extension (without the dot) to a kind.
    #[inline]
    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension {
            "txt" | "text" | "log" | "csv" | "json" | "xml" => Some(Self::Text),
            "md" | "markdown" | "mdown" | "mkd" => Some(Self::Markdown),
            "pdf" => Some(Self::Pdf),
            "docx" => Some(Self::Docx),
            _ => None,
        }
    }
}

/// Normalized text plus document-level metadata from one source file.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedDocument {
    pub kind: DocumentKind,
    /// Normalized UTF-8 text (`\n` line endings)
    pub text: String,
    /// Document-level metadata merged into every chunk record
    pub metadata: HashMap<String, Value>,
}

/// A format-specific extractor. New formats register as additional
/// implementations on the registry.
#[async_trait]
pub trait DocumentExtractor: Send + Sync {
    fn kind(&self) -> DocumentKind;

    /// Whether this extractor handles the given lowercase extension.
    fn handles(&self, extension: &str) -> bool;

    async fn extract(&self, path: &Path) -> Result<ExtractedDocument>;
}

/// Dispatch table mapping file extensions to extractors.
pub struct ExtractorRegistry {
    extractors: Vec<Box<dyn DocumentExtractor>>,
}

impl Default for ExtractorRegistry {
    #[inline]
    fn default() -> Self {
        Self {
            extractors: vec![
                Box::new(text::TextExtractor),
                Box::new(markdown::MarkdownExtractor),
                Box::new(pdf::PdfExtractor),
                Box::new(docx::DocxExtractor),
            ],
        }
    }
}

impl ExtractorRegistry {
    /// Register an additional extractor. Later registrations win for
    /// extensions already covered.
    #[inline]
    pub fn register(&mut self, extractor: Box<dyn DocumentExtractor>) {
        self.extractors.insert(0, extractor);
    }

    /// Whether any registered extractor handles the file's extension.
    #[inline]
    pub fn supports(&self, path: &Path) -> bool {
        file_extension(path)
            .map(|ext| self.extractors.iter().any(|e| e.handles(&ext)))
            .unwrap_or(false)
    }

    /// Extract normalized text and metadata from a file, dispatching on its
    /// extension.
    #[inline]
    pub async fn extract_file(&self, path: &Path) -> Result<ExtractedDocument> {
        let extension = file_extension(path).ok_or_else(|| {
            StoreError::UnsupportedFormat(format!("{} has no extension", path.display()))
        })?;

        let extractor = self
            .extractors
            .iter()
            .find(|e| e.handles(&extension))
            .ok_or_else(|| StoreError::UnsupportedFormat(extension.clone()))?;

        extractor.extract(path).await
    }
}

/// Lowercase extension without the dot.
fn file_extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

/// Read a file as UTF-8, falling back to lossy decoding when the bytes are
/// not valid UTF-8. Missing files map to `NotFound`; undecodable reads to
/// `UnreadableSource`.
pub(crate) async fn read_text_lossy(path: &Path) -> Result<String> {
    let bytes = read_source_bytes(path).await?;
    match String::from_utf8(bytes) {
        Ok(text) => Ok(text),
        Err(e) => {
            warn!(
                "File {} is not valid UTF-8, decoding lossily",
                path.display()
            );
            Ok(String::from_utf8_lossy(e.as_bytes()).into_owned())
        }
    }
}

/// Read raw bytes with the store's error mapping.
pub(crate) async fn read_source_bytes(path: &Path) -> Result<Vec<u8>> {
    tokio::fs::read(path).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            StoreError::NotFound(path.display().to_string())
        } else {
            StoreError::UnreadableSource {
                path: path.to_path_buf(),
                reason: e.to_string(),
            }
        }
    })
}

/// Normalize line endings to `\n`.
pub(crate) fn normalize_newlines(text: &str) -> String {
    text.replace("\r\n", "\n").replace('\r', "\n")
}

/// The source file's stem, used as a title fallback.
pub(crate) fn file_stem(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("untitled")
        .to_string()
}
