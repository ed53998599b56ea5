use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;

use crate::Result;
use crate::extract::{DocumentExtractor, DocumentKind, ExtractedDocument, normalize_newlines};

/// Plain text and text-adjacent formats (logs, CSV, JSON, XML) taken as-is.
pub struct TextExtractor;

#[async_trait]
impl DocumentExtractor for TextExtractor {
    fn kind(&self) -> DocumentKind {
        DocumentKind::Text
    }

    fn handles(&self, extension: &str) -> bool {
        matches!(extension, "txt" | "text" | "log" | "csv" | "json" | "xml")
    }

    async fn extract(&self, path: &Path) -> Result<ExtractedDocument> {
        let raw = crate::extract::read_text_lossy(path).await?;
        Ok(ExtractedDocument {
            kind: DocumentKind::Text,
            text: normalize_newlines(&raw),
            metadata: HashMap::new(),
        })
    }
}
