use std::collections::HashMap;
use std::path::Path;

use anyhow::Context;
use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::extract::{DocumentExtractor, DocumentKind, ExtractedDocument, normalize_newlines};
use crate::{Result, StoreError};

/// PDF extractor: page text via `pdf_extract`, document info via the
/// underlying `lopdf` parser. Parsing is CPU-bound and runs off the reactor.
pub struct PdfExtractor;

#[async_trait]
impl DocumentExtractor for PdfExtractor {
    fn kind(&self) -> DocumentKind {
        DocumentKind::Pdf
    }

    fn handles(&self, extension: &str) -> bool {
        extension == "pdf"
    }

    async fn extract(&self, path: &Path) -> Result<ExtractedDocument> {
        let bytes = crate::extract::read_source_bytes(path).await?;
        let display = path.display().to_string();

        let (text, metadata) = tokio::task::spawn_blocking(move || parse_pdf(&bytes))
            .await
            .map_err(|e| {
                if e.is_cancelled() {
                    StoreError::Cancelled
                } else {
                    StoreError::UnreadableSource {
                        path: Path::new(&display).to_path_buf(),
                        reason: e.to_string(),
                    }
                }
            })?
            .map_err(|e| StoreError::UnreadableSource {
                path: path.to_path_buf(),
                reason: format!("{e:#}"),
            })?;

        Ok(ExtractedDocument {
            kind: DocumentKind::Pdf,
            text,
            metadata,
        })
    }
}

/// Extract page text and the Info dictionary from raw PDF bytes.
fn parse_pdf(bytes: &[u8]) -> anyhow::Result<(String, HashMap<String, Value>)> {
    let pages =
        pdf_extract::extract_text_from_mem_by_pages(bytes).context("PDF text extraction failed")?;

    // Pages are prefixed with a marker and joined with form feeds so the
    // boundary detector can rank page breaks.
    let text = pages
        .iter()
        .enumerate()
        .map(|(i, page)| format!("--- Page {} ---\n{}", i + 1, normalize_newlines(page.trim())))
        .collect::<Vec<_>>()
        .join("\u{c}");

    let mut metadata = HashMap::new();
    metadata.insert("total_pages".to_string(), json!(pages.len()));

    match lopdf::Document::load_mem(bytes) {
        Ok(doc) => collect_document_info(&doc, &mut metadata),
        Err(e) => warn!("Could not read PDF document info: {}", e),
    }

    debug!("Extracted {} PDF pages", pages.len());
    Ok((text, metadata))
}

/// Copy the standard Info dictionary fields into metadata.
fn collect_document_info(doc: &lopdf::Document, metadata: &mut HashMap<String, Value>) {
    let Ok(info_obj) = doc.trailer.get(b"Info") else {
        return;
    };
    let Some(info) = resolve_dict(doc, info_obj) else {
        return;
    };

    const FIELDS: [(&[u8], &str); 6] = [
        (b"Title", "title"),
        (b"Author", "author"),
        (b"Subject", "subject"),
        (b"Creator", "creator"),
        (b"Producer", "producer"),
        (b"CreationDate", "creation_date"),
    ];

    for (key, name) in FIELDS {
        if let Ok(value) = info.get(key) {
            if let Some(text) = decode_pdf_string(doc, value) {
                if !text.is_empty() {
                    metadata.insert(name.to_string(), json!(text));
                }
            }
        }
    }
}

fn resolve_dict<'a>(
    doc: &'a lopdf::Document,
    object: &'a lopdf::Object,
) -> Option<&'a lopdf::Dictionary> {
    match object {
        lopdf::Object::Dictionary(dict) => Some(dict),
        lopdf::Object::Reference(id) => match doc.get_object(*id).ok()? {
            lopdf::Object::Dictionary(dict) => Some(dict),
            _ => None,
        },
        _ => None,
    }
}

fn decode_pdf_string(doc: &lopdf::Document, object: &lopdf::Object) -> Option<String> {
    match object {
        lopdf::Object::String(bytes, _) => Some(decode_text_bytes(bytes)),
        lopdf::Object::Reference(id) => match doc.get_object(*id).ok()? {
            lopdf::Object::String(bytes, _) => Some(decode_text_bytes(bytes)),
            _ => None,
        },
        _ => None,
    }
}

/// PDF text strings are either UTF-16BE with a BOM or PDFDocEncoding,
/// which is close enough to Latin-1 for the Info fields.
fn decode_text_bytes(bytes: &[u8]) -> String {
    if bytes.starts_with(&[0xFE, 0xFF]) {
        let units: Vec<u16> = bytes[2..]
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        String::from_utf16_lossy(&units)
    } else {
        bytes.iter().map(|b| *b as char).collect()
    }
}
