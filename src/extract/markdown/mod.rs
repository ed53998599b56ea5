
use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use pulldown_cmark::{Event, HeadingLevel, Parser, Tag, TagEnd};
use serde_json::json;

use crate::Result;
use crate::extract::{
    DocumentExtractor, DocumentKind, ExtractedDocument, file_stem, normalize_newlines,
};

/// Markdown extractor. The text passes through unchanged (chunking operates
/// on the raw Markdown); metadata captures document structure.
pub struct MarkdownExtractor;

#[async_trait]
impl DocumentExtractor for MarkdownExtractor {
    fn kind(&self) -> DocumentKind {
        DocumentKind::Markdown
    }

    fn handles(&self, extension: &str) -> bool {
        matches!(extension, "md" | "markdown" | "mdown" | "mkd")
    }

    async fn extract(&self, path: &Path) -> Result<ExtractedDocument> {
        let raw = crate::extract::read_text_lossy(path).await?;
        let text = normalize_newlines(&raw);
        let structure = scan_structure(&text);

        let mut metadata = HashMap::new();
        metadata.insert(
            "title".to_string(),
            json!(structure.title.unwrap_or_else(|| file_stem(path))),
        );
        metadata.insert("has_headers".to_string(), json!(structure.has_headers));
        metadata.insert(
            "has_code_blocks".to_string(),
            json!(structure.has_code_blocks),
        );
        metadata.insert("has_lists".to_string(), json!(structure.has_lists));

        Ok(ExtractedDocument {
            kind: DocumentKind::Markdown,
            text,
            metadata,
        })
    }
}

#[derive(Debug, Default)]
struct MarkdownStructure {
    title: Option<String>,
    has_headers: bool,
    has_code_blocks: bool,
    has_lists: bool,
}

/// Walk the event stream once, collecting the first H1/H2 text as the title
/// plus structure flags.
fn scan_structure(text: &str) -> MarkdownStructure {
    let mut structure = MarkdownStructure::default();
    let mut capturing_title = false;
    let mut title_buf = String::new();

    for event in Parser::new(text) {
        match event {
            Event::Start(Tag::Heading { level, .. }) => {
                structure.has_headers = true;
                if structure.title.is_none()
                    && matches!(level, HeadingLevel::H1 | HeadingLevel::H2)
                {
                    capturing_title = true;
                    title_buf.clear();
                }
            }
            Event::End(TagEnd::Heading(_)) => {
                if capturing_title {
                    capturing_title = false;
                    let title = title_buf.trim().to_string();
                    if !title.is_empty() {
                        structure.title = Some(title);
                    }
                }
            }
            Event::Text(t) | Event::Code(t) => {
                if capturing_title {
                    title_buf.push_str(&t);
                }
            }
            Event::Start(Tag::CodeBlock(_)) => structure.has_code_blocks = true,
            Event::Start(Tag::List(_)) => structure.has_lists = true,
            _ => {}
        }
    }

    structure
}

/// The nearest header line at or before `position` (a character offset),
/// used as per-chunk context for Markdown documents.
#[inline]
pub fn header_context(text: &str, position: usize) -> Option<String> {
    let mut current: Option<String> = None;
    let mut offset = 0;

    for line in text.split('\n') {
        let line_chars = line.chars().count();
        if offset > position {
            break;
        }
        let trimmed = line.trim_start();
        let hashes = trimmed.chars().take_while(|c| *c == '#').count();
        if (1..=6).contains(&hashes) && trimmed.chars().nth(hashes) == Some(' ') {
            current = Some(trimmed.trim().to_string());
        }
        offset += line_chars + 1;
    }

    current
}
