
use std::collections::HashMap;
use std::io::{Cursor, Read};
use std::path::Path;
use std::sync::LazyLock;

use anyhow::Context;
use async_trait::async_trait;
use regex::Regex;
use serde_json::{Value, json};
use tracing::debug;

use crate::extract::{DocumentExtractor, DocumentKind, ExtractedDocument};
use crate::{Result, StoreError};

static BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<w:tbl[ >].*?</w:tbl>|<w:p(?: [^>]*)?/>|<w:p(?: [^>]*)?>.*?</w:p>")
        .expect("pattern is valid")
});
static PARA_STYLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<w:pStyle[^>]*w:val="([^"]+)""#).expect("pattern is valid")
});
static TEXT_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<w:t(?: [^>]*)?>([^<]*)</w:t>").expect("pattern is valid"));
static TABLE_ROW: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<w:tr[ >].*?</w:tr>").expect("pattern is valid"));
static TABLE_CELL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<w:tc[ >].*?</w:tc>").expect("pattern is valid"));
static PAGE_BREAK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"<w:br[^>]*w:type="page""#).expect("pattern is valid"));

/// Word (`.docx`) extractor: the document XML is pulled out of the OPC zip
/// container directly. Heading-styled paragraphs become Markdown-style
/// headers; tables flatten to pipe-separated lines.
pub struct DocxExtractor;

#[async_trait]
impl DocumentExtractor for DocxExtractor {
    fn kind(&self) -> DocumentKind {
        DocumentKind::Docx
    }

    fn handles(&self, extension: &str) -> bool {
        extension == "docx"
    }

    async fn extract(&self, path: &Path) -> Result<ExtractedDocument> {
        let bytes = crate::extract::read_source_bytes(path).await?;

        let parsed = tokio::task::spawn_blocking(move || parse_docx(&bytes))
            .await
            .map_err(|e| {
                if e.is_cancelled() {
                    StoreError::Cancelled
                } else {
                    StoreError::Io(std::io::Error::other(e))
                }
            })?;

        let (text, metadata) = parsed.map_err(|e| StoreError::UnreadableSource {
            path: path.to_path_buf(),
            reason: format!("{e:#}"),
        })?;

        Ok(ExtractedDocument {
            kind: DocumentKind::Docx,
            text,
            metadata,
        })
    }
}

fn parse_docx(bytes: &[u8]) -> anyhow::Result<(String, HashMap<String, Value>)> {
    let mut archive =
        zip::ZipArchive::new(Cursor::new(bytes)).context("not a valid docx container")?;

    let document =
        read_archive_entry(&mut archive, "word/document.xml").context("missing document body")?;
    let core = read_archive_entry(&mut archive, "docProps/core.xml").ok();

    let mut blocks: Vec<String> = Vec::new();
    let mut has_headers = false;
    let mut has_tables = false;

    for m in BLOCK.find_iter(&document) {
        let xml = m.as_str();
        if xml.starts_with("<w:tbl") {
            let table = flatten_table(xml);
            if !table.is_empty() {
                has_tables = true;
                blocks.push(table);
            }
        } else if let Some(paragraph) = paragraph_text(xml) {
            if paragraph.starts_with("# ") {
                has_headers = true;
            }
            blocks.push(paragraph);
        }
    }

    let text = blocks.join("\n\n");

    let mut metadata = HashMap::new();
    metadata.insert("has_headers".to_string(), json!(has_headers));
    metadata.insert("has_tables".to_string(), json!(has_tables));
    metadata.insert(
        "word_count".to_string(),
        json!(text.split_whitespace().count()),
    );
    if let Some(core) = core {
        collect_core_properties(&core, &mut metadata);
    }

    debug!("Extracted {} docx blocks", blocks.len());
    Ok((text, metadata))
}

fn read_archive_entry(
    archive: &mut zip::ZipArchive<Cursor<&[u8]>>,
    name: &str,
) -> anyhow::Result<String> {
    let mut entry = archive
        .by_name(name)
        .with_context(|| format!("no {name} in archive"))?;
    let mut content = String::new();
    entry.read_to_string(&mut content)?;
    Ok(content)
}

/// Assemble a paragraph's text runs. Heading and Title styles get a `# `
/// prefix; explicit page breaks surface as form feeds.
fn paragraph_text(xml: &str) -> Option<String> {
    let mut content = String::new();

    if PAGE_BREAK.is_match(xml) {
        content.push('\u{c}');
    }

    let body: String = TEXT_RUN
        .captures_iter(xml)
        .map(|c| unescape_xml(&c[1]))
        .collect();
    let body = body.trim();
    if body.is_empty() && content.is_empty() {
        return None;
    }

    let is_heading = PARA_STYLE
        .captures(xml)
        .map(|c| c[1].starts_with("Heading") || &c[1] == "Title")
        .unwrap_or(false);

    if is_heading && !body.is_empty() {
        content.push_str("# ");
    }
    content.push_str(body);
    Some(content)
}

/// Flatten a table to one pipe-separated line per row.
fn flatten_table(xml: &str) -> String {
    TABLE_ROW
        .find_iter(xml)
        .filter_map(|row| {
            let cells: Vec<String> = TABLE_CELL
                .find_iter(row.as_str())
                .map(|cell| {
                    TEXT_RUN
                        .captures_iter(cell.as_str())
                        .map(|c| unescape_xml(&c[1]))
                        .collect::<String>()
                        .trim()
                        .to_string()
                })
                .collect();
            if cells.iter().all(|c| c.is_empty()) {
                None
            } else {
                Some(cells.join(" | "))
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn collect_core_properties(core: &str, metadata: &mut HashMap<String, Value>) {
    const FIELDS: [(&str, &str); 5] = [
        ("dc:title", "title"),
        ("dc:creator", "creator"),
        ("dc:subject", "subject"),
        ("dcterms:created", "created"),
        ("dcterms:modified", "modified"),
    ];

    for (tag, name) in FIELDS {
        let pattern = format!(r"<{tag}[^>]*>([^<]*)</{tag}>", tag = regex::escape(tag));
        if let Ok(re) = Regex::new(&pattern) {
            if let Some(captures) = re.captures(core) {
                let value = unescape_xml(&captures[1]);
                let value = value.trim();
                if !value.is_empty() {
                    metadata.insert(name.to_string(), json!(value));
                }
            }
        }
    }
}

fn unescape_xml(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}
