pub mod assembler;
pub mod boundaries;


use serde::{Deserialize, Serialize};

use crate::{Result, StoreError};

pub use assembler::assemble_chunks;
pub use boundaries::detect_boundaries;

/// A candidate split point in text, ranked by how natural a stop it is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Boundary {
    /// Character offset within the normalized text
    pub position: usize,
    pub kind: BoundaryKind,
    /// Higher = better stopping point
    pub priority: u8,
    /// Optional surrounding text, e.g. the header line for a Header boundary
    pub context: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BoundaryKind {
    Header,
    Section,
    Paragraph,
    Line,
    Sentence,
    Word,
    Page,
    CodeBlock,
    ListItem,
    Character,
}

/// How boundary kinds are filtered during assembly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ChunkingStrategy {
    /// Paragraph, sentence, and word boundaries only
    Semantic,
    /// Structural markers only: headers, sections, pages, code fences, lists
    Structural,
    /// All boundary kinds
    #[default]
    Hybrid,
}

impl ChunkingStrategy {
    /// Whether a boundary of this kind participates under the strategy.
    #[inline]
    pub fn admits(self, kind: BoundaryKind) -> bool {
        match self {
            Self::Semantic => matches!(
                kind,
                BoundaryKind::Paragraph | BoundaryKind::Sentence | BoundaryKind::Word
            ),
            Self::Structural => matches!(
                kind,
                BoundaryKind::Header
                    | BoundaryKind::Section
                    | BoundaryKind::Page
                    | BoundaryKind::CodeBlock
                    | BoundaryKind::ListItem
            ),
            Self::Hybrid => true,
        }
    }
}

/// Options controlling chunk assembly. Sizes are in characters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingOptions {
    pub max_chunk_size: usize,
    pub min_chunk_size: usize,
    pub overlap_size: usize,
    pub strategy: ChunkingStrategy,
    pub preserve_headers: bool,
    pub include_page_numbers: bool,
    pub respect_document_structure: bool,
}

impl Default for ChunkingOptions {
    #[inline]
    fn default() -> Self {
        Self {
            max_chunk_size: 1200,
            min_chunk_size: 100,
            overlap_size: 80,
            strategy: ChunkingStrategy::Hybrid,
            preserve_headers: true,
            include_page_numbers: true,
            respect_document_structure: true,
        }
    }
}

impl ChunkingOptions {
    /// Validate size relationships: `min <= max` and `overlap < min`
    /// (a zero overlap is always allowed).
    #[inline]
    pub fn validate(&self) -> Result<()> {
        if self.min_chunk_size > self.max_chunk_size {
            return Err(StoreError::InvalidInput(format!(
                "min_chunk_size ({}) exceeds max_chunk_size ({})",
                self.min_chunk_size, self.max_chunk_size
            )));
        }
        if self.overlap_size > 0 && self.overlap_size >= self.min_chunk_size {
            return Err(StoreError::InvalidInput(format!(
                "overlap_size ({}) must be smaller than min_chunk_size ({})",
                self.overlap_size, self.min_chunk_size
            )));
        }
        Ok(())
    }
}

/// A chunk produced by the assembler, with positions in character offsets
/// into the normalized source text.
#[derive(Debug, Clone, PartialEq)]
pub struct TextChunk {
    pub content: String,
    pub index: usize,
    pub start_position: usize,
    pub end_position: usize,
    pub word_count: usize,
    pub character_count: usize,
    pub has_overlap: bool,
}
