#[cfg(test)]
mod tests;

use tracing::debug;

use crate::Result;
use crate::chunking::{Boundary, BoundaryKind, ChunkingOptions, TextChunk};

/// Assemble size-bounded chunks from text and its boundary list.
///
/// Chunks cover disjoint character ranges of the input; the overlap carried
/// between adjacent chunks informs where cuts land but is never duplicated
/// into stored content. Empty input yields no chunks; nonempty input always
/// yields at least one.
#[inline]
pub fn assemble_chunks(
    text: &str,
    boundaries: &[Boundary],
    options: &ChunkingOptions,
) -> Result<Vec<TextChunk>> {
    options.validate()?;

    if text.trim().is_empty() {
        return Ok(Vec::new());
    }

    let chars: Vec<char> = text.chars().collect();
    let len = chars.len();

    // Strategy-admitted boundaries, clamped to the text, plus a sentinel at
    // the end so trailing text flows through the same accumulation path.
    let mut admitted: Vec<Boundary> = boundaries
        .iter()
        .filter(|b| options.strategy.admits(b.kind) && b.position <= len)
        .cloned()
        .collect();
    admitted.push(Boundary {
        position: len,
        kind: BoundaryKind::Character,
        priority: 0,
        context: None,
    });

    let mut assembler = Assembler::new(&chars, &admitted, options);
    assembler.run();

    let mut chunks = assembler.chunks;
    if chunks.is_empty() {
        // Too short for the configured bounds: a single chunk with the
        // entire trimmed text.
        chunks.push(make_chunk(text.trim().to_string(), 0, 0, len, false));
    }

    debug!(
        "Assembled {} chunks from {} characters",
        chunks.len(),
        len
    );
    Ok(chunks)
}

struct Assembler<'a> {
    chars: &'a [char],
    boundaries: &'a [Boundary],
    options: &'a ChunkingOptions,
    /// Reading cursor (character offset)
    pos: usize,
    /// Start of the current chunk's stored range
    chunk_start: usize,
    /// Accumulator length in characters, including carried overlap
    buf_len: usize,
    /// Overlap carried from the previous chunk
    overlap: String,
    chunks: Vec<TextChunk>,
}

impl<'a> Assembler<'a> {
    fn new(chars: &'a [char], boundaries: &'a [Boundary], options: &'a ChunkingOptions) -> Self {
        Self {
            chars,
            boundaries,
            options,
            pos: 0,
            chunk_start: 0,
            buf_len: 0,
            overlap: String::new(),
            chunks: Vec::new(),
        }
    }

    fn run(&mut self) {
        let mut bi = 0;
        while bi < self.boundaries.len() {
            let boundary_pos = self.boundaries[bi].position;
            if boundary_pos <= self.pos {
                bi += 1;
                continue;
            }

            let seg_len = boundary_pos - self.pos;
            if self.buf_len + seg_len <= self.options.max_chunk_size {
                self.buf_len += seg_len;
                self.pos = boundary_pos;
                bi += 1;
            } else {
                self.split_overflow(seg_len);
            }
        }

        // Residual accumulator
        let stored_len = self.pos - self.chunk_start;
        if stored_len > 0 && stored_len >= self.options.min_chunk_size {
            self.emit(self.pos);
        }
    }

    /// The segment up to the next boundary does not fit: pick the best stop
    /// point inside it, emit up to there, and continue from the stop.
    fn split_overflow(&mut self, seg_len: usize) {
        let stop = self
            .select_boundary_stop(seg_len)
            .unwrap_or_else(|| self.fallback_stop(seg_len));

        let end = self.pos + stop;
        let stored_len = end - self.chunk_start;

        if stored_len >= self.options.min_chunk_size {
            self.pos = end;
            self.emit(end);
        } else {
            // Below the minimum even at the chosen stop: keep accumulating.
            self.buf_len += stop;
            self.pos = end;
        }
    }

    /// Rank in-segment boundaries by priority, then by distance from the
    /// target cut position, and take the first that keeps the stored chunk
    /// within bounds.
    fn select_boundary_stop(&self, seg_len: usize) -> Option<usize> {
        let headroom = self.options.max_chunk_size.saturating_sub(self.buf_len);
        let target_pos = self.pos + headroom;

        let mut candidates: Vec<&Boundary> = self
            .boundaries
            .iter()
            .filter(|b| b.position >= self.pos && b.position < self.pos + seg_len)
            .collect();
        candidates.sort_by_key(|b| {
            (
                std::cmp::Reverse(b.priority),
                b.position.abs_diff(target_pos),
            )
        });

        // A candidate must leave nonempty stored content even when
        // min_chunk_size is 0, or a boundary pinned at the chunk start
        // would be chosen again forever.
        candidates
            .iter()
            .find(|b| {
                let stored_len = b.position - self.chunk_start;
                stored_len > 0
                    && stored_len >= self.options.min_chunk_size
                    && stored_len <= self.options.max_chunk_size
            })
            .map(|b| b.position - self.pos)
    }

    /// No boundary produced a valid cut: last sentence terminator, then last
    /// space, then a hard cut at the capacity limit.
    fn fallback_stop(&self, seg_len: usize) -> usize {
        let headroom = self.options.max_chunk_size.saturating_sub(self.buf_len);
        let scan_len = headroom.min(seg_len);
        let seg = &self.chars[self.pos..self.pos + seg_len];

        if let Some(i) = seg[..scan_len]
            .iter()
            .rposition(|c| matches!(c, '.' | '!' | '?'))
        {
            return i + 1;
        }
        if let Some(i) = seg[..scan_len].iter().rposition(|c| *c == ' ') {
            return i + 1;
        }
        scan_len.max(1).min(seg_len)
    }

    /// Emit the stored range `[chunk_start, end)` and carry fresh overlap.
    fn emit(&mut self, end: usize) {
        let content: String = self.chars[self.chunk_start..end].iter().collect();
        let had_overlap = !self.overlap.is_empty();
        let index = self.chunks.len();

        self.overlap = smart_overlap(&content, self.options.overlap_size);
        self.buf_len = self.overlap.chars().count();
        self.chunks
            .push(make_chunk(content, index, self.chunk_start, end, had_overlap));
        self.chunk_start = end;
    }
}

fn make_chunk(
    content: String,
    index: usize,
    start: usize,
    end: usize,
    has_overlap: bool,
) -> TextChunk {
    let word_count = content.split_whitespace().count();
    let character_count = content.chars().count();
    TextChunk {
        content,
        index,
        start_position: start,
        end_position: end,
        word_count,
        character_count,
        has_overlap,
    }
}

/// Extract the overlap to carry into the next chunk: from the last
/// `2 * overlap_size` characters, prefer the tail starting after the last
/// sentence terminator when it is long enough, then the tail after the last
/// space, then the raw last `overlap_size` characters.
fn smart_overlap(content: &str, overlap_size: usize) -> String {
    if overlap_size == 0 {
        return String::new();
    }

    let chars: Vec<char> = content.chars().collect();
    let window_start = chars.len().saturating_sub(overlap_size * 2);
    let window = &chars[window_start..];

    if let Some(i) = window.iter().rposition(|c| matches!(c, '.' | '!' | '?')) {
        let tail: String = window[i + 1..].iter().collect();
        let tail = tail.trim_start();
        if tail.chars().count() >= overlap_size / 2 {
            return tail.to_string();
        }
    }

    if let Some(i) = window.iter().rposition(|c| *c == ' ') {
        let tail: String = window[i + 1..].iter().collect();
        if tail.chars().count() >= overlap_size / 3 {
            return tail;
        }
    }

    let raw_start = chars.len().saturating_sub(overlap_size);
    chars[raw_start..].iter().collect()
}
