use super::*;
use crate::chunking::{ChunkingStrategy, detect_boundaries};
use crate::extract::DocumentKind;

fn options(max: usize, min: usize, overlap: usize) -> ChunkingOptions {
    ChunkingOptions {
        max_chunk_size: max,
        min_chunk_size: min,
        overlap_size: overlap,
        ..ChunkingOptions::default()
    }
}

fn chunk_text(text: &str, opts: &ChunkingOptions) -> Vec<TextChunk> {
    let boundaries = detect_boundaries(text, DocumentKind::Text);
    assemble_chunks(text, &boundaries, opts).expect("valid options")
}

#[test]
fn empty_input_yields_no_chunks() {
    let opts = options(150, 50, 25);
    assert!(chunk_text("", &opts).is_empty());
    assert!(chunk_text("   \n\n  ", &opts).is_empty());
}

#[test]
fn short_input_yields_single_full_chunk() {
    let opts = options(150, 50, 25);
    let chunks = chunk_text("Short text.", &opts);

    assert_eq!(chunks.len(), 1);
    assert_eq!(chunks[0].content, "Short text.");
    assert_eq!(chunks[0].index, 0);
    assert!(!chunks[0].has_overlap);
}

#[test]
fn invalid_options_are_rejected() {
    let text = "Some text to chunk.";
    let boundaries = detect_boundaries(text, DocumentKind::Text);

    let min_over_max = options(50, 100, 10);
    assert!(matches!(
        assemble_chunks(text, &boundaries, &min_over_max),
        Err(crate::StoreError::InvalidInput(_))
    ));

    let overlap_over_min = options(150, 50, 60);
    assert!(matches!(
        assemble_chunks(text, &boundaries, &overlap_over_min),
        Err(crate::StoreError::InvalidInput(_))
    ));
}

#[test]
fn repeated_sentences_chunk_within_bounds() {
    let text = "This is a test sentence. ".repeat(50);
    let opts = options(150, 50, 25);
    let chunks = chunk_text(&text, &opts);

    assert!(chunks.len() > 1);
    for (i, chunk) in chunks.iter().enumerate() {
        assert_eq!(chunk.index, i);
        assert!(
            chunk.character_count >= 50 && chunk.character_count <= 150,
            "chunk {} has length {}",
            i,
            chunk.character_count
        );
    }
}

#[test]
fn chunking_is_deterministic() {
    let text = "This is a test sentence. ".repeat(50);
    let opts = options(150, 50, 25);

    let first = chunk_text(&text, &opts);
    let second = chunk_text(&text, &opts);
    assert_eq!(first, second);
}

#[test]
fn stored_ranges_are_disjoint_and_contiguous() {
    let text = "This is a test sentence. ".repeat(50);
    let opts = options(150, 50, 25);
    let chunks = chunk_text(&text, &opts);

    for pair in chunks.windows(2) {
        assert_eq!(pair[0].end_position, pair[1].start_position);
        assert!(pair[0].end_position <= pair[1].start_position + opts.overlap_size);
    }

    // Positions describe the actual stored content.
    let chars: Vec<char> = text.chars().collect();
    for chunk in &chunks {
        let expected: String = chars[chunk.start_position..chunk.end_position]
            .iter()
            .collect();
        assert_eq!(chunk.content, expected);
    }
}

#[test]
fn zero_overlap_produces_disjoint_content() {
    let text = "Alpha beta gamma delta. ".repeat(30);
    let opts = options(120, 40, 0);
    let chunks = chunk_text(&text, &opts);

    assert!(chunks.len() > 1);
    for pair in chunks.windows(2) {
        assert_eq!(pair[0].end_position, pair[1].start_position);
    }
    for chunk in &chunks {
        assert!(!chunk.has_overlap);
    }
}

#[test]
fn later_chunks_carry_overlap_flag() {
    let text = "This is a test sentence. ".repeat(50);
    let opts = options(150, 50, 25);
    let chunks = chunk_text(&text, &opts);

    assert!(!chunks[0].has_overlap);
    for chunk in &chunks[1..] {
        assert!(chunk.has_overlap);
    }
}

#[test]
fn zero_min_with_duplicate_boundaries_terminates() {
    // A zero minimum must not let a boundary pinned at the chunk start be
    // re-chosen as an empty cut: duplicate boundaries at one position plus
    // an oversized tail segment used to loop forever here.
    let text = "a".repeat(30);
    let boundaries = vec![
        Boundary {
            position: 5,
            kind: BoundaryKind::Sentence,
            priority: 4,
            context: None,
        },
        Boundary {
            position: 5,
            kind: BoundaryKind::Word,
            priority: 2,
            context: None,
        },
    ];

    let opts = options(10, 0, 0);
    let chunks = assemble_chunks(&text, &boundaries, &opts).expect("valid options");

    assert!(!chunks.is_empty());
    for chunk in &chunks {
        assert!(!chunk.content.is_empty());
        assert!(chunk.character_count <= 10);
    }

    // Nothing is dropped and nothing is duplicated.
    let total: usize = chunks.iter().map(|c| c.character_count).sum();
    assert_eq!(total, 30);
    for pair in chunks.windows(2) {
        assert_eq!(pair[0].end_position, pair[1].start_position);
    }
}

#[test]
fn chunk_counts_reflect_content() {
    let opts = options(150, 5, 0);
    let chunks = chunk_text("one two three four five.", &opts);

    assert_eq!(chunks.len(), 1);
    assert_eq!(chunks[0].word_count, 5);
    assert_eq!(chunks[0].character_count, chunks[0].content.chars().count());
}

#[test]
fn structural_strategy_cuts_at_headers() {
    let body = "x".repeat(200);
    let text = format!("# Alpha\n{body}\n\n## Beta\n{body}\n");
    let boundaries = detect_boundaries(&text, DocumentKind::Markdown);

    let opts = ChunkingOptions {
        max_chunk_size: 250,
        min_chunk_size: 10,
        overlap_size: 0,
        strategy: ChunkingStrategy::Structural,
        ..ChunkingOptions::default()
    };
    let chunks = assemble_chunks(&text, &boundaries, &opts).expect("valid options");

    assert_eq!(chunks.len(), 2);
    assert!(chunks[0].content.starts_with("# Alpha"));
    assert!(chunks[1].content.starts_with("## Beta"));
}

#[test]
fn semantic_strategy_ignores_structural_markers() {
    let text = format!("# Header\n\n{}", "A plain sentence here. ".repeat(20));
    let boundaries = detect_boundaries(&text, DocumentKind::Markdown);

    let opts = ChunkingOptions {
        max_chunk_size: 120,
        min_chunk_size: 30,
        overlap_size: 0,
        strategy: ChunkingStrategy::Semantic,
        ..ChunkingOptions::default()
    };
    let chunks = assemble_chunks(&text, &boundaries, &opts).expect("valid options");

    assert!(chunks.len() > 1);
    for chunk in &chunks {
        assert!(chunk.character_count <= 120);
    }
}

#[test]
fn smart_overlap_prefers_sentence_tails() {
    let overlap = smart_overlap("Some long first part. Short tail here", 20);
    assert_eq!(overlap, "Short tail here");
}

#[test]
fn smart_overlap_falls_back_to_raw_suffix() {
    let overlap = smart_overlap("abcdefghijklmnopqrstuvwxyz", 10);
    assert_eq!(overlap, "qrstuvwxyz");
}

#[test]
fn smart_overlap_zero_size_is_empty() {
    assert_eq!(smart_overlap("Anything at all.", 0), "");
}
