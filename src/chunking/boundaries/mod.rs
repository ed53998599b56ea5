
use crate::chunking::{Boundary, BoundaryKind};
use crate::extract::DocumentKind;

/// Produce the sorted boundary list for a text of the given kind.
///
/// All positions are character offsets into `text`. The list is sorted
/// ascending by position; several boundaries may share a position and are
/// distinguished by kind.
#[inline]
pub fn detect_boundaries(text: &str, kind: DocumentKind) -> Vec<Boundary> {
    let chars: Vec<char> = text.chars().collect();
    let mut boundaries = Vec::new();

    match kind {
        DocumentKind::Markdown => {
            detect_markdown_lines(&chars, &mut boundaries);
            detect_whitespace_breaks(&chars, true, &mut boundaries);
        }
        DocumentKind::Pdf => {
            detect_page_breaks(&chars, BoundaryKind::Page, 9, &mut boundaries);
            detect_caps_lines(&chars, BoundaryKind::Section, 7, &mut boundaries);
            detect_whitespace_breaks(&chars, false, &mut boundaries);
            detect_sentence_ends(&chars, &mut boundaries);
        }
        DocumentKind::Docx => {
            detect_page_breaks(&chars, BoundaryKind::Section, 8, &mut boundaries);
            detect_caps_lines(&chars, BoundaryKind::Header, 7, &mut boundaries);
            detect_whitespace_breaks(&chars, false, &mut boundaries);
            detect_sentence_ends(&chars, &mut boundaries);
        }
        DocumentKind::Text => {
            detect_whitespace_breaks(&chars, false, &mut boundaries);
            detect_sentence_ends(&chars, &mut boundaries);
            detect_word_breaks(&chars, &mut boundaries);
        }
    }

    boundaries.sort_by_key(|b| b.position);
    boundaries
}

/// Markdown line markers: ATX headers, code fences, list items.
fn detect_markdown_lines(chars: &[char], out: &mut Vec<Boundary>) {
    for (start, line) in lines_with_offsets(chars) {
        let trimmed_start = line.iter().take_while(|c| **c == ' ').count();
        if trimmed_start > 3 {
            continue;
        }
        let body = &line[trimmed_start..];

        if let Some(level) = atx_header_level(body) {
            out.push(Boundary {
                position: start,
                kind: BoundaryKind::Header,
                priority: 10 - level,
                context: Some(line.iter().collect::<String>().trim().to_string()),
            });
        } else if body.len() >= 3 && body[..3].iter().all(|c| *c == '`') {
            out.push(Boundary {
                position: start,
                kind: BoundaryKind::CodeBlock,
                priority: 8,
                context: None,
            });
        } else if is_unordered_list_marker(body) || is_ordered_list_marker(body) {
            out.push(Boundary {
                position: start,
                kind: BoundaryKind::ListItem,
                priority: 6,
                context: None,
            });
        }
    }
}

/// ATX header level 1..=6, or None when the line is not a header.
fn atx_header_level(body: &[char]) -> Option<u8> {
    let hashes = body.iter().take_while(|c| **c == '#').count();
    if (1..=6).contains(&hashes) && body.get(hashes).is_some_and(|c| *c == ' ') {
        Some(hashes as u8)
    } else {
        None
    }
}

fn is_unordered_list_marker(body: &[char]) -> bool {
    matches!(body.first(), Some('-' | '*' | '+')) && body.get(1).is_some_and(|c| *c == ' ')
}

fn is_ordered_list_marker(body: &[char]) -> bool {
    let digits = body.iter().take_while(|c| c.is_ascii_digit()).count();
    digits > 0
        && matches!(body.get(digits), Some('.' | ')'))
        && body.get(digits + 1).is_some_and(|c| *c == ' ')
}

/// Form-feed page or section breaks. The boundary sits after the `\f`.
fn detect_page_breaks(chars: &[char], kind: BoundaryKind, priority: u8, out: &mut Vec<Boundary>) {
    for (i, c) in chars.iter().enumerate() {
        if *c == '\u{c}' {
            out.push(Boundary {
                position: i + 1,
                kind,
                priority,
                context: None,
            });
        }
    }
}

/// ALL-CAPS lines of 6..=99 characters, treated as section headings.
fn detect_caps_lines(chars: &[char], kind: BoundaryKind, priority: u8, out: &mut Vec<Boundary>) {
    for (start, line) in lines_with_offsets(chars) {
        let text: String = line.iter().collect::<String>().trim().to_string();
        let len = text.chars().count();
        if !(6..=99).contains(&len) {
            continue;
        }
        let has_alpha = text.chars().any(|c| c.is_alphabetic());
        let all_upper = text.chars().filter(|c| c.is_alphabetic()).all(|c| c.is_uppercase());
        if has_alpha && all_upper {
            out.push(Boundary {
                position: start,
                kind,
                priority,
                context: Some(text),
            });
        }
    }
}

/// Paragraph breaks (a whitespace run containing two or more newlines) and,
/// when `single_newlines` is set, line boundaries after lone newlines.
/// Boundaries sit after the whole whitespace run.
fn detect_whitespace_breaks(chars: &[char], single_newlines: bool, out: &mut Vec<Boundary>) {
    let mut i = 0;
    while i < chars.len() {
        if !chars[i].is_whitespace() {
            i += 1;
            continue;
        }

        let mut newlines = 0;
        while i < chars.len() && chars[i].is_whitespace() {
            if chars[i] == '\n' {
                newlines += 1;
            }
            i += 1;
        }

        if newlines >= 2 {
            out.push(Boundary {
                position: i,
                kind: BoundaryKind::Paragraph,
                priority: 5,
                context: None,
            });
        } else if single_newlines && newlines == 1 {
            out.push(Boundary {
                position: i,
                kind: BoundaryKind::Line,
                priority: 3,
                context: None,
            });
        }
    }
}

/// Sentence terminators followed by whitespace. The boundary sits at the
/// start of the next sentence.
fn detect_sentence_ends(chars: &[char], out: &mut Vec<Boundary>) {
    let mut i = 0;
    while i < chars.len() {
        if matches!(chars[i], '.' | '!' | '?') && chars.get(i + 1).is_some_and(|c| c.is_whitespace())
        {
            let mut j = i + 1;
            while j < chars.len() && chars[j].is_whitespace() {
                j += 1;
            }
            out.push(Boundary {
                position: j,
                kind: BoundaryKind::Sentence,
                priority: 4,
                context: None,
            });
            i = j;
        } else {
            i += 1;
        }
    }
}

/// Any whitespace run, as a last-resort word boundary.
fn detect_word_breaks(chars: &[char], out: &mut Vec<Boundary>) {
    let mut i = 0;
    while i < chars.len() {
        if chars[i].is_whitespace() {
            let mut j = i;
            while j < chars.len() && chars[j].is_whitespace() {
                j += 1;
            }
            out.push(Boundary {
                position: j,
                kind: BoundaryKind::Word,
                priority: 2,
                context: None,
            });
            i = j;
        } else {
            i += 1;
        }
    }
}

/// Iterate lines as `(start_char_offset, line_chars)` without the newline.
fn lines_with_offsets(chars: &[char]) -> impl Iterator<Item = (usize, &[char])> {
    let mut offsets = Vec::new();
    let mut line_start = 0;
    for (i, c) in chars.iter().enumerate() {
        if *c == '\n' {
            offsets.push((line_start, &chars[line_start..i]));
            line_start = i + 1;
        }
    }
    if line_start < chars.len() {
        offsets.push((line_start, &chars[line_start..]));
    }
    offsets.into_iter()
}
