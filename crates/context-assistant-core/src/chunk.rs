//! Paragraph-boundary text chunker.
//!
//! Splits document text into spans that respect a `max_tokens` budget.
//! Splitting occurs on paragraph boundaries (`\n\n`) to keep each span
//! coherent; oversized paragraphs are hard-split at the nearest newline or
//! space.
//!
//! # Algorithm
//!
//! 1. Convert `max_tokens` to `max_chars` using a 4 chars/token ratio.
//! 2. Split text on `\n\n` paragraph boundaries.
//! 3. Accumulate paragraphs into a buffer until adding the next paragraph
//!    would exceed `max_chars`, then flush.
//! 4. A single paragraph longer than `max_chars` is hard-split at a
//!    newline or space boundary (never inside a UTF-8 character).
//!
//! # Example
//!
//! ```rust
//! use context_assistant_core::capability::DocumentChunker;
//! use context_assistant_core::chunk::ParagraphChunker;
//!
//! let chunker = ParagraphChunker::new(700);
//! let spans = chunker.chunk("Hello world.\n\nSecond paragraph.");
//! assert_eq!(spans.len(), 1);
//! ```

use crate::capability::DocumentChunker;

/// Approximate characters-per-token ratio.
const CHARS_PER_TOKEN: usize = 4;

/// [`DocumentChunker`] that packs paragraphs up to a token budget.
#[derive(Debug, Clone, Copy)]
pub struct ParagraphChunker {
    max_tokens: usize,
}

impl ParagraphChunker {
    pub fn new(max_tokens: usize) -> Self {
        Self {
            max_tokens: max_tokens.max(1),
        }
    }
}

impl DocumentChunker for ParagraphChunker {
    fn chunk(&self, document: &str) -> Vec<String> {
        chunk_text(document, self.max_tokens)
    }
}

/// Split text into spans on paragraph boundaries, respecting `max_tokens`.
///
/// Whitespace-only input yields no spans.
pub fn chunk_text(text: &str, max_tokens: usize) -> Vec<String> {
    let max_chars = max_tokens.max(1) * CHARS_PER_TOKEN;

    let mut chunks = Vec::new();
    let mut current_buf = String::new();

    for para in text.split("\n\n") {
        let trimmed = para.trim();
        if trimmed.is_empty() {
            continue;
        }

        let would_be = if current_buf.is_empty() {
            trimmed.len()
        } else {
            current_buf.len() + 2 + trimmed.len()
        };

        if would_be > max_chars && !current_buf.is_empty() {
            chunks.push(std::mem::take(&mut current_buf));
        }

        if trimmed.len() > max_chars {
            let mut remaining = trimmed;
            while !remaining.is_empty() {
                let split_at = split_point(remaining, max_chars);
                let piece = remaining[..split_at].trim();
                if !piece.is_empty() {
                    chunks.push(piece.to_string());
                }
                remaining = &remaining[split_at..];
            }
        } else {
            if !current_buf.is_empty() {
                current_buf.push_str("\n\n");
            }
            current_buf.push_str(trimmed);
        }
    }

    if !current_buf.is_empty() {
        chunks.push(current_buf);
    }

    chunks
}

/// Byte offset at which to cut `s` so the head is at most `max_chars` bytes,
/// preferring a newline or space and always landing on a char boundary.
fn split_point(s: &str, max_chars: usize) -> usize {
    if s.len() <= max_chars {
        return s.len();
    }
    let mut limit = max_chars;
    while !s.is_char_boundary(limit) {
        limit -= 1;
    }
    if limit == 0 {
        // A single character wider than the budget.
        return s.chars().next().map(char::len_utf8).unwrap_or(s.len());
    }
    s[..limit]
        .rfind('\n')
        .or_else(|| s[..limit].rfind(' '))
        .map(|pos| pos + 1)
        .unwrap_or(limit)
}
