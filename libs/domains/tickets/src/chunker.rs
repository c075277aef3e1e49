//! Splits ticket bodies into bounded, optionally overlapping chunks.
//!
//! Sizes are counted in characters, offsets are byte offsets into the body, and every
//! cut lands on a UTF-8 char boundary. Boundaries are searched in the back half of each
//! window, best first: paragraph break, line break, sentence end, any whitespace. When
//! none exists the window is cut hard at `chunk_size` characters.

use crate::error::{IndexerError, IndexerResult};

/// Default chunk size in characters
pub const DEFAULT_CHUNK_SIZE: usize = 5000;

const CODE_FENCE: &str = "```";

/// One segment of a ticket body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextChunk {
    /// Zero-based position in the chunk sequence; stored as `chunk_number`
    pub index: usize,
    pub content: String,
    /// Byte offset of `content` in the body, overlap included
    pub start: usize,
    /// Byte offset one past the end of `content`
    pub end: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextChunker {
    chunk_size: usize,
    overlap: usize,
}

impl Default for TextChunker {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            overlap: 0,
        }
    }
}

impl TextChunker {
    /// `overlap` must be smaller than `chunk_size`
    pub fn new(chunk_size: usize, overlap: usize) -> IndexerResult<Self> {
        if chunk_size == 0 {
            return Err(IndexerError::Configuration(
                "chunk size must be greater than zero".to_string(),
            ));
        }
        if overlap >= chunk_size {
            return Err(IndexerError::Configuration(format!(
                "chunk overlap ({}) must be smaller than chunk size ({})",
                overlap, chunk_size
            )));
        }
        Ok(Self {
            chunk_size,
            overlap,
        })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    /// Split `text` into chunks
    ///
    /// Chunk `0` followed by every later chunk minus its leading overlap reproduces
    /// `text` exactly. Empty input yields no chunks.
    pub fn chunk(&self, text: &str) -> Vec<TextChunk> {
        let mut chunks = Vec::new();
        let mut start = 0;

        while start < text.len() {
            let chunk_start = self.overlap_start(text, start);
            let cut = self.find_cut(text, chunk_start, start);

            chunks.push(TextChunk {
                index: chunks.len(),
                content: text[chunk_start..cut].to_string(),
                start: chunk_start,
                end: cut,
            });
            start = cut;
        }

        chunks
    }

    /// Byte offset `overlap` characters before `start`, clamped to the beginning
    fn overlap_start(&self, text: &str, start: usize) -> usize {
        if self.overlap == 0 || start == 0 {
            return start;
        }
        text[..start]
            .char_indices()
            .rev()
            .nth(self.overlap - 1)
            .map(|(idx, _)| idx)
            .unwrap_or(0)
    }

    /// End of the chunk that begins at `chunk_start` and carries new text from `start`
    fn find_cut(&self, text: &str, chunk_start: usize, start: usize) -> usize {
        let window_end = advance_chars(text, chunk_start, self.chunk_size);
        if window_end >= text.len() {
            return text.len();
        }

        // Back half of the window, never reaching into the overlap
        let search_from = advance_chars(text, chunk_start, self.chunk_size / 2).max(start);
        let region = &text[search_from..window_end];

        let cut = region
            .rfind("\n\n")
            .map(|pos| pos + 2)
            .or_else(|| region.rfind('\n').map(|pos| pos + 1))
            .or_else(|| region.rfind(". ").map(|pos| pos + 2))
            .or_else(|| {
                region
                    .char_indices()
                    .rev()
                    .find(|(_, c)| c.is_whitespace())
                    .map(|(pos, c)| pos + c.len_utf8())
            })
            .map(|rel| search_from + rel)
            .unwrap_or(window_end);

        avoid_open_fence(text, cut, search_from.max(start + 1))
    }
}

/// Byte offset `count` characters after `from`, or the end of `text`
fn advance_chars(text: &str, from: usize, count: usize) -> usize {
    text[from..]
        .char_indices()
        .nth(count)
        .map(|(idx, _)| from + idx)
        .unwrap_or(text.len())
}

/// Move `cut` to just before an unclosed code fence that opens at or after `floor`
fn avoid_open_fence(text: &str, cut: usize, floor: usize) -> usize {
    let before = &text[..cut];
    if before.matches(CODE_FENCE).count() % 2 == 0 {
        return cut;
    }
    match before.rfind(CODE_FENCE) {
        Some(fence) if fence >= floor => fence,
        _ => cut,
    }
}
