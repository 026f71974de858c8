//! Sliding-window text chunker.
//!
//! Splits extracted document text into overlapping [`Chunk`]s of a fixed
//! number of characters. Windows are measured in Unicode scalar values, so a
//! multi-byte character is never cut in half.
//!
//! Consecutive windows start `chunk_chars - overlap_chars` characters apart,
//! which keeps sentences that straddle a boundary retrievable from either
//! side.

use uuid::Uuid;

use crate::models::Chunk;

/// Split text into overlapping character windows.
///
/// Each window is trimmed; windows that are blank after trimming are
/// dropped. Returns chunks with contiguous indices starting at 0, or an
/// empty vector when the text holds nothing but whitespace.
///
/// `overlap_chars` must be smaller than `chunk_chars` (enforced by config
/// validation); a larger value is clamped so the window always advances.
pub fn chunk_text(
    document_id: &str,
    text: &str,
    chunk_chars: usize,
    overlap_chars: usize,
) -> Vec<Chunk> {
    let chunk_chars = chunk_chars.max(1);
    let step = chunk_chars.saturating_sub(overlap_chars).max(1);

    // Byte offset of every char, plus the end of the string, so windows can
    // be sliced without re-walking the text.
    let boundaries: Vec<usize> = text
        .char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(text.len()))
        .collect();
    let char_count = boundaries.len() - 1;

    let mut chunks = Vec::new();
    let mut chunk_index: i64 = 0;
    let mut start = 0;

    while start < char_count {
        let end = (start + chunk_chars).min(char_count);
        let window = text[boundaries[start]..boundaries[end]].trim();
        if !window.is_empty() {
            chunks.push(make_chunk(document_id, chunk_index, window));
            chunk_index += 1;
        }
        start += step;
    }

    chunks
}

fn make_chunk(document_id: &str, index: i64, text: &str) -> Chunk {
    Chunk {
        id: Uuid::new_v4().to_string(),
        document_id: document_id.to_string(),
        chunk_index: index,
        text: text.to_string(),
    }
}
