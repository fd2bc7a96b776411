//! Splitting documents into overlapping passages.
//!
//! The split point hierarchy, from most to least preferred: paragraph
//! boundary (blank line), sentence boundary (terminator followed by
//! whitespace), whitespace, hard character cut. The first granularity with a
//! usable split inside the size budget wins. Each chunk after the first is
//! seeded with the trailing `overlap_chars` characters of its predecessor,
//! so adjacent chunks overlap by exactly that amount and removing the seed
//! from every chunk but the first reconstructs the document text.

use crate::config::{ChunkingConfig, ConfigError};
use crate::types::{Chunk, ChunkId, Corpus, Document};

/// Split a document into an ordered corpus of overlapping chunks.
///
/// Fails fast with a configuration error when `overlap_chars` does not
/// leave room for new content per chunk. All offsets are character offsets.
pub fn chunk(document: &Document, config: &ChunkingConfig) -> Result<Corpus, ConfigError> {
    config.validate()?;

    let chars: Vec<char> = document.text.chars().collect();
    let total = chars.len();
    let max = config.max_chunk_chars;
    let overlap = config.overlap_chars;

    let mut chunks = Vec::new();
    let mut start = 0usize;
    let mut next_id = 1u32;

    while start < total {
        let end = if total - start <= max {
            total
        } else {
            // A chunk must extend past the seeded overlap, or the next
            // chunk would start at or before this one.
            find_split(&chars, start, start + max, start + overlap + 1)
        };

        let id = ChunkId::from_u32(next_id).expect("chunk ids start at 1");
        chunks.push(Chunk {
            id,
            text: chars[start..end].iter().collect(),
            page: document.page_at(start),
            char_range: (start, end),
        });
        next_id += 1;

        if end >= total {
            break;
        }
        start = end - overlap;
    }

    tracing::debug!(
        target: "chunker",
        "chunked {} into {} chunks (max {max}, overlap {overlap})",
        document.id,
        chunks.len()
    );

    Ok(Corpus {
        document_id: document.id.clone(),
        chunks,
    })
}

/// Find the best split point in `(min_end..=limit]`.
///
/// Tries each boundary granularity in order and takes the latest usable
/// candidate, falling back to a hard cut at `limit`.
fn find_split(chars: &[char], start: usize, limit: usize, min_end: usize) -> usize {
    if let Some(end) = last_boundary(chars, start, limit, min_end, paragraph_cut) {
        return end;
    }
    if let Some(end) = last_boundary(chars, start, limit, min_end, sentence_cut) {
        return end;
    }
    if let Some(end) = last_boundary(chars, start, limit, min_end, whitespace_cut) {
        return end;
    }
    limit
}

/// Latest cut position produced by `candidate` within `[min_end, limit]`.
fn last_boundary(
    chars: &[char],
    start: usize,
    limit: usize,
    min_end: usize,
    candidate: fn(&[char], usize) -> Option<usize>,
) -> Option<usize> {
    let mut best = None;
    for i in start..limit {
        if let Some(cut) = candidate(chars, i) {
            if cut >= min_end && cut <= limit {
                best = Some(cut);
            }
        }
    }
    best
}

/// Cut after a blank line.
fn paragraph_cut(chars: &[char], i: usize) -> Option<usize> {
    if chars[i] == '\n' && chars.get(i + 1) == Some(&'\n') {
        Some(i + 2)
    } else {
        None
    }
}

/// Cut after a sentence terminator that is followed by whitespace or EOF.
fn sentence_cut(chars: &[char], i: usize) -> Option<usize> {
    let terminator = matches!(chars[i], '.' | '!' | '?');
    let followed_by_break = match chars.get(i + 1) {
        Some(c) => c.is_whitespace(),
        None => true,
    };
    if terminator && followed_by_break {
        Some(i + 1)
    } else {
        None
    }
}

/// Cut after any whitespace character.
fn whitespace_cut(chars: &[char], i: usize) -> Option<usize> {
    if chars[i].is_whitespace() {
        Some(i + 1)
    } else {
        None
    }
}
