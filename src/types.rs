//! Core types for document ingestion and retrieval.

use serde::{Deserialize, Serialize};
use std::num::NonZeroU32;

/// Unique identifier for a passage within a corpus.
///
/// Ids are assigned monotonically during chunking, so ascending id order
/// equals source order. Search tie-breaking relies on this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChunkId(NonZeroU32);

impl ChunkId {
    /// Create a new ChunkId from a non-zero value.
    pub fn new(value: NonZeroU32) -> Self {
        Self(value)
    }

    /// Create a ChunkId from a u32, returning None if zero.
    pub fn from_u32(value: u32) -> Option<Self> {
        NonZeroU32::new(value).map(Self)
    }

    /// Get the inner value as u32.
    pub fn value(&self) -> u32 {
        self.0.get()
    }
}

impl std::fmt::Display for ChunkId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.get())
    }
}

/// A loaded document: raw text plus position markers.
///
/// `page_starts` holds the character offset of each page start in ascending
/// order, beginning with 0. Offsets throughout the crate are character
/// offsets, not byte offsets.
#[derive(Debug, Clone)]
pub struct Document {
    /// Stable identifier, typically the source path.
    pub id: String,

    /// Full document text.
    pub text: String,

    /// Character offsets where each page begins. First entry is always 0.
    pub page_starts: Vec<usize>,
}

impl Document {
    /// Create a single-page document.
    pub fn single_page(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            page_starts: vec![0],
        }
    }

    /// Create a document with explicit page start offsets.
    pub fn with_pages(id: impl Into<String>, text: impl Into<String>, page_starts: Vec<usize>) -> Self {
        let page_starts = if page_starts.is_empty() {
            vec![0]
        } else {
            page_starts
        };
        Self {
            id: id.into(),
            text: text.into(),
            page_starts,
        }
    }

    /// 1-based page number containing the given character offset.
    pub fn page_at(&self, char_offset: usize) -> u32 {
        let preceding = self
            .page_starts
            .iter()
            .take_while(|start| **start <= char_offset)
            .count();
        preceding.max(1) as u32
    }
}

/// An immutable passage of source text with position metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// Unique identifier within the corpus.
    pub id: ChunkId,

    /// The text content of this passage.
    pub text: String,

    /// 1-based page number where this passage starts.
    pub page: u32,

    /// Character range in the source document (start, end). Adjacent chunks
    /// have overlapping ranges because each chunk is seeded with the tail of
    /// its predecessor.
    pub char_range: (usize, usize),
}

impl Chunk {
    /// Get the length of the content in characters.
    pub fn char_count(&self) -> usize {
        self.text.chars().count()
    }
}

/// The ordered sequence of chunks produced from one document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Corpus {
    /// Identifier of the source document.
    pub document_id: String,

    /// Chunks in source order (ascending id).
    pub chunks: Vec<Chunk>,
}

impl Corpus {
    /// Number of chunks.
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    /// Whether the corpus has no chunks.
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Look up a chunk by id.
    pub fn get(&self, id: ChunkId) -> Option<&Chunk> {
        // Ids are monotonic in source order, so a binary search suffices.
        self.chunks
            .binary_search_by_key(&id, |c| c.id)
            .ok()
            .map(|i| &self.chunks[i])
    }
}

/// A retrieved passage with its similarity score.
#[derive(Debug, Clone)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    /// Cosine similarity in [-1, 1].
    pub score: f32,
}

/// Ranked retrieval output: passages in non-increasing score order.
pub type RetrievalResult = Vec<ScoredChunk>;

/// A synthesized answer to a question.
#[derive(Debug, Clone, PartialEq)]
pub struct Answer {
    /// The answer text, or the refusal phrase.
    pub text: String,

    /// False when the system declined to answer from the document.
    pub grounded: bool,

    /// Chunks the answer is grounded in. Empty when refused.
    pub citations: Vec<ChunkId>,
}

impl Answer {
    /// The fixed refusal answer.
    pub fn refusal() -> Self {
        Self {
            text: crate::query::REFUSAL_PHRASE.to_string(),
            grounded: false,
            citations: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_id_zero_returns_none() {
        assert!(ChunkId::from_u32(0).is_none());
        assert_eq!(ChunkId::from_u32(42).unwrap().value(), 42);
    }

    #[test]
    fn test_chunk_id_ordering_follows_value() {
        let a = ChunkId::from_u32(1).unwrap();
        let b = ChunkId::from_u32(2).unwrap();
        assert!(a < b);
    }

    #[test]
    fn test_page_at_single_page() {
        let doc = Document::single_page("doc", "hello world");
        assert_eq!(doc.page_at(0), 1);
        assert_eq!(doc.page_at(10), 1);
    }

    #[test]
    fn test_page_at_multiple_pages() {
        let doc = Document::with_pages("doc", "a".repeat(30), vec![0, 10, 20]);
        assert_eq!(doc.page_at(0), 1);
        assert_eq!(doc.page_at(9), 1);
        assert_eq!(doc.page_at(10), 2);
        assert_eq!(doc.page_at(25), 3);
    }

    #[test]
    fn test_corpus_get_by_id() {
        let corpus = Corpus {
            document_id: "doc".to_string(),
            chunks: vec![
                Chunk {
                    id: ChunkId::from_u32(1).unwrap(),
                    text: "first".to_string(),
                    page: 1,
                    char_range: (0, 5),
                },
                Chunk {
                    id: ChunkId::from_u32(2).unwrap(),
                    text: "second".to_string(),
                    page: 1,
                    char_range: (3, 9),
                },
            ],
        };

        assert_eq!(corpus.get(ChunkId::from_u32(2).unwrap()).unwrap().text, "second");
        assert!(corpus.get(ChunkId::from_u32(9).unwrap()).is_none());
    }
}
