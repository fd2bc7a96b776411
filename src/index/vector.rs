//! In-memory vector index with exact nearest-neighbor search.
//!
//! The corpus is a single document, so a brute-force cosine scan over all
//! entries is both sufficient and preferable to an approximate index:
//! exactness never silently drops the correct passage. The index is
//! read-only once built; rebuilds produce a fresh index that callers swap
//! in wholesale.

use crate::types::{ChunkId, Corpus, RetrievalResult, ScoredChunk};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

/// Errors from vector index operations.
///
/// "No results" is not an error; these guard against index corruption.
#[derive(Error, Debug)]
pub enum IndexError {
    #[error("vector dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("embedding model mismatch: index built with {expected}, got {actual}")]
    ModelMismatch { expected: String, actual: String },

    #[error("entry references unknown chunk {0}")]
    UnknownChunk(ChunkId),
}

/// A chunk id paired with its embedding vector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexEntry {
    pub chunk_id: ChunkId,
    pub vector: Vec<f32>,
}

/// Vector store for one corpus, searchable by cosine similarity.
#[derive(Debug)]
pub struct VectorIndex {
    corpus: Arc<Corpus>,
    model_id: String,
    /// Established by the first batch; all later vectors must match.
    dimension: Option<usize>,
    entries: Vec<IndexEntry>,
}

impl VectorIndex {
    /// Create an empty index over a corpus for the given embedding model.
    pub fn new(corpus: Arc<Corpus>, model_id: impl Into<String>) -> Self {
        Self {
            corpus,
            model_id: model_id.into(),
            dimension: None,
            entries: Vec::new(),
        }
    }

    /// Rebuild an index from persisted parts.
    pub(crate) fn from_parts(
        corpus: Arc<Corpus>,
        model_id: String,
        dimension: Option<usize>,
        entries: Vec<IndexEntry>,
    ) -> Self {
        Self {
            corpus,
            model_id,
            dimension,
            entries,
        }
    }

    /// Append a batch of entries declared to come from `model_id`.
    ///
    /// The first vector establishes the index dimension; any later
    /// disagreement in dimension or model identifier is rejected rather
    /// than silently tolerated.
    pub fn add_batch(
        &mut self,
        model_id: &str,
        entries: Vec<IndexEntry>,
    ) -> Result<(), IndexError> {
        if model_id != self.model_id {
            return Err(IndexError::ModelMismatch {
                expected: self.model_id.clone(),
                actual: model_id.to_string(),
            });
        }

        for entry in &entries {
            if self.corpus.get(entry.chunk_id).is_none() {
                return Err(IndexError::UnknownChunk(entry.chunk_id));
            }
            match self.dimension {
                None => self.dimension = Some(entry.vector.len()),
                Some(expected) if entry.vector.len() != expected => {
                    return Err(IndexError::DimensionMismatch {
                        expected,
                        actual: entry.vector.len(),
                    });
                }
                Some(_) => {}
            }
        }

        self.entries.extend(entries);
        Ok(())
    }

    /// Exact k-nearest-neighbor search by cosine similarity.
    ///
    /// Returns `min(k, len)` results sorted by non-increasing score; equal
    /// scores are broken by ascending chunk id so repeated searches are
    /// reproducible. Asking for more results than entries is not an error.
    pub fn search(&self, query: &[f32], k: usize) -> Result<RetrievalResult, IndexError> {
        if self.entries.is_empty() || k == 0 {
            return Ok(Vec::new());
        }

        if let Some(expected) = self.dimension {
            if query.len() != expected {
                return Err(IndexError::DimensionMismatch {
                    expected,
                    actual: query.len(),
                });
            }
        }

        let mut scored: Vec<(ChunkId, f32)> = self
            .entries
            .iter()
            .map(|entry| (entry.chunk_id, cosine_similarity(query, &entry.vector)))
            .collect();

        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.0.cmp(&b.0))
        });
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(chunk_id, score)| ScoredChunk {
                chunk: self
                    .corpus
                    .get(chunk_id)
                    .expect("entries are validated against the corpus on add")
                    .clone(),
                score,
            })
            .collect())
    }

    /// The embedding model this index was built with.
    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    /// Established vector dimension, if any entries exist.
    pub fn dimension(&self) -> Option<usize> {
        self.dimension
    }

    /// Number of indexed entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the index holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The corpus this index searches over.
    pub fn corpus(&self) -> &Arc<Corpus> {
        &self.corpus
    }

    pub(crate) fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }
}

/// Cosine similarity between two vectors. Zero-magnitude vectors score 0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let magnitude_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let magnitude_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if magnitude_a == 0.0 || magnitude_b == 0.0 {
        return 0.0;
    }

    dot_product / (magnitude_a * magnitude_b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Chunk;

    fn corpus(n: u32) -> Arc<Corpus> {
        Arc::new(Corpus {
            document_id: "doc".to_string(),
            chunks: (1..=n)
                .map(|i| Chunk {
                    id: ChunkId::from_u32(i).unwrap(),
                    text: format!("chunk {i}"),
                    page: 1,
                    char_range: (0, 7),
                })
                .collect(),
        })
    }

    fn entry(id: u32, vector: Vec<f32>) -> IndexEntry {
        IndexEntry {
            chunk_id: ChunkId::from_u32(id).unwrap(),
            vector,
        }
    }

    #[test]
    fn test_cosine_similarity() {
        let v1 = vec![1.0, 0.0, 0.0];
        assert!((cosine_similarity(&v1, &[1.0, 0.0, 0.0]) - 1.0).abs() < 0.001);
        assert!((cosine_similarity(&v1, &[0.0, 1.0, 0.0])).abs() < 0.001);
        assert!((cosine_similarity(&v1, &[-1.0, 0.0, 0.0]) + 1.0).abs() < 0.001);
        assert_eq!(cosine_similarity(&v1, &[0.0, 0.0, 0.0]), 0.0);
    }

    #[test]
    fn test_search_returns_min_k_n() {
        let mut index = VectorIndex::new(corpus(3), "m");
        index
            .add_batch(
                "m",
                vec![
                    entry(1, vec![1.0, 0.0]),
                    entry(2, vec![0.0, 1.0]),
                    entry(3, vec![0.7, 0.7]),
                ],
            )
            .unwrap();

        assert_eq!(index.search(&[1.0, 0.0], 2).unwrap().len(), 2);
        // k larger than the index returns everything, not an error.
        assert_eq!(index.search(&[1.0, 0.0], 10).unwrap().len(), 3);
    }

    #[test]
    fn test_search_sorted_descending() {
        let mut index = VectorIndex::new(corpus(3), "m");
        index
            .add_batch(
                "m",
                vec![
                    entry(1, vec![0.0, 1.0]),
                    entry(2, vec![1.0, 0.0]),
                    entry(3, vec![0.9, 0.1]),
                ],
            )
            .unwrap();

        let results = index.search(&[1.0, 0.0], 3).unwrap();
        assert_eq!(results[0].chunk.id.value(), 2);
        assert_eq!(results[1].chunk.id.value(), 3);
        assert_eq!(results[2].chunk.id.value(), 1);
        for pair in results.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
    }

    #[test]
    fn test_ties_broken_by_ascending_chunk_id() {
        let mut index = VectorIndex::new(corpus(3), "m");
        // Insert out of id order with identical vectors: scores all tie.
        index
            .add_batch(
                "m",
                vec![
                    entry(3, vec![1.0, 0.0]),
                    entry(1, vec![1.0, 0.0]),
                    entry(2, vec![1.0, 0.0]),
                ],
            )
            .unwrap();

        let results = index.search(&[1.0, 0.0], 3).unwrap();
        let ids: Vec<u32> = results.iter().map(|r| r.chunk.id.value()).collect();
        assert_eq!(ids, vec![1, 2, 3]);

        // Deterministic across repeated runs.
        let again: Vec<u32> = index
            .search(&[1.0, 0.0], 3)
            .unwrap()
            .iter()
            .map(|r| r.chunk.id.value())
            .collect();
        assert_eq!(ids, again);
    }

    #[test]
    fn test_unique_ids_in_results() {
        let mut index = VectorIndex::new(corpus(4), "m");
        index
            .add_batch(
                "m",
                (1..=4).map(|i| entry(i, vec![i as f32, 1.0])).collect(),
            )
            .unwrap();

        let results = index.search(&[1.0, 1.0], 4).unwrap();
        let mut ids: Vec<u32> = results.iter().map(|r| r.chunk.id.value()).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), 4);
    }

    #[test]
    fn test_dimension_mismatch_on_add() {
        let mut index = VectorIndex::new(corpus(2), "m");
        index.add_batch("m", vec![entry(1, vec![1.0, 0.0])]).unwrap();

        let err = index
            .add_batch("m", vec![entry(2, vec![1.0, 0.0, 0.0])])
            .unwrap_err();
        assert!(matches!(
            err,
            IndexError::DimensionMismatch {
                expected: 2,
                actual: 3
            }
        ));
    }

    #[test]
    fn test_dimension_mismatch_on_search() {
        let mut index = VectorIndex::new(corpus(1), "m");
        index.add_batch("m", vec![entry(1, vec![1.0, 0.0])]).unwrap();

        assert!(matches!(
            index.search(&[1.0, 0.0, 0.0], 1),
            Err(IndexError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_model_mismatch_rejected() {
        let mut index = VectorIndex::new(corpus(1), "model-a");
        let err = index
            .add_batch("model-b", vec![entry(1, vec![1.0])])
            .unwrap_err();
        assert!(matches!(err, IndexError::ModelMismatch { .. }));
    }

    #[test]
    fn test_unknown_chunk_rejected() {
        let mut index = VectorIndex::new(corpus(1), "m");
        let err = index.add_batch("m", vec![entry(9, vec![1.0])]).unwrap_err();
        assert!(matches!(err, IndexError::UnknownChunk(_)));
    }

    #[test]
    fn test_empty_index_search_is_empty() {
        let index = VectorIndex::new(corpus(0), "m");
        assert!(index.search(&[1.0, 0.0], 5).unwrap().is_empty());
    }
}
