//! Query-time retrieval: embed the question, search, filter by threshold.

use crate::index::{IndexError, VectorIndex};
use crate::provider::{EmbedError, Embedder};
use crate::types::{RetrievalResult, ScoredChunk};
use std::sync::Arc;
use thiserror::Error;

/// Errors from retrieval. An empty result set is not an error.
#[derive(Error, Debug)]
pub enum RetrieveError {
    #[error("query embedding failed: {0}")]
    Embed(#[from] EmbedError),

    #[error("index fault: {0}")]
    Index(#[from] IndexError),
}

/// Retrieves the most relevant passages for a question.
pub struct Retriever {
    embedder: Arc<dyn Embedder>,
}

impl Retriever {
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self { embedder }
    }

    /// Embed the query and return up to `k` passages scoring at or above
    /// `score_threshold`.
    ///
    /// An empty index yields an empty result without calling the embedding
    /// provider; the caller turns that into a refusal downstream.
    pub async fn retrieve(
        &self,
        index: &VectorIndex,
        query: &str,
        k: usize,
        score_threshold: f32,
    ) -> Result<RetrievalResult, RetrieveError> {
        if index.is_empty() {
            return Ok(Vec::new());
        }

        if self.embedder.model_id() != index.model_id() {
            return Err(RetrieveError::Index(IndexError::ModelMismatch {
                expected: index.model_id().to_string(),
                actual: self.embedder.model_id().to_string(),
            }));
        }

        let query_batch = [query.to_string()];
        let query_vec = self
            .embedder
            .embed(&query_batch)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| EmbedError::Permanent("provider returned no query vector".into()))?;

        let candidates = index.search(&query_vec, k)?;
        let total = candidates.len();
        let results: Vec<ScoredChunk> = candidates
            .into_iter()
            .filter(|r| r.score >= score_threshold)
            .collect();

        tracing::debug!(
            target: "retrieval",
            "retrieved {}/{total} passages above threshold {score_threshold} for {:?}",
            results.len(),
            query
        );

        Ok(results)
    }
}
