//! Ingestion pipeline: corpus in, searchable index out.
//!
//! Embedding requests for different batches are independent, so they are
//! issued with bounded concurrency. Results are reassembled in original
//! chunk order before insertion; entry order affects search tie-breaking,
//! so it must not depend on request completion order.

use crate::config::IndexingConfig;
use crate::index::{IndexEntry, IndexError, VectorIndex};
use crate::provider::{EmbedError, Embedder};
use crate::types::{Chunk, Corpus};
use futures::{StreamExt, stream};
use std::sync::Arc;
use thiserror::Error;

/// Errors from index construction.
#[derive(Error, Debug)]
pub enum BuildError {
    #[error("embedding failed: {0}")]
    Embed(#[from] EmbedError),

    #[error("index rejected entries: {0}")]
    Index(#[from] IndexError),

    #[error("provider returned {actual} vectors for a batch of {expected}")]
    CountMismatch { expected: usize, actual: usize },
}

/// Statistics from a completed build.
#[derive(Debug, Clone, Default)]
pub struct BuildStats {
    /// Number of chunks embedded.
    pub chunks_embedded: usize,
    /// Number of embedding batches issued.
    pub batches: usize,
}

/// Builds a [`VectorIndex`] from a corpus using an [`Embedder`].
pub struct IndexBuilder {
    embedder: Arc<dyn Embedder>,
    batch_size: usize,
    concurrency: usize,
}

impl IndexBuilder {
    pub fn new(embedder: Arc<dyn Embedder>, config: &IndexingConfig) -> Self {
        Self {
            embedder,
            batch_size: config.embed_batch_size.max(1),
            concurrency: config.embed_concurrency.max(1),
        }
    }

    /// Embed every chunk and assemble the index.
    ///
    /// An empty corpus produces an empty, valid index; searching it yields
    /// no results, which downstream turns into a refusal.
    pub async fn build(&self, corpus: Corpus) -> Result<(VectorIndex, BuildStats), BuildError> {
        let corpus = Arc::new(corpus);
        let mut index = VectorIndex::new(corpus.clone(), self.embedder.model_id());

        if corpus.is_empty() {
            return Ok((index, BuildStats::default()));
        }

        let batches: Vec<&[Chunk]> = corpus.chunks.chunks(self.batch_size).collect();
        let total_batches = batches.len();

        tracing::info!(
            target: "index",
            "embedding {} chunks in {} batches (concurrency {})",
            corpus.len(),
            total_batches,
            self.concurrency
        );

        // `buffered` preserves input order even when later batches finish
        // first, keeping entry order equal to corpus order.
        let mut results = stream::iter(batches.into_iter().map(|batch| {
            let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
            let embedder = self.embedder.clone();
            async move {
                let vectors = embedder.embed(&texts).await?;
                Ok::<_, EmbedError>((batch, vectors))
            }
        }))
        .buffered(self.concurrency);

        let mut stats = BuildStats::default();
        while let Some(result) = results.next().await {
            let (batch, vectors) = result?;
            if vectors.len() != batch.len() {
                return Err(BuildError::CountMismatch {
                    expected: batch.len(),
                    actual: vectors.len(),
                });
            }

            let entries: Vec<IndexEntry> = batch
                .iter()
                .zip(vectors)
                .map(|(chunk, vector)| IndexEntry {
                    chunk_id: chunk.id,
                    vector,
                })
                .collect();
            index.add_batch(self.embedder.model_id(), entries)?;

            stats.chunks_embedded += batch.len();
            stats.batches += 1;
            tracing::debug!(
                target: "index",
                "embedded batch {}/{total_batches}",
                stats.batches
            );
        }

        Ok((index, stats))
    }
}
