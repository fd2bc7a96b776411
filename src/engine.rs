//! Operational surface: build an index, ask questions against it.
//!
//! The engine owns the provider clients and the current Ready index. A
//! rebuild constructs a complete new index before swapping it in, so a
//! failed ingestion leaves the previous index authoritative and concurrent
//! queries always observe either the pre- or post-rebuild snapshot.

use crate::chunker;
use crate::config::Settings;
use crate::error::{RagError, RagResult};
use crate::index::{BuildStats, IndexBuilder, VectorIndex};
use crate::provider::{Embedder, Generator};
use crate::query::{AnswerSynthesizer, Retriever, assemble};
use crate::types::{Answer, Document};
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

/// Shared handle to an immutable, searchable index snapshot.
pub type IndexHandle = Arc<VectorIndex>;

/// Per-request diagnostics returned alongside an answer.
///
/// Carries everything a caller needs to inspect a query after the fact, so
/// no process-wide mutable call log exists.
#[derive(Debug, Clone, Default)]
pub struct QueryTrace {
    /// Retrieved passages after threshold filtering: (id, score) in rank
    /// order.
    pub retrieved: Vec<(crate::types::ChunkId, f32)>,

    /// Passages included in the grounding context.
    pub included: Vec<crate::types::ChunkId>,

    /// Passages retrieved but truncated by the context budget.
    pub dropped: Vec<crate::types::ChunkId>,

    /// Size of the assembled context in characters.
    pub context_chars: usize,

    /// Whether the generation provider was actually invoked. False when
    /// the empty-context short-circuit produced the refusal directly.
    pub generator_invoked: bool,
}

/// Ingestion progress, logged per transition. A failure in any phase aborts
/// the build and leaves the previous Ready index untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IngestPhase {
    Chunking,
    Embedding,
    Ready,
}

/// Query progress, logged per transition. Control always returns to idle,
/// whether the query answered or failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum QueryPhase {
    EmbeddingQuery,
    Assembling,
    Generating,
    Answered,
}

/// The question-answering engine.
pub struct Engine {
    embedder: Arc<dyn Embedder>,
    retriever: Retriever,
    synthesizer: AnswerSynthesizer,
    settings: Settings,
    current: RwLock<Option<IndexHandle>>,
}

impl Engine {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        generator: Arc<dyn Generator>,
        settings: Settings,
    ) -> Self {
        Self {
            retriever: Retriever::new(embedder.clone()),
            synthesizer: AnswerSynthesizer::new(generator),
            embedder,
            settings,
            current: RwLock::new(None),
        }
    }

    /// The engine's settings.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Chunk, embed, and index a document, then swap the new index in as
    /// the current one.
    ///
    /// Returns a handle to the new snapshot. On any failure the previously
    /// built index (if one exists) stays current.
    pub async fn build_index(&self, document: Document) -> RagResult<IndexHandle> {
        let (handle, stats) = self.build_detached(&document).await?;

        // Swap only after the build fully succeeded.
        *self.current.write().await = Some(handle.clone());
        tracing::info!(
            target: "engine",
            "index ready for {}: {} chunks embedded in {} batches",
            document.id,
            stats.chunks_embedded,
            stats.batches
        );
        Ok(handle)
    }

    async fn build_detached(&self, document: &Document) -> RagResult<(IndexHandle, BuildStats)> {
        let mut phase = IngestPhase::Chunking;
        tracing::debug!(target: "engine", "ingest phase: {phase:?}");
        let corpus = chunker::chunk(document, &self.settings.chunking)?;

        phase = IngestPhase::Embedding;
        tracing::debug!(target: "engine", "ingest phase: {phase:?}");
        let builder = IndexBuilder::new(self.embedder.clone(), &self.settings.indexing);
        let (index, stats) = builder.build(corpus).await?;

        phase = IngestPhase::Ready;
        tracing::debug!(target: "engine", "ingest phase: {phase:?}");
        Ok((Arc::new(index), stats))
    }

    /// The current Ready index, if any build has succeeded.
    pub async fn current_index(&self) -> Option<IndexHandle> {
        self.current.read().await.clone()
    }

    /// Install a previously persisted index as the current snapshot.
    pub async fn install_index(&self, index: VectorIndex) -> IndexHandle {
        let handle = Arc::new(index);
        *self.current.write().await = Some(handle.clone());
        handle
    }

    /// Answer a question from the given index snapshot.
    ///
    /// Retrieves up to `k` passages scoring at least `score_threshold`,
    /// assembles a bounded context, and synthesizes a grounded answer. A
    /// question the document cannot answer yields the refusal Answer, not
    /// an error.
    pub async fn ask(
        &self,
        index: &IndexHandle,
        question: &str,
        k: usize,
        score_threshold: f32,
    ) -> RagResult<Answer> {
        let (answer, _) = self.ask_traced(index, question, k, score_threshold).await?;
        Ok(answer)
    }

    /// Like [`ask`](Self::ask), additionally returning per-request
    /// diagnostics.
    pub async fn ask_traced(
        &self,
        index: &IndexHandle,
        question: &str,
        k: usize,
        score_threshold: f32,
    ) -> RagResult<(Answer, QueryTrace)> {
        let mut phase = QueryPhase::EmbeddingQuery;
        tracing::debug!(target: "engine", "query phase: {phase:?}");
        let results = self
            .retriever
            .retrieve(index, question, k, score_threshold)
            .await?;

        phase = QueryPhase::Assembling;
        tracing::debug!(target: "engine", "query phase: {phase:?}");
        let context = assemble(&results, self.settings.retrieval.max_context_chars);

        let trace = QueryTrace {
            retrieved: results.iter().map(|r| (r.chunk.id, r.score)).collect(),
            included: context.citations.clone(),
            dropped: context.dropped.clone(),
            context_chars: context.text.chars().count(),
            generator_invoked: !context.is_empty(),
        };

        phase = QueryPhase::Generating;
        tracing::debug!(target: "engine", "query phase: {phase:?}");
        let answer = self.synthesizer.synthesize(question, &context).await?;

        phase = QueryPhase::Answered;
        tracing::debug!(target: "engine", "query phase: {phase:?}");
        Ok((answer, trace))
    }

    /// Like [`ask`](Self::ask), but abandons the query when `cancel` fires.
    ///
    /// Cancellation stops waiting on the provider call; other in-flight
    /// queries are unaffected.
    pub async fn ask_cancellable(
        &self,
        index: &IndexHandle,
        question: &str,
        k: usize,
        score_threshold: f32,
        cancel: &CancellationToken,
    ) -> RagResult<Answer> {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::debug!(target: "engine", "query cancelled for {question:?}");
                Err(RagError::Cancelled)
            }
            result = self.ask(index, question, k, score_threshold) => result,
        }
    }

    /// Answer a question using the engine's configured defaults for `k`
    /// and the score threshold.
    pub async fn ask_with_defaults(
        &self,
        index: &IndexHandle,
        question: &str,
    ) -> RagResult<Answer> {
        self.ask(
            index,
            question,
            self.settings.retrieval.k,
            self.settings.retrieval.score_threshold,
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{EmbedError, MockEmbedder, MockGenerator};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    fn engine_with(generator: MockGenerator) -> Engine {
        Engine::new(
            Arc::new(MockEmbedder::new()),
            Arc::new(generator),
            Settings::default(),
        )
    }

    fn document() -> Document {
        Document::single_page("people", "Alice is a engineer. Bob is a doctor.")
    }

    #[tokio::test]
    async fn test_build_swaps_current_index() {
        let engine = engine_with(MockGenerator::refusing());
        assert!(engine.current_index().await.is_none());

        let handle = engine.build_index(document()).await.unwrap();
        assert!(!handle.is_empty());

        let current = engine.current_index().await.unwrap();
        assert!(Arc::ptr_eq(&handle, &current));
    }

    #[tokio::test]
    async fn test_failed_rebuild_keeps_previous_index() {
        /// Fails every embed call after the first.
        struct FlakyEmbedder {
            inner: MockEmbedder,
            poisoned: AtomicBool,
        }

        #[async_trait]
        impl Embedder for FlakyEmbedder {
            fn model_id(&self) -> &str {
                self.inner.model_id()
            }

            async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
                if self.poisoned.load(Ordering::SeqCst) {
                    return Err(EmbedError::Transient("provider down".to_string()));
                }
                self.inner.embed(texts).await
            }
        }

        let embedder = Arc::new(FlakyEmbedder {
            inner: MockEmbedder::new(),
            poisoned: AtomicBool::new(false),
        });
        let engine = Engine::new(
            embedder.clone(),
            Arc::new(MockGenerator::refusing()),
            Settings::default(),
        );

        let first = engine.build_index(document()).await.unwrap();

        embedder.poisoned.store(true, Ordering::SeqCst);
        let err = engine
            .build_index(Document::single_page("other", "Different text entirely."))
            .await;
        assert!(err.is_err());

        // The previous Ready index is still current.
        let current = engine.current_index().await.unwrap();
        assert!(Arc::ptr_eq(&first, &current));
    }

    #[tokio::test]
    async fn test_ask_returns_grounded_answer() {
        let engine = engine_with(MockGenerator::with_responses(vec!["Bob is a doctor."]));
        let handle = engine.build_index(document()).await.unwrap();

        let answer = engine
            .ask(&handle, "What is Bob's job?", 1, 0.0)
            .await
            .unwrap();
        assert!(answer.grounded);
        assert!(answer.text.contains("doctor"));
        assert!(!answer.citations.is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_ask_stops_waiting() {
        let generator =
            MockGenerator::with_responses(vec!["slow answer"]).with_delay(Duration::from_secs(5));
        let engine = engine_with(generator);
        let handle = engine.build_index(document()).await.unwrap();

        let cancel = CancellationToken::new();
        let canceller = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            canceller.cancel();
        });

        let started = std::time::Instant::now();
        let err = engine
            .ask_cancellable(&handle, "What is Bob's job?", 1, 0.0, &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, RagError::Cancelled));
        assert!(started.elapsed() < Duration::from_secs(2));
    }
}
