//! Deterministic provider test doubles.
//!
//! `MockEmbedder` hashes word tokens into a fixed number of buckets, so
//! texts that share words get similar vectors. That is enough signal for
//! retrieval tests without a real model. `MockGenerator` replays scripted
//! responses and counts invocations, so tests can assert the provider was
//! (or was not) called.

use super::{EmbedError, Embedder, GenerateError, Generator};
use async_trait::async_trait;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Deterministic bag-of-words embedder.
pub struct MockEmbedder {
    dimension: usize,
    model: String,
    calls: AtomicUsize,
}

impl Default for MockEmbedder {
    fn default() -> Self {
        Self::new()
    }
}

impl MockEmbedder {
    pub fn new() -> Self {
        Self {
            dimension: 128,
            model: "mock-embed-v1".to_string(),
            calls: AtomicUsize::new(0),
        }
    }

    /// Override the reported model identifier.
    pub fn with_model(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..Self::new()
        }
    }

    /// Number of `embed` invocations so far.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];
        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let bucket = fnv1a(&token.to_lowercase()) as usize % self.dimension;
            vector[bucket] += 1.0;
        }

        let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut vector {
                *x /= norm;
            }
        }
        vector
    }
}

#[async_trait]
impl Embedder for MockEmbedder {
    fn model_id(&self) -> &str {
        &self.model
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }
}

/// FNV-1a, inlined so mock vectors are stable across platforms and runs.
fn fnv1a(s: &str) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in s.as_bytes() {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    hash
}

/// What the mock generator does when invoked.
enum GeneratorScript {
    /// Pop responses front to back; repeat the last one when exhausted.
    Responses(Vec<String>),
    /// Always fail with the stored error kind.
    Failing(MockFailure),
}

/// Failure kinds the mock generator can replay.
#[derive(Debug, Clone, Copy)]
pub enum MockFailure {
    Timeout,
    RateLimited,
    Provider,
}

/// Scripted generation provider.
pub struct MockGenerator {
    script: Mutex<GeneratorScript>,
    calls: AtomicUsize,
    delay: Option<Duration>,
    model: String,
}

impl MockGenerator {
    /// Replay the given responses in order, repeating the last.
    pub fn with_responses<S: Into<String>>(responses: Vec<S>) -> Self {
        Self {
            script: Mutex::new(GeneratorScript::Responses(
                responses.into_iter().map(Into::into).collect(),
            )),
            calls: AtomicUsize::new(0),
            delay: None,
            model: "mock-answer-v1".to_string(),
        }
    }

    /// Always answer with the fixed refusal phrase.
    pub fn refusing() -> Self {
        Self::with_responses(vec![crate::query::REFUSAL_PHRASE])
    }

    /// Always fail with the given kind.
    pub fn failing(kind: MockFailure) -> Self {
        Self {
            script: Mutex::new(GeneratorScript::Failing(kind)),
            calls: AtomicUsize::new(0),
            delay: None,
            model: "mock-answer-v1".to_string(),
        }
    }

    /// Sleep before answering, to exercise cancellation paths.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Number of `generate` invocations so far.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Generator for MockGenerator {
    fn model_id(&self) -> &str {
        &self.model
    }

    async fn generate(&self, _prompt: &str) -> Result<String, GenerateError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let mut script = self.script.lock().expect("mock script lock");
        match &mut *script {
            GeneratorScript::Responses(responses) => {
                if responses.len() > 1 {
                    Ok(responses.remove(0))
                } else {
                    responses
                        .first()
                        .cloned()
                        .ok_or_else(|| GenerateError::Provider("script exhausted".to_string()))
                }
            }
            GeneratorScript::Failing(kind) => Err(match kind {
                MockFailure::Timeout => GenerateError::Timeout,
                MockFailure::RateLimited => GenerateError::RateLimited,
                MockFailure::Provider => {
                    GenerateError::Provider("scripted provider failure".to_string())
                }
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_embedder_is_deterministic() {
        let embedder = MockEmbedder::new();
        let texts = vec!["Bob is a doctor.".to_string()];
        let a = embedder.embed(&texts).await.unwrap();
        let b = embedder.embed(&texts).await.unwrap();
        assert_eq!(a, b);
        assert_eq!(embedder.call_count(), 2);
    }

    #[tokio::test]
    async fn test_shared_words_score_higher() {
        let embedder = MockEmbedder::new();
        let vectors = embedder
            .embed(&[
                "Bob is a doctor.".to_string(),
                "Alice is a engineer.".to_string(),
                "What is Bob's job?".to_string(),
            ])
            .await
            .unwrap();

        let sim_bob = crate::index::cosine_similarity(&vectors[2], &vectors[0]);
        let sim_alice = crate::index::cosine_similarity(&vectors[2], &vectors[1]);
        assert!(
            sim_bob > sim_alice,
            "query about Bob should be closer to the Bob sentence ({sim_bob} vs {sim_alice})"
        );
    }

    #[tokio::test]
    async fn test_mock_generator_scripts_responses() {
        let generator = MockGenerator::with_responses(vec!["first", "second"]);
        assert_eq!(generator.generate("q").await.unwrap(), "first");
        assert_eq!(generator.generate("q").await.unwrap(), "second");
        // Last response repeats once exhausted.
        assert_eq!(generator.generate("q").await.unwrap(), "second");
        assert_eq!(generator.call_count(), 3);
    }

    #[tokio::test]
    async fn test_mock_generator_failures() {
        let generator = MockGenerator::failing(MockFailure::RateLimited);
        assert!(matches!(
            generator.generate("q").await,
            Err(GenerateError::RateLimited)
        ));
    }
}
