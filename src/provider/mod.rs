//! External model providers.
//!
//! The pipeline talks to two capabilities: text-to-vector embedding and
//! prompt-to-text generation. Both are consumed through traits so concrete
//! providers (HTTP services, test doubles) are substitutable without the
//! core depending on provider wire shapes.

pub mod http;
pub mod mock;

pub use http::{HttpEmbedder, HttpGenerator};
pub use mock::{MockEmbedder, MockFailure, MockGenerator};

use async_trait::async_trait;
use thiserror::Error;

/// Errors from the embedding provider.
///
/// Transient failures (rate limits, upstream hiccups, timeouts) are safe to
/// retry; permanent failures (malformed input, authentication) are not.
#[derive(Error, Debug)]
pub enum EmbedError {
    #[error("transient embedding failure: {0}")]
    Transient(String),

    #[error("permanent embedding failure: {0}")]
    Permanent(String),
}

impl EmbedError {
    /// Whether a retry could reasonably succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

/// Errors from the generation provider.
///
/// Never converted into a refusal answer: callers must be able to tell
/// "could not ask" apart from "the document does not contain this".
#[derive(Error, Debug)]
pub enum GenerateError {
    #[error("generation request timed out")]
    Timeout,

    #[error("generation provider rate limited the request")]
    RateLimited,

    #[error("generation provider failure: {0}")]
    Provider(String),
}

/// Converts text into fixed-dimension vectors.
///
/// Implementations must be order-preserving (one vector per input, same
/// order) and deterministic for identical text and model version. Batch
/// calls are preferred over one-at-a-time calls.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Identifier of the embedding model. Vectors from different model
    /// identifiers must never be mixed in one index.
    fn model_id(&self) -> &str;

    /// Embed a batch of texts.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError>;
}

/// Produces text from a prompt.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Identifier of the generation model.
    fn model_id(&self) -> &str;

    /// Generate a completion for the prompt.
    async fn generate(&self, prompt: &str) -> Result<String, GenerateError>;
}
