//! Crate-level error aggregation.

use thiserror::Error;

/// Any failure the question-answering pipeline can surface.
///
/// A refusal is not an error: "the document does not contain this" is a
/// normal [`Answer`](crate::types::Answer) with `grounded = false`. These
/// variants all mean the system could not do its job.
#[derive(Error, Debug)]
pub enum RagError {
    #[error("configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    #[error("document load failed: {0}")]
    Load(#[from] crate::loader::LoadError),

    #[error("index build failed: {0}")]
    Build(#[from] crate::index::BuildError),

    #[error("index fault: {0}")]
    Index(#[from] crate::index::IndexError),

    #[error("index persistence failed: {0}")]
    Persist(#[from] crate::index::PersistError),

    #[error("retrieval failed: {0}")]
    Retrieve(#[from] crate::query::RetrieveError),

    #[error("answer generation failed: {0}")]
    Generate(#[from] crate::provider::GenerateError),

    #[error("query was cancelled")]
    Cancelled,
}

/// Result type for pipeline operations.
pub type RagResult<T> = Result<T, RagError>;
