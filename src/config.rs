//! Layered configuration for the question-answering pipeline.
//!
//! Resolution order, lowest to highest precedence:
//! - built-in defaults
//! - TOML configuration file (`docqa.toml` by default)
//! - environment variable overrides
//!
//! Environment variables are prefixed with `DOCQA_` and use double
//! underscores to separate nested levels:
//! - `DOCQA_CHUNKING__MAX_CHUNK_CHARS=800`
//! - `DOCQA_PROVIDER__BASE_URL=http://localhost:8080/v1`

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

/// Errors from configuration loading and validation.
///
/// Configuration problems are rejected before any work begins; nothing
/// downstream runs with an invalid configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid chunking configuration: {0}")]
    InvalidChunking(String),

    #[error("invalid configuration for {field}: {reason}")]
    Invalid { field: String, reason: String },

    #[error("configuration error: {0}")]
    Figment(#[from] Box<figment::Error>),
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    /// Chunking configuration.
    #[serde(default)]
    pub chunking: ChunkingConfig,

    /// Retrieval and context assembly configuration.
    #[serde(default)]
    pub retrieval: RetrievalConfig,

    /// Embedding/generation provider configuration.
    #[serde(default)]
    pub provider: ProviderConfig,

    /// Index build configuration.
    #[serde(default)]
    pub indexing: IndexingConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Configuration for splitting documents into overlapping passages.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ChunkingConfig {
    /// Maximum chunk size in characters. Larger text is split.
    #[serde(default = "default_max_chunk_chars")]
    pub max_chunk_chars: usize,

    /// Overlap between adjacent chunks in characters.
    #[serde(default = "default_overlap_chars")]
    pub overlap_chars: usize,
}

/// Configuration for retrieval and context assembly.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RetrievalConfig {
    /// Number of passages to retrieve per question.
    #[serde(default = "default_k")]
    pub k: usize,

    /// Minimum similarity score for a passage to be considered relevant.
    #[serde(default = "default_score_threshold")]
    pub score_threshold: f32,

    /// Maximum grounding context size in characters.
    #[serde(default = "default_max_context_chars")]
    pub max_context_chars: usize,
}

/// Configuration for the external embedding and generation providers.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ProviderConfig {
    /// Base URL of an OpenAI-compatible API.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Embedding model identifier. Also versions the vector index.
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,

    /// Generation model identifier.
    #[serde(default = "default_generation_model")]
    pub generation_model: String,

    /// Environment variable holding the API key, if the provider needs one.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Retry budget for transient provider failures.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Sampling temperature for answer generation.
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum tokens for answer generation.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

/// Configuration for index construction.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct IndexingConfig {
    /// Number of chunks per embedding request.
    #[serde(default = "default_embed_batch_size")]
    pub embed_batch_size: usize,

    /// Concurrent embedding requests in flight during a build.
    #[serde(default = "default_embed_concurrency")]
    pub embed_concurrency: usize,
}

/// Logging configuration: default level plus per-module overrides.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    /// Default log level (error, warn, info, debug, trace).
    #[serde(default = "default_log_level")]
    pub default: String,

    /// Per-module level overrides, e.g. `retrieval = "debug"`.
    #[serde(default)]
    pub modules: HashMap<String, String>,
}

// Default value functions. Chunking and generation defaults follow the
// reference deployment: 1000/100 chunking, k=3, deterministic sampling.
fn default_max_chunk_chars() -> usize {
    1000
}
fn default_overlap_chars() -> usize {
    100
}
fn default_k() -> usize {
    3
}
fn default_score_threshold() -> f32 {
    0.0
}
fn default_max_context_chars() -> usize {
    6000
}
fn default_base_url() -> String {
    "http://localhost:8080/v1".to_string()
}
fn default_embedding_model() -> String {
    "text-embed-v1".to_string()
}
fn default_generation_model() -> String {
    "answer-v1".to_string()
}
fn default_api_key_env() -> String {
    "DOCQA_API_KEY".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_max_retries() -> u32 {
    3
}
fn default_temperature() -> f32 {
    0.0
}
fn default_max_tokens() -> u32 {
    4000
}
fn default_embed_batch_size() -> usize {
    64
}
fn default_embed_concurrency() -> usize {
    4
}
fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            chunking: ChunkingConfig::default(),
            retrieval: RetrievalConfig::default(),
            provider: ProviderConfig::default(),
            indexing: IndexingConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_chunk_chars: default_max_chunk_chars(),
            overlap_chars: default_overlap_chars(),
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            k: default_k(),
            score_threshold: default_score_threshold(),
            max_context_chars: default_max_context_chars(),
        }
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            embedding_model: default_embedding_model(),
            generation_model: default_generation_model(),
            api_key_env: default_api_key_env(),
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
        }
    }
}

impl Default for IndexingConfig {
    fn default() -> Self {
        Self {
            embed_batch_size: default_embed_batch_size(),
            embed_concurrency: default_embed_concurrency(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            default: default_log_level(),
            modules: HashMap::new(),
        }
    }
}

impl ChunkingConfig {
    /// Validate size relations. Overlap must leave room for new content in
    /// every chunk, otherwise chunking cannot make progress.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_chunk_chars == 0 {
            return Err(ConfigError::InvalidChunking(
                "max_chunk_chars must be greater than zero".to_string(),
            ));
        }
        if self.overlap_chars >= self.max_chunk_chars {
            return Err(ConfigError::InvalidChunking(format!(
                "overlap_chars ({}) must be less than max_chunk_chars ({})",
                self.overlap_chars, self.max_chunk_chars
            )));
        }
        Ok(())
    }
}

impl Settings {
    /// Load settings from defaults, an optional TOML file, and environment.
    pub fn load(config_file: Option<&Path>) -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Settings::default()));
        figment = match config_file {
            Some(path) => figment.merge(Toml::file(path)),
            None => figment.merge(Toml::file("docqa.toml")),
        };
        let settings: Settings = figment
            .merge(Env::prefixed("DOCQA_").split("__"))
            .extract()
            .map_err(Box::new)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Validate the full configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.chunking.validate()?;

        if self.retrieval.max_context_chars <= self.chunking.max_chunk_chars {
            return Err(ConfigError::Invalid {
                field: "retrieval.max_context_chars".to_string(),
                reason: format!(
                    "context budget ({}) must exceed max_chunk_chars ({}) so at least one passage fits",
                    self.retrieval.max_context_chars, self.chunking.max_chunk_chars
                ),
            });
        }
        if self.retrieval.k == 0 {
            return Err(ConfigError::Invalid {
                field: "retrieval.k".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.indexing.embed_batch_size == 0 {
            return Err(ConfigError::Invalid {
                field: "indexing.embed_batch_size".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.indexing.embed_concurrency == 0 {
            return Err(ConfigError::Invalid {
                field: "indexing.embed_concurrency".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}
