//! Grounded question answering over a single document.
//!
//! The pipeline ingests a document, splits it into overlapping passages,
//! embeds them through an external provider, and builds an exact
//! nearest-neighbor index. Per question it retrieves the top passages,
//! assembles a size-bounded grounding context, and asks a generation
//! provider for an answer restricted to that context, refusing with a
//! fixed phrase when the document does not contain the answer.

pub mod chunker;
pub mod config;
pub mod engine;
pub mod error;
pub mod index;
pub mod loader;
pub mod logging;
pub mod provider;
pub mod query;
pub mod types;

pub use config::Settings;
pub use engine::{Engine, IndexHandle, QueryTrace};
pub use error::{RagError, RagResult};
pub use index::{IndexBuilder, VectorIndex};
pub use query::REFUSAL_PHRASE;
pub use types::{Answer, Chunk, ChunkId, Corpus, Document, RetrievalResult, ScoredChunk};
