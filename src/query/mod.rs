//! Query-time pipeline: retrieval, context assembly, answer synthesis.

pub mod context;
pub mod retriever;
pub mod synthesizer;

pub use context::{AssembledContext, assemble};
pub use retriever::{RetrieveError, Retriever};
pub use synthesizer::{AnswerSynthesizer, REFUSAL_PHRASE};
