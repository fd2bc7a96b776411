//! Versioned index persistence.
//!
//! The on-disk layout is a JSON envelope stamped with the embedding model
//! identifier and vector dimension. Loading an index built under a
//! different model than the currently configured embedder is a hard error,
//! never a silent re-embed.

use crate::index::{IndexEntry, VectorIndex};
use crate::types::Corpus;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

/// Current persisted layout version.
const LAYOUT_VERSION: u32 = 1;

/// Errors from saving or loading a persisted index.
#[derive(Error, Debug)]
pub enum PersistError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("unsupported index layout version {found} (supported: {LAYOUT_VERSION})")]
    UnsupportedVersion { found: u32 },

    #[error(
        "index was built with embedding model {stored}, but {configured} is configured; rebuild the index"
    )]
    ModelMismatch { stored: String, configured: String },

    #[error("persisted entries disagree with stored dimension {stored}")]
    CorruptDimension { stored: usize },
}

#[derive(Serialize, Deserialize)]
struct PersistedIndex {
    version: u32,
    model_id: String,
    dimension: Option<usize>,
    corpus: Corpus,
    entries: Vec<IndexEntry>,
}

/// Write the index to disk as JSON.
pub fn save(index: &VectorIndex, path: &Path) -> Result<(), PersistError> {
    let state = PersistedIndex {
        version: LAYOUT_VERSION,
        model_id: index.model_id().to_string(),
        dimension: index.dimension(),
        corpus: (**index.corpus()).clone(),
        entries: index.entries().to_vec(),
    };

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let data = serde_json::to_string(&state)?;
    std::fs::write(path, data)?;

    tracing::info!(
        target: "index",
        "saved index ({} entries, model {}) to {}",
        state.entries.len(),
        state.model_id,
        path.display()
    );
    Ok(())
}

/// Load an index from disk, verifying layout version and embedding model.
pub fn load(path: &Path, configured_model: &str) -> Result<VectorIndex, PersistError> {
    let data = std::fs::read_to_string(path)?;
    let state: PersistedIndex = serde_json::from_str(&data)?;

    if state.version != LAYOUT_VERSION {
        return Err(PersistError::UnsupportedVersion {
            found: state.version,
        });
    }
    if state.model_id != configured_model {
        return Err(PersistError::ModelMismatch {
            stored: state.model_id,
            configured: configured_model.to_string(),
        });
    }
    if let Some(dimension) = state.dimension {
        if state.entries.iter().any(|e| e.vector.len() != dimension) {
            return Err(PersistError::CorruptDimension { stored: dimension });
        }
    }

    tracing::info!(
        target: "index",
        "loaded index ({} entries, model {}) from {}",
        state.entries.len(),
        state.model_id,
        path.display()
    );

    Ok(VectorIndex::from_parts(
        Arc::new(state.corpus),
        state.model_id,
        state.dimension,
        state.entries,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Chunk, ChunkId};

    fn sample_index() -> VectorIndex {
        let corpus = Arc::new(Corpus {
            document_id: "doc".to_string(),
            chunks: vec![Chunk {
                id: ChunkId::from_u32(1).unwrap(),
                text: "Bob is a doctor.".to_string(),
                page: 1,
                char_range: (0, 16),
            }],
        });
        let mut index = VectorIndex::new(corpus, "embed-v1");
        index
            .add_batch(
                "embed-v1",
                vec![IndexEntry {
                    chunk_id: ChunkId::from_u32(1).unwrap(),
                    vector: vec![1.0, 0.0],
                }],
            )
            .unwrap();
        index
    }

    #[test]
    fn test_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.json");

        save(&sample_index(), &path).unwrap();
        let loaded = load(&path, "embed-v1").unwrap();

        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded.model_id(), "embed-v1");
        assert_eq!(loaded.dimension(), Some(2));
        let results = loaded.search(&[1.0, 0.0], 1).unwrap();
        assert_eq!(results[0].chunk.text, "Bob is a doctor.");
    }

    #[test]
    fn test_model_mismatch_is_hard_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.json");

        save(&sample_index(), &path).unwrap();
        let err = load(&path, "embed-v2").unwrap_err();
        assert!(matches!(err, PersistError::ModelMismatch { .. }));
    }

    #[test]
    fn test_unsupported_version_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.json");

        std::fs::write(
            &path,
            r#"{"version": 99, "model_id": "embed-v1", "dimension": null, "corpus": {"document_id": "d", "chunks": []}, "entries": []}"#,
        )
        .unwrap();
        let err = load(&path, "embed-v1").unwrap_err();
        assert!(matches!(err, PersistError::UnsupportedVersion { found: 99 }));
    }

    #[test]
    fn test_corrupt_dimension_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.json");

        std::fs::write(
            &path,
            r#"{"version": 1, "model_id": "embed-v1", "dimension": 3,
               "corpus": {"document_id": "d", "chunks": [{"id": 1, "text": "t", "page": 1, "char_range": [0, 1]}]},
               "entries": [{"chunk_id": 1, "vector": [1.0, 0.0]}]}"#,
        )
        .unwrap();
        let err = load(&path, "embed-v1").unwrap_err();
        assert!(matches!(err, PersistError::CorruptDimension { stored: 3 }));
    }
}
