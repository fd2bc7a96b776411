//! Document loading boundary.
//!
//! Turns a file on disk into a [`Document`]: raw text plus page-start
//! offsets. Form feed characters (`\u{000C}`, what text extractors emit
//! between pages) act as page separators; the separators themselves are
//! replaced by paragraph breaks so the chunker sees uniform text.

use crate::types::Document;
use std::path::Path;
use thiserror::Error;

/// Errors from document loading.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("document is empty: {0}")]
    Empty(String),
}

/// Separator inserted between pages in the normalized text.
const PAGE_BREAK: &str = "\n\n";

/// Load a UTF-8 text document from disk.
///
/// Pages are delimited by form feeds in the source. The returned document
/// carries the character offset of each page start so chunks can be
/// attributed to pages.
pub fn load(path: &Path) -> Result<Document, LoadError> {
    let raw = std::fs::read_to_string(path)?;
    let id = path.display().to_string();
    from_text(id, &raw)
}

/// Build a document from already-loaded text. Used by `load` and by tests.
pub fn from_text(id: impl Into<String>, raw: &str) -> Result<Document, LoadError> {
    let id = id.into();
    if raw.trim().is_empty() {
        return Err(LoadError::Empty(id));
    }

    let mut text = String::with_capacity(raw.len());
    let mut page_starts = vec![0usize];
    let mut char_count = 0usize;

    for (i, page) in raw.split('\u{000C}').enumerate() {
        if i > 0 {
            text.push_str(PAGE_BREAK);
            char_count += PAGE_BREAK.len();
            page_starts.push(char_count);
        }
        text.push_str(page);
        char_count += page.chars().count();
    }

    tracing::debug!(
        target: "loader",
        "loaded {} ({} chars, {} pages)",
        id,
        char_count,
        page_starts.len()
    );

    Ok(Document {
        id,
        text,
        page_starts,
    })
}
