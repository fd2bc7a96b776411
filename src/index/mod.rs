//! Vector index construction, search, and persistence.

pub mod builder;
pub mod persist;
pub mod vector;

pub use builder::{BuildError, BuildStats, IndexBuilder};
pub use persist::{PersistError, load, save};
pub use vector::{IndexEntry, IndexError, VectorIndex, cosine_similarity};
