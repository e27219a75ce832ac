//! Readers for the two immutable dataset inputs.

pub mod embeddings;
pub mod metadata;

pub use embeddings::EmbeddingMatrix;
pub use metadata::{MetadataRow, MetadataTable};
