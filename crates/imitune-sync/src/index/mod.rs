//! The remote vector index seen by the pipelines.
//!
//! The index is treated as an eventually-consistent key-value store from
//! [`RecordId`] to embedding plus metadata. Writes are accepted before they
//! show up in [`VectorIndex::describe_stats`].

pub mod memory;
pub mod pinecone;

use async_trait::async_trait;
use imitune_core::{CanonicalRecord, RecordId};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::IndexResult;

pub use memory::{IndexCall, MemoryIndex};
pub use pinecone::PineconeIndex;

/// Per-request item limit documented for Pinecone upserts and deletes.
pub const PINECONE_MAX_BATCH: usize = 1000;

/// Aggregate statistics reported by the index.
///
/// Counts lag recent writes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexStats {
    pub total_count: u64,
    pub dimension: Option<usize>,
    pub namespaces: BTreeMap<String, u64>,
}

/// Operations the pipelines consume from a vector index.
#[async_trait]
pub trait VectorIndex: Send + Sync + fmt::Debug {
    /// Name used in logs and prompts.
    fn name(&self) -> &str;

    /// Insert or replace records by id. Repeating an upsert is a no-op.
    async fn upsert(&self, records: &[CanonicalRecord]) -> IndexResult<()>;

    /// Delete records by id. Deleting an absent id is not an error.
    async fn delete(&self, ids: &[RecordId]) -> IndexResult<()>;

    /// Read aggregate statistics.
    async fn describe_stats(&self) -> IndexResult<IndexStats>;

    /// Largest number of records accepted by one upsert.
    fn max_upsert_batch(&self) -> usize {
        PINECONE_MAX_BATCH
    }

    /// Largest number of ids accepted by one delete.
    fn max_delete_batch(&self) -> usize {
        PINECONE_MAX_BATCH
    }
}
