//! Index synchronisation pipelines for imitune.
//!
//! Builds the canonical artifact from an embedding array and a metadata
//! table, upserts it into a remote vector index, and removes rows that no
//! longer pass a validity predicate. Also provides the staged `sync`
//! workflow as treadle `Stage` implementations.

#![deny(unsafe_code)]
#![warn(missing_debug_implementations)]

pub mod batch;
pub mod builder;
pub mod config;
pub mod confirm;
pub mod credential;
pub mod delete;
pub mod error;
pub mod index;
pub mod pipeline;
pub mod upsert;
pub mod work_item;

pub use batch::{BatchOutcome, BatchReport};
pub use builder::{BuildOutcome, DatasetBuilder};
pub use config::{Config, PipelineConfig};
pub use confirm::{Confirm, FixedAnswer, ScriptedConfirm, TerminalConfirm};
pub use credential::resolve_api_key;
pub use delete::{
    review, DeletionOutcome, DeletionPipeline, DeletionReport, DeletionSet, RequiredField, Review,
    RowValidity,
};
pub use error::{IndexError, IndexResult, SyncError, SyncResult};
pub use index::{IndexStats, MemoryIndex, PineconeIndex, VectorIndex};
pub use pipeline::{build_sync_workflow, reset_state_store, BuildStage, ReportSlot, UpsertStage};
pub use upsert::{UpsertPipeline, UpsertReport};
pub use work_item::SyncJob;
