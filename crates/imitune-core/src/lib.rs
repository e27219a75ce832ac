//! Core data model for imitune.
//!
//! This crate defines the canonical record format shared by the dataset
//! builder and the index pipelines: position-derived record identifiers,
//! dataset generations and their manifests, the row-order fingerprint,
//! readers for the embedding and metadata sources, and the on-disk
//! record store.

#![deny(unsafe_code)]
#![warn(missing_debug_implementations)]

pub mod error;
pub mod fingerprint;
pub mod model;
pub mod source;
pub mod store;

pub use error::{Error, Result};
pub use fingerprint::{FingerprintKey, RowOrderFingerprint};
pub use model::{CanonicalRecord, DatasetGeneration, GenerationManifest, Metadata, RecordId};
pub use source::{EmbeddingMatrix, MetadataRow, MetadataTable};
pub use store::RecordStore;
