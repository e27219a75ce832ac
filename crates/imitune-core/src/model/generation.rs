use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::CanonicalRecord;
use crate::error::{Error, Result};
use crate::fingerprint::RowOrderFingerprint;

/// An ordered, dimension-checked sequence of canonical records.
///
/// A generation is never mutated after construction; rebuilding the dataset
/// produces a new generation and a new persisted artifact.
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetGeneration {
    dimension: usize,
    records: Vec<CanonicalRecord>,
}

impl DatasetGeneration {
    /// Create a generation, checking every embedding against `dimension`.
    pub fn new(dimension: usize, records: Vec<CanonicalRecord>) -> Result<Self> {
        if let Some(bad) = records.iter().find(|r| r.dimension() != dimension) {
            return Err(Error::DimensionMismatch {
                id: bad.id.to_string(),
                expected: dimension,
                actual: bad.dimension(),
            });
        }
        Ok(Self { dimension, records })
    }

    #[must_use]
    pub const fn dimension(&self) -> usize {
        self.dimension
    }

    #[must_use]
    pub fn records(&self) -> &[CanonicalRecord] {
        &self.records
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    #[must_use]
    pub fn into_records(self) -> Vec<CanonicalRecord> {
        self.records
    }
}

/// Facts recorded next to a persisted generation.
///
/// The fingerprint lets later deletion runs prove that the metadata table
/// they scan is in the same row order as the one the ids were derived from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationManifest {
    pub row_count: usize,
    pub dimension: usize,
    pub fingerprint: RowOrderFingerprint,
    pub created_at: DateTime<Utc>,
    pub embeddings_source: PathBuf,
    pub metadata_source: PathBuf,
}
