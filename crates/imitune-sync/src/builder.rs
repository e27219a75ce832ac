//! Dataset builder.
//!
//! Joins the embedding array with the metadata table by row position and
//! persists the result as a new generation in the [`RecordStore`].

use chrono::Utc;
use imitune_core::{
    CanonicalRecord, DatasetGeneration, EmbeddingMatrix, Error, FingerprintKey, GenerationManifest,
    Metadata, MetadataTable, RecordId, RecordStore, RowOrderFingerprint,
};
use std::path::Path;

use crate::config::Config;
use crate::confirm::Confirm;
use crate::error::SyncResult;

/// What a build run did to the artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildOutcome {
    /// A new generation was written.
    Written { records: usize, dimension: usize },
    /// The artifact already existed and the operator chose to keep it.
    Reused,
}

/// Builds canonical records from an embedding array and a metadata table.
#[derive(Debug, Clone)]
pub struct DatasetBuilder {
    metadata_columns: Vec<String>,
    fingerprint_key: FingerprintKey,
}

impl DatasetBuilder {
    #[must_use]
    pub fn new(metadata_columns: Vec<String>, fingerprint_key: FingerprintKey) -> Self {
        Self {
            metadata_columns,
            fingerprint_key,
        }
    }

    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.metadata_columns.clone(), config.fingerprint_key())
    }

    /// Join `embeddings` and `table` row by row.
    ///
    /// Fails with [`Error::ShapeMismatch`] when the row counts differ and
    /// with [`Error::MissingColumn`] when a metadata column is not in the
    /// table.
    pub fn assemble(
        &self,
        embeddings: &EmbeddingMatrix,
        table: &MetadataTable,
    ) -> imitune_core::Result<DatasetGeneration> {
        if embeddings.len() != table.len() {
            return Err(Error::ShapeMismatch {
                embeddings: embeddings.len(),
                rows: table.len(),
            });
        }
        for column in &self.metadata_columns {
            table.require_column(column)?;
        }

        let records = embeddings
            .iter()
            .zip(table.rows())
            .enumerate()
            .map(|(position, (embedding, row))| {
                let id = RecordId::from_position(position).ok_or_else(|| {
                    Error::InvalidData(format!("row {position} exceeds the 12-digit id range"))
                })?;
                let metadata: Metadata = self
                    .metadata_columns
                    .iter()
                    .filter_map(|column| row.get(column).map(|v| (column.clone(), v.to_string())))
                    .collect();
                Ok(CanonicalRecord::new(id, embedding.to_vec(), metadata))
            })
            .collect::<imitune_core::Result<Vec<_>>>()?;

        DatasetGeneration::new(embeddings.dimension(), records)
    }

    /// Build a generation from the two sources and write it to `store`.
    ///
    /// An existing artifact is only replaced after `confirm` approves; a
    /// declined prompt reuses it untouched. Any input error aborts before
    /// anything is written.
    pub fn build(
        &self,
        embeddings_path: &Path,
        metadata_path: &Path,
        store: &RecordStore,
        confirm: &dyn Confirm,
    ) -> SyncResult<BuildOutcome> {
        if store.exists() {
            let prompt = format!("{} already exists. Overwrite?", store.path().display());
            if !confirm.confirm(&prompt) {
                log::info!("Keeping existing artifact {}", store.path().display());
                return Ok(BuildOutcome::Reused);
            }
        }

        log::info!("Starting conversion to {}", store.path().display());
        let embeddings = EmbeddingMatrix::from_npy(embeddings_path)?;
        let table = MetadataTable::from_path(metadata_path)?;
        let generation = self.assemble(&embeddings, &table)?;
        let fingerprint = RowOrderFingerprint::compute(&table, self.fingerprint_key.clone())?;
        if !fingerprint.checks_order() {
            log::warn!(
                "Row-order fingerprint of {} covers no columns: deletion runs can only check \
                 the row count, not the order. Set key_column to an identifying column.",
                metadata_path.display()
            );
        }

        let manifest = GenerationManifest {
            row_count: generation.len(),
            dimension: generation.dimension(),
            fingerprint,
            created_at: Utc::now(),
            embeddings_source: embeddings_path.to_path_buf(),
            metadata_source: metadata_path.to_path_buf(),
        };
        store.write(&generation, &manifest)?;

        log::info!(
            "Wrote {} records of dimension {}",
            generation.len(),
            generation.dimension()
        );
        Ok(BuildOutcome::Written {
            records: generation.len(),
            dimension: generation.dimension(),
        })
    }
}
