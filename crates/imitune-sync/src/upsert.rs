//! Upsert pipeline.
//!
//! Pushes every record of a generation into the index in fixed-size
//! batches. Upserts replace by id, so re-running over an unchanged
//! generation leaves the index as it was.

use imitune_core::DatasetGeneration;
use uuid::Uuid;

use crate::batch::{run_batches, BatchReport};
use crate::config::PipelineConfig;
use crate::error::SyncResult;
use crate::index::VectorIndex;

/// Summary of one upsert run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpsertReport {
    pub run_id: Uuid,
    pub index_name: String,
    /// Records in the generation.
    pub records: usize,
    pub batches: BatchReport,
    /// Aggregate count reported by the index after the last batch. May lag
    /// the writes; `None` when the read failed.
    pub final_count: Option<u64>,
}

/// Upserts a [`DatasetGeneration`] into a [`VectorIndex`].
#[derive(Debug)]
pub struct UpsertPipeline<'a> {
    index: &'a dyn VectorIndex,
    index_name: String,
    batch_size: usize,
}

impl<'a> UpsertPipeline<'a> {
    /// Fails with `InvalidConfig` when the batch size is outside the
    /// index's per-request limit.
    pub fn new(config: &PipelineConfig, index: &'a dyn VectorIndex) -> SyncResult<Self> {
        PipelineConfig::check_batch_size(
            "upsert",
            config.upsert_batch_size,
            index.max_upsert_batch(),
        )?;
        Ok(Self {
            index,
            index_name: config.index_name.clone(),
            batch_size: config.upsert_batch_size,
        })
    }

    pub async fn run(&self, generation: &DatasetGeneration) -> UpsertReport {
        let run_id = Uuid::new_v4();
        log::info!(
            "Upsert run {run_id}: {} records into '{}' in batches of {}",
            generation.len(),
            self.index_name,
            self.batch_size
        );

        let batches = run_batches(generation.records(), self.batch_size, "upsert", |chunk| {
            self.index.upsert(chunk)
        })
        .await;

        let final_count = match self.index.describe_stats().await {
            Ok(stats) => Some(stats.total_count),
            Err(e) => {
                log::warn!("Could not read index stats after upsert: {e}");
                None
            }
        };

        log::info!(
            "Upsert run {run_id} finished: {}/{} batches succeeded",
            batches.succeeded(),
            batches.attempted()
        );
        UpsertReport {
            run_id,
            index_name: self.index_name.clone(),
            records: generation.len(),
            batches,
            final_count,
        }
    }
}
