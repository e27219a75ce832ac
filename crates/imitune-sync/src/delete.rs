//! Deletion pipeline.
//!
//! A run moves through four phases in a fixed order:
//!
//! 1. **Scan**: walk the metadata table in generation order and collect the
//!    id of every row the validity predicate rejects.
//! 2. **Confirm**: show the operator the count and a sample of ids. Anything
//!    but an explicit yes ends the run with nothing deleted.
//! 3. **Execute**: read the pre-count, then delete in batches.
//! 4. **Reconcile**: wait for the settling delay and read the post-count.
//!
//! [`review`] runs the first two phases without an index, so a caller can
//! wait to connect until the operator has approved the deletion set.
//!
//! Ids are derived from row positions, so the table must be in the same
//! order as when the generation was built. When the generation's
//! [`RowOrderFingerprint`] is supplied, Scan refuses a table that no longer
//! matches it.

use imitune_core::{Error, MetadataRow, MetadataTable, RecordId, RowOrderFingerprint};
use std::time::Duration;
use uuid::Uuid;

use crate::batch::{run_batches, BatchReport};
use crate::config::PipelineConfig;
use crate::confirm::Confirm;
use crate::error::SyncResult;
use crate::index::VectorIndex;

/// Ids shown in the confirmation prompt.
const SAMPLE_SIZE: usize = 5;

/// Decides whether a metadata row still belongs in the index.
pub trait RowValidity: Send + Sync {
    fn is_valid(&self, row: &MetadataRow) -> bool;

    /// Column the table must declare for the predicate to be meaningful.
    fn required_column(&self) -> Option<&str> {
        None
    }
}

/// A row is valid while `column` holds a non-empty value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequiredField {
    pub column: String,
}

impl RequiredField {
    #[must_use]
    pub fn new(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
        }
    }
}

impl RowValidity for RequiredField {
    fn is_valid(&self, row: &MetadataRow) -> bool {
        !row.is_blank(&self.column)
    }

    fn required_column(&self) -> Option<&str> {
        Some(&self.column)
    }
}

impl<F> RowValidity for F
where
    F: Fn(&MetadataRow) -> bool + Send + Sync,
{
    fn is_valid(&self, row: &MetadataRow) -> bool {
        self(row)
    }
}

/// Ids of the rows rejected by a scan, in table order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeletionSet {
    ids: Vec<RecordId>,
    rows_scanned: usize,
}

impl DeletionSet {
    /// Scan `table` and collect the id of every invalid row.
    pub fn scan(table: &MetadataTable, validity: &dyn RowValidity) -> SyncResult<Self> {
        if let Some(column) = validity.required_column() {
            table.require_column(column)?;
        }

        let mut ids = Vec::new();
        for (position, row) in table.rows().iter().enumerate() {
            if validity.is_valid(row) {
                continue;
            }
            let id = RecordId::from_position(position).ok_or_else(|| {
                Error::InvalidData(format!("row {position} exceeds the 12-digit id range"))
            })?;
            ids.push(id);
        }

        Ok(Self {
            ids,
            rows_scanned: table.len(),
        })
    }

    #[must_use]
    pub fn ids(&self) -> &[RecordId] {
        &self.ids
    }

    #[must_use]
    pub fn rows_scanned(&self) -> usize {
        self.rows_scanned
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// The first `n` ids.
    #[must_use]
    pub fn sample(&self, n: usize) -> &[RecordId] {
        &self.ids[..n.min(self.ids.len())]
    }

    /// Confirmation prompt naming the count, the index, and a sample of ids.
    #[must_use]
    pub fn prompt(&self, index_name: &str) -> String {
        let mut prompt = format!(
            "About to delete {} records from index '{}'.\nSample ids:",
            self.len(),
            index_name
        );
        for id in self.sample(SAMPLE_SIZE) {
            prompt.push(' ');
            prompt.push_str(&id.to_string());
        }
        if self.len() > SAMPLE_SIZE {
            prompt.push_str(" ...");
        }
        prompt.push_str("\nThis cannot be undone. Proceed?");
        prompt
    }
}

/// Audit trail of a deletion run that reached Reconcile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeletionReport {
    pub run_id: Uuid,
    pub index_name: String,
    /// Ids in the deletion set.
    pub requested: usize,
    pub batches: BatchReport,
    pub pre_count: u64,
    /// `None` when the index could not be read after settling.
    pub post_count: Option<u64>,
}

impl DeletionReport {
    #[must_use]
    pub fn expected_post_count(&self) -> u64 {
        self.pre_count.saturating_sub(self.requested as u64)
    }

    /// Whether the post-count matches the expectation. Disagreement is
    /// normal right after a run and is not an error.
    #[must_use]
    pub fn in_agreement(&self) -> Option<bool> {
        self.post_count.map(|post| post == self.expected_post_count())
    }
}

/// How a deletion run ended. Aborted runs are the `Err` side of
/// [`DeletionPipeline::run`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeletionOutcome {
    /// Every row passed the predicate.
    NothingToDelete { rows_scanned: usize },
    /// The operator declined at the confirmation gate.
    Cancelled { candidates: usize },
    Completed(DeletionReport),
}

/// Removes rows rejected by a [`RowValidity`] predicate from the index.
pub struct DeletionPipeline<'a> {
    index: &'a dyn VectorIndex,
    confirm: &'a dyn Confirm,
    index_name: String,
    batch_size: usize,
    settle_delay: Duration,
}

impl std::fmt::Debug for DeletionPipeline<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeletionPipeline")
            .field("index", &self.index)
            .field("index_name", &self.index_name)
            .field("batch_size", &self.batch_size)
            .field("settle_delay", &self.settle_delay)
            .finish_non_exhaustive()
    }
}

impl<'a> DeletionPipeline<'a> {
    /// Fails with `InvalidConfig` when the batch size is outside the
    /// index's per-request limit.
    pub fn new(
        config: &PipelineConfig,
        index: &'a dyn VectorIndex,
        confirm: &'a dyn Confirm,
    ) -> SyncResult<Self> {
        PipelineConfig::check_batch_size(
            "delete",
            config.delete_batch_size,
            index.max_delete_batch(),
        )?;
        Ok(Self {
            index,
            confirm,
            index_name: config.index_name.clone(),
            batch_size: config.delete_batch_size,
            settle_delay: config.settle_delay,
        })
    }

    /// Run Scan, Confirm, Execute, and Reconcile over `table`.
    ///
    /// With `expected` set, a table whose row order differs from the one the
    /// generation was built from aborts the run in Scan. Nothing is deleted
    /// on any `Err`.
    pub async fn run(
        &self,
        table: &MetadataTable,
        validity: &dyn RowValidity,
        expected: Option<&RowOrderFingerprint>,
    ) -> SyncResult<DeletionOutcome> {
        match review(table, validity, expected, &self.index_name, self.confirm)? {
            Review::Approved(set) => Ok(DeletionOutcome::Completed(self.execute(&set).await?)),
            Review::Finished(outcome) => Ok(outcome),
        }
    }

    /// Execute and Reconcile an already approved deletion set.
    pub async fn execute(&self, set: &DeletionSet) -> SyncResult<DeletionReport> {
        log::info!("Phase 3/4: deleting {} records", set.len());
        let pre_count = self.index.describe_stats().await?.total_count;
        log::info!("Index '{}' holds {pre_count} records before deletion", self.index_name);
        let run_id = Uuid::new_v4();
        let batches = run_batches(set.ids(), self.batch_size, "delete", |chunk| {
            self.index.delete(chunk)
        })
        .await;

        log::info!(
            "Phase 4/4: waiting {}s for the index to settle",
            self.settle_delay.as_secs()
        );
        if !self.settle_delay.is_zero() {
            tokio::time::sleep(self.settle_delay).await;
        }
        let post_count = match self.index.describe_stats().await {
            Ok(stats) => Some(stats.total_count),
            Err(e) => {
                log::warn!("Could not read index stats after deletion: {e}");
                None
            }
        };

        let report = DeletionReport {
            run_id,
            index_name: self.index_name.clone(),
            requested: set.len(),
            batches,
            pre_count,
            post_count,
        };
        log::info!(
            "Deletion run {run_id}: pre {pre_count}, expected {}, post {:?}",
            report.expected_post_count(),
            report.post_count
        );
        Ok(report)
    }
}

/// Result of the Scan and Confirm phases.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Review {
    /// The operator approved deleting this set.
    Approved(DeletionSet),
    /// The run ended before touching the index.
    Finished(DeletionOutcome),
}

/// Scan `table` and ask for confirmation, without touching the index.
///
/// Callers can use this to defer connecting to the index until a deletion
/// has been approved, then hand the set to [`DeletionPipeline::execute`].
pub fn review(
    table: &MetadataTable,
    validity: &dyn RowValidity,
    expected: Option<&RowOrderFingerprint>,
    index_name: &str,
    confirm: &dyn Confirm,
) -> SyncResult<Review> {
    log::info!("Phase 1/4: scanning {} metadata rows", table.len());
    match expected {
        Some(fingerprint) => {
            fingerprint.verify(table)?;
            if fingerprint.checks_order() {
                log::debug!("Row order matches fingerprint {}", fingerprint.digest);
            } else {
                log::warn!(
                    "Fingerprint covers no columns; only the row count ({}) was checked, \
                     not the row order",
                    fingerprint.rows
                );
            }
        }
        None => log::warn!("Row order not verified; ids assume the generation's row order"),
    }
    let set = DeletionSet::scan(table, validity)?;
    if set.is_empty() {
        log::info!("No invalid rows found; nothing to delete");
        return Ok(Review::Finished(DeletionOutcome::NothingToDelete {
            rows_scanned: set.rows_scanned(),
        }));
    }
    log::info!(
        "Found {} invalid rows out of {}",
        set.len(),
        set.rows_scanned()
    );

    log::info!("Phase 2/4: awaiting confirmation");
    if !confirm.confirm(&set.prompt(index_name)) {
        log::info!("Deletion cancelled; index left untouched");
        return Ok(Review::Finished(DeletionOutcome::Cancelled {
            candidates: set.len(),
        }));
    }
    Ok(Review::Approved(set))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::confirm::ScriptedConfirm;
    use crate::error::SyncError;
    use crate::index::MemoryIndex;
    use imitune_core::{CanonicalRecord, FingerprintKey, Metadata};

    /// A table of `rows` rows where the rows in `blank` have no url.
    fn table(rows: usize, blank: &[usize]) -> MetadataTable {
        let rows = (0..rows)
            .map(|i| {
                let url = if blank.contains(&i) {
                    String::new()
                } else {
                    format!("https://freesound.org/s/{i}")
                };
                MetadataRow::from_iter([("fname", i.to_string()), ("url", url)])
            })
            .collect();
        MetadataTable::new(vec!["fname".to_string(), "url".to_string()], rows)
    }

    fn seeded(rows: usize) -> MemoryIndex {
        MemoryIndex::new("test-index").with_records((0..rows).map(|i| {
            CanonicalRecord::new(RecordId::from_position(i).unwrap(), vec![0.0; 2], Metadata::new())
        }))
    }

    fn config(batch: usize) -> PipelineConfig {
        PipelineConfig {
            index_name: "test-index".to_string(),
            delete_batch_size: batch,
            settle_delay: Duration::ZERO,
            ..PipelineConfig::default()
        }
    }

    fn ids(set: &DeletionSet) -> Vec<String> {
        set.ids().iter().map(ToString::to_string).collect()
    }

    #[test]
    fn test_scan_maps_blank_rows_to_ids() {
        let set = DeletionSet::scan(&table(12, &[2, 5, 9]), &RequiredField::new("url")).unwrap();
        assert_eq!(ids(&set), ["000000000003", "000000000006", "000000000010"]);
        assert_eq!(set.rows_scanned(), 12);
    }

    #[test]
    fn test_scan_treats_absent_field_as_blank() {
        let table = MetadataTable::from_reader("fname,url\n1,https://a\n2\n".as_bytes()).unwrap();
        let set = DeletionSet::scan(&table, &RequiredField::new("url")).unwrap();
        assert_eq!(ids(&set), ["000000000002"]);
    }

    #[test]
    fn test_scan_requires_column() {
        let err = DeletionSet::scan(&table(3, &[]), &RequiredField::new("link")).unwrap_err();
        assert!(matches!(err, SyncError::Core(Error::MissingColumn { .. })));
    }

    #[test]
    fn test_scan_with_closure_predicate() {
        let odd_rows = |row: &MetadataRow| {
            row.get("fname")
                .and_then(|v| v.parse::<usize>().ok())
                .is_some_and(|n| n % 2 == 0)
        };
        let set = DeletionSet::scan(&table(4, &[]), &odd_rows).unwrap();
        assert_eq!(ids(&set), ["000000000002", "000000000004"]);
    }

    #[tokio::test]
    async fn test_nothing_to_delete() {
        let index = seeded(3);
        let confirm = ScriptedConfirm::default();
        let pipeline = DeletionPipeline::new(&config(1000), &index, &confirm).unwrap();

        let outcome = pipeline
            .run(&table(3, &[]), &RequiredField::new("url"), None)
            .await
            .unwrap();

        assert_eq!(outcome, DeletionOutcome::NothingToDelete { rows_scanned: 3 });
        assert!(confirm.prompts().is_empty());
        assert!(index.calls().is_empty());
    }

    #[tokio::test]
    async fn test_declined_confirmation_issues_no_deletes() {
        let index = seeded(10);
        let confirm = ScriptedConfirm::new([false]);
        let pipeline = DeletionPipeline::new(&config(1000), &index, &confirm).unwrap();

        let outcome = pipeline
            .run(&table(10, &[1, 4]), &RequiredField::new("url"), None)
            .await
            .unwrap();

        assert_eq!(outcome, DeletionOutcome::Cancelled { candidates: 2 });
        assert!(index.calls().is_empty());
        assert_eq!(index.len(), 10);
    }

    #[tokio::test]
    async fn test_prompt_shows_count_index_and_sample() {
        let index = seeded(10);
        let confirm = ScriptedConfirm::new([false]);
        let pipeline = DeletionPipeline::new(&config(1000), &index, &confirm).unwrap();

        pipeline
            .run(&table(10, &[0, 1, 2, 3, 4, 5, 6]), &RequiredField::new("url"), None)
            .await
            .unwrap();

        let prompt = &confirm.prompts()[0];
        assert!(prompt.contains("delete 7 records"));
        assert!(prompt.contains("'test-index'"));
        assert!(prompt.contains("000000000005"));
        assert!(!prompt.contains("000000000006"));
    }

    #[tokio::test]
    async fn test_batches_are_split_in_order() {
        let blank: Vec<usize> = (0..2500).collect();
        let index = seeded(3000);
        let confirm = ScriptedConfirm::new([true]);
        let pipeline = DeletionPipeline::new(&config(1000), &index, &confirm).unwrap();

        let outcome = pipeline
            .run(&table(3000, &blank), &RequiredField::new("url"), None)
            .await
            .unwrap();

        assert_eq!(index.delete_sizes(), vec![1000, 1000, 500]);
        let DeletionOutcome::Completed(report) = outcome else {
            panic!("expected a completed run, got {outcome:?}");
        };
        assert_eq!(report.requested, 2500);
        assert_eq!(report.pre_count, 3000);
        assert_eq!(report.expected_post_count(), 500);
        assert_eq!(report.post_count, Some(500));
        assert_eq!(report.in_agreement(), Some(true));
    }

    #[tokio::test]
    async fn test_one_failed_batch_is_reported() {
        let blank: Vec<usize> = (0..25).collect();
        let index = seeded(30).failing_call(2);
        let confirm = ScriptedConfirm::new([true]);
        let pipeline = DeletionPipeline::new(&config(10), &index, &confirm).unwrap();

        let outcome = pipeline
            .run(&table(30, &blank), &RequiredField::new("url"), None)
            .await
            .unwrap();

        let DeletionOutcome::Completed(report) = outcome else {
            panic!("expected a completed run, got {outcome:?}");
        };
        assert_eq!(report.batches.attempted(), 3);
        assert_eq!(report.batches.failed(), 1);
        assert_eq!(report.post_count, Some(15));
        assert_eq!(report.expected_post_count(), 5);
        assert_eq!(report.in_agreement(), Some(false));
    }

    #[tokio::test]
    async fn test_reordered_table_aborts_before_prompt() {
        let original = table(4, &[]);
        let fingerprint =
            RowOrderFingerprint::compute(&original, FingerprintKey::AllExcept(vec!["url".into()]))
                .unwrap();

        let mut rows = table(4, &[1]).rows().to_vec();
        rows.swap(0, 3);
        let reordered = MetadataTable::new(original.headers().to_vec(), rows);

        let index = seeded(4);
        let confirm = ScriptedConfirm::new([true]);
        let pipeline = DeletionPipeline::new(&config(1000), &index, &confirm).unwrap();
        let err = pipeline
            .run(&reordered, &RequiredField::new("url"), Some(&fingerprint))
            .await
            .unwrap_err();

        assert!(matches!(err, SyncError::Core(Error::RowOrderMismatch { .. })));
        assert!(confirm.prompts().is_empty());
        assert!(index.calls().is_empty());
    }

    #[tokio::test]
    async fn test_blanked_urls_keep_fingerprint() {
        let fingerprint = RowOrderFingerprint::compute(
            &table(4, &[]),
            FingerprintKey::AllExcept(vec!["url".into()]),
        )
        .unwrap();

        let index = seeded(4);
        let confirm = ScriptedConfirm::new([true]);
        let pipeline = DeletionPipeline::new(&config(1000), &index, &confirm).unwrap();
        let outcome = pipeline
            .run(&table(4, &[1]), &RequiredField::new("url"), Some(&fingerprint))
            .await
            .unwrap();

        assert!(matches!(outcome, DeletionOutcome::Completed(_)));
        assert!(!index.contains(RecordId::from_position(1).unwrap()));
    }

    #[tokio::test]
    async fn test_pre_count_failure_aborts_before_delete() {
        let index = seeded(4).without_stats();
        let confirm = ScriptedConfirm::new([true]);
        let pipeline = DeletionPipeline::new(&config(1000), &index, &confirm).unwrap();

        let err = pipeline
            .run(&table(4, &[0]), &RequiredField::new("url"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::Index(_)));
        assert!(index.calls().is_empty());
    }

    #[test]
    fn test_review_needs_no_index() {
        let confirm = ScriptedConfirm::new([true]);
        let reviewed = review(
            &table(6, &[2, 4]),
            &RequiredField::new("url"),
            None,
            "test-index",
            &confirm,
        )
        .unwrap();

        let Review::Approved(set) = reviewed else {
            panic!("expected approval, got {reviewed:?}");
        };
        assert_eq!(ids(&set), ["000000000003", "000000000005"]);
        assert!(confirm.prompts()[0].contains("index 'test-index'"));
    }

    #[test]
    fn test_review_declined_or_empty_finishes() {
        let declined = review(
            &table(3, &[0]),
            &RequiredField::new("url"),
            None,
            "test-index",
            &ScriptedConfirm::new([false]),
        )
        .unwrap();
        assert_eq!(
            declined,
            Review::Finished(DeletionOutcome::Cancelled { candidates: 1 })
        );

        let confirm = ScriptedConfirm::default();
        let empty = review(&table(3, &[]), &RequiredField::new("url"), None, "test-index", &confirm)
            .unwrap();
        assert_eq!(
            empty,
            Review::Finished(DeletionOutcome::NothingToDelete { rows_scanned: 3 })
        );
        assert!(confirm.prompts().is_empty());
    }

    #[tokio::test]
    async fn test_execute_approved_set() {
        let set = DeletionSet::scan(&table(5, &[0, 3]), &RequiredField::new("url")).unwrap();
        let index = seeded(5);
        let pipeline =
            DeletionPipeline::new(&config(1000), &index, &ScriptedConfirm::default()).unwrap();

        let report = pipeline.execute(&set).await.unwrap();
        assert_eq!(report.pre_count, 5);
        assert_eq!(report.post_count, Some(3));
        assert_eq!(report.in_agreement(), Some(true));
    }

    #[test]
    fn test_count_only_fingerprint_passes_review() {
        let url_only = |blank: &[usize]| {
            let rows = (0..3)
                .map(|i| {
                    let url = if blank.contains(&i) { String::new() } else { format!("u{i}") };
                    MetadataRow::from_iter([("url", url)])
                })
                .collect();
            MetadataTable::new(vec!["url".to_string()], rows)
        };
        let fingerprint =
            RowOrderFingerprint::compute(&url_only(&[]), FingerprintKey::AllExcept(vec!["url".into()]))
                .unwrap();
        assert!(!fingerprint.checks_order());

        let reviewed = review(
            &url_only(&[1]),
            &RequiredField::new("url"),
            Some(&fingerprint),
            "test-index",
            &ScriptedConfirm::new([false]),
        )
        .unwrap();
        assert_eq!(reviewed, Review::Finished(DeletionOutcome::Cancelled { candidates: 1 }));
    }
}
