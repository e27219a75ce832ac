//! The staged `sync` workflow: build the canonical artifact, then upsert it.

use imitune_core::RecordStore;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use treadle::{Stage, StageContext, StageOutcome, Workflow};

use crate::builder::{BuildOutcome, DatasetBuilder};
use crate::config::PipelineConfig;
use crate::confirm::FixedAnswer;
use crate::index::VectorIndex;
use crate::upsert::{UpsertPipeline, UpsertReport};

/// Where the upsert stage leaves its report for the caller.
pub type ReportSlot = Arc<Mutex<Option<UpsertReport>>>;

/// Rebuilds the canonical artifact from its sources.
///
/// Only added to a workflow once the operator has agreed to (re)build, so
/// it overwrites without asking again.
#[derive(Debug)]
pub struct BuildStage {
    builder: DatasetBuilder,
    embeddings_path: PathBuf,
    metadata_path: PathBuf,
    store: RecordStore,
}

impl BuildStage {
    #[must_use]
    pub fn new(
        builder: DatasetBuilder,
        embeddings_path: PathBuf,
        metadata_path: PathBuf,
        store: RecordStore,
    ) -> Self {
        Self {
            builder,
            embeddings_path,
            metadata_path,
            store,
        }
    }
}

#[async_trait::async_trait]
impl Stage for BuildStage {
    fn name(&self) -> &str {
        "build"
    }

    async fn execute(
        &self,
        _item: &dyn treadle::WorkItem,
        ctx: &mut StageContext,
    ) -> treadle::Result<StageOutcome> {
        log::info!("Building {}", self.store.path().display());

        let outcome = self
            .builder
            .build(
                &self.embeddings_path,
                &self.metadata_path,
                &self.store,
                &FixedAnswer(true),
            )
            .map_err(|e| treadle::TreadleError::StageExecution(format!("Build failed: {e}")))?;

        if let BuildOutcome::Written { records, dimension } = outcome {
            ctx.metadata
                .insert("records".to_string(), serde_json::json!(records));
            ctx.metadata
                .insert("dimension".to_string(), serde_json::json!(dimension));
        }
        Ok(StageOutcome::Complete)
    }
}

/// Upserts the artifact in `store` into the index.
///
/// Failed batches do not fail the stage; they are carried in the report.
#[derive(Debug)]
pub struct UpsertStage {
    index: Arc<dyn VectorIndex>,
    config: PipelineConfig,
    store: RecordStore,
    report: ReportSlot,
}

impl UpsertStage {
    #[must_use]
    pub fn new(
        index: Arc<dyn VectorIndex>,
        config: PipelineConfig,
        store: RecordStore,
        report: ReportSlot,
    ) -> Self {
        Self {
            index,
            config,
            store,
            report,
        }
    }
}

#[async_trait::async_trait]
impl Stage for UpsertStage {
    fn name(&self) -> &str {
        "upsert"
    }

    async fn execute(
        &self,
        _item: &dyn treadle::WorkItem,
        ctx: &mut StageContext,
    ) -> treadle::Result<StageOutcome> {
        let generation = self.store.load().map_err(|e| {
            treadle::TreadleError::StageExecution(format!("Failed to load artifact: {e}"))
        })?;
        let pipeline = UpsertPipeline::new(&self.config, self.index.as_ref())
            .map_err(|e| treadle::TreadleError::StageExecution(e.to_string()))?;

        let report = pipeline.run(&generation).await;

        ctx.metadata.insert(
            "upsert".to_string(),
            serde_json::json!({
                "run_id": report.run_id.to_string(),
                "attempted": report.batches.attempted(),
                "failed": report.batches.failed(),
                "final_count": report.final_count,
            }),
        );
        *self.report.lock().unwrap_or_else(PoisonError::into_inner) = Some(report);

        Ok(StageOutcome::Complete)
    }
}

/// Build the `sync` workflow.
///
/// Without a build stage the workflow upserts the existing artifact.
///
/// # Errors
/// Returns an error if the workflow cannot be built.
pub fn build_sync_workflow(
    build: Option<BuildStage>,
    upsert: UpsertStage,
) -> treadle::Result<Workflow> {
    match build {
        Some(build) => Workflow::builder()
            .stage("build", build)
            .stage("upsert", upsert)
            .dependency("upsert", "build")
            .build(),
        None => Workflow::builder().stage("upsert", upsert).build(),
    }
}

/// Remove the state store left behind by an earlier `sync` run.
///
/// Every run uses a fresh [`SyncJob`](crate::SyncJob) id, so earlier stage
/// state is never resumed and would only accumulate. The SQLite side files
/// (`-wal`, `-shm`, `-journal`) go with it. A missing file is not an error.
///
/// # Errors
/// Returns an error if an existing file cannot be removed.
pub fn reset_state_store(path: &Path) -> std::io::Result<()> {
    let mut paths = vec![path.to_path_buf()];
    for suffix in ["-wal", "-shm", "-journal"] {
        let mut side = path.as_os_str().to_owned();
        side.push(suffix);
        paths.push(PathBuf::from(side));
    }

    for path in paths {
        match std::fs::remove_file(&path) {
            Ok(()) => log::debug!("Removed stale pipeline state {}", path.display()),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::MemoryIndex;
    use crate::work_item::SyncJob;
    use imitune_core::FingerprintKey;
    use ndarray_npy::write_npy;
    use std::fs;
    use tempfile::TempDir;

    struct Fixture {
        dir: TempDir,
        store: RecordStore,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = TempDir::new().unwrap();
            let emb = ndarray::Array2::<f32>::from_shape_fn((3, 4), |(i, j)| (i + j) as f32);
            write_npy(dir.path().join("emb.npy"), &emb).unwrap();
            fs::write(dir.path().join("meta.csv"), "fname,url\n1,a\n2,\n3,b\n").unwrap();
            let store = RecordStore::new(dir.path().join("embeddings.json"));
            Self { dir, store }
        }

        fn build_stage(&self) -> BuildStage {
            BuildStage::new(
                DatasetBuilder::new(
                    vec!["url".to_string()],
                    FingerprintKey::AllExcept(vec!["url".to_string()]),
                ),
                self.dir.path().join("emb.npy"),
                self.dir.path().join("meta.csv"),
                self.store.clone(),
            )
        }
    }

    fn job() -> SyncJob {
        SyncJob::new("sync-test", PathBuf::from("embeddings.json"))
    }

    #[tokio::test]
    async fn test_build_stage_writes_artifact() {
        let fx = Fixture::new();
        let mut ctx = StageContext::new("build".to_string());

        let outcome = fx.build_stage().execute(&job(), &mut ctx).await.unwrap();

        assert_eq!(outcome, StageOutcome::Complete);
        assert!(fx.store.exists());
        assert_eq!(ctx.metadata.get("records"), Some(&serde_json::json!(3)));
    }

    #[tokio::test]
    async fn test_upsert_stage_fills_report_slot() {
        let fx = Fixture::new();
        let mut ctx = StageContext::new("build".to_string());
        fx.build_stage().execute(&job(), &mut ctx).await.unwrap();

        let index = Arc::new(MemoryIndex::default());
        let slot = ReportSlot::default();
        let stage = UpsertStage::new(
            Arc::clone(&index) as Arc<dyn VectorIndex>,
            PipelineConfig::default(),
            fx.store.clone(),
            Arc::clone(&slot),
        );
        let mut ctx = StageContext::new("upsert".to_string());
        let outcome = stage.execute(&job(), &mut ctx).await.unwrap();

        assert_eq!(outcome, StageOutcome::Complete);
        assert_eq!(index.len(), 3);
        let report = slot.lock().unwrap().clone().unwrap();
        assert_eq!(report.records, 3);
        assert_eq!(report.final_count, Some(3));
        assert!(ctx.metadata.contains_key("upsert"));
    }

    #[tokio::test]
    async fn test_upsert_stage_fails_without_artifact() {
        let fx = Fixture::new();
        let stage = UpsertStage::new(
            Arc::new(MemoryIndex::default()),
            PipelineConfig::default(),
            fx.store.clone(),
            ReportSlot::default(),
        );
        let mut ctx = StageContext::new("upsert".to_string());
        assert!(stage.execute(&job(), &mut ctx).await.is_err());
    }

    #[test]
    fn test_workflow_construction() {
        let fx = Fixture::new();
        let upsert = || {
            UpsertStage::new(
                Arc::new(MemoryIndex::default()),
                PipelineConfig::default(),
                fx.store.clone(),
                ReportSlot::default(),
            )
        };

        assert!(build_sync_workflow(Some(fx.build_stage()), upsert()).is_ok());
        assert!(build_sync_workflow(None, upsert()).is_ok());
    }

    #[test]
    fn test_reset_state_store_removes_previous_run() {
        let fx = Fixture::new();
        let state = fx.dir.path().join("pipeline.db");
        fs::write(&state, b"old").unwrap();
        fs::write(fx.dir.path().join("pipeline.db-wal"), b"old").unwrap();

        reset_state_store(&state).unwrap();
        assert!(!state.exists());
        assert!(!fx.dir.path().join("pipeline.db-wal").exists());

        // Nothing left to remove.
        reset_state_store(&state).unwrap();
    }
}
