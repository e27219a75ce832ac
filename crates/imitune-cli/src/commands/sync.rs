use anyhow::{Context, Result};
use imitune_core::RecordStore;
use imitune_sync::{
    build_sync_workflow, reset_state_store, BuildStage, Config, Confirm, DatasetBuilder,
    ReportSlot, SyncJob, UpsertStage, VectorIndex,
};
use std::sync::{Arc, PoisonError};

/// Build the artifact if needed, then upsert it, as one treadle workflow.
///
/// Steps:
/// 1. Build - only when the artifact is missing or you agree to rebuild it
/// 2. Upsert - push every record to the index
pub async fn run_sync(config: &Config, assume_yes: bool) -> Result<()> {
    let store = RecordStore::new(&config.artifact_path);

    println!("\n🔄 Imitune Sync\n");
    println!("  Artifact: {}", store.path().display());
    println!("  Index: {}", config.index_name);
    println!();

    let rebuild = !store.exists()
        || super::confirmer(assume_yes).confirm(&format!(
            "{} already exists. Overwrite?",
            store.path().display()
        ));
    let build = rebuild.then(|| {
        BuildStage::new(
            DatasetBuilder::from_config(config),
            config.embeddings_path.clone(),
            config.metadata_path.clone(),
            store.clone(),
        )
    });
    if build.is_none() {
        println!("🔧 Step 1/2: Build (skipped - keeping existing artifact)\n");
    }

    let index: Arc<dyn VectorIndex> = Arc::new(super::connect(config).await?);
    let report = ReportSlot::default();
    let upsert = UpsertStage::new(index, config.pipeline(), store.clone(), Arc::clone(&report));

    let workflow = build_sync_workflow(build, upsert).context("Failed to build pipeline")?;

    let parent = store
        .path()
        .parent()
        .ok_or_else(|| anyhow::anyhow!("Artifact path has no parent directory"))?;
    std::fs::create_dir_all(parent).context("Failed to create artifact directory")?;
    let state_path = parent.join("pipeline.db");
    reset_state_store(&state_path).context("Failed to clear previous pipeline state")?;
    let mut state = treadle::SqliteStateStore::open(&state_path)
        .await
        .context("Failed to open pipeline state store")?;

    let job = SyncJob::fresh(store.path().to_path_buf());
    log::debug!("Sync job {}", treadle::WorkItem::id(&job));

    let mut events = workflow.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                treadle::WorkflowEvent::StageStarted { stage, .. } => {
                    println!("  ⏳ [{stage}] Starting...");
                }
                treadle::WorkflowEvent::StageCompleted { stage, .. } => {
                    println!("  ✓ [{stage}] Complete");
                }
                treadle::WorkflowEvent::StageFailed { stage, error, .. } => {
                    eprintln!("  ✗ [{stage}] FAILED: {error}");
                }
                _ => {}
            }
        }
    });

    workflow
        .advance(&job, &mut state)
        .await
        .context("Pipeline execution failed")?;

    let report = report
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .take();
    match report {
        Some(report) => super::upsert::print_report(&report),
        None => println!("\n✗ Upsert stage did not run; see the log above"),
    }

    Ok(())
}
