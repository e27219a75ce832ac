use anyhow::{Context, Result};
use imitune_core::RecordStore;
use imitune_sync::{BatchOutcome, Config, UpsertPipeline, UpsertReport};

/// Upsert the canonical artifact into the configured index.
pub async fn run_upsert(config: &Config) -> Result<()> {
    let store = RecordStore::new(&config.artifact_path);
    let generation = store
        .load()
        .with_context(|| format!("Failed to load artifact {}", store.path().display()))?;

    println!("\n⬆️  Upserting into '{}'\n", config.index_name);
    println!("  Artifact: {}", store.path().display());
    println!("  Records: {}", generation.len());
    println!("  Batch size: {}", config.upsert_batch_size);
    println!();

    let index = super::connect(config).await?;
    let pipeline = UpsertPipeline::new(&config.pipeline(), &index)?;
    let report = pipeline.run(&generation).await;

    print_report(&report);
    Ok(())
}

pub fn print_report(report: &UpsertReport) {
    let batches = &report.batches;

    println!("\n✓ Upsert complete (run {})", report.run_id);
    println!("  Records: {}", report.records);
    println!("  Batches attempted: {}", batches.attempted());
    println!("  Successful: {}", batches.succeeded());
    println!("  Failed: {}", batches.failed());

    for failure in batches.failures() {
        if let BatchOutcome::Failure {
            batch,
            size,
            detail,
        } = failure
        {
            println!("    ✗ batch {batch} ({size} records): {detail}");
        }
    }

    match report.final_count {
        Some(count) => println!(
            "  Index '{}' reports {count} records (may lag recent writes)",
            report.index_name
        ),
        None => println!("  Index count unavailable"),
    }
}
