use anyhow::{Context, Result};
use imitune_core::{MetadataTable, RecordStore};
use imitune_sync::{
    review, Config, DeletionOutcome, DeletionPipeline, DeletionReport, RequiredField, Review,
};

/// Delete every record whose metadata row has an empty `url_column`.
///
/// The index is only contacted, and the API key only resolved, once the
/// operator has approved a non-empty deletion set.
pub async fn run_delete(config: &Config, assume_yes: bool, skip_order_check: bool) -> Result<()> {
    let table_path = config.deletion_table();
    let table = MetadataTable::from_path(table_path)
        .with_context(|| format!("Failed to read deletion table {}", table_path.display()))?;

    let expected = if skip_order_check {
        None
    } else {
        let store = RecordStore::new(&config.artifact_path);
        let manifest = store
            .load_manifest()
            .context("Failed to read artifact manifest")?
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "No manifest at {}; cannot verify row order.\n\n\
                     Rebuild with 'imitune build' or pass --skip-order-check.",
                    store.manifest_path().display()
                )
            })?;
        Some(manifest.fingerprint)
    };

    println!("\n🗑️  Deleting invalid records from '{}'\n", config.index_name);
    println!("  Table: {}", table_path.display());
    println!("  Rows: {}", table.len());
    println!("  Required column: {}", config.url_column);
    match &expected {
        None => println!("  Row order check: skipped"),
        Some(fingerprint) if !fingerprint.checks_order() => {
            println!("  Row order check: row count only (set key_column and rebuild to check order)");
        }
        Some(_) => {}
    }
    println!();

    let confirm = super::confirmer(assume_yes);
    let reviewed = review(
        &table,
        &RequiredField::new(&config.url_column),
        expected.as_ref(),
        &config.index_name,
        confirm,
    )
    .context("Deletion aborted")?;

    let outcome = match reviewed {
        Review::Finished(outcome) => outcome,
        Review::Approved(set) => {
            let index = super::connect(config).await?;
            let pipeline = DeletionPipeline::new(&config.pipeline(), &index, confirm)?;
            let report = pipeline.execute(&set).await.context("Deletion aborted")?;
            DeletionOutcome::Completed(report)
        }
    };

    match outcome {
        DeletionOutcome::NothingToDelete { rows_scanned } => {
            println!("✓ All {rows_scanned} rows are valid; nothing to delete");
        }
        DeletionOutcome::Cancelled { candidates } => {
            println!("Deletion cancelled; {candidates} records left in place");
        }
        DeletionOutcome::Completed(report) => print_report(&report),
    }

    Ok(())
}

fn print_report(report: &DeletionReport) {
    let batches = &report.batches;

    println!("\n✓ Deletion complete (run {})", report.run_id);
    println!("  Requested: {}", report.requested);
    println!("  Batches attempted: {}", batches.attempted());
    println!("  Successful: {}", batches.succeeded());
    println!("  Failed: {}", batches.failed());

    println!("\n  Count before: {}", report.pre_count);
    println!("  Expected after: {}", report.expected_post_count());
    match report.post_count {
        Some(post) => println!("  Reported after: {post}"),
        None => println!("  Reported after: unavailable"),
    }

    if report.in_agreement() != Some(true) {
        println!("\n  Counts may take a while to converge; re-check with 'imitune stats'.");
    }
}
