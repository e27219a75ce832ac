use anyhow::{Context, Result};
use imitune_core::RecordStore;
use imitune_sync::{BuildOutcome, Config, DatasetBuilder};

/// Build the canonical artifact from the configured sources.
pub fn run_build(config: &Config, assume_yes: bool) -> Result<()> {
    println!("\n🔧 Building canonical artifact\n");
    println!("  Embeddings: {}", config.embeddings_path.display());
    println!("  Metadata: {}", config.metadata_path.display());
    println!("  Output: {}", config.artifact_path.display());
    println!();

    let store = RecordStore::new(&config.artifact_path);
    let outcome = DatasetBuilder::from_config(config)
        .build(
            &config.embeddings_path,
            &config.metadata_path,
            &store,
            super::confirmer(assume_yes),
        )
        .context("Build failed")?;

    match outcome {
        BuildOutcome::Written { records, dimension } => {
            println!("✓ Wrote {records} records (dimension {dimension})");
            println!("  Artifact: {}", store.path().display());
            println!("  Manifest: {}", store.manifest_path().display());
            let manifest = store
                .load_manifest()
                .context("Failed to read artifact manifest")?;
            if manifest.is_some_and(|m| !m.fingerprint.checks_order()) {
                println!("\n⚠ The row-order fingerprint covers no columns, so 'imitune delete'");
                println!("  can only check the row count. Set key_column to an identifying");
                println!("  column and rebuild to have row order checked too.");
            }
        }
        BuildOutcome::Reused => {
            println!("✓ Kept existing artifact {}", store.path().display());
        }
    }

    println!("\nNext steps:");
    println!("  - Run 'imitune upsert' to push the records to the index");

    Ok(())
}
