use anyhow::{Context, Result};
use imitune_sync::{Config, VectorIndex};

pub async fn show_stats(config: &Config) -> Result<()> {
    let index = super::connect(config).await?;
    let stats = index
        .describe_stats()
        .await
        .context("Failed to read index stats")?;

    println!("\n📊 Index '{}'\n", config.index_name);
    println!("  Host: {}", index.host());
    println!("  Records: {}", stats.total_count);
    match stats.dimension {
        Some(dimension) => println!("  Dimension: {dimension}"),
        None => println!("  Dimension: unknown"),
    }

    if !stats.namespaces.is_empty() {
        println!("\n  Namespaces:");
        for (name, count) in &stats.namespaces {
            let name = if name.is_empty() { "(default)" } else { name.as_str() };
            println!("    {name}: {count}");
        }
    }

    Ok(())
}
