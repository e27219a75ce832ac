pub mod build;
pub mod config;
pub mod delete;
pub mod stats;
pub mod sync;
pub mod upsert;

use anyhow::{Context, Result};
use imitune_sync::{resolve_api_key, Config, Confirm, FixedAnswer, PineconeIndex, TerminalConfirm};

pub use build::run_build;
pub use delete::run_delete;
pub use stats::show_stats;
pub use sync::run_sync;
pub use upsert::run_upsert;

/// Prompt on the terminal, or answer yes to everything.
fn confirmer(assume_yes: bool) -> &'static dyn Confirm {
    if assume_yes {
        &FixedAnswer(true)
    } else {
        &TerminalConfirm
    }
}

/// Resolve the API key and connect to the configured index.
async fn connect(config: &Config) -> Result<PineconeIndex> {
    let api_key = resolve_api_key(config)?;
    PineconeIndex::connect(config, &api_key)
        .await
        .with_context(|| format!("Failed to connect to index '{}'", config.index_name))
}
