use anyhow::Result;
use clap::Parser;
use imitune_sync::Config;
use std::path::PathBuf;

mod commands;

#[derive(Debug, Parser)]
#[command(name = "imitune", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Vector index to operate on (overrides `index_name`)
    #[arg(long, global = true)]
    index: Option<String>,

    /// Canonical artifact path (overrides `artifact_path`)
    #[arg(long, global = true)]
    artifact: Option<PathBuf>,
}

#[derive(Debug, clap::Subcommand)]
enum Commands {
    /// Build the canonical artifact from embeddings and metadata
    ///
    /// Joins the embedding array (.npy, N x D float32) with the metadata
    /// table (CSV) by row position. Row i becomes the record with id
    /// 000000000001 + i, its embedding row, and the configured metadata
    /// columns.
    ///
    /// The two sources must have the same number of rows; otherwise nothing
    /// is written. If the artifact already exists you are asked whether to
    /// overwrite it.
    ///
    /// A manifest is written next to the artifact. It records the row count,
    /// the dimension, and a fingerprint of the metadata row order that
    /// `delete` checks before removing anything.
    Build {
        /// Embedding array (.npy)
        #[arg(long)]
        embeddings: Option<PathBuf>,
        /// Metadata table (CSV)
        #[arg(long)]
        metadata: Option<PathBuf>,
        /// Overwrite an existing artifact without asking
        #[arg(long, short = 'y')]
        yes: bool,
    },
    /// Upsert the canonical artifact into the index
    ///
    /// Records are sent in batches of `upsert_batch_size`. A failed batch is
    /// reported and the run continues with the next one. Upserting the same
    /// artifact again is harmless.
    Upsert,
    /// Build (if needed) and upsert in one staged run
    Sync {
        /// Embedding array (.npy)
        #[arg(long)]
        embeddings: Option<PathBuf>,
        /// Metadata table (CSV)
        #[arg(long)]
        metadata: Option<PathBuf>,
        /// Rebuild an existing artifact without asking
        #[arg(long, short = 'y')]
        yes: bool,
    },
    /// Delete records whose metadata row has an empty url
    ///
    /// Scans the deletion table in order, derives the id of every row whose
    /// url column is empty or missing, and deletes those ids after you
    /// confirm. The table must be in the same row order as the one the
    /// artifact was built from; this is checked against the artifact's
    /// manifest unless --skip-order-check is given.
    ///
    /// After deleting, waits `settle_delay_secs` and reports the index count
    /// before, expected, and after. The counts may not agree right away.
    Delete {
        /// Metadata table to scan (defaults to `deletion_table_path`, then
        /// `metadata_path`)
        #[arg(long)]
        table: Option<PathBuf>,
        /// Column that must be non-empty (defaults to `url_column`)
        #[arg(long)]
        column: Option<String>,
        /// Delete without asking for confirmation
        #[arg(long, short = 'y')]
        yes: bool,
        /// Do not verify the table's row order against the manifest
        #[arg(long)]
        skip_order_check: bool,
    },
    /// Show index statistics
    Stats,
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Debug, clap::Subcommand)]
enum ConfigAction {
    /// Show the effective configuration
    Show,
    /// Print one value, or the whole config file
    Get {
        /// Config key
        key: Option<String>,
    },
    /// Set a value in the config file
    Set {
        /// Config key
        key: String,
        /// New value
        value: String,
    },
    /// Print the config file path
    Path,
    /// Print an example config file
    Example,
    /// Create the config file with defaults
    Init,
}

fn apply_overrides(config: &mut Config, index: Option<String>, artifact: Option<PathBuf>) {
    if let Some(index) = index {
        config.index_name = index;
    }
    if let Some(artifact) = artifact {
        config.artifact_path = artifact;
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    if let Commands::Config { action } = cli.command {
        return match action {
            ConfigAction::Show => commands::config::show_config(),
            ConfigAction::Get { key } => commands::config::get_config(key),
            ConfigAction::Set { key, value } => commands::config::set_config(&key, &value),
            ConfigAction::Path => commands::config::show_path(),
            ConfigAction::Example => commands::config::show_example(),
            ConfigAction::Init => commands::config::init_config(),
        };
    }

    let mut config = Config::load()?;
    apply_overrides(&mut config, cli.index, cli.artifact);

    match cli.command {
        Commands::Build {
            embeddings,
            metadata,
            yes,
        } => {
            if let Some(path) = embeddings {
                config.embeddings_path = path;
            }
            if let Some(path) = metadata {
                config.metadata_path = path;
            }
            commands::run_build(&config, yes)?;
        }
        Commands::Upsert => {
            commands::run_upsert(&config).await?;
        }
        Commands::Sync {
            embeddings,
            metadata,
            yes,
        } => {
            if let Some(path) = embeddings {
                config.embeddings_path = path;
            }
            if let Some(path) = metadata {
                config.metadata_path = path;
            }
            commands::run_sync(&config, yes).await?;
        }
        Commands::Delete {
            table,
            column,
            yes,
            skip_order_check,
        } => {
            if let Some(path) = table {
                config.deletion_table_path = Some(path);
            }
            if let Some(column) = column {
                config.url_column = column;
            }
            commands::run_delete(&config, yes, skip_order_check).await?;
        }
        Commands::Stats => {
            commands::show_stats(&config).await?;
        }
        Commands::Config { .. } => {}
    }

    Ok(())
}
