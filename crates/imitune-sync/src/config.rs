use anyhow::{Context, Result};
use confyg::{env, Confygery};
use imitune_core::FingerprintKey;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::SyncError;

/// Configuration for imitune.
///
/// Configuration is loaded from multiple sources with the following priority:
/// 1. CLI arguments (highest priority)
/// 2. Environment variables (IMITUNE_* prefix)
/// 3. Config file (~/.config/imitune/config.toml)
/// 4. Built-in defaults (lowest priority)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Pinecone API key.
    ///
    /// `PINECONE_API_KEY` in the environment takes precedence over this
    /// value; if neither is set the key is prompted for.
    ///
    /// Can be set via:
    /// - ENV: IMITUNE_PINECONE_API_KEY
    /// - Config: pinecone_api_key = "..."
    pub pinecone_api_key: Option<String>,

    /// Name of the vector index.
    pub index_name: String,

    /// Data-plane host of the index. Looked up through the control plane
    /// when unset.
    pub index_host: Option<String>,

    /// Index namespace; the default namespace when unset.
    pub namespace: Option<String>,

    /// Base URL of the Pinecone control plane.
    pub control_plane_url: String,

    /// Records per upsert request.
    pub upsert_batch_size: usize,

    /// Ids per delete request.
    pub delete_batch_size: usize,

    /// Seconds to wait before reading index stats after a deletion.
    pub settle_delay_secs: u64,

    /// Per-request HTTP timeout in seconds.
    pub request_timeout_secs: u64,

    /// Retries of a single request on transient errors.
    pub max_retries: usize,

    /// Embedding array (`.npy`, shape `N x D`).
    pub embeddings_path: PathBuf,

    /// Metadata table (CSV) in the same row order as the embeddings.
    pub metadata_path: PathBuf,

    /// Metadata table scanned by `delete`. Defaults to `metadata_path`.
    pub deletion_table_path: Option<PathBuf>,

    /// Canonical artifact written by `build` and read by `upsert`.
    pub artifact_path: PathBuf,

    /// Source-reference column; rows where it is empty are deleted.
    pub url_column: String,

    /// Columns copied into each record's metadata.
    pub metadata_columns: Vec<String>,

    /// Column identifying a row for the row-order fingerprint. When unset,
    /// every column except `url_column` is fingerprinted.
    pub key_column: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            pinecone_api_key: None,
            index_name: String::from("imitune-search"),
            index_host: None,
            namespace: None,
            control_plane_url: String::from("https://api.pinecone.io"),
            upsert_batch_size: 100,
            delete_batch_size: 1000,
            settle_delay_secs: 30,
            request_timeout_secs: 30,
            max_retries: 3,
            embeddings_path: default_data_dir().join("fsd_embeddings.npy"),
            metadata_path: default_data_dir().join("fsd50k_with_freesound_urls.csv"),
            deletion_table_path: None,
            artifact_path: default_data_dir().join("embeddings.json"),
            url_column: String::from("freesound_url"),
            metadata_columns: vec![String::from("freesound_url")],
            key_column: None,
        }
    }
}

impl Config {
    /// Load configuration from file and environment variables.
    ///
    /// Searches for config file at: ~/.config/imitune/config.toml
    /// Reads environment variables with IMITUNE_ prefix.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed.
    pub fn load() -> Result<Self> {
        let config_path = config_file_path();

        let mut builder = Confygery::new()
            .context("Failed to create config builder")?;

        if config_path.exists() {
            let path_str = config_path.to_str()
                .ok_or_else(|| anyhow::anyhow!("Config path contains invalid UTF-8"))?;
            builder.add_file(path_str)
                .context("Failed to load config file")?;
        }

        let env_opts = env::Options::with_top_level("imitune");
        builder.add_env(env_opts)
            .context("Failed to load environment variables")?;

        let config: Self = builder.build()
            .context("Failed to build configuration")?;

        Ok(config)
    }

    /// The metadata table scanned by deletion runs.
    #[must_use]
    pub fn deletion_table(&self) -> &PathBuf {
        self.deletion_table_path.as_ref().unwrap_or(&self.metadata_path)
    }

    /// The key recorded in a new generation's row-order fingerprint.
    #[must_use]
    pub fn fingerprint_key(&self) -> FingerprintKey {
        match &self.key_column {
            Some(column) => FingerprintKey::Column(column.clone()),
            None => FingerprintKey::AllExcept(vec![self.url_column.clone()]),
        }
    }

    /// The explicit settings handed to each pipeline run.
    #[must_use]
    pub fn pipeline(&self) -> PipelineConfig {
        PipelineConfig {
            index_name: self.index_name.clone(),
            upsert_batch_size: self.upsert_batch_size,
            delete_batch_size: self.delete_batch_size,
            settle_delay: Duration::from_secs(self.settle_delay_secs),
        }
    }
}

/// Settings for a single upsert or deletion run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    pub index_name: String,
    pub upsert_batch_size: usize,
    pub delete_batch_size: usize,
    pub settle_delay: Duration,
}

impl PipelineConfig {
    /// Check a batch size against the index's per-request limit.
    pub(crate) fn check_batch_size(
        what: &str,
        size: usize,
        limit: usize,
    ) -> std::result::Result<(), SyncError> {
        if size == 0 || size > limit {
            return Err(SyncError::InvalidConfig(format!(
                "{what} batch size must be between 1 and {limit}, got {size}"
            )));
        }
        Ok(())
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Config::default().pipeline()
    }
}

/// Get the default directory for dataset files.
///
/// Returns: ~/.local/share/imitune (or platform equivalent)
fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("imitune")
}

/// Get the config file path.
///
/// Returns:
/// - Linux: ~/.config/imitune/config.toml
/// - macOS: ~/Library/Application Support/imitune/config.toml
/// - Windows: %APPDATA%\imitune\config.toml
pub fn config_file_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("imitune")
        .join("config.toml")
}

/// Keys accepted by `config get` and `config set`.
pub const KEYS: &[&str] = &[
    "pinecone_api_key",
    "index_name",
    "index_host",
    "namespace",
    "control_plane_url",
    "upsert_batch_size",
    "delete_batch_size",
    "settle_delay_secs",
    "request_timeout_secs",
    "max_retries",
    "embeddings_path",
    "metadata_path",
    "deletion_table_path",
    "artifact_path",
    "url_column",
    "metadata_columns",
    "key_column",
];

/// Get the example config file content.
pub fn example_config() -> &'static str {
    r#"# Imitune Configuration File
#
# Configuration is loaded from multiple sources with the following priority:
# 1. CLI arguments (highest priority)
# 2. Environment variables (IMITUNE_* prefix)
# 3. This config file
# 4. Built-in defaults (lowest priority)

# Pinecone API key
#
# PINECONE_API_KEY in the environment overrides this value. When neither is
# set, imitune prompts for the key before contacting the index.
#
# Can also be set via:
# - Environment: IMITUNE_PINECONE_API_KEY=your-key-here
#pinecone_api_key = "your-pinecone-api-key-here"

# Vector index to synchronize
index_name = "imitune-search"

# Data-plane host of the index (looked up by name when unset)
#index_host = "imitune-search-abc123.svc.us-east-1.pinecone.io"

# Index namespace (default namespace when unset)
#namespace = "fsd50k"

# Batch sizes (Pinecone accepts at most 1000 items per request)
upsert_batch_size = 100
delete_batch_size = 1000

# Seconds to wait for index stats to settle after deleting
settle_delay_secs = 30

# HTTP behaviour
request_timeout_secs = 30
max_retries = 3

# Dataset files
#embeddings_path = "/data/fsd_embeddings.npy"
#metadata_path = "/data/fsd50k_with_freesound_urls.csv"
#deletion_table_path = "/data/fsd50k_with_freesound_urls_novoices.csv"
#artifact_path = "/data/embeddings.json"

# Metadata columns
url_column = "freesound_url"
metadata_columns = ["freesound_url"]

# Column identifying each row for the row-order check. When unset, every
# column except url_column is fingerprinted.
#key_column = "fname"
"#
}

/// Create default config file if it doesn't exist.
///
/// Returns true if a new file was created, false if it already existed.
pub fn ensure_config_file() -> Result<bool> {
    let config_path = config_file_path();

    if config_path.exists() {
        return Ok(false);
    }

    if let Some(parent) = config_path.parent() {
        std::fs::create_dir_all(parent)
            .context("Failed to create config directory")?;
    }

    std::fs::write(&config_path, example_config())
        .context("Failed to write config file")?;

    Ok(true)
}
