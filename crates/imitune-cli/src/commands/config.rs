use anyhow::{Context, Result};
use imitune_sync::{config, Config};
use std::path::Path;
use toml_edit::{value, Array, DocumentMut};

/// Keys holding integers.
const INTEGER_KEYS: &[&str] = &[
    "upsert_batch_size",
    "delete_batch_size",
    "settle_delay_secs",
    "request_timeout_secs",
    "max_retries",
];

fn show_path_opt(path: Option<&Path>) -> String {
    path.map_or_else(|| String::from("<not set>"), |p| p.display().to_string())
}

fn mask(secret: Option<&str>) -> String {
    match secret {
        Some(s) if s.chars().count() > 4 => format!("{}…", s.chars().take(4).collect::<String>()),
        Some(_) => String::from("<set>"),
        None => String::from("<not set>"),
    }
}

/// Show the current effective configuration.
pub fn show_config() -> Result<()> {
    let config = Config::load()?;

    println!("Current Configuration");
    println!("=====================\n");

    println!("Config file: {}", config::config_file_path().display());

    let exists = config::config_file_path().exists();
    println!("File exists: {}\n", if exists { "yes" } else { "no (using defaults)" });

    println!("Index:");
    println!("  pinecone_api_key: {}", mask(config.pinecone_api_key.as_deref()));
    println!("  index_name: {}", config.index_name);
    println!("  index_host: {}", config.index_host.as_deref().unwrap_or("<resolved by name>"));
    println!("  namespace: {}", config.namespace.as_deref().unwrap_or("<default>"));
    println!("  control_plane_url: {}", config.control_plane_url);

    println!("\nBatching:");
    println!("  upsert_batch_size: {}", config.upsert_batch_size);
    println!("  delete_batch_size: {}", config.delete_batch_size);
    println!("  settle_delay_secs: {}", config.settle_delay_secs);
    println!("  request_timeout_secs: {}", config.request_timeout_secs);
    println!("  max_retries: {}", config.max_retries);

    println!("\nData:");
    println!("  embeddings_path: {}", config.embeddings_path.display());
    println!("  metadata_path: {}", config.metadata_path.display());
    println!("  deletion_table_path: {}", show_path_opt(config.deletion_table_path.as_deref()));
    println!("  artifact_path: {}", config.artifact_path.display());
    println!("  url_column: {}", config.url_column);
    println!("  metadata_columns: {}", config.metadata_columns.join(", "));
    println!("  key_column: {}", config.key_column.as_deref().unwrap_or("<all but url_column>"));

    println!("\nPriority: CLI args > ENV vars (IMITUNE_*) > Config file > Defaults");
    println!("PINECONE_API_KEY in the environment overrides pinecone_api_key.");

    Ok(())
}

/// Get a specific config value.
pub fn get_config(key: Option<String>) -> Result<()> {
    if let Some(key) = key {
        let config = Config::load()?;

        let shown = match key.as_str() {
            "pinecone_api_key" => mask(config.pinecone_api_key.as_deref()),
            "index_name" => config.index_name,
            "index_host" => config.index_host.unwrap_or_else(|| String::from("<not set>")),
            "namespace" => config.namespace.unwrap_or_else(|| String::from("<not set>")),
            "control_plane_url" => config.control_plane_url,
            "upsert_batch_size" => config.upsert_batch_size.to_string(),
            "delete_batch_size" => config.delete_batch_size.to_string(),
            "settle_delay_secs" => config.settle_delay_secs.to_string(),
            "request_timeout_secs" => config.request_timeout_secs.to_string(),
            "max_retries" => config.max_retries.to_string(),
            "embeddings_path" => config.embeddings_path.display().to_string(),
            "metadata_path" => config.metadata_path.display().to_string(),
            "deletion_table_path" => show_path_opt(config.deletion_table_path.as_deref()),
            "artifact_path" => config.artifact_path.display().to_string(),
            "url_column" => config.url_column,
            "metadata_columns" => config.metadata_columns.join(","),
            "key_column" => config.key_column.unwrap_or_else(|| String::from("<not set>")),
            _ => anyhow::bail!(
                "Unknown config key: {}\n\nValid keys: {}",
                key,
                config::KEYS.join(", ")
            ),
        };
        println!("{shown}");
    } else {
        // No key provided, show entire config file contents
        let config_path = config::config_file_path();

        if config_path.exists() {
            let contents = std::fs::read_to_string(&config_path)
                .context("Failed to read config file")?;
            print!("{}", contents);
        } else {
            println!("Config file does not exist: {}", config_path.display());
            println!("\nRun 'imitune config init' to create it.");
        }
    }

    Ok(())
}

/// Apply `key = value` to the TOML text in `contents`, keeping comments and
/// layout, and check the result still loads as a [`Config`].
fn apply_setting(contents: &str, key: &str, raw: &str) -> Result<String> {
    if !config::KEYS.contains(&key) {
        anyhow::bail!(
            "Unknown config key: {}\n\nValid keys: {}",
            key,
            config::KEYS.join(", ")
        );
    }

    let mut doc: DocumentMut = contents.parse().context("Failed to parse config file")?;

    if INTEGER_KEYS.contains(&key) {
        let n: i64 = raw
            .trim()
            .parse()
            .with_context(|| format!("{key} must be a whole number, got '{raw}'"))?;
        doc[key] = value(n);
    } else if key == "metadata_columns" {
        let columns: Array = raw
            .split(',')
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .collect();
        doc[key] = value(columns);
    } else {
        doc[key] = value(raw);
    }

    let updated = doc.to_string();
    toml::from_str::<Config>(&updated)
        .with_context(|| format!("Invalid value for {key}: '{raw}'"))?;
    Ok(updated)
}

/// Set a config value.
pub fn set_config(key: &str, value: &str) -> Result<()> {
    let config_path = config::config_file_path();

    // Ensure config file exists
    config::ensure_config_file()?;

    let contents = std::fs::read_to_string(&config_path)
        .context("Failed to read config file")?;
    let updated = apply_setting(&contents, key, value)?;

    std::fs::write(&config_path, updated)
        .context("Failed to write config file")?;

    let shown = if key == "pinecone_api_key" {
        mask(Some(value))
    } else {
        value.to_string()
    };
    println!("✓ Updated {} = {}", key, shown);
    println!("  in {}", config_path.display());

    Ok(())
}

/// Show the config file path.
pub fn show_path() -> Result<()> {
    let config_path = config::config_file_path();
    println!("{}", config_path.display());
    Ok(())
}

/// Show example configuration.
pub fn show_example() -> Result<()> {
    print!("{}", config::example_config());
    Ok(())
}

/// Initialize config file with defaults.
pub fn init_config() -> Result<()> {
    let created = config::ensure_config_file()?;
    let config_path = config::config_file_path();

    if created {
        println!("✓ Created config file: {}", config_path.display());
        println!("\nEdit this file to configure imitune.");
    } else {
        println!("Config file already exists: {}", config_path.display());
    }

    Ok(())
}
