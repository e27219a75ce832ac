//! Pinecone API key resolution.

use std::io;

use crate::config::Config;
use crate::error::{SyncError, SyncResult};

/// Environment variable checked before any configured value.
pub const API_KEY_ENV: &str = "PINECONE_API_KEY";

/// Resolve the API key: environment, then configuration, then an
/// interactive hidden prompt.
pub fn resolve_api_key(config: &Config) -> SyncResult<String> {
    resolve_from(
        std::env::var(API_KEY_ENV).ok(),
        config.pinecone_api_key.clone(),
        || {
            println!("{API_KEY_ENV} environment variable not found.");
            rpassword::prompt_password("Please enter your Pinecone API Key: ")
        },
    )
}

/// Pick the first non-blank key, prompting only when none is available.
pub fn resolve_from<F>(env: Option<String>, configured: Option<String>, prompt: F) -> SyncResult<String>
where
    F: FnOnce() -> io::Result<String>,
{
    if let Some(key) = non_blank(env) {
        log::debug!("Using API key from {API_KEY_ENV}");
        return Ok(key);
    }
    if let Some(key) = non_blank(configured) {
        log::debug!("Using API key from configuration");
        return Ok(key);
    }
    match prompt() {
        Ok(key) => non_blank(Some(key)).ok_or(SyncError::MissingCredential),
        Err(e) => {
            log::warn!("Could not read API key: {e}");
            Err(SyncError::MissingCredential)
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
