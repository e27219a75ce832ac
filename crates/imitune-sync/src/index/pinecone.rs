//! Pinecone data-plane client.
//!
//! Talks to the REST API directly: `POST /vectors/upsert`,
//! `POST /vectors/delete`, and `POST /describe_index_stats` on the index's
//! host, plus `GET /indexes/{name}` on the control plane to look the host
//! up by index name. Transient failures (429, 5xx, timeouts) are retried
//! within a single call with exponential backoff; whatever still fails is
//! returned to the pipeline, which records it against the batch.

use async_trait::async_trait;
use backon::{ExponentialBuilder, Retryable};
use imitune_core::{CanonicalRecord, Metadata, RecordId};
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

use super::{IndexStats, VectorIndex};
use crate::config::Config;
use crate::error::{IndexError, IndexResult};

const API_VERSION: &str = "2024-07";

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct UpsertRequest<'a> {
    vectors: Vec<WireVector<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    namespace: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct WireVector<'a> {
    id: &'a RecordId,
    values: &'a [f32],
    #[serde(skip_serializing_if = "no_metadata")]
    metadata: &'a Metadata,
}

fn no_metadata(metadata: &&Metadata) -> bool {
    metadata.is_empty()
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpsertResponse {
    #[serde(default)]
    upserted_count: Option<u64>,
}

#[derive(Debug, Serialize)]
struct DeleteRequest<'a> {
    ids: &'a [RecordId],
    #[serde(skip_serializing_if = "Option::is_none")]
    namespace: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatsResponse {
    #[serde(default)]
    total_vector_count: u64,
    #[serde(default)]
    dimension: Option<usize>,
    #[serde(default)]
    namespaces: BTreeMap<String, NamespaceStats>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NamespaceStats {
    #[serde(default)]
    vector_count: u64,
}

#[derive(Debug, Deserialize)]
struct IndexDescription {
    host: String,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// A Pinecone index reached over HTTP.
#[derive(Debug, Clone)]
pub struct PineconeIndex {
    http: Client,
    host: String,
    index_name: String,
    namespace: Option<String>,
    max_retries: usize,
    min_retry_delay: Duration,
}

impl PineconeIndex {
    /// Connect to the index named in `config`.
    ///
    /// Uses `config.index_host` when set, otherwise asks the control plane
    /// for the index's host.
    pub async fn connect(config: &Config, api_key: &str) -> IndexResult<Self> {
        let http = build_client(api_key, Duration::from_secs(config.request_timeout_secs))?;

        let host = match &config.index_host {
            Some(host) => host.clone(),
            None => resolve_host(&http, &config.control_plane_url, &config.index_name).await?,
        };
        log::info!(
            "Connected to index '{}' at {}",
            config.index_name,
            normalize_host(&host)
        );

        Ok(Self {
            http,
            host: normalize_host(&host),
            index_name: config.index_name.clone(),
            namespace: config.namespace.clone(),
            max_retries: config.max_retries,
            min_retry_delay: Duration::from_millis(500),
        })
    }

    /// Override the initial backoff between retries.
    #[must_use]
    pub fn with_min_retry_delay(mut self, delay: Duration) -> Self {
        self.min_retry_delay = delay;
        self
    }

    /// Data-plane base URL.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    async fn post<B, R>(&self, endpoint: &str, body: &B) -> IndexResult<R>
    where
        B: Serialize + Sync + ?Sized,
        R: DeserializeOwned,
    {
        let url = format!("{}{endpoint}", self.host);
        let backoff = ExponentialBuilder::default()
            .with_min_delay(self.min_retry_delay)
            .with_max_times(self.max_retries);

        (|| async { self.post_once(&url, body).await })
            .retry(backoff)
            .when(IndexError::is_transient)
            .notify(|err, delay| {
                log::warn!("Retrying {endpoint} in {delay:?} after: {err}");
            })
            .await
    }

    async fn post_once<B, R>(&self, url: &str, body: &B) -> IndexResult<R>
    where
        B: Serialize + Sync + ?Sized,
        R: DeserializeOwned,
    {
        let response = self.http.post(url).json(body).send().await?;
        read_json(response).await
    }
}

#[async_trait]
impl VectorIndex for PineconeIndex {
    fn name(&self) -> &str {
        &self.index_name
    }

    async fn upsert(&self, records: &[CanonicalRecord]) -> IndexResult<()> {
        let request = UpsertRequest {
            vectors: records
                .iter()
                .map(|r| WireVector {
                    id: &r.id,
                    values: &r.embedding,
                    metadata: &r.metadata,
                })
                .collect(),
            namespace: self.namespace.as_deref(),
        };
        let response: UpsertResponse = self.post("/vectors/upsert", &request).await?;
        log::debug!(
            "Upserted {} of {} records",
            response.upserted_count.unwrap_or_default(),
            records.len()
        );
        Ok(())
    }

    async fn delete(&self, ids: &[RecordId]) -> IndexResult<()> {
        let request = DeleteRequest {
            ids,
            namespace: self.namespace.as_deref(),
        };
        let _: serde_json::Value = self.post("/vectors/delete", &request).await?;
        Ok(())
    }

    async fn describe_stats(&self) -> IndexResult<IndexStats> {
        let response: StatsResponse = self
            .post("/describe_index_stats", &serde_json::json!({}))
            .await?;
        Ok(IndexStats {
            total_count: response.total_vector_count,
            dimension: response.dimension,
            namespaces: response
                .namespaces
                .into_iter()
                .map(|(name, ns)| (name, ns.vector_count))
                .collect(),
        })
    }
}

fn build_client(api_key: &str, timeout: Duration) -> IndexResult<Client> {
    let mut headers = HeaderMap::new();
    headers.insert(
        "api-key",
        HeaderValue::from_str(api_key.trim()).map_err(|_| IndexError::InvalidApiKey)?,
    );
    headers.insert("x-pinecone-api-version", HeaderValue::from_static(API_VERSION));
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

    Ok(Client::builder()
        .timeout(timeout)
        .user_agent("imitune/0.1.0 (https://github.com/imitune/imitune)")
        .default_headers(headers)
        .build()?)
}

async fn resolve_host(http: &Client, control_plane: &str, index_name: &str) -> IndexResult<String> {
    let url = format!("{}/indexes/{index_name}", control_plane.trim_end_matches('/'));
    log::debug!("Resolving host for index '{index_name}' via {url}");

    let response = http.get(&url).send().await?;
    match read_json::<IndexDescription>(response).await {
        Ok(description) => Ok(description.host),
        Err(IndexError::Http { status: 404, .. }) => Err(IndexError::HostResolution {
            index: index_name.to_string(),
            message: "index does not exist".to_string(),
        }),
        Err(e) => Err(IndexError::HostResolution {
            index: index_name.to_string(),
            message: e.to_string(),
        }),
    }
}

async fn read_json<R: DeserializeOwned>(response: reqwest::Response) -> IndexResult<R> {
    let status = response.status();
    if status == StatusCode::TOO_MANY_REQUESTS {
        return Err(IndexError::RateLimited);
    }
    if !status.is_success() {
        let message = response
            .text()
            .await
            .unwrap_or_else(|_| "<body unavailable>".to_string());
        return Err(IndexError::Http {
            status: status.as_u16(),
            message,
        });
    }
    response.json::<R>().await.map_err(|e| IndexError::Parse {
        message: e.to_string(),
    })
}

/// Hosts from the control plane come without a scheme.
fn normalize_host(host: &str) -> String {
    let host = host.trim().trim_end_matches('/');
    if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("https://{host}")
    }
}
