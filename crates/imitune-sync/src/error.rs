//! Error types for the index pipelines.

use thiserror::Error;

/// Errors returned by a remote vector index.
///
/// Inside a pipeline run these are per-batch and recoverable: they are
/// folded into the run's report rather than aborting it.
#[derive(Debug, Error)]
pub enum IndexError {
    /// The index answered with a non-success status.
    #[error("HTTP {status} from index: {message}")]
    Http { status: u16, message: String },

    /// The index returned a rate-limit response.
    #[error("rate limited by index")]
    RateLimited,

    /// A response body could not be parsed.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// The data-plane host of the index could not be determined.
    #[error("cannot resolve host for index {index}: {message}")]
    HostResolution { index: String, message: String },

    /// The API key cannot be sent as a header value.
    #[error("API key contains characters not allowed in an HTTP header")]
    InvalidApiKey,

    /// An error propagated from `reqwest`.
    #[error("request error: {0}")]
    Request(#[from] reqwest::Error),
}

impl IndexError {
    /// Returns `true` when the error is transient and the same request may
    /// succeed if retried.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::RateLimited => true,
            Self::Http { status, .. } => *status >= 500,
            Self::Request(e) => e.is_timeout() || e.is_connect(),
            Self::Parse { .. } | Self::HostResolution { .. } | Self::InvalidApiKey => false,
        }
    }
}

/// Convenience alias for index results.
pub type IndexResult<T> = std::result::Result<T, IndexError>;

/// Fatal errors that abort a pipeline run before or instead of mutating the
/// remote index.
#[derive(Debug, Error)]
pub enum SyncError {
    /// A dataset input or artifact error from the core layer.
    #[error(transparent)]
    Core(#[from] imitune_core::Error),

    /// The index could not be reached for a required read.
    #[error("index error: {0}")]
    Index(#[from] IndexError),

    /// A configuration value is out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// No API key was available from any source.
    #[error("no Pinecone API key was provided")]
    MissingCredential,
}

/// Convenience alias for pipeline results.
pub type SyncResult<T> = std::result::Result<T, SyncError>;
