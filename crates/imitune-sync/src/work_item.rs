use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use treadle::WorkItem;
use uuid::Uuid;

/// One `sync` run flowing through the build → upsert workflow.
///
/// Every run gets its own id so that completed stages of an earlier run
/// are never mistaken for this one's.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncJob {
    id: String,
    /// Canonical artifact the run builds and upserts.
    pub artifact: PathBuf,
}

impl SyncJob {
    #[must_use]
    pub fn new(id: impl Into<String>, artifact: PathBuf) -> Self {
        Self {
            id: id.into(),
            artifact,
        }
    }

    /// A job with a freshly generated id.
    #[must_use]
    pub fn fresh(artifact: PathBuf) -> Self {
        Self::new(format!("sync-{}", Uuid::new_v4()), artifact)
    }
}

impl WorkItem for SyncJob {
    fn id(&self) -> &str {
        &self.id
    }
}

impl fmt::Display for SyncJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.artifact.display())
    }
}
