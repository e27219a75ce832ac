//! In-process [`VectorIndex`].
//!
//! Keeps records in a map and records every mutation request it receives.
//! Individual requests can be made to fail, which lets pipeline runs be
//! exercised without a network.

use async_trait::async_trait;
use imitune_core::{CanonicalRecord, RecordId};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::{IndexStats, VectorIndex};
use crate::error::{IndexError, IndexResult};

/// A mutation request received by a [`MemoryIndex`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexCall {
    Upsert { ids: Vec<RecordId> },
    Delete { ids: Vec<RecordId> },
}

impl IndexCall {
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Upsert { ids } | Self::Delete { ids } => ids.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Default)]
struct State {
    records: BTreeMap<RecordId, CanonicalRecord>,
    calls: Vec<IndexCall>,
    failing: BTreeSet<usize>,
    stats_unavailable: bool,
}

/// A vector index held in memory.
#[derive(Debug)]
pub struct MemoryIndex {
    name: String,
    state: Mutex<State>,
}

impl MemoryIndex {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: Mutex::new(State::default()),
        }
    }

    /// Seed the index with `records`, without recording a call.
    #[must_use]
    pub fn with_records(self, records: impl IntoIterator<Item = CanonicalRecord>) -> Self {
        {
            let mut state = self.lock();
            for record in records {
                state.records.insert(record.id, record);
            }
        }
        self
    }

    /// Make the `call`-th mutation request (1-based) fail with HTTP 503.
    #[must_use]
    pub fn failing_call(self, call: usize) -> Self {
        self.lock().failing.insert(call);
        self
    }

    /// Make every stats read fail.
    #[must_use]
    pub fn without_stats(self) -> Self {
        self.lock().stats_unavailable = true;
        self
    }

    /// Mutation requests received so far, oldest first.
    #[must_use]
    pub fn calls(&self) -> Vec<IndexCall> {
        self.lock().calls.clone()
    }

    /// Sizes of the delete requests received so far.
    #[must_use]
    pub fn delete_sizes(&self) -> Vec<usize> {
        self.lock()
            .calls
            .iter()
            .filter(|c| matches!(c, IndexCall::Delete { .. }))
            .map(IndexCall::len)
            .collect()
    }

    #[must_use]
    pub fn contains(&self, id: RecordId) -> bool {
        self.lock().records.contains_key(&id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record `call` and report whether it was scripted to fail.
    fn admit(state: &mut State, call: IndexCall) -> IndexResult<()> {
        state.calls.push(call);
        if state.failing.contains(&state.calls.len()) {
            return Err(IndexError::Http {
                status: 503,
                message: "service unavailable".to_string(),
            });
        }
        Ok(())
    }
}

impl Default for MemoryIndex {
    fn default() -> Self {
        Self::new("memory")
    }
}

#[async_trait]
impl VectorIndex for MemoryIndex {
    fn name(&self) -> &str {
        &self.name
    }

    async fn upsert(&self, records: &[CanonicalRecord]) -> IndexResult<()> {
        let mut state = self.lock();
        let ids = records.iter().map(|r| r.id).collect();
        Self::admit(&mut state, IndexCall::Upsert { ids })?;
        for record in records {
            state.records.insert(record.id, record.clone());
        }
        Ok(())
    }

    async fn delete(&self, ids: &[RecordId]) -> IndexResult<()> {
        let mut state = self.lock();
        Self::admit(&mut state, IndexCall::Delete { ids: ids.to_vec() })?;
        for id in ids {
            state.records.remove(id);
        }
        Ok(())
    }

    async fn describe_stats(&self) -> IndexResult<IndexStats> {
        let state = self.lock();
        if state.stats_unavailable {
            return Err(IndexError::Http {
                status: 500,
                message: "stats unavailable".to_string(),
            });
        }
        let total_count = state.records.len() as u64;
        Ok(IndexStats {
            total_count,
            dimension: state.records.values().next().map(CanonicalRecord::dimension),
            namespaces: BTreeMap::from([(String::new(), total_count)]),
        })
    }
}
