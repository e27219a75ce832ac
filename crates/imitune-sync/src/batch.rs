//! Best-effort batch execution.
//!
//! A run partitions its items into fixed-size batches and submits them in
//! order, one request per batch. Each request yields a [`BatchOutcome`];
//! a failure is recorded and the run moves on to the next batch. The
//! outcomes fold into a [`BatchReport`].

use std::future::Future;

use crate::error::IndexResult;

/// Result of submitting one batch. Batch numbers start at 1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOutcome {
    Success { batch: usize, size: usize },
    Failure { batch: usize, size: usize, detail: String },
}

impl BatchOutcome {
    #[must_use]
    pub const fn batch(&self) -> usize {
        match self {
            Self::Success { batch, .. } | Self::Failure { batch, .. } => *batch,
        }
    }

    #[must_use]
    pub const fn size(&self) -> usize {
        match self {
            Self::Success { size, .. } | Self::Failure { size, .. } => *size,
        }
    }

    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

/// All batch outcomes of one run, in submission order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    outcomes: Vec<BatchOutcome>,
}

impl BatchReport {
    #[must_use]
    pub fn outcomes(&self) -> &[BatchOutcome] {
        &self.outcomes
    }

    /// Batches submitted.
    #[must_use]
    pub fn attempted(&self) -> usize {
        self.outcomes.len()
    }

    #[must_use]
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    #[must_use]
    pub fn failed(&self) -> usize {
        self.attempted() - self.succeeded()
    }

    /// Items carried by successful batches.
    #[must_use]
    pub fn items_succeeded(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.is_success())
            .map(BatchOutcome::size)
            .sum()
    }

    /// Items carried by failed batches.
    #[must_use]
    pub fn items_failed(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| !o.is_success())
            .map(BatchOutcome::size)
            .sum()
    }

    pub fn failures(&self) -> impl Iterator<Item = &BatchOutcome> {
        self.outcomes.iter().filter(|o| !o.is_success())
    }
}

impl FromIterator<BatchOutcome> for BatchReport {
    fn from_iter<I: IntoIterator<Item = BatchOutcome>>(iter: I) -> Self {
        Self {
            outcomes: iter.into_iter().collect(),
        }
    }
}

/// Submit `items` in batches of `batch_size`, sequentially and in order.
///
/// `action` names the operation in logs ("upsert", "delete").
pub async fn run_batches<'a, T, F, Fut>(
    items: &'a [T],
    batch_size: usize,
    action: &str,
    mut submit: F,
) -> BatchReport
where
    F: FnMut(&'a [T]) -> Fut,
    Fut: Future<Output = IndexResult<()>>,
{
    let total = items.len().div_ceil(batch_size.max(1));
    let mut report = BatchReport::default();

    for (i, chunk) in items.chunks(batch_size.max(1)).enumerate() {
        let batch = i + 1;
        let outcome = match submit(chunk).await {
            Ok(()) => {
                log::info!(
                    "[{batch}/{total}] {action} request sent for {} items",
                    chunk.len()
                );
                BatchOutcome::Success {
                    batch,
                    size: chunk.len(),
                }
            }
            Err(e) => {
                log::warn!("[{batch}/{total}] {action} failed for batch {batch}: {e}");
                BatchOutcome::Failure {
                    batch,
                    size: chunk.len(),
                    detail: e.to_string(),
                }
            }
        };
        report.outcomes.push(outcome);
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::IndexError;
    use std::cell::RefCell;

    #[tokio::test]
    async fn test_partitions_in_order_with_remainder() {
        let items: Vec<u32> = (0..2500).collect();
        let seen = RefCell::new(Vec::new());

        let report = run_batches(&items, 1000, "delete", |chunk| {
            seen.borrow_mut().push((chunk[0], chunk.len()));
            async { Ok::<(), IndexError>(()) }
        })
        .await;

        assert_eq!(seen.into_inner(), vec![(0, 1000), (1000, 1000), (2000, 500)]);
        assert_eq!(report.attempted(), 3);
        assert_eq!(report.succeeded(), 3);
        assert_eq!(report.items_succeeded(), 2500);
    }

    #[tokio::test]
    async fn test_failure_does_not_stop_later_batches() {
        let items: Vec<u32> = (0..5).collect();

        let report = run_batches(&items, 2, "upsert", |chunk| {
            let fail = chunk[0] == 2;
            async move {
                if fail {
                    Err(IndexError::Http {
                        status: 503,
                        message: "unavailable".to_string(),
                    })
                } else {
                    Ok(())
                }
            }
        })
        .await;

        assert_eq!(report.attempted(), 3);
        assert_eq!(report.failed(), 1);
        assert_eq!(report.items_failed(), 2);
        let failure = report.failures().next().unwrap();
        assert_eq!(failure.batch(), 2);
        assert!(matches!(failure, BatchOutcome::Failure { detail, .. } if detail.contains("503")));
        assert!(report.outcomes()[2].is_success());
    }

    #[tokio::test]
    async fn test_empty_input_submits_nothing() {
        let items: Vec<u32> = Vec::new();
        let report = run_batches(&items, 100, "upsert", |_| async {
            Err::<(), _>(IndexError::RateLimited)
        })
        .await;
        assert_eq!(report.attempted(), 0);
    }
}
