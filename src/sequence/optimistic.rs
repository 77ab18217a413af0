use std::future::Future;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use backon::Retryable;

use crate::contracts::{
    validate_sequence_name, Allocation, CasOutcome, ConditionalCounterStore, SequenceAllocator,
    SequenceError,
};
use crate::metrics::AllocatorMetrics;
use crate::sequence::RetryConfig;

/// Allocator for stores that only offer read plus conditional write.
///
/// Each attempt reads the counter and writes `current + 1` on the condition
/// that nobody else wrote in between. Lost races are retried with jittered
/// exponential backoff until `RetryConfig::max_attempts` is spent. Storage
/// failures are returned immediately.
pub struct OptimisticAllocator<S> {
    store: Arc<S>,
    seed: u64,
    retry: RetryConfig,
    metrics: Arc<AllocatorMetrics>,
}

impl<S: ConditionalCounterStore> OptimisticAllocator<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            seed: 0,
            retry: RetryConfig::default(),
            metrics: Arc::new(AllocatorMetrics::new()),
        }
    }

    /// Sets the value new counters start from; the first issued value is `seed + 1`.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<AllocatorMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn metrics(&self) -> &Arc<AllocatorMetrics> {
        &self.metrics
    }

    pub fn retry_config(&self) -> &RetryConfig {
        &self.retry
    }

    /// One read followed by one conditional write.
    fn attempt(&self, sequence: &str) -> Result<Allocation, SequenceError> {
        let current = self.store.load(sequence)?;
        let next = current
            .unwrap_or(self.seed)
            .checked_add(1)
            .ok_or_else(|| SequenceError::Overflow(sequence.to_string()))?;

        match self.store.compare_and_swap(sequence, current, next)? {
            CasOutcome::Committed => Ok(Allocation {
                sequence: sequence.to_string(),
                value: next,
                created: current.is_none(),
            }),
            CasOutcome::Conflict { .. } => {
                self.metrics.record_conflict();
                Err(SequenceError::ConcurrencyConflict {
                    sequence: sequence.to_string(),
                    attempts: 1,
                })
            }
        }
    }

    async fn allocate_with_retry(&self, sequence: &str) -> Result<Allocation, SequenceError> {
        validate_sequence_name(sequence)?;

        let attempts = AtomicU32::new(0);
        let counted = &attempts;
        let result = (move || async move {
            counted.fetch_add(1, Ordering::Relaxed);
            self.attempt(sequence)
        })
        .retry(self.retry.backoff())
        .when(|e| matches!(e, SequenceError::ConcurrencyConflict { .. }))
        .notify(|err, dur| {
            tracing::warn!(
                sequence = %sequence,
                attempt = counted.load(Ordering::Relaxed),
                error = %err,
                retry_in = ?dur,
                "Counter write conflicted, retrying"
            );
        })
        .await;

        result.map_err(|e| match e {
            SequenceError::ConcurrencyConflict { sequence, .. } => {
                SequenceError::ConcurrencyConflict {
                    sequence,
                    attempts: attempts.load(Ordering::Relaxed),
                }
            }
            other => other,
        })
    }
}

impl<S: ConditionalCounterStore> SequenceAllocator for OptimisticAllocator<S> {
    fn allocate(
        &self,
        sequence: &str,
    ) -> impl Future<Output = Result<Allocation, SequenceError>> + Send {
        async move {
            let result = self.allocate_with_retry(sequence).await;
            super::observe(&self.metrics, sequence, result)
        }
    }

    fn current_value(&self, sequence: &str) -> Result<Option<u64>, SequenceError> {
        validate_sequence_name(sequence)?;
        Ok(self.store.load(sequence)?)
    }
}
