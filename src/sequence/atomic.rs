use std::future::Future;
use std::sync::Arc;

use crate::contracts::{
    validate_sequence_name, Allocation, AtomicCounterStore, SequenceAllocator, SequenceError,
};
use crate::metrics::AllocatorMetrics;

/// Allocator for stores with an increment-and-fetch primitive.
///
/// Each allocation is exactly one call to `AtomicCounterStore::increment`;
/// there is no read-then-write window and nothing to retry.
pub struct AtomicAllocator<S> {
    store: Arc<S>,
    seed: u64,
    metrics: Arc<AllocatorMetrics>,
}

impl<S: AtomicCounterStore> AtomicAllocator<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            seed: 0,
            metrics: Arc::new(AllocatorMetrics::new()),
        }
    }

    /// Sets the value new counters start from; the first issued value is `seed + 1`.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<AllocatorMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn metrics(&self) -> &Arc<AllocatorMetrics> {
        &self.metrics
    }

    fn try_allocate(&self, sequence: &str) -> Result<Allocation, SequenceError> {
        validate_sequence_name(sequence)?;
        let outcome = self.store.increment(sequence, self.seed)?;
        Ok(Allocation {
            sequence: sequence.to_string(),
            value: outcome.value(),
            created: outcome.was_created(),
        })
    }
}

impl<S: AtomicCounterStore> SequenceAllocator for AtomicAllocator<S> {
    fn allocate(
        &self,
        sequence: &str,
    ) -> impl Future<Output = Result<Allocation, SequenceError>> + Send {
        async move { super::observe(&self.metrics, sequence, self.try_allocate(sequence)) }
    }

    fn current_value(&self, sequence: &str) -> Result<Option<u64>, SequenceError> {
        validate_sequence_name(sequence)?;
        Ok(self.store.load(sequence)?)
    }
}
