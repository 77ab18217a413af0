mod atomic;
mod format;
mod optimistic;
mod retry;

pub use atomic::AtomicAllocator;
pub use format::IdFormat;
pub use optimistic::OptimisticAllocator;
pub use retry::RetryConfig;

use crate::contracts::{Allocation, SequenceError};
use crate::metrics::AllocatorMetrics;

/// Logs and counts the result of one allocation.
fn observe(
    metrics: &AllocatorMetrics,
    sequence: &str,
    result: Result<Allocation, SequenceError>,
) -> Result<Allocation, SequenceError> {
    match &result {
        Ok(allocation) => {
            metrics.record_allocation(sequence, allocation.value, allocation.created);
            if allocation.created {
                tracing::info!(
                    sequence = %sequence,
                    value = allocation.value,
                    "Created sequence counter"
                );
            } else {
                tracing::debug!(sequence = %sequence, value = allocation.value, "Allocated");
            }
        }
        Err(e) => {
            metrics.record_failure();
            tracing::error!(sequence = %sequence, code = e.code(), error = %e, "Allocation failed");
        }
    }
    result
}
