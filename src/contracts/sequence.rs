use std::future::Future;

use serde::Serialize;

use crate::contracts::error::SequenceError;

/// A value handed out by an allocator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Allocation {
    pub sequence: String,
    pub value: u64,
    /// True if this call created the counter.
    pub created: bool,
}

/// Allocates values from named, monotonically increasing sequences.
///
/// # Invariants
/// - Values for one name are pairwise distinct across all callers
/// - Each value is greater than every value previously issued for that name
/// - A value is only returned once its increment is durable
/// - Issued values are never reused; gaps are allowed
pub trait SequenceAllocator: Send + Sync {
    /// Increments `sequence` and returns the tagged outcome.
    fn allocate(
        &self,
        sequence: &str,
    ) -> impl Future<Output = Result<Allocation, SequenceError>> + Send;

    /// Returns the last issued value without incrementing.
    fn current_value(&self, sequence: &str) -> Result<Option<u64>, SequenceError>;

    /// Returns the next value of `sequence`.
    fn next_value(&self, sequence: &str) -> impl Future<Output = Result<u64, SequenceError>> + Send {
        async move { self.allocate(sequence).await.map(|a| a.value) }
    }
}

/// Checks that a sequence name is usable as a counter key.
pub fn validate_sequence_name(name: &str) -> Result<(), SequenceError> {
    if name.trim().is_empty() || name.chars().any(char::is_control) {
        return Err(SequenceError::InvalidName(name.to_string()));
    }
    Ok(())
}
