use serde::{Deserialize, Serialize};

use crate::contracts::error::StorageError;

/// A named counter as persisted by a counter store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counter {
    pub name: String,
    /// Last value issued for this sequence.
    pub value: u64,
}

/// Result of an atomic increment-and-fetch.
///
/// The upsert is explicit: a counter that did not exist reports `Created`,
/// carrying the first value it issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IncrementOutcome {
    Created(u64),
    Incremented(u64),
}

impl IncrementOutcome {
    /// The post-increment value, regardless of whether the counter was created.
    pub fn value(self) -> u64 {
        match self {
            IncrementOutcome::Created(v) | IncrementOutcome::Incremented(v) => v,
        }
    }

    pub fn was_created(self) -> bool {
        matches!(self, IncrementOutcome::Created(_))
    }
}

/// Result of a conditional counter write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CasOutcome {
    Committed,
    /// The stored value no longer matched the expectation.
    Conflict { current: Option<u64> },
}

/// Read access shared by every counter store.
///
/// # Invariants
/// - One record per sequence name
/// - A stored value only changes through `increment` or `compare_and_swap`
pub trait CounterStore: Send + Sync {
    /// Returns the last issued value, or None if the counter does not exist.
    fn load(&self, name: &str) -> Result<Option<u64>, StorageError>;

    /// Lists all counters, ordered by name.
    fn list_counters(&self) -> Result<Vec<Counter>, StorageError>;
}

/// A store that can increment a counter in a single atomic operation.
pub trait AtomicCounterStore: CounterStore {
    /// Increments `name` by one and returns the new value.
    /// An absent counter is created at `seed` and incremented, so the
    /// first value returned is `seed + 1`.
    /// The new value MUST be durable before this returns.
    fn increment(&self, name: &str, seed: u64) -> Result<IncrementOutcome, StorageError>;
}

/// A store that only offers read plus conditional write.
pub trait ConditionalCounterStore: CounterStore {
    /// Writes `new` for `name` only if the stored value still equals
    /// `expected` (`None` meaning the counter must not exist yet).
    fn compare_and_swap(
        &self,
        name: &str,
        expected: Option<u64>,
        new: u64,
    ) -> Result<CasOutcome, StorageError>;
}
