pub mod counter;
pub mod document;
pub mod error;
pub mod sequence;

pub use counter::{
    AtomicCounterStore, CasOutcome, ConditionalCounterStore, Counter, CounterStore,
    IncrementOutcome,
};
pub use document::{DocumentRecord, DocumentStore};
pub use error::{EntityError, LedgerError, LockResultExt, SequenceError, StorageError};
pub use sequence::{validate_sequence_name, Allocation, SequenceAllocator};
