use std::sync::{MutexGuard, PoisonError, RwLockReadGuard, RwLockWriteGuard};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Sequence error: {0}")]
    Sequence(#[from] SequenceError),

    #[error("Entity error: {0}")]
    Entity(#[from] EntityError),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl LedgerError {
    /// Stable error code for machine-readable output.
    pub fn code(&self) -> &'static str {
        match self {
            LedgerError::Storage(e) => e.code(),
            LedgerError::Sequence(e) => e.code(),
            LedgerError::Entity(e) => e.code(),
            LedgerError::Serialization(_) => "SERIALIZATION_ERROR",
        }
    }
}

/// Extension trait for converting lock errors to StorageError.
pub trait LockResultExt<T> {
    /// Converts a lock error to a StorageError.
    fn map_lock_err(self) -> Result<T, StorageError>;
}

impl<'a, T> LockResultExt<RwLockReadGuard<'a, T>>
    for Result<RwLockReadGuard<'a, T>, PoisonError<RwLockReadGuard<'a, T>>>
{
    #[inline]
    fn map_lock_err(self) -> Result<RwLockReadGuard<'a, T>, StorageError> {
        self.map_err(|e| StorageError::LockPoisoned(e.to_string()))
    }
}

impl<'a, T> LockResultExt<RwLockWriteGuard<'a, T>>
    for Result<RwLockWriteGuard<'a, T>, PoisonError<RwLockWriteGuard<'a, T>>>
{
    #[inline]
    fn map_lock_err(self) -> Result<RwLockWriteGuard<'a, T>, StorageError> {
        self.map_err(|e| StorageError::LockPoisoned(e.to_string()))
    }
}

impl<'a, T> LockResultExt<MutexGuard<'a, T>>
    for Result<MutexGuard<'a, T>, PoisonError<MutexGuard<'a, T>>>
{
    #[inline]
    fn map_lock_err(self) -> Result<MutexGuard<'a, T>, StorageError> {
        self.map_err(|e| StorageError::LockPoisoned(e.to_string()))
    }
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("RocksDB error: {0}")]
    RocksDb(String),

    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Write conflict: {0}")]
    Conflict(String),

    #[error("Unique index violation on {collection}.{field} = {value}")]
    UniqueViolation {
        collection: String,
        field: String,
        value: String,
    },

    #[error("Counter overflow: {0}")]
    Overflow(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Lock poisoned: {0}")]
    LockPoisoned(String),
}

impl StorageError {
    pub fn code(&self) -> &'static str {
        match self {
            StorageError::RocksDb(_) | StorageError::Unavailable(_) => "STORAGE_UNAVAILABLE",
            StorageError::InvalidInput(_) => "INVALID_INPUT",
            StorageError::Conflict(_) => "WRITE_CONFLICT",
            StorageError::UniqueViolation { .. } => "UNIQUE_VIOLATION",
            StorageError::Overflow(_) => "COUNTER_OVERFLOW",
            StorageError::Serialization(_) => "SERIALIZATION_ERROR",
            StorageError::LockPoisoned(_) => "LOCK_POISONED",
        }
    }
}

/// Errors surfaced by a sequence allocator.
#[derive(Error, Debug)]
pub enum SequenceError {
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("Concurrency conflict on sequence {sequence} after {attempts} attempts")]
    ConcurrencyConflict { sequence: String, attempts: u32 },

    #[error("Invalid sequence name: {0:?}")]
    InvalidName(String),

    #[error("Sequence overflow: {0}")]
    Overflow(String),

    #[error("Corrupted counter: {0}")]
    Corrupted(String),
}

impl SequenceError {
    /// Returns true if the caller may retry the same request later.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SequenceError::StorageUnavailable(_) | SequenceError::ConcurrencyConflict { .. }
        )
    }

    pub fn code(&self) -> &'static str {
        match self {
            SequenceError::StorageUnavailable(_) => "STORAGE_UNAVAILABLE",
            SequenceError::ConcurrencyConflict { .. } => "CONCURRENCY_CONFLICT",
            SequenceError::InvalidName(_) => "INVALID_SEQUENCE_NAME",
            SequenceError::Overflow(_) => "SEQUENCE_OVERFLOW",
            SequenceError::Corrupted(_) => "CORRUPTED_COUNTER",
        }
    }
}

impl From<StorageError> for SequenceError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::InvalidInput(name) => SequenceError::InvalidName(name),
            StorageError::Overflow(name) => SequenceError::Overflow(name),
            StorageError::Serialization(msg) => SequenceError::Corrupted(msg),
            StorageError::Conflict(sequence) => SequenceError::ConcurrencyConflict {
                sequence,
                attempts: 1,
            },
            other => SequenceError::StorageUnavailable(other.to_string()),
        }
    }
}

/// Errors surfaced while creating or updating identified entities.
#[derive(Error, Debug)]
pub enum EntityError {
    #[error(transparent)]
    Sequence(#[from] SequenceError),

    #[error("Duplicate identifier {id} in {collection}")]
    DuplicateIdentifier { collection: String, id: String },

    #[error("Duplicate value for unique field {field}: {value}")]
    DuplicateField { field: String, value: String },

    #[error("{collection} not found: {id}")]
    NotFound { collection: String, id: String },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl EntityError {
    /// Returns true if the same creation request may succeed when retried.
    ///
    /// `DuplicateIdentifier` is never retryable: it means the counter was reset
    /// or corrupted and needs an operator.
    pub fn is_retryable(&self) -> bool {
        match self {
            EntityError::Sequence(e) => e.is_retryable(),
            EntityError::Storage(e) => matches!(
                e,
                StorageError::RocksDb(_) | StorageError::Unavailable(_) | StorageError::Conflict(_)
            ),
            _ => false,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            EntityError::Sequence(e) => e.code(),
            EntityError::DuplicateIdentifier { .. } => "DUPLICATE_IDENTIFIER",
            EntityError::DuplicateField { .. } => "DUPLICATE_FIELD",
            EntityError::NotFound { .. } => "NOT_FOUND",
            EntityError::Validation(_) => "VALIDATION_FAILED",
            EntityError::Storage(e) => e.code(),
        }
    }
}
