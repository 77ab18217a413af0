use serde::{Deserialize, Serialize};

use crate::contracts::error::StorageError;

/// A stored document together with its unique-indexed fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub id: String,
    /// `(field, value)` pairs that must be unique within the collection.
    pub unique: Vec<(String, String)>,
    pub body: Vec<u8>,
}

/// Document collections with unique secondary indexes.
///
/// # Invariants
/// - Insert and replace are all-or-nothing: a unique violation leaves the
///   document and every index entry untouched
/// - At most one document per `(collection, field, value)`
pub trait DocumentStore: Send + Sync {
    /// Inserts a new document.
    /// Fails with `UniqueViolation` if any unique value is taken, or with
    /// `InvalidInput` if the id already exists.
    fn insert(&self, collection: &str, record: &DocumentRecord) -> Result<(), StorageError>;

    /// Replaces an existing document, re-indexing its unique fields.
    /// Returns false if no document has `record.id`.
    fn replace(&self, collection: &str, record: &DocumentRecord) -> Result<bool, StorageError>;

    fn get(&self, collection: &str, id: &str) -> Result<Option<DocumentRecord>, StorageError>;

    /// Looks up a document through a unique index.
    fn find_unique(
        &self,
        collection: &str,
        field: &str,
        value: &str,
    ) -> Result<Option<DocumentRecord>, StorageError>;

    fn list(&self, collection: &str) -> Result<Vec<DocumentRecord>, StorageError>;

    /// Removes a document and its index entries.
    /// Returns the removed document, or None if it did not exist.
    fn remove(&self, collection: &str, id: &str) -> Result<Option<DocumentRecord>, StorageError>;
}
