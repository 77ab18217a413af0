use std::path::Path;

use rocksdb::{
    Direction, ErrorKind, IteratorMode, OptimisticTransactionDB, OptimisticTransactionOptions,
    Options, Transaction, WriteOptions,
};

use crate::contracts::{
    CasOutcome, ConditionalCounterStore, Counter, CounterStore, DocumentRecord, DocumentStore,
    StorageError,
};

/// Key prefix for sequence counters
const COUNTER_PREFIX: &str = "ctr";
/// Key prefix for documents
const DOC_PREFIX: &str = "doc";
/// Key prefix for unique index entries
const UNIQUE_PREFIX: &str = "uniq";

type Txn<'db> = Transaction<'db, OptimisticTransactionDB>;

/// RocksDB-backed store built on optimistic transactions.
///
/// RocksDB has no increment-and-fetch primitive (merge operators do not
/// return the merged value), so counters are exposed through
/// `ConditionalCounterStore`: a transaction reads the counter with
/// `get_for_update` and the commit fails if another writer touched it.
pub struct RocksDbStore {
    db: OptimisticTransactionDB,
    /// Sync the WAL on every commit so an issued value survives an OS crash.
    sync_writes: bool,
}

impl RocksDbStore {
    /// Opens or creates a store at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref();
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);

        let parallelism = std::thread::available_parallelism()
            .map(|p| p.get() as i32)
            .unwrap_or(4);
        opts.increase_parallelism(parallelism);

        let db = OptimisticTransactionDB::open(&opts, path)
            .map_err(|e| StorageError::RocksDb(e.to_string()))?;

        tracing::debug!(path = %path.display(), "Opened RocksDB store");

        Ok(Self {
            db,
            sync_writes: true,
        })
    }

    /// Enables or disables WAL sync on commit.
    pub fn with_sync_writes(mut self, sync_writes: bool) -> Self {
        self.sync_writes = sync_writes;
        self
    }

    pub fn sync_writes(&self) -> bool {
        self.sync_writes
    }

    /// Creates a counter key.
    fn counter_key(name: &str) -> String {
        format!("{}:{}", COUNTER_PREFIX, name)
    }

    /// Creates a document key.
    fn doc_key(collection: &str, id: &str) -> String {
        format!("{}:{}:{}", DOC_PREFIX, collection, id)
    }

    /// Creates a unique index key.
    fn unique_key(collection: &str, field: &str, value: &str) -> String {
        format!("{}:{}:{}:{}", UNIQUE_PREFIX, collection, field, value)
    }

    fn transaction(&self) -> Txn<'_> {
        let mut write_opts = WriteOptions::default();
        write_opts.set_sync(self.sync_writes);
        self.db
            .transaction_opt(&write_opts, &OptimisticTransactionOptions::new())
    }

    /// Commits a transaction, reporting write-write conflicts as `Conflict`.
    fn commit(txn: Txn<'_>, context: &str) -> Result<(), StorageError> {
        txn.commit().map_err(|e| match e.kind() {
            ErrorKind::Busy | ErrorKind::TryAgain => StorageError::Conflict(context.to_string()),
            _ => StorageError::RocksDb(e.to_string()),
        })
    }

    fn rocks_err(e: rocksdb::Error) -> StorageError {
        StorageError::RocksDb(e.to_string())
    }

    /// Parses a u64 from big-endian bytes.
    #[inline]
    fn parse_u64_be(bytes: &[u8]) -> Result<u64, StorageError> {
        bytes
            .try_into()
            .map(u64::from_be_bytes)
            .map_err(|_| StorageError::Serialization("Invalid u64 bytes".into()))
    }

    fn serialize_record(record: &DocumentRecord) -> Result<Vec<u8>, StorageError> {
        bincode::serialize(record).map_err(|e| StorageError::Serialization(e.to_string()))
    }

    fn deserialize_record(bytes: &[u8]) -> Result<DocumentRecord, StorageError> {
        bincode::deserialize(bytes).map_err(|e| StorageError::Serialization(e.to_string()))
    }

    /// Scans all keys starting with `prefix`.
    fn scan_prefix(&self, prefix: &str) -> Result<Vec<(Box<[u8]>, Box<[u8]>)>, StorageError> {
        let mut entries = Vec::new();
        let iter = self
            .db
            .iterator(IteratorMode::From(prefix.as_bytes(), Direction::Forward));
        for item in iter {
            let (key, value) = item.map_err(Self::rocks_err)?;
            if !key.starts_with(prefix.as_bytes()) {
                break;
            }
            entries.push((key, value));
        }
        Ok(entries)
    }

    /// Fails if any unique value of `record` belongs to a different document.
    /// Reads go through `get_for_update` so a concurrent claim aborts the commit.
    fn check_unique(
        txn: &Txn<'_>,
        collection: &str,
        record: &DocumentRecord,
    ) -> Result<(), StorageError> {
        for (field, value) in &record.unique {
            let key = Self::unique_key(collection, field, value);
            if let Some(owner) = txn.get_for_update(key.as_bytes(), true).map_err(Self::rocks_err)? {
                if owner.as_slice() != record.id.as_bytes() {
                    return Err(StorageError::UniqueViolation {
                        collection: collection.to_string(),
                        field: field.clone(),
                        value: value.clone(),
                    });
                }
            }
        }
        Ok(())
    }
}

impl CounterStore for RocksDbStore {
    fn load(&self, name: &str) -> Result<Option<u64>, StorageError> {
        match self.db.get(Self::counter_key(name).as_bytes()) {
            Ok(Some(bytes)) => Ok(Some(Self::parse_u64_be(&bytes)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(Self::rocks_err(e)),
        }
    }

    fn list_counters(&self) -> Result<Vec<Counter>, StorageError> {
        let prefix = format!("{}:", COUNTER_PREFIX);
        self.scan_prefix(&prefix)?
            .into_iter()
            .map(|(key, value)| {
                let name = String::from_utf8_lossy(&key[prefix.len()..]).into_owned();
                Ok(Counter {
                    name,
                    value: Self::parse_u64_be(&value)?,
                })
            })
            .collect()
    }
}

impl ConditionalCounterStore for RocksDbStore {
    fn compare_and_swap(
        &self,
        name: &str,
        expected: Option<u64>,
        new: u64,
    ) -> Result<CasOutcome, StorageError> {
        let key = Self::counter_key(name);
        let txn = self.transaction();

        let current = txn
            .get_for_update(key.as_bytes(), true)
            .map_err(Self::rocks_err)?
            .map(|bytes| Self::parse_u64_be(&bytes))
            .transpose()?;
        if current != expected {
            // Dropping the transaction rolls it back
            return Ok(CasOutcome::Conflict { current });
        }

        txn.put(key.as_bytes(), new.to_be_bytes())
            .map_err(Self::rocks_err)?;

        match Self::commit(txn, name) {
            Ok(()) => Ok(CasOutcome::Committed),
            Err(StorageError::Conflict(_)) => Ok(CasOutcome::Conflict {
                current: self.load(name)?,
            }),
            Err(e) => Err(e),
        }
    }
}

impl DocumentStore for RocksDbStore {
    fn insert(&self, collection: &str, record: &DocumentRecord) -> Result<(), StorageError> {
        let txn = self.transaction();
        let doc_key = Self::doc_key(collection, &record.id);

        if txn
            .get_for_update(doc_key.as_bytes(), true)
            .map_err(Self::rocks_err)?
            .is_some()
        {
            return Err(StorageError::InvalidInput(format!(
                "document {} already exists in {}",
                record.id, collection
            )));
        }
        Self::check_unique(&txn, collection, record)?;

        txn.put(doc_key.as_bytes(), Self::serialize_record(record)?)
            .map_err(Self::rocks_err)?;
        for (field, value) in &record.unique {
            let key = Self::unique_key(collection, field, value);
            txn.put(key.as_bytes(), record.id.as_bytes())
                .map_err(Self::rocks_err)?;
        }

        Self::commit(txn, &doc_key)
    }

    fn replace(&self, collection: &str, record: &DocumentRecord) -> Result<bool, StorageError> {
        let txn = self.transaction();
        let doc_key = Self::doc_key(collection, &record.id);

        let Some(previous) = txn
            .get_for_update(doc_key.as_bytes(), true)
            .map_err(Self::rocks_err)?
        else {
            return Ok(false);
        };
        let previous = Self::deserialize_record(&previous)?;
        Self::check_unique(&txn, collection, record)?;

        for (field, value) in &previous.unique {
            let key = Self::unique_key(collection, field, value);
            txn.delete(key.as_bytes()).map_err(Self::rocks_err)?;
        }
        for (field, value) in &record.unique {
            let key = Self::unique_key(collection, field, value);
            txn.put(key.as_bytes(), record.id.as_bytes())
                .map_err(Self::rocks_err)?;
        }
        txn.put(doc_key.as_bytes(), Self::serialize_record(record)?)
            .map_err(Self::rocks_err)?;

        Self::commit(txn, &doc_key)?;
        Ok(true)
    }

    fn get(&self, collection: &str, id: &str) -> Result<Option<DocumentRecord>, StorageError> {
        match self.db.get(Self::doc_key(collection, id).as_bytes()) {
            Ok(Some(bytes)) => Ok(Some(Self::deserialize_record(&bytes)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(Self::rocks_err(e)),
        }
    }

    fn find_unique(
        &self,
        collection: &str,
        field: &str,
        value: &str,
    ) -> Result<Option<DocumentRecord>, StorageError> {
        let key = Self::unique_key(collection, field, value);
        let owner = self.db.get(key.as_bytes()).map_err(Self::rocks_err)?;
        match owner {
            Some(id) => self.get(collection, &String::from_utf8_lossy(&id)),
            None => Ok(None),
        }
    }

    fn list(&self, collection: &str) -> Result<Vec<DocumentRecord>, StorageError> {
        let prefix = format!("{}:{}:", DOC_PREFIX, collection);
        self.scan_prefix(&prefix)?
            .into_iter()
            .map(|(_, value)| Self::deserialize_record(&value))
            .collect()
    }

    fn remove(&self, collection: &str, id: &str) -> Result<Option<DocumentRecord>, StorageError> {
        let txn = self.transaction();
        let doc_key = Self::doc_key(collection, id);

        let Some(bytes) = txn
            .get_for_update(doc_key.as_bytes(), true)
            .map_err(Self::rocks_err)?
        else {
            return Ok(None);
        };
        let record = Self::deserialize_record(&bytes)?;

        for (field, value) in &record.unique {
            let key = Self::unique_key(collection, field, value);
            txn.delete(key.as_bytes()).map_err(Self::rocks_err)?;
        }
        txn.delete(doc_key.as_bytes()).map_err(Self::rocks_err)?;

        Self::commit(txn, &doc_key)?;
        Ok(Some(record))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_store() -> (RocksDbStore, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = RocksDbStore::open(dir.path()).unwrap();
        (store, dir)
    }

    fn record(id: &str, unique: &[(&str, &str)]) -> DocumentRecord {
        DocumentRecord {
            id: id.to_string(),
            unique: unique
                .iter()
                .map(|(f, v)| (f.to_string(), v.to_string()))
                .collect(),
            body: format!("body-{}", id).into_bytes(),
        }
    }

    #[test]
    fn missing_counter_loads_as_none() {
        let (store, _dir) = create_test_store();
        assert_eq!(store.load("PaymentID").unwrap(), None);
    }

    #[test]
    fn compare_and_swap_creates_then_advances() {
        let (store, _dir) = create_test_store();

        assert_eq!(
            store.compare_and_swap("PaymentID", None, 1).unwrap(),
            CasOutcome::Committed
        );
        assert_eq!(store.load("PaymentID").unwrap(), Some(1));

        assert_eq!(
            store.compare_and_swap("PaymentID", Some(1), 2).unwrap(),
            CasOutcome::Committed
        );
        assert_eq!(store.load("PaymentID").unwrap(), Some(2));
    }

    #[test]
    fn stale_expectation_conflicts() {
        let (store, _dir) = create_test_store();
        store.compare_and_swap("PaymentID", None, 1).unwrap();

        assert_eq!(
            store.compare_and_swap("PaymentID", None, 1).unwrap(),
            CasOutcome::Conflict { current: Some(1) }
        );
        assert_eq!(
            store.compare_and_swap("PaymentID", Some(0), 1).unwrap(),
            CasOutcome::Conflict { current: Some(1) }
        );
        assert_eq!(store.load("PaymentID").unwrap(), Some(1));
    }

    #[test]
    fn list_counters_returns_only_counters() {
        let (store, _dir) = create_test_store();
        store.compare_and_swap("b", None, 3).unwrap();
        store.compare_and_swap("a", None, 7).unwrap();
        store.insert("payments", &record("x", &[])).unwrap();

        let counters = store.list_counters().unwrap();
        assert_eq!(
            counters,
            vec![
                Counter {
                    name: "a".into(),
                    value: 7
                },
                Counter {
                    name: "b".into(),
                    value: 3
                },
            ]
        );
    }

    #[test]
    fn insert_and_get_document() {
        let (store, _dir) = create_test_store();
        let doc = record("a", &[("payment_id", "PID1")]);
        store.insert("payments", &doc).unwrap();

        assert_eq!(store.get("payments", "a").unwrap(), Some(doc.clone()));
        assert_eq!(
            store
                .find_unique("payments", "payment_id", "PID1")
                .unwrap(),
            Some(doc)
        );
    }

    #[test]
    fn duplicate_unique_value_is_rejected_atomically() {
        let (store, _dir) = create_test_store();
        store
            .insert("payments", &record("a", &[("cus_id", "C1")]))
            .unwrap();

        let err = store
            .insert(
                "payments",
                &record("b", &[("payment_id", "PID2"), ("cus_id", "C1")]),
            )
            .unwrap_err();
        assert!(matches!(err, StorageError::UniqueViolation { .. }));

        assert!(store.get("payments", "b").unwrap().is_none());
        assert!(store
            .find_unique("payments", "payment_id", "PID2")
            .unwrap()
            .is_none());
    }

    #[test]
    fn duplicate_document_id_is_invalid_input() {
        let (store, _dir) = create_test_store();
        store.insert("payments", &record("a", &[])).unwrap();
        assert!(matches!(
            store.insert("payments", &record("a", &[])),
            Err(StorageError::InvalidInput(_))
        ));
    }

    #[test]
    fn replace_moves_index_entries() {
        let (store, _dir) = create_test_store();
        store
            .insert("payments", &record("a", &[("cus_id", "C1")]))
            .unwrap();

        assert!(store
            .replace("payments", &record("a", &[("cus_id", "C2")]))
            .unwrap());
        assert!(store
            .find_unique("payments", "cus_id", "C1")
            .unwrap()
            .is_none());
        assert!(store
            .find_unique("payments", "cus_id", "C2")
            .unwrap()
            .is_some());
        assert!(!store.replace("payments", &record("zzz", &[])).unwrap());
    }

    #[test]
    fn list_is_scoped_to_collection() {
        let (store, _dir) = create_test_store();
        store.insert("payments", &record("a", &[])).unwrap();
        store.insert("payments", &record("b", &[])).unwrap();
        store.insert("refunds", &record("c", &[])).unwrap();

        let ids: Vec<String> = store
            .list("payments")
            .unwrap()
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn remove_deletes_document_and_index() {
        let (store, _dir) = create_test_store();
        store
            .insert("payments", &record("a", &[("cus_id", "C1")]))
            .unwrap();

        let removed = store.remove("payments", "a").unwrap();
        assert_eq!(removed.map(|r| r.id), Some("a".to_string()));
        assert!(store.get("payments", "a").unwrap().is_none());
        assert!(store
            .find_unique("payments", "cus_id", "C1")
            .unwrap()
            .is_none());
        assert!(store.remove("payments", "a").unwrap().is_none());
    }

    #[test]
    fn counters_survive_reopen() {
        let dir = TempDir::new().unwrap();
        {
            let store = RocksDbStore::open(dir.path()).unwrap();
            store.compare_and_swap("PaymentID", None, 41).unwrap();
        }
        let store = RocksDbStore::open(dir.path()).unwrap();
        assert_eq!(store.load("PaymentID").unwrap(), Some(41));
    }

    #[test]
    fn second_open_of_locked_directory_fails() {
        let (_store, dir) = create_test_store();
        assert!(matches!(
            RocksDbStore::open(dir.path()),
            Err(StorageError::RocksDb(_))
        ));
    }
}
