use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::contracts::{
    AtomicCounterStore, CasOutcome, ConditionalCounterStore, Counter, CounterStore,
    DocumentRecord, DocumentStore, IncrementOutcome, LockResultExt, StorageError,
};

/// Documents and unique index of one collection.
#[derive(Default)]
struct Collection {
    docs: BTreeMap<String, DocumentRecord>,
    /// (field, value) -> document id
    unique: HashMap<(String, String), String>,
}

impl Collection {
    /// Returns the first unique pair of `record` owned by another document.
    fn taken_by_other<'r>(&self, record: &'r DocumentRecord) -> Option<&'r (String, String)> {
        record.unique.iter().find(|pair| {
            self.unique
                .get(*pair)
                .is_some_and(|owner| owner != &record.id)
        })
    }
}

/// In-process store implementing every storage contract.
///
/// Counters live in a sharded concurrent map; the shard lock held by the
/// entry API makes `increment` a single atomic read-modify-write.
#[derive(Default)]
pub struct MemoryStore {
    counters: DashMap<String, u64>,
    collections: RwLock<HashMap<String, Collection>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrites a counter unconditionally, as an operator reset would.
    pub fn set_counter(&self, name: &str, value: u64) {
        self.counters.insert(name.to_string(), value);
    }

    fn violation(collection: &str, pair: &(String, String)) -> StorageError {
        StorageError::UniqueViolation {
            collection: collection.to_string(),
            field: pair.0.clone(),
            value: pair.1.clone(),
        }
    }
}

impl CounterStore for MemoryStore {
    fn load(&self, name: &str) -> Result<Option<u64>, StorageError> {
        Ok(self.counters.get(name).map(|v| *v))
    }

    fn list_counters(&self) -> Result<Vec<Counter>, StorageError> {
        let mut counters: Vec<Counter> = self
            .counters
            .iter()
            .map(|e| Counter {
                name: e.key().clone(),
                value: *e.value(),
            })
            .collect();
        counters.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(counters)
    }
}

impl AtomicCounterStore for MemoryStore {
    fn increment(&self, name: &str, seed: u64) -> Result<IncrementOutcome, StorageError> {
        match self.counters.entry(name.to_string()) {
            Entry::Occupied(mut entry) => {
                let next = entry
                    .get()
                    .checked_add(1)
                    .ok_or_else(|| StorageError::Overflow(name.to_string()))?;
                *entry.get_mut() = next;
                Ok(IncrementOutcome::Incremented(next))
            }
            Entry::Vacant(entry) => {
                let first = seed
                    .checked_add(1)
                    .ok_or_else(|| StorageError::Overflow(name.to_string()))?;
                entry.insert(first);
                Ok(IncrementOutcome::Created(first))
            }
        }
    }
}

impl ConditionalCounterStore for MemoryStore {
    fn compare_and_swap(
        &self,
        name: &str,
        expected: Option<u64>,
        new: u64,
    ) -> Result<CasOutcome, StorageError> {
        let outcome = match (self.counters.entry(name.to_string()), expected) {
            (Entry::Occupied(mut entry), Some(expected)) if *entry.get() == expected => {
                *entry.get_mut() = new;
                CasOutcome::Committed
            }
            (Entry::Occupied(entry), _) => CasOutcome::Conflict {
                current: Some(*entry.get()),
            },
            (Entry::Vacant(entry), None) => {
                entry.insert(new);
                CasOutcome::Committed
            }
            (Entry::Vacant(_), Some(_)) => CasOutcome::Conflict { current: None },
        };
        Ok(outcome)
    }
}

impl DocumentStore for MemoryStore {
    fn insert(&self, collection: &str, record: &DocumentRecord) -> Result<(), StorageError> {
        let mut collections = self.collections.write().map_lock_err()?;
        let coll = collections.entry(collection.to_string()).or_default();

        if coll.docs.contains_key(&record.id) {
            return Err(StorageError::InvalidInput(format!(
                "document {} already exists in {}",
                record.id, collection
            )));
        }
        if let Some(pair) = coll.taken_by_other(record) {
            return Err(Self::violation(collection, pair));
        }

        for pair in &record.unique {
            coll.unique.insert(pair.clone(), record.id.clone());
        }
        coll.docs.insert(record.id.clone(), record.clone());
        Ok(())
    }

    fn replace(&self, collection: &str, record: &DocumentRecord) -> Result<bool, StorageError> {
        let mut collections = self.collections.write().map_lock_err()?;
        let Some(coll) = collections.get_mut(collection) else {
            return Ok(false);
        };
        let Some(previous) = coll.docs.get(&record.id) else {
            return Ok(false);
        };
        if let Some(pair) = coll.taken_by_other(record) {
            return Err(Self::violation(collection, pair));
        }

        let stale = previous.unique.clone();
        for pair in &stale {
            coll.unique.remove(pair);
        }
        for pair in &record.unique {
            coll.unique.insert(pair.clone(), record.id.clone());
        }
        coll.docs.insert(record.id.clone(), record.clone());
        Ok(true)
    }

    fn get(&self, collection: &str, id: &str) -> Result<Option<DocumentRecord>, StorageError> {
        let collections = self.collections.read().map_lock_err()?;
        Ok(collections
            .get(collection)
            .and_then(|c| c.docs.get(id))
            .cloned())
    }

    fn find_unique(
        &self,
        collection: &str,
        field: &str,
        value: &str,
    ) -> Result<Option<DocumentRecord>, StorageError> {
        let collections = self.collections.read().map_lock_err()?;
        let Some(coll) = collections.get(collection) else {
            return Ok(None);
        };
        Ok(coll
            .unique
            .get(&(field.to_string(), value.to_string()))
            .and_then(|id| coll.docs.get(id))
            .cloned())
    }

    fn list(&self, collection: &str) -> Result<Vec<DocumentRecord>, StorageError> {
        let collections = self.collections.read().map_lock_err()?;
        Ok(collections
            .get(collection)
            .map(|c| c.docs.values().cloned().collect())
            .unwrap_or_default())
    }

    fn remove(&self, collection: &str, id: &str) -> Result<Option<DocumentRecord>, StorageError> {
        let mut collections = self.collections.write().map_lock_err()?;
        let Some(coll) = collections.get_mut(collection) else {
            return Ok(None);
        };
        let removed = coll.docs.remove(id);
        if let Some(ref record) = removed {
            for pair in &record.unique {
                coll.unique.remove(pair);
            }
        }
        Ok(removed)
    }
}
