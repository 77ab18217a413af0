use std::sync::Arc;

use serde::Serialize;
use uuid::Uuid;

use crate::contracts::{
    DocumentRecord, DocumentStore, EntityError, SequenceAllocator, StorageError,
};
use crate::entity::{CreationHook, Identified};

/// An entity together with its document id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Stored<E> {
    pub id: String,
    #[serde(flatten)]
    pub entity: E,
}

/// Persists identified entities, running the creation hook on insert.
///
/// # Invariants
/// - A created entity is written with a well-formed identifier or not at all
/// - Updates keep the stored identifier
pub struct Repository<D, A> {
    store: Arc<D>,
    hook: CreationHook<A>,
}

impl<D: DocumentStore, A: SequenceAllocator> Repository<D, A> {
    pub fn new(store: Arc<D>, allocator: Arc<A>) -> Self {
        Self {
            store,
            hook: CreationHook::new(allocator),
        }
    }

    pub fn hook(&self) -> &CreationHook<A> {
        &self.hook
    }

    /// Creates a new entity under a fresh document id.
    ///
    /// The identifier is allocated before the insert, so a failed insert
    /// leaves a gap in the sequence.
    pub async fn create<E: Identified>(&self, mut entity: E) -> Result<Stored<E>, EntityError> {
        entity.validate_new()?;
        self.hook.before_insert(&mut entity, true).await?;

        let id = Uuid::new_v4().to_string();
        let record = Self::encode(&id, &entity)?;
        self.store
            .insert(E::COLLECTION, &record)
            .map_err(Self::unique_error::<E>)?;

        tracing::info!(
            collection = E::COLLECTION,
            id = %id,
            sequential_id = entity.sequential_id().unwrap_or_default(),
            "Created entity"
        );
        Ok(Stored { id, entity })
    }

    /// Replaces the contents of an existing entity, keeping its identifier.
    pub async fn update<E: Identified>(
        &self,
        id: &str,
        mut changes: E,
    ) -> Result<Stored<E>, EntityError> {
        changes.validate_update()?;
        let existing: Stored<E> = self.get(id)?;

        match existing.entity.sequential_id() {
            Some(sequential_id) => changes.set_sequential_id(sequential_id.to_string()),
            None => {
                return Err(EntityError::Validation(format!(
                    "stored {} {} has no identifier",
                    E::COLLECTION,
                    id
                )))
            }
        }
        self.hook.before_insert(&mut changes, false).await?;

        let record = Self::encode(id, &changes)?;
        let replaced = self
            .store
            .replace(E::COLLECTION, &record)
            .map_err(Self::unique_error::<E>)?;
        if !replaced {
            return Err(Self::not_found::<E>(id));
        }

        tracing::info!(collection = E::COLLECTION, id = %id, "Updated entity");
        Ok(Stored {
            id: id.to_string(),
            entity: changes,
        })
    }

    pub fn get<E: Identified>(&self, id: &str) -> Result<Stored<E>, EntityError> {
        match self.store.get(E::COLLECTION, id)? {
            Some(record) => Self::decode(record),
            None => Err(Self::not_found::<E>(id)),
        }
    }

    /// Finds an entity by document id, then by each lookup field, then by
    /// its sequential identifier.
    pub fn lookup<E: Identified>(&self, identifier: &str) -> Result<Stored<E>, EntityError> {
        if let Some(record) = self.store.get(E::COLLECTION, identifier)? {
            return Self::decode(record);
        }
        for field in E::LOOKUP_FIELDS.iter().chain(std::iter::once(&E::ID_FIELD)) {
            if let Some(record) = self.store.find_unique(E::COLLECTION, field, identifier)? {
                return Self::decode(record);
            }
        }
        Err(Self::not_found::<E>(identifier))
    }

    pub fn list<E: Identified>(&self) -> Result<Vec<Stored<E>>, EntityError> {
        self.store
            .list(E::COLLECTION)?
            .into_iter()
            .map(Self::decode)
            .collect()
    }

    pub fn delete<E: Identified>(&self, id: &str) -> Result<Stored<E>, EntityError> {
        match self.store.remove(E::COLLECTION, id)? {
            Some(record) => {
                tracing::info!(collection = E::COLLECTION, id = %id, "Deleted entity");
                Self::decode(record)
            }
            None => Err(Self::not_found::<E>(id)),
        }
    }

    /// Builds the stored record, refusing entities without a well-formed identifier.
    fn encode<E: Identified>(id: &str, entity: &E) -> Result<DocumentRecord, EntityError> {
        let sequential_id = entity
            .sequential_id()
            .filter(|sid| E::id_format().parse(sid).is_some())
            .ok_or_else(|| {
                EntityError::Validation(format!(
                    "{} {} has no well-formed {}",
                    E::COLLECTION,
                    id,
                    E::ID_FIELD
                ))
            })?;

        let mut unique = vec![(E::ID_FIELD.to_string(), sequential_id.to_string())];
        unique.extend(
            entity
                .unique_fields()
                .into_iter()
                .map(|(field, value)| (field.to_string(), value)),
        );

        let body = bincode::serialize(entity)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;

        Ok(DocumentRecord {
            id: id.to_string(),
            unique,
            body,
        })
    }

    fn decode<E: Identified>(record: DocumentRecord) -> Result<Stored<E>, EntityError> {
        let entity = bincode::deserialize(&record.body)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        Ok(Stored {
            id: record.id,
            entity,
        })
    }

    /// Maps a unique index collision to the matching entity error.
    fn unique_error<E: Identified>(e: StorageError) -> EntityError {
        match e {
            StorageError::UniqueViolation {
                collection,
                field,
                value,
            } if field == E::ID_FIELD => {
                tracing::error!(
                    collection = %collection,
                    id = %value,
                    "Sequential identifier already in use; counter was reset or corrupted"
                );
                EntityError::DuplicateIdentifier {
                    collection,
                    id: value,
                }
            }
            StorageError::UniqueViolation { field, value, .. } => {
                EntityError::DuplicateField { field, value }
            }
            other => EntityError::Storage(other),
        }
    }

    fn not_found<E: Identified>(id: &str) -> EntityError {
        EntityError::NotFound {
            collection: E::COLLECTION.to_string(),
            id: id.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contracts::CounterStore;
    use crate::entity::Payment;
    use crate::sequence::AtomicAllocator;
    use crate::storage::MemoryStore;

    type TestRepository = Repository<MemoryStore, AtomicAllocator<MemoryStore>>;

    fn repository() -> (TestRepository, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let allocator = Arc::new(AtomicAllocator::new(Arc::clone(&store)));
        (Repository::new(Arc::clone(&store), allocator), store)
    }

    fn payment(cus_id: &str) -> Payment {
        Payment {
            payment_id: None,
            cus_id: Some(cus_id.into()),
            user_name: "Nimali".into(),
            payment_date: "2024-05-01".into(),
            package_amount: "4500".into(),
            total_amount: "5000".into(),
            method: "card".into(),
            email: "nimali@example.com".into(),
        }
    }

    #[tokio::test]
    async fn create_assigns_sequential_ids() {
        let (repo, _store) = repository();
        let first = repo.create(payment("C1")).await.unwrap();
        let second = repo.create(payment("C2")).await.unwrap();

        assert_eq!(first.entity.payment_id.as_deref(), Some("PID1"));
        assert_eq!(second.entity.payment_id.as_deref(), Some("PID2"));
        assert_ne!(first.id, second.id);
        assert_eq!(repo.get::<Payment>(&first.id).unwrap(), first);
    }

    #[tokio::test]
    async fn invalid_payment_does_not_consume_a_value() {
        let (repo, store) = repository();
        let err = repo
            .create(Payment {
                email: String::new(),
                ..payment("C1")
            })
            .await
            .unwrap_err();
        assert!(matches!(err, EntityError::Validation(_)));
        assert_eq!(store.load("PaymentID").unwrap(), None);
    }

    #[tokio::test]
    async fn duplicate_customer_leaves_a_gap() {
        let (repo, store) = repository();
        repo.create(payment("C1")).await.unwrap();

        let err = repo.create(payment("C1")).await.unwrap_err();
        assert!(matches!(
            err,
            EntityError::DuplicateField { ref field, ref value } if field == "cus_id" && value == "C1"
        ));
        assert_eq!(store.load("PaymentID").unwrap(), Some(2));

        let third = repo.create(payment("C2")).await.unwrap();
        assert_eq!(third.entity.payment_id.as_deref(), Some("PID3"));
        assert_eq!(repo.list::<Payment>().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn reset_counter_surfaces_duplicate_identifier() {
        let (repo, store) = repository();
        repo.create(payment("C1")).await.unwrap();
        store.set_counter("PaymentID", 0);

        let err = repo.create(payment("C2")).await.unwrap_err();
        assert!(matches!(
            err,
            EntityError::DuplicateIdentifier { ref id, .. } if id == "PID1"
        ));
        assert!(!err.is_retryable());
        assert_eq!(repo.list::<Payment>().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn update_keeps_original_identifier() {
        let (repo, store) = repository();
        let created = repo.create(payment("C1")).await.unwrap();

        let changes = Payment {
            payment_id: Some("PID999".into()),
            total_amount: "5500".into(),
            ..payment("C1")
        };
        let updated = repo.update(&created.id, changes).await.unwrap();

        assert_eq!(updated.entity.payment_id.as_deref(), Some("PID1"));
        assert_eq!(updated.entity.total_amount, "5500");
        assert_eq!(repo.get::<Payment>(&created.id).unwrap(), updated);
        assert_eq!(store.load("PaymentID").unwrap(), Some(1));
    }

    #[tokio::test]
    async fn update_missing_payment_is_not_found() {
        let (repo, _store) = repository();
        let err = repo.update("missing", payment("C1")).await.unwrap_err();
        assert!(matches!(err, EntityError::NotFound { .. }));
    }

    #[tokio::test]
    async fn update_requires_fields() {
        let (repo, _store) = repository();
        let created = repo.create(payment("C1")).await.unwrap();
        let err = repo
            .update(
                &created.id,
                Payment {
                    cus_id: None,
                    ..payment("C1")
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, EntityError::Validation(_)));
    }

    #[tokio::test]
    async fn lookup_tries_id_customer_then_identifier() {
        let (repo, _store) = repository();
        let created = repo.create(payment("C7")).await.unwrap();

        assert_eq!(repo.lookup::<Payment>(&created.id).unwrap(), created);
        assert_eq!(repo.lookup::<Payment>("C7").unwrap(), created);
        assert_eq!(repo.lookup::<Payment>("PID1").unwrap(), created);
        assert!(matches!(
            repo.lookup::<Payment>("nobody"),
            Err(EntityError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn delete_removes_and_frees_customer() {
        let (repo, _store) = repository();
        let created = repo.create(payment("C1")).await.unwrap();

        let deleted = repo.delete::<Payment>(&created.id).unwrap();
        assert_eq!(deleted, created);
        assert!(matches!(
            repo.delete::<Payment>(&created.id),
            Err(EntityError::NotFound { .. })
        ));

        let again = repo.create(payment("C1")).await.unwrap();
        assert_eq!(again.entity.payment_id.as_deref(), Some("PID2"));
    }

    #[test]
    fn stored_serializes_flat() {
        let stored = Stored {
            id: "doc-1".to_string(),
            entity: Payment {
                payment_id: Some("PID4".into()),
                ..Payment::default()
            },
        };
        let json = serde_json::to_value(&stored).unwrap();
        assert_eq!(json["id"], "doc-1");
        assert_eq!(json["payment_id"], "PID4");
    }
}
