use std::sync::Arc;

use crate::config::LedgerConfig;
use crate::contracts::LedgerError;
use crate::entity::Repository;
use crate::sequence::OptimisticAllocator;
use crate::storage::RocksDbStore;

pub type LedgerAllocator = OptimisticAllocator<RocksDbStore>;
pub type LedgerRepository = Repository<RocksDbStore, LedgerAllocator>;

/// A RocksDB store wired to its allocator and entity repository.
pub struct Ledger {
    store: Arc<RocksDbStore>,
    allocator: Arc<LedgerAllocator>,
    repository: LedgerRepository,
}

impl Ledger {
    pub fn open(config: &LedgerConfig) -> Result<Self, LedgerError> {
        let store =
            Arc::new(RocksDbStore::open(&config.data_dir)?.with_sync_writes(config.sync_writes));
        let allocator = Arc::new(
            OptimisticAllocator::new(Arc::clone(&store))
                .with_seed(config.seed)
                .with_retry(config.retry.clone()),
        );
        let repository = Repository::new(Arc::clone(&store), Arc::clone(&allocator));

        tracing::info!(
            data_dir = %config.data_dir.display(),
            seed = config.seed,
            sync_writes = config.sync_writes,
            max_attempts = config.retry.max_attempts,
            "Ledger opened"
        );

        Ok(Self {
            store,
            allocator,
            repository,
        })
    }

    pub fn store(&self) -> &Arc<RocksDbStore> {
        &self.store
    }

    pub fn allocator(&self) -> &Arc<LedgerAllocator> {
        &self.allocator
    }

    pub fn repository(&self) -> &LedgerRepository {
        &self.repository
    }
}
