use std::path::PathBuf;

use crate::sequence::RetryConfig;

/// Runtime configuration for an embedded ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerConfig {
    /// RocksDB directory.
    pub data_dir: PathBuf,
    /// Value a new counter starts from; its first issued value is `seed + 1`.
    pub seed: u64,
    /// Sync the WAL on every commit.
    pub sync_writes: bool,
    pub retry: RetryConfig,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            seed: 0,
            sync_writes: true,
            retry: RetryConfig::default(),
        }
    }
}

impl LedgerConfig {
    /// Creates a config from environment variables.
    ///
    /// Reads:
    /// - `SALON_DATA_DIR`: RocksDB directory (default: ./data)
    /// - `SALON_COUNTER_SEED`: Starting value for new counters (default: 0)
    /// - `SALON_SYNC_WRITES`: "false" or "0" disables WAL sync (default: true)
    /// - the `SALON_SEQ_*` retry variables, see `RetryConfig::from_env`
    pub fn from_env() -> Self {
        let default = Self::default();

        let data_dir = std::env::var("SALON_DATA_DIR")
            .ok()
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
            .unwrap_or(default.data_dir);

        let seed = std::env::var("SALON_COUNTER_SEED")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(default.seed);

        let sync_writes = std::env::var("SALON_SYNC_WRITES")
            .map(|v| !(v == "0" || v.eq_ignore_ascii_case("false")))
            .unwrap_or(default.sync_writes);

        Self {
            data_dir,
            seed,
            sync_writes,
            retry: RetryConfig::from_env(),
        }
    }
}
