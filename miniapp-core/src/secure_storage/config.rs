//! Storage configuration passed in by the host.

use std::path::PathBuf;

/// Default per-mini-app size budget in kilobytes.
pub const DEFAULT_MAX_SIZE_KB: u32 = 5120;

/// Default schema version.
pub const DEFAULT_DATABASE_VERSION: u32 = 1;

/// What to do when an operation finds the handle in use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, uniffi::Enum)]
pub enum BusyPolicy {
    /// Wait for the running operation to finish.
    #[default]
    Queue,
    /// Fail immediately with [`SecureStorageError::Busy`](super::SecureStorageError::Busy).
    Reject,
}

/// What to do with an operation issued before `load` bound a database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, uniffi::Enum)]
pub enum NotReadyPolicy {
    /// Fail with [`SecureStorageError::NotInitialized`](super::SecureStorageError::NotInitialized).
    #[default]
    Fail,
    /// Drop the operation without invoking any callback.
    Drop,
}

/// How the success of a bulk insert or delete is decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, uniffi::Enum)]
pub enum BatchResultPolicy {
    /// Success iff every chunk committed.
    #[default]
    AllChunks,
    /// Success iff the final statement of the batch touched a row.
    LastRow,
}

/// Configuration shared by every mini-app database created by a host.
#[derive(Debug, Clone, PartialEq, Eq, uniffi::Record)]
pub struct SecureStorageConfig {
    /// Directory holding the `rakuten-<id>` database files.
    pub database_dir: String,
    /// Size budget of each database, in kilobytes.
    pub max_size_kb: u32,
    /// Schema version. A change drops and recreates every table on open.
    pub database_version: u32,
    /// Handling of concurrent operations on one database.
    pub busy_policy: BusyPolicy,
    /// Handling of operations issued before `load`.
    pub not_ready_policy: NotReadyPolicy,
    /// Success rule for bulk inserts and deletes.
    pub batch_result_policy: BatchResultPolicy,
}

impl SecureStorageConfig {
    /// Creates a configuration with default limits and policies.
    #[must_use]
    pub fn new(database_dir: impl Into<String>) -> Self {
        Self {
            database_dir: database_dir.into(),
            max_size_kb: DEFAULT_MAX_SIZE_KB,
            database_version: DEFAULT_DATABASE_VERSION,
            busy_policy: BusyPolicy::default(),
            not_ready_policy: NotReadyPolicy::default(),
            batch_result_policy: BatchResultPolicy::default(),
        }
    }

    /// Size budget of each database in bytes.
    #[must_use]
    pub fn max_size_bytes(&self) -> u64 {
        u64::from(self.max_size_kb) * 1024
    }

    /// Directory holding the database files.
    #[must_use]
    pub fn database_dir(&self) -> PathBuf {
        PathBuf::from(&self.database_dir)
    }
}

/// Returns a configuration for `database_dir` with default limits and policies.
#[uniffi::export]
#[must_use]
pub fn default_secure_storage_config(database_dir: String) -> SecureStorageConfig {
    SecureStorageConfig::new(database_dir)
}
