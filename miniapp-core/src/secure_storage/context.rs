//! State shared by every manager created from one host.

use std::io;
use std::sync::Arc;

use miniapp_db::{KeySource, SecureDatabase};
use tokio::runtime::Handle;

use super::config::SecureStorageConfig;
use super::paths::{database_name, StorageDirectory};
use super::registry::{lock, HandleRegistry, SharedDatabase};

/// Configuration, key source, handle registry and worker runtime.
pub(crate) struct StorageContext {
    config: SecureStorageConfig,
    directory: StorageDirectory,
    keys: Arc<dyn KeySource>,
    registry: HandleRegistry,
    runtime: Handle,
}

impl StorageContext {
    pub(crate) fn new(
        config: SecureStorageConfig,
        keys: Arc<dyn KeySource>,
        runtime: Handle,
    ) -> Self {
        let directory = StorageDirectory::new(config.database_dir());
        Self {
            config,
            directory,
            keys,
            registry: HandleRegistry::new(),
            runtime,
        }
    }

    pub(crate) const fn config(&self) -> &SecureStorageConfig {
        &self.config
    }

    pub(crate) const fn registry(&self) -> &HandleRegistry {
        &self.registry
    }

    pub(crate) const fn runtime(&self) -> &Handle {
        &self.runtime
    }

    /// Builds an unopened handle for `mini_app_id`.
    pub(crate) fn new_database(&self, mini_app_id: &str) -> SecureDatabase {
        SecureDatabase::new(
            self.directory.root(),
            database_name(mini_app_id),
            self.config.database_version,
            self.config.max_size_bytes(),
            Arc::clone(&self.keys),
        )
    }

    /// Closes the handle of `mini_app_id`, deletes its files and drops it
    /// from the registry. Failures are logged, never returned.
    ///
    /// Blocks until an operation running on the handle has finished, so no
    /// connection is left writing to the deleted files.
    pub(crate) fn clear_mini_app(&self, mini_app_id: &str) {
        let result = match self.registry.get(mini_app_id) {
            Some(handle) => self.clear_handle(mini_app_id, &handle),
            None => self.directory.clear_mini_app(mini_app_id),
        };
        match result {
            Ok(removed) => {
                log::debug!("cleared secure storage for {mini_app_id} (removed: {removed})");
            }
            Err(err) => log::warn!("failed to clear secure storage for {mini_app_id}: {err}"),
        }
    }

    /// Clears every registered handle, then every remaining prefixed file.
    pub(crate) fn clear_all(&self) {
        for (mini_app_id, handle) in self.registry.entries() {
            if let Err(err) = self.clear_handle(&mini_app_id, &handle) {
                log::warn!("failed to clear secure storage for {mini_app_id}: {err}");
            }
        }
        match self.directory.clear_all() {
            Ok(removed) => log::debug!("cleared {removed} secure storage databases"),
            Err(err) => log::warn!("failed to clear secure storage databases: {err}"),
        }
    }

    /// Deletes the files of `handle` while holding its guard.
    fn clear_handle(&self, mini_app_id: &str, handle: &SharedDatabase) -> io::Result<bool> {
        let mut db = lock(handle);
        db.close_database();
        let removed = self.directory.clear_mini_app(mini_app_id);
        self.registry.discard(mini_app_id, handle);
        drop(db);
        removed
    }
}
