//! Asynchronous storage manager for one mini-app session.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, TryLockError};

use miniapp_db::{BatchReport, SecureDatabase};

use super::config::{BatchResultPolicy, BusyPolicy, NotReadyPolicy};
use super::context::StorageContext;
use super::error::{SecureStorageError, SecureStorageResult};
use super::registry::{lock, SharedDatabase};

/// Runs storage operations for the mini-app bound by [`load`](Self::load).
///
/// Every operation is scheduled on a blocking worker and reports through its
/// callbacks; nothing blocks the caller. Operations on one database are
/// serialized by the handle mutex (or rejected, see
/// [`BusyPolicy`](super::BusyPolicy)); different mini-apps run in parallel.
pub struct SecureStorage {
    inner: Arc<Inner>,
}

struct Inner {
    context: Arc<StorageContext>,
    mini_app_id: Mutex<Option<String>>,
}

impl std::fmt::Debug for SecureStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecureStorage")
            .field("mini_app_id", &self.mini_app_id())
            .finish_non_exhaustive()
    }
}

impl SecureStorage {
    pub(crate) fn new(context: Arc<StorageContext>) -> Self {
        Self {
            inner: Arc::new(Inner {
                context,
                mini_app_id: Mutex::new(None),
            }),
        }
    }

    /// Mini-app id bound by the last successful [`load`](Self::load).
    #[must_use]
    pub fn mini_app_id(&self) -> Option<String> {
        lock(&self.inner.mini_app_id).clone()
    }

    /// Opens (creating if needed) the database of `mini_app_id` and binds it
    /// to this manager.
    ///
    /// Idempotent: an open handle is reused as is. A handle left closed or
    /// unavailable is reopened, and a failed or corrupted one is replaced.
    pub fn load<S, F>(&self, mini_app_id: &str, on_success: S, on_failed: F)
    where
        S: FnOnce() + Send + 'static,
        F: FnOnce(SecureStorageError) + Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        let mini_app_id = mini_app_id.to_string();
        self.spawn(move || match inner.open(&mini_app_id) {
            Ok(()) => on_success(),
            Err(err) => {
                log::warn!("failed to load secure storage for {mini_app_id}: {err}");
                on_failed(err);
            }
        });
    }

    /// Writes `items`, overwriting existing keys.
    ///
    /// The database is reopened first when it was closed or its file is gone.
    pub fn insert_items<I, S, F>(&self, items: I, on_success: S, on_failed: F)
    where
        I: IntoIterator<Item = (String, String)> + Send + 'static,
        S: FnOnce() + Send + 'static,
        F: FnOnce(SecureStorageError) + Send + 'static,
    {
        let policy = self.inner.context.config().batch_result_policy;
        self.run(
            "insert",
            move |db| {
                if !db.is_usable() {
                    db.create_and_open()?;
                }
                let report = db.insert(items)?;
                check_batch(policy, report)
            },
            |()| on_success(),
            on_failed,
        );
    }

    /// Reads `key`. A missing key yields the `"null"` sentinel.
    pub fn get_item<S, F>(&self, key: String, on_success: S, on_failed: F)
    where
        S: FnOnce(String) + Send + 'static,
        F: FnOnce(SecureStorageError) + Send + 'static,
    {
        self.run(
            "get_item",
            move |db| {
                db.get_item_or_sentinel(&key)
                    .map_err(SecureStorageError::from)
            },
            on_success,
            on_failed,
        );
    }

    /// Reads every record.
    pub fn get_all_items<S, F>(&self, on_success: S, on_failed: F)
    where
        S: FnOnce(BTreeMap<String, String>) + Send + 'static,
        F: FnOnce(SecureStorageError) + Send + 'static,
    {
        self.run(
            "get_all_items",
            |db| db.get_all_items().map_err(SecureStorageError::from),
            on_success,
            on_failed,
        );
    }

    /// Deletes `keys`. Keys that do not exist are skipped.
    pub fn delete_items<K, S, F>(&self, keys: K, on_success: S, on_failed: F)
    where
        K: IntoIterator<Item = String> + Send + 'static,
        S: FnOnce() + Send + 'static,
        F: FnOnce(SecureStorageError) + Send + 'static,
    {
        let policy = self.inner.context.config().batch_result_policy;
        self.run(
            "delete_items",
            move |db| {
                let report = db.delete_items(keys)?;
                check_batch(policy, report)
            },
            |()| on_success(),
            on_failed,
        );
    }

    /// Drops every record and deletes the database file. A later
    /// [`load`](Self::load) or insert starts from an empty database.
    pub fn delete_all<S, F>(&self, on_success: S, on_failed: F)
    where
        S: FnOnce() + Send + 'static,
        F: FnOnce(SecureStorageError) + Send + 'static,
    {
        self.run(
            "delete_all",
            |db| {
                db.delete_all_records()?;
                db.delete_whole_database()?;
                Ok(())
            },
            |()| on_success(),
            on_failed,
        );
    }

    /// Reports the size of the database file in bytes.
    pub fn get_used_size<S, F>(&self, on_success: S, on_failed: F)
    where
        S: FnOnce(u64) + Send + 'static,
        F: FnOnce(SecureStorageError) + Send + 'static,
    {
        self.run(
            "get_used_size",
            |db| Ok(db.current_used_size()),
            on_success,
            on_failed,
        );
    }

    /// Closes the bound database, waiting for a running operation to finish.
    ///
    /// `on_closed` runs afterwards, also when nothing was bound.
    pub fn close_database<C>(&self, on_closed: C)
    where
        C: FnOnce() + Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        self.spawn(move || {
            if let Some((_, handle)) = inner.bound_handle() {
                lock(&handle).close_database();
            }
            on_closed();
        });
    }

    /// Deletes the database of `mini_app_id`, closing its handle first.
    ///
    /// Blocks while an operation holds the handle. Housekeeping for the host:
    /// failures are logged and swallowed.
    pub fn clear_for_mini_app(&self, mini_app_id: &str) {
        self.inner.context.clear_mini_app(mini_app_id);
    }

    /// Deletes every mini-app database, closing all handles first.
    ///
    /// Failures are logged and swallowed.
    pub fn clear_all(&self) {
        self.inner.context.clear_all();
    }

    fn spawn(&self, work: impl FnOnce() + Send + 'static) {
        self.inner.context.runtime().spawn_blocking(work);
    }

    /// Schedules `work` against the bound database and routes its outcome.
    fn run<T, W, S, F>(&self, operation: &'static str, work: W, on_success: S, on_failed: F)
    where
        W: FnOnce(&mut SecureDatabase) -> SecureStorageResult<T> + Send + 'static,
        S: FnOnce(T) + Send + 'static,
        F: FnOnce(SecureStorageError) + Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        self.spawn(move || match inner.with_database(work) {
            Some(Ok(value)) => on_success(value),
            Some(Err(err)) => {
                log::debug!("secure storage {operation} failed: {err}");
                on_failed(err);
            }
            None => match inner.context.config().not_ready_policy {
                NotReadyPolicy::Fail => on_failed(SecureStorageError::NotInitialized),
                NotReadyPolicy::Drop => {
                    log::debug!("secure storage {operation} dropped: no database loaded");
                }
            },
        });
    }
}

impl Inner {
    fn bound_handle(&self) -> Option<(String, SharedDatabase)> {
        let mini_app_id = lock(&self.mini_app_id).clone()?;
        let handle = self.context.registry().get(&mini_app_id)?;
        Some((mini_app_id, handle))
    }

    fn acquire<'a>(
        &self,
        handle: &'a SharedDatabase,
    ) -> SecureStorageResult<MutexGuard<'a, SecureDatabase>> {
        match self.context.config().busy_policy {
            BusyPolicy::Queue => Ok(lock(handle)),
            BusyPolicy::Reject => match handle.try_lock() {
                Ok(guard) => Ok(guard),
                Err(TryLockError::Poisoned(poisoned)) => Ok(poisoned.into_inner()),
                Err(TryLockError::WouldBlock) => Err(SecureStorageError::Busy),
            },
        }
    }

    /// Runs `work` under the handle lock. `None` when nothing is bound.
    ///
    /// A handle left failed or corrupted is dropped from the registry so the
    /// next [`SecureStorage::load`] starts over with a fresh one.
    fn with_database<T>(
        &self,
        work: impl FnOnce(&mut SecureDatabase) -> SecureStorageResult<T>,
    ) -> Option<SecureStorageResult<T>> {
        let (mini_app_id, handle) = self.bound_handle()?;
        let (result, terminal) = {
            let mut db = match self.acquire(&handle) {
                Ok(db) => db,
                Err(err) => return Some(Err(err)),
            };
            let result = work(&mut db);
            (result, db.status().is_terminal())
        };
        if terminal {
            self.discard(&mini_app_id, &handle);
        }
        Some(result)
    }

    fn open(&self, mini_app_id: &str) -> SecureStorageResult<()> {
        let registry = self.context.registry();
        let handle =
            registry.get_or_insert_with(mini_app_id, || self.context.new_database(mini_app_id));
        let (result, terminal) = {
            let mut db = self.acquire(&handle)?;
            if db.status().is_terminal() {
                *db = self.context.new_database(mini_app_id);
            }
            let result = if db.is_usable() {
                Ok(())
            } else {
                db.create_and_open().map_err(SecureStorageError::from)
            };
            (result, db.status().is_terminal())
        };
        if terminal {
            self.discard(mini_app_id, &handle);
        } else if result.is_ok() {
            *lock(&self.mini_app_id) = Some(mini_app_id.to_string());
        }
        result
    }

    fn discard(&self, mini_app_id: &str, handle: &SharedDatabase) {
        if self.context.registry().discard(mini_app_id, handle) {
            log::warn!("discarded unusable secure storage handle for {mini_app_id}");
        }
    }
}

fn check_batch(policy: BatchResultPolicy, report: BatchReport) -> SecureStorageResult<()> {
    match policy {
        BatchResultPolicy::AllChunks => Ok(()),
        BatchResultPolicy::LastRow if report.last_row_applied => Ok(()),
        BatchResultPolicy::LastRow => Err(SecureStorageError::io(
            "the last statement of the batch changed no row",
        )),
    }
}
