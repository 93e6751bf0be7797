//! Registry of the database handles opened through one host.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use miniapp_db::SecureDatabase;

/// A database handle shared between the manager and its workers.
pub(crate) type SharedDatabase = Arc<Mutex<SecureDatabase>>;

/// Locks `mutex`, recovering the guard if a previous holder panicked.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Holds at most one handle per mini-app id for the managers of one
/// [`SecureStorageHost`](super::SecureStorageHost).
#[derive(Default)]
pub struct HandleRegistry {
    handles: Mutex<HashMap<String, SharedDatabase>>,
}

impl std::fmt::Debug for HandleRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandleRegistry")
            .field("handles", &self.len())
            .finish()
    }
}

impl HandleRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of registered handles.
    #[must_use]
    pub fn len(&self) -> usize {
        lock(&self.handles).len()
    }

    /// Returns `true` if no handle is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns `true` if a handle is registered for `mini_app_id`.
    #[must_use]
    pub fn contains(&self, mini_app_id: &str) -> bool {
        lock(&self.handles).contains_key(mini_app_id)
    }

    pub(crate) fn get(&self, mini_app_id: &str) -> Option<SharedDatabase> {
        lock(&self.handles).get(mini_app_id).cloned()
    }

    /// Returns the handle for `mini_app_id`, registering `create()` if absent.
    pub(crate) fn get_or_insert_with(
        &self,
        mini_app_id: &str,
        create: impl FnOnce() -> SecureDatabase,
    ) -> SharedDatabase {
        let mut handles = lock(&self.handles);
        Arc::clone(
            handles
                .entry(mini_app_id.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(create()))),
        )
    }

    /// Removes `handle` if it is still the one registered for `mini_app_id`.
    pub(crate) fn discard(&self, mini_app_id: &str, handle: &SharedDatabase) -> bool {
        let mut handles = lock(&self.handles);
        match handles.get(mini_app_id) {
            Some(current) if Arc::ptr_eq(current, handle) => {
                handles.remove(mini_app_id);
                true
            }
            _ => false,
        }
    }

    /// Snapshot of the registered handles.
    pub(crate) fn entries(&self) -> Vec<(String, SharedDatabase)> {
        lock(&self.handles)
            .iter()
            .map(|(id, handle)| (id.clone(), Arc::clone(handle)))
            .collect()
    }
}
