use std::sync::{Arc, Mutex};

use super::executor::{BridgeExecutor, NativeEventType};
use super::payload::{
    self, GetItemParam, RemoveItemsParam, SetItemsParam, StorageSize, CLEAR_SUCCESS,
    ERR_WRONG_JSON_FORMAT, REMOVE_ITEMS_SUCCESS, SAVE_SUCCESS,
};
use crate::secure_storage::registry::lock;
use crate::secure_storage::{SecureStorage, SecureStorageError, SecureStorageHost};

/// Decodes secure storage commands from one `WebView` session and answers
/// them through the session's [`BridgeExecutor`].
///
/// Commands are ignored until both [`set_bridge_executor`](Self::set_bridge_executor)
/// and [`set_mini_app_components`](Self::set_mini_app_components) were
/// called. Once ready, every command ends in exactly one `post_value` or
/// `post_error` for its callback id.
#[derive(uniffi::Object)]
pub struct SecureStorageDispatcher {
    host: Arc<SecureStorageHost>,
    state: Mutex<DispatcherState>,
}

#[derive(Default)]
struct DispatcherState {
    executor: Option<Arc<dyn BridgeExecutor>>,
    session: Option<Session>,
}

struct Session {
    mini_app_id: String,
    storage: Arc<SecureStorage>,
}

/// Everything a command needs, cloned out of the dispatcher state.
struct Ready {
    executor: Arc<dyn BridgeExecutor>,
    mini_app_id: String,
    storage: Arc<SecureStorage>,
}

/// Answers a single callback id.
#[derive(Clone)]
struct Reply {
    executor: Arc<dyn BridgeExecutor>,
    callback_id: String,
}

impl Reply {
    fn value(self, value: impl Into<String>) {
        self.executor.post_value(self.callback_id, value.into());
    }

    fn error(self, error: &SecureStorageError) {
        self.executor
            .post_error(self.callback_id, error.to_bridge_json());
    }

    fn malformed(self) {
        self.executor
            .post_error(self.callback_id, ERR_WRONG_JSON_FORMAT.to_string());
    }
}

impl std::fmt::Debug for SecureStorageDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = lock(&self.state);
        f.debug_struct("SecureStorageDispatcher")
            .field("has_executor", &state.executor.is_some())
            .field(
                "mini_app_id",
                &state.session.as_ref().map(|session| &session.mini_app_id),
            )
            .finish_non_exhaustive()
    }
}

impl SecureStorageDispatcher {
    pub(crate) fn new(host: Arc<SecureStorageHost>) -> Self {
        Self {
            host,
            state: Mutex::new(DispatcherState::default()),
        }
    }

    /// Returns what commands need, or `None` (logged) while not ready.
    fn when_ready(&self, command: &str) -> Option<Ready> {
        let state = lock(&self.state);
        let ready = match (&state.executor, &state.session) {
            (Some(executor), Some(session)) => Some(Ready {
                executor: Arc::clone(executor),
                mini_app_id: session.mini_app_id.clone(),
                storage: Arc::clone(&session.storage),
            }),
            _ => None,
        };
        drop(state);
        if ready.is_none() {
            log::debug!("secure storage {command} ignored: dispatcher not ready");
        }
        ready
    }
}

#[uniffi::export]
impl SecureStorageDispatcher {
    /// Sets the channel replies and events are sent through.
    pub fn set_bridge_executor(&self, executor: Arc<dyn BridgeExecutor>) {
        lock(&self.state).executor = Some(executor);
    }

    /// Binds the session to `mini_app_id` with a fresh storage manager.
    pub fn set_mini_app_components(&self, mini_app_id: String) {
        let storage = Arc::new(self.host.storage());
        lock(&self.state).session = Some(Session {
            mini_app_id,
            storage,
        });
    }

    /// Loads the mini-app's database and fires
    /// [`MiniAppSecureStorageReady`](NativeEventType::MiniAppSecureStorageReady) or
    /// [`MiniAppSecureStorageLoadError`](NativeEventType::MiniAppSecureStorageLoadError).
    pub fn on_load(&self) {
        let Some(ready) = self.when_ready("load") else {
            return;
        };
        let on_ready = Arc::clone(&ready.executor);
        let on_error = ready.executor;
        ready.storage.load(
            &ready.mini_app_id,
            move || {
                on_ready.dispatch_event(
                    NativeEventType::MiniAppSecureStorageReady.to_string(),
                    String::new(),
                );
            },
            move |err| {
                on_error.dispatch_event(
                    NativeEventType::MiniAppSecureStorageLoadError.to_string(),
                    err.to_bridge_json(),
                );
            },
        );
    }

    /// Handles `setItems` with a `{"param": {"secureStorageItems": {...}}}` payload.
    pub fn on_set_items(&self, callback_id: String, payload: &str) {
        let Some(ready) = self.when_ready("setItems") else {
            return;
        };
        let reply = Reply {
            executor: ready.executor,
            callback_id,
        };
        match payload::decode::<SetItemsParam>(payload) {
            Ok(param) => {
                let on_error = reply.clone();
                ready.storage.insert_items(
                    param.secure_storage_items,
                    move || reply.value(SAVE_SUCCESS),
                    move |err| on_error.error(&err),
                );
            }
            Err(err) => {
                log::debug!("malformed setItems payload: {err}");
                reply.malformed();
            }
        }
    }

    /// Handles `getItem` with a `{"param": {"secureStorageKey": ...}}` payload.
    ///
    /// A missing key is answered with the string `"null"`.
    pub fn on_get_item(&self, callback_id: String, payload: &str) {
        let Some(ready) = self.when_ready("getItem") else {
            return;
        };
        let reply = Reply {
            executor: ready.executor,
            callback_id,
        };
        match payload::decode::<GetItemParam>(payload) {
            Ok(param) => {
                let on_error = reply.clone();
                ready.storage.get_item(
                    param.secure_storage_key,
                    move |value| reply.value(value),
                    move |err| on_error.error(&err),
                );
            }
            Err(err) => {
                log::debug!("malformed getItem payload: {err}");
                reply.malformed();
            }
        }
    }

    /// Handles `removeItems` with a `{"param": {"secureStorageKeyList": [...]}}` payload.
    pub fn on_remove_items(&self, callback_id: String, payload: &str) {
        let Some(ready) = self.when_ready("removeItems") else {
            return;
        };
        let reply = Reply {
            executor: ready.executor,
            callback_id,
        };
        match payload::decode::<RemoveItemsParam>(payload) {
            Ok(param) => {
                let on_error = reply.clone();
                ready.storage.delete_items(
                    param.secure_storage_key_list,
                    move || reply.value(REMOVE_ITEMS_SUCCESS),
                    move |err| on_error.error(&err),
                );
            }
            Err(err) => {
                log::debug!("malformed removeItems payload: {err}");
                reply.malformed();
            }
        }
    }

    /// Handles `clearAll`: drops every record and the database file.
    pub fn on_clear_all(&self, callback_id: String) {
        let Some(ready) = self.when_ready("clearAll") else {
            return;
        };
        let reply = Reply {
            executor: ready.executor,
            callback_id,
        };
        let on_error = reply.clone();
        ready.storage.delete_all(
            move || reply.value(CLEAR_SUCCESS),
            move |err| on_error.error(&err),
        );
    }

    /// Handles `size`: answers `{"usedSpace": n, "maxSpace": n}` in bytes.
    pub fn on_size(&self, callback_id: String) {
        let Some(ready) = self.when_ready("size") else {
            return;
        };
        let reply = Reply {
            executor: ready.executor,
            callback_id,
        };
        let max_space = self.host.config().max_size_bytes();
        let on_error = reply.clone();
        ready.storage.get_used_size(
            move |used_space| {
                let size = StorageSize {
                    used_space,
                    max_space,
                };
                match serde_json::to_string(&size) {
                    Ok(json) => reply.value(json),
                    Err(err) => reply.error(&SecureStorageError::io(err.to_string())),
                }
            },
            move |err| on_error.error(&err),
        );
    }

    /// Closes the session's database when its `WebView` goes away.
    pub fn cleanup_secure_storage(&self) {
        let Some(ready) = self.when_ready("cleanup") else {
            return;
        };
        let mini_app_id = ready.mini_app_id;
        ready.storage.close_database(move || {
            log::debug!("closed secure storage for {mini_app_id}");
        });
    }

    /// Deletes the database of `mini_app_id`. Nothing is posted back.
    pub fn clear_secure_storage_for(&self, mini_app_id: &str) {
        if let Some(ready) = self.when_ready("clearSecureStorage") {
            ready.storage.clear_for_mini_app(mini_app_id);
        }
    }

    /// Deletes the databases of every mini-app. Nothing is posted back.
    pub fn clear_secure_storage(&self) {
        if let Some(ready) = self.when_ready("clearSecureStorage") {
            ready.storage.clear_all();
        }
    }
}
