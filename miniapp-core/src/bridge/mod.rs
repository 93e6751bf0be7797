//! JavaScript bridge for secure storage commands.
//!
//! Mini-app scripts send commands with a callback id and a JSON payload. The
//! [`SecureStorageDispatcher`] decodes them, runs them through the session's
//! storage manager and replies through a [`BridgeExecutor`]:
//!
//! | command | payload `param` | success value |
//! |---------|-----------------|---------------|
//! | `setItems` | `{"secureStorageItems": {k: v}}` | `Items saved successfully.` |
//! | `getItem` | `{"secureStorageKey": k}` | the value, or `null` |
//! | `removeItems` | `{"secureStorageKeyList": [k]}` | `Items removed successfully.` |
//! | `clearAll` | none | `Storage removed successfully.` |
//! | `size` | none | `{"usedSpace": n, "maxSpace": n}` |
//!
//! Failures are posted as `{"type": "SecureStorage...Error", "message": ...}`.

mod dispatcher;
pub use dispatcher::SecureStorageDispatcher;

mod executor;
pub use executor::{BridgeExecutor, NativeEventType};

pub mod payload;
