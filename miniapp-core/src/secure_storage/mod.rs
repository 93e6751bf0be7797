//! Per-mini-app encrypted storage management.
//!
//! [`SecureStorageHost`] holds the pieces shared by all of its sessions: the
//! [`SecureStorageConfig`], the key source, the [`HandleRegistry`] (at most
//! one open database per mini-app id) and the worker runtime. The registry
//! belongs to the host, so a process must keep a single host per database
//! directory. Each `WebView`
//! session gets its own [`SecureStorage`] manager, bound to one mini-app by
//! [`SecureStorage::load`].
//!
//! Engine faults are mapped onto [`SecureStorageError`] before they reach a
//! callback:
//!
//! | engine | reported |
//! |--------|----------|
//! | busy, `SQLITE_BUSY` | [`SecureStorageError::Busy`] |
//! | over budget, `SQLITE_FULL` | [`SecureStorageError::Full`] |
//! | file missing, handle closed | [`SecureStorageError::Unavailable`] |
//! | anything else | [`SecureStorageError::Io`] |

mod config;
mod context;
mod error;
mod host;
mod keys;
mod manager;
pub mod paths;
pub mod registry;

pub use config::{
    default_secure_storage_config, BatchResultPolicy, BusyPolicy, NotReadyPolicy,
    SecureStorageConfig, DEFAULT_DATABASE_VERSION, DEFAULT_MAX_SIZE_KB,
};
pub use error::{SecureStorageError, SecureStorageResult};
pub use host::SecureStorageHost;
pub use keys::{EncryptionKeyProvider, HkdfKeyProvider};
pub use manager::SecureStorage;
pub use paths::{database_name, StorageDirectory, DB_NAME_PREFIX};
pub use registry::HandleRegistry;
