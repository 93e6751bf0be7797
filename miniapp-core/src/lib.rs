#![deny(clippy::all, clippy::pedantic, clippy::nursery)]
//! Secure storage for mini-apps running inside a host `WebView`.
//!
//! Every mini-app gets its own encrypted, size-bounded key-value database.
//! [`SecureStorageHost`] is the entry point exported to Kotlin and Swift: it
//! owns the configuration, the key provider and the worker runtime, and hands
//! out one [`SecureStorageDispatcher`] per `WebView` session. The dispatcher
//! decodes bridge commands sent by mini-app scripts and answers through the
//! host's [`BridgeExecutor`].

pub mod bridge;
pub use bridge::{BridgeExecutor, NativeEventType, SecureStorageDispatcher};

pub mod logger;

pub mod secure_storage;
pub use secure_storage::{
    BatchResultPolicy, BusyPolicy, EncryptionKeyProvider, HkdfKeyProvider, NotReadyPolicy,
    SecureStorage, SecureStorageConfig, SecureStorageError, SecureStorageHost,
    SecureStorageResult,
};

uniffi::setup_scaffolding!("miniapp_core");
