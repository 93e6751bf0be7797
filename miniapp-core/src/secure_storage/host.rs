//! Host-facing entry point.

use std::sync::Arc;

use tokio::runtime::{Builder, Handle, Runtime};

use super::config::SecureStorageConfig;
use super::context::StorageContext;
use super::error::SecureStorageResult;
use super::keys::{EncryptionKeyProvider, HkdfKeyProvider, ProviderKeySource};
use super::manager::SecureStorage;
use super::registry::HandleRegistry;
use crate::bridge::SecureStorageDispatcher;

/// Owns the configuration, key provider, handle registry and worker runtime
/// of the secure storage subsystem.
///
/// Create one per process and one dispatcher per `WebView` session. Each host
/// has its own handle registry: two hosts over the same directory may open
/// the same mini-app database twice.
///
/// # Example (Kotlin)
///
/// ```kotlin
/// val host = SecureStorageHost(
///     defaultSecureStorageConfig(context.getDatabasePath("x").parent),
///     AndroidKeystoreKeyProvider(context),
/// )
/// val dispatcher = host.createDispatcher()
/// dispatcher.setBridgeExecutor(bridgeExecutor)
/// dispatcher.setMiniAppComponents(miniAppId)
/// ```
#[derive(uniffi::Object)]
pub struct SecureStorageHost {
    context: Arc<StorageContext>,
    runtime: Option<Runtime>,
}

impl std::fmt::Debug for SecureStorageHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecureStorageHost")
            .field("config", self.context.config())
            .field("registry", self.context.registry())
            .finish_non_exhaustive()
    }
}

#[uniffi::export]
impl SecureStorageHost {
    /// Creates a host with its own worker runtime.
    ///
    /// # Errors
    ///
    /// Returns an error if the worker runtime cannot be started.
    #[uniffi::constructor]
    pub fn new(
        config: SecureStorageConfig,
        key_provider: Arc<dyn EncryptionKeyProvider>,
    ) -> SecureStorageResult<Arc<Self>> {
        let runtime = Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("miniapp-secure-storage")
            .build()?;
        let context = Self::context(config, key_provider, runtime.handle().clone());
        Ok(Arc::new(Self {
            context,
            runtime: Some(runtime),
        }))
    }

    /// Creates a host whose database keys are derived from `master_secret`
    /// with HKDF-SHA256.
    ///
    /// # Errors
    ///
    /// Returns an error if the secret is shorter than 32 bytes or the worker
    /// runtime cannot be started.
    #[uniffi::constructor]
    pub fn with_master_secret(
        config: SecureStorageConfig,
        master_secret: Vec<u8>,
    ) -> SecureStorageResult<Arc<Self>> {
        let provider = HkdfKeyProvider::from_secret(master_secret)?;
        Self::new(config, Arc::new(provider))
    }

    /// Creates a dispatcher for a new `WebView` session.
    #[must_use]
    pub fn create_dispatcher(self: Arc<Self>) -> Arc<SecureStorageDispatcher> {
        Arc::new(SecureStorageDispatcher::new(self))
    }

    /// Deletes the database of `mini_app_id`. Failures are logged only.
    pub fn clear_secure_storage_for(&self, mini_app_id: &str) {
        self.context.clear_mini_app(mini_app_id);
    }

    /// Deletes the databases of every mini-app. Failures are logged only.
    pub fn clear_secure_storage(&self) {
        self.context.clear_all();
    }

    /// Returns the configuration this host was created with.
    #[must_use]
    pub fn config(&self) -> SecureStorageConfig {
        self.context.config().clone()
    }
}

impl SecureStorageHost {
    /// Creates a host that schedules work on an existing tokio runtime.
    #[must_use]
    pub fn with_runtime(
        config: SecureStorageConfig,
        key_provider: Arc<dyn EncryptionKeyProvider>,
        runtime: Handle,
    ) -> Arc<Self> {
        Arc::new(Self {
            context: Self::context(config, key_provider, runtime),
            runtime: None,
        })
    }

    /// Creates a storage manager with no mini-app bound yet.
    #[must_use]
    pub fn storage(&self) -> SecureStorage {
        SecureStorage::new(Arc::clone(&self.context))
    }

    /// Registry of the handles opened through this host.
    #[must_use]
    pub fn registry(&self) -> &HandleRegistry {
        self.context.registry()
    }

    fn context(
        config: SecureStorageConfig,
        key_provider: Arc<dyn EncryptionKeyProvider>,
        runtime: Handle,
    ) -> Arc<StorageContext> {
        let keys = Arc::new(ProviderKeySource::new(key_provider));
        Arc::new(StorageContext::new(config, keys, runtime))
    }
}

impl Drop for SecureStorageHost {
    fn drop(&mut self) {
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}
