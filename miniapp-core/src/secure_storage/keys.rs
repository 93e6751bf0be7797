//! Encryption key providers for mini-app databases.

use std::sync::Arc;

use hkdf::Hkdf;
use miniapp_db::{DatabaseError, DatabaseResult, KeySource};
use secrecy::{ExposeSecret, SecretSlice};
use sha2::Sha256;
use zeroize::Zeroizing;

use super::error::{SecureStorageError, SecureStorageResult};

const HKDF_LABEL: &[u8] = b"miniapp-secure-storage:v1:";
const KEY_LEN: usize = 32;

/// Supplies the raw key protecting one mini-app database.
///
/// Called on every open. The key is dropped as soon as the connection is
/// keyed; implementations should return the same bytes for the same name.
#[uniffi::export(with_foreign)]
pub trait EncryptionKeyProvider: Send + Sync {
    /// Returns the 32-byte key for `database_name` (`rakuten-<mini app id>`).
    ///
    /// # Errors
    ///
    /// Returns an error if the platform keystore cannot produce the key.
    fn database_key(&self, database_name: String) -> SecureStorageResult<Vec<u8>>;
}

/// Derives per-database keys from a host master secret with HKDF-SHA256.
#[derive(uniffi::Object)]
pub struct HkdfKeyProvider {
    master_secret: SecretSlice<u8>,
}

impl std::fmt::Debug for HkdfKeyProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HkdfKeyProvider").finish_non_exhaustive()
    }
}

#[uniffi::export]
impl HkdfKeyProvider {
    /// Creates a provider from `master_secret`.
    ///
    /// # Errors
    ///
    /// Returns an error if the secret is shorter than 32 bytes.
    #[uniffi::constructor]
    pub fn new(master_secret: Vec<u8>) -> SecureStorageResult<Arc<Self>> {
        Self::from_secret(master_secret).map(Arc::new)
    }
}

impl HkdfKeyProvider {
    pub(crate) fn from_secret(master_secret: Vec<u8>) -> SecureStorageResult<Self> {
        let master_secret = SecretSlice::from(master_secret);
        if master_secret.expose_secret().len() < KEY_LEN {
            return Err(SecureStorageError::io(format!(
                "master secret too short: expected at least {KEY_LEN} bytes"
            )));
        }
        Ok(Self { master_secret })
    }

    fn derive(&self, database_name: &str) -> SecureStorageResult<Zeroizing<[u8; KEY_LEN]>> {
        let mut info = Vec::with_capacity(HKDF_LABEL.len() + database_name.len());
        info.extend_from_slice(HKDF_LABEL);
        info.extend_from_slice(database_name.as_bytes());

        let hkdf = Hkdf::<Sha256>::new(None, self.master_secret.expose_secret());
        let mut key = Zeroizing::new([0u8; KEY_LEN]);
        hkdf.expand(&info, &mut key[..])
            .map_err(|_| SecureStorageError::io("HKDF expansion failed"))?;
        Ok(key)
    }
}

impl EncryptionKeyProvider for HkdfKeyProvider {
    fn database_key(&self, database_name: String) -> SecureStorageResult<Vec<u8>> {
        Ok(self.derive(&database_name)?.to_vec())
    }
}

/// Adapts an [`EncryptionKeyProvider`] to the engine's [`KeySource`].
pub(crate) struct ProviderKeySource {
    provider: Arc<dyn EncryptionKeyProvider>,
}

impl ProviderKeySource {
    pub(crate) fn new(provider: Arc<dyn EncryptionKeyProvider>) -> Self {
        Self { provider }
    }
}

impl KeySource for ProviderKeySource {
    fn database_key(&self, database_name: &str) -> DatabaseResult<Zeroizing<[u8; 32]>> {
        let bytes = Zeroizing::new(
            self.provider
                .database_key(database_name.to_string())
                .map_err(|err| DatabaseError::Key(err.to_string()))?,
        );
        if bytes.len() != KEY_LEN {
            return Err(DatabaseError::Key(format!(
                "key length mismatch: expected {KEY_LEN}, got {}",
                bytes.len()
            )));
        }
        let mut key = Zeroizing::new([0u8; KEY_LEN]);
        key.copy_from_slice(&bytes);
        Ok(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StaticProvider(Vec<u8>);

    impl EncryptionKeyProvider for StaticProvider {
        fn database_key(&self, _database_name: String) -> SecureStorageResult<Vec<u8>> {
            Ok(self.0.clone())
        }
    }

    #[test]
    fn test_hkdf_keys_are_stable_per_database() {
        let provider = HkdfKeyProvider::from_secret(vec![7u8; 32]).expect("provider");
        let first = provider.database_key("rakuten-a".to_string()).expect("key");
        let again = provider.database_key("rakuten-a".to_string()).expect("key");
        let other = provider.database_key("rakuten-b".to_string()).expect("key");
        assert_eq!(first.len(), 32);
        assert_eq!(first, again);
        assert_ne!(first, other);
    }

    #[test]
    fn test_hkdf_keys_depend_on_master_secret() {
        let a = HkdfKeyProvider::from_secret(vec![1u8; 32]).expect("provider");
        let b = HkdfKeyProvider::from_secret(vec![2u8; 32]).expect("provider");
        assert_ne!(
            a.database_key("rakuten-x".to_string()).expect("key"),
            b.database_key("rakuten-x".to_string()).expect("key")
        );
    }

    #[test]
    fn test_short_master_secret_is_rejected() {
        assert!(HkdfKeyProvider::from_secret(vec![1u8; 16]).is_err());
    }

    #[test]
    fn test_key_source_rejects_wrong_length() {
        let source = ProviderKeySource::new(Arc::new(StaticProvider(vec![0u8; 16])));
        match source.database_key("rakuten-x") {
            Err(DatabaseError::Key(message)) => assert!(message.contains("got 16")),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_key_source_passes_through_valid_key() {
        let source = ProviderKeySource::new(Arc::new(StaticProvider(vec![9u8; 32])));
        let key = source.database_key("rakuten-x").expect("key");
        assert_eq!(*key, [9u8; 32]);
    }
}
