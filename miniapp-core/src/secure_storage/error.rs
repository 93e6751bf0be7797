//! Error taxonomy reported to mini-apps.

use miniapp_db::DatabaseError;
use thiserror::Error;

/// Result type for secure storage operations.
pub type SecureStorageResult<T> = Result<T, SecureStorageError>;

/// Errors surfaced by the storage manager.
///
/// Only the kind crosses the bridge: [`to_bridge_json`](Self::to_bridge_json)
/// pairs the wire type with a fixed message and never includes `details`.
#[derive(Debug, Clone, PartialEq, Eq, Error, uniffi::Error)]
pub enum SecureStorageError {
    /// Read, write or transaction failure. The default mapping.
    #[error("secure storage io error: {details}")]
    Io {
        /// Underlying cause, for logs only.
        details: String,
    },

    /// Another operation is running against the same database.
    #[error("secure storage is busy")]
    Busy,

    /// The database reached its size budget.
    #[error("secure storage is full")]
    Full,

    /// The database file does not exist or is not open.
    #[error("secure storage is unavailable")]
    Unavailable,

    /// No database was loaded for this session.
    #[error("secure storage is not initialized")]
    NotInitialized,
}

impl SecureStorageError {
    pub(crate) fn io(details: impl Into<String>) -> Self {
        Self::Io {
            details: details.into(),
        }
    }

    /// Error type name as seen by mini-app scripts.
    #[must_use]
    pub const fn error_type(&self) -> &'static str {
        match self {
            Self::Io { .. } => "SecureStorageIOError",
            Self::Busy => "SecureStorageBusyError",
            Self::Full => "SecureStorageFullError",
            Self::Unavailable => "SecureStorageUnavailableError",
            Self::NotInitialized => "SecureStorageNotInitializedError",
        }
    }

    /// Fixed, human-readable message sent with the error type.
    #[must_use]
    pub const fn bridge_message(&self) -> &'static str {
        match self {
            Self::Io { .. } => "There was an error while reading or writing the secure storage.",
            Self::Busy => "The secure storage is busy doing another operation.",
            Self::Full => "The secure storage reached its maximum size.",
            Self::Unavailable => "The secure storage is not available.",
            Self::NotInitialized => "The secure storage has not been loaded yet.",
        }
    }

    /// Serializes the error as `{"type": ..., "message": ...}`.
    #[must_use]
    pub fn to_bridge_json(&self) -> String {
        serde_json::json!({
            "type": self.error_type(),
            "message": self.bridge_message(),
        })
        .to_string()
    }
}

impl From<DatabaseError> for SecureStorageError {
    fn from(error: DatabaseError) -> Self {
        if error.is_busy() {
            Self::Busy
        } else if error.is_disk_full() {
            Self::Full
        } else if matches!(error, DatabaseError::Unavailable) {
            Self::Unavailable
        } else {
            Self::io(error.to_string())
        }
    }
}

impl From<std::io::Error> for SecureStorageError {
    fn from(error: std::io::Error) -> Self {
        Self::io(error.to_string())
    }
}

impl From<uniffi::UnexpectedUniFFICallbackError> for SecureStorageError {
    fn from(error: uniffi::UnexpectedUniFFICallbackError) -> Self {
        Self::io(format!("unexpected uniffi callback error: {}", error.reason))
    }
}
