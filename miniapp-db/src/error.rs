//! Database error types for the encrypted key-value engine.

use rusqlite::ErrorCode;
use thiserror::Error;

/// Result type for database operations.
pub type DatabaseResult<T> = Result<T, DatabaseError>;

/// Errors raised by [`SecureDatabase`](crate::SecureDatabase).
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Another operation is running against the same handle.
    #[error("database is busy doing another operation")]
    Busy,

    /// The database reached its configured size budget.
    #[error("can't insert new items, database reached its max space limit")]
    Full,

    /// The backing file does not exist or the handle is not open.
    #[error("database does not exist")]
    Unavailable,

    /// The backing store reported corruption; the file has been deleted.
    #[error("database is corrupted")]
    Corrupted,

    /// The handle failed earlier and must be discarded.
    #[error("database handle failed and must be recreated")]
    Failed,

    /// The key source could not provide key material.
    #[error("encryption key error: {0}")]
    Key(String),

    /// Errors coming from `SQLite`.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Filesystem errors.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl DatabaseError {
    /// Returns `true` for `SQLITE_CORRUPT` / `SQLITE_NOTADB` failures.
    ///
    /// A wrong key also surfaces as `SQLITE_NOTADB`: the first page cannot be
    /// decrypted into a valid header.
    #[must_use]
    pub fn is_corruption(&self) -> bool {
        match self {
            Self::Corrupted => true,
            Self::Sqlite(err) => matches!(
                err.sqlite_error_code(),
                Some(ErrorCode::DatabaseCorrupt | ErrorCode::NotADatabase)
            ),
            _ => false,
        }
    }

    /// Returns `true` for `SQLITE_FULL`, raised once `max_page_count` is hit.
    #[must_use]
    pub fn is_disk_full(&self) -> bool {
        match self {
            Self::Full => true,
            Self::Sqlite(err) => err.sqlite_error_code() == Some(ErrorCode::DiskFull),
            _ => false,
        }
    }

    /// Returns `true` for `SQLITE_BUSY` / `SQLITE_LOCKED`.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        match self {
            Self::Busy => true,
            Self::Sqlite(err) => matches!(
                err.sqlite_error_code(),
                Some(ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked)
            ),
            _ => false,
        }
    }
}
