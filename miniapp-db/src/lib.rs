//! Encrypted key-value storage for mini-apps, backed by `SQLCipher`.
//!
//! Each mini-app owns exactly one encrypted database file holding a single
//! two-column table. The [`SecureDatabase`] engine wraps that file and tracks a
//! [`DatabaseStatus`] for every handle so callers can tell a busy handle from a
//! full, closed, failed or corrupted one.
//!
//! Consumer code (the storage manager in `miniapp-core`) uses only the types
//! re-exported here. Raw `rusqlite` access stays inside this crate.

pub mod cipher;
mod database;
pub mod error;
pub mod files;
mod schema;
mod status;

pub use database::{BatchReport, KeySource, SecureDatabase, CHUNK_SIZE, NULL_SENTINEL};
pub use error::{DatabaseError, DatabaseResult};
pub use status::DatabaseStatus;
