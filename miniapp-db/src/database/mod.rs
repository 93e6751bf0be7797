//! Encrypted, size-bounded key-value engine for a single mini-app.

mod batch;

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rusqlite::{params, Connection, OptionalExtension};
use zeroize::Zeroizing;

use crate::cipher;
use crate::error::{DatabaseError, DatabaseResult};
use crate::files;
use crate::schema::{self, SchemaChange};
use crate::status::DatabaseStatus;

pub use batch::{BatchReport, CHUNK_SIZE};

/// Value returned by [`SecureDatabase::get_item_or_sentinel`] for a missing key.
///
/// This is the literal four-character string `"null"`, not an absence marker.
pub const NULL_SENTINEL: &str = "null";

/// Source of the 32-byte key protecting a database.
///
/// The engine asks for the key on every open and drops it (zeroized) as soon
/// as the connection is keyed.
pub trait KeySource: Send + Sync {
    /// Returns the raw key for `database_name`.
    ///
    /// # Errors
    ///
    /// Returns [`DatabaseError::Key`] if no key can be produced.
    fn database_key(&self, database_name: &str) -> DatabaseResult<Zeroizing<[u8; 32]>>;
}

/// Encrypted key-value database owned by one mini-app.
///
/// Every read or write marks the handle [`DatabaseStatus::Busy`] until it
/// finishes. Callers that share a handle across threads wrap it in a mutex;
/// the engine itself refuses to start an operation while busy.
pub struct SecureDatabase {
    name: String,
    path: PathBuf,
    version: u32,
    max_size: u64,
    keys: Arc<dyn KeySource>,
    conn: Option<Connection>,
    status: DatabaseStatus,
}

impl fmt::Debug for SecureDatabase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecureDatabase")
            .field("name", &self.name)
            .field("path", &self.path)
            .field("version", &self.version)
            .field("max_size", &self.max_size)
            .field("open", &self.conn.is_some())
            .field("status", &self.status)
            .finish_non_exhaustive()
    }
}

impl SecureDatabase {
    /// Creates a handle for the database `name` stored inside `directory`.
    ///
    /// Nothing touches the disk until [`create_and_open`](Self::create_and_open).
    #[must_use]
    pub fn new(
        directory: &Path,
        name: impl Into<String>,
        version: u32,
        max_size: u64,
        keys: Arc<dyn KeySource>,
    ) -> Self {
        let name = name.into();
        let path = directory.join(&name);
        Self {
            name,
            path,
            version,
            max_size,
            keys,
            conn: None,
            status: DatabaseStatus::Default,
        }
    }

    // ── Lifecycle ───────────────────────────────────────────────────────

    /// Opens the encrypted database, creating the file and schema if absent.
    ///
    /// A schema version change drops and recreates the table. Corruption
    /// deletes the backing files and leaves the handle
    /// [`Corrupted`](DatabaseStatus::Corrupted).
    ///
    /// # Errors
    ///
    /// Returns [`DatabaseError::Corrupted`] on corruption, or the underlying
    /// error (with the handle marked `Failed`) for any other fault.
    pub fn create_and_open(&mut self) -> DatabaseResult<()> {
        self.conn = None;
        match self.open_connection() {
            Ok((conn, change)) => {
                if change != SchemaChange::Unchanged {
                    self.status = DatabaseStatus::Initiated;
                    log::debug!("secure database {} schema {change:?}", self.name);
                }
                self.conn = Some(conn);
                self.status = DatabaseStatus::Ready;
                Ok(())
            }
            Err(err) if err.is_corruption() => {
                log::warn!("secure database {} is corrupted: {err}", self.name);
                self.on_corrupted();
                Err(DatabaseError::Corrupted)
            }
            Err(err) => {
                log::error!("failed to open secure database {}: {err}", self.name);
                self.status = DatabaseStatus::Failed;
                Err(err)
            }
        }
    }

    fn open_connection(&self) -> DatabaseResult<(Connection, SchemaChange)> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let conn = {
            let key = self.keys.database_key(&self.name)?;
            cipher::open_encrypted(&self.path, &key)?
        };
        if !cipher::integrity_check(&conn)? {
            return Err(DatabaseError::Corrupted);
        }
        let change = schema::ensure_schema(&conn, self.version)?;
        cipher::apply_max_size(&conn, self.max_size)?;
        Ok((conn, change))
    }

    fn on_corrupted(&mut self) {
        self.conn = None;
        self.status = DatabaseStatus::Corrupted;
        if let Err(err) = files::remove_database_files(&self.path) {
            log::error!("failed to delete corrupted database {}: {err}", self.name);
        }
    }

    /// Closes the connection. The handle always ends up
    /// [`Closed`](DatabaseStatus::Closed), even if the close itself fails.
    pub fn close_database(&mut self) {
        if let Some(conn) = self.conn.take() {
            if let Err((_conn, err)) = conn.close() {
                log::warn!("failed to close secure database {}: {err}", self.name);
            }
        }
        self.status = DatabaseStatus::Closed;
    }

    /// Closes the handle and deletes the backing files.
    ///
    /// # Errors
    ///
    /// Returns an error if an existing file cannot be removed.
    pub fn delete_whole_database(&mut self) -> DatabaseResult<()> {
        self.conn = None;
        files::remove_database_files(&self.path)?;
        self.status = DatabaseStatus::Unavailable;
        Ok(())
    }

    // ── Queries and mutations ───────────────────────────────────────────

    /// Writes `items` with overwrite-on-conflict semantics.
    ///
    /// Batches larger than [`CHUNK_SIZE`] are split into chunks committed in
    /// their own transaction, in input order, so earlier chunks survive a
    /// failure in a later one.
    ///
    /// # Errors
    ///
    /// Fails with [`DatabaseError::Busy`] or [`DatabaseError::Full`] without
    /// writing anything when the handle is busy or the file is already at its
    /// size budget. `SQLITE_FULL` during the write also yields `Full`.
    pub fn insert<I>(&mut self, items: I) -> DatabaseResult<BatchReport>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        if self.status == DatabaseStatus::Busy {
            return Err(DatabaseError::Busy);
        }
        if self.is_full() {
            return Err(DatabaseError::Full);
        }
        let items: Vec<(String, String)> = items.into_iter().collect();
        self.begin()?;
        let result = self
            .connection()
            .and_then(|conn| batch::write_chunks(conn, &items, |tx, (key, value)| {
                tx.execute(schema::INSERT_QUERY, params![key, value])
            }));
        self.finish(result)
    }

    /// Looks up `key`, returning `None` when no row matches.
    ///
    /// # Errors
    ///
    /// Fails with [`DatabaseError::Unavailable`] when the file is missing and
    /// [`DatabaseError::Busy`] when another operation is running.
    pub fn get_item(&mut self, key: &str) -> DatabaseResult<Option<String>> {
        self.ensure_available()?;
        self.begin()?;
        let result = self.connection().and_then(|conn| {
            conn.query_row(schema::GET_ITEM_QUERY, [key], |row| {
                row.get::<_, Option<String>>(0)
            })
            .optional()
            .map(Option::flatten)
            .map_err(DatabaseError::from)
        });
        self.finish(result)
    }

    /// Like [`get_item`](Self::get_item) but returns [`NULL_SENTINEL`] for a
    /// missing key, matching what mini-app scripts expect on the wire.
    ///
    /// # Errors
    ///
    /// See [`get_item`](Self::get_item).
    pub fn get_item_or_sentinel(&mut self, key: &str) -> DatabaseResult<String> {
        Ok(self
            .get_item(key)?
            .unwrap_or_else(|| NULL_SENTINEL.to_string()))
    }

    /// Returns every stored record. An empty table yields an empty map.
    ///
    /// # Errors
    ///
    /// Fails with [`DatabaseError::Unavailable`] or [`DatabaseError::Busy`].
    pub fn get_all_items(&mut self) -> DatabaseResult<BTreeMap<String, String>> {
        self.ensure_available()?;
        self.begin()?;
        let result = self.connection().and_then(|conn| {
            let mut stmt = conn.prepare(schema::GET_ALL_ITEMS_QUERY)?;
            let rows = stmt.query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, Option<String>>(1)?.unwrap_or_default(),
                ))
            })?;
            let mut items = BTreeMap::new();
            for row in rows {
                let (key, value) = row?;
                items.insert(key, value);
            }
            Ok(items)
        });
        self.finish(result)
    }

    /// Deletes `keys`, chunked the same way as [`insert`](Self::insert).
    ///
    /// # Errors
    ///
    /// Fails with [`DatabaseError::Unavailable`] or [`DatabaseError::Busy`], or
    /// the underlying error if a chunk cannot be committed.
    pub fn delete_items<I>(&mut self, keys: I) -> DatabaseResult<BatchReport>
    where
        I: IntoIterator<Item = String>,
    {
        self.ensure_available()?;
        let keys: Vec<String> = keys.into_iter().collect();
        self.begin()?;
        let result = self.connection().and_then(|conn| {
            batch::write_chunks(conn, &keys, |tx, key| {
                tx.execute(schema::DELETE_ITEM_QUERY, [key])
            })
        });
        self.finish(result)
    }

    /// Drops the table and closes the handle, leaving it
    /// [`Unavailable`](DatabaseStatus::Unavailable).
    ///
    /// # Errors
    ///
    /// Fails with [`DatabaseError::Unavailable`] or [`DatabaseError::Busy`], or
    /// the underlying error if the drop cannot be committed.
    pub fn delete_all_records(&mut self) -> DatabaseResult<()> {
        self.ensure_available()?;
        self.begin()?;
        let result = self.connection().and_then(|conn| {
            let tx = conn.transaction()?;
            tx.execute_batch(schema::DROP_TABLE_QUERY)?;
            tx.commit()?;
            Ok(())
        });
        self.finish(result)?;
        self.close_database();
        self.status = DatabaseStatus::Unavailable;
        Ok(())
    }

    // ── Size accounting ─────────────────────────────────────────────────

    /// Length of the backing file in bytes, page and encryption overhead included.
    #[must_use]
    pub fn current_used_size(&self) -> u64 {
        files::database_file_size(&self.path)
    }

    /// Configured size budget in bytes.
    #[must_use]
    pub const fn max_size(&self) -> u64 {
        self.max_size
    }

    /// Bytes left before the budget is reached.
    #[must_use]
    pub fn available_size(&self) -> u64 {
        self.max_size.saturating_sub(self.current_used_size())
    }

    /// Returns `true` once the file is at or over its budget.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.current_used_size() >= self.max_size
    }

    /// Changes the size budget, re-applying the page cap when open.
    ///
    /// # Errors
    ///
    /// Returns an error if the page cap cannot be applied.
    pub fn set_max_size(&mut self, max_size: u64) -> DatabaseResult<()> {
        self.max_size = max_size;
        if let Some(conn) = self.conn.as_ref() {
            cipher::apply_max_size(conn, max_size)?;
        }
        Ok(())
    }

    // ── Introspection ───────────────────────────────────────────────────

    /// Database name (prefix + mini-app id).
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Schema version this handle opens with.
    #[must_use]
    pub const fn version(&self) -> u32 {
        self.version
    }

    /// Stored status of the handle.
    #[must_use]
    pub const fn status(&self) -> DatabaseStatus {
        self.status
    }

    /// Status with [`Full`](DatabaseStatus::Full) derived from the sizes.
    #[must_use]
    pub fn effective_status(&self) -> DatabaseStatus {
        if self.status == DatabaseStatus::Ready && self.is_full() {
            DatabaseStatus::Full
        } else {
            self.status
        }
    }

    /// Returns `true` if the connection is open.
    #[must_use]
    pub const fn is_open(&self) -> bool {
        self.conn.is_some()
    }

    /// Returns `true` if the backing file exists, marking the handle
    /// [`Unavailable`](DatabaseStatus::Unavailable) otherwise.
    ///
    /// A busy, failed or corrupted handle keeps its status.
    pub fn is_available(&mut self) -> bool {
        let available = files::database_exists(&self.path);
        if !available && self.status != DatabaseStatus::Busy && !self.status.is_terminal() {
            self.status = DatabaseStatus::Unavailable;
        }
        available
    }

    /// Returns `true` if the handle can serve operations without reopening.
    #[must_use]
    pub fn is_usable(&self) -> bool {
        self.conn.is_some()
            && matches!(self.status, DatabaseStatus::Ready | DatabaseStatus::Initiated)
            && files::database_exists(&self.path)
    }

    // ── Internal helpers ────────────────────────────────────────────────

    fn ensure_available(&mut self) -> DatabaseResult<()> {
        let status = self.status;
        match status {
            DatabaseStatus::Failed => Err(DatabaseError::Failed),
            DatabaseStatus::Corrupted => Err(DatabaseError::Corrupted),
            _ if self.is_available() => Ok(()),
            _ => Err(DatabaseError::Unavailable),
        }
    }

    fn connection(&mut self) -> DatabaseResult<&mut Connection> {
        self.conn.as_mut().ok_or(DatabaseError::Unavailable)
    }

    /// Marks the handle busy, refusing if it is busy, terminal or closed.
    fn begin(&mut self) -> DatabaseResult<()> {
        match self.status {
            DatabaseStatus::Busy => Err(DatabaseError::Busy),
            DatabaseStatus::Failed => Err(DatabaseError::Failed),
            DatabaseStatus::Corrupted => Err(DatabaseError::Corrupted),
            _ if self.conn.is_none() => Err(DatabaseError::Unavailable),
            _ => {
                self.status = DatabaseStatus::Busy;
                Ok(())
            }
        }
    }

    /// Leaves the busy state according to the outcome of an operation.
    fn finish<T>(&mut self, result: DatabaseResult<T>) -> DatabaseResult<T> {
        match result {
            Ok(value) => {
                self.status = DatabaseStatus::Ready;
                Ok(value)
            }
            Err(err) if err.is_corruption() => {
                log::warn!("secure database {} is corrupted: {err}", self.name);
                self.on_corrupted();
                Err(DatabaseError::Corrupted)
            }
            Err(err) if err.is_disk_full() => {
                self.status = DatabaseStatus::Ready;
                Err(DatabaseError::Full)
            }
            Err(err) if err.is_busy() => {
                self.status = DatabaseStatus::Ready;
                Err(DatabaseError::Busy)
            }
            Err(DatabaseError::Unavailable) => {
                self.status = DatabaseStatus::Unavailable;
                Err(DatabaseError::Unavailable)
            }
            Err(err) => {
                log::error!("secure database {} operation failed: {err}", self.name);
                self.status = DatabaseStatus::Failed;
                Err(err)
            }
        }
    }
}
