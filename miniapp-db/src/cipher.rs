//! `SQLCipher` encryption configuration.
//!
//! # Encryption flow
//!
//! Every mini-app database is encrypted at rest with `SQLCipher`. Once a
//! connection is keyed, page reads and writes are transparently decrypted and
//! encrypted by the pager, so the rest of the crate works with plain SQL.
//!
//! 1. **Open** -- the file is created or opened. Its content is opaque until
//!    the key is applied.
//!
//! 2. **Key** -- `PRAGMA key = "x'<hex>'"` passes the 32-byte raw key. The
//!    `x'...'` form tells `SQLCipher` to skip its passphrase KDF.
//!
//! 3. **Verify** -- a read from `sqlite_master` touches the first page. A wrong
//!    key or a damaged header fails here with `SQLITE_NOTADB`.
//!
//! 4. **Configure** -- rollback journal (`journal_mode = DELETE`) so committed
//!    data always lives in the main file and its length is a faithful size
//!    measurement, `synchronous = FULL` and `secure_delete = ON`.

use std::path::Path;

use rusqlite::types::{Type, Value};
use rusqlite::{Connection, OpenFlags, Row};
use zeroize::Zeroizing;

use super::error::{DatabaseError, DatabaseResult};

/// Opens a database, applies the encryption key, and configures the connection.
///
/// See the [module-level documentation](self) for the full encryption flow.
///
/// # Errors
///
/// Returns an error if the file cannot be opened, the key does not decrypt
/// the file, or the connection cannot be configured.
pub fn open_encrypted(path: &Path, key: &Zeroizing<[u8; 32]>) -> DatabaseResult<Connection> {
    let conn = open_connection(path)?;
    apply_key(&conn, key)?;
    configure_connection(&conn)?;
    Ok(conn)
}

/// Opens a `SQLite` connection with consistent flags.
fn open_connection(path: &Path) -> DatabaseResult<Connection> {
    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
        | OpenFlags::SQLITE_OPEN_CREATE
        | OpenFlags::SQLITE_OPEN_FULL_MUTEX;
    Ok(Connection::open_with_flags(path, flags)?)
}

/// Applies the `SQLCipher` key and verifies it against the first page.
fn apply_key(conn: &Connection, key: &Zeroizing<[u8; 32]>) -> DatabaseResult<()> {
    let key_hex = Zeroizing::new(hex::encode(key.as_ref()));
    let pragma = Zeroizing::new(format!("PRAGMA key = \"x'{}'\";", key_hex.as_str()));
    conn.execute_batch(&pragma)?;

    let cipher_version: String = conn.query_row("PRAGMA cipher_version;", [], |row| row.get(0))?;
    if cipher_version.trim().is_empty() {
        return Err(DatabaseError::Key("sqlcipher not available".to_string()));
    }

    let _tables: i64 =
        conn.query_row("SELECT count(*) FROM sqlite_master;", [], |row| row.get(0))?;
    Ok(())
}

/// Configures journaling, durability and secure deletion.
fn configure_connection(conn: &Connection) -> DatabaseResult<()> {
    let _mode: String =
        conn.pragma_update_and_check(None, "journal_mode", "DELETE", |row| row.get(0))?;
    conn.pragma_update(None, "synchronous", "FULL")?;
    conn.pragma_update(None, "secure_delete", true)?;
    Ok(())
}

/// Runs `PRAGMA integrity_check` and returns whether the database is healthy.
///
/// # Errors
///
/// Returns an error if the check cannot be executed.
pub fn integrity_check(conn: &Connection) -> DatabaseResult<bool> {
    let result: String = conn.query_row("PRAGMA integrity_check;", [], |row| row.get(0))?;
    Ok(result.trim() == "ok")
}

/// Returns the page size of the open database in bytes.
///
/// # Errors
///
/// Returns an error if the pragma cannot be read.
pub fn page_size(conn: &Connection) -> DatabaseResult<u64> {
    let size = conn.query_row("PRAGMA page_size;", [], integer_column)?;
    Ok(u64::try_from(size).unwrap_or(0))
}

/// Reads the first column as an integer.
///
/// `SQLCipher` answers some pragmas (`page_size` among them) with TEXT.
fn integer_column(row: &Row<'_>) -> rusqlite::Result<i64> {
    match row.get::<_, Value>(0)? {
        Value::Integer(value) => Ok(value),
        Value::Text(text) => text
            .trim()
            .parse()
            .map_err(|_| rusqlite::Error::InvalidColumnType(0, text, Type::Text)),
        other => Err(rusqlite::Error::InvalidColumnType(
            0,
            "pragma value".to_string(),
            other.data_type(),
        )),
    }
}

/// Caps the database at `max_bytes` by setting `max_page_count`.
///
/// Writes that would grow the file past the budget fail with `SQLITE_FULL`.
/// `SQLite` never lowers the cap below the current page count, so a budget
/// smaller than the file only blocks growth.
///
/// # Errors
///
/// Returns an error if the pragma cannot be applied.
pub fn apply_max_size(conn: &Connection, max_bytes: u64) -> DatabaseResult<()> {
    let page_size = page_size(conn)?.max(1);
    let max_pages = (max_bytes / page_size).max(1);
    let max_pages = i64::try_from(max_pages).unwrap_or(i64::MAX);
    let _applied =
        conn.pragma_update_and_check(None, "max_page_count", max_pages, integer_column)?;
    Ok(())
}
