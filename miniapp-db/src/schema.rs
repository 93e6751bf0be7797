use rusqlite::Connection;

use crate::error::DatabaseResult;

pub(crate) const INSERT_QUERY: &str =
    "INSERT OR REPLACE INTO MiniAppCache (first, second) VALUES (?1, ?2)";
pub(crate) const GET_ITEM_QUERY: &str = "SELECT second FROM MiniAppCache WHERE first = ?1";
pub(crate) const GET_ALL_ITEMS_QUERY: &str = "SELECT first, second FROM MiniAppCache";
pub(crate) const DELETE_ITEM_QUERY: &str = "DELETE FROM MiniAppCache WHERE first = ?1";
pub(crate) const DROP_TABLE_QUERY: &str = "DROP TABLE IF EXISTS MiniAppCache";

const CREATE_TABLE_QUERY: &str = "CREATE TABLE IF NOT EXISTS MiniAppCache (
    first   TEXT PRIMARY KEY,
    second  TEXT
)";

/// What [`ensure_schema`] had to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SchemaChange {
    /// Fresh database; the table was created.
    Created,
    /// Version mismatch; the table was dropped and recreated.
    Recreated,
    /// Schema already at the requested version.
    Unchanged,
}

/// Creates the table on first open and drops/recreates it on a version change.
///
/// The migration policy is destructive: any version mismatch loses the stored
/// records.
pub(crate) fn ensure_schema(conn: &Connection, version: u32) -> DatabaseResult<SchemaChange> {
    let stored: i64 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    let change = match stored {
        0 => {
            conn.execute_batch(CREATE_TABLE_QUERY)?;
            SchemaChange::Created
        }
        v if v == i64::from(version) => {
            conn.execute_batch(CREATE_TABLE_QUERY)?;
            SchemaChange::Unchanged
        }
        _ => {
            conn.execute_batch(DROP_TABLE_QUERY)?;
            conn.execute_batch(CREATE_TABLE_QUERY)?;
            SchemaChange::Recreated
        }
    };
    conn.pragma_update(None, "user_version", i64::from(version))?;
    Ok(change)
}

/// Returns `true` if the key-value table exists.
#[cfg(test)]
fn table_exists(conn: &Connection) -> DatabaseResult<bool> {
    let count: i64 = conn.query_row(
        "SELECT count(*) FROM sqlite_master WHERE type = 'table' AND name = 'MiniAppCache'",
        [],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}
