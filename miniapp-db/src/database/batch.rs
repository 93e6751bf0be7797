use rusqlite::{Connection, Transaction};

use crate::error::DatabaseResult;

/// Maximum number of records written or deleted per transaction.
pub const CHUNK_SIZE: usize = 100;

/// Outcome of a chunked bulk insert or delete.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchReport {
    /// Number of committed transactions, one per chunk.
    pub transactions: usize,
    /// Total rows touched across all chunks.
    pub rows_affected: usize,
    /// Whether the very last statement of the batch touched a row.
    ///
    /// Older hosts reported only this flag as the result of a bulk operation.
    pub last_row_applied: bool,
}

/// Applies `write` to each item, committing every [`CHUNK_SIZE`] items.
///
/// An error aborts the current chunk (rolled back on drop) while earlier
/// chunks stay committed.
pub(super) fn write_chunks<T, F>(
    conn: &mut Connection,
    items: &[T],
    mut write: F,
) -> DatabaseResult<BatchReport>
where
    F: FnMut(&Transaction<'_>, &T) -> rusqlite::Result<usize>,
{
    let mut report = BatchReport::default();
    for chunk in items.chunks(CHUNK_SIZE) {
        let tx = conn.transaction()?;
        for item in chunk {
            let changed = write(&tx, item)?;
            report.rows_affected += changed;
            report.last_row_applied = changed > 0;
        }
        tx.commit()?;
        report.transactions += 1;
    }
    Ok(report)
}
