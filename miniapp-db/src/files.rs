//! Helpers for the on-disk files backing a database.

use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Suffixes of the companion files `SQLite` may leave next to a database.
pub const COMPANION_SUFFIXES: [&str; 3] = ["-journal", "-wal", "-shm"];

/// Returns `true` if `file_name` is a journal, WAL or shared-memory file.
#[must_use]
pub fn is_companion_file(file_name: &str) -> bool {
    COMPANION_SUFFIXES
        .iter()
        .any(|suffix| file_name.ends_with(suffix))
}

/// Returns `true` if the main database file exists.
#[must_use]
pub fn database_exists(path: &Path) -> bool {
    path.is_file()
}

/// Returns the length of the main database file, or `0` when it is absent.
#[must_use]
pub fn database_file_size(path: &Path) -> u64 {
    fs::metadata(path).map(|meta| meta.len()).unwrap_or(0)
}

/// Deletes a database file together with its journal, WAL and shared-memory files.
///
/// Returns `true` if the main file existed and was removed. Missing companion
/// files are ignored.
///
/// # Errors
///
/// Returns an error if an existing file cannot be removed.
pub fn remove_database_files(path: &Path) -> io::Result<bool> {
    let removed = remove_if_exists(path)?;
    for suffix in COMPANION_SUFFIXES {
        remove_if_exists(&companion_path(path, suffix))?;
    }
    Ok(removed)
}

fn companion_path(path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}

fn remove_if_exists(path: &Path) -> io::Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(err) => Err(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_companion_file() {
        assert!(is_companion_file("rakuten-app-journal"));
        assert!(is_companion_file("rakuten-app-wal"));
        assert!(is_companion_file("rakuten-app-shm"));
        assert!(!is_companion_file("rakuten-app"));
        assert!(!is_companion_file("rakuten-journal-app"));
    }

    #[test]
    fn test_remove_database_files_removes_companions() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db = dir.path().join("rakuten-app");
        fs::write(&db, b"db").expect("write db");
        fs::write(companion_path(&db, "-journal"), b"j").expect("write journal");

        assert!(remove_database_files(&db).expect("remove"));
        assert!(!db.exists());
        assert!(!companion_path(&db, "-journal").exists());
    }

    #[test]
    fn test_remove_missing_database_is_noop() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db = dir.path().join("rakuten-missing");
        assert!(!remove_database_files(&db).expect("remove"));
        assert_eq!(database_file_size(&db), 0);
        assert!(!database_exists(&db));
    }
}
