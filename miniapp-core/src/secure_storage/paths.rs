//! Database naming and directory housekeeping.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use miniapp_db::files;

/// Prefix of every mini-app database file name.
pub const DB_NAME_PREFIX: &str = "rakuten-";

/// Returns the database name for `mini_app_id`.
#[must_use]
pub fn database_name(mini_app_id: &str) -> String {
    format!("{DB_NAME_PREFIX}{mini_app_id}")
}

/// Directory holding the database files of every mini-app.
#[derive(Debug, Clone)]
pub struct StorageDirectory {
    root: PathBuf,
}

impl StorageDirectory {
    /// Wraps `root`. The directory is created lazily on first open.
    #[must_use]
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Returns the directory path.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the path of the database file for `mini_app_id`.
    #[must_use]
    pub fn database_path(&self, mini_app_id: &str) -> PathBuf {
        self.root.join(database_name(mini_app_id))
    }

    /// Returns the names of the database files present, companions excluded.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory exists but cannot be listed.
    pub fn database_names(&self) -> io::Result<Vec<String>> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err),
        };
        let mut names = Vec::new();
        for entry in entries {
            let entry = entry?;
            let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
                continue;
            };
            if name.starts_with(DB_NAME_PREFIX) && !files::is_companion_file(&name) {
                names.push(name);
            }
        }
        names.sort();
        Ok(names)
    }

    /// Deletes the database files of `mini_app_id`.
    ///
    /// Returns `true` if a database file existed.
    ///
    /// # Errors
    ///
    /// Returns an error if an existing file cannot be removed.
    pub fn clear_mini_app(&self, mini_app_id: &str) -> io::Result<bool> {
        files::remove_database_files(&self.database_path(mini_app_id))
    }

    /// Deletes every database whose name starts with [`DB_NAME_PREFIX`],
    /// together with its companion files. Other files are left alone.
    ///
    /// Returns the number of databases removed.
    ///
    /// # Errors
    ///
    /// Returns the first removal error; files after it are still attempted.
    pub fn clear_all(&self) -> io::Result<usize> {
        let mut removed = 0;
        let mut first_error = None;
        for name in self.database_names()? {
            match files::remove_database_files(&self.root.join(&name)) {
                Ok(true) => removed += 1,
                Ok(false) => {}
                Err(err) => {
                    log::warn!("failed to remove secure storage {name}: {err}");
                    first_error.get_or_insert(err);
                }
            }
        }
        first_error.map_or(Ok(removed), Err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_database_name_uses_prefix() {
        assert_eq!(database_name("abc-123"), "rakuten-abc-123");
    }

    #[test]
    fn test_clear_all_only_touches_prefixed_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        let storage = StorageDirectory::new(dir.path());
        fs::write(dir.path().join("rakuten-x"), b"x").expect("write x");
        fs::write(dir.path().join("rakuten-x-journal"), b"j").expect("write journal");
        fs::write(dir.path().join("rakuten-y"), b"y").expect("write y");
        fs::write(dir.path().join("other.db"), b"o").expect("write other");

        assert_eq!(
            storage.database_names().expect("list"),
            vec!["rakuten-x".to_string(), "rakuten-y".to_string()]
        );
        assert_eq!(storage.clear_all().expect("clear"), 2);
        assert!(!dir.path().join("rakuten-x").exists());
        assert!(!dir.path().join("rakuten-x-journal").exists());
        assert!(!dir.path().join("rakuten-y").exists());
        assert!(dir.path().join("other.db").exists());
    }

    #[test]
    fn test_clear_mini_app_leaves_others() {
        let dir = tempfile::tempdir().expect("tempdir");
        let storage = StorageDirectory::new(dir.path());
        fs::write(storage.database_path("x"), b"x").expect("write x");
        fs::write(storage.database_path("y"), b"y").expect("write y");

        assert!(storage.clear_mini_app("x").expect("clear"));
        assert!(!storage.clear_mini_app("x").expect("clear again"));
        assert!(storage.database_path("y").exists());
    }

    #[test]
    fn test_missing_directory_lists_nothing() {
        let dir = tempfile::tempdir().expect("tempdir");
        let storage = StorageDirectory::new(dir.path().join("absent"));
        assert!(storage.database_names().expect("list").is_empty());
        assert_eq!(storage.clear_all().expect("clear"), 0);
    }
}
