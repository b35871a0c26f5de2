//! Well-known on-disk layout under a library root.
//!
//! Adapted from the donor's per-user application data resolver
//! (`libs::data_storage::DataStorage`), but scoped to a single library root
//! rather than the platform's user-data directory: every path here is a
//! fixed child of whatever root the caller passed to `open_library`.

use crate::error::Result;
use chrono::Utc;
use std::fs;
use std::path::{Path, PathBuf};

pub const TS_FOLDER_NAME: &str = ".TagStudio";
pub const SQL_FILENAME: &str = "ts_library.sqlite";
pub const JSON_FILENAME: &str = "ts_library.json";
pub const IGNORE_FILENAME: &str = ".ts_ignore";
pub const BACKUP_FOLDER_NAME: &str = "backups";

#[derive(Debug, Clone)]
pub struct LibraryPaths {
    root: PathBuf,
}

impl LibraryPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn ts_folder(&self) -> PathBuf {
        self.root.join(TS_FOLDER_NAME)
    }

    pub fn sqlite_file(&self) -> PathBuf {
        self.ts_folder().join(SQL_FILENAME)
    }

    pub fn json_file(&self) -> PathBuf {
        self.ts_folder().join(JSON_FILENAME)
    }

    pub fn ignore_file(&self) -> PathBuf {
        self.ts_folder().join(IGNORE_FILENAME)
    }

    pub fn backups_folder(&self) -> PathBuf {
        self.ts_folder().join(BACKUP_FOLDER_NAME)
    }

    /// Ensures `<root>/.TagStudio` exists, creating it (and `root`) if
    /// necessary.
    pub fn ensure_ts_folder(&self) -> Result<PathBuf> {
        let folder = self.ts_folder();
        if !folder.exists() {
            fs::create_dir_all(&folder)?;
        }
        Ok(folder)
    }

    /// Copies the sqlite file into `backups/` with a UTC-stamped filename,
    /// returning the backup's path. No-op (returns `Ok(None)`) if the
    /// primary file does not yet exist.
    pub fn backup_now(&self) -> Result<Option<PathBuf>> {
        let source = self.sqlite_file();
        if !source.exists() {
            return Ok(None);
        }
        let dir = self.backups_folder();
        fs::create_dir_all(&dir)?;
        let stamp = Utc::now().format("%Y_%m_%d_%H%M%S");
        let dest = dir.join(format!("ts_library_backup_{stamp}.sqlite"));
        fs::copy(&source, &dest)?;
        Ok(Some(dest))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn layout_paths_are_fixed_children_of_root() {
        let paths = LibraryPaths::new("/lib/root");
        assert_eq!(paths.sqlite_file(), Path::new("/lib/root/.TagStudio/ts_library.sqlite"));
        assert_eq!(paths.ignore_file(), Path::new("/lib/root/.TagStudio/.ts_ignore"));
    }

    #[test]
    fn backup_now_is_noop_without_existing_file() {
        let dir = tempdir().unwrap();
        let paths = LibraryPaths::new(dir.path());
        assert!(paths.backup_now().unwrap().is_none());
    }

    #[test]
    fn backup_now_copies_existing_file() {
        let dir = tempdir().unwrap();
        let paths = LibraryPaths::new(dir.path());
        paths.ensure_ts_folder().unwrap();
        fs::write(paths.sqlite_file(), b"fake db").unwrap();
        let backup = paths.backup_now().unwrap().unwrap();
        assert!(backup.exists());
        assert!(backup.starts_with(paths.backups_folder()));
    }
}
