// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Filesystem access for document files.
//!
//! All paths handed to callers are resolved through [`StoragePaths`], so a
//! logical path stored on a document record can never address a file outside
//! the data directory. Byte-level primitives (copy, rename, delete, append)
//! live here; the crash-safe replace built from them is in
//! [`crate::archive::atomic`].

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use super::StoragePaths;

/// Error type for storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid path: {0}")]
    InvalidPath(String),

    #[error("integrity violation: {0}")]
    IntegrityViolation(String),

    #[error("serialization error: {0}")]
    SerializationError(String),
}

impl From<io::Error> for StorageError {
    fn from(e: io::Error) -> Self {
        if e.kind() == io::ErrorKind::NotFound {
            StorageError::NotFound(e.to_string())
        } else {
            StorageError::Io(e)
        }
    }
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Document file storage rooted at the data directory.
#[derive(Debug, Clone)]
pub struct DocumentFs {
    paths: StoragePaths,
}

impl DocumentFs {
    pub fn new(paths: StoragePaths) -> Self {
        Self { paths }
    }

    /// Get the storage paths.
    pub fn paths(&self) -> &StoragePaths {
        &self.paths
    }

    /// Create the data and audit directories. Idempotent.
    pub fn initialize(&self) -> StorageResult<()> {
        fs::create_dir_all(self.paths.root())?;
        fs::create_dir_all(self.paths.audit_dir())?;
        Ok(())
    }

    /// Resolve a logical document path, enforcing containment.
    pub fn resolve(&self, logical: &str) -> StorageResult<PathBuf> {
        self.paths.resolve(logical)
    }

    /// Check that the data directory is writable and reads back what was written.
    pub fn health_check(&self) -> StorageResult<()> {
        let test_file = self.paths.root().join(".health_check");
        let test_data = b"health_check_data";

        fs::write(&test_file, test_data)?;
        let read_data = fs::read(&test_file)?;
        fs::remove_file(&test_file)?;

        if read_data != test_data {
            return Err(StorageError::IntegrityViolation(
                "Health check data mismatch".to_string(),
            ));
        }
        Ok(())
    }

    /// Check if a regular file exists at `path`.
    pub fn exists(&self, path: impl AsRef<Path>) -> bool {
        path.as_ref().is_file()
    }

    /// Open a file for reading.
    pub fn open_read(&self, path: impl AsRef<Path>) -> StorageResult<File> {
        Ok(File::open(path.as_ref())?)
    }

    /// Create a file that must not exist yet.
    pub fn create_new(&self, path: impl AsRef<Path>) -> StorageResult<File> {
        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path.as_ref())?;
        Ok(file)
    }

    /// Copy `from` to `to` and flush the copy to disk.
    pub fn copy_durable(&self, from: impl AsRef<Path>, to: impl AsRef<Path>) -> StorageResult<()> {
        fs::copy(from.as_ref(), to.as_ref())?;
        File::open(to.as_ref())?.sync_all()?;
        Ok(())
    }

    /// Rename `from` over `to`. Both must be on the same filesystem.
    pub fn rename(&self, from: impl AsRef<Path>, to: impl AsRef<Path>) -> StorageResult<()> {
        fs::rename(from.as_ref(), to.as_ref())?;
        Ok(())
    }

    /// Delete a file.
    pub fn delete(&self, path: impl AsRef<Path>) -> StorageResult<()> {
        fs::remove_file(path.as_ref())?;
        Ok(())
    }

    /// Delete a file if present. Returns whether something was removed.
    pub fn delete_if_exists(&self, path: impl AsRef<Path>) -> StorageResult<bool> {
        match fs::remove_file(path.as_ref()) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Read raw bytes from a file.
    pub fn read_raw(&self, path: impl AsRef<Path>) -> StorageResult<Vec<u8>> {
        Ok(fs::read(path.as_ref())?)
    }

    /// Write raw bytes to a file, creating parent directories.
    pub fn write_raw(&self, path: impl AsRef<Path>, data: &[u8]) -> StorageResult<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        file.write_all(data)?;
        file.flush()?;
        Ok(())
    }

    /// Append raw bytes to a file, creating it and its parents if needed.
    pub fn append_raw(&self, path: impl AsRef<Path>, data: &[u8]) -> StorageResult<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        file.write_all(data)?;
        file.flush()?;
        Ok(())
    }

    /// Recursively list every regular file below `dir`.
    pub fn walk_files(&self, dir: impl AsRef<Path>) -> StorageResult<Vec<PathBuf>> {
        let mut files = Vec::new();
        let mut pending = vec![dir.as_ref().to_path_buf()];

        while let Some(current) = pending.pop() {
            let entries = match fs::read_dir(&current) {
                Ok(entries) => entries,
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };
            for entry in entries {
                let entry = entry?;
                let file_type = entry.file_type()?;
                if file_type.is_dir() {
                    pending.push(entry.path());
                } else if file_type.is_file() {
                    files.push(entry.path());
                }
            }
        }
        files.sort();
        Ok(files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn test_fs() -> (TempDir, DocumentFs) {
        let temp = TempDir::new().unwrap();
        let fs = DocumentFs::new(StoragePaths::new(temp.path()));
        fs.initialize().expect("Failed to initialize test storage");
        (temp, fs)
    }

    #[test]
    fn initialize_creates_directories() {
        let (_temp, fs) = test_fs();
        assert!(fs.paths().root().exists());
        assert!(fs.paths().audit_dir().exists());
    }

    #[test]
    fn health_check_works() {
        let (_temp, fs) = test_fs();
        fs.health_check().expect("Health check should pass");
        assert!(!fs.exists(fs.paths().root().join(".health_check")));
    }

    #[test]
    fn write_and_read_raw() {
        let (_temp, fs) = test_fs();
        let data = b"raw test data with\nnewlines\nand bytes: \x00\x01\x02";
        let path = fs.resolve("cases/c1/raw.bin").unwrap();

        fs.write_raw(&path, data).unwrap();
        assert_eq!(fs.read_raw(&path).unwrap(), data);
    }

    #[test]
    fn append_raw_appends() {
        let (_temp, fs) = test_fs();
        let path = fs.paths().audit_events_file("2026-01-01");
        fs.append_raw(&path, b"one\n").unwrap();
        fs.append_raw(&path, b"two\n").unwrap();
        assert_eq!(fs.read_raw(&path).unwrap(), b"one\ntwo\n");
    }

    #[test]
    fn create_new_refuses_existing_file() {
        let (_temp, fs) = test_fs();
        let path = fs.resolve("a.txt").unwrap();
        fs.write_raw(&path, b"x").unwrap();
        assert!(matches!(fs.create_new(&path), Err(StorageError::Io(_))));
    }

    #[test]
    fn missing_file_maps_to_not_found() {
        let (_temp, fs) = test_fs();
        let path = fs.resolve("nope.txt").unwrap();
        assert!(!fs.exists(&path));
        assert!(matches!(fs.read_raw(&path), Err(StorageError::NotFound(_))));
        assert!(!fs.delete_if_exists(&path).unwrap());
    }

    #[test]
    fn copy_rename_delete() {
        let (_temp, fs) = test_fs();
        let a = fs.resolve("a.txt").unwrap();
        let b = fs.resolve("b.txt").unwrap();
        let c = fs.resolve("c.txt").unwrap();

        fs.write_raw(&a, b"content").unwrap();
        fs.copy_durable(&a, &b).unwrap();
        fs.rename(&b, &c).unwrap();

        assert!(fs.exists(&a));
        assert!(!fs.exists(&b));
        assert_eq!(fs.read_raw(&c).unwrap(), b"content");

        fs.delete(&c).unwrap();
        assert!(!fs.exists(&c));
    }

    #[test]
    fn walk_files_recurses() {
        let (_temp, fs) = test_fs();
        for logical in ["a.txt", "cases/c1/b.txt", "cases/c2/deep/c.txt"] {
            fs.write_raw(fs.resolve(logical).unwrap(), b"x").unwrap();
        }
        let files = fs.walk_files(fs.paths().root()).unwrap();
        assert_eq!(files.len(), 3);
        assert!(files.contains(&fs.resolve("cases/c2/deep/c.txt").unwrap()));
    }
}
