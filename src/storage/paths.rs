// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Path constants and utilities for the document storage layout.

use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use super::{StorageError, StorageResult};

/// Default base directory for document files.
pub const DATA_ROOT: &str = "/data";

/// File name of the record store inside the data directory.
pub const RECORDS_DB_FILE: &str = "records.redb";

/// Suffix of the recovery copy taken before a file is transformed.
pub const BACKUP_SUFFIX: &str = ".archive-bak";

/// Suffix of the staging file a transform writes before the rename.
pub const TEMP_SUFFIX: &str = ".archive-tmp";

/// Storage path utilities rooted at the data directory.
#[derive(Debug, Clone)]
pub struct StoragePaths {
    root: PathBuf,
}

impl Default for StoragePaths {
    fn default() -> Self {
        Self::new(DATA_ROOT)
    }
}

impl StoragePaths {
    /// Create a new StoragePaths with a custom root (useful for testing).
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Root directory for all document data.
    pub fn root(&self) -> &Path {
        &self.root
    }

    // ========== Document Paths ==========

    /// Resolve a logical document path against the root.
    ///
    /// A leading `/` is treated as the data root. `..` components and
    /// platform prefixes are rejected, and so is any existing component
    /// below the root that is a symbolic link, so the result never leaves
    /// the root.
    pub fn resolve(&self, logical: &str) -> StorageResult<PathBuf> {
        let trimmed = logical.trim();
        let mut parts = Vec::new();

        for component in Path::new(trimmed).components() {
            match component {
                Component::RootDir | Component::CurDir => {}
                Component::Normal(part) => parts.push(part),
                Component::ParentDir | Component::Prefix(_) => {
                    return Err(StorageError::InvalidPath(format!(
                        "{logical} escapes the data directory"
                    )));
                }
            }
        }

        if parts.is_empty() {
            return Err(StorageError::InvalidPath(format!(
                "{logical:?} does not name a file"
            )));
        }

        let mut resolved = self.root.clone();
        let mut exists = true;
        for part in parts {
            resolved.push(part);
            if exists {
                exists = ensure_not_symlink(&resolved, logical)?;
            }
        }
        Ok(resolved)
    }

    /// Sibling backup path for a resolved target.
    pub fn backup_path(target: &Path) -> PathBuf {
        with_suffix(target, BACKUP_SUFFIX)
    }

    /// Sibling temporary path for a resolved target.
    pub fn temp_path(target: &Path) -> PathBuf {
        with_suffix(target, TEMP_SUFFIX)
    }

    /// If `path` is a backup or temp file, return the target it belongs to.
    pub fn artifact_target(path: &Path) -> Option<PathBuf> {
        let name = path.file_name()?.to_str()?;
        [BACKUP_SUFFIX, TEMP_SUFFIX].iter().find_map(|suffix| {
            name.strip_suffix(suffix)
                .filter(|stem| !stem.is_empty())
                .map(|stem| path.with_file_name(stem))
        })
    }

    // ========== Record Store ==========

    /// Default location of the redb record store.
    pub fn records_db(&self) -> PathBuf {
        self.root.join(RECORDS_DB_FILE)
    }

    // ========== Audit Log Paths ==========

    /// Directory containing audit logs.
    pub fn audit_dir(&self) -> PathBuf {
        self.root.join("audit")
    }

    /// Directory for a specific date's audit logs.
    pub fn audit_date_dir(&self, date: &str) -> PathBuf {
        self.audit_dir().join(date)
    }

    /// Path to a daily audit events file (JSONL format).
    pub fn audit_events_file(&self, date: &str) -> PathBuf {
        self.audit_date_dir(date).join("events.jsonl")
    }
}

/// Fail if `path` is a symbolic link. Returns whether `path` exists.
fn ensure_not_symlink(path: &Path, logical: &str) -> StorageResult<bool> {
    match fs::symlink_metadata(path) {
        Ok(meta) if meta.file_type().is_symlink() => Err(StorageError::InvalidPath(format!(
            "{logical} passes through a symbolic link"
        ))),
        Ok(_) => Ok(true),
        Err(e)
            if matches!(
                e.kind(),
                io::ErrorKind::NotFound | io::ErrorKind::NotADirectory
            ) =>
        {
            Ok(false)
        }
        Err(e) => Err(e.into()),
    }
}

fn with_suffix(target: &Path, suffix: &str) -> PathBuf {
    let mut name: OsString = target.file_name().map(OsString::from).unwrap_or_default();
    name.push(suffix);
    target.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_paths_use_data_root() {
        let paths = StoragePaths::default();
        assert_eq!(paths.root(), Path::new("/data"));
        assert_eq!(paths.records_db(), PathBuf::from("/data/records.redb"));
    }

    #[test]
    fn resolve_joins_relative_paths() {
        let paths = StoragePaths::new("/tmp/test-data");
        assert_eq!(
            paths.resolve("cases/c-1/brief.pdf").unwrap(),
            PathBuf::from("/tmp/test-data/cases/c-1/brief.pdf")
        );
        assert_eq!(
            paths.resolve("./uploads/a.txt").unwrap(),
            PathBuf::from("/tmp/test-data/uploads/a.txt")
        );
    }

    #[test]
    fn resolve_treats_leading_slash_as_root() {
        let paths = StoragePaths::default();
        assert_eq!(
            paths.resolve("/uploads/2026/scan.png").unwrap(),
            PathBuf::from("/data/uploads/2026/scan.png")
        );
    }

    #[test]
    fn resolve_rejects_traversal() {
        let paths = StoragePaths::default();
        for logical in ["../etc/passwd", "uploads/../../secret", "a/b/../../../c"] {
            assert!(
                matches!(paths.resolve(logical), Err(StorageError::InvalidPath(_))),
                "{logical} should be rejected"
            );
        }
    }

    #[cfg(unix)]
    #[test]
    fn resolve_rejects_symlinks_below_root() {
        use std::os::unix::fs::symlink;

        let root = tempfile::TempDir::new().unwrap();
        let outside = tempfile::TempDir::new().unwrap();
        fs::write(outside.path().join("secret.txt"), b"outside").unwrap();
        fs::create_dir_all(root.path().join("cases")).unwrap();
        symlink(outside.path(), root.path().join("cases/link")).unwrap();
        symlink(
            outside.path().join("secret.txt"),
            root.path().join("cases/file-link.txt"),
        )
        .unwrap();

        let paths = StoragePaths::new(root.path());
        for logical in [
            "cases/link/secret.txt",
            "cases/link/new.txt",
            "cases/file-link.txt",
        ] {
            assert!(
                matches!(paths.resolve(logical), Err(StorageError::InvalidPath(_))),
                "{logical} should be rejected"
            );
        }
        assert_eq!(
            fs::read(outside.path().join("secret.txt")).unwrap(),
            b"outside"
        );

        // Plain directories and files that do not exist yet still resolve.
        assert!(paths.resolve("cases/c1/brief.pdf").is_ok());
    }

    #[test]
    fn resolve_rejects_empty_paths() {
        let paths = StoragePaths::default();
        for logical in ["", "   ", "/", "./"] {
            assert!(matches!(
                paths.resolve(logical),
                Err(StorageError::InvalidPath(_))
            ));
        }
    }

    #[test]
    fn sibling_paths_append_suffix() {
        let target = Path::new("/data/cases/brief.pdf");
        assert_eq!(
            StoragePaths::backup_path(target),
            PathBuf::from("/data/cases/brief.pdf.archive-bak")
        );
        assert_eq!(
            StoragePaths::temp_path(target),
            PathBuf::from("/data/cases/brief.pdf.archive-tmp")
        );
    }

    #[test]
    fn artifact_target_strips_suffix() {
        assert_eq!(
            StoragePaths::artifact_target(Path::new("/data/a.pdf.archive-bak")),
            Some(PathBuf::from("/data/a.pdf"))
        );
        assert_eq!(
            StoragePaths::artifact_target(Path::new("/data/a.pdf.archive-tmp")),
            Some(PathBuf::from("/data/a.pdf"))
        );
        assert_eq!(StoragePaths::artifact_target(Path::new("/data/a.pdf")), None);
        assert_eq!(
            StoragePaths::artifact_target(Path::new("/data/.archive-bak")),
            None
        );
    }

    #[test]
    fn audit_paths_are_correct() {
        let paths = StoragePaths::default();
        assert_eq!(paths.audit_dir(), PathBuf::from("/data/audit"));
        assert_eq!(
            paths.audit_events_file("2026-10-19"),
            PathBuf::from("/data/audit/2026-10-19/events.jsonl")
        );
    }
}
