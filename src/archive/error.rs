// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Error taxonomy for the archival engine.
//!
//! Everything except [`ArchiveError::Store`], [`ArchiveError::BatchInProgress`]
//! and [`ArchiveError::RecoveryConflict`] is caught per document by the
//! orchestrator and reported in the batch result through [`ArchiveError::code`].

use std::io;

use crate::storage::StorageError;

#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    /// Target file is absent.
    #[error("file not found: {0}")]
    NotFound(String),

    /// Logical path is empty or escapes the data directory.
    #[error("invalid document path: {0}")]
    InvalidPath(String),

    /// Authentication tag or checksum mismatch on decrypt.
    #[error("integrity check failed: {0}")]
    Integrity(String),

    /// I/O failure during copy, write or rename.
    #[error("file transform failed: {0}")]
    Transform(String),

    /// Metadata store update failed; files were restored from their backups.
    #[error("metadata persist failed: {0}")]
    Persist(String),

    /// Metadata store update failed after the files were irreversibly
    /// replaced. The record still describes the old state.
    #[error("record not updated after files were transformed: {0}")]
    PersistAfterTransform(String),

    /// Restoring a file from its backup failed; the backup is left on disk.
    #[error("rollback of {target} failed: {reason}")]
    RollbackFailed {
        target: String,
        artifact: Option<String>,
        reason: String,
    },

    /// Another batch for the same case is running.
    #[error("a batch is already in progress for case {0}")]
    BatchInProgress(String),

    /// The record store could not be queried.
    #[error("record store unavailable: {0}")]
    Store(String),

    /// Recovery and batches exclude each other: a backup is a leftover only
    /// when no transform owns it.
    #[error("recovery conflict: {0}")]
    RecoveryConflict(String),
}

pub type ArchiveResult<T> = Result<T, ArchiveError>;

impl ArchiveError {
    /// Stable machine-readable reason, as reported in batch failures.
    pub fn code(&self) -> &'static str {
        match self {
            ArchiveError::NotFound(_) => "file_not_found",
            ArchiveError::InvalidPath(_) => "invalid_path",
            ArchiveError::Integrity(_) => "integrity",
            ArchiveError::Transform(_) => "transform",
            ArchiveError::Persist(_) => "persist",
            ArchiveError::PersistAfterTransform(_) => "persist_after_transform",
            ArchiveError::RollbackFailed { .. } => "rollback_failed",
            ArchiveError::BatchInProgress(_) => "batch_in_progress",
            ArchiveError::Store(_) => "store_unavailable",
            ArchiveError::RecoveryConflict(_) => "recovery_conflict",
        }
    }

    /// Path of a file left behind for manual recovery, if any.
    pub fn recovery_artifact(&self) -> Option<&str> {
        match self {
            ArchiveError::RollbackFailed { artifact, .. } => artifact.as_deref(),
            _ => None,
        }
    }

    /// Map an I/O error raised while working on `context`.
    pub(crate) fn io(context: &str, err: io::Error) -> Self {
        if err.kind() == io::ErrorKind::NotFound {
            ArchiveError::NotFound(format!("{context}: {err}"))
        } else {
            ArchiveError::Transform(format!("{context}: {err}"))
        }
    }
}

impl From<StorageError> for ArchiveError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::NotFound(msg) => ArchiveError::NotFound(msg),
            StorageError::InvalidPath(msg) => ArchiveError::InvalidPath(msg),
            other => ArchiveError::Transform(other.to_string()),
        }
    }
}
