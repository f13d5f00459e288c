// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Crash-safe in-place file transforms.
//!
//! A transform walks an explicit state machine:
//!
//! ```text
//! BackedUp ──transform──▶ Transformed ──commit──────▶ (backup deleted)
//!    │                        └──────roll_back─────▶ (target restored)
//!    └── failure ─────────────────────────────────▶ (target restored)
//! ```
//!
//! The target is only ever replaced by a rename of a fully written and
//! synced sibling temp file, so the canonical path never shows a partial
//! write. The sibling backup is the recovery point; it is removed on commit
//! and survives only when a restore fails or the process dies mid-flight.
//! [`recover`] and [`scan_recovery_artifacts`] deal with those leftovers.

use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use utoipa::ToSchema;

use super::error::{ArchiveError, ArchiveResult};
use crate::storage::{DocumentFs, StoragePaths};

/// When the backup of a transformed file is released.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackupRetention {
    /// Keep the backup until [`Transformed::commit`] or [`Transformed::roll_back`].
    UntilCommitted,
    /// Delete the backup as soon as the rename has happened.
    DeleteOnRename,
}

/// A target whose recovery copy is on disk and which is still untouched.
#[must_use = "a backed-up target must be transformed or rolled back"]
#[derive(Debug)]
pub struct BackedUp<'a> {
    fs: &'a DocumentFs,
    target: PathBuf,
    backup: PathBuf,
}

/// A target whose new content is in place.
///
/// Dropping this without calling [`commit`](Self::commit) or
/// [`roll_back`](Self::roll_back) leaves any retained backup on disk.
#[must_use = "a transformed target must be committed or rolled back"]
#[derive(Debug)]
pub struct Transformed<'a> {
    fs: &'a DocumentFs,
    target: PathBuf,
    backup: Option<PathBuf>,
}

impl<'a> BackedUp<'a> {
    /// Copy `target` to its sibling backup.
    ///
    /// Fails with `NotFound` if the target is absent, and refuses to run
    /// over a backup left by an earlier interrupted transform.
    pub fn begin(fs: &'a DocumentFs, target: &Path) -> ArchiveResult<Self> {
        if !fs.exists(target) {
            return Err(ArchiveError::NotFound(target.display().to_string()));
        }

        let backup = StoragePaths::backup_path(target);
        if fs.exists(&backup) {
            return Err(ArchiveError::Transform(format!(
                "stale backup {} present; run recovery first",
                backup.display()
            )));
        }

        if let Err(e) = fs.copy_durable(target, &backup) {
            // A partial copy is worthless as a recovery point.
            if let Err(cleanup) = fs.delete_if_exists(&backup) {
                tracing::warn!(
                    backup = %backup.display(),
                    error = %cleanup,
                    "Failed to remove partial backup"
                );
            }
            return Err(ArchiveError::Transform(format!(
                "backing up {}: {e}",
                target.display()
            )));
        }

        Ok(Self {
            fs,
            target: target.to_path_buf(),
            backup,
        })
    }

    pub fn target(&self) -> &Path {
        &self.target
    }

    /// Run `f` from the target into a temp file, then rename it over the target.
    ///
    /// On any failure the temp file is removed, the target is restored from
    /// the backup and the original error is returned. If the restore itself
    /// fails the backup stays on disk and `RollbackFailed` names it.
    pub fn transform<T, F>(
        self,
        retention: BackupRetention,
        f: F,
    ) -> ArchiveResult<(Transformed<'a>, T)>
    where
        F: FnOnce(&mut dyn Read, &mut dyn Write) -> ArchiveResult<T>,
    {
        let temp = StoragePaths::temp_path(&self.target);

        let outcome = self
            .write_temp(&temp, f)
            .and_then(|value| {
                self.fs.rename(&temp, &self.target).map_err(|e| {
                    ArchiveError::Transform(format!("renaming over {}: {e}", self.target.display()))
                })?;
                Ok(value)
            });

        let value = match outcome {
            Ok(value) => value,
            Err(err) => {
                if let Err(e) = self.fs.delete_if_exists(&temp) {
                    tracing::warn!(
                        temp = %temp.display(),
                        error = %e,
                        "Failed to remove temp file after transform failure"
                    );
                }
                return Err(self.restore_after(err));
            }
        };

        let backup = match retention {
            BackupRetention::UntilCommitted => Some(self.backup),
            BackupRetention::DeleteOnRename => match self.fs.delete(&self.backup) {
                Ok(()) => None,
                Err(e) => {
                    tracing::warn!(
                        backup = %self.backup.display(),
                        error = %e,
                        "Failed to delete backup after rename; keeping it until commit"
                    );
                    Some(self.backup)
                }
            },
        };

        Ok((
            Transformed {
                fs: self.fs,
                target: self.target,
                backup,
            },
            value,
        ))
    }

    /// Put the backup back at the target and end the transform.
    pub fn roll_back(self) -> ArchiveResult<()> {
        restore(self.fs, &self.target, &self.backup)
    }

    fn write_temp<T, F>(&self, temp: &Path, f: F) -> ArchiveResult<T>
    where
        F: FnOnce(&mut dyn Read, &mut dyn Write) -> ArchiveResult<T>,
    {
        // Left over from a crash; it never holds anything worth keeping.
        self.fs.delete_if_exists(temp)?;

        let mut input = BufReader::new(self.fs.open_read(&self.target)?);
        let mut output = BufWriter::new(self.fs.create_new(temp)?);

        let value = f(&mut input, &mut output)?;

        let file = output
            .into_inner()
            .map_err(|e| ArchiveError::io("flushing temp file", e.into_error()))?;
        file.sync_all()
            .map_err(|e| ArchiveError::io("syncing temp file", e))?;
        Ok(value)
    }

    fn restore_after(self, original: ArchiveError) -> ArchiveError {
        match restore(self.fs, &self.target, &self.backup) {
            Ok(()) => original,
            Err(ArchiveError::RollbackFailed {
                target,
                artifact,
                reason,
            }) => ArchiveError::RollbackFailed {
                target,
                artifact,
                reason: format!("{original}; {reason}"),
            },
            Err(other) => other,
        }
    }
}

impl Transformed<'_> {
    pub fn target(&self) -> &Path {
        &self.target
    }

    /// Whether the pre-transform content can still be restored.
    pub fn has_backup(&self) -> bool {
        self.backup.is_some()
    }

    pub fn backup_path(&self) -> Option<&Path> {
        self.backup.as_deref()
    }

    /// Release the backup. The new content stays.
    pub fn commit(self) -> ArchiveResult<()> {
        match &self.backup {
            Some(backup) => self.fs.delete_if_exists(backup).map(|_| ()).map_err(|e| {
                ArchiveError::Transform(format!("deleting backup {}: {e}", backup.display()))
            }),
            None => Ok(()),
        }
    }

    /// Restore the pre-transform content from the backup.
    pub fn roll_back(self) -> ArchiveResult<()> {
        match &self.backup {
            Some(backup) => restore(self.fs, &self.target, backup),
            None => Err(ArchiveError::RollbackFailed {
                target: self.target.display().to_string(),
                artifact: None,
                reason: "no backup was retained".to_string(),
            }),
        }
    }
}

fn restore(fs: &DocumentFs, target: &Path, backup: &Path) -> ArchiveResult<()> {
    fs.rename(backup, target).map_err(|e| {
        tracing::error!(
            target_file = %target.display(),
            backup = %backup.display(),
            error = %e,
            "Failed to restore target from backup; backup left for manual recovery"
        );
        ArchiveError::RollbackFailed {
            target: target.display().to_string(),
            artifact: Some(backup.display().to_string()),
            reason: e.to_string(),
        }
    })
}

/// Back up, transform and rename in one call.
pub fn apply<'a, T, F>(
    fs: &'a DocumentFs,
    target: &Path,
    retention: BackupRetention,
    f: F,
) -> ArchiveResult<(Transformed<'a>, T)>
where
    F: FnOnce(&mut dyn Read, &mut dyn Write) -> ArchiveResult<T>,
{
    BackedUp::begin(fs, target)?.transform(retention, f)
}

// =============================================================================
// Recovery
// =============================================================================

/// What [`recover`] did for a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryOutcome {
    /// The target was restored from its backup.
    Restored,
    /// Only a stale temp file was found and removed.
    CleanedTemp,
    NothingToDo,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    Backup,
    Temp,
}

/// A backup or temp file found on disk outside any running transform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RecoveryArtifact {
    #[schema(value_type = String)]
    pub target: PathBuf,
    #[schema(value_type = String)]
    pub artifact: PathBuf,
    pub kind: ArtifactKind,
}

/// Return `target` to its pre-transform state after an interrupted run.
///
/// A stale temp file is deleted; a backup is renamed over the target. Only
/// call this for targets whose transform is known not to have been recorded
/// in the record store.
pub fn recover(fs: &DocumentFs, target: &Path) -> ArchiveResult<RecoveryOutcome> {
    let temp = StoragePaths::temp_path(target);
    let backup = StoragePaths::backup_path(target);

    let cleaned_temp = fs.delete_if_exists(&temp)?;

    if fs.exists(&backup) {
        restore(fs, target, &backup)?;
        tracing::info!(target_file = %target.display(), "Restored target from backup");
        return Ok(RecoveryOutcome::Restored);
    }

    Ok(if cleaned_temp {
        RecoveryOutcome::CleanedTemp
    } else {
        RecoveryOutcome::NothingToDo
    })
}

/// List every backup and temp file under the data directory.
pub fn scan_recovery_artifacts(fs: &DocumentFs) -> ArchiveResult<Vec<RecoveryArtifact>> {
    let files = fs.walk_files(fs.paths().root())?;
    Ok(files
        .into_iter()
        .filter_map(|artifact| {
            let target = StoragePaths::artifact_target(&artifact)?;
            let kind = if StoragePaths::backup_path(&target) == artifact {
                ArtifactKind::Backup
            } else {
                ArtifactKind::Temp
            };
            Some(RecoveryArtifact {
                target,
                artifact,
                kind,
            })
        })
        .collect())
}
