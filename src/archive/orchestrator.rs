// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Case-wide archive and un-archive.
//!
//! ## Per-document unit of work
//!
//! 1. Transform the primary file through [`atomic::apply`].
//! 2. Transform each eligible reference file the same way. A reference
//!    failure leaves that entry untouched and does not fail the document.
//! 3. Persist the new state through [`MetadataStore::persist`].
//! 4. Commit every staged transform, or roll them back if the persist failed
//!    and every one of them still has its backup.
//!
//! Documents are processed sequentially. Any error in a document becomes a
//! [`BatchFailure`](super::BatchFailure) entry and the batch moves on; only a
//! failed candidate query or a concurrent batch on the same case fails the
//! whole call.
//!
//! ## Recovery
//!
//! Listing and restoring leftovers of interrupted transforms goes through
//! the archiver too. Recovery and batches exclude each other: while a batch
//! runs, its retained backups are live recovery points, not leftovers.

use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use serde_json::json;

use super::atomic::{self, BackupRetention, RecoveryArtifact, RecoveryOutcome, Transformed};
use super::batch::BatchResult;
use super::envelope::{EnvelopeCipher, EnvelopeMetadata};
use super::error::{ArchiveError, ArchiveResult};
use super::metadata_store::MetadataStore;
use crate::models::{Document, DocumentFilter, ReferenceEntry};
use crate::storage::{AuditEvent, AuditEventType, AuditRepository, DocumentFs};

/// Which way a batch moves its documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Encrypt,
    Decrypt,
}

impl Direction {
    fn filter(self) -> DocumentFilter {
        match self {
            Direction::Encrypt => DocumentFilter::archive_candidates(),
            Direction::Decrypt => DocumentFilter::unarchive_candidates(),
        }
    }

    fn document_event(self) -> AuditEventType {
        match self {
            Direction::Encrypt => AuditEventType::DocumentEncrypted,
            Direction::Decrypt => AuditEventType::DocumentDecrypted,
        }
    }

    fn case_event(self) -> AuditEventType {
        match self {
            Direction::Encrypt => AuditEventType::CaseArchived,
            Direction::Decrypt => AuditEventType::CaseUnarchived,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Encrypt => f.write_str("encrypt"),
            Direction::Decrypt => f.write_str("decrypt"),
        }
    }
}

/// Drives whole cases through the envelope cipher and atomic transforms.
pub struct CaseArchiver {
    fs: DocumentFs,
    cipher: Arc<EnvelopeCipher>,
    metadata: MetadataStore,
    decrypt_rollback: bool,
    in_flight: Mutex<InFlight>,
}

/// Work currently holding files of the data directory.
#[derive(Debug, Default)]
struct InFlight {
    cases: HashSet<String>,
    recovering: bool,
}

impl CaseArchiver {
    pub fn new(fs: DocumentFs, cipher: Arc<EnvelopeCipher>, metadata: MetadataStore) -> Self {
        Self {
            fs,
            cipher,
            metadata,
            decrypt_rollback: false,
            in_flight: Mutex::new(InFlight::default()),
        }
    }

    /// Keep ciphertext backups during un-archive until the record is updated,
    /// and restore them if the update fails.
    pub fn with_decrypt_rollback(mut self, enabled: bool) -> Self {
        self.decrypt_rollback = enabled;
        self
    }

    pub fn storage(&self) -> &DocumentFs {
        &self.fs
    }

    /// Encrypt every plaintext document of a case.
    pub fn encrypt_case(&self, case_id: &str, actor_id: &str) -> ArchiveResult<BatchResult> {
        self.run(Direction::Encrypt, case_id, actor_id)
    }

    /// Decrypt every encrypted document of a case.
    pub fn decrypt_case(&self, case_id: &str, actor_id: &str) -> ArchiveResult<BatchResult> {
        self.run(Direction::Decrypt, case_id, actor_id)
    }

    /// Backup and temp files left by interrupted transforms.
    pub fn recovery_artifacts(&self) -> ArchiveResult<Vec<RecoveryArtifact>> {
        let _guard = RecoveryGuard::claim(&self.in_flight)?;
        atomic::scan_recovery_artifacts(&self.fs)
    }

    /// Put one logical path back into its pre-transform state.
    ///
    /// Refused with `RecoveryConflict` while any batch is running.
    pub fn recover_target(&self, logical: &str) -> ArchiveResult<RecoveryOutcome> {
        let target = self.fs.resolve(logical)?;
        let _guard = RecoveryGuard::claim(&self.in_flight)?;
        atomic::recover(&self.fs, &target)
    }

    pub fn run(
        &self,
        direction: Direction,
        case_id: &str,
        actor_id: &str,
    ) -> ArchiveResult<BatchResult> {
        let _guard = CaseGuard::claim(&self.in_flight, case_id)?;

        let documents = self.metadata.candidates(case_id, &direction.filter())?;
        let mut result = BatchResult::new();

        tracing::info!(
            case_id = %case_id,
            direction = %direction,
            candidates = documents.len(),
            "Starting case batch"
        );

        for document in &documents {
            let outcome = match direction {
                Direction::Encrypt => self.encrypt_document(document, actor_id),
                Direction::Decrypt => self.decrypt_document(document, actor_id),
            };

            match outcome {
                Ok(()) => {
                    tracing::debug!(
                        case_id = %case_id,
                        document_id = %document.document_id,
                        direction = %direction,
                        "Document transitioned"
                    );
                    self.audit(
                        AuditEvent::new(direction.document_event())
                            .with_actor(actor_id)
                            .with_case(case_id)
                            .with_document(&document.document_id),
                    );
                    result.record_success(&document.document_id);
                }
                Err(e) => {
                    tracing::warn!(
                        case_id = %case_id,
                        document_id = %document.document_id,
                        direction = %direction,
                        reason = e.code(),
                        error = %e,
                        "Document transition failed"
                    );
                    self.audit(
                        AuditEvent::new(AuditEventType::DocumentTransformFailed)
                            .with_actor(actor_id)
                            .with_case(case_id)
                            .with_document(&document.document_id)
                            .with_details(json!({
                                "direction": direction.to_string(),
                                "reason": e.code(),
                                "recoveryArtifact": e.recovery_artifact(),
                            }))
                            .failed(e.to_string()),
                    );
                    result.record_failure(&document.document_id, &e);
                }
            }
        }

        tracing::info!(
            case_id = %case_id,
            direction = %direction,
            total = result.total_count,
            succeeded = result.succeeded_count(),
            failed = result.failed_count(),
            "Case batch finished"
        );
        self.audit(
            AuditEvent::new(direction.case_event())
                .with_actor(actor_id)
                .with_case(case_id)
                .with_details(json!({
                    "totalCount": result.total_count,
                    "succeeded": result.succeeded_count(),
                    "failed": result.failed_count(),
                })),
        );

        Ok(result)
    }

    // =========================================================================
    // Encrypt
    // =========================================================================

    fn encrypt_document(&self, document: &Document, actor_id: &str) -> ArchiveResult<()> {
        let logical = primary_path(document)?;
        let (primary, metadata) = self.encrypt_file(logical)?;
        let metadata = metadata.stamped(logical, actor_id);
        let mut staged = vec![primary];

        let mut references = Vec::with_capacity(document.doc_reference.len());
        for entry in &document.doc_reference {
            if entry.is_encrypted() {
                references.push(entry.clone());
                continue;
            }
            let path = entry.path();
            match self.encrypt_file(path) {
                Ok((transformed, reference_metadata)) => {
                    staged.push(transformed);
                    references.push(ReferenceEntry::encrypted(
                        path,
                        reference_metadata.stamped(path, actor_id),
                    ));
                }
                Err(e) => {
                    self.reference_skipped(document, path, actor_id, &e);
                    references.push(entry.clone());
                }
            }
        }

        let persisted = self
            .metadata
            .persist(&document.document_id, Some(metadata), references, actor_id);
        self.commit_or_roll_back(&document.document_id, staged, persisted)
    }

    fn encrypt_file(&self, logical: &str) -> ArchiveResult<(Transformed<'_>, EnvelopeMetadata)> {
        let target = self.fs.resolve(logical)?;
        atomic::apply(
            &self.fs,
            &target,
            BackupRetention::UntilCommitted,
            |input, output| self.cipher.encrypt(input, output),
        )
    }

    // =========================================================================
    // Decrypt
    // =========================================================================

    fn decrypt_document(&self, document: &Document, actor_id: &str) -> ArchiveResult<()> {
        let logical = primary_path(document)?;
        let metadata = document.encryption_metadata.as_ref().ok_or_else(|| {
            ArchiveError::Integrity(format!(
                "document {} is flagged encrypted but has no metadata",
                document.document_id
            ))
        })?;

        let primary = self.decrypt_file(logical, metadata)?;
        let mut staged = vec![primary];

        let mut references = Vec::with_capacity(document.doc_reference.len());
        for entry in &document.doc_reference {
            let ReferenceEntry::Structured(structured) = entry else {
                references.push(entry.clone());
                continue;
            };
            if !structured.is_encrypted {
                references.push(entry.clone());
                continue;
            }

            let outcome = match &structured.metadata {
                Some(reference_metadata) => self.decrypt_file(&structured.path, reference_metadata),
                None => Err(ArchiveError::Integrity(format!(
                    "reference {} is flagged encrypted but has no metadata",
                    structured.path
                ))),
            };
            match outcome {
                Ok(transformed) => {
                    staged.push(transformed);
                    references.push(ReferenceEntry::Plain(structured.path.clone()));
                }
                Err(e) => {
                    self.reference_skipped(document, &structured.path, actor_id, &e);
                    references.push(entry.clone());
                }
            }
        }

        let persisted = self
            .metadata
            .persist(&document.document_id, None, references, actor_id);
        self.commit_or_roll_back(&document.document_id, staged, persisted)
    }

    fn decrypt_file(
        &self,
        logical: &str,
        metadata: &EnvelopeMetadata,
    ) -> ArchiveResult<Transformed<'_>> {
        let target = self.fs.resolve(logical)?;
        let retention = if self.decrypt_rollback {
            BackupRetention::UntilCommitted
        } else {
            BackupRetention::DeleteOnRename
        };
        let (transformed, ()) = atomic::apply(&self.fs, &target, retention, |input, output| {
            self.cipher.decrypt(input, output, metadata)
        })?;
        Ok(transformed)
    }

    // =========================================================================
    // Commit point
    // =========================================================================

    fn commit_or_roll_back(
        &self,
        document_id: &str,
        staged: Vec<Transformed<'_>>,
        persisted: ArchiveResult<()>,
    ) -> ArchiveResult<()> {
        let persist_error = match persisted {
            Ok(()) => {
                for transformed in staged {
                    self.commit_staged(document_id, transformed);
                }
                return Ok(());
            }
            Err(e) => e,
        };

        if !staged.iter().all(Transformed::has_backup) {
            // Some file cannot be put back; keep every file in its new state.
            for transformed in staged {
                self.commit_staged(document_id, transformed);
            }
            return Err(ArchiveError::PersistAfterTransform(persist_error.to_string()));
        }

        tracing::warn!(
            document_id = %document_id,
            files = staged.len(),
            error = %persist_error,
            "Record update failed; rolling back file transforms"
        );
        let mut rollback_error = None;
        for transformed in staged.into_iter().rev() {
            if let Err(e) = transformed.roll_back() {
                rollback_error.get_or_insert(e);
            }
        }
        Err(rollback_error.unwrap_or(persist_error))
    }

    fn commit_staged(&self, document_id: &str, transformed: Transformed<'_>) {
        let backup = transformed.backup_path().map(|p| p.display().to_string());
        if let Err(e) = transformed.commit() {
            tracing::warn!(
                document_id = %document_id,
                backup = ?backup,
                error = %e,
                "Backup could not be removed after commit; left as recovery artifact"
            );
            self.audit(
                AuditEvent::new(AuditEventType::RecoveryArtifactFound)
                    .with_document(document_id)
                    .with_details(json!({ "artifact": backup }))
                    .failed(e.to_string()),
            );
        }
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    fn reference_skipped(&self, document: &Document, path: &str, actor_id: &str, e: &ArchiveError) {
        tracing::warn!(
            case_id = %document.case_id,
            document_id = %document.document_id,
            reference = %path,
            reason = e.code(),
            error = %e,
            "Reference file left unchanged"
        );
        self.audit(
            AuditEvent::new(AuditEventType::ReferenceSkipped)
                .with_actor(actor_id)
                .with_case(&document.case_id)
                .with_document(&document.document_id)
                .with_details(json!({ "path": path, "reason": e.code() }))
                .failed(e.to_string()),
        );
    }

    fn audit(&self, event: AuditEvent) {
        AuditRepository::new(&self.fs).record(event);
    }
}

fn primary_path(document: &Document) -> ArchiveResult<&str> {
    document.file_path.as_deref().ok_or_else(|| {
        ArchiveError::InvalidPath(format!("document {} has no file path", document.document_id))
    })
}

/// Marks a case as busy for the lifetime of a batch.
struct CaseGuard<'a> {
    in_flight: &'a Mutex<InFlight>,
    case_id: String,
}

impl<'a> CaseGuard<'a> {
    fn claim(in_flight: &'a Mutex<InFlight>, case_id: &str) -> ArchiveResult<Self> {
        let mut state = in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        if state.recovering {
            return Err(ArchiveError::RecoveryConflict(format!(
                "recovery is running; case {case_id} not started"
            )));
        }
        if !state.cases.insert(case_id.to_string()) {
            return Err(ArchiveError::BatchInProgress(case_id.to_string()));
        }
        Ok(Self {
            in_flight,
            case_id: case_id.to_string(),
        })
    }
}

impl Drop for CaseGuard<'_> {
    fn drop(&mut self) {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .cases
            .remove(&self.case_id);
    }
}

/// Holds the data directory for a recovery run; no batch may start meanwhile.
struct RecoveryGuard<'a> {
    in_flight: &'a Mutex<InFlight>,
}

impl<'a> RecoveryGuard<'a> {
    fn claim(in_flight: &'a Mutex<InFlight>) -> ArchiveResult<Self> {
        let mut state = in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        if state.recovering {
            return Err(ArchiveError::RecoveryConflict(
                "another recovery is running".to_string(),
            ));
        }
        if !state.cases.is_empty() {
            return Err(ArchiveError::RecoveryConflict(format!(
                "{} case batch(es) in progress",
                state.cases.len()
            )));
        }
        state.recovering = true;
        Ok(Self { in_flight })
    }
}

impl Drop for RecoveryGuard<'_> {
    fn drop(&mut self) {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .recovering = false;
    }
}
