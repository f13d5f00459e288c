// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Case lifecycle hooks.
//!
//! The case workflow calls these when a case is archived or un-archived.
//! The batch itself is blocking file and database work, so it runs on the
//! blocking thread pool.

use std::sync::Arc;

use super::batch::BatchResult;
use super::error::{ArchiveError, ArchiveResult};
use super::orchestrator::{CaseArchiver, Direction};

/// Encrypt all documents of a case that has just been archived.
pub async fn on_case_archived(
    archiver: Arc<CaseArchiver>,
    case_id: String,
    actor_id: String,
) -> ArchiveResult<BatchResult> {
    run_blocking(archiver, Direction::Encrypt, case_id, actor_id).await
}

/// Decrypt all documents of a case that has just been un-archived.
pub async fn on_case_unarchived(
    archiver: Arc<CaseArchiver>,
    case_id: String,
    actor_id: String,
) -> ArchiveResult<BatchResult> {
    run_blocking(archiver, Direction::Decrypt, case_id, actor_id).await
}

async fn run_blocking(
    archiver: Arc<CaseArchiver>,
    direction: Direction,
    case_id: String,
    actor_id: String,
) -> ArchiveResult<BatchResult> {
    let task_case_id = case_id.clone();
    let outcome = tokio::task::spawn_blocking(move || {
        archiver.run(direction, &task_case_id, &actor_id)
    })
    .await
    .map_err(|e| ArchiveError::Transform(format!("batch task for case {case_id} failed: {e}")))?;

    match &outcome {
        Ok(result) if result.is_complete_success() => {
            tracing::info!(
                case_id = %case_id,
                direction = %direction,
                succeeded = result.succeeded_count(),
                "Case transition complete"
            );
        }
        Ok(result) => {
            tracing::warn!(
                case_id = %case_id,
                direction = %direction,
                succeeded = result.succeeded_count(),
                failed = result.failed_count(),
                "Case transition completed with failures"
            );
        }
        Err(e) => {
            tracing::error!(
                case_id = %case_id,
                direction = %direction,
                error = %e,
                "Case transition aborted"
            );
        }
    }
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::{EnvelopeCipher, MasterKey, MetadataStore};
    use crate::models::Document;
    use crate::storage::{DocumentDatabase, DocumentFs, StoragePaths};
    use tempfile::TempDir;

    fn setup() -> (TempDir, Arc<DocumentDatabase>, Arc<CaseArchiver>) {
        let temp = TempDir::new().unwrap();
        let fs = DocumentFs::new(StoragePaths::new(temp.path()));
        fs.initialize().unwrap();
        let db = Arc::new(DocumentDatabase::open(&temp.path().join("records.redb")).unwrap());
        let cipher = Arc::new(EnvelopeCipher::new(MasterKey::from_bytes(&[9; 32]).unwrap()));
        let archiver = CaseArchiver::new(fs.clone(), cipher, MetadataStore::new(db.clone()));

        fs.write_raw(fs.resolve("cases/c1/a.pdf").unwrap(), b"archived brief")
            .unwrap();
        db.upsert_document(&Document::new("d1", "c1", Some("cases/c1/a.pdf".into())))
            .unwrap();

        (temp, db, Arc::new(archiver))
    }

    #[tokio::test]
    async fn archive_then_unarchive() {
        let (_temp, db, archiver) = setup();

        let result = on_case_archived(archiver.clone(), "c1".into(), "u1".into())
            .await
            .unwrap();
        assert_eq!(result.succeeded_document_ids, vec!["d1".to_string()]);
        assert!(db.get_document("d1").unwrap().unwrap().is_encrypted);

        let result = on_case_unarchived(archiver.clone(), "c1".into(), "u1".into())
            .await
            .unwrap();
        assert_eq!(result.succeeded_count(), 1);
        assert!(!db.get_document("d1").unwrap().unwrap().is_encrypted);

        let bytes = archiver
            .storage()
            .read_raw(archiver.storage().resolve("cases/c1/a.pdf").unwrap())
            .unwrap();
        assert_eq!(bytes, b"archived brief");
    }

    #[tokio::test]
    async fn unarchive_of_plain_case_is_a_no_op() {
        let (_temp, _db, archiver) = setup();
        let result = on_case_unarchived(archiver, "c1".into(), "u1".into())
            .await
            .unwrap();
        assert_eq!(result.total_count, 0);
    }
}
