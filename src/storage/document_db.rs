// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Embedded document record store backed by redb (pure Rust, ACID).
//!
//! ## Table Layout
//!
//! - `documents`: document_id → serialized Document (JSON bytes)
//! - `case_documents`: composite key (case_id|0x00|document_id) → document_id
//!
//! Ids containing a NUL byte are rejected on write: NUL is the index key
//! separator, so such an id would fall inside another case's range.
//!
//! The archival engine only depends on the [`DocumentStore`] trait; this
//! database is the implementation the server runs with.

use std::path::Path;

use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};

use crate::models::{Document, DocumentFilter, EncryptionUpdate};

// =============================================================================
// Table Definitions
// =============================================================================

/// Primary table: document_id → serialized Document (JSON bytes).
const DOCUMENTS: TableDefinition<&str, &[u8]> = TableDefinition::new("documents");

/// Index: `case_id 0x00 document_id` → document_id, for per-case prefix scans.
const CASE_DOCUMENTS: TableDefinition<&[u8], &str> = TableDefinition::new("case_documents");

// =============================================================================
// Error Type
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum DocumentDbError {
    #[error("redb error: {0}")]
    Redb(#[from] redb::Error),

    #[error("redb database error: {0}")]
    RedbDatabase(#[from] redb::DatabaseError),

    #[error("redb transaction error: {0}")]
    RedbTransaction(#[from] redb::TransactionError),

    #[error("redb table error: {0}")]
    RedbTable(#[from] redb::TableError),

    #[error("redb storage error: {0}")]
    RedbStorage(#[from] redb::StorageError),

    #[error("redb commit error: {0}")]
    RedbCommit(#[from] redb::CommitError),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid id: {0}")]
    InvalidId(String),
}

pub type DocumentDbResult<T> = Result<T, DocumentDbError>;

// =============================================================================
// Record Store Contract
// =============================================================================

/// The record store operations the archival engine consumes.
pub trait DocumentStore: Send + Sync {
    /// All documents of a case matching `filter`.
    fn fetch_documents_for_case(
        &self,
        case_id: &str,
        filter: &DocumentFilter,
    ) -> DocumentDbResult<Vec<Document>>;

    /// Rewrite the encryption fields of one document.
    fn update_document_encryption(
        &self,
        document_id: &str,
        update: &EncryptionUpdate,
    ) -> DocumentDbResult<()>;
}

// =============================================================================
// Index Key Helpers
// =============================================================================

fn check_id(kind: &str, id: &str) -> DocumentDbResult<()> {
    if id.is_empty() || id.contains('\0') {
        return Err(DocumentDbError::InvalidId(format!(
            "{kind} {id:?} must be non-empty and free of NUL bytes"
        )));
    }
    Ok(())
}

fn make_case_key(case_id: &str, document_id: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(case_id.len() + 1 + document_id.len());
    key.extend_from_slice(case_id.as_bytes());
    key.push(0x00);
    key.extend_from_slice(document_id.as_bytes());
    key
}

/// Scan range covering every index key of a case.
fn make_case_range(case_id: &str) -> (Vec<u8>, Vec<u8>) {
    let mut start = Vec::with_capacity(case_id.len() + 1);
    start.extend_from_slice(case_id.as_bytes());
    let mut end = start.clone();
    start.push(0x00);
    end.push(0x01);
    (start, end)
}

// =============================================================================
// DocumentDatabase
// =============================================================================

/// Embedded ACID document database.
pub struct DocumentDatabase {
    db: Database,
}

impl DocumentDatabase {
    /// Open (or create) the database at the given path.
    pub fn open(path: &Path) -> DocumentDbResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let db = Database::create(path)?;

        // Pre-create all tables so later read transactions don't fail
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(DOCUMENTS)?;
            let _ = write_txn.open_table(CASE_DOCUMENTS)?;
        }
        write_txn.commit()?;

        Ok(Self { db })
    }

    /// Insert or replace a document and its case index entry.
    ///
    /// Moving a document to another case drops the old index entry.
    pub fn upsert_document(&self, document: &Document) -> DocumentDbResult<()> {
        check_id("document_id", &document.document_id)?;
        check_id("case_id", &document.case_id)?;
        let json = serde_json::to_vec(document)?;

        let write_txn = self.db.begin_write()?;
        {
            let mut docs = write_txn.open_table(DOCUMENTS)?;
            let previous_case = {
                let existing = docs.get(document.document_id.as_str())?;
                match existing {
                    Some(value) => {
                        let previous: Document = serde_json::from_slice(value.value())?;
                        Some(previous.case_id)
                    }
                    None => None,
                }
            };
            docs.insert(document.document_id.as_str(), json.as_slice())?;

            let mut index = write_txn.open_table(CASE_DOCUMENTS)?;
            if let Some(previous_case) = previous_case.filter(|c| *c != document.case_id) {
                let old_key = make_case_key(&previous_case, &document.document_id);
                index.remove(old_key.as_slice())?;
            }
            let key = make_case_key(&document.case_id, &document.document_id);
            index.insert(key.as_slice(), document.document_id.as_str())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Look up a single document.
    pub fn get_document(&self, document_id: &str) -> DocumentDbResult<Option<Document>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(DOCUMENTS)?;
        match table.get(document_id)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }
}

impl DocumentStore for DocumentDatabase {
    fn fetch_documents_for_case(
        &self,
        case_id: &str,
        filter: &DocumentFilter,
    ) -> DocumentDbResult<Vec<Document>> {
        let read_txn = self.db.begin_read()?;
        let index = read_txn.open_table(CASE_DOCUMENTS)?;
        let docs = read_txn.open_table(DOCUMENTS)?;

        let (start, end) = make_case_range(case_id);
        let mut documents = Vec::new();
        for entry in index.range(start.as_slice()..end.as_slice())? {
            let (_, document_id) = entry?;
            let Some(value) = docs.get(document_id.value())? else {
                tracing::warn!(
                    case_id = %case_id,
                    document_id = %document_id.value(),
                    "Case index points at a missing document"
                );
                continue;
            };
            let document: Document = serde_json::from_slice(value.value())?;
            if filter.matches(&document) {
                documents.push(document);
            }
        }
        Ok(documents)
    }

    fn update_document_encryption(
        &self,
        document_id: &str,
        update: &EncryptionUpdate,
    ) -> DocumentDbResult<()> {
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(DOCUMENTS)?;

            // Read existing value and deserialize before mutating
            let existing_bytes = {
                let existing = table
                    .get(document_id)?
                    .ok_or_else(|| DocumentDbError::NotFound(format!("Document {document_id}")))?;
                existing.value().to_vec()
            };

            let mut document: Document = serde_json::from_slice(&existing_bytes)?;
            update.apply_to(&mut document);

            let json = serde_json::to_vec(&document)?;
            table.insert(document_id, json.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================
