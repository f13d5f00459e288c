// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Adapter between the archival engine and the record store.
//!
//! `persist` is the commit point of a document transition: the file
//! transforms of a document only count once it returns `Ok`.

use std::sync::Arc;

use super::envelope::EnvelopeMetadata;
use super::error::{ArchiveError, ArchiveResult};
use crate::models::{Document, DocumentFilter, EncryptionUpdate, ReferenceEntry};
use crate::storage::DocumentStore;

#[derive(Clone)]
pub struct MetadataStore {
    store: Arc<dyn DocumentStore>,
}

impl MetadataStore {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Documents of a case matching `filter`. Failure here aborts the batch.
    pub fn candidates(&self, case_id: &str, filter: &DocumentFilter) -> ArchiveResult<Vec<Document>> {
        self.store
            .fetch_documents_for_case(case_id, filter)
            .map_err(|e| ArchiveError::Store(e.to_string()))
    }

    /// Record the new encryption state of a document.
    ///
    /// `Some(metadata)` marks the document encrypted, `None` marks it plaintext.
    pub fn persist(
        &self,
        document_id: &str,
        metadata: Option<EnvelopeMetadata>,
        references: Vec<ReferenceEntry>,
        actor_id: &str,
    ) -> ArchiveResult<()> {
        let update = match metadata {
            Some(metadata) => EncryptionUpdate::encrypted(metadata, references, actor_id),
            None => EncryptionUpdate::decrypted(references, actor_id),
        };
        self.store
            .update_document_encryption(document_id, &update)
            .map_err(|e| ArchiveError::Persist(format!("document {document_id}: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{DocumentDatabase, DocumentDbError, DocumentDbResult};

    struct Unavailable;

    impl DocumentStore for Unavailable {
        fn fetch_documents_for_case(
            &self,
            _case_id: &str,
            _filter: &DocumentFilter,
        ) -> DocumentDbResult<Vec<Document>> {
            Err(DocumentDbError::NotFound("store offline".into()))
        }

        fn update_document_encryption(
            &self,
            _document_id: &str,
            _update: &EncryptionUpdate,
        ) -> DocumentDbResult<()> {
            Err(DocumentDbError::NotFound("store offline".into()))
        }
    }

    #[test]
    fn store_errors_are_classified() {
        let store = MetadataStore::new(Arc::new(Unavailable));
        let err = store
            .candidates("c1", &DocumentFilter::archive_candidates())
            .unwrap_err();
        assert_eq!(err.code(), "store_unavailable");

        let err = store.persist("d1", None, vec![], "u1").unwrap_err();
        assert_eq!(err.code(), "persist");
    }

    #[test]
    fn persist_without_metadata_marks_plaintext() {
        let dir = tempfile::tempdir().unwrap();
        let db = Arc::new(DocumentDatabase::open(&dir.path().join("t.redb")).unwrap());
        let mut doc = Document::new("d1", "c1", Some("a.pdf".into()));
        doc.is_encrypted = true;
        db.upsert_document(&doc).unwrap();

        let store = MetadataStore::new(db.clone());
        let refs = vec![ReferenceEntry::Plain("b.pdf".into())];
        store.persist("d1", None, refs.clone(), "u1").unwrap();

        let stored = db.get_document("d1").unwrap().unwrap();
        assert!(!stored.is_encrypted);
        assert!(stored.encryption_metadata.is_none());
        assert_eq!(stored.doc_reference, refs);
        assert_eq!(stored.last_updated_by.as_deref(), Some("u1"));
    }
}
