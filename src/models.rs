// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Data Models
//!
//! Document records as stored in the record store, the encryption update
//! written back by the archival engine, and the request types of the API.
//!
//! ## Reference Entries
//!
//! A document's `doc_reference` list mixes two JSON shapes: a bare string
//! for a plaintext file, and an object `{path, isEncrypted, metadata}` once
//! the file has been encrypted. [`ReferenceEntry`] models both as variants
//! of one enum so the shape is always checked.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::archive::EnvelopeMetadata;

// =============================================================================
// Documents
// =============================================================================

/// One file-bearing record belonging to a case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub document_id: String,
    pub case_id: String,
    /// Logical path of the primary file, relative to the data directory.
    #[serde(default)]
    pub file_path: Option<String>,
    #[serde(default)]
    pub doc_reference: Vec<ReferenceEntry>,
    #[serde(default)]
    pub is_encrypted: bool,
    /// Present iff `is_encrypted` is true.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encryption_metadata: Option<EnvelopeMetadata>,
    #[serde(default)]
    pub is_deleted: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated_by: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl Document {
    /// A new plaintext document.
    pub fn new(
        document_id: impl Into<String>,
        case_id: impl Into<String>,
        file_path: Option<String>,
    ) -> Self {
        Self {
            document_id: document_id.into(),
            case_id: case_id.into(),
            file_path,
            doc_reference: Vec::new(),
            is_encrypted: false,
            encryption_metadata: None,
            is_deleted: false,
            last_updated_by: None,
            updated_at: Utc::now(),
        }
    }

    /// Add plain reference paths.
    pub fn with_references<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.doc_reference
            .extend(paths.into_iter().map(|p| ReferenceEntry::Plain(p.into())));
        self
    }
}

/// A reference file attached to a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ReferenceEntry {
    /// Plaintext file, stored as a bare path string.
    Plain(String),
    /// Structured entry carrying its own envelope metadata.
    Structured(StructuredReference),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StructuredReference {
    pub path: String,
    #[serde(default)]
    pub is_encrypted: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<EnvelopeMetadata>,
}

impl ReferenceEntry {
    /// Structured entry for a file that was just encrypted.
    pub fn encrypted(path: impl Into<String>, metadata: EnvelopeMetadata) -> Self {
        ReferenceEntry::Structured(StructuredReference {
            path: path.into(),
            is_encrypted: true,
            metadata: Some(metadata),
        })
    }

    /// Logical path, whatever the representation.
    pub fn path(&self) -> &str {
        match self {
            ReferenceEntry::Plain(path) => path,
            ReferenceEntry::Structured(entry) => &entry.path,
        }
    }

    pub fn is_encrypted(&self) -> bool {
        matches!(self, ReferenceEntry::Structured(entry) if entry.is_encrypted)
    }
}

// =============================================================================
// Record Store Contract
// =============================================================================

/// Predicates applied when fetching a case's documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DocumentFilter {
    pub include_deleted: bool,
    pub require_file_path: bool,
    pub is_encrypted: Option<bool>,
}

impl DocumentFilter {
    /// Non-deleted plaintext documents with a primary file.
    pub fn archive_candidates() -> Self {
        Self {
            include_deleted: false,
            require_file_path: true,
            is_encrypted: Some(false),
        }
    }

    /// Non-deleted encrypted documents with a primary file.
    pub fn unarchive_candidates() -> Self {
        Self {
            include_deleted: false,
            require_file_path: true,
            is_encrypted: Some(true),
        }
    }

    pub fn matches(&self, document: &Document) -> bool {
        if !self.include_deleted && document.is_deleted {
            return false;
        }
        if self.require_file_path && document.file_path.is_none() {
            return false;
        }
        match self.is_encrypted {
            Some(flag) => document.is_encrypted == flag,
            None => true,
        }
    }
}

/// Fields rewritten on a document when its encryption state changes.
///
/// Built only through [`EncryptionUpdate::encrypted`] and
/// [`EncryptionUpdate::decrypted`], so `encryption_metadata` is present
/// exactly when `is_encrypted` is set.
#[derive(Debug, Clone, PartialEq)]
pub struct EncryptionUpdate {
    is_encrypted: bool,
    encryption_metadata: Option<EnvelopeMetadata>,
    doc_reference: Vec<ReferenceEntry>,
    last_updated_by: String,
}

impl EncryptionUpdate {
    pub fn encrypted(
        metadata: EnvelopeMetadata,
        doc_reference: Vec<ReferenceEntry>,
        actor_id: impl Into<String>,
    ) -> Self {
        Self {
            is_encrypted: true,
            encryption_metadata: Some(metadata),
            doc_reference,
            last_updated_by: actor_id.into(),
        }
    }

    pub fn decrypted(doc_reference: Vec<ReferenceEntry>, actor_id: impl Into<String>) -> Self {
        Self {
            is_encrypted: false,
            encryption_metadata: None,
            doc_reference,
            last_updated_by: actor_id.into(),
        }
    }

    pub fn is_encrypted(&self) -> bool {
        self.is_encrypted
    }

    pub fn encryption_metadata(&self) -> Option<&EnvelopeMetadata> {
        self.encryption_metadata.as_ref()
    }

    pub fn doc_reference(&self) -> &[ReferenceEntry] {
        &self.doc_reference
    }

    pub fn last_updated_by(&self) -> &str {
        &self.last_updated_by
    }

    /// Apply the update to a document record.
    pub fn apply_to(&self, document: &mut Document) {
        document.is_encrypted = self.is_encrypted;
        document.encryption_metadata = self.encryption_metadata.clone();
        document.doc_reference = self.doc_reference.clone();
        document.last_updated_by = Some(self.last_updated_by.clone());
        document.updated_at = Utc::now();
    }
}

// =============================================================================
// API Requests
// =============================================================================

/// Body of the archive and un-archive endpoints.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CaseTransitionRequest {
    /// User performing the transition; recorded on every touched document.
    pub actor_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_metadata() -> EnvelopeMetadata {
        EnvelopeMetadata {
            alg: "AES-256-GCM".to_string(),
            iv: "AAAAAAAAAAAAAAAA".to_string(),
            tag: "AAAAAAAAAAAAAAAAAAAAAA==".to_string(),
            enc_key: "key".to_string(),
            wrap_iv: "AAAAAAAAAAAAAAAA".to_string(),
            wrap_tag: "AAAAAAAAAAAAAAAAAAAAAA==".to_string(),
            checksum: "00".to_string(),
            original_path: None,
            encrypted_by: None,
            encrypted_at: None,
        }
    }

    #[test]
    fn reference_entries_deserialize_from_both_shapes() {
        let value = json!([
            "uploads/plain.pdf",
            {"path": "uploads/enc.pdf", "isEncrypted": true, "metadata": serde_json::to_value(sample_metadata()).unwrap()},
            {"path": "uploads/flagless.pdf"}
        ]);
        let entries: Vec<ReferenceEntry> = serde_json::from_value(value).unwrap();

        assert_eq!(entries[0], ReferenceEntry::Plain("uploads/plain.pdf".to_string()));
        assert!(entries[1].is_encrypted());
        assert_eq!(entries[1].path(), "uploads/enc.pdf");
        assert!(!entries[2].is_encrypted());
        assert_eq!(entries[2].path(), "uploads/flagless.pdf");
    }

    #[test]
    fn plain_reference_serializes_as_string() {
        let value = serde_json::to_value(ReferenceEntry::Plain("a.pdf".to_string())).unwrap();
        assert_eq!(value, json!("a.pdf"));

        let value =
            serde_json::to_value(ReferenceEntry::encrypted("b.pdf", sample_metadata())).unwrap();
        assert_eq!(value["path"], "b.pdf");
        assert_eq!(value["isEncrypted"], true);
        assert!(value["metadata"].is_object());
    }

    #[test]
    fn filters_select_candidates() {
        let plain = Document::new("d1", "c1", Some("a.pdf".to_string()));
        let mut encrypted = plain.clone();
        encrypted.is_encrypted = true;
        let mut deleted = plain.clone();
        deleted.is_deleted = true;
        let no_file = Document::new("d2", "c1", None);

        let archive = DocumentFilter::archive_candidates();
        assert!(archive.matches(&plain));
        assert!(!archive.matches(&encrypted));
        assert!(!archive.matches(&deleted));
        assert!(!archive.matches(&no_file));

        let unarchive = DocumentFilter::unarchive_candidates();
        assert!(unarchive.matches(&encrypted));
        assert!(!unarchive.matches(&plain));
    }

    #[test]
    fn update_keeps_flag_and_metadata_together() {
        let mut doc = Document::new("d1", "c1", Some("a.pdf".to_string()));

        EncryptionUpdate::encrypted(sample_metadata(), vec![], "user_1").apply_to(&mut doc);
        assert!(doc.is_encrypted);
        assert!(doc.encryption_metadata.is_some());
        assert_eq!(doc.last_updated_by.as_deref(), Some("user_1"));

        EncryptionUpdate::decrypted(vec![], "user_2").apply_to(&mut doc);
        assert!(!doc.is_encrypted);
        assert!(doc.encryption_metadata.is_none());
        assert_eq!(doc.last_updated_by.as_deref(), Some("user_2"));
    }
}
