// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Aggregate outcome of a case-wide transition.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::error::ArchiveError;

/// One document that could not be transitioned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BatchFailure {
    pub document_id: String,
    /// Machine-readable reason, e.g. `file_not_found` or `persist_after_transform`.
    pub error: String,
    /// Human-readable detail.
    pub message: String,
    /// File left on disk for manual recovery, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recovery_artifact: Option<String>,
}

/// Result of `encrypt_case` / `decrypt_case`.
///
/// `total_count` always equals `succeeded_document_ids.len() + failed.len()`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BatchResult {
    pub succeeded_document_ids: Vec<String>,
    pub failed: Vec<BatchFailure>,
    pub total_count: usize,
}

impl BatchResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_success(&mut self, document_id: impl Into<String>) {
        self.succeeded_document_ids.push(document_id.into());
        self.total_count += 1;
    }

    pub fn record_failure(&mut self, document_id: impl Into<String>, error: &ArchiveError) {
        self.failed.push(BatchFailure {
            document_id: document_id.into(),
            error: error.code().to_string(),
            message: error.to_string(),
            recovery_artifact: error.recovery_artifact().map(str::to_string),
        });
        self.total_count += 1;
    }

    pub fn succeeded_count(&self) -> usize {
        self.succeeded_document_ids.len()
    }

    pub fn failed_count(&self) -> usize {
        self.failed.len()
    }

    pub fn is_complete_success(&self) -> bool {
        self.failed.is_empty()
    }
}
