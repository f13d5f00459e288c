// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Document Storage Module
//!
//! Plain filesystem storage for document files, the embedded record store
//! holding document rows, and the audit trail.
//!
//! ## Storage Layout
//!
//! ```text
//! {data_dir}/
//!   records.redb                 # Document record store (default location)
//!   <logical document paths>     # Files referenced by document records
//!   <file>.archive-bak           # Recovery copy while a transform is in flight
//!   <file>.archive-tmp           # Staging output of a transform
//!   audit/
//!     {date}/events.jsonl        # Daily audit logs
//! ```
//!
//! Every logical path is resolved through [`StoragePaths::resolve`]; nothing
//! outside the data directory is ever opened.

pub mod audit;
pub mod document_db;
pub mod document_fs;
pub mod paths;

pub use audit::{AuditEvent, AuditEventType, AuditRepository};
pub use document_db::{DocumentDatabase, DocumentDbError, DocumentDbResult, DocumentStore};
pub use document_fs::{DocumentFs, StorageError, StorageResult};
pub use paths::StoragePaths;
