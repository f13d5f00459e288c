// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Archival Encryption Engine
//!
//! When a case is archived every document file of the case, and every
//! reference file attached to those documents, is replaced in place by its
//! envelope-encrypted ciphertext. Un-archiving reverses this.
//!
//! ## Components
//!
//! - [`master_key`] - the process-wide key, validated at startup
//! - [`envelope`] - per-file data keys, AES-256-GCM sealing and key wrapping
//! - [`atomic`] - backup / temp / rename state machine and crash recovery
//! - [`metadata_store`] - writes the new encryption state to the record store
//! - [`orchestrator`] - drives a whole case and isolates per-document failure
//! - [`lifecycle`] - async entry points for the case workflow

pub mod atomic;
pub mod batch;
pub mod envelope;
pub mod error;
pub mod lifecycle;
pub mod master_key;
pub mod metadata_store;
pub mod orchestrator;

pub use batch::{BatchFailure, BatchResult};
pub use envelope::{EnvelopeCipher, EnvelopeMetadata};
pub use error::{ArchiveError, ArchiveResult};
pub use lifecycle::{on_case_archived, on_case_unarchived};
pub use master_key::MasterKey;
pub use metadata_store::MetadataStore;
pub use orchestrator::{CaseArchiver, Direction};
