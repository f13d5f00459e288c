// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Records Archive Server - archival file-encryption engine
//!
//! When a case is archived, every document file belonging to it is replaced
//! on disk by its envelope-encrypted ciphertext; un-archiving restores the
//! plaintext. File replacement is crash-safe and the per-file key material
//! is committed to the document record.
//!
//! ## Modules
//!
//! - `api` - HTTP API handlers (Axum)
//! - `archive` - envelope cipher, atomic file transform and case orchestration
//! - `config` - environment configuration and master key loading
//! - `storage` - document filesystem, redb record store and audit log

pub mod api;
pub mod archive;
pub mod config;
pub mod error;
pub mod models;
pub mod state;
pub mod storage;
