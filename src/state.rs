// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use crate::archive::CaseArchiver;
use crate::storage::DocumentFs;

#[derive(Clone)]
pub struct AppState {
    pub archiver: Arc<CaseArchiver>,
}

impl AppState {
    pub fn new(archiver: CaseArchiver) -> Self {
        Self {
            archiver: Arc::new(archiver),
        }
    }

    pub fn storage(&self) -> &DocumentFs {
        self.archiver.storage()
    }
}

#[cfg(test)]
impl AppState {
    /// State rooted at `root` with a fresh record store and a fixed test key.
    pub fn for_tests(root: &std::path::Path) -> (Self, Arc<crate::storage::DocumentDatabase>) {
        use crate::archive::{EnvelopeCipher, MasterKey, MetadataStore};
        use crate::storage::{DocumentDatabase, StoragePaths};

        let fs = DocumentFs::new(StoragePaths::new(root));
        fs.initialize().unwrap();
        let db = Arc::new(DocumentDatabase::open(&root.join("records.redb")).unwrap());
        let cipher = Arc::new(EnvelopeCipher::new(MasterKey::from_bytes(&[7; 32]).unwrap()));
        let archiver = CaseArchiver::new(fs, cipher, MetadataStore::new(db.clone()));
        (Self::new(archiver), db)
    }
}
