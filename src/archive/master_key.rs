// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Process-wide master key used to wrap per-file data keys.

use std::fmt;

use ring::aead::{LessSafeKey, UnboundKey, AES_256_GCM};
use zeroize::Zeroizing;

use crate::config::ConfigError;

/// Master key length in bytes (AES-256).
pub const MASTER_KEY_LEN: usize = 32;

/// The master key, bound to the AEAD algorithm.
///
/// Raw key bytes are zeroized after the ring key is built. `Debug` never
/// prints key material.
pub struct MasterKey {
    key: LessSafeKey,
}

impl MasterKey {
    /// Parse a key given as exactly 64 hex characters.
    pub fn from_hex(encoded: &str) -> Result<Self, ConfigError> {
        let encoded = encoded.trim();
        if encoded.len() != MASTER_KEY_LEN * 2 {
            return Err(ConfigError::InvalidMasterKey(format!(
                "expected {} hex characters, got {}",
                MASTER_KEY_LEN * 2,
                encoded.len()
            )));
        }

        let bytes = Zeroizing::new(
            hex::decode(encoded)
                .map_err(|_| ConfigError::InvalidMasterKey("not valid hex".to_string()))?,
        );
        Self::from_bytes(&bytes)
    }

    /// Build a key from raw bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ConfigError> {
        if bytes.len() != MASTER_KEY_LEN {
            return Err(ConfigError::InvalidMasterKey(format!(
                "expected {MASTER_KEY_LEN} bytes, got {}",
                bytes.len()
            )));
        }
        let unbound = UnboundKey::new(&AES_256_GCM, bytes)
            .map_err(|_| ConfigError::InvalidMasterKey("rejected by cipher".to_string()))?;
        Ok(Self {
            key: LessSafeKey::new(unbound),
        })
    }

    pub(crate) fn aead(&self) -> &LessSafeKey {
        &self.key
    }
}

impl fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MasterKey")
            .field("algorithm", &"AES-256-GCM")
            .field("key", &"[REDACTED]")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_64_hex_characters() {
        let key = "ab".repeat(32);
        assert!(MasterKey::from_hex(&key).is_ok());
    }

    #[test]
    fn surrounding_whitespace_is_ignored() {
        let key = format!("  {}\n", "0f".repeat(32));
        assert!(MasterKey::from_hex(&key).is_ok());
    }

    #[test]
    fn rejects_wrong_lengths() {
        let short = "a".repeat(63);
        let long = "a".repeat(66);
        assert!(matches!(
            MasterKey::from_hex(&short),
            Err(ConfigError::InvalidMasterKey(_))
        ));
        assert!(matches!(
            MasterKey::from_hex(&long),
            Err(ConfigError::InvalidMasterKey(_))
        ));
        assert!(MasterKey::from_bytes(&[0u8; 16]).is_err());
    }

    #[test]
    fn rejects_non_hex() {
        let key = "g".repeat(64);
        assert!(MasterKey::from_hex(&key).is_err());
    }

    #[test]
    fn error_message_never_contains_key() {
        let key = format!("{}x", "c".repeat(63));
        let err = MasterKey::from_hex(&key).unwrap_err().to_string();
        assert!(!err.contains(&key));
    }
}
