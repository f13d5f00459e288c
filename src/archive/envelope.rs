// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Envelope encryption of a single file's contents.
//!
//! ## Scheme
//!
//! - A fresh 256-bit data key is drawn from the OS RNG for every file.
//! - File content is sealed with AES-256-GCM under the data key. The
//!   ciphertext replaces the file; the IV and tag go to the metadata.
//! - The data key is sealed with AES-256-GCM under the master key
//!   ("wrapped"), producing `encKey`, `wrapIV` and `wrapTag`.
//! - A SHA-256 checksum of the plaintext is recorded and re-checked after
//!   decryption, independently of the GCM tag.
//!
//! ## Metadata Format
//!
//! ```json
//! {
//!   "alg": "AES-256-GCM",
//!   "iv": "<base64, 12 bytes>",
//!   "tag": "<base64, 16 bytes>",
//!   "encKey": "<base64, 32 bytes>",
//!   "wrapIV": "<base64, 12 bytes>",
//!   "wrapTag": "<base64, 16 bytes>",
//!   "checksum": "<hex sha-256 of plaintext>",
//!   "originalPath": "cases/c1/brief.pdf",
//!   "encryptedBy": "user_42",
//!   "encryptedAt": "2026-10-19T08:00:00Z"
//! }
//! ```

use std::fmt;
use std::io::{Read, Write};

use base64ct::{Base64, Encoding};
use chrono::{DateTime, Utc};
use ring::aead::{Aad, LessSafeKey, Nonce, UnboundKey, AES_256_GCM, NONCE_LEN};
use ring::rand::{SecureRandom, SystemRandom};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use zeroize::{Zeroize, Zeroizing};

use super::error::{ArchiveError, ArchiveResult};
use super::master_key::MasterKey;

/// Algorithm identifier stored in every metadata record.
pub const ENVELOPE_ALGORITHM: &str = "AES-256-GCM";

/// Data key length in bytes.
pub const DATA_KEY_LEN: usize = 32;

/// GCM authentication tag length in bytes.
pub const TAG_LEN: usize = 16;

/// Associated data bound to every wrapped data key.
const WRAP_AAD: &[u8] = b"records-archive:data-key:v1";

/// Cryptographic descriptor for one encrypted file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvelopeMetadata {
    pub alg: String,
    /// Content IV (base64).
    pub iv: String,
    /// Content authentication tag (base64).
    pub tag: String,
    /// Data key wrapped under the master key (base64).
    pub enc_key: String,
    #[serde(rename = "wrapIV")]
    pub wrap_iv: String,
    pub wrap_tag: String,
    /// Lowercase hex SHA-256 of the plaintext.
    pub checksum: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encrypted_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encrypted_at: Option<DateTime<Utc>>,
}

impl EnvelopeMetadata {
    /// Record where the file lived and who encrypted it.
    pub fn stamped(mut self, original_path: impl Into<String>, actor_id: impl Into<String>) -> Self {
        self.original_path = Some(original_path.into());
        self.encrypted_by = Some(actor_id.into());
        self.encrypted_at = Some(Utc::now());
        self
    }
}

/// Envelope cipher bound to the process master key.
///
/// Build it once at startup and share it; it holds no per-call state.
pub struct EnvelopeCipher {
    master: MasterKey,
    rng: SystemRandom,
}

impl fmt::Debug for EnvelopeCipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnvelopeCipher")
            .field("master", &self.master)
            .finish()
    }
}

impl EnvelopeCipher {
    pub fn new(master: MasterKey) -> Self {
        Self {
            master,
            rng: SystemRandom::new(),
        }
    }

    /// Encrypt everything readable from `input` into `output`.
    ///
    /// Returns the metadata needed to decrypt; provenance fields are left
    /// empty for the caller to stamp.
    pub fn encrypt<R, W>(&self, input: &mut R, output: &mut W) -> ArchiveResult<EnvelopeMetadata>
    where
        R: Read + ?Sized,
        W: Write + ?Sized,
    {
        let mut buffer = Vec::new();
        input
            .read_to_end(&mut buffer)
            .map_err(|e| ArchiveError::io("reading plaintext", e))?;

        let checksum = hex::encode(Sha256::digest(&buffer));

        let mut data_key = Zeroizing::new([0u8; DATA_KEY_LEN]);
        self.fill_random(data_key.as_mut())?;
        let content_key = aead_key(data_key.as_ref())?;

        let iv = self.random_nonce()?;
        let tag = content_key
            .seal_in_place_separate_tag(Nonce::assume_unique_for_key(iv), Aad::empty(), &mut buffer)
            .map_err(|_| ArchiveError::Transform("content encryption failed".to_string()))?;

        let wrap_iv = self.random_nonce()?;
        let mut enc_key = data_key.to_vec();
        let wrap_tag = self
            .master
            .aead()
            .seal_in_place_separate_tag(
                Nonce::assume_unique_for_key(wrap_iv),
                Aad::from(WRAP_AAD),
                &mut enc_key,
            )
            .map_err(|_| {
                enc_key.zeroize();
                ArchiveError::Transform("data key wrapping failed".to_string())
            })?;

        output
            .write_all(&buffer)
            .map_err(|e| ArchiveError::io("writing ciphertext", e))?;

        Ok(EnvelopeMetadata {
            alg: ENVELOPE_ALGORITHM.to_string(),
            iv: Base64::encode_string(&iv),
            tag: Base64::encode_string(tag.as_ref()),
            enc_key: Base64::encode_string(&enc_key),
            wrap_iv: Base64::encode_string(&wrap_iv),
            wrap_tag: Base64::encode_string(wrap_tag.as_ref()),
            checksum,
            original_path: None,
            encrypted_by: None,
            encrypted_at: None,
        })
    }

    /// Decrypt `input` using `metadata` and write the plaintext to `output`.
    ///
    /// Nothing is written unless both the tag and the checksum verify.
    pub fn decrypt<R, W>(
        &self,
        input: &mut R,
        output: &mut W,
        metadata: &EnvelopeMetadata,
    ) -> ArchiveResult<()>
    where
        R: Read + ?Sized,
        W: Write + ?Sized,
    {
        if metadata.alg != ENVELOPE_ALGORITHM {
            return Err(ArchiveError::Integrity(format!(
                "unsupported algorithm {}",
                metadata.alg
            )));
        }

        let iv: [u8; NONCE_LEN] = decode_fixed(&metadata.iv, "iv")?;
        let tag: [u8; TAG_LEN] = decode_fixed(&metadata.tag, "tag")?;
        let wrap_iv: [u8; NONCE_LEN] = decode_fixed(&metadata.wrap_iv, "wrapIV")?;
        let wrap_tag: [u8; TAG_LEN] = decode_fixed(&metadata.wrap_tag, "wrapTag")?;
        let data_key = self.unwrap_data_key(&metadata.enc_key, wrap_iv, wrap_tag)?;
        let content_key = aead_key(data_key.as_ref())?;

        let mut buffer = Vec::new();
        input
            .read_to_end(&mut buffer)
            .map_err(|e| ArchiveError::io("reading ciphertext", e))?;
        buffer.extend_from_slice(&tag);

        let plaintext_len = content_key
            .open_in_place(Nonce::assume_unique_for_key(iv), Aad::empty(), &mut buffer)
            .map_err(|_| ArchiveError::Integrity("content authentication tag mismatch".to_string()))?
            .len();
        buffer.truncate(plaintext_len);

        let checksum = hex::encode(Sha256::digest(&buffer));
        if !checksum.eq_ignore_ascii_case(&metadata.checksum) {
            buffer.zeroize();
            return Err(ArchiveError::Integrity("plaintext checksum mismatch".to_string()));
        }

        output
            .write_all(&buffer)
            .map_err(|e| ArchiveError::io("writing plaintext", e))?;
        Ok(())
    }

    fn unwrap_data_key(
        &self,
        enc_key: &str,
        wrap_iv: [u8; NONCE_LEN],
        wrap_tag: [u8; TAG_LEN],
    ) -> ArchiveResult<Zeroizing<[u8; DATA_KEY_LEN]>> {
        let mut wrapped = Zeroizing::new(decode(enc_key, "encKey")?);
        if wrapped.len() != DATA_KEY_LEN {
            return Err(ArchiveError::Integrity("wrapped data key has wrong length".to_string()));
        }
        wrapped.extend_from_slice(&wrap_tag);

        let opened = self
            .master
            .aead()
            .open_in_place(
                Nonce::assume_unique_for_key(wrap_iv),
                Aad::from(WRAP_AAD),
                &mut wrapped,
            )
            .map_err(|_| ArchiveError::Integrity("data key failed to unwrap".to_string()))?;

        let mut data_key = Zeroizing::new([0u8; DATA_KEY_LEN]);
        data_key.copy_from_slice(opened);
        Ok(data_key)
    }

    fn random_nonce(&self) -> ArchiveResult<[u8; NONCE_LEN]> {
        let mut nonce = [0u8; NONCE_LEN];
        self.fill_random(&mut nonce)?;
        Ok(nonce)
    }

    fn fill_random(&self, dest: &mut [u8]) -> ArchiveResult<()> {
        self.rng
            .fill(dest)
            .map_err(|_| ArchiveError::Transform("system RNG unavailable".to_string()))
    }
}

fn aead_key(bytes: &[u8]) -> ArchiveResult<LessSafeKey> {
    let unbound = UnboundKey::new(&AES_256_GCM, bytes)
        .map_err(|_| ArchiveError::Integrity("invalid data key".to_string()))?;
    Ok(LessSafeKey::new(unbound))
}

fn decode(value: &str, field: &str) -> ArchiveResult<Vec<u8>> {
    Base64::decode_vec(value)
        .map_err(|_| ArchiveError::Integrity(format!("metadata field {field} is not valid base64")))
}

fn decode_fixed<const N: usize>(value: &str, field: &str) -> ArchiveResult<[u8; N]> {
    let bytes = decode(value, field)?;
    bytes
        .as_slice()
        .try_into()
        .map_err(|_| ArchiveError::Integrity(format!("metadata field {field} has wrong length")))
}
