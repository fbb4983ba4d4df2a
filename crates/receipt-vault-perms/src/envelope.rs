//! Encrypted payload envelope.
//!
//! A serialized receipt payload is wrapped in an [`EncryptedPayload`] before
//! it goes to the content store. The envelope names its key by [`KeyRef`]
//! and never carries key material.

use serde::{Deserialize, Serialize};

use crate::crypto::{EncryptionKey, EncryptionNonce};
use crate::error::{PermsError, Result};
use crate::keys::{KeyProvider, KeyRef};

/// Format identifier for encrypted payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum EncryptionFormat {
    /// ChaCha20-Poly1305 with 256-bit key and synthetic nonce.
    ChaCha20Poly1305 = 1,
}

/// An encrypted payload envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedPayload {
    /// Encryption algorithm used.
    pub format: EncryptionFormat,

    /// Which key decrypts this payload. Also bound as associated data.
    pub key_ref: KeyRef,

    /// Nonce used for encryption.
    pub nonce: EncryptionNonce,

    /// The encrypted data (includes authentication tag).
    pub ciphertext: Vec<u8>,
}

impl EncryptedPayload {
    /// Encrypt plaintext with the given key.
    ///
    /// Deterministic: the same `(plaintext, key_ref, key)` always yields the
    /// same envelope.
    pub fn encrypt(plaintext: &[u8], key_ref: KeyRef, key: &EncryptionKey) -> Result<Self> {
        let nonce = key.synthetic_nonce(plaintext, key_ref.as_bytes());
        let ciphertext = key.encrypt(plaintext, key_ref.as_bytes(), &nonce)?;

        Ok(Self {
            format: EncryptionFormat::ChaCha20Poly1305,
            key_ref,
            nonce,
            ciphertext,
        })
    }

    /// Encrypt under the key the provider returns for `key_ref`.
    pub fn seal(plaintext: &[u8], key_ref: KeyRef, keys: &dyn KeyProvider) -> Result<Self> {
        let key = keys.key(&key_ref)?;
        Self::encrypt(plaintext, key_ref, &key)
    }

    /// Decrypt with the given key.
    pub fn decrypt(&self, key: &EncryptionKey) -> Result<Vec<u8>> {
        match self.format {
            EncryptionFormat::ChaCha20Poly1305 => {
                key.decrypt(&self.ciphertext, self.key_ref.as_bytes(), &self.nonce)
            }
        }
    }

    /// Decrypt with the key the provider returns for this envelope.
    pub fn open(&self, keys: &dyn KeyProvider) -> Result<Vec<u8>> {
        let key = keys.key(&self.key_ref)?;
        self.decrypt(&key)
    }

    /// Serialize to CBOR bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        ciborium::into_writer(self, &mut buf)
            .map_err(|e| PermsError::SerializationError(e.to_string()))?;
        Ok(buf)
    }

    /// Deserialize from CBOR bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        ciborium::from_reader(bytes).map_err(|e| PermsError::SerializationError(e.to_string()))
    }

    /// Get the size of the ciphertext.
    pub fn ciphertext_len(&self) -> usize {
        self.ciphertext.len()
    }
}
