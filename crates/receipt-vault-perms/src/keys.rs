//! Key management boundary.
//!
//! Payload keys are never generated ad hoc or stored next to ciphertext.
//! An envelope carries only a [`KeyRef`], a non-secret name for its key;
//! turning that name into key material is the job of a [`KeyProvider`].

use serde::{Deserialize, Serialize};
use std::fmt;

use receipt_vault_core::types::hex32;
use receipt_vault_core::EventId;

use crate::crypto::EncryptionKey;
use crate::error::{PermsError, Result};

const KEY_REF_DOMAIN: &str = "receipt-vault v0 key-ref";
const PAYLOAD_KEY_DOMAIN: &str = "receipt-vault v0 payload-key";

/// Non-secret reference to a payload key.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KeyRef(#[serde(with = "hex32")] pub [u8; 32]);

impl KeyRef {
    /// The key reference used for an event's payload.
    pub fn for_event(event_id: &EventId) -> Self {
        Self(blake3::derive_key(KEY_REF_DOMAIN, event_id.as_str().as_bytes()))
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Convert to hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for KeyRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KeyRef({})", &self.to_hex()[..16])
    }
}

/// Resolves key references to key material.
///
/// Implemented by the built-in [`MasterKeyProvider`] and by adapters for an
/// external KMS.
pub trait KeyProvider: Send + Sync {
    /// Return the key named by `key_ref`.
    fn key(&self, key_ref: &KeyRef) -> Result<EncryptionKey>;
}

/// Derives per-payload keys from a single master secret.
///
/// `key = Blake3-derive_key(domain, master || key_ref)`.
pub struct MasterKeyProvider {
    master: [u8; 32],
}

impl MasterKeyProvider {
    /// Create from a 32-byte master secret.
    pub const fn new(master: [u8; 32]) -> Self {
        Self { master }
    }

    /// Parse a hex-encoded master secret.
    pub fn from_hex(s: &str) -> Result<Self> {
        let bytes = receipt_vault_core::types::decode_hex32(s.trim())
            .map_err(|e| PermsError::KeyDerivationError(format!("master key: {e}")))?;
        Ok(Self::new(bytes))
    }
}

impl KeyProvider for MasterKeyProvider {
    fn key(&self, key_ref: &KeyRef) -> Result<EncryptionKey> {
        let mut hasher = blake3::Hasher::new_derive_key(PAYLOAD_KEY_DOMAIN);
        hasher.update(&self.master);
        hasher.update(&key_ref.0);
        Ok(EncryptionKey::from_bytes(*hasher.finalize().as_bytes()))
    }
}

impl fmt::Debug for MasterKeyProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("MasterKeyProvider(<redacted>)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_ref_per_event() {
        let a = KeyRef::for_event(&EventId::new("evt_1"));
        assert_eq!(a, KeyRef::for_event(&EventId::new("evt_1")));
        assert_ne!(a, KeyRef::for_event(&EventId::new("evt_2")));
    }

    #[test]
    fn test_master_provider_derivation() {
        let provider = MasterKeyProvider::new([9; 32]);
        let r1 = KeyRef::for_event(&EventId::new("evt_1"));
        let r2 = KeyRef::for_event(&EventId::new("evt_2"));

        let k1 = provider.key(&r1).unwrap();
        assert_eq!(k1.as_bytes(), provider.key(&r1).unwrap().as_bytes());
        assert_ne!(k1.as_bytes(), provider.key(&r2).unwrap().as_bytes());

        // The key is not a function of the public reference alone.
        let other = MasterKeyProvider::new([10; 32]);
        assert_ne!(k1.as_bytes(), other.key(&r1).unwrap().as_bytes());
        assert_ne!(k1.as_bytes(), r1.as_bytes());
    }

    #[test]
    fn test_from_hex() {
        let provider = MasterKeyProvider::from_hex(&"ab".repeat(32)).unwrap();
        let r = KeyRef::for_event(&EventId::new("evt_1"));
        assert_eq!(
            provider.key(&r).unwrap().as_bytes(),
            MasterKeyProvider::new([0xab; 32]).key(&r).unwrap().as_bytes()
        );
        assert!(MasterKeyProvider::from_hex("abcd").is_err());
    }
}
