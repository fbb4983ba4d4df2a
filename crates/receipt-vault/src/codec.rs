//! Payload codec: serialize, hash and seal receipt payloads.
//!
//! The serialized payload is plain CBOR of [`ReceiptPayload`]. Struct field
//! order is fixed and metadata is a `BTreeMap`, so the same payload always
//! serializes to the same bytes; together with the synthetic nonce this makes
//! the sealed blob, and therefore its content address, deterministic.

use std::sync::Arc;

use receipt_vault_core::{IntegrityHash, ReceiptPayload};
use receipt_vault_perms::{EncryptedPayload, KeyProvider, KeyRef};

use crate::error::CodecError;

/// Encrypts and decrypts receipt payloads.
#[derive(Clone)]
pub struct PayloadCodec {
    keys: Arc<dyn KeyProvider>,
}

impl PayloadCodec {
    /// Create a codec backed by a key provider.
    pub fn new(keys: Arc<dyn KeyProvider>) -> Self {
        Self { keys }
    }

    /// Serialize a payload to CBOR.
    pub fn serialize(payload: &ReceiptPayload) -> Result<Vec<u8>, CodecError> {
        let mut buf = Vec::new();
        ciborium::into_writer(payload, &mut buf).map_err(|e| CodecError::Encode(e.to_string()))?;
        Ok(buf)
    }

    /// Deserialize a payload from CBOR.
    pub fn deserialize(bytes: &[u8]) -> Result<ReceiptPayload, CodecError> {
        ciborium::from_reader(bytes).map_err(|e| CodecError::Decode(e.to_string()))
    }

    /// Integrity hash of the payload's sensitive subset.
    pub fn integrity_hash(payload: &ReceiptPayload) -> IntegrityHash {
        payload.integrity_hash()
    }

    /// Serialize and encrypt a payload into the blob stored in the
    /// content store.
    pub fn seal(&self, payload: &ReceiptPayload) -> Result<Vec<u8>, CodecError> {
        let plaintext = Self::serialize(payload)?;
        let key_ref = KeyRef::for_event(&payload.event.event_id);
        let envelope = EncryptedPayload::seal(&plaintext, key_ref, self.keys.as_ref())?;
        Ok(envelope.to_bytes()?)
    }

    /// Decrypt and deserialize a stored blob.
    ///
    /// Fails on a malformed envelope, a failed authentication tag, or a
    /// plaintext that is not a payload.
    pub fn open(&self, blob: &[u8]) -> Result<ReceiptPayload, CodecError> {
        let envelope = EncryptedPayload::from_bytes(blob)?;
        let plaintext = envelope.open(self.keys.as_ref())?;
        Self::deserialize(&plaintext)
    }
}

impl std::fmt::Debug for PayloadCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PayloadCodec").finish_non_exhaustive()
    }
}
