//! Cryptographic primitives for the receipt vault.
//!
//! Wraps Blake3 integrity hashing and the Ed25519 keys used by verifiers
//! to sign disclosure assertions.

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::CoreError;
use crate::types::{decode_hex32, hex32};

/// Blake3 key-derivation context for integrity hashes.
pub const INTEGRITY_DOMAIN: &str = "receipt-vault v0 integrity-hash";

/// A 32-byte integrity hash over the sensitive subset of a receipt.
///
/// This is the value committed to the ledger; it never reveals the data it
/// was computed from.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IntegrityHash(#[serde(with = "hex32")] pub [u8; 32]);

impl IntegrityHash {
    /// Hash canonical bytes under the integrity domain.
    pub fn compute(canonical: &[u8]) -> Self {
        let mut hasher = blake3::Hasher::new_derive_key(INTEGRITY_DOMAIN);
        hasher.update(canonical);
        Self(*hasher.finalize().as_bytes())
    }

    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Convert to hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from hex string.
    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        Ok(Self(decode_hex32(s)?))
    }

    /// Constant-time equality; used when checking revealed content against
    /// a commitment.
    pub fn ct_eq(&self, other: &Self) -> bool {
        use subtle::ConstantTimeEq;
        self.0.ct_eq(&other.0).into()
    }
}

impl fmt::Debug for IntegrityHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "IntegrityHash({})", &self.to_hex()[..16])
    }
}

impl AsRef<[u8]> for IntegrityHash {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Ed25519 public key of an authorized verifier.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VerifierKey(#[serde(with = "hex32")] pub [u8; 32]);

impl VerifierKey {
    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Convert to hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from hex string.
    pub fn from_hex(s: &str) -> Result<Self, CoreError> {
        decode_hex32(s)
            .map(Self)
            .map_err(|e| CoreError::InvalidIdentifier(format!("verifier key: {e}")))
    }

    /// Verify a signature over a message.
    pub fn verify(&self, message: &[u8], signature: &VerifierSignature) -> Result<(), CoreError> {
        let verifying_key =
            VerifyingKey::from_bytes(&self.0).map_err(|_| CoreError::InvalidPublicKey)?;
        let sig = Signature::from_bytes(&signature.0);
        verifying_key
            .verify_strict(message, &sig)
            .map_err(|_| CoreError::InvalidSignature)
    }
}

impl fmt::Debug for VerifierKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VerifierKey({})", &self.to_hex()[..16])
    }
}

/// A 64-byte Ed25519 signature produced by a verifier.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct VerifierSignature(pub [u8; 64]);

impl VerifierSignature {
    /// Convert to hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from hex string.
    pub fn from_hex(s: &str) -> Result<Self, CoreError> {
        let bytes =
            hex::decode(s).map_err(|e| CoreError::InvalidIdentifier(format!("signature: {e}")))?;
        let arr: [u8; 64] = bytes
            .try_into()
            .map_err(|_| CoreError::InvalidSignature)?;
        Ok(Self(arr))
    }
}

impl fmt::Debug for VerifierSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VerifierSignature({}...)", &self.to_hex()[..16])
    }
}

/// Signing half of a verifier identity.
///
/// Held by verifiers outside the vault; the vault itself only ever needs
/// [`VerifierKey`]. Kept here so tooling and tests can mint assertions.
#[derive(Clone)]
pub struct VerifierKeypair {
    signing_key: SigningKey,
}

impl VerifierKeypair {
    /// Generate a new random keypair.
    pub fn generate() -> Self {
        let mut rng = rand::thread_rng();
        Self {
            signing_key: SigningKey::generate(&mut rng),
        }
    }

    /// Create from a 32-byte seed.
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(seed),
        }
    }

    /// Get the public key.
    pub fn public_key(&self) -> VerifierKey {
        VerifierKey(self.signing_key.verifying_key().to_bytes())
    }

    /// Sign a message.
    pub fn sign(&self, message: &[u8]) -> VerifierSignature {
        VerifierSignature(self.signing_key.sign(message).to_bytes())
    }
}

impl fmt::Debug for VerifierKeypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VerifierKeypair({:?})", self.public_key())
    }
}
