//! Verification credentials presented on disclosure requests.
//!
//! Two forms are accepted in the `Authorization` header:
//!
//! - `Bearer <token>`: an opaque token checked against stored digests.
//! - `Signed <verifier_key_hex>.<expires_at>.<signature_hex>`: an Ed25519
//!   signature by a verifier key over the token id and expiry.

use std::fmt;

use receipt_vault_core::{TokenId, VerifierKey, VerifierKeypair, VerifierSignature};

use crate::error::{PermsError, Result};

/// Domain prefix of the signed-assertion message.
pub const ASSERTION_DOMAIN: &[u8] = b"receipt-vault-credential-v0";

/// A signed assertion: "this verifier asks for receipt `token_id` until
/// `expires_at`".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedAssertion {
    pub verifier: VerifierKey,
    /// Unix milliseconds.
    pub expires_at: i64,
    pub signature: VerifierSignature,
}

impl SignedAssertion {
    /// The bytes a verifier signs.
    pub fn message(token_id: TokenId, expires_at: i64) -> Vec<u8> {
        let mut msg = Vec::with_capacity(ASSERTION_DOMAIN.len() + 16);
        msg.extend_from_slice(ASSERTION_DOMAIN);
        msg.extend_from_slice(&token_id.value().to_be_bytes());
        msg.extend_from_slice(&expires_at.to_be_bytes());
        msg
    }

    /// Mint an assertion for `token_id`.
    pub fn sign(keypair: &VerifierKeypair, token_id: TokenId, expires_at: i64) -> Self {
        Self {
            verifier: keypair.public_key(),
            expires_at,
            signature: keypair.sign(&Self::message(token_id, expires_at)),
        }
    }

    /// Check the signature and expiry for `token_id`.
    pub fn verify(&self, token_id: TokenId, now: i64) -> Result<()> {
        if now > self.expires_at {
            return Err(PermsError::CredentialExpired(self.expires_at));
        }
        self.verifier
            .verify(&Self::message(token_id, self.expires_at), &self.signature)
            .map_err(|e| PermsError::InvalidCredential(e.to_string()))
    }
}

/// A credential as presented by a caller.
#[derive(Clone, PartialEq, Eq)]
pub enum VerificationCredential {
    Bearer(String),
    Signed(SignedAssertion),
}

impl VerificationCredential {
    /// Parse an `Authorization` header value.
    pub fn parse(header: &str) -> Result<Self> {
        let header = header.trim();
        let (scheme, rest) = header
            .split_once(' ')
            .ok_or_else(|| PermsError::InvalidCredential("missing scheme".into()))?;
        let rest = rest.trim();

        if scheme.eq_ignore_ascii_case("bearer") {
            if rest.is_empty() {
                return Err(PermsError::InvalidCredential("empty bearer token".into()));
            }
            return Ok(Self::Bearer(rest.to_owned()));
        }

        if scheme.eq_ignore_ascii_case("signed") {
            let mut parts = rest.splitn(3, '.');
            let (Some(key), Some(expires), Some(sig)) = (parts.next(), parts.next(), parts.next())
            else {
                return Err(PermsError::InvalidCredential(
                    "expected <key>.<expires_at>.<signature>".into(),
                ));
            };
            let verifier = VerifierKey::from_hex(key)?;
            let expires_at = expires
                .parse::<i64>()
                .map_err(|e| PermsError::InvalidCredential(format!("expires_at: {e}")))?;
            let signature = VerifierSignature::from_hex(sig)?;
            return Ok(Self::Signed(SignedAssertion {
                verifier,
                expires_at,
                signature,
            }));
        }

        Err(PermsError::InvalidCredential(format!(
            "unsupported scheme {scheme:?}"
        )))
    }

    /// Render as an `Authorization` header value.
    pub fn to_header_value(&self) -> String {
        match self {
            Self::Bearer(token) => format!("Bearer {token}"),
            Self::Signed(a) => format!(
                "Signed {}.{}.{}",
                a.verifier.to_hex(),
                a.expires_at,
                a.signature.to_hex()
            ),
        }
    }
}

impl fmt::Debug for VerificationCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bearer(_) => f.write_str("Bearer(<redacted>)"),
            Self::Signed(a) => write!(f, "Signed({:?})", a.verifier),
        }
    }
}
