//! Grants: who may see full receipts, and which ones.
//!
//! Grants are issued and revoked outside the vault; the vault only checks
//! them. A grant names a principal (a bearer token digest or a verifier
//! key), a scope, and optional conditions.

use std::fmt;

use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;

use receipt_vault_core::types::hex32;
use receipt_vault_core::{TokenId, VerifierKey};

const BEARER_DIGEST_DOMAIN: &str = "receipt-vault v0 bearer-digest";

/// Identifier of a grant within an authorization set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GrantId(pub u64);

impl fmt::Display for GrantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "grant#{}", self.0)
    }
}

/// Digest of a bearer token. The token itself is never stored.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BearerDigest(#[serde(with = "hex32")] pub [u8; 32]);

impl BearerDigest {
    /// Digest a presented token.
    pub fn of(token: &str) -> Self {
        Self(blake3::derive_key(BEARER_DIGEST_DOMAIN, token.as_bytes()))
    }

    /// Constant-time comparison.
    pub fn ct_eq(&self, other: &Self) -> bool {
        self.0.ct_eq(&other.0).into()
    }
}

impl fmt::Debug for BearerDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BearerDigest({})", &hex::encode(self.0)[..8])
    }
}

/// The party a grant is issued to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Principal {
    /// Whoever presents the bearer token with this digest.
    Bearer(BearerDigest),
    /// Whoever can sign with this verifier key.
    Verifier(VerifierKey),
}

/// Scope of a grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GrantScope {
    /// Full disclosure of every receipt.
    AllReceipts,
    /// Full disclosure of one receipt.
    Receipt(TokenId),
}

impl GrantScope {
    /// Whether this scope covers the given receipt.
    pub fn covers(&self, token_id: TokenId) -> bool {
        match self {
            GrantScope::AllReceipts => true,
            GrantScope::Receipt(t) => *t == token_id,
        }
    }
}

/// Conditions that may limit a grant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conditions {
    /// When the grant expires (Unix milliseconds).
    pub expires_at: Option<i64>,
}

impl Conditions {
    /// Create conditions with an expiration time.
    pub fn expires_at(timestamp: i64) -> Self {
        Self {
            expires_at: Some(timestamp),
        }
    }

    /// Check if these conditions are still valid.
    pub fn is_valid(&self, now: i64) -> bool {
        match self.expires_at {
            Some(expires) => now <= expires,
            None => true,
        }
    }
}

/// A grant as held in an authorization set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grant {
    pub id: GrantId,
    pub principal: Principal,
    pub scope: GrantScope,
    pub conditions: Conditions,
    pub revoked: bool,
}

impl Grant {
    /// Check if this grant is currently valid.
    pub fn is_valid(&self, now: i64) -> bool {
        !self.revoked && self.conditions.is_valid(now)
    }

    /// Whether this grant currently allows full disclosure of `token_id`.
    pub fn allows(&self, token_id: TokenId, now: i64) -> bool {
        self.is_valid(now) && self.scope.covers(token_id)
    }
}
