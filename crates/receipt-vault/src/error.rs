//! Error types for the vault pipeline.

use receipt_vault_core::{EventId, TokenId, ValidationError};
use receipt_vault_perms::PermsError;
use receipt_vault_store::StoreError;
use thiserror::Error;

/// Webhook authenticity and shape failures. Never retried.
#[derive(Debug, Error)]
pub enum IngestError {
    /// No signature header was supplied.
    #[error("missing signature header")]
    MissingSignature,

    /// The signature header could not be parsed.
    #[error("malformed signature header: {0}")]
    MalformedSignature(String),

    /// No signature in the header matches the body.
    #[error("signature mismatch")]
    SignatureMismatch,

    /// The signed timestamp is outside the replay tolerance.
    #[error("signature timestamp outside tolerance ({age_secs}s)")]
    StaleSignature { age_secs: i64 },

    /// The authenticated body is not a well-formed event.
    #[error("malformed event body: {0}")]
    MalformedBody(String),
}

/// Failure to resolve an unexpanded provider object.
#[derive(Debug, Error)]
#[error("could not resolve {kind} {id}: {reason}")]
pub struct ResolveError {
    pub kind: &'static str,
    pub id: String,
    pub reason: String,
}

/// Payload serialization and encryption errors.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("payload encoding failed: {0}")]
    Encode(String),

    #[error("payload decoding failed: {0}")]
    Decode(String),

    #[error("payload crypto failed: {0}")]
    Crypto(#[from] PermsError),
}

/// Errors from commitment issuance.
#[derive(Debug, Error)]
pub enum IssuanceError {
    /// The event can never be issued (bad shape, no recipient).
    #[error("event rejected: {0}")]
    Invalid(#[from] ValidationError),

    /// Another delivery of this event is mid-issuance.
    #[error("issuance of {0} already in progress")]
    InProgress(EventId),

    /// Store, ledger or index failure.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    /// Payload could not be sealed.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// The index points at a token the ledger does not have.
    #[error("index references missing token {0}")]
    DanglingIndex(TokenId),

    /// The detached issuance task died.
    #[error("issuance task aborted: {0}")]
    Aborted(String),
}

impl IssuanceError {
    /// Whether the caller should redeliver later.
    pub fn is_transient(&self) -> bool {
        match self {
            IssuanceError::InProgress(_) | IssuanceError::Aborted(_) => true,
            IssuanceError::Store(e) => e.is_transient(),
            _ => false,
        }
    }
}

/// Errors from verification. `Unauthorized` is a result, not an error.
#[derive(Debug, Error)]
pub enum VerifyError {
    /// No commitment for this token.
    #[error("token {0} not found")]
    NotFound(TokenId),

    /// The stored ciphertext does not match its commitment.
    #[error("integrity failure for token {token_id}: {reason}")]
    Integrity { token_id: TokenId, reason: String },

    /// Store or ledger failure.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    /// Authorization state unavailable.
    #[error("authorization state unavailable: {0}")]
    Authorization(String),
}

/// Top-level error for the event path.
#[derive(Debug, Error)]
pub enum VaultError {
    #[error(transparent)]
    Ingest(#[from] IngestError),

    #[error(transparent)]
    Issuance(#[from] IssuanceError),
}

/// Result type for vault operations.
pub type Result<T> = std::result::Result<T, VaultError>;
