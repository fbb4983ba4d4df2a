//! Error types for the permissions module.

use thiserror::Error;

/// Errors that can occur during permission and encryption operations.
#[derive(Debug, Error)]
pub enum PermsError {
    /// No live grant covers this credential and receipt.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// Grant not found.
    #[error("grant not found: {0}")]
    GrantNotFound(String),

    /// The credential could not be parsed or its signature is bad.
    #[error("invalid credential: {0}")]
    InvalidCredential(String),

    /// The credential's own expiry has passed.
    #[error("credential expired at {0}")]
    CredentialExpired(i64),

    /// Encryption error.
    #[error("encryption error: {0}")]
    EncryptionError(String),

    /// Decryption error (including a failed authentication tag).
    #[error("decryption error: {0}")]
    DecryptionError(String),

    /// Key derivation error.
    #[error("key derivation error: {0}")]
    KeyDerivationError(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    SerializationError(String),

    /// Core error.
    #[error("core error: {0}")]
    CoreError(#[from] receipt_vault_core::CoreError),
}

/// Result type for permission operations.
pub type Result<T> = std::result::Result<T, PermsError>;
