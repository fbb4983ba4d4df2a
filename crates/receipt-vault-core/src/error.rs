//! Error types for the receipt vault core.

use thiserror::Error;

/// Core errors that can occur while building or encoding receipt data.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid signature")]
    InvalidSignature,

    #[error("invalid public key")]
    InvalidPublicKey,

    #[error("invalid identifier: {0}")]
    InvalidIdentifier(String),

    #[error("encoding error: {0}")]
    EncodingError(String),

    #[error("decoding error: {0}")]
    DecodingError(String),
}

/// Validation errors for payment events before issuance.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("event id is empty")]
    EmptyEventId,

    #[error("currency {0:?} is not a three-letter ISO code")]
    InvalidCurrency(String),

    #[error("line item {index} has zero quantity")]
    ZeroQuantity { index: usize },

    #[error("line item {index} description is empty")]
    EmptyDescription { index: usize },

    #[error("line item amounts overflow")]
    AmountOverflow,

    #[error("recipient metadata key {0:?} is missing")]
    MissingRecipient(String),
}
