//! # Receipt Vault Core
//!
//! Pure primitives for the receipt vault: payment events, receipt payloads,
//! commitments, and the canonical encoding their integrity hashes are
//! computed over.
//!
//! This crate contains no I/O, no storage, no networking.
//!
//! ## Key Types
//!
//! - [`PaymentEvent`] - Provider-agnostic form of a completed payment
//! - [`ReceiptPayload`] - Event plus merchant context; split into a
//!   sensitive subset and a [`PublicSummary`]
//! - [`ReceiptCommitment`] - The immutable ledger record
//! - [`IntegrityHash`] - Domain-separated Blake3 hash of the sensitive subset
//! - [`ContentAddress`] - Blake3 hash of an encrypted blob
//!
//! ## Canonicalization
//!
//! The sensitive subset is encoded using deterministic CBOR. See [`canonical`].

pub mod canonical;
pub mod commitment;
pub mod crypto;
pub mod error;
pub mod event;
pub mod payload;
pub mod types;
pub mod validation;

pub use canonical::canonical_sensitive_bytes;
pub use commitment::{CommitmentRecord, ReceiptCommitment};
pub use crypto::{IntegrityHash, VerifierKey, VerifierKeypair, VerifierSignature};
pub use error::{CoreError, ValidationError};
pub use event::{LineItem, Metadata, PaymentEvent, PaymentInstrument};
pub use payload::{MerchantContext, PublicSummary, ReceiptPayload, SensitiveSubset};
pub use types::{ContentAddress, EventId, TokenId};
pub use validation::validate_event;
