//! ReceiptCommitment: the immutable ledger record.
//!
//! A commitment binds a token id to an integrity hash and a content address
//! without revealing the receipt itself. It is written once and never edited.

use serde::{Deserialize, Serialize};

use crate::crypto::IntegrityHash;
use crate::types::{ContentAddress, TokenId};

/// The fields appended to the ledger; the ledger mints the token id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitmentRecord {
    /// Hash of the sensitive subset.
    pub integrity_hash: IntegrityHash,

    /// Where the encrypted payload lives.
    pub content_address: ContentAddress,

    /// Public identifier of the receipt holder.
    pub recipient: String,

    /// When the commitment was issued (Unix milliseconds).
    pub issued_at: i64,
}

/// A commitment as read back from the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiptCommitment {
    /// Ledger-minted identifier.
    pub token_id: TokenId,

    /// Hash of the sensitive subset.
    pub integrity_hash: IntegrityHash,

    /// Where the encrypted payload lives.
    pub content_address: ContentAddress,

    /// Public identifier of the receipt holder.
    pub recipient: String,

    /// When the commitment was issued (Unix milliseconds).
    pub issued_at: i64,
}

impl ReceiptCommitment {
    /// Attach a freshly minted token id to a record.
    pub fn from_record(token_id: TokenId, record: CommitmentRecord) -> Self {
        Self {
            token_id,
            integrity_hash: record.integrity_hash,
            content_address: record.content_address,
            recipient: record.recipient,
            issued_at: record.issued_at,
        }
    }

    /// Strip the token id back off.
    pub fn record(&self) -> CommitmentRecord {
        CommitmentRecord {
            integrity_hash: self.integrity_hash,
            content_address: self.content_address,
            recipient: self.recipient.clone(),
            issued_at: self.issued_at,
        }
    }
}
