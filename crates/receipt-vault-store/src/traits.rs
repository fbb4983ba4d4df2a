//! Store traits: the abstract interfaces to the three external collaborators.
//!
//! The vault never talks to a concrete ledger or blob store directly; it is
//! handed trait objects at construction. Implementations here are SQLite
//! (single-node deployments) and in-memory (tests).

use async_trait::async_trait;
use receipt_vault_core::{CommitmentRecord, ContentAddress, EventId, ReceiptCommitment, TokenId};

use crate::error::Result;

/// Content-addressed blob storage.
///
/// `put` is deterministic: the same bytes always yield the same address,
/// and writing them again is a no-op.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Store a blob and return its address.
    async fn put(&self, bytes: &[u8]) -> Result<ContentAddress>;

    /// Fetch a blob by address.
    async fn get(&self, address: &ContentAddress) -> Result<Option<Vec<u8>>>;
}

/// Append-only commitment ledger.
///
/// The ledger is the single source of truth for whether a token exists.
/// Records are never updated or removed.
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Append a record and mint its token id.
    async fn append(&self, record: &CommitmentRecord) -> Result<TokenId>;

    /// Read a commitment by token id.
    async fn read(&self, token_id: TokenId) -> Result<Option<ReceiptCommitment>>;
}

/// Result of trying to claim an event id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimOutcome {
    /// The caller now owns issuance for this event.
    Claimed,
    /// Another worker holds a live claim.
    Pending,
    /// The event was already committed under this token.
    Committed(TokenId),
}

/// Maps event ids to the token minted for them.
///
/// `claim` is an atomic check-and-set: for one event id at most one caller
/// observes `Claimed` while the claim is live.
#[async_trait]
pub trait IdempotencyIndex: Send + Sync {
    /// Try to claim an event.
    ///
    /// A pending claim whose lease expired before `now` is handed to the new
    /// caller. Times are Unix milliseconds.
    async fn claim(&self, event_id: &EventId, now: i64, lease_ms: i64) -> Result<ClaimOutcome>;

    /// Mark a claimed event as committed.
    async fn complete(&self, event_id: &EventId, token_id: TokenId) -> Result<()>;

    /// Drop a pending claim so the event can be retried.
    ///
    /// Committed entries are left untouched.
    async fn release(&self, event_id: &EventId) -> Result<()>;
}
