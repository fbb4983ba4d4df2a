//! In-memory implementations of the store traits.
//!
//! These are primarily for testing. They have the same semantics as the
//! SQLite backend but keep everything in memory with no persistence.

use std::collections::HashMap;
use std::sync::{Mutex, RwLock};

use async_trait::async_trait;
use receipt_vault_core::{CommitmentRecord, ContentAddress, EventId, ReceiptCommitment, TokenId};

use crate::error::{Result, StoreError};
use crate::traits::{ClaimOutcome, ContentStore, IdempotencyIndex, Ledger};

/// In-memory content-addressed store.
#[derive(Default)]
pub struct MemoryContentStore {
    blobs: RwLock<HashMap<ContentAddress, Vec<u8>>>,
}

impl MemoryContentStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct blobs held.
    pub fn len(&self) -> usize {
        self.blobs.read().map(|b| b.len()).unwrap_or(0)
    }

    /// Whether no blobs are held.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Overwrite the bytes stored under an address.
    ///
    /// Lets tests simulate tampering in the backing store.
    pub fn overwrite(&self, address: &ContentAddress, bytes: Vec<u8>) -> Result<()> {
        self.blobs.write()?.insert(*address, bytes);
        Ok(())
    }

    /// Remove a blob, simulating data loss.
    pub fn remove(&self, address: &ContentAddress) -> Result<()> {
        self.blobs.write()?.remove(address);
        Ok(())
    }
}

#[async_trait]
impl ContentStore for MemoryContentStore {
    async fn put(&self, bytes: &[u8]) -> Result<ContentAddress> {
        let address = ContentAddress::for_bytes(bytes);
        self.blobs
            .write()?
            .entry(address)
            .or_insert_with(|| bytes.to_vec());
        Ok(address)
    }

    async fn get(&self, address: &ContentAddress) -> Result<Option<Vec<u8>>> {
        Ok(self.blobs.read()?.get(address).cloned())
    }
}

/// In-memory append-only ledger. Token ids start at 1.
#[derive(Default)]
pub struct MemoryLedger {
    records: RwLock<Vec<ReceiptCommitment>>,
}

impl MemoryLedger {
    /// Create a new empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of commitments appended so far.
    pub fn len(&self) -> usize {
        self.records.read().map(|r| r.len()).unwrap_or(0)
    }

    /// Whether nothing has been appended.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl Ledger for MemoryLedger {
    async fn append(&self, record: &CommitmentRecord) -> Result<TokenId> {
        let mut records = self.records.write()?;
        let token_id = TokenId(records.len() as u64 + 1);
        records.push(ReceiptCommitment::from_record(token_id, record.clone()));
        Ok(token_id)
    }

    async fn read(&self, token_id: TokenId) -> Result<Option<ReceiptCommitment>> {
        let records = self.records.read()?;
        let Some(index) = token_id.value().checked_sub(1) else {
            return Ok(None);
        };
        Ok(records.get(index as usize).cloned())
    }
}

#[derive(Debug, Clone, Copy)]
enum IndexEntry {
    Pending { lease_expires_at: i64 },
    Committed(TokenId),
}

/// In-memory idempotency index.
#[derive(Default)]
pub struct MemoryIdempotencyIndex {
    entries: Mutex<HashMap<EventId, IndexEntry>>,
}

impl MemoryIdempotencyIndex {
    /// Create a new empty index.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl IdempotencyIndex for MemoryIdempotencyIndex {
    async fn claim(&self, event_id: &EventId, now: i64, lease_ms: i64) -> Result<ClaimOutcome> {
        let mut entries = self.entries.lock()?;
        let lease_expires_at = now.saturating_add(lease_ms);

        match entries.get(event_id) {
            Some(IndexEntry::Committed(token_id)) => Ok(ClaimOutcome::Committed(*token_id)),
            Some(IndexEntry::Pending { lease_expires_at: expires }) if *expires > now => {
                Ok(ClaimOutcome::Pending)
            }
            _ => {
                entries.insert(event_id.clone(), IndexEntry::Pending { lease_expires_at });
                Ok(ClaimOutcome::Claimed)
            }
        }
    }

    async fn complete(&self, event_id: &EventId, token_id: TokenId) -> Result<()> {
        let mut entries = self.entries.lock()?;
        match entries.get(event_id) {
            Some(IndexEntry::Pending { .. }) => {
                entries.insert(event_id.clone(), IndexEntry::Committed(token_id));
                Ok(())
            }
            Some(IndexEntry::Committed(existing)) if *existing == token_id => Ok(()),
            _ => Err(StoreError::NotClaimed(event_id.to_string())),
        }
    }

    async fn release(&self, event_id: &EventId) -> Result<()> {
        let mut entries = self.entries.lock()?;
        if matches!(entries.get(event_id), Some(IndexEntry::Pending { .. })) {
            entries.remove(event_id);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use receipt_vault_core::IntegrityHash;

    fn record(n: u8) -> CommitmentRecord {
        CommitmentRecord {
            integrity_hash: IntegrityHash::from_bytes([n; 32]),
            content_address: ContentAddress::from_bytes([n; 32]),
            recipient: format!("acct_{n}"),
            issued_at: n as i64,
        }
    }

    #[tokio::test]
    async fn test_put_is_content_addressed_and_idempotent() {
        let store = MemoryContentStore::new();
        let a = store.put(b"blob").await.unwrap();
        let b = store.put(b"blob").await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a, ContentAddress::for_bytes(b"blob"));
        assert_eq!(store.len(), 1);
        assert_eq!(store.get(&a).await.unwrap().as_deref(), Some(&b"blob"[..]));
    }

    #[tokio::test]
    async fn test_get_missing() {
        let store = MemoryContentStore::new();
        let missing = ContentAddress::for_bytes(b"nope");
        assert!(store.get(&missing).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_ledger_mints_sequential_tokens() {
        let ledger = MemoryLedger::new();
        assert_eq!(ledger.append(&record(1)).await.unwrap(), TokenId(1));
        assert_eq!(ledger.append(&record(2)).await.unwrap(), TokenId(2));

        let read = ledger.read(TokenId(2)).await.unwrap().unwrap();
        assert_eq!(read.token_id, TokenId(2));
        assert_eq!(read.record(), record(2));

        assert!(ledger.read(TokenId(0)).await.unwrap().is_none());
        assert!(ledger.read(TokenId(3)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_claim_lifecycle() {
        let index = MemoryIdempotencyIndex::new();
        let evt = EventId::new("evt_1");

        assert_eq!(index.claim(&evt, 0, 1000).await.unwrap(), ClaimOutcome::Claimed);
        assert_eq!(index.claim(&evt, 10, 1000).await.unwrap(), ClaimOutcome::Pending);

        index.complete(&evt, TokenId(5)).await.unwrap();
        assert_eq!(
            index.claim(&evt, 20, 1000).await.unwrap(),
            ClaimOutcome::Committed(TokenId(5))
        );

        // Release never undoes a commitment.
        index.release(&evt).await.unwrap();
        assert_eq!(
            index.claim(&evt, 30, 1000).await.unwrap(),
            ClaimOutcome::Committed(TokenId(5))
        );
    }

    #[tokio::test]
    async fn test_release_allows_reclaim() {
        let index = MemoryIdempotencyIndex::new();
        let evt = EventId::new("evt_1");

        assert_eq!(index.claim(&evt, 0, 1000).await.unwrap(), ClaimOutcome::Claimed);
        index.release(&evt).await.unwrap();
        assert_eq!(index.claim(&evt, 1, 1000).await.unwrap(), ClaimOutcome::Claimed);
    }

    #[tokio::test]
    async fn test_expired_lease_taken_over() {
        let index = MemoryIdempotencyIndex::new();
        let evt = EventId::new("evt_1");

        assert_eq!(index.claim(&evt, 0, 100).await.unwrap(), ClaimOutcome::Claimed);
        assert_eq!(index.claim(&evt, 99, 100).await.unwrap(), ClaimOutcome::Pending);
        assert_eq!(index.claim(&evt, 100, 100).await.unwrap(), ClaimOutcome::Claimed);
    }

    #[tokio::test]
    async fn test_complete_without_claim() {
        let index = MemoryIdempotencyIndex::new();
        let err = index
            .complete(&EventId::new("evt_x"), TokenId(1))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotClaimed(_)));
    }
}
