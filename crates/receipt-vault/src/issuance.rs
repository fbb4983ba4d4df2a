//! Commitment issuance.
//!
//! ```text
//! validate -> claim(event_id)
//!               |- Committed(token) -> read ledger -> existing commitment
//!               |- Pending          -> poll until committed or wait budget spent
//!               |- Claimed          -> [detached] seal -> put -> append -> complete
//! ```
//!
//! The ledger append is the commit point. Nothing is appended before its
//! ciphertext is stored, and a failure before the append releases the claim
//! so a redelivery can start over. Sealing is deterministic, so a retried
//! `put` writes the same blob to the same address.

use std::sync::Arc;

use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use receipt_vault_core::{
    validate_event, CommitmentRecord, EventId, PaymentEvent, ReceiptCommitment, ReceiptPayload,
    TokenId, ValidationError,
};
use receipt_vault_store::{now_millis, ClaimOutcome, ContentStore, IdempotencyIndex, Ledger};

use crate::codec::PayloadCodec;
use crate::config::VaultConfig;
use crate::error::IssuanceError;
use crate::retry::Retry;

/// Issues exactly one commitment per payment event.
#[derive(Clone)]
pub struct IssuanceService {
    content: Arc<dyn ContentStore>,
    ledger: Arc<dyn Ledger>,
    index: Arc<dyn IdempotencyIndex>,
    codec: PayloadCodec,
    retry: Retry,
    config: Arc<VaultConfig>,
}

impl IssuanceService {
    /// Wire the service to its collaborators.
    pub fn new(
        content: Arc<dyn ContentStore>,
        ledger: Arc<dyn Ledger>,
        index: Arc<dyn IdempotencyIndex>,
        codec: PayloadCodec,
        config: Arc<VaultConfig>,
    ) -> Self {
        Self {
            content,
            ledger,
            index,
            codec,
            retry: Retry::new(config.retry.clone()),
            config,
        }
    }

    /// Issue (or look up) the commitment for `event`.
    ///
    /// Dropping the returned future before the claim is taken has no
    /// effect. Once claimed, issuance finishes on a detached task.
    pub async fn issue(&self, event: PaymentEvent) -> Result<ReceiptCommitment, IssuanceError> {
        validate_event(&event, &self.config.recipient_key)?;

        let event_id = event.event_id.clone();
        let deadline = Instant::now() + self.config.duplicate_wait;

        loop {
            match self.claim(&event_id).await? {
                ClaimOutcome::Committed(token_id) => {
                    debug!(%event_id, %token_id, "event already committed");
                    return self.existing(token_id).await;
                }
                ClaimOutcome::Pending => {
                    if Instant::now() >= deadline {
                        debug!(%event_id, "issuance still pending after wait budget");
                        return Err(IssuanceError::InProgress(event_id));
                    }
                    tokio::time::sleep(self.config.duplicate_poll).await;
                }
                ClaimOutcome::Claimed => {
                    debug!(%event_id, "claimed event for issuance");
                    let this = self.clone();
                    let task = tokio::spawn(async move { this.commit(event).await });
                    return task
                        .await
                        .map_err(|e| IssuanceError::Aborted(e.to_string()))?;
                }
            }
        }
    }

    async fn claim(&self, event_id: &EventId) -> Result<ClaimOutcome, IssuanceError> {
        let lease_ms = self.config.claim_lease.as_millis() as i64;
        let outcome = self
            .retry
            .call("index.claim", || self.index.claim(event_id, now_millis(), lease_ms))
            .await?;
        Ok(outcome)
    }

    async fn existing(&self, token_id: TokenId) -> Result<ReceiptCommitment, IssuanceError> {
        self.retry
            .call("ledger.read", || self.ledger.read(token_id))
            .await?
            .ok_or(IssuanceError::DanglingIndex(token_id))
    }

    /// Runs with the claim held. Releases it on any failure before the
    /// ledger append.
    async fn commit(&self, event: PaymentEvent) -> Result<ReceiptCommitment, IssuanceError> {
        let event_id = event.event_id.clone();

        let commitment = match self.seal_and_append(event).await {
            Ok(commitment) => commitment,
            Err(e) => {
                warn!(%event_id, error = %e, "issuance failed, releasing claim");
                if let Err(release_err) = self
                    .retry
                    .call("index.release", || self.index.release(&event_id))
                    .await
                {
                    warn!(%event_id, error = %release_err, "claim release failed, lease will expire");
                }
                return Err(e);
            }
        };

        let token_id = commitment.token_id;
        if let Err(e) = self
            .retry
            .call("index.complete", || self.index.complete(&event_id, token_id))
            .await
        {
            // The token is minted; the claim stays pending until its lease
            // runs out rather than being released for a second mint.
            error!(%event_id, %token_id, error = %e, "commitment minted but index not updated");
        }

        info!(
            %event_id,
            %token_id,
            content_address = %commitment.content_address,
            "issued receipt commitment"
        );
        Ok(commitment)
    }

    async fn seal_and_append(&self, event: PaymentEvent) -> Result<ReceiptCommitment, IssuanceError> {
        let recipient = event
            .recipient(&self.config.recipient_key)
            .map(str::to_owned)
            .ok_or_else(|| ValidationError::MissingRecipient(self.config.recipient_key.clone()))?;

        let payload = ReceiptPayload::new(event, self.config.merchant.clone());
        let integrity_hash = PayloadCodec::integrity_hash(&payload);
        let blob = self.codec.seal(&payload)?;

        let content_address = self
            .retry
            .call("content.put", || self.content.put(&blob))
            .await?;
        debug!(event_id = %payload.event.event_id, %content_address, "stored sealed payload");

        let record = CommitmentRecord {
            integrity_hash,
            content_address,
            recipient,
            issued_at: now_millis(),
        };
        let token_id = self
            .retry
            .call("ledger.append", || self.ledger.append(&record))
            .await?;

        Ok(ReceiptCommitment::from_record(token_id, record))
    }
}

impl std::fmt::Debug for IssuanceService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IssuanceService")
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::RetryConfig;
    use receipt_vault_core::LineItem;
    use receipt_vault_perms::MasterKeyProvider;
    use receipt_vault_store::{
        MemoryContentStore, MemoryIdempotencyIndex, MemoryLedger, StoreError,
    };
    use std::time::Duration;

    struct Fixture {
        service: IssuanceService,
        content: Arc<MemoryContentStore>,
        ledger: Arc<MemoryLedger>,
        index: Arc<MemoryIdempotencyIndex>,
    }

    fn fixture_with(config: VaultConfig) -> Fixture {
        let content = Arc::new(MemoryContentStore::new());
        let ledger = Arc::new(MemoryLedger::new());
        let index = Arc::new(MemoryIdempotencyIndex::new());
        let codec = PayloadCodec::new(Arc::new(MasterKeyProvider::new([7; 32])));
        let service = IssuanceService::new(
            content.clone(),
            ledger.clone(),
            index.clone(),
            codec,
            Arc::new(config),
        );
        Fixture {
            service,
            content,
            ledger,
            index,
        }
    }

    fn fixture() -> Fixture {
        fixture_with(VaultConfig::default().with_retry(RetryConfig::fast()))
    }

    fn event(id: &str) -> PaymentEvent {
        PaymentEvent::new(id, 1250, "usd", 1_700_000_000_000)
            .with_line_item(LineItem::new("Coffee", 450, 1))
            .with_line_item(LineItem::new("Donut", 299, 2))
            .with_metadata("recipient", "acct_abc")
    }

    #[tokio::test]
    async fn test_issue_commits_once() {
        let f = fixture();
        let first = f.service.issue(event("evt_1")).await.unwrap();
        let second = f.service.issue(event("evt_1")).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(first.recipient, "acct_abc");
        assert_eq!(f.ledger.len(), 1);
        assert_eq!(f.content.len(), 1);
    }

    #[tokio::test]
    async fn test_distinct_events_get_distinct_tokens() {
        let f = fixture();
        let a = f.service.issue(event("evt_1")).await.unwrap();
        let b = f.service.issue(event("evt_2")).await.unwrap();
        assert_ne!(a.token_id, b.token_id);
        assert_ne!(a.content_address, b.content_address);
    }

    #[tokio::test]
    async fn test_invalid_event_rejected_without_claim() {
        let f = fixture();
        let no_recipient = PaymentEvent::new("evt_1", 100, "usd", 0);
        let err = f.service.issue(no_recipient).await.unwrap_err();
        assert!(matches!(err, IssuanceError::Invalid(ValidationError::MissingRecipient(_))));
        assert!(!err.is_transient());

        let outcome = f
            .index
            .claim(&EventId::new("evt_1"), now_millis(), 1000)
            .await
            .unwrap();
        assert_eq!(outcome, ClaimOutcome::Claimed);
    }

    #[tokio::test]
    async fn test_pending_claim_reports_in_progress() {
        let f = fixture_with(
            VaultConfig::default()
                .with_retry(RetryConfig::none())
                .with_duplicate_wait(Duration::from_millis(50)),
        );
        f.index
            .claim(&EventId::new("evt_1"), now_millis(), 60_000)
            .await
            .unwrap();

        let err = f.service.issue(event("evt_1")).await.unwrap_err();
        assert!(matches!(err, IssuanceError::InProgress(_)));
        assert!(err.is_transient());
        assert_eq!(f.ledger.len(), 0);
    }

    #[tokio::test]
    async fn test_expired_claim_taken_over() {
        let f = fixture();
        f.index
            .claim(&EventId::new("evt_1"), now_millis() - 10_000, 1)
            .await
            .unwrap();

        let commitment = f.service.issue(event("evt_1")).await.unwrap();
        assert_eq!(f.ledger.len(), 1);
        assert_eq!(commitment.token_id, TokenId(1));
    }

    #[tokio::test]
    async fn test_dangling_index_detected() {
        let f = fixture();
        let event_id = EventId::new("evt_1");
        f.index.claim(&event_id, now_millis(), 60_000).await.unwrap();
        f.index.complete(&event_id, TokenId(99)).await.unwrap();

        let err = f.service.issue(event("evt_1")).await.unwrap_err();
        assert!(matches!(err, IssuanceError::DanglingIndex(TokenId(99))));
    }

    #[tokio::test]
    async fn test_failed_store_releases_claim() {
        struct DownStore;

        #[async_trait::async_trait]
        impl ContentStore for DownStore {
            async fn put(&self, _: &[u8]) -> receipt_vault_store::Result<receipt_vault_core::ContentAddress> {
                Err(StoreError::Unavailable("down".into()))
            }
            async fn get(
                &self,
                _: &receipt_vault_core::ContentAddress,
            ) -> receipt_vault_store::Result<Option<Vec<u8>>> {
                Err(StoreError::Unavailable("down".into()))
            }
        }

        let ledger = Arc::new(MemoryLedger::new());
        let index = Arc::new(MemoryIdempotencyIndex::new());
        let service = IssuanceService::new(
            Arc::new(DownStore),
            ledger.clone(),
            index.clone(),
            PayloadCodec::new(Arc::new(MasterKeyProvider::new([7; 32]))),
            Arc::new(VaultConfig::default().with_retry(RetryConfig::fast())),
        );

        let err = service.issue(event("evt_1")).await.unwrap_err();
        assert!(err.is_transient());
        assert_eq!(ledger.len(), 0);

        // Released: the next delivery can claim again.
        let outcome = index
            .claim(&EventId::new("evt_1"), now_millis(), 1000)
            .await
            .unwrap();
        assert_eq!(outcome, ClaimOutcome::Claimed);
    }

    #[tokio::test]
    async fn test_concurrent_duplicates_share_one_commitment() {
        let f = fixture();
        let mut handles = Vec::new();
        for _ in 0..8 {
            let service = f.service.clone();
            handles.push(tokio::spawn(async move { service.issue(event("evt_1")).await }));
        }

        let mut tokens = Vec::new();
        for handle in handles {
            tokens.push(handle.await.unwrap().unwrap().token_id);
        }
        tokens.dedup();
        assert_eq!(tokens, vec![TokenId(1)]);
        assert_eq!(f.ledger.len(), 1);
    }
}
