//! Service configuration.

use std::time::Duration;

use receipt_vault_core::MerchantContext;

use crate::retry::RetryConfig;

/// Event type emitted when a payment intent succeeds.
pub const PAYMENT_INTENT_SUCCEEDED: &str = "payment_intent.succeeded";

/// Event type emitted when a checkout session completes.
pub const CHECKOUT_SESSION_COMPLETED: &str = "checkout.session.completed";

/// Configuration for the vault pipeline.
#[derive(Debug, Clone)]
pub struct VaultConfig {
    /// Merchant context attached to every payload.
    pub merchant: MerchantContext,
    /// Metadata key carrying the recipient's public identifier.
    pub recipient_key: String,
    /// Maximum accepted age (or clock skew) of a webhook signature.
    pub signature_tolerance: Duration,
    /// Event types that produce a payment event; others are acknowledged
    /// and ignored.
    pub accepted_event_types: Vec<String>,
    /// Retry policy for store, ledger and index calls.
    pub retry: RetryConfig,
    /// How long a duplicate delivery waits on a pending claim before
    /// reporting the event as in progress.
    pub duplicate_wait: Duration,
    /// Poll interval while waiting on a pending claim.
    pub duplicate_poll: Duration,
    /// Lease on an issuance claim; an expired claim may be taken over.
    pub claim_lease: Duration,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            merchant: MerchantContext::new("Merchant"),
            recipient_key: "recipient".into(),
            signature_tolerance: Duration::from_secs(300),
            accepted_event_types: vec![
                PAYMENT_INTENT_SUCCEEDED.into(),
                CHECKOUT_SESSION_COMPLETED.into(),
            ],
            retry: RetryConfig::default(),
            duplicate_wait: Duration::from_secs(2),
            duplicate_poll: Duration::from_millis(25),
            claim_lease: Duration::from_secs(60),
        }
    }
}

impl VaultConfig {
    /// Set the merchant context.
    pub fn with_merchant(mut self, merchant: MerchantContext) -> Self {
        self.merchant = merchant;
        self
    }

    /// Set the recipient metadata key.
    pub fn with_recipient_key(mut self, key: impl Into<String>) -> Self {
        self.recipient_key = key.into();
        self
    }

    /// Set the signature tolerance.
    pub fn with_signature_tolerance(mut self, tolerance: Duration) -> Self {
        self.signature_tolerance = tolerance;
        self
    }

    /// Replace the accepted event types.
    pub fn with_accepted_event_types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.accepted_event_types = types.into_iter().map(Into::into).collect();
        self
    }

    /// Set the retry policy.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Set the duplicate wait budget.
    pub fn with_duplicate_wait(mut self, wait: Duration) -> Self {
        self.duplicate_wait = wait;
        self
    }

    /// Set the claim lease.
    pub fn with_claim_lease(mut self, lease: Duration) -> Self {
        self.claim_lease = lease;
        self
    }

    /// Whether events of this type are processed.
    pub fn accepts(&self, event_type: &str) -> bool {
        self.accepted_event_types.iter().any(|t| t == event_type)
    }
}
