//! ReceiptPayload: the full receipt detail protected by the vault.
//!
//! A payload is conceptually split in two:
//!
//! - the **sensitive subset**, whose integrity hash is committed to the
//!   ledger and which is only ever disclosed to credentialed verifiers;
//! - the **public subset**, a summary that is safe to show anyone.

use serde::{Deserialize, Serialize};

use crate::canonical::canonical_sensitive_bytes;
use crate::crypto::IntegrityHash;
use crate::event::{LineItem, Metadata, PaymentEvent, PaymentInstrument};
use crate::types::EventId;

/// Merchant and category context attached at issuance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerchantContext {
    /// Display name of the merchant.
    pub merchant_name: String,

    /// Merchant category, if known.
    pub category: Option<String>,
}

impl MerchantContext {
    /// Create a context with no category.
    pub fn new(merchant_name: impl Into<String>) -> Self {
        Self {
            merchant_name: merchant_name.into(),
            category: None,
        }
    }

    /// Set the category.
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }
}

/// The complete receipt: payment event plus merchant context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiptPayload {
    /// The normalized payment.
    pub event: PaymentEvent,

    /// Merchant context resolved at issuance.
    pub merchant: MerchantContext,
}

/// Borrowed view over the fields whose hash is committed.
#[derive(Debug, Clone, Copy)]
pub struct SensitiveSubset<'a> {
    pub event_id: &'a EventId,
    pub amount: u64,
    pub currency: &'a str,
    pub payer_contact: Option<&'a str>,
    pub instrument: Option<&'a PaymentInstrument>,
    pub line_items: &'a [LineItem],
    pub metadata: &'a Metadata,
}

/// Summary that may be disclosed without a credential check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicSummary {
    pub merchant_name: String,
    pub category: Option<String>,
    /// Payment date (Unix milliseconds).
    pub date: i64,
    /// Total charged in minor units.
    pub total: u64,
    pub currency: String,
}

impl ReceiptPayload {
    /// Build a payload from an event and merchant context.
    pub fn new(event: PaymentEvent, merchant: MerchantContext) -> Self {
        Self { event, merchant }
    }

    /// Borrow the sensitive subset.
    pub fn sensitive_subset(&self) -> SensitiveSubset<'_> {
        SensitiveSubset {
            event_id: &self.event.event_id,
            amount: self.event.amount,
            currency: &self.event.currency,
            payer_contact: self.event.payer_contact.as_deref(),
            instrument: self.event.instrument.as_ref(),
            line_items: &self.event.line_items,
            metadata: &self.event.metadata,
        }
    }

    /// Integrity hash of the sensitive subset.
    pub fn integrity_hash(&self) -> IntegrityHash {
        IntegrityHash::compute(&canonical_sensitive_bytes(&self.sensitive_subset()))
    }

    /// The public summary.
    pub fn public_summary(&self) -> PublicSummary {
        PublicSummary {
            merchant_name: self.merchant.merchant_name.clone(),
            category: self.merchant.category.clone(),
            date: self.event.received_at,
            total: self.event.amount,
            currency: self.event.currency.clone(),
        }
    }
}
