//! PaymentEvent: the canonical, provider-agnostic form of a completed payment.
//!
//! Provider webhooks are normalized into this shape before anything else in
//! the vault sees them.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::types::EventId;

/// Metadata attached to a payment by the merchant.
///
/// A `BTreeMap` so that iteration (and therefore every encoding derived
/// from it) is deterministic.
pub type Metadata = BTreeMap<String, String>;

/// One purchased line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    /// Human-readable description.
    pub description: String,

    /// Price of one unit in minor currency units.
    pub unit_amount: u64,

    /// Number of units.
    pub quantity: u64,
}

impl LineItem {
    /// Create a new line item.
    pub fn new(description: impl Into<String>, unit_amount: u64, quantity: u64) -> Self {
        Self {
            description: description.into(),
            unit_amount,
            quantity,
        }
    }

    /// `unit_amount * quantity`, or `None` on overflow.
    pub fn total(&self) -> Option<u64> {
        self.unit_amount.checked_mul(self.quantity)
    }
}

/// A fragment of the payment instrument (never the full number).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentInstrument {
    /// Card brand or instrument family, e.g. `visa`.
    pub brand: String,

    /// Last four digits.
    pub last4: String,
}

/// A completed payment in canonical form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentEvent {
    /// Provider-unique id, used as the idempotency key.
    pub event_id: EventId,

    /// Total charged, in minor currency units.
    pub amount: u64,

    /// Lowercase ISO 4217 code.
    pub currency: String,

    /// Payer email or phone, when the provider exposes one.
    pub payer_contact: Option<String>,

    /// Instrument fragment, when the provider exposes one.
    pub instrument: Option<PaymentInstrument>,

    /// Purchased lines, in provider order.
    pub line_items: Vec<LineItem>,

    /// Merchant metadata; carries the recipient's public identifier.
    pub metadata: Metadata,

    /// When the provider created the event (Unix milliseconds).
    ///
    /// Taken from the provider rather than the local clock so that
    /// redeliveries normalize to identical events.
    pub received_at: i64,
}

impl PaymentEvent {
    /// Start a new event with no line items or metadata.
    pub fn new(
        event_id: impl Into<EventId>,
        amount: u64,
        currency: impl Into<String>,
        received_at: i64,
    ) -> Self {
        Self {
            event_id: event_id.into(),
            amount,
            currency: currency.into().to_ascii_lowercase(),
            payer_contact: None,
            instrument: None,
            line_items: Vec::new(),
            metadata: Metadata::new(),
            received_at,
        }
    }

    /// Append a line item.
    pub fn with_line_item(mut self, item: LineItem) -> Self {
        self.line_items.push(item);
        self
    }

    /// Set a metadata entry.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Set the payer contact.
    pub fn with_payer_contact(mut self, contact: impl Into<String>) -> Self {
        self.payer_contact = Some(contact.into());
        self
    }

    /// Set the instrument fragment.
    pub fn with_instrument(mut self, brand: impl Into<String>, last4: impl Into<String>) -> Self {
        self.instrument = Some(PaymentInstrument {
            brand: brand.into(),
            last4: last4.into(),
        });
        self
    }

    /// Look up the recipient's public identifier under `key`.
    pub fn recipient(&self, key: &str) -> Option<&str> {
        self.metadata
            .get(key)
            .map(String::as_str)
            .filter(|r| !r.trim().is_empty())
    }

    /// Sum of line item totals, or `None` on overflow.
    pub fn subtotal(&self) -> Option<u64> {
        self.line_items
            .iter()
            .try_fold(0u64, |acc, item| acc.checked_add(item.total()?))
    }
}
