//! Proptest generators for property-based testing.
//!
//! Generated events always pass validation: a recipient is present,
//! quantities are positive, and line-item totals cannot overflow.

use proptest::collection::{btree_map, vec};
use proptest::prelude::*;

use receipt_vault_core::{LineItem, PaymentEvent};

/// Generate a currency code.
pub fn currency() -> impl Strategy<Value = String> {
    prop_oneof![Just("usd"), Just("eur"), Just("gbp"), Just("jpy")].prop_map(str::to_owned)
}

/// Generate an event id.
pub fn event_id() -> impl Strategy<Value = String> {
    "evt_[A-Za-z0-9]{1,24}"
}

/// Generate a line item.
pub fn line_item() -> impl Strategy<Value = LineItem> {
    ("[A-Za-z][A-Za-z ]{0,31}", 0u64..=1_000_000, 1u64..=100)
        .prop_map(|(description, unit_amount, quantity)| {
            LineItem::new(description, unit_amount, quantity)
        })
}

/// Generate an optional payer contact.
pub fn payer_contact() -> impl Strategy<Value = Option<String>> {
    proptest::option::of("[a-z]{1,12}@example\\.com")
}

/// Generate a valid payment event carrying a `recipient` entry.
pub fn payment_event() -> impl Strategy<Value = PaymentEvent> {
    (
        event_id(),
        0u64..=100_000_000,
        currency(),
        0i64..=4_102_444_800_000,
        payer_contact(),
        vec(line_item(), 0..6),
        btree_map("[a-z_]{1,12}", "[ -~]{0,24}", 0..4),
        "acct_[a-z0-9]{1,16}",
    )
        .prop_map(
            |(id, amount, currency, received_at, contact, items, metadata, recipient)| {
                let mut event = PaymentEvent::new(id, amount, currency, received_at);
                event.payer_contact = contact;
                event.line_items = items;
                event.metadata = metadata;
                event.metadata.insert("recipient".into(), recipient);
                event
            },
        )
}
