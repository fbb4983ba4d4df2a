//! Scenario and encoding vectors.
//!
//! The coffee-shop scenario: event `evt_1`, 1250 usd, one Coffee at 450 and
//! two Donuts at 299, issued to `acct_abc`. Line items sum to 1048; the
//! remainder of the amount is tax and tip.

use receipt_vault_core::{LineItem, PaymentEvent};
use serde_json::json;

/// Event id of the scenario.
pub const COFFEE_EVENT_ID: &str = "evt_1";

/// Recipient of the scenario receipt.
pub const COFFEE_RECIPIENT: &str = "acct_abc";

/// Provider creation time of the scenario event, Unix seconds.
pub const COFFEE_CREATED: i64 = 1_736_870_400;

/// Sum of the scenario line items.
pub const COFFEE_SUBTOTAL: u64 = 1048;

/// The scenario as a normalized event.
pub fn coffee_event() -> PaymentEvent {
    PaymentEvent::new(COFFEE_EVENT_ID, 1250, "usd", COFFEE_CREATED * 1000)
        .with_payer_contact("payer@example.com")
        .with_instrument("visa", "4242")
        .with_line_item(LineItem::new("Coffee", 450, 1))
        .with_line_item(LineItem::new("Donut", 299, 2))
        .with_metadata("recipient", COFFEE_RECIPIENT)
}

/// The scenario as a `payment_intent.succeeded` webhook body with every
/// nested object expanded.
pub fn coffee_webhook_body() -> Vec<u8> {
    webhook_body(
        COFFEE_EVENT_ID,
        "payment_intent.succeeded",
        json!({
            "id": "pi_1",
            "object": "payment_intent",
            "amount": 1250,
            "currency": "usd",
            "customer": { "id": "cus_1", "email": "payer@example.com" },
            "payment_method": { "card": { "brand": "visa", "last4": "4242" } },
            "metadata": { "recipient": COFFEE_RECIPIENT },
            "line_items": { "data": [
                { "description": "Coffee", "quantity": 1, "price": { "unit_amount": 450 } },
                { "description": "Donut", "quantity": 2, "price": { "unit_amount": 299 } }
            ]}
        }),
    )
}

/// A webhook body of the given type wrapping `object`.
pub fn webhook_body(event_id: &str, event_type: &str, object: serde_json::Value) -> Vec<u8> {
    json!({
        "id": event_id,
        "type": event_type,
        "created": COFFEE_CREATED,
        "data": { "object": object }
    })
    .to_string()
    .into_bytes()
}

/// Expected canonical bytes of a sensitive subset.
#[derive(Debug, Clone)]
pub struct CanonicalVector {
    pub name: &'static str,
    pub event: PaymentEvent,
    /// Expected canonical encoding (hex).
    pub expected_hex: &'static str,
}

/// Canonical encoding vectors.
pub fn canonical_vectors() -> Vec<CanonicalVector> {
    vec![
        CanonicalVector {
            name: "bare event",
            event: PaymentEvent::new("evt_1", 1250, "usd", 0),
            // {0: "evt_1", 1: 1250, 2: "usd", 3: null, 4: null, 5: [], 6: {}}
            expected_hex: "a700656576745f31011904e20263757364\
                           03f604f6058006a0",
        },
        CanonicalVector {
            name: "one line item and metadata",
            event: PaymentEvent::new("e", 5, "eur", 0)
                .with_line_item(LineItem::new("x", 2, 3))
                .with_metadata("k", "v"),
            // {0: "e", 1: 5, 2: "eur", 3: null, 4: null,
            //  5: [{0: "x", 1: 2, 2: 3}], 6: {"k": "v"}}
            expected_hex: "a7006165010502636575720\
                           3f604f60581a3006178010202030\
                           6a1616b6176",
        },
    ]
}
