//! Normalization of provider webhook bodies into [`PaymentEvent`]s.
//!
//! Both payment intents and checkout sessions are understood. Nested objects
//! may arrive expanded or as bare ids; bare ids go through the
//! [`ObjectResolver`], and any resolution failure leaves that part of the
//! event empty rather than failing the request.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Deserialize;
use tracing::{debug, warn};

use receipt_vault_core::{LineItem, PaymentEvent};

use crate::error::IngestError;
use crate::ingest::resolver::{
    lenient, CustomerObject, LineItemObject, ObjectResolver, PaymentMethodObject,
};

/// Object type tag of a checkout session.
const CHECKOUT_SESSION_OBJECT: &str = "checkout.session";

/// The outer webhook envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEnvelope {
    /// Provider event id; the idempotency key.
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    /// Event creation time, Unix seconds.
    pub created: i64,
    pub data: EnvelopeData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EnvelopeData {
    pub object: serde_json::Value,
}

/// A field that is either a bare id or the expanded object.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum Expandable<T> {
    Id(String),
    Object(T),
}

/// An expanded line item list. Entries are kept raw and converted one by
/// one so a single odd line does not cost the rest.
#[derive(Debug, Clone, Default, Deserialize)]
struct LineItemList {
    #[serde(default)]
    data: Vec<serde_json::Value>,
}

/// The payment-carrying object inside the envelope.
///
/// Amounts and currency are strict; every enrichment field is lenient.
#[derive(Debug, Clone, Default, Deserialize)]
struct PaymentObject {
    #[serde(default, deserialize_with = "lenient")]
    id: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    object: Option<String>,
    #[serde(default)]
    amount: Option<u64>,
    #[serde(default)]
    amount_received: Option<u64>,
    #[serde(default)]
    amount_total: Option<u64>,
    #[serde(default)]
    currency: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    receipt_email: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    customer: Option<Expandable<CustomerObject>>,
    #[serde(default, deserialize_with = "lenient")]
    customer_details: Option<CustomerObject>,
    #[serde(default, deserialize_with = "lenient")]
    metadata: Option<BTreeMap<String, serde_json::Value>>,
    #[serde(default, deserialize_with = "lenient")]
    line_items: Option<Expandable<LineItemList>>,
    #[serde(default, deserialize_with = "lenient")]
    payment_method: Option<Expandable<PaymentMethodObject>>,
}

/// Turns webhook envelopes into payment events.
#[derive(Clone)]
pub struct Normalizer {
    resolver: Arc<dyn ObjectResolver>,
}

impl Normalizer {
    /// Create a normalizer using `resolver` for unexpanded references.
    pub fn new(resolver: Arc<dyn ObjectResolver>) -> Self {
        Self { resolver }
    }

    /// Normalize an envelope.
    ///
    /// Only the amount and currency are required; everything else degrades.
    pub async fn normalize(&self, envelope: WebhookEnvelope) -> Result<PaymentEvent, IngestError> {
        let object: PaymentObject = serde_json::from_value(envelope.data.object)
            .map_err(|e| IngestError::MalformedBody(format!("data.object: {e}")))?;

        let amount = object
            .amount_total
            .or(object.amount_received)
            .or(object.amount)
            .ok_or_else(|| IngestError::MalformedBody("no amount".into()))?;
        let currency = object
            .currency
            .clone()
            .ok_or_else(|| IngestError::MalformedBody("no currency".into()))?;

        let received_at = envelope.created.saturating_mul(1000);
        let mut event = PaymentEvent::new(envelope.id.as_str(), amount, currency, received_at);

        event.metadata = object
            .metadata
            .iter()
            .flatten()
            .map(|(k, v)| (k.clone(), metadata_value(v)))
            .collect();

        event.payer_contact = self.payer_contact(&object).await;
        event.line_items = self.line_items(&object).await;

        if let Some(method) = self.payment_method(&object).await {
            if let Some(card) = method.card {
                if let (Some(brand), Some(last4)) = (card.brand, card.last4) {
                    event = event.with_instrument(brand, last4);
                }
            }
        }

        debug!(
            event_id = %event.event_id,
            line_items = event.line_items.len(),
            has_contact = event.payer_contact.is_some(),
            "normalized payment event"
        );

        Ok(event)
    }

    async fn payer_contact(&self, object: &PaymentObject) -> Option<String> {
        if let Some(contact) = object.customer_details.as_ref().and_then(CustomerObject::contact) {
            return Some(contact.to_owned());
        }
        if let Some(email) = object.receipt_email.as_deref().filter(|e| !e.trim().is_empty()) {
            return Some(email.to_owned());
        }

        let customer = match object.customer.as_ref()? {
            Expandable::Object(customer) => customer.clone(),
            Expandable::Id(id) => match self.resolver.customer(id).await {
                Ok(customer) => customer,
                Err(e) => {
                    warn!(error = %e, "customer resolution failed, omitting payer contact");
                    return None;
                }
            },
        };
        customer.contact().map(str::to_owned)
    }

    async fn line_items(&self, object: &PaymentObject) -> Vec<LineItem> {
        let raw = match &object.line_items {
            Some(Expandable::Object(list)) => list
                .data
                .iter()
                .filter_map(|raw| match LineItemObject::deserialize(raw) {
                    Ok(item) => Some(item),
                    Err(e) => {
                        warn!(error = %e, "skipping unreadable line item");
                        None
                    }
                })
                .collect(),
            Some(Expandable::Id(id)) => self.resolve_line_items(id).await,
            None if object.object.as_deref() == Some(CHECKOUT_SESSION_OBJECT) => {
                match object.id.as_deref() {
                    Some(id) => self.resolve_line_items(id).await,
                    None => Vec::new(),
                }
            }
            None => Vec::new(),
        };

        raw.iter().filter_map(line_item).collect()
    }

    async fn resolve_line_items(&self, parent_id: &str) -> Vec<LineItemObject> {
        match self.resolver.line_items(parent_id).await {
            Ok(items) => items,
            Err(e) => {
                warn!(error = %e, "line item resolution failed, omitting line items");
                Vec::new()
            }
        }
    }

    async fn payment_method(&self, object: &PaymentObject) -> Option<PaymentMethodObject> {
        match object.payment_method.as_ref()? {
            Expandable::Object(method) => Some(method.clone()),
            Expandable::Id(id) => match self.resolver.payment_method(id).await {
                Ok(method) => Some(method),
                Err(e) => {
                    warn!(error = %e, "payment method resolution failed, omitting instrument");
                    None
                }
            },
        }
    }
}

impl std::fmt::Debug for Normalizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Normalizer").finish_non_exhaustive()
    }
}

fn metadata_value(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Convert one provider line. Lines with zero quantity are dropped.
fn line_item(raw: &LineItemObject) -> Option<LineItem> {
    let quantity = raw.quantity.unwrap_or(1);
    if quantity == 0 {
        warn!("dropping line item with zero quantity");
        return None;
    }

    let unit_amount = raw
        .price
        .as_ref()
        .and_then(|p| p.unit_amount)
        .or_else(|| raw.amount_total.map(|total| total / quantity))
        .unwrap_or(0);

    let description = raw
        .description
        .clone()
        .filter(|d| !d.trim().is_empty())
        .unwrap_or_else(|| "Item".to_owned());

    Some(LineItem::new(description, unit_amount, quantity))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ResolveError;
    use crate::ingest::resolver::{CardObject, NoopResolver};
    use async_trait::async_trait;
    use serde_json::json;

    struct FixedResolver;

    #[async_trait]
    impl ObjectResolver for FixedResolver {
        async fn customer(&self, _id: &str) -> Result<CustomerObject, ResolveError> {
            Ok(CustomerObject {
                id: Some("cus_1".into()),
                email: Some("resolved@example.com".into()),
                phone: None,
            })
        }

        async fn line_items(&self, _parent_id: &str) -> Result<Vec<LineItemObject>, ResolveError> {
            Ok(vec![LineItemObject {
                description: Some("Resolved".into()),
                quantity: Some(2),
                price: None,
                amount_total: Some(500),
            }])
        }

        async fn payment_method(&self, _id: &str) -> Result<PaymentMethodObject, ResolveError> {
            Ok(PaymentMethodObject {
                card: Some(CardObject {
                    brand: Some("visa".into()),
                    last4: Some("4242".into()),
                }),
            })
        }
    }

    fn envelope(object: serde_json::Value) -> WebhookEnvelope {
        serde_json::from_value(json!({
            "id": "evt_1",
            "type": "payment_intent.succeeded",
            "created": 1_700_000_000,
            "data": { "object": object }
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn test_expanded_payment_intent() {
        let normalizer = Normalizer::new(Arc::new(NoopResolver));
        let event = normalizer
            .normalize(envelope(json!({
                "id": "pi_1",
                "object": "payment_intent",
                "amount": 1250,
                "currency": "USD",
                "customer": { "id": "cus_1", "email": "payer@example.com" },
                "metadata": { "recipient": "acct_abc", "order": 42 },
                "line_items": { "data": [
                    { "description": "Coffee", "quantity": 1, "price": { "unit_amount": 450 } },
                    { "description": "Donut", "quantity": 2, "price": { "unit_amount": 299 } }
                ]},
                "payment_method": { "card": { "brand": "visa", "last4": "4242" } }
            })))
            .await
            .unwrap();

        assert_eq!(event.event_id.as_str(), "evt_1");
        assert_eq!(event.amount, 1250);
        assert_eq!(event.currency, "usd");
        assert_eq!(event.received_at, 1_700_000_000_000);
        assert_eq!(event.payer_contact.as_deref(), Some("payer@example.com"));
        assert_eq!(event.recipient("recipient"), Some("acct_abc"));
        assert_eq!(event.metadata.get("order").map(String::as_str), Some("42"));
        assert_eq!(event.line_items.len(), 2);
        assert_eq!(event.subtotal(), Some(1048));
        assert_eq!(event.instrument.as_ref().unwrap().last4, "4242");
    }

    #[tokio::test]
    async fn test_unexpanded_references_degrade() {
        let normalizer = Normalizer::new(Arc::new(NoopResolver));
        let event = normalizer
            .normalize(envelope(json!({
                "id": "cs_1",
                "object": "checkout.session",
                "amount_total": 900,
                "currency": "eur",
                "customer": "cus_1",
                "payment_method": "pm_1",
                "metadata": { "recipient": "acct_abc" }
            })))
            .await
            .unwrap();

        assert_eq!(event.amount, 900);
        assert!(event.payer_contact.is_none());
        assert!(event.line_items.is_empty());
        assert!(event.instrument.is_none());
    }

    #[tokio::test]
    async fn test_unexpected_enrichment_shapes_degrade() {
        let normalizer = Normalizer::new(Arc::new(NoopResolver));
        let event = normalizer
            .normalize(envelope(json!({
                "id": "pi_1",
                "object": "payment_intent",
                "amount": 1250,
                "currency": "usd",
                "customer_details": "not an object",
                "receipt_email": 7,
                "metadata": { "recipient": "acct_abc" },
                "line_items": { "data": [
                    { "description": "Coffee", "quantity": 1, "price": "price_123", "amount_total": 450 },
                    "li_unexpanded",
                    { "description": "Donut", "quantity": 2, "price": { "unit_amount": 299 } }
                ]},
                "payment_method": { "card": "card_1" }
            })))
            .await
            .unwrap();

        assert_eq!(event.amount, 1250);
        assert!(event.payer_contact.is_none());
        assert!(event.instrument.is_none());
        assert_eq!(event.recipient("recipient"), Some("acct_abc"));
        assert_eq!(
            event.line_items,
            vec![LineItem::new("Coffee", 450, 1), LineItem::new("Donut", 299, 2)]
        );
    }

    #[tokio::test]
    async fn test_non_object_metadata_degrades() {
        let normalizer = Normalizer::new(Arc::new(NoopResolver));
        let event = normalizer
            .normalize(envelope(json!({
                "amount": 100,
                "currency": "usd",
                "metadata": ["recipient", "acct_abc"]
            })))
            .await
            .unwrap();
        assert!(event.metadata.is_empty());
    }

    #[tokio::test]
    async fn test_malformed_amount_is_still_fatal() {
        let normalizer = Normalizer::new(Arc::new(NoopResolver));
        let err = normalizer
            .normalize(envelope(json!({ "amount": "lots", "currency": "usd" })))
            .await
            .unwrap_err();
        assert!(matches!(err, IngestError::MalformedBody(_)));
    }

    #[tokio::test]
    async fn test_unexpanded_references_resolved() {
        let normalizer = Normalizer::new(Arc::new(FixedResolver));
        let event = normalizer
            .normalize(envelope(json!({
                "id": "cs_1",
                "object": "checkout.session",
                "amount_total": 1000,
                "currency": "eur",
                "customer": "cus_1",
                "payment_method": "pm_1"
            })))
            .await
            .unwrap();

        assert_eq!(event.payer_contact.as_deref(), Some("resolved@example.com"));
        assert_eq!(event.line_items, vec![LineItem::new("Resolved", 250, 2)]);
        assert_eq!(event.instrument.as_ref().unwrap().brand, "visa");
    }

    #[tokio::test]
    async fn test_customer_details_preferred() {
        let normalizer = Normalizer::new(Arc::new(FixedResolver));
        let event = normalizer
            .normalize(envelope(json!({
                "amount_total": 1, "currency": "usd",
                "customer": "cus_1",
                "customer_details": { "email": "details@example.com" }
            })))
            .await
            .unwrap();
        assert_eq!(event.payer_contact.as_deref(), Some("details@example.com"));
    }

    #[tokio::test]
    async fn test_missing_amount_is_malformed() {
        let normalizer = Normalizer::new(Arc::new(NoopResolver));
        let err = normalizer
            .normalize(envelope(json!({ "currency": "usd" })))
            .await
            .unwrap_err();
        assert!(matches!(err, IngestError::MalformedBody(_)));
    }

    #[test]
    fn test_line_item_defaults() {
        let item = line_item(&LineItemObject::default()).unwrap();
        assert_eq!(item, LineItem::new("Item", 0, 1));

        let zero = LineItemObject {
            quantity: Some(0),
            ..Default::default()
        };
        assert!(line_item(&zero).is_none());
    }
}
