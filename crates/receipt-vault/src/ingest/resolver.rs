//! Resolution of unexpanded provider objects.
//!
//! Webhook payloads may carry a bare id (`"cus_123"`) where a nested object
//! is expected. An [`ObjectResolver`] fetches the full object; failures are
//! tolerated by the normalizer, which falls back to partial data.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use tracing::warn;

use crate::error::ResolveError;

/// Deserialize an optional provider field, treating an unexpected shape as
/// absent instead of failing the enclosing object.
pub(crate) fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    if value.is_null() {
        return Ok(None);
    }
    match serde_json::from_value(value) {
        Ok(parsed) => Ok(Some(parsed)),
        Err(e) => {
            warn!(
                error = %e,
                field_type = std::any::type_name::<T>(),
                "ignoring provider field with unexpected shape"
            );
            Ok(None)
        }
    }
}

/// A customer as the provider describes it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CustomerObject {
    #[serde(default, deserialize_with = "lenient")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub email: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub phone: Option<String>,
}

impl CustomerObject {
    /// Preferred contact: email, then phone.
    pub fn contact(&self) -> Option<&str> {
        self.email
            .as_deref()
            .or(self.phone.as_deref())
            .filter(|c| !c.trim().is_empty())
    }
}

/// A purchased line as the provider describes it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct LineItemObject {
    #[serde(default, deserialize_with = "lenient")]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub quantity: Option<u64>,
    #[serde(default, deserialize_with = "lenient")]
    pub price: Option<PriceObject>,
    #[serde(default, deserialize_with = "lenient")]
    pub amount_total: Option<u64>,
}

/// Unit price of a line item.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PriceObject {
    #[serde(default, deserialize_with = "lenient")]
    pub unit_amount: Option<u64>,
}

/// Card details of a payment method.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CardObject {
    #[serde(default, deserialize_with = "lenient")]
    pub brand: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub last4: Option<String>,
}

/// A payment method as the provider describes it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PaymentMethodObject {
    #[serde(default, deserialize_with = "lenient")]
    pub card: Option<CardObject>,
}

/// Fetches provider objects referenced by id.
#[async_trait]
pub trait ObjectResolver: Send + Sync {
    /// Resolve a customer id.
    async fn customer(&self, id: &str) -> Result<CustomerObject, ResolveError>;

    /// Resolve the line items of a payment intent or checkout session.
    async fn line_items(&self, parent_id: &str) -> Result<Vec<LineItemObject>, ResolveError>;

    /// Resolve a payment method id.
    async fn payment_method(&self, id: &str) -> Result<PaymentMethodObject, ResolveError>;
}

/// Resolver that knows nothing; every lookup fails.
///
/// Used when no provider API client is configured, in which case only
/// expanded objects contribute to the event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopResolver;

#[async_trait]
impl ObjectResolver for NoopResolver {
    async fn customer(&self, id: &str) -> Result<CustomerObject, ResolveError> {
        Err(unresolvable("customer", id))
    }

    async fn line_items(&self, parent_id: &str) -> Result<Vec<LineItemObject>, ResolveError> {
        Err(unresolvable("line_items", parent_id))
    }

    async fn payment_method(&self, id: &str) -> Result<PaymentMethodObject, ResolveError> {
        Err(unresolvable("payment_method", id))
    }
}

fn unresolvable(kind: &'static str, id: &str) -> ResolveError {
    ResolveError {
        kind,
        id: id.to_owned(),
        reason: "no resolver configured".into(),
    }
}
