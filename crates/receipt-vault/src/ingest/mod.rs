//! Webhook ingestion: authenticate, filter and normalize provider events.

pub mod normalize;
pub mod resolver;
pub mod signature;

use std::sync::Arc;

use tracing::{debug, warn};

use receipt_vault_core::PaymentEvent;

use crate::config::VaultConfig;
use crate::error::IngestError;

pub use normalize::{Expandable, Normalizer, WebhookEnvelope};
pub use resolver::{NoopResolver, ObjectResolver};
pub use signature::{SignatureHeader, SignatureVerifier};

/// Turns raw webhook deliveries into payment events.
#[derive(Debug, Clone)]
pub struct Ingestor {
    verifier: SignatureVerifier,
    normalizer: Normalizer,
    accepted_event_types: Vec<String>,
}

impl Ingestor {
    /// Create an ingestor accepting any of `secrets`.
    pub fn new<I, S>(secrets: I, resolver: Arc<dyn ObjectResolver>, config: &VaultConfig) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<[u8]>,
    {
        Self {
            verifier: SignatureVerifier::new(
                secrets,
                config.signature_tolerance.as_secs() as i64,
            ),
            normalizer: Normalizer::new(resolver),
            accepted_event_types: config.accepted_event_types.clone(),
        }
    }

    /// Ingest a delivery at the current time.
    ///
    /// Returns `Ok(None)` for authentic events of a type the vault does not
    /// handle.
    pub async fn ingest(
        &self,
        body: &[u8],
        signature_header: Option<&str>,
    ) -> Result<Option<PaymentEvent>, IngestError> {
        self.ingest_at(body, signature_header, now_secs()).await
    }

    /// Ingest a delivery as of `now` (Unix seconds).
    pub async fn ingest_at(
        &self,
        body: &[u8],
        signature_header: Option<&str>,
        now: i64,
    ) -> Result<Option<PaymentEvent>, IngestError> {
        if let Err(e) = self.verifier.verify(body, signature_header, now) {
            warn!(error = %e, "rejected webhook delivery");
            return Err(e);
        }

        let envelope: WebhookEnvelope = serde_json::from_slice(body)
            .map_err(|e| IngestError::MalformedBody(e.to_string()))?;

        if !self.accepted_event_types.iter().any(|t| *t == envelope.event_type) {
            debug!(event_id = %envelope.id, event_type = %envelope.event_type, "ignoring event type");
            return Ok(None);
        }

        self.normalizer.normalize(envelope).await.map(Some)
    }
}

fn now_secs() -> i64 {
    receipt_vault_store::now_millis() / 1000
}
