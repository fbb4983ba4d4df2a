//! Verification and tiered disclosure.
//!
//! Anyone holding a token id can learn that the commitment exists, who it
//! was issued to and when. The receipt itself is only decrypted for callers
//! whose credential the authorization set accepts, and only after the
//! decrypted content is checked against the committed integrity hash.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, error, warn};

use receipt_vault_core::{
    ContentAddress, IntegrityHash, PublicSummary, ReceiptCommitment, ReceiptPayload, TokenId,
};
use receipt_vault_perms::{SharedAuthorizations, VerificationCredential};
use receipt_vault_store::{now_millis, ContentStore, Ledger};

use crate::codec::PayloadCodec;
use crate::error::VerifyError;
use crate::retry::{Retry, RetryConfig};

/// What anyone may learn about a commitment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublicVerification {
    pub valid: bool,
    pub token_id: TokenId,
    pub recipient: String,
    pub issued_at: i64,
    /// Address of the encrypted payload.
    pub content_pointer: ContentAddress,
}

impl PublicVerification {
    fn from_commitment(commitment: &ReceiptCommitment) -> Self {
        Self {
            valid: true,
            token_id: commitment.token_id,
            recipient: commitment.recipient.clone(),
            issued_at: commitment.issued_at,
            content_pointer: commitment.content_address,
        }
    }
}

/// Full disclosure to an authorized verifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FullDisclosure {
    #[serde(flatten)]
    pub public: PublicVerification,
    pub integrity_hash: IntegrityHash,
    pub summary: PublicSummary,
    /// Sum of the line items; absent when the receipt is not itemized.
    pub subtotal: Option<u64>,
    pub payload: ReceiptPayload,
}

/// Outcome of a verification request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "disclosure", rename_all = "snake_case")]
pub enum VerificationResult {
    Public(PublicVerification),
    Full(Box<FullDisclosure>),
    /// The commitment exists but the credential was rejected.
    Unauthorized { token_id: TokenId },
}

impl VerificationResult {
    /// Token the result is about.
    pub fn token_id(&self) -> TokenId {
        match self {
            Self::Public(p) => p.token_id,
            Self::Full(f) => f.public.token_id,
            Self::Unauthorized { token_id } => *token_id,
        }
    }
}

/// Read-only verification over the ledger and content store.
#[derive(Clone)]
pub struct VerificationService {
    content: Arc<dyn ContentStore>,
    ledger: Arc<dyn Ledger>,
    codec: PayloadCodec,
    authorizations: SharedAuthorizations,
    retry: Retry,
}

impl VerificationService {
    pub fn new(
        content: Arc<dyn ContentStore>,
        ledger: Arc<dyn Ledger>,
        codec: PayloadCodec,
        authorizations: SharedAuthorizations,
        retry: RetryConfig,
    ) -> Self {
        Self {
            content,
            ledger,
            codec,
            authorizations,
            retry: Retry::new(retry),
        }
    }

    /// Verify `token_id`, disclosing as much as `credential` permits.
    pub async fn verify(
        &self,
        token_id: TokenId,
        credential: Option<&VerificationCredential>,
    ) -> Result<VerificationResult, VerifyError> {
        let commitment = self.lookup(token_id).await?;

        let Some(credential) = credential else {
            debug!(%token_id, "public verification");
            return Ok(VerificationResult::Public(PublicVerification::from_commitment(
                &commitment,
            )));
        };

        if !self.is_authorized(credential, token_id)? {
            return Ok(VerificationResult::Unauthorized { token_id });
        }

        self.disclose(commitment).await
    }

    /// Verify using a raw `Authorization` header value.
    ///
    /// A header that does not parse is treated like a rejected credential,
    /// after the token has been looked up.
    pub async fn verify_presented(
        &self,
        token_id: TokenId,
        authorization: Option<&str>,
    ) -> Result<VerificationResult, VerifyError> {
        let credential = match authorization.map(VerificationCredential::parse) {
            None => None,
            Some(Ok(credential)) => Some(credential),
            Some(Err(e)) => {
                self.lookup(token_id).await?;
                warn!(%token_id, error = %e, "unparseable credential");
                return Ok(VerificationResult::Unauthorized { token_id });
            }
        };
        self.verify(token_id, credential.as_ref()).await
    }

    async fn lookup(&self, token_id: TokenId) -> Result<ReceiptCommitment, VerifyError> {
        self.retry
            .call("ledger.read", || self.ledger.read(token_id))
            .await?
            .ok_or(VerifyError::NotFound(token_id))
    }

    fn is_authorized(
        &self,
        credential: &VerificationCredential,
        token_id: TokenId,
    ) -> Result<bool, VerifyError> {
        let authorizations = self
            .authorizations
            .read()
            .map_err(|e| VerifyError::Authorization(e.to_string()))?;

        match authorizations.authorize(credential, token_id, now_millis()) {
            Ok(grant_id) => {
                debug!(%token_id, %grant_id, "credential accepted");
                Ok(true)
            }
            Err(e) => {
                warn!(%token_id, error = %e, "credential rejected");
                Ok(false)
            }
        }
    }

    async fn disclose(&self, commitment: ReceiptCommitment) -> Result<VerificationResult, VerifyError> {
        let token_id = commitment.token_id;
        let address = commitment.content_address;

        let blob = self
            .retry
            .call("content.get", || self.content.get(&address))
            .await?
            .ok_or_else(|| integrity_failure(token_id, format!("payload {address} missing")))?;

        let payload = self
            .codec
            .open(&blob)
            .map_err(|e| integrity_failure(token_id, e.to_string()))?;

        let recomputed = PayloadCodec::integrity_hash(&payload);
        if !recomputed.ct_eq(&commitment.integrity_hash) {
            return Err(integrity_failure(
                token_id,
                "payload does not match committed hash".into(),
            ));
        }

        debug!(%token_id, "full disclosure");
        Ok(VerificationResult::Full(Box::new(FullDisclosure {
            public: PublicVerification::from_commitment(&commitment),
            integrity_hash: commitment.integrity_hash,
            summary: payload.public_summary(),
            subtotal: itemized_subtotal(&payload),
            payload,
        })))
    }
}

fn itemized_subtotal(payload: &ReceiptPayload) -> Option<u64> {
    if payload.event.line_items.is_empty() {
        return None;
    }
    payload.event.subtotal()
}

impl std::fmt::Debug for VerificationService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VerificationService")
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

fn integrity_failure(token_id: TokenId, reason: String) -> VerifyError {
    error!(%token_id, %reason, "integrity failure");
    VerifyError::Integrity { token_id, reason }
}
