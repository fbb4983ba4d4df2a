//! # Receipt Vault
//!
//! Private payment receipts as public commitments with selective disclosure.
//!
//! ## Overview
//!
//! A completed payment arrives as a signed provider webhook. The vault:
//!
//! - **Ingests** it: checks the signature, ignores event types it does not
//!   handle, and normalizes the body into a [`PaymentEvent`]
//! - **Issues** a commitment: encrypts the full receipt into the content
//!   store and appends an integrity hash plus the content address to the
//!   ledger, which mints the token id
//! - **Verifies** tokens: anyone learns that a commitment exists and who holds
//!   it; credentialed verifiers get the decrypted receipt after it is checked
//!   against the committed hash
//!
//! Each event id yields at most one commitment, however often the provider
//! redelivers it.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use receipt_vault::{Backends, Vault, VaultConfig};
//! use receipt_vault::perms::MasterKeyProvider;
//!
//! async fn example(body: &[u8], signature: &str) {
//!     let vault = Vault::builder(VaultConfig::default())
//!         .backends(Backends::memory())
//!         .key_provider(Arc::new(MasterKeyProvider::new([0x42; 32])))
//!         .webhook_secret("whsec_example")
//!         .build();
//!
//!     let outcome = vault.handle_event(body, Some(signature)).await.unwrap();
//!     if let Some(commitment) = outcome.commitment() {
//!         let result = vault.verify(commitment.token_id, None).await.unwrap();
//!         println!("{result:?}");
//!     }
//! }
//! ```
//!
//! ## Re-exports
//!
//! - `receipt_vault::core` - payment events, payloads, commitments
//! - `receipt_vault::store` - content store, ledger and index backends
//! - `receipt_vault::perms` - encryption and disclosure authorization

pub mod codec;
pub mod config;
pub mod error;
pub mod ingest;
pub mod issuance;
pub mod retry;
pub mod verification;

use std::sync::Arc;

use tracing::warn;

pub use receipt_vault_core as core;
pub use receipt_vault_perms as perms;
pub use receipt_vault_store as store;

pub use codec::PayloadCodec;
pub use config::{VaultConfig, CHECKOUT_SESSION_COMPLETED, PAYMENT_INTENT_SUCCEEDED};
pub use error::{
    CodecError, IngestError, IssuanceError, ResolveError, Result, VaultError, VerifyError,
};
pub use ingest::{Ingestor, NoopResolver, ObjectResolver};
pub use issuance::IssuanceService;
pub use retry::{Retry, RetryConfig};
pub use verification::{
    FullDisclosure, PublicVerification, VerificationResult, VerificationService,
};

pub use receipt_vault_core::{PaymentEvent, ReceiptCommitment, TokenId};

use receipt_vault_perms::{AuthorizationSet, KeyProvider, SharedAuthorizations};
use receipt_vault_store::{
    ContentStore, IdempotencyIndex, Ledger, MemoryContentStore, MemoryIdempotencyIndex,
    MemoryLedger, SqliteStore,
};

/// The three external collaborators.
#[derive(Clone)]
pub struct Backends {
    pub content: Arc<dyn ContentStore>,
    pub ledger: Arc<dyn Ledger>,
    pub index: Arc<dyn IdempotencyIndex>,
}

impl Backends {
    /// Fresh in-memory backends.
    pub fn memory() -> Self {
        Self {
            content: Arc::new(MemoryContentStore::new()),
            ledger: Arc::new(MemoryLedger::new()),
            index: Arc::new(MemoryIdempotencyIndex::new()),
        }
    }

    /// All three backed by one SQLite database.
    pub fn sqlite(store: SqliteStore) -> Self {
        Self {
            content: Arc::new(store.clone()),
            ledger: Arc::new(store.clone()),
            index: Arc::new(store),
        }
    }
}

/// What became of one webhook delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventOutcome {
    /// Authentic, but not an event type the vault handles.
    Ignored,
    /// A commitment exists for the event (new or previously issued).
    Issued(ReceiptCommitment),
    /// The event can never be issued.
    Rejected(String),
}

impl EventOutcome {
    /// The commitment, if one was issued.
    pub fn commitment(&self) -> Option<&ReceiptCommitment> {
        match self {
            Self::Issued(commitment) => Some(commitment),
            _ => None,
        }
    }
}

/// Builder for [`Vault`].
pub struct VaultBuilder {
    config: VaultConfig,
    backends: Option<Backends>,
    keys: Option<Arc<dyn KeyProvider>>,
    resolver: Arc<dyn ObjectResolver>,
    authorizations: Option<SharedAuthorizations>,
    secrets: Vec<Vec<u8>>,
}

impl VaultBuilder {
    /// Use these backends. Defaults to in-memory.
    pub fn backends(mut self, backends: Backends) -> Self {
        self.backends = Some(backends);
        self
    }

    /// Key provider for payload encryption.
    pub fn key_provider(mut self, keys: Arc<dyn KeyProvider>) -> Self {
        self.keys = Some(keys);
        self
    }

    /// Resolver for unexpanded provider objects. Defaults to [`NoopResolver`].
    pub fn resolver(mut self, resolver: Arc<dyn ObjectResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    /// Shared authorization set consulted on credentialed verification.
    pub fn authorizations(mut self, authorizations: SharedAuthorizations) -> Self {
        self.authorizations = Some(authorizations);
        self
    }

    /// Accept webhooks signed with `secret`. May be called repeatedly while
    /// secrets rotate.
    pub fn webhook_secret(mut self, secret: impl AsRef<[u8]>) -> Self {
        self.secrets.push(secret.as_ref().to_vec());
        self
    }

    /// Assemble the vault.
    ///
    /// Without a key provider a random master key is generated, which makes
    /// stored payloads unreadable after restart.
    pub fn build(self) -> Vault {
        let config = Arc::new(self.config);
        let backends = self.backends.unwrap_or_else(Backends::memory);
        let keys = self.keys.unwrap_or_else(|| {
            warn!("no key provider configured, using an ephemeral master key");
            Arc::new(receipt_vault_perms::MasterKeyProvider::new(rand::random()))
        });
        let authorizations = self
            .authorizations
            .unwrap_or_else(|| AuthorizationSet::new().shared());

        let codec = PayloadCodec::new(keys);
        let ingestor = Ingestor::new(&self.secrets, self.resolver, &config);
        let issuance = IssuanceService::new(
            backends.content.clone(),
            backends.ledger.clone(),
            backends.index.clone(),
            codec.clone(),
            config.clone(),
        );
        let verification = VerificationService::new(
            backends.content,
            backends.ledger,
            codec,
            authorizations.clone(),
            config.retry.clone(),
        );

        Vault {
            ingestor,
            issuance,
            verification,
            authorizations,
            config,
        }
    }
}

/// The receipt vault: ingestion, issuance and verification behind one handle.
#[derive(Clone)]
pub struct Vault {
    ingestor: Ingestor,
    issuance: IssuanceService,
    verification: VerificationService,
    authorizations: SharedAuthorizations,
    config: Arc<VaultConfig>,
}

impl Vault {
    /// Start building a vault.
    pub fn builder(config: VaultConfig) -> VaultBuilder {
        VaultBuilder {
            config,
            backends: None,
            keys: None,
            resolver: Arc::new(NoopResolver),
            authorizations: None,
            secrets: Vec::new(),
        }
    }

    /// Handle one webhook delivery end to end.
    pub async fn handle_event(
        &self,
        body: &[u8],
        signature_header: Option<&str>,
    ) -> Result<EventOutcome> {
        let Some(event) = self.ingestor.ingest(body, signature_header).await? else {
            return Ok(EventOutcome::Ignored);
        };
        self.issue(event).await
    }

    /// Issue a commitment for an already-authenticated event.
    pub async fn issue(&self, event: PaymentEvent) -> Result<EventOutcome> {
        let event_id = event.event_id.clone();
        match self.issuance.issue(event).await {
            Ok(commitment) => Ok(EventOutcome::Issued(commitment)),
            Err(IssuanceError::Invalid(reason)) => {
                warn!(%event_id, %reason, "event rejected");
                Ok(EventOutcome::Rejected(reason.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Verify a token, with an optional raw `Authorization` header value.
    pub async fn verify(
        &self,
        token_id: TokenId,
        authorization: Option<&str>,
    ) -> std::result::Result<VerificationResult, VerifyError> {
        self.verification.verify_presented(token_id, authorization).await
    }

    /// The authorization set, for granting and revoking at runtime.
    pub fn authorizations(&self) -> &SharedAuthorizations {
        &self.authorizations
    }

    /// The verification service.
    pub fn verification(&self) -> &VerificationService {
        &self.verification
    }

    /// The active configuration.
    pub fn config(&self) -> &VaultConfig {
        &self.config
    }
}

impl std::fmt::Debug for Vault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Vault")
            .field("ingestor", &self.ingestor)
            .field("merchant", &self.config.merchant.merchant_name)
            .finish_non_exhaustive()
    }
}

