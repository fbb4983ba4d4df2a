//! Test fixtures and instrumented backends.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use receipt_vault::ingest::resolver::{CustomerObject, LineItemObject, PaymentMethodObject};
use receipt_vault::ingest::signature;
use receipt_vault::{
    Backends, EventOutcome, ObjectResolver, ResolveError, Vault, VaultConfig, VaultError,
};
use receipt_vault_core::{CommitmentRecord, ContentAddress, ReceiptCommitment, TokenId};
use receipt_vault_perms::{AuthorizationSet, Conditions, GrantScope, MasterKeyProvider};
use receipt_vault_store::{
    now_millis, ContentStore, Ledger, MemoryContentStore, MemoryIdempotencyIndex, MemoryLedger,
    Result, StoreError,
};

/// Webhook secret the fixture vault accepts.
pub const WEBHOOK_SECRET: &str = "whsec_testkit";

/// Master key of the fixture vault.
pub const MASTER_KEY: [u8; 32] = [0x42; 32];

/// Bearer token granted full disclosure of every receipt.
pub const BEARER_TOKEN: &str = "testkit-verifier-token";

/// Content store that counts calls.
#[derive(Default)]
pub struct CountingContentStore<S = MemoryContentStore> {
    inner: S,
    puts: AtomicUsize,
    gets: AtomicUsize,
}

impl<S> CountingContentStore<S> {
    /// Wrap a store.
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            puts: AtomicUsize::new(0),
            gets: AtomicUsize::new(0),
        }
    }

    /// Number of `get` calls so far.
    pub fn get_count(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    /// Number of `put` calls so far.
    pub fn put_count(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }

    /// The wrapped store.
    pub fn inner(&self) -> &S {
        &self.inner
    }
}

#[async_trait]
impl<S: ContentStore> ContentStore for CountingContentStore<S> {
    async fn put(&self, bytes: &[u8]) -> Result<ContentAddress> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        self.inner.put(bytes).await
    }

    async fn get(&self, address: &ContentAddress) -> Result<Option<Vec<u8>>> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        self.inner.get(address).await
    }
}

/// Content store that flips a byte of every blob it returns once armed.
#[derive(Default)]
pub struct CorruptingContentStore {
    inner: MemoryContentStore,
    armed: AtomicBool,
}

impl CorruptingContentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start corrupting reads.
    pub fn arm(&self) {
        self.armed.store(true, Ordering::SeqCst);
    }

    /// Stop corrupting reads.
    pub fn disarm(&self) {
        self.armed.store(false, Ordering::SeqCst);
    }

    /// The underlying store.
    pub fn inner(&self) -> &MemoryContentStore {
        &self.inner
    }
}

#[async_trait]
impl ContentStore for CorruptingContentStore {
    async fn put(&self, bytes: &[u8]) -> Result<ContentAddress> {
        self.inner.put(bytes).await
    }

    async fn get(&self, address: &ContentAddress) -> Result<Option<Vec<u8>>> {
        let mut blob = self.inner.get(address).await?;
        if self.armed.load(Ordering::SeqCst) {
            if let Some(last) = blob.as_mut().and_then(|b| b.last_mut()) {
                *last ^= 0x01;
            }
        }
        Ok(blob)
    }
}

/// Ledger whose next `n` appends fail with a transient error.
#[derive(Default)]
pub struct FlakyLedger {
    inner: MemoryLedger,
    failures_remaining: AtomicU32,
    attempts: AtomicU32,
}

impl FlakyLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `n` appends.
    pub fn fail_next(&self, n: u32) {
        self.failures_remaining.store(n, Ordering::SeqCst);
    }

    /// Append attempts so far, failed ones included.
    pub fn append_attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Records actually appended.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

#[async_trait]
impl Ledger for FlakyLedger {
    async fn append(&self, record: &CommitmentRecord) -> Result<TokenId> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let failing = self
            .failures_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(StoreError::Unavailable("injected ledger failure".into()));
        }
        self.inner.append(record).await
    }

    async fn read(&self, token_id: TokenId) -> Result<Option<ReceiptCommitment>> {
        self.inner.read(token_id).await
    }
}

/// Resolver answering from fixed maps. Unknown ids fail.
#[derive(Debug, Clone, Default)]
pub struct MapResolver {
    pub customers: HashMap<String, CustomerObject>,
    pub line_items: HashMap<String, Vec<LineItemObject>>,
    pub payment_methods: HashMap<String, PaymentMethodObject>,
}

impl MapResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_customer(mut self, id: &str, customer: CustomerObject) -> Self {
        self.customers.insert(id.to_owned(), customer);
        self
    }

    pub fn with_line_items(mut self, parent_id: &str, items: Vec<LineItemObject>) -> Self {
        self.line_items.insert(parent_id.to_owned(), items);
        self
    }

    pub fn with_payment_method(mut self, id: &str, method: PaymentMethodObject) -> Self {
        self.payment_methods.insert(id.to_owned(), method);
        self
    }
}

fn missing(kind: &'static str, id: &str) -> ResolveError {
    ResolveError {
        kind,
        id: id.to_owned(),
        reason: "unknown id".into(),
    }
}

#[async_trait]
impl ObjectResolver for MapResolver {
    async fn customer(&self, id: &str) -> std::result::Result<CustomerObject, ResolveError> {
        self.customers.get(id).cloned().ok_or_else(|| missing("customer", id))
    }

    async fn line_items(
        &self,
        parent_id: &str,
    ) -> std::result::Result<Vec<LineItemObject>, ResolveError> {
        self.line_items
            .get(parent_id)
            .cloned()
            .ok_or_else(|| missing("line_items", parent_id))
    }

    async fn payment_method(
        &self,
        id: &str,
    ) -> std::result::Result<PaymentMethodObject, ResolveError> {
        self.payment_methods
            .get(id)
            .cloned()
            .ok_or_else(|| missing("payment_method", id))
    }
}

/// A vault on instrumented in-memory backends.
pub struct TestVault {
    pub vault: Vault,
    pub content: Arc<CountingContentStore<CorruptingContentStore>>,
    pub ledger: Arc<FlakyLedger>,
    pub index: Arc<MemoryIdempotencyIndex>,
}

impl TestVault {
    /// Default configuration with fast retries.
    pub fn new() -> Self {
        Self::with_config(
            VaultConfig::default().with_retry(receipt_vault::RetryConfig::fast()),
        )
    }

    /// Custom configuration, no resolver.
    pub fn with_config(config: VaultConfig) -> Self {
        Self::build(config, Arc::new(receipt_vault::NoopResolver))
    }

    /// Default configuration with a resolver.
    pub fn with_resolver(resolver: Arc<dyn ObjectResolver>) -> Self {
        Self::build(
            VaultConfig::default().with_retry(receipt_vault::RetryConfig::fast()),
            resolver,
        )
    }

    fn build(config: VaultConfig, resolver: Arc<dyn ObjectResolver>) -> Self {
        let content = Arc::new(CountingContentStore::new(CorruptingContentStore::new()));
        let ledger = Arc::new(FlakyLedger::new());
        let index = Arc::new(MemoryIdempotencyIndex::new());

        let mut authorizations = AuthorizationSet::new();
        authorizations.grant_bearer(BEARER_TOKEN, GrantScope::AllReceipts, Conditions::default());

        let vault = Vault::builder(config)
            .backends(Backends {
                content: content.clone(),
                ledger: ledger.clone(),
                index: index.clone(),
            })
            .key_provider(Arc::new(MasterKeyProvider::new(MASTER_KEY)))
            .resolver(resolver)
            .authorizations(authorizations.shared())
            .webhook_secret(WEBHOOK_SECRET)
            .build();

        Self {
            vault,
            content,
            ledger,
            index,
        }
    }

    /// Signature header for `body`, signed now with the fixture secret.
    pub fn sign(body: &[u8]) -> String {
        signature::sign(WEBHOOK_SECRET.as_bytes(), now_millis() / 1000, body)
    }

    /// Deliver a correctly signed webhook.
    pub async fn deliver(&self, body: &[u8]) -> std::result::Result<EventOutcome, VaultError> {
        let header = Self::sign(body);
        self.vault.handle_event(body, Some(&header)).await
    }

    /// `Authorization` header carrying the granted bearer token.
    pub fn bearer_header(&self) -> String {
        format!("Bearer {BEARER_TOKEN}")
    }
}

impl Default for TestVault {
    fn default() -> Self {
        Self::new()
    }
}
