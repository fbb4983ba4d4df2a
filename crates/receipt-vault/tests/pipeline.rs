//! End-to-end pipeline tests: webhook in, commitment out, tiered verification.

use std::sync::Arc;

use proptest::prelude::*;
use serde_json::json;

use receipt_vault::ingest::resolver::{CustomerObject, LineItemObject, PriceObject};
use receipt_vault::perms::{AuthorizationSet, Conditions, GrantScope, MasterKeyProvider};
use receipt_vault::store::SqliteStore;
use receipt_vault::{
    Backends, EventOutcome, IngestError, PayloadCodec, TokenId, Vault, VaultConfig,
    VaultError, VerificationResult, VerifyError,
};
use receipt_vault_core::{MerchantContext, ReceiptPayload};
use receipt_vault_testkit::fixtures::{MapResolver, TestVault, MASTER_KEY};
use receipt_vault_testkit::vectors::{
    coffee_webhook_body, webhook_body, COFFEE_RECIPIENT, COFFEE_SUBTOTAL,
};
use receipt_vault_testkit::generators;

fn issued(outcome: EventOutcome) -> receipt_vault::ReceiptCommitment {
    match outcome {
        EventOutcome::Issued(commitment) => commitment,
        other => panic!("expected issued commitment, got {other:?}"),
    }
}

#[tokio::test]
async fn coffee_scenario() {
    let fixture = TestVault::new();
    let body = coffee_webhook_body();

    let first = issued(fixture.deliver(&body).await.unwrap());
    let second = issued(fixture.deliver(&body).await.unwrap());
    assert_eq!(first.token_id, second.token_id);
    assert_eq!(first, second);
    assert_eq!(fixture.ledger.len(), 1);

    // Public tier.
    let public = fixture.vault.verify(first.token_id, None).await.unwrap();
    let VerificationResult::Public(ref summary) = public else {
        panic!("expected public result, got {public:?}");
    };
    assert!(summary.valid);
    assert_eq!(summary.recipient, COFFEE_RECIPIENT);
    let json = serde_json::to_string(&public).unwrap();
    for leaked in ["line_items", "Coffee", "payer@example.com"] {
        assert!(!json.contains(leaked), "public result leaked {leaked}");
    }

    // Full tier.
    let full = fixture
        .vault
        .verify(first.token_id, Some(&fixture.bearer_header()))
        .await
        .unwrap();
    let VerificationResult::Full(disclosure) = full else {
        panic!("expected full disclosure, got {full:?}");
    };
    assert_eq!(disclosure.subtotal, Some(COFFEE_SUBTOTAL));
    assert_eq!(disclosure.summary.total, 1250);
    let descriptions: Vec<_> = disclosure
        .payload
        .event
        .line_items
        .iter()
        .map(|item| item.description.as_str())
        .collect();
    assert_eq!(descriptions, ["Coffee", "Donut"]);
}

#[tokio::test]
async fn public_verification_never_fetches() {
    let fixture = TestVault::new();
    let commitment = issued(fixture.deliver(&coffee_webhook_body()).await.unwrap());

    for _ in 0..3 {
        fixture.vault.verify(commitment.token_id, None).await.unwrap();
    }
    assert_eq!(fixture.content.get_count(), 0);

    fixture
        .vault
        .verify(commitment.token_id, Some(&fixture.bearer_header()))
        .await
        .unwrap();
    assert_eq!(fixture.content.get_count(), 1);
}

#[tokio::test]
async fn concurrent_deliveries_mint_one_token() {
    let fixture = TestVault::new();
    let body = coffee_webhook_body();

    let mut tasks = Vec::new();
    for _ in 0..16 {
        let vault = fixture.vault.clone();
        let body = body.clone();
        let header = TestVault::sign(&body);
        tasks.push(tokio::spawn(async move {
            vault.handle_event(&body, Some(&header)).await
        }));
    }

    let mut tokens = Vec::new();
    for task in tasks {
        tokens.push(issued(task.await.unwrap().unwrap()).token_id);
    }
    assert!(tokens.iter().all(|t| *t == tokens[0]));
    assert_eq!(fixture.ledger.len(), 1);
}

#[tokio::test]
async fn disclosed_payload_matches_commitment() {
    let fixture = TestVault::new();
    let commitment = issued(fixture.deliver(&coffee_webhook_body()).await.unwrap());

    let result = fixture
        .vault
        .verify(commitment.token_id, Some(&fixture.bearer_header()))
        .await
        .unwrap();
    let VerificationResult::Full(disclosure) = result else {
        panic!("expected full disclosure");
    };
    assert_eq!(disclosure.payload.integrity_hash(), commitment.integrity_hash);
    assert_eq!(disclosure.public.content_pointer, commitment.content_address);
}

#[tokio::test]
async fn corrupted_ciphertext_is_integrity_error() {
    let fixture = TestVault::new();
    let commitment = issued(fixture.deliver(&coffee_webhook_body()).await.unwrap());

    fixture.content.inner().arm();
    let err = fixture
        .vault
        .verify(commitment.token_id, Some(&fixture.bearer_header()))
        .await
        .unwrap_err();
    assert!(matches!(err, VerifyError::Integrity { .. }));

    // The public tier does not read the blob, so it is unaffected.
    assert!(fixture.vault.verify(commitment.token_id, None).await.is_ok());
}

#[tokio::test]
async fn unauthorized_is_distinct_from_not_found() {
    let fixture = TestVault::new();
    let commitment = issued(fixture.deliver(&coffee_webhook_body()).await.unwrap());

    let result = fixture
        .vault
        .verify(commitment.token_id, Some("Bearer not-a-granted-token"))
        .await
        .unwrap();
    assert_eq!(
        result,
        VerificationResult::Unauthorized {
            token_id: commitment.token_id
        }
    );
    assert_eq!(fixture.content.get_count(), 0);

    let err = fixture
        .vault
        .verify(TokenId(999), Some("Bearer not-a-granted-token"))
        .await
        .unwrap_err();
    assert!(matches!(err, VerifyError::NotFound(TokenId(999))));
}

#[tokio::test]
async fn transient_ledger_failures_are_retried() {
    let fixture = TestVault::new();
    fixture.ledger.fail_next(2);

    let commitment = issued(fixture.deliver(&coffee_webhook_body()).await.unwrap());
    assert_eq!(commitment.token_id, TokenId(1));
    assert_eq!(fixture.ledger.append_attempts(), 3);
    assert_eq!(fixture.ledger.len(), 1);
}

#[tokio::test]
async fn exhausted_retries_surface_and_redelivery_succeeds() {
    let fixture = TestVault::new();
    fixture.ledger.fail_next(100);

    let err = fixture.deliver(&coffee_webhook_body()).await.unwrap_err();
    let VaultError::Issuance(ref issuance) = err else {
        panic!("expected issuance error, got {err:?}");
    };
    assert!(issuance.is_transient());
    assert!(fixture.ledger.is_empty());

    fixture.ledger.fail_next(0);
    let commitment = issued(fixture.deliver(&coffee_webhook_body()).await.unwrap());
    assert_eq!(fixture.ledger.len(), 1);

    // Sealing is deterministic: the retried write reused the first blob.
    assert_eq!(fixture.content.inner().inner().len(), 1);
    assert_eq!(fixture.content.put_count(), 2);
    assert!(fixture.vault.verify(commitment.token_id, None).await.is_ok());
}

#[tokio::test]
async fn other_event_types_are_ignored() {
    let fixture = TestVault::new();
    let body = webhook_body("evt_9", "charge.refunded", json!({ "amount": 5 }));

    let outcome = fixture.deliver(&body).await.unwrap();
    assert_eq!(outcome, EventOutcome::Ignored);
    assert!(fixture.ledger.is_empty());
}

#[tokio::test]
async fn bad_signature_is_rejected() {
    let fixture = TestVault::new();
    let body = coffee_webhook_body();
    let header = receipt_vault::ingest::signature::sign(b"wrong secret", 0, &body);

    let err = fixture
        .vault
        .handle_event(&body, Some(&header))
        .await
        .unwrap_err();
    assert!(matches!(err, VaultError::Ingest(_)));

    let err = fixture.vault.handle_event(&body, None).await.unwrap_err();
    assert!(matches!(err, VaultError::Ingest(IngestError::MissingSignature)));
    assert!(fixture.ledger.is_empty());
}

#[tokio::test]
async fn missing_recipient_is_rejected_not_retried() {
    let fixture = TestVault::new();
    let body = webhook_body(
        "evt_2",
        "payment_intent.succeeded",
        json!({ "amount": 100, "currency": "usd" }),
    );

    let outcome = fixture.deliver(&body).await.unwrap();
    assert!(matches!(outcome, EventOutcome::Rejected(_)));
    assert!(fixture.ledger.is_empty());
}

#[tokio::test]
async fn checkout_session_enriched_through_resolver() {
    let resolver = MapResolver::new()
        .with_customer(
            "cus_7",
            CustomerObject {
                email: Some("buyer@example.com".into()),
                ..Default::default()
            },
        )
        .with_line_items(
            "cs_7",
            vec![LineItemObject {
                description: Some("Bagel".into()),
                quantity: Some(3),
                price: Some(PriceObject {
                    unit_amount: Some(200),
                }),
                amount_total: None,
            }],
        );
    let fixture = TestVault::with_resolver(Arc::new(resolver));

    let body = webhook_body(
        "evt_7",
        "checkout.session.completed",
        json!({
            "id": "cs_7",
            "object": "checkout.session",
            "amount_total": 650,
            "currency": "usd",
            "customer": "cus_7",
            "metadata": { "recipient": "acct_xyz" }
        }),
    );
    let commitment = issued(fixture.deliver(&body).await.unwrap());
    assert_eq!(commitment.recipient, "acct_xyz");

    let result = fixture
        .vault
        .verify(commitment.token_id, Some(&fixture.bearer_header()))
        .await
        .unwrap();
    let VerificationResult::Full(disclosure) = result else {
        panic!("expected full disclosure");
    };
    assert_eq!(disclosure.payload.event.payer_contact.as_deref(), Some("buyer@example.com"));
    assert_eq!(disclosure.subtotal, Some(600));
}

#[tokio::test]
async fn sqlite_backed_vault_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("vault.db");
    let secret = "whsec_sqlite";

    let build = |store: SqliteStore| {
        let mut grants = AuthorizationSet::new();
        grants.grant_bearer("auditor", GrantScope::AllReceipts, Conditions::default());
        Vault::builder(VaultConfig::default().with_merchant(MerchantContext::new("Corner Cafe")))
            .backends(Backends::sqlite(store))
            .key_provider(Arc::new(MasterKeyProvider::new(MASTER_KEY)))
            .authorizations(grants.shared())
            .webhook_secret(secret)
            .build()
    };

    let body = coffee_webhook_body();
    let now = receipt_vault::store::now_millis() / 1000;
    let header = receipt_vault::ingest::signature::sign(secret.as_bytes(), now, &body);

    let token_id = {
        let vault = build(SqliteStore::open(&path).unwrap());
        issued(vault.handle_event(&body, Some(&header)).await.unwrap()).token_id
    };

    let vault = build(SqliteStore::open(&path).unwrap());
    let again = issued(vault.handle_event(&body, Some(&header)).await.unwrap());
    assert_eq!(again.token_id, token_id);

    let result = vault.verify(token_id, Some("Bearer auditor")).await.unwrap();
    let VerificationResult::Full(disclosure) = result else {
        panic!("expected full disclosure");
    };
    assert_eq!(disclosure.summary.merchant_name, "Corner Cafe");
    assert_eq!(disclosure.subtotal, Some(COFFEE_SUBTOTAL));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn sealed_payload_round_trips(event in generators::payment_event()) {
        let codec = PayloadCodec::new(Arc::new(MasterKeyProvider::new(MASTER_KEY)));
        let payload = ReceiptPayload::new(event, MerchantContext::new("m"));

        let blob = codec.seal(&payload).unwrap();
        prop_assert_eq!(&blob, &codec.seal(&payload).unwrap());
        prop_assert_eq!(codec.open(&blob).unwrap(), payload);
    }

    #[test]
    fn issuing_twice_yields_one_commitment(event in generators::payment_event()) {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let fixture = TestVault::new();
        let (first, second) = runtime.block_on(async {
            let first = fixture.vault.issue(event.clone()).await.unwrap();
            let second = fixture.vault.issue(event).await.unwrap();
            (first, second)
        });
        prop_assert_eq!(first, second);
        prop_assert_eq!(fixture.ledger.len(), 1);
    }
}
