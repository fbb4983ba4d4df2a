//! # Receipt Vault Testkit
//!
//! Testing utilities for the receipt vault.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Fixtures**: [`TestVault`] wires a vault to in-memory backends wrapped
//!   in instrumented doubles
//! - **Test doubles**: a fetch-counting content store, a ledger that fails on
//!   demand, a content store that corrupts what it returns, and a map-backed
//!   object resolver
//! - **Vectors**: the coffee-shop scenario as a provider webhook, plus a
//!   canonical encoding vector
//! - **Generators**: proptest strategies for valid payment events
//!
//! ## Test Fixtures
//!
//! ```rust,no_run
//! use receipt_vault_testkit::{vectors, TestVault};
//!
//! async fn example() {
//!     let fixture = TestVault::new();
//!     let outcome = fixture.deliver(&vectors::coffee_webhook_body()).await.unwrap();
//!     let token_id = outcome.commitment().unwrap().token_id;
//!     let header = fixture.bearer_header();
//!     let full = fixture.vault.verify(token_id, Some(header.as_str())).await;
//!     assert!(full.is_ok());
//! }
//! ```

pub mod fixtures;
pub mod generators;
pub mod vectors;

pub use fixtures::{
    CorruptingContentStore, CountingContentStore, FlakyLedger, MapResolver, TestVault,
};
pub use generators::{line_item, payment_event};
pub use vectors::{coffee_event, coffee_webhook_body, CanonicalVector};
