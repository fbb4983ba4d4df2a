//! # Receipt Vault Store
//!
//! Storage abstraction for the receipt vault. Three narrow async traits model
//! the external collaborators the pipeline depends on:
//!
//! - [`ContentStore`] - content-addressed blob storage for ciphertext
//! - [`Ledger`] - append-only commitment ledger that mints token ids
//! - [`IdempotencyIndex`] - atomic claim/complete/release per event id
//!
//! [`SqliteStore`] implements all three over one database file; the
//! `Memory*` types are for tests.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use receipt_vault_store::{ContentStore, SqliteStore};
//!
//! async fn example() {
//!     let store = SqliteStore::open("vault.db").unwrap();
//!     let address = store.put(b"ciphertext").await.unwrap();
//!     assert!(store.get(&address).await.unwrap().is_some());
//! }
//! ```

pub mod error;
pub mod memory;
pub mod migration;
pub mod sqlite;
pub mod traits;

pub use error::{Result, StoreError};
pub use memory::{MemoryContentStore, MemoryIdempotencyIndex, MemoryLedger};
pub use sqlite::SqliteStore;
pub use traits::{ClaimOutcome, ContentStore, IdempotencyIndex, Ledger};

/// Current wall-clock time in Unix milliseconds.
pub fn now_millis() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
