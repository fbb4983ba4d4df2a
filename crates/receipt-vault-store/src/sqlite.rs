//! SQLite implementation of the store traits.
//!
//! One database file backs all three interfaces: blobs, the commitment
//! ledger, and the idempotency index. Uses rusqlite with bundled SQLite,
//! wrapped in async via `tokio::task::spawn_blocking`.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};

use receipt_vault_core::{
    CommitmentRecord, ContentAddress, EventId, IntegrityHash, ReceiptCommitment, TokenId,
};

use crate::error::{Result, StoreError};
use crate::migration;
use crate::traits::{ClaimOutcome, ContentStore, IdempotencyIndex, Ledger};

/// SQLite-based store.
///
/// Thread-safe via an internal Mutex. Cloning shares the connection.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open a SQLite database at the given path.
    ///
    /// Creates the file and runs migrations if needed.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let mut conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory SQLite database.
    pub fn open_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run a closure against the connection on the blocking pool.
    async fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = conn.lock()?;
            f(&mut conn)
        })
        .await
        .map_err(|e| StoreError::Task(e.to_string()))?
    }
}

fn blob_to_32(bytes: Vec<u8>, column: &str) -> Result<[u8; 32]> {
    bytes
        .try_into()
        .map_err(|_| StoreError::InvalidData(format!("{column} is not 32 bytes")))
}

fn token_to_sql(token_id: TokenId) -> Result<i64> {
    i64::try_from(token_id.value())
        .map_err(|_| StoreError::InvalidData(format!("token id {token_id} out of range")))
}

#[async_trait]
impl ContentStore for SqliteStore {
    async fn put(&self, bytes: &[u8]) -> Result<ContentAddress> {
        let address = ContentAddress::for_bytes(bytes);
        let bytes = bytes.to_vec();

        self.with_conn(move |conn| {
            conn.execute(
                "INSERT OR IGNORE INTO blobs (address, bytes, stored_at) VALUES (?1, ?2, ?3)",
                params![address.as_bytes().as_slice(), bytes, crate::now_millis()],
            )?;
            Ok(address)
        })
        .await
    }

    async fn get(&self, address: &ContentAddress) -> Result<Option<Vec<u8>>> {
        let address = *address;
        self.with_conn(move |conn| {
            let bytes = conn
                .query_row(
                    "SELECT bytes FROM blobs WHERE address = ?1",
                    params![address.as_bytes().as_slice()],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(bytes)
        })
        .await
    }
}

#[async_trait]
impl Ledger for SqliteStore {
    async fn append(&self, record: &CommitmentRecord) -> Result<TokenId> {
        let record = record.clone();
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO commitments (integrity_hash, content_address, recipient, issued_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    record.integrity_hash.as_bytes().as_slice(),
                    record.content_address.as_bytes().as_slice(),
                    record.recipient,
                    record.issued_at,
                ],
            )?;
            let rowid = conn.last_insert_rowid();
            let token = u64::try_from(rowid)
                .map_err(|_| StoreError::InvalidData(format!("negative token id {rowid}")))?;
            Ok(TokenId(token))
        })
        .await
    }

    async fn read(&self, token_id: TokenId) -> Result<Option<ReceiptCommitment>> {
        let Ok(key) = token_to_sql(token_id) else {
            return Ok(None);
        };

        self.with_conn(move |conn| {
            let row = conn
                .query_row(
                    "SELECT integrity_hash, content_address, recipient, issued_at
                     FROM commitments WHERE token_id = ?1",
                    params![key],
                    |row| {
                        Ok((
                            row.get::<_, Vec<u8>>(0)?,
                            row.get::<_, Vec<u8>>(1)?,
                            row.get::<_, String>(2)?,
                            row.get::<_, i64>(3)?,
                        ))
                    },
                )
                .optional()?;

            let Some((hash, address, recipient, issued_at)) = row else {
                return Ok(None);
            };

            Ok(Some(ReceiptCommitment {
                token_id,
                integrity_hash: IntegrityHash::from_bytes(blob_to_32(hash, "integrity_hash")?),
                content_address: ContentAddress::from_bytes(blob_to_32(
                    address,
                    "content_address",
                )?),
                recipient,
                issued_at,
            }))
        })
        .await
    }
}

#[async_trait]
impl IdempotencyIndex for SqliteStore {
    async fn claim(&self, event_id: &EventId, now: i64, lease_ms: i64) -> Result<ClaimOutcome> {
        let event_id = event_id.as_str().to_owned();
        self.with_conn(move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            let existing: Option<(Option<i64>, i64)> = tx
                .query_row(
                    "SELECT token_id, lease_expires_at FROM idempotency WHERE event_id = ?1",
                    params![event_id],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()?;

            let outcome = match existing {
                Some((Some(token), _)) => {
                    let token = u64::try_from(token)
                        .map_err(|_| StoreError::InvalidData(format!("token id {token}")))?;
                    ClaimOutcome::Committed(TokenId(token))
                }
                Some((None, lease_expires_at)) if lease_expires_at > now => ClaimOutcome::Pending,
                _ => {
                    tx.execute(
                        "INSERT INTO idempotency (event_id, token_id, lease_expires_at, updated_at)
                         VALUES (?1, NULL, ?2, ?3)
                         ON CONFLICT(event_id) DO UPDATE SET
                            lease_expires_at = excluded.lease_expires_at,
                            updated_at = excluded.updated_at",
                        params![event_id, now.saturating_add(lease_ms), now],
                    )?;
                    ClaimOutcome::Claimed
                }
            };

            tx.commit()?;
            Ok(outcome)
        })
        .await
    }

    async fn complete(&self, event_id: &EventId, token_id: TokenId) -> Result<()> {
        let event_id = event_id.as_str().to_owned();
        let token = token_to_sql(token_id)?;
        self.with_conn(move |conn| {
            let updated = conn.execute(
                "UPDATE idempotency SET token_id = ?2, updated_at = ?3
                 WHERE event_id = ?1 AND (token_id IS NULL OR token_id = ?2)",
                params![event_id, token, crate::now_millis()],
            )?;
            if updated == 0 {
                return Err(StoreError::NotClaimed(event_id));
            }
            Ok(())
        })
        .await
    }

    async fn release(&self, event_id: &EventId) -> Result<()> {
        let event_id = event_id.as_str().to_owned();
        self.with_conn(move |conn| {
            conn.execute(
                "DELETE FROM idempotency WHERE event_id = ?1 AND token_id IS NULL",
                params![event_id],
            )?;
            Ok(())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(n: u8) -> CommitmentRecord {
        CommitmentRecord {
            integrity_hash: IntegrityHash::from_bytes([n; 32]),
            content_address: ContentAddress::from_bytes([n.wrapping_add(1); 32]),
            recipient: format!("acct_{n}"),
            issued_at: 1_700_000_000_000 + n as i64,
        }
    }

    #[tokio::test]
    async fn test_put_and_get_blob() {
        let store = SqliteStore::open_memory().unwrap();
        let address = store.put(b"ciphertext").await.unwrap();
        assert_eq!(address, ContentAddress::for_bytes(b"ciphertext"));

        // Second write of the same bytes is a no-op.
        assert_eq!(store.put(b"ciphertext").await.unwrap(), address);

        let bytes = store.get(&address).await.unwrap().unwrap();
        assert_eq!(bytes, b"ciphertext");

        let missing = ContentAddress::for_bytes(b"other");
        assert!(store.get(&missing).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_ledger_append_and_read() {
        let store = SqliteStore::open_memory().unwrap();

        let t1 = store.append(&record(1)).await.unwrap();
        let t2 = store.append(&record(2)).await.unwrap();
        assert_eq!(t1, TokenId(1));
        assert_eq!(t2, TokenId(2));

        let read = store.read(t2).await.unwrap().unwrap();
        assert_eq!(read.token_id, t2);
        assert_eq!(read.record(), record(2));

        assert!(store.read(TokenId(99)).await.unwrap().is_none());
        assert!(store.read(TokenId(u64::MAX)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_claim_complete_release() {
        let store = SqliteStore::open_memory().unwrap();
        let evt = EventId::new("evt_1");

        assert_eq!(store.claim(&evt, 0, 1000).await.unwrap(), ClaimOutcome::Claimed);
        assert_eq!(store.claim(&evt, 1, 1000).await.unwrap(), ClaimOutcome::Pending);

        store.release(&evt).await.unwrap();
        assert_eq!(store.claim(&evt, 2, 1000).await.unwrap(), ClaimOutcome::Claimed);

        store.complete(&evt, TokenId(4)).await.unwrap();
        // Completing twice with the same token is fine.
        store.complete(&evt, TokenId(4)).await.unwrap();
        assert!(store.complete(&evt, TokenId(5)).await.is_err());

        store.release(&evt).await.unwrap();
        assert_eq!(
            store.claim(&evt, 3, 1000).await.unwrap(),
            ClaimOutcome::Committed(TokenId(4))
        );
    }

    #[tokio::test]
    async fn test_expired_lease_taken_over() {
        let store = SqliteStore::open_memory().unwrap();
        let evt = EventId::new("evt_1");

        assert_eq!(store.claim(&evt, 0, 50).await.unwrap(), ClaimOutcome::Claimed);
        assert_eq!(store.claim(&evt, 49, 50).await.unwrap(), ClaimOutcome::Pending);
        assert_eq!(store.claim(&evt, 50, 50).await.unwrap(), ClaimOutcome::Claimed);
    }

    #[tokio::test]
    async fn test_persistence_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vault.db");

        let address = {
            let store = SqliteStore::open(&path).unwrap();
            let evt = EventId::new("evt_p");
            store.claim(&evt, 0, 10).await.unwrap();
            let token = store.append(&record(1)).await.unwrap();
            store.complete(&evt, token).await.unwrap();
            store.put(b"blob").await.unwrap()
        };

        let store = SqliteStore::open(&path).unwrap();
        assert!(store.read(TokenId(1)).await.unwrap().is_some());
        assert_eq!(store.get(&address).await.unwrap().unwrap(), b"blob");
        assert_eq!(
            store.claim(&EventId::new("evt_p"), 0, 10).await.unwrap(),
            ClaimOutcome::Committed(TokenId(1))
        );
    }
}
