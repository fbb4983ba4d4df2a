//! Database schema migrations for SQLite.
//!
//! A simple versioned migration system. Each migration is a SQL batch that
//! transforms the schema from version N to N+1.

use rusqlite::Connection;

use crate::error::{Result, StoreError};

/// Current schema version.
pub const CURRENT_VERSION: u32 = 2;

/// Initialize or migrate the database schema.
///
/// Idempotent: it can be called on every open.
pub fn migrate(conn: &mut Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at INTEGER NOT NULL
        )",
        [],
    )?;

    let current: u32 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
        [],
        |row| row.get(0),
    )?;

    if current < CURRENT_VERSION {
        let tx = conn.transaction()?;

        for version in (current + 1)..=CURRENT_VERSION {
            apply_migration(&tx, version)?;

            tx.execute(
                "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
                rusqlite::params![version, crate::now_millis()],
            )?;
        }

        tx.commit()?;
    }

    Ok(())
}

fn apply_migration(conn: &Connection, version: u32) -> Result<()> {
    match version {
        1 => apply_v1(conn),
        2 => apply_v2(conn),
        _ => Err(StoreError::Migration(format!(
            "unknown migration version: {version}"
        ))),
    }
}

/// Migration v1: blobs and the commitment ledger.
fn apply_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        -- Content-addressed blobs (encrypted payloads)
        CREATE TABLE blobs (
            address BLOB PRIMARY KEY,         -- 32 bytes, Blake3 hash of bytes
            bytes BLOB NOT NULL,
            stored_at INTEGER NOT NULL
        );

        -- Append-only commitment ledger; rowid is the token id
        CREATE TABLE commitments (
            token_id INTEGER PRIMARY KEY AUTOINCREMENT,
            integrity_hash BLOB NOT NULL,     -- 32 bytes
            content_address BLOB NOT NULL,    -- 32 bytes
            recipient TEXT NOT NULL,
            issued_at INTEGER NOT NULL        -- Unix ms
        );

        CREATE INDEX idx_commitments_recipient ON commitments(recipient);
        "#,
    )?;

    Ok(())
}

/// Migration v2: idempotency index.
fn apply_v2(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE idempotency (
            event_id TEXT PRIMARY KEY,
            token_id INTEGER,                 -- NULL while pending
            lease_expires_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );
        "#,
    )?;

    Ok(())
}
