// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Journal Vault

//! Embedded vault database backed by redb (pure Rust, ACID).
//!
//! ## Table Layout
//!
//! - `users`: user_id → serialized UserRecord (materialized balance + salt)
//! - `entries`: composite key (owner_id, entry_id) → serialized StoredEntry
//! - `transactions`: composite key (owner_id, tx_id) → serialized CreditTransaction
//! - `counters`: name → last allocated id
//!
//! Entries and transactions are keyed by `(owner_id, local_id)` so every
//! lookup and mutation carries the owner in the key itself; a guessed id
//! from another account can never address a foreign row.

use std::path::Path;

use redb::{
    Database, ReadTransaction, ReadableDatabase, ReadableTable, TableDefinition, WriteTransaction,
};

/// Primary table: user_id → serialized UserRecord (JSON bytes).
pub(super) const USERS: TableDefinition<u64, &[u8]> = TableDefinition::new("users");

/// Journal entries: (owner_id, entry_id) → serialized StoredEntry (JSON bytes).
pub(super) const ENTRIES: TableDefinition<(u64, u64), &[u8]> = TableDefinition::new("entries");

/// Append-only credit log: (owner_id, tx_id) → serialized CreditTransaction.
pub(super) const TRANSACTIONS: TableDefinition<(u64, u64), &[u8]> =
    TableDefinition::new("transactions");

/// Monotonic id allocation: counter name → last issued value.
pub(super) const COUNTERS: TableDefinition<&str, u64> = TableDefinition::new("counters");

pub(super) const USER_ID_COUNTER: &str = "user_id";
pub(super) const ENTRY_ID_COUNTER: &str = "entry_id";
pub(super) const TX_ID_COUNTER: &str = "tx_id";

// =============================================================================
// Error Type
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("redb error: {0}")]
    Redb(#[from] redb::Error),

    #[error("redb database error: {0}")]
    RedbDatabase(#[from] redb::DatabaseError),

    #[error("redb transaction error: {0}")]
    RedbTransaction(#[from] redb::TransactionError),

    #[error("redb table error: {0}")]
    RedbTable(#[from] redb::TableError),

    #[error("redb storage error: {0}")]
    RedbStorage(#[from] redb::StorageError),

    #[error("redb commit error: {0}")]
    RedbCommit(#[from] redb::CommitError),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("unknown user: {0}")]
    UnknownUser(u64),
}

pub type StorageResult<T> = Result<T, StorageError>;

// =============================================================================
// VaultDatabase
// =============================================================================

/// Embedded ACID database shared by all repositories.
pub struct VaultDatabase {
    db: Database,
}

impl VaultDatabase {
    /// Open (or create) the database at the given path.
    pub fn open(path: &Path) -> StorageResult<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let db = Database::create(path)?;

        // Pre-create all tables so later read transactions don't fail
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(USERS)?;
            let _ = write_txn.open_table(ENTRIES)?;
            let _ = write_txn.open_table(TRANSACTIONS)?;
            let _ = write_txn.open_table(COUNTERS)?;
        }
        write_txn.commit()?;

        Ok(Self { db })
    }

    /// Begin an exclusive write transaction. Writers are serialized by redb;
    /// keep these short-lived and never perform key derivation while one is
    /// open.
    pub(super) fn begin_write(&self) -> StorageResult<WriteTransaction> {
        Ok(self.db.begin_write()?)
    }

    /// Begin an MVCC read transaction (does not block writers or other readers).
    pub(super) fn begin_read(&self) -> StorageResult<ReadTransaction> {
        Ok(self.db.begin_read()?)
    }
}

/// Allocate the next id for `counter` within an open write transaction.
///
/// The increment commits or aborts together with the rest of the transaction,
/// so ids are never burned by a rolled-back operation.
pub(super) fn next_id(txn: &WriteTransaction, counter: &str) -> StorageResult<u64> {
    let mut table = txn.open_table(COUNTERS)?;
    let current = table.get(counter)?.map(|v| v.value()).unwrap_or(0);
    let next = current + 1;
    table.insert(counter, next)?;
    Ok(next)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_db() -> (VaultDatabase, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let db = VaultDatabase::open(&dir.path().join("test.redb")).unwrap();
        (db, dir)
    }

    #[test]
    fn open_precreates_tables() {
        let (db, _dir) = temp_db();
        // Fresh read transactions must be able to open every table.
        let read_txn = db.begin_read().unwrap();
        assert!(read_txn.open_table(USERS).is_ok());
        assert!(read_txn.open_table(ENTRIES).is_ok());
        assert!(read_txn.open_table(TRANSACTIONS).is_ok());
        assert!(read_txn.open_table(COUNTERS).is_ok());
    }

    #[test]
    fn next_id_is_monotonic_per_counter() {
        let (db, _dir) = temp_db();
        let txn = db.begin_write().unwrap();
        assert_eq!(next_id(&txn, ENTRY_ID_COUNTER).unwrap(), 1);
        assert_eq!(next_id(&txn, ENTRY_ID_COUNTER).unwrap(), 2);
        assert_eq!(next_id(&txn, TX_ID_COUNTER).unwrap(), 1);
        txn.commit().unwrap();

        let txn = db.begin_write().unwrap();
        assert_eq!(next_id(&txn, ENTRY_ID_COUNTER).unwrap(), 3);
        txn.commit().unwrap();
    }

    #[test]
    fn aborted_transaction_does_not_burn_ids() {
        let (db, _dir) = temp_db();
        let txn = db.begin_write().unwrap();
        assert_eq!(next_id(&txn, ENTRY_ID_COUNTER).unwrap(), 1);
        txn.abort().unwrap();

        let txn = db.begin_write().unwrap();
        assert_eq!(next_id(&txn, ENTRY_ID_COUNTER).unwrap(), 1);
        txn.commit().unwrap();
    }
}
