// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Journal Vault

//! User directory: materialized credit balance and per-user key material.
//!
//! The salt is generated once, at account creation, and never rotated.
//! `ensure_salt` exists for rows that predate envelope encryption; it
//! provisions lazily inside a single write transaction, so two concurrent
//! first-calls cannot mint two different salts (redb serializes writers).

use chrono::{DateTime, Utc};
use redb::ReadableTable;
use serde::{Deserialize, Serialize};

use crate::crypto::{self, envelope::b64_opt};

use super::database::{
    next_id, StorageError, StorageResult, VaultDatabase, ENTRIES, TRANSACTIONS, TX_ID_COUNTER,
    USERS, USER_ID_COUNTER,
};
use super::ledger::{CreditTransaction, TransactionKind};

/// Stored user row: balance is a materialized view of the transaction log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    pub user_id: u64,
    /// Materialized credit balance; always equals the sum of the user's
    /// ledger rows.
    pub balance: i64,
    /// Per-user encryption salt. `None` only for rows created before
    /// envelope encryption existed; repaired by `ensure_salt`.
    #[serde(default, with = "b64_opt", skip_serializing_if = "Option::is_none")]
    pub key_salt: Option<Vec<u8>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Repository for user rows on the shared vault database.
pub struct UserRepository<'a> {
    db: &'a VaultDatabase,
}

impl<'a> UserRepository<'a> {
    pub fn new(db: &'a VaultDatabase) -> Self {
        Self { db }
    }

    /// Create a user together with their salt and welcome credits.
    ///
    /// The user row and the welcome purchase row commit in one transaction,
    /// so the ledger-conservation invariant holds from the very first row.
    pub fn create(&self, welcome_credits: i64) -> StorageResult<UserRecord> {
        let now = Utc::now();
        let write_txn = self.db.begin_write()?;
        let user = {
            let user_id = next_id(&write_txn, USER_ID_COUNTER)?;
            let user = UserRecord {
                user_id,
                balance: welcome_credits,
                key_salt: Some(crypto::generate_salt()),
                created_at: now,
                updated_at: now,
            };
            let mut users = write_txn.open_table(USERS)?;
            users.insert(user_id, serde_json::to_vec(&user)?.as_slice())?;

            if welcome_credits > 0 {
                let tx_id = next_id(&write_txn, TX_ID_COUNTER)?;
                let row = CreditTransaction {
                    tx_id,
                    owner_id: user_id,
                    amount: welcome_credits,
                    kind: TransactionKind::Purchase,
                    description: "welcome credits".to_string(),
                    source: Some("signup".to_string()),
                    external_ref: None,
                    created_at: now,
                };
                let mut transactions = write_txn.open_table(TRANSACTIONS)?;
                transactions.insert((user_id, tx_id), serde_json::to_vec(&row)?.as_slice())?;
            }
            user
        };
        write_txn.commit()?;
        Ok(user)
    }

    pub fn get(&self, user_id: u64) -> StorageResult<Option<UserRecord>> {
        let read_txn = self.db.begin_read()?;
        let users = read_txn.open_table(USERS)?;
        match users.get(user_id)? {
            Some(record) => Ok(Some(serde_json::from_slice(record.value())?)),
            None => Ok(None),
        }
    }

    /// Return the user's salt, provisioning one if the row predates
    /// encryption. Idempotent: the check and the write share one exclusive
    /// transaction.
    pub fn ensure_salt(&self, user_id: u64) -> StorageResult<Vec<u8>> {
        let write_txn = self.db.begin_write()?;
        let (salt, provisioned) = {
            let mut users = write_txn.open_table(USERS)?;
            let mut user: UserRecord = {
                let record = users
                    .get(user_id)?
                    .ok_or(StorageError::UnknownUser(user_id))?;
                serde_json::from_slice(record.value())?
            };

            match user.key_salt.clone() {
                Some(salt) => (salt, false),
                None => {
                    let salt = crypto::generate_salt();
                    user.key_salt = Some(salt.clone());
                    user.updated_at = Utc::now();
                    users.insert(user_id, serde_json::to_vec(&user)?.as_slice())?;
                    (salt, true)
                }
            }
        };
        write_txn.commit()?;

        if provisioned {
            tracing::info!(user_id, "provisioned encryption salt for legacy user");
        }
        Ok(salt)
    }

    /// Iterate all users (offline maintenance sweeps).
    pub fn all(&self) -> StorageResult<Vec<UserRecord>> {
        let read_txn = self.db.begin_read()?;
        let users = read_txn.open_table(USERS)?;
        let mut records = Vec::new();
        for entry in users.range(0..=u64::MAX)? {
            let (_, value) = entry?;
            records.push(serde_json::from_slice(value.value())?);
        }
        Ok(records)
    }

    /// Delete a user and cascade to their journal entries, in one
    /// transaction. The credit transaction log is deliberately retained as
    /// an audit trail. Returns false if no such user existed.
    pub fn delete_account(&self, user_id: u64) -> StorageResult<bool> {
        let write_txn = self.db.begin_write()?;
        let existed = {
            let mut users = write_txn.open_table(USERS)?;
            let existed = users.remove(user_id)?.is_some();

            if existed {
                let mut entries = write_txn.open_table(ENTRIES)?;
                let ids: Vec<(u64, u64)> = entries
                    .range((user_id, 0)..=(user_id, u64::MAX))?
                    .map(|item| item.map(|(key, _)| key.value()))
                    .collect::<Result<_, _>>()?;
                for key in ids {
                    entries.remove(key)?;
                }
            }
            existed
        };
        if existed {
            write_txn.commit()?;
        } else {
            write_txn.abort()?;
        }
        Ok(existed)
    }
}
