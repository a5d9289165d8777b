// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Journal Vault

//! Credit ledger: materialized per-user balance plus an append-only
//! transaction log.
//!
//! The stored balance is a view of the log, never an independent source of
//! truth: every balance mutation and its log row commit in the same write
//! transaction, so a crash leaves both untouched or both applied. Log rows
//! are never updated or deleted; they survive even account deletion as an
//! audit trail.

use chrono::{DateTime, Utc};
use redb::ReadableTable;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::database::{
    next_id, StorageError, StorageResult, VaultDatabase, TRANSACTIONS, TX_ID_COUNTER, USERS,
};
use super::users::UserRecord;

/// Transaction kind. `usage` rows carry negative amounts, the others positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    /// Credits granted (signup welcome grant or completed payment).
    Purchase,
    /// Credits consumed by a journal write.
    Usage,
    /// Credits returned by the payment collaborator.
    Refund,
}

/// One append-only ledger row.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreditTransaction {
    /// Monotonic transaction id (scoped to the whole ledger).
    pub tx_id: u64,
    /// Owning user.
    pub owner_id: u64,
    /// Signed amount; the sum over a user's rows equals their balance.
    pub amount: i64,
    pub kind: TransactionKind,
    /// Human-readable reason ("journal entry", "welcome credits", ...).
    pub description: String,
    /// Collaborator that initiated a grant (e.g. "signup", "stripe").
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// Correlation id from the initiating collaborator.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_ref: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Outcome of a debit attempt. Refusal is an expected outcome, not an error;
/// the error channel is reserved for storage failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DebitOutcome {
    /// Balance decremented and a usage row appended.
    Applied { new_balance: i64 },
    /// The debit would have driven the balance negative; nothing was mutated.
    InsufficientCredits { available: i64, required: i64 },
}

/// Repository for ledger operations on the shared vault database.
pub struct LedgerRepository<'a> {
    db: &'a VaultDatabase,
}

impl<'a> LedgerRepository<'a> {
    pub fn new(db: &'a VaultDatabase) -> Self {
        Self { db }
    }

    /// Read the materialized balance.
    pub fn balance(&self, owner_id: u64) -> StorageResult<i64> {
        let read_txn = self.db.begin_read()?;
        let users = read_txn.open_table(USERS)?;
        let record = users
            .get(owner_id)?
            .ok_or(StorageError::UnknownUser(owner_id))?;
        let user: UserRecord = serde_json::from_slice(record.value())?;
        Ok(user.balance)
    }

    /// Debit `amount` credits, appending a usage row.
    ///
    /// Runs entirely inside one exclusive write transaction: the balance
    /// check, the balance update, and the log append commit together or not
    /// at all. A refused debit aborts the transaction untouched.
    pub fn debit(
        &self,
        owner_id: u64,
        amount: i64,
        description: &str,
    ) -> StorageResult<DebitOutcome> {
        debug_assert!(amount > 0, "debit amount must be positive");

        let write_txn = self.db.begin_write()?;
        let outcome = {
            let mut users = write_txn.open_table(USERS)?;
            let mut user: UserRecord = {
                let record = users
                    .get(owner_id)?
                    .ok_or(StorageError::UnknownUser(owner_id))?;
                serde_json::from_slice(record.value())?
            };

            if user.balance < amount {
                DebitOutcome::InsufficientCredits {
                    available: user.balance,
                    required: amount,
                }
            } else {
                user.balance -= amount;
                user.updated_at = Utc::now();
                users.insert(owner_id, serde_json::to_vec(&user)?.as_slice())?;

                let tx_id = next_id(&write_txn, TX_ID_COUNTER)?;
                let row = CreditTransaction {
                    tx_id,
                    owner_id,
                    amount: -amount,
                    kind: TransactionKind::Usage,
                    description: description.to_string(),
                    source: None,
                    external_ref: None,
                    created_at: Utc::now(),
                };
                let mut transactions = write_txn.open_table(TRANSACTIONS)?;
                transactions.insert((owner_id, tx_id), serde_json::to_vec(&row)?.as_slice())?;

                DebitOutcome::Applied {
                    new_balance: user.balance,
                }
            }
        };

        match outcome {
            DebitOutcome::Applied { .. } => write_txn.commit()?,
            DebitOutcome::InsufficientCredits { .. } => write_txn.abort()?,
        }
        Ok(outcome)
    }

    /// Credit `amount` (a purchase or refund), appending a log row.
    /// Returns the new balance.
    pub fn credit(
        &self,
        owner_id: u64,
        amount: i64,
        kind: TransactionKind,
        source: Option<String>,
        external_ref: Option<String>,
        description: &str,
    ) -> StorageResult<i64> {
        debug_assert!(amount > 0, "credit amount must be positive");

        let write_txn = self.db.begin_write()?;
        let new_balance = {
            let mut users = write_txn.open_table(USERS)?;
            let mut user: UserRecord = {
                let record = users
                    .get(owner_id)?
                    .ok_or(StorageError::UnknownUser(owner_id))?;
                serde_json::from_slice(record.value())?
            };

            user.balance += amount;
            user.updated_at = Utc::now();
            users.insert(owner_id, serde_json::to_vec(&user)?.as_slice())?;

            let tx_id = next_id(&write_txn, TX_ID_COUNTER)?;
            let row = CreditTransaction {
                tx_id,
                owner_id,
                amount,
                kind,
                description: description.to_string(),
                source,
                external_ref,
                created_at: Utc::now(),
            };
            let mut transactions = write_txn.open_table(TRANSACTIONS)?;
            transactions.insert((owner_id, tx_id), serde_json::to_vec(&row)?.as_slice())?;

            user.balance
        };
        write_txn.commit()?;
        Ok(new_balance)
    }

    /// List a user's transactions, newest first.
    pub fn history(&self, owner_id: u64, limit: usize) -> StorageResult<Vec<CreditTransaction>> {
        let read_txn = self.db.begin_read()?;
        let transactions = read_txn.open_table(TRANSACTIONS)?;

        let mut rows = Vec::new();
        for entry in transactions
            .range((owner_id, 0)..=(owner_id, u64::MAX))?
            .rev()
        {
            let (_, value) = entry?;
            match serde_json::from_slice::<CreditTransaction>(value.value()) {
                Ok(row) => rows.push(row),
                Err(e) => {
                    tracing::warn!(owner_id, error = %e, "skipping unreadable ledger row");
                }
            }
            if rows.len() >= limit {
                break;
            }
        }
        Ok(rows)
    }

    /// Number of log rows for a user.
    pub fn log_len(&self, owner_id: u64) -> StorageResult<u64> {
        let read_txn = self.db.begin_read()?;
        let transactions = read_txn.open_table(TRANSACTIONS)?;
        let mut count = 0;
        for entry in transactions.range((owner_id, 0)..=(owner_id, u64::MAX))? {
            entry?;
            count += 1;
        }
        Ok(count)
    }

    /// Fold the transaction log. Must always equal the materialized balance;
    /// used by integrity checks and tests.
    pub fn recompute(&self, owner_id: u64) -> StorageResult<i64> {
        let read_txn = self.db.begin_read()?;
        let transactions = read_txn.open_table(TRANSACTIONS)?;
        let mut sum = 0i64;
        for entry in transactions.range((owner_id, 0)..=(owner_id, u64::MAX))? {
            let (_, value) = entry?;
            let row: CreditTransaction = serde_json::from_slice(value.value())?;
            sum += row.amount;
        }
        Ok(sum)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::users::UserRepository;

    fn temp_db() -> (VaultDatabase, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let db = VaultDatabase::open(&dir.path().join("test.redb")).unwrap();
        (db, dir)
    }

    fn user_with_credits(db: &VaultDatabase, credits: i64) -> u64 {
        UserRepository::new(db).create(credits).unwrap().user_id
    }

    #[test]
    fn debit_decrements_and_appends_usage_row() {
        let (db, _dir) = temp_db();
        let owner = user_with_credits(&db, 5);
        let ledger = LedgerRepository::new(&db);

        let outcome = ledger.debit(owner, 1, "journal entry").unwrap();
        assert_eq!(outcome, DebitOutcome::Applied { new_balance: 4 });
        assert_eq!(ledger.balance(owner).unwrap(), 4);

        let history = ledger.history(owner, 10).unwrap();
        // Newest first: the usage row precedes the welcome grant.
        assert_eq!(history[0].amount, -1);
        assert_eq!(history[0].kind, TransactionKind::Usage);
    }

    #[test]
    fn over_debit_mutates_nothing() {
        let (db, _dir) = temp_db();
        let owner = user_with_credits(&db, 0);
        let ledger = LedgerRepository::new(&db);

        let log_before = ledger.log_len(owner).unwrap();
        let outcome = ledger.debit(owner, 1, "journal entry").unwrap();
        assert_eq!(
            outcome,
            DebitOutcome::InsufficientCredits {
                available: 0,
                required: 1,
            }
        );
        assert_eq!(ledger.balance(owner).unwrap(), 0);
        assert_eq!(ledger.log_len(owner).unwrap(), log_before);
    }

    #[test]
    fn credit_increments_and_records_source() {
        let (db, _dir) = temp_db();
        let owner = user_with_credits(&db, 0);
        let ledger = LedgerRepository::new(&db);

        let balance = ledger
            .credit(
                owner,
                20,
                TransactionKind::Purchase,
                Some("stripe".into()),
                Some("cs_123".into()),
                "credit pack",
            )
            .unwrap();
        assert_eq!(balance, 20);

        let history = ledger.history(owner, 10).unwrap();
        assert_eq!(history[0].amount, 20);
        assert_eq!(history[0].source.as_deref(), Some("stripe"));
        assert_eq!(history[0].external_ref.as_deref(), Some("cs_123"));
    }

    #[test]
    fn refunds_are_ordinary_credits() {
        let (db, _dir) = temp_db();
        let owner = user_with_credits(&db, 5);
        let ledger = LedgerRepository::new(&db);

        ledger.debit(owner, 3, "journal entry").unwrap();
        let balance = ledger
            .credit(
                owner,
                3,
                TransactionKind::Refund,
                Some("stripe".into()),
                None,
                "disputed charge",
            )
            .unwrap();
        assert_eq!(balance, 5);
        assert_eq!(ledger.history(owner, 1).unwrap()[0].kind, TransactionKind::Refund);
    }

    #[test]
    fn balance_is_conserved_across_mixed_operations() {
        let (db, _dir) = temp_db();
        let owner = user_with_credits(&db, 2);
        let ledger = LedgerRepository::new(&db);

        ledger.debit(owner, 1, "journal entry").unwrap();
        ledger
            .credit(owner, 10, TransactionKind::Purchase, None, None, "pack")
            .unwrap();
        ledger.debit(owner, 4, "journal entry").unwrap();
        // Rejected debit must not show up in the log.
        ledger.debit(owner, 100, "journal entry").unwrap();

        let balance = ledger.balance(owner).unwrap();
        assert_eq!(balance, 7);
        assert_eq!(ledger.recompute(owner).unwrap(), balance);
        // welcome + usage + purchase + usage = 4 applied operations
        assert_eq!(ledger.log_len(owner).unwrap(), 4);
    }

    #[test]
    fn histories_are_scoped_per_user() {
        let (db, _dir) = temp_db();
        let a = user_with_credits(&db, 5);
        let b = user_with_credits(&db, 5);
        let ledger = LedgerRepository::new(&db);

        ledger.debit(a, 2, "journal entry").unwrap();

        let history_b = ledger.history(b, 10).unwrap();
        assert!(history_b.iter().all(|row| row.owner_id == b));
        assert_eq!(history_b.len(), 1); // welcome grant only
    }

    #[test]
    fn unknown_user_is_an_error() {
        let (db, _dir) = temp_db();
        let ledger = LedgerRepository::new(&db);
        assert!(matches!(
            ledger.balance(999),
            Err(StorageError::UnknownUser(999))
        ));
        assert!(matches!(
            ledger.debit(999, 1, "x"),
            Err(StorageError::UnknownUser(999))
        ));
    }
}
