// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Journal Vault

//! # Persistent Storage Module
//!
//! All state lives in a single embedded redb database file. redb gives
//! short-lived exclusive write transactions (writers serialize, a torn state
//! is never observable) and MVCC read transactions (readers never block).
//!
//! ## Table Layout
//!
//! ```text
//! users:        user_id              → UserRecord (balance, salt, timestamps)
//! entries:      (owner_id, entry_id) → StoredEntry (title + envelopes)
//! transactions: (owner_id, tx_id)    → CreditTransaction (append-only)
//! counters:     name                 → last allocated id
//! ```
//!
//! ## Rules
//!
//! - Balance mutation and log append always share one write transaction.
//! - Entry and transaction keys carry the owner; no operation addresses a
//!   row by id alone.
//! - Nothing in this module touches key material beyond moving opaque salt
//!   bytes; encryption happens a layer above, outside any open transaction.

pub mod database;
pub mod journal;
pub mod ledger;
pub mod users;

pub use database::{StorageError, StorageResult, VaultDatabase};
pub use journal::{EntryMetadata, EntryPatch, JournalRepository, StoredEntry};
pub use ledger::{CreditTransaction, DebitOutcome, LedgerRepository, TransactionKind};
pub use users::{UserRecord, UserRepository};
