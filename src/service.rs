// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Journal Vault

//! Write and read pipelines over the vault storage and the encryption
//! engine.
//!
//! The write pipeline runs validate → encrypt → persist → debit. Persist
//! comes before debit on purpose: a credit is never spent without durable
//! content, and the one remaining window (content persisted, not yet paid)
//! is closed deterministically by a compensating delete when the debit is
//! refused.
//!
//! Key derivation is CPU-bound and runs on the Tokio blocking pool, never
//! on request-intake threads, never while a storage transaction is open.
//! Reads recompute plaintext from the stored envelope every time; nothing is
//! cached.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use unicode_normalization::UnicodeNormalization;

use crate::crypto::{CryptoError, EncryptionEngine, Envelope};
use crate::storage::{
    DebitOutcome, EntryMetadata, EntryPatch, JournalRepository, LedgerRepository, StorageError,
    TransactionKind, UserRecord, UserRepository, VaultDatabase,
};

/// Credits consumed by one journal write.
pub const ENTRY_COST: i64 = 1;

pub const TITLE_MAX_LEN: usize = 200;
pub const CONTENT_MAX_LEN: usize = 50_000;
pub const MAX_TAGS: usize = 20;
pub const TAG_MAX_LEN: usize = 50;

#[derive(Debug, thiserror::Error)]
pub enum JournalError {
    /// Malformed or missing input; nothing was mutated.
    #[error("invalid input: {0}")]
    Validation(String),

    /// The ledger refused the debit; any provisional entry was compensated
    /// away. Never retried automatically; the caller must top up first.
    #[error("insufficient credits: {required} required, {available} available")]
    InsufficientCredits { available: i64, required: i64 },

    /// An envelope failed authentication. Reported uniformly whatever the
    /// cause; never retried.
    #[error("entry could not be decrypted")]
    DecryptionFailure,

    /// The trusted caller referenced an owner id with no user row.
    #[error("unknown user {0}")]
    UnknownUser(u64),

    /// No entry under this (id, owner) pair.
    #[error("entry not found")]
    EntryNotFound,

    /// The encryption task failed to run to completion.
    #[error("encryption task failed")]
    Worker,

    /// The storage transaction could not commit. Nothing was durably
    /// applied, so the whole operation is safe to retry.
    #[error(transparent)]
    Storage(StorageError),
}

impl From<StorageError> for JournalError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::UnknownUser(id) => JournalError::UnknownUser(id),
            other => JournalError::Storage(other),
        }
    }
}

impl From<CryptoError> for JournalError {
    fn from(e: CryptoError) -> Self {
        match e {
            CryptoError::DecryptionFailure => JournalError::DecryptionFailure,
            CryptoError::EncryptionFailure => JournalError::Worker,
        }
    }
}

/// Input for entry creation. A missing title defaults to the current date.
#[derive(Debug, Clone, Default)]
pub struct NewEntry {
    pub title: Option<String>,
    pub content: String,
    pub tags: Vec<String>,
}

/// Input for entry updates. `tags: Some(vec![])` clears the tag list.
#[derive(Debug, Clone, Default)]
pub struct EntryUpdate {
    pub title: Option<String>,
    pub content: Option<String>,
    pub tags: Option<Vec<String>>,
}

/// Result of a committed write: the durable entry plus the balance after
/// the debit.
#[derive(Debug, Clone)]
pub struct EntryReceipt {
    pub entry_id: u64,
    pub title: String,
    pub new_balance: i64,
}

/// A fully decrypted entry as returned to its owner.
#[derive(Debug, Clone)]
pub struct DecryptedEntry {
    pub entry_id: u64,
    pub title: String,
    pub content: String,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One page of entry metadata.
#[derive(Debug, Clone)]
pub struct EntryPage {
    pub entries: Vec<EntryMetadata>,
    pub page: usize,
    pub limit: usize,
    pub total: u64,
}

/// Outcome of an offline rekey sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RekeyReport {
    pub users: u64,
    pub reencrypted: u64,
    pub failed: u64,
}

/// Owns the database handle, the encryption engine, and the signup policy;
/// passed by reference (via `AppState`) into the HTTP handlers.
pub struct JournalService {
    db: Arc<VaultDatabase>,
    engine: Arc<EncryptionEngine>,
    welcome_credits: i64,
}

impl JournalService {
    pub fn new(db: VaultDatabase, engine: EncryptionEngine, welcome_credits: i64) -> Self {
        Self {
            db: Arc::new(db),
            engine: Arc::new(engine),
            welcome_credits,
        }
    }

    // =========================================================================
    // Write pipeline
    // =========================================================================

    /// Create an encrypted entry and debit one credit.
    ///
    /// States: Validating → Encrypting → Persisting → Debiting → Committed,
    /// with Compensating → Deleted on a refused debit.
    pub async fn create_entry(
        &self,
        owner_id: u64,
        entry: NewEntry,
    ) -> Result<EntryReceipt, JournalError> {
        // Validating
        let (title, content, tags) = validate_new_entry(entry)?;

        // Resolve key material before spending CPU on derivation.
        let salt = UserRepository::new(&self.db).ensure_salt(owner_id)?;

        // Encrypting: off the intake threads, no transaction open.
        let engine = Arc::clone(&self.engine);
        let encrypt_salt = salt.clone();
        let (content_env, tags_env) = tokio::task::spawn_blocking(
            move || -> Result<(Envelope, Option<Envelope>), CryptoError> {
                let content_env = engine.encrypt(content.as_bytes(), &encrypt_salt)?;
                let tags_env = if tags.is_empty() {
                    None
                } else {
                    Some(engine.encrypt_json(&tags, &encrypt_salt)?)
                };
                Ok((content_env, tags_env))
            },
        )
        .await
        .map_err(|_| JournalError::Worker)??;

        // Persisting: the entry exists now, but is unpaid.
        let journal = JournalRepository::new(&self.db);
        let entry_id = journal.insert(owner_id, title.clone(), content_env, tags_env)?;

        // Debiting
        let ledger = LedgerRepository::new(&self.db);
        match ledger.debit(owner_id, ENTRY_COST, "journal entry")? {
            DebitOutcome::Applied { new_balance } => {
                tracing::debug!(owner_id, entry_id, new_balance, "journal entry committed");
                Ok(EntryReceipt {
                    entry_id,
                    title,
                    new_balance,
                })
            }
            DebitOutcome::InsufficientCredits {
                available,
                required,
            } => {
                // Compensating: the unpaid entry must not survive.
                if let Err(e) = journal.delete(entry_id, owner_id) {
                    tracing::error!(
                        owner_id,
                        entry_id,
                        error = %e,
                        "compensating delete failed; unpaid entry left behind"
                    );
                    return Err(e.into());
                }
                tracing::debug!(owner_id, entry_id, "entry compensated after refused debit");
                Err(JournalError::InsufficientCredits {
                    available,
                    required,
                })
            }
        }
    }

    /// Re-encrypt the supplied fields of an existing entry. Free of charge;
    /// only creation is metered.
    pub async fn update_entry(
        &self,
        owner_id: u64,
        entry_id: u64,
        update: EntryUpdate,
    ) -> Result<(), JournalError> {
        let (title, content, tags) = validate_entry_update(update)?;

        let needs_crypto = content.is_some() || tags.is_some();
        let (content_env, tags_env) = if needs_crypto {
            let salt = UserRepository::new(&self.db).ensure_salt(owner_id)?;
            let engine = Arc::clone(&self.engine);
            tokio::task::spawn_blocking(
                move || -> Result<(Option<Envelope>, Option<Option<Envelope>>), CryptoError> {
                    let content_env = content
                        .map(|c| engine.encrypt(c.as_bytes(), &salt))
                        .transpose()?;
                    let tags_env = match tags {
                        None => None,
                        Some(tags) if tags.is_empty() => Some(None),
                        Some(tags) => Some(Some(engine.encrypt_json(&tags, &salt)?)),
                    };
                    Ok((content_env, tags_env))
                },
            )
            .await
            .map_err(|_| JournalError::Worker)??
        } else {
            (None, None)
        };

        let patch = EntryPatch {
            title,
            content: content_env,
            tags: tags_env,
        };
        let changed = JournalRepository::new(&self.db).update(entry_id, owner_id, patch)?;
        if changed {
            Ok(())
        } else {
            Err(JournalError::EntryNotFound)
        }
    }

    /// Delete an entry owned by the caller.
    pub fn delete_entry(&self, owner_id: u64, entry_id: u64) -> Result<(), JournalError> {
        if JournalRepository::new(&self.db).delete(entry_id, owner_id)? {
            Ok(())
        } else {
            Err(JournalError::EntryNotFound)
        }
    }

    // =========================================================================
    // Read pipeline
    // =========================================================================

    /// Metadata projection; touches neither key material nor the ledger.
    pub fn list_entries(
        &self,
        owner_id: u64,
        page: usize,
        limit: usize,
    ) -> Result<EntryPage, JournalError> {
        let page = page.max(1);
        let limit = limit.clamp(1, 50);
        let (entries, total) =
            JournalRepository::new(&self.db).list_metadata(owner_id, page, limit)?;
        Ok(EntryPage {
            entries,
            page,
            limit,
            total,
        })
    }

    /// Plaintext title search, metadata projection only.
    pub fn search_entries(
        &self,
        owner_id: u64,
        query: &str,
        limit: usize,
    ) -> Result<Vec<EntryMetadata>, JournalError> {
        let query = normalize(query);
        if query.is_empty() {
            return Err(JournalError::Validation("search term required".into()));
        }
        let limit = limit.clamp(1, 50);
        Ok(JournalRepository::new(&self.db).search_titles(owner_id, &query, limit)?)
    }

    /// Load and decrypt a single entry.
    ///
    /// A content envelope that fails authentication is fatal for the
    /// request; a failing tag envelope degrades to an empty tag list so one
    /// corrupted field cannot hold the whole entry hostage.
    pub async fn fetch_entry(
        &self,
        owner_id: u64,
        entry_id: u64,
    ) -> Result<DecryptedEntry, JournalError> {
        let entry = JournalRepository::new(&self.db)
            .fetch_full(entry_id, owner_id)?
            .ok_or(JournalError::EntryNotFound)?;
        let salt = UserRepository::new(&self.db).ensure_salt(owner_id)?;

        let engine = Arc::clone(&self.engine);
        let content_env = entry.content.clone();
        let tags_env = entry.tags.clone();
        let (content, tags) = tokio::task::spawn_blocking(
            move || -> Result<(String, Vec<String>), CryptoError> {
                let content = engine.decrypt_str(&content_env, &salt)?;
                let tags = match &tags_env {
                    None => Vec::new(),
                    Some(envelope) => match engine.decrypt_json(envelope, &salt) {
                        Ok(tags) => tags,
                        Err(_) => {
                            tracing::warn!(
                                owner_id,
                                entry_id,
                                "tag envelope failed authentication; degrading to empty tag list"
                            );
                            Vec::new()
                        }
                    },
                };
                Ok((content, tags))
            },
        )
        .await
        .map_err(|_| JournalError::Worker)??;

        Ok(DecryptedEntry {
            entry_id: entry.entry_id,
            title: entry.title,
            content,
            tags,
            created_at: entry.created_at,
            updated_at: entry.updated_at,
        })
    }

    // =========================================================================
    // Accounts & credits
    // =========================================================================

    /// Create a user with salt and welcome credits in one transaction.
    pub fn create_account(&self) -> Result<UserRecord, JournalError> {
        let user = UserRepository::new(&self.db).create(self.welcome_credits)?;
        tracing::info!(user_id = user.user_id, "account created");
        Ok(user)
    }

    pub fn account(&self, owner_id: u64) -> Result<UserRecord, JournalError> {
        UserRepository::new(&self.db)
            .get(owner_id)?
            .ok_or(JournalError::UnknownUser(owner_id))
    }

    /// Delete the account and cascade to its entries; the transaction log
    /// is retained as an audit trail.
    pub fn delete_account(&self, owner_id: u64) -> Result<(), JournalError> {
        if UserRepository::new(&self.db).delete_account(owner_id)? {
            tracing::info!(user_id = owner_id, "account deleted");
            Ok(())
        } else {
            Err(JournalError::UnknownUser(owner_id))
        }
    }

    pub fn balance(&self, owner_id: u64) -> Result<i64, JournalError> {
        Ok(LedgerRepository::new(&self.db).balance(owner_id)?)
    }

    /// Record a completed purchase reported by the payment collaborator.
    pub fn top_up(
        &self,
        owner_id: u64,
        amount: i64,
        source: String,
        external_ref: Option<String>,
    ) -> Result<i64, JournalError> {
        if amount <= 0 {
            return Err(JournalError::Validation(
                "top-up amount must be positive".into(),
            ));
        }
        let balance = LedgerRepository::new(&self.db).credit(
            owner_id,
            amount,
            TransactionKind::Purchase,
            Some(source),
            external_ref,
            "credit purchase",
        )?;
        tracing::info!(owner_id, amount, balance, "credits purchased");
        Ok(balance)
    }

    pub fn history(
        &self,
        owner_id: u64,
        limit: usize,
    ) -> Result<Vec<crate::storage::CreditTransaction>, JournalError> {
        let limit = limit.clamp(1, 100);
        Ok(LedgerRepository::new(&self.db).history(owner_id, limit)?)
    }

    // =========================================================================
    // Offline maintenance
    // =========================================================================

    /// Re-encrypt every entry under a new service secret.
    ///
    /// Offline maintenance only: run against a quiesced database, then
    /// restart the service with the new secret. Per-entry failures are
    /// logged and counted without aborting the sweep.
    pub fn rekey_entries(&self, new_engine: &EncryptionEngine) -> Result<RekeyReport, JournalError> {
        let users = UserRepository::new(&self.db);
        let journal = JournalRepository::new(&self.db);
        let mut report = RekeyReport::default();

        for user in users.all()? {
            let Some(salt) = user.key_salt else {
                continue;
            };
            report.users += 1;

            for entry in journal.fetch_all(user.user_id)? {
                let rekeyed = self
                    .engine
                    .decrypt(&entry.content, &salt)
                    .and_then(|content| {
                        let content_env = new_engine.encrypt(&content, &salt)?;
                        let tags_env = entry
                            .tags
                            .as_ref()
                            .map(|envelope| {
                                self.engine
                                    .decrypt(envelope, &salt)
                                    .and_then(|tags| new_engine.encrypt(&tags, &salt))
                            })
                            .transpose()?;
                        Ok((content_env, tags_env))
                    });

                match rekeyed {
                    Ok((content_env, tags_env)) => {
                        let patch = EntryPatch {
                            title: None,
                            content: Some(content_env),
                            tags: tags_env.map(Some),
                        };
                        journal.update(entry.entry_id, user.user_id, patch)?;
                        report.reencrypted += 1;
                    }
                    Err(_) => {
                        report.failed += 1;
                        tracing::warn!(
                            user_id = user.user_id,
                            entry_id = entry.entry_id,
                            "entry failed authentication under the old secret; skipped"
                        );
                    }
                }
            }
        }

        tracing::info!(
            users = report.users,
            reencrypted = report.reencrypted,
            failed = report.failed,
            "rekey sweep finished"
        );
        Ok(report)
    }
}

// =============================================================================
// Validation
// =============================================================================

/// NFC-normalize, strip zero-width characters, and trim.
fn normalize(input: &str) -> String {
    input
        .nfc()
        .filter(|c| !matches!(*c, '\u{200B}' | '\u{FEFF}'))
        .collect::<String>()
        .trim()
        .to_string()
}

fn default_title() -> String {
    Utc::now().format("%Y_%m_%d").to_string()
}

fn validate_title(raw: &str) -> Result<String, JournalError> {
    let title = normalize(raw);
    if title.chars().count() > TITLE_MAX_LEN {
        return Err(JournalError::Validation(format!(
            "title exceeds {TITLE_MAX_LEN} characters"
        )));
    }
    Ok(title)
}

fn validate_content(raw: &str) -> Result<String, JournalError> {
    let content = normalize(raw);
    if content.is_empty() {
        return Err(JournalError::Validation("content required".into()));
    }
    if content.chars().count() > CONTENT_MAX_LEN {
        return Err(JournalError::Validation(format!(
            "content exceeds {CONTENT_MAX_LEN} characters"
        )));
    }
    Ok(content)
}

fn validate_tags(raw: Vec<String>) -> Result<Vec<String>, JournalError> {
    if raw.len() > MAX_TAGS {
        return Err(JournalError::Validation(format!(
            "at most {MAX_TAGS} tags allowed"
        )));
    }
    let mut tags = Vec::with_capacity(raw.len());
    for tag in raw {
        let tag = normalize(&tag);
        if tag.is_empty() {
            continue;
        }
        if tag.chars().count() > TAG_MAX_LEN {
            return Err(JournalError::Validation(format!(
                "tag exceeds {TAG_MAX_LEN} characters"
            )));
        }
        tags.push(tag);
    }
    Ok(tags)
}

fn validate_new_entry(
    entry: NewEntry,
) -> Result<(String, String, Vec<String>), JournalError> {
    let content = validate_content(&entry.content)?;
    let tags = validate_tags(entry.tags)?;
    let title = match entry.title.as_deref() {
        None | Some("") => default_title(),
        Some(raw) => {
            let title = validate_title(raw)?;
            if title.is_empty() {
                default_title()
            } else {
                title
            }
        }
    };
    Ok((title, content, tags))
}

#[allow(clippy::type_complexity)]
fn validate_entry_update(
    update: EntryUpdate,
) -> Result<(Option<String>, Option<String>, Option<Vec<String>>), JournalError> {
    if update.title.is_none() && update.content.is_none() && update.tags.is_none() {
        return Err(JournalError::Validation("nothing to update".into()));
    }
    let title = update
        .title
        .as_deref()
        .map(validate_title)
        .transpose()?
        .filter(|t| !t.is_empty());
    let content = update.content.as_deref().map(validate_content).transpose()?;
    let tags = update.tags.map(validate_tags).transpose()?;
    Ok((title, content, tags))
}

// =============================================================================
// Tests
// =============================================================================
