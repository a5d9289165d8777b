// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Journal Vault

//! Journal entry persistence.
//!
//! Rows are keyed by the `(owner_id, entry_id)` composite, so every read and
//! write predicate matches id and owner together: there is no code path
//! that addresses an entry by id alone, and a guessed id under the wrong
//! owner resolves to a different (absent) key.

use chrono::{DateTime, Utc};
use redb::ReadableTable;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::crypto::Envelope;

use super::database::{
    next_id, StorageError, StorageResult, VaultDatabase, ENTRIES, ENTRY_ID_COUNTER, USERS,
};

/// Stored journal entry. Title is plaintext (and searchable); content and
/// tags exist only as envelopes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredEntry {
    pub entry_id: u64,
    pub owner_id: u64,
    pub title: String,
    pub content: Envelope,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Envelope>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Metadata projection for index views; never carries envelopes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct EntryMetadata {
    pub entry_id: u64,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&StoredEntry> for EntryMetadata {
    fn from(entry: &StoredEntry) -> Self {
        Self {
            entry_id: entry.entry_id,
            title: entry.title.clone(),
            created_at: entry.created_at,
            updated_at: entry.updated_at,
        }
    }
}

/// Partial update applied by `update`. `tags: Some(None)` clears the tag
/// envelope; `tags: None` leaves it untouched.
#[derive(Debug, Default)]
pub struct EntryPatch {
    pub title: Option<String>,
    pub content: Option<Envelope>,
    pub tags: Option<Option<Envelope>>,
}

/// Repository for journal entries on the shared vault database.
pub struct JournalRepository<'a> {
    db: &'a VaultDatabase,
}

impl<'a> JournalRepository<'a> {
    pub fn new(db: &'a VaultDatabase) -> Self {
        Self { db }
    }

    /// Persist a new entry and return its id.
    ///
    /// The owner must exist; entries never outlive or predate their user.
    pub fn insert(
        &self,
        owner_id: u64,
        title: String,
        content: Envelope,
        tags: Option<Envelope>,
    ) -> StorageResult<u64> {
        let now = Utc::now();
        let write_txn = self.db.begin_write()?;
        let entry_id = {
            let users = write_txn.open_table(USERS)?;
            if users.get(owner_id)?.is_none() {
                return Err(StorageError::UnknownUser(owner_id));
            }
            drop(users);

            let entry_id = next_id(&write_txn, ENTRY_ID_COUNTER)?;
            let entry = StoredEntry {
                entry_id,
                owner_id,
                title,
                content,
                tags,
                created_at: now,
                updated_at: now,
            };
            let mut entries = write_txn.open_table(ENTRIES)?;
            entries.insert((owner_id, entry_id), serde_json::to_vec(&entry)?.as_slice())?;
            entry_id
        };
        write_txn.commit()?;
        Ok(entry_id)
    }

    /// Apply a patch to an entry. Returns false (and mutates nothing) when
    /// the (id, owner) pair does not exist, including a correct id under
    /// the wrong owner.
    pub fn update(&self, entry_id: u64, owner_id: u64, patch: EntryPatch) -> StorageResult<bool> {
        let write_txn = self.db.begin_write()?;
        let changed = {
            let mut entries = write_txn.open_table(ENTRIES)?;
            let existing: Option<StoredEntry> = match entries.get((owner_id, entry_id))? {
                Some(value) => Some(serde_json::from_slice(value.value())?),
                None => None,
            };

            match existing {
                None => false,
                Some(mut entry) => {
                    if let Some(title) = patch.title {
                        entry.title = title;
                    }
                    if let Some(content) = patch.content {
                        entry.content = content;
                    }
                    if let Some(tags) = patch.tags {
                        entry.tags = tags;
                    }
                    entry.updated_at = Utc::now();
                    entries
                        .insert((owner_id, entry_id), serde_json::to_vec(&entry)?.as_slice())?;
                    true
                }
            }
        };
        if changed {
            write_txn.commit()?;
        } else {
            write_txn.abort()?;
        }
        Ok(changed)
    }

    /// Delete an entry. Returns false when the (id, owner) pair is absent.
    pub fn delete(&self, entry_id: u64, owner_id: u64) -> StorageResult<bool> {
        let write_txn = self.db.begin_write()?;
        let removed = {
            let mut entries = write_txn.open_table(ENTRIES)?;
            let removed = entries.remove((owner_id, entry_id))?.is_some();
            removed
        };
        if removed {
            write_txn.commit()?;
        } else {
            write_txn.abort()?;
        }
        Ok(removed)
    }

    /// Load a full row including envelopes, or None for a mismatched owner.
    pub fn fetch_full(&self, entry_id: u64, owner_id: u64) -> StorageResult<Option<StoredEntry>> {
        let read_txn = self.db.begin_read()?;
        let entries = read_txn.open_table(ENTRIES)?;
        match entries.get((owner_id, entry_id))? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    /// Paginated metadata listing, newest first. Returns the page plus the
    /// user's total entry count.
    pub fn list_metadata(
        &self,
        owner_id: u64,
        page: usize,
        limit: usize,
    ) -> StorageResult<(Vec<EntryMetadata>, u64)> {
        let read_txn = self.db.begin_read()?;
        let entries = read_txn.open_table(ENTRIES)?;

        let mut total = 0u64;
        let mut rows = Vec::new();
        let skip = page.saturating_sub(1) * limit;

        for item in entries.range((owner_id, 0)..=(owner_id, u64::MAX))?.rev() {
            let (_, value) = item?;
            let index = total as usize;
            total += 1;
            if index < skip || rows.len() >= limit {
                continue;
            }
            match serde_json::from_slice::<StoredEntry>(value.value()) {
                Ok(entry) => rows.push(EntryMetadata::from(&entry)),
                Err(e) => {
                    tracing::warn!(owner_id, error = %e, "skipping unreadable journal row");
                }
            }
        }
        Ok((rows, total))
    }

    /// Case-insensitive substring search over plaintext titles, newest first.
    pub fn search_titles(
        &self,
        owner_id: u64,
        query: &str,
        limit: usize,
    ) -> StorageResult<Vec<EntryMetadata>> {
        let needle = query.to_lowercase();
        let read_txn = self.db.begin_read()?;
        let entries = read_txn.open_table(ENTRIES)?;

        let mut rows = Vec::new();
        for item in entries.range((owner_id, 0)..=(owner_id, u64::MAX))?.rev() {
            let (_, value) = item?;
            let entry: StoredEntry = match serde_json::from_slice(value.value()) {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!(owner_id, error = %e, "skipping unreadable journal row");
                    continue;
                }
            };
            if entry.title.to_lowercase().contains(&needle) {
                rows.push(EntryMetadata::from(&entry));
                if rows.len() >= limit {
                    break;
                }
            }
        }
        Ok(rows)
    }

    /// Total number of entries for a user.
    pub fn count(&self, owner_id: u64) -> StorageResult<u64> {
        let read_txn = self.db.begin_read()?;
        let entries = read_txn.open_table(ENTRIES)?;
        let mut count = 0;
        for item in entries.range((owner_id, 0)..=(owner_id, u64::MAX))? {
            item?;
            count += 1;
        }
        Ok(count)
    }

    /// Load every full row for a user (offline rekey sweeps).
    pub fn fetch_all(&self, owner_id: u64) -> StorageResult<Vec<StoredEntry>> {
        let read_txn = self.db.begin_read()?;
        let entries = read_txn.open_table(ENTRIES)?;
        let mut rows = Vec::new();
        for item in entries.range((owner_id, 0)..=(owner_id, u64::MAX))? {
            let (_, value) = item?;
            rows.push(serde_json::from_slice(value.value())?);
        }
        Ok(rows)
    }
}
