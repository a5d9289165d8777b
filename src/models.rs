// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Journal Vault

//! Request and response bodies for the HTTP surface.
//!
//! Envelopes never appear here: responses carry either metadata or decrypted
//! plaintext addressed to the entry's owner.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::service::{DecryptedEntry, EntryPage, EntryReceipt};
use crate::storage::{EntryMetadata, UserRecord};

// =============================================================================
// Journal entries
// =============================================================================

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateEntryRequest {
    /// Plaintext title; defaults to the current date when omitted.
    pub title: Option<String>,
    /// Entry body; encrypted before it touches storage.
    pub content: String,
    /// Optional tag list; encrypted as a whole.
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CreateEntryResponse {
    pub entry_id: u64,
    pub title: String,
    /// Credit balance after the debit.
    pub balance: i64,
}

impl From<EntryReceipt> for CreateEntryResponse {
    fn from(receipt: EntryReceipt) -> Self {
        Self {
            entry_id: receipt.entry_id,
            title: receipt.title,
            balance: receipt.new_balance,
        }
    }
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct UpdateEntryRequest {
    pub title: Option<String>,
    pub content: Option<String>,
    /// `[]` clears the tag list; omitting the field leaves it unchanged.
    pub tags: Option<Vec<String>>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct EntryResponse {
    pub entry_id: u64,
    pub title: String,
    pub content: String,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<DecryptedEntry> for EntryResponse {
    fn from(entry: DecryptedEntry) -> Self {
        Self {
            entry_id: entry.entry_id,
            title: entry.title,
            content: entry.content,
            tags: entry.tags,
            created_at: entry.created_at,
            updated_at: entry.updated_at,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct Pagination {
    pub page: usize,
    pub limit: usize,
    pub total: u64,
    pub total_pages: u64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct EntryListResponse {
    pub entries: Vec<EntryMetadata>,
    pub pagination: Pagination,
}

impl From<EntryPage> for EntryListResponse {
    fn from(page: EntryPage) -> Self {
        let total_pages = page.total.div_ceil(page.limit as u64);
        Self {
            entries: page.entries,
            pagination: Pagination {
                page: page.page,
                limit: page.limit,
                total: page.total,
                total_pages,
            },
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SearchResponse {
    pub query: String,
    pub results: Vec<EntryMetadata>,
}

// =============================================================================
// Accounts & credits
// =============================================================================

#[derive(Debug, Serialize, ToSchema)]
pub struct AccountResponse {
    pub user_id: u64,
    pub balance: i64,
    /// True when the balance no longer covers a journal write.
    pub locked: bool,
    pub created_at: DateTime<Utc>,
}

impl From<UserRecord> for AccountResponse {
    fn from(user: UserRecord) -> Self {
        Self {
            user_id: user.user_id,
            locked: user.balance < crate::service::ENTRY_COST,
            balance: user.balance,
            created_at: user.created_at,
        }
    }
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct TopUpRequest {
    /// Number of credits granted; must be positive.
    pub amount: i64,
    /// Payment collaborator that completed the purchase (e.g. "stripe").
    pub source: String,
    /// Collaborator-side correlation id.
    pub external_ref: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct BalanceResponse {
    pub balance: i64,
    pub locked: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pagination_rounds_total_pages_up() {
        let response = EntryListResponse::from(EntryPage {
            entries: Vec::new(),
            page: 1,
            limit: 20,
            total: 41,
        });
        assert_eq!(response.pagination.total_pages, 3);
    }

    #[test]
    fn account_is_locked_below_entry_cost() {
        let now = Utc::now();
        let user = UserRecord {
            user_id: 1,
            balance: 0,
            key_salt: None,
            created_at: now,
            updated_at: now,
        };
        let response = AccountResponse::from(user);
        assert!(response.locked);
    }
}
