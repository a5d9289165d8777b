// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Journal Vault

//! Encrypted journal entry endpoints.
//!
//! Creation debits one credit; listing, fetching, updating, and deleting
//! are free. Responses never contain envelopes, only metadata or plaintext
//! decrypted for the owner.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use utoipa::IntoParams;

use crate::{
    auth::Identity,
    error::ApiError,
    models::{
        CreateEntryRequest, CreateEntryResponse, EntryListResponse, EntryResponse, SearchResponse,
        UpdateEntryRequest,
    },
    service::{EntryUpdate, NewEntry},
    state::AppState,
};

#[derive(Debug, Deserialize, IntoParams)]
pub struct ListQuery {
    /// 1-based page number.
    pub page: Option<usize>,
    /// Page size (1-50).
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct SearchQuery {
    /// Substring to match against plaintext titles.
    pub q: String,
    pub limit: Option<usize>,
}

/// Create an encrypted journal entry, debiting one credit.
#[utoipa::path(
    post,
    path = "/v1/journal/entries",
    request_body = CreateEntryRequest,
    tag = "Journal",
    responses(
        (status = 201, description = "Entry persisted and paid for", body = CreateEntryResponse),
        (status = 401, description = "Unauthorized"),
        (status = 402, description = "Insufficient credits; nothing persisted"),
        (status = 422, description = "Invalid input")
    )
)]
pub async fn create_entry(
    Identity(owner_id): Identity,
    State(state): State<AppState>,
    Json(request): Json<CreateEntryRequest>,
) -> Result<(StatusCode, Json<CreateEntryResponse>), ApiError> {
    let receipt = state
        .service()
        .create_entry(
            owner_id,
            NewEntry {
                title: request.title,
                content: request.content,
                tags: request.tags,
            },
        )
        .await?;
    Ok((StatusCode::CREATED, Json(receipt.into())))
}

/// List entry metadata, newest first. Never decrypts anything.
#[utoipa::path(
    get,
    path = "/v1/journal/entries",
    params(ListQuery),
    tag = "Journal",
    responses(
        (status = 200, body = EntryListResponse),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn list_entries(
    Identity(owner_id): Identity,
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<EntryListResponse>, ApiError> {
    let page = state.service().list_entries(
        owner_id,
        query.page.unwrap_or(1),
        query.limit.unwrap_or(20),
    )?;
    Ok(Json(page.into()))
}

/// Search plaintext titles.
#[utoipa::path(
    get,
    path = "/v1/journal/entries/search",
    params(SearchQuery),
    tag = "Journal",
    responses(
        (status = 200, body = SearchResponse),
        (status = 401, description = "Unauthorized"),
        (status = 422, description = "Empty search term")
    )
)]
pub async fn search_entries(
    Identity(owner_id): Identity,
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<SearchResponse>, ApiError> {
    let results =
        state
            .service()
            .search_entries(owner_id, &query.q, query.limit.unwrap_or(20))?;
    Ok(Json(SearchResponse {
        query: query.q,
        results,
    }))
}

/// Fetch and decrypt a single entry.
#[utoipa::path(
    get,
    path = "/v1/journal/entries/{entry_id}",
    params(("entry_id" = u64, Path, description = "Entry id")),
    tag = "Journal",
    responses(
        (status = 200, description = "Decrypted entry", body = EntryResponse),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "No such entry for this owner"),
        (status = 500, description = "Entry could not be decrypted")
    )
)]
pub async fn get_entry(
    Identity(owner_id): Identity,
    State(state): State<AppState>,
    Path(entry_id): Path<u64>,
) -> Result<Json<EntryResponse>, ApiError> {
    let entry = state.service().fetch_entry(owner_id, entry_id).await?;
    Ok(Json(entry.into()))
}

/// Re-encrypt the supplied fields of an entry. Free of charge.
#[utoipa::path(
    put,
    path = "/v1/journal/entries/{entry_id}",
    params(("entry_id" = u64, Path, description = "Entry id")),
    request_body = UpdateEntryRequest,
    tag = "Journal",
    responses(
        (status = 204, description = "Entry updated"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "No such entry for this owner"),
        (status = 422, description = "Invalid input")
    )
)]
pub async fn update_entry(
    Identity(owner_id): Identity,
    State(state): State<AppState>,
    Path(entry_id): Path<u64>,
    Json(request): Json<UpdateEntryRequest>,
) -> Result<StatusCode, ApiError> {
    state
        .service()
        .update_entry(
            owner_id,
            entry_id,
            EntryUpdate {
                title: request.title,
                content: request.content,
                tags: request.tags,
            },
        )
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Delete an entry permanently.
#[utoipa::path(
    delete,
    path = "/v1/journal/entries/{entry_id}",
    params(("entry_id" = u64, Path, description = "Entry id")),
    tag = "Journal",
    responses(
        (status = 204, description = "Entry deleted"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "No such entry for this owner")
    )
)]
pub async fn delete_entry(
    Identity(owner_id): Identity,
    State(state): State<AppState>,
    Path(entry_id): Path<u64>,
) -> Result<StatusCode, ApiError> {
    state.service().delete_entry(owner_id, entry_id)?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_support::test_state;

    fn create_request(content: &str) -> CreateEntryRequest {
        CreateEntryRequest {
            title: Some("Test".into()),
            content: content.into(),
            tags: vec!["alpha".into()],
        }
    }

    #[tokio::test]
    async fn create_then_fetch_round_trips() {
        let (state, _dir) = test_state(5);
        let owner = state.service().create_account().unwrap().user_id;

        let (status, Json(created)) = create_entry(
            Identity(owner),
            State(state.clone()),
            Json(create_request("dear journal")),
        )
        .await
        .expect("creation succeeds");
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created.balance, 4);

        let Json(entry) = get_entry(
            Identity(owner),
            State(state.clone()),
            Path(created.entry_id),
        )
        .await
        .expect("fetch succeeds");
        assert_eq!(entry.content, "dear journal");
        assert_eq!(entry.tags, vec!["alpha".to_string()]);
    }

    #[tokio::test]
    async fn create_without_credits_is_payment_required() {
        let (state, _dir) = test_state(0);
        let owner = state.service().create_account().unwrap().user_id;

        let error = create_entry(
            Identity(owner),
            State(state.clone()),
            Json(create_request("unfunded")),
        )
        .await
        .expect_err("creation must fail");
        assert_eq!(error.status, StatusCode::PAYMENT_REQUIRED);

        let Json(list) = list_entries(
            Identity(owner),
            State(state),
            Query(ListQuery {
                page: None,
                limit: None,
            }),
        )
        .await
        .expect("listing succeeds");
        assert_eq!(list.pagination.total, 0);
    }

    #[tokio::test]
    async fn listing_excludes_other_owners() {
        let (state, _dir) = test_state(5);
        let alice = state.service().create_account().unwrap().user_id;
        let bob = state.service().create_account().unwrap().user_id;

        create_entry(
            Identity(alice),
            State(state.clone()),
            Json(create_request("mine")),
        )
        .await
        .unwrap();

        let Json(list) = list_entries(
            Identity(bob),
            State(state),
            Query(ListQuery {
                page: None,
                limit: None,
            }),
        )
        .await
        .unwrap();
        assert!(list.entries.is_empty());
    }

    #[tokio::test]
    async fn fetching_foreign_entry_is_not_found() {
        let (state, _dir) = test_state(5);
        let alice = state.service().create_account().unwrap().user_id;
        let mallory = state.service().create_account().unwrap().user_id;

        let (_, Json(created)) = create_entry(
            Identity(alice),
            State(state.clone()),
            Json(create_request("private")),
        )
        .await
        .unwrap();

        let error = get_entry(Identity(mallory), State(state), Path(created.entry_id))
            .await
            .expect_err("cross-owner fetch must fail");
        assert_eq!(error.status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn update_and_delete_are_owner_scoped() {
        let (state, _dir) = test_state(5);
        let owner = state.service().create_account().unwrap().user_id;

        let (_, Json(created)) = create_entry(
            Identity(owner),
            State(state.clone()),
            Json(create_request("v1")),
        )
        .await
        .unwrap();

        let status = update_entry(
            Identity(owner),
            State(state.clone()),
            Path(created.entry_id),
            Json(UpdateEntryRequest {
                title: None,
                content: Some("v2".into()),
                tags: None,
            }),
        )
        .await
        .unwrap();
        assert_eq!(status, StatusCode::NO_CONTENT);

        let status = delete_entry(Identity(owner), State(state.clone()), Path(created.entry_id))
            .await
            .unwrap();
        assert_eq!(status, StatusCode::NO_CONTENT);

        let error = get_entry(Identity(owner), State(state), Path(created.entry_id))
            .await
            .expect_err("deleted entry is gone");
        assert_eq!(error.status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn search_finds_titles() {
        let (state, _dir) = test_state(5);
        let owner = state.service().create_account().unwrap().user_id;

        create_entry(
            Identity(owner),
            State(state.clone()),
            Json(CreateEntryRequest {
                title: Some("Evening reflection".into()),
                content: "text".into(),
                tags: Vec::new(),
            }),
        )
        .await
        .unwrap();

        let Json(found) = search_entries(
            Identity(owner),
            State(state),
            Query(SearchQuery {
                q: "evening".into(),
                limit: None,
            }),
        )
        .await
        .unwrap();
        assert_eq!(found.results.len(), 1);
    }
}
