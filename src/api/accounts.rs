// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Journal Vault

//! Account lifecycle endpoints.
//!
//! Signup provisions the user row, the encryption salt, and the welcome
//! credits together. Deletion cascades to journal entries but keeps the
//! credit log as an audit trail.

use axum::{extract::State, http::StatusCode, Json};

use crate::{auth::Identity, error::ApiError, models::AccountResponse, state::AppState};

/// Create an account with a fresh salt and welcome credits.
#[utoipa::path(
    post,
    path = "/v1/accounts",
    tag = "Accounts",
    responses(
        (status = 201, description = "Account created", body = AccountResponse)
    )
)]
pub async fn create_account(
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<AccountResponse>), ApiError> {
    let user = state.service().create_account()?;
    Ok((StatusCode::CREATED, Json(user.into())))
}

/// The calling user's account summary.
#[utoipa::path(
    get,
    path = "/v1/account",
    tag = "Accounts",
    responses(
        (status = 200, body = AccountResponse),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Unknown user")
    )
)]
pub async fn get_account(
    Identity(owner_id): Identity,
    State(state): State<AppState>,
) -> Result<Json<AccountResponse>, ApiError> {
    let user = state.service().account(owner_id)?;
    Ok(Json(user.into()))
}

/// Delete the calling user's account and all journal entries.
#[utoipa::path(
    delete,
    path = "/v1/account",
    tag = "Accounts",
    responses(
        (status = 204, description = "Account and entries deleted"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Unknown user")
    )
)]
pub async fn delete_account(
    Identity(owner_id): Identity,
    State(state): State<AppState>,
) -> Result<StatusCode, ApiError> {
    state.service().delete_account(owner_id)?;
    Ok(StatusCode::NO_CONTENT)
}
