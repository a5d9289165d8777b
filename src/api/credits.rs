// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Journal Vault

//! Prepaid credit endpoints.
//!
//! Purchases are completed by the payment collaborator out of band; the
//! top-up endpoint only records the resulting grant in the ledger.

use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;
use utoipa::IntoParams;

use crate::{
    auth::Identity,
    error::ApiError,
    models::{BalanceResponse, TopUpRequest},
    service::ENTRY_COST,
    state::AppState,
    storage::CreditTransaction,
};

#[derive(Debug, Deserialize, IntoParams)]
pub struct HistoryQuery {
    /// Maximum number of rows (1-100).
    pub limit: Option<usize>,
}

/// Current balance plus whether journal writes are locked.
#[utoipa::path(
    get,
    path = "/v1/credits",
    tag = "Credits",
    responses(
        (status = 200, body = BalanceResponse),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Unknown user")
    )
)]
pub async fn credit_status(
    Identity(owner_id): Identity,
    State(state): State<AppState>,
) -> Result<Json<BalanceResponse>, ApiError> {
    let balance = state.service().balance(owner_id)?;
    Ok(Json(BalanceResponse {
        balance,
        locked: balance < ENTRY_COST,
    }))
}

/// Transaction history, newest first.
#[utoipa::path(
    get,
    path = "/v1/credits/history",
    params(HistoryQuery),
    tag = "Credits",
    responses(
        (status = 200, body = [CreditTransaction]),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn credit_history(
    Identity(owner_id): Identity,
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<CreditTransaction>>, ApiError> {
    let rows = state
        .service()
        .history(owner_id, query.limit.unwrap_or(50))?;
    Ok(Json(rows))
}

/// Record a completed credit purchase.
#[utoipa::path(
    post,
    path = "/v1/credits/topup",
    request_body = TopUpRequest,
    tag = "Credits",
    responses(
        (status = 200, description = "Credits granted", body = BalanceResponse),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Unknown user"),
        (status = 422, description = "Non-positive amount")
    )
)]
pub async fn top_up(
    Identity(owner_id): Identity,
    State(state): State<AppState>,
    Json(request): Json<TopUpRequest>,
) -> Result<Json<BalanceResponse>, ApiError> {
    let balance = state.service().top_up(
        owner_id,
        request.amount,
        request.source,
        request.external_ref,
    )?;
    Ok(Json(BalanceResponse {
        balance,
        locked: balance < ENTRY_COST,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_support::test_state;
    use axum::http::StatusCode;

    #[tokio::test]
    async fn status_reports_balance_and_lock() {
        let (state, _dir) = test_state(0);
        let owner = state.service().create_account().unwrap().user_id;

        let Json(status) = credit_status(Identity(owner), State(state))
            .await
            .expect("status succeeds");
        assert_eq!(status.balance, 0);
        assert!(status.locked);
    }

    #[tokio::test]
    async fn top_up_unlocks_and_shows_in_history() {
        let (state, _dir) = test_state(0);
        let owner = state.service().create_account().unwrap().user_id;

        let Json(balance) = top_up(
            Identity(owner),
            State(state.clone()),
            Json(TopUpRequest {
                amount: 20,
                source: "stripe".into(),
                external_ref: Some("cs_456".into()),
            }),
        )
        .await
        .expect("top-up succeeds");
        assert_eq!(balance.balance, 20);
        assert!(!balance.locked);

        let Json(history) = credit_history(
            Identity(owner),
            State(state),
            Query(HistoryQuery { limit: None }),
        )
        .await
        .expect("history succeeds");
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].amount, 20);
        assert_eq!(history[0].external_ref.as_deref(), Some("cs_456"));
    }

    #[tokio::test]
    async fn non_positive_top_up_is_rejected() {
        let (state, _dir) = test_state(0);
        let owner = state.service().create_account().unwrap().user_id;

        let error = top_up(
            Identity(owner),
            State(state),
            Json(TopUpRequest {
                amount: 0,
                source: "stripe".into(),
                external_ref: None,
            }),
        )
        .await
        .expect_err("zero amount must fail");
        assert_eq!(error.status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn unknown_user_is_not_found() {
        let (state, _dir) = test_state(0);
        let error = credit_status(Identity(4096), State(state))
            .await
            .expect_err("unknown user must fail");
        assert_eq!(error.status, StatusCode::NOT_FOUND);
    }
}
