// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Journal Vault

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    models::{
        AccountResponse, BalanceResponse, CreateEntryRequest, CreateEntryResponse,
        EntryListResponse, EntryResponse, Pagination, SearchResponse, TopUpRequest,
        UpdateEntryRequest,
    },
    state::AppState,
    storage::{CreditTransaction, EntryMetadata, TransactionKind},
};

pub mod accounts;
pub mod credits;
pub mod entries;
pub mod health;

pub fn router(state: AppState) -> Router {
    let v1_routes = Router::new()
        .route("/health", get(health::health))
        .route("/accounts", post(accounts::create_account))
        .route(
            "/account",
            get(accounts::get_account).delete(accounts::delete_account),
        )
        .route("/credits", get(credits::credit_status))
        .route("/credits/history", get(credits::credit_history))
        .route("/credits/topup", post(credits::top_up))
        .route(
            "/journal/entries",
            get(entries::list_entries).post(entries::create_entry),
        )
        .route("/journal/entries/search", get(entries::search_entries))
        .route(
            "/journal/entries/{entry_id}",
            get(entries::get_entry)
                .put(entries::update_entry)
                .delete(entries::delete_entry),
        )
        .with_state(state);

    Router::new()
        .nest("/v1", v1_routes)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        accounts::create_account,
        accounts::get_account,
        accounts::delete_account,
        credits::credit_status,
        credits::credit_history,
        credits::top_up,
        entries::create_entry,
        entries::list_entries,
        entries::search_entries,
        entries::get_entry,
        entries::update_entry,
        entries::delete_entry
    ),
    components(
        schemas(
            health::HealthResponse,
            AccountResponse,
            BalanceResponse,
            CreateEntryRequest,
            CreateEntryResponse,
            CreditTransaction,
            EntryListResponse,
            EntryMetadata,
            EntryResponse,
            Pagination,
            SearchResponse,
            TopUpRequest,
            TransactionKind,
            UpdateEntryRequest
        )
    ),
    tags(
        (name = "Health", description = "Liveness"),
        (name = "Accounts", description = "Account lifecycle"),
        (name = "Credits", description = "Prepaid credit balance and history"),
        (name = "Journal", description = "Encrypted journal entries")
    )
)]
struct ApiDoc;

#[cfg(test)]
pub(crate) mod test_support {
    use crate::crypto::EncryptionEngine;
    use crate::service::JournalService;
    use crate::state::AppState;
    use crate::storage::VaultDatabase;

    /// AppState over a throwaway database, with a fast KDF for tests.
    pub(crate) fn test_state(welcome_credits: i64) -> (AppState, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let db = VaultDatabase::open(&dir.path().join("test.redb")).unwrap();
        let engine = EncryptionEngine::new(b"test-service-secret-0123456789ab".to_vec(), 1_000);
        let service = JournalService::new(db, engine, welcome_credits);
        (AppState::new(service), dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn router_builds_with_all_routes() {
        let (state, _dir) = test_support::test_state(5);
        let app = router(state);
        // Ensure the router can be converted into a service without panicking.
        let _ = app.into_make_service();
    }
}
