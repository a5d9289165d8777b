// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Journal Vault

use std::net::SocketAddr;

use tracing_subscriber::EnvFilter;

use journal_vault::{
    api::router,
    config::Config,
    crypto::EncryptionEngine,
    service::JournalService,
    state::AppState,
    storage::VaultDatabase,
};

#[tokio::main]
async fn main() {
    init_tracing();

    // Hard precondition: no service secret, no process.
    let config = Config::from_env().unwrap_or_else(|e| {
        eprintln!("configuration error: {e}");
        std::process::exit(1);
    });

    let db = VaultDatabase::open(&config.database_path()).unwrap_or_else(|e| {
        eprintln!("failed to open vault database: {e}");
        std::process::exit(1);
    });

    let engine = EncryptionEngine::new(config.secret.as_bytes().to_vec(), config.kdf_iterations);
    let service = JournalService::new(db, engine, config.welcome_credits);
    let state = AppState::new(service);
    let app = router(state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .expect("Failed to parse bind address");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind listener");

    tracing::info!(%addr, "journal-vault listening (docs at /docs)");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server failed");
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug"));

    let format = std::env::var("LOG_FORMAT").unwrap_or_default();
    if format.eq_ignore_ascii_case("json") {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install SIGINT handler");
    tracing::info!("shutdown signal received");
}
