// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Community Feed API Server
//!
//! Serves a merged, cached feed of community members' public GitHub
//! activity and keeps it fresh in the background.

use community_feed::{
    config::{Config, StoreBackend},
    db::{CacheStore, FirestoreDb, MemberDirectory, MemoryStore},
    services::CredentialPool,
    AppState,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging for GCP
    init_logging();

    // Load configuration from environment
    let config = Config::from_env()?;
    tracing::info!(port = config.port, "Starting Community Feed API");

    // One pool for the whole process; zero tokens is fatal here
    let pool = Arc::new(CredentialPool::new(config.github_tokens.clone())?);
    tracing::info!(credentials = pool.len(), "Credential pool ready");

    let (directory, store): (Arc<dyn MemberDirectory>, Arc<dyn CacheStore>) =
        match config.store_backend {
            StoreBackend::Firestore => {
                let db = Arc::new(FirestoreDb::new(&config.gcp_project_id).await?);
                tracing::info!(project = %config.gcp_project_id, "Using Firestore store");
                (db.clone() as Arc<dyn MemberDirectory>, db as Arc<dyn CacheStore>)
            }
            StoreBackend::Memory => {
                tracing::warn!("Using in-memory store; the member directory starts empty");
                let store = Arc::new(MemoryStore::new());
                (
                    store.clone() as Arc<dyn MemberDirectory>,
                    store as Arc<dyn CacheStore>,
                )
            }
        };

    let state = Arc::new(AppState::build(config.clone(), pool, directory, store));

    let scheduler = state.scheduler.clone();
    scheduler.start();

    // Build router
    let app = community_feed::routes::create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    scheduler.stop().await;
    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

/// Initialize structured JSON logging (GCP-compliant).
fn init_logging() {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("community_feed=debug,info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(format)
        .init();
}
