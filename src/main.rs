// SPDX-License-Identifier: MIT
// Copyright 2026 DateU

//! DateU API Server
//!
//! Serves the matchmaking lifecycle: rounds, curated assignments, likes,
//! quota-charged match confirmation, payment review, and referrals.

use dateu_api::{config::Config, db::FirestoreDb, services::PushService, AppState};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging for GCP
    init_logging();

    // Load configuration from environment
    let config = Config::from_env().expect("Failed to load configuration");
    tracing::info!(port = config.port, "Starting DateU API");

    // Initialize Firestore database
    let db = FirestoreDb::new(&config.gcp_project_id)
        .await
        .expect("Failed to connect to Firestore");

    // Initialize push delivery
    let push = PushService::new(&config.gcp_project_id, config.fcm_enabled, db.clone());
    tracing::info!(enabled = config.fcm_enabled, "Push service initialized");

    // Build shared state and router
    let state = Arc::new(AppState::new(config.clone(), db, push));
    let app = dateu_api::routes::create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Initialize structured JSON logging (GCP-compliant).
fn init_logging() {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("dateu_api=debug".parse().unwrap())
                .add_directive("info".parse().unwrap()),
        )
        .with(format)
        .init();
}
