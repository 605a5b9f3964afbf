// SPDX-License-Identifier: MIT
// Copyright 2026 DateU

use dateu_api::config::Config;
use dateu_api::db::FirestoreDb;
use dateu_api::routes::create_router;
use dateu_api::services::PushService;
use dateu_api::AppState;
use std::sync::Arc;

/// Check if emulator is available via environment variable.
#[allow(dead_code)]
pub fn emulator_available() -> bool {
    std::env::var("FIRESTORE_EMULATOR_HOST").is_ok()
}

/// Skip test with message if emulator not available.
#[macro_export]
macro_rules! require_emulator {
    () => {
        if !crate::common::emulator_available() {
            eprintln!("⚠️  Skipping: FIRESTORE_EMULATOR_HOST not set");
            return;
        }
    };
}

/// Create a test database connection.
#[allow(dead_code)]
pub async fn test_db() -> FirestoreDb {
    FirestoreDb::new("test-project")
        .await
        .expect("Failed to connect to Firestore emulator")
}

/// Create a mock database connection (offline).
#[allow(dead_code)]
pub fn test_db_offline() -> FirestoreDb {
    FirestoreDb::new_mock()
}

/// Create a test app with offline mock dependencies.
/// Returns the router and the shared state.
#[allow(dead_code)]
pub fn create_test_app() -> (axum::Router, Arc<AppState>) {
    let config = Config::test_default();
    let db = test_db_offline();
    let push = PushService::new_mock(db.clone());

    let state = Arc::new(AppState::new(config, db, push));
    (create_router(state.clone()), state)
}

/// Create a test app over a real (emulator) database connection.
#[allow(dead_code)]
pub async fn create_emulator_app() -> (axum::Router, Arc<AppState>) {
    let config = Config::test_default();
    let db = test_db().await;
    let push = PushService::new_mock(db.clone());

    let state = Arc::new(AppState::new(config, db, push));
    (create_router(state.clone()), state)
}

/// Mint a JWT accepted by the test app's auth middleware.
#[allow(dead_code)]
pub fn test_jwt(state: &AppState, uid: &str) -> String {
    dateu_api::middleware::auth::create_jwt(uid, &state.config.jwt_signing_key)
        .expect("Failed to mint test JWT")
}
