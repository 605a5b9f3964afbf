// SPDX-License-Identifier: MIT
// Copyright 2026 DateU

use axum::http::StatusCode;
use axum::response::IntoResponse;
use dateu_api::error::AppError;

fn status_of(err: AppError) -> StatusCode {
    err.into_response().status()
}

#[test]
fn test_auth_errors_map_to_401() {
    assert_eq!(status_of(AppError::Unauthorized), StatusCode::UNAUTHORIZED);
    assert_eq!(status_of(AppError::InvalidToken), StatusCode::UNAUTHORIZED);
}

#[test]
fn test_client_errors_map_to_4xx() {
    assert_eq!(
        status_of(AppError::Forbidden("nope".to_string())),
        StatusCode::FORBIDDEN
    );
    assert_eq!(
        status_of(AppError::NotFound("missing".to_string())),
        StatusCode::NOT_FOUND
    );
    assert_eq!(
        status_of(AppError::BadRequest("bad".to_string())),
        StatusCode::BAD_REQUEST
    );
    assert_eq!(
        status_of(AppError::Conflict(AppError::QUOTA_EXHAUSTED.to_string())),
        StatusCode::CONFLICT
    );
}

#[test]
fn test_server_errors_map_to_500() {
    assert_eq!(
        status_of(AppError::Database("connection refused".to_string())),
        StatusCode::INTERNAL_SERVER_ERROR
    );
    assert_eq!(
        status_of(AppError::Internal(anyhow::anyhow!("boom"))),
        StatusCode::INTERNAL_SERVER_ERROR
    );
}

#[tokio::test]
async fn test_business_denial_carries_machine_code() {
    let response =
        AppError::Conflict(AppError::PHASE_CLOSED.to_string()).into_response();
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["error"], "conflict");
    assert_eq!(body["details"], "phase_closed");
}

#[tokio::test]
async fn test_database_details_are_hidden() {
    let response = AppError::Database("secret dsn".to_string()).into_response();

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["error"], "database_error");
    assert!(body.get("details").is_none());
}

#[test]
fn test_validation_errors_become_bad_request() {
    use validator::Validate;

    #[derive(Validate)]
    struct Probe {
        #[validate(length(min = 1))]
        value: String,
    }

    let probe = Probe {
        value: String::new(),
    };
    let err: AppError = probe.validate().unwrap_err().into();
    assert_eq!(status_of(err), StatusCode::BAD_REQUEST);
}
