// SPDX-License-Identifier: MIT
// Copyright 2026 DateU

//! Request validation tests.
//!
//! Malformed payloads must be rejected before any database access, so these
//! run against the offline mock database: a 500 here would mean validation
//! ran too late.

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use tower::ServiceExt;

mod common;

async fn post_json(uri: &str, body: serde_json::Value) -> StatusCode {
    let (app, state) = common::create_test_app();
    let token = common::test_jwt(&state, "user-1");

    app.oneshot(
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
    )
    .await
    .unwrap()
    .status()
}

#[tokio::test]
async fn test_like_rejects_empty_ids() {
    let status = post_json(
        "/api/likes",
        serde_json::json!({ "round_id": "", "liked_uid": "boy-1" }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let status = post_json(
        "/api/likes",
        serde_json::json!({ "round_id": "2026-W09", "liked_uid": "" }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_payment_rejects_zero_amount() {
    let status = post_json(
        "/api/payments",
        serde_json::json!({ "plan_id": "basic", "amount": 0 }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_claim_rejects_amount_outside_cap() {
    let status = post_json(
        "/api/referrals/claims",
        serde_json::json!({ "amount": 0, "upi_id": "someone@upi" }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let status = post_json(
        "/api/referrals/claims",
        serde_json::json!({ "amount": 51, "upi_id": "someone@upi" }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_claim_rejects_malformed_upi() {
    let status = post_json(
        "/api/referrals/claims",
        serde_json::json!({ "amount": 25, "upi_id": "not-a-upi-handle" }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_redeem_rejects_empty_code() {
    let status = post_json("/api/referrals/redeem", serde_json::json!({ "code": "" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_chat_rejects_empty_message() {
    let status = post_json(
        "/api/chat/2026-W09_b1_g1/messages",
        serde_json::json!({ "text": "" }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
