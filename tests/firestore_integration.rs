// SPDX-License-Identifier: MIT
// Copyright 2026 DateU

//! Firestore integration tests.
//!
//! These tests require the Firestore emulator to be running.
//! Run with: ./scripts/test-with-emulator.sh
//!
//! The emulator provides a clean state for each test run; each test still
//! namespaces its documents with a unique suffix so runs never collide.

use chrono::{Duration, Utc};
use dateu_api::error::AppError;
use dateu_api::models::{
    Gender, PhaseWindow, Plan, ReferralClaim, ClaimStatus, RoundPhases, User,
};
use dateu_api::services::matching::ConfirmOrigin;

mod common;
use common::create_emulator_app;

/// Unique suffix for test isolation.
fn unique() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    format!(
        "{}",
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos()
    )
}

fn test_user(uid: &str, gender: Gender) -> User {
    let mut user = User::new(uid, Utc::now());
    user.gender = Some(gender);
    user.display_name = Some("Test User".to_string());
    user.is_profile_complete = true;
    user
}

fn open_window() -> PhaseWindow {
    let now = Utc::now();
    PhaseWindow {
        starts_at: now - Duration::hours(1),
        ends_at: now + Duration::hours(1),
    }
}

fn both_phases_open() -> RoundPhases {
    RoundPhases {
        boys: Some(open_window()),
        girls: Some(open_window()),
    }
}

fn basic_plan(plan_id: &str, match_quota: u32) -> Plan {
    Plan {
        plan_id: plan_id.to_string(),
        name: "Basic".to_string(),
        price: 99,
        match_quota: Some(match_quota),
        quota: None,
        rounds_allowed: Some(1),
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// PAYMENT PROVISIONING
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_payment_approval_provisions_quota() {
    require_emulator!();

    let (_, state) = create_emulator_app().await;
    let suffix = unique();
    let uid = format!("boy-{}", suffix);
    let plan_id = format!("plan-{}", suffix);

    state.db.upsert_user(&test_user(&uid, Gender::Male)).await.unwrap();
    state.db.upsert_plan(&basic_plan(&plan_id, 2)).await.unwrap();

    let payment = state
        .payments
        .create_payment(&uid, &plan_id, 99, None)
        .await
        .unwrap();

    let (approved, sub) = state
        .payments
        .approve_payment(&payment.payment_id, "admin-1")
        .await
        .unwrap();
    assert_eq!(approved.reviewed_by.as_deref(), Some("admin-1"));
    assert_eq!(sub.remaining_matches, 2);
    assert_eq!(sub.match_quota, 2);

    // A second approved payment tops up the existing subscription.
    let payment2 = state
        .payments
        .create_payment(&uid, &plan_id, 99, None)
        .await
        .unwrap();
    let (_, sub2) = state
        .payments
        .approve_payment(&payment2.payment_id, "admin-1")
        .await
        .unwrap();
    assert_eq!(sub2.subscription_id, sub.subscription_id);
    assert_eq!(sub2.remaining_matches, 4);
}

#[tokio::test]
async fn test_payment_approval_is_all_or_nothing() {
    require_emulator!();

    let (_, state) = create_emulator_app().await;
    let suffix = unique();
    let uid = format!("boy-{}", suffix);
    let plan_id = format!("plan-{}", suffix);

    state.db.upsert_user(&test_user(&uid, Gender::Male)).await.unwrap();
    state.db.upsert_plan(&basic_plan(&plan_id, 2)).await.unwrap();

    let payment = state
        .payments
        .create_payment(&uid, &plan_id, 99, None)
        .await
        .unwrap();
    state
        .payments
        .approve_payment(&payment.payment_id, "admin-1")
        .await
        .unwrap();

    // Second approval of the same payment must be refused and leave the
    // subscription untouched.
    let err = state
        .payments
        .approve_payment(&payment.payment_id, "admin-2")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(ref code) if code == AppError::PAYMENT_ALREADY_REVIEWED));

    let subs = state.db.subscriptions_for_user(&uid).await.unwrap();
    assert_eq!(subs.len(), 1);
    assert_eq!(subs[0].remaining_matches, 2);
}

#[tokio::test]
async fn test_quota_fallback_reaches_payment_fields() {
    require_emulator!();

    let (_, state) = create_emulator_app().await;
    let suffix = unique();
    let uid = format!("boy-{}", suffix);
    let plan_id = format!("plan-{}", suffix);

    state.db.upsert_user(&test_user(&uid, Gender::Male)).await.unwrap();

    // Plan with no quota at all; the payment carries a legacy quota stamp.
    let mut plan = basic_plan(&plan_id, 0);
    plan.match_quota = None;
    state.db.upsert_plan(&plan).await.unwrap();

    let mut payment = state
        .payments
        .create_payment(&uid, &plan_id, 99, None)
        .await
        .unwrap();
    payment.quota = Some(3);
    state.db.upsert_payment(&payment).await.unwrap();

    let (_, sub) = state
        .payments
        .approve_payment(&payment.payment_id, "admin-1")
        .await
        .unwrap();
    assert_eq!(sub.remaining_matches, 3);
}

#[tokio::test]
async fn test_quota_all_absent_fails_before_any_write() {
    require_emulator!();

    let (_, state) = create_emulator_app().await;
    let suffix = unique();
    let uid = format!("boy-{}", suffix);
    let plan_id = format!("plan-{}", suffix);

    state.db.upsert_user(&test_user(&uid, Gender::Male)).await.unwrap();
    let mut plan = basic_plan(&plan_id, 0);
    plan.match_quota = None;
    state.db.upsert_plan(&plan).await.unwrap();

    let payment = state
        .payments
        .create_payment(&uid, &plan_id, 99, None)
        .await
        .unwrap();

    let err = state
        .payments
        .approve_payment(&payment.payment_id, "admin-1")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));

    // Nothing was written: the payment is still pending and no subscription
    // exists.
    let after = state.db.get_payment(&payment.payment_id).await.unwrap().unwrap();
    assert_eq!(after.status.as_str(), "pending");
    assert!(state.db.subscriptions_for_user(&uid).await.unwrap().is_empty());
}

// ═══════════════════════════════════════════════════════════════════════════
// ROUND LIFECYCLE
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_active_round_pointer_swaps_and_clears() {
    require_emulator!();

    let (_, state) = create_emulator_app().await;
    let suffix = unique();
    let r1 = format!("round-a-{}", suffix);
    let r2 = format!("round-b-{}", suffix);

    state.rounds.create_round(&r1).await.unwrap();
    state.rounds.create_round(&r2).await.unwrap();

    state.rounds.set_active_round(Some(&r1)).await.unwrap();
    let active = state.rounds.get_active_round().await.unwrap().unwrap();
    assert_eq!(active.round_id, r1);

    // Activating the second round moves the single pointer: there is no
    // per-round flag that could leave both active.
    state.rounds.set_active_round(Some(&r2)).await.unwrap();
    let active = state.rounds.get_active_round().await.unwrap().unwrap();
    assert_eq!(active.round_id, r2);

    state.rounds.set_active_round(None).await.unwrap();
    assert!(state.rounds.get_active_round().await.unwrap().is_none());
}

#[tokio::test]
async fn test_entitlement_reflects_subscription_and_membership() {
    require_emulator!();

    let (_, state) = create_emulator_app().await;
    let suffix = unique();
    let uid = format!("boy-{}", suffix);
    let plan_id = format!("plan-{}", suffix);
    let round_id = format!("round-{}", suffix);

    state.db.upsert_user(&test_user(&uid, Gender::Male)).await.unwrap();

    // No subscription, no round.
    let before = state.entitlement.male_entitlement(&uid).await.unwrap();
    assert!(!before.has_active_subscription);
    assert!(!before.in_active_round);
    assert_eq!(before.remaining_matches, 0);

    // Approve a payment with the round active: quota and membership arrive
    // together.
    state.db.upsert_plan(&basic_plan(&plan_id, 2)).await.unwrap();
    state.rounds.create_round(&round_id).await.unwrap();
    state.rounds.set_active_round(Some(&round_id)).await.unwrap();

    let payment = state
        .payments
        .create_payment(&uid, &plan_id, 99, None)
        .await
        .unwrap();
    state
        .payments
        .approve_payment(&payment.payment_id, "admin-1")
        .await
        .unwrap();

    let after = state.entitlement.male_entitlement(&uid).await.unwrap();
    assert!(after.has_active_subscription);
    assert!(after.in_active_round);
    assert_eq!(after.remaining_matches, 2);
}

// ═══════════════════════════════════════════════════════════════════════════
// LIKE / MATCH LEDGER
// ═══════════════════════════════════════════════════════════════════════════

/// Provision a boy with quota, activate a round with open phases, and assign
/// him to the girl. Returns (round_id, boy_uid, girl_uid).
async fn matchmaking_fixture(
    state: &dateu_api::AppState,
    suffix: &str,
    match_quota: u32,
) -> (String, String, String) {
    let boy = format!("boy-{}", suffix);
    let girl = format!("girl-{}", suffix);
    let plan_id = format!("plan-{}", suffix);
    let round_id = format!("round-{}", suffix);

    state.db.upsert_user(&test_user(&boy, Gender::Male)).await.unwrap();
    state.db.upsert_user(&test_user(&girl, Gender::Female)).await.unwrap();
    state.db.upsert_plan(&basic_plan(&plan_id, match_quota)).await.unwrap();

    state.rounds.create_round(&round_id).await.unwrap();
    state
        .rounds
        .set_round_phases(&round_id, both_phases_open())
        .await
        .unwrap();
    state.rounds.set_active_round(Some(&round_id)).await.unwrap();

    let payment = state
        .payments
        .create_payment(&boy, &plan_id, 99, None)
        .await
        .unwrap();
    state
        .payments
        .approve_payment(&payment.payment_id, "admin-1")
        .await
        .unwrap();

    state
        .rounds
        .set_assignments(&round_id, &girl, vec![boy.clone()])
        .await
        .unwrap();

    (round_id, boy, girl)
}

#[tokio::test]
async fn test_like_is_idempotent() {
    require_emulator!();

    let (_, state) = create_emulator_app().await;
    let (round_id, boy, girl) = matchmaking_fixture(&state, &unique(), 2).await;

    let first = state.matching.like(&round_id, &girl, &boy).await.unwrap();
    assert!(first.created);

    let second = state.matching.like(&round_id, &girl, &boy).await.unwrap();
    assert!(!second.created);

    // Exactly one document either way.
    let like = state.db.get_like(&round_id, &girl, &boy).await.unwrap();
    assert!(like.is_some());
    let incoming = state.db.likes_for_boy(&round_id, &boy).await.unwrap();
    assert_eq!(incoming.len(), 1);
}

#[tokio::test]
async fn test_basic_plan_end_to_end() {
    require_emulator!();

    let (_, state) = create_emulator_app().await;
    let (round_id, boy, girl) = matchmaking_fixture(&state, &unique(), 2).await;

    let entitlement = state.entitlement.male_entitlement(&boy).await.unwrap();
    assert_eq!(entitlement.remaining_matches, 2);
    assert!(entitlement.in_active_round);

    state.matching.like(&round_id, &girl, &boy).await.unwrap();

    let (confirmed, newly_created) = state
        .matching
        .confirm_match(&round_id, &boy, &girl, ConfirmOrigin::Boy)
        .await
        .unwrap();
    assert!(newly_created);
    assert_eq!(confirmed.boy_uid, boy);
    assert_eq!(confirmed.girl_uid, girl);

    let match_id = format!("{}_{}_{}", round_id, boy, girl);
    let stored = state.db.get_match_by_doc_id(&match_id).await.unwrap();
    assert!(stored.is_some(), "Match keyed by composite ID");

    let entitlement = state.entitlement.male_entitlement(&boy).await.unwrap();
    assert_eq!(entitlement.remaining_matches, 1);

    // Re-confirming returns the same match and charges nothing.
    let (again, newly_created) = state
        .matching
        .confirm_match(&round_id, &boy, &girl, ConfirmOrigin::Boy)
        .await
        .unwrap();
    assert!(!newly_created);
    assert_eq!(again.created_at, confirmed.created_at);

    let entitlement = state.entitlement.male_entitlement(&boy).await.unwrap();
    assert_eq!(entitlement.remaining_matches, 1);
}

#[tokio::test]
async fn test_confirm_exhausts_quota() {
    require_emulator!();

    let (_, state) = create_emulator_app().await;
    let suffix = unique();
    let (round_id, boy, girl) = matchmaking_fixture(&state, &suffix, 1).await;

    state.matching.like(&round_id, &girl, &boy).await.unwrap();
    state
        .matching
        .confirm_match(&round_id, &boy, &girl, ConfirmOrigin::Boy)
        .await
        .unwrap();

    // A second girl likes the now-quota-less boy.
    let girl2 = format!("girl2-{}", suffix);
    state.db.upsert_user(&test_user(&girl2, Gender::Female)).await.unwrap();
    state
        .rounds
        .set_assignments(&round_id, &girl2, vec![boy.clone()])
        .await
        .unwrap();
    state.matching.like(&round_id, &girl2, &boy).await.unwrap();

    let err = state
        .matching
        .confirm_match(&round_id, &boy, &girl2, ConfirmOrigin::Boy)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(ref code) if code == AppError::QUOTA_EXHAUSTED));
}

#[tokio::test]
async fn test_racing_confirms_spend_quota_once() {
    require_emulator!();

    let (_, state) = create_emulator_app().await;
    let suffix = unique();
    let (round_id, boy, girl_a) = matchmaking_fixture(&state, &suffix, 1).await;

    let girl_b = format!("girlb-{}", suffix);
    state.db.upsert_user(&test_user(&girl_b, Gender::Female)).await.unwrap();
    state
        .rounds
        .set_assignments(&round_id, &girl_b, vec![boy.clone()])
        .await
        .unwrap();
    state.matching.like(&round_id, &girl_a, &boy).await.unwrap();
    state.matching.like(&round_id, &girl_b, &boy).await.unwrap();

    // Both confirms race over a quota of one. The transactions read the
    // subscription inside their read set, so at most one commit can land.
    let (first, second) = tokio::join!(
        state
            .matching
            .confirm_match(&round_id, &boy, &girl_a, ConfirmOrigin::Boy),
        state
            .matching
            .confirm_match(&round_id, &boy, &girl_b, ConfirmOrigin::Boy),
    );

    let confirmed = [&first, &second].iter().filter(|r| r.is_ok()).count();
    assert!(confirmed <= 1, "quota of one allowed {} matches", confirmed);

    let matches = state.db.matches_for_boy(&boy).await.unwrap();
    assert_eq!(matches.len(), confirmed);

    let entitlement = state.entitlement.male_entitlement(&boy).await.unwrap();
    assert_eq!(entitlement.remaining_matches, 1 - confirmed as u32);
}

// ═══════════════════════════════════════════════════════════════════════════
// REFERRAL CLAIMS
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_claim_credits_once_and_respects_cap() {
    require_emulator!();

    let (_, state) = create_emulator_app().await;
    let suffix = unique();
    let uid = format!("user-{}", suffix);

    state.db.upsert_user(&test_user(&uid, Gender::Male)).await.unwrap();

    let claim = state.referrals.submit_claim(&uid, 30, "someone@upi").await.unwrap();

    let (approved, total) = state
        .referrals
        .approve_claim(&claim.claim_id, "admin-1")
        .await
        .unwrap();
    assert_eq!(approved.status, ClaimStatus::Approved);
    assert_eq!(total, 30);

    // Double approval must not double-credit.
    let err = state
        .referrals
        .approve_claim(&claim.claim_id, "admin-1")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(ref code) if code == AppError::CLAIM_ALREADY_REVIEWED));

    let user = state.db.get_user(&uid).await.unwrap().unwrap();
    assert_eq!(user.referral_earnings_paid, 30);

    // A claim that would cross the lifetime cap is refused at submission,
    // and a stale pending one is refused at approval.
    let err = state.referrals.submit_claim(&uid, 30, "someone@upi").await.unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));

    let stale = ReferralClaim {
        claim_id: format!("{}_stale", uid),
        uid: uid.clone(),
        amount: 30,
        upi_id: "someone@upi".to_string(),
        status: ClaimStatus::Pending,
        created_at: Utc::now(),
        reviewed_by: None,
        reviewed_at: None,
    };
    state.db.upsert_claim(&stale).await.unwrap();

    let err = state
        .referrals
        .approve_claim(&stale.claim_id, "admin-1")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(ref code) if code == AppError::REFERRAL_CAP_EXCEEDED));

    let user = state.db.get_user(&uid).await.unwrap().unwrap();
    assert_eq!(user.referral_earnings_paid, 30, "Cap refusal must not credit");
}

#[tokio::test]
async fn test_referral_redeem_is_single_use() {
    require_emulator!();

    let (_, state) = create_emulator_app().await;
    let suffix = unique();
    let owner = format!("owner-{}", suffix);
    let referred = format!("referred-{}", suffix);

    state.db.upsert_user(&test_user(&owner, Gender::Male)).await.unwrap();
    state.db.upsert_user(&test_user(&referred, Gender::Male)).await.unwrap();

    let code = state.referrals.assign_referral_code(&owner).await.unwrap();
    // Asking again returns the same code.
    assert_eq!(state.referrals.assign_referral_code(&owner).await.unwrap(), code);

    let err = state
        .referrals
        .redeem_referral_code(&code, &owner)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)), "Self-referral refused");

    state
        .referrals
        .redeem_referral_code(&code, &referred)
        .await
        .unwrap();

    let err = state
        .referrals
        .redeem_referral_code(&code, &referred)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(ref code) if code == AppError::ALREADY_REDEEMED));
}

// ═══════════════════════════════════════════════════════════════════════════
// CHAT GATING
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_chat_is_gated_on_match_participation() {
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use tower::ServiceExt;

    require_emulator!();

    let (app, state) = create_emulator_app().await;
    let suffix = unique();
    let (round_id, boy, girl) = matchmaking_fixture(&state, &suffix, 1).await;

    state.matching.like(&round_id, &girl, &boy).await.unwrap();
    state
        .matching
        .confirm_match(&round_id, &boy, &girl, ConfirmOrigin::Boy)
        .await
        .unwrap();

    let stranger = format!("stranger-{}", suffix);
    state.db.upsert_user(&test_user(&stranger, Gender::Male)).await.unwrap();

    let uri = format!("/api/chat/{}_{}_{}/messages", round_id, boy, girl);
    let send = |uid: String| {
        let app = app.clone();
        let state = state.clone();
        let uri = uri.clone();
        async move {
            app.oneshot(
                Request::builder()
                    .method("POST")
                    .uri(&uri)
                    .header(
                        header::AUTHORIZATION,
                        format!("Bearer {}", common::test_jwt(&state, &uid)),
                    )
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(
                        serde_json::json!({ "text": "hello" }).to_string(),
                    ))
                    .unwrap(),
            )
            .await
            .unwrap()
            .status()
        }
    };

    assert_eq!(send(stranger).await, StatusCode::FORBIDDEN);
    assert_eq!(send(boy.clone()).await, StatusCode::OK);
    assert_eq!(send(girl).await, StatusCode::OK);

    // Both participants can read; the thread now has both messages.
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("GET")
                .uri(&uri)
                .header(
                    header::AUTHORIZATION,
                    format!("Bearer {}", common::test_jwt(&state, &boy)),
                )
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["messages"].as_array().unwrap().len(), 2);
}

// ═══════════════════════════════════════════════════════════════════════════
// SUBSCRIPTION REPAIR
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_repair_recomputes_from_ledgers() {
    require_emulator!();

    let (_, state) = create_emulator_app().await;
    let (round_id, boy, girl) = matchmaking_fixture(&state, &unique(), 2).await;

    state.matching.like(&round_id, &girl, &boy).await.unwrap();
    state
        .matching
        .confirm_match(&round_id, &boy, &girl, ConfirmOrigin::Boy)
        .await
        .unwrap();

    // Corrupt the subscription, then repair from payments minus matches.
    let mut sub = state.db.subscriptions_for_user(&boy).await.unwrap().remove(0);
    sub.remaining_matches = 0;
    state.db.upsert_subscription(&sub).await.unwrap();

    let repaired = state.payments.repair_subscription(&boy).await.unwrap();
    assert_eq!(repaired.remaining_matches, 1, "quota 2 minus 1 confirmed match");
}
