// SPDX-License-Identifier: MIT
// Copyright 2026 DateU

//! Admin routes: round lifecycle, assignment curation, payment and claim
//! review, subscription repair, and manual notifications.

use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::{ClaimStatus, PaymentStatus, RoundPhases, Subscription};
use crate::routes::api::{ClaimSummary, MatchSummary, PaymentSummary};
use crate::services::matching::ConfirmOrigin;
use crate::time_utils::format_utc_rfc3339;
use crate::AppState;
use axum::{
    extract::{Path, Query, State},
    routing::{get, post, put},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;
use validator::Validate;

const DEFAULT_PAGE_SIZE: u32 = 25;
const MAX_PAGE_SIZE: u32 = 100;

/// Admin routes. Auth and admin-flag middleware are applied in
/// routes/mod.rs.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/admin/rounds", get(list_rounds).post(create_round))
        .route("/api/admin/rounds/{round_id}/phases", put(set_phases))
        .route("/api/admin/rounds/active", put(set_active_round))
        .route("/api/admin/rounds/active/sync-males", post(sync_males))
        .route(
            "/api/admin/assignments/{round_id}/{girl_uid}",
            get(get_assignments),
        )
        .route("/api/admin/assignments", put(set_assignments))
        .route("/api/admin/payments", get(list_payments))
        .route(
            "/api/admin/payments/{payment_id}/approve",
            post(approve_payment),
        )
        .route(
            "/api/admin/payments/{payment_id}/reject",
            post(reject_payment),
        )
        .route("/api/admin/matches/promote", post(promote_match))
        .route("/api/admin/claims", get(list_claims))
        .route("/api/admin/claims/{claim_id}/approve", post(approve_claim))
        .route("/api/admin/claims/{claim_id}/reject", post(reject_claim))
        .route(
            "/api/admin/subscriptions/{uid}/repair",
            post(repair_subscription),
        )
        .route("/api/admin/notifications", post(send_notification))
}

// ─── Rounds ──────────────────────────────────────────────────

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct RoundSummary {
    pub round_id: String,
    pub participating_males: Vec<String>,
    pub phases: RoundPhases,
    pub created_at: String,
}

impl From<crate::models::MatchingRound> for RoundSummary {
    fn from(round: crate::models::MatchingRound) -> Self {
        Self {
            round_id: round.round_id,
            participating_males: round.participating_males,
            phases: round.phases,
            created_at: format_utc_rfc3339(round.created_at),
        }
    }
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct RoundsResponse {
    pub rounds: Vec<RoundSummary>,
    pub active_round_id: Option<String>,
}

/// All rounds, newest first, plus which one is active.
async fn list_rounds(State(state): State<Arc<AppState>>) -> Result<Json<RoundsResponse>> {
    let rounds = state.db.list_rounds().await?;
    let active_round_id = state
        .db
        .get_active_round_pointer()
        .await?
        .and_then(|p| p.round_id);

    Ok(Json(RoundsResponse {
        rounds: rounds.into_iter().map(Into::into).collect(),
        active_round_id,
    }))
}

#[derive(Deserialize, Validate)]
pub struct CreateRoundRequest {
    #[validate(length(min = 1, max = 64))]
    pub round_id: String,
}

/// Create a round. Re-creating an existing round returns it unchanged.
async fn create_round(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateRoundRequest>,
) -> Result<Json<RoundSummary>> {
    payload.validate()?;

    let round = state.rounds.create_round(&payload.round_id).await?;
    Ok(Json(round.into()))
}

/// Overwrite a round's phase windows.
async fn set_phases(
    State(state): State<Arc<AppState>>,
    Path(round_id): Path<String>,
    Json(phases): Json<RoundPhases>,
) -> Result<Json<RoundSummary>> {
    let round = state.rounds.set_round_phases(&round_id, phases).await?;
    Ok(Json(round.into()))
}

#[derive(Deserialize)]
pub struct SetActiveRoundRequest {
    /// `null` (or absent) clears the pointer, deactivating all rounds.
    pub round_id: Option<String>,
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct SetActiveRoundResponse {
    pub active_round_id: Option<String>,
}

/// Swap or clear the active-round pointer. An empty id clears, like `null`.
async fn set_active_round(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<SetActiveRoundRequest>,
) -> Result<Json<SetActiveRoundResponse>> {
    let round_id = payload.round_id.filter(|id| !id.is_empty());
    state.rounds.set_active_round(round_id.as_deref()).await?;

    Ok(Json(SetActiveRoundResponse {
        active_round_id: round_id,
    }))
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct SyncMalesResponse {
    pub added: usize,
}

/// Backfill approved payers into the active round.
async fn sync_males(State(state): State<Arc<AppState>>) -> Result<Json<SyncMalesResponse>> {
    let added = state.rounds.sync_approved_males().await?;
    Ok(Json(SyncMalesResponse { added }))
}

// ─── Assignments ─────────────────────────────────────────────

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct AdminAssignmentResponse {
    pub round_id: String,
    pub girl_uid: String,
    pub male_candidates: Vec<String>,
}

/// A girl's raw candidate uid list, for the curation UI.
async fn get_assignments(
    State(state): State<Arc<AppState>>,
    Path((round_id, girl_uid)): Path<(String, String)>,
) -> Result<Json<AdminAssignmentResponse>> {
    let male_candidates = state.rounds.get_assignments(&round_id, &girl_uid).await?;

    Ok(Json(AdminAssignmentResponse {
        round_id,
        girl_uid,
        male_candidates,
    }))
}

#[derive(Deserialize, Validate)]
pub struct SetAssignmentsRequest {
    #[validate(length(min = 1, max = 64))]
    pub round_id: String,
    #[validate(length(min = 1, max = 128))]
    pub girl_uid: String,
    #[validate(length(max = 200))]
    pub male_candidates: Vec<String>,
}

/// Full overwrite of a girl's candidate list.
async fn set_assignments(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<SetAssignmentsRequest>,
) -> Result<Json<AdminAssignmentResponse>> {
    payload.validate()?;

    let assignment = state
        .rounds
        .set_assignments(&payload.round_id, &payload.girl_uid, payload.male_candidates)
        .await?;

    Ok(Json(AdminAssignmentResponse {
        round_id: assignment.round_id,
        girl_uid: assignment.girl_uid,
        male_candidates: assignment.male_candidates,
    }))
}

// ─── Payment Review ──────────────────────────────────────────

/// Query offset for a review-queue page. Both values come off the query
/// string, so the multiplication is checked rather than left to wrap.
fn queue_offset(page: u32, per_page: u32) -> Result<u32> {
    page.checked_mul(per_page)
        .ok_or_else(|| AppError::BadRequest("Page out of range".to_string()))
}

fn parse_payment_status(raw: &str) -> Result<PaymentStatus> {
    match raw {
        "pending" => Ok(PaymentStatus::Pending),
        "approved" => Ok(PaymentStatus::Approved),
        "rejected" => Ok(PaymentStatus::Rejected),
        "failed" => Ok(PaymentStatus::Failed),
        other => Err(AppError::BadRequest(format!(
            "Unknown payment status: {}",
            other
        ))),
    }
}

fn parse_claim_status(raw: &str) -> Result<ClaimStatus> {
    match raw {
        "pending" => Ok(ClaimStatus::Pending),
        "approved" => Ok(ClaimStatus::Approved),
        "rejected" => Ok(ClaimStatus::Rejected),
        other => Err(AppError::BadRequest(format!(
            "Unknown claim status: {}",
            other
        ))),
    }
}

#[derive(Deserialize)]
pub struct ReviewQueueQuery {
    pub status: Option<String>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct AdminPaymentsResponse {
    pub payments: Vec<PaymentSummary>,
    pub page: u32,
    pub per_page: u32,
}

/// Paginated payment review queue, defaulting to pending.
async fn list_payments(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ReviewQueueQuery>,
) -> Result<Json<AdminPaymentsResponse>> {
    let status = parse_payment_status(query.status.as_deref().unwrap_or("pending"))?;
    let page = query.page.unwrap_or(0);
    let per_page = query
        .per_page
        .unwrap_or(DEFAULT_PAGE_SIZE)
        .clamp(1, MAX_PAGE_SIZE);

    let payments = state
        .payments
        .payments_by_status(status, per_page, queue_offset(page, per_page)?)
        .await?;

    Ok(Json(AdminPaymentsResponse {
        payments: payments.iter().map(Into::into).collect(),
        page,
        per_page,
    }))
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct SubscriptionSummary {
    pub subscription_id: String,
    pub uid: String,
    pub plan_id: String,
    pub status: String,
    pub remaining_matches: u32,
    pub match_quota: u32,
    pub rounds_used: u32,
    pub rounds_allowed: u32,
}

impl From<&Subscription> for SubscriptionSummary {
    fn from(s: &Subscription) -> Self {
        Self {
            subscription_id: s.subscription_id.clone(),
            uid: s.uid.clone(),
            plan_id: s.plan_id.clone(),
            status: s.status.as_str().to_string(),
            remaining_matches: s.remaining_matches,
            match_quota: s.match_quota,
            rounds_used: s.rounds_used,
            rounds_allowed: s.rounds_allowed,
        }
    }
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct ApprovePaymentResponse {
    pub payment: PaymentSummary,
    pub subscription: SubscriptionSummary,
}

/// Approve a payment: flips status and provisions quota in one transaction.
async fn approve_payment(
    State(state): State<Arc<AppState>>,
    Extension(admin): Extension<AuthUser>,
    Path(payment_id): Path<String>,
) -> Result<Json<ApprovePaymentResponse>> {
    let (payment, subscription) = state
        .payments
        .approve_payment(&payment_id, &admin.uid)
        .await?;

    Ok(Json(ApprovePaymentResponse {
        payment: (&payment).into(),
        subscription: (&subscription).into(),
    }))
}

/// Reject a pending payment. No quota changes.
async fn reject_payment(
    State(state): State<Arc<AppState>>,
    Extension(admin): Extension<AuthUser>,
    Path(payment_id): Path<String>,
) -> Result<Json<PaymentSummary>> {
    let payment = state
        .payments
        .reject_payment(&payment_id, &admin.uid)
        .await?;

    Ok(Json((&payment).into()))
}

// ─── Match Promotion ─────────────────────────────────────────

#[derive(Deserialize, Validate)]
pub struct PromoteMatchRequest {
    #[validate(length(min = 1, max = 64))]
    pub round_id: String,
    #[validate(length(min = 1, max = 128))]
    pub boy_uid: String,
    #[validate(length(min = 1, max = 128))]
    pub girl_uid: String,
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct PromoteMatchResponse {
    #[serde(rename = "match")]
    pub confirmed: MatchSummary,
    pub newly_created: bool,
}

/// Directly promote a pair into a match, bypassing like and phase checks
/// but still charging the boy's quota.
async fn promote_match(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<PromoteMatchRequest>,
) -> Result<Json<PromoteMatchResponse>> {
    payload.validate()?;

    let (confirmed, newly_created) = state
        .matching
        .confirm_match(
            &payload.round_id,
            &payload.boy_uid,
            &payload.girl_uid,
            ConfirmOrigin::Admin,
        )
        .await?;

    Ok(Json(PromoteMatchResponse {
        confirmed: (&confirmed).into(),
        newly_created,
    }))
}

// ─── Claim Review ────────────────────────────────────────────

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct AdminClaimsResponse {
    pub claims: Vec<ClaimSummary>,
}

/// Referral claim review queue, defaulting to pending.
async fn list_claims(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ReviewQueueQuery>,
) -> Result<Json<AdminClaimsResponse>> {
    let status = parse_claim_status(query.status.as_deref().unwrap_or("pending"))?;
    let claims = state.referrals.claims_by_status(status).await?;

    Ok(Json(AdminClaimsResponse {
        claims: claims.iter().map(Into::into).collect(),
    }))
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct ApproveClaimResponse {
    pub claim: ClaimSummary,
    /// The user's lifetime earnings after this payout
    pub total_earnings_paid: u32,
}

/// Approve a claim and credit the user, enforcing the lifetime cap.
async fn approve_claim(
    State(state): State<Arc<AppState>>,
    Extension(admin): Extension<AuthUser>,
    Path(claim_id): Path<String>,
) -> Result<Json<ApproveClaimResponse>> {
    let (claim, total_earnings_paid) = state.referrals.approve_claim(&claim_id, &admin.uid).await?;

    Ok(Json(ApproveClaimResponse {
        claim: (&claim).into(),
        total_earnings_paid,
    }))
}

/// Reject a pending claim.
async fn reject_claim(
    State(state): State<Arc<AppState>>,
    Extension(admin): Extension<AuthUser>,
    Path(claim_id): Path<String>,
) -> Result<Json<ClaimSummary>> {
    let claim = state.referrals.reject_claim(&claim_id, &admin.uid).await?;
    Ok(Json((&claim).into()))
}

// ─── Subscription Repair ─────────────────────────────────────

/// Recompute a user's subscription from the payment and match ledgers.
async fn repair_subscription(
    State(state): State<Arc<AppState>>,
    Path(uid): Path<String>,
) -> Result<Json<SubscriptionSummary>> {
    let subscription = state.payments.repair_subscription(&uid).await?;
    Ok(Json((&subscription).into()))
}

// ─── Notifications ───────────────────────────────────────────

#[derive(Deserialize, Validate)]
pub struct SendNotificationRequest {
    #[validate(length(min = 1, max = 128))]
    pub uid: String,
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(length(min = 1, max = 1000))]
    pub body: String,
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct SendNotificationResponse {
    pub uid: String,
    pub delivered: bool,
}

/// Record a notification for a user and attempt push delivery. The record
/// is durable even when the push leg fails.
async fn send_notification(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<SendNotificationRequest>,
) -> Result<Json<SendNotificationResponse>> {
    payload.validate()?;

    state
        .push
        .notify_user(&payload.uid, &payload.title, &payload.body)
        .await?;

    Ok(Json(SendNotificationResponse {
        uid: payload.uid,
        delivered: true,
    }))
}
