// SPDX-License-Identifier: MIT
// Copyright 2026 DateU

//! API routes for authenticated users.

use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::{ChatMessage, Gender, Match, RoundPhases, User};
use crate::services::matching::ConfirmOrigin;
use crate::services::Entitlement;
use crate::time_utils::format_utc_rfc3339;
use crate::AppState;
use axum::{
    extract::{Path, State},
    routing::{get, post},
    Extension, Json, Router,
};
use futures_util::{stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;
use validator::{Validate, ValidationError};

/// Bounded concurrency for profile hydration.
const MAX_CONCURRENT_PROFILE_FETCHES: usize = 16;

/// API routes (require authentication via JWT).
/// The auth middleware is applied in routes/mod.rs for these routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/me", get(get_me).put(update_me))
        .route("/api/rounds/active", get(get_active_round))
        .route("/api/rounds/active/join", post(join_round))
        .route("/api/entitlement", get(get_entitlement))
        .route("/api/assignments/{round_id}", get(get_assignments))
        .route("/api/likes", post(post_like))
        .route("/api/likes/incoming/{round_id}", get(get_incoming_likes))
        .route("/api/matches/confirm", post(confirm_match))
        .route("/api/matches/confirm-by-girl", post(confirm_match_by_girl))
        .route("/api/matches", get(get_matches))
        .route("/api/payments", get(get_payments).post(create_payment))
        .route("/api/referrals/code", post(assign_referral_code))
        .route("/api/referrals/redeem", post(redeem_referral_code))
        .route("/api/referrals/claims", post(submit_claim))
        .route(
            "/api/chat/{match_id}/messages",
            get(get_chat_messages).post(send_chat_message),
        )
}

// ─── User Profile ────────────────────────────────────────────

/// Current user response.
#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct UserResponse {
    pub uid: String,
    pub gender: Option<Gender>,
    pub display_name: Option<String>,
    pub college: Option<String>,
    pub photo_url: Option<String>,
    pub is_profile_complete: bool,
    pub referral_code: Option<String>,
    pub referral_earnings_paid: u32,
    pub is_admin: bool,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            uid: user.uid,
            gender: user.gender,
            display_name: user.display_name,
            college: user.college,
            photo_url: user.photo_url,
            is_profile_complete: user.is_profile_complete,
            referral_code: user.referral_code,
            referral_earnings_paid: user.referral_earnings_paid,
            is_admin: user.is_admin,
        }
    }
}

/// Get current user profile.
async fn get_me(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<UserResponse>> {
    let profile = state
        .db
        .get_user(&user.uid)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User {} not found", user.uid)))?;

    Ok(Json(profile.into()))
}

#[derive(Deserialize, Validate)]
pub struct UpdateProfileRequest {
    pub gender: Option<Gender>,
    #[validate(length(min = 1, max = 80))]
    pub display_name: Option<String>,
    #[validate(length(min = 1, max = 120))]
    pub college: Option<String>,
    #[validate(length(min = 1, max = 1024))]
    pub photo_url: Option<String>,
    pub setup_profile: Option<bool>,
    pub setup_photos: Option<bool>,
    pub setup_verification: Option<bool>,
    pub is_profile_complete: Option<bool>,
    #[validate(length(min = 1, max = 4096))]
    pub fcm_token: Option<String>,
}

/// Create or update the caller's profile. Gender is immutable once set.
async fn update_me(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<UpdateProfileRequest>,
) -> Result<Json<UserResponse>> {
    payload.validate()?;

    let now = chrono::Utc::now();
    let mut profile = state
        .db
        .get_user(&user.uid)
        .await?
        .unwrap_or_else(|| User::new(&user.uid, now));

    if let Some(gender) = payload.gender {
        match profile.gender {
            None => profile.gender = Some(gender),
            Some(existing) if existing == gender => {}
            Some(_) => {
                return Err(AppError::BadRequest(
                    "Gender cannot be changed once set".to_string(),
                ))
            }
        }
    }

    if let Some(display_name) = payload.display_name {
        profile.display_name = Some(display_name);
    }
    if let Some(college) = payload.college {
        profile.college = Some(college);
    }
    if let Some(photo_url) = payload.photo_url {
        profile.photo_url = Some(photo_url);
    }
    if let Some(flag) = payload.setup_profile {
        profile.setup_status.profile = flag;
    }
    if let Some(flag) = payload.setup_photos {
        profile.setup_status.photos = flag;
    }
    if let Some(flag) = payload.setup_verification {
        profile.setup_status.verification = flag;
    }
    if let Some(complete) = payload.is_profile_complete {
        profile.is_profile_complete = complete;
    }
    if let Some(fcm_token) = payload.fcm_token {
        profile.fcm_token = Some(fcm_token);
    }
    profile.last_active = now;

    state.db.upsert_user(&profile).await?;
    Ok(Json(profile.into()))
}

// ─── Rounds ──────────────────────────────────────────────────

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct ActiveRoundResponse {
    pub round_id: Option<String>,
    pub phases: Option<RoundPhases>,
    pub participating: bool,
}

/// The active round's id and phase windows, and whether the caller is in it.
async fn get_active_round(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<ActiveRoundResponse>> {
    let round = state.rounds.get_active_round().await?;

    Ok(Json(match round {
        Some(round) => ActiveRoundResponse {
            participating: round.participating_males.iter().any(|m| m == &user.uid),
            round_id: Some(round.round_id),
            phases: Some(round.phases),
        },
        None => ActiveRoundResponse {
            round_id: None,
            phases: None,
            participating: false,
        },
    }))
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct JoinRoundResponse {
    pub round_id: String,
    pub participating: bool,
}

/// Enter the caller into the active round (`joinMatchingRound`).
async fn join_round(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<JoinRoundResponse>> {
    let round = state.rounds.join_active_round(&user.uid).await?;

    Ok(Json(JoinRoundResponse {
        round_id: round.round_id,
        participating: true,
    }))
}

/// The caller's entitlement (quota + round membership).
async fn get_entitlement(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Entitlement>> {
    Ok(Json(state.entitlement.male_entitlement(&user.uid).await?))
}

// ─── Assignments ─────────────────────────────────────────────

/// A candidate card as shown to a girl pre-match.
#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct CandidateProfile {
    pub uid: String,
    pub display_name: Option<String>,
    pub college: Option<String>,
    pub photo_url: Option<String>,
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct AssignmentsResponse {
    pub round_id: String,
    pub candidates: Vec<CandidateProfile>,
}

/// Hydrate a list of uids into candidate cards, preserving order.
/// Unresolvable uids are dropped rather than failing the page.
async fn hydrate_profiles(state: &AppState, uids: Vec<String>) -> Result<Vec<CandidateProfile>> {
    let db = &state.db;
    let results: Vec<_> = stream::iter(uids)
        .map(|uid| async move { db.get_user(&uid).await })
        .buffered(MAX_CONCURRENT_PROFILE_FETCHES)
        .collect::<Vec<_>>()
        .await;

    let mut profiles = Vec::with_capacity(results.len());
    for result in results {
        if let Some(user) = result? {
            profiles.push(CandidateProfile {
                uid: user.uid,
                display_name: user.display_name,
                college: user.college,
                photo_url: user.photo_url,
            });
        }
    }
    Ok(profiles)
}

/// The caller's curated candidate list for a round.
async fn get_assignments(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(round_id): Path<String>,
) -> Result<Json<AssignmentsResponse>> {
    let uids = state.rounds.get_assignments(&round_id, &user.uid).await?;
    let candidates = hydrate_profiles(&state, uids).await?;

    Ok(Json(AssignmentsResponse {
        round_id,
        candidates,
    }))
}

// ─── Likes ───────────────────────────────────────────────────

#[derive(Deserialize, Validate)]
pub struct LikeRequest {
    #[validate(length(min = 1, max = 64))]
    pub round_id: String,
    #[validate(length(min = 1, max = 128))]
    pub liked_uid: String,
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct LikeResponse {
    pub round_id: String,
    pub liked_uid: String,
    /// `false` when the like already existed
    pub created: bool,
}

/// Girl-side like of a curated candidate.
async fn post_like(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<LikeRequest>,
) -> Result<Json<LikeResponse>> {
    payload.validate()?;

    let outcome = state
        .matching
        .like(&payload.round_id, &user.uid, &payload.liked_uid)
        .await?;

    Ok(Json(LikeResponse {
        round_id: payload.round_id,
        liked_uid: payload.liked_uid,
        created: outcome.created,
    }))
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct IncomingLike {
    pub girl: CandidateProfile,
    pub liked_at: String,
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct IncomingLikesResponse {
    pub round_id: String,
    pub likes: Vec<IncomingLike>,
}

/// Boy-side view of likes received within a round.
async fn get_incoming_likes(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(round_id): Path<String>,
) -> Result<Json<IncomingLikesResponse>> {
    let incoming = state.matching.incoming_likes(&round_id, &user.uid).await?;

    // Likes whose girl profile cannot be resolved are dropped rather than
    // failing the page.
    let mut likes = Vec::with_capacity(incoming.len());
    for like in incoming {
        if let Some(girl) = state.db.get_user(&like.liking_user_uid).await? {
            likes.push(IncomingLike {
                girl: CandidateProfile {
                    uid: girl.uid,
                    display_name: girl.display_name,
                    college: girl.college,
                    photo_url: girl.photo_url,
                },
                liked_at: format_utc_rfc3339(like.created_at),
            });
        }
    }

    Ok(Json(IncomingLikesResponse { round_id, likes }))
}

// ─── Matches ─────────────────────────────────────────────────

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct MatchSummary {
    pub match_id: String,
    pub round_id: String,
    pub boy_uid: String,
    pub girl_uid: String,
    pub created_at: String,
}

impl From<&Match> for MatchSummary {
    fn from(m: &Match) -> Self {
        Self {
            match_id: Match::doc_id(&m.round_id, &m.boy_uid, &m.girl_uid),
            round_id: m.round_id.clone(),
            boy_uid: m.boy_uid.clone(),
            girl_uid: m.girl_uid.clone(),
            created_at: format_utc_rfc3339(m.created_at),
        }
    }
}

#[derive(Deserialize, Validate)]
pub struct ConfirmMatchRequest {
    #[validate(length(min = 1, max = 64))]
    pub round_id: String,
    #[validate(length(min = 1, max = 128))]
    pub girl_uid: String,
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct ConfirmMatchResponse {
    #[serde(rename = "match")]
    pub confirmed: MatchSummary,
    pub newly_created: bool,
    /// Refreshed entitlement for the quota-charged boy
    pub entitlement: Entitlement,
}

/// Boy-side confirm of an incoming like; charges the caller's quota.
async fn confirm_match(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<ConfirmMatchRequest>,
) -> Result<Json<ConfirmMatchResponse>> {
    payload.validate()?;

    let (confirmed, newly_created) = state
        .matching
        .confirm_match(
            &payload.round_id,
            &user.uid,
            &payload.girl_uid,
            ConfirmOrigin::Boy,
        )
        .await?;
    let entitlement = state.entitlement.male_entitlement(&user.uid).await?;

    Ok(Json(ConfirmMatchResponse {
        confirmed: (&confirmed).into(),
        newly_created,
        entitlement,
    }))
}

#[derive(Deserialize, Validate)]
pub struct ConfirmMatchByGirlRequest {
    #[validate(length(min = 1, max = 64))]
    pub round_id: String,
    #[validate(length(min = 1, max = 128))]
    pub boy_uid: String,
}

/// Girl-side confirm of her own like; charges the boy's quota through the
/// same path.
async fn confirm_match_by_girl(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<ConfirmMatchByGirlRequest>,
) -> Result<Json<ConfirmMatchResponse>> {
    payload.validate()?;

    let (confirmed, newly_created) = state
        .matching
        .confirm_match(
            &payload.round_id,
            &payload.boy_uid,
            &user.uid,
            ConfirmOrigin::Girl,
        )
        .await?;
    let entitlement = state.entitlement.male_entitlement(&payload.boy_uid).await?;

    Ok(Json(ConfirmMatchResponse {
        confirmed: (&confirmed).into(),
        newly_created,
        entitlement,
    }))
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct RevealedMatch {
    pub match_id: String,
    pub round_id: String,
    /// The other side's identity, revealed because the match exists
    pub counterpart: CandidateProfile,
    pub created_at: String,
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct MatchesResponse {
    pub matches: Vec<RevealedMatch>,
}

/// The caller's matches with counterpart identity revealed.
async fn get_matches(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<MatchesResponse>> {
    let matches = state.matching.matches_for_user(&user.uid).await?;

    let mut revealed = Vec::with_capacity(matches.len());
    for m in &matches {
        let counterpart_uid = if m.boy_uid == user.uid {
            &m.girl_uid
        } else {
            &m.boy_uid
        };
        let counterpart = state.db.get_user(counterpart_uid).await?;
        let counterpart = match counterpart {
            Some(user) => CandidateProfile {
                uid: user.uid,
                display_name: user.display_name,
                college: user.college,
                photo_url: user.photo_url,
            },
            None => CandidateProfile {
                uid: counterpart_uid.clone(),
                display_name: None,
                college: None,
                photo_url: None,
            },
        };

        revealed.push(RevealedMatch {
            match_id: Match::doc_id(&m.round_id, &m.boy_uid, &m.girl_uid),
            round_id: m.round_id.clone(),
            counterpart,
            created_at: format_utc_rfc3339(m.created_at),
        });
    }

    Ok(Json(MatchesResponse { matches: revealed }))
}

// ─── Payments ────────────────────────────────────────────────

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct PaymentSummary {
    pub payment_id: String,
    pub uid: String,
    pub plan_id: String,
    pub amount: u32,
    pub status: String,
    pub proof_url: Option<String>,
    pub created_at: String,
}

impl From<&crate::models::Payment> for PaymentSummary {
    fn from(p: &crate::models::Payment) -> Self {
        Self {
            payment_id: p.payment_id.clone(),
            uid: p.uid.clone(),
            plan_id: p.plan_id.clone(),
            amount: p.amount,
            status: p.status.as_str().to_string(),
            proof_url: p.proof_url.clone(),
            created_at: format_utc_rfc3339(p.created_at),
        }
    }
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct PaymentsResponse {
    pub payments: Vec<PaymentSummary>,
}

/// The caller's payment history, newest first.
async fn get_payments(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<PaymentsResponse>> {
    let payments = state.payments.payments_for_user(&user.uid).await?;
    Ok(Json(PaymentsResponse {
        payments: payments.iter().map(Into::into).collect(),
    }))
}

#[derive(Deserialize, Validate)]
pub struct CreatePaymentRequest {
    #[validate(length(min = 1, max = 64))]
    pub plan_id: String,
    #[validate(range(min = 1, max = 100_000))]
    pub amount: u32,
    #[validate(length(min = 1, max = 1024))]
    pub proof_url: Option<String>,
}

/// Submit a payment with an optional proof URL.
async fn create_payment(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<CreatePaymentRequest>,
) -> Result<Json<PaymentSummary>> {
    payload.validate()?;

    let payment = state
        .payments
        .create_payment(&user.uid, &payload.plan_id, payload.amount, payload.proof_url)
        .await?;

    Ok(Json((&payment).into()))
}

// ─── Referrals ───────────────────────────────────────────────

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct ReferralCodeResponse {
    pub code: String,
}

/// Assign (or fetch) the caller's referral code.
async fn assign_referral_code(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<ReferralCodeResponse>> {
    let code = state.referrals.assign_referral_code(&user.uid).await?;
    Ok(Json(ReferralCodeResponse { code }))
}

#[derive(Deserialize, Validate)]
pub struct RedeemReferralRequest {
    #[validate(length(min = 1, max = 16))]
    pub code: String,
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct RedeemReferralResponse {
    pub code: String,
    pub redeemed: bool,
}

/// Redeem a referral code as the caller.
async fn redeem_referral_code(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<RedeemReferralRequest>,
) -> Result<Json<RedeemReferralResponse>> {
    payload.validate()?;

    state
        .referrals
        .redeem_referral_code(&payload.code, &user.uid)
        .await?;

    Ok(Json(RedeemReferralResponse {
        code: payload.code,
        redeemed: true,
    }))
}

/// UPI handles look like `name@bank`: both parts non-empty, the handle
/// allowing dots/dashes/underscores, the bank alphanumeric.
fn validate_upi_id(upi_id: &str) -> std::result::Result<(), ValidationError> {
    let Some((handle, bank)) = upi_id.split_once('@') else {
        return Err(ValidationError::new("upi_format"));
    };

    let handle_ok = !handle.is_empty()
        && handle
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_');
    let bank_ok = !bank.is_empty() && bank.chars().all(|c| c.is_ascii_alphanumeric());

    if handle_ok && bank_ok {
        Ok(())
    } else {
        Err(ValidationError::new("upi_format"))
    }
}

#[derive(Deserialize, Validate)]
pub struct SubmitClaimRequest {
    #[validate(range(min = 1, max = 50))]
    pub amount: u32,
    #[validate(length(max = 128), custom(function = validate_upi_id))]
    pub upi_id: String,
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct ClaimSummary {
    pub claim_id: String,
    pub uid: String,
    pub amount: u32,
    pub upi_id: String,
    pub status: String,
    pub created_at: String,
}

impl From<&crate::models::ReferralClaim> for ClaimSummary {
    fn from(c: &crate::models::ReferralClaim) -> Self {
        Self {
            claim_id: c.claim_id.clone(),
            uid: c.uid.clone(),
            amount: c.amount,
            upi_id: c.upi_id.clone(),
            status: c.status.as_str().to_string(),
            created_at: format_utc_rfc3339(c.created_at),
        }
    }
}

/// Submit a payout claim against referral earnings.
async fn submit_claim(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<SubmitClaimRequest>,
) -> Result<Json<ClaimSummary>> {
    payload.validate()?;

    let claim = state
        .referrals
        .submit_claim(&user.uid, payload.amount, &payload.upi_id)
        .await?;

    Ok(Json((&claim).into()))
}

// ─── Chat ────────────────────────────────────────────────────

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct ChatMessageResponse {
    pub sender_uid: String,
    pub text: String,
    pub sent_at: String,
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct ChatMessagesResponse {
    pub match_id: String,
    pub messages: Vec<ChatMessageResponse>,
}

/// Chat gates on match participation: the caller must be one of the two
/// matched users.
async fn participant_match(state: &AppState, match_id: &str, uid: &str) -> Result<Match> {
    let m = state
        .db
        .get_match_by_doc_id(match_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Match {} not found", match_id)))?;

    if !m.is_participant(uid) {
        return Err(AppError::Forbidden(
            "You are not part of this match".to_string(),
        ));
    }
    Ok(m)
}

/// Messages in a match's thread, oldest first.
async fn get_chat_messages(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(match_id): Path<String>,
) -> Result<Json<ChatMessagesResponse>> {
    participant_match(&state, &match_id, &user.uid).await?;

    let messages = state.db.chat_messages_for_match(&match_id).await?;
    Ok(Json(ChatMessagesResponse {
        match_id,
        messages: messages
            .into_iter()
            .map(|m| ChatMessageResponse {
                sender_uid: m.sender_uid,
                text: m.text,
                sent_at: format_utc_rfc3339(m.sent_at),
            })
            .collect(),
    }))
}

#[derive(Deserialize, Validate)]
pub struct SendChatMessageRequest {
    #[validate(length(min = 1, max = 2000))]
    pub text: String,
}

/// Send a chat message; fans out a best-effort push to the other side.
async fn send_chat_message(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(match_id): Path<String>,
    Json(payload): Json<SendChatMessageRequest>,
) -> Result<Json<ChatMessageResponse>> {
    payload.validate()?;

    let m = participant_match(&state, &match_id, &user.uid).await?;

    let now = chrono::Utc::now();
    let message = ChatMessage {
        match_id: match_id.clone(),
        sender_uid: user.uid.clone(),
        text: payload.text,
        sent_at: now,
    };
    let doc_id = crate::db::timeline_doc_id(&match_id, now);
    state.db.create_chat_message(&doc_id, &message).await?;

    // Every participant except the sender gets a push; failures are
    // logged inside the push service and never surface here.
    for recipient in m.participants.iter().filter(|p| *p != &user.uid) {
        if let Err(e) = state
            .push
            .notify_user(recipient, "New message", "You have a new message on DateU.")
            .await
        {
            tracing::warn!(recipient, error = %e, "Chat notification failed");
        }
    }

    Ok(Json(ChatMessageResponse {
        sender_uid: message.sender_uid,
        text: message.text,
        sent_at: format_utc_rfc3339(message.sent_at),
    }))
}
