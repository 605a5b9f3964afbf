// SPDX-License-Identifier: MIT
// Copyright 2026 DateU

//! Like and match ledger operations.
//!
//! `confirm_match` is the single authoritative match-creation path: the
//! boy-side confirm, the girl-side confirm, and admin promotion all charge
//! quota through the same transaction and the same composite document ID.

use crate::db::FirestoreDb;
use crate::error::AppError;
use crate::models::{Gender, Like, Match};
use crate::services::push::PushService;
use crate::services::rounds::RoundService;
use chrono::Utc;

/// Who initiated a match confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmOrigin {
    Boy,
    Girl,
    /// Admin promotion skips the phase gate but still charges quota.
    Admin,
}

/// Result of a like call.
#[derive(Debug, Clone)]
pub struct LikeOutcome {
    pub like: Like,
    /// `false` when the like already existed (acknowledged no-op)
    pub created: bool,
}

#[derive(Clone)]
pub struct MatchService {
    db: FirestoreDb,
    rounds: RoundService,
    push: PushService,
}

impl MatchService {
    pub fn new(db: FirestoreDb, rounds: RoundService, push: PushService) -> Self {
        Self { db, rounds, push }
    }

    /// Girl-side like of a curated candidate.
    ///
    /// Requires the active round, an open girls phase, a female caller with
    /// a complete profile, and the candidate to appear in her assignment.
    /// Keyed by composite ID, so re-liking is an acknowledged no-op.
    pub async fn like(
        &self,
        round_id: &str,
        liking_uid: &str,
        liked_uid: &str,
    ) -> Result<LikeOutcome, AppError> {
        let active = self
            .rounds
            .get_active_round()
            .await?
            .ok_or_else(|| AppError::NotFound("No active round".to_string()))?;

        if active.round_id != round_id {
            return Err(AppError::BadRequest(format!(
                "Round {} is not the active round",
                round_id
            )));
        }

        let now = Utc::now();
        let girls_open = active
            .phases
            .girls
            .map(|w| w.contains(now))
            .unwrap_or(false);
        if !girls_open {
            return Err(AppError::Conflict(AppError::PHASE_CLOSED.to_string()));
        }

        let user = self
            .db
            .get_user(liking_uid)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", liking_uid)))?;

        if user.gender != Some(Gender::Female) {
            return Err(AppError::Forbidden("Only female users like candidates".to_string()));
        }
        if !user.is_profile_complete {
            return Err(AppError::Forbidden("Profile is not complete".to_string()));
        }

        let candidates = self.rounds.get_assignments(round_id, liking_uid).await?;
        if !candidates.iter().any(|c| c == liked_uid) {
            return Err(AppError::Forbidden(
                "Candidate is not in your assignment".to_string(),
            ));
        }

        if let Some(existing) = self.db.get_like(round_id, liking_uid, liked_uid).await? {
            return Ok(LikeOutcome {
                like: existing,
                created: false,
            });
        }

        let like = Like {
            round_id: round_id.to_string(),
            liking_user_uid: liking_uid.to_string(),
            liked_user_uid: liked_uid.to_string(),
            created_at: now,
        };
        self.db.upsert_like(&like).await?;

        tracing::info!(round_id, liking_uid, liked_uid, "Like recorded");
        Ok(LikeOutcome {
            like,
            created: true,
        })
    }

    /// Likes a boy has received within a round.
    pub async fn incoming_likes(
        &self,
        round_id: &str,
        boy_uid: &str,
    ) -> Result<Vec<Like>, AppError> {
        self.db.likes_for_boy(round_id, boy_uid).await
    }

    /// Finalize a like into a mutually revealed match.
    ///
    /// Validations run outside the transaction; match creation and quota
    /// decrement commit atomically inside it. Returns the match and whether
    /// it was newly created.
    pub async fn confirm_match(
        &self,
        round_id: &str,
        boy_uid: &str,
        girl_uid: &str,
        origin: ConfirmOrigin,
    ) -> Result<(Match, bool), AppError> {
        let round = self
            .db
            .get_round(round_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Round {} not found", round_id)))?;

        if !round.participating_males.iter().any(|m| m == boy_uid) {
            return Err(AppError::Forbidden(
                "Boy is not a participant of this round".to_string(),
            ));
        }

        if origin != ConfirmOrigin::Admin {
            // The like is always girl → boy, whichever side confirms.
            self.db
                .get_like(round_id, girl_uid, boy_uid)
                .await?
                .ok_or_else(|| AppError::NotFound("No like to confirm".to_string()))?;

            let boys_open = round
                .phases
                .boys
                .map(|w| w.contains(Utc::now()))
                .unwrap_or(false);
            if !boys_open {
                return Err(AppError::Conflict(AppError::PHASE_CLOSED.to_string()));
            }
        }

        let (confirmed, newly_created) = self
            .db
            .confirm_match_txn(round_id, boy_uid, girl_uid)
            .await?;

        if newly_created {
            self.notify_matched(&confirmed).await;
        }

        Ok((confirmed, newly_created))
    }

    /// Best-effort match notifications for both sides.
    async fn notify_matched(&self, confirmed: &Match) {
        for uid in [&confirmed.boy_uid, &confirmed.girl_uid] {
            if let Err(e) = self
                .push
                .notify_user(
                    uid,
                    "It's a match!",
                    "You have a new confirmed match. Open DateU to say hi.",
                )
                .await
            {
                tracing::warn!(uid, error = %e, "Match notification failed");
            }
        }
    }

    /// The user's matches, newest first. Identity reveal gates on this.
    pub async fn matches_for_user(&self, uid: &str) -> Result<Vec<Match>, AppError> {
        self.db.matches_for_user(uid).await
    }
}
