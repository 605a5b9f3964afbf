// SPDX-License-Identifier: MIT
// Copyright 2026 DateU

//! Round registry and assignment store.
//!
//! Which round is active is held by a single pointer document
//! (`registry/active_round`), so "at most one active round" follows from
//! document atomicity instead of a batched flag flip over every round.

use crate::db::FirestoreDb;
use crate::error::AppError;
use crate::models::payment::pick_active_subscription;
use crate::models::{ActiveRoundPointer, Assignment, Gender, MatchingRound, RoundPhases};
use chrono::Utc;
use futures_util::{stream, StreamExt};

/// Bounded concurrency for profile resolution during round sync.
const MAX_CONCURRENT_DB_OPS: usize = 16;

/// Round registry and assignment operations.
#[derive(Clone)]
pub struct RoundService {
    db: FirestoreDb,
}

impl RoundService {
    pub fn new(db: FirestoreDb) -> Self {
        Self { db }
    }

    /// Round IDs become prefixes of composite document IDs, so the
    /// separator and the path character are reserved.
    pub fn validate_round_id(round_id: &str) -> Result<(), AppError> {
        if round_id.is_empty() {
            return Err(AppError::BadRequest("Round id must not be empty".to_string()));
        }
        if round_id.contains('_') || round_id.contains('/') {
            return Err(AppError::BadRequest(
                "Round id must not contain '_' or '/'".to_string(),
            ));
        }
        Ok(())
    }

    /// Resolve the active round through the pointer document.
    ///
    /// A dangling pointer (round document deleted out from under it) reads
    /// as no active round.
    pub async fn get_active_round(&self) -> Result<Option<MatchingRound>, AppError> {
        let Some(pointer) = self.db.get_active_round_pointer().await? else {
            return Ok(None);
        };
        let Some(round_id) = pointer.round_id else {
            return Ok(None);
        };

        match self.db.get_round(&round_id).await? {
            Some(round) => Ok(Some(round)),
            None => {
                tracing::warn!(round_id, "Active-round pointer is dangling");
                Ok(None)
            }
        }
    }

    /// Create a round with an empty participant list and no phases.
    ///
    /// Creation is idempotent: an existing round is returned unchanged
    /// rather than overwritten, so re-creating cannot wipe participants.
    pub async fn create_round(&self, round_id: &str) -> Result<MatchingRound, AppError> {
        Self::validate_round_id(round_id)?;

        if let Some(existing) = self.db.get_round(round_id).await? {
            return Ok(existing);
        }

        let round = MatchingRound::new(round_id, Utc::now());
        self.db.upsert_round(&round).await?;
        tracing::info!(round_id, "Round created");
        Ok(round)
    }

    /// Point the registry at a round, or clear it with `None`.
    pub async fn set_active_round(&self, round_id: Option<&str>) -> Result<(), AppError> {
        if let Some(round_id) = round_id {
            Self::validate_round_id(round_id)?;
            if self.db.get_round(round_id).await?.is_none() {
                return Err(AppError::NotFound(format!("Round {} not found", round_id)));
            }
        }

        let pointer = ActiveRoundPointer {
            round_id: round_id.map(str::to_string),
            updated_at: Utc::now(),
        };
        self.db.set_active_round_pointer(&pointer).await?;

        tracing::info!(round_id = ?pointer.round_id, "Active round updated");
        Ok(())
    }

    /// Overwrite a round's phase windows.
    pub async fn set_round_phases(
        &self,
        round_id: &str,
        phases: RoundPhases,
    ) -> Result<MatchingRound, AppError> {
        for window in [phases.boys.as_ref(), phases.girls.as_ref()].into_iter().flatten() {
            if !window.is_well_formed() {
                return Err(AppError::BadRequest(
                    "Phase window must start before it ends".to_string(),
                ));
            }
        }

        let mut round = self
            .db
            .get_round(round_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Round {} not found", round_id)))?;

        round.phases = phases;
        self.db.upsert_round(&round).await?;
        Ok(round)
    }

    /// Enter the caller into the active round (`joinMatchingRound`).
    ///
    /// Requires a male caller with a complete profile and an active
    /// subscription.
    pub async fn join_active_round(&self, uid: &str) -> Result<MatchingRound, AppError> {
        let user = self
            .db
            .get_user(uid)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", uid)))?;

        if user.gender != Some(Gender::Male) {
            return Err(AppError::Forbidden(
                "Only male users join rounds directly".to_string(),
            ));
        }
        if !user.is_profile_complete {
            return Err(AppError::Forbidden("Profile is not complete".to_string()));
        }

        let subs = self.db.subscriptions_for_user(uid).await?;
        if pick_active_subscription(&subs).is_none() {
            return Err(AppError::Forbidden(
                "An active subscription is required".to_string(),
            ));
        }

        let round = self
            .get_active_round()
            .await?
            .ok_or_else(|| AppError::NotFound("No active round".to_string()))?;

        let uids = [uid.to_string()];
        self.db
            .union_round_participants(&round.round_id, &uids)
            .await?;

        self.db
            .get_round(&round.round_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Round {} not found", round.round_id)))
    }

    /// Union every approved payer with a complete male profile into the
    /// active round. Returns the number of newly added participants.
    ///
    /// This is an admin repair operation, so a missing active round is an
    /// error here, unlike the payment-approval path where it is swallowed.
    pub async fn sync_approved_males(&self) -> Result<usize, AppError> {
        let round = self
            .get_active_round()
            .await?
            .ok_or_else(|| AppError::NotFound("No active round".to_string()))?;

        let payments = self.db.approved_payments().await?;
        let mut payer_uids: Vec<String> = Vec::new();
        for payment in payments {
            if !payer_uids.contains(&payment.uid) {
                payer_uids.push(payment.uid);
            }
        }

        // Resolve payer profiles with bounded concurrency.
        let db = &self.db;
        let users: Vec<_> = stream::iter(payer_uids)
            .map(|uid| async move { db.get_user(&uid).await })
            .buffer_unordered(MAX_CONCURRENT_DB_OPS)
            .collect::<Vec<_>>()
            .await;

        let mut eligible: Vec<String> = Vec::new();
        for result in users {
            if let Some(user) = result? {
                if user.gender == Some(Gender::Male) && user.is_profile_complete {
                    eligible.push(user.uid);
                }
            }
        }

        let added = self
            .db
            .union_round_participants(&round.round_id, &eligible)
            .await?;

        tracing::info!(
            round_id = %round.round_id,
            eligible = eligible.len(),
            added,
            "Synced approved males to active round"
        );

        Ok(added)
    }

    // ─── Assignment Store ────────────────────────────────────────

    /// A girl's curated candidate list; a missing document reads as empty.
    pub async fn get_assignments(
        &self,
        round_id: &str,
        girl_uid: &str,
    ) -> Result<Vec<String>, AppError> {
        Ok(self
            .db
            .get_assignment(round_id, girl_uid)
            .await?
            .map(|a| a.male_candidates)
            .unwrap_or_default())
    }

    /// Full overwrite of a girl's candidate list. No diffing, no history.
    pub async fn set_assignments(
        &self,
        round_id: &str,
        girl_uid: &str,
        male_candidates: Vec<String>,
    ) -> Result<Assignment, AppError> {
        if self.db.get_round(round_id).await?.is_none() {
            return Err(AppError::NotFound(format!("Round {} not found", round_id)));
        }

        let assignment = Assignment {
            round_id: round_id.to_string(),
            girl_uid: girl_uid.to_string(),
            male_candidates: dedup_candidates(girl_uid, male_candidates),
            updated_at: Utc::now(),
        };
        self.db.set_assignment(&assignment).await?;
        Ok(assignment)
    }
}

/// Deduplicate preserving first occurrence; a girl never appears in her own
/// candidate list.
fn dedup_candidates(girl_uid: &str, candidates: Vec<String>) -> Vec<String> {
    let mut seen = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        if candidate != girl_uid && !seen.contains(&candidate) {
            seen.push(candidate);
        }
    }
    seen
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_id_validation() {
        assert!(RoundService::validate_round_id("2026-W09").is_ok());
        assert!(RoundService::validate_round_id("").is_err());
        assert!(RoundService::validate_round_id("round_1").is_err());
        assert!(RoundService::validate_round_id("rounds/1").is_err());
    }

    #[test]
    fn test_dedup_candidates_preserves_order() {
        let deduped = dedup_candidates(
            "girl",
            vec![
                "b".to_string(),
                "a".to_string(),
                "b".to_string(),
                "c".to_string(),
            ],
        );
        assert_eq!(deduped, vec!["b", "a", "c"]);
    }

    #[test]
    fn test_dedup_candidates_excludes_self() {
        let deduped = dedup_candidates("girl", vec!["a".to_string(), "girl".to_string()]);
        assert_eq!(deduped, vec!["a"]);
    }
}
