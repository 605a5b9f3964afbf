// SPDX-License-Identifier: MIT
// Copyright 2026 DateU

//! Entitlement calculator: a male user's remaining quota and active-round
//! membership, derived from subscription and round documents.

use crate::db::FirestoreDb;
use crate::error::AppError;
use crate::models::payment::pick_active_subscription;
use crate::models::{MatchingRound, Subscription};
use crate::services::rounds::RoundService;
use serde::Serialize;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// What a male user is currently entitled to.
#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct Entitlement {
    pub in_active_round: bool,
    pub has_active_subscription: bool,
    pub remaining_matches: u32,
}

#[derive(Clone)]
pub struct EntitlementService {
    db: FirestoreDb,
    rounds: RoundService,
}

impl EntitlementService {
    pub fn new(db: FirestoreDb, rounds: RoundService) -> Self {
        Self { db, rounds }
    }

    /// The subscription quota-bearing operations act on, if any.
    pub async fn active_subscription(
        &self,
        uid: &str,
    ) -> Result<Option<Subscription>, AppError> {
        let subs = self.db.subscriptions_for_user(uid).await?;
        Ok(pick_active_subscription(&subs).cloned())
    }

    /// Compose subscription state with round membership.
    ///
    /// A failure while resolving the active round degrades to
    /// `in_active_round = false` instead of failing the whole call; the
    /// subscription side still propagates errors.
    pub async fn male_entitlement(&self, uid: &str) -> Result<Entitlement, AppError> {
        let subscription = self.active_subscription(uid).await?;
        let active_round = self.rounds.get_active_round().await;
        Ok(compose_entitlement(uid, subscription, active_round))
    }
}

/// Fold the active-round lookup outcome into the entitlement.
///
/// A failed lookup degrades to `in_active_round = false` rather than failing
/// the whole call; the subscription side has already propagated its errors.
fn compose_entitlement(
    uid: &str,
    subscription: Option<Subscription>,
    active_round: Result<Option<MatchingRound>, AppError>,
) -> Entitlement {
    let in_active_round = match active_round {
        Ok(Some(round)) => round.participating_males.iter().any(|m| m == uid),
        Ok(None) => false,
        Err(e) => {
            tracing::warn!(uid, error = %e, "Active round lookup failed; degrading");
            false
        }
    };

    Entitlement {
        in_active_round,
        has_active_subscription: subscription.is_some(),
        remaining_matches: subscription.map(|s| s.remaining_matches).unwrap_or(0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{RoundPhases, SubscriptionStatus};
    use chrono::Utc;

    fn sub(remaining: u32) -> Subscription {
        let now = Utc::now();
        Subscription {
            subscription_id: "u1_1".to_string(),
            uid: "u1".to_string(),
            plan_id: "basic".to_string(),
            status: SubscriptionStatus::Active,
            remaining_matches: remaining,
            match_quota: remaining,
            rounds_used: 0,
            rounds_allowed: 1,
            created_at: now,
            updated_at: now,
        }
    }

    fn round_with(males: &[&str]) -> MatchingRound {
        MatchingRound {
            round_id: "r1".to_string(),
            participating_males: males.iter().map(|m| m.to_string()).collect(),
            phases: RoundPhases::default(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_membership_follows_the_active_round() {
        let e = compose_entitlement("u1", Some(sub(3)), Ok(Some(round_with(&["u1", "u2"]))));
        assert!(e.in_active_round);
        assert!(e.has_active_subscription);
        assert_eq!(e.remaining_matches, 3);

        let e = compose_entitlement("u3", None, Ok(Some(round_with(&["u1"]))));
        assert!(!e.in_active_round);
        assert!(!e.has_active_subscription);
        assert_eq!(e.remaining_matches, 0);

        let e = compose_entitlement("u1", Some(sub(2)), Ok(None));
        assert!(!e.in_active_round);
        assert_eq!(e.remaining_matches, 2);
    }

    #[test]
    fn test_round_lookup_failure_degrades_membership_only() {
        let e = compose_entitlement(
            "u1",
            Some(sub(2)),
            Err(AppError::Database("connection reset".to_string())),
        );
        assert!(!e.in_active_round);
        assert!(e.has_active_subscription);
        assert_eq!(e.remaining_matches, 2);
    }
}
