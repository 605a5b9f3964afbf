// SPDX-License-Identifier: MIT
// Copyright 2026 DateU

//! Payment provisioning: submit, approve, reject, and repair.

use crate::db::FirestoreDb;
use crate::error::AppError;
use crate::models::payment::{pick_active_subscription, resolve_quota};
use crate::models::{
    Payment, PaymentStatus, Plan, Subscription, SubscriptionStatus,
};
use crate::services::rounds::RoundService;
use chrono::Utc;
use dashmap::DashMap;
use std::sync::Arc;

#[derive(Clone)]
pub struct PaymentService {
    db: FirestoreDb,
    rounds: RoundService,
    /// Read-through plan cache; plans change rarely.
    plans: Arc<DashMap<String, Plan>>,
}

impl PaymentService {
    pub fn new(db: FirestoreDb, rounds: RoundService) -> Self {
        Self {
            db,
            rounds,
            plans: Arc::new(DashMap::new()),
        }
    }

    async fn plan(&self, plan_id: &str) -> Result<Option<Plan>, AppError> {
        if let Some(plan) = self.plans.get(plan_id) {
            return Ok(Some(plan.clone()));
        }
        let plan = self.db.get_plan(plan_id).await?;
        if let Some(plan) = &plan {
            self.plans.insert(plan_id.to_string(), plan.clone());
        }
        Ok(plan)
    }

    /// Submit a pending payment with an optional proof URL.
    pub async fn create_payment(
        &self,
        uid: &str,
        plan_id: &str,
        amount: u32,
        proof_url: Option<String>,
    ) -> Result<Payment, AppError> {
        if self.plan(plan_id).await?.is_none() {
            return Err(AppError::NotFound(format!("Plan {} not found", plan_id)));
        }

        if let Some(url) = &proof_url {
            if !proof_url_is_valid(uid, url) {
                return Err(AppError::BadRequest(
                    "Proof URL must point under your payments folder".to_string(),
                ));
            }
        }

        let now = Utc::now();
        let payment = Payment {
            payment_id: format!("{}_{}", uid, now.timestamp_millis()),
            uid: uid.to_string(),
            plan_id: plan_id.to_string(),
            amount,
            status: PaymentStatus::Pending,
            proof_url,
            match_quota: None,
            quota: None,
            created_at: now,
            reviewed_by: None,
            reviewed_at: None,
        };
        self.db.upsert_payment(&payment).await?;

        tracing::info!(payment_id = %payment.payment_id, uid, plan_id, amount, "Payment submitted");
        Ok(payment)
    }

    /// The caller's payment history, newest first.
    pub async fn payments_for_user(&self, uid: &str) -> Result<Vec<Payment>, AppError> {
        self.db.payments_for_user(uid).await
    }

    /// Payments by status with pagination (admin review queue).
    pub async fn payments_by_status(
        &self,
        status: PaymentStatus,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<Payment>, AppError> {
        self.db.payments_by_status(status, limit, offset).await
    }

    /// Approve a pending payment and provision quota atomically
    /// (`adminApprovePayment`).
    ///
    /// Quota resolution happens before any write; a plan/payment pair that
    /// resolves to no quota fails the whole call. The active-round union
    /// rides in the same transaction, but the *absence* of an active round
    /// is swallowed, as in the client-era behavior.
    pub async fn approve_payment(
        &self,
        payment_id: &str,
        admin_uid: &str,
    ) -> Result<(Payment, Subscription), AppError> {
        let payment = self
            .db
            .get_payment(payment_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Payment {} not found", payment_id)))?;

        let plan = self.plan(&payment.plan_id).await?;
        let quota = resolve_quota(plan.as_ref(), &payment).ok_or_else(|| {
            AppError::BadRequest(format!(
                "Plan {} grants no match quota",
                payment.plan_id
            ))
        })?;
        let rounds_allowed = plan.as_ref().and_then(|p| p.rounds_allowed).unwrap_or(1);

        let active_round = match self.rounds.get_active_round().await {
            Ok(round) => round,
            Err(e) => {
                tracing::warn!(payment_id, error = %e, "Active round lookup failed; approving without round join");
                None
            }
        };

        self.db
            .approve_payment_txn(payment_id, admin_uid, quota, rounds_allowed, active_round)
            .await
    }

    /// Reject a pending payment.
    pub async fn reject_payment(
        &self,
        payment_id: &str,
        admin_uid: &str,
    ) -> Result<Payment, AppError> {
        let mut payment = self
            .db
            .get_payment(payment_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Payment {} not found", payment_id)))?;

        if payment.status != PaymentStatus::Pending {
            return Err(AppError::Conflict(
                AppError::PAYMENT_ALREADY_REVIEWED.to_string(),
            ));
        }

        payment.status = PaymentStatus::Rejected;
        payment.reviewed_by = Some(admin_uid.to_string());
        payment.reviewed_at = Some(Utc::now());
        self.db.upsert_payment(&payment).await?;

        tracing::info!(payment_id, uid = %payment.uid, "Payment rejected");
        Ok(payment)
    }

    /// Recompute a user's subscription from the ledgers
    /// (`repairUserSubscription`).
    ///
    /// Remaining quota = total resolved quota over approved payments minus
    /// confirmed matches as the boy, floored at zero. Heals any residue of
    /// the old non-atomic provisioning.
    pub async fn repair_subscription(&self, uid: &str) -> Result<Subscription, AppError> {
        let payments = self.db.payments_for_user(uid).await?;
        let approved: Vec<&Payment> = payments
            .iter()
            .filter(|p| p.status == PaymentStatus::Approved)
            .collect();

        let mut total_quota: u32 = 0;
        for payment in &approved {
            let plan = self.plan(&payment.plan_id).await?;
            total_quota += resolve_quota(plan.as_ref(), payment).unwrap_or(0);
        }

        let consumed = self.db.matches_for_boy(uid).await?.len() as u32;
        let remaining = total_quota.saturating_sub(consumed);

        let now = Utc::now();
        let subs = self.db.subscriptions_for_user(uid).await?;
        let repaired = match pick_active_subscription(&subs) {
            Some(existing) => {
                let mut sub = existing.clone();
                sub.remaining_matches = remaining;
                sub.match_quota = total_quota;
                sub.updated_at = now;
                sub
            }
            None => {
                let plan_id = approved
                    .first()
                    .map(|p| p.plan_id.clone())
                    .ok_or_else(|| {
                        AppError::NotFound(format!(
                            "User {} has no subscription or approved payments to repair",
                            uid
                        ))
                    })?;
                Subscription {
                    subscription_id: format!("{}_{}", uid, now.timestamp_millis()),
                    uid: uid.to_string(),
                    plan_id,
                    status: SubscriptionStatus::Active,
                    remaining_matches: remaining,
                    match_quota: total_quota,
                    rounds_used: 0,
                    rounds_allowed: 1,
                    created_at: now,
                    updated_at: now,
                }
            }
        };
        self.db.upsert_subscription(&repaired).await?;

        tracing::info!(
            uid,
            total_quota,
            consumed,
            remaining,
            "Subscription repaired from ledgers"
        );
        Ok(repaired)
    }
}

/// A proof URL must point under the paying user's payments prefix, either
/// as a bare storage path or embedded in a download URL (where `/` may be
/// percent-encoded).
fn proof_url_is_valid(uid: &str, url: &str) -> bool {
    let prefix = format!("payments/{}/", uid);
    let encoded = format!("payments%2F{}%2F", uid);
    url.starts_with(&prefix) || url.contains(&format!("/{}", prefix)) || url.contains(&encoded)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_proof_url_bare_path() {
        assert!(proof_url_is_valid("u1", "payments/u1/1700000000_proof.jpg"));
        assert!(!proof_url_is_valid("u1", "payments/u2/1700000000_proof.jpg"));
    }

    #[test]
    fn test_proof_url_download_url() {
        assert!(proof_url_is_valid(
            "u1",
            "https://firebasestorage.googleapis.com/v0/b/dateu/o/payments%2Fu1%2F1_p.jpg?alt=media"
        ));
        assert!(proof_url_is_valid(
            "u1",
            "https://storage.example.com/dateu/payments/u1/1_p.jpg"
        ));
        assert!(!proof_url_is_valid(
            "u1",
            "https://storage.example.com/dateu/users/u1/profile.jpg"
        ));
    }
}
