// SPDX-License-Identifier: MIT
// Copyright 2026 DateU

//! Referral ledger: code registry, redemption, and payout claims.

use crate::db::FirestoreDb;
use crate::error::AppError;
use crate::models::{ClaimStatus, Referral, ReferralClaim, ReferralRecord};
use chrono::Utc;
use ring::rand::{SecureRandom, SystemRandom};

/// Lifetime referral earnings cap per user, in rupees.
pub const REFERRAL_EARNINGS_CAP: u32 = 50;

const CODE_LENGTH: usize = 8;
const CODE_CHARSET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
const MAX_CODE_ATTEMPTS: usize = 5;

#[derive(Clone)]
pub struct ReferralService {
    db: FirestoreDb,
    rng: SystemRandom,
}

impl ReferralService {
    pub fn new(db: FirestoreDb) -> Self {
        Self {
            db,
            rng: SystemRandom::new(),
        }
    }

    fn generate_code(&self) -> Result<String, AppError> {
        let mut bytes = [0u8; CODE_LENGTH];
        self.rng
            .fill(&mut bytes)
            .map_err(|_| AppError::Internal(anyhow::anyhow!("System RNG failure")))?;
        Ok(code_from_bytes(&bytes))
    }

    /// Return the user's referral code, generating and registering one if
    /// they have none.
    ///
    /// Collision handling retries up to five times; a final-attempt
    /// collision is accepted with a warning rather than failed, matching
    /// the historical behavior.
    pub async fn assign_referral_code(&self, uid: &str) -> Result<String, AppError> {
        let mut user = self
            .db
            .get_user(uid)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", uid)))?;

        if let Some(code) = user.referral_code {
            return Ok(code);
        }

        let mut code = self.generate_code()?;
        for attempt in 1..=MAX_CODE_ATTEMPTS {
            let collision = self.db.get_referral(&code).await?.is_some();
            if !collision {
                break;
            }
            if attempt == MAX_CODE_ATTEMPTS {
                tracing::warn!(uid, code, "Referral code still colliding on final attempt");
                break;
            }
            code = self.generate_code()?;
        }

        let referral = Referral {
            code: code.clone(),
            owner_uid: uid.to_string(),
            created_at: Utc::now(),
        };
        self.db.upsert_referral(&referral).await?;

        user.referral_code = Some(code.clone());
        self.db.upsert_user(&user).await?;

        tracing::info!(uid, code, "Referral code assigned");
        Ok(code)
    }

    /// Resolve a code to its owner's uid.
    pub async fn validate_referral_code(&self, code: &str) -> Result<String, AppError> {
        self.db
            .get_referral(code)
            .await?
            .map(|r| r.owner_uid)
            .ok_or_else(|| AppError::BadRequest("Invalid referral code".to_string()))
    }

    /// Record a redemption. One per referred user, keyed by their uid.
    pub async fn redeem_referral_code(
        &self,
        code: &str,
        referred_uid: &str,
    ) -> Result<ReferralRecord, AppError> {
        let referrer_uid = self.validate_referral_code(code).await?;
        if referrer_uid == referred_uid {
            return Err(AppError::BadRequest(
                "You cannot redeem your own referral code".to_string(),
            ));
        }

        if self.db.get_referral_record(referred_uid).await?.is_some() {
            return Err(AppError::Conflict(AppError::ALREADY_REDEEMED.to_string()));
        }

        let record = ReferralRecord {
            referred_uid: referred_uid.to_string(),
            referrer_uid,
            code: code.to_string(),
            created_at: Utc::now(),
        };
        self.db.upsert_referral_record(&record).await?;

        tracing::info!(code, referred_uid, "Referral code redeemed");
        Ok(record)
    }

    /// Submit a payout claim against referral earnings.
    ///
    /// The cap is pre-checked here against already-paid earnings; the
    /// authoritative check re-runs inside the approval transaction, which
    /// also resolves any overcommit across pending claims.
    pub async fn submit_claim(
        &self,
        uid: &str,
        amount: u32,
        upi_id: &str,
    ) -> Result<ReferralClaim, AppError> {
        let user = self
            .db
            .get_user(uid)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", uid)))?;

        if user.referral_earnings_paid + amount > REFERRAL_EARNINGS_CAP {
            return Err(AppError::BadRequest(format!(
                "Claim would exceed the ₹{} lifetime referral cap",
                REFERRAL_EARNINGS_CAP
            )));
        }

        let now = Utc::now();
        let claim = ReferralClaim {
            claim_id: format!("{}_{}", uid, now.timestamp_millis()),
            uid: uid.to_string(),
            amount,
            upi_id: upi_id.to_string(),
            status: ClaimStatus::Pending,
            created_at: now,
            reviewed_by: None,
            reviewed_at: None,
        };
        self.db.upsert_claim(&claim).await?;

        tracing::info!(claim_id = %claim.claim_id, uid, amount, "Referral claim submitted");
        Ok(claim)
    }

    /// Approve a claim and credit the user, transactionally and under the
    /// cap. Returns the claim and the user's new earnings total.
    pub async fn approve_claim(
        &self,
        claim_id: &str,
        admin_uid: &str,
    ) -> Result<(ReferralClaim, u32), AppError> {
        self.db
            .approve_claim_txn(claim_id, admin_uid, REFERRAL_EARNINGS_CAP)
            .await
    }

    /// Reject a pending claim.
    pub async fn reject_claim(
        &self,
        claim_id: &str,
        admin_uid: &str,
    ) -> Result<ReferralClaim, AppError> {
        let mut claim = self
            .db
            .get_claim(claim_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Claim {} not found", claim_id)))?;

        if claim.status != ClaimStatus::Pending {
            return Err(AppError::Conflict(
                AppError::CLAIM_ALREADY_REVIEWED.to_string(),
            ));
        }

        claim.status = ClaimStatus::Rejected;
        claim.reviewed_by = Some(admin_uid.to_string());
        claim.reviewed_at = Some(Utc::now());
        self.db.upsert_claim(&claim).await?;

        tracing::info!(claim_id, uid = %claim.uid, "Referral claim rejected");
        Ok(claim)
    }

    /// Claims by status (admin review queue).
    pub async fn claims_by_status(
        &self,
        status: ClaimStatus,
    ) -> Result<Vec<ReferralClaim>, AppError> {
        self.db.claims_by_status(status).await
    }
}

/// Map random bytes onto the code charset (no look-alike characters).
fn code_from_bytes(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| CODE_CHARSET[*b as usize % CODE_CHARSET.len()] as char)
        .collect()
}
