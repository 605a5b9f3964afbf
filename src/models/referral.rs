// SPDX-License-Identifier: MIT
// Copyright 2026 DateU

//! Referral code registry, redemption records, and payout claim models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Referral code registry entry. Document ID equals the code.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Referral {
    pub code: String,
    pub owner_uid: String,
    pub created_at: DateTime<Utc>,
}

/// A redemption of a referral code by a new user.
/// Document ID: the referred uid, so each user redeems at most once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferralRecord {
    pub referred_uid: String,
    pub referrer_uid: String,
    pub code: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClaimStatus {
    Pending,
    Approved,
    Rejected,
}

impl ClaimStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClaimStatus::Pending => "pending",
            ClaimStatus::Approved => "approved",
            ClaimStatus::Rejected => "rejected",
        }
    }
}

/// A payout claim against referral earnings.
/// Document ID: `{uid}_{millis}`.
///
/// Approval credits `users.referral_earnings_paid` inside a transaction,
/// bounded by the lifetime cap.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferralClaim {
    pub claim_id: String,
    pub uid: String,
    /// Claimed amount in rupees
    pub amount: u32,
    pub upi_id: String,
    pub status: ClaimStatus,
    pub created_at: DateTime<Utc>,
    pub reviewed_by: Option<String>,
    pub reviewed_at: Option<DateTime<Utc>>,
}
