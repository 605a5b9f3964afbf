// SPDX-License-Identifier: MIT
// Copyright 2026 DateU

//! Payment, subscription, and plan models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Approved,
    Rejected,
    Failed,
}

impl PaymentStatus {
    /// Lowercase form used in Firestore equality filters.
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Approved => "approved",
            PaymentStatus::Rejected => "rejected",
            PaymentStatus::Failed => "failed",
        }
    }
}

/// A UPI payment submitted with an optional proof screenshot URL.
/// Document ID: `{uid}_{millis}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    pub payment_id: String,
    pub uid: String,
    pub plan_id: String,
    /// Amount paid, in rupees
    pub amount: u32,
    pub status: PaymentStatus,
    pub proof_url: Option<String>,
    /// Legacy quota fallbacks: older clients stamped the quota onto the
    /// payment itself. Consulted only when the plan carries no quota.
    pub match_quota: Option<u32>,
    pub quota: Option<u32>,
    pub created_at: DateTime<Utc>,
    pub reviewed_by: Option<String>,
    pub reviewed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionStatus {
    Active,
    Expired,
}

impl SubscriptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::Expired => "expired",
        }
    }
}

/// A male user's quota-bearing subscription.
/// Document ID: `{uid}_{millis}`.
///
/// `remaining_matches` never goes negative: it is decremented exactly once
/// per confirmed match (inside the match transaction) and incremented by the
/// resolved plan quota on each approved payment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subscription {
    pub subscription_id: String,
    pub uid: String,
    pub plan_id: String,
    pub status: SubscriptionStatus,
    pub remaining_matches: u32,
    pub match_quota: u32,
    #[serde(default)]
    pub rounds_used: u32,
    #[serde(default)]
    pub rounds_allowed: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A purchasable plan. Keyed by plan id; read-through cached in-process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    pub plan_id: String,
    pub name: String,
    /// Price in rupees
    pub price: u32,
    pub match_quota: Option<u32>,
    /// Legacy alias for `match_quota`
    pub quota: Option<u32>,
    pub rounds_allowed: Option<u32>,
}

/// Pick the subscription a user's quota-bearing operations act on.
///
/// Preference order: first active subscription with remaining quota, else
/// first active subscription regardless of quota, else none. "First" means
/// earliest `created_at`; the slice is sorted here so callers may pass
/// query results in any order.
pub fn pick_active_subscription(subs: &[Subscription]) -> Option<&Subscription> {
    let mut active: Vec<&Subscription> = subs
        .iter()
        .filter(|s| s.status == SubscriptionStatus::Active)
        .collect();
    active.sort_by_key(|s| s.created_at);

    active
        .iter()
        .find(|s| s.remaining_matches > 0)
        .copied()
        .or_else(|| active.first().copied())
}

/// Resolve the quota a payment grants.
///
/// Fallback order: `plan.match_quota`, `plan.quota`, `payment.match_quota`,
/// `payment.quota`. Zero counts as absent.
pub fn resolve_quota(plan: Option<&Plan>, payment: &Payment) -> Option<u32> {
    let candidates = [
        plan.and_then(|p| p.match_quota),
        plan.and_then(|p| p.quota),
        payment.match_quota,
        payment.quota,
    ];
    candidates.into_iter().flatten().find(|&q| q > 0)
}
