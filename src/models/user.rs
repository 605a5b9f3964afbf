// SPDX-License-Identifier: MIT
// Copyright 2026 DateU

//! User model for storage and API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Self-declared gender; drives which side of a round a user is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub enum Gender {
    Male,
    Female,
}

/// Onboarding progress flags.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SetupStatus {
    #[serde(default)]
    pub profile: bool,
    #[serde(default)]
    pub photos: bool,
    #[serde(default)]
    pub verification: bool,
}

/// User profile stored in Firestore, keyed by auth uid.
///
/// Created on the first authenticated profile write; never hard-deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Auth provider uid (also used as document ID)
    pub uid: String,
    /// Immutable once set; `None` until onboarding declares it
    pub gender: Option<Gender>,
    pub display_name: Option<String>,
    pub college: Option<String>,
    /// Profile picture URL (client uploads to blob storage)
    pub photo_url: Option<String>,
    #[serde(default)]
    pub is_profile_complete: bool,
    #[serde(default)]
    pub setup_status: SetupStatus,
    /// Assigned referral code, if the user requested one
    pub referral_code: Option<String>,
    /// Lifetime referral earnings credited, in rupees
    #[serde(default)]
    pub referral_earnings_paid: u32,
    /// FCM device token for push delivery
    pub fcm_token: Option<String>,
    #[serde(default)]
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
    pub last_active: DateTime<Utc>,
}

impl User {
    /// A fresh profile skeleton for a first-time authenticated write.
    pub fn new(uid: &str, now: DateTime<Utc>) -> Self {
        Self {
            uid: uid.to_string(),
            gender: None,
            display_name: None,
            college: None,
            photo_url: None,
            is_profile_complete: false,
            setup_status: SetupStatus::default(),
            referral_code: None,
            referral_earnings_paid: 0,
            fcm_token: None,
            is_admin: false,
            created_at: now,
            last_active: now,
        }
    }
}
