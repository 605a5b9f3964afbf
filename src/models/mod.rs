// SPDX-License-Identifier: MIT
// Copyright 2026 DateU

//! Data models for the application.

pub mod matching;
pub mod notification;
pub mod payment;
pub mod referral;
pub mod round;
pub mod user;

pub use matching::{Like, Match, MatchStatus};
pub use notification::{ChatMessage, Notification};
pub use payment::{Payment, PaymentStatus, Plan, Subscription, SubscriptionStatus};
pub use referral::{ClaimStatus, Referral, ReferralClaim, ReferralRecord};
pub use round::{ActiveRoundPointer, Assignment, MatchingRound, PhaseWindow, RoundPhases};
pub use user::{Gender, SetupStatus, User};
