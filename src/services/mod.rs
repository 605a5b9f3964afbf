// SPDX-License-Identifier: MIT
// Copyright 2026 DateU

//! Services module - business logic layer.

pub mod entitlement;
pub mod matching;
pub mod payments;
pub mod push;
pub mod referrals;
pub mod rounds;

pub use entitlement::{Entitlement, EntitlementService};
pub use matching::{ConfirmOrigin, LikeOutcome, MatchService};
pub use payments::PaymentService;
pub use push::PushService;
pub use referrals::{ReferralService, REFERRAL_EARNINGS_CAP};
pub use rounds::RoundService;
