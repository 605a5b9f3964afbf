// SPDX-License-Identifier: MIT
// Copyright 2026 DateU

//! DateU backend API.
//!
//! This crate serves the round/assignment/entitlement/match lifecycle of
//! the DateU matchmaking product as an authenticated HTTP API over
//! Firestore: payment approval grants quota, rounds gate participation,
//! likes and confirmed matches are idempotent ledgers, and every
//! invariant-bearing transition is enforced here rather than in clients.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;

use config::Config;
use db::FirestoreDb;
use services::{
    EntitlementService, MatchService, PaymentService, PushService, ReferralService, RoundService,
};

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub db: FirestoreDb,
    pub rounds: RoundService,
    pub entitlement: EntitlementService,
    pub matching: MatchService,
    pub payments: PaymentService,
    pub referrals: ReferralService,
    pub push: PushService,
}

impl AppState {
    /// Wire up the service graph over one database handle.
    pub fn new(config: Config, db: FirestoreDb, push: PushService) -> Self {
        let rounds = RoundService::new(db.clone());
        let entitlement = EntitlementService::new(db.clone(), rounds.clone());
        let matching = MatchService::new(db.clone(), rounds.clone(), push.clone());
        let payments = PaymentService::new(db.clone(), rounds.clone());
        let referrals = ReferralService::new(db.clone());

        Self {
            config,
            db,
            rounds,
            entitlement,
            matching,
            payments,
            referrals,
            push,
        }
    }
}
