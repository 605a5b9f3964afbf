// SPDX-License-Identifier: MIT
// Copyright 2026 DateU

//! Like and Match ledger models.
//!
//! Both ledgers key their documents by composite IDs so that one logical
//! action maps to exactly one document: re-creating is a no-op, not a
//! duplicate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A girl's like of a male candidate within a round.
/// Document ID: `{round_id}_{liking_uid}_{liked_uid}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Like {
    pub round_id: String,
    pub liking_user_uid: String,
    pub liked_user_uid: String,
    pub created_at: DateTime<Utc>,
}

impl Like {
    pub fn doc_id(round_id: &str, liking_uid: &str, liked_uid: &str) -> String {
        format!("{}_{}_{}", round_id, liking_uid, liked_uid)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchStatus {
    Confirmed,
}

/// A mutually confirmed match. Permanent once created; identity reveal and
/// chat gate on its existence.
/// Document ID: `{round_id}_{boy_uid}_{girl_uid}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Match {
    pub round_id: String,
    /// `[boy_uid, girl_uid]`, kept alongside the individual fields so both
    /// sides can query their matches with a single equality filter.
    pub participants: Vec<String>,
    pub boy_uid: String,
    pub girl_uid: String,
    pub status: MatchStatus,
    pub created_at: DateTime<Utc>,
}

impl Match {
    pub fn doc_id(round_id: &str, boy_uid: &str, girl_uid: &str) -> String {
        format!("{}_{}_{}", round_id, boy_uid, girl_uid)
    }

    pub fn new(round_id: &str, boy_uid: &str, girl_uid: &str, now: DateTime<Utc>) -> Self {
        Self {
            round_id: round_id.to_string(),
            participants: vec![boy_uid.to_string(), girl_uid.to_string()],
            boy_uid: boy_uid.to_string(),
            girl_uid: girl_uid.to_string(),
            status: MatchStatus::Confirmed,
            created_at: now,
        }
    }

    pub fn is_participant(&self, uid: &str) -> bool {
        self.boy_uid == uid || self.girl_uid == uid
    }
}
