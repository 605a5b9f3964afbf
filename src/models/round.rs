// SPDX-License-Identifier: MIT
// Copyright 2026 DateU

//! Matching round, active-round pointer, and curated assignment models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// A time window during which one side of a round may act.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct PhaseWindow {
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
}

impl PhaseWindow {
    /// Whether the window is currently open (inclusive start, exclusive end).
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.starts_at <= at && at < self.ends_at
    }

    pub fn is_well_formed(&self) -> bool {
        self.starts_at < self.ends_at
    }
}

/// Per-side phase windows. A side with no window is closed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct RoundPhases {
    pub boys: Option<PhaseWindow>,
    pub girls: Option<PhaseWindow>,
}

/// A matching cohort. Keyed by caller-chosen round id (e.g. `2026-W09`).
///
/// There is deliberately no `is_active` flag here: which round is active is
/// held by the single [`ActiveRoundPointer`] document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchingRound {
    pub round_id: String,
    #[serde(default)]
    pub participating_males: Vec<String>,
    #[serde(default)]
    pub phases: RoundPhases,
    pub created_at: DateTime<Utc>,
}

impl MatchingRound {
    pub fn new(round_id: &str, now: DateTime<Utc>) -> Self {
        Self {
            round_id: round_id.to_string(),
            participating_males: Vec::new(),
            phases: RoundPhases::default(),
            created_at: now,
        }
    }
}

/// The single document (id `active_round` in the `registry` collection)
/// that says which round, if any, is currently active.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActiveRoundPointer {
    pub round_id: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// Curated list of male candidate uids for one girl in one round.
/// Document ID: `{round_id}_{girl_uid}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Assignment {
    pub round_id: String,
    pub girl_uid: String,
    #[serde(default)]
    pub male_candidates: Vec<String>,
    pub updated_at: DateTime<Utc>,
}

impl Assignment {
    pub fn doc_id(round_id: &str, girl_uid: &str) -> String {
        format!("{}_{}", round_id, girl_uid)
    }
}
