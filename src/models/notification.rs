// SPDX-License-Identifier: MIT
// Copyright 2026 DateU

//! Notification and chat message models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Durable in-app notification, written before any push attempt.
/// Document ID: `{uid}_{millis}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub uid: String,
    pub title: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub read: bool,
}

/// A chat message between two matched users.
/// Document ID: `{match_id}_{millis}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub match_id: String,
    pub sender_uid: String,
    pub text: String,
    pub sent_at: DateTime<Utc>,
}
