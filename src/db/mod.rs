// SPDX-License-Identifier: MIT
// Copyright 2026 DateU

//! Database layer (Firestore).

pub mod firestore;

pub use firestore::FirestoreDb;

/// Collection names as constants.
pub mod collections {
    pub const USERS: &str = "users";
    pub const ROUNDS: &str = "rounds";
    /// Singleton pointer documents (currently only `active_round`)
    pub const REGISTRY: &str = "registry";
    pub const ASSIGNMENTS: &str = "assignments";
    pub const LIKES: &str = "likes";
    pub const MATCHES: &str = "matches";
    pub const PAYMENTS: &str = "payments";
    pub const SUBSCRIPTIONS: &str = "subscriptions";
    pub const PLANS: &str = "plans";
    pub const REFERRALS: &str = "referrals";
    pub const REFERRAL_RECORDS: &str = "referral_records";
    pub const REFERRAL_CLAIMS: &str = "referral_claims";
    pub const NOTIFICATIONS: &str = "notifications";
    pub const CHAT_MESSAGES: &str = "chat_messages";
}

/// Document ID of the active-round pointer within [`collections::REGISTRY`].
pub const ACTIVE_ROUND_DOC: &str = "active_round";

/// Document id for append-only timeline collections:
/// `{key}_{millis}_{suffix}`.
///
/// The random suffix keeps two writes landing in the same millisecond from
/// colliding on one document. Readers order by a timestamp field on the
/// document, never by the id.
pub fn timeline_doc_id(key: &str, at: chrono::DateTime<chrono::Utc>) -> String {
    use ring::rand::{SecureRandom, SystemRandom};

    let mut bytes = [0u8; 4];
    // An RNG failure degrades to a zero suffix; the write still proceeds.
    let _ = SystemRandom::new().fill(&mut bytes);
    format!(
        "{}_{}_{:08x}",
        key,
        at.timestamp_millis(),
        u32::from_be_bytes(bytes)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeline_doc_id_unique_within_a_millisecond() {
        let at = chrono::Utc::now();
        let first = timeline_doc_id("m1", at);
        let second = timeline_doc_id("m1", at);

        let prefix = format!("m1_{}_", at.timestamp_millis());
        assert!(first.starts_with(&prefix));
        assert!(second.starts_with(&prefix));
        assert_ne!(first, second);
    }
}
