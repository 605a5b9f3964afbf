// SPDX-License-Identifier: MIT
// Copyright 2026 DateU

//! Push delivery via FCM HTTP v1.
//!
//! Every notification is written to Firestore first (the durable part),
//! then pushed best-effort to the recipient's device token. Send failures
//! are logged and discarded, never retried, never surfaced to the caller.

use crate::db::FirestoreDb;
use crate::error::AppError;
use crate::models::Notification;
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::Mutex;

const METADATA_TOKEN_URL: &str =
    "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token";

/// Refresh the cached access token this long before it actually expires.
const TOKEN_REFRESH_SLACK_SECS: i64 = 60;

#[derive(Clone)]
struct CachedToken {
    token: String,
    expires_at: DateTime<Utc>,
}

/// FCM push delivery service.
#[derive(Clone)]
pub struct PushService {
    db: FirestoreDb,
    http: reqwest::Client,
    project_id: String,
    enabled: bool,
    token: Arc<Mutex<Option<CachedToken>>>,
}

#[derive(Deserialize)]
struct MetadataTokenResponse {
    access_token: String,
    expires_in: i64,
}

impl PushService {
    pub fn new(project_id: &str, enabled: bool, db: FirestoreDb) -> Self {
        Self {
            db,
            http: reqwest::Client::new(),
            project_id: project_id.to_string(),
            enabled,
            token: Arc::new(Mutex::new(None)),
        }
    }

    /// A disabled service for tests and offline runs: notifications are
    /// still written, pushes are skipped.
    pub fn new_mock(db: FirestoreDb) -> Self {
        Self::new("test-project", false, db)
    }

    /// Write a durable notification document, then push best-effort.
    pub async fn notify_user(&self, uid: &str, title: &str, body: &str) -> Result<(), AppError> {
        let now = Utc::now();
        let doc_id = crate::db::timeline_doc_id(uid, now);

        let notification = Notification {
            uid: uid.to_string(),
            title: title.to_string(),
            body: body.to_string(),
            created_at: now,
            read: false,
        };
        self.db.create_notification(&doc_id, &notification).await?;

        if !self.enabled {
            return Ok(());
        }

        // Everything past the durable write is best-effort.
        let fcm_token = match self.db.get_user(uid).await {
            Ok(Some(user)) => user.fcm_token,
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(uid, error = %e, "Failed to resolve user for push");
                None
            }
        };

        if let Some(fcm_token) = fcm_token {
            if let Err(e) = self.send_fcm(&fcm_token, title, body).await {
                tracing::warn!(uid, error = %e, "Push delivery failed");
            }
        }

        Ok(())
    }

    /// Send a single FCM HTTP v1 message.
    async fn send_fcm(&self, fcm_token: &str, title: &str, body: &str) -> anyhow::Result<()> {
        let access_token = self.access_token().await?;
        let url = format!(
            "https://fcm.googleapis.com/v1/projects/{}/messages:send",
            self.project_id
        );

        let message = serde_json::json!({
            "message": {
                "token": fcm_token,
                "notification": {
                    "title": title,
                    "body": body,
                }
            }
        });

        let response = self
            .http
            .post(&url)
            .bearer_auth(access_token)
            .json(&message)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            anyhow::bail!("FCM send failed with {}: {}", status, text);
        }

        Ok(())
    }

    /// Fetch (or reuse) a service-account access token from the metadata
    /// server. Cached with early refresh.
    async fn access_token(&self) -> anyhow::Result<String> {
        let mut cached = self.token.lock().await;

        if let Some(token) = cached.as_ref() {
            if token.expires_at - Duration::seconds(TOKEN_REFRESH_SLACK_SECS) > Utc::now() {
                return Ok(token.token.clone());
            }
        }

        let response: MetadataTokenResponse = self
            .http
            .get(METADATA_TOKEN_URL)
            .header("Metadata-Flavor", "Google")
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let token = CachedToken {
            token: response.access_token,
            expires_at: Utc::now() + Duration::seconds(response.expires_in),
        };
        let value = token.token.clone();
        *cached = Some(token);

        Ok(value)
    }
}
