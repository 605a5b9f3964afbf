// SPDX-License-Identifier: MIT
// Copyright 2026 DateU

//! Admin gate middleware.
//!
//! Runs after `require_auth` and checks `is_admin` on the caller's user
//! document. The flag lives in Firestore rather than the token so that
//! revoking admin takes effect immediately, not at token expiry.

use crate::error::AppError;
use crate::middleware::auth::AuthUser;
use crate::AppState;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

/// Middleware that requires the authenticated caller to be an admin.
pub async fn require_admin(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let auth_user = request
        .extensions()
        .get::<AuthUser>()
        .cloned()
        .ok_or(AppError::Unauthorized)?;

    let user = state
        .db
        .get_user(&auth_user.uid)
        .await?
        .ok_or_else(|| AppError::Forbidden("admin access required".to_string()))?;

    if !user.is_admin {
        tracing::warn!(uid = %auth_user.uid, "Non-admin attempted admin route");
        return Err(AppError::Forbidden("admin access required".to_string()));
    }

    Ok(next.run(request).await)
}
