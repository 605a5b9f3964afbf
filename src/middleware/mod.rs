// SPDX-License-Identifier: MIT
// Copyright 2026 DateU

//! Middleware modules (authentication, admin gate, security headers).

pub mod admin;
pub mod auth;
pub mod security;

pub use admin::require_admin;
pub use auth::require_auth;
