//! Edge route guarding.
//!
//! Classifies every request before any protected response is produced. The
//! decision consumes only "is a valid session credential present"; it never
//! re-verifies credentials.

use axum::{
    extract::{Extension, Request},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use std::sync::Arc;

use super::{
    handlers::{extract_session_token, hash_session_token},
    session::unix_now,
    state::AuthState,
};

/// Prefixes that require an authenticated session.
pub const PROTECTED_PREFIXES: &[&str] = &["/dashboard"];
/// Prefixes that only make sense without one.
pub const AUTH_ONLY_PREFIXES: &[&str] = &["/login", "/register"];
/// Where authenticated users land.
pub const APP_HOME: &str = "/dashboard";

const LOGIN_PATH: &str = "/login";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RouteDecision {
    Allow,
    /// Carries the originally requested path so the post-login flow can
    /// return the user there.
    RedirectToLogin(String),
    RedirectToApp,
}

/// Pure decision function; the prefix sets are disjoint by construction.
#[must_use]
pub fn decide(path: &str, has_valid_session: bool) -> RouteDecision {
    if PROTECTED_PREFIXES.iter().any(|p| path.starts_with(p)) && !has_valid_session {
        return RouteDecision::RedirectToLogin(path.to_string());
    }
    if AUTH_ONLY_PREFIXES.iter().any(|p| path.starts_with(p)) && has_valid_session {
        return RouteDecision::RedirectToApp;
    }
    RouteDecision::Allow
}

/// Build the login redirect target, preserving the original path.
#[must_use]
pub fn login_redirect(original_path: &str) -> String {
    let encoded: String = url::form_urlencoded::byte_serialize(original_path.as_bytes()).collect();
    format!("{LOGIN_PATH}?redirect={encoded}")
}

/// Request middleware wrapping the pure decision. The session check is a
/// single keyed lookup; no I/O beyond that.
pub async fn route_guard(
    state: Extension<Arc<AuthState>>,
    request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();
    let has_valid_session = match extract_session_token(request.headers()) {
        Some(token) => {
            let token_hash = hash_session_token(state.secret(), &token);
            state.sessions().peek(&token_hash, unix_now()).await.is_some()
        }
        None => false,
    };

    match decide(&path, has_valid_session) {
        RouteDecision::Allow => next.run(request).await,
        RouteDecision::RedirectToLogin(original) => {
            Redirect::to(&login_redirect(&original)).into_response()
        }
        RouteDecision::RedirectToApp => Redirect::to(APP_HOME).into_response(),
    }
}
