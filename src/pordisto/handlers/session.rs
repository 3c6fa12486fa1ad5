use axum::{
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;
use tracing::instrument;

use super::{extract_session_token, hash_session_token, types::SessionResponse};
use crate::pordisto::{session::unix_now, state::AuthState};

#[utoipa::path(
    get,
    path = "/v1/auth/session",
    responses(
        (status = 200, description = "Session is active", body = SessionResponse),
        (status = 204, description = "No active session")
    ),
    tag = "auth"
)]
#[instrument(skip_all)]
pub async fn session(state: Extension<Arc<AuthState>>, headers: HeaderMap) -> Response {
    // Missing cookies are treated as "no session", never an error.
    let Some(token) = extract_session_token(&headers) else {
        return StatusCode::NO_CONTENT.into_response();
    };
    let token_hash = hash_session_token(state.secret(), &token);
    // Authorized reads silently renew the access window up to the horizon.
    match state.sessions().authorize(&token_hash, unix_now()).await {
        Some(record) => {
            let response = SessionResponse {
                user_id: record.subject.to_string(),
                email: record.email,
                expires_at: record.expires_at,
                remembered: record.remembered,
            };
            (StatusCode::OK, Json(response)).into_response()
        }
        None => StatusCode::NO_CONTENT.into_response(),
    }
}
