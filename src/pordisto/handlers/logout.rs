use axum::{
    extract::Extension,
    http::{header::SET_COOKIE, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tracing::instrument;

use super::{clear_session_cookie, extract_session_token, hash_session_token};
use crate::pordisto::{session::unix_now, state::AuthState};

#[utoipa::path(
    post,
    path = "/v1/auth/logout",
    responses(
        (status = 204, description = "Session cleared")
    ),
    tag = "auth"
)]
#[instrument(skip_all)]
pub async fn logout(state: Extension<Arc<AuthState>>, headers: HeaderMap) -> Response {
    if let Some(token) = extract_session_token(&headers) {
        let token_hash = hash_session_token(state.secret(), &token);
        // The subject's other tabs hear about the logout before the revoke
        // lands; the broadcast never blocks or fails this call. A token
        // that resolves to no live session publishes nothing.
        if let Some(session) = state.sessions().peek(&token_hash, unix_now()).await {
            state.logout().publish(session.subject);
        }
        state.sessions().revoke(&token_hash).await;
    }

    // Always clear the cookie, even if the session record was missing.
    let mut response_headers = HeaderMap::new();
    if let Ok(cookie) = clear_session_cookie(state.config()) {
        response_headers.insert(SET_COOKIE, cookie);
    }
    (StatusCode::NO_CONTENT, response_headers).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pordisto::broadcast::LogoutEvent;
    use crate::pordisto::rate_limit::NoopRateLimiter;
    use crate::pordisto::state::AuthConfig;
    use axum::http::HeaderValue;
    use secrecy::SecretString;
    use tokio_stream::StreamExt;
    use uuid::Uuid;

    fn test_state() -> Arc<AuthState> {
        Arc::new(AuthState::new(
            AuthConfig::new("https://app.tld".to_string()),
            SecretString::from("sw0rdf1sh"),
            Arc::new(NoopRateLimiter),
        ))
    }

    fn cookie_headers(token: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            axum::http::header::COOKIE,
            HeaderValue::from_str(&format!("pordisto_session={token}")).unwrap(),
        );
        headers
    }

    #[tokio::test]
    async fn logout_revokes_and_clears_the_cookie() {
        let state = test_state();
        let token = "tab-one-token";
        let token_hash = hash_session_token(state.secret(), token);
        state
            .sessions()
            .insert(
                token_hash.clone(),
                Uuid::new_v4(),
                "a@example.com".into(),
                false,
                unix_now(),
            )
            .await;

        let response = logout(Extension(state.clone()), cookie_headers(token)).await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        let set_cookie = response.headers().get(SET_COOKIE).unwrap();
        assert!(set_cookie.to_str().unwrap().contains("Max-Age=0"));

        assert!(state.sessions().peek(&token_hash, unix_now()).await.is_none());
    }

    #[tokio::test]
    async fn logout_is_idempotent() {
        let state = test_state();
        let headers = cookie_headers("never-minted");

        let first = logout(Extension(state.clone()), headers.clone()).await;
        let second = logout(Extension(state.clone()), headers).await;
        assert_eq!(first.status(), StatusCode::NO_CONTENT);
        assert_eq!(second.status(), StatusCode::NO_CONTENT);

        // No body either time.
        let absent = logout(Extension(state), HeaderMap::new()).await;
        assert_eq!(absent.status(), StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn logout_notifies_every_other_tab_of_the_subject() {
        let state = test_state();
        let subject = Uuid::new_v4();
        let stranger = Uuid::new_v4();
        let token = "tab-one-token";
        let token_hash = hash_session_token(state.secret(), token);
        state
            .sessions()
            .insert(
                token_hash.clone(),
                subject,
                "a@example.com".into(),
                false,
                unix_now(),
            )
            .await;

        // Two other open tabs of the same subject, plus one tab belonging
        // to somebody else.
        let mut tab_b = state.logout().subscribe(subject);
        let mut tab_c = state.logout().subscribe(subject);
        let mut foreign_tab = state.logout().subscribe(stranger);

        let response = logout(Extension(state.clone()), cookie_headers(token)).await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        // Both of the subject's tabs observe the event without polling
        // their own session.
        assert_eq!(tab_b.next().await, Some(LogoutEvent { subject }));
        assert_eq!(tab_c.next().await, Some(LogoutEvent { subject }));

        // The stranger's tab saw nothing from this logout; the first event
        // it ever observes is one published for its own subject.
        state.logout().publish(stranger);
        assert_eq!(
            foreign_tab.next().await,
            Some(LogoutEvent { subject: stranger })
        );

        // And no session state is readable by any tab afterwards.
        assert!(state.sessions().peek(&token_hash, unix_now()).await.is_none());
        assert_eq!(state.sessions().len().await, 0);
    }

    #[tokio::test]
    async fn anonymous_logout_publishes_nothing() {
        let state = test_state();
        let subject = Uuid::new_v4();
        let mut tab = state.logout().subscribe(subject);

        let response = logout(Extension(state.clone()), HeaderMap::new()).await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        // The only event the tab ever observes is the one published after
        // the anonymous logout completed.
        state.logout().publish(subject);
        assert_eq!(tab.next().await, Some(LogoutEvent { subject }));
    }
}
