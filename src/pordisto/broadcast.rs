//! Logout fan-out to every open tab of a client.
//!
//! The originating tab's logout publishes here before the session revoke
//! completes; the other tabs of the same subject hold an SSE subscription
//! and navigate to the login view on receipt instead of waiting for their
//! own session check to fail. Events are scoped by subject, so one client's
//! logout never reaches another client's tabs.

use axum::{
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::sse::{Event, KeepAlive, Sse},
};
use std::convert::Infallible;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio_stream::{wrappers::BroadcastStream, Stream, StreamExt};
use uuid::Uuid;

use super::{
    handlers::{extract_session_token, hash_session_token},
    session::unix_now,
    state::AuthState,
};

const CHANNEL_CAPACITY: usize = 16;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LogoutEvent {
    pub subject: Uuid,
}

#[derive(Clone, Debug)]
pub struct LogoutBroadcast {
    tx: broadcast::Sender<LogoutEvent>,
}

impl LogoutBroadcast {
    #[must_use]
    pub fn new() -> Self {
        let (tx, _rx) = broadcast::channel(CHANNEL_CAPACITY);
        Self { tx }
    }

    /// Fire-and-forget: publishing with no subscribers is not an error and
    /// this never blocks the logout call.
    pub fn publish(&self, subject: Uuid) {
        let _ = self.tx.send(LogoutEvent { subject });
    }

    /// Subscribe to logout events for one subject. Events published for
    /// other subjects never surface on the returned stream.
    pub fn subscribe(&self, subject: Uuid) -> impl Stream<Item = LogoutEvent> + Unpin {
        BroadcastStream::new(self.tx.subscribe())
            // A lagged receiver only drops duplicate logout signals.
            .filter_map(move |message| message.ok().filter(|event| event.subject == subject))
    }
}

impl Default for LogoutBroadcast {
    fn default() -> Self {
        Self::new()
    }
}

/// SSE endpoint a tab subscribes to for logout notifications of its own
/// subject. Requires a live session; the stream only carries events for
/// that session's subject.
#[utoipa::path(
    get,
    path = "/v1/auth/events",
    responses(
        (status = 200, description = "Event stream of logout notifications for the caller's subject", content_type = "text/event-stream"),
        (status = 401, description = "No live session")
    ),
    tag = "auth"
)]
pub async fn events(
    state: Extension<Arc<AuthState>>,
    headers: HeaderMap,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, StatusCode> {
    let Some(token) = extract_session_token(&headers) else {
        return Err(StatusCode::UNAUTHORIZED);
    };
    let token_hash = hash_session_token(state.secret(), &token);
    let Some(session) = state.sessions().peek(&token_hash, unix_now()).await else {
        return Err(StatusCode::UNAUTHORIZED);
    };

    let stream = state
        .logout()
        .subscribe(session.subject)
        .map(|_| Ok(Event::default().event("logout").data("logout")));

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pordisto::rate_limit::NoopRateLimiter;
    use crate::pordisto::state::AuthConfig;
    use axum::http::{header::COOKIE, HeaderValue};
    use secrecy::SecretString;

    #[tokio::test]
    async fn every_tab_of_the_subject_observes_one_event() {
        let bus = LogoutBroadcast::new();
        let subject = Uuid::new_v4();
        let mut tab_a = bus.subscribe(subject);
        let mut tab_b = bus.subscribe(subject);

        bus.publish(subject);

        assert_eq!(tab_a.next().await, Some(LogoutEvent { subject }));
        assert_eq!(tab_b.next().await, Some(LogoutEvent { subject }));
    }

    #[tokio::test]
    async fn subscriptions_never_see_other_subjects_logouts() {
        let bus = LogoutBroadcast::new();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        let mut alice_tab = bus.subscribe(alice);
        let mut bob_tab = bus.subscribe(bob);

        bus.publish(alice);
        bus.publish(bob);

        // Bob's first observed event is his own; Alice's logout was
        // filtered out of his stream.
        assert_eq!(bob_tab.next().await, Some(LogoutEvent { subject: bob }));
        assert_eq!(alice_tab.next().await, Some(LogoutEvent { subject: alice }));
    }

    #[tokio::test]
    async fn publish_without_subscribers_is_a_noop() {
        let bus = LogoutBroadcast::new();
        let subject = Uuid::new_v4();
        bus.publish(subject);

        // Late subscribers see nothing from earlier events.
        let mut tab = bus.subscribe(subject);
        bus.publish(subject);
        assert_eq!(tab.next().await, Some(LogoutEvent { subject }));
    }

    fn test_state() -> Arc<AuthState> {
        Arc::new(AuthState::new(
            AuthConfig::new("https://app.tld".to_string()),
            SecretString::from("sw0rdf1sh"),
            Arc::new(NoopRateLimiter),
        ))
    }

    #[tokio::test]
    async fn events_requires_a_live_session() {
        let state = test_state();
        assert!(events(Extension(state.clone()), HeaderMap::new())
            .await
            .is_err());

        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("pordisto_session=forged"));
        assert!(events(Extension(state), headers).await.is_err());
    }

    #[tokio::test]
    async fn events_accepts_an_authenticated_tab() {
        let state = test_state();
        let token = "tab-one-token";
        let token_hash = hash_session_token(state.secret(), token);
        state
            .sessions()
            .insert(
                token_hash,
                Uuid::new_v4(),
                "a@example.com".into(),
                false,
                unix_now(),
            )
            .await;

        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_str(&format!("pordisto_session={token}")).unwrap(),
        );
        assert!(events(Extension(state), headers).await.is_ok());
    }
}
