//! In-memory session store and lifecycle rules.
//!
//! A session lives through `NoSession -> Active -> Expired/Revoked`; the
//! terminal states never resurrect, a new login always mints a fresh token.
//! The store keys on the SHA-256 hash of the cookie token, so raw tokens
//! never sit in process memory longer than a request.

use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::Mutex;
use uuid::Uuid;

/// Current unix time in seconds.
#[must_use]
pub fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| elapsed.as_secs() as i64)
}

/// Expiry policy applied when minting and refreshing sessions.
#[derive(Clone, Copy, Debug)]
pub struct ExpiryPolicy {
    /// Short-lived access window, slid forward on authorized reads.
    pub access_ttl: i64,
    /// Hard ceiling after which a session can no longer be renewed.
    pub refresh_horizon: i64,
    /// Horizon used instead when the login asked to be remembered.
    pub remembered_horizon: i64,
}

impl ExpiryPolicy {
    fn horizon(&self, remembered: bool) -> i64 {
        if remembered {
            self.remembered_horizon
        } else {
            self.refresh_horizon
        }
    }
}

/// A minted session as stored server-side.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Session {
    pub subject: Uuid,
    pub email: String,
    pub created_at: i64,
    pub expires_at: i64,
    pub refresh_until: i64,
    pub remembered: bool,
}

impl Session {
    /// Valid iff the access window is still open; revoked records are gone
    /// from the store entirely.
    #[must_use]
    pub fn is_valid(&self, now: i64) -> bool {
        now < self.expires_at && now < self.refresh_until
    }
}

pub struct SessionStore {
    policy: ExpiryPolicy,
    sessions: Mutex<HashMap<Vec<u8>, Session>>,
}

impl SessionStore {
    #[must_use]
    pub fn new(policy: ExpiryPolicy) -> Self {
        Self {
            policy,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Mint a new Active session. The whole record is written under one
    /// lock acquisition, so concurrent readers never observe a partial one.
    pub async fn insert(
        &self,
        token_hash: Vec<u8>,
        subject: Uuid,
        email: String,
        remembered: bool,
        now: i64,
    ) -> Session {
        let refresh_until = now + self.policy.horizon(remembered);
        let session = Session {
            subject,
            email,
            created_at: now,
            expires_at: (now + self.policy.access_ttl).min(refresh_until),
            refresh_until,
            remembered,
        };
        let mut sessions = self.sessions.lock().await;
        sessions.insert(token_hash, session.clone());
        session
    }

    /// Look up a live session and silently slide its access window forward,
    /// capped at the refresh horizon. Dead records are removed on the spot.
    pub async fn authorize(&self, token_hash: &[u8], now: i64) -> Option<Session> {
        let mut sessions = self.sessions.lock().await;
        let Some(session) = sessions.get_mut(token_hash) else {
            return None;
        };
        if !session.is_valid(now) {
            sessions.remove(token_hash);
            return None;
        }
        session.expires_at = (now + self.policy.access_ttl).min(session.refresh_until);
        Some(session.clone())
    }

    /// Presence/validity lookup without renewing the access window. The
    /// route guard and the logout fan-out use this; it must stay a cheap
    /// keyed read.
    pub async fn peek(&self, token_hash: &[u8], now: i64) -> Option<Session> {
        let sessions = self.sessions.lock().await;
        sessions
            .get(token_hash)
            .filter(|session| session.is_valid(now))
            .cloned()
    }

    /// Revoke a session. Idempotent: revoking an absent token is a no-op.
    pub async fn revoke(&self, token_hash: &[u8]) {
        let mut sessions = self.sessions.lock().await;
        sessions.remove(token_hash);
    }

    /// Drop every record whose access window or refresh horizon has passed.
    pub async fn sweep(&self, now: i64) {
        let mut sessions = self.sessions.lock().await;
        sessions.retain(|_, session| session.is_valid(now));
    }

    #[cfg(test)]
    pub(crate) async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }
}
