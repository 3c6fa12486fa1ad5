//! Shared auth state and expiry policy configuration.

use secrecy::SecretString;
use std::sync::Arc;

use super::{
    broadcast::LogoutBroadcast,
    rate_limit::RateLimiter,
    session::{ExpiryPolicy, SessionStore},
};

const DEFAULT_ACCESS_TTL_SECONDS: i64 = 15 * 60;
const DEFAULT_REFRESH_HORIZON_SECONDS: i64 = 7 * 24 * 60 * 60;
const DEFAULT_REMEMBERED_HORIZON_SECONDS: i64 = 30 * 24 * 60 * 60;

#[derive(Clone, Debug)]
pub struct AuthConfig {
    base_url: String,
    access_ttl_seconds: i64,
    refresh_horizon_seconds: i64,
    remembered_horizon_seconds: i64,
}

impl AuthConfig {
    #[must_use]
    pub fn new(base_url: String) -> Self {
        Self {
            base_url,
            access_ttl_seconds: DEFAULT_ACCESS_TTL_SECONDS,
            refresh_horizon_seconds: DEFAULT_REFRESH_HORIZON_SECONDS,
            remembered_horizon_seconds: DEFAULT_REMEMBERED_HORIZON_SECONDS,
        }
    }

    #[must_use]
    pub fn with_access_ttl_seconds(mut self, seconds: i64) -> Self {
        self.access_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_refresh_horizon_seconds(mut self, seconds: i64) -> Self {
        self.refresh_horizon_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_remembered_horizon_seconds(mut self, seconds: i64) -> Self {
        self.remembered_horizon_seconds = seconds;
        self
    }

    #[must_use]
    pub fn access_ttl_seconds(&self) -> i64 {
        self.access_ttl_seconds
    }

    /// Refresh horizon for a session, fixed at login time by the
    /// remember-me flag.
    #[must_use]
    pub fn refresh_horizon_seconds(&self, remembered: bool) -> i64 {
        if remembered {
            self.remembered_horizon_seconds
        } else {
            self.refresh_horizon_seconds
        }
    }

    #[must_use]
    pub fn expiry_policy(&self) -> ExpiryPolicy {
        ExpiryPolicy {
            access_ttl: self.access_ttl_seconds,
            refresh_horizon: self.refresh_horizon_seconds,
            remembered_horizon: self.remembered_horizon_seconds,
        }
    }

    pub(crate) fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Only mark cookies secure when the app is served over HTTPS.
    pub(crate) fn session_cookie_secure(&self) -> bool {
        self.base_url.starts_with("https://")
    }
}

pub struct AuthState {
    config: AuthConfig,
    secret: SecretString,
    sessions: SessionStore,
    rate_limiter: Arc<dyn RateLimiter>,
    logout: LogoutBroadcast,
}

impl AuthState {
    #[must_use]
    pub fn new(
        config: AuthConfig,
        secret: SecretString,
        rate_limiter: Arc<dyn RateLimiter>,
    ) -> Self {
        let sessions = SessionStore::new(config.expiry_policy());
        Self {
            config,
            secret,
            sessions,
            rate_limiter,
            logout: LogoutBroadcast::new(),
        }
    }

    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    pub(crate) fn secret(&self) -> &SecretString {
        &self.secret
    }

    #[must_use]
    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    #[must_use]
    pub fn rate_limiter(&self) -> &dyn RateLimiter {
        self.rate_limiter.as_ref()
    }

    #[must_use]
    pub fn logout(&self) -> &LogoutBroadcast {
        &self.logout
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pordisto::rate_limit::NoopRateLimiter;

    #[test]
    fn cookie_secure_follows_base_url_scheme() {
        assert!(AuthConfig::new("https://app.tld".to_string()).session_cookie_secure());
        assert!(!AuthConfig::new("http://localhost:8080".to_string()).session_cookie_secure());
    }

    #[test]
    fn refresh_horizon_picks_remembered_value() {
        let config = AuthConfig::new("https://app.tld".to_string());
        assert_eq!(config.refresh_horizon_seconds(false), 7 * 24 * 60 * 60);
        assert_eq!(config.refresh_horizon_seconds(true), 30 * 24 * 60 * 60);
    }

    #[test]
    fn builders_override_defaults() {
        let config = AuthConfig::new("https://app.tld".to_string())
            .with_access_ttl_seconds(60)
            .with_refresh_horizon_seconds(120)
            .with_remembered_horizon_seconds(240);
        assert_eq!(config.access_ttl_seconds(), 60);
        assert_eq!(config.refresh_horizon_seconds(false), 120);
        assert_eq!(config.refresh_horizon_seconds(true), 240);
    }

    #[test]
    fn state_exposes_components() {
        let state = AuthState::new(
            AuthConfig::new("https://app.tld".to_string()),
            SecretString::from("sw0rdf1sh"),
            Arc::new(NoopRateLimiter),
        );
        assert_eq!(state.config().base_url(), "https://app.tld");
    }
}
