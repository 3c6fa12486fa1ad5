pub mod health;
pub use self::health::health;

pub mod login;
pub use self::login::login;

pub mod register;
pub use self::register::register;

pub mod logout;
pub use self::logout::logout;

pub mod session;
pub use self::session::session;

pub mod types;

// common functions for the handlers
use anyhow::{Context, Result};
use axum::http::{
    header::{InvalidHeaderValue, AUTHORIZATION, COOKIE},
    HeaderMap, HeaderValue,
};
use base64ct::{Base64UrlUnpadded, Encoding};
use rand::{rngs::OsRng, RngCore};
use regex::Regex;
use secrecy::{ExposeSecret, SecretString};
use sha2::{Digest, Sha256};

use super::{
    credentials::Subject,
    error::Error,
    rate_limit::{RateLimitDecision, RateLimiter},
    state::{AuthConfig, AuthState},
};
use types::SessionResponse;

pub(crate) const SESSION_COOKIE_NAME: &str = "pordisto_session";

pub(crate) const MIN_PASSWORD_LENGTH: usize = 8;
pub(crate) const MAX_PASSWORD_LENGTH: usize = 128;

/// Normalize an email for lookup/uniqueness checks.
pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Basic email format check on already-normalized input.
pub(crate) fn valid_email(email_normalized: &str) -> bool {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").is_ok_and(|regex| regex.is_match(email_normalized))
}

/// Password policy for registration: 8 to 128 characters, both inclusive.
pub(crate) fn validate_password(password: &str) -> Option<&'static str> {
    let length = password.chars().count();
    if length == 0 {
        Some("Password is required")
    } else if length < MIN_PASSWORD_LENGTH {
        Some("Password must be at least 8 characters")
    } else if length > MAX_PASSWORD_LENGTH {
        Some("Password must not exceed 128 characters")
    } else {
        None
    }
}

/// Create a new session token for the auth cookie.
/// The raw value is only returned to set the cookie; the store keys on a hash.
pub(crate) fn generate_session_token() -> Result<String> {
    let mut bytes = [0u8; 32];
    OsRng
        .try_fill_bytes(&mut bytes)
        .context("failed to generate session token")?;
    Ok(Base64UrlUnpadded::encode_string(&bytes))
}

/// Hash a session token keyed with the process signing secret, so records in
/// the store are bound to this deployment and raw tokens never persist.
pub(crate) fn hash_session_token(secret: &SecretString, token: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(secret.expose_secret().as_bytes());
    hasher.update(token.as_bytes());
    hasher.finalize().to_vec()
}

pub(crate) fn extract_session_token(headers: &HeaderMap) -> Option<String> {
    if let Some(token) = extract_bearer_token(headers) {
        return Some(token);
    }
    let header = headers.get(COOKIE)?;
    let value = header.to_str().ok()?;
    for pair in value.split(';') {
        let trimmed = pair.trim();
        let mut parts = trimmed.splitn(2, '=');
        let key = parts.next()?.trim();
        let val = parts.next()?.trim();
        if key == SESSION_COOKIE_NAME {
            return Some(val.to_string());
        }
    }
    None
}

fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let trimmed = value.trim();
    let token = trimmed
        .strip_prefix("Bearer ")
        .or_else(|| trimmed.strip_prefix("bearer "))?
        .trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

/// Extract a client IP for rate limiting from common proxy headers. Both
/// headers are proxy-controlled: they are only meaningful when a trusted
/// proxy in front sets them, and the last `x-forwarded-for` hop is the one
/// that proxy appended; client-supplied prefixes are ignored.
pub(crate) fn extract_client_ip(headers: &HeaderMap) -> Option<String> {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next_back())
        .map(str::trim)
        .filter(|value| !value.is_empty());
    if forwarded.is_some() {
        return forwarded.map(str::to_string);
    }
    headers
        .get("x-real-ip")
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

/// Gate an authentication attempt on both the identity and origin buckets.
/// A rejected attempt must never reach the credential verifier.
pub(crate) fn check_rate_limit(
    limiter: &dyn RateLimiter,
    headers: &HeaderMap,
    email: &str,
    now: i64,
) -> Result<(), Error> {
    if let Some(ip) = extract_client_ip(headers) {
        if limiter.attempt(&format!("ip:{ip}"), now) == RateLimitDecision::Reject {
            return Err(Error::RateLimited);
        }
    }
    if limiter.attempt(&format!("email:{email}"), now) == RateLimitDecision::Reject {
        return Err(Error::RateLimited);
    }
    Ok(())
}

/// Build a secure `HttpOnly` cookie for the session token. Max-Age matches
/// the refresh horizon; the server-side access window is what actually
/// bounds validity.
pub(crate) fn session_cookie(
    config: &AuthConfig,
    token: &str,
    max_age_seconds: i64,
) -> Result<HeaderValue, InvalidHeaderValue> {
    let secure = config.session_cookie_secure();
    let mut cookie = format!(
        "{SESSION_COOKIE_NAME}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={max_age_seconds}"
    );
    if secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

pub(crate) fn clear_session_cookie(
    config: &AuthConfig,
) -> Result<HeaderValue, InvalidHeaderValue> {
    let secure = config.session_cookie_secure();
    let mut cookie = format!("{SESSION_COOKIE_NAME}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0");
    if secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

/// Mint a session for a verified subject and build the cookie + response
/// body pair. Shared by login and registration; either everything here
/// succeeds or nothing is persisted.
pub(super) async fn establish_session(
    state: &AuthState,
    subject: &Subject,
    remembered: bool,
    now: i64,
) -> Result<(HeaderValue, SessionResponse), Error> {
    let token = generate_session_token()?;
    let token_hash = hash_session_token(state.secret(), &token);
    let session = state
        .sessions()
        .insert(token_hash, subject.id, subject.email.clone(), remembered, now)
        .await;
    let max_age = state.config().refresh_horizon_seconds(remembered);
    let cookie = session_cookie(state.config(), &token, max_age)?;
    Ok((
        cookie,
        SessionResponse {
            user_id: subject.id.to_string(),
            email: session.email,
            expires_at: session.expires_at,
            remembered: session.remembered,
        },
    ))
}
