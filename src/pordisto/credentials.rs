//! Credential verification against stored Argon2id hashes.
//!
//! Lookups that miss still run a verification against a fixed dummy hash so
//! response latency does not reveal whether an email is registered. Callers
//! collapse every failure into one uniform message.

use anyhow::{anyhow, Context, Result};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use sqlx::{PgPool, Row};
use tracing::Instrument;
use uuid::Uuid;

/// Argon2id hash of a throwaway string, verified against when the email is
/// unknown to keep the timing profile of both failure paths aligned.
const DUMMY_HASH: &str =
    "$argon2id$v=19$m=19456,t=2,p=1$gZiV/M1gPc22ElAH/Jh1Hw$CWOrkoo7oJBQ/iyh7uJ0LO2aLEfrHwTWllSAxT0zRno";

/// Subject identity attached to a verified credential.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Subject {
    pub id: Uuid,
    pub name: String,
    pub email: String,
}

/// Outcome of creating a new subject.
#[derive(Debug)]
pub enum CreateSubjectOutcome {
    Created(Subject),
    /// The email is already registered. Unlike login failures this is
    /// deliberately distinguishable; the identifier was just typed by its
    /// owner, so enumeration is not a concern here.
    Duplicate,
}

pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| anyhow!("failed to hash password: {err}"))
}

fn verify_against(hash: &str, password: &str) -> bool {
    PasswordHash::new(hash).is_ok_and(|parsed| {
        Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok()
    })
}

/// Verify a candidate password against an optional stored hash. A missing
/// hash burns the same Argon2 work against `DUMMY_HASH`, so the unknown-email
/// path costs the same as a wrong password and always fails.
fn verify_candidate(stored: Option<&str>, password: &str) -> bool {
    match stored {
        Some(hash) => verify_against(hash, password),
        None => {
            verify_against(DUMMY_HASH, password);
            false
        }
    }
}

/// Verify an email/password pair. `Ok(None)` covers both unknown email and
/// wrong password; the caller must not tell the two apart.
pub async fn verify(pool: &PgPool, email: &str, password: &str) -> Result<Option<Subject>> {
    let query = "SELECT id, name, email, password_hash FROM users WHERE email = $1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(email)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to fetch credential")?;

    let stored: Option<String> = row.as_ref().map(|row| row.get("password_hash"));
    if !verify_candidate(stored.as_deref(), password) {
        return Ok(None);
    }

    Ok(row.map(|row| Subject {
        id: row.get("id"),
        name: row.get("name"),
        email: row.get("email"),
    }))
}

/// Create a new subject; uniqueness is enforced by the database so the
/// check-and-insert cannot race.
pub async fn create_subject(
    pool: &PgPool,
    name: &str,
    email: &str,
    password_hash: &str,
) -> Result<CreateSubjectOutcome> {
    let id = Uuid::new_v4();
    let query = "INSERT INTO users (id, name, email, password_hash) VALUES ($1, $2, $3, $4)";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    let result = sqlx::query(query)
        .bind(id)
        .bind(name)
        .bind(email)
        .bind(password_hash)
        .execute(pool)
        .instrument(span)
        .await;

    match result {
        Ok(_) => Ok(CreateSubjectOutcome::Created(Subject {
            id,
            name: name.to_string(),
            email: email.to_string(),
        })),
        Err(err) if is_unique_violation(&err) => Ok(CreateSubjectOutcome::Duplicate),
        Err(err) => Err(err).context("failed to insert user"),
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().is_some_and(|code| code.as_ref() == "23505"),
        _ => false,
    }
}
