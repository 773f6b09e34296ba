//! User accounts and bearer tokens.
//!
//! Passwords are hashed with bcrypt on a blocking thread. Tokens are HS256
//! JWTs whose `sub` claim is the username and whose `exp` is
//! `auth.token_ttl_minutes` after issue.

use std::sync::{Arc, OnceLock};

use anyhow::{Context, Result};
use chrono::{SecondsFormat, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use thiserror::Error;

use crate::config::AuthConfig;

/// JWT payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Username.
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("{0} must not be empty")]
    MissingField(&'static str),

    #[error("Username already exists")]
    UsernameTaken,

    #[error("Invalid username or password.")]
    InvalidCredentials,

    #[error("Could not validate credentials")]
    InvalidToken,

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// Resolved signing settings, built once at server start.
#[derive(Clone)]
pub struct AuthSettings {
    secret: String,
    token_ttl_minutes: i64,
    bcrypt_cost: u32,
    /// Verified against when the username is unknown, so login cost does
    /// not reveal which accounts exist.
    dummy_hash: Arc<OnceLock<String>>,
}

impl AuthSettings {
    pub fn from_config(config: &AuthConfig) -> Result<Self> {
        Ok(Self {
            secret: config.resolve_secret()?,
            token_ttl_minutes: config.token_ttl_minutes,
            bcrypt_cost: config.bcrypt_cost,
            dummy_hash: Arc::default(),
        })
    }

    pub fn new(secret: impl Into<String>, token_ttl_minutes: i64, bcrypt_cost: u32) -> Self {
        Self {
            secret: secret.into(),
            token_ttl_minutes,
            bcrypt_cost,
            dummy_hash: Arc::default(),
        }
    }

    /// Sign a token for `username`.
    pub fn issue_token(&self, username: &str) -> Result<String, AuthError> {
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: username.to_string(),
            iat: now,
            exp: now + self.token_ttl_minutes * 60,
        };
        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .context("Failed to sign token")
        .map_err(AuthError::Internal)
    }

    /// Verify signature and expiry. A token without a usable `sub` is invalid.
    pub fn validate_token(&self, token: &str) -> Result<Claims, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        let data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &validation,
        )
        .map_err(|_| AuthError::InvalidToken)?;
        if data.claims.sub.trim().is_empty() {
            return Err(AuthError::InvalidToken);
        }
        Ok(data.claims)
    }
}

/// Create a user. The username is trimmed before storage.
pub async fn register_user(
    pool: &SqlitePool,
    settings: &AuthSettings,
    username: &str,
    password: &str,
) -> Result<(), AuthError> {
    let username = username.trim();
    if username.is_empty() {
        return Err(AuthError::MissingField("username"));
    }
    if password.is_empty() {
        return Err(AuthError::MissingField("password"));
    }

    let existing: Option<String> = sqlx::query_scalar("SELECT id FROM users WHERE username = ?")
        .bind(username)
        .fetch_optional(pool)
        .await
        .context("Failed to look up user")?;
    if existing.is_some() {
        return Err(AuthError::UsernameTaken);
    }

    // Run bcrypt in blocking thread to avoid stalling the async runtime
    let cost = settings.bcrypt_cost;
    let plain = password.to_string();
    let hashed = tokio::task::spawn_blocking(move || bcrypt::hash(plain, cost))
        .await
        .context("Password hashing task failed")?
        .context("Failed to hash password")?;

    let result = sqlx::query(
        "INSERT INTO users (id, username, hashed_password, created_at) VALUES (?, ?, ?, ?)",
    )
    .bind(uuid::Uuid::new_v4().to_string())
    .bind(username)
    .bind(hashed)
    .bind(Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true))
    .execute(pool)
    .await;

    match result {
        Ok(_) => {
            tracing::info!(username, "registered user");
            Ok(())
        }
        // Lost a race with a concurrent registration
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => Err(AuthError::UsernameTaken),
        Err(e) => Err(AuthError::Internal(
            anyhow::Error::new(e).context("Failed to insert user"),
        )),
    }
}

/// Check credentials and return the canonical username.
pub async fn authenticate(
    pool: &SqlitePool,
    settings: &AuthSettings,
    username: &str,
    password: &str,
) -> Result<String, AuthError> {
    let username = username.trim();
    let row: Option<(String, String)> =
        sqlx::query_as("SELECT username, hashed_password FROM users WHERE username = ?")
            .bind(username)
            .fetch_optional(pool)
            .await
            .context("Failed to look up user")?;

    let plain = password.to_string();
    let cost = settings.bcrypt_cost;
    let dummy = Arc::clone(&settings.dummy_hash);
    let (stored_name, ok) = tokio::task::spawn_blocking(move || match row {
        Some((name, hashed)) => (Some(name), bcrypt::verify(plain, &hashed).unwrap_or(false)),
        None => {
            let hashed =
                dummy.get_or_init(|| bcrypt::hash("unknown-user", cost).unwrap_or_default());
            let _ = bcrypt::verify(plain, hashed);
            (None, false)
        }
    })
    .await
    .context("Password verification task failed")?;

    match stored_name {
        Some(name) if ok => Ok(name),
        _ => Err(AuthError::InvalidCredentials),
    }
}
