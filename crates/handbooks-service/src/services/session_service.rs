//! Session lifecycle: registration, login, token pair issuance, refresh
//! rotation and logout.
//!
//! A pair is only usable once both of its cache entries are stored. Refresh
//! consumes the presented refresh entry with a single `remove`; only the
//! caller whose `remove` deleted the key goes on to mint a new pair.

use crate::cache::token_key;
use crate::crypto;
use crate::errors::HbError;
use crate::middleware::auth::Principal;
use crate::models::{user_slug, LoginRequest, RegisterRequest, Role, User};
use crate::observability::hash_for_correlation;
use crate::observability::metrics::{record_bcrypt_duration, record_token_issuance};
use crate::repositories::{mapper, Filter, Querier, SqlValue};
use crate::routes::AppState;
use chrono::Utc;
use common::jwt::TokenKind;
use std::fmt;
use std::time::{Duration, Instant};
use tracing::instrument;
use uuid::Uuid;

/// Minimum password length in characters.
pub const MIN_PASSWORD_LEN: usize = 8;

/// Longest accepted password; bcrypt ignores input past 72 bytes.
pub const MAX_PASSWORD_BYTES: usize = 72;

pub const INVALID_REFRESH_MESSAGE: &str = "The refresh token is invalid or expired";

/// Unique constraint on `users.email`.
pub const EMAIL_UNIQUE_CONSTRAINT: &str = "users_email_key";

/// Inserts tried before giving up on slug or id collisions.
const MAX_USER_INSERT_ATTEMPTS: usize = 3;

/// Freshly issued access and refresh tokens.
#[derive(Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub access_expires_in: u64,
    pub refresh_expires_in: u64,
}

impl fmt::Debug for TokenPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenPair")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .field("access_expires_in", &self.access_expires_in)
            .field("refresh_expires_in", &self.refresh_expires_in)
            .finish()
    }
}

/// Normalize and validate an email address.
pub fn normalize_email(email: &str) -> Result<String, HbError> {
    let email = email.trim().to_lowercase();
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.is_empty()
                && !domain.contains('@')
                && !email.chars().any(char::is_whitespace)
        }
        None => false,
    };
    if !valid {
        return Err(HbError::BadRequest("A valid email is required".to_string()));
    }
    Ok(email)
}

fn validate_password(password: &str) -> Result<(), HbError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(HbError::BadRequest(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }
    if password.len() > MAX_PASSWORD_BYTES {
        return Err(HbError::BadRequest(format!(
            "Password must be at most {} bytes",
            MAX_PASSWORD_BYTES
        )));
    }
    Ok(())
}

async fn hash_password_blocking(password: String, cost: u32) -> Result<String, HbError> {
    let start = Instant::now();
    let result = tokio::task::spawn_blocking(move || crypto::hash_password(&password, cost))
        .await
        .map_err(|e| HbError::Internal(format!("Password hashing task failed: {}", e)))?;
    record_bcrypt_duration("hash", start.elapsed());
    result
}

async fn verify_password_blocking(password: String, hash: String) -> Result<bool, HbError> {
    let start = Instant::now();
    let result = tokio::task::spawn_blocking(move || crypto::verify_password(&password, &hash))
        .await
        .map_err(|e| HbError::Internal(format!("Password verification task failed: {}", e)))?;
    record_bcrypt_duration("verify", start.elapsed());
    result
}

/// Insert a new user.
///
/// A taken email is a `Conflict`. Any other unique violation comes from the
/// generated id or slug, so the insert is retried under a fresh id.
async fn insert_user(db: &dyn Querier, mut user: User) -> Result<User, HbError> {
    for attempt in 1..=MAX_USER_INSERT_ATTEMPTS {
        match mapper::create(db, &user).await {
            Ok(()) => return Ok(user),
            Err(HbError::UniqueViolation { constraint, .. })
                if constraint == EMAIL_UNIQUE_CONSTRAINT =>
            {
                tracing::debug!(
                    target: "hb.session",
                    email = %hash_for_correlation(&user.email),
                    "Registration rejected: email taken"
                );
                return Err(HbError::Conflict(
                    "A user with this email already exists".to_string(),
                ));
            }
            Err(HbError::UniqueViolation { constraint, .. }) => {
                tracing::warn!(
                    target: "hb.session",
                    constraint = %constraint,
                    attempt,
                    "Generated user identity collided, retrying"
                );
                user.id = Uuid::new_v4();
                user.slug = user_slug(&user.full_name, user.id);
            }
            Err(e) => return Err(e),
        }
    }

    Err(HbError::Internal(format!(
        "Could not allocate a unique user id after {} attempts",
        MAX_USER_INSERT_ATTEMPTS
    )))
}

/// Create an account and sign it in.
///
/// `full_name` defaults to the local part of the email when absent.
#[instrument(skip_all)]
pub async fn register(state: &AppState, req: RegisterRequest) -> Result<(User, TokenPair), HbError> {
    let email = normalize_email(&req.email)?;
    validate_password(&req.password)?;

    let full_name = match req.full_name {
        Some(name) => {
            let name = name.trim().to_string();
            if name.is_empty() {
                return Err(HbError::BadRequest("full_name must not be empty".to_string()));
            }
            name
        }
        None => email.split('@').next().unwrap_or_default().to_string(),
    };

    let password_hash = hash_password_blocking(req.password, state.config.bcrypt_cost).await?;

    let id = Uuid::new_v4();
    let now = Utc::now();
    let user = insert_user(
        state.db.as_ref(),
        User {
            id,
            slug: user_slug(&full_name, id),
            email,
            password_hash,
            full_name,
            avatar_url: None,
            role: Role::default(),
            created_at: now,
            updated_at: now,
        },
    )
    .await?;

    tracing::info!(
        target: "hb.session",
        user = %hash_for_correlation(&user.id.to_string()),
        "User registered"
    );

    let pair = issue_token_pair(state, &user, "register").await?;
    Ok((user, pair))
}

/// Verify credentials and issue a new pair.
///
/// An unknown email still pays for a bcrypt verification against a dummy
/// hash, and both failure paths return the same error.
#[instrument(skip_all)]
pub async fn login(state: &AppState, req: LoginRequest) -> Result<(User, TokenPair), HbError> {
    let email = req.email.trim().to_lowercase();

    let user = match mapper::get_one::<User>(
        state.db.as_ref(),
        Filter::new().eq("email", SqlValue::Text(email.clone())),
    )
    .await
    {
        Ok(user) => Some(user),
        Err(HbError::NotFound(_)) => None,
        Err(e) => return Err(e),
    };

    let hash = user
        .as_ref()
        .map_or_else(|| state.dummy_hash.clone(), |u| u.password_hash.clone());
    let valid = verify_password_blocking(req.password, hash).await?;

    let user = match user {
        Some(user) if valid => user,
        _ => {
            tracing::debug!(
                target: "hb.session",
                email = %hash_for_correlation(&email),
                "Login rejected"
            );
            record_token_issuance("login", "error", Duration::ZERO);
            return Err(HbError::InvalidCredentials);
        }
    };

    let pair = issue_token_pair(state, &user, "login").await?;
    Ok((user, pair))
}

/// Mint an access and a refresh token and register both in the cache.
///
/// If the refresh entry cannot be stored the access entry is removed again
/// so no half-registered pair stays live.
#[instrument(skip_all, fields(operation = operation))]
pub async fn issue_token_pair(
    state: &AppState,
    user: &User,
    operation: &'static str,
) -> Result<TokenPair, HbError> {
    let start = Instant::now();
    let result = mint_and_store(state, user).await;
    let status = if result.is_ok() { "success" } else { "error" };
    record_token_issuance(operation, status, start.elapsed());
    result
}

async fn mint_and_store(state: &AppState, user: &User) -> Result<TokenPair, HbError> {
    let config = &state.config;
    let role = user.role.as_str();

    let access_claims = state.codec.claims_for(
        user.id,
        &user.email,
        role,
        TokenKind::Access,
        config.access_token_ttl_seconds,
    )?;
    let refresh_claims = state.codec.claims_for(
        user.id,
        &user.email,
        role,
        TokenKind::Refresh,
        config.refresh_token_ttl_seconds,
    )?;

    let access_token = state.codec.mint(&access_claims)?;
    let refresh_token = state.codec.mint(&refresh_claims)?;

    let access_key = token_key(TokenKind::Access, &access_token);
    let refresh_key = token_key(TokenKind::Refresh, &refresh_token);

    state
        .cache
        .store(&access_key, Duration::from_secs(config.access_token_ttl_seconds))
        .await
        .map_err(|e| HbError::Cache(format!("Failed to store access token: {}", e)))?;

    if let Err(e) = state
        .cache
        .store(&refresh_key, Duration::from_secs(config.refresh_token_ttl_seconds))
        .await
    {
        if let Err(cleanup) = state.cache.remove(&access_key).await {
            tracing::warn!(
                target: "hb.session",
                error = %cleanup,
                "Failed to roll back access token after refresh store failure"
            );
        }
        return Err(HbError::Cache(format!("Failed to store refresh token: {}", e)));
    }

    tracing::debug!(
        target: "hb.session",
        user = %hash_for_correlation(&user.id.to_string()),
        access_jti = %access_claims.jti,
        refresh_jti = %refresh_claims.jti,
        "Token pair issued"
    );

    Ok(TokenPair {
        access_token,
        refresh_token,
        access_expires_in: config.access_token_ttl_seconds,
        refresh_expires_in: config.refresh_token_ttl_seconds,
    })
}

/// Rotate a refresh token.
///
/// The presented refresh token must belong to the authenticated user and
/// still be live. It is consumed before anything else is written; of two
/// concurrent refreshes with the same token only one gets past that point.
/// Once consumed, any later failure is a server error and the caller has
/// to log in again.
#[instrument(skip_all)]
pub async fn refresh(
    state: &AppState,
    principal: &Principal,
    refresh_token: &str,
) -> Result<TokenPair, HbError> {
    let invalid = || HbError::InvalidToken(INVALID_REFRESH_MESSAGE.to_string());

    let claims = state
        .codec
        .verify(refresh_token, TokenKind::Refresh)
        .map_err(|e| {
            tracing::debug!(target: "hb.session", category = e.category(), "Refresh token rejected");
            invalid()
        })?;

    if claims.sub != principal.user_id.to_string() {
        tracing::warn!(
            target: "hb.session",
            user = %hash_for_correlation(&principal.user_id.to_string()),
            "Refresh token subject does not match the access token"
        );
        return Err(invalid());
    }

    let refresh_key = token_key(TokenKind::Refresh, refresh_token);
    let live = state
        .cache
        .exists(&refresh_key)
        .await
        .map_err(|e| HbError::Cache(format!("Failed to check refresh token: {}", e)))?;
    if !live {
        tracing::debug!(target: "hb.session", jti = %claims.jti, "Refresh token revoked or expired");
        return Err(invalid());
    }

    let user = match mapper::get_one::<User>(state.db.as_ref(), Filter::by_id(principal.user_id)).await {
        Ok(user) => user,
        Err(HbError::NotFound(_)) => {
            tracing::debug!(target: "hb.session", "Refresh for a deleted user");
            return Err(invalid());
        }
        Err(e) => return Err(e),
    };

    let consumed = state
        .cache
        .remove(&refresh_key)
        .await
        .map_err(|e| HbError::Cache(format!("Failed to consume refresh token: {}", e)))?;
    if !consumed {
        tracing::debug!(target: "hb.session", jti = %claims.jti, "Refresh token already consumed");
        return Err(invalid());
    }

    state
        .cache
        .remove(&token_key(TokenKind::Access, &principal.token))
        .await
        .map_err(|e| HbError::Cache(format!("Failed to revoke access token: {}", e)))?;

    issue_token_pair(state, &user, "refresh").await
}

/// Revoke the caller's access token and, when presented, their refresh
/// token.
///
/// A refresh token that does not verify or belongs to someone else is left
/// alone.
#[instrument(skip_all)]
pub async fn logout(
    state: &AppState,
    principal: &Principal,
    refresh_token: Option<&str>,
) -> Result<(), HbError> {
    state
        .cache
        .remove(&token_key(TokenKind::Access, &principal.token))
        .await
        .map_err(|e| HbError::Cache(format!("Failed to revoke access token: {}", e)))?;

    if let Some(token) = refresh_token {
        match state.codec.verify(token, TokenKind::Refresh) {
            Ok(claims) if claims.sub == principal.user_id.to_string() => {
                state
                    .cache
                    .remove(&token_key(TokenKind::Refresh, token))
                    .await
                    .map_err(|e| HbError::Cache(format!("Failed to revoke refresh token: {}", e)))?;
            }
            _ => {
                tracing::debug!(target: "hb.session", "Ignoring unusable refresh cookie on logout");
            }
        }
    }

    tracing::info!(
        target: "hb.session",
        user = %hash_for_correlation(&principal.user_id.to_string()),
        jti = %principal.jti,
        "User logged out"
    );
    Ok(())
}
