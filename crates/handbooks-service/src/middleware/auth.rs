//! Authentication gate for protected routes.
//!
//! A request is admitted only when its bearer token verifies as an access
//! token AND its cache entry is still live. Both checks run on every
//! request; a deleted cache entry revokes a token whose signature is still
//! valid.

use crate::cache::token_key;
use crate::errors::HbError;
use crate::models::Role;
use crate::observability::hash_for_correlation;
use crate::observability::metrics::record_token_validation;
use crate::routes::AppState;
use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
    middleware::Next,
    response::IntoResponse,
};
use chrono::{DateTime, TimeZone, Utc};
use common::jwt::TokenKind;
use std::fmt;
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

/// Generic message for every rejected token.
pub const INVALID_TOKEN_MESSAGE: &str = "The access token is invalid or expired";

/// Authenticated caller, inserted into request extensions by [`require_auth`].
#[derive(Clone)]
pub struct Principal {
    pub user_id: Uuid,
    pub email: String,
    pub role: Role,
    pub jti: String,
    pub expires_at: DateTime<Utc>,
    /// The presented access token, kept so logout and refresh can revoke it.
    pub token: String,
}

impl Principal {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Creator or admin.
    pub fn can_modify(&self, created_by: Uuid) -> bool {
        self.user_id == created_by || self.is_admin()
    }
}

impl fmt::Debug for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Principal")
            .field("user_id", &"[REDACTED]")
            .field("email", &"[REDACTED]")
            .field("role", &self.role)
            .field("jti", &self.jti)
            .field("expires_at", &self.expires_at)
            .field("token", &"[REDACTED]")
            .finish()
    }
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for Principal {
    type Rejection = HbError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts.extensions.get::<Principal>().cloned().ok_or_else(|| {
            tracing::error!(target: "hb.auth.gate", "Principal requested on an unguarded route");
            HbError::InvalidToken(INVALID_TOKEN_MESSAGE.to_string())
        })
    }
}

/// Extract the token from `Authorization: Bearer <token>`.
pub fn extract_bearer_token(headers: &HeaderMap) -> Result<&str, HbError> {
    let header = headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| {
            tracing::debug!(target: "hb.auth.gate", "Missing Authorization header");
            HbError::InvalidToken("Missing Authorization header".to_string())
        })?;

    let token = header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| {
            tracing::debug!(target: "hb.auth.gate", "Invalid Authorization header format");
            HbError::InvalidToken("Invalid Authorization header format".to_string())
        })?;

    Ok(token)
}

/// Authentication middleware.
///
/// # Response
///
/// - 401 with `WWW-Authenticate` when the header is missing or malformed,
///   the token fails verification, or its cache entry is gone
/// - 500 when the cache cannot be reached
/// - otherwise the request continues with a [`Principal`] in extensions
#[instrument(skip_all, name = "hb.middleware.auth")]
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<impl IntoResponse, HbError> {
    let token = extract_bearer_token(req.headers())?.to_string();

    let claims = state
        .codec
        .verify(&token, TokenKind::Access)
        .map_err(|e| {
            tracing::debug!(
                target: "hb.auth.gate",
                category = e.category(),
                reason = ?e,
                "Access token rejected"
            );
            record_token_validation("error", Some(e.category()));
            HbError::InvalidToken(INVALID_TOKEN_MESSAGE.to_string())
        })?;

    let live = state
        .cache
        .exists(&token_key(TokenKind::Access, &token))
        .await
        .map_err(|e| HbError::Cache(format!("Failed to check access token: {}", e)))?;

    if !live {
        tracing::debug!(
            target: "hb.auth.gate",
            user = %hash_for_correlation(&claims.sub),
            jti = %claims.jti,
            "Access token revoked or expired"
        );
        record_token_validation("error", Some("revoked"));
        return Err(HbError::InvalidToken(
            "The access token has been revoked or expired".to_string(),
        ));
    }

    let principal = principal_from_claims(claims, token)?;
    record_token_validation("success", None);

    req.extensions_mut().insert(principal);
    Ok(next.run(req).await)
}

fn principal_from_claims(
    claims: common::jwt::UserClaims,
    token: String,
) -> Result<Principal, HbError> {
    let invalid = || HbError::InvalidToken(INVALID_TOKEN_MESSAGE.to_string());

    let user_id = Uuid::parse_str(&claims.sub).map_err(|_| invalid())?;
    let role = claims.role.parse::<Role>().map_err(|_| {
        tracing::debug!(target: "hb.auth.gate", "Token carries an unknown role");
        invalid()
    })?;
    let expires_at = Utc.timestamp_opt(claims.exp, 0).single().ok_or_else(invalid)?;

    Ok(Principal {
        user_id,
        email: claims.email,
        role,
        jti: claims.jti,
        expires_at,
        token,
    })
}

/// Require an exact role on top of authentication.
pub fn require_role(principal: &Principal, role: Role) -> Result<(), HbError> {
    if principal.role == role {
        Ok(())
    } else {
        Err(HbError::Forbidden(format!(
            "This action requires the {} role",
            role
        )))
    }
}
