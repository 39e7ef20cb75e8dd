use crate::errors::HbError;
use crate::handlers::response::{
    clear_refresh_cookie, read_refresh_cookie, refresh_cookie, ApiResponse, JsonBody, Message,
};
use crate::middleware::auth::Principal;
use crate::models::{LoginRequest, RegisterRequest, UserProfile};
use crate::routes::AppState;
use crate::services::session_service::{self, TokenPair, INVALID_REFRESH_MESSAGE};
use axum::{
    extract::State,
    http::{header::SET_COOKIE, HeaderMap},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use std::sync::Arc;

/// Token body returned by login and refresh. The refresh token travels only
/// in the cookie.
#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: &'static str,
    pub expires_in: u64,
}

impl From<&TokenPair> for TokenResponse {
    fn from(pair: &TokenPair) -> Self {
        Self {
            access_token: pair.access_token.clone(),
            token_type: "Bearer",
            expires_in: pair.access_expires_in,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub user: UserProfile,
    #[serde(flatten)]
    pub token: TokenResponse,
}

fn with_refresh_cookie(
    state: &AppState,
    pair: &TokenPair,
    body: impl IntoResponse,
) -> Result<Response, HbError> {
    let cookie = refresh_cookie(
        &pair.refresh_token,
        pair.refresh_expires_in,
        state.config.cookie_secure,
    )?;
    Ok(([(SET_COOKIE, cookie)], body).into_response())
}

/// Handle registration
///
/// POST /api/v1/auth/register
pub async fn handle_register(
    State(state): State<Arc<AppState>>,
    JsonBody(payload): JsonBody<RegisterRequest>,
) -> Result<Response, HbError> {
    let (user, pair) = session_service::register(&state, payload).await?;

    let body = RegisterResponse {
        user: UserProfile::from(&user),
        token: TokenResponse::from(&pair),
    };
    with_refresh_cookie(&state, &pair, ApiResponse::created(body))
}

/// Handle login
///
/// POST /api/v1/auth/login
pub async fn handle_login(
    State(state): State<Arc<AppState>>,
    JsonBody(payload): JsonBody<LoginRequest>,
) -> Result<Response, HbError> {
    let (_user, pair) = session_service::login(&state, payload).await?;
    with_refresh_cookie(&state, &pair, ApiResponse::ok(TokenResponse::from(&pair)))
}

/// Handle refresh token rotation
///
/// POST /api/v1/auth/refresh
///
/// Requires a live access token and the `refresh_token` cookie.
pub async fn handle_refresh(
    State(state): State<Arc<AppState>>,
    principal: Principal,
    headers: HeaderMap,
) -> Result<Response, HbError> {
    let refresh_token = read_refresh_cookie(&headers).ok_or_else(|| {
        tracing::debug!(target: "hb.session", "Refresh without a refresh cookie");
        HbError::InvalidToken(INVALID_REFRESH_MESSAGE.to_string())
    })?;

    let pair = session_service::refresh(&state, &principal, &refresh_token).await?;
    with_refresh_cookie(&state, &pair, ApiResponse::ok(TokenResponse::from(&pair)))
}

/// Handle logout
///
/// POST /api/v1/auth/logout
pub async fn handle_logout(
    State(state): State<Arc<AppState>>,
    principal: Principal,
    headers: HeaderMap,
) -> Result<Response, HbError> {
    let refresh_token = read_refresh_cookie(&headers);
    session_service::logout(&state, &principal, refresh_token.as_deref()).await?;

    let cookie = clear_refresh_cookie(state.config.cookie_secure)?;
    Ok((
        [(SET_COOKIE, cookie)],
        ApiResponse::ok(Message {
            message: "Logged out",
        }),
    )
        .into_response())
}
