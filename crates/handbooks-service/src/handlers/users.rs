use crate::errors::HbError;
use crate::handlers::response::{
    clear_refresh_cookie, read_refresh_cookie, ApiResponse, JsonBody, Message, PathParams,
};
use crate::middleware::auth::{require_role, Principal};
use crate::models::{Role, UpdateProfileRequest, UserProfile};
use crate::routes::AppState;
use crate::services::{session_service, user_service};
use axum::{
    extract::State,
    http::{header::SET_COOKIE, HeaderMap},
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use uuid::Uuid;

/// GET /api/v1/users/me
pub async fn get_me(
    State(state): State<Arc<AppState>>,
    principal: Principal,
) -> Result<ApiResponse<UserProfile>, HbError> {
    let user = user_service::get_user(state.db.as_ref(), principal.user_id).await?;
    Ok(ApiResponse::ok(UserProfile::from(&user)))
}

/// PATCH /api/v1/users/me
pub async fn update_me(
    State(state): State<Arc<AppState>>,
    principal: Principal,
    JsonBody(payload): JsonBody<UpdateProfileRequest>,
) -> Result<ApiResponse<UserProfile>, HbError> {
    let user = user_service::update_profile(state.db.as_ref(), &principal, payload).await?;
    Ok(ApiResponse::ok(UserProfile::from(&user)))
}

/// DELETE /api/v1/users/me
///
/// Deletes the account, then revokes the session that made the request.
pub async fn delete_me(
    State(state): State<Arc<AppState>>,
    principal: Principal,
    headers: HeaderMap,
) -> Result<Response, HbError> {
    user_service::delete_user(state.db.as_ref(), principal.user_id).await?;

    let refresh_token = read_refresh_cookie(&headers);
    session_service::logout(&state, &principal, refresh_token.as_deref()).await?;

    let cookie = clear_refresh_cookie(state.config.cookie_secure)?;
    Ok((
        [(SET_COOKIE, cookie)],
        ApiResponse::ok(Message {
            message: "Account deleted",
        }),
    )
        .into_response())
}

/// DELETE /api/v1/users/:user_id
///
/// Admin only.
pub async fn delete_user(
    State(state): State<Arc<AppState>>,
    principal: Principal,
    PathParams(user_id): PathParams<Uuid>,
) -> Result<ApiResponse<Message>, HbError> {
    require_role(&principal, Role::Admin)?;
    user_service::delete_user(state.db.as_ref(), user_id).await?;
    Ok(ApiResponse::ok(Message {
        message: "User deleted",
    }))
}
