//! Response envelope, JSON body extraction and the refresh cookie.

use crate::errors::HbError;
use crate::middleware::request_id::current_request_id;
use axum::{
    async_trait,
    extract::{rejection::JsonRejection, FromRequest, FromRequestParts, Path, Query, Request},
    http::{header::COOKIE, request::Parts, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Name of the cookie carrying the refresh token.
pub const REFRESH_COOKIE: &str = "refresh_token";

/// Path the refresh cookie is scoped to; only auth endpoints receive it.
pub const REFRESH_COOKIE_PATH: &str = "/api/v1/auth";

/// Success envelope: `{status, success, data, request_id}`.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    #[serde(skip)]
    status_code: StatusCode,
    status: u16,
    success: bool,
    data: T,
    request_id: String,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn with_status(status_code: StatusCode, data: T) -> Self {
        Self {
            status_code,
            status: status_code.as_u16(),
            success: true,
            data,
            request_id: current_request_id().unwrap_or_default(),
        }
    }

    pub fn ok(data: T) -> Self {
        Self::with_status(StatusCode::OK, data)
    }

    pub fn created(data: T) -> Self {
        Self::with_status(StatusCode::CREATED, data)
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        (self.status_code, Json(self)).into_response()
    }
}

/// Confirmation payload for operations with nothing to return.
#[derive(Debug, Serialize)]
pub struct Message {
    pub message: &'static str,
}

/// JSON body extractor whose rejections are 400 in the standard envelope.
pub struct JsonBody<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = HbError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(JsonBody(value)),
            Err(rejection) => Err(json_rejection(rejection)),
        }
    }
}

fn json_rejection(rejection: JsonRejection) -> HbError {
    let message = match rejection {
        JsonRejection::MissingJsonContentType(_) => {
            "Expected request with `Content-Type: application/json`".to_string()
        }
        JsonRejection::JsonSyntaxError(_) => "Request body is not valid JSON".to_string(),
        JsonRejection::JsonDataError(e) => format!("Invalid request body: {}", e.body_text()),
        other => format!("Invalid request body: {}", other.body_text()),
    };
    HbError::BadRequest(message)
}

/// Path parameters extractor; a malformed id is a 400 in the standard
/// envelope rather than axum's plain-text rejection.
pub struct PathParams<T>(pub T);

#[async_trait]
impl<S, T> FromRequestParts<S> for PathParams<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = HbError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Path::<T>::from_request_parts(parts, state).await {
            Ok(Path(value)) => Ok(PathParams(value)),
            Err(rejection) => Err(HbError::BadRequest(format!(
                "Invalid path parameter: {}",
                rejection.body_text()
            ))),
        }
    }
}

/// Query string extractor with the same rejection handling.
pub struct QueryParams<T>(pub T);

#[async_trait]
impl<S, T> FromRequestParts<S> for QueryParams<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = HbError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Query::<T>::from_request_parts(parts, state).await {
            Ok(Query(value)) => Ok(QueryParams(value)),
            Err(rejection) => Err(HbError::BadRequest(format!(
                "Invalid query string: {}",
                rejection.body_text()
            ))),
        }
    }
}

/// `Set-Cookie` value installing a refresh token.
pub fn refresh_cookie(token: &str, max_age_seconds: u64, secure: bool) -> Result<HeaderValue, HbError> {
    let secure = if secure { "; Secure" } else { "" };
    HeaderValue::from_str(&format!(
        "{}={}; HttpOnly{}; SameSite=Strict; Path={}; Max-Age={}",
        REFRESH_COOKIE, token, secure, REFRESH_COOKIE_PATH, max_age_seconds
    ))
    .map_err(|e| HbError::Internal(format!("Failed to build refresh cookie: {}", e)))
}

/// `Set-Cookie` value removing the refresh cookie.
pub fn clear_refresh_cookie(secure: bool) -> Result<HeaderValue, HbError> {
    let secure = if secure { "; Secure" } else { "" };
    HeaderValue::from_str(&format!(
        "{}=; HttpOnly{}; SameSite=Strict; Path={}; Max-Age=0",
        REFRESH_COOKIE, secure, REFRESH_COOKIE_PATH
    ))
    .map_err(|e| HbError::Internal(format!("Failed to build refresh cookie: {}", e)))
}

/// Value of the refresh cookie, if the request carries one.
pub fn read_refresh_cookie(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == REFRESH_COOKIE)
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
