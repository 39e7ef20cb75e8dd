//! Request id propagation.
//!
//! Every request runs inside a task-local scope holding its id, so the error
//! envelope can report it without threading it through every handler. An
//! incoming `X-Request-ID` is kept when it is short and printable; otherwise
//! a UUID v4 is generated.

use crate::observability::metrics::record_http_request;
use axum::{
    extract::Request,
    http::HeaderValue,
    middleware::Next,
    response::Response,
};
use std::time::Instant;
use uuid::Uuid;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Longest accepted client-supplied request id.
pub const MAX_REQUEST_ID_LEN: usize = 128;

tokio::task_local! {
    pub static REQUEST_ID: String;
}

/// Request id of the current request, when called inside one.
pub fn current_request_id() -> Option<String> {
    REQUEST_ID.try_with(Clone::clone).ok()
}

/// Request id stored in request extensions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestId(pub String);

fn accept_incoming(value: &HeaderValue) -> Option<String> {
    let value = value.to_str().ok()?.trim();
    let acceptable = !value.is_empty()
        && value.len() <= MAX_REQUEST_ID_LEN
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    acceptable.then(|| value.to_string())
}

/// Assign a request id, run the request in its scope and record HTTP metrics.
pub async fn request_id(mut req: Request, next: Next) -> Response {
    let id = req
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(accept_incoming)
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    // Runs before routing, so the raw path is recorded and the metrics
    // layer maps it onto a route template
    let method = req.method().to_string();
    let path = req.uri().path().to_string();

    req.extensions_mut().insert(RequestId(id.clone()));

    let start = Instant::now();
    let mut response = REQUEST_ID.scope(id.clone(), next.run(req)).await;

    record_http_request(&method, &path, response.status().as_u16(), start.elapsed());

    if let Ok(value) = HeaderValue::from_str(&id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }

    response
}
