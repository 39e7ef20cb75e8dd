//! Health check handler.

use crate::routes::AppState;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;
use std::sync::Arc;
use tracing::instrument;

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct HealthResponse {
    pub status: &'static str,
    pub database: &'static str,
    pub cache: &'static str,
}

fn label(ok: bool) -> &'static str {
    if ok {
        "healthy"
    } else {
        "unhealthy"
    }
}

/// Health check handler.
///
/// Pings the store and the token cache. Responds 200 when both answer and
/// 503 otherwise; the body reports each dependency either way.
#[instrument(skip_all, name = "hb.health.check")]
pub async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let db_ok = state.db.ping().await.is_ok();
    let cache_ok = state.cache.ping().await.is_ok();

    if !db_ok || !cache_ok {
        tracing::warn!(target: "hb.health", database = db_ok, cache = cache_ok, "Dependency unhealthy");
    }

    let response = HealthResponse {
        status: label(db_ok && cache_ok),
        database: label(db_ok),
        cache: label(cache_ok),
    };
    let status = if db_ok && cache_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status, Json(response))
}
