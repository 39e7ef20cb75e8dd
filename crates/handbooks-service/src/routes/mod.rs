//! HTTP routes for the Handbooks service.
//!
//! Defines the Axum router and application state.

use crate::cache::TokenCache;
use crate::config::Config;
use crate::crypto::{dummy_password_hash, TokenCodec};
use crate::errors::HbError;
use crate::handlers::{self, auth_handler, courses, lessons, sections, users};
use crate::middleware::{auth::require_auth, request_id::request_id};
use crate::repositories::Querier;
use axum::{
    http::{header, HeaderName, HeaderValue, Method},
    middleware,
    routing::{get, post},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

/// Application state shared across all handlers.
pub struct AppState {
    /// Record store.
    pub db: Arc<dyn Querier>,

    /// Token liveness cache.
    pub cache: Arc<dyn TokenCache>,

    /// Token signer/verifier built from the configured secret.
    pub codec: TokenCodec,

    /// Service configuration.
    pub config: Config,

    /// bcrypt hash verified against when a login names an unknown email.
    pub dummy_hash: String,
}

impl AppState {
    /// Build state from configuration and the two external stores.
    pub fn new(
        config: Config,
        db: Arc<dyn Querier>,
        cache: Arc<dyn TokenCache>,
    ) -> Result<Self, HbError> {
        let codec = TokenCodec::new(
            &config.jwt_secret,
            &config.jwt_issuer,
            config.jwt_clock_skew_seconds,
        );
        let dummy_hash = dummy_password_hash(config.bcrypt_cost)?;

        Ok(Self {
            db,
            cache,
            codec,
            config,
            dummy_hash,
        })
    }
}

fn cors_layer(config: &Config) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .cors_allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(target: "hb.routes", error = %e, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    let allow_origin = if origins.is_empty() {
        AllowOrigin::mirror_request()
    } else {
        AllowOrigin::list(origins)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            HeaderName::from_static("x-request-id"),
        ])
        .expose_headers([HeaderName::from_static("x-request-id")])
}

/// Build the application routes.
///
/// Creates an Axum router with:
/// - `/api/v1/auth/register`, `/api/v1/auth/login` - public
/// - every other `/api/v1` route - behind [`require_auth`]
/// - `/health`, `/metrics` - operational, public
///
/// Layers, outermost first: request id, trace, CORS, timeout. The request
/// id wraps everything so gate rejections and timeouts still carry it.
pub fn build_routes(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let timeout = Duration::from_secs(state.config.request_timeout_seconds);
    let cors = cors_layer(&state.config);

    let public_routes = Router::new()
        .route("/api/v1/auth/register", post(auth_handler::handle_register))
        .route("/api/v1/auth/login", post(auth_handler::handle_login))
        .route("/health", get(handlers::health_check))
        .with_state(state.clone());

    let protected_routes = Router::new()
        .route("/api/v1/auth/refresh", post(auth_handler::handle_refresh))
        .route("/api/v1/auth/logout", post(auth_handler::handle_logout))
        .route(
            "/api/v1/users/me",
            get(users::get_me).patch(users::update_me).delete(users::delete_me),
        )
        .route(
            "/api/v1/users/:user_id",
            axum::routing::delete(users::delete_user),
        )
        .route(
            "/api/v1/courses",
            get(courses::list_courses).post(courses::create_course),
        )
        .route(
            "/api/v1/courses/:course_id",
            get(courses::get_course)
                .put(courses::update_course)
                .delete(courses::delete_course),
        )
        .route(
            "/api/v1/courses/:course_id/sections",
            get(sections::list_sections).post(sections::create_section),
        )
        .route(
            "/api/v1/courses/:course_id/sections/:section_id",
            get(sections::get_section)
                .put(sections::update_section)
                .delete(sections::delete_section),
        )
        .route(
            "/api/v1/courses/:course_id/sections/:section_id/lessons",
            get(lessons::list_lessons).post(lessons::create_lesson),
        )
        .route(
            "/api/v1/courses/:course_id/sections/:section_id/lessons/:lesson_id",
            get(lessons::get_lesson)
                .put(lessons::update_lesson)
                .delete(lessons::delete_lesson),
        )
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth))
        .with_state(state);

    let metrics_routes = Router::new()
        .route("/metrics", get(handlers::metrics_handler))
        .with_state(metrics_handle);

    public_routes
        .merge(protected_routes)
        .merge(metrics_routes)
        .layer(TimeoutLayer::new(timeout))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(request_id))
}
