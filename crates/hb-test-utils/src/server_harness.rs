//! In-process app harness for end-to-end tests
//!
//! Provides TestApp, which drives the real router with the in-memory record
//! store and token cache in place of PostgreSQL and Redis.

use crate::fixtures::test_config;
use axum::body::Body;
use axum::http::{header, HeaderMap, HeaderValue, Method, Request, StatusCode};
use axum::Router;
use chrono::Utc;
use handbooks_service::cache::mock::MemoryTokenCache;
use handbooks_service::cache::TokenCache;
use handbooks_service::config::Config;
use handbooks_service::crypto::hash_password;
use handbooks_service::handlers::response::REFRESH_COOKIE;
use handbooks_service::models::{user_slug, Role, User};
use handbooks_service::observability::metrics::init_metrics_recorder;
use handbooks_service::repositories::mock::MemoryQuerier;
use handbooks_service::repositories::{mapper, Querier};
use handbooks_service::routes::{self, AppState};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;
use uuid::Uuid;

/// Test harness wrapping the full router
///
/// # Example
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_login_flow() -> Result<()> {
///     let app = TestApp::spawn()?;
///     let session = app.register(TEST_EMAIL_ALICE, TEST_PASSWORD).await?;
///
///     let response = app
///         .post_json("/api/v1/auth/login", None, json!({"email": TEST_EMAIL_ALICE, "password": TEST_PASSWORD}))
///         .await?;
///
///     assert_eq!(response.status, StatusCode::OK);
///     Ok(())
/// }
/// ```
pub struct TestApp {
    router: Router,
    state: Arc<AppState>,
    db: Arc<MemoryQuerier>,
    cache: Arc<MemoryTokenCache>,
}

/// Access and refresh tokens issued to a test user
#[derive(Debug, Clone)]
pub struct TestSession {
    pub user_id: Uuid,
    pub access_token: String,
    pub refresh_token: String,
}

/// Fully buffered response
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub text: String,
    /// Parsed body, or `Null` when the body is not JSON
    pub body: Value,
}

impl TestResponse {
    /// The `data` member of a success envelope
    pub fn data(&self) -> &Value {
        &self.body["data"]
    }

    /// The `error.code` member of an error envelope
    pub fn error_code(&self) -> Option<&str> {
        self.body["error"]["code"].as_str()
    }

    /// The `error.message` member of an error envelope
    pub fn error_message(&self) -> Option<&str> {
        self.body["error"]["message"].as_str()
    }

    /// Raw `Set-Cookie` header for the refresh cookie
    pub fn refresh_set_cookie(&self) -> Option<String> {
        let prefix = format!("{REFRESH_COOKIE}=");
        self.headers
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .find(|v| v.starts_with(&prefix))
            .map(ToString::to_string)
    }

    /// Value of the refresh cookie, if one was set
    pub fn refresh_cookie(&self) -> Option<String> {
        let set_cookie = self.refresh_set_cookie()?;
        let pair = set_cookie.split(';').next()?;
        pair.split_once('=').map(|(_, value)| value.to_string())
    }
}

impl TestApp {
    /// Build an app with the default test configuration
    pub fn spawn() -> Result<Self, anyhow::Error> {
        Self::with_config(test_config())
    }

    /// Build an app with a custom configuration
    ///
    /// The metrics recorder can only be installed once per process; later
    /// apps get a standalone recorder.
    pub fn with_config(config: Config) -> Result<Self, anyhow::Error> {
        let db = Arc::new(
            MemoryQuerier::new()
                .with_unique("users", "email")
                .with_unique("users", "slug"),
        );
        let cache = Arc::new(MemoryTokenCache::new());

        let state = Arc::new(
            AppState::new(
                config,
                db.clone() as Arc<dyn Querier>,
                cache.clone() as Arc<dyn TokenCache>,
            )
            .map_err(|e| anyhow::anyhow!("Failed to build app state: {}", e))?,
        );

        let metrics_handle = match init_metrics_recorder() {
            Ok(handle) => handle,
            Err(_) => {
                use metrics_exporter_prometheus::PrometheusBuilder;
                PrometheusBuilder::new().build_recorder().handle()
            }
        };

        let router = routes::build_routes(state.clone(), metrics_handle);

        Ok(Self {
            router,
            state,
            db,
            cache,
        })
    }

    pub fn state(&self) -> &Arc<AppState> {
        &self.state
    }

    /// In-memory record store behind the app
    pub fn db(&self) -> &MemoryQuerier {
        &self.db
    }

    /// In-memory token cache behind the app
    pub fn cache(&self) -> &MemoryTokenCache {
        &self.cache
    }

    /// Send a request through the router
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        bearer: Option<&str>,
        refresh_cookie: Option<&str>,
        body: Option<Value>,
    ) -> Result<TestResponse, anyhow::Error> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = bearer {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        if let Some(cookie) = refresh_cookie {
            builder = builder.header(header::COOKIE, format!("{REFRESH_COOKIE}={cookie}"));
        }
        let request = match body {
            Some(json) => builder
                .header(
                    header::CONTENT_TYPE,
                    HeaderValue::from_static("application/json"),
                )
                .body(Body::from(serde_json::to_vec(&json)?))?,
            None => builder.body(Body::empty())?,
        };

        self.send(request).await
    }

    /// Send a prebuilt request through the router
    pub async fn send(&self, request: Request<Body>) -> Result<TestResponse, anyhow::Error> {
        let response = self.router.clone().oneshot(request).await?;
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = response.into_body().collect().await?.to_bytes();
        let text = String::from_utf8_lossy(&bytes).into_owned();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);

        Ok(TestResponse {
            status,
            headers,
            text,
            body,
        })
    }

    pub async fn get(&self, uri: &str, bearer: Option<&str>) -> Result<TestResponse, anyhow::Error> {
        self.request(Method::GET, uri, bearer, None, None).await
    }

    pub async fn post_json(
        &self,
        uri: &str,
        bearer: Option<&str>,
        body: Value,
    ) -> Result<TestResponse, anyhow::Error> {
        self.request(Method::POST, uri, bearer, None, Some(body)).await
    }

    pub async fn put_json(
        &self,
        uri: &str,
        bearer: Option<&str>,
        body: Value,
    ) -> Result<TestResponse, anyhow::Error> {
        self.request(Method::PUT, uri, bearer, None, Some(body)).await
    }

    pub async fn patch_json(
        &self,
        uri: &str,
        bearer: Option<&str>,
        body: Value,
    ) -> Result<TestResponse, anyhow::Error> {
        self.request(Method::PATCH, uri, bearer, None, Some(body)).await
    }

    pub async fn delete(
        &self,
        uri: &str,
        bearer: Option<&str>,
    ) -> Result<TestResponse, anyhow::Error> {
        self.request(Method::DELETE, uri, bearer, None, None).await
    }

    /// Register a user through the API and return its session
    pub async fn register(
        &self,
        email: &str,
        password: &str,
    ) -> Result<TestSession, anyhow::Error> {
        let response = self
            .post_json(
                "/api/v1/auth/register",
                None,
                json!({"email": email, "password": password}),
            )
            .await?;
        if response.status != StatusCode::CREATED {
            anyhow::bail!("register failed with {}: {}", response.status, response.text);
        }

        let user_id = response.data()["user"]["id"]
            .as_str()
            .ok_or_else(|| anyhow::anyhow!("register response missing user id"))?
            .parse::<Uuid>()?;
        session_from(user_id, &response)
    }

    /// Log in through the API and return the new session
    pub async fn login(&self, email: &str, password: &str) -> Result<TestSession, anyhow::Error> {
        let response = self
            .post_json(
                "/api/v1/auth/login",
                None,
                json!({"email": email, "password": password}),
            )
            .await?;
        if response.status != StatusCode::OK {
            anyhow::bail!("login failed with {}: {}", response.status, response.text);
        }

        let access = response.data()["access_token"]
            .as_str()
            .ok_or_else(|| anyhow::anyhow!("login response missing access token"))?;
        let claims = self
            .state
            .codec
            .verify(access, common::jwt::TokenKind::Access)
            .map_err(|e| anyhow::anyhow!("login issued an unverifiable token: {}", e))?;
        session_from(claims.sub.parse::<Uuid>()?, &response)
    }

    /// Insert a user with the given role directly and log it in
    ///
    /// Registration always creates students; this is how tests get
    /// instructors and admins.
    pub async fn create_user_with_role(
        &self,
        email: &str,
        password: &str,
        role: Role,
    ) -> Result<TestSession, anyhow::Error> {
        let id = Uuid::new_v4();
        let now = Utc::now();
        let password_hash = hash_password(password, self.state.config.bcrypt_cost)
            .map_err(|e| anyhow::anyhow!("Failed to hash test password: {}", e))?;
        let full_name = email.split('@').next().unwrap_or(email).to_string();

        let user = User {
            id,
            slug: user_slug(&full_name, id),
            email: email.to_string(),
            password_hash,
            full_name,
            avatar_url: None,
            role,
            created_at: now,
            updated_at: now,
        };
        mapper::create(self.db.as_ref(), &user)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to insert test user: {}", e))?;

        self.login(email, password).await
    }

    /// Refresh through the API with the given access token and refresh cookie
    pub async fn refresh(
        &self,
        access_token: &str,
        refresh_token: &str,
    ) -> Result<TestResponse, anyhow::Error> {
        self.request(
            Method::POST,
            "/api/v1/auth/refresh",
            Some(access_token),
            Some(refresh_token),
            None,
        )
        .await
    }
}

fn session_from(user_id: Uuid, response: &TestResponse) -> Result<TestSession, anyhow::Error> {
    let access_token = response.data()["access_token"]
        .as_str()
        .ok_or_else(|| anyhow::anyhow!("response missing access token"))?
        .to_string();
    let refresh_token = response
        .refresh_cookie()
        .ok_or_else(|| anyhow::anyhow!("response missing refresh cookie"))?;

    Ok(TestSession {
        user_id,
        access_token,
        refresh_token,
    })
}
