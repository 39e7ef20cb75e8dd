//! E2E tests for registration, login and logout.
//!
//! ## Test Naming
//!
//! Tests follow the convention: `test_<feature>_<scenario>_<expected_result>`

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use common::jwt::TokenKind;
use handbooks_service::cache::token_key;
use hb_test_utils::*;
use serde_json::json;
use std::time::Duration;

// ============================================================================
// Registration
// ============================================================================

/// A new account gets 201, an access token in the body and the refresh
/// token only in an HttpOnly cookie.
#[tokio::test]
async fn test_register_happy_path() -> Result<(), anyhow::Error> {
    // Arrange
    let app = TestApp::spawn()?;

    // Act
    let response = app
        .post_json(
            "/api/v1/auth/register",
            None,
            json!({
                "email": "  Alice@Example.COM ",
                "password": TEST_PASSWORD,
                "full_name": "Alice Liddell"
            }),
        )
        .await?;

    // Assert
    response.assert_success(201);
    let data = response.data();
    assert_eq!(data["user"]["email"], TEST_EMAIL_ALICE);
    assert_eq!(data["user"]["full_name"], "Alice Liddell");
    assert_eq!(data["user"]["role"], "student");
    assert!(data["user"]["slug"]
        .as_str()
        .unwrap()
        .starts_with("alice-liddell-"));
    assert!(data["user"].get("password_hash").is_none());
    assert_eq!(data["token_type"], "Bearer");
    assert_eq!(data["expires_in"], 900);
    assert!(data.get("refresh_token").is_none());

    let access = data["access_token"].as_str().unwrap().to_string();
    access
        .assert_valid_jwt()
        .assert_kind("access")
        .assert_for_subject(data["user"]["id"].as_str().unwrap())
        .assert_expires_in(900);

    let cookie = response.refresh_set_cookie().expect("refresh cookie set");
    assert!(cookie.contains("HttpOnly"));
    assert!(cookie.contains("Secure"));
    assert!(cookie.contains("SameSite=Strict"));
    assert!(cookie.contains("Path=/api/v1/auth"));
    assert!(cookie.contains("Max-Age=604800"));
    response
        .refresh_cookie()
        .unwrap()
        .assert_valid_jwt()
        .assert_kind("refresh");

    Ok(())
}

/// Without a full name the local part of the email is used.
#[tokio::test]
async fn test_register_without_full_name_uses_email_local_part() -> Result<(), anyhow::Error> {
    let app = TestApp::spawn()?;

    let response = app
        .post_json(
            "/api/v1/auth/register",
            None,
            json!({"email": "grace@example.com", "password": TEST_PASSWORD}),
        )
        .await?;

    response.assert_success(201);
    assert_eq!(response.data()["user"]["full_name"], "grace");
    Ok(())
}

/// Registration stores exactly one live access and one live refresh entry.
#[tokio::test]
async fn test_register_stores_both_tokens_with_their_lifetimes() -> Result<(), anyhow::Error> {
    let app = TestApp::spawn()?;

    let session = app.register(TEST_EMAIL_ALICE, TEST_PASSWORD).await?;

    assert_eq!(app.cache().count_with_prefix("access_hash:").await, 1);
    assert_eq!(app.cache().count_with_prefix("refresh_hash:").await, 1);
    assert_eq!(
        app.cache()
            .ttl_of(&token_key(TokenKind::Access, &session.access_token))
            .await,
        Some(Duration::from_secs(900))
    );
    assert_eq!(
        app.cache()
            .ttl_of(&token_key(TokenKind::Refresh, &session.refresh_token))
            .await,
        Some(Duration::from_secs(604_800))
    );
    Ok(())
}

/// The same email in a different case is a duplicate.
#[tokio::test]
async fn test_register_duplicate_email_returns_409() -> Result<(), anyhow::Error> {
    let app = TestApp::spawn()?;
    app.register(TEST_EMAIL_ALICE, TEST_PASSWORD).await?;

    let response = app
        .post_json(
            "/api/v1/auth/register",
            None,
            json!({"email": "ALICE@example.com", "password": TEST_PASSWORD}),
        )
        .await?;

    response.assert_error(409, "CONFLICT");
    assert_eq!(
        response.error_message(),
        Some("A user with this email already exists")
    );
    Ok(())
}

#[tokio::test]
async fn test_register_invalid_input_returns_400() -> Result<(), anyhow::Error> {
    let app = TestApp::spawn()?;

    let cases = [
        json!({"email": "not-an-email", "password": TEST_PASSWORD}),
        json!({"email": TEST_EMAIL_ALICE, "password": "short"}),
        json!({"email": TEST_EMAIL_ALICE, "password": TEST_PASSWORD, "full_name": "   "}),
        json!({"email": TEST_EMAIL_ALICE}),
    ];

    for body in cases {
        let response = app
            .post_json("/api/v1/auth/register", None, body.clone())
            .await?;
        response.assert_error(400, "BAD_REQUEST");
    }

    assert!(app.db().rows("users").await.is_empty());
    Ok(())
}

/// Malformed JSON is rejected inside the standard envelope.
#[tokio::test]
async fn test_register_malformed_json_returns_400_envelope() -> Result<(), anyhow::Error> {
    let app = TestApp::spawn()?;

    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/v1/auth/register")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{\"email\": "))?;
    let response = app.send(request).await?;

    response.assert_error(400, "BAD_REQUEST");
    Ok(())
}

// ============================================================================
// Login
// ============================================================================

/// Logging in again issues a fresh pair; the earlier session stays valid.
#[tokio::test]
async fn test_login_issues_new_pair_alongside_existing_session() -> Result<(), anyhow::Error> {
    let app = TestApp::spawn()?;
    let first = app.register(TEST_EMAIL_ALICE, TEST_PASSWORD).await?;

    let second = app.login("Alice@Example.com", TEST_PASSWORD).await?;

    assert_ne!(first.access_token, second.access_token);
    assert_ne!(first.refresh_token, second.refresh_token);
    assert_eq!(first.user_id, second.user_id);

    for token in [&first.access_token, &second.access_token] {
        app.get("/api/v1/users/me", Some(token))
            .await?
            .assert_success(200);
    }
    Ok(())
}

/// Wrong password and unknown email are indistinguishable.
#[tokio::test]
async fn test_login_failures_are_generic_401() -> Result<(), anyhow::Error> {
    let app = TestApp::spawn()?;
    app.register(TEST_EMAIL_ALICE, TEST_PASSWORD).await?;

    let wrong_password = app
        .post_json(
            "/api/v1/auth/login",
            None,
            json!({"email": TEST_EMAIL_ALICE, "password": TEST_WRONG_PASSWORD}),
        )
        .await?;
    let unknown_email = app
        .post_json(
            "/api/v1/auth/login",
            None,
            json!({"email": "nobody@example.com", "password": TEST_PASSWORD}),
        )
        .await?;

    wrong_password.assert_error(401, "INVALID_CREDENTIALS");
    unknown_email.assert_error(401, "INVALID_CREDENTIALS");
    assert_eq!(wrong_password.body["error"], unknown_email.body["error"]);
    assert!(wrong_password.refresh_set_cookie().is_none());
    assert_eq!(app.cache().count_with_prefix("access_hash:").await, 1);
    Ok(())
}

// ============================================================================
// Logout
// ============================================================================

/// Logout revokes the access token and the refresh token from the cookie,
/// and clears the cookie.
#[tokio::test]
async fn test_logout_revokes_both_tokens() -> Result<(), anyhow::Error> {
    let app = TestApp::spawn()?;
    let session = app.register(TEST_EMAIL_ALICE, TEST_PASSWORD).await?;

    let response = app
        .request(
            Method::POST,
            "/api/v1/auth/logout",
            Some(&session.access_token),
            Some(&session.refresh_token),
            None,
        )
        .await?;

    response.assert_success(200);
    let cleared = response.refresh_set_cookie().expect("cookie cleared");
    assert!(cleared.starts_with("refresh_token=;"));
    assert!(cleared.contains("Max-Age=0"));

    app.get("/api/v1/users/me", Some(&session.access_token))
        .await?
        .assert_error(401, "INVALID_TOKEN");
    assert_eq!(app.cache().count_with_prefix("refresh_hash:").await, 0);

    // The old refresh token cannot be used from a new session either
    let fresh = app.login(TEST_EMAIL_ALICE, TEST_PASSWORD).await?;
    app.refresh(&fresh.access_token, &session.refresh_token)
        .await?
        .assert_error(401, "INVALID_TOKEN");
    Ok(())
}

/// Logging out one session leaves the other one usable.
#[tokio::test]
async fn test_logout_leaves_other_sessions_alone() -> Result<(), anyhow::Error> {
    let app = TestApp::spawn()?;
    let first = app.register(TEST_EMAIL_ALICE, TEST_PASSWORD).await?;
    let second = app.login(TEST_EMAIL_ALICE, TEST_PASSWORD).await?;

    app.request(
        Method::POST,
        "/api/v1/auth/logout",
        Some(&first.access_token),
        Some(&first.refresh_token),
        None,
    )
    .await?
    .assert_success(200);

    app.get("/api/v1/users/me", Some(&second.access_token))
        .await?
        .assert_success(200);
    assert_eq!(
        app.refresh(&second.access_token, &second.refresh_token)
            .await?
            .status,
        StatusCode::OK
    );
    Ok(())
}

// ============================================================================
// Issuance failures
// ============================================================================

/// A cache outage during registration is a 500 and no token pair comes back.
#[tokio::test]
async fn test_register_cache_down_issues_no_pair() -> Result<(), anyhow::Error> {
    // Arrange
    let app = TestApp::spawn()?;
    app.cache().set_failing(true);

    // Act
    let response = app
        .post_json(
            "/api/v1/auth/register",
            None,
            json!({"email": TEST_EMAIL_ALICE, "password": TEST_PASSWORD}),
        )
        .await?;

    // Assert
    response.assert_error(500, "CACHE_ERROR");
    assert!(response.refresh_set_cookie().is_none());
    assert!(!response.text.contains("access_token"));

    app.cache().set_failing(false);
    assert_eq!(app.cache().count_with_prefix("access_hash:").await, 0);
    assert_eq!(app.cache().count_with_prefix("refresh_hash:").await, 0);
    Ok(())
}

/// A cache outage during login is a 500 and leaves only the registration's
/// entries behind.
#[tokio::test]
async fn test_login_cache_down_issues_no_pair() -> Result<(), anyhow::Error> {
    let app = TestApp::spawn()?;
    app.register(TEST_EMAIL_ALICE, TEST_PASSWORD).await?;
    app.cache().set_failing(true);

    let response = app
        .post_json(
            "/api/v1/auth/login",
            None,
            json!({"email": TEST_EMAIL_ALICE, "password": TEST_PASSWORD}),
        )
        .await?;

    response.assert_error(500, "CACHE_ERROR");
    assert!(response.refresh_set_cookie().is_none());

    app.cache().set_failing(false);
    assert_eq!(app.cache().count_with_prefix("access_hash:").await, 1);
    assert_eq!(app.cache().count_with_prefix("refresh_hash:").await, 1);
    Ok(())
}

/// A store failure during login is a server error, never a credentials
/// rejection.
#[tokio::test]
async fn test_login_store_down_is_server_error() -> Result<(), anyhow::Error> {
    let app = TestApp::spawn()?;
    app.register(TEST_EMAIL_ALICE, TEST_PASSWORD).await?;
    app.db().set_failing(true);

    let response = app
        .post_json(
            "/api/v1/auth/login",
            None,
            json!({"email": TEST_EMAIL_ALICE, "password": TEST_PASSWORD}),
        )
        .await?;

    response.assert_error(500, "DATABASE_ERROR");
    assert_ne!(response.error_code(), Some("INVALID_CREDENTIALS"));
    assert!(response.headers.get(header::WWW_AUTHENTICATE).is_none());
    Ok(())
}

/// When the refresh entry cannot be stored, the access entry stored just
/// before it is removed again.
#[tokio::test]
async fn test_login_refresh_store_failure_rolls_back_access_entry() -> Result<(), anyhow::Error> {
    // Arrange
    let app = TestApp::spawn()?;
    app.register(TEST_EMAIL_ALICE, TEST_PASSWORD).await?;
    app.cache().fail_store_after(1);

    // Act
    let response = app
        .post_json(
            "/api/v1/auth/login",
            None,
            json!({"email": TEST_EMAIL_ALICE, "password": TEST_PASSWORD}),
        )
        .await?;

    // Assert
    response.assert_error(500, "CACHE_ERROR");
    app.cache().reset_store_budget();
    assert_eq!(app.cache().count_with_prefix("access_hash:").await, 1);
    assert_eq!(app.cache().count_with_prefix("refresh_hash:").await, 1);
    Ok(())
}

#[tokio::test]
async fn test_register_refresh_store_failure_leaves_no_entries() -> Result<(), anyhow::Error> {
    let app = TestApp::spawn()?;
    app.cache().fail_store_after(1);

    app.post_json(
        "/api/v1/auth/register",
        None,
        json!({"email": TEST_EMAIL_ALICE, "password": TEST_PASSWORD}),
    )
    .await?
    .assert_error(500, "CACHE_ERROR");

    app.cache().reset_store_budget();
    assert_eq!(app.cache().count_with_prefix("access_hash:").await, 0);
    assert_eq!(app.cache().count_with_prefix("refresh_hash:").await, 0);
    Ok(())
}
