//! E2E tests for refresh token rotation.
//!
//! Refresh requires a live access token plus the refresh cookie. Each
//! refresh token is single-use: rotating it revokes the old pair.

use axum::http::{Method, StatusCode};
use common::jwt::TokenKind;
use handbooks_service::cache::token_key;
use handbooks_service::services::session_service::INVALID_REFRESH_MESSAGE;
use hb_test_utils::*;
use std::time::Duration;

#[tokio::test]
async fn test_refresh_rotates_the_pair() -> Result<(), anyhow::Error> {
    // Arrange
    let app = TestApp::spawn()?;
    let session = app.register(TEST_EMAIL_ALICE, TEST_PASSWORD).await?;

    // Act
    let response = app
        .refresh(&session.access_token, &session.refresh_token)
        .await?;

    // Assert
    response.assert_success(200);
    let new_access = response.data()["access_token"].as_str().unwrap().to_string();
    let new_refresh = response.refresh_cookie().expect("rotated cookie");
    assert_ne!(new_access, session.access_token);
    assert_ne!(new_refresh, session.refresh_token);
    assert!(response.data().get("refresh_token").is_none());
    new_access.assert_kind("access").assert_expires_in(900);

    // The old access token is revoked, the new one works
    app.get("/api/v1/users/me", Some(&session.access_token))
        .await?
        .assert_error(401, "INVALID_TOKEN");
    app.get("/api/v1/users/me", Some(&new_access))
        .await?
        .assert_success(200);

    assert_eq!(app.cache().count_with_prefix("access_hash:").await, 1);
    assert_eq!(app.cache().count_with_prefix("refresh_hash:").await, 1);
    Ok(())
}

/// The rotated refresh entry lives for the refresh lifetime, not the
/// access lifetime.
#[tokio::test]
async fn test_refresh_new_entries_use_their_own_lifetimes() -> Result<(), anyhow::Error> {
    let app = TestApp::spawn()?;
    let session = app.register(TEST_EMAIL_ALICE, TEST_PASSWORD).await?;

    let response = app
        .refresh(&session.access_token, &session.refresh_token)
        .await?;
    let new_access = response.data()["access_token"].as_str().unwrap().to_string();
    let new_refresh = response.refresh_cookie().unwrap();

    assert_eq!(
        app.cache()
            .ttl_of(&token_key(TokenKind::Refresh, &new_refresh))
            .await,
        Some(Duration::from_secs(604_800))
    );
    assert_eq!(
        app.cache()
            .ttl_of(&token_key(TokenKind::Access, &new_access))
            .await,
        Some(Duration::from_secs(900))
    );
    assert!(response
        .refresh_set_cookie()
        .unwrap()
        .contains("Max-Age=604800"));
    Ok(())
}

/// A consumed refresh token cannot be used again, even with a valid access
/// token.
#[tokio::test]
async fn test_refresh_token_is_single_use() -> Result<(), anyhow::Error> {
    let app = TestApp::spawn()?;
    let session = app.register(TEST_EMAIL_ALICE, TEST_PASSWORD).await?;

    let first = app
        .refresh(&session.access_token, &session.refresh_token)
        .await?;
    first.assert_success(200);
    let new_access = first.data()["access_token"].as_str().unwrap().to_string();

    let replay = app.refresh(&new_access, &session.refresh_token).await?;

    replay.assert_error(401, "INVALID_TOKEN");
    assert_eq!(replay.error_message(), Some(INVALID_REFRESH_MESSAGE));
    Ok(())
}

/// Two concurrent refreshes with the same token: exactly one wins.
#[tokio::test]
async fn test_concurrent_refresh_has_single_winner() -> Result<(), anyhow::Error> {
    let app = TestApp::spawn()?;
    let session = app.register(TEST_EMAIL_ALICE, TEST_PASSWORD).await?;

    let (a, b) = tokio::join!(
        app.refresh(&session.access_token, &session.refresh_token),
        app.refresh(&session.access_token, &session.refresh_token),
    );
    let statuses = [a?.status, b?.status];

    let successes = statuses.iter().filter(|s| **s == StatusCode::OK).count();
    let rejections = statuses
        .iter()
        .filter(|s| **s == StatusCode::UNAUTHORIZED)
        .count();
    assert_eq!(successes, 1, "statuses: {statuses:?}");
    assert_eq!(rejections, 1, "statuses: {statuses:?}");
    assert_eq!(app.cache().count_with_prefix("refresh_hash:").await, 1);
    Ok(())
}

#[tokio::test]
async fn test_refresh_without_cookie_returns_401() -> Result<(), anyhow::Error> {
    let app = TestApp::spawn()?;
    let session = app.register(TEST_EMAIL_ALICE, TEST_PASSWORD).await?;

    let response = app
        .request(
            Method::POST,
            "/api/v1/auth/refresh",
            Some(&session.access_token),
            None,
            None,
        )
        .await?;

    response.assert_error(401, "INVALID_TOKEN");
    Ok(())
}

/// Refresh is behind the gate: a refresh cookie alone is not enough.
#[tokio::test]
async fn test_refresh_without_access_token_returns_401() -> Result<(), anyhow::Error> {
    let app = TestApp::spawn()?;
    let session = app.register(TEST_EMAIL_ALICE, TEST_PASSWORD).await?;

    let response = app
        .request(
            Method::POST,
            "/api/v1/auth/refresh",
            None,
            Some(&session.refresh_token),
            None,
        )
        .await?;

    response.assert_error(401, "INVALID_TOKEN");
    // The refresh token was not consumed
    assert_eq!(app.cache().count_with_prefix("refresh_hash:").await, 1);
    Ok(())
}

#[tokio::test]
async fn test_refresh_with_access_token_in_cookie_returns_401() -> Result<(), anyhow::Error> {
    let app = TestApp::spawn()?;
    let session = app.register(TEST_EMAIL_ALICE, TEST_PASSWORD).await?;

    let response = app
        .refresh(&session.access_token, &session.access_token)
        .await?;

    response.assert_error(401, "INVALID_TOKEN");
    assert_eq!(response.error_message(), Some(INVALID_REFRESH_MESSAGE));
    Ok(())
}

/// Another user's refresh token is rejected and left untouched.
#[tokio::test]
async fn test_refresh_with_other_users_token_returns_401() -> Result<(), anyhow::Error> {
    let app = TestApp::spawn()?;
    let alice = app.register(TEST_EMAIL_ALICE, TEST_PASSWORD).await?;
    let bob = app.register(TEST_EMAIL_BOB, TEST_PASSWORD).await?;

    app.refresh(&alice.access_token, &bob.refresh_token)
        .await?
        .assert_error(401, "INVALID_TOKEN");

    app.refresh(&bob.access_token, &bob.refresh_token)
        .await?
        .assert_success(200);
    Ok(())
}

/// A forged refresh token that was never stored is rejected.
#[tokio::test]
async fn test_refresh_with_unissued_token_returns_401() -> Result<(), anyhow::Error> {
    let app = TestApp::spawn()?;
    let session = app.register(TEST_EMAIL_ALICE, TEST_PASSWORD).await?;

    let forged = TestTokenBuilder::new()
        .for_user(session.user_id)
        .with_kind(TokenKind::Refresh)
        .build();

    app.refresh(&session.access_token, &forged)
        .await?
        .assert_error(401, "INVALID_TOKEN");

    // The caller's own session is unaffected
    app.get("/api/v1/users/me", Some(&session.access_token))
        .await?
        .assert_success(200);
    Ok(())
}

/// Once the old refresh entry is consumed, a failure to store the new pair
/// is a 500 and the old tokens stay dead.
#[tokio::test]
async fn test_refresh_store_failure_after_consume_is_server_error() -> Result<(), anyhow::Error> {
    // Arrange
    let app = TestApp::spawn()?;
    let session = app.register(TEST_EMAIL_ALICE, TEST_PASSWORD).await?;
    app.cache().fail_store_after(0);

    // Act
    let response = app
        .refresh(&session.access_token, &session.refresh_token)
        .await?;

    // Assert
    response.assert_error(500, "CACHE_ERROR");
    assert!(response.refresh_set_cookie().is_none());
    app.cache().reset_store_budget();
    assert_eq!(app.cache().count_with_prefix("access_hash:").await, 0);
    assert_eq!(app.cache().count_with_prefix("refresh_hash:").await, 0);

    app.get("/api/v1/users/me", Some(&session.access_token))
        .await?
        .assert_error(401, "INVALID_TOKEN");

    // A fresh login cannot revive the consumed refresh token
    let relogin = app.login(TEST_EMAIL_ALICE, TEST_PASSWORD).await?;
    let retry = app
        .refresh(&relogin.access_token, &session.refresh_token)
        .await?;
    retry.assert_error(401, "INVALID_TOKEN");
    assert_eq!(retry.error_message(), Some(INVALID_REFRESH_MESSAGE));
    Ok(())
}

/// A refresh whose new refresh entry cannot be stored leaves no half pair.
#[tokio::test]
async fn test_refresh_rolls_back_new_access_entry() -> Result<(), anyhow::Error> {
    let app = TestApp::spawn()?;
    let session = app.register(TEST_EMAIL_ALICE, TEST_PASSWORD).await?;
    app.cache().fail_store_after(1);

    app.refresh(&session.access_token, &session.refresh_token)
        .await?
        .assert_error(500, "CACHE_ERROR");

    app.cache().reset_store_budget();
    assert_eq!(app.cache().count_with_prefix("access_hash:").await, 0);
    assert_eq!(app.cache().count_with_prefix("refresh_hash:").await, 0);
    Ok(())
}
