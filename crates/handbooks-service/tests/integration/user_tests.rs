//! E2E tests for the current-user endpoints and admin user deletion.

use axum::http::Method;
use handbooks_service::models::Role;
use hb_test_utils::*;
use serde_json::json;

#[tokio::test]
async fn test_get_me_returns_profile_without_secrets() -> Result<(), anyhow::Error> {
    let app = TestApp::spawn()?;
    let alice = app.register(TEST_EMAIL_ALICE, TEST_PASSWORD).await?;

    let response = app.get("/api/v1/users/me", Some(&alice.access_token)).await?;

    response.assert_success(200);
    let profile = response.data();
    assert_eq!(profile["id"], alice.user_id.to_string());
    assert_eq!(profile["email"], TEST_EMAIL_ALICE);
    assert!(profile.get("password_hash").is_none());
    assert!(!response.text.contains("$2b$"));
    Ok(())
}

/// Profile updates touch only the profile fields.
#[tokio::test]
async fn test_update_me_changes_profile_only() -> Result<(), anyhow::Error> {
    let app = TestApp::spawn()?;
    let alice = app.register(TEST_EMAIL_ALICE, TEST_PASSWORD).await?;

    let response = app
        .patch_json(
            "/api/v1/users/me",
            Some(&alice.access_token),
            json!({
                "full_name": "Alice Pleasance",
                "avatar_url": "https://cdn.example.com/alice.png",
                "email": TEST_EMAIL_BOB,
                "role": "admin"
            }),
        )
        .await?;

    response.assert_success(200);
    let profile = response.data();
    assert_eq!(profile["full_name"], "Alice Pleasance");
    assert!(profile["slug"]
        .as_str()
        .unwrap()
        .starts_with("alice-pleasance-"));
    assert_eq!(profile["avatar_url"], "https://cdn.example.com/alice.png");
    assert_eq!(profile["email"], TEST_EMAIL_ALICE);
    assert_eq!(profile["role"], "student");

    // The password still works
    app.login(TEST_EMAIL_ALICE, TEST_PASSWORD).await?;
    Ok(())
}

#[tokio::test]
async fn test_update_me_blank_name_returns_400() -> Result<(), anyhow::Error> {
    let app = TestApp::spawn()?;
    let alice = app.register(TEST_EMAIL_ALICE, TEST_PASSWORD).await?;

    app.patch_json(
        "/api/v1/users/me",
        Some(&alice.access_token),
        json!({"full_name": "   "}),
    )
    .await?
    .assert_error(400, "BAD_REQUEST");
    Ok(())
}

/// Deleting the account revokes the session and the credentials.
#[tokio::test]
async fn test_delete_me_removes_account_and_session() -> Result<(), anyhow::Error> {
    let app = TestApp::spawn()?;
    let alice = app.register(TEST_EMAIL_ALICE, TEST_PASSWORD).await?;

    let response = app
        .request(
            Method::DELETE,
            "/api/v1/users/me",
            Some(&alice.access_token),
            Some(&alice.refresh_token),
            None,
        )
        .await?;

    response.assert_success(200);
    assert!(response
        .refresh_set_cookie()
        .unwrap()
        .contains("Max-Age=0"));
    assert!(app.db().rows("users").await.is_empty());
    assert_eq!(app.cache().count_with_prefix("refresh_hash:").await, 0);

    app.get("/api/v1/users/me", Some(&alice.access_token))
        .await?
        .assert_error(401, "INVALID_TOKEN");
    assert!(app.login(TEST_EMAIL_ALICE, TEST_PASSWORD).await.is_err());
    Ok(())
}

#[tokio::test]
async fn test_admin_delete_user() -> Result<(), anyhow::Error> {
    let app = TestApp::spawn()?;
    let alice = app.register(TEST_EMAIL_ALICE, TEST_PASSWORD).await?;
    let bob = app.register(TEST_EMAIL_BOB, TEST_PASSWORD).await?;
    let admin = app
        .create_user_with_role(TEST_EMAIL_ADMIN, TEST_PASSWORD, Role::Admin)
        .await?;
    let uri = format!("/api/v1/users/{}", bob.user_id);

    // Non-admins cannot delete other accounts
    let forbidden = app.delete(&uri, Some(&alice.access_token)).await?;
    forbidden.assert_error(403, "FORBIDDEN");

    app.delete(&uri, Some(&admin.access_token))
        .await?
        .assert_success(200);
    app.delete(&uri, Some(&admin.access_token))
        .await?
        .assert_error(404, "NOT_FOUND");

    assert_eq!(app.db().rows("users").await.len(), 2);
    Ok(())
}

/// Instructors are not admins.
#[tokio::test]
async fn test_instructor_cannot_delete_users() -> Result<(), anyhow::Error> {
    let app = TestApp::spawn()?;
    let alice = app.register(TEST_EMAIL_ALICE, TEST_PASSWORD).await?;
    let instructor = app
        .create_user_with_role("instructor@example.com", TEST_PASSWORD, Role::Instructor)
        .await?;

    app.delete(
        &format!("/api/v1/users/{}", alice.user_id),
        Some(&instructor.access_token),
    )
    .await?
    .assert_error(403, "FORBIDDEN");
    Ok(())
}
