//! E2E tests for the operational endpoints.

use axum::http::StatusCode;
use hb_test_utils::*;

#[tokio::test]
async fn test_health_reports_dependencies() -> Result<(), anyhow::Error> {
    let app = TestApp::spawn()?;

    let response = app.get("/health", None).await?;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["status"], "healthy");
    assert_eq!(response.body["database"], "healthy");
    assert_eq!(response.body["cache"], "healthy");
    Ok(())
}

#[tokio::test]
async fn test_health_cache_down_returns_503() -> Result<(), anyhow::Error> {
    let app = TestApp::spawn()?;
    app.cache().set_failing(true);

    let response = app.get("/health", None).await?;

    assert_eq!(response.status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(response.body["status"], "unhealthy");
    assert_eq!(response.body["database"], "healthy");
    assert_eq!(response.body["cache"], "unhealthy");
    Ok(())
}

#[tokio::test]
async fn test_health_database_down_returns_503() -> Result<(), anyhow::Error> {
    let app = TestApp::spawn()?;
    app.db().set_failing(true);

    let response = app.get("/health", None).await?;

    assert_eq!(response.status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(response.body["database"], "unhealthy");
    Ok(())
}

/// A store outage surfaces as a generic 500 in the envelope.
#[tokio::test]
async fn test_database_failure_returns_generic_500() -> Result<(), anyhow::Error> {
    let app = TestApp::spawn()?;
    let alice = app.register(TEST_EMAIL_ALICE, TEST_PASSWORD).await?;
    app.db().set_failing(true);

    let response = app.get("/api/v1/courses", Some(&alice.access_token)).await?;

    response.assert_error(500, "DATABASE_ERROR");
    assert_eq!(
        response.error_message(),
        Some("An internal database error occurred")
    );
    Ok(())
}

#[tokio::test]
async fn test_metrics_endpoint_is_public() -> Result<(), anyhow::Error> {
    let app = TestApp::spawn()?;

    let response = app.get("/metrics", None).await?;

    assert_eq!(response.status, StatusCode::OK);
    Ok(())
}
