//! E2E tests for course, section and lesson management.
//!
//! Reads are open to any authenticated user. Writes require the creator of
//! the record (or of its parent, when creating children) or an admin.

use handbooks_service::models::Role;
use hb_test_utils::*;
use serde_json::{json, Value};

async fn create_course(app: &TestApp, token: &str, title: &str) -> Result<Value, anyhow::Error> {
    let response = app
        .post_json("/api/v1/courses", Some(token), json!({"title": title}))
        .await?;
    response.assert_success(201);
    Ok(response.data().clone())
}

async fn create_section(
    app: &TestApp,
    token: &str,
    course_id: &str,
    body: Value,
) -> Result<Value, anyhow::Error> {
    let response = app
        .post_json(
            &format!("/api/v1/courses/{course_id}/sections"),
            Some(token),
            body,
        )
        .await?;
    response.assert_success(201);
    Ok(response.data().clone())
}

// ============================================================================
// Courses
// ============================================================================

#[tokio::test]
async fn test_create_course_sets_server_fields() -> Result<(), anyhow::Error> {
    let app = TestApp::spawn()?;
    let alice = app.register(TEST_EMAIL_ALICE, TEST_PASSWORD).await?;

    let response = app
        .post_json(
            "/api/v1/courses",
            Some(&alice.access_token),
            json!({
                "title": "Intro to Rust!",
                "price_cents": 4900,
                "currency": "eur",
                "level": "intermediate"
            }),
        )
        .await?;

    response.assert_success(201);
    let course = response.data();
    assert_eq!(course["slug"], "intro-to-rust");
    assert_eq!(course["created_by"], alice.user_id.to_string());
    assert_eq!(course["status"], "draft");
    assert_eq!(course["currency"], "EUR");
    assert_eq!(course["level"], "intermediate");
    assert_eq!(course["price_cents"], 4900);
    assert!(course.get("author_name").is_none());
    Ok(())
}

#[tokio::test]
async fn test_create_course_invalid_body_returns_400() -> Result<(), anyhow::Error> {
    let app = TestApp::spawn()?;
    let alice = app.register(TEST_EMAIL_ALICE, TEST_PASSWORD).await?;

    for body in [
        json!({}),
        json!({"title": "  "}),
        json!({"title": "Rust", "price_cents": -1}),
        json!({"title": "Rust", "level": "expert"}),
        json!({"title": "Rust", "status": "live"}),
    ] {
        app.post_json("/api/v1/courses", Some(&alice.access_token), body)
            .await?
            .assert_error(400, "BAD_REQUEST");
    }
    assert!(app.db().rows("courses").await.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_get_and_list_courses() -> Result<(), anyhow::Error> {
    let app = TestApp::spawn()?;
    let alice = app.register(TEST_EMAIL_ALICE, TEST_PASSWORD).await?;
    let bob = app.register(TEST_EMAIL_BOB, TEST_PASSWORD).await?;
    let course = create_course(&app, &alice.access_token, "Ownership").await?;
    create_course(&app, &alice.access_token, "Borrowing").await?;
    create_course(&app, &alice.access_token, "Lifetimes").await?;

    // Any authenticated user can read
    let fetched = app
        .get(
            &format!("/api/v1/courses/{}", course["id"].as_str().unwrap()),
            Some(&bob.access_token),
        )
        .await?;
    fetched.assert_success(200);
    assert_eq!(fetched.data()["title"], "Ownership");

    let all = app.get("/api/v1/courses", Some(&bob.access_token)).await?;
    all.assert_success(200);
    assert_eq!(all.data().as_array().unwrap().len(), 3);

    let page = app
        .get("/api/v1/courses?limit=2&offset=2", Some(&bob.access_token))
        .await?;
    page.assert_success(200);
    assert_eq!(page.data().as_array().unwrap().len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_list_courses_bad_query_returns_400() -> Result<(), anyhow::Error> {
    let app = TestApp::spawn()?;
    let alice = app.register(TEST_EMAIL_ALICE, TEST_PASSWORD).await?;

    app.get("/api/v1/courses?limit=abc", Some(&alice.access_token))
        .await?
        .assert_error(400, "BAD_REQUEST");
    Ok(())
}

#[tokio::test]
async fn test_get_missing_course_returns_404() -> Result<(), anyhow::Error> {
    let app = TestApp::spawn()?;
    let alice = app.register(TEST_EMAIL_ALICE, TEST_PASSWORD).await?;

    let response = app
        .get(
            &format!("/api/v1/courses/{MISSING_COURSE_ID}"),
            Some(&alice.access_token),
        )
        .await?;

    response.assert_error(404, "NOT_FOUND");
    assert_eq!(response.error_message(), Some("Course not found"));
    Ok(())
}

#[tokio::test]
async fn test_delete_missing_course_returns_404() -> Result<(), anyhow::Error> {
    let app = TestApp::spawn()?;
    let alice = app.register(TEST_EMAIL_ALICE, TEST_PASSWORD).await?;

    app.delete(
        &format!("/api/v1/courses/{MISSING_COURSE_ID}"),
        Some(&alice.access_token),
    )
    .await?
    .assert_error(404, "NOT_FOUND");
    Ok(())
}

#[tokio::test]
async fn test_malformed_path_id_returns_400() -> Result<(), anyhow::Error> {
    let app = TestApp::spawn()?;
    let alice = app.register(TEST_EMAIL_ALICE, TEST_PASSWORD).await?;

    app.get("/api/v1/courses/not-a-uuid", Some(&alice.access_token))
        .await?
        .assert_error(400, "BAD_REQUEST");
    Ok(())
}

/// Updates merge the provided fields and never change id or creator.
#[tokio::test]
async fn test_update_course_keeps_identity_and_creator() -> Result<(), anyhow::Error> {
    let app = TestApp::spawn()?;
    let alice = app.register(TEST_EMAIL_ALICE, TEST_PASSWORD).await?;
    let course = create_course(&app, &alice.access_token, "Ownership").await?;
    let course_id = course["id"].as_str().unwrap();

    let response = app
        .put_json(
            &format!("/api/v1/courses/{course_id}"),
            Some(&alice.access_token),
            json!({
                "id": TEST_USER_BOB.to_string(),
                "created_by": TEST_USER_BOB.to_string(),
                "title": "Ownership in Depth",
                "status": "published"
            }),
        )
        .await?;

    response.assert_success(200);
    let updated = response.data();
    assert_eq!(updated["id"], course_id);
    assert_eq!(updated["created_by"], alice.user_id.to_string());
    assert_eq!(updated["title"], "Ownership in Depth");
    assert_eq!(updated["slug"], "ownership-in-depth");
    assert_eq!(updated["status"], "published");
    assert_eq!(updated["created_at"], course["created_at"]);

    let stored = app
        .get(
            &format!("/api/v1/courses/{course_id}"),
            Some(&alice.access_token),
        )
        .await?;
    assert_eq!(stored.data()["created_by"], alice.user_id.to_string());
    assert_eq!(stored.data()["title"], "Ownership in Depth");
    Ok(())
}

#[tokio::test]
async fn test_course_writes_require_creator_or_admin() -> Result<(), anyhow::Error> {
    let app = TestApp::spawn()?;
    let alice = app.register(TEST_EMAIL_ALICE, TEST_PASSWORD).await?;
    let bob = app.register(TEST_EMAIL_BOB, TEST_PASSWORD).await?;
    let admin = app
        .create_user_with_role(TEST_EMAIL_ADMIN, TEST_PASSWORD, Role::Admin)
        .await?;
    let course = create_course(&app, &alice.access_token, "Ownership").await?;
    let uri = format!("/api/v1/courses/{}", course["id"].as_str().unwrap());

    app.put_json(&uri, Some(&bob.access_token), json!({"title": "Mine now"}))
        .await?
        .assert_error(403, "FORBIDDEN");
    app.delete(&uri, Some(&bob.access_token))
        .await?
        .assert_error(403, "FORBIDDEN");

    app.put_json(&uri, Some(&admin.access_token), json!({"position": 3}))
        .await?
        .assert_success(200);
    app.delete(&uri, Some(&admin.access_token))
        .await?
        .assert_success(200);
    app.get(&uri, Some(&alice.access_token))
        .await?
        .assert_error(404, "NOT_FOUND");
    Ok(())
}

// ============================================================================
// Sections
// ============================================================================

#[tokio::test]
async fn test_sections_are_listed_in_position_order() -> Result<(), anyhow::Error> {
    let app = TestApp::spawn()?;
    let alice = app.register(TEST_EMAIL_ALICE, TEST_PASSWORD).await?;
    let course = create_course(&app, &alice.access_token, "Ownership").await?;
    let course_id = course["id"].as_str().unwrap();

    for (title, position) in [("Third", 3), ("First", 1), ("Second", 2)] {
        let section = create_section(
            &app,
            &alice.access_token,
            course_id,
            json!({"title": title, "position": position}),
        )
        .await?;
        assert_eq!(section["course_id"], course_id);
    }

    let response = app
        .get(
            &format!("/api/v1/courses/{course_id}/sections"),
            Some(&alice.access_token),
        )
        .await?;

    response.assert_success(200);
    let titles: Vec<&str> = response
        .data()
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["title"].as_str().unwrap())
        .collect();
    assert_eq!(titles, vec!["First", "Second", "Third"]);
    Ok(())
}

#[tokio::test]
async fn test_sections_of_missing_course_return_404() -> Result<(), anyhow::Error> {
    let app = TestApp::spawn()?;
    let alice = app.register(TEST_EMAIL_ALICE, TEST_PASSWORD).await?;

    let uri = format!("/api/v1/courses/{MISSING_COURSE_ID}/sections");
    app.get(&uri, Some(&alice.access_token))
        .await?
        .assert_error(404, "NOT_FOUND");
    let response = app
        .post_json(&uri, Some(&alice.access_token), json!({"title": "Orphan"}))
        .await?;
    response.assert_error(404, "NOT_FOUND");
    assert_eq!(response.error_message(), Some("Course not found"));
    Ok(())
}

/// Only the course creator (or an admin) may add sections.
#[tokio::test]
async fn test_create_section_requires_course_owner() -> Result<(), anyhow::Error> {
    let app = TestApp::spawn()?;
    let alice = app.register(TEST_EMAIL_ALICE, TEST_PASSWORD).await?;
    let bob = app.register(TEST_EMAIL_BOB, TEST_PASSWORD).await?;
    let course = create_course(&app, &alice.access_token, "Ownership").await?;

    app.post_json(
        &format!("/api/v1/courses/{}/sections", course["id"].as_str().unwrap()),
        Some(&bob.access_token),
        json!({"title": "Intruder"}),
    )
    .await?
    .assert_error(403, "FORBIDDEN");
    assert!(app.db().rows("sections").await.is_empty());
    Ok(())
}

/// A section is only reachable under its own course.
#[tokio::test]
async fn test_section_under_wrong_course_returns_404() -> Result<(), anyhow::Error> {
    let app = TestApp::spawn()?;
    let alice = app.register(TEST_EMAIL_ALICE, TEST_PASSWORD).await?;
    let course_a = create_course(&app, &alice.access_token, "A").await?;
    let course_b = create_course(&app, &alice.access_token, "B").await?;
    let section = create_section(
        &app,
        &alice.access_token,
        course_a["id"].as_str().unwrap(),
        json!({"title": "Only in A"}),
    )
    .await?;

    let response = app
        .get(
            &format!(
                "/api/v1/courses/{}/sections/{}",
                course_b["id"].as_str().unwrap(),
                section["id"].as_str().unwrap()
            ),
            Some(&alice.access_token),
        )
        .await?;

    response.assert_error(404, "NOT_FOUND");
    assert_eq!(response.error_message(), Some("Section not found"));
    Ok(())
}

#[tokio::test]
async fn test_update_and_delete_section() -> Result<(), anyhow::Error> {
    let app = TestApp::spawn()?;
    let alice = app.register(TEST_EMAIL_ALICE, TEST_PASSWORD).await?;
    let course = create_course(&app, &alice.access_token, "Ownership").await?;
    let course_id = course["id"].as_str().unwrap();
    let section = create_section(
        &app,
        &alice.access_token,
        course_id,
        json!({"title": "Basics"}),
    )
    .await?;
    let uri = format!(
        "/api/v1/courses/{course_id}/sections/{}",
        section["id"].as_str().unwrap()
    );

    let updated = app
        .put_json(
            &uri,
            Some(&alice.access_token),
            json!({"title": "The Basics", "is_free_preview": true, "estimated_minutes": 45}),
        )
        .await?;
    updated.assert_success(200);
    assert_eq!(updated.data()["slug"], "the-basics");
    assert_eq!(updated.data()["is_free_preview"], true);
    assert_eq!(updated.data()["estimated_minutes"], 45);
    assert_eq!(updated.data()["course_id"], course_id);

    app.put_json(
        &uri,
        Some(&alice.access_token),
        json!({"estimated_minutes": -5}),
    )
    .await?
    .assert_error(400, "BAD_REQUEST");

    app.delete(&uri, Some(&alice.access_token))
        .await?
        .assert_success(200);
    app.delete(&uri, Some(&alice.access_token))
        .await?
        .assert_error(404, "NOT_FOUND");
    Ok(())
}

// ============================================================================
// Lessons
// ============================================================================

#[tokio::test]
async fn test_lesson_lifecycle() -> Result<(), anyhow::Error> {
    let app = TestApp::spawn()?;
    let alice = app.register(TEST_EMAIL_ALICE, TEST_PASSWORD).await?;
    let bob = app.register(TEST_EMAIL_BOB, TEST_PASSWORD).await?;
    let course = create_course(&app, &alice.access_token, "Ownership").await?;
    let course_id = course["id"].as_str().unwrap();
    let section = create_section(
        &app,
        &alice.access_token,
        course_id,
        json!({"title": "Basics"}),
    )
    .await?;
    let lessons_uri = format!(
        "/api/v1/courses/{course_id}/sections/{}/lessons",
        section["id"].as_str().unwrap()
    );

    // Create
    let created = app
        .post_json(
            &lessons_uri,
            Some(&alice.access_token),
            json!({"title": "Moves", "kind": "video", "duration_sec": 600}),
        )
        .await?;
    created.assert_success(201);
    let lesson = created.data().clone();
    assert_eq!(lesson["kind"], "video");
    assert_eq!(lesson["section_id"], section["id"]);
    assert_eq!(lesson["is_published"], false);

    // Others cannot add lessons to alice's section
    app.post_json(&lessons_uri, Some(&bob.access_token), json!({"title": "Spam"}))
        .await?
        .assert_error(403, "FORBIDDEN");

    // Read
    let lesson_uri = format!("{lessons_uri}/{}", lesson["id"].as_str().unwrap());
    app.get(&lesson_uri, Some(&bob.access_token))
        .await?
        .assert_success(200);
    let listed = app.get(&lessons_uri, Some(&bob.access_token)).await?;
    assert_eq!(listed.data().as_array().unwrap().len(), 1);

    // Update
    let updated = app
        .put_json(
            &lesson_uri,
            Some(&alice.access_token),
            json!({"is_published": true, "content": "Moving a value transfers ownership."}),
        )
        .await?;
    updated.assert_success(200);
    assert_eq!(updated.data()["is_published"], true);
    assert_eq!(updated.data()["title"], "Moves");
    assert_eq!(updated.data()["created_by"], alice.user_id.to_string());

    app.put_json(&lesson_uri, Some(&alice.access_token), json!({"kind": "podcast"}))
        .await?
        .assert_error(400, "BAD_REQUEST");

    // Delete
    app.delete(&lesson_uri, Some(&bob.access_token))
        .await?
        .assert_error(403, "FORBIDDEN");
    app.delete(&lesson_uri, Some(&alice.access_token))
        .await?
        .assert_success(200);
    let response = app.get(&lesson_uri, Some(&alice.access_token)).await?;
    response.assert_error(404, "NOT_FOUND");
    assert_eq!(response.error_message(), Some("Lesson not found"));
    Ok(())
}

#[tokio::test]
async fn test_lessons_of_missing_section_return_404() -> Result<(), anyhow::Error> {
    let app = TestApp::spawn()?;
    let alice = app.register(TEST_EMAIL_ALICE, TEST_PASSWORD).await?;
    let course = create_course(&app, &alice.access_token, "Ownership").await?;

    let response = app
        .get(
            &format!(
                "/api/v1/courses/{}/sections/{MISSING_SECTION_ID}/lessons",
                course["id"].as_str().unwrap()
            ),
            Some(&alice.access_token),
        )
        .await?;

    response.assert_error(404, "NOT_FOUND");
    assert_eq!(response.error_message(), Some("Section not found"));
    Ok(())
}

#[tokio::test]
async fn test_get_missing_lesson_returns_404() -> Result<(), anyhow::Error> {
    let app = TestApp::spawn()?;
    let alice = app.register(TEST_EMAIL_ALICE, TEST_PASSWORD).await?;
    let course = create_course(&app, &alice.access_token, "Ownership").await?;
    let course_id = course["id"].as_str().unwrap();
    let section = create_section(&app, &alice.access_token, course_id, json!({"title": "S"}))
        .await?;

    app.get(
        &format!(
            "/api/v1/courses/{course_id}/sections/{}/lessons/{MISSING_LESSON_ID}",
            section["id"].as_str().unwrap()
        ),
        Some(&alice.access_token),
    )
    .await?
    .assert_error(404, "NOT_FOUND");
    Ok(())
}
