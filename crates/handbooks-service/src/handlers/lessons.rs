use crate::errors::HbError;
use crate::handlers::response::{ApiResponse, JsonBody, Message, PathParams, QueryParams};
use crate::middleware::auth::Principal;
use crate::models::{Lesson, LessonRequest, ListParams};
use crate::routes::AppState;
use crate::services::content_service;
use axum::extract::State;
use std::sync::Arc;
use uuid::Uuid;

/// GET /api/v1/courses/:course_id/sections/:section_id/lessons
pub async fn list_lessons(
    State(state): State<Arc<AppState>>,
    _principal: Principal,
    PathParams((course_id, section_id)): PathParams<(Uuid, Uuid)>,
    QueryParams(params): QueryParams<ListParams>,
) -> Result<ApiResponse<Vec<Lesson>>, HbError> {
    let lessons =
        content_service::list_lessons(state.db.as_ref(), course_id, section_id, params).await?;
    Ok(ApiResponse::ok(lessons))
}

/// POST /api/v1/courses/:course_id/sections/:section_id/lessons
pub async fn create_lesson(
    State(state): State<Arc<AppState>>,
    principal: Principal,
    PathParams((course_id, section_id)): PathParams<(Uuid, Uuid)>,
    JsonBody(payload): JsonBody<LessonRequest>,
) -> Result<ApiResponse<Lesson>, HbError> {
    let lesson = content_service::create_lesson(
        state.db.as_ref(),
        &principal,
        course_id,
        section_id,
        payload,
    )
    .await?;
    Ok(ApiResponse::created(lesson))
}

/// GET /api/v1/courses/:course_id/sections/:section_id/lessons/:lesson_id
pub async fn get_lesson(
    State(state): State<Arc<AppState>>,
    _principal: Principal,
    PathParams((course_id, section_id, lesson_id)): PathParams<(Uuid, Uuid, Uuid)>,
) -> Result<ApiResponse<Lesson>, HbError> {
    let lesson =
        content_service::get_lesson(state.db.as_ref(), course_id, section_id, lesson_id).await?;
    Ok(ApiResponse::ok(lesson))
}

/// PUT /api/v1/courses/:course_id/sections/:section_id/lessons/:lesson_id
pub async fn update_lesson(
    State(state): State<Arc<AppState>>,
    principal: Principal,
    PathParams((course_id, section_id, lesson_id)): PathParams<(Uuid, Uuid, Uuid)>,
    JsonBody(payload): JsonBody<LessonRequest>,
) -> Result<ApiResponse<Lesson>, HbError> {
    let lesson = content_service::update_lesson(
        state.db.as_ref(),
        &principal,
        course_id,
        section_id,
        lesson_id,
        payload,
    )
    .await?;
    Ok(ApiResponse::ok(lesson))
}

/// DELETE /api/v1/courses/:course_id/sections/:section_id/lessons/:lesson_id
pub async fn delete_lesson(
    State(state): State<Arc<AppState>>,
    principal: Principal,
    PathParams((course_id, section_id, lesson_id)): PathParams<(Uuid, Uuid, Uuid)>,
) -> Result<ApiResponse<Message>, HbError> {
    content_service::delete_lesson(
        state.db.as_ref(),
        &principal,
        course_id,
        section_id,
        lesson_id,
    )
    .await?;
    Ok(ApiResponse::ok(Message {
        message: "Lesson deleted",
    }))
}
