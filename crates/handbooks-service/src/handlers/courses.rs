use crate::errors::HbError;
use crate::handlers::response::{ApiResponse, JsonBody, Message, PathParams, QueryParams};
use crate::middleware::auth::Principal;
use crate::models::{Course, CourseRequest, ListParams};
use crate::routes::AppState;
use crate::services::content_service;
use axum::extract::State;
use std::sync::Arc;
use uuid::Uuid;

/// GET /api/v1/courses
pub async fn list_courses(
    State(state): State<Arc<AppState>>,
    _principal: Principal,
    QueryParams(params): QueryParams<ListParams>,
) -> Result<ApiResponse<Vec<Course>>, HbError> {
    let courses = content_service::list_courses(state.db.as_ref(), params).await?;
    Ok(ApiResponse::ok(courses))
}

/// POST /api/v1/courses
pub async fn create_course(
    State(state): State<Arc<AppState>>,
    principal: Principal,
    JsonBody(payload): JsonBody<CourseRequest>,
) -> Result<ApiResponse<Course>, HbError> {
    let course = content_service::create_course(state.db.as_ref(), &principal, payload).await?;
    Ok(ApiResponse::created(course))
}

/// GET /api/v1/courses/:course_id
pub async fn get_course(
    State(state): State<Arc<AppState>>,
    _principal: Principal,
    PathParams(course_id): PathParams<Uuid>,
) -> Result<ApiResponse<Course>, HbError> {
    let course = content_service::get_course(state.db.as_ref(), course_id).await?;
    Ok(ApiResponse::ok(course))
}

/// PUT /api/v1/courses/:course_id
pub async fn update_course(
    State(state): State<Arc<AppState>>,
    principal: Principal,
    PathParams(course_id): PathParams<Uuid>,
    JsonBody(payload): JsonBody<CourseRequest>,
) -> Result<ApiResponse<Course>, HbError> {
    let course =
        content_service::update_course(state.db.as_ref(), &principal, course_id, payload).await?;
    Ok(ApiResponse::ok(course))
}

/// DELETE /api/v1/courses/:course_id
pub async fn delete_course(
    State(state): State<Arc<AppState>>,
    principal: Principal,
    PathParams(course_id): PathParams<Uuid>,
) -> Result<ApiResponse<Message>, HbError> {
    content_service::delete_course(state.db.as_ref(), &principal, course_id).await?;
    Ok(ApiResponse::ok(Message {
        message: "Course deleted",
    }))
}
