use crate::errors::HbError;
use crate::handlers::response::{ApiResponse, JsonBody, Message, PathParams, QueryParams};
use crate::middleware::auth::Principal;
use crate::models::{ListParams, Section, SectionRequest};
use crate::routes::AppState;
use crate::services::content_service;
use axum::extract::State;
use std::sync::Arc;
use uuid::Uuid;

/// GET /api/v1/courses/:course_id/sections
pub async fn list_sections(
    State(state): State<Arc<AppState>>,
    _principal: Principal,
    PathParams(course_id): PathParams<Uuid>,
    QueryParams(params): QueryParams<ListParams>,
) -> Result<ApiResponse<Vec<Section>>, HbError> {
    let sections = content_service::list_sections(state.db.as_ref(), course_id, params).await?;
    Ok(ApiResponse::ok(sections))
}

/// POST /api/v1/courses/:course_id/sections
pub async fn create_section(
    State(state): State<Arc<AppState>>,
    principal: Principal,
    PathParams(course_id): PathParams<Uuid>,
    JsonBody(payload): JsonBody<SectionRequest>,
) -> Result<ApiResponse<Section>, HbError> {
    let section =
        content_service::create_section(state.db.as_ref(), &principal, course_id, payload).await?;
    Ok(ApiResponse::created(section))
}

/// GET /api/v1/courses/:course_id/sections/:section_id
pub async fn get_section(
    State(state): State<Arc<AppState>>,
    _principal: Principal,
    PathParams((course_id, section_id)): PathParams<(Uuid, Uuid)>,
) -> Result<ApiResponse<Section>, HbError> {
    let section = content_service::get_section(state.db.as_ref(), course_id, section_id).await?;
    Ok(ApiResponse::ok(section))
}

/// PUT /api/v1/courses/:course_id/sections/:section_id
pub async fn update_section(
    State(state): State<Arc<AppState>>,
    principal: Principal,
    PathParams((course_id, section_id)): PathParams<(Uuid, Uuid)>,
    JsonBody(payload): JsonBody<SectionRequest>,
) -> Result<ApiResponse<Section>, HbError> {
    let section = content_service::update_section(
        state.db.as_ref(),
        &principal,
        course_id,
        section_id,
        payload,
    )
    .await?;
    Ok(ApiResponse::ok(section))
}

/// DELETE /api/v1/courses/:course_id/sections/:section_id
pub async fn delete_section(
    State(state): State<Arc<AppState>>,
    principal: Principal,
    PathParams((course_id, section_id)): PathParams<(Uuid, Uuid)>,
) -> Result<ApiResponse<Message>, HbError> {
    content_service::delete_section(state.db.as_ref(), &principal, course_id, section_id).await?;
    Ok(ApiResponse::ok(Message {
        message: "Section deleted",
    }))
}
