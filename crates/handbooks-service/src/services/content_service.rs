//! Course, section and lesson operations.
//!
//! Any authenticated user may create a course. Changing or deleting a
//! record, or adding children to it, is limited to its creator and admins.
//! Lookups happen before ownership checks, so a missing record is always
//! 404 whoever asks.

use crate::errors::HbError;
use crate::middleware::auth::Principal;
use crate::models::{
    Course, CourseRequest, Lesson, LessonRequest, ListParams, Section, SectionRequest,
};
use crate::repositories::{mapper, Filter, Order, Querier, SqlValue};
use chrono::Utc;
use tracing::instrument;
use uuid::Uuid;

fn rename_not_found(what: &'static str) -> impl Fn(HbError) -> HbError {
    move |e| match e {
        HbError::NotFound(_) => HbError::NotFound(format!("{} not found", what)),
        other => other,
    }
}

fn ensure_can_modify(principal: &Principal, created_by: Uuid, what: &str) -> Result<(), HbError> {
    if principal.can_modify(created_by) {
        Ok(())
    } else {
        tracing::debug!(target: "hb.content", role = %principal.role, record = what, "Ownership check failed");
        Err(HbError::Forbidden(format!(
            "Only the creator or an admin can modify this {}",
            what
        )))
    }
}

fn paged(filter: Filter, params: ListParams) -> Filter {
    let (limit, offset) = params.resolve();
    filter.limit(limit).offset(offset)
}

// ============================================================================
// Courses
// ============================================================================

pub async fn list_courses(db: &dyn Querier, params: ListParams) -> Result<Vec<Course>, HbError> {
    mapper::get_all::<Course>(db, paged(Filter::new(), params)).await
}

pub async fn get_course(db: &dyn Querier, course_id: Uuid) -> Result<Course, HbError> {
    mapper::get_one::<Course>(db, Filter::by_id(course_id))
        .await
        .map_err(rename_not_found("Course"))
}

#[instrument(skip_all)]
pub async fn create_course(
    db: &dyn Querier,
    principal: &Principal,
    req: CourseRequest,
) -> Result<Course, HbError> {
    let course = req.into_course(principal.user_id, Utc::now())?;
    mapper::create(db, &course).await?;

    tracing::info!(target: "hb.content", course_id = %course.id, "Course created");
    Ok(course)
}

#[instrument(skip_all, fields(course_id = %course_id))]
pub async fn update_course(
    db: &dyn Querier,
    principal: &Principal,
    course_id: Uuid,
    req: CourseRequest,
) -> Result<Course, HbError> {
    let mut course = get_course(db, course_id).await?;
    ensure_can_modify(principal, course.created_by, "course")?;

    course.apply(req, Utc::now())?;
    mapper::update(db, &course, Filter::by_id(course_id))
        .await
        .map_err(rename_not_found("Course"))?;
    Ok(course)
}

#[instrument(skip_all, fields(course_id = %course_id))]
pub async fn delete_course(
    db: &dyn Querier,
    principal: &Principal,
    course_id: Uuid,
) -> Result<(), HbError> {
    let course = get_course(db, course_id).await?;
    ensure_can_modify(principal, course.created_by, "course")?;

    mapper::delete::<Course>(db, Filter::by_id(course_id))
        .await
        .map_err(rename_not_found("Course"))?;

    tracing::info!(target: "hb.content", course_id = %course_id, "Course deleted");
    Ok(())
}

// ============================================================================
// Sections
// ============================================================================

fn section_filter(course_id: Uuid, section_id: Uuid) -> Filter {
    Filter::by_id(section_id).eq("course_id", SqlValue::Uuid(course_id))
}

pub async fn list_sections(
    db: &dyn Querier,
    course_id: Uuid,
    params: ListParams,
) -> Result<Vec<Section>, HbError> {
    get_course(db, course_id).await?;
    let filter = Filter::new()
        .eq("course_id", SqlValue::Uuid(course_id))
        .order_by("position", Order::Asc)
        .order_by("created_at", Order::Asc);
    mapper::get_all::<Section>(db, paged(filter, params)).await
}

pub async fn get_section(
    db: &dyn Querier,
    course_id: Uuid,
    section_id: Uuid,
) -> Result<Section, HbError> {
    mapper::get_one::<Section>(db, section_filter(course_id, section_id))
        .await
        .map_err(rename_not_found("Section"))
}

#[instrument(skip_all, fields(course_id = %course_id))]
pub async fn create_section(
    db: &dyn Querier,
    principal: &Principal,
    course_id: Uuid,
    req: SectionRequest,
) -> Result<Section, HbError> {
    let course = get_course(db, course_id).await?;
    ensure_can_modify(principal, course.created_by, "course")?;

    let mut section = req.into_section(course_id, principal.user_id, Utc::now())?;
    mapper::create(db, &section).await?;
    section.course_title = Some(course.title);
    Ok(section)
}

#[instrument(skip_all, fields(section_id = %section_id))]
pub async fn update_section(
    db: &dyn Querier,
    principal: &Principal,
    course_id: Uuid,
    section_id: Uuid,
    req: SectionRequest,
) -> Result<Section, HbError> {
    let mut section = get_section(db, course_id, section_id).await?;
    ensure_can_modify(principal, section.created_by, "section")?;

    section.apply(req, Utc::now())?;
    mapper::update(db, &section, section_filter(course_id, section_id))
        .await
        .map_err(rename_not_found("Section"))?;
    Ok(section)
}

#[instrument(skip_all, fields(section_id = %section_id))]
pub async fn delete_section(
    db: &dyn Querier,
    principal: &Principal,
    course_id: Uuid,
    section_id: Uuid,
) -> Result<(), HbError> {
    let section = get_section(db, course_id, section_id).await?;
    ensure_can_modify(principal, section.created_by, "section")?;

    mapper::delete::<Section>(db, section_filter(course_id, section_id))
        .await
        .map_err(rename_not_found("Section"))
}

// ============================================================================
// Lessons
// ============================================================================

fn lesson_filter(section_id: Uuid, lesson_id: Uuid) -> Filter {
    Filter::by_id(lesson_id).eq("section_id", SqlValue::Uuid(section_id))
}

pub async fn list_lessons(
    db: &dyn Querier,
    course_id: Uuid,
    section_id: Uuid,
    params: ListParams,
) -> Result<Vec<Lesson>, HbError> {
    get_section(db, course_id, section_id).await?;
    let filter = Filter::new()
        .eq("section_id", SqlValue::Uuid(section_id))
        .order_by("position", Order::Asc)
        .order_by("created_at", Order::Asc);
    mapper::get_all::<Lesson>(db, paged(filter, params)).await
}

pub async fn get_lesson(
    db: &dyn Querier,
    course_id: Uuid,
    section_id: Uuid,
    lesson_id: Uuid,
) -> Result<Lesson, HbError> {
    get_section(db, course_id, section_id).await?;
    mapper::get_one::<Lesson>(db, lesson_filter(section_id, lesson_id))
        .await
        .map_err(rename_not_found("Lesson"))
}

#[instrument(skip_all, fields(section_id = %section_id))]
pub async fn create_lesson(
    db: &dyn Querier,
    principal: &Principal,
    course_id: Uuid,
    section_id: Uuid,
    req: LessonRequest,
) -> Result<Lesson, HbError> {
    let section = get_section(db, course_id, section_id).await?;
    ensure_can_modify(principal, section.created_by, "section")?;

    let mut lesson = req.into_lesson(section_id, principal.user_id, Utc::now())?;
    mapper::create(db, &lesson).await?;
    lesson.section_title = Some(section.title);
    Ok(lesson)
}

#[instrument(skip_all, fields(lesson_id = %lesson_id))]
pub async fn update_lesson(
    db: &dyn Querier,
    principal: &Principal,
    course_id: Uuid,
    section_id: Uuid,
    lesson_id: Uuid,
    req: LessonRequest,
) -> Result<Lesson, HbError> {
    let mut lesson = get_lesson(db, course_id, section_id, lesson_id).await?;
    ensure_can_modify(principal, lesson.created_by, "lesson")?;

    lesson.apply(req, Utc::now())?;
    mapper::update(db, &lesson, lesson_filter(section_id, lesson_id))
        .await
        .map_err(rename_not_found("Lesson"))?;
    Ok(lesson)
}

#[instrument(skip_all, fields(lesson_id = %lesson_id))]
pub async fn delete_lesson(
    db: &dyn Querier,
    principal: &Principal,
    course_id: Uuid,
    section_id: Uuid,
    lesson_id: Uuid,
) -> Result<(), HbError> {
    let lesson = get_lesson(db, course_id, section_id, lesson_id).await?;
    ensure_can_modify(principal, lesson.created_by, "lesson")?;

    mapper::delete::<Lesson>(db, lesson_filter(section_id, lesson_id))
        .await
        .map_err(rename_not_found("Lesson"))
}
