use super::{required_text, slugify};
use crate::errors::HbError;
use crate::repositories::{Entity, Field, FieldKind, QueryError, Row, SqlValue};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Section of a course (maps to sections table).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    pub id: Uuid,
    pub course_id: Uuid,
    pub slug: String,
    pub title: String,
    pub position: i32,
    pub is_free_preview: bool,
    pub estimated_minutes: i32,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Parent course title; in memory only.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub course_title: Option<String>,
}

const SECTION_FIELDS: &[Field] = &[
    Field::immutable("id", FieldKind::Uuid),
    Field::immutable("course_id", FieldKind::Uuid),
    Field::new("slug", FieldKind::Text),
    Field::new("title", FieldKind::Text),
    Field::new("position", FieldKind::Int),
    Field::new("is_free_preview", FieldKind::Bool),
    Field::new("estimated_minutes", FieldKind::Int),
    Field::immutable("created_by", FieldKind::Uuid),
    Field::immutable("created_at", FieldKind::Timestamp),
    Field::new("updated_at", FieldKind::Timestamp),
    Field::new("course_title", FieldKind::Text),
];

impl Entity for Section {
    const TABLE: &'static str = "sections";

    fn fields() -> &'static [Field] {
        SECTION_FIELDS
    }

    fn excluded_fields() -> &'static [&'static str] {
        &["course_title"]
    }

    fn value(&self, field: &str) -> Option<SqlValue> {
        Some(match field {
            "id" => SqlValue::Uuid(self.id),
            "course_id" => SqlValue::Uuid(self.course_id),
            "slug" => SqlValue::Text(self.slug.clone()),
            "title" => SqlValue::Text(self.title.clone()),
            "position" => SqlValue::Int(self.position),
            "is_free_preview" => SqlValue::Bool(self.is_free_preview),
            "estimated_minutes" => SqlValue::Int(self.estimated_minutes),
            "created_by" => SqlValue::Uuid(self.created_by),
            "created_at" => SqlValue::Timestamp(self.created_at),
            "updated_at" => SqlValue::Timestamp(self.updated_at),
            "course_title" => SqlValue::opt_text(self.course_title.as_deref()),
            _ => return None,
        })
    }

    fn from_row(row: &Row) -> Result<Self, QueryError> {
        Ok(Self {
            id: row.uuid("id")?,
            course_id: row.uuid("course_id")?,
            slug: row.text("slug")?,
            title: row.text("title")?,
            position: row.int("position")?,
            is_free_preview: row.bool("is_free_preview")?,
            estimated_minutes: row.int("estimated_minutes")?,
            created_by: row.uuid("created_by")?,
            created_at: row.timestamp("created_at")?,
            updated_at: row.timestamp("updated_at")?,
            course_title: None,
        })
    }
}

/// Create/update body for a section.
#[derive(Debug, Default, Deserialize)]
pub struct SectionRequest {
    pub title: Option<String>,
    pub position: Option<i32>,
    pub is_free_preview: Option<bool>,
    pub estimated_minutes: Option<i32>,
}

impl SectionRequest {
    /// Build a new section under `course_id`.
    pub fn into_section(
        self,
        course_id: Uuid,
        created_by: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Section, HbError> {
        let title = required_text("title", self.title.as_deref().unwrap_or_default())?;
        let mut section = Section {
            id: Uuid::new_v4(),
            course_id,
            slug: slugify(&title),
            title,
            position: 0,
            is_free_preview: false,
            estimated_minutes: 0,
            created_by,
            created_at: now,
            updated_at: now,
            course_title: None,
        };
        section.apply(SectionRequest { title: None, ..self }, now)?;
        Ok(section)
    }
}

impl Section {
    pub fn apply(&mut self, req: SectionRequest, now: DateTime<Utc>) -> Result<(), HbError> {
        if let Some(title) = req.title {
            self.title = required_text("title", &title)?;
            self.slug = slugify(&self.title);
        }
        if let Some(position) = req.position {
            self.position = position;
        }
        if let Some(is_free_preview) = req.is_free_preview {
            self.is_free_preview = is_free_preview;
        }
        if let Some(minutes) = req.estimated_minutes {
            if minutes < 0 {
                return Err(HbError::BadRequest(
                    "estimated_minutes must not be negative".to_string(),
                ));
            }
            self.estimated_minutes = minutes;
        }
        self.updated_at = now;
        Ok(())
    }
}
