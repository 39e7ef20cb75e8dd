use super::{parse_choice, required_text, slugify, LessonKind};
use crate::errors::HbError;
use crate::repositories::{Entity, Field, FieldKind, QueryError, Row, SqlValue};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lesson inside a section (maps to lessons table).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lesson {
    pub id: Uuid,
    pub section_id: Uuid,
    pub slug: String,
    pub title: String,
    pub kind: LessonKind,
    pub content: Option<String>,
    pub position: i32,
    pub duration_sec: i32,
    pub is_published: bool,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub section_title: Option<String>,
}

const LESSON_FIELDS: &[Field] = &[
    Field::immutable("id", FieldKind::Uuid),
    Field::immutable("section_id", FieldKind::Uuid),
    Field::new("slug", FieldKind::Text),
    Field::new("title", FieldKind::Text),
    Field::new("kind", FieldKind::Text),
    Field::new("content", FieldKind::Text),
    Field::new("position", FieldKind::Int),
    Field::new("duration_sec", FieldKind::Int),
    Field::new("is_published", FieldKind::Bool),
    Field::immutable("created_by", FieldKind::Uuid),
    Field::immutable("created_at", FieldKind::Timestamp),
    Field::new("updated_at", FieldKind::Timestamp),
    Field::new("section_title", FieldKind::Text),
];

impl Entity for Lesson {
    const TABLE: &'static str = "lessons";

    fn fields() -> &'static [Field] {
        LESSON_FIELDS
    }

    fn excluded_fields() -> &'static [&'static str] {
        &["section_title"]
    }

    fn value(&self, field: &str) -> Option<SqlValue> {
        Some(match field {
            "id" => SqlValue::Uuid(self.id),
            "section_id" => SqlValue::Uuid(self.section_id),
            "slug" => SqlValue::Text(self.slug.clone()),
            "title" => SqlValue::Text(self.title.clone()),
            "kind" => SqlValue::Text(self.kind.as_str().to_string()),
            "content" => SqlValue::opt_text(self.content.as_deref()),
            "position" => SqlValue::Int(self.position),
            "duration_sec" => SqlValue::Int(self.duration_sec),
            "is_published" => SqlValue::Bool(self.is_published),
            "created_by" => SqlValue::Uuid(self.created_by),
            "created_at" => SqlValue::Timestamp(self.created_at),
            "updated_at" => SqlValue::Timestamp(self.updated_at),
            "section_title" => SqlValue::opt_text(self.section_title.as_deref()),
            _ => return None,
        })
    }

    fn from_row(row: &Row) -> Result<Self, QueryError> {
        Ok(Self {
            id: row.uuid("id")?,
            section_id: row.uuid("section_id")?,
            slug: row.text("slug")?,
            title: row.text("title")?,
            kind: row.parsed("kind")?,
            content: row.opt_text("content")?,
            position: row.int("position")?,
            duration_sec: row.int("duration_sec")?,
            is_published: row.bool("is_published")?,
            created_by: row.uuid("created_by")?,
            created_at: row.timestamp("created_at")?,
            updated_at: row.timestamp("updated_at")?,
            section_title: None,
        })
    }
}

/// Create/update body for a lesson.
#[derive(Debug, Default, Deserialize)]
pub struct LessonRequest {
    pub title: Option<String>,
    pub kind: Option<String>,
    pub content: Option<String>,
    pub position: Option<i32>,
    pub duration_sec: Option<i32>,
    pub is_published: Option<bool>,
}

impl LessonRequest {
    pub fn into_lesson(
        self,
        section_id: Uuid,
        created_by: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Lesson, HbError> {
        let title = required_text("title", self.title.as_deref().unwrap_or_default())?;
        let mut lesson = Lesson {
            id: Uuid::new_v4(),
            section_id,
            slug: slugify(&title),
            title,
            kind: LessonKind::default(),
            content: None,
            position: 0,
            duration_sec: 0,
            is_published: false,
            created_by,
            created_at: now,
            updated_at: now,
            section_title: None,
        };
        lesson.apply(LessonRequest { title: None, ..self }, now)?;
        Ok(lesson)
    }
}

impl Lesson {
    pub fn apply(&mut self, req: LessonRequest, now: DateTime<Utc>) -> Result<(), HbError> {
        if let Some(title) = req.title {
            self.title = required_text("title", &title)?;
            self.slug = slugify(&self.title);
        }
        if let Some(kind) = parse_choice(req.kind.as_deref())? {
            self.kind = kind;
        }
        if let Some(content) = req.content {
            self.content = Some(content);
        }
        if let Some(position) = req.position {
            self.position = position;
        }
        if let Some(duration) = req.duration_sec {
            if duration < 0 {
                return Err(HbError::BadRequest(
                    "duration_sec must not be negative".to_string(),
                ));
            }
            self.duration_sec = duration;
        }
        if let Some(is_published) = req.is_published {
            self.is_published = is_published;
        }
        self.updated_at = now;
        Ok(())
    }
}
