use super::{parse_choice, required_text, slugify, CourseLevel, CourseStatus};
use crate::errors::HbError;
use crate::repositories::{Entity, Field, FieldKind, QueryError, Row, SqlValue};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const DEFAULT_CURRENCY: &str = "USD";

/// Course (maps to courses table).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Course {
    pub id: Uuid,
    pub slug: String,
    pub title: String,
    pub subtitle: Option<String>,
    pub description: Option<String>,
    pub cover_url: Option<String>,
    pub status: CourseStatus,
    /// Price in minor currency units.
    pub price_cents: i64,
    pub currency: String,
    pub level: CourseLevel,
    pub position: i32,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Author display name; in memory only.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub author_name: Option<String>,
}

const COURSE_FIELDS: &[Field] = &[
    Field::immutable("id", FieldKind::Uuid),
    Field::new("slug", FieldKind::Text),
    Field::new("title", FieldKind::Text),
    Field::new("subtitle", FieldKind::Text),
    Field::new("description", FieldKind::Text),
    Field::new("cover_url", FieldKind::Text),
    Field::new("status", FieldKind::Text),
    Field::new("price_cents", FieldKind::BigInt),
    Field::new("currency", FieldKind::Text),
    Field::new("level", FieldKind::Text),
    Field::new("position", FieldKind::Int),
    Field::immutable("created_by", FieldKind::Uuid),
    Field::immutable("created_at", FieldKind::Timestamp),
    Field::new("updated_at", FieldKind::Timestamp),
    Field::new("author_name", FieldKind::Text),
];

impl Entity for Course {
    const TABLE: &'static str = "courses";

    fn fields() -> &'static [Field] {
        COURSE_FIELDS
    }

    fn excluded_fields() -> &'static [&'static str] {
        &["author_name"]
    }

    fn value(&self, field: &str) -> Option<SqlValue> {
        Some(match field {
            "id" => SqlValue::Uuid(self.id),
            "slug" => SqlValue::Text(self.slug.clone()),
            "title" => SqlValue::Text(self.title.clone()),
            "subtitle" => SqlValue::opt_text(self.subtitle.as_deref()),
            "description" => SqlValue::opt_text(self.description.as_deref()),
            "cover_url" => SqlValue::opt_text(self.cover_url.as_deref()),
            "status" => SqlValue::Text(self.status.as_str().to_string()),
            "price_cents" => SqlValue::BigInt(self.price_cents),
            "currency" => SqlValue::Text(self.currency.clone()),
            "level" => SqlValue::Text(self.level.as_str().to_string()),
            "position" => SqlValue::Int(self.position),
            "created_by" => SqlValue::Uuid(self.created_by),
            "created_at" => SqlValue::Timestamp(self.created_at),
            "updated_at" => SqlValue::Timestamp(self.updated_at),
            "author_name" => SqlValue::opt_text(self.author_name.as_deref()),
            _ => return None,
        })
    }

    fn from_row(row: &Row) -> Result<Self, QueryError> {
        Ok(Self {
            id: row.uuid("id")?,
            slug: row.text("slug")?,
            title: row.text("title")?,
            subtitle: row.opt_text("subtitle")?,
            description: row.opt_text("description")?,
            cover_url: row.opt_text("cover_url")?,
            status: row.parsed("status")?,
            price_cents: row.big_int("price_cents")?,
            currency: row.text("currency")?,
            level: row.parsed("level")?,
            position: row.int("position")?,
            created_by: row.uuid("created_by")?,
            created_at: row.timestamp("created_at")?,
            updated_at: row.timestamp("updated_at")?,
            author_name: None,
        })
    }
}

/// Create/update body for a course. On update, absent fields keep their
/// current value.
#[derive(Debug, Default, Deserialize)]
pub struct CourseRequest {
    pub title: Option<String>,
    pub subtitle: Option<String>,
    pub description: Option<String>,
    pub cover_url: Option<String>,
    pub status: Option<String>,
    pub price_cents: Option<i64>,
    pub currency: Option<String>,
    pub level: Option<String>,
    pub position: Option<i32>,
}

impl CourseRequest {
    /// Build a new course owned by `created_by`.
    pub fn into_course(self, created_by: Uuid, now: DateTime<Utc>) -> Result<Course, HbError> {
        let title = required_text("title", self.title.as_deref().unwrap_or_default())?;
        let mut course = Course {
            id: Uuid::new_v4(),
            slug: slugify(&title),
            title,
            subtitle: None,
            description: None,
            cover_url: None,
            status: CourseStatus::default(),
            price_cents: 0,
            currency: DEFAULT_CURRENCY.to_string(),
            level: CourseLevel::default(),
            position: 0,
            created_by,
            created_at: now,
            updated_at: now,
            author_name: None,
        };
        course.apply(CourseRequest { title: None, ..self }, now)?;
        Ok(course)
    }
}

impl Course {
    /// Merge a request into this course. The slug follows the title.
    pub fn apply(&mut self, req: CourseRequest, now: DateTime<Utc>) -> Result<(), HbError> {
        if let Some(title) = req.title {
            self.title = required_text("title", &title)?;
            self.slug = slugify(&self.title);
        }
        if let Some(subtitle) = req.subtitle {
            self.subtitle = Some(subtitle);
        }
        if let Some(description) = req.description {
            self.description = Some(description);
        }
        if let Some(cover_url) = req.cover_url {
            self.cover_url = Some(cover_url);
        }
        if let Some(status) = parse_choice(req.status.as_deref())? {
            self.status = status;
        }
        if let Some(price_cents) = req.price_cents {
            if price_cents < 0 {
                return Err(HbError::BadRequest(
                    "price_cents must not be negative".to_string(),
                ));
            }
            self.price_cents = price_cents;
        }
        if let Some(currency) = req.currency {
            self.currency = required_text("currency", &currency)?.to_ascii_uppercase();
        }
        if let Some(level) = parse_choice(req.level.as_deref())? {
            self.level = level;
        }
        if let Some(position) = req.position {
            self.position = position;
        }
        self.updated_at = now;
        Ok(())
    }
}
