//! Domain records and request/response bodies.
//!
//! Each persisted record implements [`Entity`](crate::repositories::Entity)
//! in its own module. Enumerated columns are stored as lowercase text.

mod course;
mod lesson;
mod section;
mod user;

pub use course::{Course, CourseRequest};
pub use lesson::{Lesson, LessonRequest};
pub use section::{Section, SectionRequest};
pub use user::{LoginRequest, RegisterRequest, UpdateProfileRequest, User, UserProfile};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Error returned when a stored or submitted enum value is unknown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

impl fmt::Display for UnknownVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown {} '{}'", self.kind, self.value)
    }
}

impl std::error::Error for UnknownVariant {}

/// Declares a lowercase text-backed enum with `as_str` and `FromStr`.
macro_rules! text_enum {
    (
        $(#[$meta:meta])*
        $name:ident, $label:literal, default = $default:ident,
        { $($variant:ident => $text:literal),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
        #[serde(rename_all = "lowercase")]
        pub enum $name {
            $($variant,)+
        }

        impl $name {
            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $text,)+
                }
            }
        }

        impl Default for $name {
            fn default() -> Self {
                $name::$default
            }
        }

        impl FromStr for $name {
            type Err = UnknownVariant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err(UnknownVariant {
                        kind: $label,
                        value: other.to_string(),
                    }),
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

text_enum!(
    /// Account role. New accounts are students.
    Role, "role", default = Student,
    { Student => "student", Instructor => "instructor", Admin => "admin" }
);

text_enum!(
    /// Publication state of a course.
    CourseStatus, "course status", default = Draft,
    { Draft => "draft", Published => "published", Archived => "archived" }
);

text_enum!(
    CourseLevel, "course level", default = Beginner,
    { Beginner => "beginner", Intermediate => "intermediate", Advanced => "advanced" }
);

text_enum!(
    /// Lesson content type.
    LessonKind, "lesson kind", default = Text,
    { Video => "video", Text => "text", Quiz => "quiz" }
);

/// URL-safe slug: lowercase ASCII alphanumerics separated by single dashes.
///
/// Falls back to `"untitled"` when nothing usable remains.
pub fn slugify(input: &str) -> String {
    let mut slug = String::with_capacity(input.len());
    let mut pending_dash = false;

    for c in input.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }

    if slug.is_empty() {
        "untitled".to_string()
    } else {
        slug
    }
}

/// Slug for a user: slugified name plus the first 8 hex digits of the id.
pub fn user_slug(full_name: &str, id: uuid::Uuid) -> String {
    let simple = id.simple().to_string();
    let short = simple.get(..8).unwrap_or(&simple);
    format!("{}-{}", slugify(full_name), short)
}

/// Pagination query parameters for list endpoints.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct ListParams {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

pub const DEFAULT_PAGE_SIZE: i64 = 50;
pub const MAX_PAGE_SIZE: i64 = 100;

impl ListParams {
    /// Clamped `(limit, offset)`.
    pub fn resolve(self) -> (i64, i64) {
        let limit = self.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
        let offset = self.offset.unwrap_or(0).max(0);
        (limit, offset)
    }
}

/// Trim and require a non-empty value.
pub(crate) fn required_text(field: &str, value: &str) -> Result<String, crate::errors::HbError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(crate::errors::HbError::BadRequest(format!(
            "{} must not be empty",
            field
        )));
    }
    Ok(trimmed.to_string())
}

/// Parse an optional enum value submitted by a client.
pub(crate) fn parse_choice<T>(value: Option<&str>) -> Result<Option<T>, crate::errors::HbError>
where
    T: FromStr<Err = UnknownVariant>,
{
    value
        .map(|v| v.parse::<T>())
        .transpose()
        .map_err(|e| crate::errors::HbError::BadRequest(e.to_string()))
}
