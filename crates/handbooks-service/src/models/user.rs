use super::Role;
use crate::repositories::{Entity, Field, FieldKind, QueryError, Row, SqlValue};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// User account (maps to users table).
///
/// Never serialized directly; responses use [`UserProfile`].
#[derive(Clone, PartialEq)]
pub struct User {
    pub id: Uuid,
    pub slug: String,
    pub email: String,
    pub password_hash: String,
    pub full_name: String,
    pub avatar_url: Option<String>,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl fmt::Debug for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("User")
            .field("id", &self.id)
            .field("slug", &self.slug)
            .field("email", &"[REDACTED]")
            .field("password_hash", &"[REDACTED]")
            .field("role", &self.role)
            .finish_non_exhaustive()
    }
}

const USER_FIELDS: &[Field] = &[
    Field::immutable("id", FieldKind::Uuid),
    Field::new("slug", FieldKind::Text),
    Field::immutable("email", FieldKind::Text),
    Field::immutable("password_hash", FieldKind::Text),
    Field::new("full_name", FieldKind::Text),
    Field::new("avatar_url", FieldKind::Text),
    Field::immutable("role", FieldKind::Text),
    Field::immutable("created_at", FieldKind::Timestamp),
    Field::new("updated_at", FieldKind::Timestamp),
];

impl Entity for User {
    const TABLE: &'static str = "users";

    fn fields() -> &'static [Field] {
        USER_FIELDS
    }

    fn value(&self, field: &str) -> Option<SqlValue> {
        Some(match field {
            "id" => SqlValue::Uuid(self.id),
            "slug" => SqlValue::Text(self.slug.clone()),
            "email" => SqlValue::Text(self.email.clone()),
            "password_hash" => SqlValue::Text(self.password_hash.clone()),
            "full_name" => SqlValue::Text(self.full_name.clone()),
            "avatar_url" => SqlValue::opt_text(self.avatar_url.as_deref()),
            "role" => SqlValue::Text(self.role.as_str().to_string()),
            "created_at" => SqlValue::Timestamp(self.created_at),
            "updated_at" => SqlValue::Timestamp(self.updated_at),
            _ => return None,
        })
    }

    fn from_row(row: &Row) -> Result<Self, QueryError> {
        Ok(Self {
            id: row.uuid("id")?,
            slug: row.text("slug")?,
            email: row.text("email")?,
            password_hash: row.text("password_hash")?,
            full_name: row.text("full_name")?,
            avatar_url: row.opt_text("avatar_url")?,
            role: row.parsed("role")?,
            created_at: row.timestamp("created_at")?,
            updated_at: row.timestamp("updated_at")?,
        })
    }
}

/// Public view of a user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserProfile {
    pub id: Uuid,
    pub slug: String,
    pub email: String,
    pub full_name: String,
    pub avatar_url: Option<String>,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&User> for UserProfile {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            slug: user.slug.clone(),
            email: user.email.clone(),
            full_name: user.full_name.clone(),
            avatar_url: user.avatar_url.clone(),
            role: user.role,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

/// Registration body.
#[derive(Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub full_name: Option<String>,
}

impl fmt::Debug for RegisterRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisterRequest")
            .field("email", &"[REDACTED]")
            .field("password", &"[REDACTED]")
            .field("full_name", &self.full_name)
            .finish()
    }
}

/// Login body.
#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

impl fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginRequest")
            .field("email", &"[REDACTED]")
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Profile update body for `PATCH /users/me`. Absent fields are unchanged.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateProfileRequest {
    pub full_name: Option<String>,
    /// `Some("")` clears the avatar.
    pub avatar_url: Option<String>,
}
