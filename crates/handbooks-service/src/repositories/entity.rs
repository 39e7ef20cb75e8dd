//! Entity description used by the generic mapper.
//!
//! Each persisted type declares its table, its fields and which of them are
//! in-memory only. The mapper never inspects a type beyond this trait.

use crate::repositories::querier::QueryError;
use chrono::{DateTime, Utc};
use std::cmp::Ordering;
use uuid::Uuid;

/// SQL type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Uuid,
    Text,
    Int,
    BigInt,
    Bool,
    Timestamp,
}

/// One field of an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    pub name: &'static str,
    pub kind: FieldKind,
    /// Immutable fields are written on insert and never appear in a SET clause.
    pub immutable: bool,
}

impl Field {
    pub const fn new(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            immutable: false,
        }
    }

    pub const fn immutable(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            immutable: true,
        }
    }
}

/// A bound statement parameter or a decoded column value.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Uuid(Uuid),
    Text(String),
    Int(i32),
    BigInt(i64),
    Bool(bool),
    Timestamp(DateTime<Utc>),
    /// SQL NULL, typed so it can be bound.
    Null(FieldKind),
}

impl SqlValue {
    pub fn kind(&self) -> FieldKind {
        match self {
            SqlValue::Uuid(_) => FieldKind::Uuid,
            SqlValue::Text(_) => FieldKind::Text,
            SqlValue::Int(_) => FieldKind::Int,
            SqlValue::BigInt(_) => FieldKind::BigInt,
            SqlValue::Bool(_) => FieldKind::Bool,
            SqlValue::Timestamp(_) => FieldKind::Timestamp,
            SqlValue::Null(kind) => *kind,
        }
    }

    /// `NULL` when absent.
    pub fn opt_text(value: Option<&str>) -> Self {
        value.map_or(SqlValue::Null(FieldKind::Text), |v| {
            SqlValue::Text(v.to_string())
        })
    }

    /// Ordering used by in-memory evaluation; NULL sorts first and values
    /// of different kinds compare equal.
    pub fn compare(&self, other: &SqlValue) -> Ordering {
        match (self, other) {
            (SqlValue::Null(_), SqlValue::Null(_)) => Ordering::Equal,
            (SqlValue::Null(_), _) => Ordering::Less,
            (_, SqlValue::Null(_)) => Ordering::Greater,
            (SqlValue::Uuid(a), SqlValue::Uuid(b)) => a.cmp(b),
            (SqlValue::Text(a), SqlValue::Text(b)) => a.cmp(b),
            (SqlValue::Int(a), SqlValue::Int(b)) => a.cmp(b),
            (SqlValue::BigInt(a), SqlValue::BigInt(b)) => a.cmp(b),
            (SqlValue::Bool(a), SqlValue::Bool(b)) => a.cmp(b),
            (SqlValue::Timestamp(a), SqlValue::Timestamp(b)) => a.cmp(b),
            _ => Ordering::Equal,
        }
    }

    /// Short description for failure logs; never includes the value itself.
    pub fn describe(&self) -> &'static str {
        match self {
            SqlValue::Uuid(_) => "uuid",
            SqlValue::Text(_) => "text",
            SqlValue::Int(_) => "int4",
            SqlValue::BigInt(_) => "int8",
            SqlValue::Bool(_) => "bool",
            SqlValue::Timestamp(_) => "timestamptz",
            SqlValue::Null(_) => "null",
        }
    }
}

/// A decoded result row, keyed by column name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    values: Vec<(String, SqlValue)>,
}

impl Row {
    pub fn new(values: Vec<(String, SqlValue)>) -> Self {
        Self { values }
    }

    pub fn get(&self, column: &str) -> Option<&SqlValue> {
        self.values
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    pub fn set(&mut self, column: &str, value: SqlValue) {
        match self.values.iter_mut().find(|(name, _)| name == column) {
            Some(slot) => slot.1 = value,
            None => self.values.push((column.to_string(), value)),
        }
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.values.iter().map(|(name, _)| name.as_str())
    }

    fn require(&self, column: &str) -> Result<&SqlValue, QueryError> {
        self.get(column)
            .ok_or_else(|| QueryError::Decode(format!("missing column {}", column)))
    }

    fn mismatch(column: &str, expected: &str, found: &SqlValue) -> QueryError {
        QueryError::Decode(format!(
            "column {} expected {}, found {}",
            column,
            expected,
            found.describe()
        ))
    }

    pub fn uuid(&self, column: &str) -> Result<Uuid, QueryError> {
        match self.require(column)? {
            SqlValue::Uuid(v) => Ok(*v),
            other => Err(Self::mismatch(column, "uuid", other)),
        }
    }

    pub fn text(&self, column: &str) -> Result<String, QueryError> {
        match self.require(column)? {
            SqlValue::Text(v) => Ok(v.clone()),
            other => Err(Self::mismatch(column, "text", other)),
        }
    }

    pub fn opt_text(&self, column: &str) -> Result<Option<String>, QueryError> {
        match self.require(column)? {
            SqlValue::Text(v) => Ok(Some(v.clone())),
            SqlValue::Null(_) => Ok(None),
            other => Err(Self::mismatch(column, "text", other)),
        }
    }

    pub fn int(&self, column: &str) -> Result<i32, QueryError> {
        match self.require(column)? {
            SqlValue::Int(v) => Ok(*v),
            other => Err(Self::mismatch(column, "int4", other)),
        }
    }

    pub fn big_int(&self, column: &str) -> Result<i64, QueryError> {
        match self.require(column)? {
            SqlValue::BigInt(v) => Ok(*v),
            other => Err(Self::mismatch(column, "int8", other)),
        }
    }

    pub fn bool(&self, column: &str) -> Result<bool, QueryError> {
        match self.require(column)? {
            SqlValue::Bool(v) => Ok(*v),
            other => Err(Self::mismatch(column, "bool", other)),
        }
    }

    pub fn timestamp(&self, column: &str) -> Result<DateTime<Utc>, QueryError> {
        match self.require(column)? {
            SqlValue::Timestamp(v) => Ok(*v),
            other => Err(Self::mismatch(column, "timestamptz", other)),
        }
    }

    /// Parse a text column into an enum-like type.
    pub fn parsed<T>(&self, column: &str) -> Result<T, QueryError>
    where
        T: std::str::FromStr,
    {
        let raw = self.text(column)?;
        raw.parse()
            .map_err(|_| QueryError::Decode(format!("column {} has unknown value", column)))
    }
}

/// A type the generic mapper can persist.
pub trait Entity: Sized + Send + Sync {
    /// Table name.
    const TABLE: &'static str;

    /// Every field of the record, including in-memory ones.
    fn fields() -> &'static [Field];

    /// Fields that exist only in memory and are never read from or written
    /// to the table.
    fn excluded_fields() -> &'static [&'static str] {
        &[]
    }

    /// Current value of a field. `None` for unknown names.
    fn value(&self, field: &str) -> Option<SqlValue>;

    /// Build a record from a row holding every persisted field.
    fn from_row(row: &Row) -> Result<Self, QueryError>;

    /// Fields backed by a column, in declaration order.
    fn persisted_fields() -> Vec<Field> {
        let excluded = Self::excluded_fields();
        Self::fields()
            .iter()
            .filter(|f| !excluded.contains(&f.name))
            .copied()
            .collect()
    }

    /// Whether `name` is a persisted column.
    fn has_column(name: &str) -> bool {
        Self::persisted_fields().iter().any(|f| f.name == name)
    }
}
