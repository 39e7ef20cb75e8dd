//! Query execution capability.
//!
//! The mapper talks to the store only through [`Querier`], so it runs
//! unchanged against PostgreSQL or the in-memory implementation in
//! [`crate::repositories::mock`].

use crate::observability::metrics::record_db_query;
use crate::repositories::entity::{Field, FieldKind, Row, SqlValue};
use crate::repositories::statement::Statement;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgArguments, PgRow};
use sqlx::query::Query;
use sqlx::{PgPool, Postgres, Row as _};
use std::time::Instant;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("No rows returned")]
    NoRows,

    #[error("Unique constraint violated: {0}")]
    UniqueViolation(String),

    #[error("Failed to decode row: {0}")]
    Decode(String),

    #[error("Invalid statement: {0}")]
    InvalidStatement(String),

    #[error("{0}")]
    Backend(String),
}

/// Narrow query-execution capability.
#[async_trait]
pub trait Querier: Send + Sync {
    /// Run a SELECT and return every row.
    async fn query(&self, stmt: &Statement) -> Result<Vec<Row>, QueryError>;

    /// Run a SELECT and return the first row, or `QueryError::NoRows`.
    async fn query_row(&self, stmt: &Statement) -> Result<Row, QueryError> {
        self.query(stmt)
            .await?
            .into_iter()
            .next()
            .ok_or(QueryError::NoRows)
    }

    /// Run an INSERT, UPDATE or DELETE and return the number of rows affected.
    async fn exec(&self, stmt: &Statement) -> Result<u64, QueryError>;

    /// Connectivity check for health probes.
    async fn ping(&self) -> Result<(), QueryError>;
}

/// PostgreSQL implementation backed by a connection pool.
#[derive(Clone)]
pub struct PgQuerier {
    pool: PgPool,
}

impl PgQuerier {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Querier for PgQuerier {
    async fn query(&self, stmt: &Statement) -> Result<Vec<Row>, QueryError> {
        let Statement::Select { columns, .. } = stmt else {
            return Err(QueryError::InvalidStatement(format!(
                "query() requires a SELECT, got {}",
                stmt.operation()
            )));
        };

        let (sql, params) = stmt.build();
        let start = Instant::now();
        let result = bind_all(&sql, params).fetch_all(&self.pool).await;
        let status = if result.is_ok() { "success" } else { "error" };
        record_db_query(stmt.operation(), stmt.table(), status, start.elapsed());

        result
            .map_err(map_sqlx_error)?
            .iter()
            .map(|row| decode_row(row, columns))
            .collect()
    }

    async fn exec(&self, stmt: &Statement) -> Result<u64, QueryError> {
        if matches!(stmt, Statement::Select { .. }) {
            return Err(QueryError::InvalidStatement(
                "exec() does not accept a SELECT".to_string(),
            ));
        }

        let (sql, params) = stmt.build();
        let start = Instant::now();
        let result = bind_all(&sql, params).execute(&self.pool).await;
        let status = if result.is_ok() { "success" } else { "error" };
        record_db_query(stmt.operation(), stmt.table(), status, start.elapsed());

        Ok(result.map_err(map_sqlx_error)?.rows_affected())
    }

    async fn ping(&self) -> Result<(), QueryError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map(|_| ())
            .map_err(map_sqlx_error)
    }
}

fn bind_all(sql: &str, params: Vec<SqlValue>) -> Query<'_, Postgres, PgArguments> {
    let mut query = sqlx::query(sql);
    for param in params {
        query = match param {
            SqlValue::Uuid(v) => query.bind(v),
            SqlValue::Text(v) => query.bind(v),
            SqlValue::Int(v) => query.bind(v),
            SqlValue::BigInt(v) => query.bind(v),
            SqlValue::Bool(v) => query.bind(v),
            SqlValue::Timestamp(v) => query.bind(v),
            SqlValue::Null(kind) => match kind {
                FieldKind::Uuid => query.bind(None::<Uuid>),
                FieldKind::Text => query.bind(None::<String>),
                FieldKind::Int => query.bind(None::<i32>),
                FieldKind::BigInt => query.bind(None::<i64>),
                FieldKind::Bool => query.bind(None::<bool>),
                FieldKind::Timestamp => query.bind(None::<DateTime<Utc>>),
            },
        };
    }
    query
}

fn decode_row(row: &PgRow, columns: &[Field]) -> Result<Row, QueryError> {
    let mut values = Vec::with_capacity(columns.len());

    for field in columns {
        let name = field.name;
        let decoded = match field.kind {
            FieldKind::Uuid => row
                .try_get::<Option<Uuid>, _>(name)
                .map(|v| v.map(SqlValue::Uuid)),
            FieldKind::Text => row
                .try_get::<Option<String>, _>(name)
                .map(|v| v.map(SqlValue::Text)),
            FieldKind::Int => row
                .try_get::<Option<i32>, _>(name)
                .map(|v| v.map(SqlValue::Int)),
            FieldKind::BigInt => row
                .try_get::<Option<i64>, _>(name)
                .map(|v| v.map(SqlValue::BigInt)),
            FieldKind::Bool => row
                .try_get::<Option<bool>, _>(name)
                .map(|v| v.map(SqlValue::Bool)),
            FieldKind::Timestamp => row
                .try_get::<Option<DateTime<Utc>>, _>(name)
                .map(|v| v.map(SqlValue::Timestamp)),
        }
        .map_err(|e| QueryError::Decode(format!("column {}: {}", name, e)))?;

        values.push((
            name.to_string(),
            decoded.unwrap_or(SqlValue::Null(field.kind)),
        ));
    }

    Ok(Row::new(values))
}

fn map_sqlx_error(err: sqlx::Error) -> QueryError {
    match &err {
        sqlx::Error::RowNotFound => QueryError::NoRows,
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
            QueryError::UniqueViolation(db_err.constraint().unwrap_or("unknown").to_string())
        }
        _ => QueryError::Backend(err.to_string()),
    }
}
