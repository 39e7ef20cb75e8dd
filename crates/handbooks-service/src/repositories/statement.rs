//! Structured SQL statements.
//!
//! Statements are built from entity descriptions and filters, then rendered
//! to PostgreSQL with `$n` placeholders. Identifiers always come from
//! `&'static str` field declarations and are quoted; values are always bound.

use crate::repositories::entity::{Field, SqlValue};
use std::fmt::Write as _;
use uuid::Uuid;

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    Asc,
    Desc,
}

impl Order {
    fn sql(self) -> &'static str {
        match self {
            Order::Asc => "ASC",
            Order::Desc => "DESC",
        }
    }
}

/// Equality conditions plus ordering and pagination.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    conditions: Vec<(&'static str, SqlValue)>,
    order_by: Vec<(&'static str, Order)>,
    limit: Option<i64>,
    offset: Option<i64>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shorthand for `Filter::new().eq("id", id)`.
    pub fn by_id(id: Uuid) -> Self {
        Self::new().eq("id", SqlValue::Uuid(id))
    }

    pub fn eq(mut self, column: &'static str, value: SqlValue) -> Self {
        self.conditions.push((column, value));
        self
    }

    pub fn order_by(mut self, column: &'static str, order: Order) -> Self {
        self.order_by.push((column, order));
        self
    }

    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: i64) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn conditions(&self) -> &[(&'static str, SqlValue)] {
        &self.conditions
    }

    pub fn ordering(&self) -> &[(&'static str, Order)] {
        &self.order_by
    }

    pub fn limit_value(&self) -> Option<i64> {
        self.limit
    }

    pub fn offset_value(&self) -> Option<i64> {
        self.offset
    }

    pub fn has_order(&self) -> bool {
        !self.order_by.is_empty()
    }

    /// Every column the filter references.
    pub fn columns(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.conditions
            .iter()
            .map(|(c, _)| *c)
            .chain(self.order_by.iter().map(|(c, _)| *c))
    }

    fn render_where(&self, sql: &mut String, params: &mut Vec<SqlValue>) {
        for (i, (column, value)) in self.conditions.iter().enumerate() {
            sql.push_str(if i == 0 { " WHERE " } else { " AND " });
            params.push(value.clone());
            let _ = write!(sql, "\"{}\" = ${}", column, params.len());
        }
    }

    fn render_tail(&self, sql: &mut String, params: &mut Vec<SqlValue>) {
        for (i, (column, order)) in self.order_by.iter().enumerate() {
            sql.push_str(if i == 0 { " ORDER BY " } else { ", " });
            let _ = write!(sql, "\"{}\" {}", column, order.sql());
        }
        if let Some(limit) = self.limit {
            params.push(SqlValue::BigInt(limit));
            let _ = write!(sql, " LIMIT ${}", params.len());
        }
        if let Some(offset) = self.offset {
            params.push(SqlValue::BigInt(offset));
            let _ = write!(sql, " OFFSET ${}", params.len());
        }
    }
}

/// A statement ready to render and execute.
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Select {
        table: &'static str,
        columns: Vec<Field>,
        filter: Filter,
    },
    Insert {
        table: &'static str,
        values: Vec<(&'static str, SqlValue)>,
    },
    Update {
        table: &'static str,
        assignments: Vec<(&'static str, SqlValue)>,
        filter: Filter,
    },
    Delete {
        table: &'static str,
        filter: Filter,
    },
}

impl Statement {
    pub fn table(&self) -> &'static str {
        match self {
            Statement::Select { table, .. }
            | Statement::Insert { table, .. }
            | Statement::Update { table, .. }
            | Statement::Delete { table, .. } => table,
        }
    }

    /// Bounded operation label for logs and metrics.
    pub fn operation(&self) -> &'static str {
        match self {
            Statement::Select { .. } => "select",
            Statement::Insert { .. } => "insert",
            Statement::Update { .. } => "update",
            Statement::Delete { .. } => "delete",
        }
    }

    /// Render to SQL and the parameters bound to its placeholders.
    pub fn build(&self) -> (String, Vec<SqlValue>) {
        let mut sql = String::new();
        let mut params = Vec::new();

        match self {
            Statement::Select {
                table,
                columns,
                filter,
            } => {
                let column_list = columns
                    .iter()
                    .map(|f| format!("\"{}\"", f.name))
                    .collect::<Vec<_>>()
                    .join(", ");
                let _ = write!(sql, "SELECT {} FROM \"{}\"", column_list, table);
                filter.render_where(&mut sql, &mut params);
                filter.render_tail(&mut sql, &mut params);
            }
            Statement::Insert { table, values } => {
                let mut names = Vec::with_capacity(values.len());
                let mut placeholders = Vec::with_capacity(values.len());
                for (column, value) in values {
                    params.push(value.clone());
                    names.push(format!("\"{}\"", column));
                    placeholders.push(format!("${}", params.len()));
                }
                let _ = write!(
                    sql,
                    "INSERT INTO \"{}\" ({}) VALUES ({})",
                    table,
                    names.join(", "),
                    placeholders.join(", ")
                );
            }
            Statement::Update {
                table,
                assignments,
                filter,
            } => {
                let _ = write!(sql, "UPDATE \"{}\" SET ", table);
                for (i, (column, value)) in assignments.iter().enumerate() {
                    if i > 0 {
                        sql.push_str(", ");
                    }
                    params.push(value.clone());
                    let _ = write!(sql, "\"{}\" = ${}", column, params.len());
                }
                filter.render_where(&mut sql, &mut params);
            }
            Statement::Delete { table, filter } => {
                let _ = write!(sql, "DELETE FROM \"{}\"", table);
                filter.render_where(&mut sql, &mut params);
            }
        }

        (sql, params)
    }

    pub fn sql(&self) -> String {
        self.build().0
    }

    pub fn params(&self) -> Vec<SqlValue> {
        self.build().1
    }

    /// Columns written by an INSERT or UPDATE.
    pub fn written_columns(&self) -> Vec<&'static str> {
        match self {
            Statement::Insert { values, .. } => values.iter().map(|(c, _)| *c).collect(),
            Statement::Update { assignments, .. } => {
                assignments.iter().map(|(c, _)| *c).collect()
            }
            Statement::Select { .. } | Statement::Delete { .. } => Vec::new(),
        }
    }
}
