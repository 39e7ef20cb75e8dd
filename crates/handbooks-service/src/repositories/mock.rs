//! In-memory [`Querier`] for tests.
//!
//! Interprets [`Statement`]s directly against per-table row vectors:
//! equality filters, ordering, limit/offset and unique constraints.

use crate::repositories::entity::{Row, SqlValue};
use crate::repositories::querier::{QueryError, Querier};
use crate::repositories::statement::{Filter, Order, Statement};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;

#[derive(Default)]
struct Tables {
    rows: HashMap<&'static str, Vec<Row>>,
    executed: Vec<Statement>,
}

/// In-memory store with failure injection and a statement log.
#[derive(Default)]
pub struct MemoryQuerier {
    tables: Mutex<Tables>,
    unique: Vec<(&'static str, &'static str)>,
    failing: AtomicBool,
}

impl MemoryQuerier {
    /// Empty store; `id` is unique in every table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a unique column, e.g. `with_unique("users", "email")`.
    pub fn with_unique(mut self, table: &'static str, column: &'static str) -> Self {
        self.unique.push((table, column));
        self
    }

    /// Make every subsequent statement fail (or succeed again).
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Every statement executed so far, in order.
    pub async fn executed(&self) -> Vec<Statement> {
        self.tables.lock().await.executed.clone()
    }

    /// Current rows of a table.
    pub async fn rows(&self, table: &str) -> Vec<Row> {
        self.tables
            .lock()
            .await
            .rows
            .get(table)
            .cloned()
            .unwrap_or_default()
    }

    fn check_failing(&self) -> Result<(), QueryError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(QueryError::Backend(
                "connection refused (mock store is failing)".to_string(),
            ));
        }
        Ok(())
    }

    fn unique_columns<'a>(&'a self, table: &'a str) -> impl Iterator<Item = &'static str> + 'a {
        std::iter::once("id").chain(
            self.unique
                .iter()
                .filter(move |(t, _)| *t == table)
                .map(|(_, c)| *c),
        )
    }

    fn violates_unique(
        &self,
        table: &str,
        existing: &[Row],
        candidate: &Row,
        skip: Option<usize>,
    ) -> Option<&'static str> {
        self.unique_columns(table).find(|column| {
            let Some(value) = candidate.get(column) else {
                return false;
            };
            if matches!(value, SqlValue::Null(_)) {
                return false;
            }
            existing
                .iter()
                .enumerate()
                .filter(|(i, _)| Some(*i) != skip)
                .any(|(_, row)| row.get(column) == Some(value))
        })
    }
}

fn matches_filter(row: &Row, filter: &Filter) -> bool {
    filter
        .conditions()
        .iter()
        .all(|(column, value)| row.get(column) == Some(value))
}

fn apply_order(rows: &mut [Row], filter: &Filter) {
    let ordering = filter.ordering();
    if ordering.is_empty() {
        return;
    }
    rows.sort_by(|a, b| {
        for (column, order) in ordering {
            let left = a.get(column);
            let right = b.get(column);
            let cmp = match (left, right) {
                (Some(l), Some(r)) => l.compare(r),
                _ => std::cmp::Ordering::Equal,
            };
            let cmp = match order {
                Order::Asc => cmp,
                Order::Desc => cmp.reverse(),
            };
            if cmp != std::cmp::Ordering::Equal {
                return cmp;
            }
        }
        std::cmp::Ordering::Equal
    });
}

#[async_trait]
impl Querier for MemoryQuerier {
    async fn query(&self, stmt: &Statement) -> Result<Vec<Row>, QueryError> {
        self.check_failing()?;
        let mut tables = self.tables.lock().await;
        tables.executed.push(stmt.clone());

        let Statement::Select {
            table,
            columns,
            filter,
        } = stmt
        else {
            return Err(QueryError::InvalidStatement(format!(
                "query() requires a SELECT, got {}",
                stmt.operation()
            )));
        };

        let mut selected: Vec<Row> = tables
            .rows
            .get(table)
            .map(|rows| {
                rows.iter()
                    .filter(|row| matches_filter(row, filter))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        apply_order(&mut selected, filter);

        let offset = usize::try_from(filter.offset_value().unwrap_or(0)).unwrap_or(0);
        let limit = filter
            .limit_value()
            .and_then(|l| usize::try_from(l).ok())
            .unwrap_or(usize::MAX);

        Ok(selected
            .into_iter()
            .skip(offset)
            .take(limit)
            .map(|row| {
                Row::new(
                    columns
                        .iter()
                        .map(|f| {
                            let value = row.get(f.name).cloned().unwrap_or(SqlValue::Null(f.kind));
                            (f.name.to_string(), value)
                        })
                        .collect(),
                )
            })
            .collect())
    }

    async fn exec(&self, stmt: &Statement) -> Result<u64, QueryError> {
        self.check_failing()?;
        let mut tables = self.tables.lock().await;
        tables.executed.push(stmt.clone());

        match stmt {
            Statement::Insert { table, values } => {
                let candidate = Row::new(
                    values
                        .iter()
                        .map(|(c, v)| ((*c).to_string(), v.clone()))
                        .collect(),
                );
                let rows = tables.rows.entry(*table).or_default();
                if let Some(column) = self.violates_unique(table, rows, &candidate, None) {
                    return Err(QueryError::UniqueViolation(format!("{}_{}_key", table, column)));
                }
                rows.push(candidate);
                Ok(1)
            }
            Statement::Update {
                table,
                assignments,
                filter,
            } => {
                let rows = tables.rows.entry(*table).or_default();
                let targets: Vec<usize> = rows
                    .iter()
                    .enumerate()
                    .filter(|(_, row)| matches_filter(row, filter))
                    .map(|(i, _)| i)
                    .collect();

                for &index in &targets {
                    let Some(current) = rows.get(index) else {
                        continue;
                    };
                    let mut updated = current.clone();
                    for (column, value) in assignments {
                        updated.set(column, value.clone());
                    }
                    if let Some(column) = self.violates_unique(table, rows, &updated, Some(index)) {
                        return Err(QueryError::UniqueViolation(format!(
                            "{}_{}_key",
                            table, column
                        )));
                    }
                    if let Some(slot) = rows.get_mut(index) {
                        *slot = updated;
                    }
                }

                Ok(targets.len() as u64)
            }
            Statement::Delete { table, filter } => {
                let rows = tables.rows.entry(*table).or_default();
                let before = rows.len();
                rows.retain(|row| !matches_filter(row, filter));
                Ok((before - rows.len()) as u64)
            }
            Statement::Select { .. } => Err(QueryError::InvalidStatement(
                "exec() does not accept a SELECT".to_string(),
            )),
        }
    }

    async fn ping(&self) -> Result<(), QueryError> {
        self.check_failing()
    }
}
