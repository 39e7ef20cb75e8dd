//! Generic record mapper.
//!
//! Turns any [`Entity`] into SELECT/INSERT/UPDATE/DELETE statements and runs
//! them through a [`Querier`]. Excluded fields never reach a statement and
//! immutable fields never reach a SET clause.

use crate::errors::HbError;
use crate::repositories::entity::{Entity, SqlValue};
use crate::repositories::querier::{QueryError, Querier};
use crate::repositories::statement::{Filter, Order, Statement};
use tracing::{debug, error};

/// Column used when a listing supplies no ordering.
pub const DEFAULT_ORDER_COLUMN: &str = "created_at";

/// Fetch every record matching `filter`.
///
/// Results are ordered by `created_at DESC` unless the filter orders them.
pub async fn get_all<E: Entity>(db: &dyn Querier, filter: Filter) -> Result<Vec<E>, HbError> {
    validate_filter::<E>(&filter)?;

    let filter = if filter.has_order() || !E::has_column(DEFAULT_ORDER_COLUMN) {
        filter
    } else {
        filter.order_by(DEFAULT_ORDER_COLUMN, Order::Desc)
    };

    let stmt = Statement::Select {
        table: E::TABLE,
        columns: E::persisted_fields(),
        filter,
    };

    let rows = run_query(db, &stmt, "fetch").await?;
    rows.iter()
        .map(|row| E::from_row(row).map_err(|e| wrap("fetch", E::TABLE, &e)))
        .collect()
}

/// Fetch exactly one record. Zero rows is `NotFound`.
pub async fn get_one<E: Entity>(db: &dyn Querier, filter: Filter) -> Result<E, HbError> {
    validate_filter::<E>(&filter)?;

    let stmt = Statement::Select {
        table: E::TABLE,
        columns: E::persisted_fields(),
        filter: filter.limit(1),
    };

    let row = match db.query_row(&stmt).await {
        Ok(row) => row,
        Err(QueryError::NoRows) => {
            return Err(HbError::NotFound(format!("{} record not found", E::TABLE)));
        }
        Err(e) => {
            log_failure(&stmt, &e);
            return Err(wrap("fetch", E::TABLE, &e));
        }
    };
    log_success(&stmt);

    E::from_row(&row).map_err(|e| wrap("fetch", E::TABLE, &e))
}

/// Insert a record.
pub async fn create<E: Entity>(db: &dyn Querier, record: &E) -> Result<(), HbError> {
    let values = E::persisted_fields()
        .into_iter()
        .map(|field| {
            let value = record
                .value(field.name)
                .unwrap_or(SqlValue::Null(field.kind));
            (field.name, value)
        })
        .collect();

    let stmt = Statement::Insert {
        table: E::TABLE,
        values,
    };

    run_exec(db, &stmt, "create").await?;
    Ok(())
}

/// Write every mutable persisted field of `record` to the rows matching
/// `filter`. Zero affected rows is `NotFound`.
pub async fn update<E: Entity>(db: &dyn Querier, record: &E, filter: Filter) -> Result<(), HbError> {
    validate_filter::<E>(&filter)?;
    if filter.conditions().is_empty() {
        return Err(HbError::Internal(format!(
            "Refusing to update every row of {}",
            E::TABLE
        )));
    }

    let assignments = E::persisted_fields()
        .into_iter()
        .filter(|field| !field.immutable)
        .map(|field| {
            let value = record
                .value(field.name)
                .unwrap_or(SqlValue::Null(field.kind));
            (field.name, value)
        })
        .collect();

    let stmt = Statement::Update {
        table: E::TABLE,
        assignments,
        filter,
    };

    if run_exec(db, &stmt, "update").await? == 0 {
        return Err(HbError::NotFound(format!("{} record not found", E::TABLE)));
    }
    Ok(())
}

/// Delete the rows matching `filter`. Zero affected rows is `NotFound`.
pub async fn delete<E: Entity>(db: &dyn Querier, filter: Filter) -> Result<(), HbError> {
    validate_filter::<E>(&filter)?;
    if filter.conditions().is_empty() {
        return Err(HbError::Internal(format!(
            "Refusing to delete every row of {}",
            E::TABLE
        )));
    }

    let stmt = Statement::Delete {
        table: E::TABLE,
        filter,
    };

    if run_exec(db, &stmt, "delete").await? == 0 {
        return Err(HbError::NotFound(format!("{} record not found", E::TABLE)));
    }
    Ok(())
}

fn validate_filter<E: Entity>(filter: &Filter) -> Result<(), HbError> {
    if let Some(column) = filter.columns().find(|c| !E::has_column(c)) {
        return Err(HbError::Internal(format!(
            "Unknown column {} for {}",
            column,
            E::TABLE
        )));
    }
    Ok(())
}

async fn run_query(
    db: &dyn Querier,
    stmt: &Statement,
    action: &str,
) -> Result<Vec<crate::repositories::entity::Row>, HbError> {
    match db.query(stmt).await {
        Ok(rows) => {
            log_success(stmt);
            Ok(rows)
        }
        Err(e) => {
            log_failure(stmt, &e);
            Err(wrap(action, stmt.table(), &e))
        }
    }
}

async fn run_exec(db: &dyn Querier, stmt: &Statement, action: &str) -> Result<u64, HbError> {
    match db.exec(stmt).await {
        Ok(affected) => {
            log_success(stmt);
            Ok(affected)
        }
        Err(e) => {
            log_failure(stmt, &e);
            Err(wrap(action, stmt.table(), &e))
        }
    }
}

fn wrap(action: &str, table: &str, err: &QueryError) -> HbError {
    match err {
        QueryError::UniqueViolation(constraint) => HbError::UniqueViolation {
            table: table.to_string(),
            constraint: constraint.clone(),
        },
        QueryError::NoRows => HbError::NotFound(format!("{} record not found", table)),
        other => HbError::Database(format!("Failed to {} {}: {}", action, table, other)),
    }
}

fn log_success(stmt: &Statement) {
    debug!(
        target: "hb.store",
        operation = stmt.operation(),
        table = stmt.table(),
        sql = %stmt.sql(),
        "Statement executed"
    );
}

// Parameter kinds only; values may hold password hashes or emails
fn log_failure(stmt: &Statement, err: &QueryError) {
    let (sql, params) = stmt.build();
    let kinds: Vec<&str> = params.iter().map(SqlValue::describe).collect();
    error!(
        target: "hb.store",
        operation = stmt.operation(),
        table = stmt.table(),
        sql = %sql,
        param_count = params.len(),
        param_kinds = ?kinds,
        error = %err,
        "Statement failed"
    );
}
