pub mod entity;
pub mod mapper;
#[cfg(any(test, feature = "test-utils"))]
pub mod mock;
pub mod querier;
pub mod statement;

pub use entity::{Entity, Field, FieldKind, Row, SqlValue};
pub use querier::{PgQuerier, QueryError, Querier};
pub use statement::{Filter, Order, Statement};
