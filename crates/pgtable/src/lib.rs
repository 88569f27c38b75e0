//! # pgtable
//!
//! Single-table proxies and a dynamic query constructor for PostgreSQL.
//!
//! ## Features
//!
//! - **Schema-aware proxies**: a [`Table`] introspects its columns and primary key once and
//!   caches them until told otherwise
//! - **Three predicate notations**: keyword pairs, `(column, operator, value)` triples and
//!   `"column operator value"` text all normalize to the same parameterized SQL
//! - **One constructor, every statement**: [`QueryBuilder`] renders SELECT, COUNT, INSERT,
//!   UPDATE, DELETE and TRUNCATE and resets itself after each render
//! - **Safe defaults**: filtered deletes and updates require a predicate; unknown columns and
//!   operators fail before anything reaches the server
//!
//! ## Table proxy
//!
//! ```ignore
//! use pgtable::{Database, DatabaseConfig, Filter, RowInput};
//!
//! let db = Database::connect(DatabaseConfig::from_env()?).await?;
//! let items = db.table("items")?;
//!
//! items.insert(RowInput::named([("value1", "a")]), Some(1.into())).await?;
//! let row = items.get(1).await?;
//! let recent = items.get_where("timestamp > '2020-01-01'").await?;
//! items.update_where(RowInput::named([("value1", "b")]), None, ("id", "<", 10)).await?;
//! items.delete_where(Filter::new().eq("value1", "b")).await?;
//! ```
//!
//! ## Query builder
//!
//! ```ignore
//! use pgtable::{JoinKind, QueryBuilder};
//!
//! let rows = QueryBuilder::new("orders")
//!     .add_desired_columns(["id", "total"])
//!     .add_join(JoinKind::Left, "customers", "customer_id", "id")
//!     .add_where_statements(("total", ">", 100))
//!     .order("total", false)
//!     .limit(10)
//!     .fetch_all(db.executor().as_ref())
//!     .await?;
//! ```

pub mod builder;
pub mod client;
pub mod config;
pub mod database;
pub mod error;
pub mod ident;
pub mod predicate;
pub mod row;
pub mod schema;
pub mod sql;
pub mod table;
pub mod value;

#[cfg(test)]
mod testing;

pub use builder::{Assignment, Direction, Join, JoinKind, QueryBuilder};
pub use client::{Executor, PgConnection};
pub use config::{DATABASE_URL_ENV, DatabaseConfig};
pub use database::{Database, RESERVED_TABLE_NAMES};
pub use error::{TableError, TableResult};
pub use ident::{Ident, IntoIdent};
pub use predicate::{
    ALLOWED_OPERATORS, Filter, Operand, Operator, Predicate, PredicateInput, normalize,
    normalize_all,
};
pub use row::Record;
pub use schema::{ColumnSchema, KeyRole, SchemaCache, TableSchema};
pub use sql::Sql;
pub use table::{RowInput, Table};
pub use value::Value;
