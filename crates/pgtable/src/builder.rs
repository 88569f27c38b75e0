//! Dynamic statement builder for one table.
//!
//! A [`QueryBuilder`] accumulates columns, joins, predicates, assignments, ordering
//! and paging, then [`render`](QueryBuilder::render)s to exactly one statement. The
//! statement kind is decided at render time, in this order:
//!
//! 1. [`delete_request`](QueryBuilder::delete_request): `DELETE FROM`, or `TRUNCATE`
//!    without predicates
//! 2. [`add_new_values`](QueryBuilder::add_new_values): `UPDATE ... SET`, or
//!    `INSERT INTO ... VALUES` without predicates
//! 3. [`length_request`](QueryBuilder::length_request): `SELECT COUNT(...)`
//! 4. plain `SELECT`
//!
//! # Example
//!
//! ```ignore
//! use pgtable::QueryBuilder;
//!
//! let (sql, next) = QueryBuilder::new("items")
//!     .primary("id")
//!     .add_where_statements(("id", ">", 0))
//!     .limit(10)
//!     .render()?;
//! assert_eq!(
//!     sql.to_sql(),
//!     r#"SELECT * FROM "items" WHERE ("items"."id" > $1) ORDER BY "items"."id" ASC LIMIT $2;"#
//! );
//! // `next` is a fresh builder for the same table
//! ```

use crate::client::Executor;
use crate::error::{TableError, TableResult};
use crate::ident::{Ident, IntoIdent};
use crate::predicate::{Filter, normalize_all};
use crate::row::Record;
use crate::schema::TableSchema;
use crate::sql::Sql;
use crate::value::Value;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Join type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JoinKind {
    #[default]
    Inner,
    Left,
    Right,
    Full,
}

impl JoinKind {
    pub fn as_sql(self) -> &'static str {
        match self {
            JoinKind::Inner => "INNER JOIN",
            JoinKind::Left => "LEFT JOIN",
            JoinKind::Right => "RIGHT JOIN",
            JoinKind::Full => "FULL JOIN",
        }
    }
}

impl FromStr for JoinKind {
    type Err = TableError;

    fn from_str(s: &str) -> TableResult<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "inner" => Ok(JoinKind::Inner),
            "left" => Ok(JoinKind::Left),
            "right" => Ok(JoinKind::Right),
            "full" => Ok(JoinKind::Full),
            other => Err(TableError::validation(format!(
                "unsupported join type '{other}', only allowed: [\"inner\", \"left\", \"right\", \"full\"]"
            ))),
        }
    }
}

/// `<kind> JOIN <table> ON <left> = <right>`
#[derive(Debug, Clone, PartialEq)]
pub struct Join {
    pub kind: JoinKind,
    pub table: Ident,
    pub left: Ident,
    pub right: Ident,
}

impl Join {
    fn to_sql(&self) -> Sql {
        let mut sql = Sql::new(self.kind.as_sql());
        sql.push(" ")
            .push_ident(&self.table)
            .push(" ON ")
            .push_ident(&self.left)
            .push(" = ")
            .push_ident(&self.right);
        sql
    }
}

/// Right-hand side of one `SET` / `VALUES` entry.
#[derive(Debug, Clone, PartialEq)]
pub enum Assignment {
    Value(Value),
    /// The `DEFAULT` keyword.
    Default,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

impl Direction {
    fn as_sql(self) -> &'static str {
        match self {
            Direction::Asc => "ASC",
            Direction::Desc => "DESC",
        }
    }
}

/// Fluent builder for one SQL statement against one table.
#[derive(Debug)]
pub struct QueryBuilder {
    table: Ident,
    primary: Option<Ident>,
    schema: Option<Arc<TableSchema>>,
    consistent: bool,

    columns: Vec<Ident>,
    joins: Vec<Join>,
    wheres: Vec<Sql>,
    updates: Vec<(Ident, Assignment)>,
    order_by: Vec<(Ident, Direction)>,
    limit: Option<i64>,
    offset: Option<i64>,
    delete: bool,
    count: bool,
    distinct: bool,

    build_error: Option<TableError>,
}

impl QueryBuilder {
    /// Create a builder selecting everything from `table`.
    pub fn new(table: impl IntoIdent) -> Self {
        let (table, build_error) = match table.into_ident() {
            Ok(t) => (t, None),
            Err(e) => (Ident::default(), Some(e)),
        };
        Self {
            table,
            primary: None,
            schema: None,
            consistent: false,
            columns: Vec::new(),
            joins: Vec::new(),
            wheres: Vec::new(),
            updates: Vec::new(),
            order_by: Vec::new(),
            limit: None,
            offset: None,
            delete: false,
            count: false,
            distinct: false,
            build_error,
        }
    }

    /// Set the primary key column; the default order becomes `primary ASC`.
    pub fn primary(mut self, column: &str) -> Self {
        match Ident::parse(column) {
            Ok(c) => {
                self.primary = Some(c);
                self.order_by = self.seed_order();
            }
            Err(e) => self.fail(e),
        }
        self
    }

    /// Validate every column reference against `schema`.
    pub fn schema(mut self, schema: Arc<TableSchema>) -> Self {
        self.schema = Some(schema);
        self
    }

    /// Keep the accumulated state after [`render`](Self::render).
    pub fn consistent(mut self) -> Self {
        self.consistent = true;
        self
    }

    pub fn table(&self) -> &Ident {
        &self.table
    }

    pub fn is_consistent(&self) -> bool {
        self.consistent
    }

    /// Explicitly selected columns, qualified.
    pub fn columns(&self) -> &[Ident] {
        &self.columns
    }

    fn fail(&mut self, err: TableError) {
        if self.build_error.is_none() {
            self.build_error = Some(err);
        }
    }

    fn seed_order(&self) -> Vec<(Ident, Direction)> {
        match &self.primary {
            Some(pk) => vec![(self.table.join(pk), Direction::Asc)],
            None => Vec::new(),
        }
    }

    /// Parse a column of this table and check it against the schema, if any.
    fn own_column(&self, column: &str) -> TableResult<Ident> {
        let ident = match &self.schema {
            Some(schema) => {
                schema.require(column)?;
                Ident::exact(column)?
            }
            None => Ident::parse(column)?,
        };
        Ok(ident)
    }

    /// Qualify a bare column with `table`; dotted names are taken as given.
    fn qualified(&self, table: &Ident, column: &str) -> TableResult<Ident> {
        if *table == self.table {
            let col = self.own_column(column)?;
            return Ok(if col.depth() == 1 { table.join(&col) } else { col });
        }
        let col = Ident::parse(column)?;
        Ok(if col.depth() == 1 { table.join(&col) } else { col })
    }

    // ==================== Columns ====================

    /// Restrict the selected columns of this table.
    pub fn add_desired_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for column in columns {
            let table = self.table.clone();
            match self.qualified(&table, column.as_ref()) {
                Ok(c) => self.columns.push(c),
                Err(e) => self.fail(e),
            }
        }
        self
    }

    /// Select columns of a joined table.
    pub fn add_desired_columns_of_foreign_table<I, S>(mut self, table: &str, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let table = match Ident::parse(table) {
            Ok(t) => t,
            Err(e) => {
                self.fail(e);
                return self;
            }
        };
        for column in columns {
            match self.qualified(&table, column.as_ref()) {
                Ok(c) => self.columns.push(c),
                Err(e) => self.fail(e),
            }
        }
        self
    }

    // ==================== Predicates ====================

    /// Add predicates in any accepted notation; all are ANDed.
    ///
    /// Columns are checked against the builder's [`schema`](Self::schema) when one is
    /// set. The reversed free-text form `"value contains column"` is only recognized
    /// with a schema; without one the first token is always read as the column.
    pub fn add_where_statements(mut self, filter: impl Into<Filter>) -> Self {
        let filter = filter.into();
        match normalize_all(&filter, self.schema.as_deref()) {
            Ok(preds) => {
                for pred in preds {
                    self.wheres.push(pred.to_sql(Some(&self.table)));
                }
            }
            Err(e) => self.fail(e),
        }
        self
    }

    /// Add a keyword equality `column = value`.
    pub fn add_where_eq(self, column: &str, value: impl Into<Value>) -> Self {
        self.add_where_statements(Filter::new().eq(column, value))
    }

    pub fn has_predicates(&self) -> bool {
        !self.wheres.is_empty()
    }

    // ==================== Joins ====================

    /// Join `table` on `left = right`.
    ///
    /// A bare `left` column belongs to this builder's table, a bare `right` column to
    /// the joined table.
    pub fn add_join(mut self, kind: JoinKind, table: &str, left: &str, right: &str) -> Self {
        let join = Ident::parse(table).and_then(|joined| {
            let base = self.table.clone();
            Ok(Join {
                kind,
                left: self.qualified(&base, left)?,
                right: self.qualified(&joined, right)?,
                table: joined,
            })
        });
        match join {
            Ok(j) => self.joins.push(j),
            Err(e) => self.fail(e),
        }
        self
    }

    // ==================== Assignments ====================

    fn assign(&mut self, column: &str, value: Assignment) {
        match self.own_column(column) {
            Ok(c) => match self.updates.iter_mut().find(|(k, _)| *k == c) {
                Some(slot) => slot.1 = value,
                None => self.updates.push((c, value)),
            },
            Err(e) => self.fail(e),
        }
    }

    /// Set column values: an `UPDATE` with predicates, an `INSERT` without.
    pub fn add_new_values<I, K, V>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Value>,
    {
        for (column, value) in values {
            self.assign(column.as_ref(), Assignment::Value(value.into()));
        }
        self
    }

    /// Set a single column value.
    pub fn add_new_value(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.assign(column, Assignment::Value(value.into()));
        self
    }

    /// Set a column to its `DEFAULT`.
    pub fn add_default_value(mut self, column: &str) -> Self {
        self.assign(column, Assignment::Default);
        self
    }

    // ==================== Ordering & paging ====================

    fn push_order(&mut self, column: TableResult<Ident>, ascending: bool) {
        let column = match column {
            Ok(c) => c,
            Err(e) => return self.fail(e),
        };
        if let Some((pk, _)) = self.seed_order().first() {
            if *pk != column {
                self.order_by.retain(|(c, _)| c != pk);
            }
        }
        let direction = if ascending {
            Direction::Asc
        } else {
            Direction::Desc
        };
        match self.order_by.iter_mut().find(|(c, _)| *c == column) {
            Some(slot) => slot.1 = direction,
            None => self.order_by.push((column, direction)),
        }
    }

    /// Order by a column of this table. Replaces the primary key seed.
    pub fn order(mut self, column: &str, ascending: bool) -> Self {
        let table = self.table.clone();
        let column = self.qualified(&table, column);
        self.push_order(column, ascending);
        self
    }

    /// Order by a column of a joined table.
    pub fn order_foreign(mut self, table: &str, column: &str, ascending: bool) -> Self {
        let column = Ident::parse(table).and_then(|t| self.qualified(&t, column));
        self.push_order(column, ascending);
        self
    }

    pub fn limit(mut self, rows: u64) -> Self {
        match i64::try_from(rows) {
            Ok(n) => self.limit = Some(n),
            Err(_) => self.fail(TableError::validation(format!(
                "LIMIT {rows} exceeds the largest bindable row count"
            ))),
        }
        self
    }

    pub fn offset(mut self, rows: u64) -> Self {
        match i64::try_from(rows) {
            Ok(n) => self.offset = Some(n),
            Err(_) => self.fail(TableError::validation(format!(
                "OFFSET {rows} exceeds the largest bindable row count"
            ))),
        }
        self
    }

    // ==================== Intent ====================

    /// Delete matching rows (`TRUNCATE` without predicates).
    pub fn delete_request(mut self) -> Self {
        self.delete = true;
        self
    }

    /// Count rows instead of returning them.
    pub fn length_request(mut self, distinct: bool) -> Self {
        self.count = true;
        self.distinct = distinct;
        self
    }

    // ==================== Rendering ====================

    /// A fresh builder for the same table, primary key and schema.
    fn pristine(&self) -> Self {
        let mut fresh = Self::new(self.table.clone());
        fresh.primary = self.primary.clone();
        fresh.schema = self.schema.clone();
        fresh.consistent = self.consistent;
        fresh.order_by = fresh.seed_order();
        fresh
    }

    /// Copy of the accumulated state (only taken when no build error is pending).
    fn snapshot(&self) -> Self {
        Self {
            table: self.table.clone(),
            primary: self.primary.clone(),
            schema: self.schema.clone(),
            consistent: self.consistent,
            columns: self.columns.clone(),
            joins: self.joins.clone(),
            wheres: self.wheres.clone(),
            updates: self.updates.clone(),
            order_by: self.order_by.clone(),
            limit: self.limit,
            offset: self.offset,
            delete: self.delete,
            count: self.count,
            distinct: self.distinct,
            build_error: None,
        }
    }

    fn column_list(&self) -> Sql {
        let mut sql = Sql::empty();
        if self.columns.is_empty() {
            sql.push("*");
        } else {
            for (i, c) in self.columns.iter().enumerate() {
                if i > 0 {
                    sql.push(", ");
                }
                sql.push_ident(c);
            }
        }
        sql
    }

    fn count_target(&self) -> Sql {
        let mut sql = Sql::empty();
        match (self.columns.as_slice(), self.distinct) {
            ([], false) => {
                sql.push("*");
            }
            ([], true) => {
                // whole-row reference through the table's alias
                let alias = Ident::exact(self.table.name()).unwrap_or_default();
                sql.push("DISTINCT ").push_ident(&alias);
            }
            ([single], distinct) => {
                if distinct {
                    sql.push("DISTINCT ");
                }
                sql.push_ident(single);
            }
            (_, distinct) => {
                if distinct {
                    sql.push("DISTINCT ");
                }
                sql.push("ROW(").push_sql(self.column_list()).push(")");
            }
        }
        sql
    }

    fn push_where(&self, sql: &mut Sql) {
        if !self.wheres.is_empty() {
            sql.push(" WHERE ");
            sql.push_joined(self.wheres.iter().cloned(), " AND ");
        }
    }

    fn render_mutation(&self, sql: &mut Sql) -> TableResult<()> {
        if !self.joins.is_empty() || self.limit.is_some() || self.offset.is_some() {
            return Err(TableError::validation(format!(
                "joins, LIMIT and OFFSET only apply to SELECT on table '{}'",
                self.table
            )));
        }
        let push_assignment = |sql: &mut Sql, value: &Assignment| match value {
            Assignment::Value(v) => {
                sql.push_bind(v.clone());
            }
            Assignment::Default => {
                sql.push("DEFAULT");
            }
        };

        if self.delete {
            if self.wheres.is_empty() {
                sql.push("TRUNCATE ").push_ident(&self.table);
            } else {
                sql.push("DELETE FROM ").push_ident(&self.table);
                self.push_where(sql);
            }
        } else if self.wheres.is_empty() {
            sql.push("INSERT INTO ").push_ident(&self.table).push(" (");
            for (i, (column, _)) in self.updates.iter().enumerate() {
                if i > 0 {
                    sql.push(", ");
                }
                sql.push_ident(column);
            }
            sql.push(") VALUES (");
            for (i, (_, value)) in self.updates.iter().enumerate() {
                if i > 0 {
                    sql.push(", ");
                }
                push_assignment(sql, value);
            }
            sql.push(")");
        } else {
            sql.push("UPDATE ").push_ident(&self.table).push(" SET ");
            for (i, (column, value)) in self.updates.iter().enumerate() {
                if i > 0 {
                    sql.push(", ");
                }
                sql.push_ident(column).push(" = ");
                push_assignment(sql, value);
            }
            self.push_where(sql);
        }
        Ok(())
    }

    fn render_select(&self, sql: &mut Sql) {
        if self.count {
            sql.push("SELECT COUNT(")
                .push_sql(self.count_target())
                .push(") FROM ");
        } else {
            sql.push("SELECT ").push_sql(self.column_list()).push(" FROM ");
        }
        sql.push_ident(&self.table);

        for join in &self.joins {
            sql.push(" ").push_sql(join.to_sql());
        }
        self.push_where(sql);

        if !self.count {
            let orders: Vec<_> = self
                .order_by
                .iter()
                .filter(|(c, _)| self.columns.is_empty() || self.columns.contains(c))
                .collect();
            if !orders.is_empty() {
                sql.push(" ORDER BY ");
                for (i, (column, direction)) in orders.into_iter().enumerate() {
                    if i > 0 {
                        sql.push(", ");
                    }
                    sql.push_ident(column).push(" ").push(direction.as_sql());
                }
            }
        }

        if let Some(limit) = self.limit {
            sql.push(" LIMIT ").push_bind(limit);
        }
        if let Some(offset) = self.offset {
            sql.push(" OFFSET ").push_bind(offset);
        }
    }

    /// Render the statement.
    ///
    /// Returns the statement and the builder to use next: a pristine builder for the
    /// same table, or a copy of this one when it was made [`consistent`](Self::consistent).
    pub fn render(mut self) -> TableResult<(Sql, QueryBuilder)> {
        if let Some(err) = self.build_error.take() {
            return Err(err);
        }

        let mut sql = Sql::empty();
        if self.delete || !self.updates.is_empty() {
            self.render_mutation(&mut sql)?;
        } else {
            self.render_select(&mut sql);
        }
        sql.push(";");

        let next = if self.consistent {
            self.snapshot()
        } else {
            self.pristine()
        };
        Ok((sql, next))
    }

    /// Render and run as a query, returning all rows.
    pub async fn fetch_all(self, conn: &impl Executor) -> TableResult<Vec<Record>> {
        let (sql, _) = self.render()?;
        sql.fetch_all(conn).await
    }

    /// Render and run as a statement, returning the affected row count.
    pub async fn execute(self, conn: &impl Executor) -> TableResult<u64> {
        let (sql, _) = self.render()?;
        sql.execute(conn).await
    }

    /// Render a count request and read the single count.
    pub async fn fetch_count(self, conn: &impl Executor) -> TableResult<i64> {
        let rows = self.fetch_all(conn).await?;
        match rows.first().and_then(|r| r.values().first()) {
            Some(Value::Int(n)) => Ok(*n),
            Some(other) => Err(TableError::decode(
                "count",
                format!("expected integer, got {}", other.kind()),
            )),
            None => Err(TableError::decode("count", "no row returned")),
        }
    }
}

impl fmt::Display for QueryBuilder {
    /// The statement this builder would render, without consuming it.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(err) = &self.build_error {
            return write!(f, "<invalid: {err}>");
        }
        match self.snapshot().render() {
            Ok((sql, _)) => f.write_str(&sql.to_sql()),
            Err(err) => write!(f, "<invalid: {err}>"),
        }
    }
}
