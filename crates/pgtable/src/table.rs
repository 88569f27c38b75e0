//! Primary-key-indexed proxy over one table.
//!
//! A [`Table`] caches the table's schema and primary key (see [`SchemaCache`]) and
//! turns row-level operations into single statements built with [`QueryBuilder`].
//!
//! ```ignore
//! let items = db.table("items")?;
//! items.insert(RowInput::named([("value1", "a")]), Some(1.into())).await?;
//! let row = items.get(1).await?;
//! let rows = items.get_where(("id", ">", 0)).await?;
//! items.update_where(RowInput::named([("value1", "new")]), None, ("id", ">", 0)).await?;
//! ```

use crate::builder::QueryBuilder;
use crate::client::{Executor, PgConnection};
use crate::error::{TableError, TableResult};
use crate::ident::{Ident, IntoIdent};
use crate::predicate::{Filter, PredicateInput};
use crate::row::Record;
use crate::schema::{SchemaCache, TableSchema};
use crate::value::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// A row to write: by column name, or by position in schema order.
#[derive(Debug, Clone, PartialEq)]
pub enum RowInput {
    Named(Vec<(String, Value)>),
    /// One value per schema column. Empty strings leave the column to its default.
    Positional(Vec<Value>),
}

impl RowInput {
    pub fn named<I, K, V>(values: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        RowInput::Named(
            values
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    pub fn positional<I, V>(values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        RowInput::Positional(values.into_iter().map(Into::into).collect())
    }

    fn describe(&self) -> String {
        match self {
            RowInput::Named(values) => format!("{values:?}"),
            RowInput::Positional(values) => format!("{values:?}"),
        }
    }
}

impl From<Vec<Value>> for RowInput {
    fn from(values: Vec<Value>) -> Self {
        RowInput::Positional(values)
    }
}

impl From<Vec<(String, Value)>> for RowInput {
    fn from(values: Vec<(String, Value)>) -> Self {
        RowInput::Named(values)
    }
}

impl<K: Into<String>, V: Into<Value>> From<BTreeMap<K, V>> for RowInput {
    fn from(values: BTreeMap<K, V>) -> Self {
        RowInput::named(values)
    }
}

impl<K: Into<String>, V: Into<Value>> From<HashMap<K, V>> for RowInput {
    fn from(values: HashMap<K, V>) -> Self {
        RowInput::named(values)
    }
}

/// Proxy for one table, sharing the database's executor.
pub struct Table<C: Executor = PgConnection> {
    conn: Arc<C>,
    cache: Arc<SchemaCache>,
    /// Columns returned by reads; empty means all.
    columns: Vec<String>,
}

impl<C: Executor> Clone for Table<C> {
    fn clone(&self) -> Self {
        Self {
            conn: self.conn.clone(),
            cache: self.cache.clone(),
            columns: self.columns.clone(),
        }
    }
}

impl<C: Executor> std::fmt::Debug for Table<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Table")
            .field("name", self.cache.table())
            .field("columns", &self.columns)
            .finish()
    }
}

impl<C: Executor> Table<C> {
    /// Create a proxy. Nothing is fetched until first use.
    pub fn new(conn: Arc<C>, name: impl IntoIdent) -> TableResult<Self> {
        Ok(Self {
            conn,
            cache: Arc::new(SchemaCache::new(name.into_ident()?)),
            columns: Vec::new(),
        })
    }

    pub fn name(&self) -> &Ident {
        self.cache.table()
    }

    pub async fn schema(&self) -> TableResult<Arc<TableSchema>> {
        self.cache.schema(self.conn.as_ref()).await
    }

    pub async fn primary(&self) -> TableResult<Option<String>> {
        self.cache.primary(self.conn.as_ref()).await
    }

    pub fn invalidate_schema(&self) {
        self.cache.invalidate_schema();
    }

    pub fn invalidate_primary(&self) {
        self.cache.invalidate_primary();
    }

    /// A proxy whose reads return only `columns`. Shares this proxy's cache.
    pub async fn select_columns<I, S>(&self, columns: I) -> TableResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let schema = self.schema().await?;
        let columns = columns
            .into_iter()
            .map(|c| {
                let c = c.into();
                schema.require(&c).map(|_| c.clone())
            })
            .collect::<TableResult<Vec<_>>>()?;
        Ok(Self {
            columns,
            ..self.clone()
        })
    }

    pub fn selected_columns(&self) -> &[String] {
        &self.columns
    }

    fn bare(&self, schema: Arc<TableSchema>, primary: Option<&str>) -> QueryBuilder {
        let qb = QueryBuilder::new(self.name()).schema(schema);
        match primary {
            Some(pk) => qb.primary(pk),
            None => qb,
        }
    }

    /// A builder for this table with its schema, primary key and selected columns.
    pub async fn query(&self) -> TableResult<QueryBuilder> {
        let schema = self.schema().await?;
        let primary = self.primary().await?;
        let qb = self.bare(schema, primary.as_deref());
        Ok(if self.columns.is_empty() {
            qb
        } else {
            qb.add_desired_columns(&self.columns)
        })
    }

    // ==================== Reads ====================

    /// The single row with primary key `key`.
    pub async fn get(&self, key: impl Into<Value>) -> TableResult<Record> {
        let key = key.into();
        let pk = self.cache.require_primary(self.conn.as_ref()).await?;
        let mut rows = self
            .query()
            .await?
            .add_where_eq(&pk, key.clone())
            .fetch_all(self.conn.as_ref())
            .await?;
        match rows.len() {
            0 => Err(TableError::not_found(format!(
                "no row in table '{}' with {pk} = {key}",
                self.name()
            ))),
            1 => Ok(rows.remove(0)),
            got => Err(TableError::Ambiguous {
                table: self.name().to_string(),
                key: format!("{pk} = {key}"),
                got,
            }),
        }
    }

    /// All rows matching every predicate, ordered by primary key.
    ///
    /// A lone equality on the primary key is a point lookup: no match yields an
    /// empty vector, more than one match is an error.
    pub async fn get_where(&self, filter: impl Into<Filter>) -> TableResult<Vec<Record>> {
        let filter = filter.into();
        if let Some((column, value)) = filter.single_equality() {
            if self.primary().await?.as_deref() == Some(column) {
                return match self.get(value.clone()).await {
                    Ok(row) => Ok(vec![row]),
                    Err(e) if e.is_not_found() => Ok(Vec::new()),
                    Err(e) => Err(e),
                };
            }
        }
        self.query()
            .await?
            .add_where_statements(filter)
            .fetch_all(self.conn.as_ref())
            .await
    }

    /// Number of rows matching the filter.
    pub async fn count(&self, filter: impl Into<Filter>) -> TableResult<i64> {
        self.query()
            .await?
            .add_where_statements(filter)
            .length_request(false)
            .fetch_count(self.conn.as_ref())
            .await
    }

    /// Number of distinct rows (over the selected columns) matching the filter.
    pub async fn count_distinct(&self, filter: impl Into<Filter>) -> TableResult<i64> {
        self.query()
            .await?
            .add_where_statements(filter)
            .length_request(true)
            .fetch_count(self.conn.as_ref())
            .await
    }

    // ==================== Writes ====================

    /// Map a row onto schema columns, injecting `primary_key` when given.
    fn resolve_row(
        &self,
        schema: &TableSchema,
        row: RowInput,
        primary_key: Option<Value>,
    ) -> TableResult<Vec<(String, Value)>> {
        let pk = match (&primary_key, schema.primary()) {
            (Some(_), None) => return Err(TableError::NoPrimaryKey(self.name().to_string())),
            (_, pk) => pk,
        };

        match row {
            RowInput::Named(values) => {
                let mut resolved = Vec::with_capacity(values.len() + 1);
                for (column, value) in values {
                    schema.require(&column)?;
                    resolved.push((column, value));
                }
                if let (Some(key), Some(pk)) = (primary_key, pk) {
                    match resolved.iter_mut().find(|(c, _)| c == pk) {
                        Some(slot) => slot.1 = key,
                        None => resolved.push((pk.to_string(), key)),
                    }
                }
                Ok(resolved)
            }
            RowInput::Positional(values) => {
                let full = schema.len();
                let fits = values.len() == full
                    || (primary_key.is_some() && values.len() + 1 == full);
                if !fits {
                    let expected = if primary_key.is_some() {
                        format!("{} or {}", full.saturating_sub(1), full)
                    } else {
                        full.to_string()
                    };
                    return Err(TableError::LengthMismatch {
                        table: self.name().to_string(),
                        expected,
                        got: values.len(),
                        row: RowInput::Positional(values).describe(),
                    });
                }
                let skip_pk = values.len() + 1 == full;
                let mut values = values.into_iter();
                let mut key = primary_key;
                let mut resolved = Vec::with_capacity(full);
                for column in schema.columns() {
                    let is_pk = Some(column.name.as_str()) == pk;
                    let value = match (is_pk, skip_pk) {
                        (true, true) => key.take(),
                        (true, false) => {
                            let given = values.next();
                            key.take().or(given)
                        }
                        (false, _) => values.next(),
                    };
                    match value {
                        Some(v) if v.is_empty_text() => {}
                        Some(v) => resolved.push((column.name.clone(), v)),
                        None => {}
                    }
                }
                Ok(resolved)
            }
        }
    }

    /// Insert one row; returns the affected row count.
    pub async fn insert(
        &self,
        row: impl Into<RowInput>,
        primary_key: Option<Value>,
    ) -> TableResult<u64> {
        let schema = self.schema().await?;
        let values = self.resolve_row(&schema, row.into(), primary_key)?;
        if values.is_empty() {
            return Err(TableError::validation(format!(
                "nothing to insert into table '{}'",
                self.name()
            )));
        }
        self.bare(schema, None)
            .add_new_values(values)
            .execute(self.conn.as_ref())
            .await
    }

    async fn update_inner(
        &self,
        row: RowInput,
        primary_key: Option<Value>,
        filter: Filter,
        fill_defaults: bool,
    ) -> TableResult<u64> {
        let schema = self.schema().await?;
        let pk = schema.primary().map(str::to_string);
        let mut values = self.resolve_row(&schema, row, primary_key)?;
        let mut filter = filter;

        if let Some(pk) = &pk {
            if let Some(idx) = values.iter().position(|(c, _)| c == pk) {
                let (column, key) = values.remove(idx);
                filter.push(PredicateInput::keyword(column, key));
            }
        }
        if filter.is_empty() {
            return Err(TableError::MissingPredicate(format!(
                "update of table '{}' needs at least one predicate or a primary key value",
                self.name()
            )));
        }

        let defaults: Vec<&str> = if fill_defaults {
            schema
                .columns()
                .iter()
                .filter(|c| !c.is_primary() && c.has_default())
                .filter(|c| !values.iter().any(|(name, _)| *name == c.name))
                .map(|c| c.name.as_str())
                .collect()
        } else {
            Vec::new()
        };
        if values.is_empty() && defaults.is_empty() {
            return Err(TableError::EmptyUpdate(self.name().to_string()));
        }

        let mut qb = self.bare(schema.clone(), None).add_new_values(values);
        for column in defaults {
            qb = qb.add_default_value(column);
        }
        qb.add_where_statements(filter)
            .execute(self.conn.as_ref())
            .await
    }

    /// Update matching rows. A primary key in the row is moved into the predicates.
    pub async fn update_where(
        &self,
        row: impl Into<RowInput>,
        primary_key: Option<Value>,
        filter: impl Into<Filter>,
    ) -> TableResult<u64> {
        self.update_inner(row.into(), primary_key, filter.into(), false)
            .await
    }

    /// Like [`update_where`](Self::update_where), resetting every column the row leaves
    /// out to its schema default.
    pub async fn set_where(
        &self,
        row: impl Into<RowInput>,
        primary_key: Option<Value>,
        filter: impl Into<Filter>,
    ) -> TableResult<u64> {
        self.update_inner(row.into(), primary_key, filter.into(), true)
            .await
    }

    /// Upsert by primary key: replace the row at `key`, or insert it.
    pub async fn set(&self, key: impl Into<Value>, row: impl Into<RowInput>) -> TableResult<u64> {
        let key = key.into();
        let row = row.into();
        match self.get(key.clone()).await {
            Ok(_) => self.set_where(row, Some(key), Filter::new()).await,
            Err(e) if e.is_not_found() => {
                tracing::debug!(target: "pgtable", table = %self.name(), %key, "upsert inserts new row");
                self.insert(row, Some(key)).await
            }
            Err(e) => Err(e),
        }
    }

    /// Delete the row with primary key `key`.
    pub async fn delete(&self, key: impl Into<Value>) -> TableResult<u64> {
        let schema = self.schema().await?;
        let pk = self.cache.require_primary(self.conn.as_ref()).await?;
        self.bare(schema, None)
            .add_where_eq(&pk, key)
            .delete_request()
            .execute(self.conn.as_ref())
            .await
    }

    /// Delete matching rows. An empty filter is refused; use [`truncate`](Self::truncate).
    pub async fn delete_where(&self, filter: impl Into<Filter>) -> TableResult<u64> {
        let filter = filter.into();
        if filter.is_empty() {
            return Err(TableError::MissingPredicate(format!(
                "delete_where on table '{}' needs at least one predicate; use truncate() to clear the table",
                self.name()
            )));
        }
        let schema = self.schema().await?;
        self.bare(schema, None)
            .add_where_statements(filter)
            .delete_request()
            .execute(self.conn.as_ref())
            .await
    }

    /// Remove every row.
    pub async fn truncate(&self) -> TableResult<u64> {
        QueryBuilder::new(self.name())
            .delete_request()
            .execute(self.conn.as_ref())
            .await
    }
}
