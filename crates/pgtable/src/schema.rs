//! Table schema introspection and the per-table schema cache.

use crate::client::Executor;
use crate::error::{TableError, TableResult};
use crate::ident::Ident;
use crate::row::Record;
use crate::value::Value;
use serde::Serialize;
use std::sync::{Arc, RwLock};

/// The role a column plays in the table's keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyRole {
    #[default]
    None,
    Primary,
    Unique,
    Foreign,
}

impl KeyRole {
    fn from_catalog(code: &str) -> Self {
        match code {
            "PRI" => KeyRole::Primary,
            "UNI" => KeyRole::Unique,
            "FOR" => KeyRole::Foreign,
            _ => KeyRole::None,
        }
    }
}

/// One column as reported by the catalog.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnSchema {
    pub name: String,
    /// Declared type, e.g. `integer` or `character varying(20)`.
    pub data_type: String,
    pub nullable: bool,
    pub key: KeyRole,
    /// Default expression, e.g. `nextval('items_id_seq'::regclass)`.
    pub default: Option<String>,
    /// `identity always`, `identity by default` or `generated stored`.
    pub extra: Option<String>,
}

impl ColumnSchema {
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            nullable: true,
            key: KeyRole::None,
            default: None,
            extra: None,
        }
    }

    pub fn primary(mut self) -> Self {
        self.key = KeyRole::Primary;
        self.nullable = false;
        self
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn default_expr(mut self, expr: impl Into<String>) -> Self {
        self.default = Some(expr.into());
        self
    }

    pub fn is_primary(&self) -> bool {
        self.key == KeyRole::Primary
    }

    /// Whether the engine fills this column when it is left out.
    pub fn has_default(&self) -> bool {
        self.default.is_some() || self.extra.is_some()
    }

    fn from_record(record: &Record) -> TableResult<Self> {
        let name = record
            .text("column_name")?
            .ok_or_else(|| TableError::decode("column_name", "unexpected NULL"))?;
        let data_type = record.text("data_type")?.unwrap_or_default();
        let nullable = match record.try_get("nullable")? {
            Value::Bool(b) => *b,
            other => {
                return Err(TableError::decode(
                    "nullable",
                    format!("expected bool, got {}", other.kind()),
                ));
            }
        };
        let key = KeyRole::from_catalog(record.text("key_role")?.as_deref().unwrap_or(""));
        let default = record.text("column_default")?;
        let extra = record.text("extra")?.filter(|e| !e.is_empty());

        Ok(Self {
            name,
            data_type,
            nullable,
            key,
            default,
            extra,
        })
    }
}

/// The ordered column list of one table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableSchema {
    table: String,
    columns: Vec<ColumnSchema>,
}

impl TableSchema {
    pub fn new(table: impl Into<String>, columns: Vec<ColumnSchema>) -> Self {
        Self {
            table: table.into(),
            columns,
        }
    }

    /// Table name as it was introspected.
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Columns in engine order.
    pub fn columns(&self) -> &[ColumnSchema] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn column(&self, name: &str) -> Option<&ColumnSchema> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    /// The column, or an `UnknownColumn` error listing the available ones.
    pub fn require(&self, name: &str) -> TableResult<&ColumnSchema> {
        self.column(name).ok_or_else(|| TableError::UnknownColumn {
            column: name.to_string(),
            table: self.table.clone(),
            available: self.column_names(),
        })
    }

    /// First primary key column in column order.
    pub fn primary(&self) -> Option<&str> {
        self.columns
            .iter()
            .find(|c| c.is_primary())
            .map(|c| c.name.as_str())
    }
}

const COLUMNS_QUERY: &str = "\
SELECT a.attname::text AS column_name, \
format_type(a.atttypid, a.atttypmod) AS data_type, \
NOT a.attnotnull AS nullable, \
CASE \
WHEN EXISTS (SELECT 1 FROM pg_constraint c WHERE c.conrelid = a.attrelid AND a.attnum = ANY (c.conkey) AND c.contype = 'p') THEN 'PRI' \
WHEN EXISTS (SELECT 1 FROM pg_constraint c WHERE c.conrelid = a.attrelid AND a.attnum = ANY (c.conkey) AND c.contype = 'u') THEN 'UNI' \
WHEN EXISTS (SELECT 1 FROM pg_constraint c WHERE c.conrelid = a.attrelid AND a.attnum = ANY (c.conkey) AND c.contype = 'f') THEN 'FOR' \
ELSE '' END AS key_role, \
pg_get_expr(d.adbin, d.adrelid) AS column_default, \
CASE \
WHEN a.attidentity = 'a' THEN 'identity always' \
WHEN a.attidentity = 'd' THEN 'identity by default' \
WHEN a.attgenerated = 's' THEN 'generated stored' \
ELSE '' END AS extra \
FROM pg_attribute a \
LEFT JOIN pg_attrdef d ON d.adrelid = a.attrelid AND d.adnum = a.attnum \
WHERE a.attrelid = to_regclass($1) AND a.attnum > 0 AND NOT a.attisdropped \
ORDER BY a.attnum";

const TABLES_QUERY: &str = "\
SELECT table_name::text AS table_name \
FROM information_schema.tables \
WHERE table_schema = current_schema() AND table_type = 'BASE TABLE' \
ORDER BY table_name";

/// Introspect one table. An unknown table fails with `TableNotFound`.
pub async fn fetch_schema(conn: &impl Executor, table: &Ident) -> TableResult<TableSchema> {
    tracing::debug!(target: "pgtable", table = %table, "fetching schema");
    let rows = conn
        .query(COLUMNS_QUERY, &[Value::Text(table.to_sql())])
        .await?;
    if rows.is_empty() {
        return Err(TableError::TableNotFound(table.to_string()));
    }
    let columns = rows
        .iter()
        .map(ColumnSchema::from_record)
        .collect::<TableResult<Vec<_>>>()?;
    Ok(TableSchema::new(table.name(), columns))
}

/// Names of all base tables in the current schema, sorted.
pub async fn list_tables(conn: &impl Executor) -> TableResult<Vec<String>> {
    let rows = conn.query(TABLES_QUERY, &[]).await?;
    rows.iter()
        .map(|r| {
            r.text("table_name")?
                .ok_or_else(|| TableError::decode("table_name", "unexpected NULL"))
        })
        .collect()
}

#[derive(Debug, Clone, Default)]
enum PrimaryState {
    #[default]
    Unknown,
    Absent,
    Known(String),
}

#[derive(Debug, Default)]
struct CacheState {
    schema: Option<Arc<TableSchema>>,
    primary: PrimaryState,
}

/// Lazily fetched, explicitly invalidated schema and primary key of one table.
///
/// Nothing invalidates the cache implicitly; after DDL the caller clears it.
#[derive(Debug)]
pub struct SchemaCache {
    table: Ident,
    state: RwLock<CacheState>,
}

impl SchemaCache {
    pub fn new(table: Ident) -> Self {
        Self {
            table,
            state: RwLock::new(CacheState::default()),
        }
    }

    pub fn table(&self) -> &Ident {
        &self.table
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, CacheState> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, CacheState> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }

    /// The table schema, fetched on first use.
    pub async fn schema(&self, conn: &impl Executor) -> TableResult<Arc<TableSchema>> {
        let cached = self.read().schema.clone();
        if let Some(schema) = cached {
            return Ok(schema);
        }
        let schema = Arc::new(fetch_schema(conn, &self.table).await?);
        self.write().schema = Some(schema.clone());
        Ok(schema)
    }

    /// The primary key column, `None` when the table has none.
    pub async fn primary(&self, conn: &impl Executor) -> TableResult<Option<String>> {
        let cached = self.read().primary.clone();
        match cached {
            PrimaryState::Known(name) => return Ok(Some(name)),
            PrimaryState::Absent => return Ok(None),
            PrimaryState::Unknown => {}
        }
        let schema = self.schema(conn).await?;
        let primary = schema.primary().map(str::to_string);
        self.write().primary = match &primary {
            Some(name) => PrimaryState::Known(name.clone()),
            None => PrimaryState::Absent,
        };
        Ok(primary)
    }

    /// The primary key column, or `NoPrimaryKey`.
    pub async fn require_primary(&self, conn: &impl Executor) -> TableResult<String> {
        self.primary(conn)
            .await?
            .ok_or_else(|| TableError::NoPrimaryKey(self.table.to_string()))
    }

    /// Forget the schema (and the primary key derived from it).
    pub fn invalidate_schema(&self) {
        *self.write() = CacheState::default();
    }

    /// Forget the primary key (and the schema it was derived from).
    pub fn invalidate_primary(&self) {
        *self.write() = CacheState::default();
    }

    /// Whether a schema is currently cached.
    pub fn is_cached(&self) -> bool {
        self.read().schema.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockExecutor, catalog};

    #[tokio::test]
    async fn test_schema_is_fetched_once() {
        let conn = MockExecutor::new();
        conn.push_rows(catalog(&[
            ("id", "integer", "PRI"),
            ("value1", "text", ""),
            ("timestamp", "timestamp without time zone", ""),
        ]));
        let cache = SchemaCache::new(Ident::parse("items").unwrap());

        let schema = cache.schema(&conn).await.unwrap();
        assert_eq!(schema.column_names(), ["id", "value1", "timestamp"]);
        assert_eq!(schema.primary(), Some("id"));
        assert_eq!(cache.primary(&conn).await.unwrap().as_deref(), Some("id"));
        cache.schema(&conn).await.unwrap();

        let log = conn.statements();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].1, vec![Value::from("\"items\"")]);
    }

    #[tokio::test]
    async fn test_invalidate_forces_refetch() {
        let conn = MockExecutor::new();
        conn.push_rows(catalog(&[("id", "integer", "PRI")]));
        conn.push_rows(catalog(&[("id", "integer", ""), ("name", "text", "")]));
        let cache = SchemaCache::new(Ident::parse("items").unwrap());

        assert_eq!(cache.primary(&conn).await.unwrap().as_deref(), Some("id"));
        cache.invalidate_primary();
        assert!(!cache.is_cached());
        assert_eq!(cache.primary(&conn).await.unwrap(), None);
        // "no primary key" is memoized too
        assert_eq!(cache.primary(&conn).await.unwrap(), None);
        assert_eq!(conn.statements().len(), 2);
    }

    #[tokio::test]
    async fn test_unknown_table() {
        let conn = MockExecutor::new();
        conn.push_rows(vec![]);
        let cache = SchemaCache::new(Ident::parse("nope").unwrap());
        let err = cache.schema(&conn).await.unwrap_err();
        assert!(matches!(err, TableError::TableNotFound(ref t) if t == "nope"));
    }

    #[tokio::test]
    async fn test_require_primary_without_key() {
        let conn = MockExecutor::new();
        conn.push_rows(catalog(&[("a", "text", "UNI")]));
        let cache = SchemaCache::new(Ident::parse("logs").unwrap());
        let err = cache.require_primary(&conn).await.unwrap_err();
        assert!(matches!(err, TableError::NoPrimaryKey(_)));
    }

    #[test]
    fn test_require_names_available_columns() {
        let schema = TableSchema::new(
            "items",
            vec![ColumnSchema::new("id", "integer").primary()],
        );
        let err = schema.require("nope").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Column 'nope' not found in table 'items' (available: [\"id\"])"
        );
    }
}
