//! The database handle: one connection, a table registry and the table list.

use crate::client::{Executor, PgConnection};
use crate::config::DatabaseConfig;
use crate::error::{TableError, TableResult};
use crate::ident::{Ident, IntoIdent};
use crate::schema::list_tables;
use crate::table::Table;
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

/// Names an auto-registered table may not take.
pub const RESERVED_TABLE_NAMES: &[&str] = &[
    "close",
    "connect",
    "executor",
    "is_closed",
    "name",
    "registered",
    "registry",
    "table",
    "tables",
    "update_table_data",
    "with_executor",
];

/// Reject table names that collide with reserved registry names; warn on `__` prefixes.
pub fn check_table_names(database: &str, names: &[String]) -> TableResult<()> {
    let collisions: Vec<String> = names
        .iter()
        .filter(|n| RESERVED_TABLE_NAMES.contains(&n.as_str()))
        .cloned()
        .collect();
    if !collisions.is_empty() {
        return Err(TableError::ReservedTableName(collisions));
    }

    let hidden: Vec<&str> = names
        .iter()
        .filter(|n| n.starts_with("__"))
        .map(String::as_str)
        .collect();
    if !hidden.is_empty() {
        tracing::warn!(
            target: "pgtable",
            database,
            tables = ?hidden,
            "table names in database start with '__'"
        );
    }
    Ok(())
}

/// A connected database.
///
/// Owns one executor; [`close`](Self::close) releases it and runs at most once,
/// including implicitly on drop.
pub struct Database<C: Executor = PgConnection> {
    conn: Arc<C>,
    name: String,
    registry: BTreeMap<String, Table<C>>,
    tables: RwLock<Option<Vec<String>>>,
}

impl Database<PgConnection> {
    /// Connect with `config`; with `auto_create` every table is registered up front.
    pub async fn connect(config: DatabaseConfig) -> TableResult<Self> {
        let conn = PgConnection::connect(&config.to_pg_config()).await?;
        tracing::info!(
            target: "pgtable",
            host = %config.host,
            port = config.port,
            database = %config.database,
            "connected"
        );
        Self::with_executor(conn, config.database, config.auto_create).await
    }
}

impl<C: Executor> Database<C> {
    /// Wrap an existing executor.
    pub async fn with_executor(
        executor: C,
        name: impl Into<String>,
        auto_create: bool,
    ) -> TableResult<Self> {
        let mut db = Self {
            conn: Arc::new(executor),
            name: name.into(),
            registry: BTreeMap::new(),
            tables: RwLock::new(None),
        };
        if auto_create {
            db.register_all().await?;
        }
        Ok(db)
    }

    async fn register_all(&mut self) -> TableResult<()> {
        let names = self.tables().await?;
        check_table_names(&self.name, &names)?;
        for name in names {
            let table = Table::new(self.conn.clone(), Ident::exact(&name)?)?;
            self.registry.insert(name, table);
        }
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn executor(&self) -> &Arc<C> {
        &self.conn
    }

    /// Names of all base tables, fetched once.
    pub async fn tables(&self) -> TableResult<Vec<String>> {
        let cached = self
            .tables
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        if let Some(names) = cached {
            return Ok(names);
        }
        let names = list_tables(self.conn.as_ref()).await?;
        *self.tables.write().unwrap_or_else(|e| e.into_inner()) = Some(names.clone());
        Ok(names)
    }

    /// Re-read the table list.
    pub async fn update_table_data(&self) -> TableResult<Vec<String>> {
        *self.tables.write().unwrap_or_else(|e| e.into_inner()) = None;
        self.tables().await
    }

    /// A proxy for `name`: the registered one when present, otherwise a new one.
    pub fn table(&self, name: impl IntoIdent) -> TableResult<Table<C>> {
        let ident = name.into_ident()?;
        if ident.depth() == 1 {
            if let Some(table) = self.registry.get(ident.name()) {
                return Ok(table.clone());
            }
        }
        Table::new(self.conn.clone(), ident)
    }

    /// The auto-registered proxy for `name`.
    pub fn registered(&self, name: &str) -> Option<&Table<C>> {
        self.registry.get(name)
    }

    pub fn registry(&self) -> &BTreeMap<String, Table<C>> {
        &self.registry
    }

    /// Release the connection. Later calls are no-ops.
    pub fn close(&self) {
        if !self.conn.is_closed() {
            tracing::info!(target: "pgtable", database = %self.name, "closing database");
        }
        self.conn.close();
    }

    pub fn is_closed(&self) -> bool {
        self.conn.is_closed()
    }
}

impl<C: Executor> Drop for Database<C> {
    fn drop(&mut self) {
        self.close();
    }
}

impl<C: Executor> std::fmt::Debug for Database<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("name", &self.name)
            .field("registry", &self.registry.keys().collect::<Vec<_>>())
            .field("closed", &self.is_closed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockExecutor, rows};
    use crate::value::Value;

    fn table_list(names: &[&str]) -> Vec<crate::row::Record> {
        rows(
            &["table_name"],
            names.iter().map(|n| vec![Value::from(*n)]).collect(),
        )
    }

    #[tokio::test]
    async fn test_auto_create_registers_every_table() {
        let conn = MockExecutor::new();
        conn.push_rows(table_list(&["items", "logs"]));
        let db = Database::with_executor(conn, "shop", true).await.unwrap();

        assert_eq!(
            db.registry().keys().collect::<Vec<_>>(),
            ["items", "logs"]
        );
        assert_eq!(db.registered("items").unwrap().name().to_string(), "items");
        assert!(db.registered("missing").is_none());
    }

    #[tokio::test]
    async fn test_reserved_name_fails_and_closes() {
        let conn = Arc::new(MockExecutor::new());
        conn.push_rows(table_list(&["items", "close"]));

        let err = Database::with_executor(conn.clone(), "shop", true)
            .await
            .unwrap_err();
        assert!(matches!(err, TableError::ReservedTableName(ref names) if names == &["close"]));
        assert_eq!(conn.close_count(), 1);
    }

    #[test]
    fn test_hidden_names_only_warn() {
        let names = vec!["__audit".to_string(), "items".to_string()];
        assert!(check_table_names("shop", &names).is_ok());
    }

    #[tokio::test]
    async fn test_table_list_is_memoized() {
        let conn = Arc::new(MockExecutor::new());
        conn.push_rows(table_list(&["items"]));
        conn.push_rows(table_list(&["items", "orders"]));
        let db = Database::with_executor(conn.clone(), "shop", false)
            .await
            .unwrap();

        assert_eq!(db.tables().await.unwrap(), ["items"]);
        assert_eq!(db.tables().await.unwrap(), ["items"]);
        assert_eq!(conn.statements().len(), 1);
        assert_eq!(db.update_table_data().await.unwrap(), ["items", "orders"]);
        assert_eq!(conn.statements().len(), 2);
    }

    #[tokio::test]
    async fn test_table_without_registry() {
        let db = Database::with_executor(MockExecutor::new(), "shop", false)
            .await
            .unwrap();
        let table = db.table("public.items").unwrap();
        assert_eq!(table.name().to_sql(), r#""public"."items""#);
        assert!(db.table("bad name").is_err());
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let conn = Arc::new(MockExecutor::new());
        let db = Database::with_executor(conn.clone(), "shop", false)
            .await
            .unwrap();
        db.close();
        db.close();
        assert!(db.is_closed());
        drop(db);
        assert_eq!(conn.close_count(), 1);
    }

    #[tokio::test]
    async fn test_operations_after_close_fail() {
        let db = Database::with_executor(MockExecutor::new(), "shop", false)
            .await
            .unwrap();
        let table = db.table("items").unwrap();
        db.close();
        let err = table.get(1).await.unwrap_err();
        assert!(matches!(err, TableError::Closed));
    }
}
