//! The execution seam between rendered statements and the engine.

use crate::error::{TableError, TableResult};
use crate::row::Record;
use crate::value::Value;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::task::JoinHandle;
use tokio_postgres::NoTls;
use tokio_postgres::types::ToSql;

/// Something that can run a rendered statement.
///
/// Table proxies and the query builder only ever talk to the engine through this
/// trait. Each call is one round trip; nothing is pipelined or retried.
pub trait Executor: Send + Sync {
    /// Execute a query and return all rows.
    fn query(
        &self,
        sql: &str,
        params: &[Value],
    ) -> impl std::future::Future<Output = TableResult<Vec<Record>>> + Send;

    /// Execute a statement and return the number of affected rows.
    fn execute(
        &self,
        sql: &str,
        params: &[Value],
    ) -> impl std::future::Future<Output = TableResult<u64>> + Send;

    /// Release the underlying connection. Must be safe to call more than once.
    fn close(&self) {}

    /// Whether [`Executor::close`] has run.
    fn is_closed(&self) -> bool {
        false
    }
}

fn bind_refs(params: &[Value]) -> Vec<&(dyn ToSql + Sync)> {
    params.iter().map(|v| v as &(dyn ToSql + Sync)).collect()
}

async fn client_query(
    client: &tokio_postgres::Client,
    sql: &str,
    params: &[Value],
) -> TableResult<Vec<Record>> {
    tracing::debug!(target: "pgtable.sql", sql, params = params.len(), "query");
    let rows = client
        .query(sql, &bind_refs(params))
        .await
        .map_err(TableError::from_db_error)?;

    let Some(first) = rows.first() else {
        return Ok(Vec::new());
    };
    let columns: Arc<[String]> = first
        .columns()
        .iter()
        .map(|c| c.name().to_string())
        .collect();
    rows.iter()
        .map(|row| Record::from_pg_row_with(row, columns.clone()))
        .collect()
}

async fn client_execute(
    client: &tokio_postgres::Client,
    sql: &str,
    params: &[Value],
) -> TableResult<u64> {
    tracing::debug!(target: "pgtable.sql", sql, params = params.len(), "execute");
    client
        .execute(sql, &bind_refs(params))
        .await
        .map_err(TableError::from_db_error)
}

impl Executor for tokio_postgres::Client {
    async fn query(&self, sql: &str, params: &[Value]) -> TableResult<Vec<Record>> {
        client_query(self, sql, params).await
    }

    async fn execute(&self, sql: &str, params: &[Value]) -> TableResult<u64> {
        client_execute(self, sql, params).await
    }

    fn is_closed(&self) -> bool {
        tokio_postgres::Client::is_closed(self)
    }
}

impl<E: Executor> Executor for Arc<E> {
    async fn query(&self, sql: &str, params: &[Value]) -> TableResult<Vec<Record>> {
        self.as_ref().query(sql, params).await
    }

    async fn execute(&self, sql: &str, params: &[Value]) -> TableResult<u64> {
        self.as_ref().execute(sql, params).await
    }

    fn close(&self) {
        self.as_ref().close();
    }

    fn is_closed(&self) -> bool {
        self.as_ref().is_closed()
    }
}

/// An owned PostgreSQL connection: the client plus the task driving its socket.
pub struct PgConnection {
    client: tokio_postgres::Client,
    driver: Mutex<Option<JoinHandle<()>>>,
    closed: AtomicBool,
}

impl PgConnection {
    /// Connect without TLS and spawn the connection driver on the current runtime.
    pub async fn connect(config: &tokio_postgres::Config) -> TableResult<Self> {
        let (client, connection) = config
            .connect(NoTls)
            .await
            .map_err(|e| TableError::Connection(e.to_string()))?;
        let driver = tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::error!(target: "pgtable", error = %e, "connection error");
            }
        });
        Ok(Self {
            client,
            driver: Mutex::new(Some(driver)),
            closed: AtomicBool::new(false),
        })
    }

    /// The underlying client, for statements outside this crate's surface.
    pub fn client(&self) -> &tokio_postgres::Client {
        &self.client
    }

    fn ensure_open(&self) -> TableResult<()> {
        if self.is_closed() {
            return Err(TableError::Closed);
        }
        Ok(())
    }
}

impl Executor for PgConnection {
    async fn query(&self, sql: &str, params: &[Value]) -> TableResult<Vec<Record>> {
        self.ensure_open()?;
        client_query(&self.client, sql, params).await
    }

    async fn execute(&self, sql: &str, params: &[Value]) -> TableResult<u64> {
        self.ensure_open()?;
        client_execute(&self.client, sql, params).await
    }

    fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        let driver = match self.driver.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if let Some(driver) = driver {
            driver.abort();
        }
        tracing::info!(target: "pgtable", "connection closed");
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst) || self.client.is_closed()
    }
}

impl Drop for PgConnection {
    fn drop(&mut self) {
        self.close();
    }
}
