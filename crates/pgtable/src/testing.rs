//! In-memory executor for unit tests: records every statement, replays scripted results.

use crate::client::Executor;
use crate::error::{TableError, TableResult};
use crate::row::Record;
use crate::value::Value;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

enum Reply {
    Rows(Vec<Record>),
    Affected(u64),
    Fail(String),
}

#[derive(Default)]
pub(crate) struct MockExecutor {
    replies: Mutex<VecDeque<Reply>>,
    log: Mutex<Vec<(String, Vec<Value>)>>,
    closed: AtomicBool,
    closes: Mutex<usize>,
}

impl MockExecutor {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push_rows(&self, rows: Vec<Record>) {
        self.replies.lock().unwrap().push_back(Reply::Rows(rows));
    }

    pub(crate) fn push_affected(&self, n: u64) {
        self.replies.lock().unwrap().push_back(Reply::Affected(n));
    }

    pub(crate) fn push_error(&self, message: &str) {
        self.replies
            .lock()
            .unwrap()
            .push_back(Reply::Fail(message.to_string()));
    }

    /// Every statement issued so far, with its bound values.
    pub(crate) fn statements(&self) -> Vec<(String, Vec<Value>)> {
        self.log.lock().unwrap().clone()
    }

    pub(crate) fn last_sql(&self) -> String {
        self.log
            .lock()
            .unwrap()
            .last()
            .map(|(sql, _)| sql.clone())
            .unwrap_or_default()
    }

    pub(crate) fn close_count(&self) -> usize {
        *self.closes.lock().unwrap()
    }

    fn next(&self, sql: &str, params: &[Value]) -> TableResult<Reply> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(TableError::Closed);
        }
        self.log
            .lock()
            .unwrap()
            .push((sql.to_string(), params.to_vec()));
        Ok(self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Reply::Rows(Vec::new())))
    }
}

impl Executor for MockExecutor {
    async fn query(&self, sql: &str, params: &[Value]) -> TableResult<Vec<Record>> {
        match self.next(sql, params)? {
            Reply::Rows(rows) => Ok(rows),
            Reply::Affected(_) => Ok(Vec::new()),
            Reply::Fail(message) => Err(TableError::Connection(message)),
        }
    }

    async fn execute(&self, sql: &str, params: &[Value]) -> TableResult<u64> {
        match self.next(sql, params)? {
            Reply::Rows(rows) => Ok(rows.len() as u64),
            Reply::Affected(n) => Ok(n),
            Reply::Fail(message) => Err(TableError::Connection(message)),
        }
    }

    fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            *self.closes.lock().unwrap() += 1;
        }
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// Rows shaped like the column introspection query: `(name, type, key_role)`.
///
/// Primary key columns get a sequence default.
pub(crate) fn catalog(columns: &[(&str, &str, &str)]) -> Vec<Record> {
    let with_defaults: Vec<_> = columns
        .iter()
        .map(|&(name, ty, key)| (name, ty, key, (key == "PRI").then_some("nextval('seq'::regclass)")))
        .collect();
    catalog_with_defaults(&with_defaults)
}

/// Like [`catalog`] with explicit default expressions.
pub(crate) fn catalog_with_defaults(columns: &[(&str, &str, &str, Option<&str>)]) -> Vec<Record> {
    let names: Arc<[String]> = [
        "column_name",
        "data_type",
        "nullable",
        "key_role",
        "column_default",
        "extra",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();
    columns
        .iter()
        .map(|&(name, ty, key, default)| {
            Record::new(
                names.clone(),
                vec![
                    Value::from(name),
                    Value::from(ty),
                    Value::Bool(key != "PRI"),
                    Value::from(key),
                    Value::from(default),
                    Value::from(""),
                ],
            )
            .unwrap()
        })
        .collect()
}

/// Result rows with the given column names.
pub(crate) fn rows(columns: &[&str], values: Vec<Vec<Value>>) -> Vec<Record> {
    let names: Arc<[String]> = columns.iter().map(|s| s.to_string()).collect();
    values
        .into_iter()
        .map(|v| Record::new(names.clone(), v).unwrap())
        .collect()
}
