//! Parameter-safe SQL statements.
//!
//! [`Sql`] stores raw SQL pieces and bound [`Value`]s separately and generates
//! `$1, $2, ...` placeholders only when the statement is rendered. Predicate
//! fragments are built as standalone `Sql` values and spliced into the final
//! statement with [`Sql::push_sql`]; numbering then follows their final position.
//!
//! # Example
//!
//! ```ignore
//! use pgtable::{Sql, Value};
//!
//! let mut q = Sql::new("SELECT * FROM \"items\" WHERE ");
//! q.push_ident(&"id".parse()?).push(" = ").push_bind(Value::Int(1));
//! assert_eq!(q.to_sql(), r#"SELECT * FROM "items" WHERE "id" = $1"#);
//! ```

use crate::client::Executor;
use crate::error::{TableError, TableResult};
use crate::ident::Ident;
use crate::row::Record;
use crate::value::Value;
use std::fmt::Write;

#[derive(Debug, Clone, PartialEq)]
enum SqlPart {
    Raw(String),
    Param,
}

/// A rendered-on-demand SQL statement with its bound values.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Sql {
    parts: Vec<SqlPart>,
    params: Vec<Value>,
}

impl Sql {
    /// Create a new statement with an initial SQL fragment.
    pub fn new(initial_sql: impl Into<String>) -> Self {
        let mut sql = Self::empty();
        sql.push(&initial_sql.into());
        sql
    }

    /// Create an empty statement.
    pub fn empty() -> Self {
        Self {
            parts: Vec::new(),
            params: Vec::new(),
        }
    }

    /// `true` when nothing has been pushed.
    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// Append raw SQL (no parameters).
    pub fn push(&mut self, sql: &str) -> &mut Self {
        if sql.is_empty() {
            return self;
        }

        match self.parts.last_mut() {
            Some(SqlPart::Raw(last)) => last.push_str(sql),
            _ => self.parts.push(SqlPart::Raw(sql.to_string())),
        }
        self
    }

    /// Append a quoted identifier.
    pub fn push_ident(&mut self, ident: &Ident) -> &mut Self {
        let mut out = String::new();
        ident.write_sql(&mut out);
        self.push(&out)
    }

    /// Append a parameter placeholder and bind its value.
    pub fn push_bind(&mut self, value: impl Into<Value>) -> &mut Self {
        self.parts.push(SqlPart::Param);
        self.params.push(value.into());
        self
    }

    /// Append a comma-separated list of placeholders and bind all values.
    pub fn push_bind_list<I>(&mut self, values: I) -> &mut Self
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        for (i, v) in values.into_iter().enumerate() {
            if i > 0 {
                self.push(", ");
            }
            self.push_bind(v);
        }
        self
    }

    /// Append another statement fragment, consuming it.
    pub fn push_sql(&mut self, other: Sql) -> &mut Self {
        for part in other.parts {
            match part {
                SqlPart::Raw(s) => {
                    self.push(&s);
                }
                SqlPart::Param => self.parts.push(SqlPart::Param),
            }
        }
        self.params.extend(other.params);
        self
    }

    /// Append fragments separated by `sep`.
    pub fn push_joined(&mut self, fragments: impl IntoIterator<Item = Sql>, sep: &str) -> &mut Self {
        for (i, fragment) in fragments.into_iter().enumerate() {
            if i > 0 {
                self.push(sep);
            }
            self.push_sql(fragment);
        }
        self
    }

    /// Render SQL with `$1, $2, ...` placeholders.
    pub fn to_sql(&self) -> String {
        let mut out = String::new();
        let mut idx: usize = 0;

        for part in &self.parts {
            match part {
                SqlPart::Raw(s) => out.push_str(s),
                SqlPart::Param => {
                    idx += 1;
                    let _ = write!(&mut out, "${}", idx);
                }
            }
        }
        out
    }

    /// Bound values in placeholder order.
    pub fn params(&self) -> &[Value] {
        &self.params
    }

    fn validate(&self) -> TableResult<()> {
        let placeholder_count = self
            .parts
            .iter()
            .filter(|p| matches!(p, SqlPart::Param))
            .count();
        if placeholder_count != self.params.len() {
            return Err(TableError::Validation(format!(
                "Sql: {} placeholders but {} params",
                placeholder_count,
                self.params.len()
            )));
        }
        Ok(())
    }

    /// Execute the statement and return all rows.
    pub async fn fetch_all(&self, conn: &impl Executor) -> TableResult<Vec<Record>> {
        self.validate()?;
        conn.query(&self.to_sql(), &self.params).await
    }

    /// Execute the statement and return the affected row count.
    pub async fn execute(&self, conn: &impl Executor) -> TableResult<u64> {
        self.validate()?;
        conn.execute(&self.to_sql(), &self.params).await
    }
}
