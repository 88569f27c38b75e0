//! Result rows.

use crate::error::{TableError, TableResult};
use crate::value::Value;
use std::ops::Index;
use std::sync::Arc;
use tokio_postgres::Row;

/// One result row: values in select-list order, addressable by column name.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    columns: Arc<[String]>,
    values: Vec<Value>,
}

impl Record {
    /// Build a record from column names and values of equal length.
    pub fn new(columns: Arc<[String]>, values: Vec<Value>) -> TableResult<Self> {
        if columns.len() != values.len() {
            return Err(TableError::validation(format!(
                "Record: {} columns but {} values",
                columns.len(),
                values.len()
            )));
        }
        Ok(Self { columns, values })
    }

    /// Decode a `tokio_postgres` row column by column.
    pub fn from_pg_row(row: &Row) -> TableResult<Self> {
        let columns: Arc<[String]> = row
            .columns()
            .iter()
            .map(|c| c.name().to_string())
            .collect();
        Self::from_pg_row_with(row, columns)
    }

    /// Decode a row reusing column names shared with its siblings.
    pub(crate) fn from_pg_row_with(row: &Row, columns: Arc<[String]>) -> TableResult<Self> {
        let values = (0..row.len())
            .map(|idx| {
                row.try_get::<_, Value>(idx)
                    .map_err(|e| TableError::decode(columns[idx].clone(), e.to_string()))
            })
            .collect::<TableResult<Vec<_>>>()?;
        Ok(Self { columns, values })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn into_values(self) -> Vec<Value> {
        self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Value of the named column, if the row has it.
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.columns
            .iter()
            .position(|c| c == column)
            .map(|idx| &self.values[idx])
    }

    /// Value of the named column, or a decode error naming it.
    pub fn try_get(&self, column: &str) -> TableResult<&Value> {
        self.get(column)
            .ok_or_else(|| TableError::decode(column, "column not present in row"))
    }

    /// Text value of the named column (`None` for SQL NULL).
    pub(crate) fn text(&self, column: &str) -> TableResult<Option<String>> {
        match self.try_get(column)? {
            Value::Null => Ok(None),
            Value::Text(s) => Ok(Some(s.clone())),
            other => Err(TableError::decode(
                column,
                format!("expected text, got {}", other.kind()),
            )),
        }
    }
}

impl Index<usize> for Record {
    type Output = Value;

    fn index(&self, idx: usize) -> &Value {
        &self.values[idx]
    }
}

impl Index<&str> for Record {
    type Output = Value;

    fn index(&self, column: &str) -> &Value {
        self.get(column)
            .unwrap_or_else(|| panic!("column '{column}' not present in row"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> Record {
        Record::new(
            Arc::from(vec!["id".to_string(), "value1".to_string()]),
            vec![Value::Int(1), Value::from("a")],
        )
        .unwrap()
    }

    #[test]
    fn lookup_by_name_and_position() {
        let r = record();
        assert_eq!(r.get("value1"), Some(&Value::from("a")));
        assert_eq!(r[0], Value::Int(1));
        assert_eq!(r["id"], Value::Int(1));
        assert!(r.get("missing").is_none());
        assert!(r.try_get("missing").is_err());
    }

    #[test]
    fn rejects_length_mismatch() {
        let err = Record::new(Arc::from(vec!["id".to_string()]), vec![]).unwrap_err();
        assert!(matches!(err, TableError::Validation(_)));
    }

    #[test]
    fn text_accessor() {
        let r = record();
        assert_eq!(r.text("value1").unwrap().as_deref(), Some("a"));
        assert!(r.text("id").is_err());
    }
}
