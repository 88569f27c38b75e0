//! Error types for pgtable

use thiserror::Error;

/// Result type alias for pgtable operations
pub type TableResult<T> = Result<T, TableError>;

/// Error types for table and query operations
#[derive(Debug, Error)]
pub enum TableError {
    /// A predicate, row or column list referenced a column the table does not have
    #[error("Column '{column}' not found in table '{table}' (available: {available:?})")]
    UnknownColumn {
        column: String,
        table: String,
        available: Vec<String>,
    },

    /// The engine does not know the table
    #[error("Table not found: {0}")]
    TableNotFound(String),

    /// A primary-key-indexed operation was requested on a table without one
    #[error("Table '{0}' has no primary key")]
    NoPrimaryKey(String),

    /// Operator outside the supported vocabulary
    #[error("Unsupported operator '{operator}', only allowed: {allowed:?}")]
    UnsupportedOperator {
        operator: String,
        allowed: &'static [&'static str],
    },

    /// Predicate with the wrong shape (arity, value kind)
    #[error("Malformed predicate: {0}")]
    MalformedPredicate(String),

    /// A statement that needs at least one predicate got none
    #[error("{0}")]
    MissingPredicate(String),

    /// UPDATE without any assignment left after key folding
    #[error("Nothing to update in table '{0}'")]
    EmptyUpdate(String),

    /// Positional row length does not line up with the schema
    #[error("Row length mismatch for table '{table}': expected {expected} values, got {got} ({row})")]
    LengthMismatch {
        table: String,
        expected: String,
        got: usize,
        row: String,
    },

    /// Primary key lookup found no row
    #[error("Not found: {0}")]
    NotFound(String),

    /// Primary key lookup found more than one row
    #[error("Ambiguous result for {key} in table '{table}': expected 1 row, got {got}")]
    Ambiguous {
        table: String,
        key: String,
        got: usize,
    },

    /// Auto-created table collides with a reserved registry name
    #[error(
        "Table name(s) {0:?} collide with reserved registry names; disable auto_create or rename the table(s)"
    )]
    ReservedTableName(Vec<String>),

    /// Database connection error
    #[error("Connection error: {0}")]
    Connection(String),

    /// Operation attempted after the database was closed
    #[error("Database connection is closed")]
    Closed,

    /// Query execution error
    #[error("Query error: {0}")]
    Query(#[from] tokio_postgres::Error),

    /// Unique constraint violation
    #[error("Unique constraint violation: {0}")]
    UniqueViolation(String),

    /// Foreign key constraint violation
    #[error("Foreign key violation: {0}")]
    ForeignKeyViolation(String),

    /// Check constraint violation
    #[error("Check constraint violation: {0}")]
    CheckViolation(String),

    /// Row decode error
    #[error("Decode error on column '{column}': {message}")]
    Decode { column: String, message: String },

    /// Validation error (identifiers, configuration, builder misuse)
    #[error("Validation error: {0}")]
    Validation(String),
}

impl TableError {
    /// Create a decode error for a specific column
    pub fn decode(column: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            column: column.into(),
            message: message.into(),
        }
    }

    /// Create a not found error
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a malformed predicate error
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedPredicate(message.into())
    }

    /// Check if this is a not found error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Check if this is a unique violation error
    pub fn is_unique_violation(&self) -> bool {
        matches!(self, Self::UniqueViolation(_))
    }

    /// Schema errors: unknown column/table, missing primary key.
    pub fn is_schema_error(&self) -> bool {
        matches!(
            self,
            Self::UnknownColumn { .. } | Self::TableNotFound(_) | Self::NoPrimaryKey(_)
        )
    }

    /// Predicate errors: unsupported operator, malformed predicate, missing predicate.
    pub fn is_predicate_error(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedOperator { .. }
                | Self::MalformedPredicate(_)
                | Self::MissingPredicate(_)
        )
    }

    /// Shape errors: row length mismatch, ambiguous point lookup.
    pub fn is_shape_error(&self) -> bool {
        matches!(self, Self::LengthMismatch { .. } | Self::Ambiguous { .. })
    }

    /// Connectivity errors: anything the engine or transport reported.
    pub fn is_connectivity_error(&self) -> bool {
        matches!(self, Self::Connection(_) | Self::Closed | Self::Query(_))
    }

    /// Parse a tokio_postgres error into a more specific TableError
    pub fn from_db_error(err: tokio_postgres::Error) -> Self {
        if let Some(db_err) = err.as_db_error() {
            let constraint = db_err.constraint().unwrap_or("unknown");
            let message = db_err.message();

            match db_err.code().code() {
                "23505" => return Self::UniqueViolation(format!("{}: {}", constraint, message)),
                "23503" => {
                    return Self::ForeignKeyViolation(format!("{}: {}", constraint, message));
                }
                "23514" => return Self::CheckViolation(format!("{}: {}", constraint, message)),
                _ => {}
            }
        }
        if err.is_closed() {
            return Self::Closed;
        }
        Self::Query(err)
    }
}
