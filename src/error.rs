//! Error taxonomy for the trace table store.

use thiserror::Error;

/// Result type for every storage operation.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors surfaced by the storage layer.
///
/// Ingestion errors (`SchemaViolation`) abort only the in-flight append: rows committed before
/// the failure stay valid and queryable. Query-time errors are recoverable and are meant to be
/// surfaced by the caller as bind/plan errors.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum StoreError {
    /// An append or registration broke the declared schema.
    #[error("schema violation on table {table:?}: {reason}")]
    SchemaViolation { table: String, reason: String },

    /// The table is not registered in this session.
    #[error("unknown table {0:?}")]
    UnknownTable(String),

    /// The column exists neither in the table nor in any of its ancestors.
    #[error("unknown column {column:?} in table {table:?}")]
    UnknownColumn { table: String, column: String },

    /// Positional access or id lookup past the end of the table.
    #[error("index {index} out of range (len {len})")]
    OutOfRange { index: usize, len: usize },

    /// Two sides of a comparison or join have incompatible types.
    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: String, found: String },

    /// In-place update of a column which is not flagged as mutable.
    #[error("column {column:?} of table {table:?} is not mutable")]
    ImmutableColumn { table: String, column: String },

    /// A foreign key does not resolve in the referenced table.
    #[error("row {row} of {table}.{column} references missing id in {target}")]
    DanglingReference {
        table: String,
        column: String,
        row: usize,
        target: String,
    },

    /// The scan observed its cancellation token.
    #[error("query cancelled")]
    Cancelled,
}

impl StoreError {
    pub(crate) fn schema(table: &str, reason: impl Into<String>) -> Self {
        Self::SchemaViolation {
            table: table.to_owned(),
            reason: reason.into(),
        }
    }

    pub(crate) fn unknown_column(table: &str, column: &str) -> Self {
        Self::UnknownColumn {
            table: table.to_owned(),
            column: column.to_owned(),
        }
    }

    /// Returns true for errors raised while ingesting, as opposed to query-time errors.
    pub fn is_ingestion_error(&self) -> bool {
        matches!(self, Self::SchemaViolation { .. } | Self::ImmutableColumn { .. })
    }
}
