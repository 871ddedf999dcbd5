//! Error types for snapshot operations.

use thiserror::Error;

/// Main error type for export, restore, and generate operations.
///
/// Only errors that stop an operation (or a single table's load) live here.
/// Recoverable conditions such as dependency cycles or value coercion
/// fallbacks are reported as data and logged instead.
#[derive(Error, Debug)]
pub enum SnapshotError {
    /// Configuration error (invalid YAML, missing fields, bad connection URL)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Could not establish or keep a database connection
    #[error("Connection error: {message}\n  Context: {context}")]
    Connection { message: String, context: String },

    /// Catalog data was missing or malformed
    #[error("Introspection failed: {0}")]
    Introspection(String),

    /// Snapshot files are corrupt or unreadable
    #[error("Snapshot serialization error: {0}")]
    Serialization(String),

    /// An enum or table could not be created on the target
    #[error("DDL failed for {object}: {message}")]
    Ddl { object: String, message: String },

    /// A row file line does not match the table's column count
    #[error("Row format error in table {table}: column count mismatch: expected {expected}, got {found} in row {row}")]
    RowFormat {
        table: String,
        row: u64,
        expected: usize,
        found: usize,
    },

    /// A row was rejected by the target for a reason we cannot skip
    #[error("Constraint violation in table {table}: {message}")]
    ConstraintViolation { table: String, message: String },

    /// Loading a table failed
    #[error("Load failed for table {table}: {message}")]
    Load { table: String, message: String },

    /// Snapshot transport (publish / fetch) failed
    #[error("Transport error: {0}")]
    Transport(String),

    /// IO error (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV reading or writing error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// PostgreSQL query error
    #[error("PostgreSQL error: {0}")]
    Postgres(#[from] tokio_postgres::Error),

    /// MySQL write-side error
    #[error("MySQL error: {0}")]
    Mysql(#[from] mysql_async::Error),

    /// MySQL read-side error
    #[error("MySQL query error: {0}")]
    Sqlx(#[from] sqlx::Error),
}

impl SnapshotError {
    /// Create a Connection error with context about where it occurred
    pub fn connection(message: impl ToString, context: impl Into<String>) -> Self {
        SnapshotError::Connection {
            message: message.to_string(),
            context: context.into(),
        }
    }

    /// Create a DDL error for a named object
    pub fn ddl(object: impl Into<String>, message: impl ToString) -> Self {
        SnapshotError::Ddl {
            object: object.into(),
            message: message.to_string(),
        }
    }

    /// Create a Load error
    pub fn load(table: impl Into<String>, message: impl ToString) -> Self {
        SnapshotError::Load {
            table: table.into(),
            message: message.to_string(),
        }
    }

    /// True for errors that abort only the current table's load.
    pub fn is_table_scoped(&self) -> bool {
        matches!(
            self,
            SnapshotError::RowFormat { .. }
                | SnapshotError::ConstraintViolation { .. }
                | SnapshotError::Load { .. }
                | SnapshotError::Csv(_)
        )
    }

    /// Process exit code for this error.
    pub fn exit_code(&self) -> u8 {
        match self {
            SnapshotError::Config(_) | SnapshotError::Yaml(_) => 1,
            SnapshotError::Connection { .. } => 2,
            SnapshotError::Introspection(_) => 3,
            SnapshotError::Serialization(_) | SnapshotError::Json(_) => 4,
            SnapshotError::Ddl { .. } => 5,
            SnapshotError::RowFormat { .. }
            | SnapshotError::ConstraintViolation { .. }
            | SnapshotError::Load { .. }
            | SnapshotError::Csv(_) => 6,
            SnapshotError::Io(_) => 7,
            SnapshotError::Transport(_) => 8,
            SnapshotError::Postgres(_) | SnapshotError::Mysql(_) | SnapshotError::Sqlx(_) => 9,
        }
    }

    /// Format error with full details including error chain
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);

        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }
}

/// Result type alias for snapshot operations.
pub type Result<T> = std::result::Result<T, SnapshotError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_format_message() {
        let err = SnapshotError::RowFormat {
            table: "users".into(),
            row: 3,
            expected: 3,
            found: 2,
        };
        let msg = err.to_string();
        assert!(msg.contains("expected 3, got 2 in row 3"));
        assert!(err.is_table_scoped());
        assert_eq!(err.exit_code(), 6);
    }

    #[test]
    fn test_exit_codes_are_distinct_for_fatal_classes() {
        assert_eq!(SnapshotError::Config("x".into()).exit_code(), 1);
        assert_eq!(SnapshotError::connection("refused", "pg").exit_code(), 2);
        assert_eq!(SnapshotError::Introspection("x".into()).exit_code(), 3);
        assert_eq!(SnapshotError::Serialization("x".into()).exit_code(), 4);
        assert_eq!(SnapshotError::ddl("users", "boom").exit_code(), 5);
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        assert_eq!(SnapshotError::from(io).exit_code(), 7);
        assert!(!SnapshotError::ddl("users", "boom").is_table_scoped());
    }

    #[test]
    fn test_format_detailed_includes_cause() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "schema.json missing");
        let err = SnapshotError::from(io);
        let detailed = err.format_detailed();
        assert!(detailed.starts_with("Error: IO error"));
        assert!(detailed.contains("schema.json missing"));
    }
}
