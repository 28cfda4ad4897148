//! Error types for the copy library.

use thiserror::Error;

/// Main error type for copy operations.
///
/// Every variant is fatal for a run: nothing is retried and partial progress
/// at the destination is left as-is.
#[derive(Error, Debug)]
pub enum MigrateError {
    /// Configuration error (invalid YAML, missing fields, bad URI, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// The source or destination database could not be opened.
    #[error("Connection to {target} failed: {message}")]
    Connection { target: String, message: String },

    /// The source schema could not be enumerated or ordered.
    #[error("Schema reflection failed: {0}")]
    Reflection(String),

    /// A count, fetch, insert or commit failed while copying a table.
    #[error("Copy failed for table {table}: {message}")]
    Copy { table: String, message: String },

    /// Source and destination row counts disagree after a run.
    #[error("Verification failed: {0}")]
    Verification(String),

    /// IO error (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl MigrateError {
    /// Create a Connection error for the named side ("source" or "destination").
    pub fn connection(target: impl Into<String>, err: impl std::fmt::Display) -> Self {
        MigrateError::Connection {
            target: target.into(),
            message: err.to_string(),
        }
    }

    /// Create a Reflection error with context about the failing step.
    pub fn reflection(context: &str, err: impl std::fmt::Display) -> Self {
        MigrateError::Reflection(format!("{}: {}", context, err))
    }

    /// Create a Copy error for a table, naming the failing step.
    pub fn copy(table: impl Into<String>, stage: &str, err: impl std::fmt::Display) -> Self {
        MigrateError::Copy {
            table: table.into(),
            message: format!("{}: {}", stage, err),
        }
    }

    /// Process exit code for this error.
    ///
    /// Every failure class exits with 1.
    pub fn exit_code(&self) -> u8 {
        1
    }

    /// Format error with full details including error chain
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}", self);

        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\n\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }
}

/// Result type alias for copy operations.
pub type Result<T> = std::result::Result<T, MigrateError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_copy_error_names_table_and_stage() {
        let err = MigrateError::copy("Circuits", "insert batch 2", "UNIQUE constraint failed");
        assert_eq!(
            err.to_string(),
            "Copy failed for table Circuits: insert batch 2: UNIQUE constraint failed"
        );
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn test_connection_error_display() {
        let err = MigrateError::connection("source", "unable to open database file");
        assert!(err.to_string().contains("source"));
        assert!(err.format_detailed().starts_with("Error: Connection to source failed"));
    }

    #[test]
    fn test_format_detailed_includes_cause() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing.yaml");
        let err = MigrateError::Io(io);
        let detailed = err.format_detailed();
        assert!(detailed.contains("IO error"));
    }
}
