//! Core traits for engine-agnostic copying.
//!
//! - [`SourceReader`]: reflects schema and reads row chunks from the source
//! - [`TargetWriter`]: creates tables and writes row chunks at the destination
//! - [`Dialect`]: SQL syntax strategy for one engine
//! - [`TypeMapper`]: maps source column types to destination DDL types
//!
//! Readers and writers own a single connection each, so every data method
//! takes `&mut self` and `close` consumes the handle.

use async_trait::async_trait;

use crate::error::Result;

use super::schema::{Column, Table};
use super::value::Batch;

/// Read schema and rows from a source database.
#[async_trait]
pub trait SourceReader: Send {
    /// Enumerate every user table with its columns, primary key and
    /// foreign keys. Tables come back sorted by name, not dependency order.
    async fn extract_schema(&mut self) -> Result<Vec<Table>>;

    /// Count the rows currently in a table.
    async fn get_row_count(&mut self, table: &str) -> Result<i64>;

    /// Read up to `limit` rows starting at `offset`, in the engine's natural
    /// order. Values are positional in `table.columns` order.
    async fn read_chunk(&mut self, table: &Table, offset: i64, limit: usize) -> Result<Batch>;

    /// Get the database type identifier (e.g., "sqlite").
    fn db_type(&self) -> &str;

    /// Close the connection.
    async fn close(self);
}

/// Write schema and rows to a destination database.
#[async_trait]
pub trait TargetWriter: Send {
    /// Create a schema if it doesn't exist. A no-op for engines without schemas.
    async fn create_schema(&mut self, schema: &str) -> Result<()>;

    /// Create a table if it does not already exist.
    async fn create_table(&mut self, table: &Table, target_schema: &str) -> Result<()>;

    /// Check if a table exists.
    async fn table_exists(&mut self, schema: &str, table: &str) -> Result<bool>;

    /// Insert a batch of rows and commit it as one transaction.
    ///
    /// Either every row of the batch is visible afterwards or none is.
    async fn write_batch(
        &mut self,
        schema: &str,
        table: &str,
        cols: &[String],
        batch: Batch,
    ) -> Result<u64>;

    /// Get the row count for a table.
    async fn get_row_count(&mut self, schema: &str, table: &str) -> Result<i64>;

    /// Get the database type identifier (e.g., "postgres", "sqlite").
    fn db_type(&self) -> &str;

    /// Close the connection.
    async fn close(self);
}

/// Options controlling generated table DDL.
#[derive(Debug, Clone, Copy)]
pub struct DdlOptions {
    /// Emit FOREIGN KEY clauses.
    pub foreign_keys: bool,
}

impl Default for DdlOptions {
    fn default() -> Self {
        Self { foreign_keys: true }
    }
}

/// SQL syntax strategy for one database engine.
pub trait Dialect: Send + Sync {
    /// Get the dialect identifier (e.g., "postgres", "sqlite").
    fn name(&self) -> &str;

    /// Quote an identifier (table name, column name, etc.).
    fn quote_ident(&self, name: &str) -> Result<String>;

    /// Quote a table name, qualifying it with a schema where the engine has one.
    fn qualify_table(&self, schema: &str, table: &str) -> Result<String>;

    /// Build a `SELECT COUNT(*)` query for a table.
    fn build_count_query(&self, schema: &str, table: &str) -> Result<String>;

    /// Build `CREATE TABLE IF NOT EXISTS` DDL for a reflected table.
    fn build_create_table(
        &self,
        table: &Table,
        schema: &str,
        mapper: &dyn TypeMapper,
        opts: DdlOptions,
    ) -> Result<String>;
}

/// Maps column types from a source dialect to a target dialect.
pub trait TypeMapper: Send + Sync {
    /// Get the source dialect name.
    fn source_dialect(&self) -> &str;

    /// Get the target dialect name.
    fn target_dialect(&self) -> &str;

    /// Map a column definition from source to target.
    fn map_column(&self, col: &Column) -> ColumnMapping {
        let mapping = self.map_type(col);
        ColumnMapping {
            name: col.name.clone(),
            target_type: mapping.target_type,
            is_nullable: col.is_nullable,
            warning: mapping.warning,
        }
    }

    /// Map a column's type to a target type string.
    fn map_type(&self, col: &Column) -> TypeMapping;
}

/// Result of mapping a column from source to target.
#[derive(Debug, Clone)]
pub struct ColumnMapping {
    /// Target column name (same as source).
    pub name: String,
    /// Target data type string. Empty means "no declared type".
    pub target_type: String,
    /// Whether the column is nullable.
    pub is_nullable: bool,
    /// Warning message if the mapping is lossy.
    pub warning: Option<String>,
}

/// Result of mapping a type from source to target.
#[derive(Debug, Clone)]
pub struct TypeMapping {
    /// Target type string (e.g., "varchar(255)", "bigint").
    pub target_type: String,
    /// Whether this mapping loses type information.
    pub is_lossy: bool,
    /// Warning message for lossy mappings.
    pub warning: Option<String>,
}

impl TypeMapping {
    /// Create a lossless type mapping.
    pub fn lossless(target_type: impl Into<String>) -> Self {
        Self {
            target_type: target_type.into(),
            is_lossy: false,
            warning: None,
        }
    }

    /// Create a lossy type mapping with a warning.
    pub fn lossy(target_type: impl Into<String>, warning: impl Into<String>) -> Self {
        Self {
            target_type: target_type.into(),
            is_lossy: true,
            warning: Some(warning.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_mapping_lossy() {
        let mapping = TypeMapping::lossy("text", "untyped column stored as text");
        assert!(mapping.is_lossy);
        assert_eq!(
            mapping.warning.as_deref(),
            Some("untyped column stored as text")
        );
        assert!(!TypeMapping::lossless("bigint").is_lossy);
    }

    #[test]
    fn test_ddl_options_default_includes_foreign_keys() {
        assert!(DdlOptions::default().foreign_keys);
    }
}
