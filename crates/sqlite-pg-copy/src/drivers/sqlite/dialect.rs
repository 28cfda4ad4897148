//! SQLite SQL dialect (Strategy pattern).
//!
//! SQLite has no schemas in the PostgreSQL sense, so the `schema` argument
//! of every builder is ignored and table names are quoted bare. The chunked
//! SELECT and the multi-row INSERT are SQLite-only and live on
//! [`SqliteDialect`] itself.

use crate::core::identifier::quote_sqlite;
use crate::core::schema::Table;
use crate::core::traits::{DdlOptions, Dialect, TypeMapper};
use crate::dialect::create_table_ddl;
use crate::error::Result;

/// Upper bound on bound parameters per statement (SQLITE_MAX_VARIABLE_NUMBER
/// since SQLite 3.32).
pub const SQLITE_MAX_PARAMS: usize = 32766;

/// Options for building a chunked SELECT.
#[derive(Debug, Clone)]
pub struct SelectQueryOptions {
    /// Table name.
    pub table: String,
    /// Columns to select.
    pub columns: Vec<String>,
    /// Row limit.
    pub limit: usize,
    /// Rows to skip.
    pub offset: i64,
}

/// SQLite dialect implementation.
#[derive(Debug, Clone, Default)]
pub struct SqliteDialect;

impl SqliteDialect {
    /// Create a new SQLite dialect instance.
    pub fn new() -> Self {
        Self
    }

    /// Rows per INSERT statement so that a statement stays under
    /// [`SQLITE_MAX_PARAMS`].
    pub fn rows_per_statement(&self, column_count: usize) -> usize {
        (SQLITE_MAX_PARAMS / column_count.max(1)).max(1)
    }

    /// Build `SELECT ... LIMIT n OFFSET m` with no ORDER BY.
    pub fn build_select_query(&self, opts: &SelectQueryOptions) -> Result<String> {
        let cols = if opts.columns.is_empty() {
            "*".to_string()
        } else {
            opts.columns
                .iter()
                .map(|c| quote_sqlite(c))
                .collect::<Result<Vec<_>>>()?
                .join(", ")
        };

        Ok(format!(
            "SELECT {} FROM {} LIMIT {} OFFSET {}",
            cols,
            quote_sqlite(&opts.table)?,
            opts.limit,
            opts.offset
        ))
    }

    /// Build a multi-row INSERT with `rows` groups of `?` parameters.
    pub fn build_insert_query(
        &self,
        schema: &str,
        table: &str,
        cols: &[String],
        rows: usize,
    ) -> Result<String> {
        let col_list = cols
            .iter()
            .map(|c| quote_sqlite(c))
            .collect::<Result<Vec<_>>>()?
            .join(", ");
        let group = format!("({})", vec!["?"; cols.len()].join(", "));

        Ok(format!(
            "INSERT INTO {} ({}) VALUES {}",
            self.qualify_table(schema, table)?,
            col_list,
            vec![group; rows].join(", ")
        ))
    }
}

impl Dialect for SqliteDialect {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn quote_ident(&self, name: &str) -> Result<String> {
        quote_sqlite(name)
    }

    fn qualify_table(&self, _schema: &str, table: &str) -> Result<String> {
        quote_sqlite(table)
    }

    fn build_count_query(&self, schema: &str, table: &str) -> Result<String> {
        Ok(format!(
            "SELECT COUNT(*) FROM {}",
            self.qualify_table(schema, table)?
        ))
    }

    fn build_create_table(
        &self,
        table: &Table,
        schema: &str,
        mapper: &dyn TypeMapper,
        opts: DdlOptions,
    ) -> Result<String> {
        create_table_ddl(self, table, schema, mapper, opts)
    }
}
