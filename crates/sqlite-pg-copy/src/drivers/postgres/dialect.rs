//! PostgreSQL SQL dialect (Strategy pattern).

use crate::core::identifier::{qualify_pg, quote_pg};
use crate::core::schema::Table;
use crate::core::traits::{DdlOptions, Dialect, TypeMapper};
use crate::dialect::create_table_ddl;
use crate::error::Result;

/// PostgreSQL dialect implementation.
#[derive(Debug, Clone, Default)]
pub struct PostgresDialect;

impl PostgresDialect {
    /// Create a new PostgreSQL dialect instance.
    pub fn new() -> Self {
        Self
    }
}

impl Dialect for PostgresDialect {
    fn name(&self) -> &str {
        "postgres"
    }

    fn quote_ident(&self, name: &str) -> Result<String> {
        quote_pg(name)
    }

    fn qualify_table(&self, schema: &str, table: &str) -> Result<String> {
        qualify_pg(schema, table)
    }

    fn build_count_query(&self, schema: &str, table: &str) -> Result<String> {
        Ok(format!(
            "SELECT COUNT(*)::int8 FROM {}",
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

/// Build the `COPY ... FROM STDIN` statement used for batch loads.
pub fn copy_in_statement(schema: &str, table: &str, cols: &[String]) -> Result<String> {
    let col_list = cols
        .iter()
        .map(|c| quote_pg(c))
        .collect::<Result<Vec<_>>>()?
        .join(", ");
    Ok(format!(
        "COPY {} ({}) FROM STDIN",
        qualify_pg(schema, table)?,
        col_list
    ))
}
