//! Database driver implementations.
//!
//! - [`sqlite`]: SQLite source reader, destination writer and dialect
//! - [`postgres`]: PostgreSQL destination writer and dialect
//! - [`common`]: shared utilities (TLS)
//!
//! Destinations are selected at runtime from the target URI scheme. Instead
//! of `Box<dyn TargetWriter>`, the writer and dialect are wrapped in enums
//! that implement the traits by matching on the variant.

pub mod common;
pub mod postgres;
pub mod sqlite;

pub use common::{SslMode, TlsBuilder};
pub use postgres::{PostgresDialect, PostgresWriter};
pub use sqlite::{SqliteDialect, SqliteReader, SqliteWriter};

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::{TargetConfig, TargetKind};
use crate::core::schema::Table;
use crate::core::traits::{DdlOptions, Dialect, TargetWriter, TypeMapper};
use crate::core::value::Batch;
use crate::dialect::{IdentityMapper, SqliteToPostgresMapper};
use crate::error::Result;

/// Enum-based static dispatch for dialects.
#[derive(Debug, Clone)]
pub enum DialectImpl {
    Postgres(PostgresDialect),
    Sqlite(SqliteDialect),
}

impl DialectImpl {
    /// Create the dialect for a destination engine.
    pub fn for_kind(kind: TargetKind) -> Self {
        match kind {
            TargetKind::Postgres => DialectImpl::Postgres(PostgresDialect::new()),
            TargetKind::Sqlite => DialectImpl::Sqlite(SqliteDialect::new()),
        }
    }
}

impl Dialect for DialectImpl {
    fn name(&self) -> &str {
        match self {
            DialectImpl::Postgres(d) => d.name(),
            DialectImpl::Sqlite(d) => d.name(),
        }
    }

    fn quote_ident(&self, name: &str) -> Result<String> {
        match self {
            DialectImpl::Postgres(d) => d.quote_ident(name),
            DialectImpl::Sqlite(d) => d.quote_ident(name),
        }
    }

    fn qualify_table(&self, schema: &str, table: &str) -> Result<String> {
        match self {
            DialectImpl::Postgres(d) => d.qualify_table(schema, table),
            DialectImpl::Sqlite(d) => d.qualify_table(schema, table),
        }
    }

    fn build_count_query(&self, schema: &str, table: &str) -> Result<String> {
        match self {
            DialectImpl::Postgres(d) => d.build_count_query(schema, table),
            DialectImpl::Sqlite(d) => d.build_count_query(schema, table),
        }
    }

    fn build_create_table(
        &self,
        table: &Table,
        schema: &str,
        mapper: &dyn TypeMapper,
        opts: DdlOptions,
    ) -> Result<String> {
        match self {
            DialectImpl::Postgres(d) => d.build_create_table(table, schema, mapper, opts),
            DialectImpl::Sqlite(d) => d.build_create_table(table, schema, mapper, opts),
        }
    }
}

/// Type mapper from the SQLite source to a destination engine.
pub fn type_mapper_for(kind: TargetKind) -> Arc<dyn TypeMapper> {
    match kind {
        TargetKind::Postgres => Arc::new(SqliteToPostgresMapper::new()),
        TargetKind::Sqlite => Arc::new(IdentityMapper::new("sqlite")),
    }
}

/// Enum-based static dispatch for destination writers.
pub enum TargetWriterImpl {
    Postgres(PostgresWriter),
    Sqlite(SqliteWriter),
}

impl TargetWriterImpl {
    /// Open the destination named by `config.uri`.
    pub async fn connect(config: &TargetConfig, ddl: DdlOptions) -> Result<Self> {
        let kind = config.kind()?;
        let mapper = type_mapper_for(kind);
        Ok(match kind {
            TargetKind::Postgres => TargetWriterImpl::Postgres(
                PostgresWriter::new(config)
                    .await?
                    .with_type_mapper(mapper)
                    .with_ddl_options(ddl),
            ),
            TargetKind::Sqlite => TargetWriterImpl::Sqlite(
                SqliteWriter::new(config)
                    .await?
                    .with_type_mapper(mapper)
                    .with_ddl_options(ddl),
            ),
        })
    }
}

#[async_trait]
impl TargetWriter for TargetWriterImpl {
    async fn create_schema(&mut self, schema: &str) -> Result<()> {
        match self {
            TargetWriterImpl::Postgres(w) => w.create_schema(schema).await,
            TargetWriterImpl::Sqlite(w) => w.create_schema(schema).await,
        }
    }

    async fn create_table(&mut self, table: &Table, target_schema: &str) -> Result<()> {
        match self {
            TargetWriterImpl::Postgres(w) => w.create_table(table, target_schema).await,
            TargetWriterImpl::Sqlite(w) => w.create_table(table, target_schema).await,
        }
    }

    async fn table_exists(&mut self, schema: &str, table: &str) -> Result<bool> {
        match self {
            TargetWriterImpl::Postgres(w) => w.table_exists(schema, table).await,
            TargetWriterImpl::Sqlite(w) => w.table_exists(schema, table).await,
        }
    }

    async fn write_batch(
        &mut self,
        schema: &str,
        table: &str,
        cols: &[String],
        batch: Batch,
    ) -> Result<u64> {
        match self {
            TargetWriterImpl::Postgres(w) => w.write_batch(schema, table, cols, batch).await,
            TargetWriterImpl::Sqlite(w) => w.write_batch(schema, table, cols, batch).await,
        }
    }

    async fn get_row_count(&mut self, schema: &str, table: &str) -> Result<i64> {
        match self {
            TargetWriterImpl::Postgres(w) => w.get_row_count(schema, table).await,
            TargetWriterImpl::Sqlite(w) => w.get_row_count(schema, table).await,
        }
    }

    fn db_type(&self) -> &str {
        match self {
            TargetWriterImpl::Postgres(w) => w.db_type(),
            TargetWriterImpl::Sqlite(w) => w.db_type(),
        }
    }

    async fn close(self) {
        match self {
            TargetWriterImpl::Postgres(w) => w.close().await,
            TargetWriterImpl::Sqlite(w) => w.close().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dialect_impl_for_kind() {
        let pg = DialectImpl::for_kind(TargetKind::Postgres);
        assert_eq!(pg.name(), "postgres");
        assert_eq!(
            pg.qualify_table("public", "References").unwrap(),
            "\"public\".\"References\""
        );

        let lite = DialectImpl::for_kind(TargetKind::Sqlite);
        assert_eq!(lite.name(), "sqlite");
        assert_eq!(
            lite.qualify_table("public", "References").unwrap(),
            "\"References\""
        );
    }

    #[test]
    fn test_type_mapper_for_kind() {
        assert_eq!(type_mapper_for(TargetKind::Postgres).target_dialect(), "postgres");
        assert_eq!(type_mapper_for(TargetKind::Sqlite).target_dialect(), "sqlite");
    }
}
