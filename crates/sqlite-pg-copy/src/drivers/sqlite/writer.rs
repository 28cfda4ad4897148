//! SQLite target writer implementation.
//!
//! Writes each batch with multi-row INSERT statements inside one transaction.
//! Batches wider than SQLite's bound-parameter limit are split across several
//! statements in that same transaction.

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteArguments, SqliteConnectOptions};
use sqlx::query::Query;
use sqlx::{ConnectOptions, Connection, Sqlite, SqliteConnection};
use tracing::{debug, info, warn};

use crate::config::TargetConfig;
use crate::core::schema::Table;
use crate::core::traits::{DdlOptions, Dialect, TargetWriter, TypeMapper};
use crate::core::value::{Batch, SqlValue};
use crate::dialect::IdentityMapper;
use crate::error::{MigrateError, Result};

use super::dialect::SqliteDialect;

/// SQLite target writer implementation.
pub struct SqliteWriter {
    conn: SqliteConnection,
    dialect: SqliteDialect,
    type_mapper: Arc<dyn TypeMapper>,
    ddl: DdlOptions,
    path: String,
}

impl SqliteWriter {
    /// Open (creating if needed) the destination SQLite file.
    pub async fn new(config: &TargetConfig) -> Result<Self> {
        let path = config.sqlite_path().ok_or_else(|| {
            MigrateError::Config(format!("not a SQLite URI: {}", config.redacted_uri()))
        })?;

        let options = SqliteConnectOptions::new()
            .filename(&path)
            .create_if_missing(true)
            .foreign_keys(true);

        let conn = options
            .connect()
            .await
            .map_err(|e| MigrateError::connection("destination", format!("{}: {}", path, e)))?;

        info!("Connected to SQLite destination: {}", path);

        Ok(Self {
            conn,
            dialect: SqliteDialect::new(),
            type_mapper: Arc::new(IdentityMapper::new("sqlite")),
            ddl: DdlOptions::default(),
            path,
        })
    }

    /// Set the type mapper for schema creation.
    pub fn with_type_mapper(mut self, mapper: Arc<dyn TypeMapper>) -> Self {
        self.type_mapper = mapper;
        self
    }

    /// Set DDL options for schema creation.
    pub fn with_ddl_options(mut self, ddl: DdlOptions) -> Self {
        self.ddl = ddl;
        self
    }

    /// Build table DDL without executing it.
    pub fn generate_ddl(&self, table: &Table) -> Result<String> {
        self.dialect
            .build_create_table(table, "", self.type_mapper.as_ref(), self.ddl)
    }
}

fn bind_value<'q>(
    query: Query<'q, Sqlite, SqliteArguments<'q>>,
    value: &'q SqlValue<'static>,
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    match value {
        SqlValue::Null => query.bind(None::<i64>),
        SqlValue::Bool(b) => query.bind(*b),
        SqlValue::I64(i) => query.bind(*i),
        SqlValue::F64(f) => query.bind(*f),
        SqlValue::Text(s) => query.bind(s.as_ref()),
        SqlValue::Bytes(b) => query.bind(b.as_ref()),
    }
}

#[async_trait]
impl TargetWriter for SqliteWriter {
    async fn create_schema(&mut self, _schema: &str) -> Result<()> {
        Ok(())
    }

    async fn create_table(&mut self, table: &Table, _target_schema: &str) -> Result<()> {
        let ddl = self.generate_ddl(table)?;
        sqlx::query(&ddl)
            .execute(&mut self.conn)
            .await
            .map_err(|e| MigrateError::copy(&table.name, "create table", e))?;

        debug!("Ensured table {}", table.name);
        Ok(())
    }

    async fn table_exists(&mut self, _schema: &str, table: &str) -> Result<bool> {
        let found: Option<i64> = sqlx::query_scalar(
            "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?",
        )
        .bind(table)
        .fetch_optional(&mut self.conn)
        .await
        .map_err(|e| MigrateError::copy(table, "check table exists", e))?;
        Ok(found.is_some())
    }

    async fn write_batch(
        &mut self,
        schema: &str,
        table: &str,
        cols: &[String],
        batch: Batch,
    ) -> Result<u64> {
        let rows = batch.rows;
        if rows.is_empty() {
            return Ok(0);
        }

        let per_statement = self.dialect.rows_per_statement(cols.len());
        let mut tx = self
            .conn
            .begin()
            .await
            .map_err(|e| MigrateError::copy(table, "begin transaction", e))?;

        for chunk in rows.chunks(per_statement) {
            let sql = self
                .dialect
                .build_insert_query(schema, table, cols, chunk.len())?;
            let mut query = sqlx::query(&sql);
            for value in chunk.iter().flatten() {
                query = bind_value(query, value);
            }
            query
                .execute(&mut *tx)
                .await
                .map_err(|e| MigrateError::copy(table, "insert batch", e))?;
        }

        tx.commit()
            .await
            .map_err(|e| MigrateError::copy(table, "commit batch", e))?;

        Ok(rows.len() as u64)
    }

    async fn get_row_count(&mut self, schema: &str, table: &str) -> Result<i64> {
        let sql = self.dialect.build_count_query(schema, table)?;
        sqlx::query_scalar::<_, i64>(&sql)
            .fetch_one(&mut self.conn)
            .await
            .map_err(|e| MigrateError::copy(table, "count destination rows", e))
    }

    fn db_type(&self) -> &str {
        "sqlite"
    }

    async fn close(self) {
        if let Err(e) = self.conn.close().await {
            warn!("Error closing SQLite destination {}: {}", self.path, e);
        }
    }
}
