//! PostgreSQL target writer implementation.
//!
//! Implements the `TargetWriter` trait over a single tokio-postgres client.
//! Batches are loaded with text-format `COPY ... FROM STDIN` inside a
//! transaction, so each batch commits or rolls back as a unit.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::{BufMut, Bytes, BytesMut};
use futures::SinkExt;
use tokio::task::JoinHandle;
use tokio_postgres::config::SslMode as PgSslMode;
use tokio_postgres::{Client, Config as PgConfig, NoTls};
use tracing::{debug, info, warn};

use crate::config::TargetConfig;
use crate::core::schema::Table;
use crate::core::traits::{DdlOptions, Dialect, TargetWriter, TypeMapper};
use crate::core::value::{Batch, SqlValue};
use crate::dialect::SqliteToPostgresMapper;
use crate::drivers::common::{SslMode, TlsBuilder};
use crate::error::{MigrateError, Result};

use super::dialect::{copy_in_statement, PostgresDialect};

/// Connection timeout.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// PostgreSQL target writer implementation.
pub struct PostgresWriter {
    client: Client,
    connection: JoinHandle<()>,
    dialect: PostgresDialect,
    type_mapper: Arc<dyn TypeMapper>,
    ddl: DdlOptions,
}

impl PostgresWriter {
    /// Connect to the destination described by `config.uri`.
    ///
    /// The TLS mode comes from `config.ssl_mode` when set, otherwise from the
    /// URI's `sslmode` parameter, otherwise TLS is disabled.
    pub async fn new(config: &TargetConfig) -> Result<Self> {
        let (uri, uri_ssl_mode) = split_sslmode(&config.postgres_uri());
        let ssl_mode = match config.ssl_mode.as_deref().or(uri_ssl_mode.as_deref()) {
            Some(mode) => SslMode::parse(mode)?,
            None => SslMode::Disable,
        };

        let mut pg_config: PgConfig = uri.parse().map_err(|e| {
            MigrateError::Config(format!(
                "Invalid target.uri '{}': {}",
                config.redacted_uri(),
                e
            ))
        })?;
        pg_config.keepalives(true);
        pg_config.keepalives_idle(Duration::from_secs(30));
        pg_config.connect_timeout(CONNECT_TIMEOUT);
        pg_config.ssl_mode(if ssl_mode.requires_tls() {
            PgSslMode::Require
        } else {
            PgSslMode::Disable
        });

        let target = config.redacted_uri();
        let connect_err = |e: tokio_postgres::Error| {
            MigrateError::connection("destination", format!("{}: {}", target, e))
        };

        let (client, connection) = match TlsBuilder::new(ssl_mode).build()? {
            None => {
                warn!("PostgreSQL TLS is disabled. Credentials will be transmitted in plaintext.");
                let (client, conn) = pg_config.connect(NoTls).await.map_err(connect_err)?;
                let handle = tokio::spawn(async move {
                    if let Err(e) = conn.await {
                        warn!("PostgreSQL connection error: {}", e);
                    }
                });
                (client, handle)
            }
            Some(tls) => {
                let (client, conn) = pg_config.connect(tls).await.map_err(connect_err)?;
                let handle = tokio::spawn(async move {
                    if let Err(e) = conn.await {
                        warn!("PostgreSQL connection error: {}", e);
                    }
                });
                (client, handle)
            }
        };

        client
            .simple_query("SELECT 1")
            .await
            .map_err(|e| MigrateError::connection("destination", e))?;

        info!("Connected to PostgreSQL destination: {}", target);

        Ok(Self {
            client,
            connection,
            dialect: PostgresDialect::new(),
            type_mapper: Arc::new(SqliteToPostgresMapper::new()),
            ddl: DdlOptions::default(),
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
    pub fn generate_ddl(&self, table: &Table, target_schema: &str) -> Result<String> {
        self.dialect
            .build_create_table(table, target_schema, self.type_mapper.as_ref(), self.ddl)
    }
}

/// Remove `sslmode` from the URI query, returning it separately.
///
/// tokio-postgres only understands `disable`, `prefer` and `require`, so the
/// verify modes are resolved here instead.
fn split_sslmode(uri: &str) -> (String, Option<String>) {
    let Some((base, query)) = uri.split_once('?') else {
        return (uri.to_string(), None);
    };

    let mut ssl_mode = None;
    let kept: Vec<&str> = query
        .split('&')
        .filter(|pair| match pair.split_once('=') {
            Some(("sslmode", value)) => {
                ssl_mode = Some(value.to_string());
                false
            }
            _ => !pair.is_empty(),
        })
        .collect();

    if kept.is_empty() {
        (base.to_string(), ssl_mode)
    } else {
        (format!("{}?{}", base, kept.join("&")), ssl_mode)
    }
}

#[async_trait]
impl TargetWriter for PostgresWriter {
    async fn create_schema(&mut self, schema: &str) -> Result<()> {
        if schema == "public" {
            return Ok(());
        }

        let sql = format!("CREATE SCHEMA IF NOT EXISTS {}", self.dialect.quote_ident(schema)?);
        self.client
            .batch_execute(&sql)
            .await
            .map_err(|e| MigrateError::copy(schema, "create schema", e))?;

        debug!("Created schema '{}'", schema);
        Ok(())
    }

    async fn create_table(&mut self, table: &Table, target_schema: &str) -> Result<()> {
        let ddl = self.generate_ddl(table, target_schema)?;
        self.client
            .batch_execute(&ddl)
            .await
            .map_err(|e| MigrateError::copy(&table.name, "create table", e))?;

        debug!("Ensured table {}.{}", target_schema, table.name);
        Ok(())
    }

    async fn table_exists(&mut self, schema: &str, table: &str) -> Result<bool> {
        let sql = r#"
            SELECT EXISTS (
                SELECT 1 FROM information_schema.tables
                WHERE table_schema = $1 AND table_name = $2
            )
        "#;

        let row = self
            .client
            .query_one(sql, &[&schema, &table])
            .await
            .map_err(|e| MigrateError::copy(table, "check table exists", e))?;
        Ok(row.get::<_, bool>(0))
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

        let copy_sql = copy_in_statement(schema, table, cols)?;

        let mut buf = BytesMut::with_capacity(rows.len() * 128);
        for row in &rows {
            for (i, value) in row.iter().enumerate() {
                if i > 0 {
                    buf.put_u8(b'\t');
                }
                buf.put_slice(value_to_text(value).as_bytes());
            }
            buf.put_u8(b'\n');
        }

        let tx = self
            .client
            .transaction()
            .await
            .map_err(|e| MigrateError::copy(table, "begin transaction", e))?;

        let sink = tx
            .copy_in::<_, Bytes>(&copy_sql)
            .await
            .map_err(|e| MigrateError::copy(table, "COPY init", e))?;
        tokio::pin!(sink);

        sink.send(buf.freeze())
            .await
            .map_err(|e| MigrateError::copy(table, "COPY send", e))?;

        let written = sink
            .finish()
            .await
            .map_err(|e| MigrateError::copy(table, "COPY finish", e))?;

        tx.commit()
            .await
            .map_err(|e| MigrateError::copy(table, "commit batch", e))?;

        Ok(written)
    }

    async fn get_row_count(&mut self, schema: &str, table: &str) -> Result<i64> {
        let sql = self.dialect.build_count_query(schema, table)?;
        let row = self
            .client
            .query_one(&sql, &[])
            .await
            .map_err(|e| MigrateError::copy(table, "count destination rows", e))?;
        Ok(row.get::<_, i64>(0))
    }

    fn db_type(&self) -> &str {
        "postgres"
    }

    async fn close(self) {
        drop(self.client);
        if let Err(e) = self.connection.await {
            warn!("PostgreSQL connection task failed: {}", e);
        }
    }
}

/// Convert SqlValue to text for COPY.
fn value_to_text(value: &SqlValue<'_>) -> String {
    match value {
        SqlValue::Null => "\\N".to_string(),
        SqlValue::Bool(b) => if *b { "t" } else { "f" }.to_string(),
        SqlValue::I64(i) => i.to_string(),
        SqlValue::F64(f) => {
            if f.is_nan() {
                "NaN".to_string()
            } else if f.is_infinite() {
                if *f > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
            } else {
                f.to_string()
            }
        }
        SqlValue::Text(s) => escape_copy_text(s),
        SqlValue::Bytes(b) => format!("\\\\x{}", hex::encode(b.as_ref())),
    }
}

/// Escape text for PostgreSQL COPY.
fn escape_copy_text(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => result.push_str("\\\\"),
            '\t' => result.push_str("\\t"),
            '\n' => result.push_str("\\n"),
            '\r' => result.push_str("\\r"),
            _ => result.push(c),
        }
    }
    result
}
