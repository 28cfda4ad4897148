//! SQLite source reader implementation.
//!
//! Implements the `SourceReader` trait over a single read-only SQLx
//! connection. Schema comes from `sqlite_master` and the `pragma_table_info`
//! / `pragma_foreign_key_list` table-valued functions.

use std::borrow::Cow;
use std::collections::BTreeMap;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteRow};
use sqlx::{ConnectOptions, Connection, Row, SqliteConnection, TypeInfo, ValueRef};
use tracing::{debug, info, warn};

use crate::config::SourceConfig;
use crate::core::identifier::validate_identifier;
use crate::core::schema::{Column, ForeignKey, SemanticType, Table};
use crate::core::traits::{Dialect, SourceReader};
use crate::core::value::{Batch, SqlValue};
use crate::error::{MigrateError, Result};

use super::dialect::{SelectQueryOptions, SqliteDialect};

/// SQLite source reader implementation.
pub struct SqliteReader {
    conn: SqliteConnection,
    dialect: SqliteDialect,
    path: String,
    booleans: bool,
}

impl SqliteReader {
    /// Open the source database read-only.
    ///
    /// Fails with `MigrateError::Connection` if the file is missing or is not
    /// a SQLite database; the file is never created.
    pub async fn new(config: &SourceConfig) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(&config.path)
            .read_only(true)
            .create_if_missing(false);

        let mut conn = options
            .connect()
            .await
            .map_err(|e| MigrateError::connection("source", format!("{}: {}", config.path, e)))?;

        // Opening succeeds for non-database files; the first read does not.
        sqlx::query_scalar::<_, i64>("SELECT count(*) FROM sqlite_master")
            .fetch_one(&mut conn)
            .await
            .map_err(|e| MigrateError::connection("source", format!("{}: {}", config.path, e)))?;

        info!("Connected to SQLite source: {}", config.path);

        Ok(Self {
            conn,
            dialect: SqliteDialect::new(),
            path: config.path.clone(),
            booleans: true,
        })
    }

    /// Read integers in BOOLEAN columns as booleans (the default).
    ///
    /// Turned off for SQLite destinations, where the stored integer is kept
    /// as is.
    pub fn decode_booleans(mut self, on: bool) -> Self {
        self.booleans = on;
        self
    }

    async fn load_columns(&mut self, table: &mut Table) -> Result<()> {
        let rows = sqlx::query(
            r#"SELECT cid, name, type, "notnull", pk FROM pragma_table_info(?) ORDER BY cid"#,
        )
        .bind(&table.name)
        .fetch_all(&mut self.conn)
        .await
        .map_err(|e| MigrateError::reflection(&format!("reading columns of {}", table.name), e))?;

        let mut pk: Vec<(i32, String)> = Vec::new();
        for row in &rows {
            let cid: i64 = get(row, "cid", &table.name)?;
            let name: String = get(row, "name", &table.name)?;
            let declared: String = get(row, "type", &table.name)?;
            let not_null: i64 = get(row, "notnull", &table.name)?;
            let pk_position: i64 = get(row, "pk", &table.name)?;

            validate_identifier(&name).map_err(|e| {
                MigrateError::reflection(&format!("column of {}", table.name), e)
            })?;

            if pk_position > 0 {
                pk.push((pk_position as i32, name.clone()));
            }
            table.columns.push(Column::from_declared(
                name,
                declared,
                not_null == 0,
                pk_position as i32,
                cid as i32,
            ));
        }

        pk.sort();
        table.primary_key = pk.into_iter().map(|(_, name)| name).collect();

        debug!(
            "Table {}: {} columns, primary key {:?}",
            table.name,
            table.columns.len(),
            table.primary_key
        );
        Ok(())
    }

    async fn load_foreign_keys(&mut self, table: &mut Table) -> Result<()> {
        let rows = sqlx::query(
            r#"SELECT id, seq, "table", "from", "to", on_update, on_delete
               FROM pragma_foreign_key_list(?)
               ORDER BY id, seq"#,
        )
        .bind(&table.name)
        .fetch_all(&mut self.conn)
        .await
        .map_err(|e| {
            MigrateError::reflection(&format!("reading foreign keys of {}", table.name), e)
        })?;

        let mut by_id: BTreeMap<i64, (ForeignKey, bool)> = BTreeMap::new();
        for row in &rows {
            let id: i64 = get(row, "id", &table.name)?;
            let ref_table: String = get(row, "table", &table.name)?;
            let from: String = get(row, "from", &table.name)?;
            let to: Option<String> = get(row, "to", &table.name)?;
            let on_update: String = get(row, "on_update", &table.name)?;
            let on_delete: String = get(row, "on_delete", &table.name)?;

            let (fk, implicit) = by_id.entry(id).or_insert_with(|| {
                (
                    ForeignKey {
                        id,
                        columns: Vec::new(),
                        ref_table,
                        ref_columns: Vec::new(),
                        on_delete,
                        on_update,
                    },
                    false,
                )
            });
            fk.columns.push(from);
            match to {
                Some(to) => fk.ref_columns.push(to),
                None => *implicit = true,
            }
        }

        table.foreign_keys = by_id
            .into_values()
            .map(|(mut fk, implicit)| {
                // References to the parent's primary key may omit the columns.
                if implicit {
                    fk.ref_columns.clear();
                }
                fk
            })
            .collect();
        Ok(())
    }
}

/// Read a catalog column, mapping failures to a reflection error.
fn get<'r, T>(row: &'r SqliteRow, column: &str, table: &str) -> Result<T>
where
    T: sqlx::Decode<'r, sqlx::Sqlite> + sqlx::Type<sqlx::Sqlite>,
{
    row.try_get(column).map_err(|e| {
        MigrateError::reflection(&format!("reading catalog for {}", table), e)
    })
}

/// Decode one row by the runtime storage class of each value.
///
/// The declared column type is only used to turn integers in BOOLEAN columns
/// into booleans, and only when `booleans` is set.
fn decode_row(
    row: &SqliteRow,
    table: &Table,
    booleans: bool,
) -> std::result::Result<Vec<SqlValue<'static>>, sqlx::Error> {
    let mut values = Vec::with_capacity(table.columns.len());
    for (i, col) in table.columns.iter().enumerate() {
        let raw = row.try_get_raw(i)?;
        if raw.is_null() {
            values.push(SqlValue::Null);
            continue;
        }

        let value = match raw.type_info().name() {
            "INTEGER" => {
                let v: i64 = row.try_get_unchecked(i)?;
                if booleans && col.semantic == SemanticType::Boolean {
                    SqlValue::Bool(v != 0)
                } else {
                    SqlValue::I64(v)
                }
            }
            "REAL" => SqlValue::F64(row.try_get_unchecked(i)?),
            "TEXT" => SqlValue::Text(Cow::Owned(row.try_get_unchecked::<String, _>(i)?)),
            _ => SqlValue::Bytes(Cow::Owned(row.try_get_unchecked::<Vec<u8>, _>(i)?)),
        };
        values.push(value);
    }
    Ok(values)
}

#[async_trait]
impl SourceReader for SqliteReader {
    async fn extract_schema(&mut self) -> Result<Vec<Table>> {
        let names: Vec<String> = sqlx::query_scalar(
            "SELECT name FROM sqlite_master
             WHERE type = 'table'
               AND name NOT LIKE 'sqlite_%'
               AND sql NOT LIKE 'CREATE VIRTUAL%'
             ORDER BY name",
        )
        .fetch_all(&mut self.conn)
        .await
        .map_err(|e| MigrateError::reflection("listing tables", e))?;

        let mut tables = Vec::with_capacity(names.len());
        for name in names {
            validate_identifier(&name).map_err(|e| MigrateError::reflection("table name", e))?;

            let mut table = Table::new(name);
            self.load_columns(&mut table).await?;
            self.load_foreign_keys(&mut table).await?;

            if table.columns.is_empty() {
                warn!("Table {} has no visible columns; skipping", table.name);
                continue;
            }
            tables.push(table);
        }

        info!("Reflected {} tables from {}", tables.len(), self.path);
        Ok(tables)
    }

    async fn get_row_count(&mut self, table: &str) -> Result<i64> {
        let sql = self.dialect.build_count_query("", table)?;
        sqlx::query_scalar::<_, i64>(&sql)
            .fetch_one(&mut self.conn)
            .await
            .map_err(|e| MigrateError::copy(table, "count rows", e))
    }

    async fn read_chunk(&mut self, table: &Table, offset: i64, limit: usize) -> Result<Batch> {
        let sql = self.dialect.build_select_query(&SelectQueryOptions {
            table: table.name.clone(),
            columns: table.column_names(),
            limit,
            offset,
        })?;

        let rows = sqlx::query(&sql)
            .fetch_all(&mut self.conn)
            .await
            .map_err(|e| MigrateError::copy(&table.name, &format!("fetch at offset {}", offset), e))?;

        let rows = rows
            .iter()
            .map(|row| decode_row(row, table, self.booleans))
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| MigrateError::copy(&table.name, &format!("decode at offset {}", offset), e))?;

        Ok(Batch::new(rows))
    }

    fn db_type(&self) -> &str {
        "sqlite"
    }

    async fn close(self) {
        if let Err(e) = self.conn.close().await {
            warn!("Error closing SQLite source {}: {}", self.path, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn source(dir: &TempDir, script: &str) -> SourceConfig {
        let path = dir.path().join("source.db");
        let mut conn = SqliteConnectOptions::new()
            .filename(&path)
            .create_if_missing(true)
            .connect()
            .await
            .unwrap();
        sqlx::raw_sql(script).execute(&mut conn).await.unwrap();
        conn.close().await.unwrap();
        SourceConfig {
            path: path.to_string_lossy().into_owned(),
        }
    }

    #[tokio::test]
    async fn test_reflects_columns_keys_and_foreign_keys() {
        let dir = TempDir::new().unwrap();
        let config = source(
            &dir,
            r#"CREATE TABLE Circuits (circuit_id INTEGER PRIMARY KEY, names TEXT NOT NULL);
               CREATE TABLE Connections (
                   a INTEGER, b INTEGER,
                   circuit_id INTEGER REFERENCES Circuits ON DELETE CASCADE,
                   flag BOOLEAN,
                   PRIMARY KEY (b, a)
               );"#,
        )
        .await;

        let mut reader = SqliteReader::new(&config).await.unwrap();
        let tables = reader.extract_schema().await.unwrap();
        reader.close().await;

        let names: Vec<&str> = tables.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["Circuits", "Connections"]);

        let circuits = &tables[0];
        assert_eq!(circuits.primary_key, vec!["circuit_id"]);
        assert!(!circuits.columns[1].is_nullable);

        let connections = &tables[1];
        assert_eq!(connections.primary_key, vec!["b", "a"]);
        assert_eq!(connections.columns[3].semantic, SemanticType::Boolean);
        assert_eq!(connections.foreign_keys.len(), 1);

        let fk = &connections.foreign_keys[0];
        assert_eq!(fk.columns, vec!["circuit_id"]);
        assert_eq!(fk.ref_table, "Circuits");
        assert!(fk.ref_columns.is_empty());
        assert_eq!(fk.on_delete, "CASCADE");
    }

    #[tokio::test]
    async fn test_reads_chunks_by_storage_class() {
        let dir = TempDir::new().unwrap();
        let config = source(
            &dir,
            r#"CREATE TABLE t (id INTEGER, flag BOOLEAN, score REAL, note TEXT, data BLOB);
               INSERT INTO t VALUES (1, 1, 0.5, 'x', X'CAFE');
               INSERT INTO t VALUES (2, 0, NULL, NULL, NULL);
               INSERT INTO t VALUES (3, NULL, 2.0, 'z', NULL);"#,
        )
        .await;

        let mut reader = SqliteReader::new(&config).await.unwrap();
        let tables = reader.extract_schema().await.unwrap();
        let table = &tables[0];

        assert_eq!(reader.get_row_count("t").await.unwrap(), 3);

        let first = reader.read_chunk(table, 0, 2).await.unwrap();
        assert_eq!(first.rows.len(), 2);
        assert_eq!(
            first.rows[0],
            vec![
                SqlValue::I64(1),
                SqlValue::Bool(true),
                SqlValue::F64(0.5),
                SqlValue::Text(Cow::Borrowed("x")),
                SqlValue::Bytes(Cow::Borrowed(&[0xCA, 0xFE][..])),
            ]
        );
        assert_eq!(first.rows[1][1], SqlValue::Bool(false));
        assert_eq!(first.rows[1][2], SqlValue::Null);

        let rest = reader.read_chunk(table, 2, 2).await.unwrap();
        assert_eq!(rest.rows.len(), 1);
        assert_eq!(rest.rows[0][0], SqlValue::I64(3));

        reader.close().await;
    }

    #[tokio::test]
    async fn test_boolean_decoding_can_be_turned_off() {
        let dir = TempDir::new().unwrap();
        let config = source(
            &dir,
            "CREATE TABLE t (flag BOOLEAN); INSERT INTO t VALUES (2), (-1), (0);",
        )
        .await;

        let mut reader = SqliteReader::new(&config).await.unwrap();
        let tables = reader.extract_schema().await.unwrap();
        let decoded = reader.read_chunk(&tables[0], 0, 10).await.unwrap();
        assert_eq!(decoded.rows[0][0], SqlValue::Bool(true));
        assert_eq!(decoded.rows[2][0], SqlValue::Bool(false));

        let mut reader = reader.decode_booleans(false);
        let raw = reader.read_chunk(&tables[0], 0, 10).await.unwrap();
        let values: Vec<SqlValue<'static>> = raw.rows.into_iter().map(|mut r| r.remove(0)).collect();
        assert_eq!(
            values,
            vec![SqlValue::I64(2), SqlValue::I64(-1), SqlValue::I64(0)]
        );
        reader.close().await;
    }

    #[tokio::test]
    async fn test_missing_file_is_a_connection_error() {
        let dir = TempDir::new().unwrap();
        let config = SourceConfig {
            path: dir.path().join("missing.db").to_string_lossy().into_owned(),
        };

        let err = SqliteReader::new(&config).await.err().unwrap();
        assert!(matches!(err, MigrateError::Connection { .. }));
        assert!(!dir.path().join("missing.db").exists());
    }
}
