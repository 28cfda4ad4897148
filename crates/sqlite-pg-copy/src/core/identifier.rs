//! Identifier validation and quoting.
//!
//! Table and column names are read from the source catalog and spliced into
//! generated SQL. Every name goes through [`validate_identifier`] and is then
//! quoted for the engine that will parse it.

use crate::error::{MigrateError, Result};

/// Maximum identifier length accepted from the source catalog.
const MAX_IDENTIFIER_LENGTH: usize = 128;

/// Longest identifier PostgreSQL keeps intact (NAMEDATALEN - 1). Longer
/// names are silently truncated by the server.
pub const PG_MAX_IDENTIFIER_LENGTH: usize = 63;

/// Validate an identifier before it is quoted into SQL.
///
/// Rejects empty names, names containing NUL bytes and names longer than
/// 128 bytes.
pub fn validate_identifier(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(MigrateError::Config(
            "Identifier cannot be empty".to_string(),
        ));
    }

    if name.contains('\0') {
        return Err(MigrateError::Config(format!(
            "Identifier contains null byte: {:?}",
            name
        )));
    }

    if name.len() > MAX_IDENTIFIER_LENGTH {
        return Err(MigrateError::Config(format!(
            "Identifier exceeds maximum length of {} bytes (got {} bytes): {:?}",
            MAX_IDENTIFIER_LENGTH,
            name.len(),
            name
        )));
    }

    Ok(())
}

/// Quote a PostgreSQL identifier.
///
/// PostgreSQL folds unquoted names to lower case, so names are always quoted
/// to keep the source casing (`Circuits` stays `Circuits`). Names over
/// [`PG_MAX_IDENTIFIER_LENGTH`] bytes are rejected, as two of them could be
/// truncated to the same name.
pub fn quote_pg(name: &str) -> Result<String> {
    validate_identifier(name)?;
    if name.len() > PG_MAX_IDENTIFIER_LENGTH {
        return Err(MigrateError::Config(format!(
            "Identifier exceeds PostgreSQL maximum length of {} bytes (got {} bytes): {:?}",
            PG_MAX_IDENTIFIER_LENGTH,
            name.len(),
            name
        )));
    }
    Ok(format!("\"{}\"", name.replace('"', "\"\"")))
}

/// Quote a SQLite identifier.
///
/// SQLite accepts the same double-quote form as PostgreSQL. Quoting also
/// covers reserved words used as table names, such as `References`.
pub fn quote_sqlite(name: &str) -> Result<String> {
    validate_identifier(name)?;
    Ok(format!("\"{}\"", name.replace('"', "\"\"")))
}

/// Qualify a PostgreSQL table name with schema.
pub fn qualify_pg(schema: &str, table: &str) -> Result<String> {
    Ok(format!("{}.{}", quote_pg(schema)?, quote_pg(table)?))
}
