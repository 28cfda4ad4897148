//! `CREATE TABLE` generation shared by the destination dialects.

use tracing::warn;

use crate::core::schema::{ForeignKey, Table};
use crate::core::traits::{DdlOptions, Dialect, TypeMapper};
use crate::error::{MigrateError, Result};

/// Build `CREATE TABLE IF NOT EXISTS` DDL for a reflected table.
///
/// Column types come from `mapper`; lossy mappings are logged at warn. The
/// primary key is emitted as a table constraint in key order, and foreign
/// keys are emitted when `opts.foreign_keys` is set.
pub fn create_table_ddl<D: Dialect + ?Sized>(
    dialect: &D,
    table: &Table,
    schema: &str,
    mapper: &dyn TypeMapper,
    opts: DdlOptions,
) -> Result<String> {
    if table.columns.is_empty() {
        return Err(MigrateError::Reflection(format!(
            "table {} has no columns",
            table.name
        )));
    }

    let mut defs = Vec::with_capacity(table.columns.len() + 1 + table.foreign_keys.len());

    for col in &table.columns {
        let mapping = mapper.map_column(col);
        if let Some(warning) = &mapping.warning {
            warn!("Column {}.{}: {}", table.name, col.name, warning);
        }

        let mut def = dialect.quote_ident(&col.name)?;
        if !mapping.target_type.is_empty() {
            def.push(' ');
            def.push_str(&mapping.target_type);
        }
        if !mapping.is_nullable {
            def.push_str(" NOT NULL");
        }
        defs.push(def);
    }

    if table.has_pk() {
        defs.push(format!(
            "PRIMARY KEY ({})",
            quote_list(dialect, &table.primary_key)?
        ));
    }

    if opts.foreign_keys {
        for fk in &table.foreign_keys {
            defs.push(foreign_key_clause(dialect, fk, schema)?);
        }
    }

    Ok(format!(
        "CREATE TABLE IF NOT EXISTS {} (\n    {}\n)",
        dialect.qualify_table(schema, &table.name)?,
        defs.join(",\n    ")
    ))
}

fn foreign_key_clause<D: Dialect + ?Sized>(
    dialect: &D,
    fk: &ForeignKey,
    schema: &str,
) -> Result<String> {
    let mut clause = format!(
        "FOREIGN KEY ({}) REFERENCES {}",
        quote_list(dialect, &fk.columns)?,
        dialect.qualify_table(schema, &fk.ref_table)?
    );
    if !fk.ref_columns.is_empty() {
        clause.push_str(&format!(" ({})", quote_list(dialect, &fk.ref_columns)?));
    }
    if let Some(action) = referential_action(&fk.on_delete) {
        clause.push_str(" ON DELETE ");
        clause.push_str(action);
    }
    if let Some(action) = referential_action(&fk.on_update) {
        clause.push_str(" ON UPDATE ");
        clause.push_str(action);
    }
    Ok(clause)
}

/// Map a reported referential action; `None` for the NO ACTION default.
fn referential_action(action: &str) -> Option<&'static str> {
    match action.trim().to_uppercase().replace('_', " ").as_str() {
        "CASCADE" => Some("CASCADE"),
        "SET NULL" => Some("SET NULL"),
        "SET DEFAULT" => Some("SET DEFAULT"),
        "RESTRICT" => Some("RESTRICT"),
        _ => None,
    }
}

fn quote_list<D: Dialect + ?Sized>(dialect: &D, names: &[String]) -> Result<String> {
    let quoted = names
        .iter()
        .map(|n| dialect.quote_ident(n))
        .collect::<Result<Vec<_>>>()?;
    Ok(quoted.join(", "))
}
