//! Schema metadata types for reflected tables, columns and foreign keys.
//!
//! These types are produced once per table by reflection and stay immutable
//! for the rest of a run (apart from `row_count`, which is filled in when the
//! table is counted).

use serde::{Deserialize, Serialize};

/// Semantic type of a column, derived from its declared SQLite type.
///
/// SQLite is dynamically typed, so the declared type is only a hint. The
/// classification follows SQLite's affinity rules, with the common names that
/// ORMs emit (BOOLEAN, DATETIME, ...) recognised before affinity is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SemanticType {
    Boolean,
    Integer,
    Real,
    Numeric,
    Text,
    Date,
    DateTime,
    Time,
    Blob,
    /// Column declared without any type; may hold any storage class.
    Untyped,
    /// Declared type not recognised (NUMERIC affinity in SQLite).
    Other,
}

impl SemanticType {
    /// Classify a declared column type such as `VARCHAR(255)` or `BOOLEAN`.
    pub fn classify(declared: &str) -> Self {
        let upper = declared.trim().to_uppercase();
        if upper.is_empty() {
            return SemanticType::Untyped;
        }

        let base = upper.split('(').next().unwrap_or("").trim();
        match base {
            "BOOLEAN" | "BOOL" => return SemanticType::Boolean,
            "DATE" => return SemanticType::Date,
            "DATETIME" | "TIMESTAMP" => return SemanticType::DateTime,
            "TIME" => return SemanticType::Time,
            "NUMERIC" | "DECIMAL" => return SemanticType::Numeric,
            _ => {}
        }

        // Affinity rules, in the order SQLite applies them.
        if upper.contains("INT") {
            SemanticType::Integer
        } else if upper.contains("CHAR") || upper.contains("CLOB") || upper.contains("TEXT") {
            SemanticType::Text
        } else if upper.contains("BLOB") {
            SemanticType::Blob
        } else if upper.contains("REAL") || upper.contains("FLOA") || upper.contains("DOUB") {
            SemanticType::Real
        } else {
            SemanticType::Other
        }
    }
}

/// Table metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Table {
    /// Table name.
    pub name: String,

    /// Column definitions in declaration order.
    pub columns: Vec<Column>,

    /// Primary key column names, in key order.
    pub primary_key: Vec<String>,

    /// Foreign key constraints.
    pub foreign_keys: Vec<ForeignKey>,

    /// Row count, set when the table is counted at copy time.
    pub row_count: i64,
}

impl Table {
    /// Create an empty table descriptor.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            primary_key: Vec::new(),
            foreign_keys: Vec::new(),
            row_count: 0,
        }
    }

    /// Check if the table has a primary key.
    pub fn has_pk(&self) -> bool {
        !self.primary_key.is_empty()
    }

    /// Column names in declaration order.
    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    /// Find a column by name (case-insensitive, as SQLite resolves names).
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }

    /// Names of other tables this table references through foreign keys.
    ///
    /// Self-references are excluded; duplicates are removed.
    pub fn referenced_tables(&self) -> Vec<String> {
        let mut refs: Vec<String> = self
            .foreign_keys
            .iter()
            .map(|fk| fk.ref_table.clone())
            .filter(|t| !t.eq_ignore_ascii_case(&self.name))
            .collect();
        refs.sort();
        refs.dedup();
        refs
    }
}

/// Column metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Column {
    /// Column name.
    pub name: String,

    /// Declared type as written in the source DDL (may be empty).
    pub data_type: String,

    /// Semantic type derived from `data_type`.
    pub semantic: SemanticType,

    /// Declared length for character types (0 when absent).
    pub max_length: i32,

    /// Declared numeric precision (0 when absent).
    pub precision: i32,

    /// Declared numeric scale (0 when absent).
    pub scale: i32,

    /// Whether the column allows NULL.
    pub is_nullable: bool,

    /// 1-based position in the primary key, 0 when not part of it.
    pub pk_position: i32,

    /// Ordinal position (0-based, as reported by SQLite).
    pub ordinal_pos: i32,
}

impl Column {
    /// Build a column from its declared type, parsing any length/precision
    /// arguments such as `VARCHAR(64)` or `NUMERIC(10,2)`.
    pub fn from_declared(
        name: impl Into<String>,
        data_type: impl Into<String>,
        is_nullable: bool,
        pk_position: i32,
        ordinal_pos: i32,
    ) -> Self {
        let data_type = data_type.into();
        let semantic = SemanticType::classify(&data_type);
        let (first, second) = parse_type_args(&data_type);

        let (max_length, precision, scale) = match semantic {
            SemanticType::Text => (first.unwrap_or(0), 0, 0),
            SemanticType::Numeric => (0, first.unwrap_or(0), second.unwrap_or(0)),
            _ => (0, 0, 0),
        };

        Self {
            name: name.into(),
            data_type,
            semantic,
            max_length,
            precision,
            scale,
            is_nullable,
            pk_position,
            ordinal_pos,
        }
    }
}

/// Parse up to two integer arguments from a declared type, e.g. `(10,2)`.
fn parse_type_args(data_type: &str) -> (Option<i32>, Option<i32>) {
    let Some(open) = data_type.find('(') else {
        return (None, None);
    };
    let Some(close) = data_type[open..].find(')') else {
        return (None, None);
    };

    let mut args = data_type[open + 1..open + close]
        .split(',')
        .map(|a| a.trim().parse::<i32>().ok());
    let first = args.next().flatten();
    let second = args.next().flatten();
    (first, second)
}

/// Foreign key metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForeignKey {
    /// Constraint id as reported by the source.
    pub id: i64,

    /// Local column names.
    pub columns: Vec<String>,

    /// Referenced table name.
    pub ref_table: String,

    /// Referenced column names. Empty when the key targets the referenced
    /// table's primary key implicitly.
    pub ref_columns: Vec<String>,

    /// ON DELETE action.
    pub on_delete: String,

    /// ON UPDATE action.
    pub on_update: String,
}
