//! Type mapping implementations with (source, target) pair keying.

use crate::core::schema::{Column, SemanticType};
use crate::core::traits::{TypeMapper, TypeMapping};

/// SQLite → PostgreSQL type mapper.
///
/// Maps by semantic type rather than by declared name, since SQLite accepts
/// arbitrary declared types. Columns whose declared type carries no usable
/// information land in `text`, which accepts the text form of any value.
#[derive(Debug, Clone, Default)]
pub struct SqliteToPostgresMapper;

impl SqliteToPostgresMapper {
    /// Create a new SQLite to PostgreSQL mapper.
    pub fn new() -> Self {
        Self
    }
}

impl TypeMapper for SqliteToPostgresMapper {
    fn source_dialect(&self) -> &str {
        "sqlite"
    }

    fn target_dialect(&self) -> &str {
        "postgres"
    }

    fn map_type(&self, col: &Column) -> TypeMapping {
        match col.semantic {
            SemanticType::Boolean => TypeMapping::lossless("boolean"),
            SemanticType::Integer => TypeMapping::lossless("bigint"),
            SemanticType::Real => TypeMapping::lossless("double precision"),
            SemanticType::Numeric => {
                if col.precision > 0 {
                    TypeMapping::lossless(format!("numeric({},{})", col.precision, col.scale))
                } else {
                    TypeMapping::lossless("numeric")
                }
            }
            SemanticType::Text => text_type(&col.data_type, col.max_length),
            SemanticType::Date => TypeMapping::lossless("date"),
            SemanticType::DateTime => TypeMapping::lossless("timestamp"),
            SemanticType::Time => TypeMapping::lossless("time"),
            SemanticType::Blob => TypeMapping::lossless("bytea"),
            SemanticType::Untyped => {
                TypeMapping::lossy("text", "column has no declared type; stored as text")
            }
            SemanticType::Other => TypeMapping::lossy(
                "text",
                format!("unrecognized type '{}' stored as text", col.data_type),
            ),
        }
    }
}

/// Map a text-affinity declared type, keeping any declared length.
fn text_type(data_type: &str, max_length: i32) -> TypeMapping {
    let upper = data_type.trim().to_uppercase();
    if max_length <= 0 {
        return TypeMapping::lossless("text");
    }
    if upper.contains("VAR") {
        TypeMapping::lossless(format!("varchar({})", max_length))
    } else if upper.starts_with("CHAR") || upper.starts_with("NCHAR") {
        TypeMapping::lossless(format!("char({})", max_length))
    } else {
        TypeMapping::lossless("text")
    }
}

/// Identity mapper for same-dialect copies (SQLite → SQLite).
///
/// Keeps the declared type verbatim, including an empty one, so the copy
/// has the same affinities as the source.
#[derive(Debug, Clone)]
pub struct IdentityMapper {
    dialect: String,
}

impl IdentityMapper {
    /// Create a new identity mapper for the given dialect.
    pub fn new(dialect: impl Into<String>) -> Self {
        Self {
            dialect: dialect.into(),
        }
    }
}

impl TypeMapper for IdentityMapper {
    fn source_dialect(&self) -> &str {
        &self.dialect
    }

    fn target_dialect(&self) -> &str {
        &self.dialect
    }

    fn map_type(&self, col: &Column) -> TypeMapping {
        TypeMapping::lossless(col.data_type.trim())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pg(declared: &str) -> TypeMapping {
        let col = Column::from_declared("c", declared, true, 0, 0);
        SqliteToPostgresMapper::new().map_type(&col)
    }

    #[test]
    fn test_sqlalchemy_types() {
        assert_eq!(pg("INTEGER").target_type, "bigint");
        assert_eq!(pg("BOOLEAN").target_type, "boolean");
        assert_eq!(pg("FLOAT").target_type, "double precision");
        assert_eq!(pg("TEXT").target_type, "text");
        assert_eq!(pg("VARCHAR").target_type, "text");
        assert_eq!(pg("VARCHAR(255)").target_type, "varchar(255)");
        assert_eq!(pg("CHAR(3)").target_type, "char(3)");
        assert_eq!(pg("DATETIME").target_type, "timestamp");
        assert_eq!(pg("NUMERIC(10, 2)").target_type, "numeric(10,2)");
        assert_eq!(pg("NUMERIC").target_type, "numeric");
        assert_eq!(pg("BLOB").target_type, "bytea");
    }

    #[test]
    fn test_untyped_and_unknown_are_lossy_text() {
        let m = pg("");
        assert_eq!(m.target_type, "text");
        assert!(m.is_lossy);

        let m = pg("JSON");
        assert_eq!(m.target_type, "text");
        assert!(m.warning.unwrap().contains("JSON"));
    }

    #[test]
    fn test_map_column_carries_nullability() {
        let col = Column::from_declared("circuit_id", "VARCHAR(64)", false, 1, 0);
        let mapping = SqliteToPostgresMapper::new().map_column(&col);
        assert_eq!(mapping.name, "circuit_id");
        assert_eq!(mapping.target_type, "varchar(64)");
        assert!(!mapping.is_nullable);
    }

    #[test]
    fn test_identity_mapper_keeps_declared_type() {
        let mapper = IdentityMapper::new("sqlite");
        let col = Column::from_declared("x", "VARCHAR(10)", true, 0, 0);
        assert_eq!(mapper.map_type(&col).target_type, "VARCHAR(10)");
        let col = Column::from_declared("y", "", true, 0, 1);
        assert_eq!(mapper.map_type(&col).target_type, "");
        assert_eq!(mapper.source_dialect(), mapper.target_dialect());
    }
}
