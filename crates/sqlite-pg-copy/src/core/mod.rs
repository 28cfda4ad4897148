//! Core abstractions for engine-agnostic copying.
//!
//! - [`schema`]: table, column and foreign key metadata
//! - [`value`]: SQL value representation and row batches
//! - [`traits`]: readers, writers, dialects and type mappers
//! - [`identifier`]: identifier validation and quoting
//! - [`ordering`]: foreign-key dependency ordering
//!
//! Driver modules (`drivers/sqlite`, `drivers/postgres`) implement these
//! traits; the transfer engine and orchestrator only see the abstractions.

pub mod identifier;
pub mod ordering;
pub mod schema;
pub mod traits;
pub mod value;

pub use ordering::dependency_order;
pub use schema::{Column, ForeignKey, SemanticType, Table};
pub use traits::{
    ColumnMapping, DdlOptions, Dialect, SourceReader, TargetWriter, TypeMapper, TypeMapping,
};
pub use value::{Batch, SqlValue};
