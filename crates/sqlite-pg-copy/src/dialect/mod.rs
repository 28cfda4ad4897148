//! Type mapping and DDL utilities.
//!
//! # Available Mappers
//!
//! - [`SqliteToPostgresMapper`]: SQLite → PostgreSQL, by semantic type
//! - [`IdentityMapper`]: same-dialect copies (declared type passthrough)
//!
//! [`create_table_ddl`] turns a reflected table into idempotent DDL for any
//! [`Dialect`](crate::core::Dialect).

mod ddl;
mod typemap;

pub use ddl::create_table_ddl;
pub use typemap::{IdentityMapper, SqliteToPostgresMapper};
