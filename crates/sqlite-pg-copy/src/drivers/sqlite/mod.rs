//! SQLite driver.
//!
//! - [`SqliteDialect`]: SQL syntax strategy for SQLite
//! - [`SqliteReader`]: source reader (read-only, never creates the file)
//! - [`SqliteWriter`]: target writer for SQLite destination files
//!
//! # Connection String
//!
//! Destinations use a SQLite URI; the source is a plain file path:
//! ```text
//! sqlite:///absolute/path/copy.db
//! sqlite:relative/copy.db
//! ```

mod dialect;
mod reader;
mod writer;

pub use dialect::{SelectQueryOptions, SqliteDialect, SQLITE_MAX_PARAMS};
pub use reader::SqliteReader;
pub use writer::SqliteWriter;
