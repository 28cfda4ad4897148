//! Chunked table copy.
//!
//! One table at a time: count the source rows once, then read `LIMIT chunk
//! OFFSET n` slices and write each slice at the destination as one committed
//! batch. There is no read-ahead and no parallelism; every await is a round
//! trip on the run's single source or destination connection.

use std::fmt;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::config::DEFAULT_CHUNK_SIZE;
use crate::core::schema::Table;
use crate::core::traits::{SourceReader, TargetWriter};
use crate::error::{MigrateError, Result};
use crate::progress::{ProgressTracker, RunPhase};

/// Configuration for the transfer engine.
#[derive(Debug, Clone)]
pub struct TransferConfig {
    /// Number of rows per chunk.
    pub chunk_size: usize,
    /// Destination schema name (ignored by SQLite destinations).
    pub target_schema: String,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            target_schema: "public".to_string(),
        }
    }
}

/// Progress of one table copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyProgress {
    /// Table being copied.
    pub table: String,
    /// Rows requested so far (advances by the chunk size).
    pub offset: i64,
    /// Source row count taken before the first chunk.
    pub total: i64,
    /// Committed batches.
    pub batches: u64,
}

impl CopyProgress {
    pub fn new(table: impl Into<String>, total: i64) -> Self {
        Self {
            table: table.into(),
            offset: 0,
            total,
            batches: 0,
        }
    }

    /// Rows copied so far, never above `total`.
    pub fn copied(&self) -> i64 {
        self.offset.min(self.total)
    }
}

impl fmt::Display for CopyProgress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.copied(), self.total)
    }
}

/// Statistics from a table copy.
#[derive(Debug, Clone, Default)]
pub struct TransferStats {
    /// Source row count at the start of the copy.
    pub total: i64,

    /// Rows written at the destination.
    pub rows: u64,

    /// Committed batches.
    pub batches: u64,

    /// Time spent reading from the source.
    pub read_time: Duration,

    /// Time spent writing and committing.
    pub write_time: Duration,
}

/// Copies tables chunk by chunk.
#[derive(Debug, Clone)]
pub struct TransferEngine {
    config: TransferConfig,
}

impl TransferEngine {
    pub fn new(config: TransferConfig) -> Self {
        Self { config }
    }

    /// Copy every row of `table` from `source` to `target`.
    ///
    /// Moves the tracker through `Counting` and `Copying` for this table and
    /// reports each committed batch. The caller records `Done`. Batches
    /// committed before a failure stay at the destination.
    pub async fn copy_table<R, W>(
        &self,
        source: &mut R,
        target: &mut W,
        table: &Table,
        tracker: &mut ProgressTracker,
    ) -> Result<TransferStats>
    where
        R: SourceReader + ?Sized,
        W: TargetWriter + ?Sized,
    {
        let chunk = self.config.chunk_size.max(1);
        let step = i64::try_from(chunk).map_err(|_| {
            MigrateError::Config(format!("chunk size {} is out of range", chunk))
        })?;
        let schema = self.config.target_schema.as_str();

        tracker.advance(RunPhase::Counting {
            table: table.name.clone(),
        });
        let total = source.get_row_count(&table.name).await?;
        info!("Copying {}: {} rows in chunks of {}", table.name, total, chunk);

        tracker.advance(RunPhase::Copying {
            table: table.name.clone(),
        });

        let cols = table.column_names();
        let mut progress = CopyProgress::new(&table.name, total);
        let mut stats = TransferStats {
            total,
            ..Default::default()
        };

        while progress.offset < total {
            let read_start = Instant::now();
            let batch = source.read_chunk(table, progress.offset, chunk).await?;
            stats.read_time += read_start.elapsed();

            if batch.is_empty() {
                warn!(
                    "{}: source returned no rows at offset {} of {}; stopping early",
                    table.name, progress.offset, total
                );
                break;
            }

            let batch_no = progress.batches + 1;
            let fetched = batch.len();
            let write_start = Instant::now();
            let written = target
                .write_batch(schema, &table.name, &cols, batch)
                .await
                .map_err(|e| in_batch(e, batch_no))?;
            stats.write_time += write_start.elapsed();

            debug!(
                "{}: batch {} wrote {} of {} fetched rows",
                table.name, batch_no, written, fetched
            );

            stats.rows += written;
            progress.offset = progress.offset.saturating_add(step);
            progress.batches = batch_no;
            stats.batches = batch_no;

            info!("{}: {}", table.name, progress);
            tracker.batch(&progress);
        }

        info!(
            "Finished {}: {} rows in {} batches (read {:?}, write {:?})",
            table.name, stats.rows, stats.batches, stats.read_time, stats.write_time
        );
        Ok(stats)
    }
}

/// Prefix a copy error with the failing batch number.
fn in_batch(err: MigrateError, batch: u64) -> MigrateError {
    match err {
        MigrateError::Copy { table, message } => MigrateError::Copy {
            table,
            message: format!("batch {}: {}", batch, message),
        },
        other => other,
    }
}
