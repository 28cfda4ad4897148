//! Copy orchestrator - main workflow coordinator.
//!
//! A run opens the source, reflects and orders its tables, then opens the
//! destination, creates any missing tables and copies them one after another.
//! Both connections are closed before `run` returns, whether it succeeded or
//! not. The first error ends the run; committed batches stay where they are.

mod plan;

pub use plan::{CopyPlan, PlannedTable};
pub use crate::progress::RunPhase;

use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::config::{Config, TargetKind};
use crate::core::ordering::dependency_order;
use crate::core::schema::Table;
use crate::core::traits::{DdlOptions, Dialect, SourceReader, TargetWriter};
use crate::drivers::{type_mapper_for, DialectImpl, SqliteReader, TargetWriterImpl};
use crate::error::{MigrateError, Result};
use crate::progress::{JsonLinesObserver, ProgressObserver, ProgressTracker};
use crate::transfer::{TransferConfig, TransferEngine};

/// Copy orchestrator.
pub struct Orchestrator {
    config: Config,
    observer: Option<Box<dyn ProgressObserver>>,
}

/// Result of a copy run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationResult {
    /// Unique run identifier.
    pub run_id: String,

    /// Final status.
    pub status: String,

    /// Total duration in seconds.
    pub duration_seconds: f64,

    /// When the run started.
    pub started_at: DateTime<Utc>,

    /// When the run completed.
    pub completed_at: DateTime<Utc>,

    /// Tables copied.
    pub tables_total: usize,

    /// Total rows written at the destination.
    pub rows_transferred: u64,

    /// Average throughput (rows/second).
    pub rows_per_second: i64,

    /// Whether row counts were compared after the copy.
    pub verified: bool,

    /// Per-table results, in copy order.
    pub tables: Vec<TableResult>,
}

/// Outcome of copying one table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableResult {
    pub name: String,
    /// Source row count taken before the first chunk.
    pub source_rows: i64,
    pub rows_copied: u64,
    pub batches: u64,
    pub duration_seconds: f64,
}

impl Orchestrator {
    /// Create a new orchestrator. Nothing is opened until [`run`](Self::run)
    /// or [`plan`](Self::plan).
    pub fn new(config: Config) -> Self {
        Self {
            config,
            observer: None,
        }
    }

    /// Report phases and batches to `observer`.
    pub fn with_observer(mut self, observer: impl ProgressObserver + 'static) -> Self {
        self.observer = Some(Box::new(observer));
        self
    }

    /// Emit progress as JSON lines on stderr.
    pub fn with_progress(self, enabled: bool) -> Self {
        if enabled {
            self.with_observer(JsonLinesObserver)
        } else {
            self
        }
    }

    /// Run the copy.
    pub async fn run(self) -> Result<MigrationResult> {
        let Orchestrator { config, observer } = self;
        let mut tracker = ProgressTracker::new(observer);

        let started_at = Utc::now();
        let start = Instant::now();
        let run_id = uuid::Uuid::new_v4().to_string();

        info!("Starting copy run: {}", run_id);
        info!(
            "Source: {}, destination: {}",
            config.source.path,
            config.target.redacted_uri()
        );

        let outcome = match config.validate() {
            Ok(()) => {
                tracker.advance(RunPhase::Reflecting);
                execute(&config, &mut tracker).await
            }
            Err(e) => Err(e),
        };

        let tables = match outcome {
            Ok(tables) => tables,
            Err(e) => {
                error!("Copy run {} failed: {}", run_id, e);
                tracker.fail(e.to_string());
                return Err(e);
            }
        };
        tracker.advance(RunPhase::Finished);

        let duration = start.elapsed().as_secs_f64();
        let rows_transferred: u64 = tables.iter().map(|t| t.rows_copied).sum();
        let rows_per_second = if duration > 0.0 {
            (rows_transferred as f64 / duration) as i64
        } else {
            0
        };

        info!(
            "Copy {}: {} tables, {} rows in {:.1}s ({} rows/s)",
            run_id,
            tables.len(),
            rows_transferred,
            duration,
            rows_per_second
        );

        Ok(MigrationResult {
            run_id,
            status: "completed".to_string(),
            duration_seconds: duration,
            started_at,
            completed_at: Utc::now(),
            tables_total: tables.len(),
            rows_transferred,
            rows_per_second,
            verified: config.copy.verify,
            tables,
        })
    }

    /// Reflect the source and describe what a run would do, without opening
    /// the destination.
    pub async fn plan(&self) -> Result<CopyPlan> {
        self.config.validate()?;
        let kind = self.config.target.kind()?;

        let mut source = SqliteReader::new(&self.config.source).await?;
        let outcome = build_plan(&self.config, &mut source, kind).await;
        source.close().await;
        outcome
    }
}

async fn execute(config: &Config, tracker: &mut ProgressTracker) -> Result<Vec<TableResult>> {
    let kind = config.target.kind()?;
    let mut source = SqliteReader::new(&config.source)
        .await?
        .decode_booleans(kind == TargetKind::Postgres);
    let outcome = copy_from(config, tracker, &mut source).await;
    source.close().await;
    outcome
}

async fn copy_from(
    config: &Config,
    tracker: &mut ProgressTracker,
    source: &mut SqliteReader,
) -> Result<Vec<TableResult>> {
    let mut tables = dependency_order(source.extract_schema().await?)?;
    info!(
        "Found {} tables to copy: {}",
        tables.len(),
        tables
            .iter()
            .map(|t| t.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    );
    check_names(
        &DialectImpl::for_kind(config.target.kind()?),
        config.target.schema.as_str(),
        &tables,
    )?;

    let ddl = DdlOptions {
        foreign_keys: config.copy.create_foreign_keys,
    };
    let mut target = TargetWriterImpl::connect(&config.target, ddl).await?;
    let outcome = copy_tables(config, tracker, source, &mut target, &mut tables).await;
    target.close().await;
    outcome
}

/// Quote every table and column name for the destination before anything
/// is created there.
fn check_names(dialect: &DialectImpl, schema: &str, tables: &[Table]) -> Result<()> {
    for table in tables {
        dialect
            .qualify_table(schema, &table.name)
            .map_err(|e| MigrateError::reflection("table name", e))?;
        for column in &table.columns {
            dialect
                .quote_ident(&column.name)
                .map_err(|e| MigrateError::reflection(&format!("column of {}", table.name), e))?;
        }
    }
    Ok(())
}

async fn copy_tables<R, W>(
    config: &Config,
    tracker: &mut ProgressTracker,
    source: &mut R,
    target: &mut W,
    tables: &mut [Table],
) -> Result<Vec<TableResult>>
where
    R: SourceReader,
    W: TargetWriter,
{
    let schema = config.target.schema.as_str();

    target.create_schema(schema).await?;
    for table in tables.iter() {
        if target.table_exists(schema, &table.name).await? {
            info!("Table {} already exists at destination; rows will be appended", table.name);
        }
        target.create_table(table, schema).await?;
    }

    let engine = TransferEngine::new(TransferConfig {
        chunk_size: config.copy.chunk_size,
        target_schema: schema.to_string(),
    });

    let mut results = Vec::with_capacity(tables.len());
    for table in tables.iter_mut() {
        let started = Instant::now();
        let stats = engine.copy_table(source, target, table, tracker).await?;
        table.row_count = stats.total;
        tracker.advance(RunPhase::Done {
            table: table.name.clone(),
            rows: stats.rows,
        });

        results.push(TableResult {
            name: table.name.clone(),
            source_rows: stats.total,
            rows_copied: stats.rows,
            batches: stats.batches,
            duration_seconds: started.elapsed().as_secs_f64(),
        });
    }

    if config.copy.verify {
        verify_counts(source, target, tables, schema).await?;
    }

    Ok(results)
}

/// Compare source and destination row counts for every table.
async fn verify_counts<R, W>(
    source: &mut R,
    target: &mut W,
    tables: &[Table],
    schema: &str,
) -> Result<()>
where
    R: SourceReader,
    W: TargetWriter,
{
    let mut mismatches = Vec::new();
    for table in tables {
        let source_count = source.get_row_count(&table.name).await?;
        let target_count = target.get_row_count(schema, &table.name).await?;

        if source_count == target_count {
            info!("{}: {} rows (match)", table.name, source_count);
        } else {
            warn!(
                "{}: source={} destination={} (MISMATCH)",
                table.name, source_count, target_count
            );
            mismatches.push(format!(
                "{} (source={}, destination={})",
                table.name, source_count, target_count
            ));
        }
    }

    if mismatches.is_empty() {
        Ok(())
    } else {
        Err(MigrateError::Verification(format!(
            "row counts differ for {}",
            mismatches.join(", ")
        )))
    }
}

async fn build_plan(
    config: &Config,
    source: &mut SqliteReader,
    kind: TargetKind,
) -> Result<CopyPlan> {
    let dialect = DialectImpl::for_kind(kind);
    let mapper = type_mapper_for(kind);
    let ddl = DdlOptions {
        foreign_keys: config.copy.create_foreign_keys,
    };
    let schema = config.target.schema.as_str();
    let chunk = config.copy.chunk_size.max(1) as u64;

    let tables = dependency_order(source.extract_schema().await?)?;
    info!(
        "Planning {} tables for a {} destination",
        tables.len(),
        dialect.name()
    );
    check_names(&dialect, schema, &tables)?;
    let mut planned = Vec::with_capacity(tables.len());
    for table in &tables {
        let row_count = source.get_row_count(&table.name).await?;
        planned.push(PlannedTable {
            name: table.name.clone(),
            row_count,
            batches: (row_count.max(0) as u64).div_ceil(chunk),
            depends_on: table.referenced_tables(),
            ddl: dialect.build_create_table(table, schema, mapper.as_ref(), ddl)?,
        });
    }

    Ok(CopyPlan {
        source: config.source.path.clone(),
        destination: config.target.redacted_uri(),
        destination_kind: kind,
        chunk_size: config.copy.chunk_size,
        tables: planned,
    })
}

impl MigrationResult {
    /// Convert to JSON string.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
