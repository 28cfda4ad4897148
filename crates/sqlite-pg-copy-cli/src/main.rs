//! sqlite-pg-copy CLI - one-shot copy of a SQLite database into PostgreSQL.

use clap::Parser;
use sqlite_pg_copy::{Config, CopyPlan, MigrateError, MigrationResult, Orchestrator};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{info, Level};
use tracing_subscriber::fmt::format::FmtSpan;

#[derive(Parser)]
#[command(name = "sqlite-pg-copy")]
#[command(about = "Copy every table of a SQLite database into PostgreSQL")]
#[command(version)]
struct Cli {
    /// Source SQLite database file
    #[arg(long, value_name = "PATH", required_unless_present = "config")]
    sqlite: Option<String>,

    /// Destination URI (postgresql://..., postgresql+driver://... or sqlite://PATH)
    #[arg(long, value_name = "URI", required_unless_present = "config")]
    pg: Option<String>,

    /// Rows per batch [default: 5000]
    #[arg(long, value_name = "N", value_parser = clap::value_parser!(u32).range(1..))]
    chunk: Option<u32>,

    /// Path to YAML configuration file (flags override its values)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Dry run: reflect the source and show the plan without touching the destination
    #[arg(long)]
    dry_run: bool,

    /// Compare source and destination row counts after the copy
    #[arg(long)]
    verify: bool,

    /// Create destination tables without FOREIGN KEY constraints
    #[arg(long)]
    no_foreign_keys: bool,

    /// Output JSON result to stdout
    #[arg(long)]
    output_json: bool,

    /// Print progress updates as JSON lines to stderr
    #[arg(long)]
    progress: bool,

    /// Log format: text or json
    #[arg(long, default_value = "text")]
    log_format: String,

    /// Log verbosity: debug, info, warn, error
    #[arg(long, default_value = "info")]
    verbosity: String,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            // --help and --version are reported as errors that print to stdout
            let code = if e.use_stderr() { 1 } else { 0 };
            let _ = e.print();
            return ExitCode::from(code);
        }
    };

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e.format_detailed());
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run(cli: Cli) -> Result<(), MigrateError> {
    setup_logging(&cli.verbosity, &cli.log_format)
        .map_err(|e| MigrateError::Config(e.to_string()))?;

    let config = build_config(&cli)?;

    if cli.dry_run {
        let plan = Orchestrator::new(config).plan().await?;
        if cli.output_json {
            println!("{}", plan.to_json()?);
        } else {
            print_plan(&plan);
        }
        return Ok(());
    }

    let result = Orchestrator::new(config)
        .with_progress(cli.progress)
        .run()
        .await?;

    if cli.output_json {
        println!("{}", result.to_json()?);
    } else {
        print_summary(&result);
    }
    Ok(())
}

/// Load the optional config file and apply command-line overrides.
fn build_config(cli: &Cli) -> Result<Config, MigrateError> {
    let mut config = match &cli.config {
        Some(path) => {
            let config = Config::load(path)?;
            info!("Loaded configuration from {:?}", path);
            config
        }
        None => Config::new(String::new(), String::new()),
    };

    if let Some(path) = &cli.sqlite {
        config.source.path = path.clone();
    }
    if let Some(uri) = &cli.pg {
        config.target.uri = uri.clone();
    }
    if let Some(chunk) = cli.chunk {
        config.copy.chunk_size = chunk as usize;
    }
    if cli.verify {
        config.copy.verify = true;
    }
    if cli.no_foreign_keys {
        config.copy.create_foreign_keys = false;
    }

    config.validate()?;
    Ok(config)
}

fn print_plan(plan: &CopyPlan) {
    println!("\nDry run: {} -> {}", plan.source, plan.destination);
    println!(
        "  Tables: {} ({} rows, chunk size {})",
        plan.tables.len(),
        plan.total_rows(),
        plan.chunk_size
    );
    for (i, table) in plan.tables.iter().enumerate() {
        println!(
            "\n  {}. {} ({} rows, {} batches)",
            i + 1,
            table.name,
            table.row_count,
            table.batches
        );
        if !table.depends_on.is_empty() {
            println!("     depends on: {}", table.depends_on.join(", "));
        }
        for line in table.ddl.lines() {
            println!("     {}", line);
        }
    }
}

fn print_summary(result: &MigrationResult) {
    println!("\nCopy completed!");
    println!("  Run ID: {}", result.run_id);
    println!("  Duration: {:.2}s", result.duration_seconds);
    println!("  Tables: {}", result.tables_total);
    println!("  Rows: {}", result.rows_transferred);
    println!("  Throughput: {} rows/sec", result.rows_per_second);
    if result.verified {
        println!("  Row counts verified");
    }
    for table in &result.tables {
        println!(
            "    {}: {} rows in {} batches",
            table.name, table.rows_copied, table.batches
        );
    }
}

/// Logs go to stderr so that `--output-json` leaves stdout parseable.
fn setup_logging(verbosity: &str, format: &str) -> Result<(), String> {
    let level = match verbosity.to_lowercase().as_str() {
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        other => return Err(format!("unknown verbosity '{}'", other)),
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_span_events(FmtSpan::CLOSE)
        .with_target(false)
        .with_writer(std::io::stderr);

    match format {
        "json" => subscriber.json().init(),
        "text" => subscriber.init(),
        other => return Err(format!("unknown log format '{}'", other)),
    }

    Ok(())
}
