// Gridiron entry point.
//
// Startup sequence:
// 1. Initialize tracing (log to file, not terminal)
// 2. Load config
// 3. Open database
// 4. Dispatch the subcommand and print a summary to stdout

use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use gridiron_app::{commands, config};
use gridiron_core::db::Database;
use gridiron_core::stats::build::TableKind;
use tracing::{error, info};

#[derive(Debug, Parser)]
#[command(name = "gridiron", version, about = "Fantasy football lineup backtester")]
struct Cli {
    /// Override the configured database path.
    #[arg(long, env = "GRIDIRON_DB", global = true)]
    db: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Build one season of a stat table from CSV and store it.
    Import {
        /// offense, offense-team, defense-team, advanced-passing, ...
        #[arg(long)]
        table: String,
        #[arg(long)]
        season: i32,
        /// Box score CSV, or game scores for defense-team.
        #[arg(long)]
        csv: PathBuf,
    },
    /// List stored tables with per-season row counts.
    Tables,
    /// Predict every slate period and backtest each stacking strategy.
    Backtest {
        #[arg(long)]
        run_id: Option<String>,
    },
}

fn main() -> anyhow::Result<()> {
    init_tracing()?;
    info!("Gridiron starting up");

    let cli = Cli::parse();
    let config = config::load_config().context("failed to load configuration")?;
    let db_path = cli.db.clone().unwrap_or_else(|| config.db_path.clone());
    if let Some(parent) = PathBuf::from(&db_path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
    }
    let db = Database::open(&db_path).context("failed to open database")?;
    info!("Database opened at {}", db_path);

    let result = run(cli.command, &db, &config);
    if let Err(e) = &result {
        error!("Command failed: {:#}", e);
    }
    result
}

fn run(command: Command, db: &Database, config: &config::Config) -> anyhow::Result<()> {
    match command {
        Command::Import { table, season, csv } => {
            let Some(kind) = TableKind::from_name(&table) else {
                bail!("unknown table `{table}`");
            };
            let rows = commands::import_table(db, kind, season, &csv)?;
            println!("{kind} {season}: {rows} rows");
        }
        Command::Tables => {
            let tables = commands::list_tables(db)?;
            if tables.is_empty() {
                println!("no tables stored");
            }
            for t in tables {
                println!("{:<20} {:>6} {:>8}", t.name, t.season, t.rows);
            }
        }
        Command::Backtest { run_id } => {
            let run_id = run_id.unwrap_or_else(Database::generate_run_id);
            info!("Starting backtest run {}", run_id);
            let reports = commands::run_backtest(db, config, &run_id)?;

            println!("run {run_id}");
            println!(
                "{:<16} {:>10} {:>10} {:>8} {:>8}",
                "stack", "net", "tiered", "lineups", "failed"
            );
            for report in &reports {
                println!(
                    "{:<16} {:>+10.0} {:>10.0} {:>8} {:>8}",
                    report.config.to_string(),
                    report.total(),
                    report.tiered_total(),
                    report.lineups(),
                    report.failures()
                );
            }
        }
    }
    Ok(())
}

fn init_tracing() -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let log_dir = std::env::current_dir()?.join("logs");
    std::fs::create_dir_all(&log_dir)?;

    let log_file = std::fs::File::create(log_dir.join("gridiron.log"))?;

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("gridiron_core=info,gridiron_app=info,warn")),
        )
        .with_writer(log_file)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    Ok(())
}
