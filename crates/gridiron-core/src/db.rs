// SQLite persistence layer for stat tables and backtest results.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use anyhow::{Context, Result};
use rusqlite::{params, Connection};
use tracing::warn;

use crate::backtest::{BacktestReport, PeriodResult};
use crate::lineup::StackConfig;
use crate::pipeline::ScoringPeriod;
use crate::stats::csv_io::parse_date;
use crate::stats::{StatMap, StatRecord, StatTable, StatsError, TableSet};

/// One stored (table, season) pair and its row count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSummary {
    pub name: String,
    pub season: i32,
    pub rows: usize,
}

/// SQLite-backed store for built stat tables (one row per stat line, stats as
/// a JSON object) and per-period backtest results.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open (or create) a SQLite database at `path` and ensure all tables
    /// exist. Pass `":memory:"` for an ephemeral in-memory database.
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open database at {path}"))?;

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA busy_timeout = 5000;",
        )
        .context("failed to set database pragmas")?;

        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS stat_rows (
                table_name TEXT NOT NULL,
                season     INTEGER NOT NULL,
                name       TEXT NOT NULL,
                date       TEXT NOT NULL,
                opponent   TEXT NOT NULL,
                stats      TEXT NOT NULL,
                PRIMARY KEY (table_name, season, name, date)
            );

            CREATE TABLE IF NOT EXISTS backtest_results (
                run_id         TEXT NOT NULL,
                teams_to_stack INTEGER NOT NULL,
                stack_size     INTEGER NOT NULL,
                season         INTEGER NOT NULL,
                week           INTEGER NOT NULL,
                net_return     REAL NOT NULL,
                lineups        INTEGER NOT NULL,
                solver_failed  INTEGER NOT NULL,
                tiered_winnings REAL NOT NULL DEFAULT 0,
                recorded_at    TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
                PRIMARY KEY (run_id, teams_to_stack, stack_size, season, week)
            );
            ",
        )
        .context("failed to create database schema")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Acquire the database connection.
    ///
    /// Panics if the mutex is poisoned (another thread panicked while
    /// holding the lock).
    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().expect("database mutex poisoned")
    }

    // ------------------------------------------------------------------
    // Stat tables
    // ------------------------------------------------------------------

    /// Replace every stored row of `table` for `season` with the table's rows.
    /// Returns the number of rows stored. Rows sharing an (entity, date) key
    /// collapse to the last one, with a warning.
    pub fn store_table(&self, season: i32, table: &StatTable) -> Result<usize> {
        let mut conn = self.conn();
        let tx = conn.transaction().context("failed to begin store transaction")?;

        tx.execute(
            "DELETE FROM stat_rows WHERE table_name = ?1 AND season = ?2",
            params![table.name(), season],
        )
        .context("failed to clear previous table rows")?;

        for row in table.rows() {
            let stats = serde_json::to_string(&row.stats).context("failed to serialize stats")?;
            tx.execute(
                "INSERT OR REPLACE INTO stat_rows (table_name, season, name, date, opponent, stats)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    table.name(),
                    season,
                    row.name,
                    row.date.format("%Y-%m-%d").to_string(),
                    row.opponent,
                    stats,
                ],
            )
            .with_context(|| format!("failed to insert {} row for {}", table.name(), row.name))?;
        }

        let stored: i64 = tx
            .query_row(
                "SELECT COUNT(*) FROM stat_rows WHERE table_name = ?1 AND season = ?2",
                params![table.name(), season],
                |row| row.get(0),
            )
            .context("failed to count stored rows")?;
        let stored = stored as usize;
        if stored < table.len() {
            warn!(
                "{} {}: {} duplicate (name, date) rows overwritten; {} of {} stored",
                table.name(),
                season,
                table.len() - stored,
                stored,
                table.len()
            );
        }

        tx.commit().context("failed to commit table store")?;
        Ok(stored)
    }

    /// Load a table across `seasons` (all stored seasons when empty).
    ///
    /// Fails with [`StatsError::TableNotFound`] (inside the `anyhow` error)
    /// when nothing is stored under `name` for those seasons.
    pub fn load_table(&self, name: &str, seasons: &[i32]) -> Result<StatTable> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(
                "SELECT season, name, date, opponent, stats FROM stat_rows
                 WHERE table_name = ?1 ORDER BY name, date",
            )
            .context("failed to prepare load_table query")?;

        let raw = stmt
            .query_map(params![name], |row| {
                Ok((
                    row.get::<_, i32>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                ))
            })
            .context("failed to query stat rows")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to map stat rows")?;

        let mut rows = Vec::new();
        for (season, entity, date, opponent, stats) in raw {
            if !seasons.is_empty() && !seasons.contains(&season) {
                continue;
            }
            let stats: StatMap = serde_json::from_str(&stats)
                .with_context(|| format!("corrupt stats for {entity} on {date} in {name}"))?;
            let mut record = StatRecord::new(entity, parse_date(&date)?, opponent);
            record.stats = stats;
            rows.push(record);
        }

        if rows.is_empty() {
            return Err(StatsError::TableNotFound {
                table: name.to_string(),
            }
            .into());
        }
        Ok(StatTable::new(name, rows))
    }

    /// Load several tables into one in-memory set. Any missing table is fatal.
    pub fn load_table_set<S: AsRef<str>>(&self, names: &[S], seasons: &[i32]) -> Result<TableSet> {
        let mut set = TableSet::new();
        for name in names {
            set.insert(self.load_table(name.as_ref(), seasons)?);
        }
        Ok(set)
    }

    pub fn list_tables(&self) -> Result<Vec<TableSummary>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(
                "SELECT table_name, season, COUNT(*) FROM stat_rows
                 GROUP BY table_name, season ORDER BY table_name, season",
            )
            .context("failed to prepare list_tables query")?;

        let tables = stmt
            .query_map([], |row| {
                Ok(TableSummary {
                    name: row.get(0)?,
                    season: row.get(1)?,
                    rows: row.get::<_, i64>(2)? as usize,
                })
            })
            .context("failed to query table summary")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to map table summary rows")?;
        Ok(tables)
    }

    // ------------------------------------------------------------------
    // Backtest results
    // ------------------------------------------------------------------

    /// Persist every period of a report under `run_id`. Re-recording the same
    /// run and configuration overwrites it.
    pub fn record_report(&self, run_id: &str, report: &BacktestReport) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn.transaction().context("failed to begin report transaction")?;
        for p in &report.periods {
            tx.execute(
                "INSERT OR REPLACE INTO backtest_results
                    (run_id, teams_to_stack, stack_size, season, week, net_return, lineups,
                     solver_failed, tiered_winnings)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    run_id,
                    report.config.teams_to_stack as i64,
                    report.config.stack_size as i64,
                    p.period.season,
                    p.period.week,
                    p.net_return,
                    p.lineups as i64,
                    p.solver_failed,
                    p.tiered_winnings,
                ],
            )
            .context("failed to record backtest period")?;
        }
        tx.commit().context("failed to commit backtest report")?;
        Ok(())
    }

    /// Reports recorded under `run_id`, one per configuration, periods in
    /// chronological order. Per-team breakdowns are not stored.
    pub fn load_results(&self, run_id: &str) -> Result<Vec<BacktestReport>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(
                "SELECT teams_to_stack, stack_size, season, week, net_return, lineups, solver_failed,
                        tiered_winnings
                 FROM backtest_results WHERE run_id = ?1
                 ORDER BY teams_to_stack, stack_size, season, week",
            )
            .context("failed to prepare load_results query")?;

        let rows = stmt
            .query_map(params![run_id], |row| {
                let config = StackConfig::new(
                    row.get::<_, i64>(0)? as usize,
                    row.get::<_, i64>(1)? as usize,
                );
                let result = PeriodResult {
                    period: ScoringPeriod::new(row.get(2)?, row.get(3)?),
                    net_return: row.get(4)?,
                    lineups: row.get::<_, i64>(5)? as usize,
                    solver_failed: row.get(6)?,
                    tiered_winnings: row.get(7)?,
                    by_team: BTreeMap::new(),
                };
                Ok((config, result))
            })
            .context("failed to query backtest results")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to map backtest result rows")?;

        let mut by_config: BTreeMap<StackConfig, Vec<PeriodResult>> = BTreeMap::new();
        for (config, result) in rows {
            by_config.entry(config).or_default().push(result);
        }
        Ok(by_config
            .into_iter()
            .map(|(config, periods)| BacktestReport { config, periods })
            .collect())
    }

    /// Generate a run id from the current UTC time, e.g. `run_20260228_143022_123`.
    pub fn generate_run_id() -> String {
        chrono::Utc::now().format("run_%Y%m%d_%H%M%S_%3f").to_string()
    }
}
