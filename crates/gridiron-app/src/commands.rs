// Subcommand implementations: stat import, table listing, and backtest runs.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use anyhow::{Context, Result};
use gridiron_core::backtest::{rank_reports, BacktestReport, BacktestSimulator};
use gridiron_core::db::{Database, TableSummary};
use gridiron_core::lineup::{LineupOptimizer, MicroLpSolver};
use gridiron_core::model::RandomForest;
use gridiron_core::pipeline::{ScoringPeriod, WalkForwardPipeline};
use gridiron_core::slate::{self, Slate, StandingsCutoff};
use gridiron_core::stats::build::{build_table, RawTable, TableKind};
use gridiron_core::stats::csv_io::{load_game_scores, load_stat_rows};
use tracing::{info, warn};

use crate::config::Config;

// ---------------------------------------------------------------------------
// Import
// ---------------------------------------------------------------------------

/// Build one season of `kind` from its CSV and store it, replacing any rows
/// already stored for that season.
///
/// `defenseTeam` is derived rather than read: `csv` holds the season's game
/// scores and the opposing offense lines come from the stored `offenseTeam`
/// table, which therefore has to be imported first.
pub fn import_table(db: &Database, kind: TableKind, season: i32, csv: &Path) -> Result<usize> {
    let raw = match kind {
        TableKind::Offense => RawTable::Offense(load_stat_rows(csv)?),
        TableKind::OffenseTeam => RawTable::OffenseTeam(load_stat_rows(csv)?),
        TableKind::DefenseTeam => {
            let offense_team = db
                .load_table(TableKind::OffenseTeam.table_name(), &[season])
                .with_context(|| format!("import offenseTeam for {season} before defenseTeam"))?;
            RawTable::DefenseTeam {
                offense_team,
                scores: load_game_scores(csv)?,
            }
        }
        advanced => RawTable::Advanced(advanced, load_stat_rows(csv)?),
    };

    let table = build_table(raw).with_context(|| format!("failed to build {kind} for {season}"))?;
    let rows = db.store_table(season, &table)?;
    info!("Imported {} rows into {} for season {}", rows, kind, season);
    Ok(rows)
}

pub fn list_tables(db: &Database) -> Result<Vec<TableSummary>> {
    db.list_tables()
}

// ---------------------------------------------------------------------------
// Backtest
// ---------------------------------------------------------------------------

/// Cutoffs from the precomputed file when configured, otherwise derived
/// from full standings with any configured payout tiers attached.
pub fn load_cutoffs(config: &Config) -> Result<BTreeMap<ScoringPeriod, StandingsCutoff>> {
    if let Some(path) = &config.data.cutoffs {
        return slate::load_cutoffs(path)
            .with_context(|| format!("failed to load cutoffs from {}", path.display()));
    }
    if let Some(path) = &config.data.standings {
        let standings = slate::load_standings(path)
            .with_context(|| format!("failed to load standings from {}", path.display()))?;
        let payouts = match &config.data.payouts {
            Some(path) => slate::load_payout_table(path)
                .with_context(|| format!("failed to load payouts from {}", path.display()))?,
            None => Vec::new(),
        };
        return Ok(slate::cutoffs_from_standings(&standings, &payouts));
    }
    Ok(BTreeMap::new())
}

/// Slate periods without a cutoff cannot be scored; drop them up front.
pub fn restrict_to_cutoffs(
    slate: Slate,
    cutoffs: &BTreeMap<ScoringPeriod, StandingsCutoff>,
) -> Slate {
    for period in slate.periods() {
        if !cutoffs.contains_key(&period) {
            warn!("{}: no cutoff, period skipped", period);
        }
    }
    Slate::new(
        slate
            .entries()
            .iter()
            .filter(|e| cutoffs.contains_key(&e.period))
            .cloned()
            .collect(),
    )
}

/// Run the walk-forward predictor over the slate, then backtest every
/// configured stacking strategy. Each report is recorded under `run_id`;
/// the result is ranked best total first.
pub fn run_backtest(db: &Database, config: &Config, run_id: &str) -> Result<Vec<BacktestReport>> {
    let cutoffs = load_cutoffs(config)?;
    let slate = slate::load_slate(&config.data.slate)
        .with_context(|| format!("failed to load slate from {}", config.data.slate.display()))?;
    let slate = restrict_to_cutoffs(slate, &cutoffs);
    if slate.is_empty() {
        anyhow::bail!("no slate period has a payout cutoff");
    }

    let seasons: BTreeSet<i32> = config
        .train_seasons
        .iter()
        .copied()
        .chain(slate.periods().iter().map(|p| p.season))
        .collect();
    let seasons: Vec<i32> = seasons.into_iter().collect();
    let names: Vec<&str> = TableKind::ALL.iter().map(|k| k.table_name()).collect();
    let tables = db
        .load_table_set(&names, &seasons)
        .context("failed to load stat tables")?;
    info!("Loaded {} stat tables for seasons {:?}", names.len(), seasons);

    let feature_config = config.feature_config()?;
    let mut pipeline = WalkForwardPipeline::new(&tables, &feature_config)?;
    let forest = config.model;
    let predictions = pipeline.run(&slate.role_matchups(), |_| RandomForest::new(forest))?;
    info!("Predicted {} periods", predictions.len());

    let mut reports = Vec::with_capacity(config.stacks.len());
    for &stack in &config.stacks {
        let optimizer = LineupOptimizer::new(MicroLpSolver)
            .with_rules(config.roster_rules())
            .with_lineups_per_slate(config.contest.lineups_per_slate);
        let simulator = BacktestSimulator::new(optimizer, config.payout_rule());
        let report = simulator.run(&slate, &predictions, &cutoffs, stack)?;
        db.record_report(run_id, &report)?;
        reports.push(report);
    }

    Ok(rank_reports(&reports).into_iter().cloned().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use gridiron_core::lineup::Position;
    use gridiron_core::slate::SlateEntry;
    use std::fs;
    use std::path::PathBuf;

    fn temp_csv(name: &str, contents: &str) -> PathBuf {
        let dir = std::env::temp_dir().join("gridiron_commands");
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        fs::write(&path, contents).unwrap();
        path
    }

    const OFFENSE_TEAM_CSV: &str = "\
name,date,opp,pass_int,fumbles_lost,sacks_allowed
kc,2019-09-08,jax,0,1,2
jax,2019-09-08,kc,2,0,4
";

    const SCORES_CSV: &str = "\
date,home,away,home_score,away_score
2019-09-08,JAX,KC,26,40
";

    // -- import --

    #[test]
    fn defense_team_derives_from_stored_offense_team() {
        let db = Database::open(":memory:").unwrap();
        let offense = temp_csv("offense_team.csv", OFFENSE_TEAM_CSV);
        let scores = temp_csv("scores.csv", SCORES_CSV);

        assert_eq!(import_table(&db, TableKind::OffenseTeam, 2019, &offense).unwrap(), 2);
        assert_eq!(import_table(&db, TableKind::DefenseTeam, 2019, &scores).unwrap(), 2);

        let defense = db.load_table("defenseTeam", &[2019]).unwrap();
        let date = NaiveDate::from_ymd_opt(2019, 9, 8).unwrap();
        let kc = defense.find("KC", date).unwrap();
        assert_eq!(kc.stat("pts_allowed"), Some(26.0));
        assert_eq!(kc.stat("pass_int"), Some(2.0));

        let summaries = list_tables(&db).unwrap();
        assert_eq!(summaries.len(), 2);
    }

    #[test]
    fn defense_team_requires_offense_team_first() {
        let db = Database::open(":memory:").unwrap();
        let scores = temp_csv("scores_only.csv", SCORES_CSV);
        let err = import_table(&db, TableKind::DefenseTeam, 2019, &scores).unwrap_err();
        assert!(format!("{err:#}").contains("offenseTeam"));
    }

    #[test]
    fn reimport_replaces_season() {
        let db = Database::open(":memory:").unwrap();
        let offense = temp_csv("offense_team_twice.csv", OFFENSE_TEAM_CSV);
        import_table(&db, TableKind::OffenseTeam, 2019, &offense).unwrap();
        import_table(&db, TableKind::OffenseTeam, 2019, &offense).unwrap();
        assert_eq!(db.load_table("offenseTeam", &[2019]).unwrap().len(), 2);
    }

    // -- cutoffs --

    #[test]
    fn derived_cutoffs_carry_configured_payout_tiers() {
        let tmp = std::env::temp_dir().join("gridiron_commands_payouts");
        let _ = fs::remove_dir_all(&tmp);
        fs::create_dir_all(tmp.join("config")).unwrap();
        fs::create_dir_all(tmp.join("data")).unwrap();
        fs::write(
            tmp.join("config").join("gridiron.toml"),
            r#"
[data]
slate = "data/slate.csv"
standings = "data/standings.csv"
payouts = "data/payouts.csv"

[seasons]
train = [2019]

[seasons.start_dates]
2019 = "2019-09-05"

[[stacks]]
teams = 1
size = 2
"#,
        )
        .unwrap();
        fs::write(
            tmp.join("data").join("standings.csv"),
            "season,week,rank,points\n\
             2019,1,1,150\n2019,1,2,140\n2019,1,3,130\n2019,1,4,120\n2019,1,5,110\n",
        )
        .unwrap();
        fs::write(
            tmp.join("data").join("payouts.csv"),
            "max_rank,payout\n1,50\n3,5\n",
        )
        .unwrap();

        let config = crate::config::load_config_from(&tmp).unwrap();
        let cutoffs = load_cutoffs(&config).unwrap();
        let week1 = &cutoffs[&ScoringPeriod::new(2019, 1)];
        assert_eq!(week1.points, 140.0);
        assert_eq!(week1.tiers.len(), 2);
        assert_eq!(week1.tiered_payout(151.0), 50.0);
        assert_eq!(week1.tiered_payout(135.0), 5.0);
        assert_eq!(week1.tiered_payout(129.0), 0.0);

        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn periods_without_cutoff_are_dropped() {
        let entry = |week| SlateEntry {
            period: ScoringPeriod::new(2019, week),
            date: NaiveDate::from_ymd_opt(2019, 9, 8).unwrap(),
            name: "KC".into(),
            position: Position::Defense,
            team: "KC".into(),
            opponent: "JAX".into(),
            salary: 3000.0,
            fantasy_points: Some(9.0),
        };
        let slate = Slate::new(vec![entry(1), entry(2), entry(3)]);
        let mut cutoffs = BTreeMap::new();
        for week in [1, 3] {
            let period = ScoringPeriod::new(2019, week);
            cutoffs.insert(period, StandingsCutoff::new(period, 120.0));
        }

        let kept = restrict_to_cutoffs(slate, &cutoffs);
        assert_eq!(
            kept.periods(),
            vec![ScoringPeriod::new(2019, 1), ScoringPeriod::new(2019, 3)]
        );
    }
}
