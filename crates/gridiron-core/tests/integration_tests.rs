// Integration tests for gridiron-core.
//
// These exercise the full flow through the public API: stat tables built and
// stored in SQLite, walk-forward predictions, stacked lineup generation, and
// the contest backtest over a small synthetic season.

use std::collections::BTreeMap;

use chrono::{Duration, NaiveDate};

use gridiron_core::backtest::{BacktestSimulator, PayoutRule};
use gridiron_core::db::Database;
use gridiron_core::features::{FeatureConfig, Role};
use gridiron_core::lineup::{LineupOptimizer, MicroLpSolver, Position, RosterRules, StackConfig};
use gridiron_core::model::{ForestConfig, RandomForest};
use gridiron_core::pipeline::{PredictionsByPeriod, ScoringPeriod, WalkForwardPipeline};
use gridiron_core::slate::{Slate, SlateEntry, StandingsCutoff};
use gridiron_core::stats::build::{build_table, GameScore, RawTable, TableKind};
use gridiron_core::stats::scoring::FANTASY_POINTS;
use gridiron_core::stats::{StatRecord, StatTable, TableSet};

// ===========================================================================
// Synthetic season
// ===========================================================================

const SEASON: i32 = 2019;
const WEEKS: u32 = 6;
const TEAMS: [&str; 4] = ["ARI", "BAL", "CHI", "DAL"];

/// Roster slots every team fields each week.
const ROSTER: [(&str, Position); 8] = [
    ("QB", Position::Quarterback),
    ("RB1", Position::RunningBack),
    ("RB2", Position::RunningBack),
    ("WR1", Position::WideReceiver),
    ("WR2", Position::WideReceiver),
    ("WR3", Position::WideReceiver),
    ("TE1", Position::TightEnd),
    ("TE2", Position::TightEnd),
];

fn game_date(week: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(SEASON, 9, 8).unwrap() + Duration::weeks(i64::from(week) - 1)
}

/// Round-robin pairings rotating every week.
fn opponent(team: usize, week: u32) -> usize {
    match week % 3 {
        0 => team ^ 1,
        1 => team ^ 2,
        _ => 3 - team,
    }
}

fn player_name(team: &str, slot: &str) -> String {
    format!("{team}{slot}")
}

/// Deterministic variation in [0, 9).
fn wobble(a: usize, b: u32) -> f64 {
    ((a * 7 + b as usize * 3) % 9) as f64
}

/// Stat tables for the synthetic season. `late_boost` scales every stat of
/// the final week.
fn season_tables(late_boost: f64) -> Vec<StatTable> {
    let mut offense = Vec::new();
    let mut offense_team = Vec::new();
    let mut passing = Vec::new();
    let mut rushing = Vec::new();
    let mut receiving = Vec::new();
    let mut scores = Vec::new();

    for week in 1..=WEEKS {
        let date = game_date(week);
        let scale = if week == WEEKS { late_boost } else { 1.0 };

        for (t, team) in TEAMS.iter().enumerate() {
            let opp = TEAMS[opponent(t, week)];
            for (s, (slot, position)) in ROSTER.iter().enumerate() {
                let w = wobble(t * 10 + s, week);
                let mut row = StatRecord::new(player_name(team, slot), date, opp);
                let mut set = |k: &str, v: f64| {
                    row.stats.insert(k.to_string(), Some(v * scale));
                };
                match position {
                    Position::Quarterback => {
                        set("pass_att", 30.0 + w);
                        set("pass_yds", 200.0 + 15.0 * w);
                        set("pass_td", (w / 3.0).floor());
                        set("rush_yds", 5.0 + w);
                    }
                    Position::RunningBack => {
                        set("pass_att", 0.0);
                        set("rush_yds", 40.0 + 8.0 * w);
                        set("rush_td", (w / 4.0).floor());
                        set("rec", 1.0 + (w / 3.0).floor());
                        set("rec_yds", 10.0 + w);
                    }
                    _ => {
                        set("pass_att", 0.0);
                        set("rec", 2.0 + (w / 2.0).floor());
                        set("rec_yds", 25.0 + 9.0 * w);
                        set("rec_td", (w / 5.0).floor());
                    }
                }

                let mut adv = StatRecord::new(player_name(team, slot), date, opp);
                match position {
                    Position::Quarterback => {
                        adv.stats.insert("air_yards".into(), Some(150.0 + 10.0 * w * scale));
                        passing.push(adv);
                    }
                    Position::RunningBack => {
                        adv.stats.insert("yds_after_contact".into(), Some(20.0 + w * scale));
                        rushing.push(adv);
                    }
                    _ => {
                        adv.stats.insert("targets".into(), Some(4.0 + w * scale));
                        receiving.push(adv);
                    }
                }
                offense.push(row);
            }

            let w = wobble(t, week);
            let mut team_row = StatRecord::new(*team, date, opp);
            for (k, v) in [
                ("pass_int", (w / 4.0).floor()),
                ("fumbles_lost", (w / 6.0).floor()),
                ("sacks_allowed", 1.0 + (w / 2.0).floor()),
                ("rush_yds", 80.0 + 10.0 * w),
            ] {
                team_row.stats.insert(k.to_string(), Some(v * scale));
            }
            offense_team.push(team_row);

            if t < opponent(t, week) {
                scores.push(GameScore {
                    date,
                    home: team.to_string(),
                    away: opp.to_string(),
                    home_score: 17.0 + wobble(t, week) * scale,
                    away_score: 14.0 + wobble(t + 1, week) * scale,
                });
            }
        }
    }

    let offense_team = build_table(RawTable::OffenseTeam(offense_team)).unwrap();
    let defense_team = build_table(RawTable::DefenseTeam {
        offense_team: offense_team.clone(),
        scores,
    })
    .unwrap();

    vec![
        build_table(RawTable::Offense(offense)).unwrap(),
        offense_team,
        defense_team,
        build_table(RawTable::Advanced(TableKind::AdvancedPassing, passing)).unwrap(),
        build_table(RawTable::Advanced(TableKind::AdvancedRushing, rushing)).unwrap(),
        build_table(RawTable::Advanced(TableKind::AdvancedReceiving, receiving)).unwrap(),
    ]
}

/// Store the season in a fresh in-memory database and load it back.
fn stored_tables(late_boost: f64) -> (Database, TableSet) {
    let db = Database::open(":memory:").unwrap();
    for table in season_tables(late_boost) {
        assert!(db.store_table(SEASON, &table).unwrap() > 0);
    }
    let names: Vec<&str> = TableKind::ALL.iter().map(|k| k.table_name()).collect();
    let tables = db.load_table_set(&names, &[SEASON]).unwrap();
    (db, tables)
}

/// Slate for the last two weeks, with realized points from the tables.
fn slate(tables: &TableSet) -> Slate {
    let offense = tables.get("offense").unwrap();
    let defense = tables.get("defenseTeam").unwrap();
    let mut entries = Vec::new();

    for week in WEEKS - 1..=WEEKS {
        let date = game_date(week);
        let period = ScoringPeriod::new(SEASON, week);
        for (t, team) in TEAMS.iter().enumerate() {
            let opp = TEAMS[opponent(t, week)];
            for (slot, position) in ROSTER {
                let name = player_name(team, slot);
                let salary = match position {
                    Position::Quarterback => 6000.0,
                    _ => 5000.0,
                };
                let points = offense.find(&name, date).and_then(|r| r.stat(FANTASY_POINTS));
                entries.push(SlateEntry {
                    period,
                    date,
                    name,
                    position,
                    team: team.to_string(),
                    opponent: opp.to_string(),
                    salary,
                    fantasy_points: points,
                });
            }
            entries.push(SlateEntry {
                period,
                date,
                name: team.to_string(),
                position: Position::Defense,
                team: team.to_string(),
                opponent: opp.to_string(),
                salary: 3000.0,
                fantasy_points: defense.find(team, date).and_then(|r| r.stat(FANTASY_POINTS)),
            });
        }
    }
    Slate::new(entries)
}

fn feature_config() -> FeatureConfig {
    FeatureConfig::new(NaiveDate::from_ymd_opt(SEASON, 9, 1).unwrap())
}

fn forest() -> RandomForest {
    RandomForest::new(ForestConfig {
        n_trees: 12,
        seed: 7,
        ..ForestConfig::default()
    })
}

fn predict(tables: &TableSet, slate: &Slate) -> PredictionsByPeriod {
    let mut pipeline = WalkForwardPipeline::new(tables, &feature_config()).unwrap();
    pipeline.run(&slate.role_matchups(), |_| forest()).unwrap()
}

// ===========================================================================
// Walk-forward predictions
// ===========================================================================

#[test]
fn every_slate_entry_gets_a_prediction() {
    let (_db, tables) = stored_tables(1.0);
    let slate = slate(&tables);
    let predictions = predict(&tables, &slate);

    assert_eq!(predictions.len(), 2);
    for period in slate.periods() {
        let scores = &predictions[&period];
        assert_eq!(scores.len(), slate.period_entries(period).len());
        assert!(scores.values().all(|p| p.is_finite()));
    }
}

#[test]
fn later_results_do_not_change_earlier_predictions() {
    let (_db, tables) = stored_tables(1.0);
    let (_db_boosted, boosted) = stored_tables(3.0);

    let baseline = predict(&tables, &slate(&tables));
    let changed = predict(&boosted, &slate(&boosted));

    let earlier = ScoringPeriod::new(SEASON, WEEKS - 1);
    assert_eq!(baseline[&earlier], changed[&earlier]);
}

#[test]
fn training_space_only_holds_earlier_games() {
    let (_db, tables) = stored_tables(1.0);
    let mut pipeline = WalkForwardPipeline::new(&tables, &feature_config()).unwrap();
    let cutoff = game_date(4);

    for role in Role::ALL {
        let space = pipeline.training_space(role, cutoff);
        assert!(!space.is_empty(), "{role} has no history");
        assert!(space.rows().iter().all(|r| r.date < cutoff));
        assert!(space.rows().iter().all(|r| r.target.is_some()));
    }
}

#[test]
fn predictions_are_reproducible() {
    let (_db, tables) = stored_tables(1.0);
    let slate = slate(&tables);
    assert_eq!(predict(&tables, &slate), predict(&tables, &slate));
}

// ===========================================================================
// Lineups and backtest
// ===========================================================================

#[test]
fn stacked_lineups_are_valid_and_distinct() {
    let (_db, tables) = stored_tables(1.0);
    let slate = slate(&tables);
    let predictions = predict(&tables, &slate);
    let period = ScoringPeriod::new(SEASON, WEEKS);
    let pool = slate.player_pool(period, &predictions[&period]);
    assert_eq!(pool.len(), TEAMS.len() * 9);

    let rules = RosterRules::default();
    let optimizer = LineupOptimizer::new(MicroLpSolver)
        .with_rules(rules.clone())
        .with_lineups_per_slate(6);
    let by_team = optimizer.optimize(&pool, StackConfig::new(2, 2)).unwrap();
    assert_eq!(by_team.len(), 2);

    for (team, lineups) in &by_team {
        assert_eq!(lineups.len(), 3);
        for (i, lineup) in lineups.iter().enumerate() {
            rules.validate(&lineup.players().iter().collect::<Vec<_>>()).unwrap();
            assert!(lineup
                .players()
                .iter()
                .any(|p| p.team == *team && p.position == Position::Quarterback));
            for prior in &lineups[..i] {
                assert!(lineup.overlap(prior) < rules.roster_size);
            }
        }
    }
}

#[test]
fn backtest_scores_each_period_and_records_results() {
    let (db, tables) = stored_tables(1.0);
    let slate = slate(&tables);
    let predictions = predict(&tables, &slate);

    let cutoffs: BTreeMap<ScoringPeriod, StandingsCutoff> = slate
        .periods()
        .into_iter()
        .map(|p| (p, StandingsCutoff::new(p, 110.0)))
        .collect();

    let optimizer = LineupOptimizer::new(MicroLpSolver).with_lineups_per_slate(4);
    let simulator = BacktestSimulator::new(optimizer, PayoutRule::default());
    let config = StackConfig::new(1, 3);
    let report = simulator.run(&slate, &predictions, &cutoffs, config).unwrap();

    assert_eq!(report.periods.len(), 2);
    assert_eq!(report.failures(), 0);
    assert_eq!(report.lineups(), 8);
    for period in &report.periods {
        // four lineups at +/-20 each
        assert_eq!(period.net_return.rem_euclid(40.0), 0.0);
        assert!(period.net_return.abs() <= 80.0);
    }

    db.record_report("run_test", &report).unwrap();
    let loaded = db.load_results("run_test").unwrap();
    assert_eq!(loaded.len(), 1);
    assert_eq!(loaded[0].config, config);
    assert_eq!(loaded[0].total(), report.total());
}
