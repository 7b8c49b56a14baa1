// Slates, contest standings and payout cutoffs.
//
// A slate CSV lists every player available in each scoring period with their
// salary and (for past periods) realized fantasy points. Cutoff and standings
// CSVs describe what a lineup needed to score to cash.

use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::features::{Matchup, Role};
use crate::lineup::{Player, Position};
use crate::pipeline::{group_by_period, RoleMatchup, ScoringPeriod};
use crate::stats::build::{normalize_name, normalize_team};
use crate::stats::csv_io::parse_date;
use crate::stats::StatsError;

/// Standings fraction that cashes in a double-up contest.
pub const DOUBLE_UP_FRACTION: f64 = 0.4;

// ---------------------------------------------------------------------------
// Slate entries
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct SlateEntry {
    pub period: ScoringPeriod,
    pub date: NaiveDate,
    pub name: String,
    pub position: Position,
    pub team: String,
    pub opponent: String,
    pub salary: f64,
    pub fantasy_points: Option<f64>,
}

impl SlateEntry {
    /// Predictor line that scores this entry.
    pub fn role(&self) -> Role {
        match self.position {
            Position::Quarterback => Role::Passer,
            Position::Defense => Role::TeamDefense,
            _ => Role::SkillPlayer,
        }
    }

    pub fn matchup(&self) -> Matchup {
        Matchup {
            name: self.name.clone(),
            date: self.date,
            opponent: self.opponent.clone(),
            target: self.fantasy_points,
        }
    }

    pub fn to_player(&self, predicted: f64) -> Player {
        Player {
            name: self.name.clone(),
            position: self.position,
            team: self.team.clone(),
            opponent: self.opponent.clone(),
            salary: self.salary,
            predicted,
            realized: self.fantasy_points,
        }
    }
}

/// Every slate entry across all periods.
#[derive(Debug, Clone, Default)]
pub struct Slate {
    entries: Vec<SlateEntry>,
}

impl Slate {
    pub fn new(entries: Vec<SlateEntry>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[SlateEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Periods present, in chronological order.
    pub fn periods(&self) -> Vec<ScoringPeriod> {
        let mut periods: Vec<ScoringPeriod> = self.entries.iter().map(|e| e.period).collect();
        periods.sort();
        periods.dedup();
        periods
    }

    pub fn period_entries(&self, period: ScoringPeriod) -> Vec<&SlateEntry> {
        self.entries.iter().filter(|e| e.period == period).collect()
    }

    /// Matchups to score, grouped by period, with realized points stripped
    /// so they can never reach a predictor as inputs.
    pub fn role_matchups(&self) -> BTreeMap<ScoringPeriod, Vec<RoleMatchup>> {
        group_by_period(&self.entries, |e| e.period)
            .into_iter()
            .map(|(period, entries)| {
                let matchups = entries
                    .into_iter()
                    .map(|e| RoleMatchup {
                        role: e.role(),
                        matchup: Matchup {
                            target: None,
                            ..e.matchup()
                        },
                    })
                    .collect();
                (period, matchups)
            })
            .collect()
    }

    /// The player pool for one period. Entries with no prediction are
    /// dropped.
    pub fn player_pool(
        &self,
        period: ScoringPeriod,
        predictions: &BTreeMap<String, f64>,
    ) -> Vec<Player> {
        let mut dropped = 0usize;
        let pool: Vec<Player> = self
            .period_entries(period)
            .into_iter()
            .filter_map(|e| match predictions.get(&e.name) {
                Some(&predicted) => Some(e.to_player(predicted)),
                None => {
                    dropped += 1;
                    None
                }
            })
            .collect();
        if dropped > 0 {
            warn!("{}: dropped {} slate entries with no prediction", period, dropped);
        }
        pool
    }
}

// ---------------------------------------------------------------------------
// Contest standings and cutoffs
// ---------------------------------------------------------------------------

/// Points needed to reach one payout tier.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PayoutTier {
    /// Lowest finishing rank that still pays this tier.
    pub max_rank: u32,
    pub points: f64,
    pub payout: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandingsCutoff {
    pub period: ScoringPeriod,
    /// Double-up threshold: realized points needed to cash.
    pub points: f64,
    pub tiers: Vec<PayoutTier>,
}

impl StandingsCutoff {
    pub fn new(period: ScoringPeriod, points: f64) -> Self {
        Self {
            period,
            points,
            tiers: Vec::new(),
        }
    }

    pub fn with_tiers(mut self, tiers: Vec<PayoutTier>) -> Self {
        self.tiers = tiers;
        self
    }

    /// Payout of the best tier `score` reaches, or zero.
    pub fn tiered_payout(&self, score: f64) -> f64 {
        self.tiers
            .iter()
            .filter(|t| score >= t.points)
            .map(|t| t.payout)
            .fold(0.0, f64::max)
    }
}

/// One row of final contest standings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ContestEntry {
    pub rank: u32,
    pub points: f64,
}

/// Points of the last entry ranked within the top `fraction` of the field.
/// The field size is the last finishing rank, so trailing ties count once
/// per rank rather than once per entry.
pub fn doubleup_cutoff(entries: &[ContestEntry], fraction: f64) -> Option<f64> {
    let field = entries.iter().map(|e| e.rank).max()?;
    let limit = (f64::from(field) * fraction).floor() as u32;
    last_within_rank(entries, limit)
}

/// For each `(max_rank, payout)` pair, the points needed to finish at or
/// above `max_rank`. Pairs no entry reaches are skipped.
pub fn payout_tiers(entries: &[ContestEntry], payout_table: &[(u32, f64)]) -> Vec<PayoutTier> {
    payout_table
        .iter()
        .filter_map(|&(max_rank, payout)| {
            last_within_rank(entries, max_rank).map(|points| PayoutTier {
                max_rank,
                points,
                payout,
            })
        })
        .collect()
}

fn last_within_rank(entries: &[ContestEntry], max_rank: u32) -> Option<f64> {
    entries
        .iter()
        .filter(|e| e.rank <= max_rank)
        .max_by_key(|e| e.rank)
        .map(|e| e.points)
}

/// Double-up cutoffs for every period with standings, each carrying the
/// tiers of `payout_table` (`(max_rank, payout)` pairs; may be empty).
pub fn cutoffs_from_standings(
    standings: &BTreeMap<ScoringPeriod, Vec<ContestEntry>>,
    payout_table: &[(u32, f64)],
) -> BTreeMap<ScoringPeriod, StandingsCutoff> {
    standings
        .iter()
        .filter_map(|(&period, entries)| {
            let Some(points) = doubleup_cutoff(entries, DOUBLE_UP_FRACTION) else {
                warn!("{}: standings too small for a double-up cutoff", period);
                return None;
            };
            let cutoff = StandingsCutoff::new(period, points)
                .with_tiers(payout_tiers(entries, payout_table));
            Some((period, cutoff))
        })
        .collect()
}

// ---------------------------------------------------------------------------
// CSV loading
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct RawSlateRow {
    season: i32,
    week: u32,
    date: String,
    name: String,
    position: String,
    team: String,
    opponent: String,
    salary: f64,
    #[serde(default)]
    fantasy_points: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct RawCutoffRow {
    season: i32,
    week: u32,
    points: f64,
}

#[derive(Debug, Deserialize)]
struct RawStandingsRow {
    season: i32,
    week: u32,
    rank: u32,
    points: f64,
}

fn slate_from_reader<R: Read>(rdr: R, path: &str) -> Result<Slate, StatsError> {
    let mut reader = csv::Reader::from_reader(rdr);
    let mut entries = Vec::new();
    for result in reader.deserialize::<RawSlateRow>() {
        let raw = match result {
            Ok(r) => r,
            Err(e) => {
                warn!("skipping malformed slate row in {}: {}", path, e);
                continue;
            }
        };
        let Some(position) = Position::from_str_pos(&raw.position) else {
            warn!("skipping {} with unsupported position '{}'", raw.name, raw.position);
            continue;
        };
        let date = match parse_date(&raw.date) {
            Ok(d) => d,
            Err(e) => {
                warn!("skipping slate row for {}: {}", raw.name, e);
                continue;
            }
        };
        let team = normalize_team(&raw.team);
        // Team defenses are keyed by team abbreviation in the stat tables.
        let name = if position == Position::Defense {
            team.clone()
        } else {
            normalize_name(&raw.name)
        };
        entries.push(SlateEntry {
            period: ScoringPeriod::new(raw.season, raw.week),
            date,
            name,
            position,
            team,
            opponent: normalize_team(&raw.opponent),
            salary: raw.salary,
            fantasy_points: raw.fantasy_points,
        });
    }
    Ok(Slate::new(entries))
}

fn cutoffs_from_reader<R: Read>(
    rdr: R,
    path: &str,
) -> Result<BTreeMap<ScoringPeriod, StandingsCutoff>, StatsError> {
    let mut reader = csv::Reader::from_reader(rdr);
    let mut cutoffs = BTreeMap::new();
    for result in reader.deserialize::<RawCutoffRow>() {
        match result {
            Ok(raw) => {
                let period = ScoringPeriod::new(raw.season, raw.week);
                cutoffs.insert(period, StandingsCutoff::new(period, raw.points));
            }
            Err(e) => warn!("skipping malformed cutoff row in {}: {}", path, e),
        }
    }
    Ok(cutoffs)
}

fn standings_from_reader<R: Read>(
    rdr: R,
    path: &str,
) -> Result<BTreeMap<ScoringPeriod, Vec<ContestEntry>>, StatsError> {
    let mut reader = csv::Reader::from_reader(rdr);
    let mut standings: BTreeMap<ScoringPeriod, Vec<ContestEntry>> = BTreeMap::new();
    for result in reader.deserialize::<RawStandingsRow>() {
        match result {
            Ok(raw) => standings
                .entry(ScoringPeriod::new(raw.season, raw.week))
                .or_default()
                .push(ContestEntry {
                    rank: raw.rank,
                    points: raw.points,
                }),
            Err(e) => warn!("skipping malformed standings row in {}: {}", path, e),
        }
    }
    Ok(standings)
}

#[derive(Debug, Deserialize)]
struct RawPayoutRow {
    max_rank: u32,
    payout: f64,
}

fn payout_table_from_reader<R: Read>(rdr: R, path: &str) -> Result<Vec<(u32, f64)>, StatsError> {
    let mut reader = csv::Reader::from_reader(rdr);
    let mut table = Vec::new();
    for result in reader.deserialize::<RawPayoutRow>() {
        match result {
            Ok(raw) => table.push((raw.max_rank, raw.payout)),
            Err(e) => warn!("skipping malformed payout row in {}: {}", path, e),
        }
    }
    table.sort_by_key(|&(rank, _)| rank);
    Ok(table)
}

fn open(path: &Path) -> Result<std::fs::File, StatsError> {
    std::fs::File::open(path).map_err(|e| StatsError::Io {
        path: path.display().to_string(),
        source: e,
    })
}

/// Load a slate (`season,week,date,name,position,team,opponent,salary,fantasy_points`).
pub fn load_slate(path: &Path) -> Result<Slate, StatsError> {
    slate_from_reader(open(path)?, &path.display().to_string())
}

/// Load double-up cutoffs (`season,week,points`).
pub fn load_cutoffs(path: &Path) -> Result<BTreeMap<ScoringPeriod, StandingsCutoff>, StatsError> {
    cutoffs_from_reader(open(path)?, &path.display().to_string())
}

/// Load full contest standings (`season,week,rank,points`).
pub fn load_standings(
    path: &Path,
) -> Result<BTreeMap<ScoringPeriod, Vec<ContestEntry>>, StatsError> {
    standings_from_reader(open(path)?, &path.display().to_string())
}

/// Load a contest payout table (`max_rank,payout`), sorted by rank.
pub fn load_payout_table(path: &Path) -> Result<Vec<(u32, f64)>, StatsError> {
    payout_table_from_reader(open(path)?, &path.display().to_string())
}
