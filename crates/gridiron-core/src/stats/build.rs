// Table builds. Every stat table kind is produced by the same function over
// tagged raw inputs, so callers never need to know how a kind is derived.

use std::collections::HashSet;
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::scoring::{self, FANTASY_POINTS};
use super::{StatRecord, StatTable, StatsError};

/// Every stat table the feature builders know how to consume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TableKind {
    Offense,
    OffenseTeam,
    DefenseTeam,
    AdvancedPassing,
    AdvancedRushing,
    AdvancedReceiving,
}

impl TableKind {
    pub const ALL: [TableKind; 6] = [
        TableKind::Offense,
        TableKind::OffenseTeam,
        TableKind::DefenseTeam,
        TableKind::AdvancedPassing,
        TableKind::AdvancedRushing,
        TableKind::AdvancedReceiving,
    ];

    /// The name the table is stored and looked up under.
    pub fn table_name(&self) -> &'static str {
        match self {
            TableKind::Offense => "offense",
            TableKind::OffenseTeam => "offenseTeam",
            TableKind::DefenseTeam => "defenseTeam",
            TableKind::AdvancedPassing => "advancedPassing",
            TableKind::AdvancedRushing => "advancedRushing",
            TableKind::AdvancedReceiving => "advancedReceiving",
        }
    }

    /// Parse either the stored table name (`offenseTeam`) or its kebab-case
    /// CLI spelling (`offense-team`).
    pub fn from_name(s: &str) -> Option<Self> {
        let folded: String = s
            .chars()
            .filter(|c| *c != '-' && *c != '_')
            .collect::<String>()
            .to_lowercase();
        Self::ALL
            .into_iter()
            .find(|kind| kind.table_name().to_lowercase() == folded)
    }

    pub fn is_advanced(&self) -> bool {
        matches!(
            self,
            TableKind::AdvancedPassing | TableKind::AdvancedRushing | TableKind::AdvancedReceiving
        )
    }
}

impl fmt::Display for TableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table_name())
    }
}

/// Final score of one game.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameScore {
    pub date: NaiveDate,
    pub home: String,
    pub away: String,
    pub home_score: f64,
    pub away_score: f64,
}

impl GameScore {
    /// Points scored by `team` in this game, if it played in it.
    pub fn points_for(&self, team: &str) -> Option<f64> {
        if self.home == team {
            Some(self.home_score)
        } else if self.away == team {
            Some(self.away_score)
        } else {
            None
        }
    }
}

/// Raw inputs for one table build, tagged by the kind they produce.
#[derive(Debug, Clone)]
pub enum RawTable {
    /// Player box score lines.
    Offense(Vec<StatRecord>),
    /// Team box score lines (entity = team abbreviation).
    OffenseTeam(Vec<StatRecord>),
    /// Team defense is derived from the opponents' team offense lines.
    DefenseTeam {
        offense_team: StatTable,
        scores: Vec<GameScore>,
    },
    /// Advanced passing/rushing/receiving player lines.
    Advanced(TableKind, Vec<StatRecord>),
}

impl RawTable {
    pub fn kind(&self) -> TableKind {
        match self {
            RawTable::Offense(_) => TableKind::Offense,
            RawTable::OffenseTeam(_) => TableKind::OffenseTeam,
            RawTable::DefenseTeam { .. } => TableKind::DefenseTeam,
            RawTable::Advanced(kind, _) => *kind,
        }
    }
}

/// Normalize a player name for joins across sources: upper case, no spaces.
pub fn normalize_name(name: &str) -> String {
    name.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_uppercase)
        .collect()
}

/// Normalize a team abbreviation: trimmed, upper case.
pub fn normalize_team(team: &str) -> String {
    team.trim().to_uppercase()
}

/// Build a stat table from its raw inputs.
pub fn build_table(raw: RawTable) -> Result<StatTable, StatsError> {
    let kind = raw.kind();
    let table = match raw {
        RawTable::Offense(rows) => {
            let rows = rows
                .into_iter()
                .map(|mut row| {
                    row.name = normalize_name(&row.name);
                    row.opponent = normalize_team(&row.opponent);
                    let points = scoring::offense_fantasy_points(&row);
                    row.stats.insert(FANTASY_POINTS.to_string(), Some(points));
                    row
                })
                .collect();
            StatTable::new(kind.table_name(), rows)
        }
        RawTable::OffenseTeam(rows) => {
            let rows = rows
                .into_iter()
                .map(|mut row| {
                    row.name = normalize_team(&row.name);
                    row.opponent = normalize_team(&row.opponent);
                    row
                })
                .collect();
            StatTable::new(kind.table_name(), rows)
        }
        RawTable::DefenseTeam {
            offense_team,
            scores,
        } => derive_defense(&offense_team, &scores),
        RawTable::Advanced(kind, rows) => {
            if !kind.is_advanced() {
                return Err(StatsError::Validation(format!(
                    "`{kind}` is not an advanced stat table"
                )));
            }
            let rows = rows
                .into_iter()
                .map(|mut row| {
                    row.name = normalize_name(&row.name);
                    row.opponent = normalize_team(&row.opponent);
                    row
                })
                .collect();
            StatTable::new(kind.table_name(), rows)
        }
    };
    debug!("built `{}` table with {} rows", kind, table.len());
    Ok(table)
}

/// One defense row per (team, game): the opponent's offensive line for that
/// game, the points the opponent scored, and the resulting fantasy points.
fn derive_defense(offense_team: &StatTable, scores: &[GameScore]) -> StatTable {
    let mut seen: HashSet<(String, NaiveDate)> = HashSet::new();
    let mut rows = Vec::new();

    for team_row in offense_team.rows() {
        if !seen.insert((team_row.name.clone(), team_row.date)) {
            continue;
        }

        let mut row = StatRecord::new(&team_row.name, team_row.date, &team_row.opponent);
        match offense_team.find(&team_row.opponent, team_row.date) {
            Some(opp) => row.stats = opp.stats.clone(),
            None => warn!(
                "no offense line for {} on {}; defense row for {} has no stats",
                team_row.opponent, team_row.date, team_row.name
            ),
        }

        let pts_allowed = scores
            .iter()
            .filter(|g| g.date == team_row.date)
            .find_map(|g| g.points_for(&team_row.opponent));
        row.stats.insert("pts_allowed".to_string(), pts_allowed);

        let fantasy = pts_allowed.map(|pts| {
            scoring::defense_fantasy_points(
                row.stat_or_zero("sacks_allowed"),
                row.stat_or_zero("pass_int"),
                row.stat_or_zero("fumbles_lost"),
                pts,
            )
        });
        row.stats.insert(
            "pts_allowed_score".to_string(),
            pts_allowed.map(scoring::points_allowed_score),
        );
        row.stats.insert(FANTASY_POINTS.to_string(), fantasy);
        rows.push(row);
    }

    StatTable::new(TableKind::DefenseTeam.table_name(), rows)
}
