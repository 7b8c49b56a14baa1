// Per-role feature space construction.
//
// A feature vector for a matchup is the as-of aggregate of the entity's own
// tables (prefixed, e.g. `o_`) followed by the as-of aggregate of the
// opponent's table (prefixed, e.g. `d_`). When two tables produce the same
// prefixed name, the first table in precedence order wins.

use std::fmt;

use chrono::NaiveDate;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::asof::{AsOfAggregator, HISTORY_WINDOW};
use super::space::{FeatureSpace, FeatureVector, Matchup};
use super::FeatureError;
use crate::stats::build::TableKind;
use crate::stats::scoring::FANTASY_POINTS;
use crate::stats::{StatMap, StatRecord, StatTable, TableSet};

/// Player roles with structurally different feature schemas. Each role gets
/// its own independently trained predictor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Role {
    Passer,
    SkillPlayer,
    TeamDefense,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Passer, Role::SkillPlayer, Role::TeamDefense];

    /// Heuristic used to pick a role's historical rows out of its base table.
    pub fn selects(&self, row: &StatRecord) -> bool {
        match self {
            Role::Passer => row.stat("pass_att").is_some_and(|att| att > 10.0),
            Role::SkillPlayer => row.stat("pass_att").is_some_and(|att| att <= 1.0),
            Role::TeamDefense => true,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Role::Passer => "passer",
            Role::SkillPlayer => "skill player",
            Role::TeamDefense => "team defense",
        };
        f.write_str(s)
    }
}

/// Which tables feed a role's feature vectors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleSpec {
    pub role: Role,
    /// Tables queried for the matchup's own entity, in precedence order. The
    /// first one is the base table default matchups are drawn from.
    pub subject_tables: Vec<String>,
    pub subject_prefix: String,
    /// Table queried for the matchup's opponent.
    pub opponent_table: String,
    pub opponent_prefix: String,
    /// Column of the base table holding the training target.
    pub target_column: String,
}

impl RoleSpec {
    pub fn for_role(role: Role) -> Self {
        let names = |kinds: &[TableKind]| -> Vec<String> {
            kinds.iter().map(|k| k.table_name().to_string()).collect()
        };
        match role {
            Role::Passer => RoleSpec {
                role,
                subject_tables: names(&[TableKind::Offense, TableKind::AdvancedPassing]),
                subject_prefix: "o_".into(),
                opponent_table: TableKind::DefenseTeam.table_name().into(),
                opponent_prefix: "d_".into(),
                target_column: FANTASY_POINTS.into(),
            },
            Role::SkillPlayer => RoleSpec {
                role,
                subject_tables: names(&[
                    TableKind::Offense,
                    TableKind::AdvancedRushing,
                    TableKind::AdvancedReceiving,
                ]),
                subject_prefix: "o_".into(),
                opponent_table: TableKind::DefenseTeam.table_name().into(),
                opponent_prefix: "d_".into(),
                target_column: FANTASY_POINTS.into(),
            },
            Role::TeamDefense => RoleSpec {
                role,
                subject_tables: names(&[TableKind::DefenseTeam]),
                subject_prefix: "teamDef_".into(),
                opponent_table: TableKind::OffenseTeam.table_name().into(),
                opponent_prefix: "oppOff_".into(),
                target_column: FANTASY_POINTS.into(),
            },
        }
    }

    /// Every table name this role reads.
    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.subject_tables
            .iter()
            .map(String::as_str)
            .chain(std::iter::once(self.opponent_table.as_str()))
    }
}

/// Explicit settings for feature builds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeatureConfig {
    /// Default matchups are restricted to games after this date.
    pub start_date: NaiveDate,
    /// Number of most recent games each as-of query averages.
    pub history_window: usize,
}

impl FeatureConfig {
    pub fn new(start_date: NaiveDate) -> Self {
        Self {
            start_date,
            history_window: HISTORY_WINDOW,
        }
    }
}

/// Builds feature spaces for one role from borrowed, read-only stat tables.
#[derive(Debug, Clone)]
pub struct FeatureSpaceBuilder<'a> {
    spec: RoleSpec,
    subjects: Vec<&'a StatTable>,
    opponent: &'a StatTable,
    aggregator: AsOfAggregator,
    start_date: NaiveDate,
}

impl<'a> FeatureSpaceBuilder<'a> {
    /// Resolve every table the role reads. A missing table is fatal.
    pub fn new(
        spec: RoleSpec,
        tables: &'a TableSet,
        config: &FeatureConfig,
    ) -> Result<Self, FeatureError> {
        let subjects = spec
            .subject_tables
            .iter()
            .map(|name| tables.get(name))
            .collect::<Result<Vec<_>, _>>()?;
        let opponent = tables.get(&spec.opponent_table)?;
        if subjects.is_empty() {
            return Err(crate::stats::StatsError::Validation(format!(
                "{} role has no subject tables",
                spec.role
            ))
            .into());
        }

        Ok(Self {
            spec,
            subjects,
            opponent,
            aggregator: AsOfAggregator::new(config.history_window),
            start_date: config.start_date,
        })
    }

    pub fn for_role(
        role: Role,
        tables: &'a TableSet,
        config: &FeatureConfig,
    ) -> Result<Self, FeatureError> {
        Self::new(RoleSpec::for_role(role), tables, config)
    }

    pub fn role(&self) -> Role {
        self.spec.role
    }

    pub fn spec(&self) -> &RoleSpec {
        &self.spec
    }

    /// Historical matchups for this role: base-table rows the role heuristic
    /// selects, dated after the configured start date, with a known target.
    pub fn default_matchups(&self) -> Vec<Matchup> {
        let base = self.subjects[0];
        let mut missing_target = 0usize;
        let matchups: Vec<Matchup> = base
            .rows()
            .iter()
            .filter(|row| row.date > self.start_date && self.spec.role.selects(row))
            .filter_map(|row| match row.stat(&self.spec.target_column) {
                Some(target) => {
                    Some(Matchup::new(&row.name, row.date, &row.opponent).with_target(target))
                }
                None => {
                    missing_target += 1;
                    None
                }
            })
            .collect();
        if missing_target > 0 {
            warn!(
                "{}: skipped {} historical rows with no `{}` value",
                self.spec.role, missing_target, self.spec.target_column
            );
        }
        matchups
    }

    /// Build one feature vector per matchup, in input order.
    pub fn build(&self, matchups: &[Matchup], with_target: bool) -> FeatureSpace {
        let rows: Vec<FeatureVector> = matchups
            .par_iter()
            .map(|m| self.vector(m, with_target))
            .collect();
        debug!("{}: built feature space with {} rows", self.spec.role, rows.len());
        FeatureSpace::from_rows(rows)
    }

    /// Build the feature space of every default matchup.
    pub fn build_history(&self) -> FeatureSpace {
        self.build(&self.default_matchups(), true)
    }

    pub fn vector(&self, matchup: &Matchup, with_target: bool) -> FeatureVector {
        let mut features = StatMap::new();
        for table in &self.subjects {
            let agg = self.aggregator.query(table, &matchup.name, matchup.date);
            extend_first_wins(&mut features, &self.spec.subject_prefix, agg.into_values());
        }
        let agg = self
            .aggregator
            .query(self.opponent, &matchup.opponent, matchup.date);
        extend_first_wins(&mut features, &self.spec.opponent_prefix, agg.into_values());

        FeatureVector {
            name: matchup.name.clone(),
            date: matchup.date,
            opponent: matchup.opponent.clone(),
            features,
            target: if with_target { matchup.target } else { None },
        }
    }
}

fn extend_first_wins(features: &mut StatMap, prefix: &str, values: StatMap) {
    for (column, value) in values {
        features.entry(format!("{prefix}{column}")).or_insert(value);
    }
}
