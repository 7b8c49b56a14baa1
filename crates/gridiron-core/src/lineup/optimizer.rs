// Stacked lineup generation.
//
// For a stacking configuration the optimizer picks the teams whose stack
// seeds (top quarterback plus top pass catchers) project best, then solves
// one integer program per lineup for each of those teams. Every lineup for a
// team forces its seed in and must differ from each earlier lineup for the
// same team by at least one player.

use std::collections::BTreeMap;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error};

use super::roster::{Lineup, LineupViolation, Player, Position, RosterRules};
use super::solver::{BinaryProgram, BinarySolver, Comparison, SolverError};

/// Lineups generated per slate, split evenly across stacked teams.
pub const DEFAULT_LINEUPS_PER_SLATE: usize = 20;

#[derive(Debug, Error)]
pub enum OptimizerError {
    #[error("lineup solve failed: {0}")]
    Solve(#[from] SolverError),

    #[error("lineup solve for {team} stack failed: {source}")]
    Solver {
        team: String,
        #[source]
        source: SolverError,
    },

    #[error("solver returned an invalid lineup: {0}")]
    InvalidLineup(#[from] LineupViolation),

    #[error("forced player index {index} is not in the pool")]
    UnknownPlayer { index: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StackConfig {
    pub teams_to_stack: usize,
    /// Quarterback plus `stack_size - 1` pass catchers.
    pub stack_size: usize,
}

impl StackConfig {
    pub fn new(teams_to_stack: usize, stack_size: usize) -> Self {
        Self {
            teams_to_stack,
            stack_size,
        }
    }
}

impl std::fmt::Display for StackConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} teams x {}-man stacks", self.teams_to_stack, self.stack_size)
    }
}

/// The players forced into every lineup built around one team.
#[derive(Debug, Clone, PartialEq)]
pub struct StackSeed {
    pub team: String,
    /// Pool indices.
    pub players: Vec<usize>,
    pub projected: f64,
}

/// One seed per team in the pool: its `stack_size - 1` best-projected
/// non-QB/RB/DST players plus its best-projected quarterback. Teams ordered
/// by name.
pub fn stack_seeds(pool: &[Player], stack_size: usize) -> Vec<StackSeed> {
    let mut by_team: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
    for (i, p) in pool.iter().enumerate() {
        by_team.entry(p.team.as_str()).or_default().push(i);
    }

    by_team
        .into_iter()
        .map(|(team, indices)| {
            let mut ranked = indices;
            ranked.sort_by(|&a, &b| pool[b].predicted.total_cmp(&pool[a].predicted));

            let mut players: Vec<usize> = ranked
                .iter()
                .copied()
                .filter(|&i| pool[i].position.is_pass_catcher())
                .take(stack_size.saturating_sub(1))
                .collect();
            if let Some(qb) = ranked
                .iter()
                .copied()
                .find(|&i| pool[i].position == Position::Quarterback)
            {
                players.push(qb);
            }
            let projected = players.iter().map(|&i| pool[i].predicted).sum();

            StackSeed {
                team: team.to_string(),
                players,
                projected,
            }
        })
        .collect()
}

/// The `teams` best seeds by projected total, best first. Ties go to the
/// alphabetically earlier team.
pub fn rank_stacks(mut seeds: Vec<StackSeed>, teams: usize) -> Vec<StackSeed> {
    seeds.sort_by(|a, b| {
        b.projected
            .total_cmp(&a.projected)
            .then_with(|| a.team.cmp(&b.team))
    });
    seeds.truncate(teams);
    seeds
}

pub struct LineupOptimizer<S> {
    solver: S,
    rules: RosterRules,
    lineups_per_slate: usize,
}

impl<S: BinarySolver> LineupOptimizer<S> {
    pub fn new(solver: S) -> Self {
        Self {
            solver,
            rules: RosterRules::default(),
            lineups_per_slate: DEFAULT_LINEUPS_PER_SLATE,
        }
    }

    pub fn with_rules(mut self, rules: RosterRules) -> Self {
        self.rules = rules;
        self
    }

    pub fn with_lineups_per_slate(mut self, lineups: usize) -> Self {
        self.lineups_per_slate = lineups;
        self
    }

    pub fn rules(&self) -> &RosterRules {
        &self.rules
    }

    /// `round(lineups_per_slate / teams)`.
    pub fn lineups_per_team(&self, teams: usize) -> usize {
        (self.lineups_per_slate as f64 / teams.max(1) as f64).round() as usize
    }

    /// The integer program for one lineup: maximize projected points under
    /// the roster rules, with `forced` selected and at most `roster_size - 1`
    /// players shared with any lineup in `prior`.
    pub fn program(
        &self,
        pool: &[Player],
        forced: &[usize],
        prior: &[Lineup],
    ) -> Result<BinaryProgram, OptimizerError> {
        let n = pool.len();
        let mut program = BinaryProgram::new(pool.iter().map(|p| p.predicted).collect());

        program.constrain(vec![1.0; n], Comparison::Eq, self.rules.roster_size as f64);
        program.constrain(
            pool.iter().map(|p| p.salary).collect(),
            Comparison::Le,
            self.rules.salary_cap,
        );

        for quota in &self.rules.quotas {
            let mask: Vec<f64> = pool
                .iter()
                .map(|p| if p.position == quota.position { 1.0 } else { 0.0 })
                .collect();
            match quota.max {
                Some(max) if max == quota.min => {
                    program.constrain(mask, Comparison::Eq, quota.min as f64);
                }
                max => {
                    if let Some(max) = max {
                        program.constrain(mask.clone(), Comparison::Le, max as f64);
                    }
                    program.constrain(mask, Comparison::Ge, quota.min as f64);
                }
            }
        }

        for &index in forced {
            if index >= n {
                return Err(OptimizerError::UnknownPlayer { index });
            }
            program.force(index);
        }

        let max_overlap = self.rules.roster_size.saturating_sub(1) as f64;
        for lineup in prior {
            let mut mask = vec![0.0; n];
            for &i in lineup.pool_indices() {
                if let Some(slot) = mask.get_mut(i) {
                    *slot = 1.0;
                }
            }
            program.constrain(mask, Comparison::Le, max_overlap);
        }

        Ok(program)
    }

    /// Solve for the single best lineup given forced players and prior lineups.
    pub fn solve_lineup(
        &self,
        pool: &[Player],
        forced: &[usize],
        prior: &[Lineup],
    ) -> Result<Lineup, OptimizerError> {
        let program = self.program(pool, forced, prior)?;
        let assignment = self.solver.solve(&program)?;
        if !program.is_satisfied_by(&assignment) {
            return Err(SolverError::Backend("assignment violates constraints".into()).into());
        }
        let selected: Vec<usize> = assignment
            .iter()
            .enumerate()
            .filter(|(_, &x)| x)
            .map(|(i, _)| i)
            .collect();
        Ok(Lineup::from_selection(pool, selected, &self.rules)?)
    }

    /// `count` successive lineups around one stack seed.
    pub fn lineups_for_stack(
        &self,
        pool: &[Player],
        seed: &StackSeed,
        count: usize,
    ) -> Result<Vec<Lineup>, OptimizerError> {
        let mut lineups: Vec<Lineup> = Vec::with_capacity(count);
        for _ in 0..count {
            let lineup = self
                .solve_lineup(pool, &seed.players, &lineups)
                .map_err(|e| match e {
                    OptimizerError::Solve(source) => OptimizerError::Solver {
                        team: seed.team.clone(),
                        source,
                    },
                    other => other,
                })?;
            debug!("{} stack lineup {}: {}", seed.team, lineups.len() + 1, lineup);
            lineups.push(lineup);
        }
        Ok(lineups)
    }

    /// Lineups for every stacked team of one configuration. Teams are solved
    /// in parallel; any failure fails the whole configuration.
    pub fn optimize(
        &self,
        pool: &[Player],
        config: StackConfig,
    ) -> Result<BTreeMap<String, Vec<Lineup>>, OptimizerError> {
        let seeds = rank_stacks(stack_seeds(pool, config.stack_size), config.teams_to_stack);
        let per_team = self.lineups_per_team(config.teams_to_stack);

        let results: Vec<(String, Result<Vec<Lineup>, OptimizerError>)> = seeds
            .par_iter()
            .map(|seed| (seed.team.clone(), self.lineups_for_stack(pool, seed, per_team)))
            .collect();

        let mut by_team = BTreeMap::new();
        for (team, result) in results {
            match result {
                Ok(lineups) => {
                    by_team.insert(team, lineups);
                }
                Err(e) => {
                    error!("{}: {}", config, e);
                    return Err(e);
                }
            }
        }
        Ok(by_team)
    }
}
