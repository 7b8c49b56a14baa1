// Positions, slate players, roster rules and validated lineups.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Positions
// ---------------------------------------------------------------------------

/// Football positions on a classic daily-fantasy slate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Position {
    Quarterback,
    RunningBack,
    WideReceiver,
    TightEnd,
    Defense,
}

impl Position {
    pub const ALL: [Position; 5] = [
        Position::Quarterback,
        Position::RunningBack,
        Position::WideReceiver,
        Position::TightEnd,
        Position::Defense,
    ];

    /// Parse a slate position string. "DST", "DEF" and "D" all mean team defense.
    pub fn from_str_pos(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "QB" => Some(Position::Quarterback),
            "RB" => Some(Position::RunningBack),
            "WR" => Some(Position::WideReceiver),
            "TE" => Some(Position::TightEnd),
            "DST" | "DEF" | "D" => Some(Position::Defense),
            _ => None,
        }
    }

    pub fn display_str(&self) -> &'static str {
        match self {
            Position::Quarterback => "QB",
            Position::RunningBack => "RB",
            Position::WideReceiver => "WR",
            Position::TightEnd => "TE",
            Position::Defense => "DST",
        }
    }

    /// Positions eligible as stack partners for a team's quarterback.
    pub fn is_pass_catcher(&self) -> bool {
        matches!(self, Position::WideReceiver | Position::TightEnd)
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_str())
    }
}

// ---------------------------------------------------------------------------
// Players
// ---------------------------------------------------------------------------

/// One slate entry with its predicted score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub name: String,
    pub position: Position,
    pub team: String,
    pub opponent: String,
    pub salary: f64,
    pub predicted: f64,
    /// Fantasy points actually scored, once known.
    pub realized: Option<f64>,
}

// ---------------------------------------------------------------------------
// Roster rules
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PositionQuota {
    pub position: Position,
    pub min: usize,
    /// `None` means no upper bound beyond the roster size.
    pub max: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RosterRules {
    pub roster_size: usize,
    pub salary_cap: f64,
    pub quotas: Vec<PositionQuota>,
}

impl Default for RosterRules {
    /// Classic nine-player roster: QB, 2+ RB, 3+ WR, 1+ TE, DST (one flex
    /// among RB/WR/TE) under a $50,000 cap.
    fn default() -> Self {
        let quota = |position, min, max| PositionQuota {
            position,
            min,
            max,
        };
        Self {
            roster_size: 9,
            salary_cap: 50_000.0,
            quotas: vec![
                quota(Position::Quarterback, 1, Some(1)),
                quota(Position::Defense, 1, Some(1)),
                quota(Position::RunningBack, 2, None),
                quota(Position::WideReceiver, 3, None),
                quota(Position::TightEnd, 1, None),
            ],
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum LineupViolation {
    #[error("lineup has {found} players, expected {expected}")]
    WrongSize { expected: usize, found: usize },

    #[error("player {name} selected more than once")]
    Duplicate { name: String },

    #[error("salary {salary} exceeds cap {cap}")]
    OverCap { salary: f64, cap: f64 },

    #[error("{count} {position} selected, allowed {min}..={max}")]
    Quota {
        position: Position,
        count: usize,
        min: usize,
        max: usize,
    },
}

impl RosterRules {
    pub fn with_salary_cap(mut self, cap: f64) -> Self {
        self.salary_cap = cap;
        self
    }

    pub fn validate(&self, players: &[&Player]) -> Result<(), LineupViolation> {
        if players.len() != self.roster_size {
            return Err(LineupViolation::WrongSize {
                expected: self.roster_size,
                found: players.len(),
            });
        }

        let mut seen = HashSet::new();
        for p in players {
            if !seen.insert((&p.name, &p.team)) {
                return Err(LineupViolation::Duplicate {
                    name: p.name.clone(),
                });
            }
        }

        let salary: f64 = players.iter().map(|p| p.salary).sum();
        if salary > self.salary_cap {
            return Err(LineupViolation::OverCap {
                salary,
                cap: self.salary_cap,
            });
        }

        for quota in &self.quotas {
            let count = players.iter().filter(|p| p.position == quota.position).count();
            let max = quota.max.unwrap_or(self.roster_size);
            if count < quota.min || count > max {
                return Err(LineupViolation::Quota {
                    position: quota.position,
                    count,
                    min: quota.min,
                    max,
                });
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Lineups
// ---------------------------------------------------------------------------

/// A validated roster drawn from a player pool. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct Lineup {
    players: Vec<Player>,
    /// Indices into the pool the lineup was drawn from, ascending.
    pool_indices: Vec<usize>,
}

impl Lineup {
    /// Build a lineup from pool indices, rejecting any selection the rules forbid.
    pub fn from_selection(
        pool: &[Player],
        mut indices: Vec<usize>,
        rules: &RosterRules,
    ) -> Result<Self, LineupViolation> {
        indices.sort_unstable();
        indices.dedup();
        let selected: Vec<&Player> = indices.iter().filter_map(|&i| pool.get(i)).collect();
        if selected.len() != indices.len() {
            return Err(LineupViolation::WrongSize {
                expected: rules.roster_size,
                found: selected.len(),
            });
        }
        rules.validate(&selected)?;

        Ok(Self {
            players: selected.into_iter().cloned().collect(),
            pool_indices: indices,
        })
    }

    pub fn players(&self) -> &[Player] {
        &self.players
    }

    pub fn pool_indices(&self) -> &[usize] {
        &self.pool_indices
    }

    pub fn contains(&self, pool_index: usize) -> bool {
        self.pool_indices.binary_search(&pool_index).is_ok()
    }

    /// Number of pool players this lineup shares with `other`.
    pub fn overlap(&self, other: &Lineup) -> usize {
        self.pool_indices.iter().filter(|&&i| other.contains(i)).count()
    }

    pub fn count(&self, position: Position) -> usize {
        self.players.iter().filter(|p| p.position == position).count()
    }

    pub fn total_salary(&self) -> f64 {
        self.players.iter().map(|p| p.salary).sum()
    }

    pub fn projected(&self) -> f64 {
        self.players.iter().map(|p| p.predicted).sum()
    }

    /// Realized score; players with no recorded score contribute zero.
    pub fn realized(&self) -> f64 {
        self.players.iter().filter_map(|p| p.realized).sum()
    }
}

impl fmt::Display for Lineup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<String> = self
            .players
            .iter()
            .map(|p| format!("{} {}", p.position, p.name))
            .collect();
        write!(
            f,
            "[{}] salary {:.0}, projected {:.1}",
            names.join(", "),
            self.total_salary(),
            self.projected()
        )
    }
}
