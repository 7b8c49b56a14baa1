// Point-in-time ("as-of") aggregation over a stat table.
//
// An as-of query only ever sees rows dated strictly before the query date, so
// a feature built for a game can never include that game or anything after it.

use chrono::NaiveDate;

use crate::stats::{StatMap, StatTable};

/// Number of most recent games averaged by default.
pub const HISTORY_WINDOW: usize = 5;

/// Column-wise mean of an entity's recent history.
///
/// When the entity has no qualifying history every column is `None` (the
/// "unknown" vector). Unknown values stay unknown here and are resolved to
/// zero only when a design matrix is assembled for training or prediction.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateVector {
    values: StatMap,
    games: usize,
}

impl AggregateVector {
    /// The unknown vector for a table: every column present, every value missing.
    pub fn unknown(columns: &[String]) -> Self {
        Self {
            values: columns.iter().map(|c| (c.clone(), None)).collect(),
            games: 0,
        }
    }

    pub fn is_unknown(&self) -> bool {
        self.games == 0
    }

    /// Number of games that went into the mean.
    pub fn games(&self) -> usize {
        self.games
    }

    pub fn get(&self, column: &str) -> Option<f64> {
        self.values.get(column).copied().flatten()
    }

    pub fn values(&self) -> &StatMap {
        &self.values
    }

    pub fn into_values(self) -> StatMap {
        self.values
    }
}

#[derive(Debug, Clone, Copy)]
pub struct AsOfAggregator {
    window: usize,
}

impl Default for AsOfAggregator {
    fn default() -> Self {
        Self::new(HISTORY_WINDOW)
    }
}

impl AsOfAggregator {
    pub fn new(window: usize) -> Self {
        Self {
            window: window.max(1),
        }
    }

    pub fn window(&self) -> usize {
        self.window
    }

    /// Mean of each of `table`'s columns over the most recent `window` rows
    /// for `entity` dated strictly before `as_of`. Missing cells in those rows
    /// count as zero.
    pub fn query(&self, table: &StatTable, entity: &str, as_of: NaiveDate) -> AggregateVector {
        let history = table.history(entity, as_of);
        if history.is_empty() {
            return AggregateVector::unknown(table.columns());
        }

        let recent = &history[history.len().saturating_sub(self.window)..];
        let n = recent.len() as f64;
        let values = table
            .columns()
            .iter()
            .map(|column| {
                let sum: f64 = recent.iter().map(|row| row.stat_or_zero(column)).sum();
                (column.clone(), Some(sum / n))
            })
            .collect();

        AggregateVector {
            values,
            games: recent.len(),
        }
    }
}
