// Feature vectors, feature spaces, and the column schema that ties a training
// build to every prediction build made against it.

use std::collections::BTreeSet;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::FeatureError;
use crate::stats::StatMap;

/// One (entity, game) to build features for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Matchup {
    pub name: String,
    pub date: NaiveDate,
    pub opponent: String,
    /// Realized fantasy points, when known.
    pub target: Option<f64>,
}

impl Matchup {
    pub fn new(name: impl Into<String>, date: NaiveDate, opponent: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            date,
            opponent: opponent.into(),
            target: None,
        }
    }

    pub fn with_target(mut self, target: f64) -> Self {
        self.target = Some(target);
        self
    }
}

/// Prefixed feature name -> value for one matchup, plus its identity.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector {
    pub name: String,
    pub date: NaiveDate,
    pub opponent: String,
    pub features: StatMap,
    pub target: Option<f64>,
}

/// The ordered set of feature columns a predictor sees.
///
/// Columns are unique and sorted ascending by name. That order is the only
/// column order used anywhere: a training matrix and every later prediction
/// matrix are laid out against the same schema, and a column a row lacks is
/// filled with zero.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FeatureSchema {
    columns: Vec<String>,
}

impl FeatureSchema {
    pub fn new(columns: impl IntoIterator<Item = String>) -> Self {
        let columns: BTreeSet<String> = columns.into_iter().collect();
        Self {
            columns: columns.into_iter().collect(),
        }
    }

    /// Union of two schemas, in schema order.
    pub fn union(&self, other: &FeatureSchema) -> FeatureSchema {
        FeatureSchema::new(self.columns.iter().chain(&other.columns).cloned())
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Lay out one feature map against this schema. Unknown and absent
    /// values become zero; features outside the schema are ignored.
    pub fn row(&self, features: &StatMap) -> Vec<f64> {
        self.columns
            .iter()
            .map(|c| features.get(c).copied().flatten().unwrap_or(0.0))
            .collect()
    }
}

/// A set of feature vectors sharing one schema. Every row carries every
/// schema column (absent ones as `None`).
#[derive(Debug, Clone, Default)]
pub struct FeatureSpace {
    schema: FeatureSchema,
    rows: Vec<FeatureVector>,
}

impl FeatureSpace {
    pub fn from_rows(mut rows: Vec<FeatureVector>) -> Self {
        let schema = FeatureSchema::new(
            rows.iter()
                .flat_map(|r| r.features.keys().cloned())
                .collect::<BTreeSet<_>>(),
        );
        for row in &mut rows {
            for column in schema.columns() {
                row.features.entry(column.clone()).or_insert(None);
            }
        }
        Self { schema, rows }
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    pub fn rows(&self) -> &[FeatureVector] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows dated strictly before `date`, keeping this space's schema.
    pub fn before(&self, date: NaiveDate) -> FeatureSpace {
        FeatureSpace {
            schema: self.schema.clone(),
            rows: self.rows.iter().filter(|r| r.date < date).cloned().collect(),
        }
    }

    pub fn latest_date(&self) -> Option<NaiveDate> {
        self.rows.iter().map(|r| r.date).max()
    }

    /// Dense matrix, one row per feature vector, laid out against `schema`.
    pub fn design_matrix(&self, schema: &FeatureSchema) -> Vec<Vec<f64>> {
        self.rows.iter().map(|r| schema.row(&r.features)).collect()
    }

    /// Training targets. Every row must carry one.
    pub fn targets(&self) -> Result<Vec<f64>, FeatureError> {
        self.rows
            .iter()
            .map(|r| {
                r.target.ok_or_else(|| FeatureError::MissingTarget {
                    name: r.name.clone(),
                    date: r.date,
                })
            })
            .collect()
    }
}
