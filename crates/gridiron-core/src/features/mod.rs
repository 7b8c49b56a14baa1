// Leakage-safe feature construction: as-of aggregation and per-role feature spaces.

pub mod asof;
pub mod builder;
pub mod space;

pub use asof::{AggregateVector, AsOfAggregator, HISTORY_WINDOW};
pub use builder::{FeatureConfig, FeatureSpaceBuilder, Role, RoleSpec};
pub use space::{FeatureSchema, FeatureSpace, FeatureVector, Matchup};

use chrono::NaiveDate;
use thiserror::Error;

use crate::stats::StatsError;

#[derive(Debug, Error)]
pub enum FeatureError {
    #[error(transparent)]
    Stats(#[from] StatsError),

    #[error("training row for {name} on {date} has no target value")]
    MissingTarget { name: String, date: NaiveDate },
}
