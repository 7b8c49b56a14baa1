// Walk-forward training: per scoring period, fit fresh predictors on strictly
// earlier history and score that period's matchups.

pub mod period;
pub mod walk_forward;

pub use period::{group_by_period, ScoringPeriod};
pub use walk_forward::{PredictionsByPeriod, RoleMatchup, WalkForwardPipeline};

use thiserror::Error;

use crate::features::{FeatureError, Role};
use crate::model::ModelError;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("no training history before {period} for the {role} predictor")]
    InsufficientHistory { period: ScoringPeriod, role: Role },

    #[error("{name} appears more than once in {period}; slate names must be unique per period")]
    DuplicateName { period: ScoringPeriod, name: String },

    #[error(transparent)]
    Feature(#[from] FeatureError),

    #[error("{role} predictor failed in {period}: {source}")]
    Model {
        period: ScoringPeriod,
        role: Role,
        #[source]
        source: ModelError,
    },
}
