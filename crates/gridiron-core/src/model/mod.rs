// Predictor capability and the random forest regressor used by default.
//
// The walk-forward pipeline only depends on `Predictor`; any model that can
// fit a dense matrix and score another one laid out the same way plugs in.

pub mod forest;
pub mod tree;

pub use forest::{ForestConfig, RandomForest};

use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ModelError {
    #[error("cannot fit on an empty training set")]
    EmptyTrainingSet,

    #[error("{features} feature rows but {targets} targets")]
    LengthMismatch { features: usize, targets: usize },

    #[error("predict called before fit")]
    NotFitted,

    #[error("expected rows of {expected} features, found {found}")]
    ShapeMismatch { expected: usize, found: usize },
}

/// A regression model that is fitted once and then scores new rows.
pub trait Predictor {
    fn fit(&mut self, features: &[Vec<f64>], targets: &[f64]) -> Result<(), ModelError>;

    fn predict(&self, features: &[Vec<f64>]) -> Result<Vec<f64>, ModelError>;
}

/// Shared input validation for `fit`. Returns the row width.
pub(crate) fn check_training_set(
    features: &[Vec<f64>],
    targets: &[f64],
) -> Result<usize, ModelError> {
    if features.is_empty() {
        return Err(ModelError::EmptyTrainingSet);
    }
    if features.len() != targets.len() {
        return Err(ModelError::LengthMismatch {
            features: features.len(),
            targets: targets.len(),
        });
    }
    check_width(features, features[0].len())?;
    Ok(features[0].len())
}

pub(crate) fn check_width(features: &[Vec<f64>], expected: usize) -> Result<(), ModelError> {
    match features.iter().find(|row| row.len() != expected) {
        Some(row) => Err(ModelError::ShapeMismatch {
            expected,
            found: row.len(),
        }),
        None => Ok(()),
    }
}
