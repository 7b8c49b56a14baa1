// Bagged regression forest. Each tree is grown on a bootstrap sample drawn
// from its own seeded stream, so a fit is reproducible regardless of how
// rayon schedules the trees.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::tree::{RegressionTree, TreeParams};
use super::{check_training_set, check_width, ModelError, Predictor};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForestConfig {
    pub n_trees: usize,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub max_features: Option<usize>,
    pub seed: u64,
}

impl Default for ForestConfig {
    fn default() -> Self {
        Self {
            n_trees: 100,
            max_depth: None,
            min_samples_split: 2,
            max_features: None,
            seed: 0,
        }
    }
}

impl ForestConfig {
    fn tree_params(&self) -> TreeParams {
        TreeParams {
            max_depth: self.max_depth,
            min_samples_split: self.min_samples_split,
            max_features: self.max_features,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RandomForest {
    config: ForestConfig,
    trees: Vec<RegressionTree>,
    n_features: Option<usize>,
}

impl RandomForest {
    pub fn new(config: ForestConfig) -> Self {
        Self {
            config,
            trees: Vec::new(),
            n_features: None,
        }
    }

    pub fn config(&self) -> &ForestConfig {
        &self.config
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }
}

impl Predictor for RandomForest {
    fn fit(&mut self, features: &[Vec<f64>], targets: &[f64]) -> Result<(), ModelError> {
        let width = check_training_set(features, targets)?;
        let n = features.len();
        let params = self.config.tree_params();
        let seed = self.config.seed;

        self.trees = (0..self.config.n_trees.max(1))
            .into_par_iter()
            .map(|i| {
                let mut rng = ChaCha8Rng::seed_from_u64(seed.wrapping_add(i as u64));
                let sample: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();
                RegressionTree::fit(features, targets, &sample, &params, &mut rng)
            })
            .collect();
        self.n_features = Some(width);

        debug!(
            "fitted forest: {} trees on {} rows x {} features",
            self.trees.len(),
            n,
            width
        );
        Ok(())
    }

    fn predict(&self, features: &[Vec<f64>]) -> Result<Vec<f64>, ModelError> {
        let width = self.n_features.ok_or(ModelError::NotFitted)?;
        check_width(features, width)?;

        let n_trees = self.trees.len() as f64;
        Ok(features
            .par_iter()
            .map(|row| self.trees.iter().map(|t| t.predict_row(row)).sum::<f64>() / n_trees)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_config() -> ForestConfig {
        ForestConfig {
            n_trees: 10,
            seed: 42,
            ..ForestConfig::default()
        }
    }

    fn linear_data() -> (Vec<Vec<f64>>, Vec<f64>) {
        let x: Vec<Vec<f64>> = (0..40).map(|i| vec![i as f64, (i % 4) as f64]).collect();
        let y: Vec<f64> = (0..40).map(|i| 2.0 * i as f64).collect();
        (x, y)
    }

    // -- fit/predict --

    #[test]
    fn predictions_track_target() {
        let (x, y) = linear_data();
        let mut forest = RandomForest::new(small_config());
        forest.fit(&x, &y).unwrap();
        assert_eq!(forest.n_trees(), 10);

        let preds = forest.predict(&[vec![5.0, 1.0], vec![35.0, 3.0]]).unwrap();
        assert!(preds[0] < preds[1]);
        assert!((preds[0] - 10.0).abs() < 10.0);
        assert!((preds[1] - 70.0).abs() < 10.0);
    }

    #[test]
    fn same_seed_same_predictions() {
        let (x, y) = linear_data();
        let mut a = RandomForest::new(small_config());
        let mut b = RandomForest::new(small_config());
        a.fit(&x, &y).unwrap();
        b.fit(&x, &y).unwrap();
        let queries = vec![vec![12.5, 0.0], vec![27.0, 2.0]];
        assert_eq!(a.predict(&queries).unwrap(), b.predict(&queries).unwrap());
    }

    #[test]
    fn zero_width_rows_predict_mean() {
        let x = vec![vec![]; 3];
        let y = vec![3.0, 3.0, 3.0];
        let mut forest = RandomForest::new(small_config());
        forest.fit(&x, &y).unwrap();
        assert_eq!(forest.predict(&[vec![]]).unwrap(), vec![3.0]);
    }

    // -- errors --

    #[test]
    fn empty_training_set_rejected() {
        let mut forest = RandomForest::new(small_config());
        assert_eq!(forest.fit(&[], &[]), Err(ModelError::EmptyTrainingSet));
    }

    #[test]
    fn length_mismatch_rejected() {
        let mut forest = RandomForest::new(small_config());
        let err = forest.fit(&[vec![1.0], vec![2.0]], &[1.0]).unwrap_err();
        assert_eq!(
            err,
            ModelError::LengthMismatch {
                features: 2,
                targets: 1
            }
        );
    }

    #[test]
    fn predict_before_fit_rejected() {
        let forest = RandomForest::new(small_config());
        assert_eq!(forest.predict(&[vec![1.0]]), Err(ModelError::NotFitted));
    }

    #[test]
    fn predict_wrong_width_rejected() {
        let (x, y) = linear_data();
        let mut forest = RandomForest::new(small_config());
        forest.fit(&x, &y).unwrap();
        assert_eq!(
            forest.predict(&[vec![1.0]]),
            Err(ModelError::ShapeMismatch {
                expected: 2,
                found: 1
            })
        );
    }
}
