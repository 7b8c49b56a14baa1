// Walk-forward train/predict loop.
//
// Periods run strictly in order. For each period the history of every role is
// cut at the period's first game date, a brand new predictor is fitted on it,
// and the period's own matchups are scored without their targets. Nothing
// learned in one period is reused in the next.

use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;
use tracing::{debug, info};

use super::{PipelineError, ScoringPeriod};
use crate::features::{FeatureConfig, FeatureSpace, FeatureSpaceBuilder, Matchup, Role};
use crate::model::{ModelError, Predictor};
use crate::stats::TableSet;

/// Predicted fantasy points per entity name, per period.
pub type PredictionsByPeriod = BTreeMap<ScoringPeriod, BTreeMap<String, f64>>;

/// A matchup to score, tagged with the predictor line that scores it.
#[derive(Debug, Clone, PartialEq)]
pub struct RoleMatchup {
    pub role: Role,
    pub matchup: Matchup,
}

pub struct WalkForwardPipeline<'a> {
    passer: FeatureSpaceBuilder<'a>,
    skill: FeatureSpaceBuilder<'a>,
    defense: FeatureSpaceBuilder<'a>,
    /// Every historical feature vector per role, built once and cut per period.
    history: HashMap<Role, FeatureSpace>,
}

impl<'a> WalkForwardPipeline<'a> {
    pub fn new(tables: &'a TableSet, config: &FeatureConfig) -> Result<Self, PipelineError> {
        Ok(Self {
            passer: FeatureSpaceBuilder::for_role(Role::Passer, tables, config)?,
            skill: FeatureSpaceBuilder::for_role(Role::SkillPlayer, tables, config)?,
            defense: FeatureSpaceBuilder::for_role(Role::TeamDefense, tables, config)?,
            history: HashMap::new(),
        })
    }

    pub fn builder(&self, role: Role) -> &FeatureSpaceBuilder<'a> {
        match role {
            Role::Passer => &self.passer,
            Role::SkillPlayer => &self.skill,
            Role::TeamDefense => &self.defense,
        }
    }

    /// Training rows for `role` dated strictly before `before`.
    pub fn training_space(&mut self, role: Role, before: NaiveDate) -> FeatureSpace {
        if !self.history.contains_key(&role) {
            let space = self.builder(role).build_history();
            info!("{}: {} historical feature rows", role, space.len());
            self.history.insert(role, space);
        }
        self.history[&role].before(before)
    }

    /// Score every period's matchups with predictors made by `make_predictor`,
    /// one fresh instance per (period, role).
    pub fn run<P, F>(
        &mut self,
        by_period: &BTreeMap<ScoringPeriod, Vec<RoleMatchup>>,
        mut make_predictor: F,
    ) -> Result<PredictionsByPeriod, PipelineError>
    where
        P: Predictor,
        F: FnMut(Role) -> P,
    {
        let mut predictions = PredictionsByPeriod::new();

        for (&period, matchups) in by_period {
            let Some(start) = matchups.iter().map(|m| m.matchup.date).min() else {
                continue;
            };

            let mut scores = BTreeMap::new();
            for role in Role::ALL {
                let current: Vec<Matchup> = matchups
                    .iter()
                    .filter(|m| m.role == role)
                    .map(|m| m.matchup.clone())
                    .collect();
                if current.is_empty() {
                    continue;
                }
                let predictor = make_predictor(role);
                let predicted = self.predict_role(period, role, start, &current, predictor)?;
                for (matchup, score) in current.iter().zip(predicted) {
                    if scores.insert(matchup.name.clone(), score).is_some() {
                        return Err(PipelineError::DuplicateName {
                            period,
                            name: matchup.name.clone(),
                        });
                    }
                }
            }

            info!("{}: predicted {} matchups", period, scores.len());
            predictions.insert(period, scores);
        }

        Ok(predictions)
    }

    fn predict_role<P: Predictor>(
        &mut self,
        period: ScoringPeriod,
        role: Role,
        start: NaiveDate,
        current: &[Matchup],
        mut predictor: P,
    ) -> Result<Vec<f64>, PipelineError> {
        let train = self.training_space(role, start);
        if train.is_empty() {
            return Err(PipelineError::InsufficientHistory { period, role });
        }
        let current_space = self.builder(role).build(current, false);

        // Train and predict against one schema so column positions line up.
        let schema = train.schema().union(current_space.schema());
        let targets = train.targets()?;
        let model_err = |source: ModelError| PipelineError::Model {
            period,
            role,
            source,
        };

        predictor
            .fit(&train.design_matrix(&schema), &targets)
            .map_err(model_err)?;
        let scores = predictor
            .predict(&current_space.design_matrix(&schema))
            .map_err(model_err)?;

        debug!(
            "{} {}: trained on {} rows x {} features, scored {}",
            period,
            role,
            train.len(),
            schema.len(),
            scores.len()
        );
        Ok(scores)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::scoring::FANTASY_POINTS;
    use crate::stats::{StatRecord, StatTable};

    /// Predicts the mean training target for every row.
    #[derive(Default)]
    struct MeanPredictor {
        mean: Option<f64>,
    }

    impl Predictor for MeanPredictor {
        fn fit(&mut self, features: &[Vec<f64>], targets: &[f64]) -> Result<(), ModelError> {
            if features.is_empty() {
                return Err(ModelError::EmptyTrainingSet);
            }
            self.mean = Some(targets.iter().sum::<f64>() / targets.len() as f64);
            Ok(())
        }

        fn predict(&self, features: &[Vec<f64>]) -> Result<Vec<f64>, ModelError> {
            let mean = self.mean.ok_or(ModelError::NotFitted)?;
            Ok(vec![mean; features.len()])
        }
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2019, 9, d).unwrap()
    }

    fn qb_game(name: &str, d: u32, points: f64) -> StatRecord {
        StatRecord::new(name, day(d), "NE")
            .with_stat("pass_att", 35.0)
            .with_stat(FANTASY_POINTS, points)
    }

    fn wr_game(name: &str, d: u32, points: f64) -> StatRecord {
        StatRecord::new(name, day(d), "NE")
            .with_stat("pass_att", 0.0)
            .with_stat("rec", 5.0)
            .with_stat(FANTASY_POINTS, points)
    }

    fn tables() -> TableSet {
        let offense = StatTable::new(
            "offense",
            vec![
                qb_game("ALLEN", 1, 10.0),
                qb_game("ALLEN", 8, 20.0),
                qb_game("ALLEN", 15, 30.0),
                qb_game("ALLEN", 22, 1000.0),
                wr_game("BROWN", 1, 4.0),
                wr_game("BROWN", 8, 8.0),
                wr_game("BROWN", 15, 500.0),
            ],
        );
        let defense = StatTable::new(
            "defenseTeam",
            vec![
                StatRecord::new("NE", day(1), "BUF").with_stat(FANTASY_POINTS, 12.0),
                StatRecord::new("NE", day(8), "BUF").with_stat(FANTASY_POINTS, 6.0),
            ],
        );
        [
            offense,
            StatTable::new("advancedPassing", vec![]),
            StatTable::new("advancedRushing", vec![]),
            StatTable::new("advancedReceiving", vec![]),
            defense,
            StatTable::new("offenseTeam", vec![]),
        ]
        .into_iter()
        .collect()
    }

    fn config() -> FeatureConfig {
        FeatureConfig::new(NaiveDate::from_ymd_opt(2019, 8, 1).unwrap())
    }

    fn slate(role: Role, name: &str, d: u32) -> RoleMatchup {
        RoleMatchup {
            role,
            matchup: Matchup::new(name, day(d), "NE"),
        }
    }

    #[test]
    fn training_space_excludes_period_and_later() {
        let tables = tables();
        let mut pipeline = WalkForwardPipeline::new(&tables, &config()).unwrap();
        for role in Role::ALL {
            let train = pipeline.training_space(role, day(15));
            assert!(train.rows().iter().all(|r| r.date < day(15)));
        }
        assert_eq!(pipeline.training_space(Role::Passer, day(15)).len(), 2);
        assert_eq!(pipeline.training_space(Role::Passer, day(1)).len(), 0);
    }

    #[test]
    fn each_period_trains_only_on_earlier_games() {
        let tables = tables();
        let mut pipeline = WalkForwardPipeline::new(&tables, &config()).unwrap();
        let mut by_period = BTreeMap::new();
        by_period.insert(
            ScoringPeriod::new(2019, 3),
            vec![slate(Role::Passer, "ALLEN", 15), slate(Role::SkillPlayer, "BROWN", 15)],
        );
        by_period.insert(
            ScoringPeriod::new(2019, 4),
            vec![slate(Role::Passer, "ALLEN", 22)],
        );

        let predictions = pipeline.run(&by_period, |_| MeanPredictor::default()).unwrap();

        let week3 = &predictions[&ScoringPeriod::new(2019, 3)];
        assert!((week3["ALLEN"] - 15.0).abs() < 1e-9);
        assert!((week3["BROWN"] - 6.0).abs() < 1e-9);
        // week 4 sees week 3's 30 points but not its own 1000
        let week4 = &predictions[&ScoringPeriod::new(2019, 4)];
        assert!((week4["ALLEN"] - 20.0).abs() < 1e-9);
    }

    #[test]
    fn predictor_is_fresh_per_period_and_role() {
        let tables = tables();
        let mut pipeline = WalkForwardPipeline::new(&tables, &config()).unwrap();
        let mut by_period = BTreeMap::new();
        by_period.insert(
            ScoringPeriod::new(2019, 3),
            vec![slate(Role::Passer, "ALLEN", 15), slate(Role::TeamDefense, "NE", 15)],
        );
        by_period.insert(
            ScoringPeriod::new(2019, 4),
            vec![slate(Role::Passer, "ALLEN", 22)],
        );

        let mut made = Vec::new();
        pipeline
            .run(&by_period, |role| {
                made.push(role);
                MeanPredictor::default()
            })
            .unwrap();
        assert_eq!(made, vec![Role::Passer, Role::TeamDefense, Role::Passer]);
    }

    #[test]
    fn same_name_in_two_roles_is_an_error() {
        let tables = tables();
        let mut pipeline = WalkForwardPipeline::new(&tables, &config()).unwrap();
        let mut by_period = BTreeMap::new();
        by_period.insert(
            ScoringPeriod::new(2019, 3),
            vec![slate(Role::Passer, "NE", 15), slate(Role::TeamDefense, "NE", 15)],
        );
        let err = pipeline
            .run(&by_period, |_| MeanPredictor::default())
            .unwrap_err();
        match err {
            PipelineError::DuplicateName { period, name } => {
                assert_eq!(period, ScoringPeriod::new(2019, 3));
                assert_eq!(name, "NE");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn role_without_history_is_an_error() {
        let tables = tables();
        let mut pipeline = WalkForwardPipeline::new(&tables, &config()).unwrap();
        let mut by_period = BTreeMap::new();
        by_period.insert(
            ScoringPeriod::new(2019, 1),
            vec![slate(Role::Passer, "ALLEN", 1)],
        );
        let err = pipeline
            .run(&by_period, |_| MeanPredictor::default())
            .unwrap_err();
        assert!(matches!(
            err,
            PipelineError::InsufficientHistory { role: Role::Passer, .. }
        ));
    }
}
