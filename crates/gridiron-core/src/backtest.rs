// Contest backtesting: score generated lineups against historical double-up
// cutoffs and aggregate net return per stacking configuration.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, info};

use crate::lineup::{BinarySolver, Lineup, LineupOptimizer, Player, StackConfig};
use crate::pipeline::{PredictionsByPeriod, ScoringPeriod};
use crate::slate::{Slate, StandingsCutoff};

#[derive(Debug, Error, PartialEq)]
pub enum BacktestError {
    #[error("no payout cutoff for {period}")]
    MissingCutoff { period: ScoringPeriod },

    #[error("no predictions for {period}")]
    MissingPredictions { period: ScoringPeriod },
}

/// Fixed payouts per lineup, in entry-fee currency units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PayoutRule {
    pub win: f64,
    pub loss: f64,
    /// Net return of a period whose lineups could not be generated.
    pub failure_penalty: f64,
}

impl Default for PayoutRule {
    fn default() -> Self {
        Self {
            win: 20.0,
            loss: -20.0,
            failure_penalty: -1000.0,
        }
    }
}

/// A lineup cashes when its realized score reaches the cutoff.
pub fn lineup_payout(score: f64, cutoff: f64, rule: &PayoutRule) -> f64 {
    if score >= cutoff {
        rule.win
    } else {
        rule.loss
    }
}

/// Net return per team for one period's lineups.
pub fn team_returns(
    lineups_by_team: &BTreeMap<String, Vec<Lineup>>,
    cutoff: &StandingsCutoff,
    rule: &PayoutRule,
) -> BTreeMap<String, f64> {
    lineups_by_team
        .iter()
        .map(|(team, lineups)| {
            let net = lineups
                .iter()
                .map(|l| lineup_payout(l.realized(), cutoff.points, rule))
                .sum();
            (team.clone(), net)
        })
        .collect()
}

/// Winnings of every lineup under the cutoff's payout tiers. Zero when the
/// cutoff carries no tiers.
pub fn tiered_winnings(lineups_by_team: &BTreeMap<String, Vec<Lineup>>, cutoff: &StandingsCutoff) -> f64 {
    lineups_by_team
        .values()
        .flatten()
        .map(|l| cutoff.tiered_payout(l.realized()))
        .sum()
}

/// Net return of every lineup across every stacked team for one period.
pub fn evaluate(
    period: ScoringPeriod,
    lineups_by_team: &BTreeMap<String, Vec<Lineup>>,
    cutoff: &StandingsCutoff,
    rule: &PayoutRule,
) -> Result<f64, BacktestError> {
    if cutoff.period != period {
        return Err(BacktestError::MissingCutoff { period });
    }
    Ok(team_returns(lineups_by_team, cutoff, rule).values().sum())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodResult {
    pub period: ScoringPeriod,
    pub net_return: f64,
    /// Gross winnings had the lineups been entered in the tiered contest.
    pub tiered_winnings: f64,
    pub lineups: usize,
    pub solver_failed: bool,
    pub by_team: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestReport {
    pub config: StackConfig,
    pub periods: Vec<PeriodResult>,
}

impl BacktestReport {
    pub fn total(&self) -> f64 {
        self.periods.iter().map(|p| p.net_return).sum()
    }

    pub fn tiered_total(&self) -> f64 {
        self.periods.iter().map(|p| p.tiered_winnings).sum()
    }

    pub fn failures(&self) -> usize {
        self.periods.iter().filter(|p| p.solver_failed).count()
    }

    pub fn lineups(&self) -> usize {
        self.periods.iter().map(|p| p.lineups).sum()
    }
}

/// Reports ordered best total first. Ties keep configuration order.
pub fn rank_reports(reports: &[BacktestReport]) -> Vec<&BacktestReport> {
    let mut ranked: Vec<&BacktestReport> = reports.iter().collect();
    ranked.sort_by(|a, b| b.total().total_cmp(&a.total()));
    ranked
}

pub struct BacktestSimulator<S> {
    optimizer: LineupOptimizer<S>,
    rule: PayoutRule,
}

impl<S: BinarySolver> BacktestSimulator<S> {
    pub fn new(optimizer: LineupOptimizer<S>, rule: PayoutRule) -> Self {
        Self { optimizer, rule }
    }

    pub fn rule(&self) -> &PayoutRule {
        &self.rule
    }

    /// Generate and score one period's lineups. A failed optimization turns
    /// the whole period into the failure penalty.
    pub fn run_period(
        &self,
        period: ScoringPeriod,
        pool: &[Player],
        cutoff: &StandingsCutoff,
        config: StackConfig,
    ) -> Result<PeriodResult, BacktestError> {
        let lineups_by_team = match self.optimizer.optimize(pool, config) {
            Ok(lineups) => lineups,
            Err(e) => {
                error!("{} {}: optimization failed, scoring penalty: {}", period, config, e);
                return Ok(PeriodResult {
                    period,
                    net_return: self.rule.failure_penalty,
                    tiered_winnings: 0.0,
                    lineups: 0,
                    solver_failed: true,
                    by_team: BTreeMap::new(),
                });
            }
        };

        let net_return = evaluate(period, &lineups_by_team, cutoff, &self.rule)?;
        Ok(PeriodResult {
            period,
            net_return,
            tiered_winnings: tiered_winnings(&lineups_by_team, cutoff),
            lineups: lineups_by_team.values().map(Vec::len).sum(),
            solver_failed: false,
            by_team: team_returns(&lineups_by_team, cutoff, &self.rule),
        })
    }

    /// Backtest one stacking configuration over every period of the slate.
    pub fn run(
        &self,
        slate: &Slate,
        predictions: &PredictionsByPeriod,
        cutoffs: &BTreeMap<ScoringPeriod, StandingsCutoff>,
        config: StackConfig,
    ) -> Result<BacktestReport, BacktestError> {
        let mut periods = Vec::new();
        for period in slate.periods() {
            let scores = predictions
                .get(&period)
                .ok_or(BacktestError::MissingPredictions { period })?;
            let cutoff = cutoffs
                .get(&period)
                .ok_or(BacktestError::MissingCutoff { period })?;

            let pool = slate.player_pool(period, scores);
            let result = self.run_period(period, &pool, cutoff, config)?;
            info!(
                "{} {}: net {:+.0} over {} lineups",
                config, period, result.net_return, result.lineups
            );
            periods.push(result);
        }

        let report = BacktestReport { config, periods };
        info!(
            "{}: total {:+.0}, tiered winnings {:.0}",
            config,
            report.total(),
            report.tiered_total()
        );
        Ok(report)
    }
}
