// Library root: point-in-time feature aggregation, walk-forward training,
// lineup optimization, and contest backtesting for daily fantasy football.

pub mod backtest;
pub mod db;
pub mod features;
pub mod lineup;
pub mod model;
pub mod pipeline;
pub mod slate;
pub mod stats;
