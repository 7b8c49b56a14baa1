// Lineup construction: roster rules, the 0/1 program solver, and the stacking optimizer.

pub mod optimizer;
pub mod roster;
pub mod solver;

pub use optimizer::{
    rank_stacks, stack_seeds, LineupOptimizer, OptimizerError, StackConfig, StackSeed,
    DEFAULT_LINEUPS_PER_SLATE,
};
pub use roster::{Lineup, LineupViolation, Player, Position, PositionQuota, RosterRules};
pub use solver::{BinaryProgram, BinarySolver, Comparison, LinearConstraint, MicroLpSolver, SolverError};
