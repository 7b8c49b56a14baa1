// Stat tables: per-game records, fantasy scoring rules, and table builds.

pub mod build;
pub mod csv_io;
pub mod record;
pub mod scoring;

pub use record::{StatMap, StatRecord, StatTable, TableSet};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StatsError {
    /// The table was never built or imported. Requires an explicit rebuild.
    #[error("stat table `{table}` not found; import or rebuild it before running")]
    TableNotFound { table: String },

    #[error("failed to read file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("CSV error in {path}: {source}")]
    Csv { path: String, source: csv::Error },

    #[error("invalid date `{value}` (expected YYYY-MM-DD)")]
    InvalidDate { value: String },

    #[error("missing required column `{column}`")]
    MissingColumn { column: String },

    #[error("validation error: {0}")]
    Validation(String),
}
