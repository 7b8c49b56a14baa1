// Configuration loading and validation (config/gridiron.toml).

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use gridiron_core::backtest::PayoutRule;
use gridiron_core::features::{FeatureConfig, HISTORY_WINDOW};
use gridiron_core::lineup::{RosterRules, StackConfig, DEFAULT_LINEUPS_PER_SLATE};
use gridiron_core::model::ForestConfig;
use serde::Deserialize;
use thiserror::Error;

const CONFIG_FILE: &str = "gridiron.toml";
const DEFAULT_DB_FILE: &str = "gridiron.db";

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("validation error for field `{field}`: {message}")]
    ValidationError { field: String, message: String },

    #[error("failed to initialize config from defaults: {message}")]
    DefaultsCopyError { message: String },
}

// ---------------------------------------------------------------------------
// Top-level assembled Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Config {
    pub db_path: String,
    pub data: DataPaths,
    pub train_seasons: Vec<i32>,
    pub start_dates: BTreeMap<i32, NaiveDate>,
    pub features: FeaturesConfig,
    pub model: ForestConfig,
    pub contest: ContestConfig,
    pub stacks: Vec<StackConfig>,
}

impl Config {
    /// Default matchups start after the opening date of the earliest
    /// training season.
    pub fn feature_config(&self) -> Result<FeatureConfig, ConfigError> {
        let first = self
            .train_seasons
            .iter()
            .min()
            .and_then(|s| self.start_dates.get(s))
            .ok_or_else(|| ConfigError::ValidationError {
                field: "seasons.train".into(),
                message: "no start date for the earliest training season".into(),
            })?;
        Ok(FeatureConfig {
            start_date: *first,
            history_window: self.features.history_window,
        })
    }

    pub fn roster_rules(&self) -> RosterRules {
        RosterRules::default().with_salary_cap(self.contest.salary_cap)
    }

    pub fn payout_rule(&self) -> PayoutRule {
        PayoutRule {
            win: self.contest.win_payout,
            loss: self.contest.loss_payout,
            failure_penalty: self.contest.failure_penalty,
        }
    }
}

/// Input files, resolved against the directory the config was loaded from.
#[derive(Debug, Clone)]
pub struct DataPaths {
    pub slate: PathBuf,
    /// Precomputed double-up cutoffs (`season,week,points`).
    pub cutoffs: Option<PathBuf>,
    /// Full contest standings (`season,week,rank,points`) to derive cutoffs from.
    pub standings: Option<PathBuf>,
    /// Payout table (`max_rank,payout`) applied to derived standings.
    pub payouts: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct FeaturesConfig {
    pub history_window: usize,
}

impl Default for FeaturesConfig {
    fn default() -> Self {
        Self {
            history_window: HISTORY_WINDOW,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct ContestConfig {
    pub salary_cap: f64,
    pub lineups_per_slate: usize,
    pub win_payout: f64,
    pub loss_payout: f64,
    pub failure_penalty: f64,
}

impl Default for ContestConfig {
    fn default() -> Self {
        let rule = PayoutRule::default();
        Self {
            salary_cap: RosterRules::default().salary_cap,
            lineups_per_slate: DEFAULT_LINEUPS_PER_SLATE,
            win_payout: rule.win,
            loss_payout: rule.loss,
            failure_penalty: rule.failure_penalty,
        }
    }
}

// ---------------------------------------------------------------------------
// gridiron.toml structs
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct GridironFile {
    data: DataSection,
    seasons: SeasonsSection,
    #[serde(default)]
    features: FeaturesConfig,
    #[serde(default)]
    model: ForestConfig,
    #[serde(default)]
    contest: ContestConfig,
    #[serde(default)]
    stacks: Vec<StackEntry>,
}

#[derive(Debug, Deserialize)]
struct DataSection {
    database: Option<String>,
    slate: PathBuf,
    cutoffs: Option<PathBuf>,
    standings: Option<PathBuf>,
    payouts: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
struct SeasonsSection {
    train: Vec<i32>,
    #[serde(default)]
    start_dates: BTreeMap<String, NaiveDate>,
}

#[derive(Debug, Deserialize)]
struct StackEntry {
    teams: usize,
    size: usize,
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Load and validate `config/gridiron.toml` relative to `base_dir`.
///
/// This is the lower-level loading primitive that does not auto-copy defaults.
/// Prefer `load_config()` which handles default initialization automatically.
pub(crate) fn load_config_from(base_dir: &Path) -> Result<Config, ConfigError> {
    let path = base_dir.join("config").join(CONFIG_FILE);
    let text = read_file(&path)?;
    let file: GridironFile = toml::from_str(&text).map_err(|e| ConfigError::ParseError {
        path: path.clone(),
        source: e,
    })?;

    let mut start_dates = BTreeMap::new();
    for (season, date) in file.seasons.start_dates {
        let year: i32 = season.trim().parse().map_err(|_| ConfigError::ValidationError {
            field: format!("seasons.start_dates.{season}"),
            message: "season key must be a year".into(),
        })?;
        start_dates.insert(year, date);
    }

    let db_path = match file.data.database {
        Some(p) => resolve(base_dir, Path::new(&p)).display().to_string(),
        None => default_db_path(base_dir),
    };

    let config = Config {
        db_path,
        data: DataPaths {
            slate: resolve(base_dir, &file.data.slate),
            cutoffs: file.data.cutoffs.map(|p| resolve(base_dir, &p)),
            standings: file.data.standings.map(|p| resolve(base_dir, &p)),
            payouts: file.data.payouts.map(|p| resolve(base_dir, &p)),
        },
        train_seasons: file.seasons.train,
        start_dates,
        features: file.features,
        model: file.model,
        contest: file.contest,
        stacks: file
            .stacks
            .into_iter()
            .map(|s| StackConfig::new(s.teams, s.size))
            .collect(),
    };

    validate(&config)?;

    Ok(config)
}

/// Ensure all config files exist by copying missing ones from `defaults/`.
/// Returns the list of files that were copied. Skips `.example` files.
pub fn ensure_config_files(base_dir: &Path) -> Result<Vec<PathBuf>, ConfigError> {
    let defaults_dir = base_dir.join("defaults");
    let config_dir = base_dir.join("config");

    if !defaults_dir.exists() {
        if !config_dir.exists() {
            return Err(ConfigError::DefaultsCopyError {
                message: format!(
                    "neither defaults/ nor config/ directory found in {}; \
                     run from the project root or ensure defaults/ is present",
                    base_dir.display()
                ),
            });
        }
        return Ok(vec![]);
    }

    std::fs::create_dir_all(&config_dir).map_err(|e| ConfigError::DefaultsCopyError {
        message: format!("failed to create config directory: {e}"),
    })?;

    let entries = std::fs::read_dir(&defaults_dir).map_err(|e| ConfigError::DefaultsCopyError {
        message: format!("failed to read defaults directory: {e}"),
    })?;

    let mut copied = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| ConfigError::DefaultsCopyError {
            message: format!("failed to read defaults entry: {e}"),
        })?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let Some(file_name) = path.file_name() else {
            continue;
        };
        if file_name.to_str().is_some_and(|n| n.ends_with(".example")) {
            continue;
        }
        let target = config_dir.join(file_name);

        match std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&target)
        {
            Ok(mut dest) => {
                let content = std::fs::read(&path).map_err(|e| ConfigError::DefaultsCopyError {
                    message: format!("failed to read {}: {e}", path.display()),
                })?;
                std::io::Write::write_all(&mut dest, &content).map_err(|e| {
                    ConfigError::DefaultsCopyError {
                        message: format!("failed to write {}: {e}", target.display()),
                    }
                })?;
                copied.push(target);
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {}
            Err(e) => {
                return Err(ConfigError::DefaultsCopyError {
                    message: format!("failed to create {}: {e}", target.display()),
                });
            }
        }
    }

    Ok(copied)
}

/// Load config relative to the current working directory, copying defaults
/// into `config/` first.
pub fn load_config() -> Result<Config, ConfigError> {
    let cwd = std::env::current_dir().map_err(|_| ConfigError::FileNotFound {
        path: PathBuf::from("."),
    })?;
    ensure_config_files(&cwd)?;
    load_config_from(&cwd)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn read_file(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
        path: path.to_path_buf(),
    })
}

fn resolve(base_dir: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base_dir.join(path)
    }
}

/// `<platform data dir>/gridiron.db`, falling back to `base_dir` when the
/// platform has no home directory.
fn default_db_path(base_dir: &Path) -> String {
    directories::ProjectDirs::from("", "", "gridiron")
        .map(|dirs| dirs.data_dir().join(DEFAULT_DB_FILE))
        .unwrap_or_else(|| base_dir.join(DEFAULT_DB_FILE))
        .display()
        .to_string()
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn invalid(field: &str, message: impl Into<String>) -> ConfigError {
    ConfigError::ValidationError {
        field: field.into(),
        message: message.into(),
    }
}

fn validate(config: &Config) -> Result<(), ConfigError> {
    if config.train_seasons.is_empty() {
        return Err(invalid("seasons.train", "at least one season is required"));
    }
    for season in &config.train_seasons {
        if !config.start_dates.contains_key(season) {
            return Err(invalid(
                "seasons.start_dates",
                format!("missing start date for season {season}"),
            ));
        }
    }

    if config.data.cutoffs.is_none() && config.data.standings.is_none() {
        return Err(invalid("data.cutoffs", "set either data.cutoffs or data.standings"));
    }
    // Tiers are ranked against standings; precomputed cutoffs carry no ranks.
    if config.data.payouts.is_some()
        && (config.data.standings.is_none() || config.data.cutoffs.is_some())
    {
        return Err(invalid(
            "data.payouts",
            "payouts apply to derived cutoffs; set data.standings and omit data.cutoffs",
        ));
    }

    let counts: &[(&str, usize)] = &[
        ("features.history_window", config.features.history_window),
        ("model.n_trees", config.model.n_trees),
        ("model.min_samples_split", config.model.min_samples_split),
        ("contest.lineups_per_slate", config.contest.lineups_per_slate),
    ];
    for (name, val) in counts {
        if *val == 0 {
            return Err(invalid(name, "must be > 0"));
        }
    }
    if config.model.max_features == Some(0) {
        return Err(invalid("model.max_features", "must be > 0 when set"));
    }

    if config.contest.salary_cap <= 0.0 {
        return Err(invalid(
            "contest.salary_cap",
            format!("must be > 0, got {}", config.contest.salary_cap),
        ));
    }

    if config.stacks.is_empty() {
        return Err(invalid("stacks", "at least one stack configuration is required"));
    }
    for stack in &config.stacks {
        if stack.teams_to_stack == 0 {
            return Err(invalid("stacks.teams", "must be > 0"));
        }
        if stack.stack_size == 0 {
            return Err(invalid("stacks.size", "must be >= 1"));
        }
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
