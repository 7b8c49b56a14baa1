// CSV readers for raw stat lines and game scores.
//
// Stat CSVs are wide: `name,date,opp` followed by any number of numeric stat
// columns. Empty cells become missing values; a trailing `%` is stripped.

use std::io::Read;
use std::path::Path;

use chrono::NaiveDate;
use serde::Deserialize;
use tracing::warn;

use super::build::{normalize_team, GameScore};
use super::{StatRecord, StatsError};

const DATE_FORMAT: &str = "%Y-%m-%d";

pub fn parse_date(value: &str) -> Result<NaiveDate, StatsError> {
    NaiveDate::parse_from_str(value.trim(), DATE_FORMAT).map_err(|_| StatsError::InvalidDate {
        value: value.to_string(),
    })
}

/// Parse a numeric cell. `Ok(None)` for an empty cell, `Err(())` for garbage.
fn parse_cell(cell: &str) -> Result<Option<f64>, ()> {
    let cell = cell.trim().trim_end_matches('%');
    if cell.is_empty() {
        return Ok(None);
    }
    match cell.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(Some(v)),
        _ => Err(()),
    }
}

fn column_index(headers: &csv::StringRecord, names: &[&str]) -> Result<usize, StatsError> {
    headers
        .iter()
        .position(|h| names.iter().any(|n| h.trim().eq_ignore_ascii_case(n)))
        .ok_or_else(|| StatsError::MissingColumn {
            column: names[0].to_string(),
        })
}

fn stat_rows_from_reader<R: Read>(rdr: R, path: &str) -> Result<Vec<StatRecord>, StatsError> {
    let csv_err = |source| StatsError::Csv {
        path: path.to_string(),
        source,
    };
    let mut reader = csv::Reader::from_reader(rdr);
    let headers = reader.headers().map_err(csv_err)?.clone();

    let name_idx = column_index(&headers, &["name", "player"])?;
    let date_idx = column_index(&headers, &["date"])?;
    let opp_idx = column_index(&headers, &["opp", "opponent"])?;

    let mut rows = Vec::new();
    for result in reader.records() {
        let record = match result {
            Ok(r) => r,
            Err(e) => {
                warn!("skipping malformed stat row in {}: {}", path, e);
                continue;
            }
        };
        let name = record.get(name_idx).unwrap_or_default().trim();
        let date = match parse_date(record.get(date_idx).unwrap_or_default()) {
            Ok(d) => d,
            Err(e) => {
                warn!("skipping stat row for '{}' in {}: {}", name, path, e);
                continue;
            }
        };
        let opponent = record.get(opp_idx).unwrap_or_default().trim();

        let mut row = StatRecord::new(name, date, opponent);
        for (idx, header) in headers.iter().enumerate() {
            if idx == name_idx || idx == date_idx || idx == opp_idx {
                continue;
            }
            let cell = record.get(idx).unwrap_or_default();
            let value = parse_cell(cell).unwrap_or_else(|()| {
                warn!("non-numeric {} value '{}' for '{}'; treating as missing", header, cell, name);
                None
            });
            row.stats.insert(header.trim().to_string(), value);
        }
        rows.push(row);
    }
    Ok(rows)
}

#[derive(Debug, Deserialize)]
struct RawGameScore {
    date: String,
    home: String,
    away: String,
    home_score: f64,
    away_score: f64,
}

fn game_scores_from_reader<R: Read>(rdr: R, path: &str) -> Result<Vec<GameScore>, StatsError> {
    let mut reader = csv::Reader::from_reader(rdr);
    let mut scores = Vec::new();
    for result in reader.deserialize::<RawGameScore>() {
        match result {
            Ok(raw) => {
                let date = match parse_date(&raw.date) {
                    Ok(d) => d,
                    Err(e) => {
                        warn!("skipping game score in {}: {}", path, e);
                        continue;
                    }
                };
                scores.push(GameScore {
                    date,
                    home: normalize_team(&raw.home),
                    away: normalize_team(&raw.away),
                    home_score: raw.home_score,
                    away_score: raw.away_score,
                });
            }
            Err(e) => warn!("skipping malformed game score row in {}: {}", path, e),
        }
    }
    Ok(scores)
}

fn open(path: &Path) -> Result<std::fs::File, StatsError> {
    std::fs::File::open(path).map_err(|e| StatsError::Io {
        path: path.display().to_string(),
        source: e,
    })
}

/// Load raw stat lines from a wide CSV file.
pub fn load_stat_rows(path: &Path) -> Result<Vec<StatRecord>, StatsError> {
    let file = open(path)?;
    stat_rows_from_reader(file, &path.display().to_string())
}

/// Load final game scores (`date,home,away,home_score,away_score`).
pub fn load_game_scores(path: &Path) -> Result<Vec<GameScore>, StatsError> {
    let file = open(path)?;
    game_scores_from_reader(file, &path.display().to_string())
}
