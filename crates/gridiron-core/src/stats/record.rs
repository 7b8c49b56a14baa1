// Per-game stat records and the in-memory table store.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::ops::Range;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::StatsError;

/// Numeric stat name -> value. `None` marks a missing cell.
pub type StatMap = BTreeMap<String, Option<f64>>;

/// One row per (entity, date, opponent). The entity is a normalized player
/// name for player tables and a team abbreviation for team tables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatRecord {
    pub name: String,
    pub date: NaiveDate,
    pub opponent: String,
    pub stats: StatMap,
}

impl StatRecord {
    pub fn new(name: impl Into<String>, date: NaiveDate, opponent: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            date,
            opponent: opponent.into(),
            stats: StatMap::new(),
        }
    }

    /// Builder-style setter, mostly for fixtures and derived tables.
    pub fn with_stat(mut self, stat: &str, value: f64) -> Self {
        self.stats.insert(stat.to_string(), Some(value));
        self
    }

    /// Record an explicitly missing cell.
    pub fn with_missing(mut self, stat: &str) -> Self {
        self.stats.insert(stat.to_string(), None);
        self
    }

    /// The value of `stat`, or `None` when the cell is absent or missing.
    pub fn stat(&self, stat: &str) -> Option<f64> {
        self.stats.get(stat).copied().flatten()
    }

    pub fn stat_or_zero(&self, stat: &str) -> f64 {
        self.stat(stat).unwrap_or(0.0)
    }
}

/// A named, read-only collection of stat records indexed by entity.
///
/// Rows are stored sorted by (entity, date); rows sharing an entity and date
/// keep their input order. The column list is the sorted union of every stat
/// name seen in any row.
#[derive(Debug, Clone)]
pub struct StatTable {
    name: String,
    columns: Vec<String>,
    rows: Vec<StatRecord>,
    index: HashMap<String, Range<usize>>,
}

impl StatTable {
    pub fn new(name: impl Into<String>, mut rows: Vec<StatRecord>) -> Self {
        rows.sort_by(|a, b| a.name.cmp(&b.name).then(a.date.cmp(&b.date)));

        let columns: BTreeSet<&String> = rows.iter().flat_map(|r| r.stats.keys()).collect();
        let columns = columns.into_iter().cloned().collect();

        let mut index = HashMap::new();
        let mut start = 0;
        while start < rows.len() {
            let entity = &rows[start].name;
            let len = rows[start..]
                .iter()
                .take_while(|r| &r.name == entity)
                .count();
            index.insert(entity.clone(), start..start + len);
            start += len;
        }

        Self {
            name: name.into(),
            columns,
            rows,
            index,
        }
    }

    /// Concatenate several tables (typically one per season) under one name.
    pub fn concat(name: impl Into<String>, tables: impl IntoIterator<Item = StatTable>) -> Self {
        let rows = tables.into_iter().flat_map(|t| t.rows).collect();
        Self::new(name, rows)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[StatRecord] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn into_rows(self) -> Vec<StatRecord> {
        self.rows
    }

    /// Every row for `entity`, ascending by date.
    pub fn entity_rows(&self, entity: &str) -> &[StatRecord] {
        self.index
            .get(entity)
            .map(|range| &self.rows[range.clone()])
            .unwrap_or(&[])
    }

    /// Rows for `entity` dated strictly before `before`, ascending by date.
    pub fn history(&self, entity: &str, before: NaiveDate) -> &[StatRecord] {
        let rows = self.entity_rows(entity);
        let end = rows.partition_point(|r| r.date < before);
        &rows[..end]
    }

    /// The first row for `entity` on exactly `date`.
    pub fn find(&self, entity: &str, date: NaiveDate) -> Option<&StatRecord> {
        let rows = self.entity_rows(entity);
        let start = rows.partition_point(|r| r.date < date);
        rows.get(start).filter(|r| r.date == date)
    }
}

/// Named stat tables, loaded read-only for the duration of a run.
#[derive(Debug, Clone, Default)]
pub struct TableSet {
    tables: HashMap<String, StatTable>,
}

impl TableSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a table, replacing (and returning) any table with the same name.
    pub fn insert(&mut self, table: StatTable) -> Option<StatTable> {
        self.tables.insert(table.name().to_string(), table)
    }

    /// Look up a table by name. A missing table is fatal for the caller:
    /// it must be imported or rebuilt, never silently skipped.
    pub fn get(&self, name: &str) -> Result<&StatTable, StatsError> {
        self.tables.get(name).ok_or_else(|| StatsError::TableNotFound {
            table: name.to_string(),
        })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tables.contains_key(name)
    }

    /// Table names in sorted order.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tables.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

impl FromIterator<StatTable> for TableSet {
    fn from_iter<I: IntoIterator<Item = StatTable>>(iter: I) -> Self {
        let mut set = TableSet::new();
        for table in iter {
            set.insert(table);
        }
        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2019, 10, d).unwrap()
    }

    fn sample_table() -> StatTable {
        StatTable::new(
            "offense",
            vec![
                StatRecord::new("BRADY", day(20), "NYJ").with_stat("pass_yds", 300.0),
                StatRecord::new("ALLEN", day(6), "TEN").with_stat("rush_yds", 40.0),
                StatRecord::new("BRADY", day(6), "WAS").with_stat("pass_yds", 250.0),
                StatRecord::new("BRADY", day(13), "NYG").with_missing("pass_td"),
            ],
        )
    }

    #[test]
    fn rows_sorted_by_entity_then_date() {
        let table = sample_table();
        let keys: Vec<(&str, NaiveDate)> = table
            .rows()
            .iter()
            .map(|r| (r.name.as_str(), r.date))
            .collect();
        assert_eq!(
            keys,
            vec![
                ("ALLEN", day(6)),
                ("BRADY", day(6)),
                ("BRADY", day(13)),
                ("BRADY", day(20)),
            ]
        );
    }

    #[test]
    fn columns_are_sorted_union() {
        let table = sample_table();
        assert_eq!(table.columns(), &["pass_td", "pass_yds", "rush_yds"]);
    }

    #[test]
    fn history_is_strictly_before() {
        let table = sample_table();
        let hist = table.history("BRADY", day(13));
        assert_eq!(hist.len(), 1);
        assert_eq!(hist[0].date, day(6));

        assert_eq!(table.history("BRADY", day(21)).len(), 3);
        assert!(table.history("BRADY", day(6)).is_empty());
        assert!(table.history("NOBODY", day(30)).is_empty());
    }

    #[test]
    fn find_exact_date() {
        let table = sample_table();
        assert_eq!(table.find("BRADY", day(13)).unwrap().opponent, "NYG");
        assert!(table.find("BRADY", day(14)).is_none());
    }

    #[test]
    fn missing_cell_reads_as_none() {
        let table = sample_table();
        let row = table.find("BRADY", day(13)).unwrap();
        assert_eq!(row.stat("pass_td"), None);
        assert_eq!(row.stat_or_zero("pass_td"), 0.0);
    }

    #[test]
    fn concat_merges_seasons() {
        let a = StatTable::new("offense", vec![StatRecord::new("A", day(1), "X")]);
        let b = StatTable::new("offense", vec![StatRecord::new("A", day(2), "Y")]);
        let merged = StatTable::concat("offense", [a, b]);
        assert_eq!(merged.entity_rows("A").len(), 2);
    }

    #[test]
    fn table_set_missing_table_is_error() {
        let set: TableSet = [sample_table()].into_iter().collect();
        assert!(set.get("offense").is_ok());
        match set.get("advancedPassing") {
            Err(StatsError::TableNotFound { table }) => assert_eq!(table, "advancedPassing"),
            other => panic!("expected TableNotFound, got {other:?}"),
        }
    }
}
