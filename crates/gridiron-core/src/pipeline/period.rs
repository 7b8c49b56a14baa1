// Scoring periods (season + week) and chronological grouping.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// One slate of games. Ordering is chronological: season, then week.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ScoringPeriod {
    pub season: i32,
    pub week: u32,
}

impl ScoringPeriod {
    pub fn new(season: i32, week: u32) -> Self {
        Self { season, week }
    }
}

impl fmt::Display for ScoringPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} week {}", self.season, self.week)
    }
}

/// Group items by period, periods in chronological order and items in input
/// order within each period.
pub fn group_by_period<T, F>(
    items: impl IntoIterator<Item = T>,
    period_of: F,
) -> BTreeMap<ScoringPeriod, Vec<T>>
where
    F: Fn(&T) -> ScoringPeriod,
{
    let mut grouped: BTreeMap<ScoringPeriod, Vec<T>> = BTreeMap::new();
    for item in items {
        grouped.entry(period_of(&item)).or_default().push(item);
    }
    grouped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn periods_order_by_season_then_week() {
        let mut periods = vec![
            ScoringPeriod::new(2020, 1),
            ScoringPeriod::new(2019, 17),
            ScoringPeriod::new(2019, 2),
        ];
        periods.sort();
        assert_eq!(
            periods,
            vec![
                ScoringPeriod::new(2019, 2),
                ScoringPeriod::new(2019, 17),
                ScoringPeriod::new(2020, 1),
            ]
        );
        assert_eq!(periods[1].to_string(), "2019 week 17");
    }

    #[test]
    fn grouping_keeps_input_order_within_period() {
        let items = vec![(2019, 3, "a"), (2019, 1, "b"), (2019, 3, "c")];
        let grouped = group_by_period(items, |&(s, w, _)| ScoringPeriod::new(s, w));
        let keys: Vec<ScoringPeriod> = grouped.keys().copied().collect();
        assert_eq!(keys, vec![ScoringPeriod::new(2019, 1), ScoringPeriod::new(2019, 3)]);
        let week3: Vec<&str> = grouped[&ScoringPeriod::new(2019, 3)]
            .iter()
            .map(|t| t.2)
            .collect();
        assert_eq!(week3, vec!["a", "c"]);
    }
}
