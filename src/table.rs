//! Date-indexed price tables and calendar utilities

use chrono::NaiveDate;
use std::collections::{BTreeMap, HashMap};

use crate::price_source::PriceSeries;

/// A date-indexed table with one column per ticker. The date index is
/// the sorted union of all constituent series dates; a missing entry
/// for a (date, ticker) pair means the source had no observation that
/// day, never zero.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PriceTable {
    tickers: Vec<String>,
    rows: BTreeMap<NaiveDate, HashMap<String, f64>>,
}

impl PriceTable {
    /// Merges per-ticker series into one table. Empty series are
    /// dropped; column order follows the input order.
    pub fn from_series(series: Vec<PriceSeries>) -> Self {
        let mut tickers = Vec::new();
        let mut rows: BTreeMap<NaiveDate, HashMap<String, f64>> = BTreeMap::new();
        for s in series {
            if s.is_empty() {
                continue;
            }
            tickers.push(s.ticker.clone());
            for (date, value) in s.points {
                rows.entry(date).or_default().insert(s.ticker.clone(), value);
            }
        }
        PriceTable { tickers, rows }
    }

    /// Assembles a table directly from prepared rows, keeping the
    /// given column order.
    pub fn from_columns(
        tickers: Vec<String>,
        rows: BTreeMap<NaiveDate, HashMap<String, f64>>,
    ) -> Self {
        PriceTable { tickers, rows }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Number of rows in the date index.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn tickers(&self) -> &[String] {
        &self.tickers
    }

    /// The date index, ascending.
    pub fn dates(&self) -> Vec<NaiveDate> {
        self.rows.keys().copied().collect()
    }

    /// First and last date of the index, if any.
    pub fn date_span(&self) -> Option<(NaiveDate, NaiveDate)> {
        let first = self.rows.keys().next()?;
        let last = self.rows.keys().next_back()?;
        Some((*first, *last))
    }

    pub fn value(&self, date: NaiveDate, ticker: &str) -> Option<f64> {
        self.rows.get(&date).and_then(|row| row.get(ticker)).copied()
    }

    /// Ordered (date, value) observations for one ticker.
    pub fn column(&self, ticker: &str) -> Vec<(NaiveDate, f64)> {
        self.rows
            .iter()
            .filter_map(|(date, row)| row.get(ticker).map(|value| (*date, *value)))
            .collect()
    }
}

/// Contiguous run of calendar days from `start` through `end`,
/// inclusive on both sides.
pub fn daily_calendar(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    let mut days = Vec::new();
    let mut day = start;
    while day <= end {
        days.push(day);
        match day.succ_opt() {
            Some(next) => day = next,
            None => break,
        }
    }
    days
}

/// Last observation carried forward: maps each calendar day to the
/// most recent observed value at or before it. Days before the first
/// observation stay `None`.
pub fn carry_forward(
    observed: &BTreeMap<NaiveDate, f64>,
    calendar: &[NaiveDate],
) -> Vec<Option<f64>> {
    let mut out = Vec::with_capacity(calendar.len());
    let mut last = None;
    let mut pending = observed.iter().peekable();
    for day in calendar {
        while let Some((date, value)) = pending.peek() {
            if **date <= *day {
                last = Some(**value);
                pending.next();
            } else {
                break;
            }
        }
        out.push(last);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn series(ticker: &str, points: &[(NaiveDate, f64)]) -> PriceSeries {
        PriceSeries::from_observations(
            ticker,
            points.iter().map(|(d, v)| (*d, Some(*v))).collect(),
        )
    }

    #[test]
    fn test_merge_index_is_sorted_union_of_input_dates() {
        let table = PriceTable::from_series(vec![
            series("AAA", &[(date(2024, 1, 2), 10.0), (date(2024, 1, 4), 11.0)]),
            series("BBB", &[(date(2024, 1, 3), 20.0), (date(2024, 1, 4), 21.0)]),
        ]);

        assert_eq!(
            table.dates(),
            vec![date(2024, 1, 2), date(2024, 1, 3), date(2024, 1, 4)]
        );
        assert_eq!(table.tickers(), &["AAA".to_string(), "BBB".to_string()]);

        // Pairs absent from the source series stay absent, never zero.
        assert_eq!(table.value(date(2024, 1, 2), "AAA"), Some(10.0));
        assert_eq!(table.value(date(2024, 1, 2), "BBB"), None);
        assert_eq!(table.value(date(2024, 1, 3), "AAA"), None);
        assert_eq!(table.value(date(2024, 1, 4), "BBB"), Some(21.0));
    }

    #[test]
    fn test_merge_with_disjoint_ranges() {
        let table = PriceTable::from_series(vec![
            series("AAA", &[(date(2024, 1, 2), 10.0)]),
            series("BBB", &[(date(2024, 3, 1), 20.0)]),
        ]);
        assert_eq!(table.dates(), vec![date(2024, 1, 2), date(2024, 3, 1)]);
        assert_eq!(table.date_span(), Some((date(2024, 1, 2), date(2024, 3, 1))));
    }

    #[test]
    fn test_merge_drops_empty_series() {
        let table = PriceTable::from_series(vec![
            series("AAA", &[(date(2024, 1, 2), 10.0)]),
            PriceSeries::from_observations("BBB", vec![(date(2024, 1, 2), None)]),
        ]);
        assert_eq!(table.tickers(), &["AAA".to_string()]);
    }

    #[test]
    fn test_empty_table() {
        let table = PriceTable::from_series(Vec::new());
        assert!(table.is_empty());
        assert_eq!(table.len(), 0);
        assert_eq!(table.date_span(), None);
    }

    #[test]
    fn test_daily_calendar_is_inclusive() {
        let days = daily_calendar(date(2024, 2, 27), date(2024, 3, 1));
        assert_eq!(
            days,
            vec![
                date(2024, 2, 27),
                date(2024, 2, 28),
                date(2024, 2, 29),
                date(2024, 3, 1)
            ]
        );
        assert_eq!(daily_calendar(date(2024, 1, 2), date(2024, 1, 2)).len(), 1);
    }

    #[test]
    fn test_carry_forward_fills_gaps_but_not_the_lead() {
        let observed: BTreeMap<NaiveDate, f64> =
            [(date(2024, 1, 3), 1.5), (date(2024, 1, 5), 2.0)]
                .into_iter()
                .collect();
        let calendar = daily_calendar(date(2024, 1, 2), date(2024, 1, 7));

        let filled = carry_forward(&observed, &calendar);
        assert_eq!(
            filled,
            vec![
                None,      // before the first observation
                Some(1.5),
                Some(1.5), // gap carries the last value forward
                Some(2.0),
                Some(2.0),
                Some(2.0), // beyond the last observation
            ]
        );
    }

    #[test]
    fn test_carry_forward_with_no_observations() {
        let observed = BTreeMap::new();
        let calendar = daily_calendar(date(2024, 1, 2), date(2024, 1, 3));
        assert_eq!(carry_forward(&observed, &calendar), vec![None, None]);
    }
}
