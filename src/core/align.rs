//! Resamples native-frequency series onto calendar month-end periods.
use crate::core::series::{DataSource, FillPolicy, SeriesTable};
use chrono::{Datelike, NaiveDate};
use std::collections::BTreeMap;
use tracing::debug;

/// One series on the month-end index. Absent periods and `None` cells both read as missing.
#[derive(Debug, Clone, PartialEq)]
pub struct AlignedSeries {
    pub source: DataSource,
    pub name: String,
    pub values: BTreeMap<NaiveDate, Option<f64>>,
}

impl AlignedSeries {
    pub fn value_at(&self, period: NaiveDate) -> Option<f64> {
        self.values.get(&period).copied().flatten()
    }

    pub fn last_period(&self) -> Option<NaiveDate> {
        self.values.keys().next_back().copied()
    }
}

/// Last calendar day of `date`'s month.
pub fn month_end(date: NaiveDate) -> Option<NaiveDate> {
    let (year, month) = if date.month() == 12 {
        (date.year() + 1, 1)
    } else {
        (date.year(), date.month() + 1)
    };
    NaiveDate::from_ymd_opt(year, month, 1).and_then(|first| first.pred_opt())
}

fn next_month_end(period: NaiveDate) -> Option<NaiveDate> {
    period.succ_opt().and_then(month_end)
}

/// Latest month-end touched by any table; forward-filled series extend to it.
pub fn horizon(tables: &[SeriesTable]) -> Option<NaiveDate> {
    tables
        .iter()
        .filter_map(|t| t.last_date())
        .max()
        .and_then(month_end)
}

pub fn align_table(table: &SeriesTable, horizon: Option<NaiveDate>) -> Vec<AlignedSeries> {
    let policy = table.source.fill_policy();
    table
        .by_name()
        .into_iter()
        .map(|(name, points)| {
            let values = match policy {
                FillPolicy::Last => sample_last(&points),
                FillPolicy::ForwardFill => forward_fill(&points, horizon),
            };
            debug!(
                source = %table.source,
                series = name,
                observations = points.len(),
                periods = values.len(),
                "Aligned series"
            );
            AlignedSeries {
                source: table.source,
                name: name.to_string(),
                values,
            }
        })
        .collect()
}

/// Reduces date-ordered points to the last observation per month-end.
fn last_per_period(points: &[(NaiveDate, f64)]) -> BTreeMap<NaiveDate, f64> {
    let mut periods = BTreeMap::new();
    for (date, value) in points {
        if let Some(period) = month_end(*date) {
            periods.insert(period, *value);
        }
    }
    periods
}

/// Point-in-time sampling: every period between the first and last observed
/// month holds that month's last observation, or nothing.
pub fn sample_last(points: &[(NaiveDate, f64)]) -> BTreeMap<NaiveDate, Option<f64>> {
    let observed = last_per_period(points);
    let (Some(first), Some(last)) = (
        observed.keys().next().copied(),
        observed.keys().next_back().copied(),
    ) else {
        return BTreeMap::new();
    };

    month_ends(first, last)
        .map(|period| (period, observed.get(&period).copied()))
        .collect()
}

/// Step-function fill from the first reading through `max(last reading, horizon)`.
pub fn forward_fill(
    points: &[(NaiveDate, f64)],
    horizon: Option<NaiveDate>,
) -> BTreeMap<NaiveDate, Option<f64>> {
    let observed = last_per_period(points);
    let (Some(first), Some(last)) = (
        observed.keys().next().copied(),
        observed.keys().next_back().copied(),
    ) else {
        return BTreeMap::new();
    };
    let end = horizon.map_or(last, |h| h.max(last));

    let mut current = None;
    month_ends(first, end)
        .map(|period| {
            if let Some(value) = observed.get(&period) {
                current = Some(*value);
            }
            (period, current)
        })
        .collect()
}

/// Month-ends from `first` to `last` inclusive; both must already be month-ends.
fn month_ends(first: NaiveDate, last: NaiveDate) -> impl Iterator<Item = NaiveDate> {
    std::iter::successors(Some(first), |p| next_month_end(*p)).take_while(move |p| *p <= last)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::series::RawObservation;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_month_end() {
        assert_eq!(month_end(date("2020-02-10")), Some(date("2020-02-29")));
        assert_eq!(month_end(date("2021-02-01")), Some(date("2021-02-28")));
        assert_eq!(month_end(date("2020-12-31")), Some(date("2020-12-31")));
        assert_eq!(month_end(date("2020-04-01")), Some(date("2020-04-30")));
    }

    #[test]
    fn test_point_in_time_sampling_has_no_look_ahead() {
        let points = vec![(date("2020-01-30"), 100.0), (date("2020-02-03"), 105.0)];
        let aligned = sample_last(&points);

        assert_eq!(aligned.get(&date("2020-01-31")), Some(&Some(100.0)));
        assert_eq!(aligned.get(&date("2020-02-29")), Some(&Some(105.0)));
        assert_eq!(aligned.len(), 2);
    }

    #[test]
    fn test_last_keeps_final_observation_in_period() {
        let points = vec![
            (date("2020-01-02"), 1.0),
            (date("2020-01-15"), 2.0),
            (date("2020-01-31"), 3.0),
        ];
        let aligned = sample_last(&points);

        assert_eq!(aligned.len(), 1);
        assert_eq!(aligned.get(&date("2020-01-31")), Some(&Some(3.0)));
    }

    #[test]
    fn test_last_leaves_gap_months_missing() {
        // Quarterly cadence: the months in between are not carried forward.
        let points = vec![(date("2020-01-01"), 10.0), (date("2020-04-01"), 11.0)];
        let aligned = sample_last(&points);

        assert_eq!(aligned.len(), 4);
        assert_eq!(aligned.get(&date("2020-02-29")), Some(&None));
        assert_eq!(aligned.get(&date("2020-03-31")), Some(&None));
        assert_eq!(aligned.get(&date("2020-04-30")), Some(&Some(11.0)));
    }

    #[test]
    fn test_annual_forward_fill() {
        let points = vec![(date("2010-01-01"), 5.0), (date("2012-01-01"), 7.0)];
        let aligned = forward_fill(&points, Some(date("2012-12-31")));

        assert_eq!(aligned.get(&date("2010-01-31")), Some(&Some(5.0)));
        assert_eq!(aligned.get(&date("2011-06-30")), Some(&Some(5.0)));
        assert_eq!(aligned.get(&date("2011-12-31")), Some(&Some(5.0)));
        assert_eq!(aligned.get(&date("2012-01-31")), Some(&Some(7.0)));
        assert_eq!(aligned.get(&date("2012-12-31")), Some(&Some(7.0)));
        assert_eq!(aligned.len(), 36);
    }

    #[test]
    fn test_forward_fill_without_horizon_stops_at_last_reading() {
        let points = vec![(date("2010-01-01"), 5.0), (date("2012-01-01"), 7.0)];
        let aligned = forward_fill(&points, None);

        assert_eq!(aligned.keys().next_back(), Some(&date("2012-01-31")));
        // A horizon earlier than the data never truncates it.
        let early = forward_fill(&points, Some(date("2011-01-31")));
        assert_eq!(early.keys().next_back(), Some(&date("2012-01-31")));
    }

    #[test]
    fn test_empty_series_yields_no_periods() {
        assert!(sample_last(&[]).is_empty());
        assert!(forward_fill(&[], Some(date("2020-01-31"))).is_empty());
    }

    #[test]
    fn test_align_table_applies_source_policy() {
        let wb = SeriesTable::new(
            DataSource::WorldBank,
            vec![RawObservation {
                date: date("2020-01-01"),
                name: "inflation".to_string(),
                value: 1.2,
            }],
        );
        let yahoo = SeriesTable::new(
            DataSource::Yahoo,
            vec![
                RawObservation {
                    date: date("2020-01-02"),
                    name: "gold".to_string(),
                    value: 1500.0,
                },
                RawObservation {
                    date: date("2020-03-16"),
                    name: "gold".to_string(),
                    value: 1600.0,
                },
            ],
        );
        let h = horizon(&[wb.clone(), yahoo.clone()]);
        assert_eq!(h, Some(date("2020-03-31")));

        let wb_aligned = align_table(&wb, h);
        assert_eq!(wb_aligned.len(), 1);
        assert_eq!(wb_aligned[0].value_at(date("2020-03-31")), Some(1.2));

        let yahoo_aligned = align_table(&yahoo, h);
        assert_eq!(yahoo_aligned[0].value_at(date("2020-02-29")), None);
        assert_eq!(yahoo_aligned[0].last_period(), Some(date("2020-03-31")));
    }
}
