//! Straight-line trend projection, a display decoration for a single series.
use crate::core::align::month_end;
use chrono::{Datelike, NaiveDate};

#[derive(Debug, Clone, PartialEq)]
pub struct TrendProjection {
    /// Change in value per calendar day.
    pub slope: f64,
    pub intercept: f64,
    pub points: Vec<(NaiveDate, f64)>,
}

/// Fits `value = slope * day + intercept` by least squares and projects the
/// next `months` month-ends after the last observation.
///
/// Returns `None` with fewer than two distinct dates.
pub fn linear_trend(series: &[(NaiveDate, f64)], months: usize) -> Option<TrendProjection> {
    let last = series.iter().map(|(d, _)| *d).max()?;
    let n = series.len() as f64;
    let xs: Vec<f64> = series
        .iter()
        .map(|(d, _)| d.num_days_from_ce() as f64)
        .collect();

    let mean_x = xs.iter().sum::<f64>() / n;
    let mean_y = series.iter().map(|(_, v)| v).sum::<f64>() / n;

    let mut sxy = 0.0;
    let mut sxx = 0.0;
    for (x, (_, y)) in xs.iter().zip(series) {
        sxy += (x - mean_x) * (y - mean_y);
        sxx += (x - mean_x) * (x - mean_x);
    }
    if sxx == 0.0 {
        return None;
    }

    let slope = sxy / sxx;
    let intercept = mean_y - slope * mean_x;

    let points = std::iter::successors(month_end(last), |p| p.succ_opt().and_then(month_end))
        .skip(1)
        .take(months)
        .map(|period| {
            let projected = slope * period.num_days_from_ce() as f64 + intercept;
            (period, projected)
        })
        .collect();

    Some(TrendProjection {
        slope,
        intercept,
        points,
    })
}
