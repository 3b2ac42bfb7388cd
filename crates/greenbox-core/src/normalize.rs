//! Range normalization of sensor series for charting.
//!
//! Raw values are rescaled into `[40, 100]` so the bottom 40% of a bar chart
//! is a visual floor: the minimum of a series still renders as a visible bar.
//!
//! # Example
//!
//! ```
//! use greenbox_core::normalize::{normalize, summarize};
//!
//! let series = [24.0, 26.0, 25.0, 27.0, 26.0, 25.0, 26.0];
//! let pct = normalize(&series)?;
//! assert_eq!(pct, vec![40.0, 80.0, 60.0, 100.0, 80.0, 60.0, 80.0]);
//!
//! let summary = summarize(&series)?;
//! assert_eq!(summary.average, 25.6);
//! # Ok::<(), greenbox_core::Error>(())
//! ```

use serde::Serialize;
use time::{OffsetDateTime, UtcOffset, Weekday};

use greenbox_types::{Period, SensorKind, SensorReading};

use crate::error::{Error, Result};

/// Percentage assigned to the minimum of a series.
pub const FLOOR_PERCENT: f64 = 40.0;

/// Percentage assigned to the maximum of a series.
pub const CEILING_PERCENT: f64 = 100.0;

/// Percentage assigned to every point of a flat series.
pub const FLAT_PERCENT: f64 = 80.0;

/// Map each value to a chart percentage in `[40, 100]`.
///
/// The minimum maps to exactly 40 and the maximum to exactly 100. A flat
/// series (all values equal) maps every point to 80.
///
/// # Errors
///
/// Returns [`Error::EmptyInput`] for an empty series.
pub fn normalize(series: &[f64]) -> Result<Vec<f64>> {
    let (min, max) = bounds(series)?;

    if max == min {
        return Ok(vec![FLAT_PERCENT; series.len()]);
    }

    let span = max - min;
    let scale = CEILING_PERCENT - FLOOR_PERCENT;
    Ok(series
        .iter()
        .map(|&v| {
            if v == min {
                FLOOR_PERCENT
            } else if v == max {
                CEILING_PERCENT
            } else {
                // Multiply before dividing so exact fractions stay exact
                (FLOOR_PERCENT + (v - min) * scale / span).clamp(FLOOR_PERCENT, CEILING_PERCENT)
            }
        })
        .collect())
}

/// Point-to-point change: `delta[0] = 0`, `delta[i] = s[i] - s[i-1]`.
pub fn deltas(series: &[f64]) -> Vec<f64> {
    let mut out = Vec::with_capacity(series.len());
    if let Some(&first) = series.first() {
        let mut prev = first;
        out.push(0.0);
        for &v in &series[1..] {
            out.push(v - prev);
            prev = v;
        }
    }
    out
}

/// Round to a fixed number of decimal places.
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// Summary statistics for a series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SeriesSummary {
    pub min: f64,
    pub max: f64,
    /// Mean rounded to one decimal.
    pub average: f64,
    /// `last - first`, rounded to one decimal.
    pub change: f64,
}

/// Compute min, max, average and overall change of a series.
///
/// # Errors
///
/// Returns [`Error::EmptyInput`] for an empty series.
pub fn summarize(series: &[f64]) -> Result<SeriesSummary> {
    let (min, max) = bounds(series)?;
    let mean = series.iter().sum::<f64>() / series.len() as f64;
    let change = match (series.first(), series.last()) {
        (Some(first), Some(last)) => last - first,
        _ => 0.0,
    };

    Ok(SeriesSummary {
        min,
        max,
        average: round_to(mean, 1),
        change: round_to(change, 1),
    })
}

fn bounds(series: &[f64]) -> Result<(f64, f64)> {
    let first = *series.first().ok_or(Error::EmptyInput)?;
    Ok(series
        .iter()
        .fold((first, first), |(lo, hi), &v| (lo.min(v), hi.max(v))))
}

/// One chart point derived from a reading and its predecessor.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedPoint {
    pub label: String,
    pub value: f64,
    pub delta: f64,
    pub percentage: f64,
}

/// A chart-ready series for one sensor over one period.
///
/// Recomputed from the raw readings whenever they change.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedSeries {
    pub sensor: SensorKind,
    pub period: Period,
    pub unit: &'static str,
    pub points: Vec<NormalizedPoint>,
    pub summary: SeriesSummary,
}

/// Normalize one sensor's values out of a chronological reading series.
///
/// Labels are rendered in `offset`.
///
/// # Errors
///
/// Returns [`Error::EmptyInput`] when `readings` is empty.
pub fn normalize_readings(
    readings: &[SensorReading],
    sensor: SensorKind,
    period: Period,
    offset: UtcOffset,
) -> Result<NormalizedSeries> {
    let values: Vec<f64> = readings.iter().map(|r| r.value(sensor)).collect();
    let percentages = normalize(&values)?;
    let summary = summarize(&values)?;
    let deltas = deltas(&values);

    let points = readings
        .iter()
        .zip(values.iter().zip(deltas.iter().zip(percentages.iter())))
        .map(|(reading, (&value, (&delta, &percentage)))| NormalizedPoint {
            label: chart_label(reading.timestamp, period, offset),
            value,
            delta,
            percentage,
        })
        .collect();

    Ok(NormalizedSeries {
        sensor,
        period,
        unit: sensor.unit(),
        points,
        summary,
    })
}

/// Axis label for a point: `HH:00` for a day, weekday for a week,
/// `DD/MM` for a month.
pub fn chart_label(timestamp: OffsetDateTime, period: Period, offset: UtcOffset) -> String {
    let local = timestamp.to_offset(offset);
    match period {
        Period::Day => format!("{:02}:00", local.hour()),
        Period::Week => weekday_abbrev(local.weekday()).to_string(),
        Period::Month => format!("{:02}/{:02}", local.day(), u8::from(local.month())),
    }
}

fn weekday_abbrev(day: Weekday) -> &'static str {
    match day {
        Weekday::Monday => "Mon",
        Weekday::Tuesday => "Tue",
        Weekday::Wednesday => "Wed",
        Weekday::Thursday => "Thu",
        Weekday::Friday => "Fri",
        Weekday::Saturday => "Sat",
        Weekday::Sunday => "Sun",
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// The minimum maps to 40 and the maximum to 100.
        #[test]
        fn min_and_max_hit_the_bounds(series in prop::collection::vec(-1000.0f64..1000.0, 1..64)) {
            let pct = normalize(&series).unwrap();
            prop_assert_eq!(pct.len(), series.len());

            let min = series.iter().cloned().fold(f64::INFINITY, f64::min);
            let max = series.iter().cloned().fold(f64::NEG_INFINITY, f64::max);

            for (v, p) in series.iter().zip(&pct) {
                prop_assert!((FLOOR_PERCENT..=CEILING_PERCENT).contains(p));
                if min == max {
                    prop_assert_eq!(*p, FLAT_PERCENT);
                } else if *v == min {
                    prop_assert_eq!(*p, FLOOR_PERCENT);
                } else if *v == max {
                    prop_assert_eq!(*p, CEILING_PERCENT);
                }
            }
        }

        /// Flat series map to 80 everywhere.
        #[test]
        fn flat_series_is_eighty(v in -1000.0f64..1000.0, n in 1usize..32) {
            let pct = normalize(&vec![v; n]).unwrap();
            prop_assert!(pct.iter().all(|&p| p == FLAT_PERCENT));
        }

        /// delta[0] is zero and every later delta is the step from its predecessor.
        #[test]
        fn delta_rule(series in prop::collection::vec(-1000.0f64..1000.0, 0..64)) {
            let d = deltas(&series);
            prop_assert_eq!(d.len(), series.len());
            if !series.is_empty() {
                prop_assert_eq!(d[0], 0.0);
            }
            for i in 1..series.len() {
                prop_assert_eq!(d[i], series[i] - series[i - 1]);
            }
        }

        /// Normalization preserves order between points.
        #[test]
        fn normalization_is_monotonic(series in prop::collection::vec(-1000.0f64..1000.0, 2..32)) {
            let pct = normalize(&series).unwrap();
            for i in 0..series.len() {
                for j in 0..series.len() {
                    if series[i] < series[j] {
                        prop_assert!(pct[i] <= pct[j]);
                    }
                }
            }
        }
    }
}
