//! Gap filling and ratio series for the trend endpoints.

use std::collections::HashMap;

use serde::Serialize;

use crate::core::client::prometheus_client::{Matrix, SamplePair, SampleStream};
use crate::core::util::time_range::AlignedRange;

/// Marks a grid point the source stream had no sample for.
pub const MISSING: f64 = -1.0;

/// Source timestamps within this many milliseconds of a grid point count as on it.
const TOLERANCE_MS: i64 = 1;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeSeriesPoint {
    pub timestamp: i64,
    pub value: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeSeries {
    pub metric: String,
    pub points: Vec<TimeSeriesPoint>,
}

impl TimeSeries {
    fn empty(metric: &str) -> Self {
        Self {
            metric: metric.to_string(),
            points: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceTrend {
    pub data: Vec<TimeSeries>,
}

/// Re-sample every stream onto the grid of `range`, writing [`MISSING`] where the
/// stream has nothing within the tolerance.
pub fn fill_missing_points(matrix: Matrix, range: &AlignedRange) -> Matrix {
    let grid = range.grid_millis();

    matrix
        .into_iter()
        .map(|stream| {
            let by_ts: HashMap<i64, SamplePair> =
                stream.values.iter().map(|p| (p.timestamp_ms, *p)).collect();
            let values = grid
                .iter()
                .map(|&ts| {
                    (-TOLERANCE_MS..=TOLERANCE_MS)
                        .find_map(|offset| by_ts.get(&(ts + offset)).copied())
                        .unwrap_or(SamplePair {
                            timestamp_ms: ts,
                            value: MISSING,
                        })
                })
                .collect();
            SampleStream {
                metric: stream.metric,
                values,
            }
        })
        .collect()
}

fn present(value: f64) -> Option<f64> {
    (value != MISSING).then_some(value)
}

/// First stream of `matrix` as a named series, gaps as nulls.
pub fn series_from_matrix(matrix: Matrix, range: &AlignedRange, name: &str) -> TimeSeries {
    let filled = fill_missing_points(matrix, range);
    let points = filled
        .first()
        .map(|stream| {
            stream
                .values
                .iter()
                .map(|p| TimeSeriesPoint {
                    timestamp: p.timestamp_ms,
                    value: present(p.value),
                })
                .collect()
        })
        .unwrap_or_default();
    TimeSeries {
        metric: name.to_string(),
        points,
    }
}

/// `part / whole * 100` per grid point. A missing `whole` gives null; a missing `part`
/// against a present `whole` gives 0.
fn ratio_points(part: &SampleStream, whole: &SampleStream) -> Vec<TimeSeriesPoint> {
    part.values
        .iter()
        .zip(whole.values.iter())
        .map(|(p, w)| TimeSeriesPoint {
            timestamp: p.timestamp_ms,
            value: present(w.value).map(|w| match present(p.value) {
                Some(p) => p / w * 100.0,
                None => 0.0,
            }),
        })
        .collect()
}

/// `allocated` and `used` percentages of `total`.
pub fn usage_trend(total: Matrix, allocated: Matrix, used: Matrix, range: &AlignedRange) -> ResourceTrend {
    let total = fill_missing_points(total, range);
    let allocated = fill_missing_points(allocated, range);
    let used = fill_missing_points(used, range);

    let mut allocated_series = TimeSeries::empty("allocated");
    let mut used_series = TimeSeries::empty("used");

    if let Some(total) = total.first() {
        if let Some(allocated) = allocated.first() {
            allocated_series.points = ratio_points(allocated, total);
        }
        if let Some(used) = used.first() {
            used_series.points = ratio_points(used, total);
        }
    }

    ResourceTrend {
        data: vec![allocated_series, used_series],
    }
}

/// `used` as a percentage of `allocated`. A zero allocation reports `used * 100`.
pub fn workload_usage_trend(allocated: Matrix, used: Matrix, range: &AlignedRange, name: &str) -> ResourceTrend {
    let allocated = fill_missing_points(allocated, range);
    let used = fill_missing_points(used, range);
    let mut series = TimeSeries::empty(name);

    if let (Some(allocated), Some(used)) = (allocated.first(), used.first()) {
        series.points = used
            .values
            .iter()
            .zip(allocated.values.iter())
            .map(|(u, a)| TimeSeriesPoint {
                timestamp: u.timestamp_ms,
                value: present(a.value).map(|a| match present(u.value) {
                    None => 0.0,
                    Some(u) if a != 0.0 => u / a * 100.0,
                    Some(u) => u * 100.0,
                }),
            })
            .collect();
    }

    ResourceTrend { data: vec![series] }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::client::prometheus_client::Labels;
    use chrono::{DateTime, TimeDelta};

    const STEP_MS: i64 = 30_000;
    const T0: i64 = 1_710_000_000_000;

    fn range(points: i64) -> AlignedRange {
        AlignedRange {
            start: DateTime::from_timestamp_millis(T0).unwrap(),
            end: DateTime::from_timestamp_millis(T0 + points * STEP_MS).unwrap(),
            step: TimeDelta::milliseconds(STEP_MS),
        }
    }

    fn stream(points: &[(i64, f64)]) -> Matrix {
        vec![SampleStream {
            metric: Labels::new(),
            values: points
                .iter()
                .map(|&(timestamp_ms, value)| SamplePair { timestamp_ms, value })
                .collect(),
        }]
    }

    #[test]
    fn test_gap_is_filled_with_null() {
        let m = stream(&[(T0, 1.0), (T0 + 2 * STEP_MS, 3.0)]);
        let series = series_from_matrix(m, &range(3), "used");
        assert_eq!(series.points.len(), 3);
        assert_eq!(series.points[1].timestamp, T0 + STEP_MS);
        assert_eq!(series.points[1].value, None);
        assert_eq!(series.points[2].value, Some(3.0));
    }

    #[test]
    fn test_one_millisecond_tolerance() {
        let m = stream(&[(T0 + 1, 1.0), (T0 + STEP_MS - 1, 2.0), (T0 + 2 * STEP_MS + 2, 3.0)]);
        let filled = fill_missing_points(m, &range(3));
        let values: Vec<f64> = filled[0].values.iter().map(|p| p.value).collect();
        assert_eq!(values, vec![1.0, 2.0, MISSING]);
    }

    #[test]
    fn test_empty_matrix_gives_empty_series() {
        let series = series_from_matrix(Vec::new(), &range(3), "used");
        assert!(series.points.is_empty());
    }

    #[test]
    fn test_usage_ratio_rules() {
        let total = stream(&[(T0, 200.0), (T0 + 2 * STEP_MS, 100.0)]);
        let allocated = stream(&[(T0, 50.0), (T0 + STEP_MS, 10.0), (T0 + 2 * STEP_MS, 100.0)]);
        let used = stream(&[(T0, 100.0)]);
        let trend = usage_trend(total, allocated, used, &range(3));

        assert_eq!(trend.data[0].metric, "allocated");
        let allocated: Vec<_> = trend.data[0].points.iter().map(|p| p.value).collect();
        // total missing at the second point
        assert_eq!(allocated, vec![Some(25.0), None, Some(100.0)]);

        let used: Vec<_> = trend.data[1].points.iter().map(|p| p.value).collect();
        assert_eq!(used, vec![Some(50.0), None, Some(0.0)]);
    }

    #[test]
    fn test_usage_without_total_is_empty() {
        let trend = usage_trend(Vec::new(), stream(&[(T0, 1.0)]), stream(&[(T0, 1.0)]), &range(2));
        assert_eq!(trend.data.len(), 2);
        assert!(trend.data.iter().all(|s| s.points.is_empty()));
    }

    #[test]
    fn test_workload_usage() {
        let allocated = stream(&[(T0, 50.0), (T0 + STEP_MS, 0.0), (T0 + 2 * STEP_MS, 10.0)]);
        let used = stream(&[(T0, 25.0), (T0 + STEP_MS, 0.5)]);
        let trend = workload_usage_trend(allocated, used, &range(4), "ns/web");
        let values: Vec<_> = trend.data[0].points.iter().map(|p| p.value).collect();
        assert_eq!(values, vec![Some(50.0), Some(50.0), Some(0.0), None]);
        assert_eq!(trend.data[0].metric, "ns/web");
    }
}
