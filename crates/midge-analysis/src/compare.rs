//! Leaf-by-leaf deltas between a report and its baseline.

use midge_core::{
    Comparison, Delta, FullComparison, FullReport, MidgeError, MidgeResult, PerformanceComparison,
    PerformanceReport, Report, RequestsComparison, ResponseTimesComparison, ResponsesComparison,
};

use crate::stats::round3;

/// `absolute = round3(new - baseline)`, `relative = round3(absolute / baseline)`;
/// `relative` is NaN when `baseline` is zero.
pub fn delta(new: f64, baseline: f64) -> Delta {
    let absolute = round3(new - baseline);
    let relative = if baseline == 0.0 {
        f64::NAN
    } else {
        round3(absolute / baseline)
    };
    Delta { relative, absolute }
}

fn count_delta(new: u64, baseline: u64) -> Delta {
    delta(new as f64, baseline as f64)
}

/// Compares two single-partition reports.
pub fn compare(report: &PerformanceReport, baseline: &PerformanceReport) -> PerformanceComparison {
    let (new_times, base_times) = (
        &report.responses.response_times,
        &baseline.responses.response_times,
    );

    PerformanceComparison {
        duration: delta(report.duration, baseline.duration),
        requests: RequestsComparison {
            total: count_delta(report.requests.total, baseline.requests.total),
            avg_per_sec: delta(report.requests.avg_per_sec, baseline.requests.avg_per_sec),
        },
        responses: ResponsesComparison {
            success_rate: delta(
                report.responses.success_rate,
                baseline.responses.success_rate,
            ),
            succeeded: count_delta(report.responses.succeeded, baseline.responses.succeeded),
            failed: count_delta(report.responses.failed, baseline.responses.failed),
            response_times: ResponseTimesComparison {
                total: delta(new_times.total, base_times.total),
                mean: delta(new_times.mean, base_times.mean),
                stdev: delta(new_times.stdev, base_times.stdev),
                min: delta(new_times.min, base_times.min),
                p50: delta(new_times.p50, base_times.p50),
                p75: delta(new_times.p75, base_times.p75),
                p90: delta(new_times.p90, base_times.p90),
                p95: delta(new_times.p95, base_times.p95),
                p99: delta(new_times.p99, base_times.p99),
                max: delta(new_times.max, base_times.max),
            },
        },
    }
}

/// Compares two full reports partition by partition, in the report's key order.
///
/// # Errors
///
/// `MidgeError::ShapeMismatch` naming the keys present on only one side.
pub fn compare_full(report: &FullReport, baseline: &FullReport) -> MidgeResult<FullComparison> {
    let only_report: Vec<&str> = report
        .keys()
        .filter(|key| !baseline.contains_key(key))
        .collect();
    let only_baseline: Vec<&str> = baseline
        .keys()
        .filter(|key| !report.contains_key(key))
        .collect();

    if !only_report.is_empty() || !only_baseline.is_empty() {
        return Err(MidgeError::shape_mismatch(format!(
            "partition keys differ: only in report {only_report:?}, \
             only in baseline {only_baseline:?}"
        )));
    }

    Ok(report
        .iter()
        .filter_map(|(key, new)| {
            baseline
                .get(key)
                .map(|base| (key.to_string(), compare(new, base)))
        })
        .collect())
}

/// Compares reports of either shape; both sides must share the shape.
///
/// # Errors
///
/// `MidgeError::ShapeMismatch` when the shapes or partition keys differ.
pub fn compare_any(report: &Report, baseline: &Report) -> MidgeResult<Comparison> {
    match (report, baseline) {
        (Report::Single(new), Report::Single(base)) => Ok(Comparison::Single(compare(new, base))),
        (Report::Full(new), Report::Full(base)) => compare_full(new, base).map(Comparison::Full),
        (new, base) => Err(MidgeError::shape_mismatch(format!(
            "cannot compare a {} against a {}",
            new.kind(),
            base.kind()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delta_rounds_both_fields() {
        let d = delta(12.3456, 10.0);
        assert_eq!(d.absolute, 2.346);
        assert_eq!(d.relative, 0.235);
    }

    #[test]
    fn test_delta_against_zero_baseline_is_nan() {
        let d = delta(5.0, 0.0);
        assert_eq!(d.absolute, 5.0);
        assert!(d.relative.is_nan());
    }

    #[test]
    fn test_delta_direction_is_new_minus_baseline() {
        let d = delta(8.0, 10.0);
        assert_eq!(d.absolute, -2.0);
        assert_eq!(d.relative, -0.2);
    }
}
