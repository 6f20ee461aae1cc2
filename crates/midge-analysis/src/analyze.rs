//! Turns a finished log collection into performance reports.

use midge_core::{
    ActionLog, FullReport, MidgeError, MidgeResult, PerformanceReport, RequestsReport,
    ResponseTimesReport, ResponsesReport, AGGREGATE_KEY,
};
use tracing::debug;

use crate::stats::{mean, percentile, population_stdev, round3};

/// Reports on the whole collection under `"*"`, plus one report per action
/// name (in first-seen order) when more than one action name occurs.
///
/// # Errors
///
/// `MidgeError::EmptyLogs` when `logs` is empty, `MidgeError::InvalidConfig`
/// when a log carries the reserved action name `"*"`.
pub fn analyze(logs: &[ActionLog]) -> MidgeResult<FullReport> {
    if let Some(index) = logs.iter().position(|log| log.action_name == AGGREGATE_KEY) {
        return Err(MidgeError::invalid_config(
            "action_name",
            format!("log {index} uses the reserved action name `{AGGREGATE_KEY}`"),
        ));
    }

    let mut report = FullReport::new();
    report.insert(AGGREGATE_KEY, analyze_performance(logs)?);

    let partitions = partition_by_action(logs);
    if partitions.len() > 1 {
        for (action, partition) in partitions {
            report.insert(action, analyze_performance(&partition)?);
        }
    }

    debug!(logs = logs.len(), partitions = report.len(), "logs analyzed");
    Ok(report)
}

/// Reports on one partition of logs, in any arrival order.
///
/// # Errors
///
/// `MidgeError::EmptyLogs` when `logs` is empty.
pub fn analyze_performance(logs: &[ActionLog]) -> MidgeResult<PerformanceReport> {
    if logs.is_empty() {
        return Err(MidgeError::EmptyLogs);
    }

    let mut ordered: Vec<&ActionLog> = logs.iter().collect();
    ordered.sort_by(|a, b| a.start.total_cmp(&b.start));

    let first_start = ordered[0].start;
    let last_end = ordered
        .iter()
        .map(|log| log.end)
        .fold(f64::NEG_INFINITY, f64::max);
    let duration = last_end - first_start;

    let total = ordered.len() as u64;
    let succeeded = ordered.iter().filter(|log| log.success).count() as u64;
    let failed = total - succeeded;
    let avg_per_sec = if duration > 0.0 {
        total as f64 / (duration / 1000.0)
    } else {
        0.0
    };

    let mut response_times: Vec<f64> = ordered.iter().map(|log| log.response_time()).collect();
    response_times.sort_by(f64::total_cmp);

    Ok(PerformanceReport {
        duration,
        requests: RequestsReport {
            total,
            avg_per_sec: round3(avg_per_sec),
        },
        responses: ResponsesReport {
            success_rate: round3(succeeded as f64 / total as f64),
            succeeded,
            failed,
            response_times: ResponseTimesReport {
                total: response_times.iter().sum(),
                mean: round3(mean(&response_times)),
                stdev: round3(population_stdev(&response_times)),
                min: response_times[0],
                p50: percentile(&response_times, 50.0),
                p75: percentile(&response_times, 75.0),
                p90: percentile(&response_times, 90.0),
                p95: percentile(&response_times, 95.0),
                p99: percentile(&response_times, 99.0),
                max: response_times[response_times.len() - 1],
            },
        },
    })
}

fn partition_by_action(logs: &[ActionLog]) -> Vec<(String, Vec<ActionLog>)> {
    let mut partitions: Vec<(String, Vec<ActionLog>)> = Vec::new();
    for log in logs {
        match partitions
            .iter_mut()
            .find(|(action, _)| *action == log.action_name)
        {
            Some((_, partition)) => partition.push(log.clone()),
            None => partitions.push((log.action_name.clone(), vec![log.clone()])),
        }
    }
    partitions
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn log(action: &str, start: f64, end: f64, success: bool) -> ActionLog {
        ActionLog {
            worker_id: "M1@S1".to_string(),
            action_name: action.to_string(),
            start,
            end,
            success,
            response: Value::Null,
        }
    }

    #[test]
    fn test_empty_logs_are_rejected() {
        assert!(matches!(analyze(&[]), Err(MidgeError::EmptyLogs)));
        assert!(matches!(analyze_performance(&[]), Err(MidgeError::EmptyLogs)));
    }

    #[test]
    fn test_duration_is_span_not_sum() {
        let logs = vec![
            log("a", 1_000.0, 1_500.0, true),
            log("a", 1_100.0, 1_200.0, true),
            log("a", 1_400.0, 3_000.0, false),
        ];

        let report = analyze_performance(&logs).unwrap();

        assert_eq!(report.duration, 2_000.0);
        assert_eq!(report.requests.total, 3);
        assert_eq!(report.requests.avg_per_sec, 1.5);
        assert_eq!(report.responses.succeeded, 2);
        assert_eq!(report.responses.failed, 1);
        assert_eq!(report.responses.success_rate, 0.667);
        assert_eq!(report.responses.response_times.total, 2_200.0);
    }

    #[test]
    fn test_instantaneous_logs_have_zero_throughput() {
        let logs = vec![log("a", 5.0, 5.0, true), log("a", 5.0, 5.0, true)];
        let report = analyze_performance(&logs).unwrap();

        assert_eq!(report.duration, 0.0);
        assert_eq!(report.requests.avg_per_sec, 0.0);
    }

    #[test]
    fn test_reserved_action_name_is_rejected() {
        let logs = vec![
            log("*", 0.0, 1.0, true),
            log("other", 1.0, 2.0, true),
            log("other", 2.0, 3.0, true),
        ];

        let err = analyze(&logs).unwrap_err();
        assert!(matches!(err, MidgeError::InvalidConfig { field: "action_name", .. }));
        assert!(err.to_string().contains("log 0"));
    }

    #[test]
    fn test_single_action_has_only_aggregate() {
        let logs = vec![log("a", 0.0, 1.0, true), log("a", 1.0, 2.0, true)];
        let report = analyze(&logs).unwrap();

        assert_eq!(report.keys().collect::<Vec<_>>(), vec!["*"]);
    }

    #[test]
    fn test_partitions_follow_first_seen_order() {
        let logs = vec![
            log("b", 0.0, 1.0, true),
            log("a", 1.0, 2.0, true),
            log("b", 2.0, 4.0, false),
            log("c", 3.0, 4.0, true),
        ];
        let report = analyze(&logs).unwrap();

        assert_eq!(report.keys().collect::<Vec<_>>(), vec!["*", "b", "a", "c"]);
        assert_eq!(report.aggregate().unwrap().requests.total, 4);
        assert_eq!(report.get("b").unwrap().requests.total, 2);
        assert_eq!(report.get("b").unwrap().responses.failed, 1);
    }
}
