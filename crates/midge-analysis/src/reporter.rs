//! Rendering of reports and comparisons as JSON or Markdown.

use std::fmt::Write as _;

use midge_core::codec::to_bytes;
use midge_core::{
    Comparison, Delta, MidgeError, MidgeResult, PerformanceComparison, PerformanceReport, Report,
    AGGREGATE_KEY,
};

/// Report format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReportFormat {
    #[default]
    Json,
    Markdown,
}

impl ReportFormat {
    /// File extension for rendered output.
    pub fn extension(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Markdown => "md",
        }
    }
}

/// Renders a report in the requested format.
pub fn render_report(
    title: &str,
    report: &Report,
    format: ReportFormat,
    pretty: bool,
) -> MidgeResult<String> {
    match format {
        ReportFormat::Json => json(report, pretty),
        ReportFormat::Markdown => Ok(report_markdown(title, report)),
    }
}

/// Renders a comparison in the requested format.
pub fn render_comparison(
    title: &str,
    comparison: &Comparison,
    format: ReportFormat,
    pretty: bool,
) -> MidgeResult<String> {
    match format {
        ReportFormat::Json => json(comparison, pretty),
        ReportFormat::Markdown => Ok(comparison_markdown(title, comparison)),
    }
}

fn json<T: serde::Serialize>(value: &T, pretty: bool) -> MidgeResult<String> {
    let bytes = to_bytes(value, pretty)?;
    String::from_utf8(bytes).map_err(|e| MidgeError::SerializationError(e.to_string()))
}

/// Generate Markdown for a report of either shape
pub fn report_markdown(title: &str, report: &Report) -> String {
    let mut out = format!("# Performance Report: {title}\n");
    match report {
        Report::Single(single) => write_report_section(&mut out, AGGREGATE_KEY, single),
        Report::Full(full) => {
            for (key, partition) in full.iter() {
                write_report_section(&mut out, key, partition);
            }
        }
    }
    out
}

fn write_report_section(out: &mut String, key: &str, report: &PerformanceReport) {
    let times = &report.responses.response_times;
    let _ = write!(
        out,
        r#"
## {}

- **Duration**: {:.1} ms
- **Total Requests**: {}
- **Throughput**: {:.3} req/s
- **Succeeded**: {}
- **Failed**: {}
- **Success Rate**: {:.1}%

| Response Time | ms |
|---------------|----|
| Mean | {:.3} |
| Stdev | {:.3} |
| Min | {:.3} |
| P50 | {:.3} |
| P75 | {:.3} |
| P90 | {:.3} |
| P95 | {:.3} |
| P99 | {:.3} |
| Max | {:.3} |
"#,
        section_title(key),
        report.duration,
        report.requests.total,
        report.requests.avg_per_sec,
        report.responses.succeeded,
        report.responses.failed,
        report.responses.success_rate * 100.0,
        times.mean,
        times.stdev,
        times.min,
        times.p50,
        times.p75,
        times.p90,
        times.p95,
        times.p99,
        times.max,
    );
}

/// Generate Markdown for a comparison of either shape
pub fn comparison_markdown(title: &str, comparison: &Comparison) -> String {
    let mut out = format!("# Comparison: {title}\n");
    match comparison {
        Comparison::Single(single) => write_comparison_section(&mut out, AGGREGATE_KEY, single),
        Comparison::Full(full) => {
            for (key, partition) in full.iter() {
                write_comparison_section(&mut out, key, partition);
            }
        }
    }
    out
}

fn write_comparison_section(out: &mut String, key: &str, comparison: &PerformanceComparison) {
    let _ = write!(
        out,
        "\n## {}\n\n| Metric | Absolute | Relative |\n|--------|----------|----------|\n",
        section_title(key)
    );
    for (metric, delta) in comparison_rows(comparison) {
        let _ = writeln!(
            out,
            "| {} | {:+.3} | {} |",
            metric,
            delta.absolute,
            relative_cell(delta.relative)
        );
    }
}

/// Every leaf of a comparison, labelled by its dotted path.
pub fn comparison_rows(comparison: &PerformanceComparison) -> Vec<(&'static str, Delta)> {
    let requests = &comparison.requests;
    let responses = &comparison.responses;
    let times = &responses.response_times;
    vec![
        ("duration", comparison.duration),
        ("requests.total", requests.total),
        ("requests.avg_per_sec", requests.avg_per_sec),
        ("responses.success_rate", responses.success_rate),
        ("responses.succeeded", responses.succeeded),
        ("responses.failed", responses.failed),
        ("response_times.total", times.total),
        ("response_times.mean", times.mean),
        ("response_times.stdev", times.stdev),
        ("response_times.min", times.min),
        ("response_times.p50", times.p50),
        ("response_times.p75", times.p75),
        ("response_times.p90", times.p90),
        ("response_times.p95", times.p95),
        ("response_times.p99", times.p99),
        ("response_times.max", times.max),
    ]
}

fn section_title(key: &str) -> String {
    if key == AGGREGATE_KEY {
        "All actions".to_string()
    } else {
        format!("Action `{key}`")
    }
}

fn relative_cell(relative: f64) -> String {
    if relative.is_nan() {
        "n/a".to_string()
    } else {
        format!("{:+.1}%", relative * 100.0)
    }
}
