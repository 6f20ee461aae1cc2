use std::path::Path;

use anyhow::{Context, Result};
use midge_analysis::{compare_any, render_comparison, ReportFormat};
use midge_core::codec::read_file;
use midge_core::Report;

/// Loads two JSON reports of the same shape and renders `report - baseline`.
pub fn compare_files(
    baseline: &Path,
    report: &Path,
    format: ReportFormat,
    pretty: bool,
) -> Result<String> {
    let baseline_report: Report = read_file(baseline)
        .with_context(|| format!("failed to read baseline report {}", baseline.display()))?;
    let new_report: Report = read_file(report)
        .with_context(|| format!("failed to read report {}", report.display()))?;

    let comparison = compare_any(&new_report, &baseline_report).with_context(|| {
        format!(
            "cannot compare {} against {}",
            report.display(),
            baseline.display()
        )
    })?;

    let title = format!("{} vs {}", report.display(), baseline.display());
    Ok(render_comparison(&title, &comparison, format, pretty)?)
}
