use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use midge_analysis::{analyze, render_report, ReportFormat};
use midge_core::codec::read_file;
use midge_core::{ActionLog, Report};
use tracing::info;

/// Analyzes every log file and writes `<stem>.report.<ext>` next to it.
pub fn analyze_files(
    files: &[PathBuf],
    format: ReportFormat,
    pretty: bool,
) -> Result<Vec<PathBuf>> {
    let mut reports = Vec::with_capacity(files.len());

    for file in files {
        let logs: Vec<ActionLog> = read_file(file)
            .with_context(|| format!("failed to read log file {}", file.display()))?;
        let report = analyze(&logs)
            .with_context(|| format!("failed to analyze {}", file.display()))?;

        let title = log_stem(file);
        let rendered = render_report(&title, &Report::Full(report), format, pretty)?;
        let path = report_path(file, format);
        fs::write(&path, rendered)
            .with_context(|| format!("failed to write report {}", path.display()))?;

        info!(logs = logs.len(), report = %path.display(), "report written");
        reports.push(path);
    }

    Ok(reports)
}

/// `runs/checkout.log` becomes `runs/checkout.report.json` (or `.report.md`).
pub fn report_path(log_file: &Path, format: ReportFormat) -> PathBuf {
    log_file.with_file_name(format!("{}.report.{}", log_stem(log_file), format.extension()))
}

fn log_stem(log_file: &Path) -> String {
    log_file
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or("report")
        .to_string()
}
