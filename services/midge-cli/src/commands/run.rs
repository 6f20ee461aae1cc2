use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use midge_analysis::ReportFormat;
use midge_core::codec::write_file;
use midge_core::{ActionLog, MidgeResult};
use midge_swarm::{execute, LoadTest, TestRegistry};
use tracing::{info, warn};

use super::analyze_files;

/// Input options for running registered load tests.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Directory receiving `<test>.log` files.
    pub output_dir: PathBuf,
    pub pretty: bool,
    /// Write a report next to every log file once all tests finish.
    pub analyze: bool,
    pub format: ReportFormat,
    /// Hide the progress spinner.
    pub quiet: bool,
}

/// Runs the named tests (every registered test when `names` is empty) one
/// after another and returns the written log files.
pub async fn run_tests(
    registry: &TestRegistry,
    names: &[String],
    options: &RunOptions,
) -> Result<Vec<PathBuf>> {
    let names: Vec<String> = if names.is_empty() {
        registry.names().map(str::to_string).collect()
    } else {
        names.to_vec()
    };
    if names.is_empty() {
        return Err(anyhow!("no load tests registered"));
    }

    fs::create_dir_all(&options.output_dir).with_context(|| {
        format!(
            "failed to create output directory {}",
            options.output_dir.display()
        )
    })?;

    let mut log_files = Vec::with_capacity(names.len());
    for name in &names {
        let test = registry
            .construct(name)
            .with_context(|| format!("failed to build load test {name}"))?;

        let pb = spinner(name, options.quiet)?;
        let result = run_until_interrupted(test.as_ref()).await;
        pb.finish_and_clear();
        let logs = result.with_context(|| format!("load test {name} failed"))?;

        let path = options.output_dir.join(format!("{name}.log"));
        write_file(&logs, &path, options.pretty)
            .with_context(|| format!("failed to write log file {}", path.display()))?;
        info!(test = %name, logs = logs.len(), path = %path.display(), "logs written");
        log_files.push(path);
    }

    if options.analyze {
        analyze_files(&log_files, options.format, options.pretty)?;
    }

    Ok(log_files)
}

/// Ctrl-C stops the test gracefully; the logs gathered so far are kept.
async fn run_until_interrupted(test: &dyn LoadTest) -> MidgeResult<Vec<ActionLog>> {
    let run = execute(test);
    tokio::pin!(run);

    tokio::select! {
        result = &mut run => result,
        Ok(()) = tokio::signal::ctrl_c() => {
            warn!(test = %test.name(), "interrupted, stopping load test");
            test.stop();
            run.await
        }
    }
}

fn spinner(name: &str, quiet: bool) -> Result<ProgressBar> {
    if quiet {
        return Ok(ProgressBar::hidden());
    }
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}")?,
    );
    pb.set_message(format!("Running {name}..."));
    pb.enable_steady_tick(Duration::from_millis(120));
    Ok(pb)
}
