use anyhow::{Context, Result};
use clap::Parser;
use midge_cli::commands::{analyze_files, compare_files, list_tests, run_tests, RunOptions};
use midge_cli::{demo, Cli, Command};
use midge_core::MidgeConfig;
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Initialize logging
    init_logging();

    let args = Cli::parse();
    let config = MidgeConfig::load().context("failed to load configuration")?;
    let registry = demo::registry(&config.swarm);

    match args.command {
        Command::Run {
            tests,
            analyze,
            output_dir,
            format,
        } => {
            let options = RunOptions {
                output_dir: output_dir.unwrap_or_else(|| config.output.dir.clone()),
                pretty: config.output.pretty,
                analyze,
                format: format.into(),
                quiet: false,
            };
            let files = run_tests(&registry, &tests, &options).await?;
            for file in files {
                println!("{}", file.display());
            }
        }
        Command::Analyze { files, format } => {
            let reports = analyze_files(&files, format.into(), config.output.pretty)?;
            for report in reports {
                println!("{}", report.display());
            }
        }
        Command::Compare {
            baseline,
            report,
            format,
        } => {
            let rendered = compare_files(&baseline, &report, format.into(), config.output.pretty)?;
            println!("{rendered}");
        }
        Command::List => {
            for name in list_tests(&registry) {
                println!("{name}");
            }
        }
    }

    Ok(())
}

/// Initialize logging on stderr, keeping stdout for command output
fn init_logging() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
