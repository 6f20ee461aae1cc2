use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use midge_analysis::ReportFormat;

#[derive(Parser, Debug)]
#[command(name = "midge")]
#[command(about = "Midge load generator and performance analyzer", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run LOAD-TESTS and write one LOG file per test
    Run {
        /// Registered test names (all tests when omitted)
        #[arg(value_name = "TEST")]
        tests: Vec<String>,

        /// Analyze LOGS after the LOAD-TESTS finish
        #[arg(long, short)]
        analyze: bool,

        /// Directory for LOG and REPORT files
        #[arg(long, short, env = "MIDGE_OUTPUT_DIR")]
        output_dir: Option<PathBuf>,

        /// REPORT format used with --analyze
        #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
        format: OutputFormat,
    },

    /// Analyze LOG file(s) and write a REPORT next to each
    Analyze {
        /// Load-test LOG file(s)
        #[arg(required = true)]
        files: Vec<PathBuf>,

        #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
        format: OutputFormat,
    },

    /// Compare a REPORT against a baseline REPORT
    Compare {
        /// Baseline REPORT file
        #[arg(long, short)]
        baseline: PathBuf,

        /// New REPORT file
        #[arg(long, short)]
        report: PathBuf,

        #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
        format: OutputFormat,
    },

    /// List registered LOAD-TESTS
    List,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Json,
    Markdown,
}

impl From<OutputFormat> for ReportFormat {
    fn from(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Json => ReportFormat::Json,
            OutputFormat::Markdown => ReportFormat::Markdown,
        }
    }
}
