//! Sub-command implementations. Each returns `anyhow::Result` with file context attached.

mod analyze;
mod compare;
mod run;

pub use analyze::{analyze_files, report_path};
pub use compare::compare_files;
pub use run::{run_tests, RunOptions};

use midge_swarm::TestRegistry;

/// Registered test names in registration order.
pub fn list_tests(registry: &TestRegistry) -> Vec<String> {
    registry.names().map(str::to_string).collect()
}
