//! Core data model, errors, and persistence helpers shared by the Midge engine.

pub mod clock;
pub mod codec;
pub mod config;
pub mod error;
pub mod record;

pub use clock::now_ms;
pub use config::{MidgeConfig, OutputConfig, SwarmConfig};
pub use error::{MidgeError, MidgeResult};
pub use record::{
    ActionLog, Comparison, Delta, FullComparison, FullReport, PartitionMap, PerformanceComparison,
    PerformanceReport, Report, RequestsComparison, RequestsReport, ResponseTimesComparison,
    ResponseTimesReport, ResponsesComparison, ResponsesReport, WorkerId, AGGREGATE_KEY,
};
