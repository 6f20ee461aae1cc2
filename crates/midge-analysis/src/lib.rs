//! Performance analysis of Midge action logs.
//!
//! [`analyze`] turns a finished log collection into a [`FullReport`](midge_core::FullReport);
//! [`compare`] and friends diff a report against a baseline of the same shape.

pub mod analyze;
pub mod compare;
pub mod reporter;
pub mod stats;

pub use analyze::{analyze, analyze_performance};
pub use compare::{compare, compare_any, compare_full, delta};
pub use reporter::{
    comparison_markdown, comparison_rows, render_comparison, render_report, report_markdown,
    ReportFormat,
};
