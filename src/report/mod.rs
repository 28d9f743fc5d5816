//! Regression analysis and reporting.
//!
//! This module provides:
//! - `compare`: significance filter and verdict over two aggregated commits
//! - Text rendering with human-readable values for the terminal
//! - `RegressionReport`: JSON output for CI pipelines

pub mod format;
pub mod regression;
pub mod render;

// Re-export key types
pub use format::{human_file_size, human_float, human_time, human_value, truncate_left};
pub use regression::{
    ChangeKind, Comparison, ComparisonRow, RegressionReport, ReportMetadata, ReportSummary,
    classify_ratio, compare, write_json_report,
};
pub use render::{
    CHANGED_MESSAGE, LineStyle, NAME_WIDTH, PlainSink, RenderedReport, ReportLine, ReportSink,
    RowOrder, TerminalSink, UNCHANGED_MESSAGE, render, sort_rows, sorted_rows,
};
