//! Storage layer.
//!
//! Measurement records are persisted as JSON files; comparison rows can be exported to CSV.

pub mod csv;
pub mod results;

// Re-export key types
pub use csv::{CSV_HEADERS, CsvExporter};
pub use results::{FsResultStore, ResultStore, result_filename};
