//! CSV export for comparison rows.

use std::io::Write;
use std::path::Path;

use crate::BenchError;
use crate::report::ComparisonRow;

/// CSV column headers in deterministic order.
pub const CSV_HEADERS: &[&str] = &["benchmark", "unit", "before", "after", "ratio", "change"];

/// CSV exporter for comparison rows.
///
/// Rows are written in the order given, so callers pass them already sorted.
#[derive(Debug, Clone, Default)]
pub struct CsvExporter;

impl CsvExporter {
    pub fn new() -> Self {
        CsvExporter
    }

    /// Export rows to a CSV file.
    ///
    /// # Errors
    /// Returns an error if file operations or CSV writing fails.
    pub fn export(&self, rows: &[ComparisonRow], output: &Path) -> Result<(), BenchError> {
        if let Some(parent) = output.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| BenchError::Message(format!("failed to create directory: {e}")))?;
            }
        }

        let file = std::fs::File::create(output)
            .map_err(|e| BenchError::Message(format!("failed to create file: {e}")))?;

        self.export_to_writer(rows, file)
    }

    /// Export rows to any writer implementing Write.
    pub fn export_to_writer<W: Write>(
        &self,
        rows: &[ComparisonRow],
        writer: W,
    ) -> Result<(), BenchError> {
        let mut csv_writer = csv::Writer::from_writer(writer);

        csv_writer
            .write_record(CSV_HEADERS)
            .map_err(|e| BenchError::Message(format!("failed to write CSV headers: {e}")))?;

        for row in rows {
            csv_writer
                .write_record(&self.row_to_record(row))
                .map_err(|e| BenchError::Message(format!("failed to write CSV row: {e}")))?;
        }

        csv_writer
            .flush()
            .map_err(|e| BenchError::Message(format!("failed to flush CSV writer: {e}")))?;

        Ok(())
    }

    fn row_to_record(&self, row: &ComparisonRow) -> Vec<String> {
        vec![
            row.name.clone(),
            row.meta.unit.clone(),
            row.before.to_string(),
            row.after.to_string(),
            format!("{:.8}", row.ratio),
            row.change.label().to_string(),
        ]
    }
}
