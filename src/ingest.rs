//! CSV ingestion
//!
//! Loads a CSV file into a [`FlatTable`], mapping CSV headers onto a
//! dataset's declared fields and coercing each cell by its column kind.
//! Rows that fail to coerce are skipped and reported, not fatal; the
//! loaded table still validates as rectangular typed input.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use std::path::Path;
use thiserror::Error;

use crate::model::{DataKind, Dataset};
use crate::table::{ColumnHeader, ColumnKind, FlatTable, Value};

/// Errors that stop a CSV load entirely
///
/// Per-row coercion failures are collected in [`CsvLoadResult::errors`]
/// instead.
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("Failed to read CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("Loaded table failed validation: {0}")]
    Invalid(#[from] crate::error::EngineError),
}

/// Result type alias for ingestion
pub type IngestResult<T> = Result<T, IngestError>;

/// Outcome of a CSV load
#[derive(Debug)]
pub struct CsvLoadResult {
    /// The typed, validated table
    pub table: FlatTable,
    /// Rows read from the file (excluding the header)
    pub rows_processed: usize,
    /// Rows dropped because a cell would not coerce
    pub rows_failed: usize,
    /// One message per dropped row
    pub errors: Vec<String>,
}

/// CSV loader with configurable timestamp parsing
///
/// The first row must be a header: columns are mapped onto dataset
/// fields by name.
pub struct CsvLoader {
    timestamp_format: String,
}

impl Default for CsvLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl CsvLoader {
    /// Create a loader with default settings
    pub fn new() -> Self {
        Self {
            timestamp_format: "%Y-%m-%d".to_string(),
        }
    }

    /// Set the preferred timestamp format string
    pub fn with_timestamp_format(mut self, format: &str) -> Self {
        self.timestamp_format = format.to_string();
        self
    }

    /// Load a CSV file, typing its columns against the dataset
    ///
    /// Header names matching a declared measure become numeric measure
    /// columns; names matching a dimension take the dimension's kind.
    /// Unmatched headers are kept as categorical string columns so the
    /// file round-trips losslessly.
    pub fn load(&self, path: &Path, dataset: &Dataset) -> IngestResult<CsvLoadResult> {
        let mut reader = csv::Reader::from_path(path)?;
        let headers = reader.headers()?.clone();
        let columns: Vec<ColumnHeader> = headers
            .iter()
            .map(|name| self.column_for(name, dataset))
            .collect();

        let mut rows = Vec::new();
        let mut rows_processed = 0usize;
        let mut rows_failed = 0usize;
        let mut errors = Vec::new();

        for (line, record) in reader.records().enumerate() {
            let record = record?;
            rows_processed += 1;

            match self.coerce_row(&record, &columns) {
                Ok(row) => rows.push(row),
                Err(message) => {
                    rows_failed += 1;
                    errors.push(format!("row {}: {}", line + 1, message));
                }
            }
        }

        if rows_failed > 0 {
            tracing::warn!(
                path = %path.display(),
                rows_failed,
                "Dropped rows that failed cell coercion"
            );
        }

        let table = FlatTable::new(columns, rows)?;
        Ok(CsvLoadResult {
            table,
            rows_processed,
            rows_failed,
            errors,
        })
    }

    /// Header for one CSV column, typed from the dataset's declarations
    fn column_for(&self, name: &str, dataset: &Dataset) -> ColumnHeader {
        if dataset.find_measure(name).is_some() {
            return ColumnHeader::measure(name);
        }
        match dataset.find_dimension(name) {
            Some(dim) => {
                let kind = match dim.kind {
                    DataKind::Categorical => ColumnKind::String,
                    DataKind::Numeric => ColumnKind::Number,
                    DataKind::Temporal => ColumnKind::Timestamp,
                };
                ColumnHeader::dimension(name, kind)
            }
            None => ColumnHeader::dimension(name, ColumnKind::String),
        }
    }

    fn coerce_row(
        &self,
        record: &csv::StringRecord,
        columns: &[ColumnHeader],
    ) -> Result<Vec<Value>, String> {
        if record.len() != columns.len() {
            return Err(format!(
                "{} cells, expected {}",
                record.len(),
                columns.len()
            ));
        }
        record
            .iter()
            .zip(columns.iter())
            .map(|(cell, column)| self.coerce_cell(cell, column))
            .collect()
    }

    fn coerce_cell(&self, cell: &str, column: &ColumnHeader) -> Result<Value, String> {
        let cell = cell.trim();
        if cell.is_empty() {
            return Ok(Value::Null);
        }

        match column.kind {
            ColumnKind::String => Ok(Value::Text(cell.to_string())),
            ColumnKind::Number => cell
                .parse::<f64>()
                .map(Value::Number)
                .map_err(|_| format!("column '{}': '{}' is not numeric", column.name, cell)),
            ColumnKind::Boolean => match cell.to_lowercase().as_str() {
                "true" | "1" | "yes" => Ok(Value::Bool(true)),
                "false" | "0" | "no" => Ok(Value::Bool(false)),
                _ => Err(format!(
                    "column '{}': '{}' is not a boolean",
                    column.name, cell
                )),
            },
            ColumnKind::Timestamp => self
                .parse_timestamp(cell)
                .map(Value::Timestamp)
                .ok_or_else(|| {
                    format!("column '{}': '{}' is not a timestamp", column.name, cell)
                }),
            ColumnKind::Null => Ok(Value::Null),
        }
    }

    /// Parse a timestamp cell into Unix milliseconds
    fn parse_timestamp(&self, cell: &str) -> Option<i64> {
        if let Ok(dt) = NaiveDateTime::parse_from_str(cell, &self.timestamp_format) {
            return Some(dt.and_utc().timestamp_millis());
        }
        if let Ok(date) = NaiveDate::parse_from_str(cell, &self.timestamp_format) {
            return date
                .and_hms_opt(0, 0, 0)
                .map(|dt| dt.and_utc().timestamp_millis());
        }
        if let Ok(dt) = DateTime::parse_from_rfc3339(cell) {
            return Some(dt.timestamp_millis());
        }

        let formats = [
            "%Y-%m-%d %H:%M:%S",
            "%Y-%m-%dT%H:%M:%S",
            "%Y-%m-%d",
            "%m/%d/%Y",
            "%Y/%m/%d",
        ];
        for fmt in formats {
            if let Ok(dt) = NaiveDateTime::parse_from_str(cell, fmt) {
                return Some(dt.and_utc().timestamp_millis());
            }
            if let Ok(date) = NaiveDate::parse_from_str(cell, fmt) {
                return date
                    .and_hms_opt(0, 0, 0)
                    .map(|dt| dt.and_utc().timestamp_millis());
            }
        }

        // Fall back to raw Unix milliseconds
        cell.parse::<i64>().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::AggFn;
    use std::io::Write;

    fn dataset() -> Dataset {
        Dataset::new("sales", "orders")
            .dimension("region", "orders", DataKind::Categorical)
            .dimension("sold_at", "orders", DataKind::Temporal)
            .measure("revenue", AggFn::Sum)
    }

    fn write_csv(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{}", content).unwrap();
        file
    }

    #[test]
    fn test_load_types_columns_from_dataset() {
        let file = write_csv("region,sold_at,revenue\nEast,2024-01-05,100.5\nWest,2024-01-06,50\n");
        let result = CsvLoader::new().load(file.path(), &dataset()).unwrap();

        assert_eq!(result.rows_processed, 2);
        assert_eq!(result.rows_failed, 0);

        let table = &result.table;
        assert_eq!(table.columns[0].kind, ColumnKind::String);
        assert_eq!(table.columns[1].kind, ColumnKind::Timestamp);
        assert_eq!(table.columns[2].kind, ColumnKind::Number);
        assert_eq!(table.rows[0][2], Value::Number(100.5));
        assert!(matches!(table.rows[0][1], Value::Timestamp(_)));
    }

    #[test]
    fn test_empty_cells_become_null() {
        let file = write_csv("region,sold_at,revenue\nEast,2024-01-05,\n");
        let result = CsvLoader::new().load(file.path(), &dataset()).unwrap();
        assert_eq!(result.table.rows[0][2], Value::Null);
    }

    #[test]
    fn test_bad_cells_drop_the_row_with_a_message() {
        let file = write_csv("region,sold_at,revenue\nEast,2024-01-05,abc\nWest,2024-01-06,50\n");
        let result = CsvLoader::new().load(file.path(), &dataset()).unwrap();

        assert_eq!(result.rows_processed, 2);
        assert_eq!(result.rows_failed, 1);
        assert_eq!(result.table.len(), 1);
        assert!(result.errors[0].contains("revenue"));
    }

    #[test]
    fn test_unknown_headers_kept_as_string_columns() {
        let file = write_csv("region,note,revenue\nEast,hello,10\n");
        let result = CsvLoader::new().load(file.path(), &dataset()).unwrap();

        let note = result.table.column_index("note").unwrap();
        assert_eq!(result.table.columns[note].kind, ColumnKind::String);
        assert_eq!(result.table.rows[0][note], Value::Text("hello".to_string()));
    }

    #[test]
    fn test_timestamp_formats() {
        let loader = CsvLoader::new();
        assert!(loader.parse_timestamp("2024-01-05").is_some());
        assert!(loader.parse_timestamp("2024-01-05 10:30:00").is_some());
        assert!(loader.parse_timestamp("2024-01-05T10:30:00Z").is_some());
        assert!(loader.parse_timestamp("1704412800000").is_some());
        assert!(loader.parse_timestamp("next tuesday").is_none());
    }
}
