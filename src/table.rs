//! Tabular value types
//!
//! This module defines the typed, rectangular data the engine consumes and
//! produces:
//! - `Value`: a single typed cell
//! - `ColumnHeader`: a named column with declared kind and role
//! - `FlatTable`: the materialized input result set (validated on use)
//! - `ResultTable`: engine output with optional per-row group metadata

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::error::{EngineError, EngineResult};

/// A single typed cell value
///
/// NULL is a first-class value: it participates in grouping as its own
/// group and is the "absent" marker in pivot and subtotal output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// Missing / absent value
    Null,
    /// Boolean
    Bool(bool),
    /// Numeric value (all numerics are f64)
    Number(f64),
    /// String value
    Text(String),
    /// Unix timestamp in milliseconds
    ///
    /// Untagged deserialization never produces this variant (numbers win);
    /// timestamp cells are coerced by declared column kind instead.
    Timestamp(i64),
}

impl Value {
    /// Check for NULL
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Numeric view of this value, if it has one
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Timestamp view of this value, if it has one
    pub fn as_timestamp(&self) -> Option<i64> {
        match self {
            Value::Timestamp(ts) => Some(*ts),
            _ => None,
        }
    }

    /// Variant rank used for cross-kind ordering (same-kind comparison is
    /// the common case; mixed kinds only occur in malformed-ish input)
    fn rank(&self) -> u8 {
        match self {
            Value::Bool(_) => 0,
            Value::Number(_) => 1,
            Value::Timestamp(_) => 2,
            Value::Text(_) => 3,
            Value::Null => 4,
        }
    }

    /// Total ordering for group keys and sorts
    ///
    /// NULL placement is controlled by `nulls`; everything else compares
    /// within its kind (numbers via total order, so NaN is sortable too).
    pub fn cmp_grouping(&self, other: &Value, nulls: NullOrder) -> Ordering {
        match (self, other) {
            (Value::Null, Value::Null) => Ordering::Equal,
            (Value::Null, _) => match nulls {
                NullOrder::First => Ordering::Less,
                NullOrder::Last => Ordering::Greater,
            },
            (_, Value::Null) => match nulls {
                NullOrder::First => Ordering::Greater,
                NullOrder::Last => Ordering::Less,
            },
            (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
            (Value::Number(a), Value::Number(b)) => a.total_cmp(b),
            (Value::Timestamp(a), Value::Timestamp(b)) => a.cmp(b),
            (Value::Text(a), Value::Text(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Number(n) => write!(f, "{}", n),
            Value::Text(s) => write!(f, "{}", s),
            Value::Timestamp(ts) => match chrono::DateTime::from_timestamp_millis(*ts) {
                Some(dt) => write!(f, "{}", dt.format("%Y-%m-%dT%H:%M:%SZ")),
                None => write!(f, "{}", ts),
            },
        }
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<Option<f64>> for Value {
    fn from(n: Option<f64>) -> Self {
        match n {
            Some(n) => Value::Number(n),
            None => Value::Null,
        }
    }
}

/// Where NULL keys sort relative to non-NULL keys
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NullOrder {
    /// NULL groups before all values
    First,
    /// NULL groups after all values (the default)
    #[default]
    Last,
}

/// Declared kind of a column's cells
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnKind {
    /// UTF-8 strings
    String,
    /// f64 numerics
    Number,
    /// Booleans
    Boolean,
    /// Unix-millisecond timestamps
    Timestamp,
    /// Column of only NULLs
    Null,
}

impl ColumnKind {
    /// Whether a cell value is admissible under this kind
    ///
    /// NULL cells are admissible everywhere.
    pub fn admits(&self, value: &Value) -> bool {
        match (self, value) {
            (_, Value::Null) => true,
            (ColumnKind::String, Value::Text(_)) => true,
            (ColumnKind::Number, Value::Number(_)) => true,
            (ColumnKind::Boolean, Value::Bool(_)) => true,
            (ColumnKind::Timestamp, Value::Timestamp(_)) => true,
            (ColumnKind::Null, _) => false,
            _ => false,
        }
    }
}

/// Role a column plays in engine output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnRole {
    /// Grouping axis
    Dimension,
    /// Aggregated numeric
    Measure,
    /// Computed by the engine (window results, deltas, classes)
    Derived,
}

/// A named, typed column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnHeader {
    /// Column name
    pub name: String,
    /// Declared cell kind
    pub kind: ColumnKind,
    /// Role in the output
    pub role: ColumnRole,
}

impl ColumnHeader {
    /// Create a dimension column
    pub fn dimension(name: impl Into<String>, kind: ColumnKind) -> Self {
        Self {
            name: name.into(),
            kind,
            role: ColumnRole::Dimension,
        }
    }

    /// Create a numeric measure column
    pub fn measure(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: ColumnKind::Number,
            role: ColumnRole::Measure,
        }
    }

    /// Create a derived column
    pub fn derived(name: impl Into<String>, kind: ColumnKind) -> Self {
        Self {
            name: name.into(),
            kind,
            role: ColumnRole::Derived,
        }
    }
}

/// The flat, already-joined input result set
///
/// Rows are positionally aligned with `columns`. The table is validated
/// before any engine operation touches it; ragged rows and kind
/// mismatches are a `MalformedInputError`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlatTable {
    /// Ordered column headers
    pub columns: Vec<ColumnHeader>,
    /// Ordered rows of typed cells
    pub rows: Vec<Vec<Value>>,
}

impl FlatTable {
    /// Create a table and validate its shape
    pub fn new(columns: Vec<ColumnHeader>, rows: Vec<Vec<Value>>) -> EngineResult<Self> {
        let table = Self { columns, rows };
        table.validate()?;
        Ok(table)
    }

    /// Validate rectangularity and cell kinds
    pub fn validate(&self) -> EngineResult<()> {
        let width = self.columns.len();
        for (i, row) in self.rows.iter().enumerate() {
            if row.len() != width {
                return Err(EngineError::MalformedInput(format!(
                    "row {} has {} cells, expected {}",
                    i,
                    row.len(),
                    width
                )));
            }
            for (col, cell) in self.columns.iter().zip(row.iter()) {
                if !col.kind.admits(cell) {
                    return Err(EngineError::MalformedInput(format!(
                        "row {}: column '{}' declared {:?} but holds {:?}",
                        i, col.name, col.kind, cell
                    )));
                }
            }
        }
        Ok(())
    }

    /// Index of a column by name
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Per-row group metadata in engine output
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RowMeta {
    /// Subtotal level for ROLLUP output (0 = grand total, n = full detail)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtotal_level: Option<usize>,
    /// Dimensions collapsed (absent) in this row, for CUBE output
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub collapsed: Vec<String>,
    /// Index into the caller-supplied grouping-set list
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grouping_set: Option<usize>,
    /// Time bucket start (Unix millis) for time-series output
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bucket: Option<i64>,
    /// Rank for window output
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rank: Option<usize>,
}

impl RowMeta {
    /// Metadata for a subtotal row
    pub fn subtotal(level: usize) -> Self {
        Self {
            subtotal_level: Some(level),
            ..Default::default()
        }
    }

    /// Metadata for a time bucket row
    pub fn bucketed(bucket: i64) -> Self {
        Self {
            bucket: Some(bucket),
            ..Default::default()
        }
    }

    /// Check whether any field is set
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Structured engine output: headers, typed rows, row-group tags
///
/// `meta` is either empty (no group metadata) or aligned 1:1 with `rows`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultTable {
    /// Ordered, role-tagged column headers
    pub columns: Vec<ColumnHeader>,
    /// Ordered rows of typed cells
    pub rows: Vec<Vec<Value>>,
    /// Row-group metadata, aligned with `rows` when non-empty
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub meta: Vec<RowMeta>,
}

impl ResultTable {
    /// Create an empty result with the given columns
    pub fn new(columns: Vec<ColumnHeader>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
            meta: Vec::new(),
        }
    }

    /// Append an untagged row
    pub fn push_row(&mut self, row: Vec<Value>) {
        self.rows.push(row);
        if !self.meta.is_empty() {
            self.meta.push(RowMeta::default());
        }
    }

    /// Append a row with group metadata
    pub fn push_tagged(&mut self, row: Vec<Value>, meta: RowMeta) {
        // Backfill default tags so meta stays aligned with rows
        while self.meta.len() < self.rows.len() {
            self.meta.push(RowMeta::default());
        }
        self.rows.push(row);
        self.meta.push(meta);
    }

    /// Index of a column by name
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// Cell lookup by row index and column name (mostly for tests)
    pub fn value(&self, row: usize, column: &str) -> Option<&Value> {
        let col = self.column_index(column)?;
        self.rows.get(row)?.get(col)
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_columns() -> Vec<ColumnHeader> {
        vec![
            ColumnHeader::dimension("region", ColumnKind::String),
            ColumnHeader::measure("sales"),
        ]
    }

    #[test]
    fn test_flat_table_accepts_rectangular_rows() {
        let table = FlatTable::new(
            sample_columns(),
            vec![
                vec![Value::from("East"), Value::from(100.0)],
                vec![Value::Null, Value::Null],
            ],
        );
        assert!(table.is_ok());
    }

    #[test]
    fn test_flat_table_rejects_ragged_rows() {
        let result = FlatTable::new(
            sample_columns(),
            vec![vec![Value::from("East")]],
        );
        assert!(matches!(result, Err(EngineError::MalformedInput(_))));
    }

    #[test]
    fn test_flat_table_rejects_kind_mismatch() {
        let result = FlatTable::new(
            sample_columns(),
            vec![vec![Value::from("East"), Value::from("not a number")]],
        );
        assert!(matches!(result, Err(EngineError::MalformedInput(_))));
    }

    #[test]
    fn test_null_admissible_in_any_kind() {
        assert!(ColumnKind::Number.admits(&Value::Null));
        assert!(ColumnKind::String.admits(&Value::Null));
        assert!(!ColumnKind::Number.admits(&Value::from("x")));
    }

    #[test]
    fn test_cmp_grouping_nulls_last() {
        let a = Value::from(1.0);
        let null = Value::Null;
        assert_eq!(a.cmp_grouping(&null, NullOrder::Last), Ordering::Less);
        assert_eq!(null.cmp_grouping(&a, NullOrder::Last), Ordering::Greater);
        assert_eq!(null.cmp_grouping(&Value::Null, NullOrder::Last), Ordering::Equal);
    }

    #[test]
    fn test_cmp_grouping_nulls_first() {
        let a = Value::from(1.0);
        assert_eq!(Value::Null.cmp_grouping(&a, NullOrder::First), Ordering::Less);
    }

    #[test]
    fn test_result_table_meta_stays_aligned() {
        let mut result = ResultTable::new(sample_columns());
        result.push_row(vec![Value::from("East"), Value::from(1.0)]);
        result.push_tagged(
            vec![Value::Null, Value::from(1.0)],
            RowMeta::subtotal(0),
        );
        assert_eq!(result.rows.len(), 2);
        assert_eq!(result.meta.len(), 2);
        assert!(result.meta[0].is_empty());
        assert_eq!(result.meta[1].subtotal_level, Some(0));
    }

    #[test]
    fn test_value_serializes_untagged() {
        let json = serde_json::to_string(&vec![
            Value::Null,
            Value::from(1.5),
            Value::from("x"),
        ])
        .unwrap();
        assert_eq!(json, r#"[null,1.5,"x"]"#);
    }

    #[test]
    fn test_timestamp_display_is_iso() {
        // 2024-01-15 00:00:00 UTC
        let v = Value::Timestamp(1705276800000);
        assert_eq!(v.to_string(), "2024-01-15T00:00:00Z");
    }
}
