//! Pivot
//!
//! Cross-tabulates two disjoint dimension sets into a sparse matrix: one
//! output row per distinct row-axis key, one output column per column-axis
//! key actually observed in the input. Absent combinations are NULL, not
//! zero. Grand totals are computed from the raw rows (not from cells), so
//! they are correct for non-additive aggregations like avg.

use crate::aggregate::{aggregate_measures, compare_keys, group_rows};
use crate::error::{EngineError, EngineResult};
use crate::model::Dataset;
use crate::resolver;
use crate::table::{ColumnHeader, FlatTable, NullOrder, ResultTable, RowMeta, Value};

/// Parameters for a pivot
#[derive(Debug, Clone)]
pub struct PivotRequest {
    /// Row-axis dimensions
    pub row_dimensions: Vec<String>,
    /// Column-axis dimensions (disjoint from the row axis)
    pub column_dimensions: Vec<String>,
    /// The measure aggregated into each cell
    pub measure: String,
    /// Whether to append the grand-total row and column
    pub totals: bool,
    /// NULL placement in axis ordering
    pub null_order: NullOrder,
}

impl PivotRequest {
    /// Create a pivot request for one measure
    pub fn new(measure: impl Into<String>) -> Self {
        Self {
            row_dimensions: Vec::new(),
            column_dimensions: Vec::new(),
            measure: measure.into(),
            totals: true,
            null_order: NullOrder::default(),
        }
    }

    /// Builder method: set the row axis
    pub fn rows(mut self, dimensions: &[&str]) -> Self {
        self.row_dimensions = dimensions.iter().map(|s| s.to_string()).collect();
        self
    }

    /// Builder method: set the column axis
    pub fn columns(mut self, dimensions: &[&str]) -> Self {
        self.column_dimensions = dimensions.iter().map(|s| s.to_string()).collect();
        self
    }

    /// Builder method: drop the grand-total row and column
    pub fn without_totals(mut self) -> Self {
        self.totals = false;
        self
    }

    /// Builder method: set NULL placement
    pub fn null_order(mut self, order: NullOrder) -> Self {
        self.null_order = order;
        self
    }
}

/// Pivot the input into a row-axis x column-axis matrix
pub fn pivot(
    dataset: &Dataset,
    table: &FlatTable,
    request: &PivotRequest,
) -> EngineResult<ResultTable> {
    table.validate()?;

    if request.row_dimensions.is_empty() || request.column_dimensions.is_empty() {
        return Err(EngineError::InvalidArgument(
            "pivot requires at least one row and one column dimension".to_string(),
        ));
    }
    for name in &request.row_dimensions {
        if request.column_dimensions.contains(name) {
            return Err(EngineError::InvalidArgument(format!(
                "dimension '{}' appears on both pivot axes",
                name
            )));
        }
    }

    let all_dims: Vec<String> = request
        .row_dimensions
        .iter()
        .chain(request.column_dimensions.iter())
        .cloned()
        .collect();
    let resolved = resolver::resolve(
        dataset,
        table,
        &all_dims,
        std::slice::from_ref(&request.measure),
    )?;
    let (row_dims, col_dims) = resolved.dimensions.split_at(request.row_dimensions.len());
    let measure = &resolved.measures;

    let nulls = request.null_order;
    let row_cols: Vec<usize> = row_dims.iter().map(|d| d.column).collect();
    let col_cols: Vec<usize> = col_dims.iter().map(|d| d.column).collect();
    let cell_cols: Vec<usize> = row_cols.iter().chain(col_cols.iter()).copied().collect();

    let row_groups = group_rows(table, &row_cols, nulls);
    let col_groups = group_rows(table, &col_cols, nulls);
    let cell_groups = group_rows(table, &cell_cols, nulls);

    // Matrix of cells, defaulting to the absent marker
    let mut matrix = vec![vec![Value::Null; col_groups.len()]; row_groups.len()];
    for (key, indices) in &cell_groups {
        let (row_key, col_key) = key.split_at(row_cols.len());
        let row_idx = row_groups
            .binary_search_by(|(k, _)| compare_keys(k, row_key, nulls))
            .ok();
        let col_idx = col_groups
            .binary_search_by(|(k, _)| compare_keys(k, col_key, nulls))
            .ok();
        if let (Some(r), Some(c)) = (row_idx, col_idx) {
            matrix[r][c] = aggregate_measures(table, indices, measure).remove(0);
        }
    }

    let mut columns: Vec<ColumnHeader> = row_dims
        .iter()
        .map(|d| ColumnHeader::dimension(&d.name, table.columns[d.column].kind))
        .collect();
    for (key, _) in &col_groups {
        columns.push(ColumnHeader::measure(column_label(key)));
    }
    if request.totals {
        columns.push(ColumnHeader::measure("total"));
    }

    let mut result = ResultTable::new(columns);
    for (r, (row_key, row_indices)) in row_groups.iter().enumerate() {
        let mut row = row_key.clone();
        row.append(&mut matrix[r]);
        if request.totals {
            row.push(aggregate_measures(table, row_indices, measure).remove(0));
        }
        result.push_row(row);
    }

    if request.totals {
        // Grand-total row: column totals plus the all-rows cell
        let mut row: Vec<Value> = vec![Value::Null; row_cols.len()];
        for (_, col_indices) in &col_groups {
            row.push(aggregate_measures(table, col_indices, measure).remove(0));
        }
        let everything: Vec<usize> = (0..table.len()).collect();
        row.push(aggregate_measures(table, &everything, measure).remove(0));
        result.push_tagged(row, RowMeta::subtotal(0));
    }

    tracing::debug!(
        dataset = %dataset.name,
        rows = row_groups.len(),
        columns = col_groups.len(),
        "Pivoted"
    );
    Ok(result)
}

/// Header label for a column-axis key
fn column_label(key: &[Value]) -> String {
    key.iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join("/")
}
