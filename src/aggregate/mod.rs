//! Aggregation Engine
//!
//! Groups flat rows by dimension-key tuples and folds measures through
//! their declared aggregation functions:
//!
//! - [`aggregate`]: plain GROUP BY over an ordered dimension list
//! - [`pivot`]: row axis x column axis sparse matrix with grand totals
//! - [`rollup`]: hierarchical subtotals, finest dimension peeled first
//! - [`cube`]: aggregates for every subset of the dimension set
//! - [`grouping_sets`]: caller-specified list of dimension subsets
//!
//! Output order is deterministic: group key ascending, NULLs last by
//! default.

mod group;
mod pivot;
mod subtotal;

pub use pivot::{pivot, PivotRequest};
pub use subtotal::{cube, grouping_sets, rollup, CubeRequest, GroupingSetsRequest, RollupRequest};

pub(crate) use group::{aggregate_measures, compare_keys, group_rows};

use crate::error::EngineResult;
use crate::model::Dataset;
use crate::resolver;
use crate::table::{ColumnHeader, FlatTable, NullOrder, ResultTable};

/// Parameters for a plain grouped aggregation
#[derive(Debug, Clone)]
pub struct AggregateRequest {
    /// Ordered group-by dimensions (empty = grand total)
    pub dimensions: Vec<String>,
    /// Measures to aggregate
    pub measures: Vec<String>,
    /// NULL placement in the output order
    pub null_order: NullOrder,
}

impl AggregateRequest {
    /// Create a request with the given measures and no grouping
    pub fn new(measures: &[&str]) -> Self {
        Self {
            dimensions: Vec::new(),
            measures: measures.iter().map(|s| s.to_string()).collect(),
            null_order: NullOrder::default(),
        }
    }

    /// Builder method: set the group-by dimensions
    pub fn group_by(mut self, dimensions: &[&str]) -> Self {
        self.dimensions = dimensions.iter().map(|s| s.to_string()).collect();
        self
    }

    /// Builder method: set NULL placement
    pub fn null_order(mut self, order: NullOrder) -> Self {
        self.null_order = order;
        self
    }
}

/// Group rows by the requested dimensions and aggregate each measure
pub fn aggregate(
    dataset: &Dataset,
    table: &FlatTable,
    request: &AggregateRequest,
) -> EngineResult<ResultTable> {
    table.validate()?;
    let resolved = resolver::resolve(dataset, table, &request.dimensions, &request.measures)?;

    let key_columns: Vec<usize> = resolved.dimensions.iter().map(|d| d.column).collect();
    let groups = group_rows(table, &key_columns, request.null_order);

    let mut columns: Vec<ColumnHeader> = resolved
        .dimensions
        .iter()
        .map(|d| ColumnHeader::dimension(&d.name, table.columns[d.column].kind))
        .collect();
    columns.extend(
        resolved
            .measures
            .iter()
            .map(|m| ColumnHeader::measure(&m.name)),
    );

    let mut result = ResultTable::new(columns);
    for (key, indices) in &groups {
        let mut row = key.clone();
        row.extend(aggregate_measures(table, indices, &resolved.measures));
        result.push_row(row);
    }

    tracing::debug!(
        dataset = %dataset.name,
        rows_in = table.len(),
        groups = result.len(),
        "Aggregated"
    );
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AggFn, DataKind};
    use crate::table::{ColumnKind, Value};

    fn dataset() -> Dataset {
        Dataset::new("sales", "orders")
            .dimension("region", "orders", DataKind::Categorical)
            .dimension("month", "orders", DataKind::Categorical)
            .measure("sales", AggFn::Sum)
            .measure("avg_sale", AggFn::Avg)
    }

    fn table() -> FlatTable {
        // The spec's worked scenario plus a NULL measure row
        FlatTable::new(
            vec![
                ColumnHeader::dimension("region", ColumnKind::String),
                ColumnHeader::dimension("month", ColumnKind::String),
                ColumnHeader::measure("sales"),
                ColumnHeader::measure("avg_sale"),
            ],
            vec![
                vec![
                    Value::from("East"),
                    Value::from("2024-01"),
                    Value::from(100.0),
                    Value::from(100.0),
                ],
                vec![
                    Value::from("West"),
                    Value::from("2024-01"),
                    Value::from(50.0),
                    Value::from(50.0),
                ],
                vec![
                    Value::from("East"),
                    Value::from("2024-02"),
                    Value::from(120.0),
                    Value::from(120.0),
                ],
                vec![
                    Value::from("East"),
                    Value::from("2024-02"),
                    Value::Null,
                    Value::Null,
                ],
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_group_by_region() {
        let request = AggregateRequest::new(&["sales"]).group_by(&["region"]);
        let result = aggregate(&dataset(), &table(), &request).unwrap();

        assert_eq!(result.len(), 2);
        assert_eq!(result.value(0, "region"), Some(&Value::from("East")));
        assert_eq!(result.value(0, "sales"), Some(&Value::Number(220.0)));
        assert_eq!(result.value(1, "region"), Some(&Value::from("West")));
        assert_eq!(result.value(1, "sales"), Some(&Value::Number(50.0)));
    }

    #[test]
    fn test_null_measures_ignored_in_avg() {
        let request = AggregateRequest::new(&["avg_sale"]).group_by(&["region", "month"]);
        let result = aggregate(&dataset(), &table(), &request).unwrap();

        // East/2024-02 has values [120, NULL]; avg ignores the NULL
        assert_eq!(result.value(1, "avg_sale"), Some(&Value::Number(120.0)));
    }

    #[test]
    fn test_empty_group_by_is_grand_total() {
        let request = AggregateRequest::new(&["sales"]);
        let result = aggregate(&dataset(), &table(), &request).unwrap();

        assert_eq!(result.len(), 1);
        assert_eq!(result.value(0, "sales"), Some(&Value::Number(270.0)));
    }

    #[test]
    fn test_empty_input_grand_total_sums_to_zero() {
        let empty = FlatTable::new(table().columns, vec![]).unwrap();
        let request = AggregateRequest::new(&["sales", "avg_sale"]);
        let result = aggregate(&dataset(), &empty, &request).unwrap();

        assert_eq!(result.value(0, "sales"), Some(&Value::Number(0.0)));
        assert_eq!(result.value(0, "avg_sale"), Some(&Value::Null));
    }

    #[test]
    fn test_unknown_dimension_fails() {
        let request = AggregateRequest::new(&["sales"]).group_by(&["warehouse"]);
        let err = aggregate(&dataset(), &table(), &request).unwrap_err();
        assert!(matches!(err, crate::error::EngineError::UnknownField(_)));
    }

    #[test]
    fn test_output_columns_are_role_tagged() {
        let request = AggregateRequest::new(&["sales"]).group_by(&["region"]);
        let result = aggregate(&dataset(), &table(), &request).unwrap();

        assert_eq!(
            result.columns[0].role,
            crate::table::ColumnRole::Dimension
        );
        assert_eq!(result.columns[1].role, crate::table::ColumnRole::Measure);
    }
}
