//! Hierarchical subtotals
//!
//! ROLLUP, CUBE and GROUPING SETS over an ordered dimension list. All
//! three share one shape: pick a subset of the dimensions, group by it,
//! render the collapsed dimensions as NULL, and tag each output row with
//! where it came from (`RowMeta`).

use crate::aggregate::{aggregate_measures, group_rows};
use crate::error::{EngineError, EngineResult};
use crate::model::Dataset;
use crate::resolver::{self, ResolvedDimension, ResolvedMeasure};
use crate::table::{ColumnHeader, FlatTable, NullOrder, ResultTable, RowMeta, Value};

/// Hard cap on CUBE width; 2^n grouping combinations get silly fast
const MAX_CUBE_DIMENSIONS: usize = 16;

/// Parameters for a ROLLUP
#[derive(Debug, Clone)]
pub struct RollupRequest {
    /// Ordered dimensions, coarsest to finest (ignored when `hierarchy` is set)
    pub dimensions: Vec<String>,
    /// Use a declared hierarchy's levels as the dimension order
    pub hierarchy: Option<String>,
    /// Measures to aggregate
    pub measures: Vec<String>,
    /// NULL placement in the output order
    pub null_order: NullOrder,
}

impl RollupRequest {
    /// Create a rollup over an explicit dimension order
    pub fn new(dimensions: &[&str], measures: &[&str]) -> Self {
        Self {
            dimensions: dimensions.iter().map(|s| s.to_string()).collect(),
            hierarchy: None,
            measures: measures.iter().map(|s| s.to_string()).collect(),
            null_order: NullOrder::default(),
        }
    }

    /// Create a rollup along a declared hierarchy
    pub fn along_hierarchy(hierarchy: impl Into<String>, measures: &[&str]) -> Self {
        Self {
            dimensions: Vec::new(),
            hierarchy: Some(hierarchy.into()),
            measures: measures.iter().map(|s| s.to_string()).collect(),
            null_order: NullOrder::default(),
        }
    }

    /// Builder method: set NULL placement
    pub fn null_order(mut self, order: NullOrder) -> Self {
        self.null_order = order;
        self
    }
}

/// Parameters for a CUBE
#[derive(Debug, Clone)]
pub struct CubeRequest {
    /// Dimension set (every subset is aggregated)
    pub dimensions: Vec<String>,
    /// Measures to aggregate
    pub measures: Vec<String>,
    /// NULL placement in the output order
    pub null_order: NullOrder,
}

impl CubeRequest {
    /// Create a cube request
    pub fn new(dimensions: &[&str], measures: &[&str]) -> Self {
        Self {
            dimensions: dimensions.iter().map(|s| s.to_string()).collect(),
            measures: measures.iter().map(|s| s.to_string()).collect(),
            null_order: NullOrder::default(),
        }
    }
}

/// Parameters for GROUPING SETS
#[derive(Debug, Clone)]
pub struct GroupingSetsRequest {
    /// Explicit dimension subsets, computed in the order given
    pub sets: Vec<Vec<String>>,
    /// Measures to aggregate
    pub measures: Vec<String>,
    /// NULL placement in the output order
    pub null_order: NullOrder,
}

impl GroupingSetsRequest {
    /// Create a grouping-sets request
    pub fn new(sets: &[&[&str]], measures: &[&str]) -> Self {
        Self {
            sets: sets
                .iter()
                .map(|set| set.iter().map(|s| s.to_string()).collect())
                .collect(),
            measures: measures.iter().map(|s| s.to_string()).collect(),
            null_order: NullOrder::default(),
        }
    }
}

/// ROLLUP: n+1 aggregation levels, peeling the finest dimension first
///
/// Level 0 is the grand total; level n is full detail. Every output row
/// carries its level in `RowMeta::subtotal_level`.
pub fn rollup(
    dataset: &Dataset,
    table: &FlatTable,
    request: &RollupRequest,
) -> EngineResult<ResultTable> {
    table.validate()?;

    let dimensions: Vec<String> = match &request.hierarchy {
        Some(name) => dataset
            .find_hierarchy(name)
            .ok_or_else(|| EngineError::UnknownField(name.clone()))?
            .levels
            .clone(),
        None => request.dimensions.clone(),
    };
    if dimensions.is_empty() {
        return Err(EngineError::InvalidArgument(
            "rollup requires at least one dimension".to_string(),
        ));
    }

    let resolved = resolver::resolve(dataset, table, &dimensions, &request.measures)?;
    let mut result = ResultTable::new(output_columns(table, &resolved.dimensions, &resolved.measures));

    for level in 0..=resolved.dimensions.len() {
        let active: Vec<usize> = (0..level).collect();
        emit_subset(
            table,
            &resolved.dimensions,
            &active,
            &resolved.measures,
            request.null_order,
            |_| RowMeta::subtotal(level),
            &mut result,
        );
    }

    tracing::debug!(
        dataset = %dataset.name,
        levels = resolved.dimensions.len() + 1,
        rows = result.len(),
        "Rolled up"
    );
    Ok(result)
}

/// CUBE: aggregates for every subset of the dimension set
///
/// Subsets are enumerated deterministically (grand total first); each row
/// lists its collapsed dimensions in `RowMeta::collapsed`.
pub fn cube(dataset: &Dataset, table: &FlatTable, request: &CubeRequest) -> EngineResult<ResultTable> {
    table.validate()?;

    let n = request.dimensions.len();
    if n == 0 {
        return Err(EngineError::InvalidArgument(
            "cube requires at least one dimension".to_string(),
        ));
    }
    if n > MAX_CUBE_DIMENSIONS {
        return Err(EngineError::InvalidArgument(format!(
            "cube over {} dimensions exceeds the limit of {}",
            n, MAX_CUBE_DIMENSIONS
        )));
    }

    let resolved = resolver::resolve(dataset, table, &request.dimensions, &request.measures)?;
    let mut result = ResultTable::new(output_columns(table, &resolved.dimensions, &resolved.measures));

    for mask in 0u32..(1u32 << n) {
        let active: Vec<usize> = (0..n).filter(|i| mask & (1 << i) != 0).collect();
        let collapsed: Vec<String> = (0..n)
            .filter(|i| mask & (1 << i) == 0)
            .map(|i| resolved.dimensions[i].name.clone())
            .collect();
        emit_subset(
            table,
            &resolved.dimensions,
            &active,
            &resolved.measures,
            request.null_order,
            |_| RowMeta {
                collapsed: collapsed.clone(),
                ..Default::default()
            },
            &mut result,
        );
    }

    Ok(result)
}

/// GROUPING SETS: exactly the caller's subsets, in the order given
pub fn grouping_sets(
    dataset: &Dataset,
    table: &FlatTable,
    request: &GroupingSetsRequest,
) -> EngineResult<ResultTable> {
    table.validate()?;

    if request.sets.is_empty() {
        return Err(EngineError::InvalidArgument(
            "grouping sets requires at least one set".to_string(),
        ));
    }

    // Union of dimensions in order of first appearance
    let mut union: Vec<String> = Vec::new();
    for set in &request.sets {
        for name in set {
            if !union.contains(name) {
                union.push(name.clone());
            }
        }
    }

    let resolved = resolver::resolve(dataset, table, &union, &request.measures)?;
    let mut result = ResultTable::new(output_columns(table, &resolved.dimensions, &resolved.measures));

    for (set_index, set) in request.sets.iter().enumerate() {
        let active: Vec<usize> = resolved
            .dimensions
            .iter()
            .enumerate()
            .filter(|(_, d)| set.contains(&d.name))
            .map(|(i, _)| i)
            .collect();
        emit_subset(
            table,
            &resolved.dimensions,
            &active,
            &resolved.measures,
            request.null_order,
            |_| RowMeta {
                grouping_set: Some(set_index),
                ..Default::default()
            },
            &mut result,
        );
    }

    Ok(result)
}

/// Shared output layout: all dimensions, then all measures
fn output_columns(
    table: &FlatTable,
    dimensions: &[ResolvedDimension],
    measures: &[ResolvedMeasure],
) -> Vec<ColumnHeader> {
    let mut columns: Vec<ColumnHeader> = dimensions
        .iter()
        .map(|d| ColumnHeader::dimension(&d.name, table.columns[d.column].kind))
        .collect();
    columns.extend(measures.iter().map(|m| ColumnHeader::measure(&m.name)));
    columns
}

/// Group by the active subset of dimensions and emit full-width rows
///
/// Inactive dimensions render as the absent marker (NULL).
fn emit_subset(
    table: &FlatTable,
    dimensions: &[ResolvedDimension],
    active: &[usize],
    measures: &[ResolvedMeasure],
    nulls: NullOrder,
    meta: impl Fn(&[Value]) -> RowMeta,
    result: &mut ResultTable,
) {
    let key_columns: Vec<usize> = active.iter().map(|&i| dimensions[i].column).collect();
    for (key, indices) in group_rows(table, &key_columns, nulls) {
        let mut row = vec![Value::Null; dimensions.len()];
        for (pos, &dim_index) in active.iter().enumerate() {
            row[dim_index] = key[pos].clone();
        }
        row.extend(aggregate_measures(table, &indices, measures));
        result.push_tagged(row, meta(&key));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AggFn, DataKind};
    use crate::table::ColumnKind;

    fn dataset() -> Dataset {
        Dataset::new("sales", "orders")
            .dimension("region", "orders", DataKind::Categorical)
            .dimension("city", "orders", DataKind::Categorical)
            .measure("sales", AggFn::Sum)
            .hierarchy("geo", &["region", "city"])
    }

    fn table() -> FlatTable {
        FlatTable::new(
            vec![
                ColumnHeader::dimension("region", ColumnKind::String),
                ColumnHeader::dimension("city", ColumnKind::String),
                ColumnHeader::measure("sales"),
            ],
            vec![
                vec![Value::from("East"), Value::from("Boston"), Value::from(100.0)],
                vec![Value::from("East"), Value::from("Albany"), Value::from(20.0)],
                vec![Value::from("West"), Value::from("Denver"), Value::from(50.0)],
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_rollup_levels_and_grand_total() {
        let request = RollupRequest::new(&["region", "city"], &["sales"]);
        let result = rollup(&dataset(), &table(), &request).unwrap();

        // Level 0: 1 row, level 1: 2 regions, level 2: 3 cities
        assert_eq!(result.len(), 6);

        let levels: std::collections::HashSet<usize> = result
            .meta
            .iter()
            .filter_map(|m| m.subtotal_level)
            .collect();
        assert_eq!(levels.len(), 3);

        // Grand total equals aggregate over everything
        assert_eq!(result.meta[0].subtotal_level, Some(0));
        assert_eq!(result.value(0, "sales"), Some(&Value::Number(170.0)));
        assert_eq!(result.value(0, "region"), Some(&Value::Null));
        assert_eq!(result.value(0, "city"), Some(&Value::Null));
    }

    #[test]
    fn test_rollup_peels_from_the_right() {
        let request = RollupRequest::new(&["region", "city"], &["sales"]);
        let result = rollup(&dataset(), &table(), &request).unwrap();

        // Level 1 rows keep region, collapse city
        let level1: Vec<usize> = result
            .meta
            .iter()
            .enumerate()
            .filter(|(_, m)| m.subtotal_level == Some(1))
            .map(|(i, _)| i)
            .collect();
        assert_eq!(level1.len(), 2);
        for &i in &level1 {
            assert_ne!(result.value(i, "region"), Some(&Value::Null));
            assert_eq!(result.value(i, "city"), Some(&Value::Null));
        }
        assert_eq!(result.value(level1[0], "sales"), Some(&Value::Number(120.0)));
    }

    #[test]
    fn test_rollup_along_hierarchy() {
        let request = RollupRequest::along_hierarchy("geo", &["sales"]);
        let result = rollup(&dataset(), &table(), &request).unwrap();
        assert_eq!(result.len(), 6);
    }

    #[test]
    fn test_rollup_unknown_hierarchy() {
        let request = RollupRequest::along_hierarchy("org", &["sales"]);
        let err = rollup(&dataset(), &table(), &request).unwrap_err();
        assert!(matches!(err, EngineError::UnknownField(_)));
    }

    #[test]
    fn test_cube_has_all_subsets() {
        let request = CubeRequest::new(&["region", "city"], &["sales"]);
        let result = cube(&dataset(), &table(), &request).unwrap();

        // {}: 1, {region}: 2, {city}: 3, {region,city}: 3
        assert_eq!(result.len(), 9);

        let collapsed_shapes: std::collections::HashSet<Vec<String>> = result
            .meta
            .iter()
            .map(|m| m.collapsed.clone())
            .collect();
        assert_eq!(collapsed_shapes.len(), 4);
    }

    #[test]
    fn test_cube_region_level_sums_to_grand_total() {
        let request = CubeRequest::new(&["region", "city"], &["sales"]);
        let result = cube(&dataset(), &table(), &request).unwrap();

        let grand: f64 = result
            .rows
            .iter()
            .zip(result.meta.iter())
            .filter(|(_, m)| m.collapsed.len() == 2)
            .filter_map(|(row, _)| row[2].as_number())
            .sum();

        let region_sum: f64 = result
            .rows
            .iter()
            .zip(result.meta.iter())
            .filter(|(_, m)| m.collapsed == vec!["city".to_string()])
            .filter_map(|(row, _)| row[2].as_number())
            .sum();

        assert_eq!(grand, 170.0);
        assert_eq!(region_sum, grand);
    }

    #[test]
    fn test_grouping_sets_exact_and_ordered() {
        let request = GroupingSetsRequest::new(&[&["city"], &[], &["region"]], &["sales"]);
        let result = grouping_sets(&dataset(), &table(), &request).unwrap();

        // 3 cities + 1 grand total + 2 regions, in caller order
        assert_eq!(result.len(), 6);
        assert_eq!(result.meta[0].grouping_set, Some(0));
        assert_eq!(result.meta[3].grouping_set, Some(1));
        assert_eq!(result.meta[4].grouping_set, Some(2));

        // The grand-total row collapses every dimension
        assert_eq!(result.value(3, "region"), Some(&Value::Null));
        assert_eq!(result.value(3, "city"), Some(&Value::Null));
        assert_eq!(result.value(3, "sales"), Some(&Value::Number(170.0)));
    }

    #[test]
    fn test_grouping_sets_requires_sets() {
        let request = GroupingSetsRequest::new(&[], &["sales"]);
        let err = grouping_sets(&dataset(), &table(), &request).unwrap_err();
        assert!(matches!(err, EngineError::InvalidArgument(_)));
    }
}
