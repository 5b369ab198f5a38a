//! Field Resolver
//!
//! Maps requested logical dimension/measure names onto the physical
//! columns of a caller-supplied flat table, validating them against the
//! dataset first. The resolver never touches row data: its output is a
//! set of column indices the engines read through.
//!
//! The flat input is assumed to be already joined upstream; the resolver
//! only checks that each requested field's owning table is reachable
//! through the dataset's registered joins.

use crate::error::{EngineError, EngineResult};
use crate::model::{AggFn, DataKind, Dataset};
use crate::table::FlatTable;
use crate::timeseries::Grain;

/// A dimension mapped to its physical column
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedDimension {
    /// Logical name
    pub name: String,
    /// Physical column index in the flat input
    pub column: usize,
    /// Declared data kind
    pub kind: DataKind,
}

/// A measure mapped to its physical column
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedMeasure {
    /// Logical name
    pub name: String,
    /// Physical column index in the flat input
    pub column: usize,
    /// Aggregation function declared on the dataset
    pub agg: AggFn,
}

/// Output of name resolution: everything the engines need to read rows
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedQuery {
    /// Requested dimensions, in request order
    pub dimensions: Vec<ResolvedDimension>,
    /// Requested measures, in request order
    pub measures: Vec<ResolvedMeasure>,
}

/// Resolve requested logical names against a dataset and flat input
pub fn resolve(
    dataset: &Dataset,
    table: &FlatTable,
    dimensions: &[String],
    measures: &[String],
) -> EngineResult<ResolvedQuery> {
    let reachable = dataset.reachable_tables();

    let mut resolved_dims = Vec::with_capacity(dimensions.len());
    for name in dimensions {
        let dim = dataset
            .find_dimension(name)
            .ok_or_else(|| EngineError::UnknownField(name.clone()))?;
        if !reachable.contains(dim.table.as_str()) {
            return Err(EngineError::AmbiguousJoin {
                field: name.clone(),
                dataset: dataset.name.clone(),
            });
        }
        resolved_dims.push(ResolvedDimension {
            name: name.clone(),
            column: physical_column(table, &dim.name, &dim.expr)?,
            kind: dim.kind,
        });
    }

    let mut resolved_measures = Vec::with_capacity(measures.len());
    for name in measures {
        let measure = dataset
            .find_measure(name)
            .ok_or_else(|| EngineError::UnknownField(name.clone()))?;
        resolved_measures.push(ResolvedMeasure {
            name: name.clone(),
            column: physical_column(table, &measure.name, &measure.expr)?,
            agg: measure.agg,
        });
    }

    Ok(ResolvedQuery {
        dimensions: resolved_dims,
        measures: resolved_measures,
    })
}

/// Resolve the dataset's time dimension for a requested grain
pub fn resolve_time(
    dataset: &Dataset,
    table: &FlatTable,
    grain: Grain,
) -> EngineResult<ResolvedDimension> {
    let time = dataset.time_dimension.as_ref().ok_or_else(|| {
        EngineError::InvalidArgument(format!(
            "dataset '{}' has no time dimension",
            dataset.name
        ))
    })?;

    if !time.grains.contains(&grain) {
        return Err(EngineError::InvalidArgument(format!(
            "grain '{}' is not supported by dataset '{}'",
            grain, dataset.name
        )));
    }

    let dim = dataset
        .find_dimension(&time.dimension)
        .ok_or_else(|| EngineError::UnknownField(time.dimension.clone()))?;

    Ok(ResolvedDimension {
        name: dim.name.clone(),
        column: physical_column(table, &dim.name, &dim.expr)?,
        kind: dim.kind,
    })
}

/// Resolve a field that may be either a dimension or a measure
///
/// Window partition and order keys accept both: partitioning by a
/// dimension and ordering by a raw measure value are equally valid.
pub fn resolve_field(dataset: &Dataset, table: &FlatTable, name: &str) -> EngineResult<usize> {
    if let Some(dim) = dataset.find_dimension(name) {
        if !dataset.reachable_tables().contains(dim.table.as_str()) {
            return Err(EngineError::AmbiguousJoin {
                field: name.to_string(),
                dataset: dataset.name.clone(),
            });
        }
        return physical_column(table, &dim.name, &dim.expr);
    }
    if let Some(measure) = dataset.find_measure(name) {
        return physical_column(table, &measure.name, &measure.expr);
    }
    Err(EngineError::UnknownField(name.to_string()))
}

/// Find the physical column for a logical field
///
/// The input column is expected to be named after the logical name, with
/// the source expression as a fallback for row-sources that keep physical
/// column names.
fn physical_column(table: &FlatTable, name: &str, expr: &str) -> EngineResult<usize> {
    table
        .column_index(name)
        .or_else(|| table.column_index(expr))
        .ok_or_else(|| {
            EngineError::MalformedInput(format!("input is missing a column for field '{}'", name))
        })
}
