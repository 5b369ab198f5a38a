//! Top-N / contribution analysis
//!
//! Aggregates a measure per dimension group, ranks groups by their
//! contribution, and walks the ranked list accumulating share of total.
//! Each row is classified into an A/B/C bucket by configurable
//! cumulative-percentage thresholds (Pareto analysis).

use crate::aggregate::{aggregate_measures, group_rows};
use crate::error::{EngineError, EngineResult};
use crate::model::Dataset;
use crate::resolver;
use crate::table::{ColumnHeader, ColumnKind, FlatTable, NullOrder, ResultTable, RowMeta, Value};

/// Parameters for a contribution analysis
#[derive(Debug, Clone)]
pub struct ContributionRequest {
    /// Dimensions identifying the contributing entities
    pub dimensions: Vec<String>,
    /// The measure ranked and accumulated
    pub measure: String,
    /// Keep only the first N ranked rows (cumulative figures still cover
    /// the full set)
    pub limit: Option<usize>,
    /// Rank ascending instead of descending (bottom-N)
    pub ascending: bool,
    /// Cumulative-percentage ceiling for class A
    pub class_a: f64,
    /// Cumulative-percentage ceiling for class B; everything past it is C
    pub class_b: f64,
    /// NULL placement among group keys
    pub null_order: NullOrder,
}

impl ContributionRequest {
    /// Create a request with the conventional 80/95 class thresholds
    pub fn new(dimensions: &[&str], measure: impl Into<String>) -> Self {
        Self {
            dimensions: dimensions.iter().map(|s| s.to_string()).collect(),
            measure: measure.into(),
            limit: None,
            ascending: false,
            class_a: 80.0,
            class_b: 95.0,
            null_order: NullOrder::default(),
        }
    }

    /// Builder method: keep the top N rows
    pub fn top(mut self, n: usize) -> Self {
        self.limit = Some(n);
        self.ascending = false;
        self
    }

    /// Builder method: keep the bottom N rows
    pub fn bottom(mut self, n: usize) -> Self {
        self.limit = Some(n);
        self.ascending = true;
        self
    }

    /// Builder method: set the A/B cumulative-percentage ceilings
    pub fn thresholds(mut self, class_a: f64, class_b: f64) -> Self {
        self.class_a = class_a;
        self.class_b = class_b;
        self
    }

    fn validate(&self) -> EngineResult<()> {
        if self.dimensions.is_empty() {
            return Err(EngineError::InvalidArgument(
                "contribution requires at least one dimension".to_string(),
            ));
        }
        if self.limit == Some(0) {
            return Err(EngineError::InvalidArgument(
                "contribution limit must be positive".to_string(),
            ));
        }
        if !(0.0 < self.class_a && self.class_a <= self.class_b && self.class_b <= 100.0) {
            return Err(EngineError::InvalidArgument(format!(
                "class thresholds must satisfy 0 < A ({}) <= B ({}) <= 100",
                self.class_a, self.class_b
            )));
        }
        Ok(())
    }
}

/// Rank dimension groups by a measure and accumulate share of total
///
/// Cumulative sum and percentage are computed over the complete ranked
/// set before any `limit` is applied, so a top-N view still reports each
/// row's true share. A zero total makes every percentage (and class)
/// NULL rather than dividing by zero.
pub fn contribution(
    dataset: &Dataset,
    table: &FlatTable,
    request: &ContributionRequest,
) -> EngineResult<ResultTable> {
    table.validate()?;
    request.validate()?;

    let resolved = resolver::resolve(
        dataset,
        table,
        &request.dimensions,
        std::slice::from_ref(&request.measure),
    )?;

    let key_columns: Vec<usize> = resolved.dimensions.iter().map(|d| d.column).collect();
    let mut ranked: Vec<(Vec<Value>, Option<f64>)> =
        group_rows(table, &key_columns, request.null_order)
            .into_iter()
            .map(|(key, indices)| {
                let value = aggregate_measures(table, &indices, &resolved.measures)
                    .remove(0)
                    .as_number();
                (key, value)
            })
            .collect();

    // Rank by contribution; NULL-valued groups sort to the end either way
    ranked.sort_by(|a, b| match (a.1, b.1) {
        (Some(x), Some(y)) => {
            if request.ascending {
                x.total_cmp(&y)
            } else {
                y.total_cmp(&x)
            }
        }
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    });

    let total: f64 = ranked.iter().filter_map(|(_, v)| *v).sum();

    let mut columns: Vec<ColumnHeader> = resolved
        .dimensions
        .iter()
        .map(|d| ColumnHeader::dimension(&d.name, table.columns[d.column].kind))
        .collect();
    columns.push(ColumnHeader::measure(&resolved.measures[0].name));
    columns.push(ColumnHeader::derived("cumulative_sum", ColumnKind::Number));
    columns.push(ColumnHeader::derived("cumulative_pct", ColumnKind::Number));
    columns.push(ColumnHeader::derived("class", ColumnKind::String));

    let keep = request.limit.unwrap_or(ranked.len());
    let mut result = ResultTable::new(columns);
    let mut running = 0.0;

    for (rank, (key, value)) in ranked.into_iter().enumerate() {
        if let Some(v) = value {
            running += v;
        }
        let pct = if total == 0.0 {
            None
        } else {
            Some(running / total * 100.0)
        };

        if rank >= keep {
            continue;
        }

        let class = match pct {
            Some(p) if p <= request.class_a => Value::from("A"),
            Some(p) if p <= request.class_b => Value::from("B"),
            Some(_) => Value::from("C"),
            None => Value::Null,
        };

        let mut row = key;
        row.push(Value::from(value));
        row.push(Value::Number(running));
        row.push(Value::from(pct));
        row.push(class);
        result.push_tagged(
            row,
            RowMeta {
                rank: Some(rank + 1),
                ..Default::default()
            },
        );
    }

    tracing::debug!(
        dataset = %dataset.name,
        measure = %request.measure,
        rows = result.len(),
        "Ranked contributions"
    );
    Ok(result)
}
