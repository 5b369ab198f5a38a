//! Window Function Engine
//!
//! Ordered, partitioned calculations over grouped or raw rows. Input is
//! split into independent partitions by partition key; each partition is
//! stably sorted by the order-by columns (ties keep original row order)
//! and the function walks the sorted sequence.
//!
//! The output keeps every input column and appends one derived column.

use serde::{Deserialize, Serialize};

use crate::aggregate::{compare_keys, group_rows};
use crate::error::{EngineError, EngineResult};
use crate::model::Dataset;
use crate::resolver;
use crate::table::{ColumnHeader, ColumnKind, FlatTable, NullOrder, ResultTable, RowMeta, Value};

/// Supported window functions
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "fn")]
pub enum WindowFunc {
    /// Cumulative sum
    RunningTotal,
    /// Cumulative mean
    RunningAvg,
    /// Simple trailing mean; partial windows at the start use the rows available
    MovingAvg { window: usize },
    /// 1-based rank with gaps on ties
    Rank,
    /// 1-based rank without gaps on ties
    DenseRank,
    /// 1-based position, ties broken by original row order
    RowNumber,
    /// As-equal-as-possible buckets; earlier buckets take the extras
    Ntile { buckets: usize },
    /// Value divided by the partition sum
    PercentOfTotal,
    /// Change versus the previous row's value
    PercentChange,
    /// Value `offset` rows earlier in the partition (NULL out of bounds)
    Lag { offset: usize },
    /// Value `offset` rows later in the partition (NULL out of bounds)
    Lead { offset: usize },
}

impl WindowFunc {
    /// Whether this function reads a value column
    fn needs_value(&self) -> bool {
        !matches!(
            self,
            WindowFunc::Rank | WindowFunc::DenseRank | WindowFunc::RowNumber | WindowFunc::Ntile { .. }
        )
    }

    /// Short name used for the derived output column
    fn label(&self) -> &'static str {
        match self {
            WindowFunc::RunningTotal => "running_total",
            WindowFunc::RunningAvg => "running_avg",
            WindowFunc::MovingAvg { .. } => "moving_avg",
            WindowFunc::Rank => "rank",
            WindowFunc::DenseRank => "dense_rank",
            WindowFunc::RowNumber => "row_number",
            WindowFunc::Ntile { .. } => "ntile",
            WindowFunc::PercentOfTotal => "percent_of_total",
            WindowFunc::PercentChange => "percent_change",
            WindowFunc::Lag { .. } => "lag",
            WindowFunc::Lead { .. } => "lead",
        }
    }

    fn validate(&self) -> EngineResult<()> {
        match self {
            WindowFunc::MovingAvg { window } if *window == 0 => Err(EngineError::InvalidArgument(
                "moving_avg window must be positive".to_string(),
            )),
            WindowFunc::Ntile { buckets } if *buckets == 0 => Err(EngineError::InvalidArgument(
                "ntile bucket count must be positive".to_string(),
            )),
            _ => Ok(()),
        }
    }
}

/// Parameters for a window calculation
#[derive(Debug, Clone)]
pub struct WindowRequest {
    /// Dimensions splitting the input into independent partitions
    pub partition_by: Vec<String>,
    /// Dimensions ordering rows within each partition
    pub order_by: Vec<String>,
    /// Measure the function reads (unused by ranking functions)
    pub value: Option<String>,
    /// The function to compute
    pub func: WindowFunc,
    /// Output column name; defaults to the function name
    pub alias: Option<String>,
    /// NULL placement in partition and order keys
    pub null_order: NullOrder,
}

impl WindowRequest {
    /// Create a request for the given function
    pub fn new(func: WindowFunc) -> Self {
        Self {
            partition_by: Vec::new(),
            order_by: Vec::new(),
            value: None,
            func,
            alias: None,
            null_order: NullOrder::default(),
        }
    }

    /// Builder method: set the partition key
    pub fn partition_by(mut self, dimensions: &[&str]) -> Self {
        self.partition_by = dimensions.iter().map(|s| s.to_string()).collect();
        self
    }

    /// Builder method: set the ordering columns
    pub fn order_by(mut self, dimensions: &[&str]) -> Self {
        self.order_by = dimensions.iter().map(|s| s.to_string()).collect();
        self
    }

    /// Builder method: set the value measure
    pub fn value(mut self, measure: impl Into<String>) -> Self {
        self.value = Some(measure.into());
        self
    }

    /// Builder method: name the output column
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }
}

/// Compute a window function over partitioned, ordered rows
pub fn window(
    dataset: &Dataset,
    table: &FlatTable,
    request: &WindowRequest,
) -> EngineResult<ResultTable> {
    table.validate()?;
    request.func.validate()?;

    if request.func.needs_value() && request.value.is_none() {
        return Err(EngineError::InvalidArgument(format!(
            "{} requires a value measure",
            request.func.label()
        )));
    }

    // Partition and order keys may be dimensions or raw measure values
    let partition_columns: Vec<usize> = request
        .partition_by
        .iter()
        .map(|name| resolver::resolve_field(dataset, table, name))
        .collect::<EngineResult<_>>()?;
    let order_columns: Vec<usize> = request
        .order_by
        .iter()
        .map(|name| resolver::resolve_field(dataset, table, name))
        .collect::<EngineResult<_>>()?;
    let value_column = match &request.value {
        Some(name) => Some(resolver::resolve_field(dataset, table, name)?),
        None => None,
    };

    let mut columns = table.columns.clone();
    let out_name = request
        .alias
        .clone()
        .unwrap_or_else(|| request.func.label().to_string());
    columns.push(ColumnHeader::derived(out_name, ColumnKind::Number));

    let mut result = ResultTable::new(columns);

    for (_, mut indices) in group_rows(table, &partition_columns, request.null_order) {
        // Stable sort by order key; ties keep original row order
        indices.sort_by(|&a, &b| {
            let ka: Vec<Value> = order_columns.iter().map(|&c| table.rows[a][c].clone()).collect();
            let kb: Vec<Value> = order_columns.iter().map(|&c| table.rows[b][c].clone()).collect();
            compare_keys(&ka, &kb, request.null_order).then(a.cmp(&b))
        });

        let values: Vec<Option<f64>> = indices
            .iter()
            .map(|&i| value_column.and_then(|c| table.rows[i][c].as_number()))
            .collect();
        let order_keys: Vec<Vec<Value>> = indices
            .iter()
            .map(|&i| order_columns.iter().map(|&c| table.rows[i][c].clone()).collect())
            .collect();

        let computed = compute(request.func, &values, &order_keys);

        for (pos, &row_index) in indices.iter().enumerate() {
            let mut row = table.rows[row_index].clone();
            row.push(computed[pos].clone());

            let meta = match request.func {
                WindowFunc::Rank | WindowFunc::DenseRank | WindowFunc::RowNumber => {
                    match computed[pos].as_number() {
                        Some(r) => RowMeta {
                            rank: Some(r as usize),
                            ..Default::default()
                        },
                        None => RowMeta::default(),
                    }
                }
                _ => RowMeta::default(),
            };
            result.push_tagged(row, meta);
        }
    }

    tracing::debug!(
        dataset = %dataset.name,
        func = request.func.label(),
        rows = result.len(),
        "Computed window function"
    );
    Ok(result)
}

/// Evaluate one function over a single sorted partition
fn compute(func: WindowFunc, values: &[Option<f64>], order_keys: &[Vec<Value>]) -> Vec<Value> {
    let n = values.len();
    match func {
        WindowFunc::RunningTotal => {
            let mut total = 0.0;
            values
                .iter()
                .map(|v| {
                    if let Some(v) = v {
                        total += v;
                    }
                    Value::Number(total)
                })
                .collect()
        }
        WindowFunc::RunningAvg => {
            let mut total = 0.0;
            let mut count = 0usize;
            values
                .iter()
                .map(|v| {
                    if let Some(v) = v {
                        total += v;
                        count += 1;
                    }
                    if count == 0 {
                        Value::Null
                    } else {
                        Value::Number(total / count as f64)
                    }
                })
                .collect()
        }
        WindowFunc::MovingAvg { window } => (0..n)
            .map(|i| {
                let start = i.saturating_sub(window - 1);
                let seen: Vec<f64> = values[start..=i].iter().filter_map(|v| *v).collect();
                if seen.is_empty() {
                    Value::Null
                } else {
                    Value::Number(seen.iter().sum::<f64>() / seen.len() as f64)
                }
            })
            .collect(),
        WindowFunc::Rank => {
            let mut out: Vec<Value> = Vec::with_capacity(n);
            for i in 0..n {
                if i > 0 && order_keys[i] == order_keys[i - 1] {
                    out.push(out[i - 1].clone());
                } else {
                    out.push(Value::Number((i + 1) as f64));
                }
            }
            out
        }
        WindowFunc::DenseRank => {
            let mut out = Vec::with_capacity(n);
            let mut rank = 0u64;
            for i in 0..n {
                if i == 0 || order_keys[i] != order_keys[i - 1] {
                    rank += 1;
                }
                out.push(Value::Number(rank as f64));
            }
            out
        }
        WindowFunc::RowNumber => (0..n).map(|i| Value::Number((i + 1) as f64)).collect(),
        WindowFunc::Ntile { buckets } => {
            let base = n / buckets;
            let extras = n % buckets;
            let mut out = Vec::with_capacity(n);
            let mut position = 0usize;
            for bucket in 0..buckets {
                let size = base + usize::from(bucket < extras);
                for _ in 0..size {
                    if position < n {
                        out.push(Value::Number((bucket + 1) as f64));
                        position += 1;
                    }
                }
            }
            // More buckets than rows: remaining buckets are simply empty
            out
        }
        WindowFunc::PercentOfTotal => {
            let total: f64 = values.iter().flatten().sum();
            values
                .iter()
                .map(|v| match v {
                    Some(v) if total != 0.0 => Value::Number(v / total),
                    _ => Value::Null,
                })
                .collect()
        }
        WindowFunc::PercentChange => (0..n)
            .map(|i| {
                if i == 0 {
                    return Value::Null;
                }
                match (values[i], values[i - 1]) {
                    (Some(cur), Some(prev)) if prev != 0.0 => Value::Number((cur - prev) / prev),
                    _ => Value::Null,
                }
            })
            .collect(),
        WindowFunc::Lag { offset } => (0..n)
            .map(|i| match i.checked_sub(offset) {
                Some(j) => Value::from(values[j]),
                None => Value::Null,
            })
            .collect(),
        WindowFunc::Lead { offset } => (0..n)
            .map(|i| match values.get(i + offset) {
                Some(v) => Value::from(*v),
                None => Value::Null,
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AggFn, DataKind, Dataset};

    fn dataset() -> Dataset {
        Dataset::new("sales", "orders")
            .dimension("region", "orders", DataKind::Categorical)
            .dimension("day", "orders", DataKind::Numeric)
            .measure("sales", AggFn::Sum)
    }

    fn table(rows: &[(&str, f64, f64)]) -> FlatTable {
        FlatTable::new(
            vec![
                ColumnHeader::dimension("region", ColumnKind::String),
                ColumnHeader::dimension("day", ColumnKind::Number),
                ColumnHeader::measure("sales"),
            ],
            rows.iter()
                .map(|(r, d, v)| vec![Value::from(*r), Value::from(*d), Value::from(*v)])
                .collect(),
        )
        .unwrap()
    }

    fn derived(result: &ResultTable, name: &str) -> Vec<Value> {
        let col = result.column_index(name).unwrap();
        result.rows.iter().map(|r| r[col].clone()).collect()
    }

    #[test]
    fn test_running_total_per_partition() {
        let table = table(&[
            ("East", 1.0, 10.0),
            ("East", 2.0, 20.0),
            ("West", 1.0, 5.0),
            ("West", 2.0, 7.0),
        ]);
        let request = WindowRequest::new(WindowFunc::RunningTotal)
            .partition_by(&["region"])
            .order_by(&["day"])
            .value("sales");
        let result = window(&dataset(), &table, &request).unwrap();

        assert_eq!(
            derived(&result, "running_total"),
            vec![
                Value::Number(10.0),
                Value::Number(30.0),
                Value::Number(5.0),
                Value::Number(12.0),
            ]
        );
    }

    #[test]
    fn test_rank_and_dense_rank_ties() {
        // Order by sales ascending: [10, 10, 20]
        let table = table(&[("East", 1.0, 10.0), ("East", 2.0, 10.0), ("East", 3.0, 20.0)]);

        let rank = window(
            &dataset(),
            &table,
            &WindowRequest::new(WindowFunc::Rank).order_by(&["sales"]),
        )
        .unwrap();
        assert_eq!(
            derived(&rank, "rank"),
            vec![Value::Number(1.0), Value::Number(1.0), Value::Number(3.0)]
        );

        let dense = window(
            &dataset(),
            &table,
            &WindowRequest::new(WindowFunc::DenseRank).order_by(&["sales"]),
        )
        .unwrap();
        assert_eq!(
            derived(&dense, "dense_rank"),
            vec![Value::Number(1.0), Value::Number(1.0), Value::Number(2.0)]
        );
    }

    #[test]
    fn test_row_number_breaks_ties_by_original_order() {
        let table = table(&[("East", 1.0, 10.0), ("East", 2.0, 10.0)]);
        let result = window(
            &dataset(),
            &table,
            &WindowRequest::new(WindowFunc::RowNumber).order_by(&["sales"]),
        )
        .unwrap();

        assert_eq!(
            derived(&result, "row_number"),
            vec![Value::Number(1.0), Value::Number(2.0)]
        );
        // Original order preserved on the tied rows
        assert_eq!(result.rows[0][1], Value::Number(1.0));
        assert_eq!(result.rows[1][1], Value::Number(2.0));
    }

    #[test]
    fn test_moving_avg_partial_leading_window() {
        let table = table(&[
            ("East", 1.0, 3.0),
            ("East", 2.0, 6.0),
            ("East", 3.0, 9.0),
            ("East", 4.0, 12.0),
        ]);
        let request = WindowRequest::new(WindowFunc::MovingAvg { window: 3 })
            .order_by(&["day"])
            .value("sales");
        let result = window(&dataset(), &table, &request).unwrap();

        assert_eq!(
            derived(&result, "moving_avg"),
            vec![
                Value::Number(3.0),
                Value::Number(4.5),
                Value::Number(6.0),
                Value::Number(9.0),
            ]
        );
    }

    #[test]
    fn test_ntile_extras_go_to_earlier_buckets() {
        let table = table(&[
            ("East", 1.0, 1.0),
            ("East", 2.0, 2.0),
            ("East", 3.0, 3.0),
            ("East", 4.0, 4.0),
            ("East", 5.0, 5.0),
        ]);
        let request = WindowRequest::new(WindowFunc::Ntile { buckets: 2 }).order_by(&["day"]);
        let result = window(&dataset(), &table, &request).unwrap();

        assert_eq!(
            derived(&result, "ntile"),
            vec![
                Value::Number(1.0),
                Value::Number(1.0),
                Value::Number(1.0),
                Value::Number(2.0),
                Value::Number(2.0),
            ]
        );
    }

    #[test]
    fn test_lag_lead_out_of_bounds_are_null() {
        let table = table(&[("East", 1.0, 10.0), ("East", 2.0, 20.0), ("East", 3.0, 30.0)]);
        let lag = window(
            &dataset(),
            &table,
            &WindowRequest::new(WindowFunc::Lag { offset: 1 })
                .order_by(&["day"])
                .value("sales"),
        )
        .unwrap();
        assert_eq!(
            derived(&lag, "lag"),
            vec![Value::Null, Value::Number(10.0), Value::Number(20.0)]
        );

        let lead = window(
            &dataset(),
            &table,
            &WindowRequest::new(WindowFunc::Lead { offset: 2 })
                .order_by(&["day"])
                .value("sales"),
        )
        .unwrap();
        assert_eq!(
            derived(&lead, "lead"),
            vec![Value::Number(30.0), Value::Null, Value::Null]
        );
    }

    #[test]
    fn test_percent_of_total() {
        let table = table(&[("East", 1.0, 25.0), ("East", 2.0, 75.0)]);
        let request = WindowRequest::new(WindowFunc::PercentOfTotal)
            .order_by(&["day"])
            .value("sales");
        let result = window(&dataset(), &table, &request).unwrap();

        assert_eq!(
            derived(&result, "percent_of_total"),
            vec![Value::Number(0.25), Value::Number(0.75)]
        );
    }

    #[test]
    fn test_percent_change_null_on_first_and_zero_prev() {
        let table = table(&[("East", 1.0, 0.0), ("East", 2.0, 50.0), ("East", 3.0, 75.0)]);
        let request = WindowRequest::new(WindowFunc::PercentChange)
            .order_by(&["day"])
            .value("sales");
        let result = window(&dataset(), &table, &request).unwrap();

        assert_eq!(
            derived(&result, "percent_change"),
            vec![Value::Null, Value::Null, Value::Number(0.5)]
        );
    }

    #[test]
    fn test_non_positive_parameters_rejected() {
        let table = table(&[("East", 1.0, 1.0)]);
        let err = window(
            &dataset(),
            &table,
            &WindowRequest::new(WindowFunc::MovingAvg { window: 0 })
                .order_by(&["day"])
                .value("sales"),
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::InvalidArgument(_)));

        let err = window(
            &dataset(),
            &table,
            &WindowRequest::new(WindowFunc::Ntile { buckets: 0 }).order_by(&["day"]),
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::InvalidArgument(_)));
    }

    #[test]
    fn test_value_functions_require_a_value() {
        let table = table(&[("East", 1.0, 1.0)]);
        let err = window(
            &dataset(),
            &table,
            &WindowRequest::new(WindowFunc::RunningTotal).order_by(&["day"]),
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::InvalidArgument(_)));
    }
}
