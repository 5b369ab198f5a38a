//! Time Series Engine
//!
//! Buckets rows into calendar grains, fills gaps against a generated date
//! spine, and computes period-over-period comparisons.
//!
//! - Bucketing truncates each timestamp to the requested grain
//!   (calendar-aware: ISO weeks, calendar quarters)
//! - Gap filling emits every bucket between the first and last observed
//!   bucket (or an explicit range) with NULL measures, never zero
//! - Comparisons (YoY/QoQ/MoM/WoW/DoD) emit prior value, delta and
//!   percent change per measure, NULL-safe on missing or zero priors
//!
//! Output is always sorted ascending by bucket.

mod grain;

pub use grain::Grain;

use chrono::{Duration, Months, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{EngineError, EngineResult};
use crate::model::Dataset;
use crate::resolver;
use crate::table::{ColumnHeader, ColumnKind, FlatTable, ResultTable, RowMeta, Value};

/// An inclusive bucket range in Unix milliseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    /// Range start (truncated to the requested grain on use)
    pub start: i64,
    /// Range end, inclusive
    pub end: i64,
}

impl DateRange {
    /// Create a range; `start` must not be after `end`
    pub fn new(start: i64, end: i64) -> Self {
        Self { start, end }
    }
}

/// Period-over-period comparison kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Comparison {
    /// Year over year
    YoY,
    /// Quarter over quarter
    QoQ,
    /// Month over month
    MoM,
    /// Week over week
    WoW,
    /// Day over day
    DoD,
}

impl Comparison {
    /// The same-calendar-position bucket one comparison period earlier
    pub fn prior_bucket(&self, bucket: i64) -> i64 {
        let dt = match Utc.timestamp_millis_opt(bucket) {
            chrono::LocalResult::Single(dt) => dt,
            _ => return bucket,
        };

        let prior = match self {
            Comparison::YoY => dt.checked_sub_months(Months::new(12)),
            Comparison::QoQ => dt.checked_sub_months(Months::new(3)),
            Comparison::MoM => dt.checked_sub_months(Months::new(1)),
            Comparison::WoW => Some(dt - Duration::weeks(1)),
            Comparison::DoD => Some(dt - Duration::days(1)),
        };

        prior.map(|d| d.timestamp_millis()).unwrap_or(bucket)
    }

    /// Parse from string
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "yoy" => Some(Comparison::YoY),
            "qoq" => Some(Comparison::QoQ),
            "mom" => Some(Comparison::MoM),
            "wow" => Some(Comparison::WoW),
            "dod" => Some(Comparison::DoD),
            _ => None,
        }
    }
}

/// Parameters for a time-series transformation
#[derive(Debug, Clone)]
pub struct TimeSeriesRequest {
    /// Bucketing grain (must be supported by the dataset's time dimension)
    pub grain: Grain,
    /// Measures to aggregate per bucket
    pub measures: Vec<String>,
    /// Explicit spine range; defaults to observed min..=max
    pub date_range: Option<DateRange>,
    /// Whether to emit empty buckets (default true)
    pub fill_gaps: bool,
    /// Optional period comparison
    pub compare: Option<Comparison>,
}

impl TimeSeriesRequest {
    /// Create a request for the given grain and measures
    pub fn new(grain: Grain, measures: &[&str]) -> Self {
        Self {
            grain,
            measures: measures.iter().map(|s| s.to_string()).collect(),
            date_range: None,
            fill_gaps: true,
            compare: None,
        }
    }

    /// Builder method: set an explicit date range
    pub fn date_range(mut self, range: DateRange) -> Self {
        self.date_range = Some(range);
        self
    }

    /// Builder method: keep only observed buckets
    pub fn without_gap_fill(mut self) -> Self {
        self.fill_gaps = false;
        self
    }

    /// Builder method: add a period comparison
    pub fn compare(mut self, comparison: Comparison) -> Self {
        self.compare = Some(comparison);
        self
    }
}

/// Bucket, gap-fill and compare a dataset's measures over time
pub fn time_series(
    dataset: &Dataset,
    table: &FlatTable,
    request: &TimeSeriesRequest,
) -> EngineResult<ResultTable> {
    table.validate()?;

    if let Some(range) = &request.date_range {
        if range.start > range.end {
            return Err(EngineError::InvalidArgument(
                "date range start is after its end".to_string(),
            ));
        }
    }

    let time_dim = resolver::resolve_time(dataset, table, request.grain)?;
    let resolved = resolver::resolve(dataset, table, &[], &request.measures)?;

    if table.columns[time_dim.column].kind != ColumnKind::Timestamp {
        return Err(EngineError::MalformedInput(format!(
            "time dimension column '{}' is not a timestamp column",
            time_dim.name
        )));
    }

    // Bucket rows; NULL timestamps cannot be placed on the spine
    let mut buckets: BTreeMap<i64, Vec<usize>> = BTreeMap::new();
    let mut skipped = 0usize;
    for (i, row) in table.rows.iter().enumerate() {
        match row[time_dim.column].as_timestamp() {
            Some(ts) => buckets
                .entry(request.grain.truncate(ts))
                .or_default()
                .push(i),
            None => skipped += 1,
        }
    }
    if skipped > 0 {
        tracing::warn!(skipped, "Dropped rows with NULL timestamps from time series");
    }

    // Aggregate observed buckets once; comparisons look up priors here too
    let aggregated: BTreeMap<i64, Vec<Value>> = buckets
        .iter()
        .map(|(&bucket, indices)| {
            (
                bucket,
                crate::aggregate::aggregate_measures(table, indices, &resolved.measures),
            )
        })
        .collect();

    let spine = build_spine(request, &buckets)?;

    let mut columns = vec![ColumnHeader::dimension(&time_dim.name, ColumnKind::Timestamp)];
    for measure in &resolved.measures {
        columns.push(ColumnHeader::measure(&measure.name));
        if request.compare.is_some() {
            columns.push(ColumnHeader::derived(
                format!("{}_prior", measure.name),
                ColumnKind::Number,
            ));
            columns.push(ColumnHeader::derived(
                format!("{}_delta", measure.name),
                ColumnKind::Number,
            ));
            columns.push(ColumnHeader::derived(
                format!("{}_pct_change", measure.name),
                ColumnKind::Number,
            ));
        }
    }

    let mut result = ResultTable::new(columns);
    for bucket in spine {
        let current = aggregated.get(&bucket);
        let mut row = vec![Value::Timestamp(bucket)];

        for (m, _) in resolved.measures.iter().enumerate() {
            let value = current
                .and_then(|values| values.get(m).cloned())
                .unwrap_or(Value::Null);

            if let Some(comparison) = request.compare {
                let prior_bucket = comparison.prior_bucket(bucket);
                let prior = aggregated
                    .get(&prior_bucket)
                    .and_then(|values| values.get(m).cloned())
                    .unwrap_or(Value::Null);

                let (delta, pct) = period_delta(&value, &prior);
                row.push(value);
                row.push(prior);
                row.push(delta);
                row.push(pct);
            } else {
                row.push(value);
            }
        }

        result.push_tagged(row, RowMeta::bucketed(bucket));
    }

    tracing::debug!(
        dataset = %dataset.name,
        grain = %request.grain,
        buckets = result.len(),
        "Built time series"
    );
    Ok(result)
}

/// The ordered bucket list to emit
fn build_spine(
    request: &TimeSeriesRequest,
    observed: &BTreeMap<i64, Vec<usize>>,
) -> EngineResult<Vec<i64>> {
    let bounds = match &request.date_range {
        Some(range) => Some((
            request.grain.truncate(range.start),
            request.grain.truncate(range.end),
        )),
        None => match (observed.keys().next(), observed.keys().next_back()) {
            (Some(&first), Some(&last)) => Some((first, last)),
            _ => None,
        },
    };

    let Some((start, end)) = bounds else {
        return Ok(Vec::new());
    };

    if !request.fill_gaps {
        return Ok(observed
            .keys()
            .copied()
            .filter(|b| (start..=end).contains(b))
            .collect());
    }

    let mut spine = Vec::new();
    let mut bucket = start;
    while bucket <= end {
        spine.push(bucket);
        let next = request.grain.advance(bucket);
        if next <= bucket {
            break;
        }
        bucket = next;
    }
    Ok(spine)
}

/// Delta and percent change against a prior value, NULL-safe
fn period_delta(current: &Value, prior: &Value) -> (Value, Value) {
    match (current.as_number(), prior.as_number()) {
        (Some(cur), Some(prev)) => {
            let delta = cur - prev;
            let pct = if prev == 0.0 {
                Value::Null
            } else {
                Value::Number(delta / prev)
            };
            (Value::Number(delta), pct)
        }
        _ => (Value::Null, Value::Null),
    }
}
