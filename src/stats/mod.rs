//! Statistics Engine
//!
//! Summary statistics, percentiles, correlation matrices, histograms and
//! distribution shape over numeric measures. All computations ignore
//! NULLs; degenerate inputs (empty, constant, all-NULL) produce NULL
//! statistics rather than errors.

mod contribution;

pub use contribution::{contribution, ContributionRequest};

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};
use crate::model::Dataset;
use crate::resolver;
use crate::table::{ColumnHeader, ColumnKind, FlatTable, ResultTable, Value};

/// Percentile interpolation method
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PercentileMethod {
    /// Linear interpolation between order statistics (the default)
    #[default]
    Linear,
    /// Nearest-rank (no interpolation)
    NearestRank,
}

/// Summary statistics for one numeric measure
///
/// Variance and standard deviation are the sample (n-1) estimators and
/// are `None` below two values. The median interpolates linearly for
/// even counts.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryStats {
    /// Count of non-NULL values
    pub count: usize,
    /// Sum of values (0 when empty, matching aggregation semantics)
    pub sum: f64,
    pub mean: Option<f64>,
    pub median: Option<f64>,
    pub variance: Option<f64>,
    pub std_dev: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
}

/// Compute summary statistics over raw (non-NULL) values
pub fn summarize(values: &[f64]) -> SummaryStats {
    let count = values.len();
    let sum: f64 = values.iter().sum();
    let mean = (count > 0).then(|| sum / count as f64);

    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let median = percentile(&sorted, 50.0, PercentileMethod::Linear);

    let variance = sample_variance(values);

    SummaryStats {
        count,
        sum,
        mean,
        median,
        variance,
        std_dev: variance.map(f64::sqrt),
        min: sorted.first().copied(),
        max: sorted.last().copied(),
    }
}

/// Sample variance (n-1 denominator); `None` below two values
pub fn sample_variance(values: &[f64]) -> Option<f64> {
    let n = values.len();
    if n < 2 {
        return None;
    }
    let mean = values.iter().sum::<f64>() / n as f64;
    let ss: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();
    Some(ss / (n - 1) as f64)
}

/// Percentile of sorted-ascending values for p in [0, 100]
pub fn percentile(sorted: &[f64], p: f64, method: PercentileMethod) -> Option<f64> {
    if sorted.is_empty() || !(0.0..=100.0).contains(&p) {
        return None;
    }
    let n = sorted.len();
    match method {
        PercentileMethod::Linear => {
            let rank = p / 100.0 * (n - 1) as f64;
            let lower = rank.floor() as usize;
            let fraction = rank - lower as f64;
            if lower + 1 < n {
                Some(sorted[lower] + fraction * (sorted[lower + 1] - sorted[lower]))
            } else {
                Some(sorted[n - 1])
            }
        }
        PercentileMethod::NearestRank => {
            let rank = ((p / 100.0 * n as f64).ceil() as usize).max(1);
            Some(sorted[rank.min(n) - 1])
        }
    }
}

/// Interquartile range (p75 - p25)
pub fn iqr(sorted: &[f64], method: PercentileMethod) -> Option<f64> {
    let p75 = percentile(sorted, 75.0, method)?;
    let p25 = percentile(sorted, 25.0, method)?;
    Some(p75 - p25)
}

/// Pearson correlation coefficient
///
/// `None` below two pairs or when either side has zero variance, so a
/// constant column never divides by zero.
pub fn pearson(x: &[f64], y: &[f64]) -> Option<f64> {
    if x.len() != y.len() || x.len() < 2 {
        return None;
    }
    let n = x.len() as f64;

    let sum_x: f64 = x.iter().sum();
    let sum_y: f64 = y.iter().sum();
    let sum_xy: f64 = x.iter().zip(y.iter()).map(|(a, b)| a * b).sum();
    let sum_x2: f64 = x.iter().map(|a| a * a).sum();
    let sum_y2: f64 = y.iter().map(|b| b * b).sum();

    let var_x = n * sum_x2 - sum_x.powi(2);
    let var_y = n * sum_y2 - sum_y.powi(2);
    if var_x <= 0.0 || var_y <= 0.0 {
        return None;
    }

    Some((n * sum_xy - sum_x * sum_y) / (var_x * var_y).sqrt())
}

/// Skewness and excess kurtosis (moment-based estimators)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DistributionShape {
    pub skewness: Option<f64>,
    pub kurtosis: Option<f64>,
}

/// Distribution shape over raw values; NULL on zero variance
pub fn shape(values: &[f64]) -> DistributionShape {
    let n = values.len() as f64;
    if values.is_empty() {
        return DistributionShape {
            skewness: None,
            kurtosis: None,
        };
    }
    let mean = values.iter().sum::<f64>() / n;
    let m2 = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    if m2 == 0.0 {
        return DistributionShape {
            skewness: None,
            kurtosis: None,
        };
    }
    let m3 = values.iter().map(|v| (v - mean).powi(3)).sum::<f64>() / n;
    let m4 = values.iter().map(|v| (v - mean).powi(4)).sum::<f64>() / n;

    DistributionShape {
        skewness: Some(m3 / m2.powf(1.5)),
        kurtosis: Some(m4 / (m2 * m2) - 3.0),
    }
}

/// Summary statistics for each requested measure, one row per measure
pub fn summary(
    dataset: &Dataset,
    table: &FlatTable,
    measures: &[String],
) -> EngineResult<ResultTable> {
    table.validate()?;
    let resolved = resolver::resolve(dataset, table, &[], measures)?;

    let mut columns = vec![ColumnHeader::dimension("measure", ColumnKind::String)];
    for name in [
        "count", "sum", "mean", "median", "std_dev", "variance", "min", "max", "skewness",
        "kurtosis",
    ] {
        columns.push(ColumnHeader::derived(name, ColumnKind::Number));
    }

    let mut result = ResultTable::new(columns);
    for measure in &resolved.measures {
        let values = numeric_values(table, measure.column);
        let stats = summarize(&values);
        let dist = shape(&values);

        result.push_row(vec![
            Value::Text(measure.name.clone()),
            Value::Number(stats.count as f64),
            Value::Number(stats.sum),
            Value::from(stats.mean),
            Value::from(stats.median),
            Value::from(stats.std_dev),
            Value::from(stats.variance),
            Value::from(stats.min),
            Value::from(stats.max),
            Value::from(dist.skewness),
            Value::from(dist.kurtosis),
        ]);
    }
    Ok(result)
}

/// Parameters for a percentile report
#[derive(Debug, Clone)]
pub struct PercentileRequest {
    /// Measure to analyze
    pub measure: String,
    /// Percentiles in [0, 100]
    pub percentiles: Vec<f64>,
    /// Interpolation method
    pub method: PercentileMethod,
}

impl PercentileRequest {
    /// Create a request with the common p25/p50/p75/p90/p95/p99 set
    pub fn new(measure: impl Into<String>) -> Self {
        Self {
            measure: measure.into(),
            percentiles: vec![25.0, 50.0, 75.0, 90.0, 95.0, 99.0],
            method: PercentileMethod::default(),
        }
    }

    /// Builder method: set explicit percentiles
    pub fn percentiles(mut self, ps: &[f64]) -> Self {
        self.percentiles = ps.to_vec();
        self
    }

    /// Builder method: set the interpolation method
    pub fn method(mut self, method: PercentileMethod) -> Self {
        self.method = method;
        self
    }
}

/// Percentile values for one measure, one row per requested percentile
pub fn percentiles(
    dataset: &Dataset,
    table: &FlatTable,
    request: &PercentileRequest,
) -> EngineResult<ResultTable> {
    table.validate()?;
    for &p in &request.percentiles {
        if !(0.0..=100.0).contains(&p) {
            return Err(EngineError::InvalidArgument(format!(
                "percentile {} is outside [0, 100]",
                p
            )));
        }
    }

    let resolved = resolver::resolve(dataset, table, &[], std::slice::from_ref(&request.measure))?;
    let mut values = numeric_values(table, resolved.measures[0].column);
    values.sort_by(f64::total_cmp);

    let mut result = ResultTable::new(vec![
        ColumnHeader::dimension("percentile", ColumnKind::Number),
        ColumnHeader::derived("value", ColumnKind::Number),
    ]);
    for &p in &request.percentiles {
        result.push_row(vec![
            Value::Number(p),
            Value::from(percentile(&values, p, request.method)),
        ]);
    }
    Ok(result)
}

/// Pearson correlation between every pair of requested measures
///
/// Each pair uses only rows where both values are non-NULL; a measure
/// with zero variance yields NULL against every partner.
pub fn correlation_matrix(
    dataset: &Dataset,
    table: &FlatTable,
    measures: &[String],
) -> EngineResult<ResultTable> {
    table.validate()?;
    let resolved = resolver::resolve(dataset, table, &[], measures)?;

    let mut columns = vec![ColumnHeader::dimension("measure", ColumnKind::String)];
    for measure in &resolved.measures {
        columns.push(ColumnHeader::derived(&measure.name, ColumnKind::Number));
    }

    let mut result = ResultTable::new(columns);
    for a in &resolved.measures {
        let mut row = vec![Value::Text(a.name.clone())];
        for b in &resolved.measures {
            let (x, y) = paired_values(table, a.column, b.column);
            row.push(Value::from(pearson(&x, &y)));
        }
        result.push_row(row);
    }
    Ok(result)
}

/// Histogram bin sizing
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BinSpec {
    /// Fixed number of equal-width bins
    Count(usize),
    /// Fixed bin width
    Width(f64),
}

/// Parameters for a histogram
#[derive(Debug, Clone)]
pub struct HistogramRequest {
    /// Measure to bin
    pub measure: String,
    /// Bin sizing
    pub bins: BinSpec,
}

impl HistogramRequest {
    /// Create a histogram request
    pub fn new(measure: impl Into<String>, bins: BinSpec) -> Self {
        Self {
            measure: measure.into(),
            bins,
        }
    }
}

/// Equal-width histogram over a measure's observed range
///
/// The rightmost bin is inclusive of the maximum value.
pub fn histogram(
    dataset: &Dataset,
    table: &FlatTable,
    request: &HistogramRequest,
) -> EngineResult<ResultTable> {
    table.validate()?;
    let resolved = resolver::resolve(dataset, table, &[], std::slice::from_ref(&request.measure))?;
    let values = numeric_values(table, resolved.measures[0].column);

    let mut result = ResultTable::new(vec![
        ColumnHeader::derived("bin_lower", ColumnKind::Number),
        ColumnHeader::derived("bin_upper", ColumnKind::Number),
        ColumnHeader::derived("count", ColumnKind::Number),
    ]);

    if values.is_empty() {
        return Ok(result);
    }

    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let range = max - min;

    let bin_count = match request.bins {
        BinSpec::Count(0) => {
            return Err(EngineError::InvalidArgument(
                "histogram bin count must be positive".to_string(),
            ))
        }
        BinSpec::Count(n) => n,
        BinSpec::Width(w) if w <= 0.0 => {
            return Err(EngineError::InvalidArgument(
                "histogram bin width must be positive".to_string(),
            ))
        }
        BinSpec::Width(w) => ((range / w).ceil() as usize).max(1),
    };
    let width = if range == 0.0 {
        1.0
    } else {
        range / bin_count as f64
    };

    let mut counts = vec![0usize; bin_count];
    for &v in &values {
        let idx = (((v - min) / width).floor() as usize).min(bin_count - 1);
        counts[idx] += 1;
    }

    for (i, &count) in counts.iter().enumerate() {
        result.push_row(vec![
            Value::Number(min + width * i as f64),
            Value::Number(min + width * (i + 1) as f64),
            Value::Number(count as f64),
        ]);
    }
    Ok(result)
}

/// Distribution shape for one measure
pub fn distribution(
    dataset: &Dataset,
    table: &FlatTable,
    measure: &str,
) -> EngineResult<ResultTable> {
    table.validate()?;
    let requested = [measure.to_string()];
    let resolved = resolver::resolve(dataset, table, &[], &requested)?;
    let values = numeric_values(table, resolved.measures[0].column);
    let dist = shape(&values);

    let mut result = ResultTable::new(vec![
        ColumnHeader::dimension("measure", ColumnKind::String),
        ColumnHeader::derived("skewness", ColumnKind::Number),
        ColumnHeader::derived("kurtosis", ColumnKind::Number),
    ]);
    result.push_row(vec![
        Value::Text(measure.to_string()),
        Value::from(dist.skewness),
        Value::from(dist.kurtosis),
    ]);
    Ok(result)
}

/// Non-NULL numeric values of a column
pub(crate) fn numeric_values(table: &FlatTable, column: usize) -> Vec<f64> {
    table
        .rows
        .iter()
        .filter_map(|row| row[column].as_number())
        .collect()
}

/// Rows where both columns are non-NULL, as aligned vectors
fn paired_values(table: &FlatTable, a: usize, b: usize) -> (Vec<f64>, Vec<f64>) {
    let mut x = Vec::new();
    let mut y = Vec::new();
    for row in &table.rows {
        if let (Some(va), Some(vb)) = (row[a].as_number(), row[b].as_number()) {
            x.push(va);
            y.push(vb);
        }
    }
    (x, y)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AggFn, Dataset};

    fn dataset() -> Dataset {
        Dataset::new("metrics", "samples")
            .measure("score", AggFn::Avg)
            .measure("load", AggFn::Avg)
            .measure("constant", AggFn::Avg)
    }

    fn table(rows: &[(f64, f64)]) -> FlatTable {
        FlatTable::new(
            vec![
                ColumnHeader::measure("score"),
                ColumnHeader::measure("load"),
                ColumnHeader::measure("constant"),
            ],
            rows.iter()
                .map(|(a, b)| vec![Value::from(*a), Value::from(*b), Value::from(5.0)])
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn test_summarize_basics() {
        let stats = summarize(&[1.0, 2.0, 3.0, 4.0]);
        assert_eq!(stats.count, 4);
        assert_eq!(stats.sum, 10.0);
        assert_eq!(stats.mean, Some(2.5));
        assert_eq!(stats.median, Some(2.5));
        assert_eq!(stats.min, Some(1.0));
        assert_eq!(stats.max, Some(4.0));
        // Sample variance of 1..4 is 5/3
        let var = stats.variance.unwrap();
        assert!((var - 5.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_summarize_degenerate_inputs() {
        let empty = summarize(&[]);
        assert_eq!(empty.count, 0);
        assert_eq!(empty.sum, 0.0);
        assert_eq!(empty.mean, None);
        assert_eq!(empty.median, None);

        // A single value has no sample variance
        let single = summarize(&[7.0]);
        assert_eq!(single.mean, Some(7.0));
        assert_eq!(single.variance, None);
        assert_eq!(single.std_dev, None);
    }

    #[test]
    fn test_percentile_linear_interpolation() {
        let sorted = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(percentile(&sorted, 50.0, PercentileMethod::Linear), Some(2.5));
        assert_eq!(percentile(&sorted, 0.0, PercentileMethod::Linear), Some(1.0));
        assert_eq!(percentile(&sorted, 100.0, PercentileMethod::Linear), Some(4.0));
        assert_eq!(percentile(&sorted, 25.0, PercentileMethod::Linear), Some(1.75));
    }

    #[test]
    fn test_percentile_nearest_rank() {
        let sorted = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(percentile(&sorted, 50.0, PercentileMethod::NearestRank), Some(2.0));
        assert_eq!(percentile(&sorted, 100.0, PercentileMethod::NearestRank), Some(4.0));
        assert_eq!(percentile(&sorted, 1.0, PercentileMethod::NearestRank), Some(1.0));
    }

    #[test]
    fn test_iqr() {
        let sorted = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(iqr(&sorted, PercentileMethod::Linear), Some(3.25 - 1.75));
    }

    #[test]
    fn test_pearson_self_and_constant() {
        let x = [1.0, 2.0, 3.0, 4.0];
        let r = pearson(&x, &x).unwrap();
        assert!((r - 1.0).abs() < 1e-12);

        let constant = [5.0, 5.0, 5.0, 5.0];
        assert_eq!(pearson(&x, &constant), None);
    }

    #[test]
    fn test_pearson_negative() {
        let x = [1.0, 2.0, 3.0];
        let y = [6.0, 4.0, 2.0];
        let r = pearson(&x, &y).unwrap();
        assert!((r + 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_correlation_matrix_pairwise_complete() {
        let mut rows_table = table(&[(1.0, 2.0), (2.0, 4.0), (3.0, 6.0)]);
        // Add a row where load is NULL: it must not poison score/load
        rows_table
            .rows
            .push(vec![Value::from(10.0), Value::Null, Value::from(5.0)]);

        let result = correlation_matrix(
            &dataset(),
            &rows_table,
            &["score".to_string(), "load".to_string(), "constant".to_string()],
        )
        .unwrap();

        // score vs score
        assert_eq!(result.value(0, "score"), Some(&Value::Number(1.0)));
        // score vs load: perfectly linear on the complete pairs
        match result.value(0, "load") {
            Some(Value::Number(r)) => assert!((r - 1.0).abs() < 1e-12),
            other => panic!("unexpected {:?}", other),
        }
        // Anything vs the constant column is NULL
        assert_eq!(result.value(0, "constant"), Some(&Value::Null));
        assert_eq!(result.value(2, "constant"), Some(&Value::Null));
    }

    #[test]
    fn test_histogram_bins_and_rightmost_inclusive() {
        let table = table(&[(0.0, 0.0), (2.5, 0.0), (5.0, 0.0), (9.9, 0.0), (10.0, 0.0)]);
        let request = HistogramRequest::new("score", BinSpec::Count(4));
        let result = histogram(&dataset(), &table, &request).unwrap();

        assert_eq!(result.len(), 4);
        assert_eq!(result.value(0, "bin_lower"), Some(&Value::Number(0.0)));
        assert_eq!(result.value(3, "bin_upper"), Some(&Value::Number(10.0)));

        // The max value lands in the last bin, not past it
        let counts: Vec<f64> = (0..4)
            .map(|i| result.value(i, "count").unwrap().as_number().unwrap())
            .collect();
        assert_eq!(counts.iter().sum::<f64>(), 5.0);
        assert_eq!(counts[3], 2.0);
    }

    #[test]
    fn test_histogram_by_width() {
        let table = table(&[(0.0, 0.0), (4.0, 0.0), (8.0, 0.0)]);
        let request = HistogramRequest::new("score", BinSpec::Width(3.0));
        let result = histogram(&dataset(), &table, &request).unwrap();
        assert_eq!(result.len(), 3);
    }

    #[test]
    fn test_histogram_invalid_bins() {
        let table = table(&[(1.0, 1.0)]);
        let err = histogram(&dataset(), &table, &HistogramRequest::new("score", BinSpec::Count(0)))
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidArgument(_)));

        let err = histogram(
            &dataset(),
            &table,
            &HistogramRequest::new("score", BinSpec::Width(-1.0)),
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::InvalidArgument(_)));
    }

    #[test]
    fn test_shape_zero_variance_is_null() {
        let dist = shape(&[3.0, 3.0, 3.0]);
        assert_eq!(dist.skewness, None);
        assert_eq!(dist.kurtosis, None);
    }

    #[test]
    fn test_shape_symmetric_distribution() {
        let dist = shape(&[1.0, 2.0, 3.0, 4.0, 5.0]);
        let skew = dist.skewness.unwrap();
        assert!(skew.abs() < 1e-12);
        // Uniform-ish discrete values have negative excess kurtosis
        assert!(dist.kurtosis.unwrap() < 0.0);
    }

    #[test]
    fn test_summary_operation_all_null_measure() {
        let mut t = table(&[]);
        t.rows.push(vec![Value::Null, Value::Null, Value::Null]);

        let result = summary(&dataset(), &t, &["score".to_string()]).unwrap();
        assert_eq!(result.value(0, "count"), Some(&Value::Number(0.0)));
        assert_eq!(result.value(0, "mean"), Some(&Value::Null));
        assert_eq!(result.value(0, "std_dev"), Some(&Value::Null));
        assert_eq!(result.value(0, "min"), Some(&Value::Null));
    }

    #[test]
    fn test_percentiles_operation() {
        let table = table(&[(1.0, 0.0), (2.0, 0.0), (3.0, 0.0), (4.0, 0.0)]);
        let request = PercentileRequest::new("score").percentiles(&[50.0, 90.0]);
        let result = percentiles(&dataset(), &table, &request).unwrap();

        assert_eq!(result.len(), 2);
        assert_eq!(result.value(0, "value"), Some(&Value::Number(2.5)));
    }

    #[test]
    fn test_percentiles_out_of_range_rejected() {
        let table = table(&[(1.0, 0.0)]);
        let request = PercentileRequest::new("score").percentiles(&[101.0]);
        let err = percentiles(&dataset(), &table, &request).unwrap_err();
        assert!(matches!(err, EngineError::InvalidArgument(_)));
    }
}
