//! # Lattice
//!
//! In-memory OLAP analytics engine: turns a flat, already-joined result
//! set into multi-dimensional analytical output - pivoted aggregations,
//! hierarchical rollups and cubes, gap-filled time series, window
//! functions and statistical summaries.
//!
//! ## Features
//!
//! - **Semantic model**: declarative datasets (dimensions, measures,
//!   hierarchies, joins, time dimension) validated at load and swapped
//!   atomically on reload
//! - **Aggregation**: GROUP BY, PIVOT, ROLLUP, CUBE and GROUPING SETS
//!   with deterministic ordering and first-class NULL groups
//! - **Time series**: calendar-aware bucketing, date-spine gap filling,
//!   period-over-period comparison
//! - **Window functions**: running, ranking and lag/lead calculations
//!   over partitioned, stably-ordered rows
//! - **Statistics**: summary stats, percentiles, correlation matrices,
//!   histograms, distribution shape and Pareto contribution analysis
//!
//! ## Modules
//!
//! - [`model`]: semantic model types and the versioned registry
//! - [`resolver`]: logical name to physical column resolution
//! - [`aggregate`]: grouping, pivot and subtotal operations
//! - [`timeseries`]: grains, spines and period comparison
//! - [`window`]: window function engine
//! - [`stats`]: statistics and contribution analysis
//! - [`table`]: typed cells, flat input and structured output
//! - [`ingest`]: CSV loading for the CLI
//!
//! ## Quick Start
//!
//! ```rust
//! use lattice::aggregate::{aggregate, AggregateRequest};
//! use lattice::model::{AggFn, DataKind, Dataset};
//! use lattice::table::{ColumnHeader, ColumnKind, FlatTable, Value};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Describe the dataset
//!     let dataset = Dataset::new("sales", "orders")
//!         .dimension("region", "orders", DataKind::Categorical)
//!         .measure("sales", AggFn::Sum);
//!
//!     // The flat input rows, as materialized by the row-source
//!     let table = FlatTable::new(
//!         vec![
//!             ColumnHeader::dimension("region", ColumnKind::String),
//!             ColumnHeader::measure("sales"),
//!         ],
//!         vec![
//!             vec![Value::from("East"), Value::from(100.0)],
//!             vec![Value::from("West"), Value::from(50.0)],
//!             vec![Value::from("East"), Value::from(120.0)],
//!         ],
//!     )?;
//!
//!     // Group and aggregate
//!     let request = AggregateRequest::new(&["sales"]).group_by(&["region"]);
//!     let result = aggregate(&dataset, &table, &request)?;
//!
//!     assert_eq!(result.value(0, "sales"), Some(&Value::Number(220.0)));
//!     assert_eq!(result.value(1, "sales"), Some(&Value::Number(50.0)));
//!     Ok(())
//! }
//! ```

pub mod aggregate;
pub mod config;
pub mod error;
pub mod ingest;
pub mod model;
pub mod resolver;
pub mod stats;
pub mod table;
pub mod timeseries;
pub mod window;

// Re-export top-level types for convenience
pub use error::{EngineError, EngineResult};

pub use model::{
    AggFn, Catalog, DataKind, Dataset, Dimension, Hierarchy, Join, JoinKind, Measure,
    ModelError, ModelRegistry, ModelResult, TimeDimension,
};

pub use table::{
    ColumnHeader, ColumnKind, ColumnRole, FlatTable, NullOrder, ResultTable, RowMeta, Value,
};

pub use resolver::{resolve, ResolvedDimension, ResolvedMeasure, ResolvedQuery};

pub use aggregate::{
    aggregate, cube, grouping_sets, pivot, rollup, AggregateRequest, CubeRequest,
    GroupingSetsRequest, PivotRequest, RollupRequest,
};

pub use timeseries::{time_series, Comparison, DateRange, Grain, TimeSeriesRequest};

pub use window::{window, WindowFunc, WindowRequest};

pub use stats::{
    contribution, correlation_matrix, histogram, percentiles, summary, BinSpec,
    ContributionRequest, HistogramRequest, PercentileMethod, PercentileRequest, SummaryStats,
};

pub use config::{Config, ConfigError, EngineConfig, LoggingConfig};

pub use ingest::{CsvLoadResult, CsvLoader, IngestError, IngestResult};
