//! Lattice CLI
//!
//! Command-line front end for the analytics engine:
//! - Load a semantic model (TOML) and a flat CSV result set
//! - Run aggregation, pivot, rollup, cube, time-series, window,
//!   statistics and contribution operations
//! - Print results as aligned tables or JSON

use anyhow::{anyhow, bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use lattice::aggregate::{
    aggregate, cube, pivot, rollup, AggregateRequest, CubeRequest, PivotRequest, RollupRequest,
};
use lattice::config::{generate_default_config, Config};
use lattice::ingest::CsvLoader;
use lattice::model::{Dataset, ModelRegistry};
use lattice::stats::{
    contribution, correlation_matrix, histogram, percentiles, summary, BinSpec,
    ContributionRequest, HistogramRequest, PercentileRequest,
};
use lattice::table::{FlatTable, ResultTable, RowMeta, Value};
use lattice::timeseries::{time_series, Comparison, DateRange, Grain, TimeSeriesRequest};
use lattice::window::{window, WindowFunc, WindowRequest};

#[derive(Parser)]
#[command(name = "lattice")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "In-memory OLAP analytics over flat tabular results")]
#[command(
    long_about = "Lattice turns a flat result set into multi-dimensional analytical output.\nSupply a semantic model (TOML) and rows (CSV), pick an operation, get a table."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output format (table, json)
    #[arg(short, long, default_value = "table", global = true)]
    pub format: String,

    /// Config file path (default: standard locations)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

/// Model + input shared by every data operation
#[derive(Args)]
pub struct SourceArgs {
    /// Semantic model TOML file
    #[arg(short, long)]
    pub model: PathBuf,

    /// Dataset name within the model
    #[arg(short, long)]
    pub dataset: String,

    /// Flat CSV input (header row maps onto dataset fields)
    #[arg(short, long)]
    pub input: PathBuf,

    /// Timestamp format for temporal CSV columns (strftime)
    #[arg(long, default_value = "%Y-%m-%d")]
    pub timestamp_format: String,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Group rows by dimensions and aggregate measures
    Aggregate {
        #[command(flatten)]
        source: SourceArgs,
        /// Group-by dimensions (comma-separated; empty = grand total)
        #[arg(short, long, value_delimiter = ',')]
        group_by: Vec<String>,
        /// Measures to aggregate (comma-separated)
        #[arg(short = 'M', long, value_delimiter = ',', required = true)]
        measures: Vec<String>,
    },

    /// Cross-tabulate a row axis against a column axis
    Pivot {
        #[command(flatten)]
        source: SourceArgs,
        /// Row-axis dimensions
        #[arg(short, long, value_delimiter = ',', required = true)]
        rows: Vec<String>,
        /// Column-axis dimensions
        #[arg(short, long, value_delimiter = ',', required = true)]
        cols: Vec<String>,
        /// Measure aggregated into each cell
        #[arg(short = 'M', long)]
        measure: String,
        /// Skip the grand-total row and column
        #[arg(long)]
        no_totals: bool,
    },

    /// Hierarchical subtotals, finest dimension peeled first
    Rollup {
        #[command(flatten)]
        source: SourceArgs,
        /// Ordered dimensions, coarsest to finest
        #[arg(short = 'D', long, value_delimiter = ',')]
        dimensions: Vec<String>,
        /// Use a declared hierarchy instead of explicit dimensions
        #[arg(long, conflicts_with = "dimensions")]
        hierarchy: Option<String>,
        /// Measures to aggregate
        #[arg(short = 'M', long, value_delimiter = ',', required = true)]
        measures: Vec<String>,
    },

    /// Aggregates for every subset of the dimension set
    Cube {
        #[command(flatten)]
        source: SourceArgs,
        /// Dimension set
        #[arg(short = 'D', long, value_delimiter = ',', required = true)]
        dimensions: Vec<String>,
        /// Measures to aggregate
        #[arg(short = 'M', long, value_delimiter = ',', required = true)]
        measures: Vec<String>,
    },

    /// Bucket by time grain, fill gaps, compare periods
    Timeseries {
        #[command(flatten)]
        source: SourceArgs,
        /// Bucketing grain (year, quarter, month, week, day, hour)
        #[arg(short, long)]
        grain: String,
        /// Measures to aggregate per bucket
        #[arg(short = 'M', long, value_delimiter = ',', required = true)]
        measures: Vec<String>,
        /// Period comparison (yoy, qoq, mom, wow, dod)
        #[arg(long)]
        compare: Option<String>,
        /// Spine start (ISO date or RFC 3339)
        #[arg(long)]
        start: Option<String>,
        /// Spine end, inclusive
        #[arg(long)]
        end: Option<String>,
        /// Keep only observed buckets
        #[arg(long)]
        no_fill: bool,
    },

    /// Partitioned, ordered window calculation
    Window {
        #[command(flatten)]
        source: SourceArgs,
        /// Function: running_total, running_avg, moving_avg, rank,
        /// dense_rank, row_number, ntile, percent_of_total,
        /// percent_change, lag, lead
        #[arg(short = 'F', long = "function")]
        func: String,
        /// Partition dimensions
        #[arg(short, long, value_delimiter = ',')]
        partition_by: Vec<String>,
        /// Ordering columns within each partition
        #[arg(short, long, value_delimiter = ',')]
        order_by: Vec<String>,
        /// Value measure (unused by ranking functions)
        #[arg(short, long)]
        value: Option<String>,
        /// Trailing window size for moving_avg
        #[arg(long)]
        window: Option<usize>,
        /// Bucket count for ntile
        #[arg(long)]
        buckets: Option<usize>,
        /// Row offset for lag/lead (default 1)
        #[arg(long)]
        offset: Option<usize>,
        /// Output column name
        #[arg(long)]
        alias: Option<String>,
    },

    /// Summary statistics per measure
    Summary {
        #[command(flatten)]
        source: SourceArgs,
        /// Measures to summarize
        #[arg(short = 'M', long, value_delimiter = ',', required = true)]
        measures: Vec<String>,
    },

    /// Percentile report for one measure
    Percentiles {
        #[command(flatten)]
        source: SourceArgs,
        /// Measure to analyze
        #[arg(short = 'M', long)]
        measure: String,
        /// Percentiles in [0, 100] (default p25/p50/p75/p90/p95/p99)
        #[arg(short, long, value_delimiter = ',')]
        percentiles: Vec<f64>,
    },

    /// Pearson correlation matrix between measures
    Correlate {
        #[command(flatten)]
        source: SourceArgs,
        /// Measures to correlate pairwise
        #[arg(short = 'M', long, value_delimiter = ',', required = true)]
        measures: Vec<String>,
    },

    /// Equal-width histogram over one measure
    Histogram {
        #[command(flatten)]
        source: SourceArgs,
        /// Measure to bin
        #[arg(short = 'M', long)]
        measure: String,
        /// Number of equal-width bins
        #[arg(short, long, conflicts_with = "width")]
        bins: Option<usize>,
        /// Fixed bin width
        #[arg(short, long)]
        width: Option<f64>,
    },

    /// Top-N / Pareto contribution analysis
    Contribution {
        #[command(flatten)]
        source: SourceArgs,
        /// Dimensions identifying the contributing entities
        #[arg(short = 'D', long, value_delimiter = ',', required = true)]
        dimensions: Vec<String>,
        /// Measure ranked and accumulated
        #[arg(short = 'M', long)]
        measure: String,
        /// Keep only the top N rows
        #[arg(long, conflicts_with = "bottom")]
        top: Option<usize>,
        /// Keep only the bottom N rows
        #[arg(long)]
        bottom: Option<usize>,
    },

    /// Generate the default config file
    Config {
        /// Output path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load_with_env(path)?,
        None => Config::load_default(),
    };
    init_logging(&config);

    let result = match cli.command {
        Commands::Aggregate {
            source,
            group_by,
            measures,
        } => {
            let (dataset, table) = load_source(&source)?;
            let request = AggregateRequest {
                dimensions: group_by,
                measures,
                null_order: config.engine.null_order,
            };
            aggregate(&dataset, &table, &request)?
        }

        Commands::Pivot {
            source,
            rows,
            cols,
            measure,
            no_totals,
        } => {
            let (dataset, table) = load_source(&source)?;
            let request = PivotRequest {
                row_dimensions: rows,
                column_dimensions: cols,
                measure,
                totals: !no_totals,
                null_order: config.engine.null_order,
            };
            pivot(&dataset, &table, &request)?
        }

        Commands::Rollup {
            source,
            dimensions,
            hierarchy,
            measures,
        } => {
            let (dataset, table) = load_source(&source)?;
            let request = RollupRequest {
                dimensions,
                hierarchy,
                measures,
                null_order: config.engine.null_order,
            };
            rollup(&dataset, &table, &request)?
        }

        Commands::Cube {
            source,
            dimensions,
            measures,
        } => {
            let (dataset, table) = load_source(&source)?;
            let request = CubeRequest {
                dimensions,
                measures,
                null_order: config.engine.null_order,
            };
            cube(&dataset, &table, &request)?
        }

        Commands::Timeseries {
            source,
            grain,
            measures,
            compare,
            start,
            end,
            no_fill,
        } => {
            let (dataset, table) = load_source(&source)?;
            let grain = Grain::from_str(&grain)
                .ok_or_else(|| anyhow!("unknown grain '{}'", grain))?;

            let mut request = TimeSeriesRequest::new(grain, &[]);
            request.measures = measures;
            request.fill_gaps = !no_fill;
            if let Some(kind) = compare {
                request.compare = Some(
                    Comparison::from_str(&kind)
                        .ok_or_else(|| anyhow!("unknown comparison '{}'", kind))?,
                );
            }
            match (start, end) {
                (Some(start), Some(end)) => {
                    request.date_range =
                        Some(DateRange::new(parse_time(&start)?, parse_time(&end)?));
                }
                (None, None) => {}
                _ => bail!("--start and --end must be given together"),
            }
            time_series(&dataset, &table, &request)?
        }

        Commands::Window {
            source,
            func,
            partition_by,
            order_by,
            value,
            window: window_size,
            buckets,
            offset,
            alias,
        } => {
            let (dataset, table) = load_source(&source)?;
            let request = WindowRequest {
                partition_by,
                order_by,
                value,
                func: parse_window_func(&func, window_size, buckets, offset)?,
                alias,
                null_order: config.engine.null_order,
            };
            window(&dataset, &table, &request)?
        }

        Commands::Summary { source, measures } => {
            let (dataset, table) = load_source(&source)?;
            summary(&dataset, &table, &measures)?
        }

        Commands::Percentiles {
            source,
            measure,
            percentiles: requested,
        } => {
            let (dataset, table) = load_source(&source)?;
            let mut request =
                PercentileRequest::new(measure).method(config.engine.percentile_method);
            if !requested.is_empty() {
                request = request.percentiles(&requested);
            }
            percentiles(&dataset, &table, &request)?
        }

        Commands::Correlate { source, measures } => {
            let (dataset, table) = load_source(&source)?;
            correlation_matrix(&dataset, &table, &measures)?
        }

        Commands::Histogram {
            source,
            measure,
            bins,
            width,
        } => {
            let (dataset, table) = load_source(&source)?;
            let spec = match (bins, width) {
                (Some(n), None) => BinSpec::Count(n),
                (None, Some(w)) => BinSpec::Width(w),
                (None, None) => BinSpec::Count(10),
                _ => bail!("--bins and --width are mutually exclusive"),
            };
            histogram(&dataset, &table, &HistogramRequest::new(measure, spec))?
        }

        Commands::Contribution {
            source,
            dimensions,
            measure,
            top,
            bottom,
        } => {
            let (dataset, table) = load_source(&source)?;
            let mut request = ContributionRequest::new(&[], measure).thresholds(
                config.engine.class_a_threshold,
                config.engine.class_b_threshold,
            );
            request.dimensions = dimensions;
            request.null_order = config.engine.null_order;
            if let Some(n) = top {
                request = request.top(n);
            }
            if let Some(n) = bottom {
                request = request.bottom(n);
            }
            contribution(&dataset, &table, &request)?
        }

        Commands::Config { output } => {
            let content = generate_default_config();
            match output {
                Some(path) => {
                    if let Some(parent) = path.parent() {
                        std::fs::create_dir_all(parent)?;
                    }
                    std::fs::write(&path, &content)?;
                    println!("Config written to {:?}", path);
                }
                None => print!("{}", content),
            }
            return Ok(());
        }
    };

    match cli.format.as_str() {
        "json" => println!("{}", serde_json::to_string_pretty(&result)?),
        _ => print_table(&result),
    }

    Ok(())
}

/// Load the semantic model and CSV input for one operation
fn load_source(source: &SourceArgs) -> Result<(Arc<Dataset>, FlatTable)> {
    let text = std::fs::read_to_string(&source.model)
        .with_context(|| format!("reading model file {:?}", source.model))?;

    let registry = ModelRegistry::new();
    registry.load_toml(&text).map_err(|errors| {
        let list = errors
            .iter()
            .map(|e| format!("  - {}", e))
            .collect::<Vec<_>>()
            .join("\n");
        anyhow!("model validation failed:\n{}", list)
    })?;

    let dataset = registry
        .dataset(&source.dataset)
        .ok_or_else(|| anyhow!("model has no dataset named '{}'", source.dataset))?;

    let loaded = CsvLoader::new()
        .with_timestamp_format(&source.timestamp_format)
        .load(&source.input, &dataset)
        .with_context(|| format!("loading {:?}", source.input))?;

    if loaded.rows_failed > 0 {
        eprintln!(
            "Warning: dropped {} of {} rows:",
            loaded.rows_failed, loaded.rows_processed
        );
        for error in loaded.errors.iter().take(10) {
            eprintln!("  {}", error);
        }
    }

    Ok((dataset, loaded.table))
}

fn parse_window_func(
    name: &str,
    window: Option<usize>,
    buckets: Option<usize>,
    offset: Option<usize>,
) -> Result<WindowFunc> {
    let func = match name.to_lowercase().as_str() {
        "running_total" => WindowFunc::RunningTotal,
        "running_avg" => WindowFunc::RunningAvg,
        "moving_avg" => WindowFunc::MovingAvg {
            window: window.ok_or_else(|| anyhow!("moving_avg requires --window"))?,
        },
        "rank" => WindowFunc::Rank,
        "dense_rank" => WindowFunc::DenseRank,
        "row_number" => WindowFunc::RowNumber,
        "ntile" => WindowFunc::Ntile {
            buckets: buckets.ok_or_else(|| anyhow!("ntile requires --buckets"))?,
        },
        "percent_of_total" => WindowFunc::PercentOfTotal,
        "percent_change" => WindowFunc::PercentChange,
        "lag" => WindowFunc::Lag {
            offset: offset.unwrap_or(1),
        },
        "lead" => WindowFunc::Lead {
            offset: offset.unwrap_or(1),
        },
        other => bail!("unknown window function '{}'", other),
    };
    Ok(func)
}

/// Parse an ISO date or RFC 3339 timestamp into Unix milliseconds
fn parse_time(s: &str) -> Result<i64> {
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(s) {
        return Ok(dt.timestamp_millis());
    }
    if let Ok(date) = chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        if let Some(dt) = date.and_hms_opt(0, 0, 0) {
            return Ok(dt.and_utc().timestamp_millis());
        }
    }
    if let Ok(ts) = s.parse::<i64>() {
        return Ok(ts);
    }
    bail!("invalid timestamp '{}': use YYYY-MM-DD or RFC 3339", s)
}

fn print_table(result: &ResultTable) {
    if result.is_empty() {
        println!("No rows");
        return;
    }

    let tagged = result.meta.iter().any(|m| !m.is_empty());
    let mut headers: Vec<String> = result.columns.iter().map(|c| c.name.clone()).collect();
    if tagged {
        headers.push("tag".to_string());
    }

    let mut cells: Vec<Vec<String>> = Vec::with_capacity(result.len());
    for (i, row) in result.rows.iter().enumerate() {
        let mut line: Vec<String> = row.iter().map(format_cell).collect();
        if tagged {
            line.push(result.meta.get(i).map(format_tag).unwrap_or_default());
        }
        cells.push(line);
    }

    let widths: Vec<usize> = headers
        .iter()
        .enumerate()
        .map(|(col, header)| {
            cells
                .iter()
                .map(|line| line[col].len())
                .chain(std::iter::once(header.len()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let header_line: Vec<String> = headers
        .iter()
        .zip(widths.iter())
        .map(|(h, w)| format!("{:<width$}", h, width = w))
        .collect();
    println!("{}", header_line.join(" | "));
    println!("{}", "-".repeat(header_line.join(" | ").len()));

    for line in &cells {
        let padded: Vec<String> = line
            .iter()
            .zip(widths.iter())
            .map(|(c, w)| format!("{:<width$}", c, width = w))
            .collect();
        println!("{}", padded.join(" | "));
    }
}

fn format_cell(value: &Value) -> String {
    match value {
        Value::Null => "-".to_string(),
        Value::Number(n) if n.fract() != 0.0 => format!("{:.4}", n),
        other => other.to_string(),
    }
}

fn format_tag(meta: &RowMeta) -> String {
    let mut parts = Vec::new();
    if let Some(level) = meta.subtotal_level {
        parts.push(format!("level={}", level));
    }
    if !meta.collapsed.is_empty() {
        parts.push(format!("collapsed={}", meta.collapsed.join(",")));
    }
    if let Some(set) = meta.grouping_set {
        parts.push(format!("set={}", set));
    }
    if let Some(rank) = meta.rank {
        parts.push(format!("rank={}", rank));
    }
    parts.join(" ")
}

fn init_logging(config: &Config) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.level));

    if config.logging.format == "json" {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}
