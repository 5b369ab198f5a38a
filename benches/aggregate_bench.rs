//! Benchmarks for the Lattice aggregation paths
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};

use lattice::aggregate::{aggregate, rollup, AggregateRequest, RollupRequest};
use lattice::model::{AggFn, DataKind, Dataset};
use lattice::table::{ColumnHeader, ColumnKind, FlatTable, Value};
use lattice::timeseries::{time_series, Grain, TimeSeriesRequest};
use lattice::window::{window, WindowFunc, WindowRequest};

const REGIONS: [&str; 4] = ["East", "West", "North", "South"];
const PRODUCTS: [&str; 8] = [
    "widget", "gadget", "gizmo", "doohickey", "sprocket", "flange", "bracket", "coupling",
];

// 2024-01-01 00:00:00 UTC
const EPOCH: i64 = 1704067200000;
const HOUR_MS: i64 = 3_600_000;

fn bench_dataset() -> Dataset {
    Dataset::new("sales", "orders")
        .dimension("region", "orders", DataKind::Categorical)
        .dimension("product", "orders", DataKind::Categorical)
        .dimension("sold_at", "orders", DataKind::Temporal)
        .measure("revenue", AggFn::Sum)
        .measure("units", AggFn::Count)
        .time_dimension("sold_at", &[Grain::Day, Grain::Week, Grain::Month])
}

fn bench_table(rows: usize) -> FlatTable {
    let data = (0..rows)
        .map(|i| {
            vec![
                Value::from(REGIONS[i % REGIONS.len()]),
                Value::from(PRODUCTS[i % PRODUCTS.len()]),
                Value::Timestamp(EPOCH + i as i64 * HOUR_MS),
                Value::Number((i % 97) as f64 * 1.5),
                Value::Number(1.0),
            ]
        })
        .collect();

    FlatTable::new(
        vec![
            ColumnHeader::dimension("region", ColumnKind::String),
            ColumnHeader::dimension("product", ColumnKind::String),
            ColumnHeader::dimension("sold_at", ColumnKind::Timestamp),
            ColumnHeader::measure("revenue"),
            ColumnHeader::measure("units"),
        ],
        data,
    )
    .unwrap()
}

fn bench_aggregate(c: &mut Criterion) {
    let dataset = bench_dataset();
    let mut group = c.benchmark_group("aggregate");

    for size in [1_000, 10_000, 100_000] {
        let table = bench_table(size);
        let request = AggregateRequest::new(&["revenue", "units"])
            .group_by(&["region", "product"]);

        group.throughput(Throughput::Elements(size as u64));
        group.bench_function(format!("group_by_2_dims_{}", size), |b| {
            b.iter(|| aggregate(black_box(&dataset), black_box(&table), &request).unwrap())
        });
    }

    group.finish();
}

fn bench_rollup(c: &mut Criterion) {
    let dataset = bench_dataset();
    let table = bench_table(10_000);
    let request = RollupRequest::new(&["region", "product"], &["revenue"]);

    let mut group = c.benchmark_group("rollup");
    group.throughput(Throughput::Elements(10_000));
    group.bench_function("two_level_10000", |b| {
        b.iter(|| rollup(black_box(&dataset), black_box(&table), &request).unwrap())
    });
    group.finish();
}

fn bench_time_series(c: &mut Criterion) {
    let dataset = bench_dataset();
    let table = bench_table(10_000);
    let request = TimeSeriesRequest::new(Grain::Day, &["revenue"]);

    let mut group = c.benchmark_group("time_series");
    group.throughput(Throughput::Elements(10_000));
    group.bench_function("daily_buckets_10000", |b| {
        b.iter(|| time_series(black_box(&dataset), black_box(&table), &request).unwrap())
    });
    group.finish();
}

fn bench_window(c: &mut Criterion) {
    let dataset = bench_dataset();
    let table = bench_table(10_000);
    let request = WindowRequest::new(WindowFunc::RunningTotal)
        .partition_by(&["region"])
        .order_by(&["sold_at"])
        .value("revenue");

    let mut group = c.benchmark_group("window");
    group.throughput(Throughput::Elements(10_000));
    group.bench_function("running_total_10000", |b| {
        b.iter(|| window(black_box(&dataset), black_box(&table), &request).unwrap())
    });
    group.finish();
}

criterion_group!(
    benches,
    bench_aggregate,
    bench_rollup,
    bench_time_series,
    bench_window
);
criterion_main!(benches);
