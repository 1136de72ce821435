//! Benchmark suite for factor computation and aggregation.
//!
//! Run with: `cargo bench`
//!
//! This benchmark measures:
//! - Factor engine throughput with and without history
//! - State store lookup/upsert under eviction pressure
//! - Local combine and global reduce
//! - Full pipeline over CSV lines

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use lob_factor_aggregator::{
    combine, compute_factors, record, reduce_partition, AggregationTuple, AggregatorConfig,
    FactorVector, InstrumentStateStore, Pipeline, PreviousState, Snapshot, StateKey, TimeKey,
    TradeTime, FACTOR_COUNT,
};

/// Realistic five-level book around a 10.00 price in ticks.
fn create_snapshot(code: &str, seq: usize) -> Snapshot {
    let second = (seq % 3600) as u32;
    let time = TradeTime::from_hms(10, second / 60, second % 60).unwrap();
    let drift = (seq % 20) as i64 - 10;

    let mut snap = Snapshot::new(20240102, time, code);
    for level in 1..=5 {
        let offset = level as i64 - 1;
        snap = snap.with_level(
            level,
            1000 + drift - offset,
            ((100 + level * 50) % 500 + 100) as i64,
            1001 + drift + offset,
            ((150 + level * 30) % 400 + 100) as i64,
        );
    }
    snap.with_market_volumes(120_000, 95_000).with_last_price(1000 + drift)
}

fn create_stream(instruments: usize, ticks: usize) -> Vec<Snapshot> {
    let codes: Vec<String> = (0..instruments).map(|i| format!("{}", 600000 + i)).collect();
    (0..ticks)
        .flat_map(|t| codes.iter().map(move |c| create_snapshot(c, t)))
        .collect()
}

/// Benchmark the 20-factor computation.
fn bench_factor_engine(c: &mut Criterion) {
    let mut group = c.benchmark_group("factor_engine");
    let current = create_snapshot("600000", 1);
    let previous = PreviousState::from_snapshot(&create_snapshot("600000", 0));

    group.bench_function("no_history", |b| {
        b.iter(|| compute_factors(black_box(&current), None, 5))
    });

    group.bench_function("with_history", |b| {
        b.iter(|| compute_factors(black_box(&current), Some(black_box(&previous)), 5))
    });

    group.finish();
}

/// Benchmark the LRU store with more instruments than slots.
fn bench_state_store(c: &mut Criterion) {
    let mut group = c.benchmark_group("state_store");
    let stream = create_stream(1000, 4);

    for capacity in [500usize, 2000].iter() {
        group.throughput(Throughput::Elements(stream.len() as u64));
        group.bench_with_input(
            BenchmarkId::new("lookup_upsert", capacity),
            capacity,
            |b, &capacity| {
                b.iter(|| {
                    let mut store = InstrumentStateStore::new(capacity);
                    for snap in &stream {
                        let key = StateKey::new(&snap.instrument, snap.trading_day);
                        black_box(store.lookup(key));
                        store.upsert(key, PreviousState::from_snapshot(snap));
                    }
                    black_box(store.stats().evictions)
                });
            },
        );
    }

    group.finish();
}

/// Benchmark combine and reduce over many samples.
fn bench_aggregation(c: &mut Criterion) {
    let mut group = c.benchmark_group("aggregation");
    let factors = FactorVector::from_array([0.5; FACTOR_COUNT]);
    let tuples: Vec<AggregationTuple> = (0..100_000u32)
        .map(|i| {
            let time = TradeTime::from_hms(10, (i / 60) % 60, i % 60).unwrap();
            AggregationTuple::from_sample(TimeKey::per_day(20240102, time), &factors)
        })
        .collect();

    group.throughput(Throughput::Elements(tuples.len() as u64));
    group.bench_function("combine_100k", |b| {
        b.iter(|| black_box(combine(tuples.iter().cloned())))
    });
    group.bench_function("reduce_100k", |b| {
        b.iter(|| black_box(reduce_partition(black_box(&tuples))))
    });

    group.finish();
}

/// Benchmark the full single-partition pipeline.
fn bench_pipeline(c: &mut Criterion) {
    let mut group = c.benchmark_group("pipeline");

    for instruments in [100usize, 1000].iter() {
        let lines: Vec<String> = create_stream(*instruments, 50)
            .iter()
            .map(record::to_csv_line)
            .collect();

        group.throughput(Throughput::Elements(lines.len() as u64));
        group.bench_with_input(
            BenchmarkId::new("process_lines", instruments),
            &lines,
            |b, lines| {
                b.iter(|| {
                    let mut pipeline = Pipeline::from_config(AggregatorConfig::default()).unwrap();
                    pipeline.process_lines(lines).unwrap();
                    black_box(pipeline.finish())
                });
            },
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_factor_engine,
    bench_state_store,
    bench_aggregation,
    bench_pipeline,
);

criterion_main!(benches);
