//! End-to-end pipeline tests: CSV lines in, averaged factor rows out.

use std::io::{self, BufReader, Read};

use lob_factor_aggregator::prelude::*;
use lob_factor_aggregator::record;
use tempfile::tempdir;

/// All five levels at bid 100 x 200, ask `ask` x 100.
fn uniform(code: &str, day: u32, time: u32, ask: i64) -> Snapshot {
    let t = TradeTime::from_hhmmss(time).unwrap();
    let mut snap = Snapshot::new(day, t, code);
    for level in 1..=5 {
        snap = snap.with_level(level, 100, 200, ask, 100);
    }
    snap
}

fn lines(snaps: &[Snapshot]) -> Vec<String> {
    std::iter::once(record::csv_header().to_string())
        .chain(snaps.iter().map(record::to_csv_line))
        .collect()
}

#[test]
fn test_reference_snapshot_end_to_end() {
    let mut pipeline = Pipeline::from_config(AggregatorConfig::default()).unwrap();
    pipeline
        .process_lines(lines(&[
            uniform("600000", 20240102, 93003, 101),
            uniform("600000", 20240102, 93003, 101),
        ]))
        .unwrap();

    let output = pipeline.finish();
    assert_eq!(output.stats.snapshots_processed, 2);
    assert_eq!(output.stats.header_lines, 1);

    let rows = reduce_partition(&output.tuples);
    assert_eq!(rows.len(), 1);

    let row = &rows[0];
    assert_eq!(row.key.to_string(), "20240102_093003");
    assert_eq!(row.sample_count, 2);
    assert_eq!(row.means.factor(1), 1.0);
    assert!((row.means.factor(4) - 0.333333).abs() < 1e-6);
    // Second tick sees the first: same prices, so no change
    assert_eq!(row.means.factor(17), 0.0);
    assert_eq!(row.means.factor(18), 0.0);
}

#[test]
fn test_cross_sectional_average() {
    let mut pipeline = AggregatorBuilder::new().build().unwrap();
    pipeline.process_snapshot(&uniform("600000", 20240102, 100000, 101));
    pipeline.process_snapshot(&uniform("600001", 20240102, 100000, 103));

    let rows = reduce_partition(&pipeline.finish().tuples);
    assert_eq!(rows.len(), 1);
    // Spreads 1 and 3
    assert!((rows[0].means.factor(1) - 2.0).abs() < 1e-12);
}

#[test]
fn test_session_boundaries_inclusive() {
    let mut pipeline = Pipeline::from_config(AggregatorConfig::default()).unwrap();
    for time in [92959, 93000, 113000, 113001, 125959, 130000, 150000, 150001] {
        pipeline.process_snapshot(&uniform("600000", 20240102, time, 101));
    }

    let output = pipeline.finish();
    assert_eq!(output.stats.snapshots_processed, 4);
    assert_eq!(output.stats.out_of_session, 4);

    let keys: Vec<String> = reduce_partition(&output.tuples)
        .iter()
        .map(|r| r.key.to_string())
        .collect();
    assert_eq!(
        keys,
        vec![
            "20240102_093000",
            "20240102_113000",
            "20240102_130000",
            "20240102_150000"
        ]
    );
}

#[test]
fn test_malformed_lines_never_reach_aggregation() {
    let mut input = lines(&[uniform("600000", 20240102, 93003, 101)]);
    input.push("20240102,93006,0,,600000,not,enough".to_string());
    input.push(record::to_csv_line(&uniform("600000", 20240102, 93009, 101)).replacen("101", "x", 1));

    let mut pipeline = Pipeline::from_config(AggregatorConfig::default()).unwrap();
    pipeline.process_lines(&input).unwrap();
    let output = pipeline.finish();

    assert_eq!(output.stats.malformed_records, 2);
    assert_eq!(output.sample_count(), 1);
}

#[test]
fn test_history_factors_across_ticks() {
    let mut pipeline = Pipeline::from_config(AggregatorConfig::default()).unwrap();
    let first = pipeline
        .process_snapshot(&uniform("600000", 20240102, 93003, 101))
        .unwrap();
    let second = pipeline
        .process_snapshot(&uniform("600000", 20240102, 93006, 105))
        .unwrap();

    for id in 17..=19 {
        assert_eq!(first.factor(id), 0.0);
    }
    assert_eq!(second.factor(17), 4.0);
    assert_eq!(second.factor(18), 2.0);
    // Volumes unchanged, so the depth ratio did not move
    assert_eq!(second.factor(19), 0.0);
}

#[test]
fn test_every_factor_finite_on_empty_book() {
    let t = TradeTime::from_hhmmss(93003).unwrap();
    let empty = Snapshot::new(20240102, t, "600000");

    let mut pipeline = Pipeline::from_config(AggregatorConfig::default()).unwrap();
    let factors = pipeline.process_snapshot(&empty).unwrap();
    assert!(factors.is_finite());
    assert_eq!(pipeline.stats().snapshots_with_warnings, 1);
}

#[test]
fn test_file_to_csv() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("20240102.csv");
    let output = dir.path().join("factors.csv");

    std::fs::write(
        &input,
        lines(&[
            uniform("600000", 20240102, 93003, 101),
            uniform("600001", 20240102, 93003, 103),
        ])
        .join("\n"),
    )
    .unwrap();

    let mut pipeline = AggregatorBuilder::new().build().unwrap();
    pipeline.process_file(&input).unwrap();
    let rows = reduce_partition(&pipeline.finish().tuples);
    write_factor_csv(&output, &rows).unwrap();

    let text = std::fs::read_to_string(&output).unwrap();
    let mut out_lines = text.lines();
    assert_eq!(out_lines.next().unwrap(), FactorRow::csv_header());
    let row: Vec<&str> = out_lines.next().unwrap().split(',').collect();
    assert_eq!(row.len(), FACTOR_COUNT + 1);
    assert_eq!(row[0], "20240102_093003");
    assert_eq!(row[1], "2.000000");
}

#[test]
fn test_missing_file_is_fatal() {
    let mut pipeline = Pipeline::from_config(AggregatorConfig::default()).unwrap();
    let err = pipeline.process_file("/nonexistent/20240102.csv").unwrap_err();
    assert!(matches!(err, FactorError::Io(_)));
}

/// Serves `data`, then fails every further read.
struct FailingReader {
    data: io::Cursor<Vec<u8>>,
}

impl Read for FailingReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.data.read(buf)? {
            0 => Err(io::Error::new(io::ErrorKind::Other, "disk gone")),
            n => Ok(n),
        }
    }
}

#[test]
fn test_read_failure_discards_partition() {
    let mut text = lines(&[
        uniform("600000", 20240102, 93003, 101),
        uniform("600001", 20240102, 93003, 101),
    ])
    .join("\n");
    text.push('\n');

    let mut pipeline = Pipeline::from_config(AggregatorConfig::default()).unwrap();
    let reader = BufReader::new(FailingReader {
        data: io::Cursor::new(text.into_bytes()),
    });
    let err = pipeline.process_reader(reader).unwrap_err();
    assert!(matches!(err, FactorError::Io(_)));
    assert!(pipeline.store().is_empty());
    assert_eq!(pipeline.stats(), PipelineStats::default());

    pipeline.process_snapshot(&uniform("600000", 20240102, 93006, 101));
    let output = pipeline.finish();
    assert_eq!(output.sample_count(), 1);
    assert_eq!(output.stats.snapshots_processed, 1);
}

#[test]
fn test_extreme_prices_parse_and_stay_finite() {
    let t = TradeTime::from_hhmmss(93003).unwrap();
    let extreme = Snapshot::new(20240102, t, "600000").with_level(1, -2, 10, i64::MAX, 10);
    let line = record::to_csv_line(&extreme);
    let parsed = record::parse_line(&line).unwrap().unwrap();
    assert_eq!(parsed.best_ask(), i64::MAX);

    let mut pipeline = Pipeline::from_config(AggregatorConfig::default()).unwrap();
    pipeline.process_lines([line.as_str()]).unwrap();
    let later = Snapshot::new(20240102, TradeTime::from_hhmmss(93006).unwrap(), "600000")
        .with_level(1, i64::MIN, 10, i64::MIN, 10);
    let factors = pipeline.process_snapshot(&later).unwrap();
    assert!(factors.is_finite());

    let output = pipeline.finish();
    assert_eq!(output.sample_count(), 2);
    let rows = reduce_partition(&output.tuples);
    assert!(rows.iter().all(|row| row.means.is_finite()));
}
