//! Output writers.
//!
//! - **Factor CSV**: one header line (`tradeTime,alpha_1,...,alpha_20`) and
//!   one row per time key, values at six decimals
//! - **Partial tuples**: intermediate `key\tcount|s1,...,s20` lines that a
//!   later run can read back and reduce
//! - **Metadata**: a JSON sidecar describing the run
//!
//! Every file is written to a temporary sibling and renamed into place, so a
//! failed write never leaves a truncated final file.
//!
//! # Example
//!
//! ```ignore
//! use lob_factor_aggregator::export::{write_factor_csv, ExportMetadata};
//!
//! let output = processor.process_files(&files)?;
//! write_factor_csv("out/factors.csv", &output.rows)?;
//! ExportMetadata::from_rows(&output.rows).write("out/factors.json")?;
//! ```

use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::aggregation::{AggregationTuple, FactorRow, TimeKeyScope};
use crate::error::{FactorError, Result};
use crate::features::FACTOR_COUNT;

/// Write averaged rows as CSV. Rows are written in key order whatever order
/// they arrive in.
pub fn write_factor_csv<P: AsRef<Path>>(path: P, rows: &[FactorRow]) -> Result<()> {
    let mut sorted: Vec<&FactorRow> = rows.iter().collect();
    sorted.sort_by_key(|row| row.key);

    write_atomically(path.as_ref(), |out| {
        writeln!(out, "{}", FactorRow::csv_header())?;
        for row in &sorted {
            writeln!(out, "{}", row)?;
        }
        Ok(())
    })?;

    log::info!("Wrote {} factor rows to {}", rows.len(), path.as_ref().display());
    Ok(())
}

/// Write partial tuples, one encoded tuple per line.
pub fn write_partials<P: AsRef<Path>>(path: P, tuples: &[AggregationTuple]) -> Result<()> {
    write_atomically(path.as_ref(), |out| {
        for tuple in tuples {
            writeln!(out, "{}", tuple.encode())?;
        }
        Ok(())
    })
}

/// Read a partial-tuple file written by [`write_partials`].
///
/// Blank lines are skipped. Any other undecodable line fails the read with
/// its 1-based line number, since a partial file is produced by this crate
/// and damage means the file cannot be trusted.
pub fn read_partials<P: AsRef<Path>>(path: P) -> Result<Vec<AggregationTuple>> {
    let reader = BufReader::new(File::open(path.as_ref())?);
    let mut tuples = Vec::new();

    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let tuple = AggregationTuple::decode(&line).map_err(|e| {
            FactorError::generic(format!(
                "{} line {}: {}",
                path.as_ref().display(),
                idx + 1,
                e
            ))
        })?;
        tuples.push(tuple);
    }

    Ok(tuples)
}

/// Run-level description stored next to the factor CSV.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportMetadata {
    /// Output rows (distinct time keys)
    pub rows: usize,

    /// Samples averaged across all rows
    pub samples: u64,

    /// Factors per row
    pub factors: usize,

    /// Scope of the keys, when any row exists
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_key_scope: Option<TimeKeyScope>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_key: Option<String>,

    /// Export timestamp
    pub export_timestamp: String,
}

impl ExportMetadata {
    pub fn from_rows(rows: &[FactorRow]) -> Self {
        let first = rows.iter().map(|r| r.key).min();
        let last = rows.iter().map(|r| r.key).max();

        Self {
            rows: rows.len(),
            samples: rows.iter().map(|r| r.sample_count).sum(),
            factors: FACTOR_COUNT,
            time_key_scope: first.map(|k| k.scope()),
            first_key: first.map(|k| k.to_string()),
            last_key: last.map(|k| k.to_string()),
            export_timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// Write as pretty JSON.
    pub fn write<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        write_atomically(path.as_ref(), |out| {
            serde_json::to_writer_pretty(&mut *out, self)
                .map_err(|e| FactorError::generic(format!("Failed to write metadata: {e}")))?;
            writeln!(out)?;
            Ok(())
        })
    }

    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        serde_json::from_reader(BufReader::new(file))
            .map_err(|e| FactorError::generic(format!("Failed to read metadata: {e}")))
    }
}

/// Write through `fill` into `<path>.tmp`, then rename over `path`.
fn write_atomically<F>(path: &Path, fill: F) -> Result<()>
where
    F: FnOnce(&mut BufWriter<File>) -> Result<()>,
{
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let tmp = temp_sibling(path);
    let written = File::create(&tmp)
        .map_err(FactorError::from)
        .and_then(|file| {
            let mut out = BufWriter::new(file);
            fill(&mut out)?;
            out.flush()?;
            Ok(())
        });

    match written {
        Ok(()) => {
            fs::rename(&tmp, path)?;
            Ok(())
        }
        Err(e) => {
            let _ = fs::remove_file(&tmp);
            Err(e)
        }
    }
}

fn temp_sibling(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregation::{reduce_partition, TimeKey};
    use crate::features::FactorVector;
    use crate::types::TradeTime;
    use tempfile::tempdir;

    fn key(hhmmss: u32) -> TimeKey {
        TimeKey::per_day(20240102, TradeTime::from_hhmmss(hhmmss).unwrap())
    }

    fn sample(k: TimeKey, value: f64) -> AggregationTuple {
        AggregationTuple::from_sample(k, &FactorVector::from_array([value; FACTOR_COUNT]))
    }

    #[test]
    fn test_factor_csv_layout() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("factors.csv");

        let mut rows = reduce_partition(&[
            sample(key(93006), 0.5),
            sample(key(93003), 1.0),
            sample(key(93003), 3.0),
        ]);
        rows.reverse();
        write_factor_csv(&path, &rows).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("tradeTime,alpha_1,"));
        assert!(lines[0].ends_with(",alpha_20"));
        assert!(lines[1].starts_with("20240102_093003,2.000000,"));
        assert!(lines[2].starts_with("20240102_093006,0.500000,"));
        assert_eq!(lines[1].split(',').count(), FACTOR_COUNT + 1);

        assert!(!dir.path().join("factors.csv.tmp").exists());
    }

    #[test]
    fn test_creates_parent_dirs() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("out.csv");
        write_factor_csv(&path, &[]).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().count(), 1);
    }

    #[test]
    fn test_partials_reload_and_reduce() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("part-00000.txt");

        let tuples = vec![sample(key(93003), 1.0), sample(key(93003), 3.0)];
        write_partials(&path, &tuples).unwrap();
        let loaded = read_partials(&path).unwrap();

        assert_eq!(loaded.len(), 2);
        let rows = reduce_partition(&loaded);
        assert_eq!(rows.len(), 1);
        assert!((rows[0].means.factor(7) - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_read_partials_reports_line() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.txt");
        fs::write(&path, "20240102_093003\t1|1.0\n").unwrap();

        let err = read_partials(&path).unwrap_err();
        assert!(err.to_string().contains("line 1"));
    }

    #[test]
    fn test_read_missing_partials() {
        let err = read_partials("/nonexistent/partials.txt").unwrap_err();
        assert!(matches!(err, FactorError::Io(_)));
    }

    #[test]
    fn test_metadata_sidecar() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("factors.json");

        let rows = reduce_partition(&[sample(key(93003), 1.0), sample(key(93006), 2.0)]);
        let meta = ExportMetadata::from_rows(&rows);
        assert_eq!(meta.rows, 2);
        assert_eq!(meta.samples, 2);
        assert_eq!(meta.first_key.as_deref(), Some("20240102_093003"));
        assert_eq!(meta.time_key_scope, Some(TimeKeyScope::TradingDay));

        meta.write(&path).unwrap();
        assert_eq!(ExportMetadata::read(&path).unwrap(), meta);
    }
}
