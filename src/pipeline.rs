//! Single-partition factor pipeline.
//!
//! One `Pipeline` is one logical worker. It owns its state store and consumes
//! one partition's snapshots sequentially, in input order.
//!
//! # Architecture
//!
//! ```text
//! CSV line → parse_line → session filter → rollover check ─┐
//!                                                          ↓
//!        InstrumentStateStore.lookup → FactorEngine → upsert
//!                                           ↓
//!                         (timeKey, 1, factors) → LocalCombiner → tuples
//! ```
//!
//! # Error Policy
//!
//! - Malformed lines are counted and skipped; the first few per partition
//!   are logged with `log::warn!`
//! - Out-of-session snapshots are counted and never touch state
//! - I/O errors abort the partition: the pipeline resets, so nothing it
//!   produced for the partition can reach `finish`
//!
//! # Example
//!
//! ```ignore
//! use lob_factor_aggregator::prelude::*;
//!
//! let mut pipeline = AggregatorBuilder::new().state_capacity(2000).build()?;
//! pipeline.process_file("data/20240102.csv")?;
//! let output = pipeline.finish();
//!
//! let rows = reduce_partition(&output.tuples);
//! ```

use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::aggregation::{AggregationTuple, LocalCombiner, TimeKey};
use crate::config::AggregatorConfig;
use crate::error::{FactorError, Result};
use crate::features::{FactorEngine, FactorVector};
use crate::record;
use crate::state::{DayRolloverTracker, DayTransition, InstrumentStateStore, StateKey, StoreStats};
use crate::types::{PreviousState, Snapshot};
use crate::validation::SnapshotValidator;

/// Counters for one partition.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineStats {
    /// Lines read, including headers and blanks
    pub lines_read: u64,
    pub header_lines: u64,
    /// Lines that failed to parse
    pub malformed_records: u64,
    /// Snapshots outside every session window
    pub out_of_session: u64,
    /// Snapshots that produced a factor sample
    pub snapshots_processed: u64,
    /// Processed snapshots that raised a validation warning
    pub snapshots_with_warnings: u64,
    /// Trading-day changes seen per instrument
    pub rollovers: u64,
    /// Tuples handed out by `finish`
    pub tuples_emitted: u64,
    /// State store counters
    pub store: StoreStats,
}

impl PipelineStats {
    /// Add another partition's counters into this one.
    pub fn absorb(&mut self, other: &PipelineStats) {
        self.lines_read += other.lines_read;
        self.header_lines += other.header_lines;
        self.malformed_records += other.malformed_records;
        self.out_of_session += other.out_of_session;
        self.snapshots_processed += other.snapshots_processed;
        self.snapshots_with_warnings += other.snapshots_with_warnings;
        self.rollovers += other.rollovers;
        self.tuples_emitted += other.tuples_emitted;
        self.store.absorb(&other.store);
    }
}

impl fmt::Display for PipelineStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} lines, {} snapshots, {} malformed, {} out of session, {} warnings, \
             {} rollovers, {} tuples, store hit rate {:.1}% ({} evictions)",
            self.lines_read,
            self.snapshots_processed,
            self.malformed_records,
            self.out_of_session,
            self.snapshots_with_warnings,
            self.rollovers,
            self.tuples_emitted,
            self.store.hit_rate() * 100.0,
            self.store.evictions
        )
    }
}

/// Everything a partition contributes to the reduce phase.
#[derive(Debug, Clone, Default)]
pub struct PipelineOutput {
    /// Partial tuples; one per key when local combining is enabled
    pub tuples: Vec<AggregationTuple>,
    pub stats: PipelineStats,
}

impl PipelineOutput {
    /// Total samples across all tuples.
    pub fn sample_count(&self) -> u64 {
        self.tuples.iter().map(|t| t.count).sum()
    }
}

/// Per-partition worker: parse, filter, compute, emit.
pub struct Pipeline {
    config: AggregatorConfig,
    engine: FactorEngine,
    store: InstrumentStateStore,
    rollover: DayRolloverTracker,
    validator: SnapshotValidator,
    combiner: LocalCombiner,
    uncombined: Vec<AggregationTuple>,
    stats: PipelineStats,
}

impl Pipeline {
    /// Create a pipeline from a validated configuration.
    pub fn from_config(config: AggregatorConfig) -> Result<Self> {
        config.validate().map_err(FactorError::InvalidConfig)?;

        Ok(Self {
            engine: FactorEngine::with_config(config.factors),
            store: InstrumentStateStore::new(config.state.capacity),
            rollover: DayRolloverTracker::new(),
            validator: SnapshotValidator::new(),
            combiner: LocalCombiner::new(),
            uncombined: Vec::new(),
            stats: PipelineStats::default(),
            config,
        })
    }

    /// Feed one CSV line.
    ///
    /// Header, blank and malformed lines are counted and skipped. Never fails
    /// for bad input.
    pub fn process_line(&mut self, line: &str) -> Result<()> {
        self.stats.lines_read += 1;

        match record::parse_line(line) {
            Ok(Some(snapshot)) => {
                self.process_snapshot(&snapshot);
                Ok(())
            }
            Ok(None) => {
                self.stats.header_lines += 1;
                Ok(())
            }
            Err(e) if e.is_record_level() => {
                self.record_malformed(&e);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Feed lines in order. A fatal error resets the pipeline.
    pub fn process_lines<I, S>(&mut self, lines: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let result = lines
            .into_iter()
            .try_for_each(|line| self.process_line(line.as_ref()));
        self.reset_on_error(result)
    }

    /// Feed every line of a reader. I/O errors abort with
    /// [`FactorError::Io`] and reset the pipeline; lines that are not UTF-8
    /// count as malformed.
    pub fn process_reader<R: BufRead>(&mut self, reader: R) -> Result<()> {
        let result = self.read_all(reader);
        self.reset_on_error(result)
    }

    fn read_all<R: BufRead>(&mut self, mut reader: R) -> Result<()> {
        let mut buf = Vec::with_capacity(512);
        loop {
            buf.clear();
            if reader.read_until(b'\n', &mut buf)? == 0 {
                break;
            }
            match std::str::from_utf8(&buf) {
                Ok(line) => self.process_line(line)?,
                Err(_) => {
                    self.stats.lines_read += 1;
                    self.record_malformed(&FactorError::malformed("line is not valid UTF-8"));
                }
            }
        }
        Ok(())
    }

    /// Feed every line of a CSV file. Failing to open it also resets the
    /// pipeline.
    pub fn process_file<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let path = path.as_ref();
        let file = match File::open(path) {
            Ok(file) => file,
            Err(e) => return self.reset_on_error(Err(e.into())),
        };
        log::debug!("Processing {}", path.display());
        self.process_reader(BufReader::new(file))
    }

    /// Feed one parsed snapshot.
    ///
    /// Returns the factors computed for it, or `None` when it falls outside
    /// every session window.
    pub fn process_snapshot(&mut self, snapshot: &Snapshot) -> Option<FactorVector> {
        if !self.config.sessions.contains(snapshot.trade_time) {
            self.stats.out_of_session += 1;
            return None;
        }

        if self.validator.validate_snapshot(snapshot).has_warnings() {
            self.stats.snapshots_with_warnings += 1;
        }

        let instrument = snapshot.instrument.as_str();
        if let DayTransition::Rolled { previous_day } =
            self.rollover.observe(instrument, snapshot.trading_day)
        {
            let dropped = self.store.invalidate(instrument);
            self.stats.rollovers += 1;
            log::debug!(
                "{} rolled from {} to {}, dropped {} state entries",
                instrument,
                previous_day,
                snapshot.trading_day,
                dropped
            );
        }

        let key = StateKey::new(instrument, snapshot.trading_day);
        let previous = self.store.lookup(key);
        let factors = self.engine.compute(snapshot, previous.as_ref());
        self.store.upsert(key, PreviousState::from_snapshot(snapshot));

        let time_key = TimeKey::for_snapshot(snapshot, self.config.aggregation.time_key_scope);
        if self.config.aggregation.combine_locally {
            self.combiner.push_sample(time_key, &factors);
        } else {
            self.uncombined
                .push(AggregationTuple::from_sample(time_key, &factors));
        }
        self.stats.snapshots_processed += 1;

        Some(factors)
    }

    /// Hand out the partition's tuples and counters, then reset for the next
    /// partition.
    pub fn finish(&mut self) -> PipelineOutput {
        let mut tuples = self.combiner.drain();
        tuples.append(&mut self.uncombined);

        let mut stats = self.stats;
        stats.tuples_emitted = tuples.len() as u64;
        stats.store = *self.store.stats();

        log::info!("Partition finished: {}", stats);

        self.reset();
        PipelineOutput { tuples, stats }
    }

    /// Discard all state, pending tuples and counters.
    ///
    /// Call between unrelated partitions so no previous tick leaks across.
    pub fn reset(&mut self) {
        self.store.clear();
        self.rollover.clear();
        self.combiner.drain();
        self.uncombined.clear();
        self.stats = PipelineStats::default();
    }

    pub fn config(&self) -> &AggregatorConfig {
        &self.config
    }

    /// Counters so far (store counters included).
    pub fn stats(&self) -> PipelineStats {
        let mut stats = self.stats;
        stats.store = *self.store.stats();
        stats
    }

    /// State store, for inspection.
    pub fn store(&self) -> &InstrumentStateStore {
        &self.store
    }

    /// Rollover tracker, for inspection.
    pub fn rollover(&self) -> &DayRolloverTracker {
        &self.rollover
    }

    /// Drop everything pending when `result` is a fatal error, so a failed
    /// partition contributes no tuples.
    fn reset_on_error(&mut self, result: Result<()>) -> Result<()> {
        if let Err(e) = &result {
            log::warn!(
                "Partition aborted after {} lines, discarding {} pending samples: {}",
                self.stats.lines_read,
                self.stats.snapshots_processed,
                e
            );
            self.reset();
        }
        result
    }

    fn record_malformed(&mut self, error: &FactorError) {
        self.stats.malformed_records += 1;
        let limit = self.config.aggregation.max_logged_malformed as u64;
        if self.stats.malformed_records <= limit {
            log::warn!("Skipping line {}: {}", self.stats.lines_read, error);
            if self.stats.malformed_records == limit {
                log::warn!("Further malformed lines in this partition will only be counted");
            }
        }
    }
}
