//! Parallel batch processing: map, shuffle, reduce.
//!
//! Each input partition (a snapshot file or an in-memory set of lines) is
//! processed by its own [`Pipeline`] on a local rayon pool, so partitions
//! share no mutable state. Their tuples are then routed by time key into
//! reduce buckets, and the buckets are averaged in parallel.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                        BatchProcessor                            │
//! │                                                                  │
//! │  map (rayon)       Partition 1     Partition 2     Partition N   │
//! │                    ┌─────────┐     ┌─────────┐     ┌─────────┐   │
//! │                    │Pipeline │     │Pipeline │     │Pipeline │   │
//! │                    └────┬────┘     └────┬────┘     └────┬────┘   │
//! │                         └───────────────┼───────────────┘        │
//! │  shuffle                         KeyRouter                       │
//! │                    ┌────────────────────┼───────────────┐        │
//! │  reduce (rayon)  Bucket 0          Bucket 1         Bucket R-1   │
//! │                    └────────────────────┼───────────────┘        │
//! │                                         ▼                        │
//! │                           BatchOutput (rows sorted by key)       │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Error Modes
//!
//! A partition either contributes all of its tuples or none of them. With
//! [`ErrorMode::FailFast`] the first failed partition fails the batch; with
//! [`ErrorMode::CollectErrors`] failed partitions are reported in
//! [`BatchOutput::errors`] and the rows are built from the rest.
//!
//! # Example
//!
//! ```ignore
//! use lob_factor_aggregator::prelude::*;
//!
//! let batch_config = BatchConfig::new()
//!     .with_threads(8)
//!     .with_error_mode(ErrorMode::CollectErrors);
//!
//! let processor = BatchProcessor::new(AggregatorConfig::default(), batch_config);
//! let output = processor.process_files(&day_files)?;
//!
//! println!("{} rows from {} partitions", output.rows.len(), output.successful_count());
//! ```

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use rayon::prelude::*;

use crate::aggregation::{
    reduce_partition, shuffle, AggregationTuple, FactorRow, HashRouter, KeyRouter,
};
use crate::config::AggregatorConfig;
use crate::error::{FactorError, Result};
use crate::pipeline::{Pipeline, PipelineStats};

/// Map-phase outcome of one partition: its counters and tuples, or why it
/// was dropped.
type MapOutcome = std::result::Result<(PartitionResult, Vec<AggregationTuple>), PartitionError>;

// ============================================================================
// Configuration
// ============================================================================

/// How the processor reacts to a failed partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorMode {
    /// Fail the whole batch on the first failed partition (default).
    #[default]
    FailFast,

    /// Drop failed partitions, report them, and reduce the rest.
    CollectErrors,
}

/// Thread pool and error handling settings.
///
/// # Example
///
/// ```
/// use lob_factor_aggregator::batch::{BatchConfig, ErrorMode};
///
/// let config = BatchConfig::new()
///     .with_threads(4)
///     .with_error_mode(ErrorMode::CollectErrors);
/// assert_eq!(config.effective_threads(), 4);
/// ```
#[derive(Debug, Clone, Default)]
pub struct BatchConfig {
    /// Worker threads; `None` uses rayon's default (typically num_cpus).
    pub num_threads: Option<usize>,

    pub error_mode: ErrorMode,

    /// Invoke the progress callback as partitions start.
    pub report_progress: bool,

    /// Stack size per worker thread in bytes.
    pub stack_size: Option<usize>,
}

impl BatchConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use exactly `threads` workers.
    ///
    /// # Panics
    ///
    /// Panics if `threads` is 0.
    pub fn with_threads(mut self, threads: usize) -> Self {
        assert!(threads > 0, "Thread count must be > 0");
        self.num_threads = Some(threads);
        self
    }

    pub fn with_error_mode(mut self, mode: ErrorMode) -> Self {
        self.error_mode = mode;
        self
    }

    pub fn with_progress(mut self, report: bool) -> Self {
        self.report_progress = report;
        self
    }

    pub fn with_stack_size(mut self, size: usize) -> Self {
        self.stack_size = Some(size);
        self
    }

    /// Configured threads or rayon's default.
    pub fn effective_threads(&self) -> usize {
        self.num_threads.unwrap_or_else(rayon::current_num_threads)
    }
}

// ============================================================================
// Inputs and results
// ============================================================================

/// One unit of map work.
#[derive(Debug, Clone)]
pub enum InputPartition {
    /// A snapshot CSV file.
    File(PathBuf),

    /// Lines already in memory.
    Lines { name: String, lines: Vec<String> },
}

impl InputPartition {
    pub fn file<P: AsRef<Path>>(path: P) -> Self {
        InputPartition::File(path.as_ref().to_path_buf())
    }

    pub fn lines<I, S>(name: impl Into<String>, lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        InputPartition::Lines {
            name: name.into(),
            lines: lines.into_iter().map(Into::into).collect(),
        }
    }

    /// Display name: the file path, or the name given to a line set.
    pub fn name(&self) -> String {
        match self {
            InputPartition::File(path) => path.to_string_lossy().into_owned(),
            InputPartition::Lines { name, .. } => name.clone(),
        }
    }
}

/// Map-phase result for one successful partition.
#[derive(Debug, Clone)]
pub struct PartitionResult {
    pub name: String,

    /// Counters reported by the partition's pipeline.
    pub stats: PipelineStats,

    pub elapsed: Duration,

    /// Rayon worker index that ran the partition.
    pub thread_id: usize,
}

/// A partition whose tuples were discarded.
#[derive(Debug, Clone)]
pub struct PartitionError {
    pub name: String,
    pub error: String,
}

/// Everything a batch run produces.
#[derive(Debug)]
pub struct BatchOutput {
    /// Averaged factors, one row per time key, sorted by key.
    pub rows: Vec<FactorRow>,

    /// Successful partitions, in input order.
    pub partitions: Vec<PartitionResult>,

    /// Failed partitions (only populated with `ErrorMode::CollectErrors`).
    pub errors: Vec<PartitionError>,

    /// Counters summed over successful partitions.
    pub stats: PipelineStats,

    /// Wall clock time of the whole run.
    pub elapsed: Duration,

    pub threads_used: usize,
}

impl BatchOutput {
    pub fn successful_count(&self) -> usize {
        self.partitions.len()
    }

    pub fn failed_count(&self) -> usize {
        self.errors.len()
    }

    pub fn all_successful(&self) -> bool {
        self.errors.is_empty()
    }

    /// Samples averaged into the rows.
    pub fn total_samples(&self) -> u64 {
        self.rows.iter().map(|row| row.sample_count).sum()
    }

    /// Sum of per-partition map times over wall clock time.
    pub fn speedup_factor(&self) -> f64 {
        let sequential: Duration = self.partitions.iter().map(|p| p.elapsed).sum();
        sequential.as_secs_f64() / self.elapsed.as_secs_f64()
    }

    pub fn iter_errors(&self) -> impl Iterator<Item = &PartitionError> {
        self.errors.iter()
    }
}

// ============================================================================
// Progress Reporting
// ============================================================================

/// Progress snapshot handed to callbacks.
#[derive(Debug, Clone)]
pub struct ProgressInfo {
    pub current_partition: String,

    /// 0-based index of the partition starting now.
    pub current_index: usize,

    pub total_partitions: usize,
    pub completed: usize,
    pub failed: usize,
    pub elapsed: Duration,
}

impl ProgressInfo {
    /// Completion percentage (0.0 to 100.0).
    pub fn percent_complete(&self) -> f64 {
        if self.total_partitions == 0 {
            100.0
        } else {
            (self.completed + self.failed) as f64 / self.total_partitions as f64 * 100.0
        }
    }

    /// Remaining time extrapolated from the average so far.
    pub fn estimated_remaining(&self) -> Option<Duration> {
        let done = self.completed + self.failed;
        if done == 0 {
            return None;
        }
        let remaining = self.total_partitions.saturating_sub(done);
        let avg = self.elapsed.as_secs_f64() / done as f64;
        Some(Duration::from_secs_f64(avg * remaining as f64))
    }
}

/// Receives progress updates during a batch run.
pub trait ProgressCallback: Send + Sync {
    /// Called as a partition starts.
    fn on_progress(&self, info: &ProgressInfo);

    /// Called once the rows are ready.
    fn on_complete(&self, output: &BatchOutput);
}

/// Progress printed to stdout.
#[derive(Debug, Default)]
pub struct ConsoleProgress {
    pub verbose: bool,
}

impl ConsoleProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn verbose(mut self) -> Self {
        self.verbose = true;
        self
    }
}

impl ProgressCallback for ConsoleProgress {
    fn on_progress(&self, info: &ProgressInfo) {
        if self.verbose {
            println!(
                "[{:3}/{:3}] Processing: {} ({:.1}% complete)",
                info.current_index + 1,
                info.total_partitions,
                info.current_partition,
                info.percent_complete()
            );
        } else {
            print!(
                "\r[{:3}/{:3}] {:.1}%",
                info.completed + info.failed,
                info.total_partitions,
                info.percent_complete()
            );
            use std::io::Write;
            std::io::stdout().flush().ok();
        }
    }

    fn on_complete(&self, output: &BatchOutput) {
        println!();
        println!("═══════════════════════════════════════════════════════════════");
        println!("Factor Aggregation Complete");
        println!("═══════════════════════════════════════════════════════════════");
        println!("  Partitions processed: {}", output.successful_count());
        println!("  Partitions failed:    {}", output.failed_count());
        println!("  Snapshots:            {}", output.stats.snapshots_processed);
        println!("  Malformed lines:      {}", output.stats.malformed_records);
        println!("  Output rows:          {}", output.rows.len());
        println!("  Total time:           {:?}", output.elapsed);
        println!("  Speedup:              {:.2}x", output.speedup_factor());
        println!("═══════════════════════════════════════════════════════════════");
    }
}

// ============================================================================
// Batch Processor
// ============================================================================

/// Partition-parallel factor aggregation.
///
/// Every partition gets a fresh [`Pipeline`] built from the shared
/// configuration, so no previous tick ever crosses a partition boundary.
/// The result is independent of thread count and scheduling up to
/// floating-point summation order.
pub struct BatchProcessor {
    config: Arc<AggregatorConfig>,
    batch_config: BatchConfig,
    router: Arc<dyn KeyRouter>,
    progress_callback: Option<Arc<dyn ProgressCallback>>,
}

impl BatchProcessor {
    /// Create a processor routing keys with [`HashRouter`].
    pub fn new(config: AggregatorConfig, batch_config: BatchConfig) -> Self {
        Self {
            config: Arc::new(config),
            batch_config,
            router: Arc::new(HashRouter),
            progress_callback: None,
        }
    }

    /// Processor with the default batch configuration.
    pub fn with_aggregator_config(config: AggregatorConfig) -> Self {
        Self::new(config, BatchConfig::default())
    }

    /// Replace the key router.
    pub fn with_router<R: KeyRouter + 'static>(mut self, router: R) -> Self {
        self.router = Arc::new(router);
        self
    }

    pub fn with_progress_callback(mut self, callback: Box<dyn ProgressCallback>) -> Self {
        self.progress_callback = Some(Arc::from(callback));
        self
    }

    pub fn batch_config(&self) -> &BatchConfig {
        &self.batch_config
    }

    pub fn config(&self) -> &AggregatorConfig {
        &self.config
    }

    /// Process each file as its own partition.
    pub fn process_files<P: AsRef<Path>>(&self, files: &[P]) -> Result<BatchOutput> {
        let partitions: Vec<InputPartition> = files.iter().map(InputPartition::file).collect();
        self.process_partitions(&partitions)
    }

    /// Run map, shuffle and reduce over `partitions`.
    ///
    /// # Errors
    ///
    /// - [`FactorError::InvalidConfig`] if the configuration does not validate
    /// - [`FactorError::Generic`] if the thread pool cannot be built, or a
    ///   partition fails under [`ErrorMode::FailFast`]
    pub fn process_partitions(&self, partitions: &[InputPartition]) -> Result<BatchOutput> {
        self.config.validate().map_err(FactorError::InvalidConfig)?;

        let start = Instant::now();
        let total_partitions = partitions.len();
        let threads_used = self.batch_config.effective_threads();

        let completed = AtomicUsize::new(0);
        let failed = AtomicUsize::new(0);

        // Local pool: build_global() only works once per process.
        let mut pool_builder = rayon::ThreadPoolBuilder::new().num_threads(threads_used);
        if let Some(stack_size) = self.batch_config.stack_size {
            pool_builder = pool_builder.stack_size(stack_size);
        }
        let pool = pool_builder
            .build()
            .map_err(|e| FactorError::generic(format!("Failed to create thread pool: {}", e)))?;

        // Map phase
        let mapped: Vec<MapOutcome> = pool.install(|| {
            partitions
                .par_iter()
                .enumerate()
                .map(|(index, partition)| {
                    if self.batch_config.report_progress {
                        if let Some(ref callback) = self.progress_callback {
                            callback.on_progress(&ProgressInfo {
                                current_partition: partition.name(),
                                current_index: index,
                                total_partitions,
                                completed: completed.load(Ordering::Relaxed),
                                failed: failed.load(Ordering::Relaxed),
                                elapsed: start.elapsed(),
                            });
                        }
                    }

                    let result = self.map_partition(partition);
                    match &result {
                        Ok(_) => completed.fetch_add(1, Ordering::Relaxed),
                        Err(_) => failed.fetch_add(1, Ordering::Relaxed),
                    };
                    result
                })
                .collect()
        });

        let mut results = Vec::with_capacity(mapped.len());
        let mut errors = Vec::new();
        let mut tuples = Vec::new();
        let mut stats = PipelineStats::default();

        for outcome in mapped {
            match outcome {
                Ok((result, mut partition_tuples)) => {
                    stats.absorb(&result.stats);
                    tuples.append(&mut partition_tuples);
                    results.push(result);
                }
                Err(partition_error) => {
                    if self.batch_config.error_mode == ErrorMode::FailFast {
                        return Err(FactorError::generic(format!(
                            "Failed to process {}: {}",
                            partition_error.name, partition_error.error
                        )));
                    }
                    log::warn!(
                        "Dropping partition {}: {}",
                        partition_error.name,
                        partition_error.error
                    );
                    errors.push(partition_error);
                }
            }
        }

        // Shuffle, then reduce each bucket independently.
        let reduce_partitions = self.config.aggregation.reduce_partitions;
        let buckets = shuffle(&*self.router, tuples, reduce_partitions);
        let reduced: Vec<Vec<FactorRow>> = pool.install(|| {
            buckets
                .par_iter()
                .map(|bucket| reduce_partition(bucket))
                .collect()
        });

        let mut rows: Vec<FactorRow> = reduced.into_iter().flatten().collect();
        rows.sort_by_key(|row| row.key);

        let output = BatchOutput {
            rows,
            partitions: results,
            errors,
            stats,
            elapsed: start.elapsed(),
            threads_used,
        };

        log::info!(
            "Batch finished: {} partitions ({} failed), {} rows in {:?} on {} threads",
            output.successful_count(),
            output.failed_count(),
            output.rows.len(),
            output.elapsed,
            threads_used
        );

        if let Some(ref callback) = self.progress_callback {
            callback.on_complete(&output);
        }

        Ok(output)
    }

    /// Run one partition through a fresh pipeline (called from the pool).
    fn map_partition(&self, partition: &InputPartition) -> MapOutcome {
        let start = Instant::now();
        let name = partition.name();
        let fail = |e: FactorError| PartitionError {
            name: name.clone(),
            error: e.to_string(),
        };

        let mut pipeline = Pipeline::from_config((*self.config).clone()).map_err(&fail)?;
        match partition {
            InputPartition::File(path) => pipeline.process_file(path).map_err(&fail)?,
            InputPartition::Lines { lines, .. } => pipeline.process_lines(lines).map_err(&fail)?,
        }
        let output = pipeline.finish();

        Ok((
            PartitionResult {
                name: name.clone(),
                stats: output.stats,
                elapsed: start.elapsed(),
                thread_id: rayon::current_thread_index().unwrap_or(0),
            },
            output.tuples,
        ))
    }
}

// ============================================================================
// Convenience Functions
// ============================================================================

/// Process files with the default batch configuration.
pub fn process_files_parallel<P: AsRef<Path>>(
    config: &AggregatorConfig,
    files: &[P],
) -> Result<BatchOutput> {
    BatchProcessor::with_aggregator_config(config.clone()).process_files(files)
}

/// Process files on exactly `threads` workers.
pub fn process_files_with_threads<P: AsRef<Path>>(
    config: &AggregatorConfig,
    files: &[P],
    threads: usize,
) -> Result<BatchOutput> {
    let batch_config = BatchConfig::new().with_threads(threads);
    BatchProcessor::new(config.clone(), batch_config).process_files(files)
}

// ============================================================================
// Tests
// ============================================================================
