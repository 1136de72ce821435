//! LOB Factor Aggregator
//!
//! Cross-sectional order-book factor aggregation over snapshot streams.
//!
//! # Overview
//!
//! Every level-5 book snapshot yields a vector of 20 microstructure factors
//! (spread, imbalance, depth, pressure, tick-to-tick changes). Factors are
//! averaged across all instruments that traded in the same second, giving
//! one market-wide factor row per time key.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      Factor Aggregator                          │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  record/       - Snapshot CSV parsing                           │
//! │  state/        - Bounded LRU of the previous tick per instrument│
//! │  features/     - 20-factor engine                               │
//! │  aggregation/  - Local combine, key routing, global reduce      │
//! │  pipeline      - One partition, sequentially                    │
//! │  batch         - Partitions in parallel (feature "parallel")    │
//! │  export/       - Factor CSV and partial-tuple files             │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! use lob_factor_aggregator::prelude::*;
//!
//! let mut pipeline = AggregatorBuilder::new().state_capacity(2000).build()?;
//! pipeline.process_file("data/20240102.csv")?;
//!
//! let rows = reduce_partition(&pipeline.finish().tuples);
//! write_factor_csv("out/factors.csv", &rows)?;
//! ```

pub mod aggregation;
pub mod builder;
pub mod config;
pub mod error;
pub mod export;
pub mod features;
pub mod pipeline;
pub mod prelude;
pub mod record;
pub mod state;
pub mod types;
pub mod validation;

#[cfg(feature = "parallel")]
pub mod batch;

// Re-exports - Core types
pub use error::{FactorError, Result};
pub use types::{PreviousState, Snapshot, TradeTime, BOOK_LEVELS};

// Re-exports - Config
pub use builder::AggregatorBuilder;
pub use config::{AggregatorConfig, RunMetadata, SessionConfig, SessionWindow};

// Re-exports - State
pub use state::{DayRolloverTracker, InstrumentStateStore, StateKey};

// Re-exports - Factors
pub use features::{compute_factors, FactorConfig, FactorEngine, FactorVector, FACTOR_COUNT};

// Re-exports - Aggregation
pub use aggregation::{
    combine, reduce_partition, shuffle, AggregationTuple, FactorRow, GlobalAggregator,
    HashRouter, KeyRouter, LocalCombiner, TimeKey, TimeKeyScope,
};

// Re-exports - Pipeline
pub use pipeline::{Pipeline, PipelineOutput, PipelineStats};

// Re-exports - Export
pub use export::{read_partials, write_factor_csv, write_partials, ExportMetadata};

// Re-exports - Validation
pub use validation::{SnapshotValidator, ValidationConfig, ValidationLevel, ValidationResult};

#[cfg(feature = "parallel")]
pub use batch::{BatchConfig, BatchOutput, BatchProcessor, ErrorMode, InputPartition};
