//! Prelude module for convenient imports.
//!
//! # Usage
//!
//! ```ignore
//! use lob_factor_aggregator::prelude::*;
//!
//! let mut pipeline = Pipeline::from_config(AggregatorConfig::default())?;
//! pipeline.process_file("data/20240102.csv")?;
//! let output = pipeline.finish();
//! ```
//!
//! # What's Included
//!
//! ## Core Pipeline
//! - [`Pipeline`] - One partition, processed sequentially
//! - [`AggregatorConfig`] / [`AggregatorBuilder`] - Configuration
//! - [`PipelineOutput`] - Partial tuples and counters
//!
//! ## Factors
//! - [`FactorEngine`] - 20-factor computation
//! - [`FactorVector`] - One snapshot's factors
//!
//! ## Aggregation
//! - [`LocalCombiner`], [`GlobalAggregator`], [`KeyRouter`]
//! - [`AggregationTuple`] / [`TimeKey`] / [`FactorRow`]

// ============================================================================
// Core Pipeline
// ============================================================================

pub use crate::builder::AggregatorBuilder;
pub use crate::config::{AggregatorConfig, RunMetadata, SessionConfig, SessionWindow};
pub use crate::pipeline::{Pipeline, PipelineOutput, PipelineStats};

// ============================================================================
// Data and State
// ============================================================================

pub use crate::error::{FactorError, Result};
pub use crate::state::{DayRolloverTracker, InstrumentStateStore, StateKey};
pub use crate::types::{PreviousState, Snapshot, TradeTime};

// ============================================================================
// Factors
// ============================================================================

pub use crate::features::{FactorConfig, FactorEngine, FactorVector, FACTOR_COUNT};

// ============================================================================
// Aggregation
// ============================================================================

pub use crate::aggregation::{
    combine, reduce_partition, shuffle, AggregationTuple, FactorRow, GlobalAggregator,
    HashRouter, KeyRouter, LocalCombiner, TimeKey, TimeKeyScope,
};

// ============================================================================
// Export and Validation
// ============================================================================

pub use crate::export::{read_partials, write_factor_csv, write_partials, ExportMetadata};
pub use crate::validation::{SnapshotValidator, ValidationResult};

// ============================================================================
// Batch Processing (parallel feature)
// ============================================================================

#[cfg(feature = "parallel")]
pub use crate::batch::{
    BatchConfig, BatchOutput, BatchProcessor, ConsoleProgress, ErrorMode, InputPartition,
    ProgressCallback,
};
