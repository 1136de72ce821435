//! Fluent builder for aggregator configuration.
//!
//! # Quick Start
//!
//! ```
//! use lob_factor_aggregator::builder::AggregatorBuilder;
//! use lob_factor_aggregator::aggregation::TimeKeyScope;
//!
//! let pipeline = AggregatorBuilder::new()
//!     .state_capacity(2000)
//!     .time_key_scope(TimeKeyScope::TimeOfDay)
//!     .build()
//!     .unwrap();
//! assert_eq!(pipeline.config().state.capacity, 2000);
//! ```
//!
//! # Defaults
//!
//! | Setting | Default |
//! |---------|---------|
//! | State capacity | 500 entries |
//! | Depth levels | 5 |
//! | Sessions | 09:30-11:30, 13:00-15:00 |
//! | Time key | trading day + time of day |
//! | Reduce partitions | 4 |
//! | Local combine | on |

use crate::aggregation::TimeKeyScope;
use crate::config::{AggregatorConfig, RunMetadata, SessionConfig, SessionWindow};
use crate::error::{FactorError, Result};
use crate::features::FactorConfig;
use crate::pipeline::Pipeline;

/// Fluent builder producing an [`AggregatorConfig`] or a ready [`Pipeline`].
#[derive(Debug, Clone, Default)]
pub struct AggregatorBuilder {
    config: AggregatorConfig,
}

impl AggregatorBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing configuration.
    pub fn from_config(config: AggregatorConfig) -> Self {
        Self { config }
    }

    // =========================================================================
    // State and factors
    // =========================================================================

    /// Maximum (instrument, trading day) entries held per partition.
    pub fn state_capacity(mut self, capacity: usize) -> Self {
        self.config.state.capacity = capacity;
        self
    }

    /// Book levels summed by the depth factors (1..=5).
    pub fn depth_levels(mut self, levels: usize) -> Self {
        self.config.factors = FactorConfig::new(levels);
        self
    }

    // =========================================================================
    // Sessions
    // =========================================================================

    /// Replace all session windows with one inclusive HHMMSS window.
    pub fn session(mut self, start: u32, end: u32) -> Self {
        self.config.sessions = SessionConfig {
            windows: vec![SessionWindow::new(start, end)],
        };
        self
    }

    /// Add an inclusive HHMMSS window to the current set.
    pub fn add_session(mut self, start: u32, end: u32) -> Self {
        self.config.sessions.windows.push(SessionWindow::new(start, end));
        self
    }

    /// Accept snapshots at any time of day.
    pub fn all_day(mut self) -> Self {
        self.config.sessions = SessionConfig::all_day();
        self
    }

    // =========================================================================
    // Aggregation
    // =========================================================================

    pub fn time_key_scope(mut self, scope: TimeKeyScope) -> Self {
        self.config.aggregation.time_key_scope = scope;
        self
    }

    pub fn reduce_partitions(mut self, partitions: usize) -> Self {
        self.config.aggregation.reduce_partitions = partitions;
        self
    }

    /// Pre-aggregate inside each map partition.
    pub fn combine_locally(mut self, enabled: bool) -> Self {
        self.config.aggregation.combine_locally = enabled;
        self
    }

    /// Malformed lines logged individually per partition.
    pub fn max_logged_malformed(mut self, count: usize) -> Self {
        self.config.aggregation.max_logged_malformed = count;
        self
    }

    // =========================================================================
    // Metadata
    // =========================================================================

    /// Name the run, stamping creation time and crate version.
    pub fn run(mut self, name: &str, description: &str) -> Self {
        let mut metadata = RunMetadata::new(name);
        metadata.description = Some(description.to_string());
        self.config.metadata = Some(metadata);
        self
    }

    pub fn with_metadata(mut self, metadata: RunMetadata) -> Self {
        self.config.metadata = Some(metadata);
        self
    }

    // =========================================================================
    // Build
    // =========================================================================

    /// Validate and return the configuration.
    pub fn build_config(self) -> std::result::Result<AggregatorConfig, String> {
        self.config.validate()?;
        Ok(self.config)
    }

    /// Validate and return a ready pipeline.
    pub fn build(self) -> Result<Pipeline> {
        let config = self.build_config().map_err(FactorError::InvalidConfig)?;
        Pipeline::from_config(config)
    }

    /// Human-readable summary of the current settings.
    pub fn summary(&self) -> String {
        let sessions = self
            .config
            .sessions
            .windows
            .iter()
            .map(|w| format!("{:06}-{:06}", w.start, w.end))
            .collect::<Vec<_>>()
            .join(", ");

        let scope = match self.config.aggregation.time_key_scope {
            TimeKeyScope::TradingDay => "trading day + time",
            TimeKeyScope::TimeOfDay => "time of day",
        };

        format!(
            "AggregatorBuilder Summary:\n\
             - State capacity: {}\n\
             - Depth levels: {}\n\
             - Sessions: {}\n\
             - Time key: {}\n\
             - Reduce partitions: {}\n\
             - Local combine: {}",
            self.config.state.capacity,
            self.config.factors.depth_levels,
            sessions,
            scope,
            self.config.aggregation.reduce_partitions,
            self.config.aggregation.combine_locally
        )
    }
}
