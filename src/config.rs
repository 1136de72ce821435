//! Aggregator configuration management.
//!
//! One serializable struct covers every stage of the pipeline so a run can be
//! reproduced from a single TOML or JSON file.
//!
//! # Example
//!
//! ```ignore
//! use lob_factor_aggregator::config::AggregatorConfig;
//!
//! let config = AggregatorConfig::default().with_state_capacity(2000);
//! config.save_toml("factors.toml")?;
//!
//! let loaded = AggregatorConfig::load_toml("factors.toml")?;
//! let pipeline = Pipeline::from_config(&loaded)?;
//! ```

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::aggregation::TimeKeyScope;
use crate::features::FactorConfig;
use crate::state::DEFAULT_STATE_CAPACITY;
use crate::types::TradeTime;

/// Unified aggregator configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatorConfig {
    /// Per-instrument state store
    pub state: StateConfig,

    /// Factor engine
    pub factors: FactorConfig,

    /// Trading-session filter
    pub sessions: SessionConfig,

    /// Keying, partitioning and combining
    pub aggregation: AggregationConfig,

    /// Run metadata (optional)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<RunMetadata>,
}

/// State store configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateConfig {
    /// Maximum (instrument, trading day) entries kept per partition
    pub capacity: usize,
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_STATE_CAPACITY,
        }
    }
}

/// One inclusive HHMMSS window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionWindow {
    pub start: u32,
    pub end: u32,
}

impl SessionWindow {
    pub fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    #[inline]
    pub fn contains(&self, time: TradeTime) -> bool {
        (self.start..=self.end).contains(&time.hhmmss())
    }

    fn validate(&self) -> Result<(), String> {
        for bound in [self.start, self.end] {
            TradeTime::from_hhmmss(bound)
                .map_err(|e| format!("session bound {}: {}", bound, e))?;
        }
        if self.start > self.end {
            return Err(format!(
                "session window starts after it ends ({:06} > {:06})",
                self.start, self.end
            ));
        }
        Ok(())
    }
}

/// Trading sessions; snapshots outside every window are discarded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    pub windows: Vec<SessionWindow>,
}

impl SessionConfig {
    /// Accept every time of day.
    pub fn all_day() -> Self {
        Self {
            windows: vec![SessionWindow::new(0, 235959)],
        }
    }

    /// Whether `time` falls in any window.
    #[inline]
    pub fn contains(&self, time: TradeTime) -> bool {
        self.windows.iter().any(|w| w.contains(time))
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.windows.is_empty() {
            return Err("at least one session window is required".to_string());
        }
        for window in &self.windows {
            window.validate()?;
        }
        Ok(())
    }
}

impl Default for SessionConfig {
    /// Morning 09:30:00-11:30:00 and afternoon 13:00:00-15:00:00.
    fn default() -> Self {
        Self {
            windows: vec![
                SessionWindow::new(93000, 113000),
                SessionWindow::new(130000, 150000),
            ],
        }
    }
}

/// Aggregation configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregationConfig {
    /// What a time key groups by
    pub time_key_scope: TimeKeyScope,

    /// Number of reduce partitions the shuffle routes keys into
    pub reduce_partitions: usize,

    /// Pre-aggregate samples inside each map partition
    pub combine_locally: bool,

    /// Malformed records logged individually per partition before going quiet
    pub max_logged_malformed: usize,
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            time_key_scope: TimeKeyScope::TradingDay,
            reduce_partitions: 4,
            combine_locally: true,
            max_logged_malformed: 10,
        }
    }
}

impl AggregationConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.reduce_partitions == 0 {
            return Err("reduce_partitions must be > 0".to_string());
        }
        Ok(())
    }
}

/// Run metadata for tracking and reproducibility.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunMetadata {
    /// Run name
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Creation timestamp
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,

    /// Version or git commit
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
}

impl RunMetadata {
    /// Metadata named `name`, stamped with the current local time.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            created_at: Some(chrono::Local::now().to_rfc3339()),
            version: Some(env!("CARGO_PKG_VERSION").to_string()),
            tags: None,
        }
    }
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            state: StateConfig::default(),
            factors: FactorConfig::default(),
            sessions: SessionConfig::default(),
            aggregation: AggregationConfig::default(),
            metadata: None,
        }
    }
}

impl AggregatorConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_metadata(mut self, metadata: RunMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn with_state_capacity(mut self, capacity: usize) -> Self {
        self.state.capacity = capacity;
        self
    }

    pub fn with_factors(mut self, config: FactorConfig) -> Self {
        self.factors = config;
        self
    }

    pub fn with_sessions(mut self, config: SessionConfig) -> Self {
        self.sessions = config;
        self
    }

    pub fn with_time_key_scope(mut self, scope: TimeKeyScope) -> Self {
        self.aggregation.time_key_scope = scope;
        self
    }

    pub fn with_reduce_partitions(mut self, partitions: usize) -> Self {
        self.aggregation.reduce_partitions = partitions;
        self
    }

    pub fn with_local_combine(mut self, enabled: bool) -> Self {
        self.aggregation.combine_locally = enabled;
        self
    }

    /// Validate the configuration.
    ///
    /// Returns Ok(()) if valid, Err(msg) otherwise.
    pub fn validate(&self) -> Result<(), String> {
        if self.state.capacity == 0 {
            return Err("state.capacity must be > 0".to_string());
        }
        self.factors.validate()?;
        self.sessions.validate()?;
        self.aggregation.validate()?;
        Ok(())
    }

    /// Save configuration to a TOML file.
    pub fn save_toml<P: AsRef<Path>>(&self, path: P) -> Result<(), Box<dyn std::error::Error>> {
        let toml_string = toml::to_string_pretty(self)?;
        fs::write(path, toml_string)?;
        Ok(())
    }

    /// Load and validate configuration from a TOML file.
    pub fn load_toml<P: AsRef<Path>>(path: P) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = fs::read_to_string(path)?;
        let config: AggregatorConfig = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a JSON file.
    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> Result<(), Box<dyn std::error::Error>> {
        let json_string = serde_json::to_string_pretty(self)?;
        fs::write(path, json_string)?;
        Ok(())
    }

    /// Load and validate configuration from a JSON file.
    pub fn load_json<P: AsRef<Path>>(path: P) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = fs::read_to_string(path)?;
        let config: AggregatorConfig = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }
}
