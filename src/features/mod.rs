//! The twenty-factor engine.
//!
//! Factors describe the shape of a five-level order book and how it moved
//! since the instrument's previous tick:
//!
//! | Ids | Module | Inputs |
//! |-----|--------|--------|
//! | 1-16, 20 | `book_factors` | current snapshot |
//! | 17-19 | `history_factors` | current snapshot + previous state |
//!
//! Every ratio adds [`EPSILON`] to its denominator instead of branching, so
//! the output is finite for any finite integer input, including an empty
//! book. Missing history yields exactly `0.0` for factors 17-19.
//!
//! # Usage
//!
//! ```
//! use lob_factor_aggregator::features::FactorEngine;
//! use lob_factor_aggregator::types::{Snapshot, TradeTime};
//!
//! let t = TradeTime::from_hhmmss(93003).unwrap();
//! let snap = Snapshot::new(20240102, t, "600000").with_level(1, 100, 200, 101, 100);
//!
//! let engine = FactorEngine::default();
//! let factors = engine.compute(&snap, None);
//! assert_eq!(factors.factor(1), 1.0);
//! assert_eq!(factors.factor(17), 0.0);
//! ```

pub mod book_factors;
pub mod catalogue;
pub mod history_factors;

pub use book_factors::BookSums;
pub use catalogue::{FactorCategory, FactorDef, FACTOR_DEFS};

use serde::{Deserialize, Serialize};

use crate::types::{PreviousState, Snapshot, BOOK_LEVELS};

/// Number of factors produced per snapshot.
pub const FACTOR_COUNT: usize = 20;

/// Added to every ratio denominator.
pub const EPSILON: f64 = 1e-7;

/// Ordered factor values, index 0 holding factor 1.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FactorVector([f64; FACTOR_COUNT]);

impl FactorVector {
    pub fn from_array(values: [f64; FACTOR_COUNT]) -> Self {
        Self(values)
    }

    /// Value of factor `id` (1-based).
    ///
    /// # Panics
    ///
    /// Panics if `id` is not in `1..=FACTOR_COUNT`.
    #[inline]
    pub fn factor(&self, id: usize) -> f64 {
        assert!(
            (1..=FACTOR_COUNT).contains(&id),
            "factor id must be in 1..={FACTOR_COUNT}, got {id}"
        );
        self.0[id - 1]
    }

    #[inline]
    pub fn as_array(&self) -> &[f64; FACTOR_COUNT] {
        &self.0
    }

    #[inline]
    pub fn into_array(self) -> [f64; FACTOR_COUNT] {
        self.0
    }

    pub fn iter(&self) -> impl Iterator<Item = f64> + '_ {
        self.0.iter().copied()
    }

    pub fn is_finite(&self) -> bool {
        self.0.iter().all(|v| v.is_finite())
    }
}

/// Configuration for the factor engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FactorConfig {
    /// Book levels summed by the depth factors (1..=5)
    pub depth_levels: usize,
}

impl FactorConfig {
    pub fn new(depth_levels: usize) -> Self {
        Self { depth_levels }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.depth_levels == 0 || self.depth_levels > BOOK_LEVELS {
            return Err(format!(
                "depth_levels must be in 1..={}, got {}",
                BOOK_LEVELS, self.depth_levels
            ));
        }
        Ok(())
    }
}

impl Default for FactorConfig {
    fn default() -> Self {
        Self {
            depth_levels: BOOK_LEVELS,
        }
    }
}

/// Stateless factor calculator.
///
/// Holds only its configuration, so one engine can be shared across threads.
#[derive(Debug, Clone, Copy, Default)]
pub struct FactorEngine {
    config: FactorConfig,
}

impl FactorEngine {
    /// Create an engine summing `depth_levels` levels (clamped to 1..=5).
    pub fn new(depth_levels: usize) -> Self {
        Self::with_config(FactorConfig::new(depth_levels))
    }

    pub fn with_config(config: FactorConfig) -> Self {
        Self {
            config: FactorConfig {
                depth_levels: config.depth_levels.clamp(1, BOOK_LEVELS),
            },
        }
    }

    /// Compute all factors for `current`.
    #[inline]
    pub fn compute(&self, current: &Snapshot, previous: Option<&PreviousState>) -> FactorVector {
        compute_factors(current, previous, self.config.depth_levels)
    }

    #[inline]
    pub fn depth_levels(&self) -> usize {
        self.config.depth_levels
    }

    pub fn config(&self) -> &FactorConfig {
        &self.config
    }
}

/// Compute the twenty factors of `current` given the instrument's previous
/// state, summing the first `depth_levels` levels (clamped to 1..=5).
///
/// Pure: no I/O and no shared state.
pub fn compute_factors(
    current: &Snapshot,
    previous: Option<&PreviousState>,
    depth_levels: usize,
) -> FactorVector {
    use book_factors as b;
    use history_factors as h;

    let levels = depth_levels.clamp(1, BOOK_LEVELS);
    let sums = BookSums::gather(current, levels);

    let vwap_bid = b::vwap_bid(&sums);
    let vwap_ask = b::vwap_ask(&sums);

    FactorVector([
        b::spread(current),
        b::relative_spread(current),
        b::mid_price(current),
        b::level1_imbalance(current),
        b::depth_imbalance(&sums),
        sums.bid_depth,
        sums.ask_depth,
        sums.bid_depth - sums.ask_depth,
        b::depth_ratio(sums.bid_depth, sums.ask_depth),
        b::market_imbalance(current),
        vwap_bid,
        vwap_ask,
        b::weighted_mid_price(&sums),
        vwap_ask - vwap_bid,
        b::density_difference(&sums),
        b::asymmetry(&sums),
        h::best_price_change(current, previous),
        h::mid_price_change(current, previous),
        h::depth_ratio_change(&sums, previous),
        b::pressure(current, &sums),
    ])
}
