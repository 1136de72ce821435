//! Snapshot and factor sanity checks.
//!
//! All checks are advisory. The pipeline counts snapshots that raise
//! warnings but still feeds them to the factor engine, whose ε-guarded
//! ratios stay finite for any integer book.
//!
//! # Checks
//!
//! 1. **Book consistency**: crossed or locked best prices, level ordering
//! 2. **Volume sanity**: negative volumes
//! 3. **Price sanity**: non-positive best prices
//! 4. **Factor ranges**: NaN/Inf detection
//!
//! # Usage
//!
//! ```
//! use lob_factor_aggregator::types::{Snapshot, TradeTime};
//! use lob_factor_aggregator::validation::SnapshotValidator;
//!
//! let t = TradeTime::from_hhmmss(93003).unwrap();
//! let snap = Snapshot::new(20240102, t, "600000").with_level(1, 101, 10, 100, 10);
//!
//! let result = SnapshotValidator::default().validate_snapshot(&snap);
//! assert!(result.has_warnings());
//! ```

use std::fmt;

use crate::features::FactorVector;
use crate::types::{Snapshot, BOOK_LEVELS};

/// Outcome of a single check.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationLevel {
    Valid,
    /// Suspicious but usable
    Warning(String),
    /// Unusable value
    Error(String),
}

impl ValidationLevel {
    pub fn is_valid(&self) -> bool {
        matches!(self, ValidationLevel::Valid)
    }

    pub fn is_warning(&self) -> bool {
        matches!(self, ValidationLevel::Warning(_))
    }

    pub fn is_error(&self) -> bool {
        matches!(self, ValidationLevel::Error(_))
    }
}

impl fmt::Display for ValidationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationLevel::Valid => write!(f, "Valid"),
            ValidationLevel::Warning(msg) => write!(f, "Warning: {msg}"),
            ValidationLevel::Error(msg) => write!(f, "Error: {msg}"),
        }
    }
}

/// Results of a set of named checks.
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    results: Vec<(&'static str, ValidationLevel)>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, check_name: &'static str, level: ValidationLevel) {
        self.results.push((check_name, level));
    }

    /// True when no check warned or failed.
    pub fn is_valid(&self) -> bool {
        self.results.iter().all(|(_, level)| level.is_valid())
    }

    pub fn has_errors(&self) -> bool {
        self.results.iter().any(|(_, level)| level.is_error())
    }

    pub fn has_warnings(&self) -> bool {
        self.results.iter().any(|(_, level)| level.is_warning())
    }

    /// Warning messages prefixed by check name.
    pub fn warnings(&self) -> Vec<String> {
        self.results
            .iter()
            .filter_map(|(name, level)| match level {
                ValidationLevel::Warning(msg) => Some(format!("{name}: {msg}")),
                _ => None,
            })
            .collect()
    }

    /// Error messages prefixed by check name.
    pub fn errors(&self) -> Vec<String> {
        self.results
            .iter()
            .filter_map(|(name, level)| match level {
                ValidationLevel::Error(msg) => Some(format!("{name}: {msg}")),
                _ => None,
            })
            .collect()
    }

    pub fn all_results(&self) -> &[(&'static str, ValidationLevel)] {
        &self.results
    }

    pub fn check_count(&self) -> usize {
        self.results.len()
    }

    pub fn passed_count(&self) -> usize {
        self.results.iter().filter(|(_, l)| l.is_valid()).count()
    }
}

impl fmt::Display for ValidationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Validation: {}/{} checks passed",
            self.passed_count(),
            self.check_count()
        )?;
        for (name, level) in &self.results {
            if !level.is_valid() {
                writeln!(f, "  {name}: {level}")?;
            }
        }
        Ok(())
    }
}

/// Which checks to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidationConfig {
    /// Warn when best ask < best bid
    pub check_crossed: bool,
    /// Warn when best ask == best bid
    pub check_locked: bool,
    /// Warn when non-empty levels are out of price order
    pub check_level_order: bool,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            check_crossed: true,
            check_locked: false,
            check_level_order: true,
        }
    }
}

/// Runs sanity checks on snapshots and factor vectors.
#[derive(Debug, Clone, Default)]
pub struct SnapshotValidator {
    config: ValidationConfig,
}

impl SnapshotValidator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: ValidationConfig) -> Self {
        Self { config }
    }

    /// Check one snapshot's book.
    pub fn validate_snapshot(&self, snapshot: &Snapshot) -> ValidationResult {
        let mut result = ValidationResult::new();
        let bid = snapshot.best_bid();
        let ask = snapshot.best_ask();

        if bid <= 0 || ask <= 0 {
            result.add(
                "best_price",
                ValidationLevel::Warning(format!("non-positive best price (bid={bid}, ask={ask})")),
            );
        } else {
            result.add("best_price", ValidationLevel::Valid);
        }

        if self.config.check_crossed {
            let level = if bid > 0 && ask > 0 && ask < bid {
                ValidationLevel::Warning(format!("crossed book (bid={bid} > ask={ask})"))
            } else {
                ValidationLevel::Valid
            };
            result.add("crossed", level);
        }

        if self.config.check_locked {
            let level = if bid > 0 && ask == bid {
                ValidationLevel::Warning(format!("locked book at {bid}"))
            } else {
                ValidationLevel::Valid
            };
            result.add("locked", level);
        }

        let negative = snapshot
            .bid_volumes
            .iter()
            .chain(snapshot.ask_volumes.iter())
            .chain([&snapshot.market_bid_volume, &snapshot.market_ask_volume])
            .any(|&v| v < 0);
        result.add(
            "volumes",
            if negative {
                ValidationLevel::Warning("negative volume".to_string())
            } else {
                ValidationLevel::Valid
            },
        );

        if self.config.check_level_order {
            result.add("level_order", check_level_order(snapshot));
        }

        result
    }

    /// Check that every factor is finite.
    pub fn validate_factors(&self, factors: &FactorVector) -> ValidationResult {
        let mut result = ValidationResult::new();
        let bad: Vec<usize> = factors
            .iter()
            .enumerate()
            .filter(|(_, v)| !v.is_finite())
            .map(|(i, _)| i + 1)
            .collect();

        result.add(
            "finite",
            if bad.is_empty() {
                ValidationLevel::Valid
            } else {
                ValidationLevel::Error(format!("non-finite factors {bad:?}"))
            },
        );
        result
    }
}

/// Bids must fall and asks must rise level by level, ignoring empty levels.
fn check_level_order(snapshot: &Snapshot) -> ValidationLevel {
    for i in 1..BOOK_LEVELS {
        let (prev_bid, bid) = (snapshot.bid_prices[i - 1], snapshot.bid_prices[i]);
        if prev_bid > 0 && bid > 0 && bid >= prev_bid {
            return ValidationLevel::Warning(format!(
                "bid level {} ({bid}) not below level {} ({prev_bid})",
                i + 1,
                i
            ));
        }
        let (prev_ask, ask) = (snapshot.ask_prices[i - 1], snapshot.ask_prices[i]);
        if prev_ask > 0 && ask > 0 && ask <= prev_ask {
            return ValidationLevel::Warning(format!(
                "ask level {} ({ask}) not above level {} ({prev_ask})",
                i + 1,
                i
            ));
        }
    }
    ValidationLevel::Valid
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::FACTOR_COUNT;
    use crate::types::TradeTime;

    fn healthy() -> Snapshot {
        let t = TradeTime::from_hhmmss(93003).unwrap();
        Snapshot::new(20240102, t, "600000")
            .with_level(1, 1000, 10, 1001, 10)
            .with_level(2, 999, 10, 1002, 10)
    }

    #[test]
    fn test_healthy_snapshot_passes() {
        let result = SnapshotValidator::new().validate_snapshot(&healthy());
        assert!(result.is_valid(), "{result}");
        assert_eq!(result.passed_count(), result.check_count());
    }

    #[test]
    fn test_crossed_book_warns() {
        let snap = healthy().with_level(1, 1002, 10, 1001, 10);
        let result = SnapshotValidator::new().validate_snapshot(&snap);
        assert!(result.has_warnings());
        assert!(!result.has_errors());
        assert!(result.warnings().iter().any(|w| w.starts_with("crossed")));
    }

    #[test]
    fn test_locked_book_only_when_enabled() {
        let snap = healthy().with_level(1, 1000, 10, 1000, 10);
        assert!(SnapshotValidator::new().validate_snapshot(&snap).is_valid());

        let validator = SnapshotValidator::with_config(ValidationConfig {
            check_locked: true,
            ..Default::default()
        });
        assert!(validator.validate_snapshot(&snap).has_warnings());
    }

    #[test]
    fn test_negative_volume_warns() {
        let snap = healthy().with_market_volumes(-1, 5);
        let result = SnapshotValidator::new().validate_snapshot(&snap);
        assert!(result.warnings().iter().any(|w| w.starts_with("volumes")));
    }

    #[test]
    fn test_empty_best_price_warns() {
        let t = TradeTime::from_hhmmss(93003).unwrap();
        let empty = Snapshot::new(20240102, t, "600000");
        let result = SnapshotValidator::new().validate_snapshot(&empty);
        assert!(result.warnings().iter().any(|w| w.starts_with("best_price")));
    }

    #[test]
    fn test_level_order_warns() {
        let snap = healthy().with_level(3, 1000, 5, 1003, 5);
        let result = SnapshotValidator::new().validate_snapshot(&snap);
        assert!(result.warnings().iter().any(|w| w.starts_with("level_order")));
    }

    #[test]
    fn test_factor_finiteness() {
        let validator = SnapshotValidator::new();
        let ok = FactorVector::from_array([1.0; FACTOR_COUNT]);
        assert!(validator.validate_factors(&ok).is_valid());

        let mut values = [0.0; FACTOR_COUNT];
        values[4] = f64::NAN;
        let result = validator.validate_factors(&FactorVector::from_array(values));
        assert!(result.has_errors());
        assert!(result.errors()[0].contains("[5]"));
    }
}
