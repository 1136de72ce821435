//! Factor metadata: stable ids, names, output columns and categories.

use serde::{Deserialize, Serialize};

use super::FACTOR_COUNT;

/// Broad family a factor belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FactorCategory {
    /// Best-price spread and mid
    Spread,
    /// Volume imbalances
    Imbalance,
    /// Depth sums and ratios
    Depth,
    /// Volume-weighted prices
    WeightedPrice,
    /// Changes against the previous tick
    Dynamics,
}

impl FactorCategory {
    pub fn name(&self) -> &'static str {
        match self {
            FactorCategory::Spread => "Spread",
            FactorCategory::Imbalance => "Imbalance",
            FactorCategory::Depth => "Depth",
            FactorCategory::WeightedPrice => "Weighted Price",
            FactorCategory::Dynamics => "Dynamics",
        }
    }
}

/// Definition of a single factor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FactorDef {
    /// 1-based factor id
    pub id: usize,
    /// snake_case name
    pub name: &'static str,
    /// Column name in the final output
    pub column: &'static str,
    pub category: FactorCategory,
    /// Whether the value depends on the previous tick
    pub needs_history: bool,
}

const fn def(
    id: usize,
    name: &'static str,
    column: &'static str,
    category: FactorCategory,
    needs_history: bool,
) -> FactorDef {
    FactorDef {
        id,
        name,
        column,
        category,
        needs_history,
    }
}

use FactorCategory::*;

/// All factors in output order.
pub const FACTOR_DEFS: [FactorDef; FACTOR_COUNT] = [
    def(1, "spread", "alpha_1", Spread, false),
    def(2, "relative_spread", "alpha_2", Spread, false),
    def(3, "mid_price", "alpha_3", Spread, false),
    def(4, "level1_imbalance", "alpha_4", Imbalance, false),
    def(5, "depth_imbalance", "alpha_5", Imbalance, false),
    def(6, "bid_depth", "alpha_6", Depth, false),
    def(7, "ask_depth", "alpha_7", Depth, false),
    def(8, "depth_difference", "alpha_8", Depth, false),
    def(9, "depth_ratio", "alpha_9", Depth, false),
    def(10, "market_imbalance", "alpha_10", Imbalance, false),
    def(11, "vwap_bid", "alpha_11", WeightedPrice, false),
    def(12, "vwap_ask", "alpha_12", WeightedPrice, false),
    def(13, "weighted_mid_price", "alpha_13", WeightedPrice, false),
    def(14, "weighted_spread", "alpha_14", WeightedPrice, false),
    def(15, "density_difference", "alpha_15", Depth, false),
    def(16, "asymmetry", "alpha_16", Imbalance, false),
    def(17, "best_price_change", "alpha_17", Dynamics, true),
    def(18, "mid_price_change", "alpha_18", Dynamics, true),
    def(19, "depth_ratio_change", "alpha_19", Dynamics, true),
    def(20, "pressure", "alpha_20", Spread, false),
];

/// Look up a factor by its snake_case name.
pub fn factor_by_name(name: &str) -> Option<&'static FactorDef> {
    FACTOR_DEFS.iter().find(|d| d.name == name)
}

/// Output column names in order.
pub fn column_names() -> impl Iterator<Item = &'static str> {
    FACTOR_DEFS.iter().map(|d| d.column)
}
