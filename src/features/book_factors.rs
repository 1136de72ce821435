//! Factors computed from the current snapshot alone (ids 1-16 and 20).
//!
//! All level sums are gathered in one pass into [`BookSums`]; the individual
//! factor functions then only combine those sums.

use super::EPSILON;
use crate::types::Snapshot;

/// Level sums over the first `levels` book levels of one snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BookSums {
    /// Number of levels summed
    pub levels: usize,
    /// Σ bid volume
    pub bid_depth: f64,
    /// Σ ask volume
    pub ask_depth: f64,
    /// Σ bid price × bid volume
    pub bid_notional: f64,
    /// Σ ask price × ask volume
    pub ask_notional: f64,
    /// Σ bid volume / level
    pub bid_decayed: f64,
    /// Σ ask volume / level
    pub ask_decayed: f64,
}

impl BookSums {
    /// Single pass over the first `levels` levels (caller clamps `levels`).
    #[inline]
    pub fn gather(snapshot: &Snapshot, levels: usize) -> Self {
        let mut sums = BookSums {
            levels,
            ..Default::default()
        };

        for i in 0..levels {
            let bid_vol = snapshot.bid_volumes[i] as f64;
            let ask_vol = snapshot.ask_volumes[i] as f64;
            let weight = 1.0 / (i + 1) as f64;

            sums.bid_depth += bid_vol;
            sums.ask_depth += ask_vol;
            sums.bid_notional += snapshot.bid_prices[i] as f64 * bid_vol;
            sums.ask_notional += snapshot.ask_prices[i] as f64 * ask_vol;
            sums.bid_decayed += bid_vol * weight;
            sums.ask_decayed += ask_vol * weight;
        }

        sums
    }

    #[inline]
    pub fn total_depth(&self) -> f64 {
        self.bid_depth + self.ask_depth
    }
}

/// 1. Best ask minus best bid.
///
/// Prices are converted before any arithmetic so extreme values stay finite.
#[inline]
pub fn spread(snapshot: &Snapshot) -> f64 {
    snapshot.best_ask() as f64 - snapshot.best_bid() as f64
}

/// 3. Midpoint of the best prices.
#[inline]
pub fn mid_price(snapshot: &Snapshot) -> f64 {
    (snapshot.best_ask() as f64 + snapshot.best_bid() as f64) / 2.0
}

/// 2. Spread relative to the mid price.
#[inline]
pub fn relative_spread(snapshot: &Snapshot) -> f64 {
    spread(snapshot) / (mid_price(snapshot) + EPSILON)
}

/// 4. Level-1 volume imbalance.
#[inline]
pub fn level1_imbalance(snapshot: &Snapshot) -> f64 {
    let bid = snapshot.best_bid_volume() as f64;
    let ask = snapshot.best_ask_volume() as f64;
    (bid - ask) / (bid + ask + EPSILON)
}

/// 5. Volume imbalance over all summed levels.
#[inline]
pub fn depth_imbalance(sums: &BookSums) -> f64 {
    (sums.bid_depth - sums.ask_depth) / (sums.total_depth() + EPSILON)
}

/// 9. Bid depth over ask depth.
#[inline]
pub fn depth_ratio(bid_depth: f64, ask_depth: f64) -> f64 {
    bid_depth / (ask_depth + EPSILON)
}

/// 10. Imbalance of the market-wide resting volumes.
#[inline]
pub fn market_imbalance(snapshot: &Snapshot) -> f64 {
    let bid = snapshot.market_bid_volume as f64;
    let ask = snapshot.market_ask_volume as f64;
    (bid - ask) / (bid + ask + EPSILON)
}

/// 11. Volume-weighted bid price.
#[inline]
pub fn vwap_bid(sums: &BookSums) -> f64 {
    sums.bid_notional / (sums.bid_depth + EPSILON)
}

/// 12. Volume-weighted ask price.
#[inline]
pub fn vwap_ask(sums: &BookSums) -> f64 {
    sums.ask_notional / (sums.ask_depth + EPSILON)
}

/// 13. Volume-weighted price across both sides.
#[inline]
pub fn weighted_mid_price(sums: &BookSums) -> f64 {
    (sums.bid_notional + sums.ask_notional) / (sums.total_depth() + EPSILON)
}

/// 15. Depth difference per level.
#[inline]
pub fn density_difference(sums: &BookSums) -> f64 {
    (sums.bid_depth - sums.ask_depth) / sums.levels as f64
}

/// 16. Imbalance of level-decayed volumes (level i weighted 1/i).
#[inline]
pub fn asymmetry(sums: &BookSums) -> f64 {
    (sums.bid_decayed - sums.ask_decayed) / (sums.bid_decayed + sums.ask_decayed + EPSILON)
}

/// 20. Spread per unit of resting volume.
#[inline]
pub fn pressure(snapshot: &Snapshot, sums: &BookSums) -> f64 {
    spread(snapshot) / (sums.total_depth() + EPSILON)
}
