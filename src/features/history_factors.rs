//! Factors comparing the current snapshot with the previous one (ids 17-19).
//!
//! Without a previous tick each of these is exactly `0.0`.

use super::book_factors::{depth_ratio, mid_price, BookSums};
use crate::types::{PreviousState, Snapshot};

/// 17. Change of the best ask since the previous tick.
#[inline]
pub fn best_price_change(current: &Snapshot, previous: Option<&PreviousState>) -> f64 {
    match previous {
        Some(prev) => current.best_ask() as f64 - prev.best_ask as f64,
        None => 0.0,
    }
}

/// 18. Change of the mid price since the previous tick.
#[inline]
pub fn mid_price_change(current: &Snapshot, previous: Option<&PreviousState>) -> f64 {
    match previous {
        Some(prev) => mid_price(current) - prev.mid_price(),
        None => 0.0,
    }
}

/// 19. Change of the bid/ask depth ratio since the previous tick.
///
/// The previous ratio is rebuilt from the stored volumes over the same
/// number of levels as `sums`.
#[inline]
pub fn depth_ratio_change(sums: &BookSums, previous: Option<&PreviousState>) -> f64 {
    let Some(prev) = previous else {
        return 0.0;
    };

    let (prev_bid, prev_ask) = (0..sums.levels).fold((0.0, 0.0), |(bid, ask), i| {
        (
            bid + prev.bid_volumes[i] as f64,
            ask + prev.ask_volumes[i] as f64,
        )
    });

    depth_ratio(sums.bid_depth, sums.ask_depth) - depth_ratio(prev_bid, prev_ask)
}
