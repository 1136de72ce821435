//! Core snapshot types shared by every pipeline stage.
//!
//! Prices and volumes arrive as exchange integers and stay integers until the
//! factor engine converts them to `f64`.

use crate::error::{FactorError, Result};
use std::fmt;

/// Number of book levels carried per side.
pub const BOOK_LEVELS: usize = 5;

/// Time-of-day code in HHMMSS form (e.g. `93003` is 09:30:03).
///
/// Ordering follows the wall clock because HHMMSS codes sort numerically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TradeTime(u32);

impl TradeTime {
    /// Validate and wrap an HHMMSS code.
    pub fn from_hhmmss(value: u32) -> Result<Self> {
        let hour = value / 10_000;
        let minute = (value / 100) % 100;
        let second = value % 100;

        if hour >= 24 {
            return Err(FactorError::InvalidTradeTime {
                value,
                reason: "hour out of range",
            });
        }
        if minute >= 60 {
            return Err(FactorError::InvalidTradeTime {
                value,
                reason: "minute out of range",
            });
        }
        if second >= 60 {
            return Err(FactorError::InvalidTradeTime {
                value,
                reason: "second out of range",
            });
        }
        Ok(Self(value))
    }

    /// Build from components.
    pub fn from_hms(hour: u32, minute: u32, second: u32) -> Result<Self> {
        Self::from_hhmmss(hour * 10_000 + minute * 100 + second)
    }

    /// Raw HHMMSS code.
    #[inline]
    pub fn hhmmss(&self) -> u32 {
        self.0
    }

    #[inline]
    pub fn hour(&self) -> u32 {
        self.0 / 10_000
    }

    #[inline]
    pub fn minute(&self) -> u32 {
        (self.0 / 100) % 100
    }

    #[inline]
    pub fn second(&self) -> u32 {
        self.0 % 100
    }

    /// Seconds since midnight.
    #[inline]
    pub fn seconds_of_day(&self) -> u32 {
        self.hour() * 3600 + self.minute() * 60 + self.second()
    }

    /// Sort key that collapses the lunch break.
    ///
    /// Minutes elapsed since the 09:30 open, with the afternoon session
    /// continuing at minute 120, times 100 plus the second. Only meaningful
    /// for times inside the trading sessions.
    pub fn session_sort_key(&self) -> i64 {
        let hour = self.hour() as i64;
        let minute = self.minute() as i64;
        let minutes_from_open = if hour < 12 {
            (hour - 9) * 60 + (minute - 30)
        } else {
            (hour - 13) * 60 + minute + 120
        };
        minutes_from_open * 100 + self.second() as i64
    }
}

impl fmt::Display for TradeTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02}:{:02}:{:02}",
            self.hour(),
            self.minute(),
            self.second()
        )
    }
}

/// One order-book observation for one instrument.
///
/// Level index 0 is the best price on each side.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    /// Trading day as YYYYMMDD.
    pub trading_day: u32,
    pub trade_time: TradeTime,
    pub instrument: String,
    pub bid_prices: [i64; BOOK_LEVELS],
    pub bid_volumes: [i64; BOOK_LEVELS],
    pub ask_prices: [i64; BOOK_LEVELS],
    pub ask_volumes: [i64; BOOK_LEVELS],
    /// Market-wide resting bid volume.
    pub market_bid_volume: i64,
    /// Market-wide resting ask volume.
    pub market_ask_volume: i64,
    pub last_price: i64,
}

impl Snapshot {
    /// Create an empty snapshot (all prices and volumes zero).
    pub fn new(trading_day: u32, trade_time: TradeTime, instrument: impl Into<String>) -> Self {
        Self {
            trading_day,
            trade_time,
            instrument: instrument.into(),
            bid_prices: [0; BOOK_LEVELS],
            bid_volumes: [0; BOOK_LEVELS],
            ask_prices: [0; BOOK_LEVELS],
            ask_volumes: [0; BOOK_LEVELS],
            market_bid_volume: 0,
            market_ask_volume: 0,
            last_price: 0,
        }
    }

    /// Set one book level (1-indexed).
    ///
    /// # Panics
    ///
    /// Panics if `level` is not in `1..=BOOK_LEVELS`.
    pub fn with_level(
        mut self,
        level: usize,
        bid_price: i64,
        bid_volume: i64,
        ask_price: i64,
        ask_volume: i64,
    ) -> Self {
        assert!(
            (1..=BOOK_LEVELS).contains(&level),
            "level must be in 1..={BOOK_LEVELS}"
        );
        let i = level - 1;
        self.bid_prices[i] = bid_price;
        self.bid_volumes[i] = bid_volume;
        self.ask_prices[i] = ask_price;
        self.ask_volumes[i] = ask_volume;
        self
    }

    /// Set the market-wide bid/ask volumes.
    pub fn with_market_volumes(mut self, bid: i64, ask: i64) -> Self {
        self.market_bid_volume = bid;
        self.market_ask_volume = ask;
        self
    }

    pub fn with_last_price(mut self, price: i64) -> Self {
        self.last_price = price;
        self
    }

    #[inline]
    pub fn best_bid(&self) -> i64 {
        self.bid_prices[0]
    }

    #[inline]
    pub fn best_ask(&self) -> i64 {
        self.ask_prices[0]
    }

    #[inline]
    pub fn best_bid_volume(&self) -> i64 {
        self.bid_volumes[0]
    }

    #[inline]
    pub fn best_ask_volume(&self) -> i64 {
        self.ask_volumes[0]
    }
}

/// The part of a snapshot retained for the next tick of the same instrument.
///
/// A plain `Copy` value: the state store hands out copies, so nothing outside
/// the store can alias or mutate cached state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PreviousState {
    pub trade_time: TradeTime,
    pub best_ask: i64,
    pub best_bid: i64,
    pub bid_volumes: [i64; BOOK_LEVELS],
    pub ask_volumes: [i64; BOOK_LEVELS],
}

impl PreviousState {
    /// Project a snapshot down to the retained fields.
    pub fn from_snapshot(snapshot: &Snapshot) -> Self {
        Self {
            trade_time: snapshot.trade_time,
            best_ask: snapshot.best_ask(),
            best_bid: snapshot.best_bid(),
            bid_volumes: snapshot.bid_volumes,
            ask_volumes: snapshot.ask_volumes,
        }
    }

    #[inline]
    pub fn mid_price(&self) -> f64 {
        (self.best_ask as f64 + self.best_bid as f64) / 2.0
    }
}

impl From<&Snapshot> for PreviousState {
    fn from(snapshot: &Snapshot) -> Self {
        Self::from_snapshot(snapshot)
    }
}
