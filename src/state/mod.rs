//! Per-instrument rolling state.
//!
//! - `lru`: bounded store of the previous tick per (instrument, trading day)
//! - `rollover`: caller-side detection of trading-day changes
//!
//! The two are used together: observe the day first, invalidate on a
//! rollover, then look up the previous state.

pub mod lru;
pub mod rollover;

pub use lru::{InstrumentStateStore, StateKey, StoreStats, DEFAULT_STATE_CAPACITY};
pub use rollover::{DayRolloverTracker, DayTransition};
