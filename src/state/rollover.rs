//! Per-instrument trading-day rollover detection.
//!
//! The tracker keeps one entry per instrument seen in the partition and is
//! not bounded by the state store's capacity; its size is bounded only by the
//! number of distinct instruments. [`DayRolloverTracker::clear`] empties it.

use ahash::AHashMap;

/// Outcome of observing an instrument's trading day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DayTransition {
    /// First observation of the instrument
    First,
    /// Same trading day as the previous observation
    SameDay,
    /// The trading day changed since the previous observation
    Rolled { previous_day: u32 },
}

/// Remembers the last trading day seen per instrument.
///
/// The caller invalidates the instrument's stored state whenever
/// [`observe`](Self::observe) reports [`DayTransition::Rolled`], before looking
/// the state up, so history never crosses a day boundary.
#[derive(Debug, Clone, Default)]
pub struct DayRolloverTracker {
    last_seen: AHashMap<String, u32>,
    rollovers: u64,
}

impl DayRolloverTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `trading_day` for `instrument` and report how it relates to the
    /// previous observation.
    pub fn observe(&mut self, instrument: &str, trading_day: u32) -> DayTransition {
        match self.last_seen.get_mut(instrument) {
            Some(day) if *day == trading_day => DayTransition::SameDay,
            Some(day) => {
                let previous_day = *day;
                *day = trading_day;
                self.rollovers += 1;
                DayTransition::Rolled { previous_day }
            }
            None => {
                self.last_seen.insert(instrument.to_string(), trading_day);
                DayTransition::First
            }
        }
    }

    /// Last trading day seen for `instrument`.
    pub fn last_day(&self, instrument: &str) -> Option<u32> {
        self.last_seen.get(instrument).copied()
    }

    /// Total rollovers observed.
    pub fn rollovers(&self) -> u64 {
        self.rollovers
    }

    pub fn instrument_count(&self) -> usize {
        self.last_seen.len()
    }

    pub fn clear(&mut self) {
        self.last_seen.clear();
        self.rollovers = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transitions() {
        let mut tracker = DayRolloverTracker::new();

        assert_eq!(tracker.observe("600000", 20240102), DayTransition::First);
        assert_eq!(tracker.observe("600000", 20240102), DayTransition::SameDay);
        assert_eq!(
            tracker.observe("600000", 20240103),
            DayTransition::Rolled {
                previous_day: 20240102
            }
        );
        assert_eq!(tracker.last_day("600000"), Some(20240103));
        assert_eq!(tracker.rollovers(), 1);
    }

    #[test]
    fn test_instruments_are_independent() {
        let mut tracker = DayRolloverTracker::new();
        tracker.observe("a", 1);
        assert_eq!(tracker.observe("b", 2), DayTransition::First);
        assert_eq!(tracker.observe("a", 1), DayTransition::SameDay);
        assert_eq!(tracker.instrument_count(), 2);

        tracker.clear();
        assert_eq!(tracker.last_day("a"), None);
    }
}
