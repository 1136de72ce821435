//! Time keys and the mergeable (count, sums) tuple.
//!
//! # Wire format
//!
//! Every stage reads and writes the same line format:
//!
//! ```text
//! <timeKey>\t<count>|<s1>,<s2>,...,<s20>
//! ```
//!
//! with each sum printed to 6 decimals. A time key renders as `HHMMSS` when
//! aggregating across days and `YYYYMMDD_HHMMSS` when aggregating per day.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{FactorError, Result};
use crate::features::{FactorVector, FACTOR_COUNT};
use crate::types::{Snapshot, TradeTime};

/// What a time key groups by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeKeyScope {
    /// (trading day, time of day): one output row per day and second
    #[default]
    TradingDay,
    /// Time of day only: each second averaged across all days
    TimeOfDay,
}

/// Aggregation grouping key.
///
/// Keys of the same scope order chronologically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimeKey {
    trading_day: Option<u32>,
    trade_time: TradeTime,
}

impl TimeKey {
    /// Key grouping by day and time.
    pub fn per_day(trading_day: u32, trade_time: TradeTime) -> Self {
        Self {
            trading_day: Some(trading_day),
            trade_time,
        }
    }

    /// Key grouping by time of day only.
    pub fn time_of_day(trade_time: TradeTime) -> Self {
        Self {
            trading_day: None,
            trade_time,
        }
    }

    /// Key for `snapshot` under `scope`.
    pub fn for_snapshot(snapshot: &Snapshot, scope: TimeKeyScope) -> Self {
        match scope {
            TimeKeyScope::TradingDay => Self::per_day(snapshot.trading_day, snapshot.trade_time),
            TimeKeyScope::TimeOfDay => Self::time_of_day(snapshot.trade_time),
        }
    }

    pub fn trading_day(&self) -> Option<u32> {
        self.trading_day
    }

    pub fn trade_time(&self) -> TradeTime {
        self.trade_time
    }

    pub fn scope(&self) -> TimeKeyScope {
        if self.trading_day.is_some() {
            TimeKeyScope::TradingDay
        } else {
            TimeKeyScope::TimeOfDay
        }
    }
}

impl fmt::Display for TimeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.trading_day {
            Some(day) => write!(f, "{}_{:06}", day, self.trade_time.hhmmss()),
            None => write!(f, "{:06}", self.trade_time.hhmmss()),
        }
    }
}

impl FromStr for TimeKey {
    type Err = FactorError;

    fn from_str(s: &str) -> Result<Self> {
        let parse_time = |raw: &str| -> Result<TradeTime> {
            let value: u32 = raw
                .parse()
                .map_err(|_| FactorError::malformed(format!("bad time in key '{s}'")))?;
            TradeTime::from_hhmmss(value)
        };

        match s.split_once('_') {
            Some((day, time)) => {
                let day: u32 = day
                    .parse()
                    .map_err(|_| FactorError::malformed(format!("bad day in key '{s}'")))?;
                Ok(Self::per_day(day, parse_time(time)?))
            }
            None => Ok(Self::time_of_day(parse_time(s)?)),
        }
    }
}

/// Partial aggregate for one time key: sample count and per-factor sums.
///
/// Merging is element-wise addition, so tuples can be combined any number of
/// times in any grouping before the final division.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregationTuple {
    pub key: TimeKey,
    pub count: u64,
    pub sums: [f64; FACTOR_COUNT],
}

impl AggregationTuple {
    /// Tuple with no samples.
    pub fn empty(key: TimeKey) -> Self {
        Self {
            key,
            count: 0,
            sums: [0.0; FACTOR_COUNT],
        }
    }

    /// Tuple holding a single sample.
    pub fn from_sample(key: TimeKey, factors: &FactorVector) -> Self {
        Self {
            key,
            count: 1,
            sums: factors.into_array(),
        }
    }

    /// Add `other` into `self`.
    ///
    /// # Panics
    ///
    /// Panics if the keys differ.
    #[inline]
    pub fn absorb(&mut self, other: &AggregationTuple) {
        assert_eq!(self.key, other.key, "cannot merge tuples of different keys");
        self.count += other.count;
        for (sum, value) in self.sums.iter_mut().zip(other.sums.iter()) {
            *sum += value;
        }
    }

    /// Merge two tuples of the same key.
    ///
    /// # Panics
    ///
    /// Panics if the keys differ.
    pub fn merge(mut self, other: &AggregationTuple) -> AggregationTuple {
        self.absorb(other);
        self
    }

    /// Per-factor mean, or `None` when the tuple holds no samples.
    pub fn mean(&self) -> Option<FactorVector> {
        if self.count == 0 {
            return None;
        }
        let n = self.count as f64;
        let mut means = [0.0; FACTOR_COUNT];
        for (mean, sum) in means.iter_mut().zip(self.sums.iter()) {
            *mean = sum / n;
        }
        Some(FactorVector::from_array(means))
    }

    /// Render in the wire format.
    pub fn encode(&self) -> String {
        self.to_string()
    }

    /// Parse one wire-format line.
    pub fn decode(line: &str) -> Result<Self> {
        let line = line.trim_end_matches(&['\r', '\n'][..]);
        let (key, value) = line
            .split_once('\t')
            .ok_or_else(|| FactorError::malformed("partial tuple has no tab separator"))?;
        let (count, sums_raw) = value
            .split_once('|')
            .ok_or_else(|| FactorError::malformed("partial tuple has no '|' separator"))?;

        let key: TimeKey = key.parse()?;
        let count: u64 = count
            .parse()
            .map_err(|_| FactorError::malformed(format!("bad sample count '{count}'")))?;

        let mut sums = [0.0; FACTOR_COUNT];
        let mut fields = sums_raw.split(',');
        for (i, slot) in sums.iter_mut().enumerate() {
            let raw = fields.next().ok_or_else(|| {
                FactorError::malformed(format!("expected {FACTOR_COUNT} sums, got {i}"))
            })?;
            *slot = raw
                .parse()
                .map_err(|_| FactorError::malformed(format!("bad factor sum '{raw}'")))?;
        }
        if fields.next().is_some() {
            return Err(FactorError::malformed(format!(
                "more than {FACTOR_COUNT} sums"
            )));
        }

        Ok(Self { key, count, sums })
    }
}

impl fmt::Display for AggregationTuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}\t{}|", self.key, self.count)?;
        for (i, sum) in self.sums.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{:.6}", sum)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn time(hhmmss: u32) -> TradeTime {
        TradeTime::from_hhmmss(hhmmss).unwrap()
    }

    fn tuple_with(key: TimeKey, first: f64, count: u64) -> AggregationTuple {
        let mut sums = [0.0; FACTOR_COUNT];
        sums[0] = first;
        sums[FACTOR_COUNT - 1] = -first;
        AggregationTuple { key, count, sums }
    }

    #[test]
    fn test_key_rendering() {
        assert_eq!(TimeKey::per_day(20240102, time(93003)).to_string(), "20240102_093003");
        assert_eq!(TimeKey::time_of_day(time(93003)).to_string(), "093003");
        assert_eq!(TimeKey::time_of_day(time(130000)).to_string(), "130000");
    }

    #[test]
    fn test_key_parse() {
        let key: TimeKey = "20240102_093003".parse().unwrap();
        assert_eq!(key, TimeKey::per_day(20240102, time(93003)));
        assert_eq!(key.scope(), TimeKeyScope::TradingDay);

        let key: TimeKey = "093003".parse().unwrap();
        assert_eq!(key, TimeKey::time_of_day(time(93003)));

        assert!("0930xx".parse::<TimeKey>().is_err());
        assert!("20240102_250000".parse::<TimeKey>().is_err());
    }

    #[test]
    fn test_key_ordering_is_chronological() {
        let a = TimeKey::per_day(20240102, time(145959));
        let b = TimeKey::per_day(20240103, time(93000));
        assert!(a < b);
        assert!(TimeKey::time_of_day(time(93000)) < TimeKey::time_of_day(time(130000)));
    }

    #[test]
    fn test_merge_sums_counts_and_factors() {
        let key = TimeKey::time_of_day(time(93003));
        let merged = tuple_with(key, 1.0, 1).merge(&tuple_with(key, 3.0, 2));
        assert_eq!(merged.count, 3);
        assert_eq!(merged.sums[0], 4.0);
        assert_eq!(merged.sums[FACTOR_COUNT - 1], -4.0);
    }

    #[test]
    fn test_empty_is_identity() {
        let key = TimeKey::time_of_day(time(93003));
        let t = tuple_with(key, 2.5, 4);
        assert_eq!(AggregationTuple::empty(key).merge(&t), t);
        assert_eq!(t.clone().merge(&AggregationTuple::empty(key)), t);
    }

    #[test]
    #[should_panic(expected = "different keys")]
    fn test_merge_rejects_other_key() {
        let a = tuple_with(TimeKey::time_of_day(time(93003)), 1.0, 1);
        let b = tuple_with(TimeKey::time_of_day(time(93006)), 1.0, 1);
        let _ = a.merge(&b);
    }

    #[test]
    fn test_mean() {
        let key = TimeKey::time_of_day(time(93003));
        let t = tuple_with(key, 4.0, 2);
        assert_eq!(t.mean().unwrap().factor(1), 2.0);
        assert!(AggregationTuple::empty(key).mean().is_none());
    }

    #[test]
    fn test_wire_format() {
        let key = TimeKey::per_day(20240102, time(93003));
        let t = tuple_with(key, 1.5, 2);
        let line = t.encode();

        assert!(line.starts_with("20240102_093003\t2|1.500000,0.000000,"));
        assert!(line.ends_with(",-1.500000"));
        assert_eq!(line.split('|').nth(1).unwrap().split(',').count(), FACTOR_COUNT);

        assert_eq!(AggregationTuple::decode(&line).unwrap(), t);
    }

    #[test]
    fn test_decode_rejects_malformed() {
        assert!(AggregationTuple::decode("093003 1|1.0").is_err());
        assert!(AggregationTuple::decode("093003\t1 1.0").is_err());
        assert!(AggregationTuple::decode("093003\tx|1.0").is_err());
        assert!(AggregationTuple::decode("093003\t1|1.0,2.0").is_err());

        let too_many = format!("093003\t1|{}", vec!["0.0"; FACTOR_COUNT + 1].join(","));
        assert!(AggregationTuple::decode(&too_many).is_err());
    }
}
