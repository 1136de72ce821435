//! Global aggregation: merge every partial for a key, then divide once.

use std::fmt;

use ahash::AHashMap;

use super::tuple::{AggregationTuple, TimeKey};
use crate::features::{catalogue, FactorVector};

/// Mean factor values for one time key.
#[derive(Debug, Clone, PartialEq)]
pub struct FactorRow {
    pub key: TimeKey,
    /// Samples averaged into this row
    pub sample_count: u64,
    pub means: FactorVector,
}

impl FactorRow {
    /// Header line of the final output.
    pub fn csv_header() -> String {
        std::iter::once("tradeTime")
            .chain(catalogue::column_names())
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Back to a (count, sums) tuple, so finished rows from separate runs
    /// can be merged again.
    pub fn to_tuple(&self) -> AggregationTuple {
        let n = self.sample_count as f64;
        let mut sums = self.means.into_array();
        for sum in sums.iter_mut() {
            *sum *= n;
        }
        AggregationTuple {
            key: self.key,
            count: self.sample_count,
            sums,
        }
    }
}

impl fmt::Display for FactorRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key)?;
        for value in self.means.iter() {
            write!(f, ",{:.6}", value)?;
        }
        Ok(())
    }
}

/// Terminal merge-and-average stage.
///
/// Accepts partial tuples in any order and any pre-aggregation depth;
/// [`finish`](Self::finish) must only be called once every partial for the
/// keys it holds has been accepted.
#[derive(Debug, Clone, Default)]
pub struct GlobalAggregator {
    totals: AHashMap<TimeKey, AggregationTuple>,
}

impl GlobalAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn accept(&mut self, tuple: &AggregationTuple) {
        match self.totals.get_mut(&tuple.key) {
            Some(total) => total.absorb(tuple),
            None => {
                self.totals.insert(tuple.key, tuple.clone());
            }
        }
    }

    pub fn accept_all<'a, I>(&mut self, tuples: I)
    where
        I: IntoIterator<Item = &'a AggregationTuple>,
    {
        for tuple in tuples {
            self.accept(tuple);
        }
    }

    /// Number of keys seen so far.
    pub fn key_count(&self) -> usize {
        self.totals.len()
    }

    /// Emit one row per key with a non-zero sample count, sorted by key.
    pub fn finish(self) -> Vec<FactorRow> {
        let mut rows: Vec<FactorRow> = self
            .totals
            .into_values()
            .filter_map(|total| {
                total.mean().map(|means| FactorRow {
                    key: total.key,
                    sample_count: total.count,
                    means,
                })
            })
            .collect();
        rows.sort_by_key(|row| row.key);
        rows
    }
}

/// Reduce one partition's tuples to averaged rows.
pub fn reduce_partition(tuples: &[AggregationTuple]) -> Vec<FactorRow> {
    let mut aggregator = GlobalAggregator::new();
    aggregator.accept_all(tuples);
    aggregator.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregation::combiner::combine;
    use crate::features::FACTOR_COUNT;
    use crate::types::TradeTime;

    fn key(hhmmss: u32) -> TimeKey {
        TimeKey::time_of_day(TradeTime::from_hhmmss(hhmmss).unwrap())
    }

    fn sample(k: TimeKey, first: f64) -> AggregationTuple {
        let mut values = [0.0; FACTOR_COUNT];
        values[0] = first;
        AggregationTuple::from_sample(k, &FactorVector::from_array(values))
    }

    #[test]
    fn test_average_of_two_instruments() {
        let a = sample(key(93003), 1.0);
        let b = sample(key(93003), 3.0);

        let direct = reduce_partition(&[a.clone(), b.clone()]);
        let combined = reduce_partition(&combine(vec![a, b]));

        assert_eq!(direct.len(), 1);
        assert_eq!(direct[0].means.factor(1), 2.0);
        assert_eq!(direct[0].sample_count, 2);
        assert_eq!(direct, combined);
    }

    #[test]
    fn test_zero_count_keys_dropped() {
        let rows = reduce_partition(&[
            AggregationTuple::empty(key(93003)),
            sample(key(93006), 2.0),
        ]);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].key, key(93006));
    }

    #[test]
    fn test_rows_sorted_by_key() {
        let rows = reduce_partition(&[
            sample(key(130000), 1.0),
            sample(key(93003), 1.0),
            sample(key(100000), 1.0),
        ]);
        let keys: Vec<String> = rows.iter().map(|r| r.key.to_string()).collect();
        assert_eq!(keys, vec!["093003", "100000", "130000"]);
    }

    #[test]
    fn test_row_format() {
        let rows = reduce_partition(&[sample(key(93003), 1.0), sample(key(93003), 2.0)]);
        let line = rows[0].to_string();
        assert!(line.starts_with("093003,1.500000,0.000000,"));
        assert_eq!(line.split(',').count(), FACTOR_COUNT + 1);
    }

    #[test]
    fn test_header() {
        let header = FactorRow::csv_header();
        assert!(header.starts_with("tradeTime,alpha_1,alpha_2,"));
        assert!(header.ends_with(",alpha_20"));
        assert_eq!(header.split(',').count(), FACTOR_COUNT + 1);
    }

    #[test]
    fn test_rows_merge_across_runs() {
        let first = reduce_partition(&[sample(key(93003), 1.0), sample(key(93003), 2.0)]);
        let second = reduce_partition(&[sample(key(93003), 6.0)]);

        let merged = reduce_partition(&[first[0].to_tuple(), second[0].to_tuple()]);
        assert_eq!(merged[0].sample_count, 3);
        assert!((merged[0].means.factor(1) - 3.0).abs() < 1e-12);
    }
}
