//! Local pre-aggregation: collapse tuples to one per time key.
//!
//! Only sums and counts are accumulated; division is left to the reducer, so
//! the combiner can be applied to its own output any number of times.

use ahash::AHashMap;

use super::tuple::{AggregationTuple, TimeKey};
use crate::features::FactorVector;

/// Accumulates tuples by time key.
#[derive(Debug, Clone, Default)]
pub struct LocalCombiner {
    groups: AHashMap<TimeKey, AggregationTuple>,
    tuples_in: u64,
}

impl LocalCombiner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge one tuple into its key's group.
    #[inline]
    pub fn push(&mut self, tuple: AggregationTuple) {
        self.tuples_in += 1;
        match self.groups.get_mut(&tuple.key) {
            Some(group) => group.absorb(&tuple),
            None => {
                self.groups.insert(tuple.key, tuple);
            }
        }
    }

    /// Merge a single sample.
    #[inline]
    pub fn push_sample(&mut self, key: TimeKey, factors: &FactorVector) {
        self.push(AggregationTuple::from_sample(key, factors));
    }

    /// Number of distinct keys held.
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Tuples merged in since creation or the last drain.
    pub fn tuples_in(&self) -> u64 {
        self.tuples_in
    }

    /// Take the combined tuples (one per key, unordered), leaving the
    /// combiner empty.
    pub fn drain(&mut self) -> Vec<AggregationTuple> {
        self.tuples_in = 0;
        self.groups.drain().map(|(_, tuple)| tuple).collect()
    }

    pub fn into_tuples(self) -> Vec<AggregationTuple> {
        self.groups.into_values().collect()
    }
}

impl Extend<AggregationTuple> for LocalCombiner {
    fn extend<I: IntoIterator<Item = AggregationTuple>>(&mut self, iter: I) {
        for tuple in iter {
            self.push(tuple);
        }
    }
}

impl FromIterator<AggregationTuple> for LocalCombiner {
    fn from_iter<I: IntoIterator<Item = AggregationTuple>>(iter: I) -> Self {
        let mut combiner = LocalCombiner::new();
        combiner.extend(iter);
        combiner
    }
}

/// Combine a batch of tuples into one tuple per distinct key.
pub fn combine<I>(tuples: I) -> Vec<AggregationTuple>
where
    I: IntoIterator<Item = AggregationTuple>,
{
    tuples.into_iter().collect::<LocalCombiner>().into_tuples()
}
