//! Routing of time keys to reduce partitions.

use super::tuple::{AggregationTuple, TimeKey};

/// Maps a time key to a reduce partition.
///
/// Implementations must be deterministic and depend on the key alone, so
/// every tuple of one key lands in the same partition whichever worker
/// produced it.
pub trait KeyRouter: Send + Sync {
    /// Partition index in `0..partitions`.
    fn route(&self, key: &TimeKey, partitions: usize) -> usize;
}

/// Routes by a fixed integer hash of the key's day and time.
///
/// The hash does not depend on the Rust release or process, so partial files
/// written by one build route identically in another.
#[derive(Debug, Clone, Copy, Default)]
pub struct HashRouter;

impl HashRouter {
    /// Hash of `key`: splitmix64 over `(trading_day << 32) | hhmmss`, with
    /// time-of-day keys using day 0.
    #[inline]
    pub fn key_hash(key: &TimeKey) -> u64 {
        let day = u64::from(key.trading_day().unwrap_or(0));
        let time = u64::from(key.trade_time().hhmmss());
        splitmix64((day << 32) | time)
    }
}

impl KeyRouter for HashRouter {
    #[inline]
    fn route(&self, key: &TimeKey, partitions: usize) -> usize {
        assert!(partitions > 0, "partition count must be > 0");
        (Self::key_hash(key) % partitions as u64) as usize
    }
}

#[inline]
fn splitmix64(x: u64) -> u64 {
    let mut z = x.wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Split `tuples` into `partitions` buckets according to `router`.
pub fn shuffle<R, I>(router: &R, tuples: I, partitions: usize) -> Vec<Vec<AggregationTuple>>
where
    R: KeyRouter + ?Sized,
    I: IntoIterator<Item = AggregationTuple>,
{
    assert!(partitions > 0, "partition count must be > 0");
    let mut buckets: Vec<Vec<AggregationTuple>> = (0..partitions).map(|_| Vec::new()).collect();
    for tuple in tuples {
        let idx = router.route(&tuple.key, partitions);
        buckets[idx].push(tuple);
    }
    buckets
}
