//! Bounded LRU store of per-instrument previous-tick state.
//!
//! # Layout
//!
//! Nodes live in a `Vec` arena and are linked into an intrusive doubly-linked
//! recency list by index (head = most recently used, tail = least recently
//! used). Freed slots are recycled through a free list, so the arena never
//! grows past `capacity` nodes.
//!
//! The index is keyed by instrument first and trading day second. Lookups
//! borrow the instrument as `&str` (no allocation on the hot path), and
//! `invalidate` drops every day of one instrument without scanning the store.
//!
//! # Performance
//!
//! - `lookup`, `upsert`: O(1) amortized
//! - `invalidate`: O(days retained for the instrument), normally 1
//! - Memory: `capacity` nodes plus one index entry per resident instrument

use ahash::AHashMap;

use crate::types::PreviousState;

/// Default store capacity, sized to a typical instrument universe.
pub const DEFAULT_STATE_CAPACITY: usize = 500;

const NIL: usize = usize::MAX;

/// Borrowed key of one store entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StateKey<'a> {
    pub instrument: &'a str,
    pub trading_day: u32,
}

impl<'a> StateKey<'a> {
    #[inline]
    pub fn new(instrument: &'a str, trading_day: u32) -> Self {
        Self {
            instrument,
            trading_day,
        }
    }
}

/// Counters describing how the store has been used.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStats {
    /// Lookups that found an entry
    pub hits: u64,
    /// Lookups that found nothing
    pub misses: u64,
    /// Upserts that created a new entry
    pub inserts: u64,
    /// Upserts that overwrote an existing entry
    pub replacements: u64,
    /// Entries dropped to make room for a new key
    pub evictions: u64,
    /// Entries dropped by `invalidate`
    pub invalidations: u64,
}

impl StoreStats {
    /// Fraction of lookups that hit, or 0.0 before any lookup.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    /// Add another store's counters into this one.
    pub fn absorb(&mut self, other: &StoreStats) {
        self.hits += other.hits;
        self.misses += other.misses;
        self.inserts += other.inserts;
        self.replacements += other.replacements;
        self.evictions += other.evictions;
        self.invalidations += other.invalidations;
    }
}

#[derive(Debug, Clone)]
struct Node {
    instrument: String,
    trading_day: u32,
    state: PreviousState,
    prev: usize,
    next: usize,
}

/// Bounded per-(instrument, trading-day) store of [`PreviousState`].
///
/// Values are copied in on `upsert` and copied out on `lookup`; nothing
/// outside the store ever holds a reference into it.
///
/// # Example
///
/// ```
/// use lob_factor_aggregator::state::{InstrumentStateStore, StateKey};
/// use lob_factor_aggregator::types::{PreviousState, Snapshot, TradeTime};
///
/// let mut store = InstrumentStateStore::new(2);
/// let t = TradeTime::from_hhmmss(93003).unwrap();
/// let snap = Snapshot::new(20240102, t, "600000").with_level(1, 100, 10, 101, 20);
///
/// let key = StateKey::new("600000", 20240102);
/// assert!(store.lookup(key).is_none());
/// store.upsert(key, PreviousState::from_snapshot(&snap));
/// assert_eq!(store.lookup(key).unwrap().best_ask, 101);
/// ```
#[derive(Debug, Clone)]
pub struct InstrumentStateStore {
    nodes: Vec<Node>,
    free: Vec<usize>,
    /// instrument -> [(trading_day, node index)]
    index: AHashMap<String, Vec<(u32, usize)>>,
    head: usize,
    tail: usize,
    len: usize,
    capacity: usize,
    stats: StoreStats,
}

impl InstrumentStateStore {
    /// Create an empty store holding at most `capacity` entries.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "state store capacity must be > 0");
        Self {
            nodes: Vec::with_capacity(capacity.min(4096)),
            free: Vec::new(),
            index: AHashMap::new(),
            head: NIL,
            tail: NIL,
            len: 0,
            capacity,
            stats: StoreStats::default(),
        }
    }

    /// Copy of the state for `key`, marking it most recently used.
    pub fn lookup(&mut self, key: StateKey<'_>) -> Option<PreviousState> {
        match self.find(key) {
            Some(idx) => {
                self.stats.hits += 1;
                self.touch(idx);
                Some(self.nodes[idx].state)
            }
            None => {
                self.stats.misses += 1;
                None
            }
        }
    }

    /// Copy of the state for `key` without updating recency or statistics.
    pub fn peek(&self, key: StateKey<'_>) -> Option<PreviousState> {
        self.find(key).map(|idx| self.nodes[idx].state)
    }

    /// Whether an entry exists for `key`. Does not update recency.
    pub fn contains(&self, key: StateKey<'_>) -> bool {
        self.find(key).is_some()
    }

    /// Insert or replace the state for `key`, marking it most recently used.
    ///
    /// Inserting a new key into a full store first evicts the least recently
    /// used entry, so the key being written is never the victim.
    pub fn upsert(&mut self, key: StateKey<'_>, state: PreviousState) {
        if let Some(idx) = self.find(key) {
            self.nodes[idx].state = state;
            self.touch(idx);
            self.stats.replacements += 1;
            return;
        }

        if self.len >= self.capacity {
            self.evict_lru();
        }

        let node = Node {
            instrument: key.instrument.to_string(),
            trading_day: key.trading_day,
            state,
            prev: NIL,
            next: NIL,
        };
        let idx = match self.free.pop() {
            Some(slot) => {
                self.nodes[slot] = node;
                slot
            }
            None => {
                self.nodes.push(node);
                self.nodes.len() - 1
            }
        };

        self.push_front(idx);
        self.index
            .entry(key.instrument.to_string())
            .or_default()
            .push((key.trading_day, idx));
        self.len += 1;
        self.stats.inserts += 1;
    }

    /// Drop every entry for `instrument`, whatever its trading day.
    ///
    /// Returns the number of entries removed.
    pub fn invalidate(&mut self, instrument: &str) -> usize {
        let Some(days) = self.index.remove(instrument) else {
            return 0;
        };

        for &(_, idx) in &days {
            self.unlink(idx);
            self.free.push(idx);
        }

        let removed = days.len();
        self.len -= removed;
        self.stats.invalidations += removed as u64;
        removed
    }

    /// Number of resident entries.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of distinct instruments with at least one entry.
    pub fn instrument_count(&self) -> usize {
        self.index.len()
    }

    #[inline]
    pub fn stats(&self) -> &StoreStats {
        &self.stats
    }

    /// Keys from most to least recently used.
    pub fn keys_by_recency(&self) -> Vec<(String, u32)> {
        let mut keys = Vec::with_capacity(self.len);
        let mut cursor = self.head;
        while cursor != NIL {
            let node = &self.nodes[cursor];
            keys.push((node.instrument.clone(), node.trading_day));
            cursor = node.next;
        }
        keys
    }

    /// Drop all entries and reset statistics.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.free.clear();
        self.index.clear();
        self.head = NIL;
        self.tail = NIL;
        self.len = 0;
        self.stats = StoreStats::default();
    }

    fn find(&self, key: StateKey<'_>) -> Option<usize> {
        self.index.get(key.instrument).and_then(|days| {
            days.iter()
                .find(|(day, _)| *day == key.trading_day)
                .map(|&(_, idx)| idx)
        })
    }

    fn evict_lru(&mut self) {
        let victim = self.tail;
        if victim == NIL {
            return;
        }
        self.unlink(victim);
        self.free.push(victim);
        self.len -= 1;
        self.stats.evictions += 1;

        let trading_day = self.nodes[victim].trading_day;
        let instrument = &self.nodes[victim].instrument;
        if let Some(days) = self.index.get_mut(instrument.as_str()) {
            days.retain(|&(day, _)| day != trading_day);
            if days.is_empty() {
                self.index.remove(instrument.as_str());
            }
        }

        log::debug!(
            "Evicted state for {} day {} (capacity {})",
            self.nodes[victim].instrument,
            trading_day,
            self.capacity
        );
    }

    fn touch(&mut self, idx: usize) {
        if self.head == idx {
            return;
        }
        self.unlink(idx);
        self.push_front(idx);
    }

    fn push_front(&mut self, idx: usize) {
        self.nodes[idx].prev = NIL;
        self.nodes[idx].next = self.head;
        if self.head != NIL {
            self.nodes[self.head].prev = idx;
        }
        self.head = idx;
        if self.tail == NIL {
            self.tail = idx;
        }
    }

    fn unlink(&mut self, idx: usize) {
        let prev = self.nodes[idx].prev;
        let next = self.nodes[idx].next;

        if prev != NIL {
            self.nodes[prev].next = next;
        } else {
            self.head = next;
        }
        if next != NIL {
            self.nodes[next].prev = prev;
        } else {
            self.tail = prev;
        }

        self.nodes[idx].prev = NIL;
        self.nodes[idx].next = NIL;
    }
}

impl Default for InstrumentStateStore {
    fn default() -> Self {
        Self::new(DEFAULT_STATE_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Snapshot, TradeTime};

    fn state(ask: i64) -> PreviousState {
        let t = TradeTime::from_hhmmss(100000).unwrap();
        let snap = Snapshot::new(20240102, t, "x").with_level(1, ask - 1, 10, ask, 10);
        PreviousState::from_snapshot(&snap)
    }

    #[test]
    fn test_lookup_miss_then_hit() {
        let mut store = InstrumentStateStore::new(4);
        let key = StateKey::new("600000", 20240102);

        assert!(store.lookup(key).is_none());
        store.upsert(key, state(101));
        assert_eq!(store.lookup(key).unwrap().best_ask, 101);

        assert_eq!(store.stats().misses, 1);
        assert_eq!(store.stats().hits, 1);
        assert_eq!(store.stats().inserts, 1);
        assert!((store.stats().hit_rate() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_upsert_replaces() {
        let mut store = InstrumentStateStore::new(4);
        let key = StateKey::new("600000", 20240102);

        store.upsert(key, state(101));
        store.upsert(key, state(105));

        assert_eq!(store.len(), 1);
        assert_eq!(store.peek(key).unwrap().best_ask, 105);
        assert_eq!(store.stats().replacements, 1);
    }

    #[test]
    fn test_eviction_drops_least_recently_used() {
        let mut store = InstrumentStateStore::new(3);
        for code in ["a", "b", "c"] {
            store.upsert(StateKey::new(code, 1), state(10));
        }

        // Refresh "a" so "b" becomes the LRU entry
        assert!(store.lookup(StateKey::new("a", 1)).is_some());

        store.upsert(StateKey::new("d", 1), state(10));

        assert_eq!(store.len(), 3);
        assert_eq!(store.stats().evictions, 1);
        assert!(!store.contains(StateKey::new("b", 1)));
        assert!(store.contains(StateKey::new("a", 1)));
        assert!(store.contains(StateKey::new("c", 1)));
        assert!(store.contains(StateKey::new("d", 1)));
    }

    #[test]
    fn test_capacity_one_keeps_newest() {
        let mut store = InstrumentStateStore::new(1);
        store.upsert(StateKey::new("a", 1), state(10));
        store.upsert(StateKey::new("b", 1), state(20));

        assert_eq!(store.len(), 1);
        assert_eq!(store.peek(StateKey::new("b", 1)).unwrap().best_ask, 20);
        assert!(!store.contains(StateKey::new("a", 1)));
    }

    #[test]
    fn test_invalidate_drops_all_days() {
        let mut store = InstrumentStateStore::new(8);
        store.upsert(StateKey::new("a", 1), state(10));
        store.upsert(StateKey::new("a", 2), state(11));
        store.upsert(StateKey::new("b", 1), state(12));

        assert_eq!(store.invalidate("a"), 2);
        assert_eq!(store.invalidate("a"), 0);
        assert_eq!(store.len(), 1);
        assert_eq!(store.instrument_count(), 1);
        assert_eq!(store.stats().invalidations, 2);
        assert_eq!(store.keys_by_recency(), vec![("b".to_string(), 1)]);
    }

    #[test]
    fn test_slots_are_recycled() {
        let mut store = InstrumentStateStore::new(2);
        for i in 0..100u32 {
            store.upsert(StateKey::new("a", i), state(10));
        }
        assert_eq!(store.len(), 2);
        assert!(store.nodes.len() <= 2);
        assert_eq!(
            store.keys_by_recency(),
            vec![("a".to_string(), 99), ("a".to_string(), 98)]
        );
    }

    #[test]
    fn test_recency_order() {
        let mut store = InstrumentStateStore::new(4);
        store.upsert(StateKey::new("a", 1), state(10));
        store.upsert(StateKey::new("b", 1), state(10));
        store.upsert(StateKey::new("c", 1), state(10));
        store.lookup(StateKey::new("a", 1));

        let order: Vec<String> = store
            .keys_by_recency()
            .into_iter()
            .map(|(code, _)| code)
            .collect();
        assert_eq!(order, vec!["a", "c", "b"]);
    }

    #[test]
    fn test_clear() {
        let mut store = InstrumentStateStore::new(4);
        store.upsert(StateKey::new("a", 1), state(10));
        store.clear();
        assert!(store.is_empty());
        assert_eq!(store.stats(), &StoreStats::default());
        assert!(store.lookup(StateKey::new("a", 1)).is_none());
    }

    #[test]
    #[should_panic(expected = "capacity must be > 0")]
    fn test_zero_capacity_rejected() {
        let _ = InstrumentStateStore::new(0);
    }
}
