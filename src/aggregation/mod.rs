//! Two-stage aggregation of factor samples into per-key means.
//!
//! # Architecture
//!
//! ```text
//! samples → LocalCombiner (0..n rounds) → KeyRouter shuffle → GlobalAggregator → rows
//! ```
//!
//! - `tuple`: time keys, the (count, sums) tuple and its wire format
//! - `combiner`: local pre-aggregation
//! - `router`: key-to-partition routing
//! - `reducer`: terminal merge and division
//!
//! Every stage uses [`AggregationTuple::absorb`], an element-wise sum, so the
//! final means do not depend on how the input was partitioned or how many
//! times it was combined (up to floating-point summation order).

pub mod combiner;
pub mod reducer;
pub mod router;
pub mod tuple;

pub use combiner::{combine, LocalCombiner};
pub use reducer::{reduce_partition, FactorRow, GlobalAggregator};
pub use router::{shuffle, HashRouter, KeyRouter};
pub use tuple::{AggregationTuple, TimeKey, TimeKeyScope};
