//! Analysis modules.
//!
//! Pure computations over already-fetched records: normalization,
//! aggregation, and schedule conflict detection. Nothing here does I/O.

pub mod aggregator;
pub mod conflicts;
pub mod normalize;

pub use aggregator::*;
pub use conflicts::*;
