//! Pure time-series logic for candle partitions.
//!
//! Modules include:
//! - `calendar`: bucket boundaries per interval
//! - `merge`: collapse rows that share a bucket
//! - `continuity`: align each open with the previous close
/// Bucket start computation per interval.
pub mod calendar;
/// Open-to-previous-close correction.
pub mod continuity;
/// Duplicate bucket merging.
pub mod merge;
/// Invariant checks shared by the algorithms and the orchestrator.
pub mod util;
