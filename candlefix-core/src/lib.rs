//! candlefix-core
//!
//! Core types, traits, and algorithms shared across the candlefix workspace.
//!
//! - `types`: candle rows, keys, configuration, errors and reports.
//! - `repository`: the `CandleRepository` trait every store adapter implements.
//! - `timeseries`: interval calendar, duplicate merge and continuity repair.
//!
//! Async runtime (Tokio)
//! ---------------------
//! `cancel::CancelToken` is built on `tokio::sync::watch`, so code that
//! cancels runs must live under a Tokio 1.x runtime. The algorithms in
//! `timeseries` are synchronous and runtime-agnostic.
//!
#![warn(missing_docs)]

/// Cooperative cancellation token.
pub mod cancel;
/// Middleware trait implemented by repository wrappers.
pub mod middleware;
/// Storage abstraction for candle partitions.
pub mod repository;
/// Time-series algorithms for bucketing, merging and continuity.
pub mod timeseries;
pub mod types;

pub use cancel::{CancelHandle, CancelToken, cancel_pair};
pub use middleware::Middleware;
pub use repository::{CandleRepository, WriteCondition};
pub use timeseries::calendar::{THREE_DAYS_MS, bucket_start, is_bucket_aligned};
pub use timeseries::continuity::{
    CONTINUITY_TOLERANCE, continuity_violations, repair_continuity, within_tolerance,
};
pub use timeseries::merge::{DedupOutcome, MergeOutcome, dedupe_series, group_by_bucket, merge_group};
pub use timeseries::util::{ensure_single_partition, is_well_formed, widen_to_fit};
pub use types::*;
