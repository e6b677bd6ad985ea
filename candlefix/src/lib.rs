//! Candlefix repairs OHLCV candle partitions in a wide-column store.
//!
//! Overview
//! - Enumerates every `(symbol, interval)` partition of each market domain's
//!   keyspace through a [`CandleRepository`].
//! - Merges rows that landed in the same interval bucket into one canonical
//!   row and deletes the surplus.
//! - Chains every open to the previous candle's close, widening high/low so
//!   the candle stays well-formed.
//! - Folds per-partition outcomes into a [`RepairReport`].
//!
//! Key behaviors and trade-offs
//! - Writes: each changed row is updated exactly once with its final values,
//!   then surplus rows are deleted. An interruption between the two leaves
//!   surplus rows that a re-run folds in again, so their volume can be
//!   counted twice; it is never lost.
//! - Concurrency: partitions are independent units fed to a bounded pool
//!   (`concurrency`, default 1). More workers shorten the run and add load.
//! - Guarded writes: optional optimistic concurrency on `updatedAt`. A racing
//!   ingester then fails the partition instead of being overwritten.
//! - Dry run: the full plan is computed and reported, nothing is written.
//! - Cancellation: checked between partitions; applied writes stay applied.
//!
//! Examples
//! ```rust,ignore
//! use std::sync::Arc;
//! use candlefix::{CancelToken, Interval, Repairer};
//! use candlefix_middleware::RepositoryBuilder;
//!
//! let repo = RepositoryBuilder::new(raw)
//!     .with_timeout(std::time::Duration::from_secs(10))
//!     .with_retry(candlefix::RetryConfig::default())
//!     .build();
//!
//! let report = Repairer::builder()
//!     .with_repository(repo)
//!     .intervals(&[Interval::H1, Interval::D1])
//!     .dry_run(true)
//!     .build()?
//!     .run(&CancelToken::never())
//!     .await?;
//! println!("{report}");
//! ```
#![warn(missing_docs)]

pub(crate) mod core;
mod plan;

pub use core::{Repairer, RepairerBuilder};
pub use plan::{ApplyError, PartitionPlan, PlannedDelete, PlannedUpdate};

pub use candlefix_middleware::{RepositoryBuilder, RetryMiddleware, TimeoutMiddleware};

// Re-export core types for convenience
pub use candlefix_core::{
    CACHE_INVALIDATION_NOTICE, CancelHandle, CancelToken, Candle, CandleKey, CandleRepository,
    Decimal, DomainConfig, DomainReport, DomainStatus, Interval, MarketDomain, PartitionFailure,
    PartitionKey, PartitionOutcome, PartitionReport, RepairConfig, RepairError, RepairReport,
    RepairStats, RetryConfig, WriteCondition, cancel_pair,
};
