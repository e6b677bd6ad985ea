//! Data transfer objects and configuration primitives shared by every candlefix crate.
#![warn(missing_docs)]

mod candle;
mod config;
mod error;
mod interval;
mod middleware;
mod reports;

pub use candle::{Candle, CandleKey, PartitionKey};
pub use config::{DomainConfig, MarketDomain, RepairConfig, RetryConfig};
pub use error::RepairError;
pub use interval::Interval;
pub use middleware::{MiddlewareLayer, MiddlewareStack};
pub use reports::{
    CACHE_INVALIDATION_NOTICE, DomainReport, DomainStatus, PartitionFailure, PartitionOutcome,
    PartitionReport, RepairReport, RepairStats,
};
