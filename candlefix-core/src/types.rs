//! Re-export of foundational types from `candlefix-types`.
// Consolidated re-exports so downstream crates can depend on `candlefix-core` only

pub use candlefix_types::{Candle, CandleKey, Interval, PartitionKey};
pub use candlefix_types::{
    DomainConfig, MarketDomain, MiddlewareLayer, MiddlewareStack, RepairConfig, RepairError,
    RetryConfig,
};
pub use candlefix_types::{
    CACHE_INVALIDATION_NOTICE, DomainReport, DomainStatus, PartitionFailure, PartitionOutcome,
    PartitionReport, RepairReport, RepairStats,
};

pub use rust_decimal::Decimal;
