//! Configuration types shared across the orchestrator, middleware and adapters.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::RepairError;
use crate::interval::Interval;

/// Market domain whose candles live in their own keyspace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarketDomain {
    /// Spot / ecosystem markets.
    Spot,
    /// Futures markets.
    Futures,
}

impl MarketDomain {
    /// Short label used in logs and reports.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Spot => "spot",
            Self::Futures => "futures",
        }
    }
}

impl fmt::Display for MarketDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MarketDomain {
    type Err = RepairError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "spot" | "ecosystem" => Ok(Self::Spot),
            "futures" => Ok(Self::Futures),
            other => Err(RepairError::InvalidArg(format!(
                "unrecognized market domain '{other}'"
            ))),
        }
    }
}

/// Binding of a market domain to the keyspace that stores its candles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainConfig {
    /// Which domain this is.
    pub domain: MarketDomain,
    /// Keyspace holding the domain's `candles` table.
    pub keyspace: String,
}

impl DomainConfig {
    /// Convenience constructor.
    pub fn new(domain: MarketDomain, keyspace: impl Into<String>) -> Self {
        Self {
            domain,
            keyspace: keyspace.into(),
        }
    }
}

/// Exponential backoff configuration for retrying transient store errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Retries after the first attempt; zero disables retrying.
    pub max_retries: u32,
    /// Delay before the first retry in milliseconds.
    pub min_backoff_ms: u64,
    /// Upper bound for any single delay in milliseconds.
    pub max_backoff_ms: u64,
    /// Exponential factor applied after each failure (>= 1).
    pub factor: u32,
    /// Random jitter percentage [0, 100] added to each delay.
    pub jitter_percent: u8,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            min_backoff_ms: 200,
            max_backoff_ms: 5_000,
            factor: 2,
            jitter_percent: 20,
        }
    }
}

impl RetryConfig {
    /// Base delay (without jitter) before retry number `attempt` (0-indexed).
    #[must_use]
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let factor = u64::from(self.factor.max(1));
        let mut ms = self.min_backoff_ms;
        for _ in 0..attempt {
            ms = ms.saturating_mul(factor);
            if ms >= self.max_backoff_ms {
                break;
            }
        }
        Duration::from_millis(ms.min(self.max_backoff_ms))
    }
}

/// Configuration of a repair run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepairConfig {
    /// Domains to process, in order.
    pub domains: Vec<DomainConfig>,
    /// Intervals to process for every symbol.
    pub intervals: Vec<Interval>,
    /// Restrict the run to these symbols; `None` processes every stored symbol.
    pub symbols: Option<Vec<String>>,
    /// Maximum number of partitions processed concurrently.
    pub concurrency: usize,
    /// Compute and report all changes without writing them.
    pub dry_run: bool,
    /// Condition every write on the row's `updatedAt` being unchanged since it was read.
    pub guard_writes: bool,
}

impl Default for RepairConfig {
    fn default() -> Self {
        Self {
            domains: vec![
                DomainConfig::new(MarketDomain::Spot, "ecosystem"),
                DomainConfig::new(MarketDomain::Futures, "futures"),
            ],
            intervals: Interval::ALL.to_vec(),
            symbols: None,
            concurrency: 1,
            dry_run: false,
            guard_writes: false,
        }
    }
}
