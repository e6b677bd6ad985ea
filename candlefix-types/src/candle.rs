//! Persisted candle rows and their keys.

use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::interval::Interval;

/// Identity of a `(symbol, interval)` partition.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PartitionKey {
    /// Trading-pair identifier, e.g. `BTC/USDT`.
    pub symbol: String,
    /// Candle granularity.
    pub interval: Interval,
}

impl PartitionKey {
    /// Convenience constructor.
    pub fn new(symbol: impl Into<String>, interval: Interval) -> Self {
        Self {
            symbol: symbol.into(),
            interval,
        }
    }
}

impl fmt::Display for PartitionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.symbol, self.interval)
    }
}

/// Full row identity: partition plus the `createdAt` clustering column.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CandleKey {
    /// Trading-pair identifier.
    pub symbol: String,
    /// Candle granularity.
    pub interval: Interval,
    /// Clustering timestamp of the row.
    pub created_at: DateTime<Utc>,
}

impl fmt::Display for CandleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}@{}/{}",
            self.symbol,
            self.interval,
            self.created_at.to_rfc3339()
        )
    }
}

/// One OHLCV row as stored in the `candles` table.
///
/// `high`, `low` and `volume` map nullable columns. A missing `volume` counts
/// as zero wherever volumes are summed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candle {
    /// Trading-pair identifier.
    pub symbol: String,
    /// Candle granularity.
    pub interval: Interval,
    /// Row identity timestamp; never rewritten in place.
    pub created_at: DateTime<Utc>,
    /// Last-modified marker.
    pub updated_at: Option<DateTime<Utc>>,
    /// Opening price.
    pub open: Decimal,
    /// Highest price, if recorded.
    pub high: Option<Decimal>,
    /// Lowest price, if recorded.
    pub low: Option<Decimal>,
    /// Closing price.
    pub close: Decimal,
    /// Traded volume, if recorded.
    pub volume: Option<Decimal>,
}

impl Candle {
    /// Full row key of this candle.
    #[must_use]
    pub fn key(&self) -> CandleKey {
        CandleKey {
            symbol: self.symbol.clone(),
            interval: self.interval,
            created_at: self.created_at,
        }
    }

    /// Partition this candle belongs to.
    #[must_use]
    pub fn partition(&self) -> PartitionKey {
        PartitionKey::new(self.symbol.clone(), self.interval)
    }

    /// Volume with a missing value read as zero.
    #[must_use]
    pub fn volume_or_zero(&self) -> Decimal {
        self.volume.unwrap_or(Decimal::ZERO)
    }
}
