//! Candle granularities stored by the candle producers.

use std::fmt;
use std::str::FromStr;

use chrono::TimeDelta;
use serde::{Deserialize, Serialize};

use crate::error::RepairError;

/// One of the fixed candle granularities.
///
/// The wire form (`"1m"`, `"4h"`, `"1w"`, ...) is the value stored in the
/// `interval` partition-key column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Interval {
    /// One minute.
    #[serde(rename = "1m")]
    M1,
    /// Three minutes.
    #[serde(rename = "3m")]
    M3,
    /// Five minutes.
    #[serde(rename = "5m")]
    M5,
    /// Fifteen minutes.
    #[serde(rename = "15m")]
    M15,
    /// Thirty minutes.
    #[serde(rename = "30m")]
    M30,
    /// One hour.
    #[serde(rename = "1h")]
    H1,
    /// Two hours.
    #[serde(rename = "2h")]
    H2,
    /// Four hours.
    #[serde(rename = "4h")]
    H4,
    /// Six hours.
    #[serde(rename = "6h")]
    H6,
    /// Twelve hours.
    #[serde(rename = "12h")]
    H12,
    /// One UTC calendar day.
    #[serde(rename = "1d")]
    D1,
    /// Three days, aligned to the Unix epoch rather than to the calendar.
    #[serde(rename = "3d")]
    D3,
    /// One week starting on Sunday 00:00 UTC.
    #[serde(rename = "1w")]
    W1,
}

impl Interval {
    /// Every supported interval, finest first. This is the order partitions are planned in.
    pub const ALL: [Self; 13] = [
        Self::M1,
        Self::M3,
        Self::M5,
        Self::M15,
        Self::M30,
        Self::H1,
        Self::H2,
        Self::H4,
        Self::H6,
        Self::H12,
        Self::D1,
        Self::D3,
        Self::W1,
    ];

    /// Wire representation as stored in the `interval` column.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::M1 => "1m",
            Self::M3 => "3m",
            Self::M5 => "5m",
            Self::M15 => "15m",
            Self::M30 => "30m",
            Self::H1 => "1h",
            Self::H2 => "2h",
            Self::H4 => "4h",
            Self::H6 => "6h",
            Self::H12 => "12h",
            Self::D1 => "1d",
            Self::D3 => "3d",
            Self::W1 => "1w",
        }
    }

    /// Nominal bucket width. Calendar-aligned buckets (`1d`, `1w`) never vary in
    /// length since all bucketing happens in UTC.
    #[must_use]
    pub const fn nominal_duration(self) -> TimeDelta {
        match self {
            Self::M1 => TimeDelta::minutes(1),
            Self::M3 => TimeDelta::minutes(3),
            Self::M5 => TimeDelta::minutes(5),
            Self::M15 => TimeDelta::minutes(15),
            Self::M30 => TimeDelta::minutes(30),
            Self::H1 => TimeDelta::hours(1),
            Self::H2 => TimeDelta::hours(2),
            Self::H4 => TimeDelta::hours(4),
            Self::H6 => TimeDelta::hours(6),
            Self::H12 => TimeDelta::hours(12),
            Self::D1 => TimeDelta::days(1),
            Self::D3 => TimeDelta::days(3),
            Self::W1 => TimeDelta::weeks(1),
        }
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Interval {
    type Err = RepairError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|i| i.as_str() == s.trim())
            .ok_or_else(|| RepairError::InvalidArg(format!("unrecognized interval '{s}'")))
    }
}
