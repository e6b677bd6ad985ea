use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::timeseries::calendar::bucket_start;
use crate::{Candle, Interval};

/// Result of collapsing one bucket group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeOutcome {
    /// Surviving row, keyed by the earliest-arriving input.
    pub canonical: Candle,
    /// Rows folded into `canonical` that must be deleted.
    pub discarded: Vec<Candle>,
}

impl MergeOutcome {
    /// True when the group was already a single row.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.discarded.is_empty()
    }
}

fn max_opt(a: Option<Decimal>, b: Option<Decimal>) -> Option<Decimal> {
    match (a, b) {
        (Some(x), Some(y)) => Some(x.max(y)),
        (x, None) => x,
        (None, y) => y,
    }
}

fn min_opt(a: Option<Decimal>, b: Option<Decimal>) -> Option<Decimal> {
    match (a, b) {
        (Some(x), Some(y)) => Some(x.min(y)),
        (x, None) => x,
        (None, y) => y,
    }
}

/// Merge candles that share one `(symbol, interval, bucket)` into a single row.
///
/// Rows are ordered by their raw `created_at` (arrival order). The earliest row
/// seeds the result and keeps its `open` and key; the rest fold in with
/// `high = max`, `low = min`, `close = last`, `volume = sum` (a missing volume
/// counts as zero). A single-row group comes back unchanged.
///
/// Returns `None` for an empty group.
#[must_use]
pub fn merge_group(mut candles: Vec<Candle>) -> Option<MergeOutcome> {
    if candles.len() <= 1 {
        return candles.pop().map(|canonical| MergeOutcome {
            canonical,
            discarded: Vec::new(),
        });
    }
    candles.sort_by_key(|c| c.created_at);

    let mut iter = candles.into_iter();
    let mut canonical = iter.next()?;
    let mut discarded = Vec::with_capacity(iter.len());
    for row in iter {
        canonical.high = max_opt(canonical.high, row.high);
        canonical.low = min_opt(canonical.low, row.low);
        canonical.close = row.close;
        canonical.volume = Some(canonical.volume_or_zero() + row.volume_or_zero());
        discarded.push(row);
    }
    Some(MergeOutcome {
        canonical,
        discarded,
    })
}

/// Group rows by the start of the bucket their `created_at` falls in.
#[must_use]
pub fn group_by_bucket(
    candles: Vec<Candle>,
    interval: Interval,
) -> BTreeMap<DateTime<Utc>, Vec<Candle>> {
    let mut groups: BTreeMap<DateTime<Utc>, Vec<Candle>> = BTreeMap::new();
    for c in candles {
        groups
            .entry(bucket_start(c.created_at, interval))
            .or_default()
            .push(c);
    }
    groups
}

/// A partition reduced to one row per bucket.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DedupOutcome {
    /// One candle per bucket, ascending by bucket start.
    pub series: Vec<Candle>,
    /// Indices into `series` of rows that absorbed duplicates and need writing.
    pub merged: Vec<usize>,
    /// Surplus rows to delete.
    pub discarded: Vec<Candle>,
}

/// Collapse every duplicate bucket of one partition.
///
/// The input may arrive in any order and may contain rows whose `created_at`
/// is not bucket-aligned; each such row still belongs to the bucket it falls in.
#[must_use]
pub fn dedupe_series(candles: Vec<Candle>, interval: Interval) -> DedupOutcome {
    let groups = group_by_bucket(candles, interval);
    let mut out = DedupOutcome {
        series: Vec::with_capacity(groups.len()),
        ..DedupOutcome::default()
    };
    for (_bucket, group) in groups {
        let Some(merged) = merge_group(group) else {
            continue;
        };
        if !merged.is_noop() {
            #[cfg(feature = "tracing")]
            tracing::debug!(
                key = %merged.canonical.key(),
                discarded = merged.discarded.len(),
                "merged duplicate candles"
            );
            out.merged.push(out.series.len());
            out.discarded.extend(merged.discarded);
        }
        out.series.push(merged.canonical);
    }
    out
}
