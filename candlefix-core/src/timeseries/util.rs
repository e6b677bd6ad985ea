//! Shared invariant checks for candle series.

use crate::{Candle, PartitionKey, RepairError};

/// True when `low <= open <= high` and `low <= close <= high`.
///
/// A missing `high` or `low` bounds nothing on that side.
#[must_use]
pub fn is_well_formed(c: &Candle) -> bool {
    let under_high = |v| c.high.is_none_or(|h| v <= h);
    let over_low = |v| c.low.is_none_or(|l| l <= v);
    under_high(c.open) && under_high(c.close) && over_low(c.open) && over_low(c.close)
}

/// Widen `high`/`low` until they bound both `open` and `close`.
///
/// A missing bound stays missing. Returns true when either bound moved.
pub fn widen_to_fit(c: &mut Candle) -> bool {
    let top = c.open.max(c.close);
    let bottom = c.open.min(c.close);
    let mut moved = false;
    if c.high.is_some_and(|h| h < top) {
        c.high = Some(top);
        moved = true;
    }
    if c.low.is_some_and(|l| l > bottom) {
        c.low = Some(bottom);
        moved = true;
    }
    moved
}

/// Ensure every row belongs to `partition`.
///
/// # Errors
/// Returns `Err(RepairError::Data)` for the first row from another partition.
pub fn ensure_single_partition(partition: &PartitionKey, rows: &[Candle]) -> Result<(), RepairError> {
    match rows
        .iter()
        .find(|c| c.symbol != partition.symbol || c.interval != partition.interval)
    {
        Some(stray) => Err(RepairError::Data(format!(
            "row {} returned for partition {partition}",
            stray.key()
        ))),
        None => Ok(()),
    }
}
