use rust_decimal::Decimal;

use crate::Candle;

/// Largest `|open - previous close|` still treated as continuous (`1e-10`).
pub const CONTINUITY_TOLERANCE: Decimal = Decimal::from_parts(1, 0, 0, false, 10);

/// True when `a` and `b` differ by no more than [`CONTINUITY_TOLERANCE`].
#[must_use]
pub fn within_tolerance(a: Decimal, b: Decimal) -> bool {
    (a - b).abs() <= CONTINUITY_TOLERANCE
}

/// Rewrite each candle's open to match the previous candle's close.
///
/// `series` must be sorted ascending by bucket and duplicate-free. The scan
/// runs left to right, so the predecessor's close is always the value already
/// in the slice. The first candle is never touched. When an open is rewritten,
/// `high` and `low` widen as needed to keep `low <= open <= high`; `close` is
/// left alone.
///
/// Returns the indices that changed, ascending.
pub fn repair_continuity(series: &mut [Candle]) -> Vec<usize> {
    let mut changed = Vec::new();
    for i in 1..series.len() {
        let expected = series[i - 1].close;
        let cur = &mut series[i];
        if within_tolerance(cur.open, expected) {
            continue;
        }
        #[cfg(feature = "tracing")]
        tracing::debug!(
            key = %cur.key(),
            open = %cur.open,
            expected = %expected,
            "correcting open"
        );
        cur.open = expected;
        cur.high = Some(cur.high.map_or(expected, |h| h.max(expected)));
        cur.low = Some(cur.low.map_or(expected, |l| l.min(expected)));
        changed.push(i);
    }
    changed
}

/// Count adjacent pairs whose open differs from the previous close.
#[must_use]
pub fn continuity_violations(series: &[Candle]) -> usize {
    series
        .windows(2)
        .filter(|w| !within_tolerance(w[1].open, w[0].close))
        .count()
}
