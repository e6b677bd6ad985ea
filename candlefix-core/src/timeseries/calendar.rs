use chrono::{DateTime, Utc};

use crate::Interval;

const MINUTE_MS: i64 = 60_000;
const HOUR_MS: i64 = 60 * MINUTE_MS;
const DAY_MS: i64 = 24 * HOUR_MS;

/// Width of a `3d` bucket. Buckets are multiples of this from the Unix epoch.
pub const THREE_DAYS_MS: i64 = 3 * DAY_MS;

/// Days to subtract from an epoch day number to reach the preceding Sunday.
/// 1970-01-01 was a Thursday.
const fn week_start_day(day: i64) -> i64 {
    day - (day + 4).rem_euclid(7)
}

const fn floor_to(ms: i64, step: i64) -> i64 {
    ms - ms.rem_euclid(step)
}

fn from_millis(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Start of the bucket containing `ts` for `interval`, in UTC.
///
/// - `1m`..`30m`: minute-of-hour floored to a multiple of the width.
/// - `1h`..`12h`: hour-of-day floored to a multiple of the width.
/// - `1d`: start of the UTC day.
/// - `3d`: `floor(epoch_ms / 259_200_000) * 259_200_000`, aligned to the
///   epoch and not to any calendar boundary.
/// - `1w`: the most recent Sunday 00:00:00 UTC.
///
/// Sub-millisecond precision is always dropped. Every minute and hour width
/// divides the hour (resp. day) evenly, so flooring epoch milliseconds gives
/// the same result as truncating the calendar field.
///
/// ```
/// use candlefix_core::{Interval, bucket_start};
/// use chrono::{TimeZone, Utc};
///
/// let ts = Utc.with_ymd_and_hms(2024, 3, 14, 10, 47, 31).unwrap();
/// assert_eq!(
///     bucket_start(ts, Interval::M15),
///     Utc.with_ymd_and_hms(2024, 3, 14, 10, 45, 0).unwrap()
/// );
/// // 2024-03-14 is a Thursday; weeks start on Sunday.
/// assert_eq!(
///     bucket_start(ts, Interval::W1),
///     Utc.with_ymd_and_hms(2024, 3, 10, 0, 0, 0).unwrap()
/// );
/// ```
#[must_use]
pub fn bucket_start(ts: DateTime<Utc>, interval: Interval) -> DateTime<Utc> {
    let ms = ts.timestamp_millis();
    let start = match interval {
        Interval::M1 => floor_to(ms, MINUTE_MS),
        Interval::M3 => floor_to(ms, 3 * MINUTE_MS),
        Interval::M5 => floor_to(ms, 5 * MINUTE_MS),
        Interval::M15 => floor_to(ms, 15 * MINUTE_MS),
        Interval::M30 => floor_to(ms, 30 * MINUTE_MS),
        Interval::H1 => floor_to(ms, HOUR_MS),
        Interval::H2 => floor_to(ms, 2 * HOUR_MS),
        Interval::H4 => floor_to(ms, 4 * HOUR_MS),
        Interval::H6 => floor_to(ms, 6 * HOUR_MS),
        Interval::H12 => floor_to(ms, 12 * HOUR_MS),
        Interval::D1 => floor_to(ms, DAY_MS),
        Interval::D3 => floor_to(ms, THREE_DAYS_MS),
        Interval::W1 => week_start_day(ms.div_euclid(DAY_MS)) * DAY_MS,
    };
    from_millis(start)
}

/// True if `ts` already sits on a bucket boundary of `interval`.
#[must_use]
pub fn is_bucket_aligned(ts: DateTime<Utc>, interval: Interval) -> bool {
    bucket_start(ts, interval) == ts
}
