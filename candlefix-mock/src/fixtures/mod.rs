//! Deterministic candle fixtures.

use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;

use candlefix_core::{Candle, Interval, bucket_start};

/// Fixed reference time all fixtures are anchored to: 2024-03-05 00:00:00 UTC (a Tuesday).
#[must_use]
pub fn anchor() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 5, 0, 0, 0)
        .single()
        .unwrap_or(DateTime::UNIX_EPOCH)
}

/// Build a candle with every price present.
#[must_use]
#[allow(clippy::too_many_arguments)]
pub fn candle(
    symbol: &str,
    interval: Interval,
    created_at: DateTime<Utc>,
    open: Decimal,
    high: Decimal,
    low: Decimal,
    close: Decimal,
    volume: Decimal,
) -> Candle {
    Candle {
        symbol: symbol.to_string(),
        interval,
        created_at,
        updated_at: Some(created_at),
        open,
        high: Some(high),
        low: Some(low),
        close,
        volume: Some(volume),
    }
}

/// A continuous, duplicate-free series of `len` candles starting at the anchor bucket.
///
/// Each candle opens at the previous close and moves up by one unit.
#[must_use]
pub fn clean_series(symbol: &str, interval: Interval, len: usize) -> Vec<Candle> {
    let start = bucket_start(anchor(), interval);
    let step = interval.nominal_duration();
    let mut open = Decimal::from(100);
    (0..len)
        .map(|i| {
            let close = open + Decimal::ONE;
            let ts = start + step * i32::try_from(i).unwrap_or(i32::MAX);
            let c = candle(
                symbol,
                interval,
                ts,
                open,
                close + Decimal::ONE,
                open - Decimal::ONE,
                close,
                Decimal::ONE,
            );
            open = close;
            c
        })
        .collect()
}

/// Three arrivals inside the 10:00 hour of the anchor day for `BTC/USDT@1h`.
///
/// Highs `{100, 105, 98}`, lows `{90, 95, 92}`, closes `{101, 103, 99}` and
/// volumes `{1, 2, 3}` in arrival order.
#[must_use]
pub fn split_hour() -> Vec<Candle> {
    let at = |m: i64| anchor() + chrono::TimeDelta::hours(10) + chrono::TimeDelta::minutes(m);
    vec![
        candle("BTC/USDT", Interval::H1, at(0), Decimal::from(95), Decimal::from(100), Decimal::from(90), Decimal::from(101), Decimal::from(1)),
        candle("BTC/USDT", Interval::H1, at(17), Decimal::from(101), Decimal::from(105), Decimal::from(95), Decimal::from(103), Decimal::from(2)),
        candle("BTC/USDT", Interval::H1, at(59), Decimal::from(97), Decimal::from(98), Decimal::from(92), Decimal::from(99), Decimal::from(3)),
    ]
}

/// Two consecutive daily candles where the second opens at 50 after a close of 48.
#[must_use]
pub fn gapped_pair() -> Vec<Candle> {
    let d0 = anchor();
    let d1 = d0 + chrono::TimeDelta::days(1);
    vec![
        candle("ETH/USDT", Interval::D1, d0, Decimal::from(45), Decimal::from(49), Decimal::from(44), Decimal::from(48), Decimal::from(10)),
        candle("ETH/USDT", Interval::D1, d1, Decimal::from(50), Decimal::from(47), Decimal::from(40), Decimal::from(46), Decimal::from(12)),
    ]
}
