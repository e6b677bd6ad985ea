//! Conversions between CQL values and candle fields.
//!
//! Price columns are declared as `decimal`, `double`, `float` or `text`
//! depending on the keyspace. Values are read into `Decimal` and written back
//! in the column's declared type, so nothing is silently coerced.

use std::collections::HashMap;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use scylla::value::{CqlDecimal, CqlTimestamp, CqlValue, Row};

use candlefix_core::{Candle, Interval, PartitionKey, RepairError};

/// Declared CQL type of a numeric candle column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriceType {
    /// `decimal`
    Decimal,
    /// `double`
    Double,
    /// `float`
    Float,
    /// `text`, `varchar` or `ascii`
    Text,
}

impl FromStr for PriceType {
    type Err = RepairError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "decimal" => Ok(Self::Decimal),
            "double" => Ok(Self::Double),
            "float" => Ok(Self::Float),
            "text" | "varchar" | "ascii" => Ok(Self::Text),
            other => Err(RepairError::Data(format!("unsupported price column type '{other}'"))),
        }
    }
}

/// Declared types of the five numeric columns of one candle table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnTypes {
    /// `open`
    pub open: PriceType,
    /// `high`
    pub high: PriceType,
    /// `low`
    pub low: PriceType,
    /// `close`
    pub close: PriceType,
    /// `volume`
    pub volume: PriceType,
}

impl ColumnTypes {
    /// Build from `(column_name, type)` pairs as listed by `system_schema.columns`.
    ///
    /// # Errors
    /// Returns `Err(RepairError::Data)` if a numeric column is missing or has an
    /// unsupported type.
    pub fn from_schema<I>(columns: I) -> Result<Self, RepairError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let by_name: HashMap<String, String> = columns.into_iter().collect();
        let get = |name: &str| -> Result<PriceType, RepairError> {
            by_name
                .get(name)
                .ok_or_else(|| RepairError::Data(format!("candle table has no '{name}' column")))?
                .parse()
        };
        Ok(Self {
            open: get("open")?,
            high: get("high")?,
            low: get("low")?,
            close: get("close")?,
            volume: get("volume")?,
        })
    }
}

fn mantissa_from_be_bytes(bytes: &[u8]) -> Option<i128> {
    if bytes.len() > 16 {
        return None;
    }
    let fill = if bytes.first().is_some_and(|b| b & 0x80 != 0) {
        0xff
    } else {
        0x00
    };
    let mut buf = [fill; 16];
    buf[16 - bytes.len()..].copy_from_slice(bytes);
    Some(i128::from_be_bytes(buf))
}

/// Shortest two's-complement big-endian encoding of `v`.
fn minimal_be_bytes(v: i128) -> Vec<u8> {
    let bytes = v.to_be_bytes();
    let mut start = 0;
    while start < 15 {
        let redundant = (bytes[start] == 0x00 && bytes[start + 1] & 0x80 == 0)
            || (bytes[start] == 0xff && bytes[start + 1] & 0x80 != 0);
        if !redundant {
            break;
        }
        start += 1;
    }
    bytes[start..].to_vec()
}

fn decimal_from_cql(d: &CqlDecimal) -> Option<Decimal> {
    let (bytes, scale) = d.as_signed_be_bytes_slice_and_exponent();
    let mut mantissa = mantissa_from_be_bytes(bytes)?;
    let scale = if scale < 0 {
        for _ in 0..scale.unsigned_abs() {
            mantissa = mantissa.checked_mul(10)?;
        }
        0
    } else {
        u32::try_from(scale).ok()?
    };
    Decimal::try_from_i128_with_scale(mantissa, scale).ok()
}

fn decimal_to_cql(d: Decimal) -> CqlDecimal {
    let scale = i32::try_from(d.scale()).unwrap_or(0);
    CqlDecimal::from_signed_be_bytes_slice_and_exponent(&minimal_be_bytes(d.mantissa()), scale)
}

fn parse_decimal_text(s: &str) -> Option<Decimal> {
    let s = s.trim();
    Decimal::from_str(s)
        .ok()
        .or_else(|| Decimal::from_scientific(s).ok())
}

/// Read a numeric column value into a `Decimal`.
///
/// # Errors
/// Returns `Err(RepairError::Data)` for non-finite floats, unparsable text,
/// out-of-range decimals and non-numeric CQL types.
pub fn decimal_from_value(column: &str, value: &CqlValue) -> Result<Decimal, RepairError> {
    let parsed = match value {
        CqlValue::Decimal(d) => decimal_from_cql(d),
        // Display of a float is the shortest string that round-trips.
        CqlValue::Double(f) if f.is_finite() => parse_decimal_text(&f.to_string()),
        CqlValue::Float(f) if f.is_finite() => parse_decimal_text(&f.to_string()),
        CqlValue::Text(s) | CqlValue::Ascii(s) => parse_decimal_text(s),
        CqlValue::Int(i) => Some(Decimal::from(*i)),
        CqlValue::BigInt(i) => Some(Decimal::from(*i)),
        _ => None,
    };
    parsed.ok_or_else(|| RepairError::Data(format!("unreadable {column} value {value:?}")))
}

/// Encode a `Decimal` in the declared type of its column.
///
/// # Errors
/// Returns `Err(RepairError::Data)` if the value cannot be represented as a float.
pub fn decimal_to_value(column: &str, ty: PriceType, d: Decimal) -> Result<CqlValue, RepairError> {
    let overflow = || RepairError::Data(format!("{column} value {d} does not fit its column"));
    Ok(match ty {
        PriceType::Decimal => CqlValue::Decimal(decimal_to_cql(d)),
        PriceType::Double => CqlValue::Double(d.to_f64().ok_or_else(overflow)?),
        PriceType::Float => CqlValue::Float(d.to_f32().ok_or_else(overflow)?),
        PriceType::Text => CqlValue::Text(d.normalize().to_string()),
    })
}

pub fn timestamp_to_value(ts: DateTime<Utc>) -> CqlValue {
    CqlValue::Timestamp(CqlTimestamp(ts.timestamp_millis()))
}

fn timestamp_from_value(column: &str, value: &CqlValue) -> Result<DateTime<Utc>, RepairError> {
    let ts = match value {
        CqlValue::Timestamp(CqlTimestamp(ms)) => DateTime::from_timestamp_millis(*ms),
        _ => None,
    };
    ts.ok_or_else(|| RepairError::Data(format!("unreadable {column} value {value:?}")))
}

fn required<'a>(row: &'a Row, idx: usize, column: &str) -> Result<&'a CqlValue, RepairError> {
    row.columns
        .get(idx)
        .and_then(Option::as_ref)
        .ok_or_else(|| RepairError::Data(format!("null {column}")))
}

fn optional(row: &Row, idx: usize) -> Option<&CqlValue> {
    row.columns.get(idx).and_then(Option::as_ref)
}

/// Decode one row selected by [`crate::cql::select_partition`].
///
/// # Errors
/// Returns `Err(RepairError::Data)` if a required column is null or a value is unreadable.
pub fn candle_from_row(partition: &PartitionKey, row: &Row) -> Result<Candle, RepairError> {
    let symbol = match required(row, 0, "symbol")? {
        CqlValue::Text(s) | CqlValue::Ascii(s) => s.clone(),
        other => return Err(RepairError::Data(format!("unreadable symbol {other:?}"))),
    };
    let interval = match required(row, 1, "interval")? {
        CqlValue::Text(s) | CqlValue::Ascii(s) => s
            .parse::<Interval>()
            .map_err(|e| RepairError::Data(e.to_string()))?,
        other => return Err(RepairError::Data(format!("unreadable interval {other:?}"))),
    };
    let created_at = timestamp_from_value("createdAt", required(row, 2, "createdAt")?)?;
    let updated_at = optional(row, 3)
        .map(|v| timestamp_from_value("updatedAt", v))
        .transpose()?;
    let candle = Candle {
        symbol,
        interval,
        created_at,
        updated_at,
        open: decimal_from_value("open", required(row, 4, "open")?)?,
        high: optional(row, 5)
            .map(|v| decimal_from_value("high", v))
            .transpose()?,
        low: optional(row, 6)
            .map(|v| decimal_from_value("low", v))
            .transpose()?,
        close: decimal_from_value("close", required(row, 7, "close")?)?,
        volume: optional(row, 8)
            .map(|v| decimal_from_value("volume", v))
            .transpose()?,
    };
    if candle.symbol != partition.symbol || candle.interval != partition.interval {
        return Err(RepairError::Data(format!(
            "row {} returned for partition {partition}",
            candle.key()
        )));
    }
    Ok(candle)
}

/// Bind values for [`crate::cql::update_candle`], without the trailing condition value.
///
/// # Errors
/// Propagates encoding failures from [`decimal_to_value`].
pub fn update_values(types: &ColumnTypes, c: &Candle) -> Result<Vec<Option<CqlValue>>, RepairError> {
    let opt = |column: &str, ty: PriceType, v: Option<Decimal>| {
        v.map(|d| decimal_to_value(column, ty, d)).transpose()
    };
    Ok(vec![
        Some(decimal_to_value("open", types.open, c.open)?),
        opt("high", types.high, c.high)?,
        opt("low", types.low, c.low)?,
        Some(decimal_to_value("close", types.close, c.close)?),
        opt("volume", types.volume, c.volume)?,
        c.updated_at.map(timestamp_to_value),
        Some(CqlValue::Text(c.symbol.clone())),
        Some(CqlValue::Text(c.interval.as_str().to_string())),
        Some(timestamp_to_value(c.created_at)),
    ])
}
