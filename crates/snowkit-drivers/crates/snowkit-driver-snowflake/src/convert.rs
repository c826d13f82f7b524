//! Result cell conversion
//!
//! The SQL API returns every cell as a string (or null) in the `jsonv2`
//! format. The column's `rowType` entry says how to read it.

use chrono::{DateTime, NaiveDate, NaiveTime};
use serde::Deserialize;
use snowkit_core::{ColumnMeta, Value};

/// Column description from `resultSetMetaData.rowType`
#[derive(Debug, Clone, Deserialize)]
pub struct RowType {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default)]
    pub nullable: Option<bool>,
    #[serde(default)]
    pub precision: Option<i32>,
    #[serde(default)]
    pub scale: Option<i32>,
}

impl RowType {
    pub fn to_column_meta(&self, ordinal: usize) -> ColumnMeta {
        ColumnMeta {
            name: self.name.clone(),
            data_type: self.type_name.to_ascii_uppercase(),
            nullable: self.nullable.unwrap_or(true),
            ordinal,
            precision: self.precision,
            scale: self.scale,
        }
    }
}

/// Convert one cell according to its column type.
///
/// Cells that do not parse as their declared type are kept as strings.
pub fn convert_cell(cell: Option<&str>, row_type: &RowType) -> Value {
    let Some(raw) = cell else {
        return Value::Null;
    };

    let converted = match row_type.type_name.to_ascii_lowercase().as_str() {
        "fixed" => Some(convert_fixed(raw, row_type.scale.unwrap_or(0))),
        "real" => raw.parse::<f64>().ok().map(Value::Float64),
        "text" => Some(Value::String(raw.to_string())),
        "boolean" => match raw {
            "true" | "TRUE" | "1" => Some(Value::Bool(true)),
            "false" | "FALSE" | "0" => Some(Value::Bool(false)),
            _ => None,
        },
        "date" => raw
            .parse::<i64>()
            .ok()
            .and_then(|days| {
                NaiveDate::from_ymd_opt(1970, 1, 1)?.checked_add_signed(chrono::Duration::days(days))
            })
            .map(Value::Date),
        "time" => epoch_nanos(raw).and_then(|nanos| {
            let secs = u32::try_from(nanos.div_euclid(1_000_000_000)).ok()?;
            let frac = u32::try_from(nanos.rem_euclid(1_000_000_000)).ok()?;
            NaiveTime::from_num_seconds_from_midnight_opt(secs, frac).map(Value::Time)
        }),
        "timestamp_ntz" => timestamp(raw).map(|dt| Value::DateTime(dt.naive_utc())),
        "timestamp_ltz" => timestamp(raw).map(Value::DateTimeUtc),
        // "<epoch> <offset>": the epoch part is already UTC
        "timestamp_tz" => raw
            .split_whitespace()
            .next()
            .and_then(timestamp)
            .map(Value::DateTimeUtc),
        "variant" | "object" | "array" | "map" => serde_json::from_str(raw).ok().map(Value::Json),
        "binary" => hex::decode(raw).ok().map(Value::Bytes),
        _ => None,
    };

    converted.unwrap_or_else(|| Value::String(raw.to_string()))
}

fn convert_fixed(raw: &str, scale: i32) -> Value {
    if scale == 0 {
        if let Ok(i) = raw.parse::<i64>() {
            return Value::Int64(i);
        }
    }
    Value::Decimal(raw.to_string())
}

/// Parse "<seconds>[.<fraction>]" into nanoseconds
fn epoch_nanos(raw: &str) -> Option<i128> {
    let (negative, digits) = match raw.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, raw),
    };
    let (secs, frac) = digits.split_once('.').unwrap_or((digits, ""));
    let secs: i128 = secs.parse().ok()?;
    let frac: String = frac.chars().chain(std::iter::repeat('0')).take(9).collect();
    let frac: i128 = frac.parse().ok()?;
    let nanos = secs * 1_000_000_000 + frac;
    Some(if negative { -nanos } else { nanos })
}

fn timestamp(raw: &str) -> Option<DateTime<chrono::Utc>> {
    let nanos = epoch_nanos(raw)?;
    let secs = i64::try_from(nanos.div_euclid(1_000_000_000)).ok()?;
    let frac = u32::try_from(nanos.rem_euclid(1_000_000_000)).ok()?;
    DateTime::from_timestamp(secs, frac)
}
