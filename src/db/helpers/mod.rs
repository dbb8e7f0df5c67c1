use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};

use crate::{db::models::Side, scoring::Difficulty};

/// Fixed-width RFC 3339 so stored timestamps sort lexically in time order.
pub fn format_datetime(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn parse_datetime(value: &str, field: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .with_context(|| format!("failed to parse {field}"))
}

pub fn parse_difficulty(value: &str) -> Result<Difficulty> {
    value
        .parse()
        .with_context(|| format!("unknown difficulty {value} in sessions table"))
}

pub fn parse_side(value: Option<String>) -> Result<Option<Side>> {
    value
        .filter(|raw| !raw.trim().is_empty())
        .map(|raw| raw.parse())
        .transpose()
}

pub fn to_u8(value: i64, field: &str) -> Result<u8> {
    u8::try_from(value).map_err(|_| anyhow!("{field} contains out-of-range value {value}"))
}

pub fn to_u32(value: i64, field: &str) -> Result<u32> {
    u32::try_from(value).map_err(|_| anyhow!("{field} contains out-of-range value {value}"))
}
