//! Deserialization helpers for loosely typed storage rows.

use chrono::{NaiveDate, NaiveTime};
use log::warn;
use serde::{Deserialize, Deserializer};
use std::fmt;
use std::str::FromStr;

/// Treat an explicit `null` the same as a missing field.
pub(crate) fn nullable<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Dates that do not parse become `None` so one bad row cannot fail a whole
/// listing; the projector reports undated meetups individually.
pub(crate) fn lenient_date<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.and_then(|s| parse_date(&s)))
}

/// Enumerated strings outside the known set decode as the default, with a
/// warning, so an unexpected value only loses that field.
pub(crate) fn lenient_enum<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr + Default,
    T::Err: fmt::Display,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(match raw.as_deref().map(str::trim) {
        None | Some("") => T::default(),
        Some(value) => value.parse().unwrap_or_else(|e| {
            warn!("{}; using the default", e);
            T::default()
        }),
    })
}

/// Accepts `HH:mm:ss` and `HH:mm`.
pub(crate) fn lenient_time<'de, D>(deserializer: D) -> Result<Option<NaiveTime>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.and_then(|s| parse_time(&s)))
}

pub(crate) fn parse_date(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    // Some backends hand back full timestamps for date columns
    let date_part = trimmed.get(..10).unwrap_or(trimmed);
    match NaiveDate::parse_from_str(date_part, "%Y-%m-%d") {
        Ok(date) => Some(date),
        Err(e) => {
            warn!("Ignoring malformed date '{}': {}", raw, e);
            None
        }
    }
}

pub(crate) fn parse_time(raw: &str) -> Option<NaiveTime> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    NaiveTime::parse_from_str(trimmed, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(trimmed, "%H:%M"))
        .map_err(|e| warn!("Ignoring malformed time '{}': {}", raw, e))
        .ok()
}
