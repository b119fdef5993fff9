//! Timestamp encoding for TEXT columns.
//!
//! Every timestamp is written in one fixed-width UTC format so that plain string
//! comparison in SQL (`expires_at < ?1`, `ORDER BY created_at`) matches chronological order.

use chrono::{DateTime, NaiveDateTime, Utc};
use rusqlite::Row;
use rusqlite::types::Type;

const FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6fZ";

pub fn encode(ts: DateTime<Utc>) -> String {
    ts.format(FORMAT).to_string()
}

pub fn decode(s: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    NaiveDateTime::parse_from_str(s, FORMAT).map(|ndt| ndt.and_utc())
}

/// Read a timestamp column, surfacing parse failures as a column conversion error.
pub(crate) fn get(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    decode(&raw).map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}
