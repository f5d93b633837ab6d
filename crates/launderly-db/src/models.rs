//! Row types and column decoding.
//!
//! Ids and timestamps are stored as TEXT; these helpers turn a bad column
//! into a `FromSqlConversionFailure` so a corrupt row surfaces as a query
//! error instead of a default value.

use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::Row;
use rusqlite::types::Type;
use uuid::Uuid;

use launderly_types::Role;
use launderly_types::models::User;

/// Full user row, including the password hash. Never serialized.
pub struct UserRow {
    pub user: User,
    pub password: String,
}

pub struct NewUser {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub name: String,
    pub role: Role,
    pub hostel_id: Option<Uuid>,
    pub room_number: Option<String>,
    pub phone: Option<String>,
}

/// Timestamps are written as fixed-width RFC 3339 so TEXT ordering matches
/// chronological ordering.
pub fn ts(t: &DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn conversion<E>(idx: usize, err: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}

pub(crate) fn uuid_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<Uuid> {
    let raw: String = row.get(idx)?;
    raw.parse().map_err(|e| conversion(idx, e))
}

pub(crate) fn opt_uuid_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<Uuid>> {
    row.get::<_, Option<String>>(idx)?
        .map(|raw| raw.parse().map_err(|e| conversion(idx, e)))
        .transpose()
}

fn parse_time(raw: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    raw.parse::<DateTime<Utc>>().or_else(|_| {
        // Rows written by hand in sqlite3 use "YYYY-MM-DD HH:MM:SS".
        chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
    })
}

pub(crate) fn time_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    parse_time(&raw).map_err(|e| conversion(idx, e))
}

pub(crate) fn opt_time_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    row.get::<_, Option<String>>(idx)?
        .map(|raw| parse_time(&raw).map_err(|e| conversion(idx, e)))
        .transpose()
}

pub(crate) fn enum_at<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: String = row.get(idx)?;
    raw.parse().map_err(|e| conversion(idx, e))
}

pub(crate) fn count_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<u64> {
    Ok(row.get::<_, i64>(idx)?.max(0) as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamps_sort_lexically() {
        let early = "2024-01-02T03:04:05Z".parse::<DateTime<Utc>>().unwrap();
        let late = early + chrono::Duration::milliseconds(1500);
        assert!(ts(&early) < ts(&late));
        assert_eq!(parse_time(&ts(&late)).unwrap(), late);
    }

    #[test]
    fn sqlite_datetime_fallback() {
        let parsed = parse_time("2024-05-06 07:08:09").unwrap();
        assert_eq!(ts(&parsed), "2024-05-06T07:08:09.000000Z");
    }
}
