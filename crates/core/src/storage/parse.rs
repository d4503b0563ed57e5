//! Database value parsing utilities
//!
//! Provides error-safe parsing of stored values.

use chrono::{DateTime, Utc};
use rusqlite::Error as SqlError;

use crate::models::{Author, Filter, Gender};

fn conversion_error<E>(e: E) -> SqlError
where
    E: std::error::Error + Send + Sync + 'static,
{
    SqlError::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
}

/// Parse a DateTime from an RFC3339 string
pub fn parse_datetime(s: &str) -> Result<DateTime<Utc>, SqlError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(conversion_error)
}

pub fn parse_gender(s: &str) -> Result<Gender, SqlError> {
    s.parse().map_err(conversion_error)
}

/// Parse an optional Gender column
pub fn parse_gender_opt(s: Option<String>) -> Result<Option<Gender>, SqlError> {
    s.map(|s| parse_gender(&s)).transpose()
}

pub fn parse_filter(s: &str) -> Result<Filter, SqlError> {
    s.parse().map_err(conversion_error)
}

pub fn parse_author(s: &str) -> Result<Author, SqlError> {
    s.parse().map_err(conversion_error)
}

/// Extension trait for converting rusqlite Results to Option
pub trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>, SqlError>;
}

impl<T> OptionalExt<T> for Result<T, SqlError> {
    fn optional(self) -> Result<Option<T>, SqlError> {
        match self {
            Ok(v) => Ok(Some(v)),
            Err(SqlError::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e),
        }
    }
}
