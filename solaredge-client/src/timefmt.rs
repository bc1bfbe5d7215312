//! The monitoring service's fixed, zone-less timestamp pattern.
//!
//! Upstream documents and query parameters use `YYYY-MM-DD HH:MM:SS` (site-local wall time) and a
//! date-only `YYYY-MM-DD` variant. Nothing here knows about time zones.

use time::format_description::BorrowedFormatItem;
use time::macros::{datetime, format_description};
use time::{Date, PrimitiveDateTime};

pub const TIME_FORMAT: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");

pub const DATE_FORMAT: &[BorrowedFormatItem<'static>] = format_description!("[year]-[month]-[day]");

/// Zero watermark: no prior run.
pub const EPOCH: PrimitiveDateTime = datetime!(1970-01-01 00:00:00);

pub fn format_timestamp(ts: PrimitiveDateTime) -> String {
    // Infallible for a full date-time with these items.
    ts.format(TIME_FORMAT).unwrap_or_else(|_| ts.to_string())
}

pub fn format_date(date: Date) -> String {
    date.format(DATE_FORMAT).unwrap_or_else(|_| date.to_string())
}

pub fn parse_timestamp(raw: &str) -> Result<PrimitiveDateTime, time::error::Parse> {
    PrimitiveDateTime::parse(raw.trim(), TIME_FORMAT)
}

pub fn parse_date(raw: &str) -> Result<Date, time::error::Parse> {
    Date::parse(raw.trim(), DATE_FORMAT)
}

/// Accepts either pattern; a bare date maps to midnight.
pub fn parse_date_or_timestamp(raw: &str) -> Result<PrimitiveDateTime, time::error::Parse> {
    match parse_timestamp(raw) {
        Ok(ts) => Ok(ts),
        Err(ts_err) => parse_date(raw)
            .map(|date| date.midnight())
            .map_err(|_| ts_err),
    }
}

/// `#[serde(with = "serde_timestamp")]` for fields written in [`TIME_FORMAT`].
pub mod serde_timestamp {
    use serde::{Deserialize, Deserializer, Serializer};
    use time::PrimitiveDateTime;

    pub fn serialize<S: Serializer>(ts: &PrimitiveDateTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::format_timestamp(*ts))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<PrimitiveDateTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        super::parse_timestamp(&raw).map_err(serde::de::Error::custom)
    }

    pub mod option {
        use serde::{Deserialize, Deserializer, Serializer};
        use time::PrimitiveDateTime;

        pub fn serialize<S: Serializer>(
            ts: &Option<PrimitiveDateTime>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match ts {
                Some(ts) => serializer.serialize_some(&super::super::format_timestamp(*ts)),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<PrimitiveDateTime>, D::Error> {
            Option::<String>::deserialize(deserializer)?
                .map(|raw| super::super::parse_date_or_timestamp(&raw))
                .transpose()
                .map_err(serde::de::Error::custom)
        }
    }
}
