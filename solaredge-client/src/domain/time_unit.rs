use std::{fmt, str::FromStr};

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use time::PrimitiveDateTime;

/// Sampling interval of a requested time series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TimeUnit {
    Day,
    #[default]
    Hour,
    QuarterHour,
}

impl TimeUnit {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Day => "DAY",
            Self::Hour => "HOUR",
            Self::QuarterHour => "QUARTER_OF_AN_HOUR",
        }
    }

    /// Widest `[startTime, endTime]` window the upstream accepts for this unit.
    pub fn max_range(&self) -> time::Duration {
        match self {
            Self::Day => time::Duration::days(365),
            Self::Hour | Self::QuarterHour => time::Duration::days(28),
        }
    }
}

impl fmt::Display for TimeUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown time unit {0:?}, expected DAY, HOUR or QUARTER_OF_AN_HOUR")]
pub struct UnknownTimeUnit(pub String);

impl FromStr for TimeUnit {
    type Err = UnknownTimeUnit;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "DAY" => Ok(Self::Day),
            "HOUR" => Ok(Self::Hour),
            "QUARTER_OF_AN_HOUR" | "QUARTER_HOUR" => Ok(Self::QuarterHour),
            _ => Err(UnknownTimeUnit(s.to_string())),
        }
    }
}

impl Serialize for TimeUnit {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for TimeUnit {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Query range and granularity shared by energy and telemetry requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub time_unit: TimeUnit,
    pub start: PrimitiveDateTime,
    pub end: PrimitiveDateTime,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_names_parse_case_insensitively() {
        assert_eq!("day".parse::<TimeUnit>().unwrap(), TimeUnit::Day);
        assert_eq!("HOUR".parse::<TimeUnit>().unwrap(), TimeUnit::Hour);
        assert_eq!(
            "quarter_of_an_hour".parse::<TimeUnit>().unwrap(),
            TimeUnit::QuarterHour
        );
        assert!("WEEK".parse::<TimeUnit>().is_err());
    }

    #[test]
    fn defaults_to_hour() {
        assert_eq!(TimeUnit::default(), TimeUnit::Hour);
        assert_eq!(TimeUnit::QuarterHour.to_string(), "QUARTER_OF_AN_HOUR");
    }
}
