use serde::{Deserialize, Serialize};
use time::PrimitiveDateTime;

use super::TimeUnit;
use crate::timefmt::serde_timestamp;

/// Aggregate production series for one site at one granularity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Energy {
    pub time_unit: TimeUnit,
    pub unit: String,
    pub measured_by: Option<String>,
    pub values: Vec<EnergySample>,
}

/// One interval. `value` is `None` when the interval has no reading, which is not the same as
/// a reading of zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnergySample {
    #[serde(with = "serde_timestamp")]
    pub date: PrimitiveDateTime,
    pub value: Option<i64>,
}

impl Energy {
    pub fn latest_sample(&self) -> Option<PrimitiveDateTime> {
        self.values.iter().map(|v| v.date).max()
    }
}
