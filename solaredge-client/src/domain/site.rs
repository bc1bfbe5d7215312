use serde::Serialize;
use time::PrimitiveDateTime;

use super::SiteId;
use crate::timefmt::serde_timestamp;

/// Snapshot of one installation as reported by the site list.
///
/// Dates are `None` until the upstream knows them (a site awaiting installation has no
/// `installation_date`, a site without permission to operate has no `pto_date`).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Site {
    pub id: SiteId,
    pub name: String,
    pub account_id: Option<i64>,
    pub status: Option<String>,
    pub peak_power: Option<f64>,
    #[serde(with = "serde_timestamp::option")]
    pub last_update_time: Option<PrimitiveDateTime>,
    #[serde(with = "serde_timestamp::option")]
    pub installation_date: Option<PrimitiveDateTime>,
    #[serde(with = "serde_timestamp::option")]
    pub pto_date: Option<PrimitiveDateTime>,
    pub notes: Option<String>,
    #[serde(rename = "type")]
    pub site_type: Option<String>,
    pub location: Location,
    pub primary_module: Option<PrimaryModule>,
    pub is_public: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    pub country: Option<String>,
    pub state: Option<String>,
    pub city: Option<String>,
    pub address: Option<String>,
    pub address2: Option<String>,
    pub zip: Option<String>,
    pub time_zone: Option<String>,
    pub country_code: Option<String>,
    pub state_code: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PrimaryModule {
    pub manufacturer_name: Option<String>,
    pub model_name: Option<String>,
    pub maximum_power: Option<f64>,
    pub temperature_coef: Option<f64>,
}
