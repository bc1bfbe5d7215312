use serde::Deserialize;

use super::{optional_date, present};
use crate::domain::{Location, PrimaryModule, Site};
use crate::error::DecodeError;

/// `GET /sites/list`
#[derive(Debug, Deserialize)]
pub struct SiteListDocument {
    #[serde(alias = "Sites")]
    pub sites: SiteList,
}

#[derive(Debug, Deserialize)]
pub struct SiteList {
    #[serde(default)]
    pub count: Option<i64>,
    #[serde(default)]
    pub site: Vec<SiteDto>,
}

/// Site ids are integers upstream but are accepted as strings too.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawId {
    Number(i64),
    Text(String),
}

impl RawId {
    fn into_id(self) -> String {
        match self {
            Self::Number(n) => n.to_string(),
            Self::Text(s) => s,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteDto {
    pub id: Option<RawId>,
    pub name: Option<String>,
    pub account_id: Option<i64>,
    pub status: Option<String>,
    pub peak_power: Option<f64>,
    pub last_update_time: Option<String>,
    pub installation_date: Option<String>,
    pub pto_date: Option<String>,
    pub notes: Option<String>,
    #[serde(rename = "type")]
    pub site_type: Option<String>,
    #[serde(default)]
    pub location: Option<LocationDto>,
    pub primary_module: Option<PrimaryModuleDto>,
    pub public_settings: Option<PublicSettingsDto>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationDto {
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

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrimaryModuleDto {
    pub manufacturer_name: Option<String>,
    pub model_name: Option<String>,
    pub maximum_power: Option<f64>,
    pub temperature_coef: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicSettingsDto {
    #[serde(default)]
    pub is_public: bool,
}

impl From<LocationDto> for Location {
    fn from(l: LocationDto) -> Self {
        Location {
            country: l.country,
            state: l.state,
            city: l.city,
            address: l.address,
            address2: l.address2,
            zip: l.zip,
            time_zone: l.time_zone,
            country_code: l.country_code,
            state_code: l.state_code,
        }
    }
}

impl From<PrimaryModuleDto> for PrimaryModule {
    fn from(m: PrimaryModuleDto) -> Self {
        PrimaryModule {
            manufacturer_name: m.manufacturer_name,
            model_name: m.model_name,
            maximum_power: m.maximum_power,
            temperature_coef: m.temperature_coef,
        }
    }
}

impl SiteDto {
    fn into_site(self, path: &str) -> Result<Site, DecodeError> {
        let id = self
            .id
            .map(RawId::into_id)
            .and_then(|id| present(Some(id)))
            .ok_or_else(|| DecodeError::MissingField {
                field: format!("{path}.id"),
            })?;

        Ok(Site {
            last_update_time: optional_date(format!("{path}.lastUpdateTime"), self.last_update_time)?,
            installation_date: optional_date(
                format!("{path}.installationDate"),
                self.installation_date,
            )?,
            pto_date: optional_date(format!("{path}.ptoDate"), self.pto_date)?,
            id,
            name: self.name.unwrap_or_default(),
            account_id: self.account_id,
            status: self.status,
            peak_power: self.peak_power,
            notes: self.notes,
            site_type: self.site_type,
            location: self.location.map(Location::from).unwrap_or_default(),
            primary_module: self.primary_module.map(PrimaryModule::from),
            is_public: self.public_settings.is_some_and(|p| p.is_public),
        })
    }
}

impl TryFrom<SiteListDocument> for Vec<Site> {
    type Error = DecodeError;

    fn try_from(doc: SiteListDocument) -> Result<Self, Self::Error> {
        doc.sites
            .site
            .into_iter()
            .enumerate()
            .map(|(idx, dto)| dto.into_site(&format!("sites.site[{idx}]")))
            .collect()
    }
}
