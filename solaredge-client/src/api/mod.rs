//! Upstream wire documents and their conversion into domain records.
//!
//! Decoding is two-phase: serde reads a document into a DTO whose date fields are plain strings,
//! then `TryFrom` converts each DTO field by field, so a bad value is reported with its field
//! path and raw text instead of a generic serde message.

mod energy;
mod inventory;
mod sites;
mod telemetry;

pub use energy::{EnergyDocument, EnergyDto, EnergyValueDto};
pub use inventory::{
    BatteryDto, GatewayDto, InventoryDocument, InventoryDto, InverterDto, MeterDto, SensorDto,
    SmiDeviceDto,
};
pub use sites::{LocationDto, PrimaryModuleDto, RawId, SiteDto, SiteList, SiteListDocument};
pub use telemetry::{EquipmentDataDocument, EquipmentDataDto, PhaseDataDto, TelemetryDto};

use serde::de::DeserializeOwned;
use time::PrimitiveDateTime;

use crate::domain::{Energy, Inventory, Site, Telemetry};
use crate::error::DecodeError;
use crate::timefmt;

pub fn decode_site_list(body: &[u8]) -> Result<Vec<Site>, DecodeError> {
    parse_document::<SiteListDocument>("site list", body)?.try_into()
}

pub fn decode_inventory(body: &[u8]) -> Result<Inventory, DecodeError> {
    parse_document::<InventoryDocument>("inventory", body)?.try_into()
}

pub fn decode_energy(body: &[u8]) -> Result<Energy, DecodeError> {
    parse_document::<EnergyDocument>("energy", body)?.try_into()
}

pub fn decode_equipment_data(body: &[u8]) -> Result<Vec<Telemetry>, DecodeError> {
    parse_document::<EquipmentDataDocument>("equipment data", body)?.try_into()
}

fn parse_document<T: DeserializeOwned>(document: &'static str, body: &[u8]) -> Result<T, DecodeError> {
    serde_json::from_slice(body).map_err(|source| DecodeError::Json { document, source })
}

fn present(raw: Option<String>) -> Option<String> {
    raw.filter(|s| !s.trim().is_empty())
}

/// A date the record cannot exist without.
fn required_timestamp(field: String, raw: Option<String>) -> Result<PrimitiveDateTime, DecodeError> {
    let raw = present(raw).ok_or_else(|| DecodeError::MissingField {
        field: field.clone(),
    })?;
    timefmt::parse_timestamp(&raw)
        .map_err(|source| DecodeError::InvalidTimestamp { field, raw, source })
}

/// A date the upstream may not know yet. Either pattern is accepted.
fn optional_date(field: String, raw: Option<String>) -> Result<Option<PrimitiveDateTime>, DecodeError> {
    match present(raw) {
        None => Ok(None),
        Some(raw) => timefmt::parse_date_or_timestamp(&raw)
            .map(Some)
            .map_err(|source| DecodeError::InvalidTimestamp { field, raw, source }),
    }
}

fn required<T>(field: String, value: Option<T>) -> Result<T, DecodeError> {
    value.ok_or(DecodeError::MissingField { field })
}

/// Numbers that arrive as either JSON numbers or numeric strings.
fn lenient_f64(value: Option<serde_json::Value>) -> Option<f64> {
    match value? {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn lenient_i64(value: Option<serde_json::Value>) -> Option<i64> {
    match value? {
        serde_json::Value::Number(n) => n.as_i64(),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn missing_required_timestamp_names_field() {
        let err = required_timestamp("data.telemetries[0].date".into(), None).unwrap_err();
        assert_eq!(err.field(), Some("data.telemetries[0].date"));
        assert!(matches!(err, DecodeError::MissingField { .. }));
    }

    #[test]
    fn blank_optional_date_is_absent() {
        assert_eq!(optional_date("ptoDate".into(), Some("  ".into())).unwrap(), None);
        assert_eq!(
            optional_date("ptoDate".into(), Some("2020-02-03".into())).unwrap(),
            Some(datetime!(2020-02-03 00:00:00))
        );
    }

    #[test]
    fn lenient_numbers_accept_strings() {
        assert_eq!(lenient_f64(Some(serde_json::json!("9.8"))), Some(9.8));
        assert_eq!(lenient_i64(Some(serde_json::json!(12))), Some(12));
        assert_eq!(lenient_i64(Some(serde_json::json!(true))), None);
        assert_eq!(lenient_i64(None), None);
    }
}
