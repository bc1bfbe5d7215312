use serde::Deserialize;

use super::{present, required, required_timestamp};
use crate::domain::{Energy, EnergySample, TimeUnit};
use crate::error::DecodeError;

/// `GET site/{siteId}/energy`
#[derive(Debug, Deserialize)]
pub struct EnergyDocument {
    pub energy: EnergyDto,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnergyDto {
    pub time_unit: Option<String>,
    pub unit: Option<String>,
    pub measured_by: Option<String>,
    #[serde(default)]
    pub values: Vec<EnergyValueDto>,
}

#[derive(Debug, Deserialize)]
pub struct EnergyValueDto {
    pub date: Option<String>,
    pub value: Option<serde_json::Number>,
}

/// Integral readings only; `12.0` is accepted, `12.5` is not.
fn integral_value(field: String, value: Option<serde_json::Number>) -> Result<Option<i64>, DecodeError> {
    let Some(n) = value else {
        return Ok(None);
    };
    if let Some(v) = n.as_i64() {
        return Ok(Some(v));
    }
    match n.as_f64() {
        Some(f) if f.fract() == 0.0 && f >= i64::MIN as f64 && f <= i64::MAX as f64 => {
            Ok(Some(f as i64))
        }
        _ => Err(DecodeError::InvalidValue {
            field,
            raw: n.to_string(),
        }),
    }
}

impl TryFrom<EnergyDocument> for Energy {
    type Error = DecodeError;

    fn try_from(doc: EnergyDocument) -> Result<Self, Self::Error> {
        let dto = doc.energy;

        let raw_unit = required("energy.timeUnit".to_string(), present(dto.time_unit))?;
        let time_unit: TimeUnit = raw_unit.parse().map_err(|_| DecodeError::InvalidValue {
            field: "energy.timeUnit".to_string(),
            raw: raw_unit.clone(),
        })?;

        let values = dto
            .values
            .into_iter()
            .enumerate()
            .map(|(idx, v)| {
                Ok(EnergySample {
                    date: required_timestamp(format!("energy.values[{idx}].date"), v.date)?,
                    value: integral_value(format!("energy.values[{idx}].value"), v.value)?,
                })
            })
            .collect::<Result<Vec<_>, DecodeError>>()?;

        Ok(Energy {
            time_unit,
            unit: dto.unit.unwrap_or_default(),
            measured_by: dto.measured_by,
            values,
        })
    }
}
