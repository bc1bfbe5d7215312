use serde::Deserialize;

use super::required_timestamp;
use crate::domain::{PhaseData, Telemetry};
use crate::error::DecodeError;

/// `GET site/{siteId}/{serialNumber}/data`
#[derive(Debug, Deserialize)]
pub struct EquipmentDataDocument {
    pub data: EquipmentDataDto,
}

#[derive(Debug, Deserialize)]
pub struct EquipmentDataDto {
    #[serde(default)]
    pub count: Option<i64>,
    #[serde(default)]
    pub telemetries: Vec<TelemetryDto>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetryDto {
    pub date: Option<String>,
    pub total_active_power: Option<f64>,
    pub dc_voltage: Option<f64>,
    pub ground_fault_resistance: Option<f64>,
    pub power_limit: Option<f64>,
    pub total_energy: Option<f64>,
    pub temperature: Option<f64>,
    pub inverter_mode: Option<String>,
    pub operation_mode: Option<f64>,
    #[serde(rename = "L1Data")]
    pub l1_data: Option<PhaseDataDto>,
    #[serde(rename = "L2Data")]
    pub l2_data: Option<PhaseDataDto>,
    #[serde(rename = "L3Data")]
    pub l3_data: Option<PhaseDataDto>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhaseDataDto {
    pub ac_current: Option<f64>,
    #[serde(rename = "acVoltage", alias = "ACVoltage")]
    pub ac_voltage: Option<f64>,
    #[serde(rename = "acFrequency", alias = "ACFrequency")]
    pub ac_frequency: Option<f64>,
    pub apparent_power: Option<f64>,
    pub active_power: Option<f64>,
    pub reactive_power: Option<f64>,
    pub cos_phi: Option<f64>,
}

impl From<PhaseDataDto> for PhaseData {
    fn from(p: PhaseDataDto) -> Self {
        PhaseData {
            ac_current: p.ac_current,
            ac_voltage: p.ac_voltage,
            ac_frequency: p.ac_frequency,
            apparent_power: p.apparent_power,
            active_power: p.active_power,
            reactive_power: p.reactive_power,
            cos_phi: p.cos_phi,
        }
    }
}

impl TryFrom<EquipmentDataDocument> for Vec<Telemetry> {
    type Error = DecodeError;

    fn try_from(doc: EquipmentDataDocument) -> Result<Self, Self::Error> {
        doc.data
            .telemetries
            .into_iter()
            .enumerate()
            .map(|(idx, t)| {
                Ok(Telemetry {
                    date: required_timestamp(format!("data.telemetries[{idx}].date"), t.date)?,
                    total_active_power: t.total_active_power,
                    dc_voltage: t.dc_voltage,
                    ground_fault_resistance: t.ground_fault_resistance,
                    power_limit: t.power_limit,
                    total_energy: t.total_energy,
                    temperature: t.temperature,
                    inverter_mode: t.inverter_mode,
                    operation_mode: t.operation_mode,
                    l1_data: t.l1_data.map(PhaseData::from),
                    l2_data: t.l2_data.map(PhaseData::from),
                    l3_data: t.l3_data.map(PhaseData::from),
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use crate::api::decode_equipment_data;
    use crate::error::DecodeError;
    use time::macros::datetime;

    #[test]
    fn decodes_inverter_telemetry() {
        let body = br#"{
            "data": {
                "count": 2,
                "telemetries": [
                    {
                        "date": "2024-03-01 10:00:00",
                        "totalActivePower": 3510.2,
                        "dcVoltage": 381.5,
                        "groundFaultResistance": 12000.0,
                        "powerLimit": 100.0,
                        "totalEnergy": 1.0e7,
                        "temperature": 41.3,
                        "inverterMode": "MPPT",
                        "operationMode": 0,
                        "L1Data": {"acCurrent": 14.6, "ACVoltage": 240.1, "ACFrequency": 59.99,
                                   "apparentPower": 3520.0, "activePower": 3510.2,
                                   "reactivePower": 12.0, "cosPhi": 1.0}
                    },
                    {"date": "2024-03-01 10:05:00", "inverterMode": "SLEEPING"}
                ]
            }
        }"#;

        let samples = decode_equipment_data(body).unwrap();
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0].date, datetime!(2024-03-01 10:00:00));
        let l1 = samples[0].l1_data.as_ref().unwrap();
        assert_eq!(l1.ac_voltage, Some(240.1));
        assert_eq!(l1.ac_frequency, Some(59.99));
        assert_eq!(samples[1].total_active_power, None);
        assert_eq!(samples[1].inverter_mode.as_deref(), Some("SLEEPING"));
    }

    #[test]
    fn sample_with_null_date_is_rejected_not_defaulted() {
        let body = br#"{"data": {"count": 1, "telemetries": [{"date": null, "totalActivePower": 1.0}]}}"#;
        let err = decode_equipment_data(body).unwrap_err();
        assert_eq!(err.field(), Some("data.telemetries[0].date"));
    }

    #[test]
    fn structural_mismatch_is_a_json_error() {
        let err = decode_equipment_data(br#"{"data": {"telemetries": {}}}"#).unwrap_err();
        assert!(matches!(err, DecodeError::Json { document: "equipment data", .. }));
    }
}
