use serde::{Deserialize, Serialize};
use time::PrimitiveDateTime;

use crate::timefmt::serde_timestamp;

/// One sensor reading from a single piece of equipment.
///
/// Inverters, meters and batteries report different subsets of these fields, so every
/// measurement is optional. The timestamp is not.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Telemetry {
    #[serde(with = "serde_timestamp")]
    pub date: PrimitiveDateTime,
    pub total_active_power: Option<f64>,
    pub dc_voltage: Option<f64>,
    pub ground_fault_resistance: Option<f64>,
    pub power_limit: Option<f64>,
    pub total_energy: Option<f64>,
    pub temperature: Option<f64>,
    pub inverter_mode: Option<String>,
    pub operation_mode: Option<f64>,
    #[serde(rename = "L1Data")]
    pub l1_data: Option<PhaseData>,
    #[serde(rename = "L2Data")]
    pub l2_data: Option<PhaseData>,
    #[serde(rename = "L3Data")]
    pub l3_data: Option<PhaseData>,
}

/// Per-phase AC measurements.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhaseData {
    pub ac_current: Option<f64>,
    pub ac_voltage: Option<f64>,
    pub ac_frequency: Option<f64>,
    pub apparent_power: Option<f64>,
    pub active_power: Option<f64>,
    pub reactive_power: Option<f64>,
    pub cos_phi: Option<f64>,
}
