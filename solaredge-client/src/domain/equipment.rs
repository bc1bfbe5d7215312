use serde::Serialize;

use super::SerialNumber;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Inverter {
    pub name: Option<String>,
    pub manufacturer: Option<String>,
    pub model: Option<String>,
    pub communication_method: Option<String>,
    pub cpu_version: Option<String>,
    pub firmware_version: Option<String>,
    pub serial_number: SerialNumber,
    pub connected_optimizers: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Meter {
    pub name: Option<String>,
    pub manufacturer: Option<String>,
    pub model: Option<String>,
    pub serial_number: SerialNumber,
    #[serde(rename = "type")]
    pub meter_type: Option<String>,
    pub firmware_version: Option<String>,
    pub connected_to: Option<String>,
    pub connected_solaredge_device_sn: Option<String>,
    pub form: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Gateway {
    pub name: Option<String>,
    pub serial_number: SerialNumber,
    pub firmware_version: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Battery {
    pub name: Option<String>,
    pub serial_number: SerialNumber,
    pub manufacturer: Option<String>,
    pub model: Option<String>,
    pub nameplate_capacity: Option<f64>,
    pub firmware_version: Option<String>,
    pub connected_to: Option<String>,
    pub connected_solaredge_device_sn: Option<String>,
}

/// Sensors are addressed by id, not serial number.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Sensor {
    pub id: Option<String>,
    pub connected_to: Option<String>,
    pub category: Option<String>,
    pub connected_solaredge_device_sn: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SmiDevice {
    pub name: Option<String>,
    pub manufacturer: Option<String>,
    pub model: Option<String>,
    pub firmware_version: Option<String>,
    pub communication_method: Option<String>,
    pub serial_number: SerialNumber,
    pub connected_optimizers: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EquipmentKind {
    Inverter,
    ThirdPartyInverter,
    Gateway,
    Battery,
    Meter,
    Sensor,
    Smi,
}

/// A device installed at a site.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Equipment {
    Inverter(Inverter),
    ThirdPartyInverter(Inverter),
    Gateway(Gateway),
    Battery(Battery),
    Meter(Meter),
    Sensor(Sensor),
    Smi(SmiDevice),
}

impl Equipment {
    pub fn kind(&self) -> EquipmentKind {
        match self {
            Self::Inverter(_) => EquipmentKind::Inverter,
            Self::ThirdPartyInverter(_) => EquipmentKind::ThirdPartyInverter,
            Self::Gateway(_) => EquipmentKind::Gateway,
            Self::Battery(_) => EquipmentKind::Battery,
            Self::Meter(_) => EquipmentKind::Meter,
            Self::Sensor(_) => EquipmentKind::Sensor,
            Self::Smi(_) => EquipmentKind::Smi,
        }
    }

    pub fn serial_number(&self) -> Option<&str> {
        match self {
            Self::Inverter(i) | Self::ThirdPartyInverter(i) => Some(&i.serial_number),
            Self::Gateway(g) => Some(&g.serial_number),
            Self::Battery(b) => Some(&b.serial_number),
            Self::Meter(m) => Some(&m.serial_number),
            Self::Smi(s) => Some(&s.serial_number),
            Self::Sensor(_) => None,
        }
    }

    /// Sensors and SMI devices have no equipment-data endpoint.
    pub fn reports_telemetry(&self) -> bool {
        !matches!(self, Self::Sensor(_) | Self::Smi(_))
    }
}

/// Everything installed at one site, in discovery order: inverters, third-party inverters,
/// gateways, batteries, meters, sensors, SMI devices. Order within each kind is the upstream's.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Inventory {
    pub equipment: Vec<Equipment>,
}

impl Inventory {
    /// Serial numbers of every device that can be queried for telemetry, in inventory order.
    pub fn telemetry_serials(&self) -> Vec<SerialNumber> {
        self.equipment
            .iter()
            .filter(|e| e.reports_telemetry())
            .filter_map(|e| e.serial_number())
            .map(str::to_string)
            .collect()
    }
}
