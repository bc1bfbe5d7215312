use serde::Deserialize;

use super::{lenient_f64, lenient_i64, present, required};
use crate::domain::{Battery, Equipment, Gateway, Inventory, Inverter, Meter, Sensor, SmiDevice};
use crate::error::DecodeError;

/// `GET site/{siteId}/inventory`
#[derive(Debug, Deserialize)]
pub struct InventoryDocument {
    #[serde(rename = "Inventory", alias = "inventory")]
    pub inventory: InventoryDto,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InventoryDto {
    pub inverters: Vec<InverterDto>,
    pub third_party_inverters: Vec<InverterDto>,
    #[serde(rename = "smiList")]
    pub smi_devices: Vec<SmiDeviceDto>,
    pub meters: Vec<MeterDto>,
    pub sensors: Vec<SensorDto>,
    pub gateways: Vec<GatewayDto>,
    pub batteries: Vec<BatteryDto>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InverterDto {
    pub name: Option<String>,
    pub manufacturer: Option<String>,
    pub model: Option<String>,
    pub communication_method: Option<String>,
    pub cpu_version: Option<String>,
    pub firmware_version: Option<String>,
    #[serde(rename = "SN", alias = "serialNumber")]
    pub serial_number: Option<String>,
    pub connected_optimizers: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeterDto {
    pub name: Option<String>,
    pub manufacturer: Option<String>,
    pub model: Option<String>,
    #[serde(rename = "SN", alias = "serialNumber")]
    pub serial_number: Option<String>,
    #[serde(rename = "type")]
    pub meter_type: Option<String>,
    pub firmware_version: Option<String>,
    pub connected_to: Option<String>,
    #[serde(rename = "connectedSolaredgeDeviceSN")]
    pub connected_solaredge_device_sn: Option<String>,
    pub form: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SensorDto {
    pub id: Option<String>,
    pub connected_to: Option<String>,
    pub category: Option<String>,
    #[serde(rename = "connectedSolaredgeDeviceSN")]
    pub connected_solaredge_device_sn: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayDto {
    pub name: Option<String>,
    #[serde(alias = "SN")]
    pub serial_number: Option<String>,
    pub firmware_version: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatteryDto {
    pub name: Option<String>,
    #[serde(alias = "SN")]
    pub serial_number: Option<String>,
    pub manufacturer: Option<String>,
    pub model: Option<String>,
    pub nameplate_capacity: Option<serde_json::Value>,
    pub firmware_version: Option<String>,
    pub connected_to: Option<String>,
    #[serde(rename = "connectedSolaredgeDeviceSN")]
    pub connected_solaredge_device_sn: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SmiDeviceDto {
    pub name: Option<String>,
    pub manufacturer: Option<String>,
    pub model: Option<String>,
    pub firmware_version: Option<String>,
    pub communication_method: Option<String>,
    #[serde(alias = "SN")]
    pub serial_number: Option<String>,
    pub connected_optimizers: Option<serde_json::Value>,
}

fn serial(path: String, raw: Option<String>) -> Result<String, DecodeError> {
    required(path, present(raw))
}

impl InverterDto {
    fn into_inverter(self, path: &str) -> Result<Inverter, DecodeError> {
        Ok(Inverter {
            serial_number: serial(format!("{path}.SN"), self.serial_number)?,
            name: self.name,
            manufacturer: self.manufacturer,
            model: self.model,
            communication_method: self.communication_method,
            cpu_version: self.cpu_version,
            firmware_version: self.firmware_version,
            connected_optimizers: lenient_i64(self.connected_optimizers),
        })
    }
}

impl TryFrom<InventoryDocument> for Inventory {
    type Error = DecodeError;

    fn try_from(doc: InventoryDocument) -> Result<Self, Self::Error> {
        let inv = doc.inventory;
        let mut equipment = Vec::new();

        for (idx, dto) in inv.inverters.into_iter().enumerate() {
            let path = format!("Inventory.inverters[{idx}]");
            equipment.push(Equipment::Inverter(dto.into_inverter(&path)?));
        }
        for (idx, dto) in inv.third_party_inverters.into_iter().enumerate() {
            let path = format!("Inventory.thirdPartyInverters[{idx}]");
            equipment.push(Equipment::ThirdPartyInverter(dto.into_inverter(&path)?));
        }
        for (idx, dto) in inv.gateways.into_iter().enumerate() {
            equipment.push(Equipment::Gateway(Gateway {
                serial_number: serial(
                    format!("Inventory.gateways[{idx}].serialNumber"),
                    dto.serial_number,
                )?,
                name: dto.name,
                firmware_version: dto.firmware_version,
            }));
        }
        for (idx, dto) in inv.batteries.into_iter().enumerate() {
            equipment.push(Equipment::Battery(Battery {
                serial_number: serial(
                    format!("Inventory.batteries[{idx}].serialNumber"),
                    dto.serial_number,
                )?,
                name: dto.name,
                manufacturer: dto.manufacturer,
                model: dto.model,
                nameplate_capacity: lenient_f64(dto.nameplate_capacity),
                firmware_version: dto.firmware_version,
                connected_to: dto.connected_to,
                connected_solaredge_device_sn: dto.connected_solaredge_device_sn,
            }));
        }
        for (idx, dto) in inv.meters.into_iter().enumerate() {
            equipment.push(Equipment::Meter(Meter {
                serial_number: serial(format!("Inventory.meters[{idx}].SN"), dto.serial_number)?,
                name: dto.name,
                manufacturer: dto.manufacturer,
                model: dto.model,
                meter_type: dto.meter_type,
                firmware_version: dto.firmware_version,
                connected_to: dto.connected_to,
                connected_solaredge_device_sn: dto.connected_solaredge_device_sn,
                form: dto.form,
            }));
        }
        for dto in inv.sensors {
            equipment.push(Equipment::Sensor(Sensor {
                id: dto.id,
                connected_to: dto.connected_to,
                category: dto.category,
                connected_solaredge_device_sn: dto.connected_solaredge_device_sn,
            }));
        }
        for (idx, dto) in inv.smi_devices.into_iter().enumerate() {
            equipment.push(Equipment::Smi(SmiDevice {
                serial_number: serial(
                    format!("Inventory.smiList[{idx}].serialNumber"),
                    dto.serial_number,
                )?,
                name: dto.name,
                manufacturer: dto.manufacturer,
                model: dto.model,
                firmware_version: dto.firmware_version,
                communication_method: dto.communication_method,
                connected_optimizers: lenient_i64(dto.connected_optimizers),
            }));
        }

        Ok(Inventory { equipment })
    }
}
