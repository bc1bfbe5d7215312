//! In-process stand-ins for the monitoring API, shared by the unit tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use solaredge_client::domain::{
    Energy, EnergySample, Equipment, Inventory, Inverter, Location, Meter, Site, Telemetry, TimeUnit,
    TimeWindow,
};
use solaredge_client::{ApiError, MonitoringApi};
use time::PrimitiveDateTime;

/// Serves canned documents. Anything not configured answers `NotFound`.
#[derive(Default)]
pub(crate) struct FakeApi {
    pub sites: Vec<String>,
    pub inventories: HashMap<String, Inventory>,
    pub energy: HashMap<String, Energy>,
    pub telemetry: HashMap<(String, String), Vec<Telemetry>>,
    /// Call label (see [`FakeApi::calls`]) to the HTTP status it should fail with.
    pub failures: HashMap<String, u16>,
    /// Never answer energy or telemetry queries.
    pub hang: bool,
    pub calls: Mutex<Vec<String>>,
}

impl FakeApi {
    /// Labels of every call made so far: `site_list`, `inventory:{site}`, `energy:{site}`,
    /// `telemetry:{site}/{serial}`.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_matching(&self, prefix: &str) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| c.starts_with(prefix))
            .collect()
    }

    fn enter(&self, label: String) -> Result<(), ApiError> {
        self.calls.lock().unwrap().push(label.clone());
        match self.failures.get(&label) {
            Some(status) => Err(error_for(&label, *status)),
            None => Ok(()),
        }
    }
}

pub(crate) fn error_for(endpoint: &str, status: u16) -> ApiError {
    let endpoint = endpoint.to_string();
    match status {
        401 | 403 => ApiError::Unauthorized { endpoint, status },
        404 => ApiError::NotFound { endpoint },
        429 => ApiError::RateLimited {
            endpoint,
            retry_after: None,
        },
        _ => ApiError::Status {
            endpoint,
            status,
            body: String::new(),
        },
    }
}

#[async_trait]
impl MonitoringApi for FakeApi {
    async fn site_list(&self) -> Result<Vec<Site>, ApiError> {
        self.enter("site_list".into())?;
        Ok(self.sites.iter().map(|id| site(id)).collect())
    }

    async fn site_inventory(&self, site_id: &str) -> Result<Inventory, ApiError> {
        let label = format!("inventory:{site_id}");
        self.enter(label.clone())?;
        self.inventories
            .get(site_id)
            .cloned()
            .ok_or(ApiError::NotFound { endpoint: label })
    }

    async fn energy(&self, site_id: &str, _window: &TimeWindow) -> Result<Energy, ApiError> {
        let label = format!("energy:{site_id}");
        self.enter(label.clone())?;
        if self.hang {
            std::future::pending::<()>().await;
        }
        self.energy
            .get(site_id)
            .cloned()
            .ok_or(ApiError::NotFound { endpoint: label })
    }

    async fn equipment_telemetry(
        &self,
        site_id: &str,
        serial: &str,
        _window: &TimeWindow,
    ) -> Result<Vec<Telemetry>, ApiError> {
        let label = format!("telemetry:{site_id}/{serial}");
        self.enter(label.clone())?;
        if self.hang {
            std::future::pending::<()>().await;
        }
        self.telemetry
            .get(&(site_id.to_string(), serial.to_string()))
            .cloned()
            .ok_or(ApiError::NotFound { endpoint: label })
    }
}

pub(crate) fn site(id: &str) -> Site {
    Site {
        id: id.to_string(),
        name: format!("site {id}"),
        account_id: None,
        status: Some("Active".into()),
        peak_power: None,
        last_update_time: None,
        installation_date: None,
        pto_date: None,
        notes: None,
        site_type: None,
        location: Location::default(),
        primary_module: None,
        is_public: false,
    }
}

pub(crate) fn energy_at(dates: &[PrimitiveDateTime]) -> Energy {
    Energy {
        time_unit: TimeUnit::Hour,
        unit: "Wh".into(),
        measured_by: Some("INVERTER".into()),
        values: dates
            .iter()
            .enumerate()
            .map(|(idx, date)| EnergySample {
                date: *date,
                value: Some(idx as i64 * 100),
            })
            .collect(),
    }
}

pub(crate) fn telemetry_at(dates: &[PrimitiveDateTime]) -> Vec<Telemetry> {
    dates
        .iter()
        .map(|date| Telemetry {
            date: *date,
            total_active_power: Some(1500.0),
            dc_voltage: None,
            ground_fault_resistance: None,
            power_limit: None,
            total_energy: None,
            temperature: Some(41.5),
            inverter_mode: Some("MPPT".into()),
            operation_mode: None,
            l1_data: None,
            l2_data: None,
            l3_data: None,
        })
        .collect()
}

pub(crate) fn inventory(inverters: &[&str], meters: &[&str]) -> Inventory {
    let inverters = inverters.iter().map(|sn| {
        Equipment::Inverter(Inverter {
            name: Some(format!("Inverter {sn}")),
            manufacturer: Some("SolarEdge".into()),
            model: None,
            communication_method: None,
            cpu_version: None,
            firmware_version: None,
            serial_number: sn.to_string(),
            connected_optimizers: None,
        })
    });
    let meters = meters.iter().map(|sn| {
        Equipment::Meter(Meter {
            name: Some("Production Meter".into()),
            manufacturer: None,
            model: None,
            serial_number: sn.to_string(),
            meter_type: Some("Production".into()),
            firmware_version: None,
            connected_to: None,
            connected_solaredge_device_sn: None,
            form: None,
        })
    });
    Inventory {
        equipment: inverters.chain(meters).collect(),
    }
}
