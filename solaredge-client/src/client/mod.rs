//! The remote monitoring API as a capability.
//!
//! Orchestration code depends on [`MonitoringApi`] only; [`HttpMonitoringClient`] is the
//! production implementation.

mod http;

pub use http::{ClientConfig, HttpMonitoringClient, DEFAULT_BASE_URL};

use async_trait::async_trait;

use crate::domain::{Energy, Inventory, Site, Telemetry, TimeWindow};
use crate::error::ApiError;

/// Endpoint paths as segments; identifiers are percent-encoded when the URL is built.
pub const SITE_LIST_ENDPOINT: [&str; 2] = ["sites", "list"];

pub fn site_inventory_endpoint(site_id: &str) -> [&str; 3] {
    ["site", site_id, "inventory"]
}

pub fn energy_endpoint(site_id: &str) -> [&str; 3] {
    ["site", site_id, "energy"]
}

pub fn equipment_data_endpoint<'a>(site_id: &'a str, serial: &'a str) -> [&'a str; 4] {
    ["site", site_id, serial, "data"]
}

#[async_trait]
pub trait MonitoringApi: Send + Sync {
    /// Every site visible to the credential.
    async fn site_list(&self) -> Result<Vec<Site>, ApiError>;

    async fn site_inventory(&self, site_id: &str) -> Result<Inventory, ApiError>;

    async fn energy(&self, site_id: &str, window: &TimeWindow) -> Result<Energy, ApiError>;

    async fn equipment_telemetry(
        &self,
        site_id: &str,
        serial: &str,
        window: &TimeWindow,
    ) -> Result<Vec<Telemetry>, ApiError>;
}
