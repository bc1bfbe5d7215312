//! JSON artifacts and their object keys.

use bytes::Bytes;
use serde::Serialize;
use solaredge_client::timefmt::format_timestamp;
use time::PrimitiveDateTime;

use super::IngestError;
use crate::fetch::{EnergyResults, EquipmentKey, TelemetryResults};
use crate::sinks::{namespaced_key, BlobStore};

const JSON: &str = "application/json";

pub fn energy_file_name(site_id: &str) -> String {
    format!("{site_id}_energy.json")
}

pub fn telemetry_file_name(key: &EquipmentKey) -> String {
    format!("{}_{}.json", key.site_id, key.serial)
}

/// `{prefix}/energy/{site}/{watermark}.json`
pub fn incremental_energy_key(prefix: &str, site_id: &str, watermark: PrimitiveDateTime) -> String {
    namespaced_key(
        prefix,
        &format!("energy/{site_id}/{}.json", format_timestamp(watermark)),
    )
}

pub(crate) async fn put_json<T: Serialize + ?Sized>(
    store: &dyn BlobStore,
    key: &str,
    value: &T,
) -> Result<(), IngestError> {
    let body = serde_json::to_vec_pretty(value).map_err(|source| IngestError::Serialize {
        key: key.to_string(),
        source,
    })?;
    store
        .put_object(key, Bytes::from(body), JSON)
        .await
        .map_err(|source| IngestError::Store {
            key: key.to_string(),
            source,
        })?;
    metrics::counter!("solaredge_artifacts_written_total").increment(1);
    tracing::debug!(key, "wrote artifact");
    Ok(())
}

/// One `{site}_energy.json` per site. Returns the keys written.
pub async fn write_energy_files(
    store: &dyn BlobStore,
    results: &EnergyResults,
) -> Result<Vec<String>, IngestError> {
    let mut written = Vec::with_capacity(results.len());
    for (site_id, energy) in results {
        let key = energy_file_name(site_id);
        put_json(store, &key, energy).await?;
        written.push(key);
    }
    Ok(written)
}

/// One `{site}_{serial}.json` per device. Returns the keys written.
pub async fn write_telemetry_files(
    store: &dyn BlobStore,
    results: &TelemetryResults,
) -> Result<Vec<String>, IngestError> {
    let mut written = Vec::with_capacity(results.len());
    for (key, samples) in results {
        let name = telemetry_file_name(key);
        put_json(store, &name, samples).await?;
        written.push(name);
    }
    Ok(written)
}
