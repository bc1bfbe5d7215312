//! Concurrent energy and telemetry retrieval over a validated scope.
//!
//! A run either returns one entry for every site (or site/serial pair) in scope or fails with
//! the first error encountered. Partial results are never returned.

use std::{collections::BTreeMap, time::Duration};

use futures::{stream, StreamExt, TryStreamExt};
use solaredge_client::domain::{Energy, SerialNumber, SiteId, Telemetry, TimeWindow};
use solaredge_client::ApiError;

use crate::context::FetchContext;
use crate::discovery;
use crate::scope::{dedupe, FetchScope, SerialSelector, TelemetryScope, ValidationError};

/// Identifies one device's telemetry series.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EquipmentKey {
    pub site_id: SiteId,
    pub serial: SerialNumber,
}

impl EquipmentKey {
    pub fn new(site_id: impl Into<SiteId>, serial: impl Into<SerialNumber>) -> Self {
        Self {
            site_id: site_id.into(),
            serial: serial.into(),
        }
    }
}

pub type EnergyResults = BTreeMap<SiteId, Energy>;
pub type TelemetryResults = BTreeMap<EquipmentKey, Vec<Telemetry>>;

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("site discovery failed: {0}")]
    SiteDiscovery(#[source] ApiError),
    #[error("unable to get inventory for site {site_id}: {source}")]
    Inventory {
        site_id: SiteId,
        #[source]
        source: ApiError,
    },
    #[error("energy fetch failed for site {site_id}: {source}")]
    Energy {
        site_id: SiteId,
        #[source]
        source: ApiError,
    },
    #[error("telemetry fetch failed for site {site_id} serial {serial}: {source}")]
    Telemetry {
        site_id: SiteId,
        serial: SerialNumber,
        #[source]
        source: ApiError,
    },
    #[error("fetch cancelled before completion")]
    Cancelled,
    #[error("fetch did not complete within {0:?}")]
    DeadlineExceeded(Duration),
}

impl FetchError {
    /// The upstream failure behind this error, if there is one.
    pub fn api_error(&self) -> Option<&ApiError> {
        match self {
            Self::SiteDiscovery(source)
            | Self::Inventory { source, .. }
            | Self::Energy { source, .. }
            | Self::Telemetry { source, .. } => Some(source),
            Self::Validation(_) | Self::Cancelled | Self::DeadlineExceeded(_) => None,
        }
    }
}

/// One energy query per site in scope.
pub async fn fetch_energy(ctx: &FetchContext, scope: &FetchScope) -> Result<EnergyResults, FetchError> {
    let sites = discovery::resolve_site_scope(ctx, &scope.sites).await?;
    let window = scope.window;
    tracing::info!(
        sites = sites.len(),
        time_unit = window.time_unit.as_str(),
        "fetching site energy"
    );

    stream::iter(sites)
        .map(move |site_id| async move {
            let energy = site_energy(ctx, &site_id, &window).await?;
            Ok::<_, FetchError>((site_id, energy))
        })
        .buffer_unordered(ctx.concurrency())
        .try_collect()
        .await
}

/// One telemetry query per (site, serial) pair in scope.
pub async fn fetch_telemetry(
    ctx: &FetchContext,
    scope: &TelemetryScope,
) -> Result<TelemetryResults, FetchError> {
    let sites = discovery::resolve_site_scope(ctx, &scope.sites).await?;
    let keys = equipment_keys(ctx, &sites, &scope.serials).await?;
    let window = scope.window;
    tracing::info!(
        sites = sites.len(),
        equipment = keys.len(),
        "fetching equipment telemetry"
    );

    stream::iter(keys)
        .map(move |key| async move {
            let samples = equipment_telemetry(ctx, &key, &window).await?;
            Ok::<_, FetchError>((key, samples))
        })
        .buffer_unordered(ctx.concurrency())
        .try_collect()
        .await
}

async fn equipment_keys(
    ctx: &FetchContext,
    sites: &[SiteId],
    serials: &SerialSelector,
) -> Result<Vec<EquipmentKey>, FetchError> {
    let per_site: Vec<(SiteId, Vec<SerialNumber>)> = match serials {
        SerialSelector::Explicit(serials) => sites
            .iter()
            .map(|site_id| (site_id.clone(), serials.clone()))
            .collect(),
        SerialSelector::Discover => {
            stream::iter(sites.iter().cloned())
                .map(move |site_id| async move {
                    let serials = discovery::resolve_serials(ctx, &site_id).await?;
                    Ok::<_, FetchError>((site_id, serials))
                })
                .buffered(ctx.concurrency())
                .try_collect()
                .await?
        }
    };

    Ok(dedupe(per_site.into_iter().flat_map(|(site_id, serials)| {
        serials
            .into_iter()
            .map(move |serial| EquipmentKey::new(site_id.clone(), serial))
    })))
}

async fn site_energy(
    ctx: &FetchContext,
    site_id: &str,
    window: &TimeWindow,
) -> Result<Energy, FetchError> {
    match ctx.call(ctx.api().energy(site_id, window)).await {
        None => Err(FetchError::Cancelled),
        Some(Ok(energy)) => {
            tracing::debug!(site_id, samples = energy.values.len(), "fetched energy");
            Ok(energy)
        }
        Some(Err(source)) => {
            metrics::counter!("solaredge_fetch_failures_total").increment(1);
            Err(FetchError::Energy {
                site_id: site_id.to_string(),
                source,
            })
        }
    }
}

async fn equipment_telemetry(
    ctx: &FetchContext,
    key: &EquipmentKey,
    window: &TimeWindow,
) -> Result<Vec<Telemetry>, FetchError> {
    let call = ctx
        .api()
        .equipment_telemetry(&key.site_id, &key.serial, window);
    match ctx.call(call).await {
        None => Err(FetchError::Cancelled),
        Some(Ok(samples)) => {
            tracing::debug!(
                site_id = %key.site_id,
                serial = %key.serial,
                samples = samples.len(),
                "fetched telemetry"
            );
            Ok(samples)
        }
        Some(Err(source)) => {
            metrics::counter!("solaredge_fetch_failures_total").increment(1);
            Err(FetchError::Telemetry {
                site_id: key.site_id.clone(),
                serial: key.serial.clone(),
                source,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use solaredge_client::domain::TimeUnit;
    use time::macros::datetime;

    use super::*;
    use crate::scope::SiteSelector;
    use crate::testing::{energy_at, inventory, telemetry_at, FakeApi};

    fn window() -> TimeWindow {
        TimeWindow {
            time_unit: TimeUnit::Hour,
            start: datetime!(2024-03-01 00:00:00),
            end: datetime!(2024-03-02 00:00:00),
        }
    }

    fn energy_scope(sites: SiteSelector) -> FetchScope {
        FetchScope {
            window: window(),
            sites,
        }
    }

    fn three_sites() -> FakeApi {
        let sample = energy_at(&[datetime!(2024-03-01 10:00:00)]);
        FakeApi {
            sites: vec!["1".into(), "2".into(), "3".into()],
            energy: [
                ("1".to_string(), sample.clone()),
                ("2".to_string(), sample.clone()),
                ("3".to_string(), sample),
            ]
            .into(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn energy_has_one_entry_per_site() {
        let api = Arc::new(three_sites());
        let ctx = FetchContext::new(api.clone());

        let results = fetch_energy(&ctx, &energy_scope(SiteSelector::Discover))
            .await
            .unwrap();

        assert_eq!(results.keys().collect::<Vec<_>>(), vec!["1", "2", "3"]);
        assert_eq!(api.calls_matching("energy:").len(), 3);
    }

    #[tokio::test]
    async fn one_site_failure_fails_the_run() {
        let mut api = three_sites();
        api.failures.insert("energy:2".into(), 403);
        let ctx = FetchContext::new(Arc::new(api));

        let err = fetch_energy(
            &ctx,
            &energy_scope(SiteSelector::Explicit(vec!["1".into(), "2".into(), "3".into()])),
        )
        .await
        .unwrap_err();

        match err {
            FetchError::Energy { site_id, source } => {
                assert_eq!(site_id, "2");
                assert!(matches!(source, ApiError::Unauthorized { .. }));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn empty_site_scope_is_an_empty_result() {
        let ctx = FetchContext::new(Arc::new(FakeApi::default()));
        let results = fetch_energy(&ctx, &energy_scope(SiteSelector::Discover))
            .await
            .unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn telemetry_discovers_serials_per_site() {
        let api = Arc::new(FakeApi {
            inventories: [("1234".to_string(), inventory(&["INV1"], &["MTR1"]))].into(),
            telemetry: [
                (
                    ("1234".to_string(), "INV1".to_string()),
                    telemetry_at(&[datetime!(2024-03-01 10:00:00)]),
                ),
                (
                    ("1234".to_string(), "MTR1".to_string()),
                    telemetry_at(&[datetime!(2024-03-01 10:15:00)]),
                ),
            ]
            .into(),
            ..Default::default()
        });
        let ctx = FetchContext::new(api.clone());
        let scope = TelemetryScope {
            window: TimeWindow {
                time_unit: TimeUnit::Day,
                ..window()
            },
            sites: SiteSelector::Explicit(vec!["1234".into()]),
            serials: SerialSelector::Discover,
        };

        let results = fetch_telemetry(&ctx, &scope).await.unwrap();

        assert_eq!(
            results.keys().cloned().collect::<Vec<_>>(),
            vec![
                EquipmentKey::new("1234", "INV1"),
                EquipmentKey::new("1234", "MTR1"),
            ]
        );
        assert_eq!(api.calls_matching("telemetry:").len(), 2);
    }

    #[tokio::test]
    async fn explicit_serials_apply_to_every_site() {
        let samples = telemetry_at(&[datetime!(2024-03-01 10:00:00)]);
        let api = Arc::new(FakeApi {
            telemetry: [
                (("1".to_string(), "SN".to_string()), samples.clone()),
                (("2".to_string(), "SN".to_string()), samples),
            ]
            .into(),
            ..Default::default()
        });
        let ctx = FetchContext::new(api.clone());
        let scope = TelemetryScope {
            window: window(),
            sites: SiteSelector::Explicit(vec!["1".into(), "2".into()]),
            serials: SerialSelector::Explicit(vec!["SN".into()]),
        };

        let results = fetch_telemetry(&ctx, &scope).await.unwrap();

        assert_eq!(results.len(), 2);
        assert!(api.calls_matching("inventory:").is_empty());
    }

    #[tokio::test]
    async fn telemetry_failure_names_site_and_serial() {
        let api = Arc::new(FakeApi {
            inventories: [("1234".to_string(), inventory(&["INV1"], &[]))].into(),
            failures: [("telemetry:1234/INV1".to_string(), 500)].into(),
            ..Default::default()
        });
        let scope = TelemetryScope {
            window: window(),
            sites: SiteSelector::Explicit(vec!["1234".into()]),
            serials: SerialSelector::Discover,
        };

        let err = fetch_telemetry(&FetchContext::new(api), &scope)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            FetchError::Telemetry { ref site_id, ref serial, .. } if site_id == "1234" && serial == "INV1"
        ));
        assert!(err.api_error().is_some());
    }

    #[tokio::test]
    async fn cancellation_abandons_in_flight_calls() {
        let api = Arc::new(FakeApi {
            sites: vec!["1".into()],
            hang: true,
            ..Default::default()
        });
        let ctx = FetchContext::new(api);
        let token = ctx.cancel_token().clone();

        let run = {
            let ctx = ctx.clone();
            tokio::spawn(async move {
                fetch_energy(&ctx, &energy_scope(SiteSelector::Discover)).await
            })
        };
        tokio::task::yield_now().await;
        token.cancel();

        let err = run.await.unwrap().unwrap_err();
        assert!(matches!(err, FetchError::Cancelled));
    }
}
