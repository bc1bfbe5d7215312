//! Expands "all sites" and "all equipment" into concrete identifiers.

use solaredge_client::domain::{SerialNumber, SiteId};

use crate::context::FetchContext;
use crate::fetch::FetchError;
use crate::scope::{dedupe, SiteSelector};

/// Site IDs visible to the credential. An account with no site list yields an empty scope.
pub async fn resolve_sites(ctx: &FetchContext) -> Result<Vec<SiteId>, FetchError> {
    let sites = match ctx.call(ctx.api().site_list()).await {
        None => return Err(FetchError::Cancelled),
        Some(Ok(sites)) => sites,
        Some(Err(e)) if e.is_not_found() => {
            tracing::warn!(error = %e, "site list not found, nothing to fetch");
            Vec::new()
        }
        Some(Err(e)) => return Err(FetchError::SiteDiscovery(e)),
    };

    let ids = dedupe(sites.into_iter().map(|site| site.id));
    tracing::debug!(count = ids.len(), "discovered sites");
    Ok(ids)
}

/// Serials of every device at `site_id` that reports telemetry, in inventory order.
pub async fn resolve_serials(
    ctx: &FetchContext,
    site_id: &str,
) -> Result<Vec<SerialNumber>, FetchError> {
    let inventory = match ctx.call(ctx.api().site_inventory(site_id)).await {
        None => return Err(FetchError::Cancelled),
        Some(Ok(inventory)) => inventory,
        Some(Err(e)) if e.is_not_found() => {
            tracing::warn!(site_id, error = %e, "inventory not found");
            Default::default()
        }
        Some(Err(source)) => {
            return Err(FetchError::Inventory {
                site_id: site_id.to_string(),
                source,
            })
        }
    };

    let serials = dedupe(inventory.telemetry_serials());
    if serials.is_empty() {
        tracing::warn!(site_id, "got no serials for site");
    }
    Ok(serials)
}

pub async fn resolve_site_scope(
    ctx: &FetchContext,
    selector: &SiteSelector,
) -> Result<Vec<SiteId>, FetchError> {
    match selector {
        SiteSelector::Explicit(ids) => Ok(ids.clone()),
        SiteSelector::Discover => resolve_sites(ctx).await,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::testing::{inventory, FakeApi};

    #[tokio::test]
    async fn explicit_sites_skip_discovery() {
        let api = Arc::new(FakeApi::default());
        let ctx = FetchContext::new(api.clone());

        let ids = resolve_site_scope(&ctx, &SiteSelector::Explicit(vec!["1".into(), "2".into()]))
            .await
            .unwrap();
        assert_eq!(ids, vec!["1", "2"]);
        assert!(api.calls().is_empty());
    }

    #[tokio::test]
    async fn discovery_lists_every_site_once() {
        let api = Arc::new(FakeApi {
            sites: vec!["1".into(), "2".into(), "1".into()],
            ..Default::default()
        });
        let ctx = FetchContext::new(api.clone());

        let ids = resolve_site_scope(&ctx, &SiteSelector::Discover).await.unwrap();
        assert_eq!(ids, vec!["1", "2"]);
        assert_eq!(api.calls(), vec!["site_list"]);
    }

    #[tokio::test]
    async fn missing_site_list_is_an_empty_scope() {
        let api = Arc::new(FakeApi {
            failures: [("site_list".to_string(), 404)].into(),
            ..Default::default()
        });
        let ids = resolve_sites(&FetchContext::new(api)).await.unwrap();
        assert!(ids.is_empty());
    }

    #[tokio::test]
    async fn rejected_credential_fails_discovery() {
        let api = Arc::new(FakeApi {
            failures: [("site_list".to_string(), 403)].into(),
            ..Default::default()
        });
        let err = resolve_sites(&FetchContext::new(api)).await.unwrap_err();
        assert!(matches!(err, FetchError::SiteDiscovery(_)));
    }

    #[tokio::test]
    async fn serials_follow_inventory_order() {
        let api = Arc::new(FakeApi {
            inventories: [("1234".to_string(), inventory(&["INV1", "INV2"], &["MTR1"]))].into(),
            ..Default::default()
        });
        let serials = resolve_serials(&FetchContext::new(api), "1234").await.unwrap();
        assert_eq!(serials, vec!["INV1", "INV2", "MTR1"]);
    }

    #[tokio::test]
    async fn site_without_equipment_yields_no_serials() {
        let api = Arc::new(FakeApi {
            inventories: [("1234".to_string(), inventory(&[], &[]))].into(),
            ..Default::default()
        });
        let serials = resolve_serials(&FetchContext::new(api), "1234").await.unwrap();
        assert!(serials.is_empty());
    }

    #[tokio::test]
    async fn inventory_failure_names_the_site() {
        let api = Arc::new(FakeApi {
            failures: [("inventory:1234".to_string(), 500)].into(),
            ..Default::default()
        });
        let err = resolve_serials(&FetchContext::new(api), "1234").await.unwrap_err();
        assert!(matches!(err, FetchError::Inventory { ref site_id, .. } if site_id == "1234"));
    }
}
