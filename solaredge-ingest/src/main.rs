use std::sync::Arc;

use anyhow::{Context, Result};
use solaredge_client::HttpMonitoringClient;
use solaredge_ingest::{
    config::AppConfig, metrics_server, observability, scope::SiteSelector, sinks, EnergyIngestJob,
    FetchContext, RetryingApi,
};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> Result<()> {
    observability::init_tracing("info");

    let cfg = AppConfig::load()?;

    if let Some(metrics_cfg) = &cfg.metrics {
        metrics_server::init(&metrics_cfg.bind_addr)?;
    }

    let client = HttpMonitoringClient::new(cfg.api.client_config()?)?;
    let api = Arc::new(RetryingApi::new(client, cfg.fetch.retry_policy()));

    let shutdown = CancellationToken::new();
    let ctx = FetchContext::new(api)
        .with_concurrency(cfg.fetch.concurrency)
        .with_cancellation(shutdown.clone());

    let store = sinks::build_store(&cfg.storage)
        .await
        .context("unable to initialise artifact storage")?;

    let sites = cfg.energy.site_selector();
    if sites == SiteSelector::Discover {
        tracing::info!("no site ids configured, ingesting every site visible to the api key");
    }
    let job = EnergyIngestJob::new(
        ctx,
        store,
        cfg.storage.prefix.clone(),
        cfg.energy.time_unit,
        sites,
    )
    .with_run_timeout(cfg.fetch.run_timeout());

    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("shutdown requested");
                shutdown.cancel();
            }
        });
    }

    let mut ticker = tokio::time::interval(cfg.energy.poll_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let now = cfg.energy.site_now()?;
        match job.run_once(now).await {
            Ok(summary) => {
                metrics::counter!("solaredge_ingest_runs_total", "outcome" => "success").increment(1);
                tracing::info!(
                    sites = summary.sites,
                    samples = summary.samples,
                    checkpoint_advanced = summary.checkpoint_advanced,
                    "energy ingestion run complete"
                );
            }
            Err(e) if shutdown.is_cancelled() => {
                tracing::info!(error = %e, "energy ingestion run interrupted by shutdown");
                break;
            }
            Err(e) => {
                metrics::counter!("solaredge_ingest_runs_total", "outcome" => "failure").increment(1);
                tracing::error!(error = %e, "energy ingestion run failed, checkpoint left unchanged");
            }
        }
    }

    Ok(())
}
