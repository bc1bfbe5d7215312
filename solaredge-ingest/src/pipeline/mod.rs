//! The incremental energy ingestion job: one checkpointed pass from the stored high-water mark
//! up to now.

mod artifacts;

use std::{sync::Arc, time::Duration};

use solaredge_client::domain::TimeUnit;
use solaredge_client::timefmt::{format_timestamp, EPOCH};
use time::PrimitiveDateTime;

pub use artifacts::{
    energy_file_name, incremental_energy_key, telemetry_file_name, write_energy_files,
    write_telemetry_files,
};

use crate::checkpoint::{advance, compute_watermark, CheckpointError, CheckpointStore};
use crate::context::FetchContext;
use crate::fetch::{fetch_energy, FetchError};
use crate::scope::{validate_energy, ScopeRequest, SiteSelector};
use crate::sinks::{BlobError, BlobStore};

#[derive(thiserror::Error, Debug)]
pub enum IngestError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),
    #[error("unable to serialize artifact {key}: {source}")]
    Serialize {
        key: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("unable to store artifact {key}: {source}")]
    Store {
        key: String,
        #[source]
        source: BlobError,
    },
}

/// Outcome of one successful run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub sites: usize,
    pub samples: usize,
    /// Latest sample date seen by this run, the epoch if none.
    pub watermark: PrimitiveDateTime,
    pub checkpoint_advanced: bool,
}

pub struct EnergyIngestJob {
    ctx: FetchContext,
    store: Arc<dyn BlobStore>,
    checkpoints: CheckpointStore,
    prefix: String,
    time_unit: TimeUnit,
    sites: SiteSelector,
    run_timeout: Option<Duration>,
}

impl EnergyIngestJob {
    pub fn new(
        ctx: FetchContext,
        store: Arc<dyn BlobStore>,
        prefix: impl Into<String>,
        time_unit: TimeUnit,
        sites: SiteSelector,
    ) -> Self {
        let prefix = prefix.into();
        Self {
            ctx,
            checkpoints: CheckpointStore::new(store.clone(), &prefix),
            store,
            prefix,
            time_unit,
            sites,
            run_timeout: None,
        }
    }

    pub fn with_run_timeout(mut self, run_timeout: Option<Duration>) -> Self {
        self.run_timeout = run_timeout;
        self
    }

    /// Fetches `[max(checkpoint, now - max_range), now]`, writes one artifact per site with
    /// samples, then moves the checkpoint to the run's watermark. Any failure before the
    /// checkpoint write leaves the checkpoint untouched.
    pub async fn run_once(&self, now: PrimitiveDateTime) -> Result<RunSummary, IngestError> {
        let prior = self.checkpoints.load().await?;
        let start = window_start(prior, now, self.time_unit);
        if start >= now {
            tracing::info!(
                checkpoint = %format_timestamp(start),
                "checkpoint is not behind the current time, nothing to fetch"
            );
            return Ok(RunSummary {
                sites: 0,
                samples: 0,
                watermark: prior.unwrap_or(EPOCH),
                checkpoint_advanced: false,
            });
        }

        let scope = validate_energy(&self.scope_request(start, now)).map_err(FetchError::from)?;
        tracing::info!(
            start = %format_timestamp(start),
            end = %format_timestamp(now),
            time_unit = self.time_unit.as_str(),
            "starting energy ingestion run"
        );

        let run_ctx = self
            .ctx
            .clone()
            .with_cancellation(self.ctx.cancel_token().child_token());
        let results = run_ctx
            .with_deadline(self.run_timeout, fetch_energy(&run_ctx, &scope))
            .await?;
        let watermark = compute_watermark(&results);

        let mut samples = 0;
        for (site_id, energy) in &results {
            if energy.values.is_empty() {
                tracing::debug!(site_id = %site_id, "no samples in window, skipping artifact");
                continue;
            }
            samples += energy.values.len();
            let key = incremental_energy_key(&self.prefix, site_id, watermark);
            artifacts::put_json(self.store.as_ref(), &key, energy).await?;
        }

        let next = advance(prior, watermark);
        if let Some(checkpoint) = next {
            self.checkpoints.save(checkpoint).await?;
            metrics::counter!("solaredge_checkpoint_advanced_total").increment(1);
            tracing::info!(checkpoint = %format_timestamp(checkpoint), "checkpoint advanced");
        }

        Ok(RunSummary {
            sites: results.len(),
            samples,
            watermark,
            checkpoint_advanced: next.is_some(),
        })
    }

    fn scope_request(&self, start: PrimitiveDateTime, end: PrimitiveDateTime) -> ScopeRequest {
        let mut request = ScopeRequest {
            start_time: Some(start),
            end_time: Some(end),
            ..Default::default()
        };
        request.select_time_unit(self.time_unit);
        match &self.sites {
            SiteSelector::Discover => request.all_sites = true,
            SiteSelector::Explicit(ids) => request.site_ids = ids.clone(),
        }
        request
    }
}

/// The later of the checkpoint and the oldest start the upstream accepts for `time_unit`.
pub fn window_start(
    checkpoint: Option<PrimitiveDateTime>,
    now: PrimitiveDateTime,
    time_unit: TimeUnit,
) -> PrimitiveDateTime {
    let floor = now.checked_sub(time_unit.max_range()).unwrap_or(EPOCH);
    match checkpoint {
        Some(checkpoint) if checkpoint < floor => {
            tracing::warn!(
                checkpoint = %format_timestamp(checkpoint),
                floor = %format_timestamp(floor),
                "checkpoint predates the widest accepted window, older data will not be fetched"
            );
            floor
        }
        Some(checkpoint) => checkpoint,
        None => floor,
    }
}
