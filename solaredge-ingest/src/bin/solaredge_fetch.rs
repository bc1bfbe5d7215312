//! One-shot export of energy or telemetry documents to a local directory.

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use solaredge_client::client::DEFAULT_BASE_URL;
use solaredge_client::timefmt::parse_date_or_timestamp;
use solaredge_client::{ClientConfig, HttpMonitoringClient};
use solaredge_ingest::{
    config::API_KEY_VAR,
    context::DEFAULT_CONCURRENCY,
    fetch_energy, fetch_telemetry, observability,
    pipeline::{write_energy_files, write_telemetry_files},
    scope::{validate_energy, validate_telemetry, ScopeRequest},
    sinks::FsBlobStore,
    FetchContext, RetryPolicy, RetryingApi,
};
use time::{Duration, OffsetDateTime, PrimitiveDateTime};
use tokio_util::sync::CancellationToken;

/// A toolkit for rendering data from SolarEdge monitoring.
#[derive(Parser, Debug)]
#[command(name = "solaredge-fetch", version, about, long_about = None)]
struct Cli {
    /// Monitoring API key.
    #[arg(long, env = API_KEY_VAR, hide_env_values = true, global = true)]
    api_key: Option<String>,

    #[arg(long, default_value = DEFAULT_BASE_URL, global = true)]
    base_url: String,

    /// Debug logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Get energy readings for sites.
    GetEnergy {
        #[command(flatten)]
        common: CommonArgs,
    },
    /// Get equipment telemetry for sites.
    GetTelemetry {
        #[command(flatten)]
        common: CommonArgs,

        /// Serial numbers to query at every selected site.
        #[arg(long = "serial-number", value_delimiter = ',')]
        serial_numbers: Vec<String>,

        /// Query every device in each site's inventory.
        #[arg(long)]
        all_equipment: bool,
    },
}

#[derive(Args, Debug)]
struct CommonArgs {
    /// Window start, `YYYY-MM-DD` or `YYYY-MM-DD hh:mm:ss`. Defaults to 24 hours ago (UTC).
    #[arg(long, value_parser = parse_time_arg)]
    start_time: Option<PrimitiveDateTime>,

    /// Window end. Defaults to now (UTC).
    #[arg(long, value_parser = parse_time_arg)]
    end_time: Option<PrimitiveDateTime>,

    /// Daily samples.
    #[arg(long)]
    by_day: bool,

    /// Hourly samples (the default).
    #[arg(long)]
    by_hour: bool,

    /// 15-minute samples.
    #[arg(long)]
    by_quarter_hour: bool,

    /// Site IDs; repeat the flag or separate with commas.
    #[arg(long = "site-id", value_delimiter = ',')]
    site_ids: Vec<String>,

    /// Query every site visible to the API key.
    #[arg(long)]
    all_sites: bool,

    /// Where output files belong. Created when missing.
    #[arg(long, default_value = ".")]
    output_dir: PathBuf,

    /// Upstream calls in flight at once (1-8).
    #[arg(long, default_value_t = DEFAULT_CONCURRENCY)]
    concurrency: usize,

    /// Attempts per upstream call, including the first.
    #[arg(long, default_value_t = RetryPolicy::default().max_attempts)]
    max_attempts: u32,
}

impl CommonArgs {
    fn scope_request(&self) -> ScopeRequest {
        let now = now_utc();
        ScopeRequest {
            start_time: Some(self.start_time.unwrap_or(now - Duration::hours(24))),
            end_time: Some(self.end_time.unwrap_or(now)),
            by_day: self.by_day,
            by_hour: self.by_hour,
            by_quarter_hour: self.by_quarter_hour,
            all_sites: self.all_sites,
            site_ids: self.site_ids.clone(),
            ..Default::default()
        }
    }

    fn context(&self, api_key: String, base_url: &str) -> Result<FetchContext> {
        let mut config = ClientConfig::new(api_key);
        config.base_url = base_url.to_string();
        let client = HttpMonitoringClient::new(config)?;
        let policy = RetryPolicy {
            max_attempts: self.max_attempts,
            ..RetryPolicy::default()
        };

        let cancel = CancellationToken::new();
        let on_interrupt = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                on_interrupt.cancel();
            }
        });

        Ok(FetchContext::new(Arc::new(RetryingApi::new(client, policy)))
            .with_concurrency(self.concurrency)
            .with_cancellation(cancel))
    }

    async fn output_store(&self) -> Result<FsBlobStore> {
        output_store(&self.output_dir).await
    }
}

/// Creates `dir` when missing; anything other than a directory is rejected.
async fn output_store(dir: &Path) -> Result<FsBlobStore> {
    match tokio::fs::metadata(dir).await {
        Ok(meta) if meta.is_dir() => {}
        Ok(_) => bail!("path {} must refer to a directory", dir.display()),
        Err(_) => tokio::fs::create_dir_all(dir)
            .await
            .with_context(|| format!("unable to create output directory {}", dir.display()))?,
    }
    Ok(FsBlobStore::new(dir))
}

fn parse_time_arg(raw: &str) -> Result<PrimitiveDateTime, String> {
    parse_date_or_timestamp(raw.trim())
        .map_err(|e| format!("expected YYYY-MM-DD or YYYY-MM-DD hh:mm:ss: {e}"))
}

fn now_utc() -> PrimitiveDateTime {
    let now = OffsetDateTime::now_utc();
    PrimitiveDateTime::new(now.date(), now.time())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    observability::init_tracing(if cli.verbose { "debug" } else { "info" });

    let api_key = match cli.api_key.filter(|k| !k.trim().is_empty()) {
        Some(key) => key,
        None => bail!("api-key must be specified (--api-key or {API_KEY_VAR})"),
    };

    match cli.command {
        Command::GetEnergy { common } => {
            let scope = validate_energy(&common.scope_request())?;
            let store = common.output_store().await?;
            let ctx = common.context(api_key, &cli.base_url)?;

            let results = fetch_energy(&ctx, &scope).await?;
            let written = write_energy_files(&store, &results).await?;
            tracing::info!(
                files = written.len(),
                dir = %common.output_dir.display(),
                "wrote energy files"
            );
        }
        Command::GetTelemetry {
            common,
            serial_numbers,
            all_equipment,
        } => {
            let request = ScopeRequest {
                all_equipment,
                serial_numbers,
                ..common.scope_request()
            };
            let scope = validate_telemetry(&request)?;
            let store = common.output_store().await?;
            let ctx = common.context(api_key, &cli.base_url)?;

            let results = fetch_telemetry(&ctx, &scope).await?;
            let written = write_telemetry_files(&store, &results).await?;
            tracing::info!(
                files = written.len(),
                dir = %common.output_dir.display(),
                "wrote telemetry files"
            );
        }
    }

    Ok(())
}
