pub mod checkpoint;
pub mod config;
pub mod context;
pub mod discovery;
pub mod fetch;
pub mod metrics_server;
pub mod observability;
pub mod pipeline;
pub mod retry;
pub mod scope;
pub mod sinks;

#[cfg(test)]
mod testing;

pub use context::FetchContext;
pub use fetch::{fetch_energy, fetch_telemetry, EquipmentKey, FetchError};
pub use pipeline::{EnergyIngestJob, IngestError, RunSummary};
pub use retry::{RetryPolicy, RetryingApi};
