//! The high-water mark of ingested samples, persisted between runs.
//!
//! Only a fully successful run may move the checkpoint, and only forward. A failed run leaves
//! it where it was so the next run re-fetches the same window.

use std::{collections::BTreeMap, sync::Arc};

use bytes::Bytes;
use solaredge_client::domain::{Energy, Telemetry};
use solaredge_client::timefmt::{format_timestamp, parse_timestamp, EPOCH};
use time::PrimitiveDateTime;

use crate::sinks::{namespaced_key, BlobError, BlobStore};

pub const CHECKPOINT_NAME: &str = "solaredge-monitoring-checkpoint";

/// A series of timestamped samples.
pub trait Samples {
    fn latest_sample(&self) -> Option<PrimitiveDateTime>;
}

impl Samples for Energy {
    fn latest_sample(&self) -> Option<PrimitiveDateTime> {
        Energy::latest_sample(self)
    }
}

impl Samples for Vec<Telemetry> {
    fn latest_sample(&self) -> Option<PrimitiveDateTime> {
        self.iter().map(|t| t.date).max()
    }
}

/// Latest sample date across every series, or the epoch when there are none. Samples with a
/// null value still count.
pub fn compute_watermark<K, S: Samples>(results: &BTreeMap<K, S>) -> PrimitiveDateTime {
    results
        .values()
        .filter_map(Samples::latest_sample)
        .max()
        .unwrap_or(EPOCH)
}

/// The checkpoint to persist after a successful run, if it moves forward.
pub fn advance(
    prior: Option<PrimitiveDateTime>,
    observed: PrimitiveDateTime,
) -> Option<PrimitiveDateTime> {
    match prior {
        Some(prior) if observed <= prior => None,
        None if observed <= EPOCH => None,
        _ => Some(observed),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CheckpointError {
    #[error("unable to read checkpoint {key}: {source}")]
    Read {
        key: String,
        #[source]
        source: BlobError,
    },
    #[error("unable to write checkpoint {key}: {source}")]
    Write {
        key: String,
        #[source]
        source: BlobError,
    },
    #[error("checkpoint {key} holds an unparsable timestamp {raw:?}")]
    Corrupt { key: String, raw: String },
}

/// Reads and writes the checkpoint object: a single `YYYY-MM-DD hh:mm:ss` timestamp.
#[derive(Clone)]
pub struct CheckpointStore {
    store: Arc<dyn BlobStore>,
    key: String,
}

impl CheckpointStore {
    pub fn new(store: Arc<dyn BlobStore>, prefix: &str) -> Self {
        Self {
            store,
            key: namespaced_key(prefix, CHECKPOINT_NAME),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// `None` when no checkpoint has been written yet.
    pub async fn load(&self) -> Result<Option<PrimitiveDateTime>, CheckpointError> {
        let bytes = match self.store.get_object(&self.key).await {
            Ok(bytes) => bytes,
            Err(BlobError::NotFound(_)) => {
                tracing::info!(key = %self.key, "no checkpoint found, starting from the earliest window");
                return Ok(None);
            }
            Err(source) => {
                return Err(CheckpointError::Read {
                    key: self.key.clone(),
                    source,
                })
            }
        };

        let raw = String::from_utf8_lossy(&bytes);
        let checkpoint = parse_timestamp(raw.trim()).map_err(|_| CheckpointError::Corrupt {
            key: self.key.clone(),
            raw: raw.trim().to_string(),
        })?;
        tracing::debug!(key = %self.key, checkpoint = %format_timestamp(checkpoint), "loaded checkpoint");
        Ok(Some(checkpoint))
    }

    pub async fn save(&self, checkpoint: PrimitiveDateTime) -> Result<(), CheckpointError> {
        let body = Bytes::from(format_timestamp(checkpoint));
        self.store
            .put_object(&self.key, body, "text/plain")
            .await
            .map_err(|source| CheckpointError::Write {
                key: self.key.clone(),
                source,
            })
    }
}
