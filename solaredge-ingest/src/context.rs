use std::{future::Future, sync::Arc, time::Duration};

use solaredge_client::{ApiError, MonitoringApi};
use tokio_util::sync::CancellationToken;

use crate::fetch::FetchError;

pub const DEFAULT_CONCURRENCY: usize = 3;
pub const MAX_CONCURRENCY: usize = 8;

/// Everything a fetch run needs besides its scope: the API handle, how many upstream calls may
/// be in flight at once, and the token that aborts the run.
#[derive(Clone)]
pub struct FetchContext {
    api: Arc<dyn MonitoringApi>,
    concurrency: usize,
    cancel: CancellationToken,
}

impl FetchContext {
    pub fn new(api: Arc<dyn MonitoringApi>) -> Self {
        Self {
            api,
            concurrency: DEFAULT_CONCURRENCY,
            cancel: CancellationToken::new(),
        }
    }

    /// Clamped to `1..=MAX_CONCURRENCY`.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.clamp(1, MAX_CONCURRENCY);
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn api(&self) -> &dyn MonitoringApi {
        self.api.as_ref()
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Drives one upstream call, or yields `None` once the run is cancelled.
    pub(crate) async fn call<T, F>(&self, call: F) -> Option<Result<T, ApiError>>
    where
        F: Future<Output = Result<T, ApiError>>,
    {
        if self.cancel.is_cancelled() {
            return None;
        }
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => None,
            res = call => Some(res),
        }
    }

    /// Bounds a whole run. On expiry the in-flight calls are dropped and the run token is
    /// cancelled.
    pub async fn with_deadline<T, F>(&self, deadline: Option<Duration>, run: F) -> Result<T, FetchError>
    where
        F: Future<Output = Result<T, FetchError>>,
    {
        let Some(limit) = deadline else {
            return run.await;
        };
        match tokio::time::timeout(limit, run).await {
            Ok(res) => res,
            Err(_) => {
                tracing::warn!(timeout_secs = limit.as_secs(), "fetch run exceeded its deadline");
                self.cancel.cancel();
                Err(FetchError::DeadlineExceeded(limit))
            }
        }
    }
}

impl std::fmt::Debug for FetchContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchContext")
            .field("concurrency", &self.concurrency)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish_non_exhaustive()
    }
}
