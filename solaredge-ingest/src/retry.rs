//! Bounded retries with capped exponential backoff around any [`MonitoringApi`].

use std::{future::Future, time::Duration};

use async_trait::async_trait;
use rand_core::{OsRng, RngCore};
use solaredge_client::domain::{Energy, Inventory, Site, Telemetry, TimeWindow};
use solaredge_client::{ApiError, MonitoringApi};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first. Zero behaves like one.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Un-jittered delay after failed attempt number `attempt` (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(16);
        self.base_delay
            .saturating_mul(1u32 << exp)
            .min(self.max_delay)
    }

    /// Equal jitter over [`RetryPolicy::backoff`], raised to the server's hint when it asks
    /// for longer. The hint is capped at `max_delay` as well.
    fn delay(&self, attempt: u32, hint: Option<Duration>) -> Duration {
        let ceiling = self.backoff(attempt);
        let floor = ceiling / 2;
        let span = (ceiling - floor).as_millis() as u64;
        let jitter = if span == 0 {
            0
        } else {
            OsRng.next_u64() % (span + 1)
        };
        let delay = floor + Duration::from_millis(jitter);

        match hint {
            Some(hint) => delay.max(hint.min(self.max_delay)),
            None => delay,
        }
    }

    /// Runs `call` until it succeeds, fails with a non-retryable error, or the attempt budget
    /// is spent. The last error is returned unchanged.
    pub async fn run<T, F, Fut>(&self, operation: &str, mut call: F) -> Result<T, ApiError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ApiError>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            metrics::counter!("solaredge_api_requests_total").increment(1);
            match call().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && attempt < max_attempts => {
                    let sleep_for = self.delay(attempt, e.retry_after());
                    tracing::warn!(
                        error = %e,
                        operation,
                        attempt,
                        delay_ms = sleep_for.as_millis() as u64,
                        "monitoring api call failed, retrying with backoff"
                    );
                    metrics::counter!("solaredge_api_retries_total").increment(1);
                    tokio::time::sleep(sleep_for).await;
                }
                Err(e) => {
                    if e.is_retryable() {
                        tracing::error!(error = %e, operation, attempt, "monitoring api call failed, giving up");
                    }
                    return Err(e);
                }
            }
        }
    }
}

/// Applies a [`RetryPolicy`] to every call of the wrapped API.
pub struct RetryingApi<A> {
    inner: A,
    policy: RetryPolicy,
}

impl<A> RetryingApi<A> {
    pub fn new(inner: A, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }
}

#[async_trait]
impl<A: MonitoringApi> MonitoringApi for RetryingApi<A> {
    async fn site_list(&self) -> Result<Vec<Site>, ApiError> {
        self.policy.run("site_list", || self.inner.site_list()).await
    }

    async fn site_inventory(&self, site_id: &str) -> Result<Inventory, ApiError> {
        self.policy
            .run("site_inventory", || self.inner.site_inventory(site_id))
            .await
    }

    async fn energy(&self, site_id: &str, window: &TimeWindow) -> Result<Energy, ApiError> {
        self.policy
            .run("energy", || self.inner.energy(site_id, window))
            .await
    }

    async fn equipment_telemetry(
        &self,
        site_id: &str,
        serial: &str,
        window: &TimeWindow,
    ) -> Result<Vec<Telemetry>, ApiError> {
        self.policy
            .run("equipment_telemetry", || {
                self.inner.equipment_telemetry(site_id, serial, window)
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;
    use crate::testing::{error_for, site};

    /// Fails the site list `failures` times with `status`, then succeeds.
    struct Flaky {
        failures: u32,
        status: u16,
        calls: AtomicU32,
    }

    impl Flaky {
        fn new(failures: u32, status: u16) -> Self {
            Self {
                failures,
                status,
                calls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl MonitoringApi for Flaky {
        async fn site_list(&self) -> Result<Vec<Site>, ApiError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.failures {
                Err(error_for("/sites/list", self.status))
            } else {
                Ok(vec![site("1")])
            }
        }

        async fn site_inventory(&self, _: &str) -> Result<Inventory, ApiError> {
            unimplemented!()
        }

        async fn energy(&self, _: &str, _: &TimeWindow) -> Result<Energy, ApiError> {
            unimplemented!()
        }

        async fn equipment_telemetry(
            &self,
            _: &str,
            _: &str,
            _: &TimeWindow,
        ) -> Result<Vec<Telemetry>, ApiError> {
            unimplemented!()
        }
    }

    fn policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(1),
        }
    }

    #[test]
    fn backoff_doubles_up_to_the_cap() {
        let p = policy(10);
        let delays: Vec<u64> = (1..=6).map(|a| p.backoff(a).as_millis() as u64).collect();
        assert_eq!(delays, vec![100, 200, 400, 800, 1000, 1000]);
        assert_eq!(p.backoff(u32::MAX), Duration::from_secs(1));
    }

    #[test]
    fn jittered_delay_stays_within_half_and_full_backoff() {
        let p = policy(10);
        for attempt in 1..=5 {
            let d = p.delay(attempt, None);
            assert!(d >= p.backoff(attempt) / 2, "{d:?}");
            assert!(d <= p.backoff(attempt), "{d:?}");
        }
    }

    #[test]
    fn server_hint_raises_the_delay() {
        let p = policy(10);
        assert!(p.delay(1, Some(Duration::from_millis(700))) >= Duration::from_millis(700));
        assert_eq!(p.delay(1, Some(Duration::from_secs(60))), Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn throttled_calls_are_retried() {
        let api = RetryingApi::new(Flaky::new(2, 429), policy(5));
        let sites = api.site_list().await.unwrap();
        assert_eq!(sites.len(), 1);
        assert_eq!(api.inner.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn server_errors_are_retried_until_the_budget_is_spent() {
        let api = RetryingApi::new(Flaky::new(10, 503), policy(3));
        let err = api.site_list().await.unwrap_err();
        assert!(matches!(err, ApiError::Status { status: 503, .. }));
        assert_eq!(api.inner.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn rejected_credentials_are_not_retried() {
        let api = RetryingApi::new(Flaky::new(10, 403), policy(5));
        let err = api.site_list().await.unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized { .. }));
        assert_eq!(api.inner.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_attempts_still_calls_once() {
        let api = RetryingApi::new(Flaky::new(10, 500), policy(0));
        assert!(api.site_list().await.is_err());
        assert_eq!(api.inner.calls.load(Ordering::SeqCst), 1);
    }
}
