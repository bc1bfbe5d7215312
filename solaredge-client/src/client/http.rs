use std::{fmt, time::Duration};

use async_trait::async_trait;
use reqwest::{
    header::{HeaderMap, RETRY_AFTER},
    StatusCode, Url,
};

use super::{
    energy_endpoint, equipment_data_endpoint, site_inventory_endpoint, MonitoringApi,
    SITE_LIST_ENDPOINT,
};
use crate::api;
use crate::domain::{Energy, Inventory, Site, Telemetry, TimeWindow};
use crate::error::{ApiError, DecodeError};
use crate::timefmt::format_timestamp;

pub const DEFAULT_BASE_URL: &str = "https://monitoringapi.solaredge.com";

const API_KEY_PARAM: &str = "api_key";
const TIME_UNIT_PARAM: &str = "timeUnit";
const START_TIME_PARAM: &str = "startTime";
const END_TIME_PARAM: &str = "endTime";

// Upper bound on how much of an error body ends up in an error message.
const MAX_ERROR_BODY: usize = 512;

#[derive(Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub api_key: String,
    pub request_timeout: Duration,
}

impl ClientConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: api_key.into(),
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

/// `MonitoringApi` over HTTPS. The API key rides along as a query parameter on every request.
#[derive(Clone)]
pub struct HttpMonitoringClient {
    http: reqwest::Client,
    base_url: Url,
    api_key: String,
}

impl fmt::Debug for HttpMonitoringClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpMonitoringClient")
            .field("base_url", &self.base_url.as_str())
            .finish_non_exhaustive()
    }
}

impl HttpMonitoringClient {
    pub fn new(config: ClientConfig) -> Result<Self, ApiError> {
        if config.api_key.trim().is_empty() {
            return Err(ApiError::Configuration("api key must not be empty".to_string()));
        }

        let base_url = Url::parse(&config.base_url).map_err(|e| {
            ApiError::Configuration(format!("invalid base url {:?}: {e}", config.base_url))
        })?;

        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| ApiError::Configuration(format!("unable to build http client: {e}")))?;

        tracing::debug!(base_url = %base_url, "setting up monitoring client");

        Ok(Self {
            http,
            base_url,
            api_key: config.api_key,
        })
    }

    fn request_url(&self, segments: &[&str], params: &[(&str, String)]) -> Result<Url, ApiError> {
        if let Some(bad) = segments.iter().find(|s| matches!(s.trim(), "" | "." | "..")) {
            return Err(ApiError::Configuration(format!(
                "invalid path segment {bad:?} in {}",
                endpoint_label(segments)
            )));
        }

        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ApiError::Configuration(format!("base url {} cannot take a path", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        {
            let mut query = url.query_pairs_mut();
            for (key, value) in params {
                query.append_pair(key, value);
            }
            query.append_pair(API_KEY_PARAM, &self.api_key);
        }
        Ok(url)
    }

    async fn fetch<T>(
        &self,
        segments: &[&str],
        params: &[(&str, String)],
        decode: fn(&[u8]) -> Result<T, DecodeError>,
    ) -> Result<T, ApiError> {
        let endpoint = endpoint_label(segments);
        let endpoint = endpoint.as_str();
        let url = self.request_url(segments, params)?;
        tracing::debug!(endpoint, ?params, "requesting monitoring api");

        // reqwest errors embed the url, which carries the key.
        let transport = |e: reqwest::Error| ApiError::Transport {
            endpoint: endpoint.to_string(),
            message: e.without_url().to_string(),
        };

        let response = self.http.get(url).send().await.map_err(transport)?;
        let status = response.status();
        let retry_after = retry_after(response.headers());
        let body = response.bytes().await.map_err(transport)?;

        check_status(endpoint, status, retry_after, &body)?;
        tracing::trace!(endpoint, bytes = body.len(), "response body received");

        decode(&body).map_err(|source| ApiError::Decode {
            endpoint: endpoint.to_string(),
            source,
        })
    }
}

fn endpoint_label(segments: &[&str]) -> String {
    format!("/{}", segments.join("/"))
}

fn window_params(window: &TimeWindow) -> [(&'static str, String); 3] {
    [
        (TIME_UNIT_PARAM, window.time_unit.as_str().to_string()),
        (START_TIME_PARAM, format_timestamp(window.start)),
        (END_TIME_PARAM, format_timestamp(window.end)),
    ]
}

fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

/// Maps a non-success status onto the error taxonomy.
pub(crate) fn check_status(
    endpoint: &str,
    status: StatusCode,
    retry_after: Option<Duration>,
    body: &[u8],
) -> Result<(), ApiError> {
    let endpoint = endpoint.to_string();
    match status {
        s if s.is_success() => Ok(()),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(ApiError::Unauthorized {
            endpoint,
            status: status.as_u16(),
        }),
        StatusCode::NOT_FOUND => Err(ApiError::NotFound { endpoint }),
        StatusCode::TOO_MANY_REQUESTS => Err(ApiError::RateLimited {
            endpoint,
            retry_after,
        }),
        s => Err(ApiError::Status {
            endpoint,
            status: s.as_u16(),
            body: String::from_utf8_lossy(body).chars().take(MAX_ERROR_BODY).collect(),
        }),
    }
}

#[async_trait]
impl MonitoringApi for HttpMonitoringClient {
    async fn site_list(&self) -> Result<Vec<Site>, ApiError> {
        self.fetch(&SITE_LIST_ENDPOINT, &[], api::decode_site_list).await
    }

    async fn site_inventory(&self, site_id: &str) -> Result<Inventory, ApiError> {
        self.fetch(&site_inventory_endpoint(site_id), &[], api::decode_inventory)
            .await
    }

    async fn energy(&self, site_id: &str, window: &TimeWindow) -> Result<Energy, ApiError> {
        self.fetch(
            &energy_endpoint(site_id),
            &window_params(window),
            api::decode_energy,
        )
        .await
    }

    async fn equipment_telemetry(
        &self,
        site_id: &str,
        serial: &str,
        window: &TimeWindow,
    ) -> Result<Vec<Telemetry>, ApiError> {
        self.fetch(
            &equipment_data_endpoint(site_id, serial),
            &window_params(window),
            api::decode_equipment_data,
        )
        .await
    }
}
