use std::{env, fs, path::PathBuf, time::Duration};

use serde::Deserialize;
use solaredge_client::domain::TimeUnit;
use solaredge_client::{client::DEFAULT_BASE_URL, ClientConfig};
use time::{OffsetDateTime, PrimitiveDateTime, UtcOffset};

use crate::context::DEFAULT_CONCURRENCY;
use crate::retry::RetryPolicy;
use crate::scope::SiteSelector;

pub const CONFIG_PATH_VAR: &str = "SOLAREDGE_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "solaredge-config.toml";
pub const API_KEY_VAR: &str = "SOLAREDGE_API_KEY";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("unable to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("unable to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Falls back to `SOLAREDGE_API_KEY` when absent.
    pub api_key: Option<String>,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FetchConfig {
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
    /// Upper bound on one whole run. Unbounded when absent.
    pub run_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    S3,
    Fs,
    Memory,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub kind: StorageKind,
    pub bucket: Option<String>,
    #[serde(default = "default_region")]
    pub region: String,
    pub endpoint: Option<String>,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    #[serde(default)]
    pub force_path_style: bool,
    /// Namespace for every key this service writes.
    #[serde(default)]
    pub prefix: String,
    pub root_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EnergyJobConfig {
    #[serde(default)]
    pub time_unit: TimeUnit,
    /// Explicit sites. Empty means every site visible to the credential.
    #[serde(default)]
    pub site_ids: Vec<String>,
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    /// Offset of the sites' local clock from UTC. Upstream timestamps carry no zone.
    #[serde(default)]
    pub utc_offset_minutes: i32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    pub bind_addr: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
    pub storage: StorageConfig,
    pub energy: EnergyJobConfig,
    pub metrics: Option<MetricsConfig>,
}

impl AppConfig {
    /// Reads the TOML file named by `SOLAREDGE_CONFIG`, or `solaredge-config.toml`.
    pub fn load() -> Result<Self, ConfigError> {
        let path = env::var(CONFIG_PATH_VAR).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        let contents = fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;
        Self::from_toml(&path, &contents)
    }

    pub fn from_toml(path: &str, contents: &str) -> Result<Self, ConfigError> {
        let cfg: AppConfig = toml::from_str(contents).map_err(|source| ConfigError::Parse {
            path: path.to_string(),
            source,
        })?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.energy.poll_interval_secs == 0 {
            return Err(ConfigError::Invalid("energy.poll_interval_secs must be positive".into()));
        }
        if self.fetch.run_timeout_secs == Some(0) {
            return Err(ConfigError::Invalid("fetch.run_timeout_secs must be positive".into()));
        }
        match self.storage.kind {
            StorageKind::S3 if self.storage.bucket.as_deref().unwrap_or("").is_empty() => Err(
                ConfigError::Invalid("storage.bucket is required for s3 storage".into()),
            ),
            StorageKind::Fs if self.storage.root_dir.is_none() => Err(ConfigError::Invalid(
                "storage.root_dir is required for fs storage".into(),
            )),
            _ => Ok(()),
        }?;
        self.energy.utc_offset()?;
        Ok(())
    }
}

impl ApiConfig {
    /// Resolves the API key from the file or the environment.
    pub fn client_config(&self) -> Result<ClientConfig, ConfigError> {
        self.client_config_with(env::var(API_KEY_VAR).ok())
    }

    fn client_config_with(&self, env_key: Option<String>) -> Result<ClientConfig, ConfigError> {
        let api_key = self
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .or_else(|| env_key.filter(|k| !k.trim().is_empty()))
            .ok_or_else(|| {
                ConfigError::Invalid(format!("api.api_key is not set and {API_KEY_VAR} is empty"))
            })?;

        let mut cfg = ClientConfig::new(api_key);
        cfg.base_url = self.base_url.clone();
        cfg.request_timeout = Duration::from_secs(self.request_timeout_secs);
        Ok(cfg)
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: None,
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl FetchConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            base_delay: Duration::from_millis(self.retry_backoff_ms),
            max_delay: Duration::from_millis(self.max_backoff_ms),
        }
    }

    pub fn run_timeout(&self) -> Option<Duration> {
        self.run_timeout_secs.map(Duration::from_secs)
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            max_attempts: default_max_attempts(),
            retry_backoff_ms: default_retry_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            run_timeout_secs: None,
        }
    }
}

impl EnergyJobConfig {
    pub fn site_selector(&self) -> SiteSelector {
        if self.site_ids.is_empty() {
            SiteSelector::Discover
        } else {
            SiteSelector::Explicit(self.site_ids.clone())
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn utc_offset(&self) -> Result<UtcOffset, ConfigError> {
        UtcOffset::from_whole_seconds(self.utc_offset_minutes * 60).map_err(|_| {
            ConfigError::Invalid(format!(
                "energy.utc_offset_minutes {} is out of range",
                self.utc_offset_minutes
            ))
        })
    }

    /// Current wall-clock time at the sites.
    pub fn site_now(&self) -> Result<PrimitiveDateTime, ConfigError> {
        let now = OffsetDateTime::now_utc().to_offset(self.utc_offset()?);
        Ok(PrimitiveDateTime::new(now.date(), now.time()))
    }
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_concurrency() -> usize {
    DEFAULT_CONCURRENCY
}

fn default_max_attempts() -> u32 {
    5
}

fn default_retry_backoff_ms() -> u64 {
    500
}

fn default_max_backoff_ms() -> u64 {
    30_000
}

fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_poll_interval_secs() -> u64 {
    3600
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL: &str = r#"
[api]
api_key = "KEY"
request_timeout_secs = 10

[fetch]
concurrency = 4
max_attempts = 3
retry_backoff_ms = 250
run_timeout_secs = 600

[storage]
kind = "s3"
bucket = "solar-artifacts"
region = "eu-west-1"
prefix = "prod"

[energy]
time_unit = "QUARTER_OF_AN_HOUR"
site_ids = ["1234", "5678"]
poll_interval_secs = 900
utc_offset_minutes = -300

[metrics]
bind_addr = "0.0.0.0:9100"
"#;

    #[test]
    fn parses_a_full_config() {
        let cfg = AppConfig::from_toml("test.toml", FULL).unwrap();

        assert_eq!(cfg.api.base_url, DEFAULT_BASE_URL);
        assert_eq!(cfg.fetch.concurrency, 4);
        assert_eq!(cfg.fetch.max_backoff_ms, 30_000);
        assert_eq!(cfg.fetch.run_timeout(), Some(Duration::from_secs(600)));
        assert_eq!(cfg.storage.kind, StorageKind::S3);
        assert_eq!(cfg.storage.prefix, "prod");
        assert_eq!(cfg.energy.time_unit, TimeUnit::QuarterHour);
        assert_eq!(
            cfg.energy.site_selector(),
            SiteSelector::Explicit(vec!["1234".into(), "5678".into()])
        );
        assert_eq!(cfg.energy.utc_offset().unwrap().whole_hours(), -5);
        assert_eq!(cfg.metrics.unwrap().bind_addr, "0.0.0.0:9100");

        let client = cfg.api.client_config().unwrap();
        assert_eq!(client.api_key, "KEY");
        assert_eq!(client.request_timeout, Duration::from_secs(10));
    }

    #[test]
    fn minimal_config_discovers_sites_hourly() {
        let cfg = AppConfig::from_toml(
            "test.toml",
            r#"
[storage]
kind = "memory"

[energy]
"#,
        )
        .unwrap();

        assert_eq!(cfg.energy.time_unit, TimeUnit::Hour);
        assert_eq!(cfg.energy.site_selector(), SiteSelector::Discover);
        assert_eq!(cfg.energy.poll_interval(), Duration::from_secs(3600));
        assert_eq!(cfg.fetch.retry_policy(), RetryPolicy::default());
        assert!(cfg.fetch.run_timeout().is_none());
    }

    #[test]
    fn s3_storage_needs_a_bucket() {
        let err = AppConfig::from_toml(
            "test.toml",
            r#"
[storage]
kind = "s3"

[energy]
"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(msg) if msg.contains("bucket")));
    }

    fn invalid(toml: &str) -> String {
        match AppConfig::from_toml("test.toml", toml) {
            Err(ConfigError::Invalid(msg)) => msg,
            other => panic!("expected an invalid config, got {other:?}"),
        }
    }

    #[test]
    fn poll_interval_must_be_positive() {
        let msg = invalid(
            r#"
[storage]
kind = "memory"

[energy]
poll_interval_secs = 0
"#,
        );
        assert!(msg.contains("poll_interval_secs"), "{msg}");
    }

    #[test]
    fn run_timeout_must_be_positive() {
        let msg = invalid(
            r#"
[fetch]
run_timeout_secs = 0

[storage]
kind = "memory"

[energy]
"#,
        );
        assert!(msg.contains("run_timeout_secs"), "{msg}");
    }

    #[test]
    fn utc_offset_must_be_in_range() {
        let msg = invalid(
            r#"
[storage]
kind = "memory"

[energy]
utc_offset_minutes = 100000
"#,
        );
        assert!(msg.contains("utc_offset_minutes"), "{msg}");
    }

    #[test]
    fn fs_storage_needs_a_root_dir() {
        let msg = invalid(
            r#"
[storage]
kind = "fs"

[energy]
"#,
        );
        assert!(msg.contains("root_dir"), "{msg}");
    }

    #[test]
    fn api_key_falls_back_to_the_environment() {
        let api = ApiConfig::default();
        let err = api.client_config_with(None).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(ref msg) if msg.contains(API_KEY_VAR)));

        let err = api.client_config_with(Some("  ".into())).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));

        let cfg = api.client_config_with(Some("FROM_ENV".into())).unwrap();
        assert_eq!(cfg.api_key, "FROM_ENV");

        let blank_in_file = ApiConfig {
            api_key: Some(" ".into()),
            ..ApiConfig::default()
        };
        let cfg = blank_in_file.client_config_with(Some("FROM_ENV".into())).unwrap();
        assert_eq!(cfg.api_key, "FROM_ENV");
    }

    #[test]
    fn unknown_time_unit_is_a_parse_error() {
        let err = AppConfig::from_toml(
            "test.toml",
            r#"
[storage]
kind = "memory"

[energy]
time_unit = "WEEK"
"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }
}
