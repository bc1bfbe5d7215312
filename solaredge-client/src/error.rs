use std::time::Duration;

/// Failure converting an upstream document into domain records.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("malformed {document} document: {source}")]
    Json {
        document: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("missing required field `{field}`")]
    MissingField { field: String },
    #[error("field `{field}` has invalid timestamp {raw:?}: {source}")]
    InvalidTimestamp {
        field: String,
        raw: String,
        #[source]
        source: time::error::Parse,
    },
    #[error("field `{field}` has invalid value {raw:?}")]
    InvalidValue { field: String, raw: String },
}

impl DecodeError {
    /// Name of the offending field, when the failure is attributable to one.
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::Json { .. } => None,
            Self::MissingField { field }
            | Self::InvalidTimestamp { field, .. }
            | Self::InvalidValue { field, .. } => Some(field),
        }
    }
}

/// Failure talking to the monitoring API.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("invalid client configuration: {0}")]
    Configuration(String),
    #[error("credential rejected by {endpoint} (status {status}), check key validity and permissions")]
    Unauthorized { endpoint: String, status: u16 },
    #[error("no document found at {endpoint}")]
    NotFound { endpoint: String },
    #[error("query limit exceeded at {endpoint}")]
    RateLimited {
        endpoint: String,
        retry_after: Option<Duration>,
    },
    #[error("unexpected response code {status} from {endpoint}: {body}")]
    Status {
        endpoint: String,
        status: u16,
        body: String,
    },
    #[error("transport failure calling {endpoint}: {message}")]
    Transport { endpoint: String, message: String },
    #[error("unable to decode response from {endpoint}: {source}")]
    Decode {
        endpoint: String,
        #[source]
        source: DecodeError,
    },
}

impl ApiError {
    /// Throttling, connection failures and server-side errors may succeed on a later attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::RateLimited { .. } | Self::Transport { .. } => true,
            Self::Status { status, .. } => *status >= 500,
            Self::Configuration(_)
            | Self::Unauthorized { .. }
            | Self::NotFound { .. }
            | Self::Decode { .. } => false,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Server-provided hint for how long to wait before retrying.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}
