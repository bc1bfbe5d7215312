pub mod api;
pub mod client;
pub mod domain;
pub mod error;
pub mod timefmt;

pub use client::{ClientConfig, HttpMonitoringClient, MonitoringApi};
pub use error::{ApiError, DecodeError};
