//! # Sensor Polling
//!
//! The plant sensor exposes one JSON endpoint per quantity:
//!
//! ```text
//! GET http://<sensor_ip>/sensor/moisture  ->  {"value": 1.84}
//! GET http://<sensor_ip>/sensor/light     ->  {"value": 0.72}
//! ```
//!
//! ## Error Handling
//!
//! Every request carries a short timeout so a dead sensor never stalls the
//! display loop for long. The module reports these failure modes:
//! - **Transport**: connection refused, DNS, timeout
//! - **Status**: anything other than `200 OK`
//! - **Body**: not JSON, or no numeric `value` field
//!
//! Callers normally want [`SensorClient::reading`], which logs the failure
//! and returns `None` so the loop can switch to synthetic values.

use log::{debug, warn};
use reqwest::StatusCode;
use std::time::Duration;
use thiserror::Error;

/// Per-request timeout
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(2);

/// Errors that can occur while talking to the sensor.
#[derive(Error, Debug)]
pub enum SensorError {
    /// HTTP request failed (network, timeout, or protocol error)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Sensor answered with something other than 200
    #[error("sensor returned status {0}")]
    Status(StatusCode),

    /// Body was not JSON
    #[error("malformed body: {0}")]
    Body(#[from] serde_json::Error),

    /// JSON had no numeric `value`
    #[error("body has no numeric \"value\" field")]
    MissingValue,
}

/// Quantities the sensor reports.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SensorField {
    Moisture,
    Light,
}

impl SensorField {
    pub fn path(self) -> &'static str {
        match self {
            SensorField::Moisture => "/sensor/moisture",
            SensorField::Light => "/sensor/light",
        }
    }
}

/// HTTP client for the plant sensor.
#[derive(Clone, Debug)]
pub struct SensorClient {
    http: reqwest::Client,
    base_url: String,
}

impl SensorClient {
    /// Client for `base_url` (e.g. `http://192.168.4.1`) with the default timeout.
    pub fn new(base_url: impl Into<String>) -> Result<Self, SensorError> {
        Self::with_timeout(base_url, REQUEST_TIMEOUT)
    }

    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Result<Self, SensorError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(Self { http, base_url })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fetch one quantity.
    pub async fn fetch(&self, field: SensorField) -> Result<f64, SensorError> {
        let url = format!("{}{}", self.base_url, field.path());
        debug!("GET {}", url);

        let response = self.http.get(&url).send().await?;
        if response.status() != StatusCode::OK {
            return Err(SensorError::Status(response.status()));
        }
        let body = response.bytes().await?;
        parse_value(&body)
    }

    /// Fetch one quantity, logging and swallowing any failure.
    pub async fn value(&self, field: SensorField) -> Option<f64> {
        match self.fetch(field).await {
            Ok(value) => Some(value),
            Err(error) => {
                warn!("Sensor fetch {:?} failed: {}", field, error);
                None
            }
        }
    }

    /// Fetch `(moisture, light)`, or `None` if either request fails.
    ///
    /// The light request is skipped when moisture already failed.
    pub async fn reading(&self) -> Option<(f64, f64)> {
        let moisture = self.value(SensorField::Moisture).await?;
        let light = self.value(SensorField::Light).await?;
        Some((moisture, light))
    }
}

/// Extract the numeric `value` field from a sensor response body.
pub fn parse_value(body: &[u8]) -> Result<f64, SensorError> {
    let json: serde_json::Value = serde_json::from_slice(body)?;
    json.get("value")
        .and_then(serde_json::Value::as_f64)
        .ok_or(SensorError::MissingValue)
}
