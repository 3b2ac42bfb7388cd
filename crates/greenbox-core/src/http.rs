//! HTTP implementation of [`TelemetryGateway`].
//!
//! # Example
//!
//! ```no_run
//! use greenbox_core::http::HttpGateway;
//! use greenbox_core::TelemetryGateway;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let gateway = HttpGateway::new("http://localhost:8080")?;
//!
//! let reading = gateway.latest_reading("strawberry").await?;
//! println!("{:.1} °C", reading.temperature);
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use greenbox_types::{AccessValidation, ActuatorStatus, Period, SensorReading};

use crate::error::Error;
use crate::gateway::TelemetryGateway;

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// HTTP client for the Greenbox backend.
#[derive(Debug, Clone)]
pub struct HttpGateway {
    client: Client,
    base_url: String,
}

/// Error type for HTTP gateway operations.
#[derive(Debug, thiserror::Error)]
pub enum HttpGatewayError {
    /// The backend is not reachable.
    #[error("Backend not reachable at {url}: {source}")]
    NotReachable {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Invalid URL.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Backend returned an error response.
    #[error("API error ({status}): {message}")]
    ApiError { status: u16, message: String },
}

impl From<HttpGatewayError> for Error {
    fn from(e: HttpGatewayError) -> Self {
        match &e {
            HttpGatewayError::Request(source) if source.is_decode() => {
                Error::MalformedData(e.to_string())
            }
            HttpGatewayError::InvalidUrl(msg) => Error::InvalidConfig(msg.clone()),
            _ => Error::Transport(e.to_string()),
        }
    }
}

type HttpResult<T> = std::result::Result<T, HttpGatewayError>;

fn normalize_base_url(base_url: &str) -> HttpResult<String> {
    let base_url = base_url.trim_end_matches('/').to_string();
    if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
        return Err(HttpGatewayError::InvalidUrl(format!(
            "URL must start with http:// or https://, got: {}",
            base_url
        )));
    }
    Ok(base_url)
}

impl HttpGateway {
    /// Create a gateway for `base_url` with the default timeout.
    pub fn new(base_url: &str) -> HttpResult<Self> {
        Self::with_timeout(base_url, DEFAULT_TIMEOUT)
    }

    /// Create a gateway with a custom per-request timeout.
    pub fn with_timeout(base_url: &str, timeout: Duration) -> HttpResult<Self> {
        let base_url = normalize_base_url(base_url)?;
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(HttpGatewayError::Request)?;
        Ok(Self { client, base_url })
    }

    /// Create a gateway with a custom reqwest Client.
    pub fn with_client(base_url: &str, client: Client) -> HttpResult<Self> {
        let base_url = normalize_base_url(base_url)?;
        Ok(Self { client, base_url })
    }

    /// Get the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    // ======================================================================
    // Internal HTTP helpers
    // ======================================================================

    async fn get<T: DeserializeOwned>(&self, url: &str) -> HttpResult<T> {
        debug!("GET {}", url);
        let response =
            self.client
                .get(url)
                .send()
                .await
                .map_err(|e| HttpGatewayError::NotReachable {
                    url: url.to_string(),
                    source: e,
                })?;
        Self::handle_response(response).await
    }

    async fn post_json<T: DeserializeOwned, B: Serialize>(
        &self,
        url: &str,
        body: &B,
    ) -> HttpResult<T> {
        debug!("POST {}", url);
        let response = self.client.post(url).json(body).send().await.map_err(|e| {
            HttpGatewayError::NotReachable {
                url: url.to_string(),
                source: e,
            }
        })?;
        Self::handle_response(response).await
    }

    async fn send_no_content(&self, request: reqwest::RequestBuilder, url: &str) -> HttpResult<()> {
        let response = request
            .send()
            .await
            .map_err(|e| HttpGatewayError::NotReachable {
                url: url.to_string(),
                source: e,
            })?;
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(Self::api_error(response).await)
        }
    }

    async fn handle_response<T: DeserializeOwned>(response: reqwest::Response) -> HttpResult<T> {
        if response.status().is_success() {
            response.json().await.map_err(HttpGatewayError::Request)
        } else {
            Err(Self::api_error(response).await)
        }
    }

    async fn api_error(response: reqwest::Response) -> HttpGatewayError {
        let status = response.status();
        let message = response
            .json::<serde_json::Value>()
            .await
            .ok()
            .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(String::from))
            .unwrap_or_else(|| status.to_string());

        HttpGatewayError::ApiError {
            status: status.as_u16(),
            message,
        }
    }
}

#[async_trait]
impl TelemetryGateway for HttpGateway {
    async fn latest_reading(&self, entity_id: &str) -> crate::Result<SensorReading> {
        let url = self.url(&format!("/sensors/{}/latest", entity_id));
        Ok(self.get(&url).await?)
    }

    async fn history(&self, entity_id: &str, period: Period) -> crate::Result<Vec<SensorReading>> {
        let url = self.url(&format!("/sensors/{}/history/{}", entity_id, period.as_str()));
        Ok(self.get(&url).await?)
    }

    async fn actuator_status(&self, entity_id: &str) -> crate::Result<ActuatorStatus> {
        let url = self.url(&format!("/boxes/{}/actuators", entity_id));
        Ok(self.get(&url).await?)
    }

    async fn validate_code(&self, code: &str) -> crate::Result<AccessValidation> {
        let url = self.url("/auth/code");
        let body = serde_json::json!({ "code": code });
        Ok(self.post_json(&url, &body).await?)
    }

    async fn notifications(&self, entity_id: &str) -> crate::Result<Vec<serde_json::Value>> {
        let url = self.url(&format!("/notifications/{}", entity_id));
        Ok(self.get(&url).await?)
    }

    async fn mark_read(&self, notification_id: &str) -> crate::Result<()> {
        let url = self.url(&format!("/notifications/{}/read", notification_id));
        debug!("PATCH {}", url);
        Ok(self.send_no_content(self.client.patch(&url), &url).await?)
    }

    async fn mark_all_read(&self, entity_id: &str) -> crate::Result<()> {
        let url = self.url("/notifications/mark-all-read");
        debug!("PATCH {}", url);
        let body = serde_json::json!({ "plantId": entity_id });
        Ok(self
            .send_no_content(self.client.patch(&url).json(&body), &url)
            .await?)
    }

    async fn delete_notification(&self, notification_id: &str) -> crate::Result<()> {
        let url = self.url(&format!("/notifications/{}", notification_id));
        debug!("DELETE {}", url);
        Ok(self.send_no_content(self.client.delete(&url), &url).await?)
    }
}
