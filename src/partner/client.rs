//! Partner HTTP client
//!
//! [`PartnerApi`] is the architectural contract that decouples the adapter
//! core from the concrete HTTP transport. The single production
//! implementation is [`HttpPartnerClient`], which posts JSON envelopes to
//! the partner's single request endpoint with bearer API key auth.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::json;
use tracing::{debug, warn};

use crate::domain::PartnerError;

use super::dto::{
    ConnectorStatusDto, PartnerResponse, ResultEnvelope, RfidVerifyDto, SessionDto, StationDto,
};

/// Outbound capability towards the partner API.
///
/// One method per wire operation the adapter core needs. Implementations
/// must be safe to call concurrently; the batch uploader fans out over a
/// shared instance.
#[async_trait]
pub trait PartnerApi: Send + Sync {
    /// Post a station description (`station-post`).
    async fn post_station(&self, station: &StationDto) -> Result<PartnerResponse, PartnerError>;

    /// Post a single connector status (`connector-post-status`).
    async fn post_connector_status(
        &self,
        status: &ConnectorStatusDto,
    ) -> Result<PartnerResponse, PartnerError>;

    /// Post a completed charging session (`session-post`).
    async fn post_session(&self, session: &SessionDto) -> Result<PartnerResponse, PartnerError>;

    /// Verify an RFID token (`rfid-verify`).
    async fn verify_rfid(&self, rfid: &RfidVerifyDto) -> Result<PartnerResponse, PartnerError>;
}

/// Configuration for the HTTP partner client
#[derive(Debug, Clone)]
pub struct PartnerClientConfig {
    /// Partner request endpoint, e.g. `https://api.example.com/api/v4/request`
    pub endpoint: String,
    /// Bearer API key sent on every request
    pub api_key: String,
    /// Per-request timeout
    pub timeout: Duration,
}

impl Default for PartnerClientConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.plugsurfing.com/api/v4/request".to_string(),
            api_key: String::new(),
            timeout: Duration::from_secs(10),
        }
    }
}

/// `reqwest`-based partner client
pub struct HttpPartnerClient {
    http: reqwest::Client,
    config: PartnerClientConfig,
}

impl HttpPartnerClient {
    pub fn new(config: PartnerClientConfig) -> Result<Self, PartnerError> {
        let http = reqwest::Client::builder()
            .pool_idle_timeout(Duration::from_secs(30))
            .pool_max_idle_per_host(8)
            .tcp_nodelay(true)
            .timeout(config.timeout)
            .build()?;

        Ok(Self { http, config })
    }

    /// Send one request envelope: `{ "<operation>": <payload> }`.
    async fn request<T: Serialize + Sync>(
        &self,
        operation: &'static str,
        payload: &T,
    ) -> Result<PartnerResponse, PartnerError> {
        let body = json!({ operation: payload });

        debug!(operation, endpoint = %self.config.endpoint, "Sending partner request");

        let response = self
            .http
            .post(&self.config.endpoint)
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            warn!(operation, status = status.as_u16(), "Partner returned non-success HTTP status");
            return Err(PartnerError::HttpStatus(status.as_u16()));
        }

        let text = response.text().await?;
        let envelope: ResultEnvelope = serde_json::from_str(&text)?;
        Ok(PartnerResponse::from(envelope))
    }
}

#[async_trait]
impl PartnerApi for HttpPartnerClient {
    async fn post_station(&self, station: &StationDto) -> Result<PartnerResponse, PartnerError> {
        self.request("station-post", &json!({ "station": station }))
            .await
    }

    async fn post_connector_status(
        &self,
        status: &ConnectorStatusDto,
    ) -> Result<PartnerResponse, PartnerError> {
        self.request("connector-post-status", status).await
    }

    async fn post_session(&self, session: &SessionDto) -> Result<PartnerResponse, PartnerError> {
        self.request("session-post", &json!({ "session": session }))
            .await
    }

    async fn verify_rfid(&self, rfid: &RfidVerifyDto) -> Result<PartnerResponse, PartnerError> {
        self.request("rfid-verify", rfid).await
    }
}
