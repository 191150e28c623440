//! Home Assistant REST API client.

use std::time::Duration;

use async_trait::async_trait;
use planner_core::{HomeAssistantConfig, NetworkError, ReqwestErrorExt};
use serde_json::Value;
use tracing::instrument;

use crate::error::RetrievalError;
use crate::types::{CalendarInfo, RawEventRecord, RawStateRecord};

/// Remote calendar retrieval, as provided by the host.
#[async_trait]
pub trait CalendarApi: Send + Sync {
    /// Events of one calendar between two opaque date markers.
    async fn get_events(
        &self,
        source_id: &str,
        start: &str,
        end: &str,
    ) -> Result<Vec<RawEventRecord>, RetrievalError>;
}

pub struct HomeAssistantClient {
    client: reqwest::Client,
    access_token: Option<String>,
    base_url: String,
}

impl HomeAssistantClient {
    /// # Errors
    /// Fails if the HTTP client cannot be built.
    pub fn new(
        base_url: &str,
        access_token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, NetworkError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(ReqwestErrorExt::into_network_error)?;

        Ok(Self {
            client,
            access_token,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// # Errors
    /// Fails if the HTTP client cannot be built.
    pub fn from_config(config: &HomeAssistantConfig) -> Result<Self, NetworkError> {
        Self::new(
            &config.base_url,
            config.access_token(),
            Duration::from_secs(config.timeout_secs),
        )
    }

    fn get(&self, url: &str) -> reqwest::RequestBuilder {
        let request = self.client.get(url);
        match &self.access_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// Events of one calendar entity within `[start, end)`.
    #[instrument(skip(self), level = "debug")]
    pub async fn list_events(
        &self,
        source_id: &str,
        start: &str,
        end: &str,
    ) -> Result<Vec<RawEventRecord>, RetrievalError> {
        let url = format!(
            "{}/api/calendars/{}",
            self.base_url,
            urlencoding::encode(source_id),
        );

        let response = self
            .get(&url)
            .query(&[("start", start), ("end", end)])
            .send()
            .await
            .map_err(|e| RetrievalError::network(source_id, e.into_network_error()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(RetrievalError::from_status(source_id, status.as_u16(), text));
        }

        let body: Value = response.json().await.map_err(|e| {
            RetrievalError::malformed(source_id, Some(status.as_u16()), e.to_string())
        })?;

        match body {
            Value::Array(items) => Ok(items
                .into_iter()
                .filter_map(RawEventRecord::from_value)
                .collect()),
            _ => Err(RetrievalError::malformed(
                source_id,
                Some(status.as_u16()),
                "expected a list of events",
            )),
        }
    }

    /// All entity states, for hosts that read calendars from resident state.
    #[instrument(skip(self), level = "info")]
    pub async fn fetch_states(&self) -> Result<Vec<RawStateRecord>, NetworkError> {
        let url = format!("{}/api/states", self.base_url);
        self.get_json(&url).await
    }

    /// Calendar entities known to the server.
    #[instrument(skip(self), level = "info")]
    pub async fn list_calendars(&self) -> Result<Vec<CalendarInfo>, NetworkError> {
        let url = format!("{}/api/calendars", self.base_url);
        self.get_json(&url).await
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T, NetworkError> {
        let response = self
            .get(url)
            .send()
            .await
            .map_err(ReqwestErrorExt::into_network_error)?;

        let status = response.status();
        if status.is_success() {
            response
                .json()
                .await
                .map_err(|e| NetworkError::InvalidResponse(format!("JSON parse error: {}", e)))
        } else {
            let text = response.text().await.unwrap_or_default();
            Err(NetworkError::ServerError {
                status: status.as_u16(),
                message: text,
            })
        }
    }
}

#[async_trait]
impl CalendarApi for HomeAssistantClient {
    async fn get_events(
        &self,
        source_id: &str,
        start: &str,
        end: &str,
    ) -> Result<Vec<RawEventRecord>, RetrievalError> {
        self.list_events(source_id, start, end).await
    }
}
