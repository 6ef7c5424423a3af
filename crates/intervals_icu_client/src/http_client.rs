//! HTTP client implementation for the Intervals.icu API.
//!
//! This module provides a reqwest-based implementation of the [`IntervalsClient`](crate::IntervalsClient) trait.

use crate::config::Credentials;
use crate::{
    ActivityRecord, ApiRecord, DateRange, EventRecord, IntervalsClient, IntervalsError,
    WellnessRecord,
};
use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use std::time::Duration;

const USER_AGENT: &str = concat!("intervals-export/", env!("CARGO_PKG_VERSION"));
/// Per-request timeout shared by every HTTP client in the workspace.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Client for the Intervals.icu API using reqwest.
#[derive(Clone, Debug)]
pub struct ReqwestIntervalsClient {
    base_url: String,
    athlete_id: String,
    api_key: SecretString,
    client: reqwest::Client,
}

impl ReqwestIntervalsClient {
    /// Create a new client instance.
    ///
    /// # Arguments
    /// * `base_url` - The base URL of the Intervals.icu API (e.g., "https://intervals.icu")
    /// * `athlete_id` - The athlete ID for authentication
    /// * `api_key` - The API key for authentication
    pub fn new(
        base_url: &str,
        athlete_id: impl Into<String>,
        api_key: SecretString,
    ) -> Result<Self, IntervalsError> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| IntervalsError::Config(format!("cannot build http client: {e}")))?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            athlete_id: athlete_id.into(),
            api_key,
            client,
        })
    }

    pub fn from_credentials(creds: &Credentials) -> Result<Self, IntervalsError> {
        creds.validate()?;
        Self::new(
            &creds.base_url,
            creds.athlete_id.clone(),
            creds.api_key.clone(),
        )
    }

    /// `{base}/api/v1/athlete/{id}` followed by `suffix` (may be empty).
    fn athlete_url(&self, suffix: &str) -> String {
        if suffix.is_empty() {
            format!("{}/api/v1/athlete/{}", self.base_url, self.athlete_id)
        } else {
            format!(
                "{}/api/v1/athlete/{}/{}",
                self.base_url, self.athlete_id, suffix
            )
        }
    }

    /// Build an authenticated GET request.
    fn get_request(&self, url: &str) -> reqwest::RequestBuilder {
        self.client
            .get(url)
            .header(reqwest::header::ACCEPT, "application/json")
            .basic_auth("API_KEY", Some(self.api_key.expose_secret()))
    }

    /// Execute a request and decode the JSON body.
    async fn execute_json<T: serde::de::DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, IntervalsError> {
        let resp = request.send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(self.error_from_response(resp).await);
        }
        let body = resp.text().await?;
        serde_json::from_str(&body).map_err(|e| IntervalsError::Decode(e.to_string()))
    }

    /// Extract error information from a failed response.
    async fn error_from_response(&self, resp: reqwest::Response) -> IntervalsError {
        let status = resp.status().as_u16();
        let body = resp.text().await.unwrap_or_default();
        let body_snippet: String = body.chars().take(256).collect();
        tracing::debug!(status, "intervals.icu request failed");
        IntervalsError::from_status(status, body_snippet)
    }

    async fn get_in_range(
        &self,
        endpoint: &str,
        range: &DateRange,
    ) -> Result<Vec<ApiRecord>, IntervalsError> {
        let url = self.athlete_url(endpoint);
        let req = self.get_request(&url).query(&range.query_pairs());
        let records: Option<Vec<ApiRecord>> = self.execute_json(req).await?;
        let records = records.unwrap_or_default();
        tracing::debug!(endpoint, count = records.len(), "fetched records");
        Ok(records)
    }
}

#[async_trait]
impl IntervalsClient for ReqwestIntervalsClient {
    async fn get_athlete(&self) -> Result<ApiRecord, IntervalsError> {
        let url = self.athlete_url("");
        self.execute_json(self.get_request(&url)).await
    }

    async fn get_activities(
        &self,
        range: &DateRange,
    ) -> Result<Vec<ActivityRecord>, IntervalsError> {
        self.get_in_range("activities", range).await
    }

    async fn get_wellness(
        &self,
        range: &DateRange,
    ) -> Result<Vec<WellnessRecord>, IntervalsError> {
        self.get_in_range("wellness", range).await
    }

    async fn get_events(&self, range: &DateRange) -> Result<Vec<EventRecord>, IntervalsError> {
        self.get_in_range("events", range).await
    }

    async fn get_latest_activity(&self) -> Result<Option<ActivityRecord>, IntervalsError> {
        let url = self.athlete_url("activities");
        let req = self
            .get_request(&url)
            .query(&[("limit", "1"), ("order", "desc")]);
        let payload: Value = self.execute_json(req).await?;
        // Some API versions answer with a bare object instead of a list.
        let latest = match payload {
            Value::Array(items) => items.into_iter().next(),
            other => Some(other),
        };
        match latest {
            Some(Value::Object(map)) => Ok(Some(ApiRecord(map))),
            Some(Value::Null) | None => Ok(None),
            Some(other) => Err(IntervalsError::Decode(format!(
                "expected activity object, got {other}"
            ))),
        }
    }
}
