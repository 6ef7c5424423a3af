//! `IntervalsClient` trait and the raw record types returned by the
//! intervals.icu API.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

pub mod config;
pub mod http_client;
pub mod range;

pub use range::DateRange;

#[derive(Debug, Error)]
pub enum IntervalsError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("authentication rejected: {0}")]
    Auth(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("unexpected status {status}: {body}")]
    Api { status: u16, body: String },
    #[error("could not decode response: {0}")]
    Decode(String),
    #[error("configuration error: {0}")]
    Config(String),
}

impl IntervalsError {
    pub fn from_status(status: u16, body: String) -> Self {
        match status {
            401 | 403 => IntervalsError::Auth(body),
            404 => IntervalsError::NotFound(body),
            _ => IntervalsError::Api { status, body },
        }
    }

    pub fn is_auth(&self) -> bool {
        matches!(self, IntervalsError::Auth(_))
    }
}

/// A raw JSON object as returned by the API.
///
/// Fields are kept verbatim so that nothing the API sends is lost before
/// normalization.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(transparent)]
pub struct ApiRecord(pub Map<String, Value>);

pub type ActivityRecord = ApiRecord;
pub type WellnessRecord = ApiRecord;
pub type EventRecord = ApiRecord;

impl ApiRecord {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key).filter(|v| !v.is_null())
    }

    /// String field; numbers are rendered as strings (activity ids are
    /// sometimes numeric).
    pub fn str_field(&self, key: &str) -> Option<String> {
        match self.get(key)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    pub fn f64_field(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(Value::as_f64)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Map<String, Value>> for ApiRecord {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// Everything fetched for one export run.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TrainingSnapshot {
    pub athlete: ApiRecord,
    pub activities: Vec<ActivityRecord>,
    pub wellness: Vec<WellnessRecord>,
    pub yesterday_wellness: Option<WellnessRecord>,
    pub events: Vec<EventRecord>,
}

/// Days of planned workouts fetched ahead of today.
pub const PLANNED_DAYS_AHEAD: i64 = 21;

#[async_trait]
pub trait IntervalsClient: Send + Sync + 'static {
    /// Athlete object including `sportSettings`.
    async fn get_athlete(&self) -> Result<ApiRecord, IntervalsError>;

    async fn get_activities(
        &self,
        range: &DateRange,
    ) -> Result<Vec<ActivityRecord>, IntervalsError>;

    async fn get_wellness(&self, range: &DateRange)
    -> Result<Vec<WellnessRecord>, IntervalsError>;

    /// Calendar events (planned workouts, notes, races).
    async fn get_events(&self, range: &DateRange) -> Result<Vec<EventRecord>, IntervalsError>;

    /// The most recent activity in the athlete's history, regardless of date.
    async fn get_latest_activity(&self) -> Result<Option<ActivityRecord>, IntervalsError>;

    /// Fetch every category needed for an export of `range`.
    ///
    /// Requests run one after another. Yesterday's wellness is best effort:
    /// anything but an auth failure is logged and skipped.
    async fn fetch_range(
        &self,
        range: &DateRange,
        today: chrono::NaiveDate,
    ) -> Result<TrainingSnapshot, IntervalsError> {
        tracing::info!("fetching athlete data");
        let athlete = self.get_athlete().await?;

        tracing::info!(oldest = %range.oldest(), newest = %range.newest(), "fetching activities");
        let activities = self.get_activities(range).await?;

        tracing::info!("fetching wellness data");
        let wellness = self.get_wellness(range).await?;

        tracing::info!("fetching fitness metrics for yesterday");
        let yesterday = DateRange::single(today - chrono::Duration::days(1));
        let yesterday_wellness = match self.get_wellness(&yesterday).await {
            Ok(days) => days.into_iter().next(),
            Err(e) if e.is_auth() => return Err(e),
            Err(e) => {
                tracing::warn!("could not fetch yesterday's wellness: {e}");
                None
            }
        };

        tracing::info!("fetching planned workouts");
        let events = self
            .get_events(&DateRange::ahead(today, PLANNED_DAYS_AHEAD))
            .await?;

        Ok(TrainingSnapshot {
            athlete,
            activities,
            wellness,
            yesterday_wellness,
            events,
        })
    }
}
