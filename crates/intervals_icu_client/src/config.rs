use crate::IntervalsError;
use secrecy::{ExposeSecret, SecretString};

pub const DEFAULT_BASE_URL: &str = "https://intervals.icu";
pub const BASE_URL_ENV: &str = "INTERVALS_ICU_BASE_URL";

/// What the HTTP client needs to talk to one athlete's account.
#[derive(Clone, Debug)]
pub struct Credentials {
    pub athlete_id: String,
    pub api_key: SecretString,
    pub base_url: String,
}

impl Credentials {
    pub fn new(athlete_id: impl Into<String>, api_key: SecretString) -> Self {
        Self {
            athlete_id: athlete_id.into(),
            api_key,
            base_url: DEFAULT_BASE_URL.into(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn validate(&self) -> Result<(), IntervalsError> {
        if self.athlete_id.trim().is_empty() {
            return Err(IntervalsError::Config("athlete id is empty".into()));
        }
        if self.api_key.expose_secret().trim().is_empty() {
            return Err(IntervalsError::Config("api key is empty".into()));
        }
        Ok(())
    }

    /// Pick the API base URL: environment first, then the configured value,
    /// then the public service.
    pub fn resolve_base_url(configured: Option<&str>) -> String {
        Self::resolve_base_url_with(configured, |k| std::env::var(k).ok())
    }

    /// Testable helper that reads the environment through `get`, so tests
    /// never have to mutate the process environment.
    pub fn resolve_base_url_with<F>(configured: Option<&str>, mut get: F) -> String
    where
        F: FnMut(&str) -> Option<String>,
    {
        get(BASE_URL_ENV)
            .filter(|v| !v.trim().is_empty())
            .or_else(|| configured.map(str::to_string))
            .unwrap_or_else(|| DEFAULT_BASE_URL.into())
    }
}
