//! Error taxonomy for an export run.

use std::path::PathBuf;

use intervals_icu_client::IntervalsError;
use thiserror::Error;

/// Every error names the pipeline step it came from.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("config: no configuration found at {}; run with --setup first", .0.display())]
    ConfigMissing(PathBuf),

    #[error("config: {0}")]
    Config(String),

    #[error("setup: {0}")]
    Setup(String),

    #[error("fetch: intervals.icu rejected the credentials: {0}")]
    Auth(String),

    #[error("fetch: network failure talking to intervals.icu: {0}")]
    Network(String),

    #[error("fetch: {0}")]
    Api(String),

    #[error("export: cannot write {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("export: serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("publish: {0}")]
    Publish(String),
}

impl From<IntervalsError> for ExportError {
    fn from(err: IntervalsError) -> Self {
        match err {
            IntervalsError::Auth(body) => ExportError::Auth(body),
            IntervalsError::Network(e) => ExportError::Network(e.to_string()),
            IntervalsError::Config(msg) => ExportError::Config(msg),
            other => ExportError::Api(other.to_string()),
        }
    }
}

impl ExportError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ExportError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result type alias for export operations.
pub type ExportResult<T> = Result<T, ExportError>;
