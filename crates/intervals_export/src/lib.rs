//! Export intervals.icu training data to a JSON file, optionally anonymized
//! and committed to a GitHub repository.
//!
//! The run is a single pass: [`config`] → [`pipeline::run`] (fetch through
//! [`intervals_icu_client`], [`transform`], [`export`], [`publish`]).

pub mod cli;
pub mod config;
pub mod error;
pub mod export;
pub mod pipeline;
pub mod publish;
pub mod setup;
pub mod transform;

pub use config::{Config, ConfigStore, PublishTarget};
pub use error::{ExportError, ExportResult};
pub use pipeline::{RunOptions, RunReport};
pub use transform::ExportDocument;
