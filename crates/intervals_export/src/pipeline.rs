//! One export run: fetch → transform → write → optionally publish.

use std::path::PathBuf;

use chrono::{DateTime, Local};
use intervals_icu_client::{ApiRecord, DateRange, IntervalsClient};

use crate::config::PublishTarget;
use crate::error::ExportResult;
use crate::export::{render_json, write_json};
use crate::publish::GitHubPublisher;
use crate::transform::{self, NormalizeOptions};

/// Remote file name of the document when `--output` is not given.
pub const DEFAULT_REMOTE_NAME: &str = "latest.json";

#[derive(Clone, Debug)]
pub struct RunOptions {
    pub days: u32,
    pub output: Option<PathBuf>,
    pub workout_output: Option<PathBuf>,
    pub anonymize: bool,
    pub debug: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            days: 7,
            output: None,
            workout_output: None,
            anonymize: true,
            debug: false,
        }
    }
}

/// What a finished run did.
#[derive(Clone, Debug, Default)]
pub struct RunReport {
    pub activities: usize,
    pub written: Vec<PathBuf>,
    pub published: Vec<String>,
    /// Publish failures. They never fail the run.
    pub publish_errors: Vec<String>,
    /// Rendered document when it was neither written nor published.
    pub stdout: Option<String>,
}

pub async fn run(
    client: &dyn IntervalsClient,
    publish_target: Option<&PublishTarget>,
    options: &RunOptions,
    now: DateTime<Local>,
) -> ExportResult<RunReport> {
    let today = now.date_naive();
    let range = DateRange::last_days(options.days, today);

    // Everything is fetched before anything is written.
    let snapshot = client.fetch_range(&range, today).await?;
    let latest_workout = match options.workout_output {
        Some(_) => {
            tracing::info!("fetching the latest workout");
            Some(client.get_latest_activity().await?)
        }
        None => None,
    };

    if options.debug {
        transform::log_raw_fields(&snapshot);
    }

    let normalize_options = NormalizeOptions {
        days: options.days,
        generated_at: now,
    };
    let mut document = transform::normalize(&snapshot, &range, &normalize_options);
    if options.anonymize {
        document = transform::anonymize(document);
    }

    let mut report = RunReport {
        activities: document.recent_activities.len(),
        ..RunReport::default()
    };

    if let Some(path) = &options.output {
        write_json(&document, path).await?;
        report.written.push(path.clone());
    }
    if let (Some(path), Some(latest)) = (&options.workout_output, latest_workout) {
        let latest = latest.unwrap_or_default();
        let latest = if options.anonymize && !latest.is_empty() {
            transform::anonymize_record(latest)
        } else {
            latest
        };
        write_json::<ApiRecord>(&latest, path).await?;
        report.written.push(path.clone());
    }

    match publish_target {
        Some(target) => publish(target, &document, options, &mut report).await,
        None if options.output.is_none() => report.stdout = Some(render_json(&document)?),
        None => {}
    }

    tracing::info!(
        activities = report.activities,
        written = report.written.len(),
        published = report.published.len(),
        "export finished"
    );
    Ok(report)
}

/// Push what this run produced. Failures are collected, not returned.
///
/// A document that was not written locally goes up as [`DEFAULT_REMOTE_NAME`];
/// every written file goes up under its own name.
async fn publish(
    target: &PublishTarget,
    document: &transform::ExportDocument,
    options: &RunOptions,
    report: &mut RunReport,
) {
    let publisher = match GitHubPublisher::from_target(target) {
        Ok(p) => p,
        Err(e) => {
            tracing::warn!("{e}");
            report.publish_errors.push(e.to_string());
            return;
        }
    };

    if options.output.is_none() {
        let result = match render_json(document) {
            Ok(body) => {
                publisher
                    .publish_content(DEFAULT_REMOTE_NAME, body.as_bytes())
                    .await
            }
            Err(e) => Err(e),
        };
        record(report, result);
    }

    for path in report.written.clone() {
        let result = publisher.publish_file(&path).await;
        record(report, result);
    }
}

fn record(report: &mut RunReport, result: ExportResult<String>) {
    match result {
        Ok(url) => report.published.push(url),
        Err(e) => {
            tracing::warn!("{e}");
            report.publish_errors.push(e.to_string());
        }
    }
}
