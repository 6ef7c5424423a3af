//! Command line surface: flag parsing, logging setup and step sequencing.

use std::io::{BufRead, Write};
use std::path::PathBuf;

use chrono::Local;
use clap::Parser;
use intervals_icu_client::http_client::ReqwestIntervalsClient;
use secrecy::SecretString;

use crate::config::{ConfigStore, DEFAULT_CONFIG_FILE, Overrides};
use crate::error::ExportResult;
use crate::pipeline::{self, RunOptions, RunReport};
use crate::setup::SetupWizard;

pub const LOG_LEVEL_ENV: &str = "INTERVALS_EXPORT_LOG_LEVEL";
/// Upper bound for `--days`, roughly a century.
pub const MAX_DAYS: u32 = 36_500;
const QUIET_DEPENDENCIES: &str = "hyper=warn,hyper_util=warn,reqwest=warn";

#[derive(Debug, Parser)]
#[command(
    name = "intervals-export",
    version,
    about = "Export intervals.icu training data to a JSON file",
    long_about = "Fetches activities, wellness and planned workouts from intervals.icu for the \
                  last N days, writes them as one JSON document and optionally commits the file \
                  to a GitHub repository."
)]
pub struct Cli {
    /// Run the interactive setup, save the config and exit
    #[arg(long)]
    pub setup: bool,

    /// Number of days to export, today included
    #[arg(
        long,
        default_value_t = 7,
        value_parser = clap::value_parser!(u32).range(1..=i64::from(MAX_DAYS))
    )]
    pub days: u32,

    /// Write the export document to this file
    #[arg(long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Also write the most recent single workout to this file
    #[arg(long, value_name = "FILE")]
    pub workout_output: Option<PathBuf>,

    /// Verbose logging, including the raw field names returned by the API
    #[arg(long)]
    pub debug: bool,

    /// Strip identifying fields (the default)
    #[arg(long, overrides_with = "no_anonymize")]
    pub anonymize: bool,

    /// Keep athlete id, activity names and GPS in the export
    #[arg(long, overrides_with = "anonymize")]
    pub no_anonymize: bool,

    /// Config file location
    #[arg(long, value_name = "PATH", default_value = DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,

    /// Athlete id for this run only
    #[arg(long)]
    pub athlete_id: Option<String>,

    /// API key for this run only
    #[arg(long)]
    pub api_key: Option<String>,
}

impl Cli {
    pub fn anonymize(&self) -> bool {
        !self.no_anonymize
    }

    pub fn run_options(&self) -> RunOptions {
        RunOptions {
            days: self.days,
            output: self.output.clone(),
            workout_output: self.workout_output.clone(),
            anonymize: self.anonymize(),
            debug: self.debug,
        }
    }

    pub fn overrides(&self) -> Overrides {
        Overrides {
            athlete_id: self.athlete_id.clone(),
            api_key: self
                .api_key
                .clone()
                .map(|k| SecretString::new(k.into())),
        }
    }
}

#[derive(Debug)]
pub enum Outcome {
    SetupSaved(PathBuf),
    Exported(RunReport),
}

/// Run whatever `cli` asks for. `input`/`output` are only used by `--setup`.
pub async fn execute<R: BufRead, W: Write>(
    cli: &Cli,
    input: R,
    output: W,
) -> ExportResult<Outcome> {
    let store = ConfigStore::new(&cli.config);

    if cli.setup {
        let config = SetupWizard::new(input, output).run()?;
        store.save(&config)?;
        return Ok(Outcome::SetupSaved(store.path().to_path_buf()));
    }

    let config = store.load_with(&cli.overrides())?;
    let client = ReqwestIntervalsClient::from_credentials(&config.credentials())?;
    let report = pipeline::run(
        &client,
        config.publish_target.as_ref(),
        &cli.run_options(),
        Local::now(),
    )
    .await?;
    Ok(Outcome::Exported(report))
}

/// Tell the user what happened. The document goes to stdout, everything else to stderr.
pub fn report(outcome: &Outcome) {
    match outcome {
        Outcome::SetupSaved(path) => {
            eprintln!("Configuration saved to {}", path.display());
        }
        Outcome::Exported(report) => {
            if let Some(body) = &report.stdout {
                print!("{body}");
            }
            for path in &report.written {
                eprintln!("Wrote {}", path.display());
            }
            for url in &report.published {
                eprintln!("Published {url}");
            }
            for err in &report.publish_errors {
                eprintln!("warning: {err}");
            }
        }
    }
}

/// Log filter from `INTERVALS_EXPORT_LOG_LEVEL`, then `RUST_LOG`, then `info`.
/// `--debug` forces `debug`.
pub fn log_filter_with<F>(debug: bool, mut get: F) -> String
where
    F: FnMut(&str) -> Option<String>,
{
    let level = if debug {
        "debug".to_string()
    } else {
        get(LOG_LEVEL_ENV)
            .or_else(|| get("RUST_LOG"))
            .unwrap_or_else(|| "info".to_string())
    };
    format!("{level},{QUIET_DEPENDENCIES}")
}

pub fn init_tracing(debug: bool) {
    let filter = log_filter_with(debug, |k| std::env::var(k).ok());
    let env_filter = tracing_subscriber::EnvFilter::try_new(&filter).unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(format!("info,{QUIET_DEPENDENCIES}"))
    });
    tracing_subscriber::fmt()
        .compact()
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .with_target(false)
        .with_env_filter(env_filter)
        .init();
    tracing::debug!("log filter: {filter}");
}
