//! Interactive first-run setup.

use std::io::{BufRead, Write};

use secrecy::SecretString;

use crate::config::{Config, DEFAULT_BRANCH, PublishTarget};
use crate::error::{ExportError, ExportResult};

/// Asks for credentials on `output` and reads answers from `input`.
///
/// Nothing is checked against the live API here; bad credentials surface on
/// the first real fetch.
pub struct SetupWizard<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> SetupWizard<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    pub fn run(mut self) -> ExportResult<Config> {
        writeln!(self.output, "intervals.icu export setup").map_err(prompt_err)?;
        writeln!(
            self.output,
            "Find your athlete id and API key under Settings > Developer on intervals.icu."
        )
        .map_err(prompt_err)?;

        let athlete_id = self.required("Athlete id")?;
        let api_key = self.required("API key")?;

        let publish = self.optional("Publish exports to a GitHub repository? [y/N]")?;
        let publish_target = if is_yes(publish.as_deref()) {
            let remote_url = self.required("Repository (owner/name or remote URL)")?;
            let token = self.required("GitHub token")?;
            let branch = self.optional(&format!("Branch [{DEFAULT_BRANCH}]"))?;
            Some(PublishTarget {
                remote_url,
                token: SecretString::new(token.into()),
                branch: branch.filter(|b| b != DEFAULT_BRANCH),
                api_url: None,
            })
        } else {
            None
        };

        Ok(Config {
            athlete_id,
            api_key: SecretString::new(api_key.into()),
            base_url: None,
            publish_target,
        })
    }

    /// Re-asks until a non-empty answer arrives.
    fn required(&mut self, label: &str) -> ExportResult<String> {
        loop {
            match self.ask(label)? {
                Some(answer) if !answer.is_empty() => return Ok(answer),
                Some(_) => {
                    writeln!(self.output, "{label} cannot be empty.").map_err(prompt_err)?;
                }
                None => {
                    return Err(ExportError::Setup(format!(
                        "input closed before {} was entered",
                        label.to_lowercase()
                    )));
                }
            }
        }
    }

    /// Blank answers and end of input both read as `None`.
    fn optional(&mut self, label: &str) -> ExportResult<Option<String>> {
        Ok(self.ask(label)?.filter(|a| !a.is_empty()))
    }

    /// `None` on end of input.
    fn ask(&mut self, label: &str) -> ExportResult<Option<String>> {
        write!(self.output, "{label}: ").map_err(prompt_err)?;
        self.output.flush().map_err(prompt_err)?;
        let mut line = String::new();
        let read = self
            .input
            .read_line(&mut line)
            .map_err(|e| ExportError::Setup(format!("cannot read answer: {e}")))?;
        if read == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim().to_string()))
    }
}

fn is_yes(answer: Option<&str>) -> bool {
    matches!(
        answer.map(str::to_ascii_lowercase).as_deref(),
        Some("y" | "yes")
    )
}

fn prompt_err(e: std::io::Error) -> ExportError {
    ExportError::Setup(format!("cannot write prompt: {e}"))
}
