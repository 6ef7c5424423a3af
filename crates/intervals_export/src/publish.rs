//! Commit export files to a GitHub repository through the contents API.

use std::fmt;
use std::path::Path;
use std::time::Duration;

use base64::{Engine as _, engine::general_purpose::STANDARD};
use intervals_icu_client::http_client::REQUEST_TIMEOUT;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::config::PublishTarget;
use crate::error::{ExportError, ExportResult};

pub const GITHUB_API_URL: &str = "https://api.github.com";
const USER_AGENT: &str = concat!("intervals-export/", env!("CARGO_PKG_VERSION"));

/// `owner/name` of a GitHub repository.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RepoSlug {
    pub owner: String,
    pub name: String,
}

impl RepoSlug {
    /// Accepts `owner/name`, `https://github.com/owner/name[.git]` and
    /// `git@github.com:owner/name[.git]`.
    pub fn parse(remote: &str) -> ExportResult<Self> {
        let trimmed = remote.trim().trim_end_matches('/');
        let path = if let Some(rest) = trimmed.strip_prefix("git@") {
            rest.split_once(':').map(|(_, p)| p)
        } else if let Some((_, rest)) = trimmed.split_once("://") {
            rest.split_once('/').map(|(_, p)| p)
        } else {
            Some(trimmed)
        };
        let path = path.map(|p| p.trim_end_matches(".git"));
        match path.and_then(|p| p.split_once('/')) {
            Some((owner, name)) if !owner.is_empty() && !name.is_empty() && !name.contains('/') => {
                Ok(Self {
                    owner: owner.to_string(),
                    name: name.to_string(),
                })
            }
            _ => Err(ExportError::Config(format!(
                "cannot read a GitHub repository from {remote:?}"
            ))),
        }
    }
}

impl fmt::Display for RepoSlug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

#[derive(Debug, Deserialize)]
struct ContentInfo {
    sha: String,
}

#[derive(Debug, Serialize)]
struct PutContent<'a> {
    message: String,
    content: String,
    branch: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    sha: Option<String>,
}

/// Publishes files to one repository and branch.
#[derive(Clone, Debug)]
pub struct GitHubPublisher {
    api_url: String,
    repo: RepoSlug,
    branch: String,
    token: SecretString,
    client: reqwest::Client,
}

impl GitHubPublisher {
    pub fn from_target(target: &PublishTarget) -> ExportResult<Self> {
        Self::with_timeout(target, REQUEST_TIMEOUT)
    }

    /// Like [`GitHubPublisher::from_target`] with a custom per-request timeout.
    pub fn with_timeout(target: &PublishTarget, timeout: Duration) -> ExportResult<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| ExportError::Publish(format!("cannot build http client: {e}")))?;
        Ok(Self {
            api_url: target
                .api_url
                .as_deref()
                .unwrap_or(GITHUB_API_URL)
                .trim_end_matches('/')
                .to_string(),
            repo: RepoSlug::parse(&target.remote_url)?,
            branch: target.branch().to_string(),
            token: target.token.clone(),
            client,
        })
    }

    pub fn repo(&self) -> &RepoSlug {
        &self.repo
    }

    fn contents_url(&self, remote_path: &str) -> String {
        format!(
            "{}/repos/{}/{}/contents/{}",
            self.api_url, self.repo.owner, self.repo.name, remote_path
        )
    }

    fn request(&self, method: reqwest::Method, url: &str) -> reqwest::RequestBuilder {
        self.client
            .request(method, url)
            .header(reqwest::header::ACCEPT, "application/vnd.github+json")
            .header(
                reqwest::header::AUTHORIZATION,
                format!("token {}", self.token.expose_secret()),
            )
    }

    /// Commit the file at `path` under its own file name.
    pub async fn publish_file(&self, path: &Path) -> ExportResult<String> {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| ExportError::Publish(format!("no file name in {}", path.display())))?;
        let content = tokio::fs::read(path)
            .await
            .map_err(|e| ExportError::Publish(format!("cannot read {}: {e}", path.display())))?;
        self.publish_content(name, &content).await
    }

    /// Create or update `remote_path` with `content`. Returns the raw URL.
    pub async fn publish_content(&self, remote_path: &str, content: &[u8]) -> ExportResult<String> {
        let url = self.contents_url(remote_path);
        let sha = self.current_sha(&url).await?;

        let body = PutContent {
            message: format!(
                "Update {remote_path} - {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
            ),
            content: STANDARD.encode(content),
            branch: &self.branch,
            sha,
        };
        let resp = self
            .request(reqwest::Method::PUT, &url)
            .json(&body)
            .send()
            .await
            .map_err(|e| ExportError::Publish(format!("push to {} failed: {e}", self.repo)))?;
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            let snippet: String = text.chars().take(256).collect();
            return Err(ExportError::Publish(format!(
                "{} rejected {remote_path} ({status}): {snippet}",
                self.repo
            )));
        }
        tracing::info!(repo = %self.repo, branch = %self.branch, remote_path, "published");
        Ok(format!(
            "https://raw.githubusercontent.com/{}/{}/{remote_path}",
            self.repo, self.branch
        ))
    }

    /// Blob sha of the existing file, `None` when it does not exist yet.
    async fn current_sha(&self, url: &str) -> ExportResult<Option<String>> {
        let resp = self
            .request(reqwest::Method::GET, url)
            .query(&[("ref", self.branch.as_str())])
            .send()
            .await
            .map_err(|e| ExportError::Publish(format!("cannot reach {}: {e}", self.repo)))?;
        match resp.status().as_u16() {
            200 => {
                let info: ContentInfo = resp.json().await.map_err(|e| {
                    ExportError::Publish(format!("unexpected contents response: {e}"))
                })?;
                Ok(Some(info.sha))
            }
            404 => Ok(None),
            401 | 403 => Err(ExportError::Publish(format!(
                "GitHub rejected the token for {}",
                self.repo
            ))),
            other => Err(ExportError::Publish(format!(
                "unexpected status {other} reading {}",
                self.repo
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_accepts_common_remote_forms() {
        let want = RepoSlug {
            owner: "me".into(),
            name: "training".into(),
        };
        for remote in [
            "me/training",
            "https://github.com/me/training",
            "https://github.com/me/training.git",
            "https://github.com/me/training/",
            "git@github.com:me/training.git",
        ] {
            assert_eq!(RepoSlug::parse(remote).unwrap(), want, "{remote}");
        }
    }

    #[test]
    fn parse_rejects_garbage() {
        for remote in ["", "training", "https://github.com/me", "a/b/c"] {
            assert!(RepoSlug::parse(remote).is_err(), "{remote}");
        }
    }

    #[test]
    fn contents_url_uses_api_root() {
        let target = PublishTarget {
            remote_url: "me/training".into(),
            token: SecretString::new("t".into()),
            branch: None,
            api_url: Some("http://localhost:1234/".into()),
        };
        let publisher = GitHubPublisher::from_target(&target).unwrap();
        assert_eq!(
            publisher.contents_url("latest.json"),
            "http://localhost:1234/repos/me/training/contents/latest.json"
        );
    }

    #[tokio::test]
    async fn hung_push_times_out() {
        use wiremock::matchers::method;
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404).set_delay(Duration::from_secs(5)))
            .mount(&server)
            .await;
        let target = PublishTarget {
            remote_url: "me/training".into(),
            token: SecretString::new("t".into()),
            branch: None,
            api_url: Some(server.uri()),
        };

        let publisher =
            GitHubPublisher::with_timeout(&target, Duration::from_millis(200)).unwrap();
        let started = std::time::Instant::now();
        let err = publisher
            .publish_content("latest.json", b"{}")
            .await
            .unwrap_err();
        assert!(matches!(err, ExportError::Publish(_)));
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
