//! Local configuration file: credentials and the optional publish target.

use std::path::{Path, PathBuf};

use intervals_icu_client::config::Credentials;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::error::{ExportError, ExportResult};

pub const DEFAULT_CONFIG_FILE: &str = ".sync_config.json";
pub const DEFAULT_BRANCH: &str = "main";

#[derive(Clone, Debug)]
pub struct Config {
    pub athlete_id: String,
    pub api_key: SecretString,
    pub base_url: Option<String>,
    pub publish_target: Option<PublishTarget>,
}

/// Repository the export is committed to after a successful local write.
#[derive(Clone, Debug)]
pub struct PublishTarget {
    /// `owner/name` or a GitHub remote URL.
    pub remote_url: String,
    pub token: SecretString,
    pub branch: Option<String>,
    /// GitHub API root; only set when talking to something other than api.github.com.
    pub api_url: Option<String>,
}

impl PublishTarget {
    pub fn branch(&self) -> &str {
        self.branch.as_deref().unwrap_or(DEFAULT_BRANCH)
    }
}

impl Config {
    /// Credentials for the intervals.icu client, with the base URL resolved
    /// against `INTERVALS_ICU_BASE_URL`.
    pub fn credentials(&self) -> Credentials {
        Credentials::new(self.athlete_id.clone(), self.api_key.clone())
            .with_base_url(Credentials::resolve_base_url(self.base_url.as_deref()))
    }

    fn validate(&self) -> ExportResult<()> {
        if self.athlete_id.trim().is_empty() {
            return Err(ExportError::Config("athlete_id is empty".into()));
        }
        if self.api_key.expose_secret().trim().is_empty() {
            return Err(ExportError::Config("api_key is empty".into()));
        }
        if let Some(target) = &self.publish_target {
            if target.remote_url.trim().is_empty() {
                return Err(ExportError::Config("publish_target.remote_url is empty".into()));
            }
        }
        Ok(())
    }
}

/// On-disk shape. Secrets are plain strings only while crossing the file boundary.
#[derive(Debug, Default, Deserialize, Serialize)]
struct StoredConfig {
    athlete_id: String,
    #[serde(alias = "intervals_key")]
    api_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    base_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    publish_target: Option<StoredPublishTarget>,
}

#[derive(Debug, Deserialize, Serialize)]
struct StoredPublishTarget {
    remote_url: String,
    token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    branch: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    api_url: Option<String>,
}

impl From<StoredConfig> for Config {
    fn from(stored: StoredConfig) -> Self {
        Self {
            athlete_id: stored.athlete_id,
            api_key: SecretString::new(stored.api_key.into()),
            base_url: stored.base_url,
            publish_target: stored.publish_target.map(|t| PublishTarget {
                remote_url: t.remote_url,
                token: SecretString::new(t.token.into()),
                branch: t.branch,
                api_url: t.api_url,
            }),
        }
    }
}

impl From<&Config> for StoredConfig {
    fn from(config: &Config) -> Self {
        Self {
            athlete_id: config.athlete_id.clone(),
            api_key: config.api_key.expose_secret().to_string(),
            base_url: config.base_url.clone(),
            publish_target: config
                .publish_target
                .as_ref()
                .map(|t| StoredPublishTarget {
                    remote_url: t.remote_url.clone(),
                    token: t.token.expose_secret().to_string(),
                    branch: t.branch.clone(),
                    api_url: t.api_url.clone(),
                }),
        }
    }
}

/// Per-run values given on the command line. They win over the file.
#[derive(Clone, Debug, Default)]
pub struct Overrides {
    pub athlete_id: Option<String>,
    pub api_key: Option<SecretString>,
}

impl Overrides {
    fn is_complete(&self) -> bool {
        self.athlete_id.is_some() && self.api_key.is_some()
    }
}

/// Reads and writes the config file at a fixed path.
#[derive(Clone, Debug)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn default_path() -> PathBuf {
        PathBuf::from(DEFAULT_CONFIG_FILE)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    pub fn load(&self) -> ExportResult<Config> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ExportError::ConfigMissing(self.path.clone()));
            }
            Err(e) => {
                return Err(ExportError::Config(format!(
                    "cannot read {}: {e}",
                    self.path.display()
                )));
            }
        };
        let stored: StoredConfig = serde_json::from_str(&raw).map_err(|e| {
            ExportError::Config(format!("malformed {}: {e}", self.path.display()))
        })?;
        let config = Config::from(stored);
        config.validate()?;
        tracing::debug!(path = %self.path.display(), "loaded config");
        Ok(config)
    }

    /// Load the file and apply `overrides` on top. A missing file is
    /// tolerated only when the overrides carry both credentials.
    pub fn load_with(&self, overrides: &Overrides) -> ExportResult<Config> {
        let mut config = match self.load() {
            Ok(config) => config,
            Err(ExportError::ConfigMissing(_)) if overrides.is_complete() => {
                tracing::debug!("no config file, using command line credentials");
                Config {
                    athlete_id: String::new(),
                    api_key: SecretString::new("".into()),
                    base_url: None,
                    publish_target: None,
                }
            }
            Err(e) => return Err(e),
        };
        if let Some(id) = &overrides.athlete_id {
            config.athlete_id = id.clone();
        }
        if let Some(key) = &overrides.api_key {
            config.api_key = key.clone();
        }
        config.validate()?;
        Ok(config)
    }

    /// Overwrite the file with `config`.
    pub fn save(&self, config: &Config) -> ExportResult<()> {
        config.validate()?;
        let body = serde_json::to_string_pretty(&StoredConfig::from(config))?;
        std::fs::write(&self.path, body + "\n").map_err(|e| ExportError::io(&self.path, e))?;

        // Holds the API key and token: owner read/write only.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&self.path, std::fs::Permissions::from_mode(0o600))
                .map_err(|e| ExportError::io(&self.path, e))?;
        }
        tracing::info!(path = %self.path.display(), "saved config");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Config {
        Config {
            athlete_id: "i42".into(),
            api_key: SecretString::new("sekrit".into()),
            base_url: None,
            publish_target: Some(PublishTarget {
                remote_url: "me/training".into(),
                token: SecretString::new("ghp_x".into()),
                branch: None,
                api_url: None,
            }),
        }
    }

    #[test]
    fn load_missing_file_is_config_missing() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::new(dir.path().join("nope.json"));
        assert!(matches!(store.load(), Err(ExportError::ConfigMissing(_))));
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::new(dir.path().join("cfg.json"));
        store.save(&sample()).unwrap();
        let loaded = store.load().unwrap();
        assert_eq!(loaded.athlete_id, "i42");
        assert_eq!(loaded.api_key.expose_secret(), "sekrit");
        let target = loaded.publish_target.unwrap();
        assert_eq!(target.remote_url, "me/training");
        assert_eq!(target.branch(), "main");
    }

    #[test]
    fn save_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::new(dir.path().join("cfg.json"));
        store.save(&sample()).unwrap();
        let mut second = sample();
        second.athlete_id = "i7".into();
        second.publish_target = None;
        store.save(&second).unwrap();
        let loaded = store.load().unwrap();
        assert_eq!(loaded.athlete_id, "i7");
        assert!(loaded.publish_target.is_none());
    }

    #[cfg(unix)]
    #[test]
    fn saved_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cfg.json");
        std::fs::write(&path, "{}").unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o644)).unwrap();

        ConfigStore::new(&path).save(&sample()).unwrap();
        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn legacy_intervals_key_is_accepted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cfg.json");
        std::fs::write(&path, r#"{"athlete_id":"i1","intervals_key":"k"}"#).unwrap();
        let loaded = ConfigStore::new(&path).load().unwrap();
        assert_eq!(loaded.api_key.expose_secret(), "k");
    }

    #[test]
    fn malformed_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cfg.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(matches!(
            ConfigStore::new(&path).load(),
            Err(ExportError::Config(_))
        ));
    }

    #[test]
    fn overrides_replace_file_values() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::new(dir.path().join("cfg.json"));
        store.save(&sample()).unwrap();
        let overrides = Overrides {
            athlete_id: Some("i99".into()),
            api_key: None,
        };
        let cfg = store.load_with(&overrides).unwrap();
        assert_eq!(cfg.athlete_id, "i99");
        assert_eq!(cfg.api_key.expose_secret(), "sekrit");
    }

    #[test]
    fn complete_overrides_work_without_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::new(dir.path().join("cfg.json"));
        let partial = Overrides {
            athlete_id: Some("i1".into()),
            api_key: None,
        };
        assert!(matches!(
            store.load_with(&partial),
            Err(ExportError::ConfigMissing(_))
        ));
        let full = Overrides {
            athlete_id: Some("i1".into()),
            api_key: Some(SecretString::new("k".into())),
        };
        let cfg = store.load_with(&full).unwrap();
        assert_eq!(cfg.athlete_id, "i1");
        assert!(cfg.publish_target.is_none());
    }

    #[test]
    fn debug_output_hides_secrets() {
        let rendered = format!("{:?}", sample());
        assert!(!rendered.contains("sekrit"));
        assert!(!rendered.contains("ghp_x"));
    }
}
