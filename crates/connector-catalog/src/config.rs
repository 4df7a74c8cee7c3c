use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, IdentityError};
use crate::identity::ConnectorIdentity;

pub const DEFAULT_CACHE_DIR: &str = "connectors";
pub const DEFAULT_ARTIFACT_PATH: &str = "dist/connector.yaml";
pub const DEFAULT_GITHUB_HOST: &str = "github.com";
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(120);

pub const GITHUB_TOKEN_ENV: &str = "GITHUB_TOKEN";

/// Runner level configuration: where connectors are cached, how they are
/// fetched, and which ones are installed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunnerConfig {
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,
    /// Location of the build output, relative to the clone root
    #[serde(default = "default_artifact_path")]
    pub artifact_path: PathBuf,
    #[serde(default = "default_github_host")]
    pub github_host: String,
    #[serde(default = "default_fetch_timeout", with = "humantime_serde")]
    pub fetch_timeout: Duration,
    #[serde(default)]
    pub context: RunnerContext,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub connectors: Vec<InstalledConnector>,
}

/// Runner wide secrets. The GitHub token is only used to build
/// authenticated fetch URLs.
///
/// `Debug` shows which secrets are present, never their values.
#[derive(Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RunnerContext {
    #[serde(
        rename = "GitHubToken",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub github_token: Option<String>,
    #[serde(flatten)]
    pub secrets: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct InstalledConnector {
    pub repo_owner: String,
    pub repo_name: String,
    pub repo_branch: String,
    #[serde(default)]
    pub configuration_parameters: BTreeMap<String, String>,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            cache_dir: default_cache_dir(),
            artifact_path: default_artifact_path(),
            github_host: default_github_host(),
            fetch_timeout: default_fetch_timeout(),
            context: Default::default(),
            connectors: Vec::new(),
        }
    }
}

impl RunnerConfig {
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(input)?)
    }

    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        // tables after plain values, as toml requires
        let value = toml::Value::try_from(self)?;
        Ok(toml::to_string(&value)?)
    }

    /// Fill in the GitHub token from `GITHUB_TOKEN` when none is configured
    pub fn with_env_token(mut self) -> Self {
        if self.context.github_token.is_none() {
            if let Ok(token) = std::env::var(GITHUB_TOKEN_ENV) {
                if !token.is_empty() {
                    tracing::debug!("using github token from environment");
                    self.context.github_token = Some(token);
                }
            }
        }
        self
    }
}

impl RunnerContext {
    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            github_token: Some(token.into()),
            secrets: BTreeMap::new(),
        }
    }

    pub fn secret(&self, name: &str) -> Option<&str> {
        self.secrets.get(name).map(String::as_str)
    }
}

impl fmt::Debug for RunnerContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunnerContext")
            .field("github_token", &self.github_token.as_ref().map(|_| "***"))
            .field("secrets", &self.secrets.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl InstalledConnector {
    pub fn new(
        owner: impl Into<String>,
        name: impl Into<String>,
        branch: impl Into<String>,
    ) -> Self {
        Self {
            repo_owner: owner.into(),
            repo_name: name.into(),
            repo_branch: branch.into(),
            configuration_parameters: BTreeMap::new(),
        }
    }

    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.configuration_parameters
            .insert(key.into(), value.into());
        self
    }

    pub fn identity(&self) -> Result<ConnectorIdentity, IdentityError> {
        ConnectorIdentity::new(&self.repo_owner, &self.repo_name, &self.repo_branch)
    }
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from(DEFAULT_CACHE_DIR)
}

fn default_artifact_path() -> PathBuf {
    PathBuf::from(DEFAULT_ARTIFACT_PATH)
}

fn default_github_host() -> String {
    DEFAULT_GITHUB_HOST.to_string()
}

fn default_fetch_timeout() -> Duration {
    DEFAULT_FETCH_TIMEOUT
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_from_toml_str() {
        //given
        let toml_str = r##"
            cache_dir = "/var/cache/connectors"
            fetch_timeout = "30s"

            [context]
            GitHubToken = "ghp_secret"
            SLACK_TOKEN = "xoxb"

            [[connectors]]
            RepoOwner = "acme"
            RepoName = "demo"
            RepoBranch = "v1"

            [connectors.ConfigurationParameters]
            channel = "#general"

            [[connectors]]
            RepoOwner = "acme"
            RepoName = "other"
            RepoBranch = "main"
        "##;

        //when
        let config = RunnerConfig::from_toml_str(toml_str).unwrap();

        //then
        assert_eq!(
            config,
            RunnerConfig {
                cache_dir: "/var/cache/connectors".into(),
                artifact_path: DEFAULT_ARTIFACT_PATH.into(),
                github_host: DEFAULT_GITHUB_HOST.into(),
                fetch_timeout: Duration::from_secs(30),
                context: RunnerContext {
                    github_token: Some("ghp_secret".into()),
                    secrets: BTreeMap::from([("SLACK_TOKEN".into(), "xoxb".into())]),
                },
                connectors: vec![
                    InstalledConnector::new("acme", "demo", "v1")
                        .with_parameter("channel", "#general"),
                    InstalledConnector::new("acme", "other", "main"),
                ],
            }
        );
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = RunnerConfig::from_toml_str("").unwrap();

        assert_eq!(config, RunnerConfig::default());
        assert!(config.context.github_token.is_none());
    }

    #[test]
    fn test_to_toml_string_and_back() {
        //given
        let config = RunnerConfig {
            context: RunnerContext::with_token("token"),
            connectors: vec![
                InstalledConnector::new("acme", "demo", "v1").with_parameter("a", "b"),
            ],
            ..Default::default()
        };

        //when
        let toml_string = config.to_toml_string().unwrap();
        let from_string = RunnerConfig::from_toml_str(&toml_string).unwrap();

        //then
        assert_eq!(config, from_string);
    }

    #[test]
    fn test_debug_hides_secret_values() {
        //given
        let mut context = RunnerContext::with_token("ghp_secret");
        context
            .secrets
            .insert("SLACK_TOKEN".to_string(), "xoxb".to_string());
        let config = RunnerConfig {
            context,
            ..Default::default()
        };

        //when
        let debug = format!("{config:?}");

        //then
        assert!(!debug.contains("ghp_secret"));
        assert!(!debug.contains("xoxb"));
        assert!(debug.contains("SLACK_TOKEN"));
        assert!(debug.contains("github_token: Some(\"***\")"));
    }

    #[test]
    fn test_rejects_invalid_timeout() {
        let res = RunnerConfig::from_toml_str(r#"fetch_timeout = "soon""#);

        assert!(matches!(res, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_from_missing_file() {
        let dir = tempfile::tempdir().unwrap();

        let err = RunnerConfig::from_toml_file(dir.path().join("runner.toml")).unwrap_err();

        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
