use std::collections::BTreeMap;
use std::fmt::{self, Display};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use fluvio_future::future::timeout;
use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::action::Action;
use crate::config::{InstalledConnector, RunnerConfig, RunnerContext};
use crate::error::{ConnectorError, FetchError, IdentityError, Result};
use crate::fetch::{FetchRequest, GitFetcher, IdentityLocks, RemoteUrl, RepositoryFetcher};
use crate::identity::ConnectorIdentity;
use crate::loader::PackageLoader;
use crate::schema::{ConnectorSchema, SchemaValidator};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectorState {
    Uninitialized,
    Fetching,
    Loading,
    Ready,
    /// artifact missing, unparsable or failing validation
    Invalid,
    /// repository could not be retrieved
    Unreachable,
}

impl ConnectorState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Ready | Self::Invalid | Self::Unreachable)
    }
}

impl Display for ConnectorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let str = match self {
            Self::Uninitialized => "uninitialized",
            Self::Fetching => "fetching",
            Self::Loading => "loading",
            Self::Ready => "ready",
            Self::Invalid => "invalid",
            Self::Unreachable => "unreachable",
        };
        write!(f, "{str}")
    }
}

/// What a connector exposes to callers.
///
/// `identity` and `configuration_parameters` are available in every state;
/// the schema accessors fail with [`ConnectorError::NotReady`] until the
/// connector is ready.
pub trait ConnectorCatalog {
    fn identity(&self) -> &ConnectorIdentity;

    fn configuration_parameters(&self) -> &BTreeMap<String, String>;

    fn schema(&self) -> Result<&ConnectorSchema>;

    /// Looks up one action by key
    fn action(&self, key: &str) -> Result<Action<'_>>;

    /// All actions, in declaration order
    fn actions(&self) -> Result<Vec<Action<'_>>>;
}

/// Collaborators shared by every connector of one runner
#[derive(Clone)]
pub struct ConnectorEnv {
    pub fetcher: Arc<dyn RepositoryFetcher>,
    pub loader: PackageLoader,
    pub validator: SchemaValidator,
    pub locks: IdentityLocks,
    pub cache_dir: PathBuf,
    pub artifact_path: PathBuf,
    pub github_host: String,
    pub fetch_timeout: Duration,
}

impl ConnectorEnv {
    /// Git backed environment configured from the runner config
    pub fn from_config(config: &RunnerConfig) -> Self {
        Self::with_fetcher(config, Arc::new(GitFetcher::new()))
    }

    pub fn with_fetcher(config: &RunnerConfig, fetcher: Arc<dyn RepositoryFetcher>) -> Self {
        Self {
            fetcher,
            loader: PackageLoader::new(),
            validator: SchemaValidator::new(),
            locks: IdentityLocks::new(),
            cache_dir: config.cache_dir.clone(),
            artifact_path: config.artifact_path.clone(),
            github_host: config.github_host.clone(),
            fetch_timeout: config.fetch_timeout,
        }
    }
}

impl fmt::Debug for ConnectorEnv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectorEnv")
            .field("cache_dir", &self.cache_dir)
            .field("artifact_path", &self.artifact_path)
            .field("github_host", &self.github_host)
            .field("fetch_timeout", &self.fetch_timeout)
            .finish_non_exhaustive()
    }
}

/// An installed connector and its lifecycle.
///
/// Created once per descriptor and never reset: forcing a refetch means
/// creating a new connector after evicting its cache directory.
pub struct Connector {
    identity: ConnectorIdentity,
    parameters: BTreeMap<String, String>,
    context: RunnerContext,
    env: ConnectorEnv,
    lifecycle: Mutex<Lifecycle>,
    schema: OnceCell<ConnectorSchema>,
}

#[derive(Debug)]
struct Lifecycle {
    state: ConnectorState,
    failure: Option<String>,
}

impl Connector {
    pub fn new(
        descriptor: &InstalledConnector,
        context: RunnerContext,
        env: ConnectorEnv,
    ) -> Result<Self, IdentityError> {
        Ok(Self {
            identity: descriptor.identity()?,
            parameters: descriptor.configuration_parameters.clone(),
            context,
            env,
            lifecycle: Mutex::new(Lifecycle {
                state: ConnectorState::Uninitialized,
                failure: None,
            }),
            schema: OnceCell::new(),
        })
    }

    pub fn state(&self) -> ConnectorState {
        self.lifecycle.lock().state
    }

    pub fn runner_context(&self) -> &RunnerContext {
        &self.context
    }

    /// Root of the local clone, `<cache>/<owner>/<name>/<branch>`
    pub fn clone_root(&self) -> PathBuf {
        self.identity.cache_path(&self.env.cache_dir)
    }

    pub fn artifact_path(&self) -> PathBuf {
        self.clone_root().join(&self.env.artifact_path)
    }

    /// Brings the connector to `Ready`: fetch when not cached, then load and
    /// validate the artifact.
    ///
    /// One shot. Concurrent calls for the same identity wait for the one in
    /// flight. Once ready, further calls are no-ops; once failed, they
    /// return [`ConnectorError::Unusable`] without fetching again.
    #[instrument(skip(self), fields(identity = %self.identity))]
    pub async fn initialize(&self) -> Result<()> {
        let _guard = self.env.locks.lock(&self.identity).await;

        match self.state() {
            ConnectorState::Ready => return Ok(()),
            state @ (ConnectorState::Invalid | ConnectorState::Unreachable) => {
                return Err(self.unusable(state));
            }
            ConnectorState::Uninitialized => {}
            state @ (ConnectorState::Fetching | ConnectorState::Loading) => {
                warn!(%state, "resuming abandoned initialization");
            }
        }

        let artifact = self.artifact_path();
        if artifact.is_file() {
            debug!(?artifact, "artifact already cached, skipping fetch");
        } else {
            self.transition(ConnectorState::Fetching);
            if let Err(source) = self.fetch().await {
                return Err(self.fail(
                    ConnectorState::Unreachable,
                    ConnectorError::Fetch {
                        identity: self.identity.to_string(),
                        source,
                    },
                ));
            }
        }

        self.transition(ConnectorState::Loading);
        let document = match self.env.loader.load(&artifact).await {
            Ok(document) => document,
            Err(source) => {
                return Err(self.fail(
                    ConnectorState::Invalid,
                    ConnectorError::Load {
                        identity: self.identity.to_string(),
                        source,
                    },
                ));
            }
        };

        let schema = match self.env.validator.validate(&document) {
            Ok(schema) => schema,
            Err(source) => {
                return Err(self.fail(
                    ConnectorState::Invalid,
                    ConnectorError::Validation {
                        identity: self.identity.to_string(),
                        source,
                    },
                ));
            }
        };

        let actions = schema.len();
        {
            let mut lifecycle = self.lifecycle.lock();
            if self.schema.set(schema).is_err() {
                debug!("schema already set");
            }
            lifecycle.state = ConnectorState::Ready;
        }
        info!(actions, "connector ready");
        Ok(())
    }

    async fn fetch(&self) -> Result<(), FetchError> {
        let url = RemoteUrl::new(&self.env.github_host, &self.identity, &self.context);
        if !url.is_authenticated() {
            debug!("no github token, only public repositories are reachable");
        }
        let request = FetchRequest::new(self.identity.clone(), url, &self.env.cache_dir);
        let limit = self.env.fetch_timeout;

        match timeout(limit, self.env.fetcher.fetch(&request)).await {
            Ok(res) => res,
            Err(_) => Err(FetchError::Timeout {
                url: request.url.redacted(),
                timeout: limit,
            }),
        }
    }

    fn transition(&self, state: ConnectorState) {
        debug!(%state, "connector state changed");
        self.lifecycle.lock().state = state;
    }

    fn fail(&self, state: ConnectorState, err: ConnectorError) -> ConnectorError {
        let reason = error_chain(&err);
        warn!(%state, %reason, "connector initialization failed");
        let mut lifecycle = self.lifecycle.lock();
        lifecycle.state = state;
        lifecycle.failure = Some(reason);
        err
    }

    fn unusable(&self, state: ConnectorState) -> ConnectorError {
        let reason = self
            .lifecycle
            .lock()
            .failure
            .clone()
            .unwrap_or_else(|| "initialization failed".to_string());
        ConnectorError::Unusable {
            identity: self.identity.to_string(),
            state,
            reason,
        }
    }

    fn not_ready(&self) -> ConnectorError {
        ConnectorError::NotReady {
            identity: self.identity.to_string(),
            state: self.state(),
        }
    }
}

impl ConnectorCatalog for Connector {
    fn identity(&self) -> &ConnectorIdentity {
        &self.identity
    }

    fn configuration_parameters(&self) -> &BTreeMap<String, String> {
        &self.parameters
    }

    fn schema(&self) -> Result<&ConnectorSchema> {
        let state = self.state();
        match self.schema.get() {
            Some(schema) if state == ConnectorState::Ready => Ok(schema),
            _ => Err(self.not_ready()),
        }
    }

    fn action(&self, key: &str) -> Result<Action<'_>> {
        let schema = self.schema()?;
        schema
            .actions()
            .iter()
            .find(|action| action.key == key)
            .map(|action| Action::new(action, self))
            .ok_or_else(|| ConnectorError::ActionNotFound {
                key: key.to_string(),
                identity: self.identity.to_string(),
            })
    }

    fn actions(&self) -> Result<Vec<Action<'_>>> {
        let schema = self.schema()?;
        Ok(schema
            .actions()
            .iter()
            .map(|action| Action::new(action, self))
            .collect())
    }
}

impl fmt::Debug for Connector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connector")
            .field("identity", &self.identity)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

fn error_chain(err: &dyn std::error::Error) -> String {
    let mut reason = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let cause_message = cause.to_string();
        if !reason.contains(&cause_message) {
            reason.push_str(": ");
            reason.push_str(&cause_message);
        }
        source = cause.source();
    }
    reason
}
