use std::collections::HashSet;

use futures_util::future::join_all;
use tracing::info;

use crate::action::Action;
use crate::config::RunnerConfig;
use crate::connector::{Connector, ConnectorCatalog, ConnectorEnv};
use crate::error::{ConfigError, ConnectorError, Result};

/// The installed connectors of one runner, in configuration order.
///
/// All connectors share one fetcher, loader and lock arena.
#[derive(Debug)]
pub struct ConnectorRegistry {
    connectors: Vec<Connector>,
}

impl ConnectorRegistry {
    pub fn from_config(config: &RunnerConfig) -> Result<Self, ConfigError> {
        Self::with_env(config, ConnectorEnv::from_config(config))
    }

    pub fn with_env(config: &RunnerConfig, env: ConnectorEnv) -> Result<Self, ConfigError> {
        let mut seen = HashSet::new();
        let mut connectors = Vec::with_capacity(config.connectors.len());
        for descriptor in &config.connectors {
            let connector = Connector::new(descriptor, config.context.clone(), env.clone())?;
            if !seen.insert(connector.identity().clone()) {
                return Err(ConfigError::Duplicate(connector.identity().to_string()));
            }
            connectors.push(connector);
        }
        Ok(Self { connectors })
    }

    pub fn get(&self, identity: &str) -> Option<&Connector> {
        self.connectors
            .iter()
            .find(|connector| connector.identity().to_string() == identity)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Connector> {
        self.connectors.iter()
    }

    pub fn len(&self) -> usize {
        self.connectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connectors.is_empty()
    }

    /// Initializes every connector concurrently. Results are in
    /// configuration order; one failure does not affect the others.
    pub async fn initialize_all(&self) -> Vec<Result<()>> {
        let results = join_all(
            self.connectors
                .iter()
                .map(|connector| connector.initialize()),
        )
        .await;
        let ready = results.iter().filter(|res| res.is_ok()).count();
        info!(ready, total = results.len(), "connectors initialized");
        results
    }

    /// Resolves `key` in the connector named by `identity` (`owner/name@branch`)
    pub fn find_action(&self, identity: &str, key: &str) -> Result<Action<'_>> {
        self.get(identity)
            .ok_or_else(|| ConnectorError::UnknownConnector(identity.to_string()))?
            .action(key)
    }
}
