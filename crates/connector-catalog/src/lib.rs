//! Connector packages fetched from git repositories, validated, and exposed
//! as a catalog of actions.
//!
//! A [`Connector`] is built from an [`InstalledConnector`] descriptor and goes
//! through `uninitialized -> fetching -> loading -> ready` when
//! [`Connector::initialize`] is called, ending in `invalid` or `unreachable`
//! on failure.

pub mod action;
pub mod config;
pub mod connector;
pub mod error;
pub mod fetch;
pub mod identity;
pub mod loader;
pub mod registry;
pub mod schema;

pub use action::{Action, InvocationContext};
pub use config::{InstalledConnector, RunnerConfig, RunnerContext};
pub use connector::{Connector, ConnectorCatalog, ConnectorEnv, ConnectorState};
pub use error::{
    ConfigError, ConnectorError, FetchError, IdentityError, LoadError, Result, ValidationError,
    Violation,
};
pub use fetch::{FetchRequest, GitFetcher, IdentityLocks, RemoteUrl, RepositoryFetcher};
pub use identity::ConnectorIdentity;
pub use loader::{PackageLoader, RawDocument};
pub use registry::ConnectorRegistry;
pub use schema::{ActionSchema, ConnectorSchema, OperationRef, SchemaValidator};

pub mod future {
    pub use fluvio_future::subscriber::init_logger;
}
