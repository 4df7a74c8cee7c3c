//! Retrieval of connector repositories into the local cache.

mod git;
mod locks;

pub use git::GitFetcher;
pub use locks::{IdentityGuard, IdentityLocks};

use std::fmt::{self, Display};
use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::config::RunnerContext;
use crate::error::FetchError;
use crate::identity::ConnectorIdentity;

/// Remote location of a connector repository.
///
/// Keeps the token out of `Display` and `Debug`; only [`RemoteUrl::expose`]
/// yields the URL with credentials.
#[derive(Clone, PartialEq, Eq)]
pub struct RemoteUrl {
    scheme: String,
    location: String,
    token: Option<String>,
}

impl RemoteUrl {
    /// `https://[oauth2:<token>@]<host>/<owner>/<name>.git`
    ///
    /// `host` may carry its own scheme (`file:///srv/mirror`), in which case
    /// it is used as given. Tokens are only sent over http(s).
    pub fn new(host: &str, identity: &ConnectorIdentity, context: &RunnerContext) -> Self {
        let host = host.trim_end_matches('/');
        let (scheme, host) = host.split_once("://").unwrap_or(("https", host));
        Self {
            scheme: scheme.to_string(),
            location: format!("{host}/{}/{}.git", identity.owner(), identity.name()),
            token: context
                .github_token
                .as_ref()
                .filter(|token| !token.is_empty() && scheme.starts_with("http"))
                .cloned(),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    pub fn expose(&self) -> String {
        match &self.token {
            Some(token) => format!("{}://oauth2:{token}@{}", self.scheme, self.location),
            None => format!("{}://{}", self.scheme, self.location),
        }
    }

    pub fn redacted(&self) -> String {
        match &self.token {
            Some(_) => format!("{}://oauth2:***@{}", self.scheme, self.location),
            None => format!("{}://{}", self.scheme, self.location),
        }
    }
}

impl Display for RemoteUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.redacted())
    }
}

impl fmt::Debug for RemoteUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("RemoteUrl").field(&self.redacted()).finish()
    }
}

/// Everything needed to materialize one connector in the cache
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub identity: ConnectorIdentity,
    pub url: RemoteUrl,
    pub destination: PathBuf,
}

impl FetchRequest {
    pub fn new(identity: ConnectorIdentity, url: RemoteUrl, cache_root: &Path) -> Self {
        let destination = identity.cache_path(cache_root);
        Self {
            identity,
            url,
            destination,
        }
    }

    pub fn branch(&self) -> &str {
        self.identity.branch()
    }
}

#[async_trait]
pub trait RepositoryFetcher: Send + Sync {
    /// Materializes the repository branch at `request.destination`.
    ///
    /// A destination left by an earlier completed retrieval is success and
    /// is never updated.
    async fn fetch(&self, request: &FetchRequest) -> Result<(), FetchError>;
}
