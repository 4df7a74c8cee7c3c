use std::fmt;
use std::io::Error as IoError;
use std::path::PathBuf;
use std::time::Duration;

use fluvio_command::CommandError;

use crate::connector::ConnectorState;

pub type Result<T, E = ConnectorError> = core::result::Result<T, E>;

#[derive(thiserror::Error, Debug)]
pub enum ConnectorError {
    #[error("invalid connector identity: {0}")]
    InvalidIdentity(#[from] IdentityError),
    #[error("failed to fetch connector {identity}")]
    Fetch {
        identity: String,
        #[source]
        source: FetchError,
    },
    #[error("failed to load connector {identity}")]
    Load {
        identity: String,
        #[source]
        source: LoadError,
    },
    #[error("connector {identity} failed validation: {source}")]
    Validation {
        identity: String,
        #[source]
        source: ValidationError,
    },
    #[error("action '{key}' not found in connector {identity}")]
    ActionNotFound { key: String, identity: String },
    #[error("connector {identity} is not ready (state: {state})")]
    NotReady {
        identity: String,
        state: ConnectorState,
    },
    #[error("connector {0} is not installed")]
    UnknownConnector(String),
    #[error("connector {identity} is unusable (state: {state}): {reason}")]
    Unusable {
        identity: String,
        state: ConnectorState,
        reason: String,
    },
}

impl ConnectorError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::ActionNotFound { .. })
    }

    pub fn is_not_ready(&self) -> bool {
        matches!(self, Self::NotReady { .. })
    }

    /// Violations of a failed validation, if this is one
    pub fn violations(&self) -> Option<&[Violation]> {
        match self {
            Self::Validation { source, .. } => Some(source.violations()),
            _ => None,
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum FetchError {
    #[error("git retrieval of {url} failed")]
    Git {
        url: String,
        #[source]
        source: CommandError,
    },
    #[error("retrieval of {url} timed out after {}", fmt_secs(.timeout))]
    Timeout { url: String, timeout: Duration },
    #[error("retrieval of {url} was abandoned")]
    Abandoned { url: String },
    #[error("cache error at {}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: IoError,
    },
}

#[derive(thiserror::Error, Debug)]
pub enum LoadError {
    #[error("connector artifact not found at {}", .path.display())]
    Missing { path: PathBuf },
    #[error("unable to read connector artifact {}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: IoError,
    },
    #[error("unable to parse connector artifact {}: {message}", .path.display())]
    Parse { path: PathBuf, message: String },
}

/// One violated constraint, addressed by its location in the document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    pub path: String,
    pub message: String,
}

impl Violation {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

/// Every violation found in a connector schema document.
///
/// Never empty; the validator only builds one when at least one
/// constraint failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    violations: Vec<Violation>,
}

impl ValidationError {
    pub(crate) fn new(violations: Vec<Violation>) -> Self {
        debug_assert!(!violations.is_empty());
        Self { violations }
    }

    pub fn violations(&self) -> &[Violation] {
        &self.violations
    }

    pub fn messages(&self) -> Vec<String> {
        self.violations.iter().map(ToString::to_string).collect()
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let count = self.violations.len();
        let noun = if count == 1 {
            "violation"
        } else {
            "violations"
        };
        write!(f, "{count} schema {noun} found")?;
        for violation in &self.violations {
            write!(f, "\n  - {violation}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("{}", .problems.join("; "))]
pub struct IdentityError {
    pub problems: Vec<String>,
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("unable to read runner config {}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: IoError,
    },
    #[error("unable to parse runner config")]
    Parse(#[from] toml::de::Error),
    #[error("unable to serialize runner config")]
    Serialize(#[from] toml::ser::Error),
    #[error("connector {0} is installed more than once")]
    Duplicate(String),
    #[error(transparent)]
    Identity(#[from] IdentityError),
}

fn fmt_secs(duration: &Duration) -> String {
    format!("{}s", duration.as_secs_f32())
}
