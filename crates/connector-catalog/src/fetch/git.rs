use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use blocking::unblock;
use fluvio_command::{CommandError, CommandErrorKind};
use tracing::{debug, info, instrument, warn};

use crate::error::FetchError;

use super::{FetchRequest, RemoteUrl, RepositoryFetcher};

const STAGING_PREFIX: &str = ".fetch-";
const CHECKOUT_DIR: &str = "checkout";

/// Shallow, single branch `git clone` into the connector cache.
///
/// The clone lands in a staging directory next to the destination and is
/// renamed into place once complete, so a populated destination is always a
/// finished retrieval.
#[derive(Debug, Clone)]
pub struct GitFetcher {
    git: PathBuf,
}

impl Default for GitFetcher {
    fn default() -> Self {
        Self {
            git: PathBuf::from("git"),
        }
    }
}

impl GitFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a specific git executable
    pub fn with_git(git: impl Into<PathBuf>) -> Self {
        Self { git: git.into() }
    }
}

#[async_trait]
impl RepositoryFetcher for GitFetcher {
    #[instrument(skip(self, request), fields(identity = %request.identity))]
    async fn fetch(&self, request: &FetchRequest) -> Result<(), FetchError> {
        // dropped together with this future, also when a caller times it out
        let abandoned = AbandonOnDrop::default();
        let job = CloneJob {
            git: self.git.clone(),
            url: request.url.clone(),
            branch: request.branch().to_string(),
            destination: request.destination.clone(),
            abandoned: abandoned.flag(),
        };

        unblock(move || job.run()).await
    }
}

struct CloneJob {
    git: PathBuf,
    url: RemoteUrl,
    branch: String,
    destination: PathBuf,
    abandoned: Arc<AtomicBool>,
}

impl CloneJob {
    fn run(self) -> Result<(), FetchError> {
        if is_populated(&self.destination) {
            debug!(destination = ?self.destination, "connector already cached");
            return Ok(());
        }

        let parent = self
            .destination
            .parent()
            .unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(parent).map_err(|source| FetchError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
        let staging = tempfile::Builder::new()
            .prefix(STAGING_PREFIX)
            .tempdir_in(parent)
            .map_err(|source| FetchError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        let checkout = staging.path().join(CHECKOUT_DIR);

        info!(url = %self.url, branch = %self.branch, "cloning connector");

        let mut cmd = Command::new(&self.git);
        cmd.arg("clone")
            .arg("--depth")
            .arg("1")
            .arg("--single-branch")
            .arg("--branch")
            .arg(&self.branch)
            .arg("--")
            .arg(self.url.expose())
            .arg(&checkout)
            .env("GIT_TERMINAL_PROMPT", "0");

        run_redacted(&mut cmd, &self.url).map_err(|source| FetchError::Git {
            url: self.url.redacted(),
            source,
        })?;

        if self.abandoned.load(Ordering::SeqCst) {
            warn!(url = %self.url, "discarding clone of abandoned retrieval");
            return Err(FetchError::Abandoned {
                url: self.url.redacted(),
            });
        }

        if let Err(source) = std::fs::rename(&checkout, &self.destination) {
            // another process finished the same retrieval first
            if is_populated(&self.destination) {
                debug!(destination = ?self.destination, "destination populated concurrently");
                return Ok(());
            }
            return Err(FetchError::Io {
                path: self.destination,
                source,
            });
        }

        debug!(destination = ?self.destination, "connector cloned");
        Ok(())
    }
}

/// Runs `cmd` and reports failures without the credentials in the URL
fn run_redacted(cmd: &mut Command, url: &RemoteUrl) -> Result<(), CommandError> {
    let command_line = format!("{cmd:?}")
        .replace('"', "")
        .replace(&url.expose(), &url.redacted());
    debug!("Executing> {}", command_line);

    let output = cmd.output().map_err(|err| CommandError {
        command: command_line.clone(),
        source: CommandErrorKind::IoError(err),
    })?;

    match output.status.code() {
        Some(0i32) => Ok(()),
        None => Err(CommandError {
            command: command_line,
            source: CommandErrorKind::Terminated,
        }),
        Some(code) => Err(CommandError {
            command: command_line,
            source: CommandErrorKind::ExitError(code, output),
        }),
    }
}

pub(crate) fn is_populated(path: &Path) -> bool {
    std::fs::read_dir(path)
        .map(|mut entries| entries.next().is_some())
        .unwrap_or(false)
}

#[derive(Default)]
struct AbandonOnDrop(Arc<AtomicBool>);

impl AbandonOnDrop {
    fn flag(&self) -> Arc<AtomicBool> {
        self.0.clone()
    }
}

impl Drop for AbandonOnDrop {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}
