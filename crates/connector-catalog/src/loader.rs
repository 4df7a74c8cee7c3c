use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use blocking::unblock;
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use tracing::{debug, trace};

use crate::error::LoadError;

/// Structured document read from a connector artifact
pub type RawDocument = serde_yaml::Value;

/// Reads connector artifacts from disk.
///
/// The file is read on every call. Parsing is skipped only when the content
/// digest matches the previous load of the same path, so an artifact replaced
/// on disk is always observed.
#[derive(Debug, Default, Clone)]
pub struct PackageLoader {
    parsed: Arc<Mutex<HashMap<PathBuf, ParsedArtifact>>>,
}

#[derive(Debug, Clone)]
struct ParsedArtifact {
    digest: String,
    document: RawDocument,
}

impl PackageLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn load(&self, path: &Path) -> Result<RawDocument, LoadError> {
        let owned = path.to_path_buf();
        let bytes = unblock(move || std::fs::read(owned))
            .await
            .map_err(|source| match source.kind() {
                ErrorKind::NotFound => LoadError::Missing {
                    path: path.to_path_buf(),
                },
                _ => LoadError::Io {
                    path: path.to_path_buf(),
                    source,
                },
            })?;

        let digest = sha256_digest(&bytes);
        if let Some(parsed) = self.parsed.lock().get(path) {
            if parsed.digest == digest {
                trace!(?path, "artifact unchanged since last load");
                return Ok(parsed.document.clone());
            }
        }

        let document = parse(path, &bytes)?;
        debug!(?path, %digest, "parsed connector artifact");
        self.parsed.lock().insert(
            path.to_path_buf(),
            ParsedArtifact {
                digest,
                document: document.clone(),
            },
        );
        Ok(document)
    }

    /// Digest of the content last parsed from `path`
    pub fn digest(&self, path: &Path) -> Option<String> {
        self.parsed
            .lock()
            .get(path)
            .map(|parsed| parsed.digest.clone())
    }
}

fn parse(path: &Path, bytes: &[u8]) -> Result<RawDocument, LoadError> {
    let is_json = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    let parsed = if is_json {
        serde_json::from_slice(bytes).map_err(|err| err.to_string())
    } else {
        serde_yaml::from_slice(bytes).map_err(|err| err.to_string())
    };
    parsed.map_err(|message| LoadError::Parse {
        path: path.to_path_buf(),
        message,
    })
}

fn sha256_digest(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}
