use std::fmt::{self, Display};
use std::path::{Path, PathBuf};

use crate::error::IdentityError;

/// `owner/name@branch` of an installed connector.
///
/// Every segment is checked on construction so that the cache path built
/// from it always stays beneath the cache root.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectorIdentity {
    owner: String,
    name: String,
    branch: String,
}

impl ConnectorIdentity {
    pub fn new(
        owner: impl Into<String>,
        name: impl Into<String>,
        branch: impl Into<String>,
    ) -> Result<Self, IdentityError> {
        let identity = Self {
            owner: owner.into(),
            name: name.into(),
            branch: branch.into(),
        };

        let mut problems = Vec::new();
        validate_segment(&identity.owner, "owner", &mut problems);
        validate_segment(&identity.name, "name", &mut problems);
        if identity.branch.is_empty() {
            problems.push("branch must not be empty".to_string());
        } else {
            for segment in identity.branch.split('/') {
                validate_segment(segment, "branch segment", &mut problems);
            }
        }

        if problems.is_empty() {
            Ok(identity)
        } else {
            Err(IdentityError { problems })
        }
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn branch(&self) -> &str {
        &self.branch
    }

    /// `<root>/<owner>/<name>/<branch>`
    pub fn cache_path(&self, root: &Path) -> PathBuf {
        let mut path = root.join(&self.owner).join(&self.name);
        for segment in self.branch.split('/') {
            path.push(segment);
        }
        path
    }
}

impl Display for ConnectorIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}@{}", self.owner, self.name, self.branch)
    }
}

fn validate_segment(val: &str, name: &str, problems: &mut Vec<String>) {
    if val.is_empty() {
        problems.push(format!("{name} must not be empty"));
        return;
    }
    if val == "." || val == ".." {
        problems.push(format!("{name} '{val}' is not allowed"));
        return;
    }
    let good_chars = val
        .chars()
        .all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_' | '.'));
    if !good_chars {
        problems.push(format!(
            "{name} '{val}' should be alphanumeric, '-', '_' or '.'"
        ));
    }
    if let Some(c) = val.chars().next() {
        if matches!(c, '-' | '_' | '.') {
            problems.push(format!("{name} '{val}' has leading punctuation"));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_display() {
        let identity = ConnectorIdentity::new("acme", "demo", "v1").unwrap();

        assert_eq!(identity.to_string(), "acme/demo@v1");
        assert_eq!(identity.to_string(), identity.clone().to_string());
    }

    #[test]
    fn test_cache_path() {
        let identity = ConnectorIdentity::new("acme", "demo", "release/v1.2").unwrap();

        let path = identity.cache_path(Path::new("connectors"));

        assert_eq!(path, PathBuf::from("connectors/acme/demo/release/v1.2"));
    }

    #[test]
    fn test_rejects_escaping_segments() {
        let err = ConnectorIdentity::new("..", "demo", "main/../../etc").unwrap_err();

        assert_eq!(
            err.problems,
            vec![
                "owner '..' is not allowed".to_string(),
                "branch segment '..' is not allowed".to_string(),
                "branch segment '..' is not allowed".to_string(),
            ]
        );
    }

    #[test]
    fn test_collects_every_problem() {
        let err = ConnectorIdentity::new("", "my repo", "").unwrap_err();

        assert_eq!(
            err.problems,
            vec![
                "owner must not be empty".to_string(),
                "name 'my repo' should be alphanumeric, '-', '_' or '.'".to_string(),
                "branch must not be empty".to_string(),
            ]
        );
    }

    #[test]
    fn test_rejects_leading_punctuation() {
        let err = ConnectorIdentity::new("acme", "-demo", "v1").unwrap_err();

        assert_eq!(
            err.problems,
            vec!["name '-demo' has leading punctuation".to_string()]
        );
    }
}
