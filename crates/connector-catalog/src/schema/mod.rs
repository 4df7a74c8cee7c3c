//! Validated interface of a connector: the actions it declares.

mod validate;

pub use validate::SchemaValidator;

use std::fmt::{self, Display};
use std::path::{Component, Path, PathBuf};

use openapiv3::Schema;
use serde::Serialize;

/// Only ever produced by [`SchemaValidator::validate`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConnectorSchema {
    actions: Vec<ActionSchema>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionSchema {
    pub key: String,
    pub title: String,
    pub description: String,
    pub input_parameters: Schema,
    pub output_parameters: Schema,
    pub operation: OperationRef,
}

/// Location of the code implementing an action: `path[#export]`, relative to
/// the repository root.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OperationRef {
    path: PathBuf,
    export: Option<String>,
}

impl ConnectorSchema {
    pub(crate) fn new(actions: Vec<ActionSchema>) -> Self {
        Self { actions }
    }

    /// Actions in declaration order
    pub fn actions(&self) -> &[ActionSchema] {
        &self.actions
    }

    pub fn action(&self, key: &str) -> Option<&ActionSchema> {
        self.actions.iter().find(|action| action.key == key)
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

impl OperationRef {
    pub fn parse(reference: &str) -> Result<Self, String> {
        let (path, export) = match reference.split_once('#') {
            Some((path, export)) => (path, Some(export)),
            None => (reference, None),
        };

        if path.is_empty() {
            return Err("operation path must not be empty".to_string());
        }
        if let Some(export) = export {
            if export.is_empty() {
                return Err("operation export after '#' must not be empty".to_string());
            }
        }

        let path = PathBuf::from(path);
        for component in path.components() {
            match component {
                Component::Normal(_) | Component::CurDir => {}
                Component::ParentDir => {
                    return Err(format!(
                        "operation path '{}' must not leave the repository",
                        path.display()
                    ));
                }
                Component::RootDir | Component::Prefix(_) => {
                    return Err(format!(
                        "operation path '{}' must be relative",
                        path.display()
                    ));
                }
            }
        }

        Ok(Self {
            path,
            export: export.map(ToString::to_string),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn export(&self) -> Option<&str> {
        self.export.as_deref()
    }
}

impl Display for OperationRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path.display())?;
        if let Some(export) = &self.export {
            write!(f, "#{export}")?;
        }
        Ok(())
    }
}

impl Serialize for OperationRef {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_operation_ref() {
        let op = OperationRef::parse("dist/actions.js#send").unwrap();

        assert_eq!(op.path(), Path::new("dist/actions.js"));
        assert_eq!(op.export(), Some("send"));
        assert_eq!(op.to_string(), "dist/actions.js#send");
    }

    #[test]
    fn test_parse_operation_ref_without_export() {
        let op = OperationRef::parse("bin/send").unwrap();

        assert_eq!(op.export(), None);
        assert_eq!(op.to_string(), "bin/send");
    }

    #[test]
    fn test_operation_ref_stays_in_repository() {
        assert_eq!(
            OperationRef::parse("../outside.js").unwrap_err(),
            "operation path '../outside.js' must not leave the repository"
        );
        assert_eq!(
            OperationRef::parse("/etc/passwd").unwrap_err(),
            "operation path '/etc/passwd' must be relative"
        );
        assert_eq!(
            OperationRef::parse("#send").unwrap_err(),
            "operation path must not be empty"
        );
        assert_eq!(
            OperationRef::parse("dist/a.js#").unwrap_err(),
            "operation export after '#' must not be empty"
        );
    }
}
