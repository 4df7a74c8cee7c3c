use std::collections::BTreeMap;
use std::path::PathBuf;

use openapiv3::Schema;

use crate::connector::{Connector, ConnectorCatalog};
use crate::identity::ConnectorIdentity;
use crate::schema::{ActionSchema, OperationRef};

/// One action of a ready connector.
///
/// A view: borrows the validated schema entry and the connector that
/// declared it, and is cheap to derive again.
#[derive(Debug, Clone, Copy)]
pub struct Action<'a> {
    schema: &'a ActionSchema,
    connector: &'a Connector,
}

/// What an invoker needs to run an action's operation
#[derive(Debug, Clone)]
pub struct InvocationContext<'a> {
    pub identity: &'a ConnectorIdentity,
    pub key: &'a str,
    pub input_parameters: &'a Schema,
    pub output_parameters: &'a Schema,
    pub configuration_parameters: &'a BTreeMap<String, String>,
    pub secrets: &'a BTreeMap<String, String>,
    pub operation_path: PathBuf,
    pub operation_export: Option<&'a str>,
}

impl<'a> Action<'a> {
    pub(crate) fn new(schema: &'a ActionSchema, connector: &'a Connector) -> Self {
        Self { schema, connector }
    }

    pub fn key(&self) -> &'a str {
        &self.schema.key
    }

    pub fn title(&self) -> &'a str {
        &self.schema.title
    }

    pub fn description(&self) -> &'a str {
        &self.schema.description
    }

    pub fn input_parameters(&self) -> &'a Schema {
        &self.schema.input_parameters
    }

    pub fn output_parameters(&self) -> &'a Schema {
        &self.schema.output_parameters
    }

    pub fn operation(&self) -> &'a OperationRef {
        &self.schema.operation
    }

    pub fn schema(&self) -> &'a ActionSchema {
        self.schema
    }

    pub fn connector(&self) -> &'a Connector {
        self.connector
    }

    /// Operation location inside the connector's clone
    pub fn operation_path(&self) -> PathBuf {
        self.connector
            .clone_root()
            .join(self.schema.operation.path())
    }

    /// Combines the declared parameter shapes with the connector's
    /// configuration and the runner secrets. The GitHub token is not part
    /// of the secrets handed out.
    pub fn invocation_context(&self) -> InvocationContext<'a> {
        InvocationContext {
            identity: self.connector.identity(),
            key: self.key(),
            input_parameters: self.input_parameters(),
            output_parameters: self.output_parameters(),
            configuration_parameters: self.connector.configuration_parameters(),
            secrets: &self.connector.runner_context().secrets,
            operation_path: self.operation_path(),
            operation_export: self.schema.operation.export(),
        }
    }
}
