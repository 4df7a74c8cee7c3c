use std::collections::HashMap;

use openapiv3::Schema;
use serde_yaml::{Mapping, Value};

use crate::error::{ValidationError, Violation};
use crate::loader::RawDocument;

use super::{ActionSchema, ConnectorSchema, OperationRef};

const ACTIONS: &str = "actions";

/// Checks a raw connector document against the expected schema shape.
///
/// Validation does not stop at the first problem: every violation is
/// collected, in document order, so a broken connector can be fixed in
/// one pass.
#[derive(Debug, Default, Clone, Copy)]
pub struct SchemaValidator;

impl SchemaValidator {
    pub fn new() -> Self {
        Self
    }

    pub fn validate(&self, document: &RawDocument) -> Result<ConnectorSchema, ValidationError> {
        let mut violations = Vec::new();

        let Some(root) = document.as_mapping() else {
            return Err(ValidationError::new(vec![Violation::new(
                "document",
                format!("expected a mapping, found {}", describe(document)),
            )]));
        };

        let actions = match root.get(ACTIONS) {
            None => {
                violations.push(Violation::new(ACTIONS, "required field is missing"));
                Vec::new()
            }
            Some(Value::Sequence(items)) => validate_actions(items, &mut violations),
            Some(other) => {
                violations.push(Violation::new(
                    ACTIONS,
                    format!("expected a sequence, found {}", describe(other)),
                ));
                Vec::new()
            }
        };

        if violations.is_empty() {
            Ok(ConnectorSchema::new(actions))
        } else {
            Err(ValidationError::new(violations))
        }
    }
}

fn validate_actions(items: &[Value], violations: &mut Vec<Violation>) -> Vec<ActionSchema> {
    let mut first_declared: HashMap<String, usize> = HashMap::new();
    let mut actions = Vec::with_capacity(items.len());

    for (index, item) in items.iter().enumerate() {
        let location = format!("{ACTIONS}[{index}]");
        let Some(fields) = item.as_mapping() else {
            violations.push(Violation::new(
                location,
                format!("expected a mapping, found {}", describe(item)),
            ));
            continue;
        };

        let mut fields = Fields {
            location: &location,
            fields,
            violations: &mut *violations,
        };

        let key = fields.non_empty_string("key");
        if let Some(key) = &key {
            if let Some(first) = first_declared.get(key) {
                fields.violation(
                    "key",
                    format!("duplicate key '{key}', first declared at {ACTIONS}[{first}]"),
                );
            } else {
                first_declared.insert(key.clone(), index);
            }
        }
        let title = fields.string("title");
        let description = fields.string("description");
        let input_parameters = fields.parameters("inputParameters");
        let output_parameters = fields.parameters("outputParameters");
        let operation = fields.operation("operation");

        if let (
            Some(key),
            Some(title),
            Some(description),
            Some(input_parameters),
            Some(output_parameters),
            Some(operation),
        ) = (
            key,
            title,
            description,
            input_parameters,
            output_parameters,
            operation,
        ) {
            actions.push(ActionSchema {
                key,
                title,
                description,
                input_parameters,
                output_parameters,
                operation,
            });
        }
    }

    actions
}

/// Field accessors for one action entry that record what they reject
struct Fields<'a> {
    location: &'a str,
    fields: &'a Mapping,
    violations: &'a mut Vec<Violation>,
}

impl<'a> Fields<'a> {
    fn violation(&mut self, field: &str, message: impl Into<String>) {
        self.violations
            .push(Violation::new(format!("{}.{field}", self.location), message));
    }

    fn required(&mut self, field: &str) -> Option<&'a Value> {
        let fields = self.fields;
        match fields.get(field) {
            None | Some(Value::Null) => {
                self.violation(field, "required field is missing");
                None
            }
            Some(value) => Some(value),
        }
    }

    fn string(&mut self, field: &str) -> Option<String> {
        let value = self.required(field)?.clone();
        match value {
            Value::String(s) => Some(s),
            other => {
                self.violation(
                    field,
                    format!("expected a string, found {}", describe(&other)),
                );
                None
            }
        }
    }

    fn non_empty_string(&mut self, field: &str) -> Option<String> {
        let value = self.string(field)?;
        if value.trim().is_empty() {
            self.violation(field, "must not be empty");
            return None;
        }
        Some(value)
    }

    fn parameters(&mut self, field: &str) -> Option<Schema> {
        let value = self.required(field)?.clone();
        if !value.is_mapping() {
            self.violation(
                field,
                format!("expected a schema mapping, found {}", describe(&value)),
            );
            return None;
        }
        match serde_yaml::from_value::<Schema>(value) {
            Ok(schema) => Some(schema),
            Err(err) => {
                self.violation(field, format!("is not a valid schema: {err}"));
                None
            }
        }
    }

    fn operation(&mut self, field: &str) -> Option<OperationRef> {
        let reference = self.non_empty_string(field)?;
        match OperationRef::parse(&reference) {
            Ok(operation) => Some(operation),
            Err(message) => {
                self.violation(field, message);
                None
            }
        }
    }
}

fn describe(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Sequence(_) => "a sequence",
        Value::Mapping(_) => "a mapping",
        Value::Tagged(_) => "a tagged value",
    }
}

#[cfg(test)]
mod tests {
    use openapiv3::{SchemaKind, Type};
    use pretty_assertions::assert_eq;

    use super::*;

    fn document(yaml: &str) -> RawDocument {
        serde_yaml::from_str(yaml).unwrap()
    }

    fn messages(yaml: &str) -> Vec<String> {
        SchemaValidator::new()
            .validate(&document(yaml))
            .unwrap_err()
            .messages()
    }

    const TWO_ACTIONS: &str = r#"
        actions:
          - key: send
            title: Send message
            description: Posts a message to a channel
            inputParameters:
              type: object
              required: [text]
              properties:
                text:
                  type: string
            outputParameters:
              type: object
            operation: dist/actions.js#send
          - key: receive
            title: Receive messages
            description: Reads pending messages
            inputParameters: {}
            outputParameters:
              type: array
              items:
                type: string
            operation: dist/actions.js#receive
    "#;

    #[test]
    fn test_validate_well_formed() {
        //when
        let schema = SchemaValidator::new()
            .validate(&document(TWO_ACTIONS))
            .unwrap();

        //then
        let keys: Vec<_> = schema.actions().iter().map(|a| a.key.as_str()).collect();
        assert_eq!(keys, vec!["send", "receive"]);
        let send = schema.action("send").unwrap();
        assert_eq!(send.title, "Send message");
        assert_eq!(send.operation.export(), Some("send"));
        assert!(matches!(
            send.input_parameters.schema_kind,
            SchemaKind::Type(Type::Object(_))
        ));
        assert!(matches!(
            schema.action("receive").unwrap().input_parameters.schema_kind,
            SchemaKind::Any(_)
        ));
    }

    #[test]
    fn test_empty_actions_are_valid() {
        let schema = SchemaValidator::new()
            .validate(&document("actions: []"))
            .unwrap();

        assert!(schema.is_empty());
    }

    #[test]
    fn test_document_must_be_mapping() {
        assert_eq!(
            messages("- key: send"),
            vec!["document: expected a mapping, found a sequence"]
        );
    }

    #[test]
    fn test_actions_required() {
        assert_eq!(
            messages("name: demo"),
            vec!["actions: required field is missing"]
        );
        assert_eq!(
            messages("actions: send"),
            vec!["actions: expected a sequence, found a string"]
        );
    }

    #[test]
    fn test_missing_key() {
        let messages = messages(
            r#"
            actions:
              - title: Send message
                description: Posts a message
                inputParameters: {}
                outputParameters: {}
                operation: dist/actions.js#send
            "#,
        );

        assert_eq!(messages, vec!["actions[0].key: required field is missing"]);
    }

    #[test]
    fn test_reports_every_violation() {
        //given
        let yaml = r#"
            actions:
              - key: ""
                title: 42
                inputParameters: []
                outputParameters: {}
                operation: ../outside.js
              - 17
              - key: send
                title: Send
                description: d
                inputParameters: {}
                outputParameters: {}
                operation: a.js
              - key: send
                title: Send again
                description: d
                inputParameters: {}
                outputParameters: {}
                operation: a.js
        "#;

        //when
        let messages = messages(yaml);

        //then
        assert_eq!(
            messages,
            vec![
                "actions[0].key: must not be empty",
                "actions[0].title: expected a string, found a number",
                "actions[0].description: required field is missing",
                "actions[0].inputParameters: expected a schema mapping, found a sequence",
                "actions[0].operation: operation path '../outside.js' must not leave the repository",
                "actions[1]: expected a mapping, found a number",
                "actions[3].key: duplicate key 'send', first declared at actions[2]",
            ]
        );
    }

    #[test]
    fn test_validation_is_deterministic() {
        let yaml = r#"
            actions:
              - key: send
              - title: t
        "#;

        let first = messages(yaml);
        let second = messages(yaml);

        assert_eq!(first, second);
        assert_eq!(first.len(), 10);
    }

    #[test]
    fn test_invalid_parameter_schema() {
        let messages = messages(
            r#"
            actions:
              - key: send
                title: Send
                description: d
                inputParameters:
                  type: object
                  properties: 12
                outputParameters: {}
                operation: a.js
            "#,
        );

        assert_eq!(messages.len(), 1);
        assert!(messages[0].starts_with("actions[0].inputParameters: is not a valid schema"));
    }
}
