//! JSON schemas for the custom entity kinds, compiled once per process.

use jsonschema::{Draft, JSONSchema};
use serde_json::Value;
use std::sync::LazyLock;

static AWS_ENVIRONMENT_SCHEMA: LazyLock<Value> = LazyLock::new(|| {
    serde_json::from_str(include_str!("schemas/AWSEnvironment.v1alpha.schema.json"))
        .expect("Failed to parse AWSEnvironment schema - this should never happen")
});

static AWS_ENVIRONMENT_PROVIDER_SCHEMA: LazyLock<Value> = LazyLock::new(|| {
    serde_json::from_str(include_str!("schemas/AWSEnvironmentProvider.v1alpha.schema.json"))
        .expect("Failed to parse AWSEnvironmentProvider schema - this should never happen")
});

static AWS_ENVIRONMENT_VALIDATOR: LazyLock<JSONSchema> = LazyLock::new(|| {
    JSONSchema::options()
        .with_draft(Draft::Draft7)
        .compile(&AWS_ENVIRONMENT_SCHEMA)
        .expect("Failed to compile AWSEnvironment schema - this should never happen")
});

static AWS_ENVIRONMENT_PROVIDER_VALIDATOR: LazyLock<JSONSchema> = LazyLock::new(|| {
    JSONSchema::options()
        .with_draft(Draft::Draft7)
        .compile(&AWS_ENVIRONMENT_PROVIDER_SCHEMA)
        .expect("Failed to compile AWSEnvironmentProvider schema - this should never happen")
});

/// Schemas shipped with the platform
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntitySchema {
    AwsEnvironment,
    AwsEnvironmentProvider,
}

impl EntitySchema {
    fn validator(self) -> &'static JSONSchema {
        match self {
            EntitySchema::AwsEnvironment => &AWS_ENVIRONMENT_VALIDATOR,
            EntitySchema::AwsEnvironmentProvider => &AWS_ENVIRONMENT_PROVIDER_VALIDATOR,
        }
    }

    #[must_use]
    pub fn is_valid(self, entity: &Value) -> bool {
        self.validator().is_valid(entity)
    }

    /// Every violation of the schema, formatted as `path: message`
    #[must_use]
    pub fn errors(self, entity: &Value) -> Vec<String> {
        match self.validator().validate(entity) {
            Ok(()) => Vec::new(),
            Err(errors) => errors
                .map(|e| format!("{}: {}", e.instance_path, e))
                .collect(),
        }
    }
}
