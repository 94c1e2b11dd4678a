use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::info;

use super::{schema_of, ActionContext, TemplateAction};
use crate::aws::CreateSecretRequest;
use crate::constants::{DEFAULT_SECRET_DESCRIPTION, DRY_RUN_SECRET_ARN};
use crate::error::{ActionError, AwsError};
use crate::platform::PlatformService;

const ID: &str = "opa:create-secret";

#[derive(Debug, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
struct CreateSecretInput {
    /// Name of the secret to create
    secret_name: String,
    description: Option<String>,
    /// Defaults to the platform region
    region: Option<String>,
    #[serde(default)]
    tags: Vec<SecretTag>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
struct SecretTag {
    #[serde(rename = "Key")]
    key: String,
    #[serde(rename = "Value")]
    value: TagValue,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
#[serde(untagged)]
enum TagValue {
    Text(String),
    Number(f64),
    Flag(bool),
}

impl std::fmt::Display for TagValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TagValue::Text(s) => f.write_str(s),
            TagValue::Number(n) => write!(f, "{n}"),
            TagValue::Flag(b) => write!(f, "{b}"),
        }
    }
}

#[derive(Debug, schemars::JsonSchema)]
#[allow(dead_code, reason = "schema only")]
#[serde(rename_all = "camelCase")]
struct CreateSecretOutput {
    aws_secret_arn: String,
}

/// Creates an empty Secrets Manager secret
#[derive(Debug, Clone)]
pub struct CreateSecretAction {
    platform: PlatformService,
}

impl CreateSecretAction {
    #[must_use]
    pub fn new(platform: PlatformService) -> Self {
        Self { platform }
    }
}

#[async_trait]
impl TemplateAction for CreateSecretAction {
    fn id(&self) -> &'static str {
        ID
    }

    fn description(&self) -> &'static str {
        "Creates secret in Secret Manager"
    }

    fn input_schema(&self) -> Value {
        schema_of::<CreateSecretInput>()
    }

    fn output_schema(&self) -> Option<Value> {
        Some(schema_of::<CreateSecretOutput>())
    }

    async fn handler(&self, ctx: &mut ActionContext) -> Result<(), ActionError> {
        let input: CreateSecretInput = ctx.parse_input(ID)?;

        if ctx.dry_run {
            ctx.output("awsSecretArn", DRY_RUN_SECRET_ARN);
            info!("Dry run complete");
            return Ok(());
        }

        let region = input
            .region
            .as_deref()
            .unwrap_or_else(|| self.platform.platform_region());
        let client = self.platform.aws().platform_client(region).await?;
        let request = CreateSecretRequest {
            name: input.secret_name.clone(),
            description: input
                .description
                .unwrap_or_else(|| DEFAULT_SECRET_DESCRIPTION.to_string()),
            tags: input
                .tags
                .iter()
                .map(|t| (t.key.clone(), t.value.to_string()))
                .collect(),
            secret_string: None,
        };
        let secret = client.create_secret(&request).await?;
        let arn = secret.arn.ok_or(AwsError::MissingField {
            service: "secretsmanager",
            operation: "CreateSecret",
            field: "ARN",
        })?;
        info!("Created secret {} in {}", input.secret_name, region);
        ctx.output("awsSecretArn", arn);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_tag_values_render_as_text() {
        let input: CreateSecretInput = serde_json::from_value(json!({
            "secretName": "orders-db",
            "tags": [
                {"Key": "team", "Value": "payments"},
                {"Key": "tier", "Value": 3},
                {"Key": "pci", "Value": true}
            ]
        }))
        .unwrap();
        let rendered: Vec<String> = input.tags.iter().map(|t| t.value.to_string()).collect();
        assert_eq!(rendered, vec!["payments", "3", "true"]);
    }
}
