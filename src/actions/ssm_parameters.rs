use async_trait::async_trait;
use futures::future::try_join_all;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use tracing::{debug, info};

use super::{schema_of, ActionContext, EnvironmentProvider, TemplateAction};
use crate::error::{ActionError, AwsError};
use crate::platform::{PlatformService, Requester};

const ID: &str = "opa:get-ssm-parameters";

#[derive(Debug, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
struct GetSsmParametersInput {
    /// The SSM parameter keys to look up
    param_keys: Vec<String>,
    /// The AWS environment providers
    env_providers: Vec<EnvironmentProvider>,
}

type ProviderParams = BTreeMap<String, String>;

/// Reads the same SSM parameters from every environment provider
///
/// Each provider is reached through its operations role.
#[derive(Debug, Clone)]
pub struct GetSsmParametersAction {
    platform: PlatformService,
}

impl GetSsmParametersAction {
    #[must_use]
    pub fn new(platform: PlatformService) -> Self {
        Self { platform }
    }

    async fn provider_params(
        &self,
        provider: &EnvironmentProvider,
        keys: &[String],
        user: &Requester,
    ) -> Result<ProviderParams, ActionError> {
        let session = self
            .platform
            .aws()
            .operations_session(&provider.auth_request(user))
            .await?;
        let values = try_join_all(keys.iter().map(|key| {
            let client = &session.client;
            async move {
                let value = client
                    .get_ssm_parameter(key)
                    .await?
                    .ok_or_else(|| AwsError::sdk(
                        "ssm",
                        "GetParameter",
                        format!("SSM Parameter {key} was not found or has no value"),
                    ))?;
                Ok::<_, ActionError>((key.clone(), value))
            }
        }))
        .await?;
        Ok(values.into_iter().collect())
    }
}

/// Same shape as the output with every value replaced
fn masked(params: &BTreeMap<String, ProviderParams>) -> Value {
    let masked: Map<String, Value> = params
        .iter()
        .map(|(provider, values)| {
            let values: Map<String, Value> = values
                .iter()
                .map(|(key, value)| {
                    let shown = if value.is_empty() {
                        "blank or missing value"
                    } else {
                        "masked"
                    };
                    (key.clone(), Value::from(shown))
                })
                .collect();
            (provider.clone(), Value::Object(values))
        })
        .collect();
    Value::Object(masked)
}

#[async_trait]
impl TemplateAction for GetSsmParametersAction {
    fn id(&self) -> &'static str {
        ID
    }

    fn description(&self) -> &'static str {
        "Retrieve AWS SSM parameter values for each environment provider so that their configurations can be used by other template actions"
    }

    fn input_schema(&self) -> Value {
        schema_of::<GetSsmParametersInput>()
    }

    async fn handler(&self, ctx: &mut ActionContext) -> Result<(), ActionError> {
        if ctx.dry_run {
            ctx.output(
                "params",
                json!({"myProviderName": {"/my/ssm/parameter": "some value"}}),
            );
            info!("Dry run complete");
            return Ok(());
        }

        let input: GetSsmParametersInput = ctx.parse_input(ID)?;
        info!("paramKeys: {:?}", input.param_keys);
        let user = ctx.requester();
        if ctx.user.is_none() {
            debug!("No user context provided for {}, using {}", ID, user.user_name);
        }

        let per_provider = try_join_all(input.env_providers.iter().map(|provider| {
            let keys = &input.param_keys;
            let user = &user;
            async move {
                let params = self.provider_params(provider, keys, user).await?;
                Ok::<_, ActionError>((provider.env_provider_name.clone(), params))
            }
        }))
        .await?;
        let params: BTreeMap<String, ProviderParams> = per_provider.into_iter().collect();

        info!("masked params: {}", masked(&params));
        let output = serde_json::to_value(&params)
            .map_err(|e| ActionError::Failed(format!("Failed to serialize params: {e}")))?;
        ctx.output("params", output);
        Ok(())
    }
}
