use async_trait::async_trait;
use futures::future::try_join_all;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use tracing::info;

use super::{schema_of, ActionContext, TemplateAction};
use crate::error::{ActionError, AwsError};
use crate::platform::PlatformService;

const ID: &str = "opa:get-platform-parameters";

#[derive(Debug, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
struct GetPlatformParametersInput {
    /// The SSM parameter keys to look up
    param_keys: Vec<String>,
    /// Region of the parameters, defaults to the platform region
    region: Option<String>,
}

/// Reads SSM parameters from the platform account
#[derive(Debug, Clone)]
pub struct GetPlatformParametersAction {
    platform: PlatformService,
}

impl GetPlatformParametersAction {
    #[must_use]
    pub fn new(platform: PlatformService) -> Self {
        Self { platform }
    }
}

#[async_trait]
impl TemplateAction for GetPlatformParametersAction {
    fn id(&self) -> &'static str {
        ID
    }

    fn description(&self) -> &'static str {
        "Retrieve AWS SSM parameter values for platform configurations can be used by other template actions"
    }

    fn input_schema(&self) -> Value {
        schema_of::<GetPlatformParametersInput>()
    }

    async fn handler(&self, ctx: &mut ActionContext) -> Result<(), ActionError> {
        if ctx.dry_run {
            ctx.output(
                "params",
                json!({
                    "/opa/platform-role": "arn:aws:sts::012345678912:role/platformrole",
                    "/opa/pipeline-role": "arn:aws:sts::012345678912:role/pipelinerole",
                }),
            );
            info!("Dry run complete");
            return Ok(());
        }

        let input: GetPlatformParametersInput = ctx.parse_input(ID)?;
        let region = input
            .region
            .as_deref()
            .unwrap_or_else(|| self.platform.platform_region());
        info!("paramKeys: {:?}", input.param_keys);
        info!("Region: {}", region);

        let client = self.platform.aws().platform_client(region).await?;
        let values = try_join_all(input.param_keys.iter().map(|key| {
            let client = &client;
            async move {
                let value = client.get_ssm_parameter(key).await?.ok_or_else(|| {
                    AwsError::sdk(
                        "ssm",
                        "GetParameter",
                        format!("SSM Parameter {key} was not found or has no value"),
                    )
                })?;
                Ok::<_, ActionError>((key.clone(), value))
            }
        }))
        .await?;
        let params: BTreeMap<String, String> = values.into_iter().collect();

        ctx.output("params", json!(params));
        Ok(())
    }
}
