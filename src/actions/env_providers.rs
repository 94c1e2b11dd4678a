use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info};

use super::{schema_of, ActionContext, EnvironmentProvider, TemplateAction};
use crate::aws::AwsSdkService;
use crate::catalog::Entity;
use crate::constants::AWS_ENVIRONMENT_PROVIDER_KIND;
use crate::error::{ActionError, AwsError, CatalogError};
use crate::platform::{PlatformService, Requester};

const ID: &str = "opa:get-env-providers";

#[derive(Debug, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
struct GetEnvProvidersInput {
    /// The entity reference identifier for an AWSEnvironment
    environment_ref: String,
}

/// Where the provisioning pipeline left a provider's settings
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct DeploymentParameters {
    env_provider_name: String,
    env_provider_type: String,
    env_provider_prefix: String,
    account_id: String,
    region: String,
    ssm_assume_role_arn: String,
    ssm_path_vpc: String,
    ssm_public_subnets: String,
    ssm_private_subnets: String,
    ssm_path_cluster: String,
    kubectl_lambda_arn: Option<String>,
    kubectl_lambda_role_arn: Option<String>,
}

impl DeploymentParameters {
    fn has_cluster(&self) -> bool {
        matches!(self.env_provider_type.as_str(), "ecs" | "eks")
    }

    fn from_entity(entity: &Entity) -> Self {
        let text = |key: &str| entity.metadata_text(key).unwrap_or_default();
        let vpc = text("vpc");
        Self {
            env_provider_name: entity.metadata.name.clone(),
            env_provider_type: text("envType").to_lowercase(),
            env_provider_prefix: text("prefix"),
            account_id: text("awsAccount"),
            region: text("awsRegion"),
            ssm_assume_role_arn: text("provisioningRole"),
            ssm_private_subnets: format!("{vpc}/private-subnets"),
            ssm_public_subnets: format!("{vpc}/public-subnets"),
            ssm_path_vpc: vpc,
            ssm_path_cluster: text("clusterName"),
            kubectl_lambda_arn: entity.metadata_text("kubectlLambdaArn").filter(|s| !s.is_empty()),
            kubectl_lambda_role_arn: entity
                .metadata_text("kubectlLambdaRoleArn")
                .filter(|s| !s.is_empty()),
        }
    }

    fn check(&self) -> Result<(), ActionError> {
        let missing = |field: &str| {
            ActionError::Failed(format!(
                "{field} not configured for environment provider: {}. The provider IaC deployment may have failed.",
                self.env_provider_name
            ))
        };
        if self.account_id.is_empty() {
            return Err(missing("accountId"));
        }
        if self.region.is_empty() {
            return Err(missing("region"));
        }
        if self.ssm_assume_role_arn.is_empty() {
            return Err(missing("ssmAssumeRoleArn"));
        }
        if self.ssm_path_vpc.is_empty() {
            if self.has_cluster() {
                return Err(missing("ssmPathVpc"));
            }
            info!("No VPC configured for the environment provider");
        }
        Ok(())
    }
}

/// Provider entities the environment depends on
fn provider_refs(environment: &Entity) -> Vec<String> {
    let kind = AWS_ENVIRONMENT_PROVIDER_KIND.to_lowercase();
    environment
        .relation_targets("dependsOn")
        .filter(|target| target.to_lowercase().starts_with(&kind))
        .map(str::to_string)
        .collect()
}

/// Providers carrying every field a deployment needs
fn is_deployable(entity: &Entity) -> bool {
    ["envType", "awsAccount", "awsRegion", "vpc"]
        .iter()
        .all(|key| entity.metadata.extra.contains_key(*key))
}

async fn required_parameter(
    client: &dyn AwsSdkService,
    name: &str,
) -> Result<String, AwsError> {
    client.get_ssm_parameter(name).await?.ok_or_else(|| {
        AwsError::sdk(
            "ssm",
            "GetParameter",
            format!("SSM Parameter {name} was not found or has no value"),
        )
    })
}

fn dry_run_provider() -> EnvironmentProvider {
    EnvironmentProvider {
        env_provider_name: "envProviderName".to_string(),
        env_provider_type: "eks".to_string(),
        env_provider_prefix: "pre".to_string(),
        account_id: "123456789123".to_string(),
        region: "us-east-1".to_string(),
        vpc_id: "vpc-123123123abc".to_string(),
        public_subnets: "subnet-123,subnet-456,subnet-789".to_string(),
        private_subnets: "subnet-023,subnet-056,subnet-089".to_string(),
        assumed_role_arn: "arn:aws:iam::123456789123:role/some-role".to_string(),
        cluster_arn: Some("arn:aws:eks:us-east-1:123456789123:cluster/my-cluster".to_string()),
        kubectl_lambda_arn: Some(
            "arn:aws:lambda:us-east-1:123456789123:function:my-function".to_string(),
        ),
        kubectl_lambda_role_arn: Some("arn:aws:iam::123456789123:role/kubectl-role".to_string()),
    }
}

/// Resolves the deployment settings of every provider of an environment
#[derive(Debug, Clone)]
pub struct GetEnvProvidersAction {
    platform: PlatformService,
}

impl GetEnvProvidersAction {
    #[must_use]
    pub fn new(platform: PlatformService) -> Self {
        Self { platform }
    }

    async fn resolve(
        &self,
        params: &DeploymentParameters,
        user: &Requester,
    ) -> Result<EnvironmentProvider, ActionError> {
        params.check()?;
        info!(
            "Getting credentials for AWS deployment to account {} in {}",
            params.account_id, params.region
        );
        let mut provider = EnvironmentProvider {
            env_provider_name: params.env_provider_name.clone(),
            env_provider_type: params.env_provider_type.clone(),
            env_provider_prefix: params.env_provider_prefix.clone(),
            account_id: params.account_id.clone(),
            region: params.region.clone(),
            kubectl_lambda_arn: params.kubectl_lambda_arn.clone(),
            kubectl_lambda_role_arn: params.kubectl_lambda_role_arn.clone(),
            ..Default::default()
        };
        let session = self
            .platform
            .aws()
            .operations_session(&provider.auth_request(user))
            .await?;
        let client = session.client.as_ref();

        let lookups = async {
            if !params.ssm_path_vpc.is_empty() {
                provider.vpc_id = required_parameter(client, &params.ssm_path_vpc).await?;
                provider.public_subnets =
                    required_parameter(client, &params.ssm_public_subnets).await?;
                provider.private_subnets =
                    required_parameter(client, &params.ssm_private_subnets).await?;
            }
            if params.has_cluster() {
                provider.cluster_arn =
                    Some(required_parameter(client, &params.ssm_path_cluster).await?);
            }
            provider.assumed_role_arn =
                required_parameter(client, &params.ssm_assume_role_arn).await?;
            Ok::<_, AwsError>(())
        };
        lookups.await.map_err(|e| {
            ActionError::Failed(format!(
                "Failed to populate environment provider {}. {}",
                params.env_provider_name, e
            ))
        })?;
        Ok(provider)
    }
}

#[async_trait]
impl TemplateAction for GetEnvProvidersAction {
    fn id(&self) -> &'static str {
        ID
    }

    fn description(&self) -> &'static str {
        "Retrieves AWS Environment Providers from an AWS Environment entity"
    }

    fn input_schema(&self) -> Value {
        schema_of::<GetEnvProvidersInput>()
    }

    async fn handler(&self, ctx: &mut ActionContext) -> Result<(), ActionError> {
        let input: GetEnvProvidersInput = ctx.parse_input(ID)?;

        if ctx.dry_run {
            ctx.output("envName", "envName");
            ctx.output("envRef", input.environment_ref);
            ctx.output("envDeployManualApproval", false);
            ctx.output("envShortName", "envShortName");
            ctx.output("envProviders", serde_json::json!([dry_run_provider()]));
            info!("Dry run complete");
            return Ok(());
        }

        let user = ctx.requester();
        if ctx.user.is_none() {
            debug!("No user context provided for {}, using {}", ID, user.user_name);
        }

        let catalog = self.platform.catalog();
        let environment = catalog
            .get_entity_by_ref(&input.environment_ref)
            .await?
            .ok_or_else(|| CatalogError::NotFound(input.environment_ref.clone()))?;

        ctx.output("envName", environment.metadata.name.clone());
        ctx.output("envRef", input.environment_ref.clone());
        ctx.output(
            "envDeployManualApproval",
            environment.metadata_text("deploymentRequiresApproval").as_deref() == Some("true"),
        );
        ctx.output(
            "envShortName",
            environment.metadata_text("shortName").unwrap_or_default(),
        );

        let refs = provider_refs(&environment);
        let deployment_parameters: Vec<DeploymentParameters> = catalog
            .get_entities_by_refs(&refs)
            .await?
            .iter()
            .flatten()
            .filter(|entity| is_deployable(entity))
            .map(DeploymentParameters::from_entity)
            .collect();
        debug!("envProviders info: {:?}", deployment_parameters);

        let mut providers = Vec::with_capacity(deployment_parameters.len());
        for params in &deployment_parameters {
            providers.push(self.resolve(params, &user).await?);
        }
        info!("Resolved {} environment providers", providers.len());

        let output = serde_json::to_value(&providers)
            .map_err(|e| ActionError::Failed(format!("Failed to serialize providers: {e}")))?;
        ctx.output("envProviders", output);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider_entity(yaml: &str) -> Entity {
        Entity::from_yaml(yaml).unwrap()
    }

    #[test]
    fn test_deployment_parameters_from_entity() {
        let entity = provider_entity(
            r"
apiVersion: aws.backstage.io/v1alpha
kind: AWSEnvironmentProvider
metadata:
  name: dev-ecs
  prefix: opa
  envType: ECS
  awsAccount: 123456789012
  awsRegion: us-east-1
  vpc: /opa/dev-ecs/vpc
  provisioningRole: /opa/dev-ecs/provisioning-role-arn
  clusterName: /opa/dev-ecs/cluster-arn
spec: {}
",
        );
        assert!(is_deployable(&entity));
        let params = DeploymentParameters::from_entity(&entity);
        assert_eq!(params.env_provider_type, "ecs");
        assert_eq!(params.account_id, "123456789012");
        assert_eq!(params.ssm_public_subnets, "/opa/dev-ecs/vpc/public-subnets");
        assert!(params.has_cluster());
        assert!(params.kubectl_lambda_arn.is_none());
        assert!(params.check().is_ok());
    }

    #[test]
    fn test_missing_vpc_only_fails_for_cluster_providers() {
        let mut params = DeploymentParameters {
            env_provider_name: "serverless".to_string(),
            env_provider_type: "serverless".to_string(),
            account_id: "123456789012".to_string(),
            region: "us-east-1".to_string(),
            ssm_assume_role_arn: "/role".to_string(),
            ..Default::default()
        };
        assert!(params.check().is_ok());

        params.env_provider_type = "eks".to_string();
        let err = params.check().unwrap_err().to_string();
        assert!(err.starts_with("ssmPathVpc not configured"), "{err}");
    }

    #[test]
    fn test_missing_account_is_named() {
        let params = DeploymentParameters {
            env_provider_name: "dev".to_string(),
            ..Default::default()
        };
        assert_eq!(
            params.check().unwrap_err().to_string(),
            "accountId not configured for environment provider: dev. The provider IaC deployment may have failed."
        );
    }

    #[test]
    fn test_provider_refs_filters_kind() {
        let mut environment = provider_entity(
            "apiVersion: aws.backstage.io/v1alpha\nkind: AWSEnvironment\nmetadata:\n  name: dev\nspec: {}\n",
        );
        environment.relations = vec![
            crate::catalog::StoredRelation {
                relation_type: "dependsOn".to_string(),
                target_ref: "awsenvironmentprovider:default/dev-ecs".to_string(),
            },
            crate::catalog::StoredRelation {
                relation_type: "dependsOn".to_string(),
                target_ref: "component:default/db".to_string(),
            },
            crate::catalog::StoredRelation {
                relation_type: "ownedBy".to_string(),
                target_ref: "awsenvironmentprovider:default/other".to_string(),
            },
        ];
        assert_eq!(
            provider_refs(&environment),
            vec!["awsenvironmentprovider:default/dev-ecs".to_string()]
        );
    }
}
