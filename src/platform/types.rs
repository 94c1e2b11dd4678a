use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::constants::AWS_ENVIRONMENT_PROVIDER_KIND;
use crate::error::PlatformError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum WorkflowState {
    Success,
    Failure,
}

/// Outcome reported back to the portal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowStatus {
    pub status: WorkflowState,
    pub message: String,
    /// Entity refs the UI should refresh once the commit lands
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub refresh_entities: Vec<String>,
    /// Non-fatal problems, such as a failed audit write
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl WorkflowStatus {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            status: WorkflowState::Success,
            message: message.into(),
            refresh_entities: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            status: WorkflowState::Failure,
            message: message.into(),
            refresh_entities: Vec::new(),
            warnings: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_refresh(mut self, refs: Vec<String>) -> Self {
        self.refresh_entities = refs;
        self
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status == WorkflowState::Success
    }
}

/// Deployment target of one environment provider
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AwsProviderParams {
    pub aws_account: String,
    pub aws_region: String,
    #[serde(default)]
    pub assumed_role_arn: String,
    pub environment_name: String,
    #[serde(default)]
    pub env_requires_manual_approval: bool,
    pub prefix: String,
    pub provider_name: String,
    /// Extra `KEY=value` lines for the provider's properties file
    #[serde(default)]
    pub parameters: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppPromoParams {
    pub env_name: String,
    #[serde(default)]
    pub env_requires_manual_approval: bool,
    pub app_name: String,
    pub providers: Vec<AwsProviderParams>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourcePolicy {
    pub policy_file_name: String,
    pub policy_content: String,
    #[serde(default)]
    pub policy_resource: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BindResourceParams {
    pub env_name: String,
    pub provider_name: String,
    pub resource_name: String,
    pub resource_entity_ref: String,
    pub policies: Vec<ResourcePolicy>,
    #[serde(default)]
    pub app_name: String,
}

/// Environment provider as listed on an environment page
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentProviderRecord {
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub prefix: String,
    #[serde(default)]
    pub provider_type: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub account_number: String,
    #[serde(default)]
    pub region: String,
}

impl EnvironmentProviderRecord {
    /// `awsenvironmentprovider:default/{name}` with the name lower-cased
    #[must_use]
    pub fn entity_ref(&self) -> String {
        format!(
            "{}:default/{}",
            AWS_ENVIRONMENT_PROVIDER_KIND.to_lowercase(),
            self.name.to_lowercase()
        )
    }
}

/// Attach or detach a provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderAction {
    Add,
    Remove,
}

/// Infrastructure-as-code tool that provisioned a provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IacType {
    CloudFormation,
    Cdk,
    Terraform,
}

impl IacType {
    /// CDK apps deploy as CloudFormation stacks
    #[must_use]
    pub fn uses_stacks(self) -> bool {
        matches!(self, IacType::CloudFormation | IacType::Cdk)
    }
}

impl FromStr for IacType {
    type Err = PlatformError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cloudformation" => Ok(IacType::CloudFormation),
            "cdk" => Ok(IacType::Cdk),
            "terraform" => Ok(IacType::Terraform),
            other => Err(PlatformError::InvalidInput(format!(
                "Can't delete unknown IaC type '{other}'"
            ))),
        }
    }
}

/// Steps of provider deletion, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DeleteStep {
    Infrastructure,
    Repository,
    CatalogLocation,
    CatalogEntity,
}

impl fmt::Display for DeleteStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DeleteStep::Infrastructure => "destroy infrastructure",
            DeleteStep::Repository => "delete repository",
            DeleteStep::CatalogLocation => "remove catalog location",
            DeleteStep::CatalogEntity => "remove catalog entity",
        })
    }
}

/// Portal user on whose behalf a workflow runs
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Requester {
    pub user_name: String,
    /// Ownership entity refs of the user (`group:default/team`)
    #[serde(default)]
    pub ownership_refs: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_record_ref_is_lower_cased() {
        let record = EnvironmentProviderRecord {
            name: "Dev-ECS".to_string(),
            ..Default::default()
        };
        assert_eq!(record.entity_ref(), "awsenvironmentprovider:default/dev-ecs");
    }

    #[test]
    fn test_iac_type_parsing() {
        assert_eq!("cdk".parse::<IacType>().unwrap(), IacType::Cdk);
        assert!("terraform".parse::<IacType>().unwrap() == IacType::Terraform);
        assert!(!IacType::Terraform.uses_stacks());
        assert!("pulumi".parse::<IacType>().is_err());
    }

    #[test]
    fn test_promo_params_deserialize_from_camel_case() {
        let params: AppPromoParams = serde_json::from_value(serde_json::json!({
            "envName": "dev",
            "envRequiresManualApproval": true,
            "appName": "orders",
            "providers": [{
                "awsAccount": "123456789012",
                "awsRegion": "us-east-1",
                "environmentName": "dev",
                "prefix": "opa",
                "providerName": "ecs",
                "parameters": { "CLUSTER": "c1" }
            }]
        }))
        .unwrap();
        assert_eq!(params.providers[0].parameters["CLUSTER"], "c1");
        assert!(params.env_requires_manual_approval);
    }

    #[test]
    fn test_workflow_status_serializes_uppercase_state() {
        let status = WorkflowStatus::success("ok");
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["status"], "SUCCESS");
        assert!(json.get("refreshEntities").is_none());
    }
}
