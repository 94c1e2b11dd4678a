//! # AWS
//!
//! Facade over the AWS services the platform drives.
//!
//! [`AwsSdkService`] exposes one method per SDK call, returning small domain
//! types instead of SDK output shapes. There is no retry at this layer; every
//! SDK rejection is returned as [`AwsError::Sdk`].
//!
//! - [`AwsSdkClient`] - implementation backed by the official SDK crates
//! - [`AwsClientFactory`] - builds facades for the platform identity or for
//!   a provider's operations role
//! - [`audit`] - best-effort audit records in the provider's audit table

pub mod arn;
pub mod audit;
pub mod auth;
mod sdk;

pub use auth::{AwsAuthRequest, AwsAuthResponse};
pub use sdk::{AwsSdkClient, SdkClientFactory};

use async_trait::async_trait;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use zeroize::Zeroizing;

use crate::error::AwsError;

/// Secret read from Secrets Manager
pub struct SecretValue {
    pub arn: Option<String>,
    pub name: Option<String>,
    pub secret_string: Option<Zeroizing<String>>,
}

impl std::fmt::Debug for SecretValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretValue")
            .field("arn", &self.arn)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Identity of a secret after a write
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SecretRef {
    pub arn: Option<String>,
    pub name: Option<String>,
    pub version_id: Option<String>,
}

/// Input of [`AwsSdkService::create_secret`]
#[derive(Clone, Default)]
pub struct CreateSecretRequest {
    pub name: String,
    pub description: String,
    pub tags: Vec<(String, String)>,
    pub secret_string: Option<Zeroizing<String>>,
}

impl std::fmt::Debug for CreateSecretRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CreateSecretRequest")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("tags", &self.tags)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StackDescription {
    pub stack_id: Option<String>,
    pub stack_name: String,
    pub status: Option<String>,
    pub status_reason: Option<String>,
    pub outputs: BTreeMap<String, String>,
    pub tags: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StackEvent {
    pub timestamp: Option<String>,
    pub logical_resource_id: Option<String>,
    pub resource_type: Option<String>,
    pub resource_status: Option<String>,
    pub resource_status_reason: Option<String>,
}

/// CloudFormation stack created or updated from a template in S3
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StackRequest {
    pub component_name: String,
    pub stack_name: String,
    pub s3_bucket: String,
    pub cfn_file_name: String,
    pub provider_name: String,
    pub parameters: Vec<(String, String)>,
}

impl StackRequest {
    #[must_use]
    pub fn template_url(&self) -> String {
        format!("https://{}.s3.amazonaws.com/{}", self.s3_bucket, self.cfn_file_name)
    }

    /// Tag marking the stack as belonging to the component on this provider
    #[must_use]
    pub fn component_tag(&self) -> (String, String) {
        (
            format!("aws-apps:{}-{}", self.component_name, self.provider_name),
            self.component_name.clone(),
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskInfo {
    pub task_arn: Option<String>,
    pub last_status: Option<String>,
    pub desired_status: Option<String>,
    pub task_definition_arn: Option<String>,
    pub started_at: Option<String>,
    pub group: Option<String>,
}

/// Input of [`AwsSdkService::update_ecs_service`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceUpdate {
    pub cluster: String,
    pub service: String,
    pub desired_count: Option<i32>,
    pub force_new_deployment: bool,
    pub task_definition: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceInfo {
    pub service_arn: Option<String>,
    pub status: Option<String>,
    pub desired_count: i32,
    pub running_count: i32,
    pub task_definition: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterInfo {
    pub name: Option<String>,
    pub arn: Option<String>,
    pub endpoint: Option<String>,
    pub status: Option<String>,
    pub version: Option<String>,
    pub role_arn: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LambdaInvocation {
    pub status_code: i32,
    pub function_error: Option<String>,
    pub payload: Option<String>,
    /// Decoded tail of the execution log
    pub log_tail: Option<String>,
}

/// AWS operations used by the platform
#[async_trait]
pub trait AwsSdkService: Send + Sync + std::fmt::Debug {
    fn account_id(&self) -> &str;

    fn region(&self) -> &str;

    // Secrets Manager
    async fn get_secret_value(&self, secret_id: &str) -> Result<SecretValue, AwsError>;
    async fn create_secret(&self, request: &CreateSecretRequest) -> Result<SecretRef, AwsError>;
    async fn put_secret_value(&self, secret_id: &str, value: &str) -> Result<SecretRef, AwsError>;
    /// Deletes without a recovery window
    async fn delete_secret(&self, secret_id: &str) -> Result<(), AwsError>;

    // SSM
    /// `None` when the parameter does not exist
    async fn get_ssm_parameter(&self, name: &str) -> Result<Option<String>, AwsError>;

    // CloudFormation
    async fn describe_stack(&self, stack_name: &str) -> Result<StackDescription, AwsError>;
    async fn describe_stack_events(&self, stack_name: &str) -> Result<Vec<StackEvent>, AwsError>;
    async fn create_stack(&self, request: &StackRequest) -> Result<String, AwsError>;
    async fn update_stack(&self, request: &StackRequest) -> Result<String, AwsError>;
    async fn delete_stack(&self, stack_name: &str) -> Result<(), AwsError>;

    // DynamoDB
    async fn scan_by_app_name(
        &self,
        table_name: &str,
        app_name: &str,
    ) -> Result<Vec<serde_json::Map<String, serde_json::Value>>, AwsError>;
    async fn put_item(
        &self,
        table_name: &str,
        item: &BTreeMap<String, String>,
    ) -> Result<(), AwsError>;

    // ECS
    async fn list_ecs_tasks(&self, cluster: &str, service: &str) -> Result<Vec<String>, AwsError>;
    async fn describe_ecs_tasks(
        &self,
        cluster: &str,
        task_arns: &[String],
    ) -> Result<Vec<TaskInfo>, AwsError>;
    async fn update_ecs_service(&self, update: &ServiceUpdate) -> Result<ServiceInfo, AwsError>;

    // EKS
    async fn describe_eks_cluster(&self, cluster_name: &str) -> Result<ClusterInfo, AwsError>;

    // Lambda
    async fn invoke_lambda(
        &self,
        function_name: &str,
        payload: &str,
    ) -> Result<LambdaInvocation, AwsError>;

    // S3
    /// Creates `{name}-{account}-{region}` and returns that bucket name
    async fn create_s3_bucket(&self, name: &str) -> Result<String, AwsError>;
    async fn does_s3_file_exist(&self, bucket: &str, key: &str) -> Result<bool, AwsError>;
}

/// Facade together with the identity it acts as
#[derive(Debug, Clone)]
pub struct OperationsSession {
    pub client: Arc<dyn AwsSdkService>,
    pub auth: AwsAuthResponse,
}

/// Source of [`AwsSdkService`] facades
#[async_trait]
pub trait AwsClientFactory: Send + Sync + std::fmt::Debug {
    /// Facade using the platform's own credentials in `region`
    async fn platform_client(&self, region: &str) -> Result<Arc<dyn AwsSdkService>, AwsError>;

    /// Facade acting through the operations role of an environment provider
    async fn operations_session(
        &self,
        request: &AwsAuthRequest,
    ) -> Result<OperationsSession, AwsError>;
}

/// `{name}-{account}-{region}`
#[must_use]
pub fn bucket_name(name: &str, account_id: &str, region: &str) -> String {
    format!("{name}-{account_id}-{region}")
}
