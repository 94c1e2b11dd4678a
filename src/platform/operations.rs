//! # Provider Operations
//!
//! Direct AWS calls against an environment provider account, made through the
//! provider's operations role on behalf of a portal user.
//!
//! Calls that change something, or read sensitive values, write an audit
//! record afterwards. The audit write is best effort: a failure shows up in
//! [`OperationOutcome::warnings`] and never fails the call itself. A failed
//! SDK call is audited as `FAILED` before the error is returned.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{info, info_span, Instrument};

use super::{run_workflow, PlatformService, Requester};
use crate::aws::audit::{audit_table_parameter, create_audit_record, AuditRecordInput, AuditStatus};
use crate::aws::{
    AwsAuthRequest, ClusterInfo, LambdaInvocation, OperationsSession, ServiceInfo, ServiceUpdate,
    StackDescription, StackEvent, StackRequest, TaskInfo,
};
use crate::error::{AwsError, PlatformError};

/// Provider account an operation runs against
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderTarget {
    pub aws_account: String,
    pub aws_region: String,
    pub prefix: String,
    pub provider_name: String,
}

impl ProviderTarget {
    fn auth_request(&self, requester: &Requester) -> AwsAuthRequest {
        AwsAuthRequest {
            account_id: self.aws_account.clone(),
            region: self.aws_region.clone(),
            prefix: self.prefix.clone(),
            provider_name: self.provider_name.clone(),
            user_name: requester.user_name.clone(),
            ownership_refs: requester.ownership_refs.clone(),
        }
    }
}

/// Result of an operation plus the audit bookkeeping around it
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationOutcome<T> {
    pub result: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audit_record_id: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl<T> OperationOutcome<T> {
    fn unaudited(result: T) -> Self {
        Self {
            result,
            audit_record_id: None,
            warnings: Vec::new(),
        }
    }
}

/// Secret as returned to the portal
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SecretPayload {
    pub arn: Option<String>,
    pub name: Option<String>,
    pub secret_string: Option<String>,
}

/// CloudFormation template to deploy for a component
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StackParams {
    pub component_name: String,
    pub stack_name: String,
    pub s3_bucket_name: String,
    pub cf_file_name: String,
    #[serde(default)]
    pub parameters: Vec<(String, String)>,
}

impl StackParams {
    fn to_request(&self, provider_name: &str) -> StackRequest {
        StackRequest {
            component_name: self.component_name.clone(),
            stack_name: self.stack_name.clone(),
            s3_bucket: self.s3_bucket_name.clone(),
            cfn_file_name: self.cf_file_name.clone(),
            provider_name: provider_name.to_string(),
            parameters: self.parameters.clone(),
        }
    }
}

/// Audit `result` of `action_type`, then hand it back
async fn audited<T>(
    session: &OperationsSession,
    target: &ProviderTarget,
    action_type: &str,
    action_name: &str,
    result: Result<T, AwsError>,
) -> Result<OperationOutcome<T>, PlatformError> {
    let mut audit = AuditRecordInput::for_session(
        &session.auth,
        &target.prefix,
        &target.provider_name,
        action_type,
        action_name,
    );
    if let Err(e) = &result {
        audit.status = AuditStatus::Failed;
        audit.message = Some(e.to_string());
    }
    let written = create_audit_record(session.client.as_ref(), &audit).await;
    let result = result?;
    Ok(match written {
        Ok(id) => OperationOutcome {
            result,
            audit_record_id: Some(id),
            warnings: Vec::new(),
        },
        Err(e) => OperationOutcome {
            result,
            audit_record_id: None,
            warnings: vec![format!("Audit record was not written: {e}")],
        },
    })
}

impl PlatformService {
    async fn open_session(
        &self,
        target: &ProviderTarget,
        requester: &Requester,
    ) -> Result<OperationsSession, PlatformError> {
        let session = self
            .aws()
            .operations_session(&target.auth_request(requester))
            .await?;
        info!(
            "Operations session for {} as {} in {}/{}",
            target.provider_name, session.auth.requester, session.auth.account, session.auth.region
        );
        Ok(session)
    }

    /// First task of an ECS service, `None` when the service runs no task
    pub async fn get_ecs_service_task(
        &self,
        target: &ProviderTarget,
        requester: &Requester,
        cluster: &str,
        service: &str,
    ) -> Result<OperationOutcome<Option<TaskInfo>>, PlatformError> {
        let span = info_span!("operations.ecs_service_task", provider = %target.provider_name, cluster, service);
        run_workflow("ecs_service_task", async {
            let session = self.open_session(target, requester).await?;
            let arns = session.client.list_ecs_tasks(cluster, service).await;
            let mut outcome = audited(
                &session,
                target,
                "List ECS Tasks",
                &format!("{cluster}#{service}"),
                arns,
            )
            .await?;
            if outcome.result.is_empty() {
                return Ok(OperationOutcome {
                    result: None,
                    audit_record_id: outcome.audit_record_id,
                    warnings: outcome.warnings,
                });
            }
            let tasks = session
                .client
                .describe_ecs_tasks(cluster, &std::mem::take(&mut outcome.result))
                .await?;
            Ok(OperationOutcome {
                result: tasks.into_iter().next(),
                audit_record_id: outcome.audit_record_id,
                warnings: outcome.warnings,
            })
        }
        .instrument(span))
        .await
    }

    pub async fn update_ecs_service(
        &self,
        target: &ProviderTarget,
        requester: &Requester,
        update: &ServiceUpdate,
    ) -> Result<OperationOutcome<ServiceInfo>, PlatformError> {
        let span = info_span!("operations.update_ecs_service", provider = %target.provider_name, cluster = %update.cluster, service = %update.service);
        run_workflow("update_ecs_service", async {
            let session = self.open_session(target, requester).await?;
            let result = session.client.update_ecs_service(update).await;
            audited(
                &session,
                target,
                "Update ECS Service",
                &format!("{}#{}", update.cluster, update.service),
                result,
            )
            .await
        }
        .instrument(span))
        .await
    }

    pub async fn get_provider_secret(
        &self,
        target: &ProviderTarget,
        requester: &Requester,
        secret_arn: &str,
    ) -> Result<OperationOutcome<SecretPayload>, PlatformError> {
        let span = info_span!("operations.get_secret", provider = %target.provider_name);
        run_workflow("get_secret", async {
            let session = self.open_session(target, requester).await?;
            let result = session
                .client
                .get_secret_value(secret_arn)
                .await
                .map(|secret| SecretPayload {
                    arn: secret.arn,
                    name: secret.name,
                    secret_string: secret.secret_string.map(|s| s.as_str().to_string()),
                });
            audited(&session, target, "Get Secret", secret_arn, result).await
        }
        .instrument(span))
        .await
    }

    pub async fn get_provider_parameter(
        &self,
        target: &ProviderTarget,
        requester: &Requester,
        name: &str,
    ) -> Result<OperationOutcome<Option<String>>, PlatformError> {
        let span = info_span!("operations.get_parameter", provider = %target.provider_name, parameter = name);
        run_workflow("get_parameter", async {
            let session = self.open_session(target, requester).await?;
            let result = session.client.get_ssm_parameter(name).await;
            audited(&session, target, "Fetch SSM Param", name, result).await
        }
        .instrument(span))
        .await
    }

    pub async fn describe_provider_stack(
        &self,
        target: &ProviderTarget,
        requester: &Requester,
        stack_name: &str,
    ) -> Result<OperationOutcome<StackDescription>, PlatformError> {
        let session = self.open_session(target, requester).await?;
        Ok(OperationOutcome::unaudited(
            session.client.describe_stack(stack_name).await?,
        ))
    }

    pub async fn describe_provider_stack_events(
        &self,
        target: &ProviderTarget,
        requester: &Requester,
        stack_name: &str,
    ) -> Result<OperationOutcome<Vec<StackEvent>>, PlatformError> {
        let session = self.open_session(target, requester).await?;
        Ok(OperationOutcome::unaudited(
            session.client.describe_stack_events(stack_name).await?,
        ))
    }

    /// Returns the stack id
    pub async fn create_provider_stack(
        &self,
        target: &ProviderTarget,
        requester: &Requester,
        params: &StackParams,
    ) -> Result<OperationOutcome<String>, PlatformError> {
        let span = info_span!("operations.create_stack", provider = %target.provider_name, stack = %params.stack_name);
        run_workflow("create_stack", async {
            let session = self.open_session(target, requester).await?;
            let result = session
                .client
                .create_stack(&params.to_request(&target.provider_name))
                .await;
            audited(&session, target, "Create Stack", &params.component_name, result).await
        }
        .instrument(span))
        .await
    }

    /// Returns the stack id
    pub async fn update_provider_stack(
        &self,
        target: &ProviderTarget,
        requester: &Requester,
        params: &StackParams,
    ) -> Result<OperationOutcome<String>, PlatformError> {
        let span = info_span!("operations.update_stack", provider = %target.provider_name, stack = %params.stack_name);
        run_workflow("update_stack", async {
            let session = self.open_session(target, requester).await?;
            let result = session
                .client
                .update_stack(&params.to_request(&target.provider_name))
                .await;
            audited(&session, target, "Update Stack", &params.component_name, result).await
        }
        .instrument(span))
        .await
    }

    pub async fn delete_provider_component_stack(
        &self,
        target: &ProviderTarget,
        requester: &Requester,
        component_name: &str,
        stack_name: &str,
    ) -> Result<OperationOutcome<()>, PlatformError> {
        let span = info_span!("operations.delete_stack", provider = %target.provider_name, stack = stack_name);
        run_workflow("delete_stack", async {
            let session = self.open_session(target, requester).await?;
            let result = session.client.delete_stack(stack_name).await;
            audited(&session, target, "Delete Stack", component_name, result).await
        }
        .instrument(span))
        .await
    }

    /// Audit records written for `app_name` in the provider's audit table
    pub async fn query_audit_records(
        &self,
        target: &ProviderTarget,
        requester: &Requester,
        app_name: &str,
    ) -> Result<OperationOutcome<Vec<Map<String, Value>>>, PlatformError> {
        let span = info_span!("operations.query_audit", provider = %target.provider_name, app = app_name);
        run_workflow("query_audit", async {
            let session = self.open_session(target, requester).await?;
            let parameter = audit_table_parameter(&target.prefix, &target.provider_name);
            let table = session
                .client
                .get_ssm_parameter(&parameter)
                .await?
                .ok_or_else(|| {
                    PlatformError::InvalidInput(format!("Can't fetch audit table name from {parameter}"))
                })?;
            let result = session.client.scan_by_app_name(&table, app_name).await;
            audited(&session, target, "Get Audit Table", app_name, result).await
        }
        .instrument(span))
        .await
    }

    pub async fn describe_provider_cluster(
        &self,
        target: &ProviderTarget,
        requester: &Requester,
        cluster_name: &str,
    ) -> Result<OperationOutcome<ClusterInfo>, PlatformError> {
        let session = self.open_session(target, requester).await?;
        Ok(OperationOutcome::unaudited(
            session.client.describe_eks_cluster(cluster_name).await?,
        ))
    }

    pub async fn invoke_provider_lambda(
        &self,
        target: &ProviderTarget,
        requester: &Requester,
        function_name: &str,
        payload: &str,
    ) -> Result<OperationOutcome<LambdaInvocation>, PlatformError> {
        let span = info_span!("operations.invoke_lambda", provider = %target.provider_name, function = function_name);
        run_workflow("invoke_lambda", async {
            let session = self.open_session(target, requester).await?;
            let result = session.client.invoke_lambda(function_name, payload).await;
            audited(&session, target, "Invoke Lambda", function_name, result).await
        }
        .instrument(span))
        .await
    }

    /// Returns the bucket name actually created
    pub async fn create_provider_bucket(
        &self,
        target: &ProviderTarget,
        requester: &Requester,
        name: &str,
    ) -> Result<OperationOutcome<String>, PlatformError> {
        let span = info_span!("operations.create_bucket", provider = %target.provider_name, bucket = name);
        run_workflow("create_bucket", async {
            let session = self.open_session(target, requester).await?;
            let result = session.client.create_s3_bucket(name).await;
            audited(&session, target, "Create S3 Bucket", name, result).await
        }
        .instrument(span))
        .await
    }

    pub async fn does_provider_file_exist(
        &self,
        target: &ProviderTarget,
        requester: &Requester,
        bucket: &str,
        key: &str,
    ) -> Result<OperationOutcome<bool>, PlatformError> {
        let session = self.open_session(target, requester).await?;
        Ok(OperationOutcome::unaudited(
            session.client.does_s3_file_exist(bucket, key).await?,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_builds_auth_request() {
        let target = ProviderTarget {
            aws_account: "123456789012".to_string(),
            aws_region: "us-east-1".to_string(),
            prefix: "opa".to_string(),
            provider_name: "dev-ecs".to_string(),
        };
        let requester = Requester {
            user_name: "jane".to_string(),
            ownership_refs: vec!["group:default/platform".to_string()],
        };
        let request = target.auth_request(&requester);
        assert_eq!(request.provider_name, "dev-ecs");
        assert_eq!(request.user_name, "jane");
        assert_eq!(request.owner().as_deref(), Some("platform"));
    }

    #[test]
    fn test_outcome_omits_empty_bookkeeping() {
        let json = serde_json::to_value(OperationOutcome::unaudited(true)).unwrap();
        assert_eq!(json, serde_json::json!({ "result": true }));
    }
}
