//! [`AwsSdkService`] backed by the official `aws-sdk-*` crates.

use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region, SdkConfig};
use aws_sdk_cloudformation::types::{Capability, Parameter, Tag as StackTag};
use aws_sdk_dynamodb::types::AttributeValue;
use aws_sdk_lambda::primitives::Blob;
use aws_sdk_lambda::types::{InvocationType, LogType};
use aws_sdk_s3::types::{BucketLocationConstraint, CreateBucketConfiguration};
use aws_sdk_secretsmanager::error::DisplayErrorContext;
use aws_sdk_secretsmanager::types::{ReplicaRegionType, Tag as SecretTag};
use base64::Engine;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, info_span, warn, Instrument};

use super::auth::{assume_operations_role, AwsAuthRequest};
use super::{
    bucket_name, AwsClientFactory, AwsSdkService, ClusterInfo, CreateSecretRequest,
    LambdaInvocation, OperationsSession, SecretRef, SecretValue, ServiceInfo, ServiceUpdate,
    StackDescription, StackEvent, StackRequest, TaskInfo,
};
use crate::constants::SECRET_REPLICA_REGION;
use crate::error::AwsError;
use crate::observability::metrics;

/// Map any SDK error to [`AwsError::Sdk`] with the full error chain
fn sdk_error<E: std::error::Error>(
    service: &'static str,
    operation: &'static str,
) -> impl FnOnce(E) -> AwsError {
    move |e| AwsError::sdk(service, operation, DisplayErrorContext(&e).to_string())
}

async fn observe<T, F>(service: &'static str, operation: &'static str, fut: F) -> Result<T, AwsError>
where
    F: Future<Output = Result<T, AwsError>>,
{
    let start = Instant::now();
    let result = fut.await;
    match &result {
        Ok(_) => metrics::record_aws_operation(service, operation, start.elapsed().as_secs_f64()),
        Err(e) => {
            metrics::increment_aws_operation_errors(service, operation);
            warn!("{}", e);
        }
    }
    result
}

/// SDK models disagree on which output members are required; this accepts both shapes.
trait OptionalMember<'a, T: ?Sized> {
    fn member(self) -> Option<&'a T>;
}

impl<'a, T: ?Sized> OptionalMember<'a, T> for &'a T {
    fn member(self) -> Option<&'a T> {
        Some(self)
    }
}

impl<'a, T: ?Sized> OptionalMember<'a, T> for Option<&'a T> {
    fn member(self) -> Option<&'a T> {
        self
    }
}

fn owned<'a>(value: impl OptionalMember<'a, str>) -> Option<String> {
    value.member().map(str::to_string)
}

/// DynamoDB attribute to plain JSON
fn attribute_to_json(value: &AttributeValue) -> Value {
    match value {
        AttributeValue::S(s) => Value::String(s.clone()),
        AttributeValue::N(n) => n
            .parse::<i64>()
            .map(Value::from)
            .or_else(|_| n.parse::<f64>().map(Value::from))
            .unwrap_or_else(|_| Value::String(n.clone())),
        AttributeValue::Bool(b) => Value::Bool(*b),
        AttributeValue::Null(_) => Value::Null,
        AttributeValue::M(m) => Value::Object(item_to_json(m)),
        AttributeValue::L(l) => Value::Array(l.iter().map(attribute_to_json).collect()),
        AttributeValue::Ss(ss) => Value::from(ss.clone()),
        AttributeValue::Ns(ns) => Value::from(ns.clone()),
        AttributeValue::B(b) => {
            Value::String(base64::engine::general_purpose::STANDARD.encode(b.as_ref()))
        }
        _ => Value::Null,
    }
}

fn item_to_json(item: &HashMap<String, AttributeValue>) -> Map<String, Value> {
    item.iter()
        .map(|(k, v)| (k.clone(), attribute_to_json(v)))
        .collect()
}

/// All SDK clients for one account and region
#[derive(Clone)]
pub struct AwsSdkClient {
    account_id: String,
    region: String,
    secrets: aws_sdk_secretsmanager::Client,
    ssm: aws_sdk_ssm::Client,
    cloudformation: aws_sdk_cloudformation::Client,
    dynamodb: aws_sdk_dynamodb::Client,
    ecs: aws_sdk_ecs::Client,
    eks: aws_sdk_eks::Client,
    lambda: aws_sdk_lambda::Client,
    s3: aws_sdk_s3::Client,
}

impl std::fmt::Debug for AwsSdkClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AwsSdkClient")
            .field("account_id", &self.account_id)
            .field("region", &self.region)
            .finish_non_exhaustive()
    }
}

impl AwsSdkClient {
    #[must_use]
    pub fn from_conf(conf: &SdkConfig, account_id: &str, region: &str) -> Self {
        Self {
            account_id: account_id.to_string(),
            region: region.to_string(),
            secrets: aws_sdk_secretsmanager::Client::new(conf),
            ssm: aws_sdk_ssm::Client::new(conf),
            cloudformation: aws_sdk_cloudformation::Client::new(conf),
            dynamodb: aws_sdk_dynamodb::Client::new(conf),
            ecs: aws_sdk_ecs::Client::new(conf),
            eks: aws_sdk_eks::Client::new(conf),
            lambda: aws_sdk_lambda::Client::new(conf),
            s3: aws_sdk_s3::Client::new(conf),
        }
    }

    fn stack_tags(request: &StackRequest) -> Result<Vec<StackTag>, AwsError> {
        let (key, value) = request.component_tag();
        let tag = StackTag::builder()
            .key(key)
            .value(value)
            .build();
        Ok(vec![tag])
    }

    fn stack_parameters(request: &StackRequest) -> Vec<Parameter> {
        request
            .parameters
            .iter()
            .map(|(k, v)| {
                Parameter::builder()
                    .parameter_key(k)
                    .parameter_value(v)
                    .build()
            })
            .collect()
    }

    fn stack_capabilities() -> Vec<Capability> {
        vec![
            Capability::CapabilityIam,
            Capability::CapabilityNamedIam,
            Capability::CapabilityAutoExpand,
        ]
    }
}

#[async_trait]
impl AwsSdkService for AwsSdkClient {
    fn account_id(&self) -> &str {
        &self.account_id
    }

    fn region(&self) -> &str {
        &self.region
    }

    async fn get_secret_value(&self, secret_id: &str) -> Result<SecretValue, AwsError> {
        let span = info_span!("aws.secretsmanager.get_secret_value", secret_id, region = %self.region);
        observe("secretsmanager", "GetSecretValue", async {
            let output = self
                .secrets
                .get_secret_value()
                .secret_id(secret_id)
                .send()
                .await
                .map_err(sdk_error("secretsmanager", "GetSecretValue"))?;
            Ok(SecretValue {
                arn: output.arn().map(str::to_string),
                name: output.name().map(str::to_string),
                secret_string: output
                    .secret_string()
                    .map(|s| zeroize::Zeroizing::new(s.to_string())),
            })
        })
        .instrument(span)
        .await
    }

    async fn create_secret(&self, request: &CreateSecretRequest) -> Result<SecretRef, AwsError> {
        let span = info_span!("aws.secretsmanager.create_secret", secret.name = %request.name);
        observe("secretsmanager", "CreateSecret", async {
            let mut call = self
                .secrets
                .create_secret()
                .name(&request.name)
                .description(&request.description)
                .add_replica_regions(
                    ReplicaRegionType::builder()
                        .region(SECRET_REPLICA_REGION)
                        .build(),
                );
            for (key, value) in &request.tags {
                call = call.tags(SecretTag::builder().key(key).value(value).build());
            }
            if let Some(secret) = &request.secret_string {
                call = call.secret_string(secret.as_str());
            }
            let output = call
                .send()
                .await
                .map_err(sdk_error("secretsmanager", "CreateSecret"))?;
            info!("Created secret {}", request.name);
            Ok(SecretRef {
                arn: output.arn().map(str::to_string),
                name: output.name().map(str::to_string),
                version_id: output.version_id().map(str::to_string),
            })
        })
        .instrument(span)
        .await
    }

    async fn put_secret_value(&self, secret_id: &str, value: &str) -> Result<SecretRef, AwsError> {
        let span = info_span!("aws.secretsmanager.put_secret_value", secret_id);
        observe("secretsmanager", "PutSecretValue", async {
            let output = self
                .secrets
                .put_secret_value()
                .secret_id(secret_id)
                .secret_string(value)
                .send()
                .await
                .map_err(sdk_error("secretsmanager", "PutSecretValue"))?;
            Ok(SecretRef {
                arn: output.arn().map(str::to_string),
                name: output.name().map(str::to_string),
                version_id: output.version_id().map(str::to_string),
            })
        })
        .instrument(span)
        .await
    }

    async fn delete_secret(&self, secret_id: &str) -> Result<(), AwsError> {
        let span = info_span!("aws.secretsmanager.delete_secret", secret_id);
        observe("secretsmanager", "DeleteSecret", async {
            self.secrets
                .delete_secret()
                .secret_id(secret_id)
                .force_delete_without_recovery(true)
                .send()
                .await
                .map_err(sdk_error("secretsmanager", "DeleteSecret"))?;
            info!("Deleted secret {}", secret_id);
            Ok(())
        })
        .instrument(span)
        .await
    }

    async fn get_ssm_parameter(&self, name: &str) -> Result<Option<String>, AwsError> {
        let span = info_span!("aws.ssm.get_parameter", parameter = name);
        observe("ssm", "GetParameter", async {
            match self
                .ssm
                .get_parameter()
                .name(name)
                .with_decryption(true)
                .send()
                .await
            {
                Ok(output) => Ok(output
                    .parameter()
                    .and_then(|p| p.value())
                    .map(str::to_string)),
                Err(e)
                    if e.as_service_error()
                        .is_some_and(|se| se.is_parameter_not_found()) =>
                {
                    debug!("SSM parameter {} not found", name);
                    Ok(None)
                }
                Err(e) => Err(sdk_error("ssm", "GetParameter")(e)),
            }
        })
        .instrument(span)
        .await
    }

    async fn describe_stack(&self, stack_name: &str) -> Result<StackDescription, AwsError> {
        let span = info_span!("aws.cloudformation.describe_stacks", stack_name);
        observe("cloudformation", "DescribeStacks", async {
            let output = self
                .cloudformation
                .describe_stacks()
                .stack_name(stack_name)
                .send()
                .await
                .map_err(sdk_error("cloudformation", "DescribeStacks"))?;
            let stack = output.stacks().first().ok_or(AwsError::MissingField {
                service: "cloudformation",
                operation: "DescribeStacks",
                field: "Stacks",
            })?;
            Ok(StackDescription {
                stack_id: owned(stack.stack_id()),
                stack_name: owned(stack.stack_name()).unwrap_or_else(|| stack_name.to_string()),
                status: stack
                    .stack_status()
                    .member()
                    .map(|s| s.as_str().to_string()),
                status_reason: owned(stack.stack_status_reason()),
                outputs: stack
                    .outputs()
                    .iter()
                    .filter_map(|o| Some((owned(o.output_key())?, owned(o.output_value())?)))
                    .collect(),
                tags: stack
                    .tags()
                    .iter()
                    .filter_map(|t| Some((owned(t.key())?, owned(t.value())?)))
                    .collect(),
            })
        })
        .instrument(span)
        .await
    }

    async fn describe_stack_events(&self, stack_name: &str) -> Result<Vec<StackEvent>, AwsError> {
        let span = info_span!("aws.cloudformation.describe_stack_events", stack_name);
        observe("cloudformation", "DescribeStackEvents", async {
            let output = self
                .cloudformation
                .describe_stack_events()
                .stack_name(stack_name)
                .send()
                .await
                .map_err(sdk_error("cloudformation", "DescribeStackEvents"))?;
            Ok(output
                .stack_events()
                .iter()
                .map(|e| StackEvent {
                    timestamp: e.timestamp().member().map(ToString::to_string),
                    logical_resource_id: owned(e.logical_resource_id()),
                    resource_type: owned(e.resource_type()),
                    resource_status: e
                        .resource_status()
                        .member()
                        .map(|s| s.as_str().to_string()),
                    resource_status_reason: owned(e.resource_status_reason()),
                })
                .collect())
        })
        .instrument(span)
        .await
    }

    async fn create_stack(&self, request: &StackRequest) -> Result<String, AwsError> {
        let span = info_span!("aws.cloudformation.create_stack", stack_name = %request.stack_name);
        observe("cloudformation", "CreateStack", async {
            let output = self
                .cloudformation
                .create_stack()
                .stack_name(&request.stack_name)
                .template_url(request.template_url())
                .set_capabilities(Some(Self::stack_capabilities()))
                .set_parameters(Some(Self::stack_parameters(request)))
                .set_tags(Some(Self::stack_tags(request)?))
                .send()
                .await
                .map_err(sdk_error("cloudformation", "CreateStack"))?;
            info!("Creating stack {}", request.stack_name);
            Ok(output.stack_id().unwrap_or(&request.stack_name).to_string())
        })
        .instrument(span)
        .await
    }

    async fn update_stack(&self, request: &StackRequest) -> Result<String, AwsError> {
        let span = info_span!("aws.cloudformation.update_stack", stack_name = %request.stack_name);
        observe("cloudformation", "UpdateStack", async {
            let output = self
                .cloudformation
                .update_stack()
                .stack_name(&request.stack_name)
                .template_url(request.template_url())
                .set_capabilities(Some(Self::stack_capabilities()))
                .set_parameters(Some(Self::stack_parameters(request)))
                .set_tags(Some(Self::stack_tags(request)?))
                .send()
                .await
                .map_err(sdk_error("cloudformation", "UpdateStack"))?;
            info!("Updating stack {}", request.stack_name);
            Ok(output.stack_id().unwrap_or(&request.stack_name).to_string())
        })
        .instrument(span)
        .await
    }

    async fn delete_stack(&self, stack_name: &str) -> Result<(), AwsError> {
        let span = info_span!("aws.cloudformation.delete_stack", stack_name);
        observe("cloudformation", "DeleteStack", async {
            self.cloudformation
                .delete_stack()
                .stack_name(stack_name)
                .send()
                .await
                .map_err(sdk_error("cloudformation", "DeleteStack"))?;
            info!("Deleting stack {}", stack_name);
            Ok(())
        })
        .instrument(span)
        .await
    }

    async fn scan_by_app_name(
        &self,
        table_name: &str,
        app_name: &str,
    ) -> Result<Vec<Map<String, Value>>, AwsError> {
        let span = info_span!("aws.dynamodb.scan", table_name, app_name);
        observe("dynamodb", "Scan", async {
            let mut items = Vec::new();
            let mut start_key = None;
            loop {
                let output = self
                    .dynamodb
                    .scan()
                    .table_name(table_name)
                    .filter_expression("#appName = :appName")
                    .expression_attribute_names("#appName", "appName")
                    .expression_attribute_values(":appName", AttributeValue::S(app_name.to_string()))
                    .set_exclusive_start_key(start_key)
                    .send()
                    .await
                    .map_err(sdk_error("dynamodb", "Scan"))?;
                items.extend(output.items().iter().map(item_to_json));
                match output.last_evaluated_key() {
                    Some(key) if !key.is_empty() => start_key = Some(key.clone()),
                    _ => break,
                }
            }
            debug!("Scanned {} item(s) for {}", items.len(), app_name);
            Ok(items)
        })
        .instrument(span)
        .await
    }

    async fn put_item(
        &self,
        table_name: &str,
        item: &BTreeMap<String, String>,
    ) -> Result<(), AwsError> {
        let span = info_span!("aws.dynamodb.put_item", table_name);
        observe("dynamodb", "PutItem", async {
            let attributes: HashMap<String, AttributeValue> = item
                .iter()
                .map(|(k, v)| (k.clone(), AttributeValue::S(v.clone())))
                .collect();
            self.dynamodb
                .put_item()
                .table_name(table_name)
                .set_item(Some(attributes))
                .send()
                .await
                .map_err(sdk_error("dynamodb", "PutItem"))?;
            Ok(())
        })
        .instrument(span)
        .await
    }

    async fn list_ecs_tasks(&self, cluster: &str, service: &str) -> Result<Vec<String>, AwsError> {
        let span = info_span!("aws.ecs.list_tasks", cluster, service);
        observe("ecs", "ListTasks", async {
            let output = self
                .ecs
                .list_tasks()
                .cluster(cluster)
                .service_name(service)
                .send()
                .await
                .map_err(sdk_error("ecs", "ListTasks"))?;
            Ok(output.task_arns().to_vec())
        })
        .instrument(span)
        .await
    }

    async fn describe_ecs_tasks(
        &self,
        cluster: &str,
        task_arns: &[String],
    ) -> Result<Vec<TaskInfo>, AwsError> {
        if task_arns.is_empty() {
            return Ok(Vec::new());
        }
        let span = info_span!("aws.ecs.describe_tasks", cluster, tasks = task_arns.len());
        observe("ecs", "DescribeTasks", async {
            let output = self
                .ecs
                .describe_tasks()
                .cluster(cluster)
                .set_tasks(Some(task_arns.to_vec()))
                .send()
                .await
                .map_err(sdk_error("ecs", "DescribeTasks"))?;
            Ok(output
                .tasks()
                .iter()
                .map(|t| TaskInfo {
                    task_arn: t.task_arn().map(str::to_string),
                    last_status: t.last_status().map(str::to_string),
                    desired_status: t.desired_status().map(str::to_string),
                    task_definition_arn: t.task_definition_arn().map(str::to_string),
                    started_at: t.started_at().map(ToString::to_string),
                    group: t.group().map(str::to_string),
                })
                .collect())
        })
        .instrument(span)
        .await
    }

    async fn update_ecs_service(&self, update: &ServiceUpdate) -> Result<ServiceInfo, AwsError> {
        let span = info_span!(
            "aws.ecs.update_service",
            cluster = %update.cluster,
            service = %update.service
        );
        observe("ecs", "UpdateService", async {
            let output = self
                .ecs
                .update_service()
                .cluster(&update.cluster)
                .service(&update.service)
                .set_desired_count(update.desired_count)
                .force_new_deployment(update.force_new_deployment)
                .set_task_definition(update.task_definition.clone())
                .send()
                .await
                .map_err(sdk_error("ecs", "UpdateService"))?;
            let service = output.service().ok_or(AwsError::MissingField {
                service: "ecs",
                operation: "UpdateService",
                field: "service",
            })?;
            info!("Updated ECS service {}/{}", update.cluster, update.service);
            Ok(ServiceInfo {
                service_arn: service.service_arn().map(str::to_string),
                status: service.status().map(str::to_string),
                desired_count: service.desired_count(),
                running_count: service.running_count(),
                task_definition: service.task_definition().map(str::to_string),
            })
        })
        .instrument(span)
        .await
    }

    async fn describe_eks_cluster(&self, cluster_name: &str) -> Result<ClusterInfo, AwsError> {
        let span = info_span!("aws.eks.describe_cluster", cluster_name);
        observe("eks", "DescribeCluster", async {
            let output = self
                .eks
                .describe_cluster()
                .name(cluster_name)
                .send()
                .await
                .map_err(sdk_error("eks", "DescribeCluster"))?;
            let cluster = output.cluster().ok_or(AwsError::MissingField {
                service: "eks",
                operation: "DescribeCluster",
                field: "cluster",
            })?;
            Ok(ClusterInfo {
                name: cluster.name().map(str::to_string),
                arn: cluster.arn().map(str::to_string),
                endpoint: cluster.endpoint().map(str::to_string),
                status: cluster.status().map(|s| s.as_str().to_string()),
                version: cluster.version().map(str::to_string),
                role_arn: cluster.role_arn().map(str::to_string),
            })
        })
        .instrument(span)
        .await
    }

    async fn invoke_lambda(
        &self,
        function_name: &str,
        payload: &str,
    ) -> Result<LambdaInvocation, AwsError> {
        let span = info_span!("aws.lambda.invoke", function_name);
        observe("lambda", "Invoke", async {
            let output = self
                .lambda
                .invoke()
                .function_name(function_name)
                .invocation_type(InvocationType::RequestResponse)
                .log_type(LogType::Tail)
                .payload(Blob::new(payload.as_bytes().to_vec()))
                .send()
                .await
                .map_err(sdk_error("lambda", "Invoke"))?;
            let log_tail = output.log_result().and_then(|log| {
                base64::engine::general_purpose::STANDARD
                    .decode(log)
                    .ok()
                    .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
            });
            Ok(LambdaInvocation {
                status_code: output.status_code(),
                function_error: output.function_error().map(str::to_string),
                payload: output
                    .payload()
                    .map(|p| String::from_utf8_lossy(p.as_ref()).into_owned()),
                log_tail,
            })
        })
        .instrument(span)
        .await
    }

    async fn create_s3_bucket(&self, name: &str) -> Result<String, AwsError> {
        let bucket = bucket_name(name, &self.account_id, &self.region);
        let span = info_span!("aws.s3.create_bucket", bucket = %bucket);
        observe("s3", "CreateBucket", async {
            let mut call = self.s3.create_bucket().bucket(&bucket);
            // us-east-1 rejects an explicit location constraint
            if self.region != "us-east-1" {
                call = call.create_bucket_configuration(
                    CreateBucketConfiguration::builder()
                        .location_constraint(BucketLocationConstraint::from(self.region.as_str()))
                        .build(),
                );
            }
            call.send()
                .await
                .map_err(sdk_error("s3", "CreateBucket"))?;
            info!("Created bucket {}", bucket);
            Ok(bucket.clone())
        })
        .instrument(span)
        .await
    }

    async fn does_s3_file_exist(&self, bucket: &str, key: &str) -> Result<bool, AwsError> {
        let span = info_span!("aws.s3.head_object", bucket, key);
        observe("s3", "HeadObject", async {
            match self.s3.head_object().bucket(bucket).key(key).send().await {
                Ok(_) => Ok(true),
                Err(e) if e.as_service_error().is_some_and(|se| se.is_not_found()) => Ok(false),
                Err(e) => Err(sdk_error("s3", "HeadObject")(e)),
            }
        })
        .instrument(span)
        .await
    }
}

/// Builds [`AwsSdkClient`]s from the default credential chain
#[derive(Debug, Clone, Default)]
pub struct SdkClientFactory;

impl SdkClientFactory {
    async fn base_config(region: &str) -> SdkConfig {
        aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(region.to_string()))
            .load()
            .await
    }
}

#[async_trait]
impl AwsClientFactory for SdkClientFactory {
    async fn platform_client(&self, region: &str) -> Result<Arc<dyn AwsSdkService>, AwsError> {
        let conf = Self::base_config(region).await;
        let identity = observe("sts", "GetCallerIdentity", async {
            aws_sdk_sts::Client::new(&conf)
                .get_caller_identity()
                .send()
                .await
                .map_err(sdk_error("sts", "GetCallerIdentity"))
        })
        .await?;
        let account = identity.account().ok_or(AwsError::MissingField {
            service: "sts",
            operation: "GetCallerIdentity",
            field: "Account",
        })?;
        debug!("Platform identity resolved to account {}", account);
        Ok(Arc::new(AwsSdkClient::from_conf(&conf, account, region)))
    }

    async fn operations_session(
        &self,
        request: &AwsAuthRequest,
    ) -> Result<OperationsSession, AwsError> {
        let conf = Self::base_config(&request.region).await;
        let auth = assume_operations_role(&aws_sdk_sts::Client::new(&conf), request).await?;
        let role_conf = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(request.region.clone()))
            .credentials_provider(auth.credentials.clone())
            .load()
            .await;
        let client = AwsSdkClient::from_conf(&role_conf, &request.account_id, &request.region);
        Ok(OperationsSession {
            client: Arc::new(client),
            auth,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_attribute_to_json_handles_nested_values() {
        let item = HashMap::from([
            ("appName".to_string(), AttributeValue::S("orders".to_string())),
            ("count".to_string(), AttributeValue::N("3".to_string())),
            ("ratio".to_string(), AttributeValue::N("0.5".to_string())),
            ("done".to_string(), AttributeValue::Bool(true)),
            (
                "tags".to_string(),
                AttributeValue::L(vec![AttributeValue::S("a".to_string())]),
            ),
        ]);
        let json = Value::Object(item_to_json(&item));
        assert_eq!(
            json,
            json!({ "appName": "orders", "count": 3, "ratio": 0.5, "done": true, "tags": ["a"] })
        );
    }

    #[test]
    fn test_optional_member_accepts_both_shapes() {
        let required: &str = "value";
        let optional: Option<&str> = None;
        assert_eq!(owned(required).as_deref(), Some("value"));
        assert_eq!(owned(optional), None);
    }
}
