//! Common test utilities for the integration and Pact tests
//!
//! Provides in-memory doubles for the git provider, AWS facade and catalog
//! so platform workflows and actions can run without network access, plus
//! the rustls crypto provider setup shared by the Pact tests.

#![allow(dead_code, reason = "each test binary uses a different subset")]

use async_trait::async_trait;
use aws_credential_types::Credentials;
use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, Once};
use zeroize::Zeroizing;

use harmonix_platform::aws::{
    AwsAuthRequest, AwsAuthResponse, AwsClientFactory, AwsSdkService, ClusterInfo,
    CreateSecretRequest, LambdaInvocation, OperationsSession, SecretRef, SecretValue,
    ServiceInfo, ServiceUpdate, StackDescription, StackEvent, StackRequest, TaskInfo,
};
use harmonix_platform::catalog::{CatalogApi, Entity, Location};
use harmonix_platform::error::{AwsError, CatalogError, GitError};
use harmonix_platform::platform::PlatformService;
use harmonix_platform::scm::{
    CommitChange, GitApiResult, GitProviders, GitServiceFactory, RepositoryInfo, ScmBackendApi,
};

static RUSTLS_INIT: Once = Once::new();

/// Initialize rustls crypto provider for tests
///
/// Uses a `Once` so it runs a single time per test binary.
pub fn init_rustls() {
    RUSTLS_INIT.call_once(|| {
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}

/// Strip the trailing slash of a mock server URL
pub fn base_url(url: &impl ToString) -> String {
    let mut base = url.to_string();
    if base.ends_with('/') {
        base.pop();
    }
    base
}

pub const GIT_TOKEN: &str = "glpat-test-token";

// ---------------------------------------------------------------------------
// Git provider
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct ScmState {
    calls: Vec<String>,
    commits: Vec<CommitChange>,
    tokens: Vec<String>,
    commit_error: Option<String>,
    fail_delete: bool,
    files: HashMap<String, String>,
}

/// Git provider adapter that records every call
#[derive(Debug, Clone, Default)]
pub struct MockScm {
    state: Arc<Mutex<ScmState>>,
}

impl MockScm {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next commits with a provider API error carrying `message`
    pub fn fail_commits_with(&self, message: &str) {
        self.state.lock().unwrap().commit_error = Some(message.to_string());
    }

    pub fn fail_deletes(&self) {
        self.state.lock().unwrap().fail_delete = true;
    }

    pub fn add_file(&self, path: &str, content: &str) {
        self.state
            .lock()
            .unwrap()
            .files
            .insert(path.to_string(), content.to_string());
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn commits(&self) -> Vec<CommitChange> {
        self.state.lock().unwrap().commits.clone()
    }

    pub fn tokens(&self) -> Vec<String> {
        self.state.lock().unwrap().tokens.clone()
    }

    fn record(&self, call: String, token: &str) {
        let mut state = self.state.lock().unwrap();
        state.calls.push(call);
        state.tokens.push(token.to_string());
    }

    fn api_error(operation: &'static str, status: u16, message: &str) -> GitError {
        GitError::Api {
            provider: GitProviders::GitLab,
            operation,
            status,
            message: message.to_string(),
        }
    }
}

#[async_trait]
impl ScmBackendApi for MockScm {
    fn provider(&self) -> GitProviders {
        GitProviders::GitLab
    }

    fn api_base_url(&self, repo: &RepositoryInfo) -> String {
        format!("https://{}/api/v4", repo.git_host)
    }

    async fn create_repository(
        &self,
        repo: &RepositoryInfo,
        access_token: &str,
    ) -> Result<GitApiResult, GitError> {
        self.record(format!("create:{}", repo.full_path()), access_token);
        Ok(GitApiResult::new("Repository created", 201, json!({ "id": 42 })))
    }

    async fn delete_repository(
        &self,
        repo: &RepositoryInfo,
        access_token: &str,
    ) -> Result<GitApiResult, GitError> {
        self.record(format!("delete:{}", repo.full_path()), access_token);
        if self.state.lock().unwrap().fail_delete {
            return Err(Self::api_error("delete_repository", 403, "403 Forbidden"));
        }
        Ok(GitApiResult::new("Repository deleted", 202, Value::Null))
    }

    async fn get_file_content(
        &self,
        file_path: &str,
        repo: &RepositoryInfo,
        access_token: &str,
    ) -> Result<GitApiResult, GitError> {
        self.record(format!("read:{}:{file_path}", repo.full_path()), access_token);
        let content = self.state.lock().unwrap().files.get(file_path).cloned();
        match content {
            Some(content) => Ok(GitApiResult::new("File read", 200, Value::String(content))),
            None => Err(Self::api_error("get_file_content", 404, "404 File Not Found")),
        }
    }

    async fn commit_content(
        &self,
        change: &CommitChange,
        repo: &RepositoryInfo,
        access_token: &str,
    ) -> Result<GitApiResult, GitError> {
        change.ensure_not_empty()?;
        self.record(format!("commit:{}", repo.full_path()), access_token);
        let mut state = self.state.lock().unwrap();
        if let Some(message) = &state.commit_error {
            return Err(Self::api_error("commit_content", 400, message));
        }
        state.commits.push(change.clone());
        Ok(GitApiResult::new("Commit created", 201, json!({ "id": "abc123" })))
    }
}

// ---------------------------------------------------------------------------
// AWS
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct AwsState {
    secrets: HashMap<String, String>,
    ssm: HashMap<String, String>,
    calls: Vec<String>,
    put_items: Vec<(String, BTreeMap<String, String>)>,
    created_secrets: Vec<CreateSecretRequest>,
    fail_delete_stack: bool,
}

/// In-memory AWS facade
#[derive(Debug, Clone)]
pub struct MockAws {
    account_id: String,
    region: String,
    state: Arc<Mutex<AwsState>>,
}

impl Default for MockAws {
    fn default() -> Self {
        Self::new()
    }
}

impl MockAws {
    /// Facade pre-loaded with both git credential secrets
    pub fn new() -> Self {
        let aws = Self {
            account_id: "123456789012".to_string(),
            region: "us-east-1".to_string(),
            state: Arc::default(),
        };
        let token = json!({ "apiToken": GIT_TOKEN }).to_string();
        aws.with_secret("opa-admin-gitlab-secrets", &token)
            .with_secret("opa-admin-github-secrets", &token)
    }

    pub fn with_secret(self, name: &str, value: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .secrets
            .insert(name.to_string(), value.to_string());
        self
    }

    pub fn with_parameter(self, name: &str, value: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .ssm
            .insert(name.to_string(), value.to_string());
        self
    }

    pub fn fail_delete_stack(&self) {
        self.state.lock().unwrap().fail_delete_stack = true;
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn put_items(&self) -> Vec<(String, BTreeMap<String, String>)> {
        self.state.lock().unwrap().put_items.clone()
    }

    pub fn created_secrets(&self) -> Vec<CreateSecretRequest> {
        self.state.lock().unwrap().created_secrets.clone()
    }

    fn record(&self, call: String) {
        self.state.lock().unwrap().calls.push(call);
    }
}

#[async_trait]
impl AwsSdkService for MockAws {
    fn account_id(&self) -> &str {
        &self.account_id
    }

    fn region(&self) -> &str {
        &self.region
    }

    async fn get_secret_value(&self, secret_id: &str) -> Result<SecretValue, AwsError> {
        self.record(format!("get_secret_value:{secret_id}"));
        let value = self.state.lock().unwrap().secrets.get(secret_id).cloned();
        match value {
            Some(value) => Ok(SecretValue {
                arn: Some(format!(
                    "arn:aws:secretsmanager:{}:{}:secret:{secret_id}",
                    self.region, self.account_id
                )),
                name: Some(secret_id.to_string()),
                secret_string: Some(Zeroizing::new(value)),
            }),
            None => Err(AwsError::Sdk {
                service: "secretsmanager",
                operation: "GetSecretValue",
                message: format!("ResourceNotFoundException: {secret_id}"),
            }),
        }
    }

    async fn create_secret(&self, request: &CreateSecretRequest) -> Result<SecretRef, AwsError> {
        self.record(format!("create_secret:{}", request.name));
        self.state
            .lock()
            .unwrap()
            .created_secrets
            .push(request.clone());
        Ok(SecretRef {
            arn: Some(format!(
                "arn:aws:secretsmanager:{}:{}:secret:{}-AbCdEf",
                self.region, self.account_id, request.name
            )),
            name: Some(request.name.clone()),
            version_id: Some("v1".to_string()),
        })
    }

    async fn put_secret_value(&self, secret_id: &str, value: &str) -> Result<SecretRef, AwsError> {
        self.record(format!("put_secret_value:{secret_id}"));
        self.state
            .lock()
            .unwrap()
            .secrets
            .insert(secret_id.to_string(), value.to_string());
        Ok(SecretRef {
            arn: Some(secret_id.to_string()),
            name: None,
            version_id: Some("v2".to_string()),
        })
    }

    async fn delete_secret(&self, secret_id: &str) -> Result<(), AwsError> {
        self.record(format!("delete_secret:{secret_id}"));
        self.state.lock().unwrap().secrets.remove(secret_id);
        Ok(())
    }

    async fn get_ssm_parameter(&self, name: &str) -> Result<Option<String>, AwsError> {
        self.record(format!("get_ssm_parameter:{name}"));
        Ok(self.state.lock().unwrap().ssm.get(name).cloned())
    }

    async fn describe_stack(&self, stack_name: &str) -> Result<StackDescription, AwsError> {
        self.record(format!("describe_stack:{stack_name}"));
        Ok(StackDescription {
            stack_name: stack_name.to_string(),
            status: Some("CREATE_COMPLETE".to_string()),
            ..Default::default()
        })
    }

    async fn describe_stack_events(&self, stack_name: &str) -> Result<Vec<StackEvent>, AwsError> {
        self.record(format!("describe_stack_events:{stack_name}"));
        Ok(Vec::new())
    }

    async fn create_stack(&self, request: &StackRequest) -> Result<String, AwsError> {
        self.record(format!("create_stack:{}", request.stack_name));
        Ok(format!("stack/{}", request.stack_name))
    }

    async fn update_stack(&self, request: &StackRequest) -> Result<String, AwsError> {
        self.record(format!("update_stack:{}", request.stack_name));
        Ok(format!("stack/{}", request.stack_name))
    }

    async fn delete_stack(&self, stack_name: &str) -> Result<(), AwsError> {
        self.record(format!("delete_stack:{stack_name}"));
        if self.state.lock().unwrap().fail_delete_stack {
            return Err(AwsError::Sdk {
                service: "cloudformation",
                operation: "DeleteStack",
                message: "AccessDenied".to_string(),
            });
        }
        Ok(())
    }

    async fn scan_by_app_name(
        &self,
        table_name: &str,
        _app_name: &str,
    ) -> Result<Vec<Map<String, Value>>, AwsError> {
        self.record(format!("scan:{table_name}"));
        Ok(Vec::new())
    }

    async fn put_item(
        &self,
        table_name: &str,
        item: &BTreeMap<String, String>,
    ) -> Result<(), AwsError> {
        self.record(format!("put_item:{table_name}"));
        self.state
            .lock()
            .unwrap()
            .put_items
            .push((table_name.to_string(), item.clone()));
        Ok(())
    }

    async fn list_ecs_tasks(&self, _cluster: &str, _service: &str) -> Result<Vec<String>, AwsError> {
        Ok(Vec::new())
    }

    async fn describe_ecs_tasks(
        &self,
        _cluster: &str,
        _task_arns: &[String],
    ) -> Result<Vec<TaskInfo>, AwsError> {
        Ok(Vec::new())
    }

    async fn update_ecs_service(&self, update: &ServiceUpdate) -> Result<ServiceInfo, AwsError> {
        self.record(format!("update_ecs_service:{}#{}", update.cluster, update.service));
        Ok(ServiceInfo {
            desired_count: update.desired_count.unwrap_or_default(),
            ..Default::default()
        })
    }

    async fn describe_eks_cluster(&self, cluster_name: &str) -> Result<ClusterInfo, AwsError> {
        Ok(ClusterInfo {
            name: Some(cluster_name.to_string()),
            ..Default::default()
        })
    }

    async fn invoke_lambda(
        &self,
        function_name: &str,
        _payload: &str,
    ) -> Result<LambdaInvocation, AwsError> {
        self.record(format!("invoke_lambda:{function_name}"));
        Ok(LambdaInvocation {
            status_code: 200,
            ..Default::default()
        })
    }

    async fn create_s3_bucket(&self, name: &str) -> Result<String, AwsError> {
        self.record(format!("create_s3_bucket:{name}"));
        Ok(format!("{name}-{}-{}", self.account_id, self.region))
    }

    async fn does_s3_file_exist(&self, _bucket: &str, _key: &str) -> Result<bool, AwsError> {
        Ok(false)
    }
}

/// Factory handing out the same [`MockAws`] for every identity
#[derive(Debug, Clone)]
pub struct MockAwsFactory {
    pub aws: MockAws,
    sessions: Arc<Mutex<Vec<AwsAuthRequest>>>,
}

impl MockAwsFactory {
    pub fn new(aws: MockAws) -> Self {
        Self {
            aws,
            sessions: Arc::default(),
        }
    }

    /// Operations-role requests seen so far
    pub fn sessions(&self) -> Vec<AwsAuthRequest> {
        self.sessions.lock().unwrap().clone()
    }
}

#[async_trait]
impl AwsClientFactory for MockAwsFactory {
    async fn platform_client(&self, _region: &str) -> Result<Arc<dyn AwsSdkService>, AwsError> {
        Ok(Arc::new(self.aws.clone()))
    }

    async fn operations_session(
        &self,
        request: &AwsAuthRequest,
    ) -> Result<OperationsSession, AwsError> {
        request.validate()?;
        self.sessions.lock().unwrap().push(request.clone());
        Ok(OperationsSession {
            client: Arc::new(self.aws.clone()),
            auth: AwsAuthResponse {
                credentials: Credentials::new("AKIATEST", "secret", Some("session".to_string()), None, "test"),
                requester: request.user_name.clone(),
                owner: request.owner(),
                role_arn: request.role_arn(),
                account: request.account_id.clone(),
                region: request.region.clone(),
            },
        })
    }
}

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct CatalogState {
    entities: HashMap<String, Entity>,
    locations: Vec<Location>,
    removed_uids: Vec<String>,
    removed_locations: Vec<String>,
    refreshed: Vec<String>,
    fail_remove_entity: bool,
}

/// In-memory catalog keyed by lower-cased entity reference
#[derive(Debug, Clone, Default)]
pub struct MockCatalog {
    state: Arc<Mutex<CatalogState>>,
}

impl MockCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entity(self, entity: Entity) -> Self {
        let key = entity.entity_ref().to_lowercase();
        self.state.lock().unwrap().entities.insert(key, entity);
        self
    }

    pub fn with_location(self, location: Location) -> Self {
        self.state.lock().unwrap().locations.push(location);
        self
    }

    pub fn fail_entity_removal(&self) {
        self.state.lock().unwrap().fail_remove_entity = true;
    }

    pub fn removed_uids(&self) -> Vec<String> {
        self.state.lock().unwrap().removed_uids.clone()
    }

    pub fn removed_locations(&self) -> Vec<String> {
        self.state.lock().unwrap().removed_locations.clone()
    }

    pub fn refreshed(&self) -> Vec<String> {
        self.state.lock().unwrap().refreshed.clone()
    }
}

#[async_trait]
impl CatalogApi for MockCatalog {
    async fn get_entity_by_ref(&self, entity_ref: &str) -> Result<Option<Entity>, CatalogError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .entities
            .get(&entity_ref.to_lowercase())
            .cloned())
    }

    async fn get_entities_by_refs(
        &self,
        entity_refs: &[String],
    ) -> Result<Vec<Option<Entity>>, CatalogError> {
        let state = self.state.lock().unwrap();
        Ok(entity_refs
            .iter()
            .map(|r| state.entities.get(&r.to_lowercase()).cloned())
            .collect())
    }

    async fn refresh_entity(&self, entity_ref: &str) -> Result<(), CatalogError> {
        self.state
            .lock()
            .unwrap()
            .refreshed
            .push(entity_ref.to_string());
        Ok(())
    }

    async fn remove_entity_by_uid(&self, uid: &str) -> Result<(), CatalogError> {
        let mut state = self.state.lock().unwrap();
        if state.fail_remove_entity {
            return Err(CatalogError::Api {
                operation: "remove_entity_by_uid",
                status: 500,
                message: "catalog unavailable".to_string(),
            });
        }
        state.removed_uids.push(uid.to_string());
        Ok(())
    }

    async fn get_location_by_ref(&self, location_ref: &str) -> Result<Option<Location>, CatalogError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .locations
            .iter()
            .find(|l| l.location_ref() == location_ref)
            .cloned())
    }

    async fn remove_location_by_id(&self, id: &str) -> Result<(), CatalogError> {
        self.state
            .lock()
            .unwrap()
            .removed_locations
            .push(id.to_string());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

/// Platform service wired to the doubles
pub fn platform(scm: &MockScm, aws: &MockAwsFactory, catalog: &MockCatalog) -> PlatformService {
    PlatformService::new(
        GitServiceFactory::from_adapter(Arc::new(scm.clone())),
        Arc::new(aws.clone()),
        Arc::new(catalog.clone()),
        "us-east-1",
    )
}

pub fn gitlab_repo(name: &str) -> RepositoryInfo {
    RepositoryInfo {
        git_host: "git.example.com".to_string(),
        git_project_group: Some("aws-app".to_string()),
        git_repo_name: name.to_string(),
        git_provider: GitProviders::GitLab,
        is_private: true,
        ..Default::default()
    }
}

pub const PROVIDER_LOCATION: &str =
    "url:https://git.example.com/aws-environment-providers/dev-ecs/blob/main/.backstage/catalog-info.yaml";

/// `AWSEnvironmentProvider` entity as stored in the catalog
pub fn provider_entity(name: &str, iac_type: &str) -> Entity {
    Entity::from_yaml(&format!(
        r"
apiVersion: aws.backstage.io/v1alpha
kind: AWSEnvironmentProvider
metadata:
  name: {name}
  uid: uid-{name}
  prefix: opa
  envType: ecs
  awsAccount: '123456789012'
  awsRegion: us-east-1
  vpc: /opa/{name}/vpc
  provisioningRole: /opa/{name}/provisioning-role-arn
  clusterName: /opa/{name}/cluster-arn
  iacType: {iac_type}
  stack-name: {name}-stack
  aws-account: '123456789012'
  aws-region: us-east-1
  annotations:
    backstage.io/managed-by-location: {PROVIDER_LOCATION}
    gitlab.com/instance: git.example.com
    gitlab.com/project-slug: aws-environment-providers/{name}
spec:
  type: environment-provider
  lifecycle: development
  owner: group:platform
"
    ))
    .unwrap()
}

/// `AWSEnvironment` entity depending on `providers`
pub fn environment_entity(name: &str, providers: &[&str]) -> Entity {
    let depends_on: Vec<String> = providers
        .iter()
        .map(|p| format!("awsenvironmentprovider:default/{p}"))
        .collect();
    let relations: Vec<Value> = depends_on
        .iter()
        .map(|p| json!({ "type": "dependsOn", "targetRef": p }))
        .collect();
    serde_json::from_value(json!({
        "apiVersion": "aws.backstage.io/v1alpha",
        "kind": "AWSEnvironment",
        "metadata": {
            "name": name,
            "uid": format!("uid-{name}"),
            "shortName": "dv",
            "deploymentRequiresApproval": false,
            "annotations": {
                "gitlab.com/instance": "git.example.com",
                "gitlab.com/project-slug": format!("aws-environments/{name}"),
            },
        },
        "spec": {
            "type": "environment",
            "lifecycle": "development",
            "owner": "group:platform",
            "dependsOn": depends_on,
        },
        "relations": relations,
    }))
    .unwrap()
}
