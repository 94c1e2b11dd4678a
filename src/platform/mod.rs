//! # Platform Workflows
//!
//! Orchestration of the portal's environment and provider workflows.
//!
//! Most workflows do not touch AWS directly: they commit pipeline input files
//! to the application or environment repository and the CI/CD pipeline does
//! the provisioning. A successful [`WorkflowStatus`] therefore means "scheduled".
//!
//! - [`PlatformService::promote_app_to_git`] - deploy an app to an environment
//! - [`PlatformService::bind_resource`] / [`PlatformService::unbind_resource`]
//! - [`PlatformService::update_provider`] - attach or detach a provider
//! - [`PlatformService::delete_tf_provider`] - schedule a Terraform destroy
//! - [`PlatformService::delete_provider`] - tear down a provider, see [`delete`]
//! - [`operations`] - audited AWS calls against a provider account

pub mod delete;
pub mod files;
pub mod operations;
mod types;

pub use operations::{OperationOutcome, ProviderTarget, SecretPayload, StackParams};

pub use types::{
    AppPromoParams, AwsProviderParams, BindResourceParams, DeleteStep, EnvironmentProviderRecord,
    IacType, ProviderAction, Requester, ResourcePolicy, WorkflowState, WorkflowStatus,
};

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, info_span, Instrument};
use zeroize::Zeroizing;

use crate::aws::{AwsClientFactory, AwsSdkService};
use crate::catalog::{CatalogApi, Entity};
use crate::constants::{
    CATALOG_INFO_FILE, DEFAULT_BRANCH, FILE_ALREADY_EXISTS_MARKER, GIT_TOKEN_SECRET_FIELD,
    PIPELINE_FOLLOW_UP, RESOURCE_BINDING_PARAMS_FILE,
};
use crate::error::{CatalogError, PlatformError};
use crate::observability::metrics;
use crate::scm::{
    util, CommitAction, CommitChange, GitApiResult, GitServiceFactory, RepositoryInfo,
};

/// Map a commit failure caused by an already committed pipeline file
fn scheduled_or(err: PlatformError, duplicate: impl FnOnce() -> String) -> PlatformError {
    match err {
        PlatformError::Git(e) if e.provider_message().contains(FILE_ALREADY_EXISTS_MARKER) => {
            PlatformError::AlreadyScheduled(duplicate())
        }
        other => other,
    }
}

fn scheduled(what: &str) -> String {
    format!("{what} {PIPELINE_FOLLOW_UP}")
}

async fn run_workflow<T, F>(workflow: &'static str, fut: F) -> Result<T, PlatformError>
where
    F: Future<Output = Result<T, PlatformError>>,
{
    let start = Instant::now();
    let result = fut.await;
    let status = if result.is_ok() { "success" } else { "failure" };
    metrics::record_workflow(workflow, status, start.elapsed().as_secs_f64());
    if let Err(e) = &result {
        error!("Workflow {} failed: {}", workflow, e);
    }
    result
}

/// Entry point for every platform workflow
#[derive(Debug, Clone)]
pub struct PlatformService {
    git: GitServiceFactory,
    aws: Arc<dyn AwsClientFactory>,
    catalog: Arc<dyn CatalogApi>,
    platform_region: String,
}

impl PlatformService {
    pub fn new(
        git: GitServiceFactory,
        aws: Arc<dyn AwsClientFactory>,
        catalog: Arc<dyn CatalogApi>,
        platform_region: impl Into<String>,
    ) -> Self {
        let platform_region = platform_region.into();
        info!(
            "Platform service using git provider {} in region {}",
            git.provider(),
            platform_region
        );
        Self {
            git,
            aws,
            catalog,
            platform_region,
        }
    }

    #[must_use]
    pub fn platform_region(&self) -> &str {
        &self.platform_region
    }

    #[must_use]
    pub fn git(&self) -> &GitServiceFactory {
        &self.git
    }

    #[must_use]
    pub fn catalog(&self) -> &Arc<dyn CatalogApi> {
        &self.catalog
    }

    #[must_use]
    pub fn aws(&self) -> &Arc<dyn AwsClientFactory> {
        &self.aws
    }

    /// AWS facade using the platform identity in the platform region
    pub async fn platform_aws(&self) -> Result<Arc<dyn AwsSdkService>, PlatformError> {
        Ok(self.aws.platform_client(&self.platform_region).await?)
    }

    /// Git API token stored in the `apiToken` field of a platform secret
    pub async fn get_git_token(&self, secret_name: &str) -> Result<Zeroizing<String>, PlatformError> {
        let secret = self.platform_aws().await?.get_secret_value(secret_name).await?;
        let raw = secret
            .secret_string
            .ok_or_else(|| PlatformError::MissingGitToken(secret_name.to_string()))?;
        let parsed: serde_json::Value = serde_json::from_str(&raw).map_err(|e| {
            PlatformError::Serialization {
                what: "git credentials secret",
                message: e.to_string(),
            }
        })?;
        parsed
            .get(GIT_TOKEN_SECRET_FIELD)
            .and_then(serde_json::Value::as_str)
            .map(|t| Zeroizing::new(t.to_string()))
            .ok_or_else(|| PlatformError::MissingGitToken(secret_name.to_string()))
    }

    pub async fn get_ssm_value(&self, name: &str) -> Result<Option<String>, PlatformError> {
        Ok(self.platform_aws().await?.get_ssm_parameter(name).await?)
    }

    pub async fn delete_platform_secret(&self, secret_name: &str) -> Result<(), PlatformError> {
        info!("Deleting platform secret {} in {}", secret_name, self.platform_region);
        Ok(self.platform_aws().await?.delete_secret(secret_name).await?)
    }

    pub async fn get_file_contents_from_git(
        &self,
        repo: &RepositoryInfo,
        file_path: &str,
        secret_name: &str,
    ) -> Result<String, PlatformError> {
        let token = self.get_git_token(secret_name).await?;
        let result = self
            .git
            .service()
            .git_provider()
            .get_file_content(file_path, repo, &token)
            .await?;
        Ok(result.value_str().unwrap_or_default().to_string())
    }

    pub async fn delete_repository(
        &self,
        repo: &RepositoryInfo,
        secret_name: &str,
    ) -> Result<GitApiResult, PlatformError> {
        let token = self.get_git_token(secret_name).await?;
        Ok(self
            .git
            .service()
            .git_provider()
            .delete_repository(repo, &token)
            .await?)
    }

    async fn commit(
        &self,
        repo: &RepositoryInfo,
        secret_name: &str,
        commit_message: &str,
        actions: Vec<CommitAction>,
    ) -> Result<GitApiResult, PlatformError> {
        let token = self.get_git_token(secret_name).await?;
        let change = CommitChange {
            actions,
            branch: DEFAULT_BRANCH.to_string(),
            commit_message: commit_message.to_string(),
        };
        Ok(self
            .git
            .service()
            .git_provider()
            .commit_content(&change, repo, &token)
            .await?)
    }

    /// Commit one properties file per provider to trigger the deployment pipeline
    pub async fn promote_app_to_git(
        &self,
        input: &AppPromoParams,
        repo: &RepositoryInfo,
        secret_name: &str,
    ) -> Result<WorkflowStatus, PlatformError> {
        let span = info_span!("platform.promote", env = %input.env_name, app = %input.app_name);
        run_workflow("promote", async {
            if input.providers.is_empty() {
                return Err(PlatformError::InvalidInput(format!(
                    "No providers given for environment {}",
                    input.env_name
                )));
            }
            let actions = input
                .providers
                .iter()
                .map(|provider| {
                    CommitAction::create(
                        files::provider_properties_path(&input.env_name, &provider.provider_name),
                        files::provider_properties(input, provider),
                    )
                })
                .collect();
            self.commit(repo, secret_name, "generate CICD stages", actions)
                .await
                .map_err(|e| {
                    scheduled_or(e, || {
                        scheduled(&format!(
                            "{} has already been scheduled for deployment.",
                            input.env_name
                        ))
                    })
                })?;
            Ok(WorkflowStatus::success(scheduled(
                "The app will not be ready to run until deployment succeeds.",
            )))
        }
        .instrument(span))
        .await
    }

    pub async fn bind_resource(
        &self,
        repo: &RepositoryInfo,
        input: &BindResourceParams,
        secret_name: &str,
    ) -> Result<WorkflowStatus, PlatformError> {
        let span = info_span!("platform.bind", env = %input.env_name, resource = %input.resource_name);
        run_workflow("bind", async {
            let mut actions = files::policy_actions(input, true);
            actions.push(CommitAction::create(
                RESOURCE_BINDING_PARAMS_FILE,
                files::resource_binding_params(input),
            ));
            self.commit(repo, secret_name, "Bind Resource", actions)
                .await
                .map_err(|e| {
                    scheduled_or(e, || {
                        scheduled(&format!(
                            "{} has already been scheduled for binding.",
                            input.env_name
                        ))
                    })
                })?;
            Ok(WorkflowStatus::success(scheduled(
                "Binding will not be complete until deployment succeeds.",
            )))
        }
        .instrument(span))
        .await
    }

    pub async fn unbind_resource(
        &self,
        repo: &RepositoryInfo,
        input: &BindResourceParams,
        secret_name: &str,
    ) -> Result<WorkflowStatus, PlatformError> {
        let span =
            info_span!("platform.unbind", env = %input.env_name, resource = %input.resource_name);
        run_workflow("unbind", async {
            let mut actions = files::policy_actions(input, false);
            actions.push(CommitAction::create(
                RESOURCE_BINDING_PARAMS_FILE,
                files::resource_binding_params(input),
            ));
            self.commit(repo, secret_name, "UnBind Resource", actions)
                .await
                .map_err(|e| {
                    scheduled_or(e, || {
                        scheduled(&format!(
                            "{} has already been scheduled for unbinding.",
                            input.env_name
                        ))
                    })
                })?;
            Ok(WorkflowStatus::success(scheduled(
                "Unbinding will not be complete until deployment succeeds.",
            )))
        }
        .instrument(span))
        .await
    }

    /// Rewrite `spec.dependsOn` of an environment and commit its catalog descriptor
    pub async fn update_provider(
        &self,
        env_name: &str,
        provider: &EnvironmentProviderRecord,
        repo: &RepositoryInfo,
        environment: &Entity,
        action: ProviderAction,
        secret_name: &str,
    ) -> Result<WorkflowStatus, PlatformError> {
        let span = info_span!("platform.update_provider", env = env_name, provider = %provider.name, ?action);
        run_workflow("update_provider", async {
            let provider_ref = provider.entity_ref();
            let descriptor = files::rewrite_depends_on(environment, &provider_ref, action)?;
            self.commit(
                repo,
                secret_name,
                "Update Environment Provider",
                vec![CommitAction::update(CATALOG_INFO_FILE, descriptor)],
            )
            .await
            .map_err(|e| {
                scheduled_or(e, || {
                    scheduled(&format!("Update {} has already been scheduled.", provider.name))
                })
            })?;
            Ok(WorkflowStatus::success(scheduled(&format!(
                "Update Provider for {env_name} will not be complete until deployment succeeds."
            )))
            .with_refresh(vec![environment.entity_ref(), provider_ref]))
        }
        .instrument(span))
        .await
    }

    /// Look up the environment and attach or detach `provider`
    pub async fn change_environment_provider(
        &self,
        environment_ref: &str,
        provider: &EnvironmentProviderRecord,
        action: ProviderAction,
    ) -> Result<WorkflowStatus, PlatformError> {
        let environment = self
            .catalog
            .get_entity_by_ref(environment_ref)
            .await?
            .ok_or_else(|| CatalogError::NotFound(environment_ref.to_string()))?;
        let repo = util::get_repo_info(&environment)?;
        let secret = util::get_git_credentials_secret(repo.git_provider)?;
        self.update_provider(
            &environment.metadata.name,
            provider,
            &repo,
            &environment,
            action,
            secret,
        )
        .await
    }

    /// Schedule a Terraform destroy; `env_name` is empty for a bare provider
    pub async fn delete_tf_provider(
        &self,
        env_name: &str,
        provider_name: &str,
        repo: &RepositoryInfo,
        secret_name: &str,
    ) -> Result<WorkflowStatus, PlatformError> {
        let span = info_span!("platform.delete_tf_provider", env = env_name, provider = provider_name);
        run_workflow("delete_tf_provider", async {
            let action = CommitAction::create(
                files::env_destroy_params_path(env_name),
                files::env_destroy_params(env_name, provider_name),
            );
            self.commit(repo, secret_name, "Destroy TF Infrastructure", vec![action])
                .await
                .map_err(|e| {
                    scheduled_or(e, || {
                        scheduled(&format!(
                            "{env_name} has already been scheduled for destruction."
                        ))
                    })
                })?;
            Ok(WorkflowStatus::success(scheduled(
                "Destroy will not be complete until deployment succeeds.",
            )))
        }
        .instrument(span))
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GitError;
    use crate::scm::GitProviders;

    fn api_error(message: &str) -> GitError {
        GitError::Api {
            provider: GitProviders::GitLab,
            operation: "commit_content",
            status: 400,
            message: message.to_string(),
        }
    }

    #[test]
    fn test_duplicate_commit_becomes_already_scheduled() {
        let err = scheduled_or(api_error("A file with this name already exists").into(), || {
            scheduled("dev has already been scheduled for deployment.")
        });
        assert_eq!(
            err.to_string(),
            "dev has already been scheduled for deployment. Check the CICD pipeline for the most up-to-date information. UI status may take a few minutes to update."
        );
    }

    #[test]
    fn test_other_commit_errors_pass_through() {
        let err = scheduled_or(api_error("branch is protected").into(), || unreachable!());
        assert!(matches!(err, PlatformError::Git(GitError::Api { .. })));
    }
}
