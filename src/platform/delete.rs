//! # Provider Deletion
//!
//! Tears down an environment provider in a fixed order:
//!
//! 1. destroy infrastructure (CloudFormation stack delete, or a Terraform
//!    destroy commit)
//! 2. delete the provider repository (stack-based providers only; the
//!    Terraform destroy job runs from that repository)
//! 3. remove the catalog Location that registered the provider
//! 4. remove the provider entity
//!
//! Steps are not compensated. When one fails the caller receives
//! [`PlatformError::PartialDelete`] naming the failed step and the steps that
//! already took effect.

use std::future::Future;
use tracing::{info, info_span, warn, Instrument};

use super::{run_workflow, DeleteStep, IacType, PlatformService, Requester, WorkflowStatus};
use crate::aws::audit::{create_audit_record, AuditRecordInput};
use crate::aws::AwsAuthRequest;
use crate::catalog::{parse_entity_ref, Entity, RefDefaults};
use crate::constants::{AWS_ENVIRONMENT_KIND, MANAGED_BY_LOCATION_ANNOTATION, PIPELINE_FOLLOW_UP};
use crate::error::{CatalogError, PlatformError};
use crate::scm::util;

/// Environments whose relations still point at the provider
#[must_use]
pub fn environments_using(provider: &Entity) -> Vec<String> {
    let defaults = RefDefaults {
        kind: None,
        namespace: Some(provider.namespace()),
    };
    let mut environments: Vec<String> = provider
        .relations
        .iter()
        .filter(|r| {
            parse_entity_ref(&r.target_ref, defaults)
                .is_ok_and(|target| target.kind.eq_ignore_ascii_case(AWS_ENVIRONMENT_KIND))
        })
        .map(|r| r.target_ref.clone())
        .collect();
    environments.sort();
    environments.dedup();
    environments
}

fn metadata(provider: &Entity, key: &str) -> Result<String, PlatformError> {
    Ok(provider.require_metadata_str(key)?.to_string())
}

/// Run one step, recording it as completed or wrapping its failure
async fn step<T, F>(
    step: DeleteStep,
    completed: &mut Vec<DeleteStep>,
    fut: F,
) -> Result<T, PlatformError>
where
    F: Future<Output = Result<T, PlatformError>>,
{
    match fut.await {
        Ok(value) => {
            info!("Provider deletion step '{}' completed", step);
            completed.push(step);
            Ok(value)
        }
        Err(source) => Err(PlatformError::PartialDelete {
            failed_step: step,
            completed_steps: completed.clone(),
            source: Box::new(source),
        }),
    }
}

impl PlatformService {
    /// Delete an `AWSEnvironmentProvider` and everything registered for it
    pub async fn delete_provider(
        &self,
        provider: &Entity,
        requester: &Requester,
    ) -> Result<WorkflowStatus, PlatformError> {
        let name = provider.metadata.name.clone();
        let span = info_span!("platform.delete_provider", provider = %name, requester = %requester.user_name);
        run_workflow("delete_provider", async {
            let in_use = environments_using(provider);
            if !in_use.is_empty() {
                return Err(PlatformError::ProviderInUse {
                    provider: name.clone(),
                    environments: in_use,
                });
            }
            let iac_type: IacType = metadata(provider, "iacType")?.parse()?;

            let mut completed = Vec::new();
            let mut warnings = Vec::new();

            let message = if iac_type.uses_stacks() {
                let audit_warning = step(
                    DeleteStep::Infrastructure,
                    &mut completed,
                    self.delete_provider_stack(provider, requester),
                )
                .await?;
                warnings.extend(audit_warning);

                step(DeleteStep::Repository, &mut completed, async {
                    let repo = util::get_repo_info(provider)?;
                    let secret = util::get_git_credentials_secret(repo.git_provider)?;
                    self.delete_repository(&repo, secret).await
                })
                .await?;
                format!("CloudFormation stack delete initiated for {name}.")
            } else {
                step(DeleteStep::Infrastructure, &mut completed, async {
                    let repo = util::get_repo_info(provider)?;
                    let secret = util::get_git_credentials_secret(repo.git_provider)?;
                    self.delete_tf_provider("", &name, &repo, secret).await
                })
                .await?;
                format!("Terraform destroy scheduled for {name}. {PIPELINE_FOLLOW_UP}")
            };

            step(DeleteStep::CatalogLocation, &mut completed, async {
                let Some(location_ref) = provider
                    .metadata
                    .annotations
                    .get(MANAGED_BY_LOCATION_ANNOTATION)
                else {
                    warn!("{} has no {} annotation", name, MANAGED_BY_LOCATION_ANNOTATION);
                    return Ok(());
                };
                if let Some(location) = self.catalog.get_location_by_ref(location_ref).await? {
                    self.catalog.remove_location_by_id(&location.id).await?;
                }
                Ok(())
            })
            .await?;

            step(DeleteStep::CatalogEntity, &mut completed, async {
                let uid = provider.metadata.uid.as_deref().ok_or_else(|| {
                    CatalogError::MissingField {
                        entity: provider.entity_ref(),
                        field: "metadata.uid".to_string(),
                    }
                })?;
                Ok(self.catalog.remove_entity_by_uid(uid).await?)
            })
            .await?;

            let mut status = WorkflowStatus::success(message);
            status.warnings = warnings;
            Ok(status)
        }
        .instrument(span))
        .await
    }

    /// Delete the provider stack through its operations role; returns an audit warning
    async fn delete_provider_stack(
        &self,
        provider: &Entity,
        requester: &Requester,
    ) -> Result<Option<String>, PlatformError> {
        let stack_name = metadata(provider, "stack-name")?;
        let request = AwsAuthRequest {
            account_id: metadata(provider, "aws-account")?,
            region: metadata(provider, "aws-region")?,
            prefix: metadata(provider, "prefix")?,
            provider_name: provider.metadata.name.clone(),
            user_name: requester.user_name.clone(),
            ownership_refs: requester.ownership_refs.clone(),
        };
        let session = self.aws.operations_session(&request).await?;
        session.client.delete_stack(&stack_name).await?;

        let audit = AuditRecordInput {
            request_args: Some(stack_name),
            ..AuditRecordInput::for_session(
                &session.auth,
                &request.prefix,
                &request.provider_name,
                "Delete Stack",
                provider.metadata.name.clone(),
            )
        };
        Ok(create_audit_record(session.client.as_ref(), &audit)
            .await
            .err()
            .map(|e| format!("Audit record was not written: {e}")))
    }
}
