//! # Scaffolder Actions
//!
//! Template steps the portal runs while scaffolding apps and providers.
//!
//! Every action declares a JSON schema for its input (generated with
//! `schemars`). The [`ActionRegistry`] compiles those schemas once at
//! registration and validates each invocation before the handler runs.
//!
//! In dry-run mode actions return fixed outputs and make no network calls.

mod component_info;
mod create_secret;
mod env_providers;
mod fs_write;
mod gitlab_token;
mod platform_metadata;
mod platform_parameters;
mod ssm_parameters;

pub use component_info::{kebab_case, GetComponentInfoAction};
pub use create_secret::CreateSecretAction;
pub use env_providers::GetEnvProvidersAction;
pub use fs_write::FsWriteAction;
pub use gitlab_token::CreateRepoAccessTokenAction;
pub use platform_metadata::GetPlatformMetadataAction;
pub use platform_parameters::GetPlatformParametersAction;
pub use ssm_parameters::GetSsmParametersAction;

use async_trait::async_trait;
use jsonschema::{Draft, JSONSchema};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tracing::{info, info_span, warn, Instrument};

use crate::aws::AwsAuthRequest;
use crate::config::ScmIntegrations;
use crate::constants::AUTOMATION_USER;
use crate::error::ActionError;
use crate::observability::metrics;
use crate::platform::{PlatformService, Requester};

/// Environment provider as exchanged between template steps
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentProvider {
    pub env_provider_name: String,
    pub env_provider_type: String,
    pub env_provider_prefix: String,
    /// AWS account where infrastructure is deployed
    pub account_id: String,
    pub region: String,
    #[serde(default)]
    pub vpc_id: String,
    #[serde(default)]
    pub public_subnets: String,
    #[serde(default)]
    pub private_subnets: String,
    /// Role that can be assumed to deploy resources to the provider
    #[serde(default)]
    pub assumed_role_arn: String,
    /// ECS or EKS cluster, for providers with compute clusters
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster_arn: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kubectl_lambda_arn: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kubectl_lambda_role_arn: Option<String>,
}

impl EnvironmentProvider {
    /// Operations-role request for `user` against this provider
    #[must_use]
    pub fn auth_request(&self, user: &Requester) -> AwsAuthRequest {
        AwsAuthRequest {
            account_id: self.account_id.clone(),
            region: self.region.clone(),
            prefix: self.env_provider_prefix.clone(),
            provider_name: self.env_provider_name.clone(),
            user_name: user.user_name.clone(),
            ownership_refs: user.ownership_refs.clone(),
        }
    }
}

/// State of one action invocation
#[derive(Debug)]
pub struct ActionContext {
    pub input: Value,
    pub dry_run: bool,
    /// Directory the template is rendered into
    pub workspace: PathBuf,
    pub user: Option<Requester>,
    pub outputs: Map<String, Value>,
}

impl ActionContext {
    pub fn new(input: Value, workspace: impl Into<PathBuf>) -> Self {
        Self {
            input,
            dry_run: false,
            workspace: workspace.into(),
            user: None,
            outputs: Map::new(),
        }
    }

    #[must_use]
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    #[must_use]
    pub fn with_user(mut self, user: Option<Requester>) -> Self {
        self.user = user;
        self
    }

    pub fn output(&mut self, name: &str, value: impl Into<Value>) {
        self.outputs.insert(name.to_string(), value.into());
    }

    /// Deserialize the (already validated) input
    pub fn parse_input<T: DeserializeOwned>(&self, action: &str) -> Result<T, ActionError> {
        serde_json::from_value(self.input.clone()).map_err(|e| ActionError::InvalidInput {
            action: action.to_string(),
            errors: vec![e.to_string()],
        })
    }

    /// Portal user, or the automation user for key-authenticated calls
    #[must_use]
    pub fn requester(&self) -> Requester {
        self.user.clone().unwrap_or_else(|| Requester {
            user_name: AUTOMATION_USER.to_string(),
            ownership_refs: Vec::new(),
        })
    }

    /// Resolve `relative` inside the workspace
    ///
    /// Absolute paths and `..` components that climb above the workspace
    /// are rejected.
    pub fn resolve_safe_child_path(&self, relative: &str) -> Result<PathBuf, ActionError> {
        let path = Path::new(relative);
        let mut depth = 0usize;
        for component in path.components() {
            match component {
                Component::Normal(_) => depth += 1,
                Component::CurDir => {}
                Component::ParentDir => {
                    depth = depth
                        .checked_sub(1)
                        .ok_or_else(|| ActionError::PathOutsideWorkspace(relative.to_string()))?;
                }
                Component::RootDir | Component::Prefix(_) => {
                    return Err(ActionError::PathOutsideWorkspace(relative.to_string()));
                }
            }
        }
        if depth == 0 {
            return Err(ActionError::PathOutsideWorkspace(relative.to_string()));
        }
        Ok(self.workspace.join(path))
    }
}

/// A template step the portal can run
#[async_trait]
pub trait TemplateAction: Send + Sync + std::fmt::Debug {
    fn id(&self) -> &'static str;

    fn description(&self) -> &'static str;

    fn input_schema(&self) -> Value;

    fn output_schema(&self) -> Option<Value> {
        None
    }

    fn supports_dry_run(&self) -> bool {
        true
    }

    async fn handler(&self, ctx: &mut ActionContext) -> Result<(), ActionError>;
}

/// Generated JSON schema of `T`
pub(crate) fn schema_of<T: schemars::JsonSchema>() -> Value {
    schemars::schema_for!(T).to_value()
}

struct RegisteredAction {
    action: Arc<dyn TemplateAction>,
    validator: JSONSchema,
}

/// Actions by id, with their compiled input schemas
pub struct ActionRegistry {
    actions: BTreeMap<&'static str, RegisteredAction>,
}

impl std::fmt::Debug for ActionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionRegistry")
            .field("actions", &self.actions.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Default for ActionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ActionRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self {
            actions: BTreeMap::new(),
        }
    }

    /// Registry holding every built-in action
    pub fn with_builtin(
        platform: PlatformService,
        integrations: ScmIntegrations,
        client: reqwest::Client,
    ) -> Result<Self, ActionError> {
        let mut registry = Self::new();
        registry.register(Arc::new(CreateSecretAction::new(platform.clone())))?;
        registry.register(Arc::new(GetPlatformMetadataAction::new(platform.clone())))?;
        registry.register(Arc::new(GetPlatformParametersAction::new(platform.clone())))?;
        registry.register(Arc::new(GetComponentInfoAction))?;
        registry.register(Arc::new(GetSsmParametersAction::new(platform.clone())))?;
        registry.register(Arc::new(GetEnvProvidersAction::new(platform.clone())))?;
        registry.register(Arc::new(FsWriteAction))?;
        registry.register(Arc::new(CreateRepoAccessTokenAction::new(
            platform,
            integrations,
            client,
        )))?;
        Ok(registry)
    }

    /// Add an action; its input schema must compile
    pub fn register(&mut self, action: Arc<dyn TemplateAction>) -> Result<(), ActionError> {
        let schema = action.input_schema();
        let validator = JSONSchema::options()
            .with_draft(Draft::Draft202012)
            .compile(&schema)
            .map_err(|e| {
                ActionError::Failed(format!(
                    "Input schema of {} does not compile: {}",
                    action.id(),
                    e
                ))
            })?;
        self.actions
            .insert(action.id(), RegisteredAction { action, validator });
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&Arc<dyn TemplateAction>> {
        self.actions.get(id).map(|r| &r.action)
    }

    /// Registered actions in id order
    pub fn list(&self) -> impl Iterator<Item = &Arc<dyn TemplateAction>> {
        self.actions.values().map(|r| &r.action)
    }

    /// Schema violations of `input` for action `id`
    pub fn validate_input(&self, id: &str, input: &Value) -> Result<(), ActionError> {
        let registered = self
            .actions
            .get(id)
            .ok_or_else(|| ActionError::UnknownAction(id.to_string()))?;
        if let Err(errors) = registered.validator.validate(input) {
            return Err(ActionError::InvalidInput {
                action: id.to_string(),
                errors: errors
                    .map(|e| format!("{}: {}", e.instance_path, e))
                    .collect(),
            });
        }
        Ok(())
    }

    /// Validate the input, then run the handler
    ///
    /// Returns the outputs the handler set.
    pub async fn execute(
        &self,
        id: &str,
        mut ctx: ActionContext,
    ) -> Result<Map<String, Value>, ActionError> {
        self.validate_input(id, &ctx.input)?;
        let action = self
            .get(id)
            .ok_or_else(|| ActionError::UnknownAction(id.to_string()))?;

        if ctx.dry_run && !action.supports_dry_run() {
            info!("Action {} does not support dry run, skipping", id);
            metrics::record_action_execution(id, "skipped");
            return Ok(Map::new());
        }

        let span = info_span!("action.execute", action = id, dry_run = ctx.dry_run);
        let result = action.handler(&mut ctx).instrument(span).await;
        match result {
            Ok(()) => {
                metrics::record_action_execution(id, "success");
                Ok(ctx.outputs)
            }
            Err(e) => {
                warn!("Action {} failed: {}", id, e);
                metrics::record_action_execution(id, "failure");
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_safe_child_path() {
        let ctx = ActionContext::new(json!({}), "/work");
        assert_eq!(
            ctx.resolve_safe_child_path("a/./b.json").unwrap(),
            PathBuf::from("/work/a/./b.json")
        );
        assert!(ctx.resolve_safe_child_path("a/../b.json").is_ok());
        assert!(matches!(
            ctx.resolve_safe_child_path("../escape.txt"),
            Err(ActionError::PathOutsideWorkspace(_))
        ));
        assert!(ctx.resolve_safe_child_path("a/../../b").is_err());
        assert!(ctx.resolve_safe_child_path("/etc/passwd").is_err());
        assert!(ctx.resolve_safe_child_path(".").is_err());
    }

    #[test]
    fn test_requester_defaults_to_automation_user() {
        let ctx = ActionContext::new(json!({}), "/work");
        assert_eq!(ctx.requester().user_name, "automation");

        let ctx = ctx.with_user(Some(Requester {
            user_name: "jdoe".to_string(),
            ownership_refs: vec!["group:default/team-a".to_string()],
        }));
        assert_eq!(ctx.requester().user_name, "jdoe");
    }

    #[test]
    fn test_env_provider_auth_request() {
        let provider = EnvironmentProvider {
            env_provider_name: "dev-ecs".to_string(),
            env_provider_prefix: "opa".to_string(),
            account_id: "123456789012".to_string(),
            region: "us-east-1".to_string(),
            ..Default::default()
        };
        let request = provider.auth_request(&Requester {
            user_name: "jdoe".to_string(),
            ownership_refs: vec![],
        });
        assert_eq!(
            request.role_arn(),
            "arn:aws:iam::123456789012:role/opa-dev-ecs-operations-role"
        );
    }
}
