use async_trait::async_trait;
use chrono::{Duration, Utc};
use serde::Deserialize;
use serde_json::Value;
use tracing::info;

use super::{schema_of, ActionContext, TemplateAction};
use crate::aws::arn::Arn;
use crate::config::ScmIntegrations;
use crate::constants::REPO_ACCESS_TOKEN_LIFETIME_DAYS;
use crate::error::ActionError;
use crate::platform::PlatformService;
use crate::scm::util::parse_repo_url;
use crate::scm::{GitLabApi, GitProviders, RepositoryInfo};

const ID: &str = "opa:createRepoAccessToken:gitlab";

#[derive(Debug, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
struct CreateRepoAccessTokenInput {
    /// Repository location, `host?owner=group&repo=name`
    repo_url: String,
    /// Numeric GitLab project id
    project_id: u64,
    /// Secret receiving the token
    secret_arn: String,
    /// Region of the secret; defaults to the platform region
    region: Option<String>,
}

/// Creates a project access token and stores it in Secrets Manager
///
/// The token itself never appears in the action outputs.
#[derive(Debug, Clone)]
pub struct CreateRepoAccessTokenAction {
    platform: PlatformService,
    integrations: ScmIntegrations,
    client: reqwest::Client,
}

impl CreateRepoAccessTokenAction {
    #[must_use]
    pub fn new(
        platform: PlatformService,
        integrations: ScmIntegrations,
        client: reqwest::Client,
    ) -> Self {
        Self {
            platform,
            integrations,
            client,
        }
    }
}

#[async_trait]
impl TemplateAction for CreateRepoAccessTokenAction {
    fn id(&self) -> &'static str {
        ID
    }

    fn description(&self) -> &'static str {
        "Initializes a git repository access token and stores it in an AWS secret"
    }

    fn input_schema(&self) -> Value {
        schema_of::<CreateRepoAccessTokenInput>()
    }

    async fn handler(&self, ctx: &mut ActionContext) -> Result<(), ActionError> {
        let input: CreateRepoAccessTokenInput = ctx.parse_input(ID)?;
        let parts = parse_repo_url(&input.repo_url)?;
        let secret_arn: Arn = input.secret_arn.parse()?;

        let integration = self
            .integrations
            .gitlab_by_host(&parts.host)
            .ok_or_else(|| {
                ActionError::Failed(format!(
                    "No matching integration configuration for host {}, please check your integrations config",
                    parts.host
                ))
            })?;
        let api_token = integration.token.as_ref().ok_or_else(|| {
            ActionError::Failed(format!("No token available for host: {}", parts.host))
        })?;

        let expires_at =
            Utc::now().date_naive() + Duration::days(REPO_ACCESS_TOKEN_LIFETIME_DAYS);

        if ctx.dry_run {
            info!(
                "Dry run: would create access token for project {} on {} expiring {} and store it in {}",
                input.project_id, parts.host, expires_at, secret_arn
            );
            return Ok(());
        }

        let mut api = GitLabApi::new(self.client.clone());
        if let Some(base_url) = integration.api_base_url.as_deref() {
            reqwest::Url::parse(base_url).map_err(|e| {
                ActionError::Failed(format!("Invalid GitLab API base URL {base_url}: {e}"))
            })?;
            api = api.with_base_url(base_url);
        }
        let repo = RepositoryInfo {
            git_host: parts.host.clone(),
            git_project_group: parts.owner.clone(),
            git_repo_name: parts.repo.clone(),
            project_id: Some(input.project_id.to_string()),
            git_provider: GitProviders::GitLab,
            ..Default::default()
        };

        let token = api
            .create_project_access_token(&repo, api_token, expires_at)
            .await?;

        let region = input
            .region
            .as_deref()
            .unwrap_or_else(|| self.platform.platform_region());
        let client = self.platform.aws().platform_client(region).await?;
        client.put_secret_value(&input.secret_arn, &token.token).await?;
        info!(
            "Stored access token {} for {} in {}",
            token.name,
            repo.full_path(),
            secret_arn.resource
        );
        Ok(())
    }
}
