use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

use super::{env_var_opt, env_var_or_default, env_var_or_default_bool, env_var_or_default_str};
use super::ScmIntegrations;
use crate::aws::arn::Arn;
use crate::aws::auth::validate_region;
use crate::constants::{
    DEFAULT_CATALOG_BASE_URL, DEFAULT_GITLAB_API_SCHEME, DEFAULT_SERVER_PORT,
};
use crate::error::ConfigError;
use crate::scm::{GitProviders, ScmEndpoints};

/// Platform backend settings
///
/// All settings have defaults and can be overridden via environment variables.
#[derive(Clone)]
pub struct PlatformConfig {
    /// Raw `GIT_PROVIDER` value; checked by [`PlatformConfig::validate`]
    pub git_provider: String,
    /// Region hosting the platform's own secrets and parameters
    pub platform_region: Option<String>,
    /// Shared secret required as bearer token on the platform API
    pub automation_key: Option<Zeroizing<String>>,
    pub github_api_base_url: Option<String>,
    pub gitlab_api_scheme: String,
    pub catalog_base_url: String,
    pub catalog_token: Option<Zeroizing<String>>,
    pub server_port: u16,
    /// How long startup waits for the HTTP server to bind
    pub startup_timeout_secs: u64,
    pub poll_interval_ms: u64,
    /// Log format (json, text)
    pub log_format: String,
    pub log_enable_color: bool,
    pub enable_metrics: bool,
    /// Parent directory of scaffolder action workspaces
    pub workspace_root: PathBuf,
    pub integrations: ScmIntegrations,
}

impl std::fmt::Debug for PlatformConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlatformConfig")
            .field("git_provider", &self.git_provider)
            .field("platform_region", &self.platform_region)
            .field("automation_key", &self.automation_key.as_ref().map(|_| "<redacted>"))
            .field("github_api_base_url", &self.github_api_base_url)
            .field("gitlab_api_scheme", &self.gitlab_api_scheme)
            .field("catalog_base_url", &self.catalog_base_url)
            .field("server_port", &self.server_port)
            .field("log_format", &self.log_format)
            .field("enable_metrics", &self.enable_metrics)
            .field("workspace_root", &self.workspace_root)
            .field("integrations", &self.integrations)
            .finish_non_exhaustive()
    }
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

impl PlatformConfig {
    /// Load configuration from environment variables with defaults
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary variable source
    pub fn from_lookup<F: Fn(&str) -> Option<String>>(lookup: F) -> Self {
        Self {
            git_provider: env_var_or_default_str(&lookup, "GIT_PROVIDER", ""),
            platform_region: env_var_opt(&lookup, "PLATFORM_REGION")
                .or_else(|| env_var_opt(&lookup, "AWS_REGION")),
            automation_key: env_var_opt(&lookup, "AUTOMATION_KEY").map(Zeroizing::new),
            github_api_base_url: env_var_opt(&lookup, "GITHUB_API_BASE_URL"),
            gitlab_api_scheme: env_var_or_default_str(
                &lookup,
                "GITLAB_API_SCHEME",
                DEFAULT_GITLAB_API_SCHEME,
            ),
            catalog_base_url: env_var_or_default_str(
                &lookup,
                "CATALOG_BASE_URL",
                DEFAULT_CATALOG_BASE_URL,
            ),
            catalog_token: env_var_opt(&lookup, "CATALOG_TOKEN").map(Zeroizing::new),
            server_port: env_var_opt(&lookup, "SERVER_PORT")
                .or_else(|| env_var_opt(&lookup, "METRICS_PORT"))
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_SERVER_PORT),
            startup_timeout_secs: env_var_or_default(&lookup, "SERVER_STARTUP_TIMEOUT_SECS", 10),
            poll_interval_ms: env_var_or_default(&lookup, "SERVER_POLL_INTERVAL_MS", 50),
            log_format: env_var_or_default_str(&lookup, "LOG_FORMAT", "json"),
            log_enable_color: env_var_or_default_bool(&lookup, "LOG_ENABLE_COLOR", false),
            enable_metrics: env_var_or_default_bool(&lookup, "ENABLE_METRICS", true),
            workspace_root: env_var_opt(&lookup, "ACTIONS_WORKSPACE_DIR").map_or_else(
                || std::env::temp_dir().join("harmonix-actions"),
                PathBuf::from,
            ),
            integrations: ScmIntegrations::from_lookup(&lookup),
        }
    }

    /// Parsed git provider; `Unset` and unknown values are errors
    pub fn git_provider(&self) -> Result<GitProviders, ConfigError> {
        let raw = self.git_provider.trim();
        if raw.is_empty() {
            return Err(ConfigError::GitProviderUnset);
        }
        match raw.parse::<GitProviders>() {
            Ok(GitProviders::Unset) => Err(ConfigError::GitProviderUnset),
            Ok(provider) => Ok(provider),
            Err(_) => Err(ConfigError::UnsupportedGitProvider(raw.to_string())),
        }
    }

    pub fn platform_region(&self) -> Result<&str, ConfigError> {
        let region = self
            .platform_region
            .as_deref()
            .ok_or(ConfigError::MissingPlatformRegion)?;
        validate_region(region).map_err(|_| ConfigError::InvalidPlatformRegion(region.to_string()))?;
        Ok(region)
    }

    /// Startup checks; the server refuses to start on error
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.git_provider()?;
        self.platform_region()?;
        if !matches!(self.gitlab_api_scheme.as_str(), "http" | "https") {
            return Err(ConfigError::InvalidValue {
                key: "GITLAB_API_SCHEME",
                message: format!("expected http or https, got '{}'", self.gitlab_api_scheme),
            });
        }
        reqwest::Url::parse(&self.catalog_base_url).map_err(|e| ConfigError::InvalidValue {
            key: "CATALOG_BASE_URL",
            message: e.to_string(),
        })?;
        Ok(())
    }

    #[must_use]
    pub fn scm_endpoints(&self) -> ScmEndpoints {
        ScmEndpoints {
            github_api_base_url: self.github_api_base_url.clone(),
            gitlab_api_scheme: Some(self.gitlab_api_scheme.clone()),
            gitlab_api_base_url: self
                .integrations
                .gitlab
                .first()
                .and_then(|i| i.api_base_url.clone()),
        }
    }
}

/// Region of the running ECS task, read from the task metadata endpoint
async fn ecs_task_region(client: &reqwest::Client, metadata_uri: &str) -> Option<String> {
    let url = format!("{}/task", metadata_uri.trim_end_matches('/'));
    let response = match client.get(&url).timeout(Duration::from_secs(2)).send().await {
        Ok(response) => response,
        Err(e) => {
            warn!("ECS task metadata request failed: {}", e);
            return None;
        }
    };
    let body: serde_json::Value = response.json().await.ok()?;
    let task_arn = body.get("TaskARN").and_then(serde_json::Value::as_str)?;
    let region = task_arn.parse::<Arn>().ok()?.region;
    debug!("ECS task {} runs in {}", task_arn, region);
    Some(region).filter(|r| !r.is_empty())
}

/// Fill in the platform region from ECS task metadata when it is not configured
pub async fn resolve_platform_region(config: &mut PlatformConfig, client: &reqwest::Client) {
    if config.platform_region.is_some() {
        return;
    }
    let Ok(metadata_uri) = std::env::var("ECS_CONTAINER_METADATA_URI_V4") else {
        return;
    };
    if let Some(region) = ecs_task_region(client, &metadata_uri).await {
        info!("Platform region resolved from ECS task metadata: {}", region);
        config.platform_region = Some(region);
    }
}
