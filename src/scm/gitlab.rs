//! # GitLab Adapter
//!
//! [`ScmBackendApi`] implementation over the GitLab v4 REST API.
//!
//! Repositories are addressed by numeric project id. When a
//! [`RepositoryInfo`] does not carry one, it is resolved from the
//! `group/repo` path with a project search.

use async_trait::async_trait;
use base64::Engine;
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info, info_span, Instrument};
use zeroize::Zeroizing;

use super::http::{observe, send_json, url_with_segments};
use super::{CommitChange, GitApiResult, GitProviders, RepositoryInfo, ScmBackendApi};
use crate::constants::{DEFAULT_BRANCH, DEFAULT_GITLAB_API_SCHEME, GITLAB_MAINTAINER_ACCESS_LEVEL};
use crate::error::GitError;

const PROVIDER: GitProviders = GitProviders::GitLab;

/// Scopes granted to repository access tokens
pub const REPO_ACCESS_TOKEN_SCOPES: [&str; 4] =
    ["api", "read_repository", "write_repository", "read_api"];

/// Project access token returned by GitLab
#[derive(Deserialize)]
pub struct ProjectAccessToken {
    pub id: u64,
    pub name: String,
    pub token: Zeroizing<String>,
    #[serde(default)]
    pub expires_at: Option<String>,
}

impl std::fmt::Debug for ProjectAccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProjectAccessToken")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("expires_at", &self.expires_at)
            .finish_non_exhaustive()
    }
}

/// GitLab REST adapter
#[derive(Clone)]
pub struct GitLabApi {
    client: reqwest::Client,
    scheme: String,
    base_url: Option<String>,
}

impl std::fmt::Debug for GitLabApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitLabApi")
            .field("scheme", &self.scheme)
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl Default for GitLabApi {
    fn default() -> Self {
        Self::new(reqwest::Client::new())
    }
}

impl GitLabApi {
    #[must_use]
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            scheme: DEFAULT_GITLAB_API_SCHEME.to_string(),
            base_url: None,
        }
    }

    /// Use `scheme` (`http` or `https`) when building URLs from the repository host
    #[must_use]
    pub fn with_scheme(mut self, scheme: impl Into<String>) -> Self {
        self.scheme = scheme.into();
        self
    }

    /// Send every request under `base_url`, path prefix included
    /// (`https://host/gitlab/api/v4`)
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    fn host(repo: &RepositoryInfo) -> Result<&str, GitError> {
        let host = repo.git_host.trim();
        if host.is_empty() {
            return Err(GitError::MissingRepositoryField("gitHost"));
        }
        Ok(host)
    }

    fn url(&self, repo: &RepositoryInfo, segments: &[&str]) -> Result<reqwest::Url, GitError> {
        Self::host(repo)?;
        url_with_segments(&self.api_base_url(repo), segments).map_err(|message| {
            GitError::InvalidResponse {
                provider: PROVIDER,
                operation: "build_url",
                message,
            }
        })
    }

    fn request(
        &self,
        method: reqwest::Method,
        url: reqwest::Url,
        access_token: &str,
    ) -> reqwest::RequestBuilder {
        self.client
            .request(method, url)
            .header("PRIVATE-TOKEN", access_token)
    }

    /// Numeric project id of `repo`
    pub async fn project_id(
        &self,
        repo: &RepositoryInfo,
        access_token: &str,
    ) -> Result<String, GitError> {
        if let Some(id) = repo.project_id.as_deref().filter(|id| !id.is_empty()) {
            return Ok(id.to_string());
        }

        let group = repo.git_project_group.clone().unwrap_or_default();
        let name = repo.repo_name();
        let mut url = self.url(repo, &["projects"])?;
        url.query_pairs_mut().append_pair("search", name);
        let (_, projects) = send_json(
            PROVIDER,
            "find_project",
            self.request(reqwest::Method::GET, url, access_token),
        )
        .await?;

        let expected = format!("{group}/{name}");
        let found = projects
            .as_array()
            .into_iter()
            .flatten()
            .find(|project| {
                project.get("path_with_namespace").and_then(Value::as_str) == Some(expected.as_str())
            })
            .and_then(|project| project.get("id"))
            .and_then(|id| match id {
                Value::Number(n) => Some(n.to_string()),
                Value::String(s) => Some(s.clone()),
                _ => None,
            });

        match found {
            Some(id) => {
                debug!("Resolved GitLab project {} to id {}", expected, id);
                Ok(id)
            }
            None => Err(GitError::ProjectNotFound {
                group,
                repo: name.to_string(),
            }),
        }
    }

    async fn namespace_id(
        &self,
        repo: &RepositoryInfo,
        group: &str,
        access_token: &str,
    ) -> Result<Value, GitError> {
        let url = self.url(repo, &["namespaces", group])?;
        let (_, namespace) = send_json(
            PROVIDER,
            "get_namespace",
            self.request(reqwest::Method::GET, url, access_token),
        )
        .await?;
        namespace
            .get("id")
            .cloned()
            .ok_or_else(|| GitError::InvalidResponse {
                provider: PROVIDER,
                operation: "get_namespace",
                message: format!("namespace {group} has no id"),
            })
    }

    /// Create a project access token with maintainer access
    ///
    /// The token expires on `expires_at`; GitLab requires an expiry date.
    #[allow(
        clippy::missing_errors_doc,
        reason = "Errors are the GitError variants returned by every adapter call"
    )]
    pub async fn create_project_access_token(
        &self,
        repo: &RepositoryInfo,
        access_token: &str,
        expires_at: NaiveDate,
    ) -> Result<ProjectAccessToken, GitError> {
        let span = info_span!("gitlab.create_project_access_token", repo = %repo.full_path());
        observe(PROVIDER, "create_project_access_token", async move {
            let project_id = self.project_id(repo, access_token).await?;
            let body = json!({
                "name": format!("{}-repo-access-token", repo.repo_name()),
                "scopes": REPO_ACCESS_TOKEN_SCOPES,
                "access_level": GITLAB_MAINTAINER_ACCESS_LEVEL,
                "expires_at": expires_at.format("%Y-%m-%d").to_string(),
            });
            let url = self.url(repo, &["projects", &project_id, "access_tokens"])?;
            let (_, value) = send_json(
                PROVIDER,
                "create_project_access_token",
                self.request(reqwest::Method::POST, url, access_token).json(&body),
            )
            .await?;
            let token: ProjectAccessToken =
                serde_json::from_value(value).map_err(|e| GitError::InvalidResponse {
                    provider: PROVIDER,
                    operation: "create_project_access_token",
                    message: e.to_string(),
                })?;
            info!(
                "Created access token {} for project {}, expires {}",
                token.name,
                project_id,
                token.expires_at.as_deref().unwrap_or("never")
            );
            Ok(token)
        }
        .instrument(span))
        .await
    }
}

#[async_trait]
impl ScmBackendApi for GitLabApi {
    fn provider(&self) -> GitProviders {
        PROVIDER
    }

    fn api_base_url(&self, repo: &RepositoryInfo) -> String {
        match &self.base_url {
            Some(base_url) => base_url.trim_end_matches('/').to_string(),
            None => format!("{}://{}/api/v4", self.scheme, repo.git_host.trim()),
        }
    }

    async fn create_repository(
        &self,
        repo: &RepositoryInfo,
        access_token: &str,
    ) -> Result<GitApiResult, GitError> {
        let span = info_span!("gitlab.create_repository", repo = %repo.full_path());
        observe(PROVIDER, "create_repository", async move {
            let name = repo.repo_name();
            let mut body = json!({
                "name": name,
                "path": name,
                "description": repo.description.clone().unwrap_or_default(),
                "initialize_with_readme": true,
                "visibility": repo.effective_visibility().as_str(),
            });
            if let Some(group) = repo.git_project_group.as_deref().filter(|g| !g.is_empty()) {
                body["namespace_id"] = self.namespace_id(repo, group, access_token).await?;
            }
            let url = self.url(repo, &["projects"])?;
            let (status, value) = send_json(
                PROVIDER,
                "create_repository",
                self.request(reqwest::Method::POST, url, access_token).json(&body),
            )
            .await?;
            info!("Created GitLab project {}", repo.full_path());
            Ok(GitApiResult::new("Repository created successfully", status, value))
        }
        .instrument(span))
        .await
    }

    async fn delete_repository(
        &self,
        repo: &RepositoryInfo,
        access_token: &str,
    ) -> Result<GitApiResult, GitError> {
        let span = info_span!("gitlab.delete_repository", repo = %repo.full_path());
        observe(PROVIDER, "delete_repository", async move {
            let project_id = self.project_id(repo, access_token).await?;
            let url = self.url(repo, &["projects", &project_id])?;
            let (status, value) = send_json(
                PROVIDER,
                "delete_repository",
                self.request(reqwest::Method::DELETE, url, access_token),
            )
            .await?;
            info!("Deleted GitLab project {} ({})", repo.full_path(), project_id);
            Ok(GitApiResult::new("Repository deleted successfully", status, value))
        }
        .instrument(span))
        .await
    }

    async fn get_file_content(
        &self,
        file_path: &str,
        repo: &RepositoryInfo,
        access_token: &str,
    ) -> Result<GitApiResult, GitError> {
        let span = info_span!("gitlab.get_file_content", repo = %repo.full_path(), file_path);
        observe(PROVIDER, "get_file_content", async move {
            let project_id = self.project_id(repo, access_token).await?;
            let mut url = self.url(
                repo,
                &["projects", &project_id, "repository", "files", file_path.trim_start_matches('/')],
            )?;
            url.query_pairs_mut().append_pair("ref", DEFAULT_BRANCH);
            let (status, value) = send_json(
                PROVIDER,
                "get_file_content",
                self.request(reqwest::Method::GET, url, access_token),
            )
            .await?;
            let content = decode_file(&value)?;
            Ok(GitApiResult::new(
                "Retrieve file content successfully",
                status,
                Value::String(content),
            ))
        }
        .instrument(span))
        .await
    }

    async fn commit_content(
        &self,
        change: &CommitChange,
        repo: &RepositoryInfo,
        access_token: &str,
    ) -> Result<GitApiResult, GitError> {
        let span = info_span!(
            "gitlab.commit_content",
            repo = %repo.full_path(),
            branch = %change.branch,
            files = change.actions.len()
        );
        observe(PROVIDER, "commit_content", async move {
            change.ensure_not_empty()?;
            let project_id = self.project_id(repo, access_token).await?;
            let body = json!({
                "branch": change.branch,
                "commit_message": change.commit_message,
                "actions": change.actions,
            });
            let url = self.url(repo, &["projects", &project_id, "repository", "commits"])?;
            let (status, value) = send_json(
                PROVIDER,
                "commit_content",
                self.request(reqwest::Method::POST, url, access_token).json(&body),
            )
            .await?;
            info!(
                "Committed {} file(s) to {}@{}",
                change.actions.len(),
                repo.full_path(),
                change.branch
            );
            Ok(GitApiResult::new("Commit submitted successfully", status, value))
        }
        .instrument(span))
        .await
    }
}

/// Content of a repository files API response
fn decode_file(value: &Value) -> Result<String, GitError> {
    let invalid = |message: String| GitError::InvalidResponse {
        provider: PROVIDER,
        operation: "get_file_content",
        message,
    };
    let content = value
        .get("content")
        .and_then(Value::as_str)
        .ok_or_else(|| invalid("missing field content".to_string()))?;
    match value.get("encoding").and_then(Value::as_str) {
        Some("base64") => {
            let bytes = base64::engine::general_purpose::STANDARD
                .decode(content.trim())
                .map_err(|e| invalid(format!("content is not valid base64: {e}")))?;
            String::from_utf8(bytes).map_err(|e| invalid(format!("content is not valid UTF-8: {e}")))
        }
        _ => Ok(content.to_string()),
    }
}
