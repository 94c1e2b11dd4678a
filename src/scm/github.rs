//! # GitHub Adapter
//!
//! [`ScmBackendApi`] implementation over the GitHub REST API.
//!
//! Commits are written through the git data API so that every
//! [`CommitChange`] lands as a single commit on the target branch.

use async_trait::async_trait;
use base64::Engine;
use serde_json::{json, Value};
use tracing::{debug, info, info_span, Instrument};

use super::http::{observe, send_json, url_with_segments};
use super::{
    CommitActionKind, CommitChange, GitApiResult, GitProviders, GitVisibility, RepositoryInfo,
    ScmBackendApi,
};
use crate::constants::{DEFAULT_GITHUB_API_BASE_URL, GITHUB_HOST};
use crate::error::GitError;

const PROVIDER: GitProviders = GitProviders::GitHub;
const API_VERSION: &str = "2022-11-28";
const USER_AGENT: &str = concat!("harmonix-platform/", env!("CARGO_PKG_VERSION"));

/// GitHub REST adapter
#[derive(Clone)]
pub struct GitHubApi {
    client: reqwest::Client,
    base_url: Option<String>,
}

impl std::fmt::Debug for GitHubApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubApi")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl Default for GitHubApi {
    fn default() -> Self {
        Self::new(reqwest::Client::new())
    }
}

impl GitHubApi {
    #[must_use]
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            base_url: None,
        }
    }

    /// Send every request to `base_url` regardless of the repository host
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    fn owner(repo: &RepositoryInfo) -> Result<&str, GitError> {
        repo.git_organization
            .as_deref()
            .filter(|org| !org.is_empty())
            .ok_or(GitError::MissingRepositoryField("gitOrganization"))
    }

    fn url(&self, repo: &RepositoryInfo, segments: &[&str]) -> Result<reqwest::Url, GitError> {
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
            .bearer_auth(access_token)
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", API_VERSION)
            .header("User-Agent", USER_AGENT)
    }

    /// Head commit SHA and tree SHA of `branch`
    async fn branch_head(
        &self,
        repo: &RepositoryInfo,
        owner: &str,
        branch: &str,
        access_token: &str,
    ) -> Result<(String, String), GitError> {
        let ref_path = format!("heads/{branch}");
        let url = self.url(repo, &["repos", owner, repo.repo_name(), "git", "ref"])?;
        let url = append_raw_path(url, &ref_path);
        let (_, reference) = send_json(
            PROVIDER,
            "get_ref",
            self.request(reqwest::Method::GET, url, access_token),
        )
        .await?;
        let commit_sha = string_field(&reference, &["object", "sha"], "get_ref")?;

        let url = self.url(
            repo,
            &["repos", owner, repo.repo_name(), "git", "commits", &commit_sha],
        )?;
        let (_, commit) = send_json(
            PROVIDER,
            "get_commit",
            self.request(reqwest::Method::GET, url, access_token),
        )
        .await?;
        let tree_sha = string_field(&commit, &["tree", "sha"], "get_commit")?;
        Ok((commit_sha, tree_sha))
    }
}

/// Append an unencoded path such as `heads/feature/x` to `url`
fn append_raw_path(mut url: reqwest::Url, raw: &str) -> reqwest::Url {
    if let Ok(mut segments) = url.path_segments_mut() {
        segments.extend(raw.split('/'));
    }
    url
}

fn string_field(value: &Value, path: &[&str], operation: &'static str) -> Result<String, GitError> {
    let mut current = value;
    for key in path {
        current = current.get(key).ok_or_else(|| GitError::InvalidResponse {
            provider: PROVIDER,
            operation,
            message: format!("missing field {}", path.join(".")),
        })?;
    }
    current
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| GitError::InvalidResponse {
            provider: PROVIDER,
            operation,
            message: format!("field {} is not a string", path.join(".")),
        })
}

/// Decode the base64 payload of a contents API response
fn decode_content(value: &Value) -> Result<String, GitError> {
    let encoded = string_field(value, &["content"], "get_file_content")?;
    let compact: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(compact)
        .map_err(|e| GitError::InvalidResponse {
            provider: PROVIDER,
            operation: "get_file_content",
            message: format!("content is not valid base64: {e}"),
        })?;
    String::from_utf8(bytes).map_err(|e| GitError::InvalidResponse {
        provider: PROVIDER,
        operation: "get_file_content",
        message: format!("content is not valid UTF-8: {e}"),
    })
}

#[async_trait]
impl ScmBackendApi for GitHubApi {
    fn provider(&self) -> GitProviders {
        PROVIDER
    }

    fn api_base_url(&self, repo: &RepositoryInfo) -> String {
        if let Some(base_url) = &self.base_url {
            return base_url.clone();
        }
        let host = repo.git_host.trim();
        if host.is_empty() || host == GITHUB_HOST {
            DEFAULT_GITHUB_API_BASE_URL.to_string()
        } else {
            // GitHub Enterprise Server
            format!("https://{host}/api/v3")
        }
    }

    async fn create_repository(
        &self,
        repo: &RepositoryInfo,
        access_token: &str,
    ) -> Result<GitApiResult, GitError> {
        let span = info_span!("github.create_repository", repo = %repo.full_path());
        observe(PROVIDER, "create_repository", async move {
            let owner = Self::owner(repo)?;
            let body = create_repository_body(repo);
            let url = self.url(repo, &["orgs", owner, "repos"])?;
            let (status, value) = send_json(
                PROVIDER,
                "create_repository",
                self.request(reqwest::Method::POST, url, access_token).json(&body),
            )
            .await?;
            info!("Created GitHub repository {}", repo.full_path());
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
        let span = info_span!("github.delete_repository", repo = %repo.full_path());
        observe(PROVIDER, "delete_repository", async move {
            let owner = Self::owner(repo)?;
            let url = self.url(repo, &["repos", owner, repo.repo_name()])?;
            let (status, value) = send_json(
                PROVIDER,
                "delete_repository",
                self.request(reqwest::Method::DELETE, url, access_token),
            )
            .await?;
            info!("Deleted GitHub repository {}", repo.full_path());
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
        let span = info_span!("github.get_file_content", repo = %repo.full_path(), file_path);
        observe(PROVIDER, "get_file_content", async move {
            let owner = Self::owner(repo)?;
            let url = self.url(repo, &["repos", owner, repo.repo_name(), "contents"])?;
            let url = append_raw_path(url, file_path.trim_start_matches('/'));
            let (status, value) = send_json(
                PROVIDER,
                "get_file_content",
                self.request(reqwest::Method::GET, url, access_token),
            )
            .await?;
            let content = decode_content(&value)?;
            debug!("Read {} bytes from {}", content.len(), file_path);
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
            "github.commit_content",
            repo = %repo.full_path(),
            branch = %change.branch,
            files = change.actions.len()
        );
        observe(PROVIDER, "commit_content", async move {
            change.ensure_not_empty()?;
            let owner = Self::owner(repo)?;
            let name = repo.repo_name();
            let (parent_sha, base_tree) =
                self.branch_head(repo, owner, &change.branch, access_token).await?;

            let tree: Vec<Value> = change
                .actions
                .iter()
                .map(|action| match action.action {
                    CommitActionKind::Create | CommitActionKind::Update => json!({
                        "path": action.file_path,
                        "mode": "100644",
                        "type": "blob",
                        "content": action.content,
                    }),
                    CommitActionKind::Delete => json!({
                        "path": action.file_path,
                        "mode": "100644",
                        "type": "blob",
                        "sha": Value::Null,
                    }),
                })
                .collect();

            let url = self.url(repo, &["repos", owner, name, "git", "trees"])?;
            let (_, new_tree) = send_json(
                PROVIDER,
                "create_tree",
                self.request(reqwest::Method::POST, url, access_token)
                    .json(&json!({ "base_tree": base_tree, "tree": tree })),
            )
            .await?;
            let tree_sha = string_field(&new_tree, &["sha"], "create_tree")?;

            let url = self.url(repo, &["repos", owner, name, "git", "commits"])?;
            let (_, commit) = send_json(
                PROVIDER,
                "create_commit",
                self.request(reqwest::Method::POST, url, access_token).json(&json!({
                    "message": change.commit_message,
                    "tree": tree_sha,
                    "parents": [parent_sha],
                })),
            )
            .await?;
            let commit_sha = string_field(&commit, &["sha"], "create_commit")?;

            let url = self.url(repo, &["repos", owner, name, "git", "refs"])?;
            let url = append_raw_path(url, &format!("heads/{}", change.branch));
            let (status, _) = send_json(
                PROVIDER,
                "update_ref",
                self.request(reqwest::Method::PATCH, url, access_token)
                    .json(&json!({ "sha": commit_sha, "force": false })),
            )
            .await?;

            info!(
                "Committed {} file(s) to {}@{} as {}",
                change.actions.len(),
                repo.full_path(),
                change.branch,
                commit_sha
            );
            Ok(GitApiResult::new("Commit submitted successfully", status, commit))
        }
        .instrument(span))
        .await
    }
}

/// `private` and `visibility` always agree
fn create_repository_body(repo: &RepositoryInfo) -> Value {
    let visibility = repo.effective_visibility();
    json!({
        "name": repo.repo_name(),
        "description": repo.description.clone().unwrap_or_default(),
        "private": visibility == GitVisibility::Private,
        "visibility": visibility.as_str(),
        "auto_init": true,
    })
}
