//! # SCM
//!
//! Git hosting provider abstraction.
//!
//! [`ScmBackendApi`] is the capability contract every provider adapter
//! implements. The closed set of adapters is:
//!
//! - [`GitHubApi`] - GitHub REST v3
//! - [`GitLabApi`] - GitLab REST v4
//! - [`GitUnset`] - unconfigured selector, fails every call
//!
//! [`GitService`] selects the active adapter for a request.

mod github;
mod http;
mod gitlab;
mod service;
mod types;
mod unset;
pub mod util;

pub use github::GitHubApi;
pub use gitlab::{GitLabApi, ProjectAccessToken};
pub use service::{GitService, GitServiceFactory, ScmEndpoints};
pub use types::{
    CommitAction, CommitActionKind, CommitChange, GitApiResult, GitProviders, GitVisibility,
    RepositoryInfo,
};
pub use unset::GitUnset;

use async_trait::async_trait;

use crate::error::GitError;

/// Repository lifecycle operations offered by a git hosting provider
///
/// Every operation takes the target repository and a provider access token.
/// Non-2xx provider responses are returned as [`GitError::Api`].
#[async_trait]
pub trait ScmBackendApi: Send + Sync + std::fmt::Debug {
    /// Provider served by this adapter
    fn provider(&self) -> GitProviders;

    /// REST API base URL used for `repo`
    fn api_base_url(&self, repo: &RepositoryInfo) -> String;

    async fn create_repository(
        &self,
        repo: &RepositoryInfo,
        access_token: &str,
    ) -> Result<GitApiResult, GitError>;

    async fn delete_repository(
        &self,
        repo: &RepositoryInfo,
        access_token: &str,
    ) -> Result<GitApiResult, GitError>;

    /// Read a file from the default branch; `value` carries the decoded content
    async fn get_file_content(
        &self,
        file_path: &str,
        repo: &RepositoryInfo,
        access_token: &str,
    ) -> Result<GitApiResult, GitError>;

    async fn commit_content(
        &self,
        change: &CommitChange,
        repo: &RepositoryInfo,
        access_token: &str,
    ) -> Result<GitApiResult, GitError>;
}
