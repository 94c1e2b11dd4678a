//! Adapter bound to an unconfigured selector.

use async_trait::async_trait;
use tracing::error;

use super::{CommitChange, GitApiResult, GitProviders, RepositoryInfo, ScmBackendApi};
use crate::error::GitError;

/// Fails every operation with [`GitError::Unset`]
#[derive(Debug, Clone, Copy, Default)]
pub struct GitUnset;

impl GitUnset {
    fn fail(operation: &str) -> Result<GitApiResult, GitError> {
        error!(operation, "git operation invoked without a configured provider");
        crate::observability::metrics::increment_git_operation_errors("unset", operation);
        Err(GitError::Unset)
    }
}

#[async_trait]
impl ScmBackendApi for GitUnset {
    fn provider(&self) -> GitProviders {
        GitProviders::Unset
    }

    fn api_base_url(&self, _repo: &RepositoryInfo) -> String {
        String::new()
    }

    async fn create_repository(
        &self,
        _repo: &RepositoryInfo,
        _access_token: &str,
    ) -> Result<GitApiResult, GitError> {
        Self::fail("create_repository")
    }

    async fn delete_repository(
        &self,
        _repo: &RepositoryInfo,
        _access_token: &str,
    ) -> Result<GitApiResult, GitError> {
        Self::fail("delete_repository")
    }

    async fn get_file_content(
        &self,
        _file_path: &str,
        _repo: &RepositoryInfo,
        _access_token: &str,
    ) -> Result<GitApiResult, GitError> {
        Self::fail("get_file_content")
    }

    async fn commit_content(
        &self,
        _change: &CommitChange,
        _repo: &RepositoryInfo,
        _access_token: &str,
    ) -> Result<GitApiResult, GitError> {
        Self::fail("commit_content")
    }
}
